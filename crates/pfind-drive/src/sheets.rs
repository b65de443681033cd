//! Allow-list stored in a Google Sheet column

use crate::token::TokenCache;
use crate::{status_error, transport_error};
use async_trait::async_trait;
use pfind_access::AllowlistSource;
use pfind_core::Result;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

/// Reads identities from the first cell of each row in `range`.
pub struct SheetsAllowlist {
    client: Client,
    api_base: String,
    sheet_id: String,
    range: String,
    tokens: Arc<TokenCache>,
}

impl SheetsAllowlist {
    pub fn new(
        sheet_id: impl Into<String>,
        range: impl Into<String>,
        tokens: Arc<TokenCache>,
    ) -> Self {
        Self {
            client: Client::new(),
            api_base: "https://sheets.googleapis.com/v4".to_string(),
            sheet_id: sheet_id.into(),
            range: range.into(),
            tokens,
        }
    }

    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl AllowlistSource for SheetsAllowlist {
    async fn fetch(&self) -> Result<Vec<String>> {
        let url = format!(
            "{}/spreadsheets/{}/values/{}",
            self.api_base, self.sheet_id, self.range
        );
        let token = self.tokens.token().await?;

        let response = self
            .client
            .get(&url)
            .query(&[("majorDimension", "ROWS")])
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| transport_error("fetch allow-list sheet", e))?;

        let status = response.status();
        if !status.is_success() {
            if status == reqwest::StatusCode::UNAUTHORIZED {
                self.tokens.invalidate().await;
            }
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, "allow-list sheet", &body));
        }

        let range: ValueRange = response
            .json()
            .await
            .map_err(|e| transport_error("decode allow-list sheet", e))?;

        Ok(range
            .values
            .into_iter()
            .filter_map(|row| row.into_iter().next())
            .filter_map(|cell| match cell {
                serde_json::Value::String(s) => Some(s),
                _ => None,
            })
            .collect())
    }

    fn describe(&self) -> String {
        format!("sheet {} ({})", self.sheet_id, self.range)
    }
}
