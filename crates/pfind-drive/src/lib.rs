//! # pfind Google backends
//!
//! - [`DriveStore`]: an [`ObjectStore`](pfind_core::ObjectStore) over the
//!   Google Drive v3 REST API, where folders are containers and files are
//!   artifacts
//! - [`SheetsAllowlist`]: reads authorized identities from one column of a
//!   Google Sheet
//!
//! Both share a [`TokenCache`] so a gcloud-minted token is reused until it
//! expires.

mod drive;
mod query;
mod sheets;
mod token;

pub use drive::{DriveStore, FOLDER_MIME_TYPE};
pub use query::{drive_query, escape_query_value};
pub use sheets::SheetsAllowlist;
pub use token::TokenCache;

use pfind_core::Error;
use reqwest::StatusCode;

/// Map a non-success Google API response onto the store taxonomy.
pub(crate) fn status_error(status: StatusCode, what: &str, body: &str) -> Error {
    let detail = body.trim();
    match status {
        StatusCode::NOT_FOUND => Error::NotFound(what.to_string()),
        StatusCode::UNAUTHORIZED
        | StatusCode::FORBIDDEN
        | StatusCode::REQUEST_TIMEOUT
        | StatusCode::TOO_MANY_REQUESTS => {
            Error::unavailable(format!("{} failed with {}: {}", what, status, detail))
        }
        s if s.is_server_error() => {
            Error::unavailable(format!("{} failed with {}: {}", what, status, detail))
        }
        _ => Error::message(format!("{} rejected with {}: {}", what, status, detail)),
    }
}

pub(crate) fn transport_error(what: &str, e: reqwest::Error) -> Error {
    Error::unavailable(format!("{}: {}", what, e))
}
