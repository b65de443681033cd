//! Wiring from [`PfindConfig`] to concrete backends

use crate::ParticipantFinder;
use pfind_access::{AllowlistSource, Authorizer, FileAllowlist, StaticAllowlist};
use pfind_core::config::{AllowlistSourceKind, StoreProvider};
use pfind_core::{ContainerId, Error, ObjectStore, PfindConfig, Result};
use pfind_drive::{DriveStore, SheetsAllowlist, TokenCache};
use pfind_store::FileSystemObjectStore;
use std::sync::Arc;
use std::time::Duration;

/// One token cache shared by the Drive store and the Sheets allow-list.
pub fn token_cache(config: &PfindConfig) -> Arc<TokenCache> {
    Arc::new(TokenCache::new(
        config.auth.clone(),
        Duration::from_secs(config.store.token_ttl_secs),
    ))
}

pub fn build_store(config: &PfindConfig, tokens: Arc<TokenCache>) -> Result<Arc<dyn ObjectStore>> {
    match config.store.provider {
        StoreProvider::Drive => Ok(Arc::new(DriveStore::from_config(&config.store, tokens))),
        StoreProvider::Filesystem => {
            let root = config.store.root_path.as_ref().ok_or_else(|| {
                Error::config_error("store.root_path is required for the filesystem provider")
            })?;
            Ok(Arc::new(FileSystemObjectStore::new(root)))
        }
    }
}

pub fn build_allowlist(
    config: &PfindConfig,
    tokens: Arc<TokenCache>,
) -> Result<Arc<dyn AllowlistSource>> {
    let access = &config.access;
    match access.source {
        AllowlistSourceKind::Static => Ok(Arc::new(StaticAllowlist::new(access.users.clone()))),
        AllowlistSourceKind::File => {
            let path = access
                .path
                .as_ref()
                .ok_or_else(|| Error::config_error("access.path is required"))?;
            Ok(Arc::new(FileAllowlist::new(path)))
        }
        AllowlistSourceKind::Sheet => {
            let sheet_id = access
                .sheet_id
                .as_ref()
                .ok_or_else(|| Error::config_error("access.sheet_id is required"))?;
            Ok(Arc::new(
                SheetsAllowlist::new(sheet_id.as_str(), access.sheet_range.as_str(), tokens)
                    .with_api_base(&access.sheets_api_base),
            ))
        }
    }
}

/// Build a finder with every component taken from `config`.
pub fn finder_from_config(config: &PfindConfig) -> Result<ParticipantFinder> {
    let tokens = token_cache(config);
    let store = build_store(config, tokens.clone())?;
    let allowlist = build_allowlist(config, tokens)?;
    let authorizer = Authorizer::new(allowlist)
        .with_ttl(Duration::from_secs(config.access.cache_ttl_secs));

    tracing::info!(
        store = ?config.store.provider,
        allowlist = ?config.access.source,
        auth = config.auth.provider_name(),
        "participant finder configured"
    );

    ParticipantFinder::builder()
        .store(store)
        .authorizer(Arc::new(authorizer))
        .anchor(ContainerId::new(config.store.root_id.as_str()))
        .layout(config.layout.clone())
        .versioning(config.versioning.clone())
        .retry(config.retry)
        .build()
}
