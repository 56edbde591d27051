//! Wiring an engine from configuration.

use crate::config::{ConfigError, EngineConfig};
use crate::engine::ReflectionEngine;
use compass_remote::{OfflineRemoteStore, RestRemoteStore};
use compass_storage::{FileSnapshotStore, RemoteStore};
use std::sync::Arc;

/// An engine plus the REST adapter it was built with, if any. The caller
/// hands session tokens to the adapter with
/// [`RestRemoteStore::set_access_token`].
#[derive(Debug)]
pub struct EngineHandles {
    pub engine: ReflectionEngine,
    pub rest: Option<Arc<RestRemoteStore>>,
}

/// Build an engine over a file snapshot and, when configured, the REST
/// remote store. Without a `[remote]` table every remote call fails with
/// `NotConfigured` and the engine works purely locally.
pub fn open_engine(config: &EngineConfig) -> Result<EngineHandles, ConfigError> {
    config.validate()?;
    let snapshots = Box::new(FileSnapshotStore::new(config.snapshot_path.clone()));

    let (remote, rest): (Arc<dyn RemoteStore>, _) = match &config.remote {
        Some(remote_config) => {
            let rest = Arc::new(RestRemoteStore::new(remote_config)?);
            tracing::info!(base_url = %remote_config.base_url, "Remote store configured");
            (rest.clone(), Some(rest))
        }
        None => {
            tracing::info!("No remote store configured, running offline");
            (Arc::new(OfflineRemoteStore), None)
        }
    };

    tracing::info!(snapshot_path = %config.snapshot_path.display(), "Opening engine");
    Ok(EngineHandles {
        engine: ReflectionEngine::new(snapshots, remote),
        rest,
    })
}
