use crate::services::github::{ActionsArtifactStore, ArtifactStore};
use crate::services::observer::{self, JobContext};
use crate::*;

/// Run one phase of the lifecycle; the marker decides which. Returns the
/// process exit code (setup mirrors the capture mechanism's status).
pub fn handle_observe(config_arg: Option<&str>) -> anyhow::Result<i32> {
    let raw = match config_arg {
        Some(raw) => raw.to_string(),
        None => std::env::var("TOKENLENS_CONFIG").unwrap_or_default(),
    };
    let mut config = ObserverConfig::from_json(&raw)?;
    if !config.enabled {
        return Ok(0);
    }
    if std::env::var("RUNNER_DEBUG").is_ok() {
        config.debug = true;
    }

    let ctx = JobContext::from_env()?;
    if ctx.marker()?.is_set() {
        let store;
        let store_ref: Option<&dyn ArtifactStore> = if config.create_artifact {
            store = ActionsArtifactStore::from_env()?;
            Some(&store)
        } else {
            None
        };
        observer::finalize(&config, &ctx, store_ref)?;
        Ok(0)
    } else {
        observer::setup(&config, &ctx)
    }
}
