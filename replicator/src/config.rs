use config::load_config_from_file;
use config::shared::ReplicatorConfig;
use std::path::Path;

use crate::error::{ReplicatorError, ReplicatorResult};

/// Loads and validates the replicator configuration.
///
/// Uses the standard configuration loading mechanism from [`config`] and validates the
/// resulting [`ReplicatorConfig`] before returning it.
pub fn load_replicator_config(path: &Path) -> ReplicatorResult<ReplicatorConfig> {
    let config =
        load_config_from_file::<ReplicatorConfig>(path).map_err(ReplicatorError::config)?;
    config.validate().map_err(ReplicatorError::config)?;

    Ok(config)
}
