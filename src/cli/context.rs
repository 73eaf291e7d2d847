//! Shared daemon context
//!
//! Turns the configuration file into the long-lived parts of the daemon.

use rebazer::config::{Config, load_config};
use rebazer::engine::{Engine, EngineSettings};
use rebazer::error::Result;
use rebazer::platform::{PlatformService, create_platform_service};
use rebazer::rebase::{GitRebaser, Rebaser};
use rebazer::types::RepositoryConfig;
use rebazer::workspace::WorkspaceManager;
use std::path::Path;
use std::sync::Arc;

/// Everything a running daemon owns
///
/// This struct encapsulates the startup sequence:
/// - Loading and validating the configuration
/// - Flattening it into one descriptor per repository
/// - Creating one platform service per repository
/// - Setting up the workspace registry and the rebaser
pub struct DaemonContext {
    /// Loaded configuration
    pub config: Config,
    /// Repositories in configuration order
    pub repositories: Vec<RepositoryConfig>,
    /// Local clones, shared with the rebaser
    pub workspaces: Arc<WorkspaceManager>,
    /// Decision engine over all repositories
    pub engine: Engine,
}

impl DaemonContext {
    /// Build the context from a configuration file
    ///
    /// Nothing touches the network or the disk besides reading the file;
    /// workspaces are prepared separately.
    pub fn new(config_path: &Path) -> Result<Self> {
        let config = load_config(config_path)?;
        let repositories = config.repositories()?;
        let settings = EngineSettings::from_config(&config)?;

        let services = repositories
            .iter()
            .map(create_platform_service)
            .collect::<Result<Vec<Box<dyn PlatformService>>>>()?;

        let workspaces = Arc::new(WorkspaceManager::new(
            config.workspace.clone(),
            config.commit_identity(),
            config.garbage_collection_countdown,
        ));
        let rebaser: Arc<dyn Rebaser> = Arc::new(GitRebaser::new(Arc::clone(&workspaces)));
        let engine = Engine::new(settings, rebaser, services);

        Ok(Self {
            config,
            repositories,
            workspaces,
            engine,
        })
    }
}
