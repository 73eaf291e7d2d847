//! Daemon command - prepare workspaces, then poll until stopped

use crate::cli::context::DaemonContext;
use rebazer::engine::Action;
use rebazer::error::{Error, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Options for the daemon command
#[derive(Debug, Clone, Copy, Default)]
pub struct DaemonOptions {
    /// Run a single pass and exit
    pub once: bool,
}

/// Run the daemon
pub async fn run_daemon(config_path: &Path, options: DaemonOptions) -> Result<()> {
    let mut ctx = DaemonContext::new(config_path)?;
    info!(
        repositories = ctx.repositories.len(),
        workspace = %ctx.config.workspace.display(),
        poll_interval = ctx.config.poll_interval,
        "starting rebazer"
    );

    // Clones can take a while; failures are logged and retried lazily
    let workspaces = Arc::clone(&ctx.workspaces);
    let repositories = ctx.repositories.clone();
    tokio::task::spawn_blocking(move || workspaces.prepare_all(&repositories))
        .await
        .map_err(|e| Error::Internal(format!("workspace preparation task failed: {e}")))?;

    if options.once {
        let summary = ctx.engine.poll_once().await;
        info!(
            merged = summary.count(Action::Merged),
            rebased = summary.count(Action::Rebased),
            failures = summary.failures(),
            "single pass finished"
        );
        return Ok(());
    }

    ctx.engine.run(ctx.config.poll_interval()).await
}
