//! rebazer: keeps pull requests rebased onto their target branch
//!
//! Polls GitHub, GitLab and Bitbucket repositories, rebases open pull requests
//! whose destination moved on, and merges them once they are green and
//! approved.
//!
//! # Architecture
//!
//! - [`platform`]: hosting services behind the [`platform::PlatformService`] trait
//! - [`tracking`]: recency cache of already evaluated pull requests
//! - [`workspace`]: persistent local clones and their cleanup
//! - [`rebase`]: one rebase attempt against a workspace
//! - [`engine`]: per-pull-request decisions and the polling loop
//! - [`config`]: configuration file loading

pub mod config;
pub mod engine;
pub mod error;
pub mod platform;
pub mod rebase;
pub mod tracking;
pub mod types;
pub mod workspace;

pub use error::{Error, Result};
