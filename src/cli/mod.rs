//! Command-line front end of the daemon

mod context;
mod daemon;

pub use daemon::{DaemonOptions, run_daemon};
