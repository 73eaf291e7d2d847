//! Local bare remotes for git-backed tests

use super::{run_git_stdout, run_git_sync};
use crate::types::{CommitIdentity, Credentials, Platform, RepositoryConfig};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// A bare `acme/widgets.git` remote seeded with one commit on `main`
pub struct TestRemote {
    temp: TempDir,
    /// Repository pointing at the bare remote through a `file://` URL
    pub repo: RepositoryConfig,
    seed: PathBuf,
}

impl TestRemote {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let remotes = temp.path().join("remotes");
        let bare = remotes.join("acme").join("widgets.git");
        fs::create_dir_all(&bare).unwrap();
        run_git_sync(&bare, &["init", "--bare", "--quiet"]).unwrap();
        run_git_sync(&bare, &["symbolic-ref", "HEAD", "refs/heads/main"]).unwrap();

        let seed = temp.path().join("seed");
        fs::create_dir_all(&seed).unwrap();
        run_git_sync(&seed, &["init", "--quiet"]).unwrap();
        run_git_sync(&seed, &["config", "user.email", "test@test.com"]).unwrap();
        run_git_sync(&seed, &["config", "user.name", "Test"]).unwrap();
        fs::write(seed.join("README.md"), "# Test\n").unwrap();
        fs::write(seed.join("shared.txt"), "base\n").unwrap();
        run_git_sync(&seed, &["add", "."]).unwrap();
        run_git_sync(&seed, &["commit", "--quiet", "-m", "Initial commit"]).unwrap();
        run_git_sync(&seed, &["remote", "add", "origin", bare.to_str().unwrap()]).unwrap();
        run_git_sync(&seed, &["push", "--quiet", "origin", "HEAD:refs/heads/main"]).unwrap();

        let repo = RepositoryConfig {
            platform: Platform::GitHub,
            api_host: "http://127.0.0.1:1".to_string(),
            git_host: format!("file://{}/", remotes.display()),
            team: "acme".to_string(),
            name: "widgets".to_string(),
            credentials: Credentials {
                user: "bot".to_string(),
                secret: "unused".to_string(),
            },
            main_branch: "main".to_string(),
        };

        Self { temp, repo, seed }
    }

    /// Root directory for workspaces, separate from the remote
    pub fn workspace_root(&self) -> PathBuf {
        self.temp.path().join("workspaces")
    }

    pub fn identity(&self) -> CommitIdentity {
        CommitIdentity::default()
    }

    fn commit_on(&self, branch: &str, base: &str, file: &str, content: &str) {
        let seed = &self.seed;
        run_git_sync(seed, &["fetch", "--quiet", "origin"]).unwrap();
        run_git_sync(seed, &["checkout", "--quiet", "-B", branch, base]).unwrap();
        fs::write(seed.join(file), content).unwrap();
        run_git_sync(seed, &["add", "."]).unwrap();
        run_git_sync(seed, &["commit", "--quiet", "-m", &format!("Change {file}")]).unwrap();
        run_git_sync(
            seed,
            &["push", "--quiet", "--force", "origin", &format!("HEAD:refs/heads/{branch}")],
        )
        .unwrap();
    }

    /// Push a new branch forked from the current `main` with one commit
    pub fn push_branch(&self, branch: &str, file: &str, content: &str) {
        self.commit_on(branch, "origin/main", file, content);
    }

    /// Advance `main` on the remote with one commit
    pub fn advance_main(&self, file: &str, content: &str) {
        self.commit_on("main", "origin/main", file, content);
    }

    pub fn delete_branch(&self, branch: &str) {
        run_git_sync(&self.seed, &["push", "--quiet", "origin", "--delete", branch]).unwrap();
    }

    /// Commit a remote branch points at
    pub fn head_of(&self, branch: &str) -> String {
        run_git_stdout(&self.bare(), &["rev-parse", &format!("refs/heads/{branch}")]).unwrap()
    }

    fn bare(&self) -> PathBuf {
        self.temp.path().join("remotes").join("acme").join("widgets.git")
    }
}
