//! Bare git remotes on disk for end-to-end tests

use rebazer::types::{Credentials, Platform, RepositoryConfig};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// Temporary bare remote `acme/<name>.git` with a seed clone to push from
pub struct TempRemote {
    temp: TempDir,
    bare: PathBuf,
    seed: PathBuf,
    /// Repository configured against the remote through `file://`
    pub repo: RepositoryConfig,
}

fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .env("GIT_CONFIG_GLOBAL", "/dev/null")
        .output()
        .expect("failed to run git");
    assert!(
        output.status.success(),
        "git {} failed: {}",
        args.join(" "),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

impl TempRemote {
    /// Remote whose `main` holds a single commit
    pub fn new(name: &str) -> Self {
        let temp = TempDir::new().expect("failed to create temp dir");
        let remotes = temp.path().join("remotes");
        let bare = remotes.join("acme").join(format!("{name}.git"));
        fs::create_dir_all(&bare).unwrap();
        git(&bare, &["init", "--bare", "--quiet"]);
        git(&bare, &["symbolic-ref", "HEAD", "refs/heads/main"]);

        let seed = temp.path().join("seed");
        fs::create_dir_all(&seed).unwrap();
        git(&seed, &["init", "--quiet"]);
        git(&seed, &["config", "user.email", "dev@example.com"]);
        git(&seed, &["config", "user.name", "Dev"]);
        fs::write(seed.join("README.md"), "# Widgets\n").unwrap();
        git(&seed, &["add", "."]);
        git(&seed, &["commit", "--quiet", "-m", "Initial commit"]);
        git(&seed, &["remote", "add", "origin", bare.to_str().unwrap()]);
        git(&seed, &["push", "--quiet", "origin", "HEAD:refs/heads/main"]);

        let repo = RepositoryConfig {
            platform: Platform::Bitbucket,
            api_host: "http://127.0.0.1:1".to_string(),
            git_host: format!("file://{}/", remotes.display()),
            team: "acme".to_string(),
            name: name.to_string(),
            credentials: Credentials {
                user: "bot".to_string(),
                secret: "unused".to_string(),
            },
            main_branch: "main".to_string(),
        };

        Self {
            temp,
            bare,
            seed,
            repo,
        }
    }

    /// Directory the daemon may use for its workspaces
    pub fn workspace_root(&self) -> PathBuf {
        self.temp.path().join("workspaces")
    }

    /// Commit `file` on `branch`, starting from `base`, and push it
    pub fn commit(&self, branch: &str, base: &str, file: &str, content: &str) {
        git(&self.seed, &["fetch", "--quiet", "origin"]);
        git(&self.seed, &["checkout", "--quiet", "-B", branch, base]);
        fs::write(self.seed.join(file), content).unwrap();
        git(&self.seed, &["add", "."]);
        git(&self.seed, &["commit", "--quiet", "-m", &format!("Update {file}")]);
        git(
            &self.seed,
            &["push", "--quiet", "--force", "origin", &format!("HEAD:refs/heads/{branch}")],
        );
    }

    /// Commit a branch of the remote points at
    pub fn head_of(&self, branch: &str) -> String {
        git(&self.bare, &["rev-parse", &format!("refs/heads/{branch}")])
    }

    /// Whether `ancestor` is reachable from `descendant` on the remote
    pub fn contains(&self, descendant: &str, ancestor: &str) -> bool {
        Command::new("git")
            .args(["merge-base", "--is-ancestor", ancestor, descendant])
            .current_dir(&self.bare)
            .status()
            .expect("failed to run git")
            .success()
    }
}
