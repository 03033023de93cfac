//! Version-control collaborator for the build pipeline.
//!
//! Build requests name a Tasmota version (a release tag or a branch); the
//! orchestrator only cares that the checkout ends up on it. The trait seam
//! keeps the orchestrator testable without a real repository.

use anyhow::{Context, Result};
use colored::*;
use git2::Repository;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};

/// Puts the repository checkout on a requested firmware version.
pub trait BranchSwitcher {
    fn switch_to(&self, version: &str) -> Result<()>;
}

/// Production switcher backed by a local clone of the Tasmota repository.
pub struct GitSwitcher {
    root: PathBuf,
    url: String,
}

impl GitSwitcher {
    pub fn new(root: impl Into<PathBuf>, url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            url: url.into(),
        }
    }

    fn open_or_clone(&self) -> Result<Repository> {
        if self.root.exists() {
            return Repository::open(&self.root).with_context(|| {
                format!("Failed to open Tasmota checkout at {}", self.root.display())
            });
        }

        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.blue} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!("Cloning {}...", self.url));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        match Repository::clone(&self.url, &self.root) {
            Ok(repo) => {
                pb.finish_with_message(format!("{} Cloned {}", "✓".green(), self.url));
                Ok(repo)
            }
            Err(err) => {
                pb.finish_with_message(format!("{} Clone failed", "x".red()));
                Err(anyhow::anyhow!("Failed to clone {}: {}", self.url, err))
            }
        }
    }

    /// Resolve a version identifier: tag first, then local branch, then the
    /// remote-tracking branch.
    fn resolve(&self, repo: &Repository, version: &str) -> Option<(git2::Oid, String)> {
        let tag_ref = format!("refs/tags/{}", version);
        if let Ok(reference) = repo.find_reference(&tag_ref)
            && let Ok(commit) = reference.peel_to_commit()
        {
            return Some((commit.id(), format!("tag {}", version)));
        }

        if let Ok(branch) = repo.find_branch(version, git2::BranchType::Local)
            && let Ok(commit) = branch.get().peel_to_commit()
        {
            return Some((commit.id(), format!("branch {}", version)));
        }

        let remote_ref = format!("origin/{}", version);
        if let Ok(branch) = repo.find_branch(&remote_ref, git2::BranchType::Remote)
            && let Ok(commit) = branch.get().peel_to_commit()
        {
            return Some((commit.id(), format!("branch {}", remote_ref)));
        }

        None
    }
}

impl BranchSwitcher for GitSwitcher {
    fn switch_to(&self, version: &str) -> Result<()> {
        let repo = self.open_or_clone()?;

        // refresh the requested ref so freshly released tags resolve;
        // an offline fetch failure is fine as long as the ref resolves
        if let Ok(mut remote) = repo.find_remote("origin") {
            let _ = remote.fetch(&[version], None, None);
        }

        let (oid, target) = self.resolve(&repo, version).ok_or_else(|| {
            anyhow::anyhow!("'{}' is neither a tag nor a branch of {}", version, self.url)
        })?;

        repo.set_head_detached(oid)?;
        let obj = repo.find_object(oid, None)?;
        let mut checkout_opts = git2::build::CheckoutBuilder::new();
        checkout_opts.force();
        repo.checkout_tree(&obj, Some(&mut checkout_opts))
            .with_context(|| format!("Failed to checkout {}", target))?;

        println!("   {} Checked out {}", "📌".blue(), target);
        Ok(())
    }
}

/// Switcher for checkouts managed outside tasmoforge (CI images with a
/// pre-baked source tree). Verifies the path and leaves it untouched.
pub struct FixedCheckout {
    root: PathBuf,
}

impl FixedCheckout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl BranchSwitcher for FixedCheckout {
    fn switch_to(&self, _version: &str) -> Result<()> {
        if !Path::new(&self.root).join("platformio.ini").exists() {
            anyhow::bail!(
                "{} does not look like a Tasmota checkout (no platformio.ini)",
                self.root.display()
            );
        }
        Ok(())
    }
}
