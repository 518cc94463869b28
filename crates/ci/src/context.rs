//! Branch, pull request and run context types.

use crate::provider::Orchestrator;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Placeholder for a value the orchestrator did not provide.
pub const NOT_AVAILABLE: &str = "n/a";

/// Branch the pipeline runs on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchConfig {
    /// Short branch name (e.g., "main").
    pub branch: String,
    /// Full git reference (e.g., "refs/heads/main", "refs/pull/42/head").
    pub git_reference: String,
}

impl Default for BranchConfig {
    fn default() -> Self {
        Self {
            branch: NOT_AVAILABLE.to_string(),
            git_reference: NOT_AVAILABLE.to_string(),
        }
    }
}

impl fmt::Display for BranchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.branch, self.git_reference)
    }
}

/// Pull request the pipeline was triggered for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestConfig {
    /// Source branch of the pull request.
    pub branch: String,
    /// Target branch of the pull request.
    pub base: String,
    /// Pull request number or id.
    pub key: String,
}

impl Default for PullRequestConfig {
    fn default() -> Self {
        Self {
            branch: NOT_AVAILABLE.to_string(),
            base: NOT_AVAILABLE.to_string(),
            key: NOT_AVAILABLE.to_string(),
        }
    }
}

impl fmt::Display for PullRequestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {} -> {}", self.key, self.branch, self.base)
    }
}

/// Everything a step needs to know about the run it is part of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorContext {
    /// Detected orchestrator.
    pub orchestrator: Orchestrator,
    /// Branch of the run.
    pub branch: BranchConfig,
    /// Pull request, when the run was triggered by one.
    pub pull_request: Option<PullRequestConfig>,
    /// Commit being built.
    pub commit_sha: String,
    /// Repository URL.
    pub repo_url: String,
    /// URL of this run.
    pub build_url: String,
    /// Job or workflow name.
    pub job_name: String,
}

impl fmt::Display for OrchestratorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on {} ({})",
            self.orchestrator,
            self.branch,
            self.commit_sha.get(..7).unwrap_or(&self.commit_sha)
        )?;
        if let Some(pr) = &self.pull_request {
            write!(f, " for pull request {pr}")?;
        }
        Ok(())
    }
}

/// Value of `name`, or [`NOT_AVAILABLE`] when unset or empty.
pub(crate) fn env_or_na(name: &str) -> String {
    env_or(name, NOT_AVAILABLE)
}

pub(crate) fn env_or(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Whether `name` is set to a non-empty value.
pub(crate) fn env_is_set(name: &str) -> bool {
    std::env::var_os(name).is_some_and(|v| !v.is_empty())
}
