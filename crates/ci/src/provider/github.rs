//! GitHub Actions provider.

use super::{Orchestrator, OrchestratorProvider};
use crate::context::{BranchConfig, NOT_AVAILABLE, PullRequestConfig, env_is_set, env_or_na};

/// GitHub Actions workflows.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitHubActionsProvider;

impl GitHubActionsProvider {
    /// Pull request number from a `refs/pull/{n}/merge` reference.
    fn pull_request_key(git_reference: &str) -> String {
        git_reference
            .strip_prefix("refs/pull/")
            .map_or(git_reference, |rest| rest.strip_suffix("/merge").unwrap_or(rest))
            .to_string()
    }
}

impl OrchestratorProvider for GitHubActionsProvider {
    fn orchestrator(&self) -> Orchestrator {
        Orchestrator::GitHubActions
    }

    fn branch_config(&self) -> BranchConfig {
        BranchConfig {
            branch: env_or_na("GITHUB_REF_NAME"),
            git_reference: env_or_na("GITHUB_REF"),
        }
    }

    fn pull_request_config(&self) -> PullRequestConfig {
        PullRequestConfig {
            branch: env_or_na("GITHUB_HEAD_REF"),
            base: env_or_na("GITHUB_BASE_REF"),
            key: Self::pull_request_key(&env_or_na("GITHUB_REF")),
        }
    }

    fn is_pull_request(&self) -> bool {
        env_is_set("GITHUB_HEAD_REF")
    }

    fn commit_sha(&self) -> String {
        env_or_na("GITHUB_SHA")
    }

    fn repo_url(&self) -> String {
        format!(
            "{}/{}",
            env_or_na("GITHUB_SERVER_URL"),
            env_or_na("GITHUB_REPOSITORY")
        )
    }

    fn build_url(&self) -> String {
        let run_id = env_or_na("GITHUB_RUN_ID");
        if run_id == NOT_AVAILABLE {
            return run_id;
        }
        format!("{}/actions/runs/{run_id}", self.repo_url())
    }

    fn job_name(&self) -> String {
        env_or_na("GITHUB_WORKFLOW")
    }
}
