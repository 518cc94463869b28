//! Jenkins provider.

use super::{Orchestrator, OrchestratorProvider};
use crate::context::{BranchConfig, NOT_AVAILABLE, PullRequestConfig, env_is_set, env_or_na};

/// Jenkins jobs. Branch and commit data needs the git plugin.
#[derive(Debug, Clone, Copy, Default)]
pub struct JenkinsProvider;

impl JenkinsProvider {
    /// Full reference for a multibranch `BRANCH_NAME`.
    ///
    /// `PR-42` becomes `refs/pull/42/head`, plain names get `refs/heads/`.
    fn git_reference(branch: &str) -> String {
        if branch == NOT_AVAILABLE || branch.starts_with("refs/") {
            return branch.to_string();
        }
        if let Some(number) = branch.strip_prefix("PR-") {
            let number = number.split('-').next().unwrap_or(number);
            return format!("refs/pull/{number}/head");
        }
        format!("refs/heads/{branch}")
    }
}

impl OrchestratorProvider for JenkinsProvider {
    fn orchestrator(&self) -> Orchestrator {
        Orchestrator::Jenkins
    }

    fn branch_config(&self) -> BranchConfig {
        let branch = env_or_na("BRANCH_NAME");
        BranchConfig {
            git_reference: Self::git_reference(&branch),
            branch,
        }
    }

    fn pull_request_config(&self) -> PullRequestConfig {
        PullRequestConfig {
            branch: env_or_na("CHANGE_BRANCH"),
            base: env_or_na("CHANGE_TARGET"),
            key: env_or_na("CHANGE_ID"),
        }
    }

    fn is_pull_request(&self) -> bool {
        env_is_set("CHANGE_ID")
    }

    fn commit_sha(&self) -> String {
        env_or_na("GIT_COMMIT")
    }

    fn repo_url(&self) -> String {
        env_or_na("GIT_URL")
    }

    fn build_url(&self) -> String {
        env_or_na("BUILD_URL")
    }

    fn job_name(&self) -> String {
        env_or_na("JOB_NAME")
    }
}
