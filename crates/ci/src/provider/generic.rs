//! Fallback provider for unrecognised CI systems.

use super::{Orchestrator, OrchestratorProvider};
use crate::context::{BranchConfig, NOT_AVAILABLE, PullRequestConfig};

/// A CI system that only announces itself through `CI`.
///
/// Nothing beyond that marker is known, so every value is `n/a` and runs
/// never count as pull requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericProvider;

impl OrchestratorProvider for GenericProvider {
    fn orchestrator(&self) -> Orchestrator {
        Orchestrator::Generic
    }

    fn branch_config(&self) -> BranchConfig {
        BranchConfig::default()
    }

    fn pull_request_config(&self) -> PullRequestConfig {
        PullRequestConfig::default()
    }

    fn is_pull_request(&self) -> bool {
        false
    }

    fn commit_sha(&self) -> String {
        NOT_AVAILABLE.to_string()
    }

    fn repo_url(&self) -> String {
        NOT_AVAILABLE.to_string()
    }

    fn build_url(&self) -> String {
        NOT_AVAILABLE.to_string()
    }

    fn job_name(&self) -> String {
        NOT_AVAILABLE.to_string()
    }
}
