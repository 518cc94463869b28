//! Azure DevOps provider.

use super::{Orchestrator, OrchestratorProvider};
use crate::context::{BranchConfig, PullRequestConfig, env_or, env_or_na};

/// Azure DevOps pipelines.
#[derive(Debug, Clone, Copy, Default)]
pub struct AzureDevOpsProvider;

const HEADS_PREFIX: &str = "refs/heads/";

impl OrchestratorProvider for AzureDevOpsProvider {
    fn orchestrator(&self) -> Orchestrator {
        Orchestrator::AzureDevOps
    }

    fn branch_config(&self) -> BranchConfig {
        let git_reference = env_or_na("BUILD_SOURCEBRANCH");
        let branch = git_reference
            .strip_prefix(HEADS_PREFIX)
            .unwrap_or(&git_reference)
            .to_string();
        BranchConfig {
            branch,
            git_reference,
        }
    }

    fn pull_request_config(&self) -> PullRequestConfig {
        // Pull requests with an internal id carry the visible number separately.
        // Once set, the number wins even when empty.
        let key = std::env::var("SYSTEM_PULLREQUEST_PULLREQUESTNUMBER")
            .unwrap_or_else(|_| env_or_na("SYSTEM_PULLREQUEST_PULLREQUESTID"));
        PullRequestConfig {
            branch: env_or("SYSTEM_PULLREQUEST_SOURCEBRANCH", ""),
            base: env_or("SYSTEM_PULLREQUEST_TARGETBRANCH", ""),
            key,
        }
    }

    fn is_pull_request(&self) -> bool {
        env_or_na("BUILD_REASON") == "PullRequest"
    }

    fn commit_sha(&self) -> String {
        env_or_na("BUILD_SOURCEVERSION")
    }

    fn repo_url(&self) -> String {
        env_or_na("BUILD_REPOSITORY_URI")
    }

    fn build_url(&self) -> String {
        let collection = env_or("SYSTEM_TEAMFOUNDATIONCOLLECTIONURI", "");
        let project = env_or("SYSTEM_TEAMPROJECT", "");
        let build_id = env_or_na("BUILD_BUILDID");
        format!("{collection}{project}/_build/results?buildId={build_id}")
    }

    fn job_name(&self) -> String {
        env_or_na("BUILD_REPOSITORY_NAME")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_branch_strips_heads_prefix() {
        temp_env::with_var("BUILD_SOURCEBRANCH", Some("refs/heads/feature/login"), || {
            let branch = AzureDevOpsProvider.branch_config();
            assert_eq!(branch.branch, "feature/login");
            assert_eq!(branch.git_reference, "refs/heads/feature/login");
        });
    }

    #[test]
    fn test_branch_unset() {
        temp_env::with_var_unset("BUILD_SOURCEBRANCH", || {
            let branch = AzureDevOpsProvider.branch_config();
            assert_eq!(branch.branch, "n/a");
            assert_eq!(branch.git_reference, "n/a");
        });
    }

    #[test]
    fn test_pull_request_number_overrides_id() {
        temp_env::with_vars(
            [
                ("BUILD_REASON", Some("PullRequest")),
                ("SYSTEM_PULLREQUEST_SOURCEBRANCH", Some("refs/heads/feat")),
                ("SYSTEM_PULLREQUEST_TARGETBRANCH", Some("refs/heads/main")),
                ("SYSTEM_PULLREQUEST_PULLREQUESTID", Some("123456789")),
                ("SYSTEM_PULLREQUEST_PULLREQUESTNUMBER", Some("42")),
            ],
            || {
                assert!(AzureDevOpsProvider.is_pull_request());
                let pr = AzureDevOpsProvider.pull_request_config();
                assert_eq!(pr.branch, "refs/heads/feat");
                assert_eq!(pr.base, "refs/heads/main");
                assert_eq!(pr.key, "42");
            },
        );
    }

    #[test]
    fn test_pull_request_id_fallback() {
        temp_env::with_vars(
            [
                ("SYSTEM_PULLREQUEST_PULLREQUESTID", Some("77")),
                ("SYSTEM_PULLREQUEST_PULLREQUESTNUMBER", None),
            ],
            || assert_eq!(AzureDevOpsProvider.pull_request_config().key, "77"),
        );
    }

    #[test]
    fn test_empty_pull_request_number_overrides_id() {
        temp_env::with_vars(
            [
                ("SYSTEM_PULLREQUEST_PULLREQUESTID", Some("77")),
                ("SYSTEM_PULLREQUEST_PULLREQUESTNUMBER", Some("")),
            ],
            || assert_eq!(AzureDevOpsProvider.pull_request_config().key, ""),
        );
    }

    #[test]
    fn test_manual_run_is_not_pull_request() {
        temp_env::with_var("BUILD_REASON", Some("Manual"), || {
            assert!(!AzureDevOpsProvider.is_pull_request());
        });
        temp_env::with_var_unset("BUILD_REASON", || {
            assert!(!AzureDevOpsProvider.is_pull_request());
        });
    }

    #[test]
    fn test_build_url() {
        temp_env::with_vars(
            [
                ("SYSTEM_TEAMFOUNDATIONCOLLECTIONURI", Some("https://dev.azure.com/acme/")),
                ("SYSTEM_TEAMPROJECT", Some("widgets")),
                ("BUILD_BUILDID", Some("991")),
            ],
            || {
                assert_eq!(
                    AzureDevOpsProvider.build_url(),
                    "https://dev.azure.com/acme/widgets/_build/results?buildId=991"
                );
            },
        );
    }
}
