//! Orchestrator providers and environment-based detection.

use crate::context::{BranchConfig, OrchestratorContext, PullRequestConfig, env_is_set};
use crate::error::OrchestratorError;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

pub mod azure;
pub mod generic;
pub mod github;
pub mod jenkins;

pub use azure::AzureDevOpsProvider;
pub use generic::GenericProvider;
pub use github::GitHubActionsProvider;
pub use jenkins::JenkinsProvider;

/// A supported CI orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Orchestrator {
    /// Azure DevOps pipelines
    #[serde(rename = "azure-devops")]
    AzureDevOps,
    /// GitHub Actions workflows
    #[serde(rename = "github-actions")]
    GitHubActions,
    /// Jenkins jobs
    Jenkins,
    /// Any other CI system that sets `CI`
    Generic,
}

/// Detection table, probed in order. A row matches when any of its markers
/// is set to a non-empty value.
const PROBES: &[(Orchestrator, &[&str])] = &[
    (Orchestrator::AzureDevOps, &["AZURE_HTTP_USER_AGENT"]),
    (Orchestrator::GitHubActions, &["GITHUB_ACTIONS", "GITHUB_ACTION"]),
    (Orchestrator::Jenkins, &["JENKINS_URL", "JENKINS_HOME"]),
    (Orchestrator::Generic, &["CI"]),
];

impl Orchestrator {
    /// First orchestrator whose markers are present in the environment.
    #[must_use]
    pub fn detect() -> Option<Self> {
        PROBES
            .iter()
            .find(|(_, markers)| markers.iter().any(|marker| env_is_set(marker)))
            .map(|(orchestrator, _)| *orchestrator)
    }

    /// Provider reading this orchestrator's environment.
    #[must_use]
    pub fn provider(self) -> Box<dyn OrchestratorProvider> {
        match self {
            Self::AzureDevOps => Box::new(AzureDevOpsProvider),
            Self::GitHubActions => Box::new(GitHubActionsProvider),
            Self::Jenkins => Box::new(JenkinsProvider),
            Self::Generic => Box::new(GenericProvider),
        }
    }

    /// Display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::AzureDevOps => "Azure DevOps",
            Self::GitHubActions => "GitHub Actions",
            Self::Jenkins => "Jenkins",
            Self::Generic => "generic CI",
        }
    }
}

impl fmt::Display for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Run context as exposed by one orchestrator.
///
/// Implementations read the process environment on every call; nothing is
/// cached.
pub trait OrchestratorProvider: Send + Sync {
    /// Which orchestrator this is.
    fn orchestrator(&self) -> Orchestrator;

    /// Branch of the current run.
    fn branch_config(&self) -> BranchConfig;

    /// Pull request of the current run. Fields are `n/a` outside pull requests.
    fn pull_request_config(&self) -> PullRequestConfig;

    /// Whether the current run was triggered by a pull request.
    fn is_pull_request(&self) -> bool;

    /// Commit being built.
    fn commit_sha(&self) -> String;

    /// Repository URL.
    fn repo_url(&self) -> String;

    /// URL of the current run.
    fn build_url(&self) -> String;

    /// Job or workflow name.
    fn job_name(&self) -> String;

    /// Snapshot of everything above.
    fn context(&self) -> OrchestratorContext {
        let pull_request = self
            .is_pull_request()
            .then(|| self.pull_request_config());
        OrchestratorContext {
            orchestrator: self.orchestrator(),
            branch: self.branch_config(),
            pull_request,
            commit_sha: self.commit_sha(),
            repo_url: self.repo_url(),
            build_url: self.build_url(),
            job_name: self.job_name(),
        }
    }
}

/// Provider for the orchestrator this process runs under.
///
/// # Errors
///
/// [`OrchestratorError::Unknown`] when no orchestrator marker is set.
pub fn detect_provider() -> Result<Box<dyn OrchestratorProvider>, OrchestratorError> {
    let orchestrator = Orchestrator::detect().ok_or(OrchestratorError::Unknown)?;
    debug!(orchestrator = %orchestrator, "Detected orchestrator");
    Ok(orchestrator.provider())
}

/// Environment variables that select an orchestrator, cleared together so
/// tests start from a known state.
#[cfg(test)]
pub(crate) const MARKERS: &[&str] = &[
    "AZURE_HTTP_USER_AGENT",
    "GITHUB_ACTIONS",
    "GITHUB_ACTION",
    "JENKINS_URL",
    "JENKINS_HOME",
    "CI",
];

#[cfg(test)]
mod tests {
    use super::*;

    fn with_markers<F: FnOnce()>(set: &[(&str, &str)], f: F) {
        let vars: Vec<(&str, Option<&str>)> = MARKERS
            .iter()
            .map(|marker| {
                let value = set.iter().find(|(name, _)| name == marker).map(|(_, v)| *v);
                (*marker, value)
            })
            .collect();
        temp_env::with_vars(vars, f);
    }

    #[test]
    fn test_nothing_detected() {
        with_markers(&[], || {
            assert!(Orchestrator::detect().is_none());
            let err = detect_provider().err().unwrap();
            assert!(matches!(err, OrchestratorError::Unknown));
        });
    }

    #[test]
    fn test_each_marker_detected() {
        let cases = [
            ("AZURE_HTTP_USER_AGENT", Orchestrator::AzureDevOps),
            ("GITHUB_ACTIONS", Orchestrator::GitHubActions),
            ("GITHUB_ACTION", Orchestrator::GitHubActions),
            ("JENKINS_URL", Orchestrator::Jenkins),
            ("JENKINS_HOME", Orchestrator::Jenkins),
            ("CI", Orchestrator::Generic),
        ];
        for (marker, expected) in cases {
            with_markers(&[(marker, "true")], || {
                assert_eq!(Orchestrator::detect(), Some(expected), "marker {marker}");
                assert_eq!(detect_provider().unwrap().orchestrator(), expected);
            });
        }
    }

    #[test]
    fn test_probe_order() {
        with_markers(&[("CI", "true"), ("JENKINS_URL", "https://jenkins.example"), ("GITHUB_ACTIONS", "true")], || {
            assert_eq!(Orchestrator::detect(), Some(Orchestrator::GitHubActions));
        });
        with_markers(&[("GITHUB_ACTIONS", "true"), ("AZURE_HTTP_USER_AGENT", "VSTS_agent")], || {
            assert_eq!(Orchestrator::detect(), Some(Orchestrator::AzureDevOps));
        });
        with_markers(&[("CI", "true"), ("JENKINS_HOME", "/var/jenkins")], || {
            assert_eq!(Orchestrator::detect(), Some(Orchestrator::Jenkins));
        });
    }

    #[test]
    fn test_empty_marker_ignored() {
        with_markers(&[("GITHUB_ACTIONS", ""), ("CI", "1")], || {
            assert_eq!(Orchestrator::detect(), Some(Orchestrator::Generic));
        });
    }

    #[test]
    fn test_orchestrator_serialized_names() {
        let json = serde_json::to_string(&Orchestrator::GitHubActions).unwrap();
        assert_eq!(json, "\"github-actions\"");
        assert_eq!(Orchestrator::AzureDevOps.to_string(), "Azure DevOps");
    }
}
