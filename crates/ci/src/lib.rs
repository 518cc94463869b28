//! CI orchestrator context for pipeline steps.
//!
//! Detects which orchestrator the process runs under by probing marker
//! environment variables (Azure DevOps, then GitHub Actions, then Jenkins,
//! then any system setting `CI`) and exposes branch and pull request details
//! through [`OrchestratorProvider`].
//!
//! ```no_run
//! let provider = stepvault_ci::detect_provider()?;
//! if provider.is_pull_request() {
//!     let pr = provider.pull_request_config();
//!     println!("pull request {} into {}", pr.key, pr.base);
//! }
//! # Ok::<(), stepvault_ci::OrchestratorError>(())
//! ```

pub mod context;
pub mod error;
pub mod provider;

pub use context::{BranchConfig, NOT_AVAILABLE, OrchestratorContext, PullRequestConfig};
pub use error::OrchestratorError;
pub use provider::{
    AzureDevOpsProvider, GenericProvider, GitHubActionsProvider, JenkinsProvider, Orchestrator,
    OrchestratorProvider, detect_provider,
};
