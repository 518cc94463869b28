//! Orchestrator detection errors.

use miette::Diagnostic;
use thiserror::Error;

/// Errors from orchestrator detection.
#[derive(Debug, Error, Diagnostic)]
pub enum OrchestratorError {
    /// None of the known orchestrator markers is set.
    #[error("unable to detect a supported orchestrator (Azure DevOps, GitHub Actions, Jenkins, generic CI)")]
    #[diagnostic(
        code(stepvault::ci::orchestrator_unknown),
        help("Set CI=true to run with a generic CI context")
    )]
    Unknown,
}
