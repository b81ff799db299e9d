//! Top-level error taxonomy returned by the control surface (§7).

use thiserror::Error;

/// Every error the host-side control surface can return. Carries a kind
/// (the variant itself), a human-readable message (the `Display` impl),
/// and for the wrapped variants, the opaque detail from the layer that
/// raised it.
#[derive(Debug, Error)]
pub enum ReactCheckError {
    #[error("configuration is invalid: {0}")]
    ConfigInvalid(String),

    #[error("configuration file not found: {0}")]
    ConfigNotFound(String),

    #[error("connection to the probe failed: {0}")]
    ConnectionFailed(String),

    #[error("probe has not sent a ready message yet")]
    ProbeNotReady,

    #[error("failed to launch the browser session: {0}")]
    LaunchFailed(String),

    #[error("transport error: {0}")]
    TransportError(#[from] reactcheck_protocol::ProtocolError),

    #[error("analysis engine error: {0}")]
    Core(#[from] reactcheck_core::CoreError),

    #[error("failed to write session report: {0}")]
    ReportWriteFailed(#[from] std::io::Error),

    #[error("invalid target URL: {0}")]
    InvalidURL(String),

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("unknown error: {0}")]
    Unknown(String),
}

/// Exit codes returned to the CLI layer (§6.4). Informative only; this
/// crate never calls `std::process::exit` itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Success, no critical issues found.
    Success = 0,
    /// Success, but at least one component reached `critical` severity.
    SuccessWithCritical = 1,
    ConfigError = 2,
    ConnectionError = 3,
}

impl ExitCode {
    pub fn from_report(report: &reactcheck_core::SessionReport) -> Self {
        if report.summary.critical_count > 0 {
            ExitCode::SuccessWithCritical
        } else {
            ExitCode::Success
        }
    }
}

impl From<&ReactCheckError> for ExitCode {
    fn from(error: &ReactCheckError) -> Self {
        match error {
            ReactCheckError::ConfigInvalid(_) | ReactCheckError::ConfigNotFound(_) => {
                ExitCode::ConfigError
            }
            ReactCheckError::ConnectionFailed(_)
            | ReactCheckError::ProbeNotReady
            | ReactCheckError::LaunchFailed(_)
            | ReactCheckError::TransportError(_)
            | ReactCheckError::Timeout(_) => ExitCode::ConnectionError,
            ReactCheckError::Core(_)
            | ReactCheckError::ReportWriteFailed(_)
            | ReactCheckError::InvalidURL(_)
            | ReactCheckError::Unknown(_) => ExitCode::ConfigError,
        }
    }
}
