use thiserror::Error;

/// Error taxonomy for the monitoring and mitigation engine.
///
/// Samplers never propagate these as process-fatal; they degrade their
/// domain's health record instead. Blocker operations return them directly
/// to the caller. Permission-shaped failures are handled inside the tool
/// invoker (one elevated retry) and surface here as `ToolExecutionFailed`
/// when the retry also fails.
#[derive(Debug, Error)]
pub enum DetectorError {
    /// No acceptable external tool was found for an operation. Never
    /// retried internally.
    #[error("no supported tool available for {0}")]
    ToolUnavailable(&'static str),

    /// A tool ran but exited non-zero, timed out, or could not be spawned.
    #[error("{tool} failed: {message}")]
    ToolExecutionFailed { tool: String, message: String },

    /// Block/unblock attempted against an address already in that state.
    #[error("state conflict: {0}")]
    StateConflict(String),

    /// Tool output did not match an expected textual shape.
    #[error("unparsable tool output: {0}")]
    Parse(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DetectorError {
    pub fn tool_failed(tool: impl Into<String>, message: impl Into<String>) -> Self {
        DetectorError::ToolExecutionFailed {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn is_state_conflict(&self) -> bool {
        matches!(self, DetectorError::StateConflict(_))
    }
}

pub type Result<T> = std::result::Result<T, DetectorError>;
