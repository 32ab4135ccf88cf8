use thiserror::Error;

const GENERIC_DETAIL: &str = "no error reported by the runtime";

/// Errors surfaced by the runtime bridge.
///
/// Both variants optionally carry the message drained from the native
/// engine's error buffer; when nothing was pending the display falls back to
/// a generic, non-empty message. Policy for what happens after a failure
/// belongs to the active error handler, never to the bridge itself.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to instantiate component: {}", .0.as_deref().unwrap_or(GENERIC_DETAIL))]
    Instantiation(Option<String>),

    #[error("failed to call `{module}#{function}`: {}", .detail.as_deref().unwrap_or(GENERIC_DETAIL))]
    Invocation {
        module: String,
        function: String,
        detail: Option<String>,
    },
}

impl Error {
    /// The message drained from the native error buffer, if one was pending.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Error::Instantiation(detail) => detail.as_deref(),
            Error::Invocation { detail, .. } => detail.as_deref(),
        }
    }
}
