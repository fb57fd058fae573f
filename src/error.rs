//! Stable machine-readable codes for user-facing errors.

/// Errors that carry a stable code alongside their display message.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    /// Whether trying the same action again later may succeed.
    fn retryable(&self) -> bool {
        false
    }
}
