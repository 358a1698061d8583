//! Rofflang prelude.

/// Result type in Rofflang.
///
/// The error case is a fatal error that stops the VM.
pub type Result<T> = std::result::Result<T, Box<crate::error::Error>>;
