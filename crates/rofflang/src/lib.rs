//! # Rofflang: the input and macro-processing engine of a troff interpreter.
//!
//! Rofflang turns a stream of bytes into a stream of [tokens](token::Token),
//!     transparently expanding macros and strings, interpolating registers and
//!     macro arguments, and interpreting the escape character.
//!
//! The engine knows nothing about typesetting.
//! Requests are provided by the caller when the [VM](vm::VM) is created
//!     (the `rofflang-stdlib` crate provides the standard ones),
//!     formatting objects are opaque [nodes](node::Node),
//!     and the effects of formatting escapes are delegated to the
//!     [state](vm::RoffState) of the VM.

pub mod buffer;
pub mod color;
pub mod command;
pub mod error;
pub mod input;
pub mod node;
pub mod prelude;
pub mod token;
pub mod vm;

/// Module that re-exports all of the crate's traits.
///
/// This is useful for getting all of the traits in scope in a Rust module:
/// ```
/// use rofflang::traits::*;
/// ```
pub mod traits {
    pub use super::error::RoffError;
    pub use super::node::Node;
    pub use super::vm::HasComponent;
    pub use super::vm::RoffState;
}
