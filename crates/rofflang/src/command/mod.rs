//! Rofflang commands API
//!
//! A *command* is anything a control line or an interpolation escape can name.
//! Commands come in two kinds:
//!
//! - *Requests* are built in: they are Rust functions provided when the VM is created,
//!     like `.de` or `.nr`.
//!
//! - *Macros* are user defined.
//!     A macro is an [ElementBuffer] and is created by requests like `.de` and `.ds`.
//!     Strings and macros have the same representation;
//!     the only difference is how they are typically used.
//!
//! When a request runs, the current token of the VM is the token immediately
//!     after the request name.
//! The request reads its arguments from the input itself,
//!     and is responsible for consuming the rest of the line,
//!     typically with [skip_line](vm::ExecutionInput::skip_line).

use crate::buffer::ElementBuffer;
use crate::prelude as rl;
use crate::token::Name;
use crate::vm;

pub(crate) mod map;

pub use map::InvalidAlias;
pub use map::Map;

/// The Rust type of request functions.
///
/// The name is the name the request was invoked with, which may be an alias.
pub type RequestFn<S> = fn(name: Name, input: &mut vm::ExecutionInput<S>) -> rl::Result<()>;

/// A command.
pub enum Command<S> {
    /// A request that is implemented in the engine or the standard library.
    BuiltIn(RequestFn<S>),

    /// A user defined macro or string.
    Macro(ElementBuffer),
}

impl<S> Command<S> {
    /// Returns the macro if this command is a macro.
    pub fn as_macro(&self) -> Option<&ElementBuffer> {
        match self {
            Command::BuiltIn(_) => None,
            Command::Macro(buffer) => Some(buffer),
        }
    }
}

impl<S> std::fmt::Display for Command<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::BuiltIn(_) => write![f, "a request"],
            Command::Macro(_) => write![f, "a macro"],
        }
    }
}

// We need to implement Clone manually as the derived implementation requires S to be Clone.
impl<S> Clone for Command<S> {
    fn clone(&self) -> Self {
        match self {
            Command::BuiltIn(f) => Command::BuiltIn(*f),
            Command::Macro(buffer) => Command::Macro(buffer.clone()),
        }
    }
}

/// A built-in command. This is a command provided at VM initialization.
///
/// This struct is simply a combination of a [Command] and a documentation string for the command.
pub struct BuiltIn<S> {
    cmd: Command<S>,
    doc: Option<&'static str>,
}

impl<S> BuiltIn<S> {
    /// Create a new request built-in command.
    pub fn new_request(t: RequestFn<S>) -> BuiltIn<S> {
        t.into()
    }

    /// Create a built-in macro, like a string provided by the engine.
    pub fn new_macro(buffer: ElementBuffer) -> BuiltIn<S> {
        Command::Macro(buffer).into()
    }

    // Set the doc for this built-in command.
    pub fn with_doc(mut self, doc: &'static str) -> BuiltIn<S> {
        self.doc = Some(doc);
        self
    }

    pub fn cmd(&self) -> &Command<S> {
        &self.cmd
    }

    pub fn doc(&self) -> Option<&'static str> {
        self.doc
    }
}

// We need to implement Clone manually as the derived implementation requires S to be Clone.
impl<S> Clone for BuiltIn<S> {
    fn clone(&self) -> Self {
        Self {
            cmd: self.cmd.clone(),
            doc: self.doc,
        }
    }
}

impl<S> From<RequestFn<S>> for BuiltIn<S> {
    fn from(cmd: RequestFn<S>) -> Self {
        Command::BuiltIn(cmd).into()
    }
}

impl<S> From<Command<S>> for BuiltIn<S> {
    fn from(cmd: Command<S>) -> Self {
        BuiltIn { cmd, doc: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: Name, _: &mut vm::ExecutionInput<()>) -> rl::Result<()> {
        Ok(())
    }

    #[test]
    fn func_size() {
        assert!(std::mem::size_of::<Command<()>>() <= 48);
    }

    #[test]
    fn built_in_doc() {
        let built_in = BuiltIn::<()>::new_request(noop).with_doc("does nothing");
        assert_eq!(built_in.doc(), Some("does nothing"));
        assert!(built_in.cmd().as_macro().is_none());
        assert_eq!(built_in.cmd().to_string(), "a request");
    }
}
