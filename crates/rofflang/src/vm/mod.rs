//! The Rofflang virtual machine (VM).
//!
//! This module contains the definition of the runtime VM,
//!     the input type that wraps the VM when requests run,
//!     and the main loop that is used to run Rofflang.
//!
//! The VM owns the input stack, the request table and the current token.
//! The tokenizer, copy mode and macro invocation are implemented as methods
//!     on the VM in the submodules of this module.

use crate::buffer::ElementBuffer;
use crate::command;
use crate::command::BuiltIn;
use crate::error;
use crate::error::{Category, Diagnostic, Severity, WarningMask};
use crate::input::{FileSource, InputSource, InputStack, LexContext};
use crate::node::{EscapeNode, NodeHandle};
use crate::prelude as rl;
use crate::token;
use crate::token::{Name, NameInterner, Token};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

mod copymode;
mod invoke;
mod streams;
#[cfg(test)]
mod tests;
mod tokenizer;

pub use invoke::{Calling, Compatibility, DefineMode};
pub use streams::*;

/// Configuration of a VM.
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum depth of the input stack.
    /// Exceeding the limit is a fatal error.
    pub input_stack_limit: usize,
    pub warning_mask: WarningMask,
    pub compatible: bool,
    pub escape_char: Option<u8>,
    /// Whether errors are suppressed.
    pub inhibit_errors: bool,
    /// Whether a backtrace of the input stack is attached to every diagnostic.
    pub backtrace: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            input_stack_limit: 1000,
            warning_mask: WarningMask::default(),
            compatible: false,
            escape_char: Some(b'\\'),
            inhibit_errors: false,
            backtrace: false,
        }
    }
}

/// A change to the formatting state requested by an escape.
///
/// The argument of the escape is provided as text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FormattingChange {
    /// `\f`
    Font(String),
    /// `\F`
    Family(String),
    /// `\m`
    GlyphColor(String),
    /// `\M`
    FillColor(String),
    /// `\s`
    Size(String),
    /// `\H`
    CharHeight(String),
    /// `\S`
    CharSlant(String),
}

/// Implementations of this trait determine how the VM handles tokens that are not requests.
///
/// The main loop of the VM reads the next token and performs
///     some action based on the token.
/// Control lines are handled automatically: the request or macro is invoked.
/// Every other token is passed to the [token_handler](Handlers::token_handler),
///     with the exception of `\!` at the start of a line,
///     in which case the rest of the line is read in copy mode and passed to the
///     [transparent_handler](Handlers::transparent_handler).
pub trait Handlers<S: RoffState> {
    /// Handler to invoke for tokens that are not part of a control line.
    fn token_handler(token: Token, input: &mut ExecutionInput<S>) -> rl::Result<()> {
        _ = (token, input);
        Ok(())
    }

    /// Handler to invoke for a line of transparent input.
    ///
    /// The line includes its terminating newline.
    fn transparent_handler(line: ElementBuffer, input: &mut ExecutionInput<S>) -> rl::Result<()> {
        _ = (line, input);
        Ok(())
    }
}

pub struct DefaultHandlers;

impl<S: RoffState> Handlers<S> for DefaultHandlers {}

type TokenHandlerFn<S> = fn(Token, &mut ExecutionInput<S>) -> rl::Result<()>;
type TransparentHandlerFn<S> = fn(ElementBuffer, &mut ExecutionInput<S>) -> rl::Result<()>;

struct HandlerFns<S> {
    token: TokenHandlerFn<S>,
    transparent: TransparentHandlerFn<S>,
}

// We need to implement Clone manually as the derived implementation requires S to be Clone.
impl<S> Clone for HandlerFns<S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for HandlerFns<S> {}

impl<S: RoffState> HandlerFns<S> {
    fn new<H: Handlers<S>>() -> Self {
        HandlerFns {
            token: H::token_handler,
            transparent: H::transparent_handler,
        }
    }
}

impl<S: RoffState> VM<S> {
    /// Run the VM.
    ///
    /// It is assumed that the VM has been preloaded with input using the
    /// [VM::push_source] method.
    pub fn run<H: Handlers<S>>(&mut self) -> rl::Result<()> {
        self.internal.handlers = HandlerFns::new::<H>();
        let result = self
            .next_token()
            .and_then(|()| self.process_input_stack());
        result.map_err(|err| self.add_error_context(err))
    }

    /// The main loop.
    ///
    /// The loop returns at the end of the input, or at a boundary of the input stack.
    pub(crate) fn process_input_stack(&mut self) -> rl::Result<()> {
        let handlers = self.internal.handlers;
        let mut trap_bol_stack: Vec<bool> = vec![];
        let mut bol = true;
        loop {
            if self.internal.exit_requested {
                return Ok(());
            }
            let mut suppress_next = false;
            match self.internal.tok.clone() {
                Token::Char(c)
                    if bol
                        && !self.internal.have_input
                        && (c == self.internal.control_char
                            || c == self.internal.no_break_control_char) =>
                {
                    self.internal.break_flag = c == self.internal.control_char;
                    loop {
                        self.next_token()?;
                        if !self.internal.tok.is_white_space() {
                            break;
                        }
                    }
                    match self.get_name(false)? {
                        None => self.skip_line()?,
                        Some(name) => self.interpolate_macro(name)?,
                    }
                    suppress_next = true;
                }
                Token::Transparent if bol => {
                    let mut line = ElementBuffer::new();
                    loop {
                        match self.get_copy(false)? {
                            None => {
                                line.append_byte(b'\n');
                                break;
                            }
                            Some(element) => {
                                let newline = element.is_byte(b'\n');
                                line.append(element);
                                if newline {
                                    break;
                                }
                            }
                        }
                    }
                    (handlers.transparent)(line, ExecutionInput::new(self))?;
                }
                Token::Newline => {
                    (handlers.token)(Token::Newline, ExecutionInput::new(self))?;
                    bol = true;
                }
                Token::Eof => return Ok(()),
                Token::BeginTrap => {
                    trap_bol_stack.push(bol);
                    bol = true;
                    self.internal.have_input = false;
                }
                Token::EndTrap => {
                    match trap_bol_stack.pop() {
                        None => self.error("spurious end trap token detected!"),
                        Some(saved) => bol = saved,
                    }
                    self.internal.have_input = false;
                }
                Token::PageEjector => {
                    (handlers.token)(Token::PageEjector, ExecutionInput::new(self))?;
                }
                token => {
                    bol = false;
                    (handlers.token)(token, ExecutionInput::new(self))?;
                }
            }
            if !suppress_next {
                self.next_token()?;
            }
        }
    }
}

/// The Rofflang virtual machine.
pub struct VM<S> {
    /// The state
    pub state: S,

    /// The commands map
    pub commands_map: command::Map<S>,

    /// File system operations
    ///
    /// By default this is real operations on the file system.
    /// It is replaceable to support unit testing.
    pub file_system: Box<dyn FileSystem>,

    /// Writer that writes to the terminal
    ///
    /// Defaults to standard error.
    /// Diagnostics and the output of requests like `.tm` are written here.
    pub terminal_out: Rc<RefCell<dyn std::io::Write>>,

    /// The working directory which is used as the root for relative file paths
    ///
    /// This is [None] if the working directory could not be determined.
    pub working_directory: Option<std::path::PathBuf>,

    internal: Internal<S>,
}

/// File system operations that the VM may need to perform.
///
/// These operations are extracted to a trait so that they be mocked out in unit testing.
pub trait FileSystem {
    /// Read the entire contents of a file.
    ///
    /// This is implemented by [std::fs::read].
    fn read_to_bytes(&self, path: &std::path::Path) -> std::io::Result<Vec<u8>>;
}

struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_to_bytes(&self, path: &std::path::Path) -> std::io::Result<Vec<u8>> {
        std::fs::read(path)
    }
}

/// Implementations of this trait may be used as the state in a Rofflang VM.
///
/// The trait has no required methods.
/// For any type it can be implemented trivially:
/// ```
/// # use rofflang::traits::RoffState;
/// struct SomeNewType;
///
/// impl RoffState for SomeNewType {}
/// ```
///
/// Methods of the trait are invoked at certain points when the VM is running,
///     and connect the engine to the parts of a troff implementation
///     that are outside of the engine: registers, numeric expressions and formatting.
pub trait RoffState: Sized {
    /// Hook that is invoked for every diagnostic that is issued.
    ///
    /// The default implementation writes the diagnostic to the terminal.
    fn diagnostic_hook(vm: &mut VM<Self>, diagnostic: Diagnostic) {
        _ = writeln!(vm.terminal_out.borrow_mut(), "{diagnostic}");
    }

    /// Hook that evaluates a numeric expression.
    ///
    /// The default implementation only accepts an optionally signed integer.
    fn expression_hook(vm: &mut VM<Self>, expression: &str) -> Option<i64> {
        _ = vm;
        expression.trim().parse::<i64>().ok()
    }

    /// Hook that returns the interpolation of a number register, for `\n`.
    ///
    /// The increment is 1 for `\n+`, -1 for `\n-` and 0 otherwise.
    /// Returning [None] means the register is not defined,
    ///     in which case the VM issues a warning and interpolates `0`.
    fn number_register_hook(vm: &mut VM<Self>, name: Name, increment: i32) -> Option<String> {
        _ = (vm, name, increment);
        None
    }

    /// Hook that returns the format of a number register, for `\g`.
    fn number_format_hook(vm: &mut VM<Self>, name: Name) -> Option<String> {
        _ = (vm, name);
        None
    }

    /// Hook that assigns a number register, for `\R`.
    ///
    /// The expression is provided as text.
    fn register_assignment_hook(vm: &mut VM<Self>, name: Name, expression: &str) {
        _ = (vm, name, expression);
    }

    /// Hook that applies a change to the formatting state.
    fn formatting_hook(vm: &mut VM<Self>, change: FormattingChange) {
        _ = (vm, change);
    }

    /// Hook that builds the node for an escape like `\h'1i'`.
    ///
    /// The default implementation builds an [EscapeNode].
    fn node_hook(vm: &mut VM<Self>, escape: u8, argument: &str) -> NodeHandle {
        _ = vm;
        NodeHandle::new(EscapeNode::new(escape, argument))
    }

    /// Hook that returns the width of some text, for `\w`.
    ///
    /// The default implementation returns the number of characters.
    fn width_hook(vm: &mut VM<Self>, text: &str) -> i64 {
        _ = vm;
        text.chars().count() as i64
    }
}

impl RoffState for () {}

impl<S: Default> VM<S> {
    /// Create a new VM.
    pub fn new(initial_built_ins: HashMap<&str, BuiltIn<S>>) -> Box<VM<S>> {
        VM::new_with_config(initial_built_ins, Config::default())
    }

    /// Create a new VM with the provided configuration.
    pub fn new_with_config(
        initial_built_ins: HashMap<&str, BuiltIn<S>>,
        config: Config,
    ) -> Box<VM<S>> {
        let mut internal = Internal::new(config);
        let initial_built_ins = initial_built_ins
            .into_iter()
            .map(|(key, value)| (internal.interner.get_or_intern(key), value))
            .collect();
        Box::new(VM {
            state: Default::default(),
            commands_map: command::Map::new(initial_built_ins),
            internal,
            file_system: Box::new(RealFileSystem {}),
            terminal_out: Rc::new(RefCell::new(std::io::stderr())),
            working_directory: match std::env::current_dir() {
                Ok(path_buf) => Some(path_buf),
                Err(err) => {
                    tracing::warn!("failed to determine the working directory: {err}");
                    None
                }
            },
        })
    }
}

impl<S: RoffState> VM<S> {
    /// Add new input to the VM.
    ///
    /// Input is organized as a stack.
    /// Pushing input onto the stack means it is read first.
    /// A file name of `-` is reported as `<standard input>` in diagnostics.
    pub fn push_source<T: Into<Vec<u8>>>(&mut self, file_name: &str, source: T) -> rl::Result<()> {
        let file_name = match file_name {
            "-" => "<standard input>",
            file_name => file_name,
        };
        let bytes: Vec<u8> = source.into();
        let reader = std::io::Read::bytes(std::io::Cursor::new(bytes));
        self.internal
            .input
            .push(InputSource::File(FileSource::new(Box::new(reader), file_name)))?;
        Ok(())
    }

    /// Reads a file using the VM's file system.
    ///
    /// Relative paths are resolved against the working directory.
    pub fn read_file(&self, file_name: &str) -> std::io::Result<Vec<u8>> {
        let mut path = PathBuf::from(file_name);
        if path.is_relative() {
            if let Some(working_directory) = &self.working_directory {
                path = working_directory.join(path);
            }
        }
        self.file_system.read_to_bytes(&path)
    }

    /// Issues a warning, if the category is enabled.
    ///
    /// Returns whether the warning was issued.
    pub fn warning<T: Into<String>>(&mut self, category: Category, message: T) -> bool {
        if !self.internal.warning_mask.is_enabled(category) {
            return false;
        }
        let location = self.internal.input.location(false);
        self.emit(Severity::Warning(category), message.into(), location);
        true
    }

    /// Issues an error, unless errors are inhibited.
    pub fn error<T: Into<String>>(&mut self, message: T) {
        let location = self.internal.input.location(false);
        self.error_at(location, message)
    }

    /// Issues an error at the provided location.
    pub fn error_at<T: Into<String>>(&mut self, location: Option<(Rc<str>, usize)>, message: T) {
        if self.internal.inhibit_errors {
            return;
        }
        self.internal.num_errors += 1;
        self.emit(Severity::Error, message.into(), location);
    }

    /// Issues an error about input read in copy mode.
    ///
    /// While input is being ignored this is a warning in the `ig` category instead.
    pub fn copy_mode_error<T: Into<String>>(&mut self, message: T) {
        if self.internal.lex.ignoring {
            self.warning(
                Category::Ig,
                format!("(in ignored input) {}", message.into()),
            );
        } else {
            self.error(message);
        }
    }

    fn emit(&mut self, severity: Severity, message: String, location: Option<(Rc<str>, usize)>) {
        let backtrace = if self.internal.backtrace {
            self.backtrace(false)
        } else {
            vec![]
        };
        S::diagnostic_hook(
            self,
            Diagnostic {
                severity,
                message,
                location,
                backtrace,
            },
        );
    }

    fn report_invalid_input(&mut self) {
        for b in self.internal.input.take_invalid_input() {
            self.warning(
                Category::Input,
                format!("invalid input character code {b}"),
            );
        }
    }

    /// Fills in the location and backtrace of a fatal error that does not have them yet.
    pub(crate) fn add_error_context(&self, mut err: Box<error::Error>) -> Box<error::Error> {
        if err.location.is_none() {
            err.location = self.internal.input.location(false);
            if self.internal.backtrace {
                err.backtrace = self.backtrace(false);
            }
        }
        err
    }
}

impl<S> VM<S> {
    /// Clear all input from the VM.
    pub fn clear_sources(&mut self) -> rl::Result<()> {
        self.internal.input.clear()?;
        Ok(())
    }

    /// Interns a name.
    #[inline]
    pub fn intern(&mut self, name: &str) -> Name {
        self.internal.interner.get_or_intern(name)
    }

    /// Resolves a name to a string.
    #[inline]
    pub fn resolve(&self, name: Name) -> &str {
        token::resolve(&self.internal.interner, name)
    }

    /// Return a reference to the name interner.
    #[inline]
    pub fn interner(&self) -> &NameInterner {
        &self.internal.interner
    }

    /// Return a regular hash map with all the built-in commands and their documentation.
    pub fn get_built_ins_as_map_slow(&self) -> HashMap<String, BuiltIn<S>> {
        let mut map = HashMap::new();
        for (name, cmd) in self.commands_map.built_in_commands() {
            map.insert(self.resolve(*name).to_string(), cmd.clone());
        }
        map
    }

    /// The current token.
    #[inline]
    pub fn tok(&self) -> &Token {
        &self.internal.tok
    }

    pub fn lex(&self) -> LexContext {
        self.internal.lex
    }

    pub fn warning_mask(&self) -> WarningMask {
        self.internal.warning_mask
    }

    pub fn set_warning_mask(&mut self, mask: WarningMask) {
        self.internal.warning_mask = mask;
    }

    /// Number of errors issued so far.
    pub fn num_errors(&self) -> usize {
        self.internal.num_errors
    }

    /// Whether the last control line used the control character, as opposed to
    ///     the no-break control character.
    pub fn break_flag(&self) -> bool {
        self.internal.break_flag
    }

    /// Lines of the backtrace of the input stack, innermost first.
    ///
    /// If `all` is false, the lines stop at the innermost file.
    pub fn backtrace(&self, all: bool) -> Vec<String> {
        self.internal
            .input
            .backtrace(all, |name| self.resolve(name).to_string())
    }

    /// Returns the value of the registers that the engine supplies itself.
    ///
    /// These are `.$`, `.c`, `c.`, `.F` and `.C`.
    pub fn engine_register(&self, name: Name) -> Option<String> {
        Some(match self.resolve(name) {
            ".$" => self.internal.input.nargs().to_string(),
            ".c" | "c." => self
                .internal
                .input
                .location(false)
                .map(|(_, line)| line)
                .unwrap_or(0)
                .to_string(),
            ".F" => self
                .internal
                .input
                .location(false)
                .map(|(file_name, _)| file_name.to_string())
                .unwrap_or_default(),
            ".C" => (self.internal.lex.compatible as i32).to_string(),
            _ => return None,
        })
    }
}

/// Parts of the VM that are private.
struct Internal<S> {
    input: InputStack,
    interner: NameInterner,
    lex: LexContext,
    warning_mask: WarningMask,
    inhibit_errors: bool,
    backtrace: bool,

    // The current token.
    tok: Token,
    // Whether a formatting escape was seen on the current line.
    have_input: bool,
    // The value of have_input right before the last newline.
    old_have_input: bool,
    // Set when a long escape name was terminated by a space, as in `\*[name arg]`.
    have_string_arg: bool,

    control_char: u8,
    no_break_control_char: u8,
    break_flag: bool,
    saved_escape_char: Option<u8>,

    exit_requested: bool,
    num_errors: usize,
    handlers: HandlerFns<S>,
}

fn ignore_token<S>(_: Token, _: &mut ExecutionInput<S>) -> rl::Result<()> {
    Ok(())
}

fn ignore_line<S>(_: ElementBuffer, _: &mut ExecutionInput<S>) -> rl::Result<()> {
    Ok(())
}

impl<S> Internal<S> {
    fn new(config: Config) -> Self {
        Internal {
            input: InputStack::new(config.input_stack_limit),
            interner: Default::default(),
            lex: LexContext {
                escape_char: config.escape_char,
                compatible: config.compatible,
                ignoring: false,
            },
            warning_mask: config.warning_mask,
            inhibit_errors: config.inhibit_errors,
            backtrace: config.backtrace,
            tok: Token::Empty,
            have_input: false,
            old_have_input: false,
            have_string_arg: false,
            control_char: b'.',
            no_break_control_char: b'\'',
            break_flag: false,
            saved_escape_char: Some(b'\\'),
            exit_requested: false,
            num_errors: 0,
            handlers: HandlerFns {
                token: ignore_token,
                transparent: ignore_line,
            },
        }
    }
}

/// Helper trait for implementing the component pattern in Rofflang.
///
/// The component pattern is a design pattern used when implementing requests that require some state.
/// An example of a stateful request is `.nr`, which needs to store the value of registers somewhere.
/// When the component pattern is used, a stateful request
///     can have a single implementation that
///     is used by multiple troff engines built with Rofflang.
///
/// In the component pattern, the state
///     needed by a specific request is isolated in a _component_, which is a concrete
///     Rust type like a struct.
/// This Rust type is the generic type `C` in the trait.
/// The stateful request is defined in the same Rust module as the component.
/// The internals of the component are made private to the module it is defined in.
/// This means the state can only be mutated by the requests implemented in the module.
///
/// The easiest way to include a component in the state is to make it a direct field
///     of the state.
/// In this case the [implement_has_component] macro can be used to easily implement the trait.
///
/// ## The [RoffState] requirement
///
/// This trait requires that the type also implements [RoffState].
/// This is only to reduce the number of trait bounds that need to be explicitly
///     specified when implementing requests.
pub trait HasComponent<C>: RoffState {
    /// Return a immutable reference to the component.
    fn component(&self) -> &C;

    /// Return a mutable reference to the component.
    fn component_mut(&mut self) -> &mut C;
}

/// This macro is for implementing the [HasComponent] trait in the special (but common)
///     case when the state is a struct and the component is a direct field of the struct.
///
/// ## Examples
///
/// Implementing a single component:
///
/// ```
/// # mod mylibrary{
/// #   pub struct Component;
/// # }
/// # use rofflang::vm::implement_has_component;
/// # use rofflang::traits::*;
/// #
/// struct MyState {
///     component: mylibrary::Component,
/// }
///
/// impl RoffState for MyState {}
///
/// implement_has_component![MyState, mylibrary::Component, component];
/// ```
///
/// Implementing multiple components:
///
/// ```
/// # mod mylibrary1{
/// #   pub struct Component;
/// # }
/// # mod mylibrary2{
/// #   pub struct Component;
/// # }
/// # use rofflang::vm::implement_has_component;
/// # use rofflang::traits::*;
/// #
/// struct MyState {
///     component_1: mylibrary1::Component,
///     component_2: mylibrary2::Component,
/// }
///
/// impl RoffState for MyState {}
///
/// implement_has_component![
///     MyState,
///     (mylibrary1::Component, component_1),
///     (mylibrary2::Component, component_2),
/// ];
/// ```
#[macro_export]
macro_rules! implement_has_component {
    ( $type: path, $component: path, $field: ident ) => {
        implement_has_component![$type, ($component, $field),];
    };
    ( $type: path, $(($component: path, $field: ident),)+) => {
        $(
            impl ::rofflang::vm::HasComponent<$component> for $type {
                #[inline]
                fn component(&self) -> &$component {
                    &self.$field
                }
                #[inline]
                fn component_mut(&mut self) -> &mut $component {
                    &mut self.$field
                }
            }
        )*
    };
}

pub use implement_has_component;
