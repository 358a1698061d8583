//! The input stack
//!
//! All input is read from a stack of [InputSource]s.
//! The bottom of the stack is generally the file being processed.
//! Interpolating a macro or string pushes a new source on top of the stack;
//!     the source is drained by subsequent reads and popped when exhausted.
//! Expansion is thus implemented by pushing a new producer onto the same stack,
//!     and never by recursion in the engine.
//!
//! Boundary sources are not popped when exhausted: they report end of input until removed
//!     explicitly. The `.while` request uses them to delimit the body of the loop.

use crate::buffer::{Element, ElementBuffer};
use crate::token::Name;
use std::any::Any;
use std::fmt;
use std::rc::Rc;

mod source;

pub use source::*;

/// The lexical context in which input is read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LexContext {
    /// The escape character, or [None] if escapes are disabled with `.eo`.
    pub escape_char: Option<u8>,
    /// Whether compatibility mode is enabled.
    pub compatible: bool,
    /// Whether input is being skipped, as in `.ig`.
    pub ignoring: bool,
}

impl Default for LexContext {
    fn default() -> Self {
        LexContext {
            escape_char: Some(b'\\'),
            compatible: false,
            ignoring: false,
        }
    }
}

/// Opaque formatter state that is saved when a diversion is re-read.
#[derive(Clone)]
pub struct DiversionState(Rc<dyn Any>);

impl DiversionState {
    pub fn new<T: Any>(t: T) -> DiversionState {
        DiversionState(Rc::new(t))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl fmt::Debug for DiversionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DiversionState")
    }
}

/// A snapshot of how deeply nested the input currently is.
///
/// Closing delimiters only match if the nesting when they are read is the same as
///     the nesting when the opening delimiter was read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Nesting {
    depth: usize,
    level: i32,
}

/// Error returned when the input stack is full.
#[derive(Debug, PartialEq, Eq)]
pub struct StackLimitExceeded {
    pub limit: usize,
}

/// An argument of the innermost macro.
#[derive(Debug)]
pub enum MacroArgument {
    /// Argument zero: the name the macro was invoked with.
    InvokedName(Option<Name>),
    Bound(ElementBuffer),
}

struct Frame {
    source: InputSource,
    saved_lex: Option<LexContext>,
    saved_diversion_state: Option<Option<DiversionState>>,
}

/// The input stack.
pub struct InputStack {
    frames: Vec<Frame>,
    level: i32,
    diversion_level: usize,
    limit: usize,
    diversion_state: Option<DiversionState>,
    invalid_input: Vec<u8>,
}

impl InputStack {
    /// Creates a new empty stack.
    ///
    /// A limit of 0 means the depth of the stack is unlimited.
    pub fn new(limit: usize) -> InputStack {
        InputStack {
            frames: vec![],
            level: 0,
            diversion_level: 0,
            limit,
            diversion_state: None,
            invalid_input: vec![],
        }
    }

    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit;
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn level(&self) -> i32 {
        self.level
    }

    pub fn nesting(&self) -> Nesting {
        Nesting {
            depth: self.frames.len(),
            level: self.level,
        }
    }

    pub fn increase_level(&mut self) {
        self.level += 1;
    }

    pub fn decrease_level(&mut self) {
        self.level -= 1;
    }

    pub fn diversion_level(&self) -> usize {
        self.diversion_level
    }

    pub fn diversion_state(&self) -> Option<&DiversionState> {
        self.diversion_state.as_ref()
    }

    /// Returns the invalid bytes that were dropped from file input since the last call.
    pub fn take_invalid_input(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.invalid_input)
    }

    #[inline]
    pub fn has_invalid_input(&self) -> bool {
        !self.invalid_input.is_empty()
    }

    /// Gets the next element.
    ///
    /// Exhausted sources are popped, except for boundaries.
    pub fn get(&mut self) -> Option<Element> {
        loop {
            let frame = self.frames.last_mut()?;
            if let Some(element) = frame
                .source
                .get(&mut self.invalid_input, self.diversion_level)
            {
                return Some(element);
            }
            if frame.source.is_boundary().is_some() {
                return None;
            }
            self.pop();
        }
    }

    /// Peeks at the next element.
    ///
    /// Like [InputStack::get], exhausted sources are popped.
    pub fn peek(&mut self) -> Option<Element> {
        loop {
            let frame = self.frames.last_mut()?;
            if let Some(element) = frame.source.peek(&mut self.invalid_input) {
                return Some(element);
            }
            if frame.source.is_boundary().is_some() {
                return None;
            }
            self.pop();
        }
    }

    /// Pushes a new source.
    ///
    /// When the source is the expansion of a diversion, the current diversion state is saved
    ///     and replaced by the one provided.
    pub fn push(&mut self, source: InputSource) -> Result<(), StackLimitExceeded> {
        self.push_with_diversion_state(source, None)
    }

    pub fn push_with_diversion_state(
        &mut self,
        source: InputSource,
        diversion_state: Option<DiversionState>,
    ) -> Result<(), StackLimitExceeded> {
        if self.limit > 0 && self.frames.len() + 1 > self.limit {
            return Err(StackLimitExceeded { limit: self.limit });
        }
        let mut frame = Frame {
            source,
            saved_lex: None,
            saved_diversion_state: None,
        };
        if frame.source.is_diversion() {
            self.diversion_level += 1;
            frame.saved_diversion_state = Some(std::mem::replace(
                &mut self.diversion_state,
                diversion_state,
            ));
        }
        tracing::trace!(
            kind = frame.source.kind_name(),
            depth = self.frames.len() + 1,
            level = self.level,
            diversion_level = self.diversion_level,
            "push input source"
        );
        self.frames.push(frame);
        Ok(())
    }

    fn pop(&mut self) -> Option<InputSource> {
        let frame = self.frames.pop()?;
        if let Some(saved) = frame.saved_diversion_state {
            self.diversion_level -= 1;
            self.diversion_state = saved;
        }
        tracing::trace!(
            kind = frame.source.kind_name(),
            depth = self.frames.len(),
            level = self.level,
            diversion_level = self.diversion_level,
            "pop input source"
        );
        Some(frame.source)
    }

    pub fn add_boundary(&mut self) -> Result<(), StackLimitExceeded> {
        self.push(InputSource::Boundary(BoundaryKind::Plain))
    }

    pub fn add_return_boundary(&mut self) -> Result<(), StackLimitExceeded> {
        self.push(InputSource::Boundary(BoundaryKind::Return))
    }

    /// Removes the boundary at the top of the stack.
    ///
    /// If the top is not a boundary nothing happens and false is returned.
    pub fn remove_boundary(&mut self) -> bool {
        match self.frames.last() {
            Some(frame) if frame.source.is_boundary().is_some() => {
                self.pop();
                true
            }
            _ => false,
        }
    }

    pub fn is_return_boundary(&self) -> bool {
        matches!(
            self.frames.last().and_then(|frame| frame.source.is_boundary()),
            Some(BoundaryKind::Return)
        )
    }

    fn readd_return_boundaries(&mut self, n: usize) -> Result<(), StackLimitExceeded> {
        for _ in 0..n {
            self.add_return_boundary()?;
        }
        Ok(())
    }

    /// Pops every source.
    ///
    /// As many return boundaries as boundaries were popped are then pushed,
    ///     so that loops waiting on a boundary still observe one.
    pub fn clear(&mut self) -> Result<(), StackLimitExceeded> {
        let mut num_boundaries = 0;
        while let Some(source) = self.pop() {
            if source.is_boundary().is_some() {
                num_boundaries += 1;
            }
        }
        self.readd_return_boundaries(num_boundaries)
    }

    /// Pops sources up to and including the innermost macro expansion.
    ///
    /// The bottom source is never popped.
    /// As with [InputStack::clear], popped boundaries are replaced by return boundaries.
    pub fn pop_macro(&mut self) -> Result<(), StackLimitExceeded> {
        let mut num_boundaries = 0;
        while self.frames.len() > 1 {
            let source = match self.pop() {
                None => break,
                Some(source) => source,
            };
            if source.is_boundary().is_some() {
                num_boundaries += 1;
            }
            if source.is_macro() {
                break;
            }
        }
        self.readd_return_boundaries(num_boundaries)
    }

    fn innermost_macro(&self) -> Option<&Expansion> {
        self.frames
            .iter()
            .rev()
            .find(|frame| frame.source.is_macro())
            .and_then(|frame| frame.source.expansion())
    }

    /// Returns argument `i` of the innermost macro.
    ///
    /// Returns [None] if there is no macro or the argument does not exist.
    pub fn get_arg(&self, i: usize) -> Option<MacroArgument> {
        let expansion = self.innermost_macro()?;
        if i == 0 {
            return Some(MacroArgument::InvokedName(expansion.name()));
        }
        expansion
            .args()?
            .get(i - 1)
            .cloned()
            .map(MacroArgument::Bound)
    }

    /// Returns all of the arguments of the innermost macro.
    pub fn args(&self) -> &[ElementBuffer] {
        self.innermost_macro()
            .and_then(Expansion::args)
            .unwrap_or(&[])
    }

    /// Number of arguments of the innermost macro.
    pub fn nargs(&self) -> usize {
        self.args().len()
    }

    /// Shifts the arguments of the innermost macro by `n`.
    pub fn shift(&mut self, n: usize) {
        let args = self
            .frames
            .iter_mut()
            .rev()
            .find_map(|frame| frame.source.args_mut());
        if let Some(args) = args {
            let n = n.min(args.len());
            args.drain(..n);
        }
    }

    /// Returns the location of the innermost source that has one.
    pub fn location(&self, allow_macro: bool) -> Option<(Rc<str>, usize)> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.source.location(allow_macro))
    }

    /// Returns one line for each source on the stack, innermost first.
    ///
    /// If `all` is false, only the sources above the innermost file are included.
    pub fn backtrace<F: Fn(Name) -> String>(&self, all: bool, resolve: F) -> Vec<String> {
        let mut lines = vec![];
        for frame in self.frames.iter().rev() {
            let line = match &frame.source {
                InputSource::File(file) => {
                    if !all {
                        break;
                    }
                    format!(
                        "{}:{}: backtrace: file `{}'",
                        file.file_name(),
                        file.line(),
                        file.file_name()
                    )
                }
                InputSource::Expansion(expansion) => {
                    // Buffers built outside of any file have nothing to report.
                    let (file_name, line) = match frame.source.location(true) {
                        None => continue,
                        Some(location) => location,
                    };
                    let mut line = format!("{file_name}:{line}: backtrace");
                    match (expansion.how_invoked(), expansion.name()) {
                        ("", _) => {}
                        (how_invoked, None) => line.push_str(&format!(": {how_invoked}")),
                        (how_invoked, Some(name)) => {
                            line.push_str(&format!(": {how_invoked} `{}'", resolve(name)))
                        }
                    }
                    line
                }
                InputSource::Temp(_) | InputSource::Boundary(_) => continue,
            };
            lines.push(line);
        }
        lines
    }

    /// Replaces the innermost file with a new file.
    ///
    /// If there is no file, the new file is added at the bottom of the stack.
    pub fn next_file(&mut self, file: FileSource) -> Result<(), StackLimitExceeded> {
        if let Some(frame) = self
            .frames
            .iter_mut()
            .rev()
            .find(|frame| frame.source.is_file())
        {
            frame.source = InputSource::File(file);
            return Ok(());
        }
        if self.limit > 0 && self.frames.len() + 1 > self.limit {
            return Err(StackLimitExceeded { limit: self.limit });
        }
        self.frames.insert(
            0,
            Frame {
                source: InputSource::File(file),
                saved_lex: None,
                saved_diversion_state: None,
            },
        );
        Ok(())
    }

    /// Removes the innermost file.
    pub fn end_file(&mut self) {
        if let Some(i) = self.frames.iter().rposition(|frame| frame.source.is_file()) {
            let frame = self.frames.remove(i);
            if let Some(saved) = frame.saved_diversion_state {
                self.diversion_level -= 1;
                self.diversion_state = saved;
            }
        }
    }

    /// Sets the location of the innermost file.
    ///
    /// Returns false if there is no file.
    pub fn set_location(&mut self, file_name: Option<Rc<str>>, line: usize) -> bool {
        for frame in self.frames.iter_mut().rev() {
            if let InputSource::File(file) = &mut frame.source {
                file.set_location(file_name, line);
                return true;
            }
        }
        false
    }

    /// Saves the lexical context on the top source.
    pub fn save_lex(&mut self, lex: LexContext) {
        if let Some(frame) = self.frames.last_mut() {
            frame.saved_lex = Some(lex);
        }
    }

    /// Returns the lexical context saved on the top source.
    pub fn saved_lex(&self) -> Option<LexContext> {
        self.frames.last().and_then(|frame| frame.saved_lex)
    }
}

impl Default for InputStack {
    fn default() -> Self {
        InputStack::new(1000)
    }
}
