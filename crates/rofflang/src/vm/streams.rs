//! The input type of requests
//!
//! Requests receive an [ExecutionInput], which is a thin wrapper around the [VM](vm::VM)
//!     that exposes the operations requests need: reading tokens and copy mode elements,
//!     pushing input, manipulating the input stack and the lexical state,
//!     and issuing diagnostics.

use super::*;
use crate::buffer::Element;
use crate::input::Expansion;
use crate::node::TokenNode;

/// Input type for requests.
///
/// This type provides:
///
/// - Access to the input, as tokens or as copy mode elements.
///     The current token is the token after the request name when the request is invoked.
///
/// - Mutable access to the state and the commands map via the
///     [ExecutionInput::state_mut]
///     and [ExecutionInput::commands_map_mut] methods.
#[repr(transparent)]
pub struct ExecutionInput<S>(VM<S>);

impl<S> ExecutionInput<S> {
    /// Creates a mutable reference to this type from the [VM](vm::VM) type.
    #[inline]
    pub fn new(vm: &mut VM<S>) -> &mut ExecutionInput<S> {
        unsafe { &mut *(vm as *mut VM<S> as *mut ExecutionInput<S>) }
    }

    #[inline]
    pub fn vm(&self) -> &VM<S> {
        &self.0
    }

    #[inline]
    pub fn vm_mut(&mut self) -> &mut VM<S> {
        &mut self.0
    }

    #[inline]
    pub fn state(&self) -> &S {
        &self.0.state
    }

    /// Returns a mutable reference to the state.
    #[inline]
    pub fn state_mut(&mut self) -> &mut S {
        &mut self.0.state
    }

    #[inline]
    pub fn commands_map(&self) -> &command::Map<S> {
        &self.0.commands_map
    }

    #[inline]
    pub fn commands_map_mut(&mut self) -> &mut command::Map<S> {
        &mut self.0.commands_map
    }

    /// The current token.
    #[inline]
    pub fn tok(&self) -> &Token {
        &self.0.internal.tok
    }

    /// Replaces the current token.
    pub fn set_tok(&mut self, token: Token) {
        self.0.internal.tok = token;
    }

    #[inline]
    pub fn intern(&mut self, name: &str) -> Name {
        self.0.intern(name)
    }

    #[inline]
    pub fn resolve(&self, name: Name) -> &str {
        self.0.resolve(name)
    }

    /// Writes the plain text approximation of a token.
    pub fn token_text(&self, token: &Token) -> String {
        let mut out = vec![];
        token.write_text(&mut out, &self.0.internal.interner);
        token::bytes_to_string(&out)
    }

    pub fn lex(&self) -> LexContext {
        self.0.internal.lex
    }

    /// Sets the escape character; [None] disables escapes.
    pub fn set_escape_char(&mut self, escape_char: Option<u8>) {
        self.0.internal.lex.escape_char = escape_char;
    }

    /// The escape character saved by `.ecs`.
    pub fn saved_escape_char(&self) -> Option<u8> {
        self.0.internal.saved_escape_char
    }

    pub fn set_saved_escape_char(&mut self, escape_char: Option<u8>) {
        self.0.internal.saved_escape_char = escape_char;
    }

    pub fn set_compatible(&mut self, compatible: bool) {
        self.0.internal.lex.compatible = compatible;
    }

    pub fn control_char(&self) -> u8 {
        self.0.internal.control_char
    }

    pub fn set_control_char(&mut self, c: u8) {
        self.0.internal.control_char = c;
    }

    pub fn no_break_control_char(&self) -> u8 {
        self.0.internal.no_break_control_char
    }

    pub fn set_no_break_control_char(&mut self, c: u8) {
        self.0.internal.no_break_control_char = c;
    }

    /// Whether the current control line used the control character rather than
    ///     the no-break control character.
    pub fn break_flag(&self) -> bool {
        self.0.internal.break_flag
    }

    pub fn warning_mask(&self) -> WarningMask {
        self.0.internal.warning_mask
    }

    pub fn set_warning_mask(&mut self, mask: WarningMask) {
        self.0.internal.warning_mask = mask;
    }

    /// Resets the flag that records a formatting escape on the current line.
    pub fn clear_have_input(&mut self) {
        self.0.internal.have_input = false;
    }

    /// Number of arguments of the innermost macro.
    pub fn nargs(&self) -> usize {
        self.0.internal.input.nargs()
    }

    /// Shifts the arguments of the innermost macro.
    pub fn shift(&mut self, n: usize) {
        self.0.internal.input.shift(n)
    }

    pub fn add_boundary(&mut self) -> rl::Result<()> {
        self.0.internal.input.add_boundary()?;
        Ok(())
    }

    /// Removes the boundary at the top of the input stack.
    pub fn remove_boundary(&mut self) -> bool {
        self.0.internal.input.remove_boundary()
    }

    /// Whether the top of the input stack is a boundary left behind by `.return` or `.ex`.
    pub fn is_return_boundary(&self) -> bool {
        self.0.internal.input.is_return_boundary()
    }

    /// Pops the input stack up to and including the innermost macro.
    pub fn pop_macro(&mut self) -> rl::Result<()> {
        self.0.internal.input.pop_macro()?;
        Ok(())
    }

    /// Pops all input.
    pub fn clear_input(&mut self) -> rl::Result<()> {
        self.0.internal.input.clear()?;
        Ok(())
    }

    /// The quote nesting level of the input stack.
    ///
    /// Delimited constructs compare the level at their start and end.
    pub fn level(&self) -> i32 {
        self.0.internal.input.level()
    }

    /// The number of diversions currently being read.
    pub fn diversion_level(&self) -> usize {
        self.0.internal.input.diversion_level()
    }

    /// The formatter state of the innermost diversion being read.
    pub fn diversion_state(&self) -> Option<&crate::input::DiversionState> {
        self.0.internal.input.diversion_state()
    }

    /// Snapshot of the nesting of the input, used to match closing delimiters.
    pub fn nesting(&self) -> crate::input::Nesting {
        self.0.internal.input.nesting()
    }

    pub fn set_input_stack_limit(&mut self, limit: usize) {
        self.0.internal.input.set_limit(limit)
    }

    /// Ends the innermost file.
    pub fn end_file(&mut self) {
        self.0.internal.input.end_file()
    }

    /// Sets the file name and line number of the innermost file, as in `.lf`.
    ///
    /// The next line read has number `line + 1`.
    pub fn set_location(&mut self, file_name: Option<&str>, line: usize) -> bool {
        self.0
            .internal
            .input
            .set_location(file_name.map(Rc::from), line)
    }

    /// Location of the innermost file.
    pub fn location(&self) -> Option<(Rc<str>, usize)> {
        self.0.internal.input.location(false)
    }

    pub fn backtrace(&self, all: bool) -> Vec<String> {
        self.0.backtrace(all)
    }

    /// Asks the VM to stop after the current request.
    pub fn request_exit(&mut self) {
        self.0.internal.exit_requested = true;
    }

    pub fn exit_requested(&self) -> bool {
        self.0.internal.exit_requested
    }

    pub fn file_system(&self) -> &dyn FileSystem {
        self.0.file_system.as_ref()
    }

    pub fn terminal_out(&self) -> Rc<RefCell<dyn std::io::Write>> {
        self.0.terminal_out.clone()
    }
}

impl<S: RoffState> ExecutionInput<S> {
    #[inline]
    pub fn next_token(&mut self) -> rl::Result<()> {
        self.0.next_token()
    }

    #[inline]
    pub fn skip_line(&mut self) -> rl::Result<()> {
        self.0.skip_line()
    }

    #[inline]
    pub fn has_arg(&mut self) -> rl::Result<bool> {
        self.0.has_arg()
    }

    #[inline]
    pub fn get_name(&mut self, required: bool) -> rl::Result<Option<Name>> {
        self.0.get_name(required)
    }

    #[inline]
    pub fn get_long_name(&mut self, required: bool) -> rl::Result<Option<Name>> {
        self.0.get_long_name(required)
    }

    /// Reads the next element in copy mode.
    #[inline]
    pub fn get_copy(&mut self, defining: bool) -> rl::Result<Option<Element>> {
        self.0.get_copy(defining)
    }

    /// Reads the next element without any interpretation.
    #[inline]
    pub fn get_raw(&mut self) -> Option<Element> {
        self.0.get_element()
    }

    /// Reads the rest of the line in copy mode.
    ///
    /// The newline is consumed; the caller continues with [ExecutionInput::next_token].
    pub fn read_rest_of_line(&mut self, skip_leading_quote: bool) -> rl::Result<ElementBuffer> {
        self.0.read_rest_of_line(skip_leading_quote)
    }

    /// Pushes bytes to be read next.
    pub fn push_temp<T: Into<Vec<u8>>>(&mut self, bytes: T) -> rl::Result<()> {
        self.0.push_temp(bytes)
    }

    /// Pushes a buffer to be read next.
    ///
    /// The name and description are used in backtraces.
    pub fn push_buffer(
        &mut self,
        buffer: ElementBuffer,
        name: Option<Name>,
        how_invoked: &'static str,
    ) -> rl::Result<()> {
        self.0.push_expansion(Expansion::new(buffer, name, how_invoked))
    }

    /// Pushes a diversion to be read next, together with the formatter state to use
    ///     while it is being read.
    pub fn push_diversion(
        &mut self,
        buffer: ElementBuffer,
        name: Name,
        state: Option<crate::input::DiversionState>,
    ) -> rl::Result<()> {
        self.0.internal.input.push_with_diversion_state(
            InputSource::Expansion(Expansion::new(buffer, Some(name), "diversion")),
            state,
        )?;
        Ok(())
    }

    /// Pushes a token back, so that it is the next token read.
    pub fn push_token(&mut self, token: Token) -> rl::Result<()> {
        let mut buffer = ElementBuffer::new();
        buffer.append_node(NodeHandle::new(TokenNode(token)));
        self.0.push_expansion(Expansion::new(buffer, None, ""))
    }

    /// Pushes a file to be read next.
    pub fn push_file<T: Into<Vec<u8>>>(&mut self, file_name: &str, contents: T) -> rl::Result<()> {
        self.0.push_source(file_name, contents)
    }

    /// Replaces the innermost file, as in `.nx`.
    pub fn next_file<T: Into<Vec<u8>>>(&mut self, file_name: &str, contents: T) -> rl::Result<()> {
        let bytes: Vec<u8> = contents.into();
        let reader = std::io::Read::bytes(std::io::Cursor::new(bytes));
        self.0
            .internal
            .input
            .next_file(FileSource::new(Box::new(reader), file_name))?;
        Ok(())
    }

    pub fn read_file(&self, file_name: &str) -> std::io::Result<Vec<u8>> {
        self.0.read_file(file_name)
    }

    /// Runs the main loop until the end of the input or a boundary.
    pub fn process_input_stack(&mut self) -> rl::Result<()> {
        self.0.process_input_stack()
    }

    pub fn warning<T: Into<String>>(&mut self, category: Category, message: T) -> bool {
        self.0.warning(category, message)
    }

    pub fn error<T: Into<String>>(&mut self, message: T) {
        self.0.error(message)
    }

    pub fn copy_mode_error<T: Into<String>>(&mut self, message: T) {
        self.0.copy_mode_error(message)
    }

    /// Looks up a command, creating an empty macro and issuing a `mac` warning
    ///     if the name is not defined.
    pub fn lookup_request(&mut self, name: Name) -> command::Command<S> {
        self.0.lookup_request(name)
    }

    /// Interpolates a string, as in `\*[name]`.
    pub fn interpolate_string(&mut self, name: Name) -> rl::Result<()> {
        self.0.interpolate_string(name)
    }

    /// Invokes a request or macro as if it was named on a control line.
    pub fn interpolate_macro(&mut self, name: Name) -> rl::Result<()> {
        self.0.interpolate_macro(name)
    }

    pub fn define_macro(
        &mut self,
        mode: DefineMode,
        calling: Calling,
        compatibility: Compatibility,
    ) -> rl::Result<()> {
        self.0.define_macro(mode, calling, compatibility)
    }

    pub fn define_string(&mut self, append: bool, compatibility: Compatibility) -> rl::Result<()> {
        self.0.define_string(append, compatibility)
    }

    /// Evaluates a numeric expression using the state's expression hook.
    pub fn evaluate(&mut self, expression: &str) -> Option<i64> {
        S::expression_hook(&mut self.0, expression)
    }

    /// Returns the value of a register supplied by the engine, like `.$`.
    pub fn engine_register(&self, name: Name) -> Option<String> {
        self.0.engine_register(name)
    }
}
