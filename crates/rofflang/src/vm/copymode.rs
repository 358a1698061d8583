//! Copy mode
//!
//! Copy mode is how input is read when it is stored rather than formatted:
//!     when defining a macro or string, when collecting macro arguments
//!     and when reading the text argument of requests like `.tm`.
//! In copy mode only interpolation escapes (`\$`, `\*`, `\n`, `\g`, `\V`) are expanded,
//!     comments are removed, and escapes with a single meaning
//!     are stored as control bytes to be replayed later.
//!
//! This module also contains the interpolation operations themselves,
//!     which are shared with the tokenizer.

use super::*;
use crate::buffer::Element;
use crate::input::{Expansion, MacroArgument};
use crate::token::control::*;

/// How the name of an escape like `\*` or `\f` is read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ReadMode {
    Normal,
    /// A long name may be followed by arguments, as in `\*[name arg1 arg2]`.
    WithArgs,
    /// The name may be empty, as in `\f[]`.
    AllowEmpty,
}

impl<S: RoffState> VM<S> {
    /// Gets the next element from the input stack.
    ///
    /// Invalid input that the sources dropped is reported here.
    pub(crate) fn get_element(&mut self) -> Option<Element> {
        let element = self.internal.input.get();
        if self.internal.input.has_invalid_input() {
            self.report_invalid_input();
        }
        if let Some(Element::Byte(b'\n')) = element {
            self.internal.old_have_input = self.internal.have_input;
            self.internal.have_input = false;
        }
        element
    }

    pub(crate) fn peek_element(&mut self) -> Option<Element> {
        let element = self.internal.input.peek();
        if self.internal.input.has_invalid_input() {
            self.report_invalid_input();
        }
        element
    }

    pub(crate) fn is_escape_char(&self, c: u8) -> bool {
        self.internal.lex.escape_char == Some(c)
    }

    pub(crate) fn push_compatibility(&mut self, compatible: bool) {
        self.internal.input.save_lex(self.internal.lex);
        self.internal.lex.compatible = compatible;
    }

    pub(crate) fn pop_compatibility(&mut self) {
        if let Some(saved) = self.internal.input.saved_lex() {
            self.internal.lex.compatible = saved.compatible;
        }
    }

    /// The marker that starts a macro argument or definition read in the current mode.
    pub(crate) fn compatibility_marker(&self) -> u8 {
        if self.internal.lex.compatible {
            PUSH_COMP_MODE
        } else {
            PUSH_GROFF_MODE
        }
    }

    /// Reads the next element in copy mode.
    ///
    /// If `defining` is true, escaped newlines are returned as [ESCAPE_NEWLINE]
    ///     instead of being removed.
    pub(crate) fn get_copy(&mut self, defining: bool) -> rl::Result<Option<Element>> {
        loop {
            let mut element = self.get_element();
            match element {
                Some(Element::Byte(PUSH_GROFF_MODE)) => {
                    self.push_compatibility(false);
                    continue;
                }
                Some(Element::Byte(PUSH_COMP_MODE)) => {
                    self.push_compatibility(true);
                    continue;
                }
                Some(Element::Byte(POP_GROFFCOMP_MODE)) => {
                    self.pop_compatibility();
                    continue;
                }
                Some(Element::Byte(BEGIN_QUOTE)) => {
                    self.internal.input.increase_level();
                    continue;
                }
                Some(Element::Byte(END_QUOTE)) => {
                    self.internal.input.decrease_level();
                    continue;
                }
                Some(Element::Byte(ESCAPE_NEWLINE)) => {
                    if defining {
                        return Ok(element);
                    }
                    while let Some(Element::Byte(ESCAPE_NEWLINE)) = element {
                        element = self.get_element();
                    }
                }
                _ => {}
            }
            let c = match element {
                Some(Element::Byte(c)) => c,
                other => return Ok(other),
            };
            if !self.is_escape_char(c) {
                return Ok(Some(Element::Byte(c)));
            }
            let next = match self.peek_element() {
                Some(Element::Byte(next)) => next,
                _ => return Ok(Some(Element::Byte(c))),
            };
            let translated = match next {
                b'"' => {
                    self.get_element();
                    loop {
                        match self.get_element() {
                            None => return Ok(None),
                            Some(Element::Byte(b'\n')) => return Ok(Some(Element::Byte(b'\n'))),
                            Some(_) => {}
                        }
                    }
                }
                b'#' => {
                    self.get_element();
                    loop {
                        match self.get_element() {
                            None => return Ok(None),
                            Some(Element::Byte(b'\n')) => break,
                            Some(_) => {}
                        }
                    }
                    continue;
                }
                b'$' => {
                    self.get_element();
                    if let Some(name) = self.read_escape_name(ReadMode::Normal)? {
                        self.interpolate_arg(&name)?;
                    }
                    continue;
                }
                b'*' => {
                    self.get_element();
                    self.read_and_interpolate_string()?;
                    continue;
                }
                b'n' => {
                    self.get_element();
                    let (name, increment) = self.read_increment_and_escape_name()?;
                    if let Some(name) = name {
                        self.interpolate_number_reg(&name, increment)?;
                    }
                    continue;
                }
                b'g' => {
                    self.get_element();
                    if let Some(name) = self.read_escape_name(ReadMode::Normal)? {
                        self.interpolate_number_format(&name)?;
                    }
                    continue;
                }
                b'V' => {
                    self.get_element();
                    if let Some(name) = self.read_escape_name(ReadMode::Normal)? {
                        self.interpolate_environment_variable(&name)?;
                    }
                    continue;
                }
                b'\n' => {
                    self.get_element();
                    if defining {
                        return Ok(Some(Element::Byte(ESCAPE_NEWLINE)));
                    }
                    continue;
                }
                b'a' => 0o1,
                b't' => b'\t',
                b'e' => ESCAPE_LOWER_E,
                b'E' => ESCAPE_UPPER_E,
                b' ' => ESCAPE_SPACE,
                b'~' => ESCAPE_TILDE,
                b':' => ESCAPE_COLON,
                b'|' => ESCAPE_BAR,
                b'^' => ESCAPE_CIRCUMFLEX,
                b'{' => ESCAPE_LEFT_BRACE,
                b'}' => ESCAPE_RIGHT_BRACE,
                b'`' => ESCAPE_LEFT_QUOTE,
                b'\'' => ESCAPE_RIGHT_QUOTE,
                b'-' => ESCAPE_HYPHEN,
                b'_' => ESCAPE_UNDERSCORE,
                b'c' => ESCAPE_C,
                b'!' => ESCAPE_BANG,
                b'?' => ESCAPE_QUESTION,
                b'&' => ESCAPE_AMPERSAND,
                b')' => ESCAPE_RIGHT_PARENTHESIS,
                b'%' => ESCAPE_PERCENT,
                b'.' => b'.',
                next if next == c => c,
                _ => return Ok(Some(Element::Byte(c))),
            };
            self.get_element();
            return Ok(Some(Element::Byte(translated)));
        }
    }

    /// Reads one character of an escape name.
    pub(crate) fn get_char_for_escape_name(&mut self, allow_space: bool) -> rl::Result<Option<u8>> {
        let c = match self.get_copy(false)? {
            None => {
                self.copy_mode_error("end of input in escape name");
                return Ok(None);
            }
            Some(Element::Node(_)) => 0,
            Some(Element::Byte(c)) => c,
        };
        let allowed = match c {
            b'\n' | b'\t' | 0o1 | 0o10 => false,
            b' ' => allow_space,
            c => !is_invalid_input_byte(c),
        };
        if allowed {
            return Ok(Some(c));
        }
        if c == b'\n' {
            self.push_temp(b"\n")?;
        }
        self.copy_mode_error(format!(
            "{} is not allowed in an escape name",
            token::describe_input_char(Some(c))
        ));
        Ok(None)
    }

    /// Reads the name of an escape: a single character, `(xx` or `[long name]`.
    ///
    /// Returns [None] if the name is invalid.
    pub(crate) fn read_escape_name(&mut self, mode: ReadMode) -> rl::Result<Option<String>> {
        let c = match self.get_char_for_escape_name(false)? {
            None => return Ok(None),
            Some(c) => c,
        };
        let name = match c {
            b'(' => return self.read_two_char_escape_name(),
            b'[' if !self.internal.lex.compatible => {
                match self.read_long_escape_name(mode)? {
                    None => return Ok(None),
                    Some(name) => name,
                }
            }
            c => return Ok(Some(token::bytes_to_string(&[c]))),
        };
        if name.is_empty() && mode != ReadMode::AllowEmpty {
            self.copy_mode_error("empty escape name");
            return Ok(None);
        }
        Ok(Some(name))
    }

    pub(crate) fn read_two_char_escape_name(&mut self) -> rl::Result<Option<String>> {
        let mut name = vec![];
        for _ in 0..2 {
            match self.get_char_for_escape_name(false)? {
                None => return Ok(None),
                Some(c) => name.push(c),
            }
        }
        Ok(Some(token::bytes_to_string(&name)))
    }

    /// Reads a name terminated by `]` at the same quote level as the opening `[`.
    ///
    /// In [ReadMode::WithArgs] the name may also be terminated by a space,
    ///     in which case arguments follow.
    fn read_long_escape_name(&mut self, mode: ReadMode) -> rl::Result<Option<String>> {
        let start_level = self.internal.input.level();
        let mut name = vec![];
        loop {
            let c = match self.get_char_for_escape_name(mode == ReadMode::WithArgs)? {
                None => return Ok(None),
                Some(c) => c,
            };
            if mode == ReadMode::WithArgs && c == b' ' {
                self.internal.have_string_arg = true;
                break;
            }
            if c == b']' && self.internal.input.level() == start_level {
                break;
            }
            name.push(c);
        }
        Ok(Some(token::bytes_to_string(&name)))
    }

    /// Reads the name of a `\n` escape, which may be preceded by `+` or `-`.
    pub(crate) fn read_increment_and_escape_name(&mut self) -> rl::Result<(Option<String>, i32)> {
        let c = match self.get_char_for_escape_name(false)? {
            None => return Ok((None, 0)),
            Some(c) => c,
        };
        match c {
            b'(' => Ok((self.read_two_char_escape_name()?, 0)),
            b'+' => Ok((self.read_escape_name(ReadMode::Normal)?, 1)),
            b'-' => Ok((self.read_escape_name(ReadMode::Normal)?, -1)),
            b'[' if !self.internal.lex.compatible => {
                let name = self.read_long_escape_name(ReadMode::Normal)?;
                match name {
                    Some(name) if name.is_empty() => {
                        self.copy_mode_error("empty escape name");
                        Ok((None, 0))
                    }
                    name => Ok((name, 0)),
                }
            }
            c => Ok((Some(token::bytes_to_string(&[c])), 0)),
        }
    }

    /// Reads the name of a `\*` escape and interpolates the string,
    ///     with arguments if the name is followed by them.
    pub(crate) fn read_and_interpolate_string(&mut self) -> rl::Result<()> {
        let name = match self.read_escape_name(ReadMode::WithArgs)? {
            None => return Ok(()),
            Some(name) => name,
        };
        let name = self.intern(&name);
        if self.internal.have_string_arg {
            self.internal.have_string_arg = false;
            self.interpolate_string_with_args(name)
        } else {
            self.interpolate_string(name)
        }
    }

    /// Pushes bytes onto the input stack.
    pub(crate) fn push_temp<T: Into<Vec<u8>>>(&mut self, bytes: T) -> rl::Result<()> {
        self.internal.input.push(InputSource::temp(bytes))?;
        Ok(())
    }

    pub(crate) fn push_expansion(&mut self, expansion: Expansion) -> rl::Result<()> {
        self.internal.input.push(InputSource::Expansion(expansion))?;
        Ok(())
    }

    /// Looks up a command for interpolation, creating an empty macro if it is not defined.
    pub(crate) fn lookup_request(&mut self, name: Name) -> command::Command<S> {
        let (command, created) = self.commands_map.lookup_or_create(name);
        let command = command.clone();
        if created {
            self.warning(
                Category::Mac,
                format!("macro `{}' not defined", self.resolve(name)),
            );
        }
        command
    }

    /// Interpolates a string, as in `\*x`.
    pub(crate) fn interpolate_string(&mut self, name: Name) -> rl::Result<()> {
        match self.lookup_request(name) {
            command::Command::BuiltIn(_) => {
                self.error("you can only invoke a string or macro using \\*");
                Ok(())
            }
            command::Command::Macro(buffer) => {
                self.push_expansion(Expansion::new(buffer, Some(name), "string"))
            }
        }
    }

    /// Interpolates a string with arguments, as in `\*[x arg1 arg2]`.
    ///
    /// The arguments are read up to the closing `]`.
    pub(crate) fn interpolate_string_with_args(&mut self, name: Name) -> rl::Result<()> {
        match self.lookup_request(name) {
            command::Command::BuiltIn(_) => {
                self.error("you can only invoke a string or macro using \\*");
                Ok(())
            }
            command::Command::Macro(buffer) => {
                let args = self.decode_string_args()?;
                self.push_expansion(Expansion::new_macro(buffer, name, "macro", args))
            }
        }
    }

    /// Interpolates a macro argument, as in `\$1`, `\$*` or `\$@`.
    pub(crate) fn interpolate_arg(&mut self, name: &str) -> rl::Result<()> {
        match name {
            "" => {
                self.copy_mode_error("missing argument name");
                Ok(())
            }
            "*" => {
                let mut bytes = vec![];
                for (i, arg) in self.internal.input.args().iter().enumerate() {
                    if i > 0 {
                        bytes.push(b' ');
                    }
                    bytes.extend(arg.elements().iter().filter_map(Element::byte));
                }
                self.push_temp(bytes)
            }
            "@" => {
                let mut bytes = vec![];
                for (i, arg) in self.internal.input.args().iter().enumerate() {
                    if i > 0 {
                        bytes.push(b' ');
                    }
                    bytes.push(b'"');
                    bytes.push(BEGIN_QUOTE);
                    bytes.extend(arg.elements().iter().filter_map(Element::byte));
                    bytes.push(END_QUOTE);
                    bytes.push(b'"');
                }
                if bytes.is_empty() {
                    return Ok(());
                }
                self.push_temp(bytes)
            }
            name if name.bytes().all(|b| b.is_ascii_digit()) => match name.parse::<usize>() {
                // A number too big to parse is also too big to be an argument.
                Err(_) => Ok(()),
                Ok(i) => self.push_arg(i),
            },
            name => {
                self.copy_mode_error(format!("bad argument name `{name}'"));
                Ok(())
            }
        }
    }

    fn push_arg(&mut self, i: usize) -> rl::Result<()> {
        match self.internal.input.get_arg(i) {
            None => Ok(()),
            Some(MacroArgument::InvokedName(None)) => Ok(()),
            Some(MacroArgument::InvokedName(Some(name))) => {
                let bytes: Vec<u8> = self.resolve(name).chars().map(|c| c as u8).collect();
                self.push_temp(bytes)
            }
            Some(MacroArgument::Bound(buffer)) => {
                self.push_expansion(Expansion::new(buffer, None, ""))
            }
        }
    }

    /// Interpolates a number register, as in `\nx` or `\n+x`.
    pub(crate) fn interpolate_number_reg(&mut self, name: &str, increment: i32) -> rl::Result<()> {
        let name = self.intern(name);
        let value = match self.engine_register(name) {
            Some(value) => value,
            None => match S::number_register_hook(self, name, increment) {
                Some(value) => value,
                None => {
                    self.warning(
                        Category::Reg,
                        format!("number register `{}' not defined", self.resolve(name)),
                    );
                    "0".into()
                }
            },
        };
        self.push_temp(value.into_bytes())
    }

    /// Interpolates the format of a number register, as in `\gx`.
    pub(crate) fn interpolate_number_format(&mut self, name: &str) -> rl::Result<()> {
        let name = self.intern(name);
        match S::number_format_hook(self, name) {
            None => Ok(()),
            Some(format) => self.push_temp(format.into_bytes()),
        }
    }

    /// Interpolates an environment variable, as in `\V[HOME]`.
    pub(crate) fn interpolate_environment_variable(&mut self, name: &str) -> rl::Result<()> {
        match std::env::var_os(name) {
            Some(value) if !value.is_empty() => {
                self.push_temp(value.to_string_lossy().as_bytes().to_vec())
            }
            _ => Ok(()),
        }
    }

    /// Reads the arguments of a macro call up to the end of the line.
    ///
    /// Each argument is wrapped in compatibility mode markers,
    ///     so that it is read later in the mode in which it was written.
    pub(crate) fn decode_args(&mut self) -> rl::Result<Vec<ElementBuffer>> {
        let mut args = vec![];
        if self.internal.tok.is_newline() || self.internal.tok.is_eof() {
            return Ok(args);
        }
        let mut c = self.get_copy(false)?;
        loop {
            while let Some(Element::Byte(b' ')) = c {
                c = self.get_copy(false)?;
            }
            match &c {
                None => break,
                Some(e) if e.is_byte(b'\n') => break,
                _ => {}
            }
            let mut arg = ElementBuffer::new();
            arg.append_byte(self.compatibility_marker());
            self.decode_arg(&mut c, &mut arg, false)?;
            arg.append_byte(POP_GROFFCOMP_MODE);
            args.push(arg);
        }
        Ok(args)
    }

    /// Reads the arguments of a string interpolation up to the closing `]`.
    pub(crate) fn decode_string_args(&mut self) -> rl::Result<Vec<ElementBuffer>> {
        let mut args = vec![];
        let mut c = self.get_copy(false)?;
        loop {
            while let Some(Element::Byte(b' ')) = c {
                c = self.get_copy(false)?;
            }
            match &c {
                None => {
                    self.error("missing `]'");
                    break;
                }
                Some(e) if e.is_byte(b'\n') => {
                    self.error("missing `]'");
                    self.push_temp(b"\n")?;
                    break;
                }
                Some(e) if e.is_byte(b']') => break,
                _ => {}
            }
            let mut arg = ElementBuffer::new();
            self.decode_arg(&mut c, &mut arg, true)?;
            args.push(arg);
        }
        Ok(args)
    }

    /// Reads a single argument into the buffer, starting with the element `c`.
    ///
    /// On return `c` holds the element that ended the argument.
    fn decode_arg(
        &mut self,
        c: &mut Option<Element>,
        arg: &mut ElementBuffer,
        string_arg: bool,
    ) -> rl::Result<()> {
        let mut quote_nesting = None;
        if let Some(Element::Byte(b'"')) = c {
            quote_nesting = Some(self.internal.input.nesting());
            *c = self.get_copy(false)?;
        }
        let mut warned_about_tab = false;
        loop {
            let mut element = match c.take() {
                None => return Ok(()),
                Some(element) => element,
            };
            if element.is_byte(b'\n') {
                *c = Some(element);
                return Ok(());
            }
            match quote_nesting {
                None => {
                    if element.is_byte(b' ') || (string_arg && element.is_byte(b']')) {
                        *c = Some(element);
                        return Ok(());
                    }
                    if element.is_byte(b'\t') && !warned_about_tab {
                        self.warning(
                            Category::Tab,
                            if string_arg {
                                "tab character in unquoted string argument"
                            } else {
                                "tab character in unquoted macro argument"
                            },
                        );
                        warned_about_tab = true;
                    }
                }
                Some(nesting) => {
                    if element.is_byte(b'"')
                        && (self.internal.lex.compatible
                            || self.internal.input.nesting() == nesting)
                    {
                        // A doubled quote is a literal quote.
                        match self.get_copy(false)? {
                            Some(Element::Byte(b'"')) => element = Element::Byte(b'"'),
                            next => {
                                *c = next;
                                return Ok(());
                            }
                        }
                    }
                }
            }
            arg.append(element);
            *c = self.get_copy(false)?;
        }
    }

    /// Reads the rest of the line in copy mode, without the newline.
    ///
    /// Leading spaces are skipped, and so is a single leading `"`.
    /// This is how requests like `.tm` read their text argument.
    /// The newline is consumed, so the caller continues with
    ///     [next_token](VM::next_token) rather than skipping the line.
    pub(crate) fn read_rest_of_line(&mut self, skip_leading_quote: bool) -> rl::Result<ElementBuffer> {
        let mut buffer = ElementBuffer::new();
        if self.internal.tok.is_newline() || self.internal.tok.is_eof() {
            return Ok(buffer);
        }
        let mut c = self.get_copy(false)?;
        while let Some(Element::Byte(b' ')) = c {
            c = self.get_copy(false)?;
        }
        if skip_leading_quote {
            if let Some(Element::Byte(b'"')) = c {
                c = self.get_copy(false)?;
            }
        }
        loop {
            match c {
                None => break,
                Some(element) if element.is_byte(b'\n') => break,
                Some(element) => buffer.append(element),
            }
            c = self.get_copy(false)?;
        }
        Ok(buffer)
    }
}
