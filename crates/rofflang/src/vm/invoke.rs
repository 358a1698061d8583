//! Names, macro invocation and macro definition

use super::*;
use crate::buffer::{Element, SourceLocation};
use crate::input::Expansion;
use crate::token::control::*;

/// How a macro definition request stores what it reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DefineMode {
    /// Replace the macro, as in `.de`.
    Normal,
    /// Append to the macro, as in `.am`.
    Append,
    /// Discard the input, as in `.ig`.
    Ignore,
}

/// How the names of a macro definition request are given.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Calling {
    /// The names are given literally, as in `.de`.
    Normal,
    /// The names are the contents of strings, as in `.dei`.
    Indirect,
}

/// Which compatibility mode markers wrap a definition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Compatibility {
    /// No markers.
    Ignore,
    /// The body is read in compatibility mode when interpolated, as in `.ds` in compatibility mode.
    Enable,
    /// The body is read with compatibility mode off when interpolated, as in `.de1`.
    Disable,
}

impl Compatibility {
    fn marker(self) -> Option<u8> {
        match self {
            Compatibility::Ignore => None,
            Compatibility::Enable => Some(PUSH_COMP_MODE),
            Compatibility::Disable => Some(PUSH_GROFF_MODE),
        }
    }
}

impl<S: RoffState> VM<S> {
    /// Skips the rest of the line and reads the first token of the next line.
    pub fn skip_line(&mut self) -> rl::Result<()> {
        while !self.internal.tok.is_newline() {
            if self.internal.tok.is_eof() {
                return Ok(());
            }
            self.next_token()?;
        }
        self.next_token()
    }

    /// Skips spaces and returns whether there is an argument before the end of the line.
    pub fn has_arg(&mut self) -> rl::Result<bool> {
        while self.internal.tok.is_space() {
            self.next_token()?;
        }
        Ok(!self.internal.tok.is_newline() && !self.internal.tok.is_eof())
    }

    /// Reads a name starting at the current token.
    ///
    /// In compatibility mode names have at most two characters.
    /// If `required` is true, a missing name is reported.
    pub fn get_name(&mut self, required: bool) -> rl::Result<Option<Name>> {
        if self.internal.lex.compatible {
            while self.internal.tok.is_space() {
                self.next_token()?;
            }
            let first = match self.internal.tok.ch() {
                None => {
                    self.empty_name_warning(required)?;
                    return Ok(None);
                }
                Some(c) => c,
            };
            self.next_token()?;
            let name = match self.internal.tok.ch() {
                None => {
                    self.non_empty_name_warning();
                    token::bytes_to_string(&[first])
                }
                Some(second) => {
                    // The third character starts the arguments.
                    self.internal.tok = Token::Space;
                    token::bytes_to_string(&[first, second])
                }
            };
            return Ok(Some(self.intern(&name)));
        }
        self.get_long_name(required)
    }

    /// Reads a name of any length starting at the current token.
    pub fn get_long_name(&mut self, required: bool) -> rl::Result<Option<Name>> {
        while self.internal.tok.is_space() {
            self.next_token()?;
        }
        let mut name = vec![];
        while let Some(c) = self.internal.tok.ch() {
            name.push(c);
            self.next_token()?;
        }
        if name.is_empty() {
            self.empty_name_warning(required)?;
            return Ok(None);
        }
        self.non_empty_name_warning();
        Ok(Some(self.intern(&token::bytes_to_string(&name))))
    }

    fn empty_name_warning(&mut self, required: bool) -> rl::Result<()> {
        let tok = self.internal.tok.clone();
        match tok {
            Token::Newline | Token::Eof => {
                if required {
                    self.warning(Category::Missing, "missing name");
                }
            }
            Token::RightBrace | Token::Tab => {
                let description = tok.description();
                loop {
                    self.next_token()?;
                    if !self.internal.tok.is_space() && self.internal.tok != tok {
                        break;
                    }
                }
                if !self.internal.tok.is_newline() && !self.internal.tok.is_eof() {
                    self.error(format!("{description} is not allowed before an argument"));
                } else if required {
                    self.warning(Category::Missing, "missing name");
                }
            }
            tok => {
                if required {
                    self.error(format!("name expected (got {})", tok.description()));
                } else {
                    self.error(format!(
                        "name expected (got {}): treated as missing",
                        tok.description()
                    ));
                }
            }
        }
        Ok(())
    }

    fn non_empty_name_warning(&mut self) {
        match &self.internal.tok {
            Token::Newline
            | Token::Eof
            | Token::Space
            | Token::Tab
            | Token::RightBrace
            | Token::LeftBrace => {}
            tok => {
                let description = tok.description();
                self.error(format!("{description} is not allowed in a name"));
            }
        }
    }

    /// Invokes the request or macro named on a control line.
    ///
    /// An undefined name is defined as an empty macro, with a warning.
    pub(crate) fn interpolate_macro(&mut self, name: Name) -> rl::Result<()> {
        let command = match self.commands_map.get(name) {
            Some(command) => command.clone(),
            None => {
                if self.warn_missing_space(name) {
                    return self.skip_line();
                }
                self.warning(
                    Category::Mac,
                    format!("macro `{}' not defined", self.resolve(name)),
                );
                let buffer = ElementBuffer::new();
                self.commands_map.insert_macro(name, buffer.clone());
                command::Command::Macro(buffer)
            }
        };
        self.invoke(name, command)
    }

    /// Checks whether an undefined name looks like a two character name with a missing space,
    ///     as in `.ftB`.
    ///
    /// Returns true if a warning was issued.
    fn warn_missing_space(&mut self, name: Name) -> bool {
        let full = self.resolve(name).to_string();
        if full.chars().count() <= 2 {
            return false;
        }
        let prefix: String = full.chars().take(2).collect();
        let prefix_is_defined = match self.internal.interner.get(&prefix) {
            None => false,
            Some(prefix) => match self.commands_map.get(prefix) {
                None => false,
                Some(command::Command::BuiltIn(_)) => true,
                Some(command::Command::Macro(buffer)) => !buffer.is_empty(),
            },
        };
        prefix_is_defined
            && self.warning(
                Category::Space,
                format!("macro `{full}' not defined (probably missing space after `{prefix}')"),
            )
    }

    /// Invokes a command.
    ///
    /// A request is called with the current token being the token after its name.
    /// For a macro, the arguments are read and the body is pushed onto the input stack.
    pub(crate) fn invoke(&mut self, name: Name, command: command::Command<S>) -> rl::Result<()> {
        match command {
            command::Command::BuiltIn(request) => {
                tracing::trace!(name = self.resolve(name), "invoking request");
                match request(name, ExecutionInput::new(self)) {
                    Ok(()) => Ok(()),
                    Err(err) => Err(self.add_error_context(err)),
                }
            }
            command::Command::Macro(buffer) => {
                tracing::trace!(name = self.resolve(name), "invoking macro");
                let args = self.decode_args()?;
                self.push_expansion(Expansion::new_macro(buffer, name, "macro", args))?;
                self.next_token()
            }
        }
    }

    /// Defines, appends to or ignores a macro body read up to the terminator line.
    ///
    /// The current token is the token after the request name.
    /// The terminator defaults to `..`; if another terminator is given,
    ///     the macro of that name is invoked when the terminator line is reached.
    pub fn define_macro(
        &mut self,
        mode: DefineMode,
        calling: Calling,
        compatibility: Compatibility,
    ) -> rl::Result<()> {
        if mode == DefineMode::Ignore {
            self.internal.lex.ignoring = true;
        }
        let result = self.define_macro_impl(mode, calling, compatibility);
        self.internal.lex.ignoring = false;
        result
    }

    fn define_macro_impl(
        &mut self,
        mode: DefineMode,
        calling: Calling,
        compatibility: Compatibility,
    ) -> rl::Result<()> {
        if calling == Calling::Indirect {
            let name_string = match self.get_name(true)? {
                None => return self.skip_line(),
                Some(name) => name,
            };
            let terminator_string = self.get_name(false)?;
            self.push_temp(b"\n")?;
            if let Some(terminator_string) = terminator_string {
                self.interpolate_string(terminator_string)?;
                self.push_temp(b" ")?;
            }
            self.interpolate_string(name_string)?;
            self.push_temp(b" ")?;
            self.next_token()?;
        }
        let name = match mode {
            DefineMode::Ignore => None,
            DefineMode::Normal | DefineMode::Append => match self.get_name(true)? {
                None => return self.skip_line(),
                Some(name) => Some(name),
            },
        };
        let dot = self.intern(".");
        let terminator = self.get_name(false)?.unwrap_or(dot);
        while !self.internal.tok.is_newline() && !self.internal.tok.is_eof() {
            self.next_token()?;
        }
        let start_location = self.internal.input.location(false);
        let mut c = self.get_copy(true)?;
        let location = self
            .internal
            .input
            .location(true)
            .map(|(file_name, line)| SourceLocation { file_name, line });
        let mut body = match (mode, name) {
            (DefineMode::Append, Some(name)) => match self.commands_map.get_macro(name) {
                Some(existing) => existing.clone(),
                None => ElementBuffer::with_location(location),
            },
            _ => ElementBuffer::with_location(location),
        };
        let defining = name.is_some();
        if let Some(marker) = compatibility.marker() {
            body.append_byte(marker);
        }
        let terminator_bytes: Vec<u8> = self.resolve(terminator).chars().map(|c| c as u8).collect();
        let mut bol = true;
        loop {
            while let Some(Element::Byte(ESCAPE_NEWLINE)) = c {
                if defining {
                    body.append_byte(ESCAPE_NEWLINE);
                }
                c = self.get_copy(true)?;
            }
            if bol && matches!(c, Some(Element::Byte(b'.'))) {
                let mut d;
                loop {
                    d = self.get_copy(false)?;
                    if !matches!(d, Some(Element::Byte(b' ' | b'\t'))) {
                        break;
                    }
                }
                let mut matched = 0;
                while matched < terminator_bytes.len() {
                    if matched > 0 {
                        d = self.get_copy(false)?;
                    }
                    if !matches!(d, Some(Element::Byte(b)) if b == terminator_bytes[matched]) {
                        break;
                    }
                    matched += 1;
                }
                if matched == terminator_bytes.len() {
                    let complete = if matched == 2 && self.internal.lex.compatible {
                        d = None;
                        true
                    } else {
                        d = self.get_copy(false)?;
                        matches!(d, Some(Element::Byte(b' ' | b'\n')))
                    };
                    if complete {
                        self.internal.tok = match d {
                            Some(Element::Byte(b'\n')) => Token::Newline,
                            _ => Token::Space,
                        };
                        if let Some(name) = name {
                            if compatibility.marker().is_some() {
                                body.append_byte(POP_GROFFCOMP_MODE);
                            }
                            tracing::debug!(name = self.resolve(name), "defined macro");
                            self.commands_map.insert_macro(name, body);
                        }
                        if terminator != dot {
                            self.internal.lex.ignoring = false;
                            return self.interpolate_macro(terminator);
                        }
                        return self.skip_line();
                    }
                }
                if defining {
                    body.append_byte(b'.');
                    body.append_bytes(&terminator_bytes[..matched]);
                }
                c = d;
            }
            match c {
                None => {
                    match name {
                        Some(name) => {
                            let message = format!(
                                "end of file while defining macro `{}'",
                                self.resolve(name)
                            );
                            self.error_at(start_location, message);
                            // The partial definition is kept.
                            if compatibility.marker().is_some() {
                                body.append_byte(POP_GROFFCOMP_MODE);
                            }
                            self.commands_map.insert_macro(name, body);
                        }
                        None => {
                            self.error_at(start_location, "end of file while ignoring input lines")
                        }
                    }
                    return self.next_token();
                }
                Some(element) => {
                    bol = element.is_byte(b'\n');
                    if defining {
                        body.append(element);
                    }
                }
            }
            c = self.get_copy(true)?;
        }
    }

    /// Defines or appends to a string with the rest of the line.
    ///
    /// The current token is the token after the request name.
    pub fn define_string(&mut self, append: bool, compatibility: Compatibility) -> rl::Result<()> {
        let name = match self.get_name(true)? {
            None => return self.skip_line(),
            Some(name) => name,
        };
        let mut c = match &self.internal.tok {
            Token::Newline => Some(Element::Byte(b'\n')),
            Token::Tab => Some(Element::Byte(b'\t')),
            Token::Space => self.get_copy(false)?,
            _ => {
                self.error("bad string definition");
                return self.skip_line();
            }
        };
        while let Some(Element::Byte(b' ')) = c {
            c = self.get_copy(false)?;
        }
        if let Some(Element::Byte(b'"')) = c {
            c = self.get_copy(false)?;
        }
        let mut body = match self.commands_map.get_macro(name) {
            Some(existing) if append => existing.clone(),
            _ => ElementBuffer::new(),
        };
        if let Some(marker) = compatibility.marker() {
            body.append_byte(marker);
        }
        loop {
            match c {
                None => break,
                Some(element) if element.is_byte(b'\n') => break,
                Some(element) => body.append(element),
            }
            c = self.get_copy(false)?;
        }
        if compatibility.marker().is_some() {
            body.append_byte(POP_GROFFCOMP_MODE);
        }
        self.commands_map.insert_macro(name, body);
        self.next_token()
    }
}
