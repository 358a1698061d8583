//! The tokenizer
//!
//! Tokens are read lazily from the input stack.
//! Interpolation escapes push new input and produce no token themselves;
//!     formatting escapes are delivered to the state through hooks;
//!     everything else becomes a [Token].

use super::copymode::ReadMode;
use super::*;
use crate::buffer::Element;
use crate::token::control::*;

impl<S: RoffState> VM<S> {
    /// Reads the next token into the current token.
    pub fn next_token(&mut self) -> rl::Result<()> {
        self.internal.tok = self.read_token()?;
        Ok(())
    }

    fn read_token(&mut self) -> rl::Result<Token> {
        loop {
            let c = match self.get_element() {
                None => return Ok(Token::Eof),
                Some(Element::Node(node)) => return Ok(node_to_token(node)),
                Some(Element::Byte(c)) => c,
            };
            let token = if self.internal.lex.escape_char == Some(c) || c == ESCAPE_UPPER_E {
                self.read_escape()?
            } else {
                self.translate_char(c)?
            };
            if let Some(token) = token {
                return Ok(token);
            }
        }
    }

    /// Translates a byte that is not preceded by the escape character.
    ///
    /// Returns [None] if the byte produces no token.
    fn translate_char(&mut self, c: u8) -> rl::Result<Option<Token>> {
        Ok(Some(match c {
            PUSH_GROFF_MODE => {
                self.push_compatibility(false);
                return Ok(None);
            }
            PUSH_COMP_MODE => {
                self.push_compatibility(true);
                return Ok(None);
            }
            POP_GROFFCOMP_MODE => {
                self.pop_compatibility();
                return Ok(None);
            }
            BEGIN_QUOTE => {
                self.internal.input.increase_level();
                return Ok(None);
            }
            END_QUOTE => {
                self.internal.input.decrease_level();
                return Ok(None);
            }
            ESCAPE_NEWLINE => {
                self.internal.have_input = false;
                return Ok(None);
            }
            BEGIN_TRAP => Token::BeginTrap,
            END_TRAP => Token::EndTrap,
            PAGE_EJECTOR | LAST_PAGE_EJECTOR => Token::PageEjector,
            ESCAPE_PERCENT => Token::HyphenIndicator,
            ESCAPE_SPACE => Token::UnstretchableSpace,
            ESCAPE_TILDE => Token::StretchableSpace,
            ESCAPE_COLON => Token::ZeroWidthBreak,
            ESCAPE_LOWER_E => Token::Escape,
            ESCAPE_BAR => self.escape_node(b'|', ""),
            ESCAPE_CIRCUMFLEX => self.escape_node(b'^', ""),
            ESCAPE_LEFT_BRACE => Token::LeftBrace,
            ESCAPE_RIGHT_BRACE => Token::RightBrace,
            ESCAPE_LEFT_QUOTE => self.special("ga"),
            ESCAPE_RIGHT_QUOTE => self.special("aa"),
            ESCAPE_HYPHEN => self.special("-"),
            ESCAPE_UNDERSCORE => self.special("ul"),
            ESCAPE_C => Token::Interrupt,
            ESCAPE_BANG => Token::Transparent,
            ESCAPE_QUESTION => return self.read_non_interpreted(),
            ESCAPE_AMPERSAND => Token::Dummy,
            ESCAPE_RIGHT_PARENTHESIS => Token::TransparentDummy,
            0o10 => Token::Backspace,
            b' ' => Token::Space,
            b'\t' => Token::Tab,
            b'\n' => Token::Newline,
            0o1 => Token::Leader,
            c => Token::Char(c),
        }))
    }

    /// Reads an escape sequence; the escape character has already been read.
    fn read_escape(&mut self) -> rl::Result<Option<Token>> {
        let cc = match self.get_element() {
            None => {
                self.error("end of input after escape character");
                return Ok(Some(Token::Eof));
            }
            Some(Element::Node(node)) => {
                self.warning(Category::Escape, "escape character ignored before a node");
                return Ok(Some(node_to_token(node)));
            }
            Some(Element::Byte(cc)) => cc,
        };
        let compatible = self.internal.lex.compatible;
        Ok(Some(match cc {
            b'(' => match self.read_two_char_escape_name()? {
                None => return Ok(None),
                Some(name) => self.special(&name),
            },
            b'[' if !compatible => return self.read_long_special(),
            b'[' => return self.translate_char(cc),
            b'`' => self.special("ga"),
            b'\'' => self.special("aa"),
            b'-' => self.special("-"),
            b'_' => self.special("ul"),
            b'%' => Token::HyphenIndicator,
            b' ' => Token::UnstretchableSpace,
            b'~' => Token::StretchableSpace,
            b':' => Token::ZeroWidthBreak,
            b'&' => Token::Dummy,
            b')' => Token::TransparentDummy,
            b'!' => Token::Transparent,
            b'{' => Token::LeftBrace,
            b'}' => Token::RightBrace,
            b'c' => Token::Interrupt,
            b'e' => Token::Escape,
            b'/' => Token::ItalicCorrection,
            b'p' => Token::Spread,
            b'?' => return self.read_non_interpreted(),
            b'E' => return self.read_escape(),
            b'0' | b'|' | b'^' | b',' | b'd' | b'r' | b'u' | b'a' | b't' => {
                self.escape_node(cc, "")
            }
            b'"' => loop {
                match self.get_element() {
                    None => break Token::Eof,
                    Some(Element::Byte(b'\n')) => break Token::Newline,
                    Some(_) => {}
                }
            },
            b'#' => loop {
                match self.get_element() {
                    None => break Token::Eof,
                    Some(Element::Byte(b'\n')) => return Ok(None),
                    Some(_) => {}
                }
            },
            b'\n' => return Ok(None),
            b'$' => {
                if let Some(name) = self.read_escape_name(ReadMode::Normal)? {
                    self.interpolate_arg(&name)?;
                }
                return Ok(None);
            }
            b'*' => {
                self.read_and_interpolate_string()?;
                return Ok(None);
            }
            b'n' => {
                let (name, increment) = self.read_increment_and_escape_name()?;
                if let Some(name) = name {
                    self.interpolate_number_reg(&name, increment)?;
                }
                return Ok(None);
            }
            b'g' => {
                if let Some(name) = self.read_escape_name(ReadMode::Normal)? {
                    self.interpolate_number_format(&name)?;
                }
                return Ok(None);
            }
            b'V' => {
                if let Some(name) = self.read_escape_name(ReadMode::Normal)? {
                    self.interpolate_environment_variable(&name)?;
                }
                return Ok(None);
            }
            b'A' => {
                let valid = self.read_name_test()?;
                Token::Char(if valid { b'1' } else { b'0' })
            }
            b'B' => {
                let valid = self.read_expression_test()?;
                Token::Char(if valid { b'1' } else { b'0' })
            }
            b'b' | b'o' | b'Z' | b'X' => {
                let newline_at_eof = matches!(cc, b'o' | b'Z');
                match self.read_delimited_argument(false, newline_at_eof)? {
                    None => return Ok(None),
                    Some(argument) => self.escape_node(cc, &argument),
                }
            }
            b'D' | b'h' | b'v' | b'x' | b'l' | b'L' => {
                match self.read_delimited_argument(true, true)? {
                    None => return Ok(None),
                    Some(argument) => self.escape_node(cc, &argument),
                }
            }
            b'C' => match self.read_delimited_name()? {
                None => return Ok(None),
                Some(name) => self.special(&name),
            },
            b'N' => {
                let argument = match self.read_delimited_argument(true, true)? {
                    None => return Ok(None),
                    Some(argument) => argument,
                };
                match S::expression_hook(self, &argument) {
                    None => {
                        self.warning(Category::Number, "numeric expression expected");
                        return Ok(None);
                    }
                    Some(n) => match i32::try_from(n) {
                        Ok(n) => Token::NumberedChar(n),
                        Err(_) => {
                            self.warning(Category::Range, "character code out of range");
                            return Ok(None);
                        }
                    },
                }
            }
            b'f' => {
                if let Some(name) = self.read_escape_name(ReadMode::AllowEmpty)? {
                    S::formatting_hook(self, FormattingChange::Font(name));
                    if !compatible {
                        self.internal.have_input = true;
                    }
                }
                return Ok(None);
            }
            b'F' => {
                if let Some(name) = self.read_escape_name(ReadMode::AllowEmpty)? {
                    S::formatting_hook(self, FormattingChange::Family(name));
                    self.internal.have_input = true;
                }
                return Ok(None);
            }
            b'm' | b'M' => {
                if let Some(name) = self.read_escape_name(ReadMode::AllowEmpty)? {
                    let change = if cc == b'm' {
                        FormattingChange::GlyphColor(name)
                    } else {
                        FormattingChange::FillColor(name)
                    };
                    S::formatting_hook(self, change);
                    if !compatible {
                        self.internal.have_input = true;
                    }
                }
                return Ok(None);
            }
            b's' => {
                if let Some(size) = self.read_size()? {
                    S::formatting_hook(self, FormattingChange::Size(size));
                    if !compatible {
                        self.internal.have_input = true;
                    }
                }
                return Ok(None);
            }
            b'H' | b'S' => {
                if let Some(argument) = self.read_delimited_argument(true, true)? {
                    let change = if cc == b'H' {
                        FormattingChange::CharHeight(argument)
                    } else {
                        FormattingChange::CharSlant(argument)
                    };
                    S::formatting_hook(self, change);
                    if !compatible {
                        self.internal.have_input = true;
                    }
                }
                return Ok(None);
            }
            b'R' => {
                self.read_register_assignment()?;
                if !compatible {
                    self.internal.have_input = true;
                }
                return Ok(None);
            }
            b'k' => match self.read_escape_name(ReadMode::Normal)? {
                None => return Ok(None),
                Some(name) => Token::MarkInput(self.intern(&name)),
            },
            b'O' => match self.read_escape_name(ReadMode::Normal)? {
                None => return Ok(None),
                Some(argument) => self.escape_node(cc, &argument),
            },
            b'w' => {
                if let Some(argument) = self.read_delimited_argument(false, false)? {
                    let width = S::width_hook(self, &argument);
                    self.push_temp(width.to_string().into_bytes())?;
                }
                self.internal.have_input = false;
                return Ok(None);
            }
            b'Y' => {
                let name = match self.read_escape_name(ReadMode::Normal)? {
                    None => return Ok(None),
                    Some(name) => self.intern(&name),
                };
                match self.lookup_request(name) {
                    command::Command::BuiltIn(_) => {
                        self.error("can't transparently throughput a request");
                        return Ok(None);
                    }
                    command::Command::Macro(buffer) => {
                        let text = buffer.asciify().to_text();
                        self.escape_node(cc, &text)
                    }
                }
            }
            b'z' => {
                let token = self.read_token()?;
                let mut text = vec![];
                token.write_text(&mut text, &self.internal.interner);
                match token {
                    Token::Char(_) | Token::Special(_) | Token::NumberedChar(_) | Token::Node(_) => {
                        self.escape_node(cc, &token::bytes_to_string(&text))
                    }
                    token => {
                        self.error(format!(
                            "{} is not allowed after `\\z'",
                            token.description()
                        ));
                        return Ok(None);
                    }
                }
            }
            cc => {
                if !self.is_escape_char(cc) && cc != b'.' {
                    self.warning(
                        Category::Escape,
                        format!(
                            "escape character ignored before {}",
                            token::describe_input_char(Some(cc))
                        ),
                    );
                }
                return self.translate_char(cc);
            }
        }))
    }

    fn special(&mut self, name: &str) -> Token {
        Token::Special(self.intern(name))
    }

    fn escape_node(&mut self, escape: u8, argument: &str) -> Token {
        Token::Node(S::node_hook(self, escape, argument))
    }

    /// Reads `\[name]`, or a composite glyph `\[base comp1 comp2]`.
    fn read_long_special(&mut self) -> rl::Result<Option<Token>> {
        let start_level = self.internal.input.level();
        let mut name = vec![];
        let mut components: Vec<Vec<u8>> = vec![];
        loop {
            let c = match self.get_char_for_escape_name(true)? {
                None => return Ok(None),
                Some(c) => c,
            };
            if c == b']' && self.internal.input.level() == start_level {
                break;
            }
            if c == b' ' {
                components.push(vec![]);
                continue;
            }
            match components.last_mut() {
                None => name.push(c),
                Some(component) => component.push(c),
            }
        }
        for component in components.into_iter().filter(|c| !c.is_empty()) {
            name.push(b'_');
            name.extend(component);
        }
        if name.is_empty() {
            self.copy_mode_error("empty escape name");
            return Ok(None);
        }
        Ok(Some(self.special(&token::bytes_to_string(&name))))
    }

    /// Reads `\?...\?`.
    fn read_non_interpreted(&mut self) -> rl::Result<Option<Token>> {
        let mut text = vec![];
        loop {
            match self.get_copy(false)? {
                None | Some(Element::Byte(b'\n')) => {
                    self.error("missing \\?");
                    return Ok(None);
                }
                Some(Element::Byte(ESCAPE_QUESTION)) => break,
                Some(Element::Byte(c)) => text.push(c),
                Some(Element::Node(node)) => text.extend(node.render_to_text().bytes()),
            }
        }
        Ok(Some(self.escape_node(b'?', &token::bytes_to_string(&text))))
    }

    /// Reads tokens up to a closing delimiter that matches the opening one.
    ///
    /// The closing delimiter only matches at the nesting of the opening one, unless
    ///     compatibility mode is on.
    /// At a newline or the end of input a warning is issued and false is returned;
    ///     a newline is pushed back, and so is one at the end of input if `newline_at_eof`.
    fn read_delimited_tokens(
        &mut self,
        start: &Token,
        newline_at_eof: bool,
    ) -> rl::Result<(Vec<Token>, bool)> {
        let start_nesting = self.internal.input.nesting();
        let mut tokens = vec![];
        loop {
            let token = self.read_token()?;
            if token.is_newline() || token.is_eof() {
                self.warning(Category::Delim, "missing closing delimiter");
                if token.is_newline() || newline_at_eof {
                    self.push_temp(b"\n")?;
                }
                return Ok((tokens, false));
            }
            if token == *start
                && (self.internal.lex.compatible || self.internal.input.nesting() == start_nesting)
            {
                return Ok((tokens, true));
            }
            tokens.push(token);
        }
    }

    /// Reads a delimited argument like `'1i'` and returns its text.
    ///
    /// If `check` is true, the opening delimiter must be a valid delimiter.
    fn read_delimited_argument(
        &mut self,
        check: bool,
        newline_at_eof: bool,
    ) -> rl::Result<Option<String>> {
        let start = self.read_token()?;
        if check {
            if let Err(message) = start.check_delimiter() {
                self.error(message);
                return Ok(None);
            }
        }
        if start.is_eof() || start.is_newline() {
            if start.is_newline() {
                self.push_temp(b"\n")?;
            }
            self.warning(Category::Delim, "missing closing delimiter");
            return Ok(None);
        }
        let (tokens, closed) = self.read_delimited_tokens(&start, newline_at_eof)?;
        if !closed && !newline_at_eof {
            return Ok(None);
        }
        Ok(Some(token::write_tokens(&tokens, &self.internal.interner)))
    }

    /// Reads the delimited name of `\C'name'`.
    fn read_delimited_name(&mut self) -> rl::Result<Option<String>> {
        let start = self.read_token()?;
        if start.is_eof() {
            self.error("end of input at start of delimited name");
            return Ok(None);
        }
        if start.is_newline() {
            self.error("can't delimit name with a newline");
            return Ok(None);
        }
        let start_nesting = self.internal.input.nesting();
        let mut name = vec![];
        loop {
            let token = self.read_token()?;
            if token == start
                && (self.internal.lex.compatible || self.internal.input.nesting() == start_nesting)
            {
                break;
            }
            match token.ch() {
                Some(c) => name.push(c),
                None => {
                    self.error(format!("missing delimiter (got {})", token.description()));
                    if token.is_newline() {
                        self.push_temp(b"\n")?;
                    }
                    return Ok(None);
                }
            }
        }
        if name.is_empty() {
            self.error("empty delimited name");
            return Ok(None);
        }
        Ok(Some(token::bytes_to_string(&name)))
    }

    /// `\A'text'`: whether the text is a valid name.
    fn read_name_test(&mut self) -> rl::Result<bool> {
        let start = self.read_token()?;
        if start.is_eof() || start.is_newline() {
            self.warning(Category::Delim, "missing closing delimiter");
            if start.is_newline() {
                self.push_temp(b"\n")?;
            }
            return Ok(false);
        }
        let (tokens, _) = self.read_delimited_tokens(&start, true)?;
        Ok(!tokens.is_empty() && tokens.iter().all(|token| token.ch().is_some()))
    }

    /// `\B'expr'`: whether the text is a valid numeric expression.
    ///
    /// Diagnostics from evaluating the expression are suppressed.
    fn read_expression_test(&mut self) -> rl::Result<bool> {
        let argument = match self.read_delimited_argument(true, true)? {
            None => return Ok(false),
            Some(argument) => argument,
        };
        let saved_mask = self.internal.warning_mask;
        let saved_inhibit = self.internal.inhibit_errors;
        self.internal.warning_mask = WarningMask::NONE;
        self.internal.inhibit_errors = true;
        let result = S::expression_hook(self, &argument);
        self.internal.warning_mask = saved_mask;
        self.internal.inhibit_errors = saved_inhibit;
        Ok(result.is_some())
    }

    /// `\R'name expr'`
    fn read_register_assignment(&mut self) -> rl::Result<()> {
        let argument = match self.read_delimited_argument(true, true)? {
            None => return Ok(()),
            Some(argument) => argument,
        };
        let argument = argument.trim_start();
        let (name, expression) = match argument.split_once([' ', '\t']) {
            None => (argument, ""),
            Some((name, expression)) => (name, expression.trim()),
        };
        if name.is_empty() {
            self.warning(Category::Missing, "missing name");
            return Ok(());
        }
        if expression.is_empty() {
            self.warning(Category::Missing, "missing number");
            return Ok(());
        }
        let name = self.intern(name);
        S::register_assignment_hook(self, name, expression);
        Ok(())
    }

    /// Reads the argument of `\s`.
    ///
    /// The forms `\sN`, `\s±N`, `\s(NN`, `\s±(NN`, `\s(±NN`, `\s'expr'` and `\s[expr]` are accepted.
    /// The size is returned as text with its sign.
    fn read_size(&mut self) -> rl::Result<Option<String>> {
        let mut token = self.read_token()?;
        let mut sign = String::new();
        if let Some(c @ (b'+' | b'-')) = token.ch() {
            sign.push(c as char);
            token = self.read_token()?;
        }
        let mut digits = String::new();
        let bad = match token.ch() {
            Some(b'(') => {
                token = self.read_token()?;
                if sign.is_empty() {
                    if let Some(c @ (b'+' | b'-')) = token.ch() {
                        sign.push(c as char);
                        token = self.read_token()?;
                    }
                }
                let mut bad = false;
                for i in 0..2 {
                    if i == 1 {
                        token = self.read_token()?;
                    }
                    match token.ch() {
                        Some(c) if c.is_ascii_digit() => digits.push(c as char),
                        _ => bad = true,
                    }
                }
                bad
            }
            Some(c) if c.is_ascii_digit() => {
                digits.push(c as char);
                if sign.is_empty() && c != b'0' && c < b'4' {
                    // A two digit size like `\s12` starts with 1, 2 or 3.
                    if let Some(Element::Byte(next)) = self.peek_element() {
                        if next.is_ascii_digit() {
                            self.get_element();
                            digits.push(next as char);
                        }
                    }
                }
                false
            }
            _ => {
                if let Err(message) = token.check_delimiter() {
                    self.error(message);
                    return Ok(None);
                }
                let start = token;
                let closing = if start.ch() == Some(b'[') {
                    Token::Char(b']')
                } else {
                    start.clone()
                };
                loop {
                    let token = self.read_token()?;
                    if token == closing {
                        break;
                    }
                    if token.is_newline() || token.is_eof() {
                        if closing != start {
                            self.error("missing `]'");
                        } else {
                            self.error("missing closing delimiter");
                        }
                        if token.is_newline() {
                            self.push_temp(b"\n")?;
                        }
                        return Ok(None);
                    }
                    let mut text = vec![];
                    token.write_text(&mut text, &self.internal.interner);
                    digits.push_str(&token::bytes_to_string(&text));
                }
                false
            }
        };
        if bad || digits.is_empty() {
            self.error("bad digit in point size");
            return Ok(None);
        }
        Ok(Some(format!("{sign}{digits}")))
    }
}

fn node_to_token(node: NodeHandle) -> Token {
    match node.as_token() {
        Some(token) => token.clone(),
        None => Token::Node(node),
    }
}
