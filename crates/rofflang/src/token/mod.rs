//! Tokens
//!
//! The tokenizer in the [VM](crate::vm) turns the elements of the input into [Token]s.
//! Names of requests, macros, strings, registers and special characters
//!     are interned; a [Name] is a small copyable handle to an interned string.

use crate::node::NodeHandle;

pub mod control;

/// Interned name of a request, macro, string, register or special character.
pub type Name = string_interner::DefaultSymbol;

/// String interner used for [Name]s.
pub type NameInterner = string_interner::DefaultStringInterner;

/// A token.
///
/// Tokens are produced lazily from the input stack by the tokenizer.
#[derive(Clone, Debug)]
pub enum Token {
    /// No token has been read yet.
    Empty,
    /// A literal character.
    Char(u8),
    /// A named special character, like `\(em` or `\[bu]`.
    Special(Name),
    /// A numbered glyph, from `\N'n'`.
    NumberedChar(i32),
    /// A formatting object.
    Node(NodeHandle),
    Space,
    Tab,
    Leader,
    Backspace,
    Newline,
    Eof,
    BeginTrap,
    EndTrap,
    PageEjector,
    /// `\%`
    HyphenIndicator,
    /// `\ `
    UnstretchableSpace,
    /// `\~`
    StretchableSpace,
    /// `\:`
    ZeroWidthBreak,
    /// `\e`
    Escape,
    /// `\{`
    LeftBrace,
    /// `\}`
    RightBrace,
    /// `\c`
    Interrupt,
    /// `\!`
    Transparent,
    /// `\&`
    Dummy,
    /// `\)`
    TransparentDummy,
    /// `\/`
    ItalicCorrection,
    /// `\k`
    MarkInput(Name),
    /// `\p`
    Spread,
}

/// Two tokens are equal if they have the same kind and, for characters,
///     special characters and numbered glyphs, the same value.
///
/// This is the notion of equality used when matching closing delimiters.
impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Token::Char(a), Token::Char(b)) => a == b,
            (Token::Special(a), Token::Special(b)) => a == b,
            (Token::NumberedChar(a), Token::NumberedChar(b)) => a == b,
            _ => std::mem::discriminant(self) == std::mem::discriminant(other),
        }
    }
}

impl Token {
    /// Returns the character if this is a character token.
    #[inline]
    pub fn ch(&self) -> Option<u8> {
        match self {
            Token::Char(c) => Some(*c),
            _ => None,
        }
    }

    #[inline]
    pub fn is_newline(&self) -> bool {
        matches!(self, Token::Newline)
    }

    #[inline]
    pub fn is_eof(&self) -> bool {
        matches!(self, Token::Eof)
    }

    #[inline]
    pub fn is_space(&self) -> bool {
        matches!(self, Token::Space)
    }

    /// Whether the token is a space or a tab.
    #[inline]
    pub fn is_white_space(&self) -> bool {
        matches!(self, Token::Space | Token::Tab)
    }

    /// Checks whether the token may start a delimited escape argument.
    ///
    /// On failure, the error message is returned.
    pub fn check_delimiter(&self) -> Result<(), String> {
        match self {
            Token::Char(c) => match c {
                b'0'..=b'9'
                | b'+'
                | b'-'
                | b'/'
                | b'*'
                | b'%'
                | b'<'
                | b'>'
                | b'='
                | b'&'
                | b':'
                | b'('
                | b')'
                | b'.' => Err(format!(
                    "cannot use character `{}' as a starting delimiter",
                    *c as char
                )),
                _ => Ok(()),
            },
            Token::Node(_)
            | Token::Space
            | Token::StretchableSpace
            | Token::UnstretchableSpace
            | Token::Tab
            | Token::Newline => Err(format!(
                "cannot use {} as a starting delimiter",
                self.description()
            )),
            _ => Ok(()),
        }
    }

    /// Human readable description of the token, used in diagnostics.
    pub fn description(&self) -> String {
        match self {
            Token::Empty => "an empty token".into(),
            Token::Char(c) => match c {
                0o177 => "a delete character".into(),
                c if c.is_ascii_graphic() => format!("`{}'", *c as char),
                c => format!("character code {c}"),
            },
            Token::Special(_) => "a special character".into(),
            Token::NumberedChar(_) => "`\\N'".into(),
            Token::Node(_) => "a node".into(),
            Token::Space => "a space".into(),
            Token::Tab => "a tab character".into(),
            Token::Leader => "a leader character".into(),
            Token::Backspace => "a backspace character".into(),
            Token::Newline => "newline".into(),
            Token::Eof => "end of input".into(),
            Token::BeginTrap => "a begin trap".into(),
            Token::EndTrap => "an end trap".into(),
            Token::PageEjector => "a page ejector".into(),
            Token::HyphenIndicator => "`\\%'".into(),
            Token::UnstretchableSpace => "`\\ '".into(),
            Token::StretchableSpace => "`\\~'".into(),
            Token::ZeroWidthBreak => "`\\:'".into(),
            Token::Escape => "`\\e'".into(),
            Token::LeftBrace => "`\\{'".into(),
            Token::RightBrace => "`\\}'".into(),
            Token::Interrupt => "`\\c'".into(),
            Token::Transparent => "`\\!'".into(),
            Token::Dummy => "`\\&'".into(),
            Token::TransparentDummy => "`\\)'".into(),
            Token::ItalicCorrection => "`\\/'".into(),
            Token::MarkInput(_) => "`\\k'".into(),
            Token::Spread => "`\\p'".into(),
        }
    }

    /// Writes the plain text approximation of the token.
    ///
    /// Special characters are written as `[name]`, nodes through their text rendering,
    ///     and tokens with no textual meaning are not written at all.
    pub fn write_text(&self, out: &mut Vec<u8>, interner: &NameInterner) {
        match self {
            Token::Char(c) => out.push(*c),
            Token::Space | Token::UnstretchableSpace | Token::StretchableSpace => out.push(b' '),
            Token::Tab => out.push(b'\t'),
            Token::Newline => out.push(b'\n'),
            Token::Escape => out.push(b'\\'),
            Token::Special(name) => {
                out.push(b'[');
                out.extend(resolve(interner, *name).bytes());
                out.push(b']');
            }
            Token::NumberedChar(n) => out.extend(format!("[N{n}]").bytes()),
            Token::Node(node) => out.extend(node.render_to_text().bytes()),
            _ => {}
        }
    }
}

/// Resolves a name to a string.
///
/// Every [Name] in a VM is obtained from the VM's interner, so the fallback is never used in practice.
pub fn resolve(interner: &NameInterner, name: Name) -> &str {
    interner.resolve(name).unwrap_or("")
}

/// Writes the plain text approximation of a sequence of tokens.
pub fn write_tokens(tokens: &[Token], interner: &NameInterner) -> String {
    let mut out = Vec::new();
    for token in tokens {
        token.write_text(&mut out, interner);
    }
    bytes_to_string(&out)
}

/// Converts bytes to a string, mapping each byte to the Unicode code point with the same value.
pub fn bytes_to_string(bytes: &[u8]) -> String {
    bytes.iter().map(|b| *b as char).collect()
}

/// Returns a description of an input character for diagnostics about escape names.
pub fn describe_input_char(c: Option<u8>) -> String {
    match c {
        None => "end of input".into(),
        Some(b'\n') => "a newline character".into(),
        Some(0o10) => "a backspace character".into(),
        Some(0o1) => "a leader character".into(),
        Some(b'\t') => "a tab character".into(),
        Some(b' ') => "a space character".into(),
        Some(0) => "a node".into(),
        Some(c) if control::is_invalid_input_byte(c) => {
            let s = control::asciify(c);
            if s.is_empty() {
                format!("magic character code {c}")
            } else {
                format!("`{s}'")
            }
        }
        Some(c) if c.is_ascii_graphic() => format!("`{}'", c as char),
        Some(c) => format!("character code {c}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::EscapeNode;

    #[test]
    fn token_size() {
        assert!(std::mem::size_of::<Token>() <= 32);
    }

    #[test]
    fn equality_compares_values_only_for_characters() {
        assert_eq!(Token::Char(b'a'), Token::Char(b'a'));
        assert_ne!(Token::Char(b'a'), Token::Char(b'b'));
        assert_ne!(Token::Char(b' '), Token::Space);
        let n1 = Token::Node(NodeHandle::new(EscapeNode::new(b'h', "1")));
        let n2 = Token::Node(NodeHandle::new(EscapeNode::new(b'v', "2")));
        assert_eq!(n1, n2);
    }

    #[test]
    fn delimiters() {
        assert!(Token::Char(b'\'').check_delimiter().is_ok());
        assert!(Token::Char(b'|').check_delimiter().is_ok());
        assert!(Token::Escape.check_delimiter().is_ok());
        assert_eq!(
            Token::Char(b'1').check_delimiter(),
            Err("cannot use character `1' as a starting delimiter".to_string())
        );
        assert_eq!(
            Token::Space.check_delimiter(),
            Err("cannot use a space as a starting delimiter".to_string())
        );
    }

    #[test]
    fn write_special_as_bracketed_name() {
        let mut interner = NameInterner::default();
        let em = interner.get_or_intern("em");
        let tokens = vec![
            Token::Char(b'a'),
            Token::Special(em),
            Token::Dummy,
            Token::UnstretchableSpace,
            Token::Newline,
        ];
        assert_eq!(write_tokens(&tokens, &interner), "a[em] \n");
    }

    #[test]
    fn input_char_descriptions() {
        assert_eq!(describe_input_char(Some(b' ')), "a space character");
        assert_eq!(describe_input_char(Some(b'x')), "`x'");
        assert_eq!(
            describe_input_char(Some(control::ESCAPE_AMPERSAND)),
            "`\\&'"
        );
        assert_eq!(
            describe_input_char(Some(control::PUSH_GROFF_MODE)),
            "magic character code 137"
        );
    }
}
