//! Control bytes
//!
//! Copy mode translates single-meaning escapes like `\&` or `\{` into reserved
//!     byte values so that they can be stored in an [ElementBuffer](crate::buffer::ElementBuffer)
//!     and replayed later.
//! The same range of bytes is used for the compatibility mode markers wrapped around
//!     macro arguments, and for the quote markers used by `\$@`.
//!
//! None of these bytes can appear in the input: they all lie in the range of
//!     invalid input characters and are dropped when read from a file.

pub const ESCAPE_QUESTION: u8 = 0o15;
pub const BEGIN_TRAP: u8 = 0o16;
pub const END_TRAP: u8 = 0o17;
pub const PAGE_EJECTOR: u8 = 0o20;
pub const ESCAPE_NEWLINE: u8 = 0o21;
pub const ESCAPE_AMPERSAND: u8 = 0o22;
pub const ESCAPE_UNDERSCORE: u8 = 0o23;
pub const ESCAPE_BAR: u8 = 0o24;
pub const ESCAPE_CIRCUMFLEX: u8 = 0o25;
pub const ESCAPE_LEFT_BRACE: u8 = 0o26;
pub const ESCAPE_RIGHT_BRACE: u8 = 0o27;
pub const ESCAPE_LEFT_QUOTE: u8 = 0o30;
pub const ESCAPE_RIGHT_QUOTE: u8 = 0o31;
pub const ESCAPE_HYPHEN: u8 = 0o32;
pub const ESCAPE_BANG: u8 = 0o33;
pub const ESCAPE_C: u8 = 0o34;
pub const ESCAPE_LOWER_E: u8 = 0o35;
pub const ESCAPE_PERCENT: u8 = 0o36;
pub const ESCAPE_SPACE: u8 = 0o37;

pub const ESCAPE_UPPER_E: u8 = 0o204;
pub const LAST_PAGE_EJECTOR: u8 = 0o205;
pub const ESCAPE_RIGHT_PARENTHESIS: u8 = 0o206;
pub const ESCAPE_TILDE: u8 = 0o207;
pub const ESCAPE_COLON: u8 = 0o210;

/// Switch to groff mode until the matching [POP_GROFFCOMP_MODE].
pub const PUSH_GROFF_MODE: u8 = 0o211;
/// Switch to compatibility mode until the matching [POP_GROFFCOMP_MODE].
pub const PUSH_COMP_MODE: u8 = 0o212;
/// Restore the mode saved by the last push marker.
pub const POP_GROFFCOMP_MODE: u8 = 0o213;

pub const BEGIN_QUOTE: u8 = 0o214;
pub const END_QUOTE: u8 = 0o215;

/// Returns whether the byte is a mode push or pop marker.
///
/// These are the bytes that are not part of the logical content of a buffer.
#[inline]
pub fn is_mode_marker(b: u8) -> bool {
    matches!(b, PUSH_GROFF_MODE | PUSH_COMP_MODE | POP_GROFFCOMP_MODE)
}

/// Returns whether the byte is invalid as input.
///
/// This is every C0 control character except backspace, tab, newline, form feed
///     and the leader character, together with the C1 range.
#[inline]
pub fn is_invalid_input_byte(b: u8) -> bool {
    match b {
        0 | 0o13 => true,
        0o15..=0o37 => true,
        0o200..=0o237 => true,
        _ => false,
    }
}

/// Returns the asciified representation of a control byte.
///
/// This is used when a buffer containing control bytes is written out as plain text.
pub fn asciify(b: u8) -> &'static str {
    match b {
        ESCAPE_QUESTION => "\\?",
        ESCAPE_AMPERSAND => "\\&",
        ESCAPE_RIGHT_PARENTHESIS => "\\)",
        ESCAPE_UNDERSCORE => "\\_",
        ESCAPE_BAR => "\\|",
        ESCAPE_CIRCUMFLEX => "\\^",
        ESCAPE_LEFT_BRACE => "\\{",
        ESCAPE_RIGHT_BRACE => "\\}",
        ESCAPE_LEFT_QUOTE => "\\`",
        ESCAPE_RIGHT_QUOTE => "\\'",
        ESCAPE_HYPHEN => "\\-",
        ESCAPE_BANG => "\\!",
        ESCAPE_C => "\\c",
        ESCAPE_LOWER_E => "\\e",
        ESCAPE_PERCENT => "\\%",
        ESCAPE_SPACE => "\\ ",
        ESCAPE_TILDE => "\\~",
        ESCAPE_COLON => "\\:",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_bytes_are_invalid_input() {
        for b in [
            ESCAPE_QUESTION,
            ESCAPE_NEWLINE,
            ESCAPE_SPACE,
            ESCAPE_UPPER_E,
            PUSH_GROFF_MODE,
            PUSH_COMP_MODE,
            POP_GROFFCOMP_MODE,
            BEGIN_QUOTE,
            END_QUOTE,
        ] {
            assert!(is_invalid_input_byte(b), "byte {b:#o}");
        }
    }

    #[test]
    fn ordinary_whitespace_is_valid_input() {
        for b in [b'\t', b'\n', 0o10, 0o1, 0o14, b' ', b'a', 0o240] {
            assert!(!is_invalid_input_byte(b), "byte {b:#o}");
        }
    }
}
