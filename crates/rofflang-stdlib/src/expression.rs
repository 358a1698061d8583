//! Numeric expressions
//!
//! Expressions are evaluated strictly left to right; there is no operator precedence.
//! Scaling indicators after numbers are accepted and ignored,
//!     and the fractional part of a number is dropped.
//!
//! Requests read expressions from the token stream with [read_expression].
//! By the time an expression is read, registers and strings in it have already been interpolated,
//!     so the evaluator only sees digits, operators and parentheses.

use rofflang::error::Category;
use rofflang::prelude as rl;
use rofflang::token::Token;
use rofflang::traits::*;
use rofflang::vm;

/// Error returned when evaluating an expression fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpressionError {
    /// Something other than an expression was found at the offset.
    Expected(usize),
    DivisionByZero,
    Overflow,
}

const SCALING_INDICATORS: &[u8] = b"uicpPmnvMsfz";

/// Evaluates an expression.
pub fn evaluate(expression: &str) -> Result<i64, ExpressionError> {
    let mut parser = Parser {
        bytes: expression.as_bytes(),
        i: 0,
    };
    let value = parser.parse_expression(false)?;
    if parser.i != parser.bytes.len() {
        return Err(ExpressionError::Expected(parser.i));
    }
    Ok(value)
}

struct Parser<'a> {
    bytes: &'a [u8],
    i: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.i).copied()
    }

    fn skip_spaces(&mut self, parenthesized: bool) {
        if parenthesized {
            while self.peek() == Some(b' ') {
                self.i += 1;
            }
        }
    }

    fn parse_expression(&mut self, parenthesized: bool) -> Result<i64, ExpressionError> {
        let mut value = self.parse_term(parenthesized)?;
        loop {
            self.skip_spaces(parenthesized);
            let op = match (self.peek(), self.bytes.get(self.i + 1).copied()) {
                (Some(b'<'), Some(b'=')) => "<=",
                (Some(b'>'), Some(b'=')) => ">=",
                (Some(b'='), Some(b'=')) => "==",
                (Some(b'<'), Some(b'?')) => "<?",
                (Some(b'>'), Some(b'?')) => ">?",
                (Some(b'+'), _) => "+",
                (Some(b'-'), _) => "-",
                (Some(b'*'), _) => "*",
                (Some(b'/'), _) => "/",
                (Some(b'%'), _) => "%",
                (Some(b'<'), _) => "<",
                (Some(b'>'), _) => ">",
                (Some(b'='), _) => "=",
                (Some(b'&'), _) => "&",
                (Some(b':'), _) => ":",
                _ => return Ok(value),
            };
            self.i += op.len();
            let rhs = self.parse_term(parenthesized)?;
            value = match op {
                "+" => value.checked_add(rhs).ok_or(ExpressionError::Overflow)?,
                "-" => value.checked_sub(rhs).ok_or(ExpressionError::Overflow)?,
                "*" => value.checked_mul(rhs).ok_or(ExpressionError::Overflow)?,
                "/" => {
                    if rhs == 0 {
                        return Err(ExpressionError::DivisionByZero);
                    }
                    value.checked_div(rhs).ok_or(ExpressionError::Overflow)?
                }
                "%" => {
                    if rhs == 0 {
                        return Err(ExpressionError::DivisionByZero);
                    }
                    value.checked_rem(rhs).ok_or(ExpressionError::Overflow)?
                }
                "<" => (value < rhs) as i64,
                ">" => (value > rhs) as i64,
                "<=" => (value <= rhs) as i64,
                ">=" => (value >= rhs) as i64,
                "=" | "==" => (value == rhs) as i64,
                "&" => (value > 0 && rhs > 0) as i64,
                ":" => (value > 0 || rhs > 0) as i64,
                "<?" => value.min(rhs),
                _ => value.max(rhs),
            };
        }
    }

    fn parse_term(&mut self, parenthesized: bool) -> Result<i64, ExpressionError> {
        self.skip_spaces(parenthesized);
        match self.peek() {
            Some(b'+') => {
                self.i += 1;
                self.parse_term(parenthesized)
            }
            Some(b'-') => {
                self.i += 1;
                let value = self.parse_term(parenthesized)?;
                value.checked_neg().ok_or(ExpressionError::Overflow)
            }
            // Absolute position indicator; there is no position so it is dropped.
            Some(b'|') => {
                self.i += 1;
                self.parse_term(parenthesized)
            }
            Some(b'(') => {
                self.i += 1;
                let value = self.parse_expression(true)?;
                self.skip_spaces(true);
                if self.peek() != Some(b')') {
                    return Err(ExpressionError::Expected(self.i));
                }
                self.i += 1;
                Ok(value)
            }
            Some(c) if c.is_ascii_digit() || c == b'.' => self.parse_number(),
            _ => Err(ExpressionError::Expected(self.i)),
        }
    }

    fn parse_number(&mut self) -> Result<i64, ExpressionError> {
        let mut value: i64 = 0;
        let mut digits = 0;
        while let Some(c) = self.peek().filter(u8::is_ascii_digit) {
            value = value
                .checked_mul(10)
                .and_then(|v| v.checked_add((c - b'0') as i64))
                .ok_or(ExpressionError::Overflow)?;
            digits += 1;
            self.i += 1;
        }
        if self.peek() == Some(b'.') {
            self.i += 1;
            while self.peek().filter(u8::is_ascii_digit).is_some() {
                digits += 1;
                self.i += 1;
            }
        }
        if digits == 0 {
            return Err(ExpressionError::Expected(self.i));
        }
        if self
            .peek()
            .map(|c| SCALING_INDICATORS.contains(&c))
            .unwrap_or(false)
        {
            self.i += 1;
        }
        Ok(value)
    }
}

fn is_expression_char(c: u8, previous: Option<u8>) -> bool {
    match c {
        b'0'..=b'9' | b'.' | b'+' | b'-' | b'*' | b'/' | b'%' | b'<' | b'>' | b'=' | b'&'
        | b':' | b'(' | b')' | b'?' | b'|' => true,
        c if SCALING_INDICATORS.contains(&c) => {
            matches!(previous, Some(p) if p.is_ascii_digit() || p == b'.')
        }
        _ => false,
    }
}

/// Reads the text of an expression from the token stream.
///
/// Leading spaces are skipped.
/// The expression ends at the first token that cannot be part of it;
///     spaces are only part of an expression inside parentheses.
/// The terminating token is left as the current token.
pub fn read_expression_text<S: RoffState>(input: &mut vm::ExecutionInput<S>) -> rl::Result<String> {
    while input.tok().is_space() {
        input.next_token()?;
    }
    let mut text: Vec<u8> = vec![];
    let mut depth = 0_usize;
    loop {
        match *input.tok() {
            Token::Char(c) if is_expression_char(c, text.last().copied()) => {
                match c {
                    b'(' => depth += 1,
                    b')' => depth = depth.saturating_sub(1),
                    _ => {}
                }
                text.push(c);
            }
            Token::Space if depth > 0 => text.push(b' '),
            _ => break,
        }
        input.next_token()?;
    }
    Ok(text.into_iter().map(char::from).collect())
}

/// Reads and evaluates an expression.
///
/// Returns [None] if there is no valid expression; a diagnostic has then been issued.
pub fn read_expression<S: RoffState>(input: &mut vm::ExecutionInput<S>) -> rl::Result<Option<i64>> {
    let text = read_expression_text(input)?;
    let end = input.tok().description();
    Ok(evaluate_or_report(input, &text, &end))
}

/// Reads an expression that is relative to a previous value if it starts with `+` or `-`.
///
/// This is how `.nr` reads the new value of a register.
pub fn read_relative_expression<S: RoffState>(
    input: &mut vm::ExecutionInput<S>,
    previous: i64,
) -> rl::Result<Option<i64>> {
    let text = read_expression_text(input)?;
    let end = input.tok().description();
    Ok(evaluate_relative(input, &text, previous, &end))
}

/// Evaluates an expression that may be relative to a previous value.
///
/// The description of what follows the expression is used in diagnostics.
pub fn evaluate_relative<S: RoffState>(
    input: &mut vm::ExecutionInput<S>,
    text: &str,
    previous: i64,
    end: &str,
) -> Option<i64> {
    let (subtract, rest) = match text.as_bytes().first() {
        Some(b'+') => (false, &text[1..]),
        Some(b'-') => (true, &text[1..]),
        _ => return evaluate_or_report(input, text, end),
    };
    let value = evaluate_or_report(input, rest, end)?;
    let result = match subtract {
        true => previous.checked_sub(value),
        false => previous.checked_add(value),
    };
    match result {
        None => {
            input.error("numeric overflow");
            None
        }
        Some(v) => Some(v),
    }
}

/// Evaluates an expression, issuing a diagnostic if it is not valid.
pub fn evaluate_or_report<S: RoffState>(
    input: &mut vm::ExecutionInput<S>,
    text: &str,
    end: &str,
) -> Option<i64> {
    match evaluate(text) {
        Ok(value) => Some(value),
        Err(ExpressionError::Expected(i)) => {
            let got = match text.as_bytes().get(i) {
                None => end.to_string(),
                Some(c) => format!("`{}'", *c as char),
            };
            tracing::debug!(expression = text, "bad expression");
            input.warning(
                Category::Number,
                format!("numeric expression expected (got {got})"),
            );
            None
        }
        Err(ExpressionError::DivisionByZero) => {
            input.error("division by zero");
            None
        }
        Err(ExpressionError::Overflow) => {
            input.error("numeric overflow");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! evaluate_tests {
        ( $( ($name: ident, $input: expr, $want: expr), )+ ) => {
            $(
                #[test]
                fn $name() {
                    assert_eq!(evaluate($input), $want);
                }
            )+
        };
    }

    evaluate_tests![
        (integer, "42", Ok(42)),
        (no_precedence, "1+2*3", Ok(9)),
        (parentheses, "1+(2*3)", Ok(7)),
        (spaces_in_parentheses, "( 1 + 2 )*2", Ok(6)),
        (unary_minus, "-3+1", Ok(-2)),
        (comparison, "3>2", Ok(1)),
        (comparison_equal, "2==3", Ok(0)),
        (single_equal, "2=2", Ok(1)),
        (logical_and, "1&0", Ok(0)),
        (logical_or, "1:0", Ok(1)),
        (less_equal, "2<=2", Ok(1)),
        (minimum, "3<?5", Ok(3)),
        (maximum, "3>?5", Ok(5)),
        (scaling_indicator, "2i+1u", Ok(3)),
        (fraction_is_dropped, "1.75", Ok(1)),
        (modulo, "7%3", Ok(1)),
        (division_by_zero, "1/0", Err(ExpressionError::DivisionByZero)),
        (
            division_overflow,
            "(0-9223372036854775807-1)/(0-1)",
            Err(ExpressionError::Overflow)
        ),
        (
            modulo_overflow,
            "(0-9223372036854775807-1)%(0-1)",
            Err(ExpressionError::Overflow)
        ),
        (trailing_operator, "1+", Err(ExpressionError::Expected(2))),
        (empty, "", Err(ExpressionError::Expected(0))),
        (unbalanced, "(1", Err(ExpressionError::Expected(2))),
        (trailing_garbage, "1)", Err(ExpressionError::Expected(1))),
        (space_outside_parentheses, "1 +1", Err(ExpressionError::Expected(1))),
        (
            overflow,
            "99999999999999999999",
            Err(ExpressionError::Overflow)
        ),
    ];

    #[test]
    fn scaling_indicator_only_after_number() {
        assert!(is_expression_char(b'i', Some(b'2')));
        assert!(!is_expression_char(b'i', Some(b'+')));
        assert!(!is_expression_char(b'i', None));
    }
}
