//! Conditionals (`.if`, `.ie`, `.el`)
//!
//! A condition is followed by a body, which is either the rest of the line
//!     or a block delimited by `\{` and `\}` that may span lines.
//! If the condition is true the body is processed as ordinary input;
//!     otherwise it is skipped without being interpreted.
//!
//! The supported conditions are:
//!
//! - `!cond`: the negation of a condition.
//! - a numeric expression, which is true if it is positive.
//! - `n` and `t`: true and false respectively, as the output is always a terminal.
//! - `o` and `e`: odd and even page; the page number is always 1.
//! - `v`: always false.
//! - `d name`: true if a request, macro or string of that name is defined.
//! - `r name`: true if a number register of that name is defined.
//! - `c ch`: true for every character.
//! - `'a'b'`: true if the two delimited strings render to the same text.

use crate::expression;
use crate::registers;
use rofflang::buffer::ElementBuffer;
use rofflang::error::Category;
use rofflang::prelude as rl;
use rofflang::token::{control, Name, Token};
use rofflang::traits::*;
use rofflang::*;

pub const IF_DOC: &str = "Process the body if a condition is true";
pub const IE_DOC: &str = "Like `.if`, with the result remembered for the matching `.el`";
pub const EL_DOC: &str = "Process the body if the condition of the matching `.ie` was false";

/// Component for conditionals.
#[derive(Default)]
pub struct Component {
    // Results of `.ie` requests that are waiting for their `.el`.
    if_else_stack: Vec<bool>,
}

/// Get the `.if` request.
pub fn get_if<S: HasComponent<Component> + HasComponent<registers::Component>>(
) -> command::BuiltIn<S> {
    command::BuiltIn::new_request(if_fn).with_doc(IF_DOC)
}

fn if_fn<S: HasComponent<Component> + HasComponent<registers::Component>>(
    _: Name,
    input: &mut vm::ExecutionInput<S>,
) -> rl::Result<()> {
    do_if(input)?;
    Ok(())
}

/// Get the `.ie` request.
pub fn get_ie<S: HasComponent<Component> + HasComponent<registers::Component>>(
) -> command::BuiltIn<S> {
    command::BuiltIn::new_request(ie_fn).with_doc(IE_DOC)
}

fn ie_fn<S: HasComponent<Component> + HasComponent<registers::Component>>(
    _: Name,
    input: &mut vm::ExecutionInput<S>,
) -> rl::Result<()> {
    let result = do_if(input)?;
    HasComponent::<Component>::component_mut(input.state_mut())
        .if_else_stack
        .push(result);
    Ok(())
}

/// Get the `.el` request.
pub fn get_el<S: HasComponent<Component>>() -> command::BuiltIn<S> {
    command::BuiltIn::new_request(el_fn).with_doc(EL_DOC)
}

fn el_fn<S: HasComponent<Component>>(
    _: Name,
    input: &mut vm::ExecutionInput<S>,
) -> rl::Result<()> {
    match input.state_mut().component_mut().if_else_stack.pop() {
        None => {
            input.warning(Category::El, "unbalanced .el request");
            skip_alternative(input)
        }
        Some(true) => skip_alternative(input),
        Some(false) => begin_alternative(input),
    }
}

/// Evaluates a condition and then either begins or skips the body that follows it.
///
/// Returns the result of the condition.
/// If the condition could not be read the body is skipped and false is returned.
pub fn do_if<S: HasComponent<registers::Component>>(
    input: &mut vm::ExecutionInput<S>,
) -> rl::Result<bool> {
    while input.tok().is_space() {
        input.next_token()?;
    }
    let mut invert = false;
    while input.tok().ch() == Some(b'!') {
        input.next_token()?;
        invert = !invert;
    }
    let result = match evaluate_condition(input)? {
        Condition::Invalid => {
            skip_alternative(input)?;
            return Ok(false);
        }
        // The rest of the line has already been consumed.
        Condition::Abandoned => return Ok(false),
        Condition::Valid(result) => result != invert,
    };
    tracing::debug!(result, "condition evaluated");
    if result {
        begin_alternative(input)?;
    } else {
        skip_alternative(input)?;
    }
    Ok(result)
}

enum Condition {
    Valid(bool),
    Invalid,
    Abandoned,
}

/// Reads a condition.
///
/// If the condition is not valid a diagnostic has been issued.
fn evaluate_condition<S: HasComponent<registers::Component>>(
    input: &mut vm::ExecutionInput<S>,
) -> rl::Result<Condition> {
    let result = match input.tok().ch() {
        Some(b'n') | Some(b'o') => {
            input.next_token()?;
            true
        }
        Some(b't') | Some(b'e') | Some(b'v') => {
            input.next_token()?;
            false
        }
        Some(c @ (b'd' | b'r')) => {
            input.next_token()?;
            let name = match input.get_name(true)? {
                None => return Ok(Condition::Invalid),
                Some(name) => name,
            };
            if c == b'd' {
                input.commands_map().contains(name)
            } else {
                registers::is_defined(input.vm_mut(), name)
            }
        }
        Some(b'c') => {
            input.next_token()?;
            while input.tok().is_space() {
                input.next_token()?;
            }
            match input.tok() {
                Token::Char(_) | Token::Special(_) | Token::NumberedChar(_) => {}
                tok => {
                    let message = format!(
                        "expected ordinary or special character, got {}",
                        tok.description()
                    );
                    input.error(message);
                    return Ok(Condition::Invalid);
                }
            }
            input.next_token()?;
            true
        }
        _ if input.tok().is_space() => false,
        _ if !input.tok().is_eof() && input.tok().check_delimiter().is_ok() => {
            match compare_strings(input)? {
                None => return Ok(Condition::Abandoned),
                Some(result) => result,
            }
        }
        _ => match expression::read_expression(input)? {
            None => return Ok(Condition::Invalid),
            Some(n) => n > 0,
        },
    };
    Ok(Condition::Valid(result))
}

/// Compares two delimited strings, as in `.if 'a'b'`.
///
/// The strings are compared after interpretation.
/// Nodes are compared with each other, not by their text rendering.
fn compare_strings<S: RoffState>(input: &mut vm::ExecutionInput<S>) -> rl::Result<Option<bool>> {
    let delimiter = input.tok().clone();
    let nesting = input.nesting();
    let mut buffers = [ElementBuffer::new(), ElementBuffer::new()];
    for buffer in buffers.iter_mut() {
        loop {
            input.next_token()?;
            let tok = input.tok().clone();
            if tok.is_newline() || tok.is_eof() {
                input.warning(Category::Delim, "missing closing delimiter");
                input.next_token()?;
                return Ok(None);
            }
            if tok == delimiter && (input.lex().compatible || input.nesting() == nesting) {
                break;
            }
            match tok {
                Token::Node(node) => buffer.append_node(node),
                tok => buffer.append_str(&input.token_text(&tok)),
            }
        }
    }
    input.next_token()?;
    Ok(Some(buffers[0] == buffers[1]))
}

/// Prepares to process the body of a true condition.
pub fn begin_alternative<S: RoffState>(input: &mut vm::ExecutionInput<S>) -> rl::Result<()> {
    while input.tok().is_space() || matches!(input.tok(), Token::LeftBrace) {
        input.next_token()?;
    }
    Ok(())
}

/// Skips the body of a false condition.
///
/// The body is read without interpretation until a newline
///     at which every `\{` read so far has been closed.
pub fn skip_alternative<S: RoffState>(input: &mut vm::ExecutionInput<S>) -> rl::Result<()> {
    // An empty body.
    if input.tok().is_newline() || input.tok().is_eof() {
        return input.next_token();
    }
    let mut level: i32 = 0;
    if matches!(input.tok(), Token::LeftBrace) {
        level += 1;
    }
    let escape_char = input.lex().escape_char;
    loop {
        let mut c = match input.get_raw() {
            None => break,
            Some(element) => match element.byte() {
                None => continue,
                Some(c) => c,
            },
        };
        match c {
            control::ESCAPE_LEFT_BRACE => level += 1,
            control::ESCAPE_RIGHT_BRACE => level -= 1,
            b if Some(b) == escape_char => match input.get_raw().and_then(|e| e.byte()) {
                Some(b'{') => level += 1,
                Some(b'}') => level -= 1,
                Some(b'"') => loop {
                    match input.get_raw().map(|e| e.byte()) {
                        None => break,
                        Some(Some(b'\n')) => {
                            c = b'\n';
                            break;
                        }
                        Some(_) => {}
                    }
                },
                _ => {}
            },
            _ => {}
        }
        // The level can be negative, as in `.if 1 \{\` followed by `.if 0 \{\` and `.\}\}`.
        if level <= 0 && c == b'\n' {
            break;
        }
    }
    input.next_token()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use std::collections::HashMap;

    fn built_in_commands() -> HashMap<&'static str, command::BuiltIn<State>> {
        HashMap::from([
            ("de", crate::def::get_de()),
            ("ds", crate::def::get_ds()),
            ("el", get_el()),
            ("ie", get_ie()),
            ("if", get_if()),
            ("nr", registers::get_nr()),
        ])
    }

    rofflang_testing::test_suite![
        expansion_equality_tests(
            (if_true, ".if 1 yes\n", "yes\n"),
            (if_false, ".if 0 yes\nno\n", "no\n"),
            (if_expression, ".if 2>1 yes\n", "yes\n"),
            (if_negative_is_false, ".if -1 yes\nno\n", "no\n"),
            (if_register, ".nr x 3\n.if \\nx=3 yes\n", "yes\n"),
            (if_not, ".if !0 yes\n", "yes\n"),
            (if_double_not, ".if !!1 yes\n", "yes\n"),
            (if_nroff, ".if n yes\n.if t no\n", "yes\n"),
            (if_page_parity, ".if o odd\n.if e even\n", "odd\n"),
            (if_vroff, ".if v yes\nno\n", "no\n"),
            (if_defined_macro, ".de m\n..\n.if d m yes\n.if d x no\n", "yes\n"),
            (if_defined_request, ".if d if yes\n", "yes\n"),
            (if_defined_register, ".nr x 0\n.if r x yes\n.if r y no\n", "yes\n"),
            (if_character, ".if c a yes\n", "yes\n"),
            (if_string_equal, ".if 'abc'abc' yes\n", "yes\n"),
            (if_string_not_equal, ".if 'abc'abd' yes\nno\n", "no\n"),
            (
                if_string_interpolated,
                ".ds s abc\n.if '\\*s'abc' yes\n",
                "yes\n"
            ),
            (if_string_other_delimiter, ".if |a|a| yes\n", "yes\n"),
            (
                if_string_equal_nodes,
                ".if |\\h'1'x|\\h'1'x| yes\n",
                "yes\n"
            ),
            (
                if_string_nodes_with_same_text,
                ".if |\\h'1'x|\\h'2'x| yes\nno\n",
                "no\n"
            ),
            (if_body_is_control_line, ".if 1 .ds s x\n\\*s\n", "x\n"),
            (
                if_braces,
                ".if 1 \\{\\\na\nb\n.\\}\nc\n",
                "a\nb\nc\n"
            ),
            (
                if_braces_skipped,
                ".if 0 \\{\\\na\nb\n.\\}\nc\n",
                "c\n"
            ),
            (
                if_braces_nested_skipped,
                ".if 0 \\{\\\n.if 1 \\{\\\na\n.\\}\nb\n.\\}\nc\n",
                "c\n"
            ),
            (
                if_braces_closed_on_same_line,
                ".if 0 \\{ a \\}\nc\n",
                "c\n"
            ),
            (
                if_skipped_comment_ends_line,
                ".if 0 \\{ a \\\" \\}\n\\}\nc\n",
                "c\n"
            ),
            (
                if_skipped_comment_without_braces,
                ".if 0 a \\\" comment\nb\n",
                "b\n"
            ),
            (if_empty_body, ".if 0\nc\n", "c\n"),
            (ie_true, ".ie 1 yes\n.el no\n", "yes\n"),
            (ie_false, ".ie 0 yes\n.el no\n", "no\n"),
            (
                ie_nested,
                ".ie 1 \\{\\\n.ie 0 a\n.el b\n.\\}\n.el c\n",
                "b\n"
            ),
            (
                ie_braces,
                ".ie 0 \\{\\\na\n.\\}\n.el \\{\\\nb\n.\\}\n",
                "b\n"
            ),
        ),
        warning_tests(
            (el_unbalanced, ".el x\ny\n", "y\n", [Category::El]),
            (
                if_missing_closing_delimiter,
                ".if 'a'b\ny\n",
                "y\n",
                [Category::Delim]
            ),
            (if_bad_expression, ".if (1\ny\n", "y\n", [Category::Number]),
        ),
    ];
}
