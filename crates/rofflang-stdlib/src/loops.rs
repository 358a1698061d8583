//! Loops (`.while`, `.break`, `.continue`)
//!
//! The body of a loop is read once, without interpretation, and stored together
//!     with the condition.
//! Each iteration pushes the stored body onto the input stack above a boundary
//!     and runs the main loop until the boundary is reached.
//! `.break` and `.continue` drain the input down to the boundary.

use crate::conditional;
use crate::registers;
use rofflang::buffer::{Element, ElementBuffer};
use rofflang::node::{NodeHandle, TokenNode};
use rofflang::prelude as rl;
use rofflang::token::{control, Name};
use rofflang::traits::*;
use rofflang::*;

pub const WHILE_DOC: &str = "Process the body repeatedly while a condition is true";
pub const BREAK_DOC: &str = "Exit the innermost loop";
pub const CONTINUE_DOC: &str = "Skip the rest of the body of the innermost loop";

/// Component for loops.
#[derive(Default)]
pub struct Component {
    depth: usize,
    want_break: bool,
}

/// Get the `.while` request.
pub fn get_while<S: HasComponent<Component> + HasComponent<registers::Component>>(
) -> command::BuiltIn<S> {
    command::BuiltIn::new_request(while_fn).with_doc(WHILE_DOC)
}

fn while_fn<S: HasComponent<Component> + HasComponent<registers::Component>>(
    _: Name,
    input: &mut vm::ExecutionInput<S>,
) -> rl::Result<()> {
    let body = match read_body(input) {
        None => {
            input.error("unbalanced \\{ or \\}");
            return input.next_token();
        }
        Some(body) => body,
    };
    HasComponent::<Component>::component_mut(input.state_mut()).depth += 1;
    input.add_boundary()?;
    let result = run_loop(input, body);
    input.remove_boundary();
    HasComponent::<Component>::component_mut(input.state_mut()).depth -= 1;
    result?;
    input.next_token()
}

/// Reads the condition and body of a loop up to the newline
///     at which every `\{` has been closed.
///
/// The current token is stored first so that the condition can be read from the buffer.
/// Returns [None] if the braces are unbalanced.
fn read_body<S: RoffState>(input: &mut vm::ExecutionInput<S>) -> Option<ElementBuffer> {
    let mut body = ElementBuffer::new();
    body.append_node(NodeHandle::new(TokenNode(input.tok().clone())));
    let escape_char = input.lex().escape_char;
    let mut level: i32 = 0;
    let mut escaped = false;
    while let Some(element) = input.get_raw() {
        let c = match element {
            Element::Node(node) => {
                escaped = false;
                body.append_node(node);
                continue;
            }
            Element::Byte(c) => c,
        };
        body.append_byte(c);
        if escaped {
            match c {
                b'{' => level += 1,
                b'}' => level -= 1,
                _ => {}
            }
            escaped = false;
            continue;
        }
        match c {
            control::ESCAPE_LEFT_BRACE => level += 1,
            control::ESCAPE_RIGHT_BRACE => level -= 1,
            c if Some(c) == escape_char => escaped = true,
            b'\n' if level <= 0 => break,
            _ => {}
        }
    }
    if level != 0 {
        return None;
    }
    Some(body)
}

fn run_loop<S: HasComponent<Component> + HasComponent<registers::Component>>(
    input: &mut vm::ExecutionInput<S>,
    body: ElementBuffer,
) -> rl::Result<()> {
    let mut iterations: usize = 0;
    loop {
        input.push_buffer(body.clone(), None, "while loop")?;
        input.next_token()?;
        if !conditional::do_if(input)? {
            while input.get_raw().is_some() {}
            break;
        }
        iterations += 1;
        input.process_input_stack()?;
        let component = HasComponent::<Component>::component_mut(input.state_mut());
        if component.want_break {
            component.want_break = false;
            break;
        }
        if input.is_return_boundary() || input.exit_requested() {
            break;
        }
    }
    tracing::debug!(iterations, "loop finished");
    Ok(())
}

/// Get the `.break` request.
pub fn get_break<S: HasComponent<Component>>() -> command::BuiltIn<S> {
    command::BuiltIn::new_request(break_fn).with_doc(BREAK_DOC)
}

fn break_fn<S: HasComponent<Component>>(
    _: Name,
    input: &mut vm::ExecutionInput<S>,
) -> rl::Result<()> {
    leave_iteration(input, true)
}

/// Get the `.continue` request.
pub fn get_continue<S: HasComponent<Component>>() -> command::BuiltIn<S> {
    command::BuiltIn::new_request(continue_fn).with_doc(CONTINUE_DOC)
}

fn continue_fn<S: HasComponent<Component>>(
    _: Name,
    input: &mut vm::ExecutionInput<S>,
) -> rl::Result<()> {
    leave_iteration(input, false)
}

fn leave_iteration<S: HasComponent<Component>>(
    input: &mut vm::ExecutionInput<S>,
    want_break: bool,
) -> rl::Result<()> {
    if input.state().component().depth == 0 {
        input.error("no while loop");
        return input.skip_line();
    }
    if want_break {
        input.state_mut().component_mut().want_break = true;
    }
    while input.get_raw().is_some() {}
    input.next_token()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use std::collections::HashMap;

    fn built_in_commands() -> HashMap<&'static str, command::BuiltIn<State>> {
        HashMap::from([
            ("break", get_break()),
            ("continue", get_continue()),
            ("de", crate::def::get_de()),
            ("if", conditional::get_if()),
            ("nr", registers::get_nr()),
            ("while", get_while()),
        ])
    }

    rofflang_testing::test_suite![
        expansion_equality_tests(
            (
                while_counts,
                ".nr i 0\n.while \\ni<3 \\{\\\n.nr i +1\n\\ni\n.\\}\n",
                "1\n2\n3\n"
            ),
            (
                while_single_line_body,
                ".nr i 0\n.while \\ni<3 .nr i +1\n\\ni\n",
                "3\n"
            ),
            (while_false_on_entry, ".while 0 x\ny\n", "y\n"),
            (
                while_break,
                ".nr i 0\n.while 1 \\{\\\n.nr i +1\n.if \\ni=3 .break\n\\ni\n.\\}\nend\n",
                "1\n2\nend\n"
            ),
            (
                while_continue,
                ".nr i 0\n.while \\ni<4 \\{\\\n.nr i +1\n.if \\ni=2 .continue\n\\ni\n.\\}\n",
                "1\n3\n4\n"
            ),
            (
                while_nested,
                concat!(
                    ".nr i 0\n",
                    ".while \\ni<2 \\{\\\n",
                    ".nr i +1\n",
                    ".nr j 0\n",
                    ".while \\nj<2 \\{\\\n",
                    ".nr j +1\n",
                    "\\ni\\nj\n",
                    ".\\}\n",
                    ".\\}\n",
                ),
                "11\n12\n21\n22\n"
            ),
            (
                break_from_macro_in_loop,
                ".de b\n.break\n..\n.nr i 0\n.while 1 \\{\\\n.nr i +1\n.if \\ni=2 .b\n\\ni\n.\\}\n",
                "1\n"
            ),
        ),
        recoverable_error_tests(
            (break_outside_loop, ".break\nx\n", "x\n"),
            (continue_outside_loop, ".continue\nx\n", "x\n"),
            (while_unbalanced_braces, ".while 0 \\{\\\nx\n", ""),
        ),
    ];
}
