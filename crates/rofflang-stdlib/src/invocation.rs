//! Requests that act on the macro being interpolated (`.return`, `.shift`, `.do`, `.nop`)

use rofflang::prelude as rl;
use rofflang::token::Name;
use rofflang::traits::*;
use rofflang::*;

pub const RETURN_DOC: &str = "Stop interpolating the current macro";
pub const SHIFT_DOC: &str = "Shift the arguments of the current macro";
pub const DO_DOC: &str = "Interpret a request or macro with compatibility mode disabled";
pub const NOP_DOC: &str = "Do nothing; the rest of the line is processed as input";

/// Get the `.return` request.
///
/// With an argument, the macro that called the current macro is also left.
pub fn get_return<S: RoffState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_request(return_fn).with_doc(RETURN_DOC)
}

fn return_fn<S: RoffState>(_: Name, input: &mut vm::ExecutionInput<S>) -> rl::Result<()> {
    if input.has_arg()? && input.tok().ch().is_some() {
        input.pop_macro()?;
    }
    input.pop_macro()?;
    input.next_token()
}

/// Get the `.shift` request.
pub fn get_shift<S: RoffState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_request(shift_fn).with_doc(SHIFT_DOC)
}

fn shift_fn<S: RoffState>(_: Name, input: &mut vm::ExecutionInput<S>) -> rl::Result<()> {
    let n = if input.has_arg()? {
        crate::expression::read_expression(input)?.unwrap_or(1)
    } else {
        1
    };
    if n > 0 {
        input.shift(n as usize);
    }
    input.skip_line()
}

/// Get the `.do` request.
pub fn get_do<S: RoffState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_request(do_fn).with_doc(DO_DOC)
}

fn do_fn<S: RoffState>(_: Name, input: &mut vm::ExecutionInput<S>) -> rl::Result<()> {
    let compatible = input.lex().compatible;
    input.set_compatible(false);
    let result = match input.get_name(false) {
        Ok(None) => input.skip_line(),
        Ok(Some(name)) => input.interpolate_macro(name),
        Err(err) => Err(err),
    };
    input.set_compatible(compatible);
    result
}

/// Get the `.nop` request.
pub fn get_nop<S: RoffState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_request(nop_fn).with_doc(NOP_DOC)
}

fn nop_fn<S: RoffState>(_: Name, input: &mut vm::ExecutionInput<S>) -> rl::Result<()> {
    while input.tok().is_space() {
        input.next_token()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use std::collections::HashMap;

    fn built_in_commands() -> HashMap<&'static str, command::BuiltIn<State>> {
        HashMap::from([
            ("de", crate::def::get_de()),
            ("do", get_do()),
            ("ds", crate::def::get_ds()),
            ("if", crate::conditional::get_if()),
            ("nop", get_nop()),
            ("return", get_return()),
            ("shift", get_shift()),
        ])
    }

    rofflang_testing::test_suite![
        expansion_equality_tests(
            (return_basic, ".de m\na\n.return\nb\n..\n.m\nc\n", "a\nc\n"),
            (
                return_from_condition,
                ".de m\na\n.if 1 \\{\\\n.return\n.\\}\nb\n..\n.m\nc\n",
                "a\nc\n"
            ),
            (
                return_with_argument_leaves_caller,
                ".de inner\n.return 2\n..\n.de outer\na\n.inner\nb\n..\n.outer\nc\n",
                "a\nc\n"
            ),
            (
                return_without_argument_stays_in_caller,
                ".de inner\n.return\n..\n.de outer\na\n.inner\nb\n..\n.outer\nc\n",
                "a\nb\nc\n"
            ),
            (shift_one, ".de m\n\\\\$1\n.shift\n\\\\$1\n..\n.m a b\n", "a\nb\n"),
            (shift_two, ".de m\n.shift 2\n\\\\$1 \\\\n(.$\n..\n.m a b c\n", "c 1\n"),
            (shift_past_end, ".de m\n.shift 5\n[\\\\$1]\n..\n.m a b\n", "[]\n"),
            (nop_processes_rest_of_line, ".nop text\n", "text\n"),
            (nop_request_in_rest_of_line, ".nop .ds s x\n\\*s\n", "x\n"),
            (do_request, ".do ds s x\n\\*s\n", "x\n"),
            (do_macro, ".de m\nbody\n..\n.do m\n", "body\n"),
        ),
    ];

    rofflang_testing::test_suite![
        options(
            rofflang_testing::TestOption::BuiltInCommands(built_in_commands),
            rofflang_testing::TestOption::Compatible(true),
        ),
        expansion_equality_tests(
            (
                do_long_name_in_compatibility_mode,
                ".do ds long x\n.do ds s \\*[long]\n.do nop \\*s\n",
                "x\n"
            ),
        ),
    ];
}
