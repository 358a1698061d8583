//! Ending the job (`.ex`, `.ab`)

use rofflang::error;
use rofflang::prelude as rl;
use rofflang::token::Name;
use rofflang::traits::*;
use rofflang::*;

pub const EX_DOC: &str = "Stop processing input";
pub const AB_DOC: &str = "Print a message and abort with a fatal error";

/// Get the `.ex` request.
pub fn get_ex<S: RoffState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_request(ex_fn).with_doc(EX_DOC)
}

fn ex_fn<S: RoffState>(_: Name, input: &mut vm::ExecutionInput<S>) -> rl::Result<()> {
    tracing::debug!("exit requested");
    input.request_exit();
    input.clear_input()
}

/// Get the `.ab` request.
///
/// The message is the rest of the line; if there is none, it is `User Abort.`.
pub fn get_ab<S: RoffState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_request(ab_fn).with_doc(AB_DOC)
}

fn ab_fn<S: RoffState>(_: Name, input: &mut vm::ExecutionInput<S>) -> rl::Result<()> {
    let message = input.read_rest_of_line(false)?.asciify().to_text();
    let message = match message.as_str() {
        "" => "User Abort.".to_string(),
        _ => message,
    };
    Err(error::Error::new(error::SimpleFatalError::new(message)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use std::collections::HashMap;

    fn built_in_commands() -> HashMap<&'static str, command::BuiltIn<State>> {
        HashMap::from([
            ("ab", get_ab()),
            ("de", crate::def::get_de()),
            ("ex", get_ex()),
            ("nr", crate::registers::get_nr()),
            ("while", crate::loops::get_while()),
        ])
    }

    rofflang_testing::test_suite![
        expansion_equality_tests(
            (ex_basic, "a\n.ex\nb\n", "a\n"),
            (ex_in_macro, ".de m\na\n.ex\nb\n..\n.m\nc\n", "a\n"),
            (
                ex_in_loop,
                ".nr i 0\n.while 1 \\{\\\n.nr i +1\n\\ni\n.ex\n.\\}\nafter\n",
                "1\n"
            ),
        ),
        failure_tests(
            (ab_with_message, "a\n.ab something went wrong\nb\n"),
            (ab_without_message, ".ab\n"),
        ),
    ];

    #[test]
    fn ab_message() {
        let mut vm = vm::VM::<State>::new(built_in_commands());
        vm.push_source("input.roff", ".ab  stop \\*[s]now\n").unwrap();
        let err = vm.run::<vm::DefaultHandlers>().unwrap_err();
        assert_eq!(err.title(), "stop now");
    }

    #[test]
    fn ab_default_message() {
        let mut vm = vm::VM::<State>::new(built_in_commands());
        vm.push_source("input.roff", ".ab\n").unwrap();
        let err = vm.run::<vm::DefaultHandlers>().unwrap_err();
        assert_eq!(err.title(), "User Abort.");
    }
}
