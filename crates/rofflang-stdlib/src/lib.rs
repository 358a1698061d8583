//! # The Rofflang standard library
//!
//! This crate contains implementations of troff requests for Rofflang.
//! Every request is built on the engine API in the `rofflang` crate.

extern crate rofflang;

use std::collections::HashMap;

use rofflang::command;
use rofflang::token::Name;
use rofflang::traits::*;
use rofflang::vm;
use rofflang::vm::implement_has_component;

pub mod conditional;
pub mod def;
pub mod expression;
pub mod input;
pub mod invocation;
pub mod job;
pub mod lexical;
pub mod loops;
pub mod macros;
pub mod registers;
pub mod terminal;
pub mod time;

/// A state struct that is compatible with every request in the Rofflang standard library.
pub struct StdLibState {
    pub conditional: conditional::Component,
    pub input: input::Component,
    pub loops: loops::Component,
    pub registers: registers::Component,
}

impl Default for StdLibState {
    fn default() -> Self {
        StdLibState {
            conditional: Default::default(),
            input: Default::default(),
            loops: Default::default(),
            registers: registers::Component::new(time::Date::now().registers()),
        }
    }
}

impl RoffState for StdLibState {
    #[inline]
    fn expression_hook(_: &mut vm::VM<Self>, expression: &str) -> Option<i64> {
        expression::evaluate(expression).ok()
    }

    #[inline]
    fn number_register_hook(vm: &mut vm::VM<Self>, name: Name, increment: i32) -> Option<String> {
        registers::number_register_hook(vm, name, increment)
    }

    #[inline]
    fn number_format_hook(vm: &mut vm::VM<Self>, name: Name) -> Option<String> {
        registers::number_format_hook(vm, name)
    }

    #[inline]
    fn register_assignment_hook(vm: &mut vm::VM<Self>, name: Name, expression: &str) {
        registers::register_assignment_hook(vm, name, expression)
    }
}

/// Every request in the standard library, for any state that has the required components.
pub fn built_ins<S>() -> HashMap<&'static str, command::BuiltIn<S>>
where
    S: HasComponent<conditional::Component>
        + HasComponent<input::Component>
        + HasComponent<loops::Component>
        + HasComponent<registers::Component>,
{
    HashMap::from([
        ("ab", job::get_ab()),
        ("af", registers::get_af()),
        ("aln", registers::get_aln()),
        ("als", macros::get_als()),
        ("am", def::get_am()),
        ("am1", def::get_am1()),
        ("ami", def::get_ami()),
        ("ami1", def::get_ami1()),
        ("as", def::get_as()),
        ("as1", def::get_as1()),
        ("asciify", macros::get_asciify()),
        //
        ("backtrace", terminal::get_backtrace()),
        ("break", loops::get_break()),
        //
        ("c2", lexical::get_c2()),
        ("cc", lexical::get_cc()),
        ("chop", macros::get_chop()),
        ("continue", loops::get_continue()),
        ("cp", lexical::get_cp()),
        //
        ("de", def::get_de()),
        ("de1", def::get_de1()),
        ("dei", def::get_dei()),
        ("dei1", def::get_dei1()),
        ("do", invocation::get_do()),
        ("ds", def::get_ds()),
        ("ds1", def::get_ds1()),
        //
        ("ec", lexical::get_ec()),
        ("ecr", lexical::get_ecr()),
        ("ecs", lexical::get_ecs()),
        ("el", conditional::get_el()),
        ("eo", lexical::get_eo()),
        ("ex", job::get_ex()),
        //
        ("ie", conditional::get_ie()),
        ("if", conditional::get_if()),
        ("ig", def::get_ig()),
        //
        ("length", macros::get_length()),
        ("lf", input::get_lf()),
        //
        ("mso", input::get_mso()),
        //
        ("nop", invocation::get_nop()),
        ("nr", registers::get_nr()),
        ("nx", input::get_nx()),
        //
        ("return", invocation::get_return()),
        ("rm", macros::get_rm()),
        ("rn", macros::get_rn()),
        ("rnn", registers::get_rnn()),
        ("rr", registers::get_rr()),
        //
        ("shift", invocation::get_shift()),
        ("so", input::get_so()),
        ("substring", macros::get_substring()),
        //
        ("tm", terminal::get_tm()),
        ("tm1", terminal::get_tm1()),
        ("tmc", terminal::get_tmc()),
        //
        ("unformat", macros::get_unformat()),
        //
        ("warn", terminal::get_warn()),
        ("while", loops::get_while()),
    ])
}

impl StdLibState {
    pub fn all_initial_built_ins() -> HashMap<&'static str, command::BuiltIn<StdLibState>> {
        built_ins()
    }

    /// Create a new VM that uses the standard library's state and all of its requests.
    pub fn new_vm() -> Box<vm::VM<StdLibState>> {
        vm::VM::<StdLibState>::new(StdLibState::all_initial_built_ins())
    }

    /// Create a new VM with the provided configuration.
    pub fn new_vm_with_config(config: vm::Config) -> Box<vm::VM<StdLibState>> {
        vm::VM::<StdLibState>::new_with_config(StdLibState::all_initial_built_ins(), config)
    }
}

implement_has_component![
    StdLibState,
    (conditional::Component, conditional),
    (input::Component, input),
    (loops::Component, loops),
    (registers::Component, registers),
];

#[cfg(test)]
mod testing {
    pub use rofflang_testing::*;

    use super::*;
    use rofflang::error::Diagnostic;

    /// State used in the unit tests of this crate.
    ///
    /// It has every component of [StdLibState], and the date registers are not defined.
    #[derive(Default)]
    pub struct State {
        conditional: conditional::Component,
        input: input::Component,
        loops: loops::Component,
        registers: registers::Component,
        testing: TestingComponent,
    }

    impl RoffState for State {
        fn diagnostic_hook(vm: &mut vm::VM<Self>, diagnostic: Diagnostic) {
            TestingComponent::diagnostic_hook(vm, diagnostic)
        }

        fn expression_hook(_: &mut vm::VM<Self>, expression: &str) -> Option<i64> {
            expression::evaluate(expression).ok()
        }

        fn number_register_hook(vm: &mut vm::VM<Self>, name: Name, increment: i32) -> Option<String> {
            registers::number_register_hook(vm, name, increment)
        }

        fn number_format_hook(vm: &mut vm::VM<Self>, name: Name) -> Option<String> {
            registers::number_format_hook(vm, name)
        }

        fn register_assignment_hook(vm: &mut vm::VM<Self>, name: Name, expression: &str) {
            registers::register_assignment_hook(vm, name, expression)
        }
    }

    implement_has_component![
        State,
        (conditional::Component, conditional),
        (input::Component, input),
        (loops::Component, loops),
        (registers::Component, registers),
        (TestingComponent, testing),
    ];
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn built_in_commands() -> HashMap<&'static str, command::BuiltIn<State>> {
        built_ins()
    }

    #[test]
    fn every_request_is_documented() {
        for (name, built_in) in StdLibState::all_initial_built_ins() {
            assert!(built_in.doc().is_some(), "request `{name}' has no documentation");
        }
    }

    #[test]
    fn date_registers_are_defined() {
        let mut vm = StdLibState::new_vm();
        let terminal = Rc::new(RefCell::new(Vec::<u8>::new()));
        let terminal_out: Rc<RefCell<dyn std::io::Write>> = terminal.clone();
        vm.terminal_out = terminal_out;
        vm.push_source(
            "input.roff",
            ".if r year .if r yr .if r dy .if r mo .if r dw .tm yes \\n[hours]\n",
        )
        .unwrap();
        vm.run::<vm::DefaultHandlers>().unwrap();
        let output = String::from_utf8_lossy(&terminal.borrow()).to_string();
        assert!(output.starts_with("yes"), "{output}");
    }

    rofflang_testing::test_suite![
        expansion_equality_tests(
            (
                macro_with_arguments_and_loop,
                concat!(
                    ".de list\n",
                    ".nr i 0\n",
                    ".while \\\\n[i]<\\\\n[.$] \\{\\\n",
                    ".nr i +1\n",
                    "\\\\n[i]. \\\\$1\n",
                    ".shift\n",
                    ".\\}\n",
                    "..\n",
                    ".list a b c\n",
                ),
                "1. a\n2. b\n"
            ),
            (
                compatibility_mode_long_names_with_do,
                concat!(
                    ".ds1 greeting hello\n",
                    ".cp 1\n",
                    ".do ds name world\n",
                    ".do ds s \\*[greeting] \\*[name]\n",
                    "\\*s\n",
                ),
                "hello world\n"
            ),
            (
                string_table_maintenance,
                concat!(
                    ".ds s abcdef\n",
                    ".als t s\n",
                    ".substring s 1 2\n",
                    ".length n \\*t\n",
                    "\\*s \\*t \\nn\n",
                ),
                "bc abcdef 6\n"
            ),
            (
                conditional_macro_definition,
                concat!(
                    ".ie d m .ds r defined\n",
                    ".el \\{\\\n",
                    ".de m\n",
                    "body\n",
                    "..\n",
                    ".ds r new\n",
                    ".\\}\n",
                    ".m\n",
                    "\\*r\n",
                ),
                "body\nnew\n"
            ),
            (
                return_skips_rest_of_macro,
                concat!(
                    ".de m\n",
                    ".if \\\\n[.$]>1 .return\n",
                    "\\\\$1\n",
                    "..\n",
                    ".m one\n",
                    ".m two three\n",
                    ".m four\n",
                ),
                "one\nfour\n"
            ),
        ),
    ];
}
