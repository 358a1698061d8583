//! Macro and string definition (`.de`, `.am`, `.ds`, `.as`, `.ig` and their variants)
//!
//! The variants ending in `1` read and interpolate the body with compatibility mode disabled.
//! The variants ending in `i` read the names of the macro and the terminator
//!     from strings.

use rofflang::prelude as rl;
use rofflang::token::Name;
use rofflang::traits::*;
use rofflang::vm::{Calling, Compatibility, DefineMode};
use rofflang::*;

pub const DE_DOC: &str = "Define a macro";
pub const DE1_DOC: &str = "Define a macro that is run with compatibility mode disabled";
pub const DEI_DOC: &str = "Define a macro whose name is stored in a string";
pub const DEI1_DOC: &str = "Like `.dei`, with compatibility mode disabled";
pub const AM_DOC: &str = "Append to a macro";
pub const AM1_DOC: &str = "Append to a macro, with compatibility mode disabled";
pub const AMI_DOC: &str = "Append to a macro whose name is stored in a string";
pub const AMI1_DOC: &str = "Like `.ami`, with compatibility mode disabled";
pub const DS_DOC: &str = "Define a string";
pub const DS1_DOC: &str = "Define a string that is interpolated with compatibility mode disabled";
pub const AS_DOC: &str = "Append to a string";
pub const AS1_DOC: &str = "Append to a string, with compatibility mode disabled";
pub const IG_DOC: &str = "Ignore input until the terminator";

macro_rules! define_macro_requests {
    ( $( ($getter: ident, $name: literal, $doc: ident, $mode: expr, $calling: expr, $compatibility: expr), )+ ) => {
        $(
            #[doc = concat!("Get the `.", $name, "` request.")]
            pub fn $getter<S: RoffState>() -> command::BuiltIn<S> {
                fn request_fn<S: RoffState>(
                    _: Name,
                    input: &mut vm::ExecutionInput<S>,
                ) -> rl::Result<()> {
                    input.define_macro($mode, $calling, $compatibility)
                }
                command::BuiltIn::new_request(request_fn).with_doc($doc)
            }
        )+
    };
}

define_macro_requests![
    (get_de, "de", DE_DOC, DefineMode::Normal, Calling::Normal, Compatibility::Ignore),
    (get_de1, "de1", DE1_DOC, DefineMode::Normal, Calling::Normal, Compatibility::Disable),
    (get_dei, "dei", DEI_DOC, DefineMode::Normal, Calling::Indirect, Compatibility::Ignore),
    (get_dei1, "dei1", DEI1_DOC, DefineMode::Normal, Calling::Indirect, Compatibility::Disable),
    (get_am, "am", AM_DOC, DefineMode::Append, Calling::Normal, Compatibility::Ignore),
    (get_am1, "am1", AM1_DOC, DefineMode::Append, Calling::Normal, Compatibility::Disable),
    (get_ami, "ami", AMI_DOC, DefineMode::Append, Calling::Indirect, Compatibility::Ignore),
    (get_ami1, "ami1", AMI1_DOC, DefineMode::Append, Calling::Indirect, Compatibility::Disable),
    (get_ig, "ig", IG_DOC, DefineMode::Ignore, Calling::Normal, Compatibility::Ignore),
];

/// Get the `.ds` request.
pub fn get_ds<S: RoffState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_request(ds_fn).with_doc(DS_DOC)
}

fn ds_fn<S: RoffState>(_: Name, input: &mut vm::ExecutionInput<S>) -> rl::Result<()> {
    input.define_string(false, Compatibility::Ignore)
}

/// Get the `.ds1` request.
pub fn get_ds1<S: RoffState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_request(ds1_fn).with_doc(DS1_DOC)
}

fn ds1_fn<S: RoffState>(_: Name, input: &mut vm::ExecutionInput<S>) -> rl::Result<()> {
    input.define_string(false, Compatibility::Disable)
}

/// Get the `.as` request.
pub fn get_as<S: RoffState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_request(as_fn).with_doc(AS_DOC)
}

fn as_fn<S: RoffState>(_: Name, input: &mut vm::ExecutionInput<S>) -> rl::Result<()> {
    input.define_string(true, Compatibility::Ignore)
}

/// Get the `.as1` request.
pub fn get_as1<S: RoffState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_request(as1_fn).with_doc(AS1_DOC)
}

fn as1_fn<S: RoffState>(_: Name, input: &mut vm::ExecutionInput<S>) -> rl::Result<()> {
    input.define_string(true, Compatibility::Disable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use rofflang::error::Category;
    use std::collections::HashMap;

    fn built_in_commands() -> HashMap<&'static str, command::BuiltIn<State>> {
        HashMap::from([
            ("am", get_am()),
            ("am1", get_am1()),
            ("ami", get_ami()),
            ("ami1", get_ami1()),
            ("as", get_as()),
            ("as1", get_as1()),
            ("de", get_de()),
            ("de1", get_de1()),
            ("dei", get_dei()),
            ("dei1", get_dei1()),
            ("ds", get_ds()),
            ("ds1", get_ds1()),
            ("ig", get_ig()),
        ])
    }

    rofflang_testing::test_suite![
        expansion_equality_tests(
            (de_basic, ".de m\nHello\n..\n.m\n", "Hello\n"),
            (de_arguments, ".de m\n\\\\$1-\\\\$2\n..\n.m a b\n", "a-b\n"),
            (de_missing_arguments, ".de m\n\\\\$1-\\\\$2\n..\n.m\n", "-\n"),
            (
                de_all_arguments,
                ".de m\n\\\\$*|\\\\$@\n..\n.m \"a b\" c\n",
                "a b c|\"a b\" \"c\"\n"
            ),
            (de_round_trip, ".de m\nx y  z\n\n..\n.m\n", "x y  z\n\n"),
            (de_redefine, ".de m\nA\n..\n.de m\nB\n..\n.m\n", "B\n"),
            (
                de_custom_terminator,
                ".de m xx\nbody\n.xx\n.m\n",
                "body\n"
            ),
            (de_nested_definition, ".de a\n.de b\nB\n\\\\..\n..\n.a\n.b\n", "B\n"),
            (
                de_escaped_newline_continues_body,
                ".de m\na\\\nb\n..\n.m\n",
                "ab\n"
            ),
            (am_appends, ".de m\nA\n..\n.am m\nB\n..\n.m\n", "A\nB\n"),
            (am_creates, ".am m\nB\n..\n.m\n", "B\n"),
            (
                dei_indirect_names,
                ".ds n m\n.ds t end\n.dei n t\nbody\n.end\n.m\n",
                "body\n"
            ),
            (ami_indirect, ".ds n m\n.de m\nA\n..\n.ami n\nB\n..\n.m\n", "A\nB\n"),
            (ds_basic, ".ds s hello\n\\*s\n", "hello\n"),
            (ds_leading_quote, ".ds s \"  padded\n[\\*s]\n", "[  padded]\n"),
            (ds_empty, ".ds s\n[\\*s]\n", "[]\n"),
            (as_appends, ".ds s a\n.as s b\n\\*s\n", "ab\n"),
            (as_creates, ".as s b\n\\*s\n", "b\n"),
            (
                string_with_arguments,
                ".ds s <\\\\$1>\n\\*[s arg]\n",
                "<arg>\n"
            ),
            (ig_basic, "a\n.ig\nb\n..\nc\n", "a\nc\n"),
            (ig_custom_terminator, ".ig yy\nb\n.yy\nc\n", "c\n"),
            (de_in_macro_body, ".de m\n.ds s x\n..\n.m\n\\*s\n", "x\n"),
        ),
        recoverable_error_tests((de_end_of_file, ".de m\nabc\n", ""),),
        warning_tests(
            (de_missing_name, ".de\nx\n", "x\n", [Category::Missing]),
            (
                undefined_macro_warns_once,
                ".foo\n.foo\nx\n",
                "x\n",
                [Category::Mac]
            ),
            (
                undefined_string_warns_once,
                "\\*[s]\\*[s]x\n",
                "x\n",
                [Category::Mac]
            ),
        ),
    ];

    rofflang_testing::test_suite![
        options(
            rofflang_testing::TestOption::BuiltInCommands(built_in_commands),
            rofflang_testing::TestOption::Compatible(true),
        ),
        expansion_equality_tests(
            (
                compatibility_mode_two_character_names,
                ".dsxy 1\n\\*(xy\n",
                "1\n"
            ),
            (
                compatibility_mode_terminator,
                ".de xx\nbody\n..\n.xx\n",
                "body\n"
            ),
        ),
    ];
}
