//! Maintenance of the request table (`.rm`, `.rn`, `.als`, `.chop`, `.substring`, `.length`, `.asciify`, `.unformat`)
//!
//! Macros and strings share storage with their aliases.
//! The requests here that change a macro in place only change the name they are given.

use crate::registers;
use rofflang::buffer::ElementBuffer;
use rofflang::error::Category;
use rofflang::prelude as rl;
use rofflang::token::Name;
use rofflang::traits::*;
use rofflang::*;

pub const RM_DOC: &str = "Remove requests, macros and strings";
pub const RN_DOC: &str = "Rename a request, macro or string";
pub const ALS_DOC: &str = "Create an alias for a request, macro or string";
pub const CHOP_DOC: &str = "Remove the last character of a macro or string";
pub const SUBSTRING_DOC: &str = "Replace a string with a substring of itself";
pub const LENGTH_DOC: &str = "Set a number register to the length of a string";
pub const ASCIIFY_DOC: &str = "Replace the nodes of a macro with their text";
pub const UNFORMAT_DOC: &str = "Remove the nodes of a macro that have no plain text form";

/// Get the `.rm` request.
pub fn get_rm<S: RoffState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_request(rm_fn).with_doc(RM_DOC)
}

fn rm_fn<S: RoffState>(_: Name, input: &mut vm::ExecutionInput<S>) -> rl::Result<()> {
    while !input.tok().is_newline() && !input.tok().is_eof() {
        match input.get_name(false)? {
            None => break,
            Some(name) => {
                input.commands_map_mut().remove(name);
            }
        }
    }
    input.skip_line()
}

/// Get the `.rn` request.
pub fn get_rn<S: RoffState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_request(rn_fn).with_doc(RN_DOC)
}

fn rn_fn<S: RoffState>(_: Name, input: &mut vm::ExecutionInput<S>) -> rl::Result<()> {
    if let Some(old) = input.get_name(true)? {
        if let Some(new) = input.get_name(true)? {
            input.commands_map_mut().rename(old, new);
        }
    }
    input.skip_line()
}

/// Get the `.als` request.
pub fn get_als<S: RoffState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_request(als_fn).with_doc(ALS_DOC)
}

fn als_fn<S: RoffState>(_: Name, input: &mut vm::ExecutionInput<S>) -> rl::Result<()> {
    if let Some(alias) = input.get_name(true)? {
        if let Some(target) = input.get_name(true)? {
            if input.commands_map_mut().alias(alias, target).is_err() {
                let message = format!("macro `{}' not defined", input.resolve(target));
                input.warning(Category::Mac, message);
            }
        }
    }
    input.skip_line()
}

/// Returns the macro with the provided name for modification by a request.
///
/// An undefined name is created as an empty macro, with a warning.
/// If the name is a request, an error is issued and [None] is returned.
fn macro_to_modify<'a, S: RoffState>(
    input: &'a mut vm::ExecutionInput<S>,
    name: Name,
    action: &str,
) -> Option<&'a mut ElementBuffer> {
    if let command::Command::BuiltIn(_) = input.lookup_request(name) {
        input.error(format!("cannot {action} request `{}'", input.resolve(name)));
        return None;
    }
    input.commands_map_mut().get_macro_mut(name)
}

/// Get the `.chop` request.
pub fn get_chop<S: RoffState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_request(chop_fn).with_doc(CHOP_DOC)
}

fn chop_fn<S: RoffState>(_: Name, input: &mut vm::ExecutionInput<S>) -> rl::Result<()> {
    if let Some(name) = input.get_name(true)? {
        if let Some(buffer) = macro_to_modify(input, name, "chop") {
            if let Err(err) = buffer.chop() {
                input.error(err.to_string());
            }
        }
    }
    input.skip_line()
}

/// Get the `.substring` request.
///
/// The indices are inclusive, and negative indices count from the end of the string.
/// Without an end index, the substring runs to the end of the string.
pub fn get_substring<S: RoffState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_request(substring_fn).with_doc(SUBSTRING_DOC)
}

fn substring_fn<S: RoffState>(_: Name, input: &mut vm::ExecutionInput<S>) -> rl::Result<()> {
    let name = match input.get_name(true)? {
        None => return input.skip_line(),
        Some(name) => name,
    };
    let start = match crate::expression::read_expression(input)? {
        None => return input.skip_line(),
        Some(start) => start,
    };
    let end = if input.has_arg()? {
        match crate::expression::read_expression(input)? {
            None => return input.skip_line(),
            Some(end) => end,
        }
    } else {
        -1
    };
    let warnings = match macro_to_modify(input, name, "substring") {
        None => vec![],
        Some(buffer) => {
            let (substring, warnings) = buffer.substring(start, end);
            *buffer = substring;
            warnings
        }
    };
    for warning in warnings {
        input.warning(Category::Range, warning.message());
    }
    input.skip_line()
}

/// Get the `.length` request.
pub fn get_length<S: HasComponent<registers::Component>>() -> command::BuiltIn<S> {
    command::BuiltIn::new_request(length_fn).with_doc(LENGTH_DOC)
}

fn length_fn<S: HasComponent<registers::Component>>(
    _: Name,
    input: &mut vm::ExecutionInput<S>,
) -> rl::Result<()> {
    let name = match input.get_name(true)? {
        None => return input.skip_line(),
        Some(name) => name,
    };
    let length = input.read_rest_of_line(true)?.logical_len();
    registers::set(input.vm_mut(), name, length as i64);
    input.next_token()
}

/// Get the `.asciify` request.
pub fn get_asciify<S: RoffState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_request(asciify_fn).with_doc(ASCIIFY_DOC)
}

fn asciify_fn<S: RoffState>(_: Name, input: &mut vm::ExecutionInput<S>) -> rl::Result<()> {
    transform_macro(input, "asciify", ElementBuffer::asciify)
}

/// Get the `.unformat` request.
pub fn get_unformat<S: RoffState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_request(unformat_fn).with_doc(UNFORMAT_DOC)
}

fn unformat_fn<S: RoffState>(_: Name, input: &mut vm::ExecutionInput<S>) -> rl::Result<()> {
    transform_macro(input, "unformat", ElementBuffer::unformat)
}

fn transform_macro<S: RoffState>(
    input: &mut vm::ExecutionInput<S>,
    action: &str,
    f: fn(&ElementBuffer) -> ElementBuffer,
) -> rl::Result<()> {
    if let Some(name) = input.get_name(true)? {
        if let Some(buffer) = macro_to_modify(input, name, action) {
            *buffer = f(buffer);
        }
    }
    input.skip_line()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use std::collections::HashMap;

    fn built_in_commands() -> HashMap<&'static str, command::BuiltIn<State>> {
        HashMap::from([
            ("als", get_als()),
            ("as", crate::def::get_as()),
            ("asciify", get_asciify()),
            ("chop", get_chop()),
            ("de", crate::def::get_de()),
            ("ds", crate::def::get_ds()),
            ("length", get_length()),
            ("rm", get_rm()),
            ("rn", get_rn()),
            ("substring", get_substring()),
            ("unformat", get_unformat()),
        ])
    }

    rofflang_testing::test_suite![
        expansion_equality_tests(
            (rm_string, ".ds s x\n.rm s\n[\\*s]\n", "[]\n"),
            (rm_several, ".ds a x\n.ds b y\n.rm a b\n[\\*a\\*b]\n", "[]\n"),
            (rm_request, ".rm ds\n.ds s x\n", ""),
            (rn_macro, ".de m\nbody\n..\n.rn m n\n.n\n[\\*m]\n", "body\n[]\n"),
            (rn_request, ".rn ds define\n.define s x\n\\*s\n", "x\n"),
            (als_macro, ".de m\nbody\n..\n.als n m\n.n\n.m\n", "body\nbody\n"),
            (als_request, ".als define ds\n.define s x\n\\*s\n", "x\n"),
            (
                als_copy_on_write,
                ".ds a x\n.als b a\n.as b y\n\\*a \\*b\n",
                "x xy\n"
            ),
            (
                als_survives_removal_of_target,
                ".ds a x\n.als b a\n.rm a\n\\*b\n",
                "x\n"
            ),
            (chop_basic, ".ds s abc\n.chop s\n\\*s\n", "ab\n"),
            (chop_twice, ".ds s abc\n.chop s\n.chop s\n\\*s\n", "a\n"),
            (
                chop_does_not_change_alias,
                ".ds s abc\n.als t s\n.chop s\n\\*s \\*t\n",
                "ab abc\n"
            ),
            (substring_basic, ".ds s abcdef\n.substring s 1 3\n\\*s\n", "bcd\n"),
            (substring_no_end, ".ds s abcdef\n.substring s 2\n\\*s\n", "cdef\n"),
            (substring_negative, ".ds s abcdef\n.substring s -2\n\\*s\n", "ef\n"),
            (substring_reversed, ".ds s abcdef\n.substring s 3 1\n\\*s\n", "bcd\n"),
            (length_basic, ".length n abc\n\\nn\n", "3\n"),
            (length_string, ".ds s hello\n.length n \\*s\n\\nn\n", "5\n"),
            (length_leading_quote, ".length n \"  ab\n\\nn\n", "4\n"),
            (length_empty, ".length n\n\\nn\n", "0\n"),
            (asciify_plain_text, ".ds s abc\n.asciify s\n\\*s\n", "abc\n"),
            (unformat_plain_text, ".ds s abc\n.unformat s\n\\*s\n", "abc\n"),
        ),
        recoverable_error_tests(
            (chop_empty, ".ds s\n.chop s\nx\n", "x\n"),
            (chop_request, ".chop ds\n.ds s x\n\\*s\n", "x\n"),
            (substring_request, ".substring ds 0 1\n.ds s x\n\\*s\n", "x\n"),
        ),
        warning_tests(
            (als_undefined_target, ".als b a\nx\n", "x\n", [Category::Mac]),
            (
                substring_clamped,
                ".ds m abc\n.substring m 5 2\n\\*m\n",
                "c\n",
                [Category::Range]
            ),
            (
                substring_out_of_range,
                ".ds m abc\n.substring m 5 7\n[\\*m]\n",
                "[]\n",
                [Category::Range]
            ),
        ),
    ];
}
