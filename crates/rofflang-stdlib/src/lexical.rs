//! Requests that change how input is read (`.ec`, `.eo`, `.ecs`, `.ecr`, `.cc`, `.c2`, `.cp`)
//!
//! Each of these requests takes effect from the line after the request.

use rofflang::prelude as rl;
use rofflang::token::Name;
use rofflang::traits::*;
use rofflang::*;

pub const EC_DOC: &str = "Set the escape character; the default is `\\`";
pub const EO_DOC: &str = "Turn off the escape mechanism";
pub const ECS_DOC: &str = "Save the current escape character";
pub const ECR_DOC: &str = "Restore the escape character saved with `.ecs`";
pub const CC_DOC: &str = "Set the control character; the default is `.`";
pub const C2_DOC: &str = "Set the no-break control character; the default is `'`";
pub const CP_DOC: &str = "Enable or disable compatibility mode";

/// Reads the optional character argument of a request.
///
/// Returns the default if there is no argument, and [None] if the argument is not a character;
///     in the latter case an error has been issued.
fn read_char_argument<S: RoffState>(
    input: &mut vm::ExecutionInput<S>,
    default: u8,
    what: &str,
) -> rl::Result<Option<u8>> {
    if !input.has_arg()? {
        return Ok(Some(default));
    }
    match input.tok().ch() {
        None => {
            input.error(format!("bad {what} character"));
            Ok(None)
        }
        Some(c) => Ok(Some(c)),
    }
}

/// Get the `.ec` request.
pub fn get_ec<S: RoffState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_request(ec_fn).with_doc(EC_DOC)
}

fn ec_fn<S: RoffState>(_: Name, input: &mut vm::ExecutionInput<S>) -> rl::Result<()> {
    let c = read_char_argument(input, b'\\', "escape")?.unwrap_or(b'\\');
    input.set_escape_char(Some(c));
    input.skip_line()
}

/// Get the `.eo` request.
pub fn get_eo<S: RoffState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_request(eo_fn).with_doc(EO_DOC)
}

fn eo_fn<S: RoffState>(_: Name, input: &mut vm::ExecutionInput<S>) -> rl::Result<()> {
    input.set_escape_char(None);
    input.skip_line()
}

/// Get the `.ecs` request.
pub fn get_ecs<S: RoffState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_request(ecs_fn).with_doc(ECS_DOC)
}

fn ecs_fn<S: RoffState>(_: Name, input: &mut vm::ExecutionInput<S>) -> rl::Result<()> {
    let escape_char = input.lex().escape_char;
    input.set_saved_escape_char(escape_char);
    input.skip_line()
}

/// Get the `.ecr` request.
pub fn get_ecr<S: RoffState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_request(ecr_fn).with_doc(ECR_DOC)
}

fn ecr_fn<S: RoffState>(_: Name, input: &mut vm::ExecutionInput<S>) -> rl::Result<()> {
    let escape_char = input.saved_escape_char();
    input.set_escape_char(escape_char);
    input.skip_line()
}

/// Get the `.cc` request.
pub fn get_cc<S: RoffState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_request(cc_fn).with_doc(CC_DOC)
}

fn cc_fn<S: RoffState>(_: Name, input: &mut vm::ExecutionInput<S>) -> rl::Result<()> {
    if let Some(c) = read_char_argument(input, b'.', "control")? {
        input.set_control_char(c);
    }
    input.skip_line()
}

/// Get the `.c2` request.
pub fn get_c2<S: RoffState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_request(c2_fn).with_doc(C2_DOC)
}

fn c2_fn<S: RoffState>(_: Name, input: &mut vm::ExecutionInput<S>) -> rl::Result<()> {
    if let Some(c) = read_char_argument(input, b'\'', "control")? {
        input.set_no_break_control_char(c);
    }
    input.skip_line()
}

/// Get the `.cp` request.
///
/// Without an argument, or with a positive argument, compatibility mode is enabled.
pub fn get_cp<S: RoffState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_request(cp_fn).with_doc(CP_DOC)
}

fn cp_fn<S: RoffState>(_: Name, input: &mut vm::ExecutionInput<S>) -> rl::Result<()> {
    let compatible = if input.has_arg()? {
        match crate::expression::read_expression(input)? {
            None => true,
            Some(n) => n > 0,
        }
    } else {
        true
    };
    tracing::debug!(compatible, "compatibility mode changed");
    input.set_compatible(compatible);
    input.skip_line()
}
