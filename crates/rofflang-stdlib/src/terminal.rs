//! Diagnostics and terminal output (`.tm`, `.tm1`, `.tmc`, `.warn`, `.backtrace`)

use rofflang::error::WarningMask;
use rofflang::prelude as rl;
use rofflang::token::Name;
use rofflang::traits::*;
use rofflang::*;

pub const TM_DOC: &str = "Write the rest of the line to the terminal";
pub const TM1_DOC: &str = "Like `.tm`, with a leading `\"` removed so that leading spaces can be written";
pub const TMC_DOC: &str = "Like `.tm1`, without the final newline";
pub const WARN_DOC: &str = "Set the warning mask; without an argument, every warning is enabled";
pub const BACKTRACE_DOC: &str = "Write a backtrace of the input stack to the terminal";

/// Get the `.tm` request.
pub fn get_tm<S: RoffState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_request(tm_fn).with_doc(TM_DOC)
}

fn tm_fn<S: RoffState>(_: Name, input: &mut vm::ExecutionInput<S>) -> rl::Result<()> {
    write_to_terminal(input, false, true)
}

/// Get the `.tm1` request.
pub fn get_tm1<S: RoffState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_request(tm1_fn).with_doc(TM1_DOC)
}

fn tm1_fn<S: RoffState>(_: Name, input: &mut vm::ExecutionInput<S>) -> rl::Result<()> {
    write_to_terminal(input, true, true)
}

/// Get the `.tmc` request.
pub fn get_tmc<S: RoffState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_request(tmc_fn).with_doc(TMC_DOC)
}

fn tmc_fn<S: RoffState>(_: Name, input: &mut vm::ExecutionInput<S>) -> rl::Result<()> {
    write_to_terminal(input, true, false)
}

fn write_to_terminal<S: RoffState>(
    input: &mut vm::ExecutionInput<S>,
    skip_leading_quote: bool,
    newline: bool,
) -> rl::Result<()> {
    let mut text = input
        .read_rest_of_line(skip_leading_quote)?
        .asciify()
        .to_text();
    if newline {
        text.push('\n');
    }
    let terminal_out = input.terminal_out();
    let mut terminal_out = terminal_out.borrow_mut();
    if let Err(err) = terminal_out
        .write_all(text.as_bytes())
        .and_then(|()| terminal_out.flush())
    {
        tracing::warn!(%err, "failed to write to the terminal");
    }
    drop(terminal_out);
    input.next_token()
}

/// Get the `.warn` request.
pub fn get_warn<S: RoffState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_request(warn_fn).with_doc(WARN_DOC)
}

fn warn_fn<S: RoffState>(_: Name, input: &mut vm::ExecutionInput<S>) -> rl::Result<()> {
    let mask = if input.has_arg()? {
        match crate::expression::read_expression(input)? {
            None => return input.skip_line(),
            Some(n) => WarningMask::from_bits(n.max(0) as u32),
        }
    } else {
        WarningMask::EVERYTHING
    };
    input.set_warning_mask(mask);
    input.skip_line()
}

/// Get the `.backtrace` request.
pub fn get_backtrace<S: RoffState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_request(backtrace_fn).with_doc(BACKTRACE_DOC)
}

fn backtrace_fn<S: RoffState>(_: Name, input: &mut vm::ExecutionInput<S>) -> rl::Result<()> {
    let lines = input.backtrace(true);
    let terminal_out = input.terminal_out();
    let mut terminal_out = terminal_out.borrow_mut();
    for line in lines {
        if let Err(err) = writeln!(terminal_out, "{line}") {
            tracing::warn!(%err, "failed to write to the terminal");
            break;
        }
    }
    drop(terminal_out);
    input.skip_line()
}
