//! Number registers (`.nr`, `.rr`, `.rnn`, `.aln`, `.af`)
//!
//! This module also provides the functions that connect registers to the engine:
//!     [number_register_hook] for `\n`, [number_format_hook] for `\g`
//!     and [register_assignment_hook] for `\R`.

use crate::expression;
use rofflang::error::Category;
use rofflang::prelude as rl;
use rofflang::token::Name;
use rofflang::traits::*;
use rofflang::*;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

pub const NR_DOC: &str = "Define or modify a number register";
pub const RR_DOC: &str = "Remove number registers";
pub const RNN_DOC: &str = "Rename a number register";
pub const ALN_DOC: &str = "Create an alias for a number register";
pub const AF_DOC: &str = "Set the interpolation format of a number register";

/// Component for storing number registers.
///
/// Aliases share the same register, so registers are reference counted.
#[derive(Default)]
pub struct Component {
    registers: HashMap<Name, Rc<RefCell<Register>>>,
    // Registers defined on startup, which are added the first time the component is used.
    initial_values: Vec<(&'static str, i64)>,
}

impl Component {
    /// Create a new component with registers that are defined on startup.
    pub fn new(initial_values: Vec<(&'static str, i64)>) -> Component {
        Component {
            registers: Default::default(),
            initial_values,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Register {
    value: i64,
    increment: i64,
    format: Format,
}

/// Interpolation format of a number register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Decimal, zero padded to the number of digits.
    Arabic(usize),
    LowerRoman,
    UpperRoman,
    LowerAlpha,
    UpperAlpha,
}

impl Default for Format {
    fn default() -> Self {
        Format::Arabic(1)
    }
}

impl Format {
    /// Parses a format, as it appears in `.af`.
    pub fn parse(s: &str) -> Option<Format> {
        match s {
            "i" => Some(Format::LowerRoman),
            "I" => Some(Format::UpperRoman),
            "a" => Some(Format::LowerAlpha),
            "A" => Some(Format::UpperAlpha),
            _ => {
                if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
                    Some(Format::Arabic(s.len()))
                } else {
                    None
                }
            }
        }
    }

    /// Formats a value.
    pub fn format(&self, value: i64) -> String {
        let (sign, magnitude) = if value < 0 {
            ("-", value.unsigned_abs())
        } else {
            ("", value as u64)
        };
        let digits = match *self {
            Format::Arabic(width) => return format!("{sign}{magnitude:0width$}"),
            _ if magnitude == 0 => "0".to_string(),
            Format::LowerRoman => roman(magnitude).to_lowercase(),
            Format::UpperRoman => roman(magnitude),
            Format::LowerAlpha => alpha(magnitude).to_lowercase(),
            Format::UpperAlpha => alpha(magnitude),
        };
        format!("{sign}{digits}")
    }

    /// The text `\g` interpolates for the format.
    pub fn describe(&self) -> String {
        match self {
            Format::Arabic(width) => "0".repeat(*width),
            Format::LowerRoman => "i".into(),
            Format::UpperRoman => "I".into(),
            Format::LowerAlpha => "a".into(),
            Format::UpperAlpha => "A".into(),
        }
    }
}

fn roman(mut n: u64) -> String {
    // Large values are written in decimal.
    if n >= 40000 {
        return n.to_string();
    }
    const NUMERALS: [(u64, &str); 13] = [
        (1000, "M"),
        (900, "CM"),
        (500, "D"),
        (400, "CD"),
        (100, "C"),
        (90, "XC"),
        (50, "L"),
        (40, "XL"),
        (10, "X"),
        (9, "IX"),
        (5, "V"),
        (4, "IV"),
        (1, "I"),
    ];
    let mut s = String::new();
    for (value, numeral) in NUMERALS {
        while n >= value {
            s.push_str(numeral);
            n -= value;
        }
    }
    s
}

fn alpha(mut n: u64) -> String {
    let mut s = vec![];
    while n > 0 {
        n -= 1;
        s.push(b'A' + (n % 26) as u8);
        n /= 26;
    }
    s.reverse();
    s.into_iter().map(char::from).collect()
}

fn component_mut<S: HasComponent<Component>>(vm: &mut vm::VM<S>) -> &mut Component {
    let initial_values = std::mem::take(&mut vm.state.component_mut().initial_values);
    for (name, value) in initial_values {
        let name = vm.intern(name);
        vm.state
            .component_mut()
            .registers
            .entry(name)
            .or_insert_with(|| {
                Rc::new(RefCell::new(Register {
                    value,
                    ..Default::default()
                }))
            });
    }
    vm.state.component_mut()
}

/// Returns whether a register is defined.
pub fn is_defined<S: HasComponent<Component>>(vm: &mut vm::VM<S>, name: Name) -> bool {
    component_mut(vm).registers.contains_key(&name) || vm.engine_register(name).is_some()
}

/// Returns the value of a register.
pub fn get<S: HasComponent<Component>>(vm: &mut vm::VM<S>, name: Name) -> Option<i64> {
    component_mut(vm)
        .registers
        .get(&name)
        .map(|r| r.borrow().value)
}

/// Sets the value of a register, creating it if needed.
pub fn set<S: HasComponent<Component>>(vm: &mut vm::VM<S>, name: Name, value: i64) {
    component_mut(vm)
        .registers
        .entry(name)
        .or_default()
        .borrow_mut()
        .value = value;
}

/// Hook for `\n`; see [RoffState::number_register_hook].
pub fn number_register_hook<S: HasComponent<Component>>(
    vm: &mut vm::VM<S>,
    name: Name,
    increment: i32,
) -> Option<String> {
    let register = component_mut(vm).registers.get(&name)?.clone();
    let mut register = register.borrow_mut();
    if increment != 0 {
        match (increment as i64)
            .checked_mul(register.increment)
            .and_then(|step| register.value.checked_add(step))
        {
            Some(value) => register.value = value,
            None => vm.error("numeric overflow"),
        }
    }
    Some(register.format.format(register.value))
}

/// Hook for `\g`; see [RoffState::number_format_hook].
pub fn number_format_hook<S: HasComponent<Component>>(
    vm: &mut vm::VM<S>,
    name: Name,
) -> Option<String> {
    component_mut(vm)
        .registers
        .get(&name)
        .map(|r| r.borrow().format.describe())
}

/// Hook for `\R`; see [RoffState::register_assignment_hook].
pub fn register_assignment_hook<S: HasComponent<Component>>(
    vm: &mut vm::VM<S>,
    name: Name,
    expression: &str,
) {
    let previous = get(vm, name).unwrap_or(0);
    let input = vm::ExecutionInput::new(vm);
    if let Some(value) =
        expression::evaluate_relative(input, expression.trim(), previous, "end of expression")
    {
        set(vm, name, value);
    }
}

/// Get the `.nr` request.
pub fn get_nr<S: HasComponent<Component>>() -> command::BuiltIn<S> {
    command::BuiltIn::new_request(nr_fn).with_doc(NR_DOC)
}

fn nr_fn<S: HasComponent<Component>>(_: Name, input: &mut vm::ExecutionInput<S>) -> rl::Result<()> {
    let name = match input.get_name(true)? {
        None => return input.skip_line(),
        Some(name) => name,
    };
    let previous = get(input.vm_mut(), name).unwrap_or(0);
    if let Some(value) = expression::read_relative_expression(input, previous)? {
        set(input.vm_mut(), name, value);
        if input.tok().is_space() && input.has_arg()? {
            if let Some(increment) = expression::read_expression(input)? {
                if let Some(register) = component_mut(input.vm_mut()).registers.get(&name) {
                    register.borrow_mut().increment = increment;
                }
            }
        }
    }
    input.skip_line()
}

/// Get the `.rr` request.
pub fn get_rr<S: HasComponent<Component>>() -> command::BuiltIn<S> {
    command::BuiltIn::new_request(rr_fn).with_doc(RR_DOC)
}

fn rr_fn<S: HasComponent<Component>>(_: Name, input: &mut vm::ExecutionInput<S>) -> rl::Result<()> {
    while !input.tok().is_newline() && !input.tok().is_eof() {
        match input.get_name(false)? {
            None => break,
            Some(name) => {
                component_mut(input.vm_mut()).registers.remove(&name);
            }
        }
    }
    input.skip_line()
}

/// Get the `.rnn` request.
pub fn get_rnn<S: HasComponent<Component>>() -> command::BuiltIn<S> {
    command::BuiltIn::new_request(rnn_fn).with_doc(RNN_DOC)
}

fn rnn_fn<S: HasComponent<Component>>(_: Name, input: &mut vm::ExecutionInput<S>) -> rl::Result<()> {
    if let Some(old) = input.get_name(true)? {
        if let Some(new) = input.get_name(true)? {
            let component = component_mut(input.vm_mut());
            if let Some(register) = component.registers.remove(&old) {
                component.registers.insert(new, register);
            }
        }
    }
    input.skip_line()
}

/// Get the `.aln` request.
pub fn get_aln<S: HasComponent<Component>>() -> command::BuiltIn<S> {
    command::BuiltIn::new_request(aln_fn).with_doc(ALN_DOC)
}

fn aln_fn<S: HasComponent<Component>>(_: Name, input: &mut vm::ExecutionInput<S>) -> rl::Result<()> {
    if let Some(alias) = input.get_name(true)? {
        if let Some(target) = input.get_name(true)? {
            let component = component_mut(input.vm_mut());
            match component.registers.get(&target).cloned() {
                Some(register) => {
                    component.registers.insert(alias, register);
                }
                None => {
                    let message = format!("number register `{}' not defined", input.resolve(target));
                    input.warning(Category::Reg, message);
                }
            }
        }
    }
    input.skip_line()
}

/// Get the `.af` request.
pub fn get_af<S: HasComponent<Component>>() -> command::BuiltIn<S> {
    command::BuiltIn::new_request(af_fn).with_doc(AF_DOC)
}

fn af_fn<S: HasComponent<Component>>(_: Name, input: &mut vm::ExecutionInput<S>) -> rl::Result<()> {
    if let Some(name) = input.get_name(true)? {
        while input.tok().is_space() {
            input.next_token()?;
        }
        let mut text = vec![];
        while let Some(c) = input.tok().ch() {
            text.push(c);
            input.next_token()?;
        }
        let text = token::bytes_to_string(&text);
        match Format::parse(&text) {
            None => input.error(format!("bad number format `{text}'")),
            Some(format) => {
                component_mut(input.vm_mut())
                    .registers
                    .entry(name)
                    .or_default()
                    .borrow_mut()
                    .format = format;
            }
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
            ("af", get_af()),
            ("aln", get_aln()),
            ("nr", get_nr()),
            ("rnn", get_rnn()),
            ("rr", get_rr()),
        ])
    }

    #[test]
    fn format_arabic() {
        assert_eq!(Format::Arabic(3).format(7), "007");
        assert_eq!(Format::Arabic(1).format(-12), "-12");
    }

    #[test]
    fn format_roman() {
        assert_eq!(Format::LowerRoman.format(1994), "mcmxciv");
        assert_eq!(Format::UpperRoman.format(4), "IV");
        assert_eq!(Format::UpperRoman.format(0), "0");
    }

    #[test]
    fn format_alpha() {
        assert_eq!(Format::LowerAlpha.format(1), "a");
        assert_eq!(Format::UpperAlpha.format(26), "Z");
        assert_eq!(Format::UpperAlpha.format(27), "AA");
        assert_eq!(Format::LowerAlpha.format(-2), "-b");
    }

    #[test]
    fn parse_format() {
        assert_eq!(Format::parse("001"), Some(Format::Arabic(3)));
        assert_eq!(Format::parse("i"), Some(Format::LowerRoman));
        assert_eq!(Format::parse("x"), None);
        assert_eq!(Format::parse(""), None);
    }

    rofflang_testing::test_suite![
        expansion_equality_tests(
            (nr_basic, ".nr x 5\n\\nx\n", "5\n"),
            (nr_expression, ".nr x 1+2*3\n\\nx\n", "9\n"),
            (nr_relative_plus, ".nr x 5\n.nr x +3\n\\nx\n", "8\n"),
            (nr_relative_minus, ".nr x 5\n.nr x -3\n\\nx\n", "2\n"),
            (nr_relative_undefined, ".nr x -3\n\\nx\n", "-3\n"),
            (nr_long_name, ".nr long 12\n\\n[long]\n", "12\n"),
            (nr_two_char_name, ".nr ab 12\n\\n(ab\n", "12\n"),
            (
                nr_auto_increment,
                ".nr x 5 2\n\\n+x \\n+x \\n-x \\nx\n",
                "7 9 7 7\n"
            ),
            (
                nr_auto_increment_default_is_zero,
                ".nr x 5\n\\n+x\n",
                "5\n"
            ),
            (nr_parenthesized_spaces, ".nr x ( 1 + 2 )\n\\nx\n", "3\n"),
            (nr_register_in_expression, ".nr a 2\n.nr b \\na*3\n\\nb\n", "6\n"),
            (af_roman, ".nr x 4\n.af x i\n\\nx \\gx\n", "iv i\n"),
            (af_zero_padded, ".nr x 4\n.af x 001\n\\nx \\gx\n", "004 000\n"),
            (af_creates_register, ".af x A\n\\nx \\gx\n", "0 A\n"),
            (format_of_undefined_register, "\\g[x]\n", "\n"),
            (rr, ".nr x 5\n.rr x\n.nr x +1\n\\nx\n", "1\n"),
            (rnn, ".nr x 5\n.rnn x y\n\\ny\n", "5\n"),
            (aln_shares_value, ".nr x 5\n.aln y x\n.nr y 7\n\\nx\n", "7\n"),
            (
                aln_survives_removal_of_target,
                ".nr x 5\n.aln y x\n.rr x\n\\ny\n",
                "5\n"
            ),
            (register_assignment_escape, "\\R'x 5'\\R'x +2'\\nx\n", "7\n"),
        ),
        recoverable_error_tests(
            (nr_division_by_zero, ".nr x 1/0\n\\nx\n", "0\n"),
            (
                nr_division_overflow,
                ".nr x 5\n.nr x (0-9223372036854775807-1)/(0-1)\n\\nx\n",
                "5\n"
            ),
            (
                nr_relative_overflow,
                ".nr x 5\n.nr x -(0-9223372036854775807-1)\n\\nx\n",
                "5\n"
            ),
            (
                auto_increment_overflow,
                ".nr x 9223372036854775807 1\n\\n+x\n",
                "9223372036854775807\n"
            ),
            (af_bad_format, ".af x q\n", ""),
        ),
        warning_tests(
            (
                nr_bad_expression,
                ".nr x 5\n.nr x abc\n\\nx\n",
                "5\n",
                [Category::Number]
            ),
            (undefined_register, "\\n[x]\n", "0\n", [Category::Reg]),
            (aln_undefined_target, ".aln y x\n", "", [Category::Reg]),
            (nr_missing_name, ".nr\n", "", [Category::Missing]),
        ),
    ];
}
