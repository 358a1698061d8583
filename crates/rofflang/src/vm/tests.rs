use super::*;
use crate::error::Diagnostic;
use crate::input::DiversionState;

#[derive(Default)]
struct State {
    output: String,
    transparent: String,
    fonts: Vec<String>,
    diagnostics: Vec<Diagnostic>,
    diversions: Vec<(usize, Option<i32>)>,
}

impl RoffState for State {
    fn diagnostic_hook(vm: &mut VM<Self>, diagnostic: Diagnostic) {
        vm.state.diagnostics.push(diagnostic);
    }

    fn formatting_hook(vm: &mut VM<Self>, change: FormattingChange) {
        if let FormattingChange::Font(font) = change {
            vm.state.fonts.push(font);
        }
    }
}

struct Recorder;

impl Handlers<State> for Recorder {
    fn token_handler(token: Token, input: &mut ExecutionInput<State>) -> rl::Result<()> {
        let text = input.token_text(&token);
        input.state_mut().output.push_str(&text);
        Ok(())
    }

    fn transparent_handler(line: ElementBuffer, input: &mut ExecutionInput<State>) -> rl::Result<()> {
        input.state_mut().transparent.push_str(&line.to_text());
        Ok(())
    }
}

fn de(_: Name, input: &mut ExecutionInput<State>) -> rl::Result<()> {
    input.define_macro(DefineMode::Normal, Calling::Normal, Compatibility::Ignore)
}

fn ds(_: Name, input: &mut ExecutionInput<State>) -> rl::Result<()> {
    input.define_string(false, Compatibility::Ignore)
}

fn ig(_: Name, input: &mut ExecutionInput<State>) -> rl::Result<()> {
    input.define_macro(DefineMode::Ignore, Calling::Normal, Compatibility::Ignore)
}

fn ft(_: Name, input: &mut ExecutionInput<State>) -> rl::Result<()> {
    input.skip_line()
}

/// Pushes a diversion whose body is `.record`, with a formatter state of 7.
fn divert(_: Name, input: &mut ExecutionInput<State>) -> rl::Result<()> {
    while !input.tok().is_newline() && !input.tok().is_eof() {
        input.next_token()?;
    }
    let mut buffer = ElementBuffer::new_diversion();
    buffer.append_str(".record\n");
    let name = input.intern("d");
    input.push_diversion(buffer, name, Some(DiversionState::new(7_i32)))?;
    input.next_token()
}

fn record(_: Name, input: &mut ExecutionInput<State>) -> rl::Result<()> {
    let level = input.diversion_level();
    let state = input
        .diversion_state()
        .and_then(|state| state.downcast_ref::<i32>())
        .copied();
    input.state_mut().diversions.push((level, state));
    input.skip_line()
}

fn new_vm(config: Config) -> Box<VM<State>> {
    VM::new_with_config(
        HashMap::from([
            ("de", BuiltIn::new_request(de)),
            ("ds", BuiltIn::new_request(ds)),
            ("ig", BuiltIn::new_request(ig)),
            ("ft", BuiltIn::new_request(ft)),
            ("divert", BuiltIn::new_request(divert)),
            ("record", BuiltIn::new_request(record)),
        ]),
        config,
    )
}

fn run_with_config(input: &str, config: Config) -> State {
    let mut vm = new_vm(config);
    vm.push_source("test.roff", input).unwrap();
    vm.run::<Recorder>().unwrap();
    std::mem::take(&mut vm.state)
}

fn run(input: &str) -> State {
    run_with_config(
        input,
        Config {
            warning_mask: WarningMask::EVERYTHING,
            ..Default::default()
        },
    )
}

fn messages(state: &State) -> Vec<String> {
    state
        .diagnostics
        .iter()
        .map(|d| d.message.clone())
        .collect()
}

macro_rules! output_tests {
    ( $( ($name: ident, $input: expr, $want: expr), )+ ) => {
        $(
            #[test]
            fn $name() {
                let state = run($input);
                assert_eq!(state.output, $want);
            }
        )+
    };
}

output_tests![
    (plain_text, "hello\nworld\n", "hello\nworld\n"),
    (
        macro_with_argument,
        ".de greet\nHi \\\\$1!\n..\n.greet Bob\n",
        "Hi Bob!\n"
    ),
    (string, ".ds x world\nHello \\*x.\n", "Hello world.\n"),
    (string_two_char_name, ".ds xy world\n\\*(xy\n", "world\n"),
    (
        string_with_arguments,
        ".ds s <\\\\$1,\\\\$2>\n\\*[s a b]\n",
        "<a,b>\n"
    ),
    (
        all_arguments,
        ".de m\n\\\\$*|\\\\$@\n..\n.m a \"b c\"\n",
        "a b c|\"a\" \"b c\"\n"
    ),
    (
        doubled_quote_in_argument,
        ".de m\n\\\\$1\n..\n.m \"a\"\"b\"\n",
        "a\"b\n"
    ),
    (argument_zero, ".de m\n\\\\$0\n..\n.m\n", "m\n"),
    (comment, "a\\\" comment\nb\n", "a\nb\n"),
    (comment_with_newline, "a\\# comment\nb\n", "ab\n"),
    (escaped_newline, "a\\\nb\n", "ab\n"),
    (special_character, "\\(em\\[bu]\n", "[em][bu]\n"),
    (composite_glyph, "\\[u0065 u0301]\n", "[u0065_u0301]\n"),
    (width, "\\w'abc'\n", "3\n"),
    (name_test, "\\A'abc'\\A'a b'\n", "10\n"),
    (argument_count_outside_macro, "\\n(.$\n", "0\n"),
    (ignore, ".ig\nignored\n..\nvisible\n", "visible\n"),
    (
        custom_terminator_is_invoked,
        ".de end\nE\n..\n.de xx end\nbody\n.end\n.xx\n",
        "E\nbody\n"
    ),
    (
        terminator_with_spaces,
        ".de xx\nbody\n.  .\n.xx\n",
        "body\n"
    ),
    (no_break_control_character, "'ds x y\n\\*x\n", "y\n"),
    (
        formatting_escape_disables_control_line,
        "\\fB.foo\n",
        ".foo\n"
    ),
    (escaped_escape, "a\\\\b\n", "a\\b\n"),
    (escaped_dot, "x\\.\n", "x.\n"),
];

#[test]
fn undefined_macro_warning() {
    let state = run(".foo\n");
    assert_eq!(messages(&state), vec!["macro `foo' not defined"]);
    assert_eq!(state.diagnostics[0].category(), Some(Category::Mac));
    assert_eq!(
        state.diagnostics[0].location,
        Some(("test.roff".into(), 1))
    );
}

#[test]
fn undefined_macro_warning_disabled_by_default() {
    let state = run_with_config(".foo\nx\n", Config::default());
    assert!(state.diagnostics.is_empty());
    assert_eq!(state.output, "x\n");
}

#[test]
fn missing_space_warning() {
    let state = run(".ftB\nx\n");
    assert_eq!(
        messages(&state),
        vec!["macro `ftB' not defined (probably missing space after `ft')"]
    );
    assert_eq!(state.output, "x\n");
}

#[test]
fn escape_ignored_warning() {
    let state = run("\\q\n");
    assert_eq!(messages(&state), vec!["escape character ignored before `q'"]);
    assert_eq!(state.output, "q\n");
}

#[test]
fn undefined_register_warning() {
    let state = run("\\n[xyz]\n");
    assert_eq!(messages(&state), vec!["number register `xyz' not defined"]);
    assert_eq!(state.output, "0\n");
}

#[test]
fn missing_closing_delimiter_warning() {
    let state = run("\\w'abc\nx\n");
    assert_eq!(messages(&state), vec!["missing closing delimiter"]);
    assert!(state.output.ends_with("\nx\n"), "{}", state.output);
}

#[test]
fn invalid_input_warning() {
    let state = run("a\x0bb\n");
    assert_eq!(messages(&state), vec!["invalid input character code 11"]);
    assert_eq!(state.output, "ab\n");
}

#[test]
fn end_of_file_while_defining_macro_keeps_partial_definition() {
    let mut vm = new_vm(Config::default());
    vm.push_source("test.roff", ".de x\nabc\n").unwrap();
    vm.run::<Recorder>().unwrap();
    assert_eq!(
        messages(&vm.state),
        vec!["end of file while defining macro `x'"]
    );
    assert_eq!(vm.state.diagnostics[0].location, Some(("test.roff".into(), 1)));
    assert_eq!(vm.num_errors(), 1);
    let x = vm.intern("x");
    assert_eq!(vm.commands_map.get_macro(x).unwrap().to_text(), "abc\n");
}

#[test]
fn stack_limit_is_fatal() {
    let mut vm = new_vm(Config {
        input_stack_limit: 10,
        ..Default::default()
    });
    vm.push_source("test.roff", ".de a\n.a\n..\n.a\n").unwrap();
    let err = vm.run::<Recorder>().unwrap_err();
    assert_eq!(
        err.title(),
        "input stack limit of 10 levels exceeded (probable infinite loop)"
    );
    assert!(err.location.is_some());
}

#[test]
fn diversion_state_is_restored_after_reading() {
    let state = run(".record\n.divert\n.record\n");
    assert_eq!(
        state.diversions,
        vec![(0, None), (1, Some(7)), (0, None)]
    );
    assert!(state.diagnostics.is_empty());
}

#[test]
fn transparent_line() {
    let state = run("\\!x y\nz\n");
    assert_eq!(state.transparent, "x y\n");
    assert_eq!(state.output, "z\n");
}

#[test]
fn font_escapes() {
    let state = run("\\fB\\f(CW\\f[]\n");
    assert_eq!(state.fonts, vec!["B", "CW", ""]);
}

#[test]
fn compatibility_mode_long_names() {
    let state = run_with_config(
        ".ds xy 1\n\\*[xy]\n",
        Config {
            compatible: true,
            ..Default::default()
        },
    );
    // In compatibility mode `\*[` interpolates the string named `[`.
    assert_eq!(state.output, "xy]\n");
}

#[test]
fn compatibility_mode_two_character_request_names() {
    let state = run_with_config(
        ".dsxy 1\n\\*(xy\n",
        Config {
            compatible: true,
            ..Default::default()
        },
    );
    assert_eq!(state.output, "1\n");
}

#[test]
fn backtrace_is_attached_to_diagnostics() {
    let state = run_with_config(
        ".de m\n\\\\q\n..\n.m\n",
        Config {
            warning_mask: WarningMask::EVERYTHING,
            backtrace: true,
            ..Default::default()
        },
    );
    assert_eq!(state.diagnostics.len(), 1);
    assert_eq!(
        state.diagnostics[0].backtrace,
        vec!["test.roff:2: backtrace: macro `m'".to_string()]
    );
}

#[test]
fn push_source_names_standard_input() {
    let mut vm = new_vm(Config {
        warning_mask: WarningMask::EVERYTHING,
        ..Default::default()
    });
    vm.push_source("-", ".foo\n").unwrap();
    vm.run::<Recorder>().unwrap();
    assert_eq!(
        vm.state.diagnostics[0].location,
        Some(("<standard input>".into(), 1))
    );
}

#[test]
fn engine_registers() {
    let state = run(".de m\n\\\\n(.$ \\\\n(.c\n..\n.m a b\n\\n[.F]\n");
    assert_eq!(state.output, "2 4\ntest.roff\n");
}
