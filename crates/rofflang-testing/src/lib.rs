/*!
Rofflang unit testing library

This is a crate for writing unit tests for code that uses Rofflang.
It is used extensively in the Rofflang standard library,
    so the unit tests there are good examples of what this crate can do.

## Basic setup

Each unit test built with this library works with a specific user-defined Rofflang state type.
This state type is provided by the unit test writer.
In addition to implementing the [`RoffState`] trait, this state must also:

1. Include the [`TestingComponent`] type as a component.
    I.e., the state must implement the [`HasComponent<TestingComponent>`](rofflang::traits::HasComponent<TestingComponent>) trait.

1. Configure the `diagnostic_hook` method on the [`RoffState`]
    trait to invoke [`TestingComponent::diagnostic_hook`].

1. Implement [`Default`].

If the unit test doesn't require anything else from the state,
    the [`State`] type defined in this library can simply be used.
This type satisfies all the conditions above.

## Test types

### Expansion equality tests

Run using [`run_expansion_equality_test`].

These tests verify that two different roff snippets produce the same output text.
For example, an expansion equality test can verify that
```roff
.de greet
Hello \\$1
..
.greet World
```
and
```roff
Hello World
```
produce the same output.

### Failure tests

Run using [`run_failure_test`].

These tests verify that running the input results in a fatal error.

### Warning tests

Run using [`run_warning_test`].

These tests verify the output of some input
    and the categories of the warnings that are issued while processing it.
Every warning category is enabled in these tests,
    and in fact in all tests unless the [`TestOption::WarningMask`] option is used.

## The test suite macro

The [`test_suite`] macro generates a unit test for every case in a list of cases.
This is the easiest way to write many tests at once.
*/

use rofflang::command;
use rofflang::error::{Category, Diagnostic, Severity, WarningMask};
use rofflang::token::Token;
use rofflang::traits::*;
use rofflang::vm;
use rofflang::vm::implement_has_component;
use rofflang::vm::VM;
use rofflang::*;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Rofflang component that every unit testing state needs to have.
#[derive(Default)]
pub struct TestingComponent {
    output: String,
    warnings: Vec<Category>,
    errors: Vec<String>,
}

impl TestingComponent {
    /// Diagnostic hook for the testing component.
    ///
    /// States used in unit testing must be configured to use this hook.
    pub fn diagnostic_hook<S: HasComponent<Self>>(vm: &mut VM<S>, diagnostic: Diagnostic) {
        println!("{diagnostic}");
        let component = vm.state.component_mut();
        match diagnostic.severity {
            Severity::Warning(category) => component.warnings.push(category),
            Severity::Error | Severity::Fatal => component.errors.push(diagnostic.message),
        }
    }

    /// Output text produced so far.
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Categories of the warnings issued so far.
    pub fn warnings(&self) -> &[Category] {
        &self.warnings
    }

    /// Messages of the errors issued so far.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    fn take(&mut self) -> TestingComponent {
        std::mem::take(self)
    }
}

/// Simple state type for simple unit tests.
///
/// If the requests under test don't require custom components or
/// other pieces in the state, it is easier to use this type rather than defining a custom one.
#[derive(Default)]
pub struct State {
    testing: TestingComponent,
}

impl RoffState for State {
    fn diagnostic_hook(vm: &mut VM<Self>, diagnostic: Diagnostic) {
        TestingComponent::diagnostic_hook(vm, diagnostic)
    }
}

implement_has_component![State, TestingComponent, testing];

/// In-memory file system for tests of requests that read files.
///
/// Paths are relative to the working directory of the VM.
#[derive(Default)]
pub struct InMemoryFileSystem {
    working_directory: std::path::PathBuf,
    files: HashMap<std::path::PathBuf, Vec<u8>>,
}

impl InMemoryFileSystem {
    /// Create a new in-memory file system.
    ///
    /// Typically the working directory is taken from the VM.
    pub fn new(working_directory: &std::path::Path) -> Self {
        Self {
            working_directory: working_directory.into(),
            files: Default::default(),
        }
    }

    /// Add a file to the in-memory file system.
    pub fn add_file(&mut self, relative_path: &str, content: &str) {
        let mut path = self.working_directory.clone();
        path.push(relative_path);
        self.files.insert(path, content.as_bytes().to_vec());
    }
}

impl vm::FileSystem for InMemoryFileSystem {
    fn read_to_bytes(&self, path: &std::path::Path) -> std::io::Result<Vec<u8>> {
        match self.files.get(path) {
            None => Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "No such file or directory",
            )),
            Some(content) => Ok(content.clone()),
        }
    }
}

/// Option passed to a test runner.
pub enum TestOption<'a, S> {
    /// The built-in commands are the result of invoking the provided static function.
    ///
    /// Overrides previous `BuiltInCommands` or `BuiltInCommandsDyn` options.
    BuiltInCommands(fn() -> HashMap<&'static str, command::BuiltIn<S>>),

    /// The built-in commands are the result of invoking the provided closure.
    ///
    /// Overrides previous `BuiltInCommands` or `BuiltInCommandsDyn` options.
    BuiltInCommandsDyn(Box<dyn Fn() -> HashMap<&'static str, command::BuiltIn<S>> + 'a>),

    /// The provided static function is invoked after the VM is created and before execution starts.
    /// This can be used to provide more custom VM initialization.
    ///
    /// Overrides previous `CustomVMInitialization` or `CustomVMInitializationDyn` options.
    CustomVMInitialization(fn(&mut VM<S>)),

    /// The provided closure is invoked after the VM is created and before execution starts.
    ///
    /// Overrides previous `CustomVMInitialization` or `CustomVMInitializationDyn` options.
    #[allow(clippy::type_complexity)]
    CustomVMInitializationDyn(Box<dyn Fn(&mut VM<S>) + 'a>),

    /// The warning mask of the VM. Defaults to every category.
    WarningMask(WarningMask),

    /// Whether the VM starts in compatibility mode.
    Compatible(bool),

    /// Depth limit of the input stack.
    InputStackLimit(usize),
}

/// Run an expansion equality test.
///
/// The test passes if the two provided inputs produce the same output text.
/// A single trailing newline is ignored.
/// If `expect_errors` is true, processing the left hand side must issue at least one error;
///     otherwise neither side may issue an error.
pub fn run_expansion_equality_test<S>(
    lhs: &str,
    rhs: &str,
    expect_errors: bool,
    options: &[TestOption<S>],
) where
    S: Default + HasComponent<TestingComponent>,
{
    let options = ResolvedOptions::new(options);

    let mut vm_1 = initialize_vm(&options);
    let result_1 = execute_source_code(&mut vm_1, lhs)
        .map_err(|err| {
            println!("{err}");
            err
        })
        .unwrap();

    let mut vm_2 = initialize_vm(&options);
    let result_2 = execute_source_code(&mut vm_2, rhs)
        .map_err(|err| {
            println!("{err}");
            err
        })
        .unwrap();
    compare_output(&result_1.output, &result_2.output);

    match (expect_errors, result_1.errors.len()) {
        (true, 0) => {
            panic!("expected errors but didn't have any");
        }
        (true, _) | (false, 0) => (),
        (false, i) => {
            panic!("did not expect errors but had {i} errors: {:?}", result_1.errors);
        }
    }
    if !result_2.errors.is_empty() {
        panic!(
            "the right hand side had {} errors: {:?}",
            result_2.errors.len(),
            result_2.errors
        );
    }
}

fn compare_output(output_1: &str, output_2: &str) {
    let trim_newline = |s: &str| -> String { s.strip_suffix('\n').unwrap_or(s).to_string() };
    let output_1 = trim_newline(output_1);
    let output_2 = trim_newline(output_2);
    if output_1 != output_2 {
        println!("Expansion output is different:");
        println!("------[lhs]------");
        println!("'{output_1}'");
        println!("------[rhs]------");
        println!("'{output_2}'");
        println!("-----------------");
        panic!("Expansion test failed");
    }
}

/// Run a failure test.
///
/// The test passes if processing the provided input results in a fatal error.
pub fn run_failure_test<S>(input: &str, options: &[TestOption<S>])
where
    S: Default + HasComponent<TestingComponent>,
{
    let options = ResolvedOptions::new(options);

    let mut vm = initialize_vm(&options);
    if let Ok(result) = execute_source_code(&mut vm, input) {
        println!("Expansion succeeded:");
        println!("{}", result.output);
        panic!("Expansion failure test did not pass: expansion successful");
    }
}

/// Run a warning test.
///
/// The test passes if the input produces the expected output
///     and issues warnings in exactly the expected categories, in order.
pub fn run_warning_test<S>(
    input: &str,
    expected_output: &str,
    expected_warnings: &[Category],
    options: &[TestOption<S>],
) where
    S: Default + HasComponent<TestingComponent>,
{
    let options = ResolvedOptions::new(options);

    let mut vm = initialize_vm(&options);
    let result = execute_source_code(&mut vm, input)
        .map_err(|err| {
            println!("{err}");
            err
        })
        .unwrap();
    compare_output(&result.output, expected_output);
    if result.warnings != expected_warnings {
        println!("Warnings are different:");
        println!("------[actual]------");
        println!("{:?}", result.warnings);
        println!("-----[expected]-----");
        println!("{expected_warnings:?}");
        println!("--------------------");
        panic!("Warning test failed");
    }
}

/// Run a terminal output test.
///
/// The test passes if processing the input writes exactly the expected text to the terminal,
///     as requests like `.tm` do.
pub fn run_terminal_test<S>(input: &str, expected_terminal_output: &str, options: &[TestOption<S>])
where
    S: Default + HasComponent<TestingComponent>,
{
    let options = ResolvedOptions::new(options);

    let mut vm = initialize_vm(&options);
    let terminal = Rc::new(RefCell::new(Vec::<u8>::new()));
    let terminal_out: Rc<RefCell<dyn std::io::Write>> = terminal.clone();
    vm.terminal_out = terminal_out;
    execute_source_code(&mut vm, input)
        .map_err(|err| {
            println!("{err}");
            err
        })
        .unwrap();
    let terminal_output = String::from_utf8_lossy(&terminal.borrow()).to_string();
    if terminal_output != expected_terminal_output {
        println!("Terminal output is different:");
        println!("------[actual]------");
        println!("'{terminal_output}'");
        println!("-----[expected]-----");
        println!("'{expected_terminal_output}'");
        println!("--------------------");
        panic!("Terminal test failed");
    }
}

struct ResolvedOptions<'a, S> {
    built_in_commands: &'a dyn Fn() -> HashMap<&'static str, command::BuiltIn<S>>,
    custom_vm_initialization: &'a dyn Fn(&mut VM<S>),
    config: vm::Config,
}

impl<'a, S> ResolvedOptions<'a, S> {
    pub fn new(options: &'a [TestOption<S>]) -> Self {
        let mut resolved = Self {
            built_in_commands: &HashMap::new,
            custom_vm_initialization: &|_| {},
            config: vm::Config {
                warning_mask: WarningMask::EVERYTHING,
                ..Default::default()
            },
        };
        for option in options {
            match option {
                TestOption::BuiltInCommands(f) => resolved.built_in_commands = f,
                TestOption::BuiltInCommandsDyn(f) => resolved.built_in_commands = f,
                TestOption::CustomVMInitialization(f) => resolved.custom_vm_initialization = f,
                TestOption::CustomVMInitializationDyn(f) => resolved.custom_vm_initialization = f,
                TestOption::WarningMask(mask) => resolved.config.warning_mask = *mask,
                TestOption::Compatible(b) => resolved.config.compatible = *b,
                TestOption::InputStackLimit(n) => resolved.config.input_stack_limit = *n,
            }
        }
        resolved
    }
}

fn initialize_vm<S: Default>(options: &ResolvedOptions<S>) -> Box<VM<S>> {
    let mut vm = VM::<S>::new_with_config((options.built_in_commands)(), options.config.clone());
    (options.custom_vm_initialization)(&mut vm);
    vm
}

/// Execute source code in a VM, returning what was recorded in the testing component.
fn execute_source_code<S>(
    vm: &mut VM<S>,
    source: &str,
) -> Result<TestingComponent, Box<error::Error>>
where
    S: Default + HasComponent<TestingComponent>,
{
    vm.push_source("testing.roff", source)?;
    vm.state.component_mut().take();
    vm.run::<Handlers>()?;
    Ok(vm.state.component_mut().take())
}

struct Handlers;

impl<S: HasComponent<TestingComponent>> vm::Handlers<S> for Handlers {
    fn token_handler(token: Token, input: &mut vm::ExecutionInput<S>) -> prelude::Result<()> {
        let text = input.token_text(&token);
        input.state_mut().component_mut().output.push_str(&text);
        Ok(())
    }

    fn transparent_handler(
        line: buffer::ElementBuffer,
        input: &mut vm::ExecutionInput<S>,
    ) -> prelude::Result<()> {
        input
            .state_mut()
            .component_mut()
            .output
            .push_str(&line.to_text());
        Ok(())
    }
}

/// Macro to generate a suite of unit tests
///
/// The general use of this macros looks like this:
/// ```
/// # use rofflang_testing::*;
/// # use std::collections::HashMap;
/// # fn built_in_commands() -> HashMap<&'static str, rofflang::command::BuiltIn<State>> {
/// #   HashMap::new()
/// # }
/// test_suite![
///     state(State),
///     options(TestOption::BuiltInCommands(built_in_commands)),
///     expansion_equality_tests(
///         (case_1, "lhs_1", "lhs_1"),
///         (case_2, "lhs_2", "lhs_2"),
///     ),
///     failure_tests(),
/// ];
/// ```
///
/// The arguments to the macro are:
///
/// - `state(State)`: defines which Rust type to use as the VM state in the tests.
///     This can be omitted, in which case it defaults to the type name `State` in the current scope.
///
/// - `options(option_1, option_2, ..., option_n)`: options to pass to the test runner.
///     This is a list of values of type [TestOption].
///     The options can be omitted, in which case they default to `options(TestOption::BuiltInCommands(built_in_commands))`.
///     In this case `built_in_commands` is a static function that returns a list of built-in requests
///     to initialize the VM with.
///
/// - `expansion_equality_tests(cases...)`: a list of expansion equality test cases.
///     Each case is of the form (case name, left hand side, right hand side).
///     The data here is fed into the [run_expansion_equality_test] test runner.
///
/// - `recoverable_error_tests(cases...)`: like expansion equality tests,
///     except that the left hand side must issue at least one error.
///
/// - `failure_tests(cases...)`: a list of failure test cases.
///     Each case is of the form (case name, input).
///     The data here is fed into the [run_failure_test] test runner.
///
/// - `warning_tests(cases...)`: a list of warning test cases.
///     Each case is of the form (case name, input, expected output, expected warning categories).
///     The data here is fed into the [run_warning_test] test runner.
///
/// - `terminal_tests(cases...)`: a list of terminal output test cases.
///     Each case is of the form (case name, input, expected terminal output).
///     The data here is fed into the [run_terminal_test] test runner.
///
/// Only one `state()` argument may be provided, and if provided it must be in the first position.
/// Only one `options()` argument may be provided, and if provided it must be in the first position
///     or after the `state()` argument.
/// Zero or more of the other arguments may be provided, and in any order.
#[macro_export]
macro_rules! test_suite {
    ( state($state: ty), options $options: tt, expansion_equality_tests ( $( ($name: ident, $lhs: expr, $rhs: expr $(,)? ) ),* $(,)? ) $(,)? ) => (
        $(
            #[test]
            fn $name() {
                let lhs = $lhs;
                let rhs = $rhs;
                let options = vec! $options;
                rofflang_testing::run_expansion_equality_test::<$state>(&lhs, &rhs, false, &options);
            }
        )*
    );
    ( state($state: ty), options $options: tt, expansion_equality_tests $test_body: tt $(,)? ) => (
        compile_error!("Invalid test cases for expansion_equality_tests: must be a list of tuples (name, lhs, rhs)");
    );
    ( state($state: ty), options $options: tt, recoverable_error_tests ( $( ($name: ident, $lhs: expr, $rhs: expr $(,)? ) ),* $(,)? ) $(,)? ) => (
        $(
            #[test]
            fn $name() {
                let lhs = $lhs;
                let rhs = $rhs;
                let options = vec! $options;
                rofflang_testing::run_expansion_equality_test::<$state>(&lhs, &rhs, true, &options);
            }
        )*
    );
    ( state($state: ty), options $options: tt, failure_tests ( $( ($name: ident, $input: expr $(,)? ) ),* $(,)? ) $(,)? ) => (
        $(
            #[test]
            fn $name() {
                let input = $input;
                let options = vec! $options;
                rofflang_testing::run_failure_test::<$state>(&input, &options);
            }
        )*
    );
    ( state($state: ty), options $options: tt, warning_tests ( $( ($name: ident, $input: expr, $output: expr, [ $( $category: expr ),* $(,)? ] $(,)? ) ),* $(,)? ) $(,)? ) => (
        $(
            #[test]
            fn $name() {
                let input = $input;
                let output = $output;
                let options = vec! $options;
                rofflang_testing::run_warning_test::<$state>(&input, &output, &[ $( $category ),* ], &options);
            }
        )*
    );
    ( state($state: ty), options $options: tt, terminal_tests ( $( ($name: ident, $input: expr, $terminal: expr $(,)? ) ),* $(,)? ) $(,)? ) => (
        $(
            #[test]
            fn $name() {
                let input = $input;
                let terminal = $terminal;
                let options = vec! $options;
                rofflang_testing::run_terminal_test::<$state>(&input, &terminal, &options);
            }
        )*
    );
    ( state($state: ty), options $options: tt, $test_kind: ident $test_cases: tt $(,)? ) => (
        compile_error!("Invalid keyword: test_suite! only accepts the following keywords: `state, `options`, `expansion_equality_tests`, `recoverable_error_tests`, `failure_tests`, `warning_tests`, `terminal_tests`");
    );
    ( state($state: ty), options $options: tt, $( $test_kind: ident $test_cases: tt ),+ $(,)? ) => (
        $(
            rofflang_testing::test_suite![state($state), options $options, $test_kind $test_cases,];
        )+
    );
    ( options $options: tt, $( $test_kind: ident $test_cases: tt ),+ $(,)? ) => (
        rofflang_testing::test_suite![state(State), options $options, $( $test_kind $test_cases, )+ ];
    );
    ( $( $test_kind: ident $test_cases: tt ),+ $(,)? ) => (
        rofflang_testing::test_suite![options (rofflang_testing::TestOption::BuiltInCommands(built_in_commands)), $( $test_kind $test_cases, )+ ];
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn built_in_commands() -> HashMap<&'static str, command::BuiltIn<State>> {
        HashMap::new()
    }

    #[test]
    fn plain_text_is_recorded() {
        run_expansion_equality_test::<State>(
            "a\\&b\n",
            "ab\n",
            false,
            &[TestOption::BuiltInCommands(built_in_commands)],
        );
    }

    #[test]
    fn trailing_newline_is_ignored() {
        run_expansion_equality_test::<State>("ab\n", "ab", false, &[]);
    }

    #[test]
    #[should_panic(expected = "Expansion test failed")]
    fn different_output_fails() {
        run_expansion_equality_test::<State>("a\n", "b\n", false, &[]);
    }

    #[test]
    fn undefined_macro_warning_is_recorded() {
        run_warning_test::<State>(".foo\nx\n", "x\n", &[Category::Mac], &[]);
    }

    #[test]
    fn warning_mask_option() {
        run_warning_test::<State>(
            ".foo\nx\n",
            "x\n",
            &[],
            &[TestOption::WarningMask(WarningMask::NONE)],
        );
    }

    #[test]
    fn stack_limit_is_a_failure() {
        run_failure_test::<State>(
            "\\*[a]\n",
            &[TestOption::CustomVMInitialization(|vm| {
                let a = vm.intern("a");
                vm.commands_map
                    .insert_macro(a, buffer::ElementBuffer::from_bytes(b"\\*[a]"));
            })],
        );
    }
}
