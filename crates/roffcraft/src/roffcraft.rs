use clap::Parser;
use colored::Colorize;
use rofflang::buffer::ElementBuffer;
use rofflang::error::WarningMask;
use rofflang::prelude as rl;
use rofflang::token::{Name, Token};
use rofflang::traits::*;
use rofflang::*;
use rofflang_stdlib::{conditional, expression, input, loops, registers, time};
use std::io::{Read, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Run troff documents through the Rofflang input engine.
///
/// Requests, macros and escapes are interpreted,
///   and an ASCII approximation of the resulting text is written to standard output.
/// Diagnostics are written to standard error.
///
/// Debug logging is enabled with the `ROFFCRAFT_LOG` environment variable,
///   for example `ROFFCRAFT_LOG=rofflang=debug`.
#[derive(Parser)]
#[clap(version)]
struct Cli {
    /// Enable compatibility mode
    #[arg(short = 'C')]
    compatible: bool,

    /// Enable warnings in the category NAME (`all` and `w` enable many categories at once)
    #[arg(short = 'w', value_name = "NAME")]
    enable_warnings: Vec<String>,

    /// Disable warnings in the category NAME
    #[arg(short = 'W', value_name = "NAME")]
    disable_warnings: Vec<String>,

    /// Inhibit error messages
    #[arg(short = 'E')]
    inhibit_errors: bool,

    /// Attach a backtrace of the input stack to every diagnostic
    #[arg(short = 'b')]
    backtrace: bool,

    /// Maximum depth of the input stack
    #[arg(long, value_name = "N", default_value_t = 1000)]
    input_stack_limit: usize,

    /// Write an ASCII approximation of the output; this is the only output format
    #[arg(short = 'a')]
    #[allow(dead_code)]
    ascii: bool,

    /// Load the macro package NAME before the input files, searched for like `.mso`
    #[arg(short = 'm', value_name = "NAME")]
    macro_packages: Vec<String>,

    /// Add DIR to the directories searched for macro packages
    #[arg(short = 'M', value_name = "DIR")]
    macro_directories: Vec<PathBuf>,

    /// Print the documentation of a request, or a summary of every request
    #[arg(long, value_name = "NAME", num_args = 0..=1)]
    doc: Option<Option<String>>,

    /// Input files; `-` is standard input, which is also read if there are no files
    files: Vec<String>,
}

/// State of the VM in the binary: the standard library components and the output.
struct State {
    conditional: conditional::Component,
    input: input::Component,
    loops: loops::Component,
    registers: registers::Component,
    output: Output,
}

impl Default for State {
    fn default() -> Self {
        State {
            conditional: Default::default(),
            input: Default::default(),
            loops: Default::default(),
            registers: registers::Component::new(time::Date::now().registers()),
            output: Default::default(),
        }
    }
}

impl RoffState for State {
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

vm::implement_has_component![
    State,
    (conditional::Component, conditional),
    (input::Component, input),
    (loops::Component, loops),
    (registers::Component, registers),
];

/// Output text, written to standard output a line at a time.
#[derive(Default)]
struct Output {
    line: Vec<u8>,
}

impl Output {
    fn flush(&mut self) {
        let mut stdout = std::io::stdout().lock();
        if let Err(err) = stdout.write_all(&self.line).and_then(|()| stdout.flush()) {
            tracing::warn!(%err, "failed to write to standard output");
        }
        self.line.clear();
    }
}

struct AsciiOutput;

impl vm::Handlers<State> for AsciiOutput {
    fn token_handler(token: Token, input: &mut vm::ExecutionInput<State>) -> rl::Result<()> {
        let text = input.token_text(&token);
        let output = &mut input.state_mut().output;
        output.line.extend_from_slice(text.as_bytes());
        if token.is_newline() {
            output.flush();
        }
        Ok(())
    }

    fn transparent_handler(
        line: ElementBuffer,
        input: &mut vm::ExecutionInput<State>,
    ) -> rl::Result<()> {
        let output = &mut input.state_mut().output;
        output.line.extend_from_slice(line.to_text().as_bytes());
        output.flush();
        Ok(())
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_env("ROFFCRAFT_LOG"))
        .with_writer(std::io::stderr)
        .init();
    let cli: Cli = Cli::parse();
    let config = match config(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!["roffcraft: {err}"];
            std::process::exit(1);
        }
    };
    let mut vm = vm::VM::<State>::new_with_config(rofflang_stdlib::built_ins(), config);
    if let Some(name) = &cli.doc {
        if let Err(err) = doc(&vm, name.as_deref()) {
            eprintln!["roffcraft: {err}"];
            std::process::exit(1);
        }
        return;
    }
    let mut success = match push_sources(&mut vm, &cli) {
        Ok(success) => success,
        Err(err) => {
            eprintln!["{err}"];
            std::process::exit(1);
        }
    };
    let result = vm.run::<AsciiOutput>();
    vm.state.output.flush();
    if let Err(err) = result {
        eprintln!["{err}"];
        std::process::exit(1);
    }
    if vm.num_errors() > 0 {
        tracing::debug!(num_errors = vm.num_errors(), "errors were issued");
        success = false;
    }
    if !success {
        std::process::exit(1);
    }
}

/// Builds the VM configuration from the command line flags.
fn config(cli: &Cli) -> Result<vm::Config, String> {
    let mut warning_mask = WarningMask::default();
    for name in &cli.enable_warnings {
        warning_mask.enable(name).map_err(|err| err.to_string())?;
    }
    for name in &cli.disable_warnings {
        warning_mask.disable(name).map_err(|err| err.to_string())?;
    }
    Ok(vm::Config {
        input_stack_limit: cli.input_stack_limit,
        warning_mask,
        compatible: cli.compatible,
        inhibit_errors: cli.inhibit_errors,
        backtrace: cli.backtrace,
        ..Default::default()
    })
}

/// Pushes the input files and macro packages onto the input stack.
///
/// The input stack is read from the top, so the sources are pushed in reverse order.
/// Returns false if an input file could not be read.
fn push_sources(vm: &mut vm::VM<State>, cli: &Cli) -> rl::Result<bool> {
    let mut success = true;
    for directory in &cli.macro_directories {
        vm.state.input.add_macro_directory(directory);
    }
    let files = match cli.files.is_empty() {
        true => vec!["-".to_string()],
        false => cli.files.clone(),
    };
    for file_name in files.iter().rev() {
        let contents = match file_name.as_str() {
            "-" => {
                let mut contents = vec![];
                std::io::stdin().read_to_end(&mut contents).map(|_| contents)
            }
            _ => vm.read_file(file_name),
        };
        match contents {
            Ok(contents) => vm.push_source(file_name, contents)?,
            Err(err) => {
                eprintln!["roffcraft: can't open `{file_name}': {err}"];
                success = false;
            }
        }
    }
    for name in cli.macro_packages.iter().rev() {
        vm.push_source("<command line>", format!(".mso {name}\n"))?;
    }
    Ok(success)
}

fn doc(vm: &vm::VM<State>, name: Option<&str>) -> Result<(), String> {
    let built_ins = vm.get_built_ins_as_map_slow();
    match name {
        None => {
            let mut names: Vec<&String> = built_ins.keys().collect();
            names.sort();
            for name in names {
                let doc = built_ins[name].doc().unwrap_or("");
                let first_line = doc.split('\n').next().unwrap_or("");
                println![".{}  {}", name.bold(), first_line];
            }
            Ok(())
        }
        Some(name) => {
            let name = name.strip_prefix('.').unwrap_or(name);
            match built_ins.get(name) {
                None => Err(format!("unknown request `.{name}'")),
                Some(built_in) => {
                    println![".{}  {}", name.bold(), built_in.doc().unwrap_or("")];
                    Ok(())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rofflang::error::Category;

    #[test]
    fn parse_flags() {
        let cli = Cli::try_parse_from([
            "roffcraft",
            "-C",
            "-b",
            "-w",
            "mac",
            "-W",
            "char",
            "--input-stack-limit",
            "50",
            "a.roff",
            "-",
        ])
        .unwrap();
        let config = config(&cli).unwrap();
        assert!(config.compatible);
        assert!(config.backtrace);
        assert!(!config.inhibit_errors);
        assert_eq!(config.input_stack_limit, 50);
        assert!(config.warning_mask.is_enabled(Category::Mac));
        assert!(!config.warning_mask.is_enabled(Category::Char));
        assert!(config.warning_mask.is_enabled(Category::Number));
        assert_eq!(cli.files, vec!["a.roff".to_string(), "-".to_string()]);
    }

    #[test]
    fn default_flags() {
        let cli = Cli::try_parse_from(["roffcraft"]).unwrap();
        let config = config(&cli).unwrap();
        assert!(!config.compatible);
        assert_eq!(config.input_stack_limit, 1000);
        assert_eq!(config.warning_mask, WarningMask::default());
        assert!(cli.doc.is_none());
    }

    #[test]
    fn unknown_warning_category() {
        let cli = Cli::try_parse_from(["roffcraft", "-w", "nonsense"]).unwrap();
        assert_eq!(
            config(&cli).map(|_| ()),
            Err("unknown warning `nonsense'".to_string())
        );
    }

    #[test]
    fn doc_flag_without_name() {
        let cli = Cli::try_parse_from(["roffcraft", "--doc"]).unwrap();
        assert_eq!(cli.doc, Some(None));
        let cli = Cli::try_parse_from(["roffcraft", "--doc", "tm"]).unwrap();
        assert_eq!(cli.doc, Some(Some("tm".to_string())));
    }

    #[test]
    fn doc_of_unknown_request() {
        let vm = vm::VM::<State>::new(rofflang_stdlib::built_ins());
        assert!(doc(&vm, Some(".tm")).is_ok());
        assert!(doc(&vm, Some("nonsense")).is_err());
    }
}
