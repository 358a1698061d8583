//! Requests for reading files (`.so`, `.mso`, `.nx`, `.lf`)

use rofflang::error::Category;
use rofflang::prelude as rl;
use rofflang::token::Name;
use rofflang::traits::*;
use rofflang::*;
use std::path::PathBuf;

pub const SO_DOC: &str = "Read input from a file, then continue with the current input";
pub const MSO_DOC: &str = "Like `.so`, with the file searched for in the macro directories";
pub const NX_DOC: &str = "Stop reading the current file and continue with another";
pub const LF_DOC: &str = "Change the line number and file name used in diagnostics";

/// Component for reading files.
#[derive(Default)]
pub struct Component {
    macro_path: Vec<PathBuf>,
}

impl Component {
    /// Adds a directory to the end of the list of directories searched by `.mso`.
    pub fn add_macro_directory<P: Into<PathBuf>>(&mut self, directory: P) {
        self.macro_path.push(directory.into());
    }

    /// Candidate paths for a macro file, in the order they are tried.
    ///
    /// For each macro directory, and then the working directory,
    ///     the paths `name`, `name.tmac` and `tmac.name` are tried.
    fn candidates(&self, name: &str) -> Vec<String> {
        let file_names = [
            name.to_string(),
            format!("{name}.tmac"),
            format!("tmac.{name}"),
        ];
        let mut candidates = vec![];
        for directory in &self.macro_path {
            for file_name in &file_names {
                candidates.push(directory.join(file_name).to_string_lossy().to_string());
            }
        }
        candidates.extend(file_names);
        candidates
    }
}

/// Reads the file name argument of a request and moves the current token to the end of the line.
fn read_file_name<S: RoffState>(input: &mut vm::ExecutionInput<S>) -> rl::Result<Option<String>> {
    let name = if input.tok().is_newline() || input.tok().is_eof() {
        None
    } else {
        input.get_long_name(true)?
    };
    while !input.tok().is_newline() && !input.tok().is_eof() {
        input.next_token()?;
    }
    Ok(name.map(|name| input.resolve(name).to_string()))
}

/// Get the `.so` request.
pub fn get_so<S: RoffState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_request(so_fn).with_doc(SO_DOC)
}

fn so_fn<S: RoffState>(_: Name, input: &mut vm::ExecutionInput<S>) -> rl::Result<()> {
    let file_name = match read_file_name(input)? {
        None => {
            input.warning(Category::Missing, "missing name");
            return input.next_token();
        }
        Some(file_name) => file_name,
    };
    match input.read_file(&file_name) {
        Ok(contents) => {
            tracing::debug!(file_name, "sourcing file");
            input.push_file(&file_name, contents)?;
        }
        Err(err) => input.error(format!("can't open `{file_name}': {err}")),
    }
    input.next_token()
}

/// Get the `.mso` request.
pub fn get_mso<S: HasComponent<Component>>() -> command::BuiltIn<S> {
    command::BuiltIn::new_request(mso_fn).with_doc(MSO_DOC)
}

fn mso_fn<S: HasComponent<Component>>(
    _: Name,
    input: &mut vm::ExecutionInput<S>,
) -> rl::Result<()> {
    let name = match read_file_name(input)? {
        None => {
            input.warning(Category::Missing, "missing name");
            return input.next_token();
        }
        Some(name) => name,
    };
    let found = input
        .state()
        .component()
        .candidates(&name)
        .into_iter()
        .find_map(|candidate| {
            input
                .read_file(&candidate)
                .ok()
                .map(|contents| (candidate, contents))
        });
    match found {
        None => input.error(format!("can't find macro file `{name}'")),
        Some((file_name, contents)) => {
            tracing::debug!(file_name, "sourcing macro file");
            input.push_file(&file_name, contents)?;
        }
    }
    input.next_token()
}

/// Get the `.nx` request.
///
/// Without an argument, the current file is ended.
pub fn get_nx<S: RoffState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_request(nx_fn).with_doc(NX_DOC)
}

fn nx_fn<S: RoffState>(_: Name, input: &mut vm::ExecutionInput<S>) -> rl::Result<()> {
    match read_file_name(input)? {
        None => input.end_file(),
        Some(file_name) => match input.read_file(&file_name) {
            Ok(contents) => input.next_file(&file_name, contents)?,
            Err(err) => input.error(format!("cannot open `{file_name}': {err}")),
        },
    }
    input.next_token()
}

/// Get the `.lf` request.
pub fn get_lf<S: RoffState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_request(lf_fn).with_doc(LF_DOC)
}

fn lf_fn<S: RoffState>(_: Name, input: &mut vm::ExecutionInput<S>) -> rl::Result<()> {
    let line = match crate::expression::read_expression(input)? {
        None => return input.skip_line(),
        Some(line) => line,
    };
    let file_name = if input.has_arg()? {
        read_file_name(input)?
    } else {
        None
    };
    while !input.tok().is_newline() && !input.tok().is_eof() {
        input.next_token()?;
    }
    // The newline of this line has been read, so the next line is `line`.
    if line > 0 {
        input.set_location(file_name.as_deref(), (line - 1) as usize);
    }
    input.next_token()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use std::collections::HashMap;

    fn built_in_commands() -> HashMap<&'static str, command::BuiltIn<State>> {
        HashMap::from([
            ("ds", crate::def::get_ds()),
            ("lf", get_lf()),
            ("mso", get_mso()),
            ("nx", get_nx()),
            ("so", get_so()),
        ])
    }

    fn custom_vm_initialization(vm: &mut vm::VM<State>) {
        let cwd = vm.working_directory.clone().unwrap_or_default();
        let mut file_system = rofflang_testing::InMemoryFileSystem::new(&cwd);
        file_system.add_file("a.roff", "in a\n");
        file_system.add_file("nested.roff", ".so a.roff\nafter\n");
        file_system.add_file("next.roff", "next\n");
        file_system.add_file("tmac/an.tmac", ".ds s man\n");
        file_system.add_file("tmac/tmac.s", ".ds s ms\n");
        file_system.add_file("local.tmac", ".ds s local\n");
        vm.file_system = Box::new(file_system);
        HasComponent::<Component>::component_mut(&mut vm.state)
            .add_macro_directory(cwd.join("tmac"));
    }

    rofflang_testing::test_suite![
        options(
            rofflang_testing::TestOption::BuiltInCommands(built_in_commands),
            rofflang_testing::TestOption::CustomVMInitialization(custom_vm_initialization),
        ),
        expansion_equality_tests(
            (so_basic, "before\n.so a.roff\nafter\n", "before\nin a\nafter\n"),
            (so_nested, ".so nested.roff\nend\n", "in a\nafter\nend\n"),
            (so_in_string, ".ds s a.roff\n.so \\*s\nend\n", "in a\nend\n"),
            (mso_suffix, ".mso an\n\\*s\n", "man\n"),
            (mso_prefix, ".mso s\n\\*s\n", "ms\n"),
            (mso_full_name, ".mso an.tmac\n\\*s\n", "man\n"),
            (mso_working_directory, ".mso local\n\\*s\n", "local\n"),
            (nx_basic, "a\n.nx next.roff\nb\n", "a\nnext\n"),
            (nx_without_argument, "a\n.nx\nb\n", "a\n"),
            (
                lf_sets_file_and_line,
                ".lf 10 other.roff\n\\n[.F] \\n[.c]\n",
                "other.roff 10\n"
            ),
            (lf_line_only, ".lf 5\n\\n[.c]\n", "5\n"),
        ),
        recoverable_error_tests(
            (so_missing_file, ".so missing.roff\nx\n", "x\n"),
            (mso_missing_file, ".mso missing\nx\n", "x\n"),
            (nx_missing_file, "a\n.nx missing.roff\nb\n", "a\nb\n"),
        ),
        warning_tests((so_missing_name, ".so\nx\n", "x\n", [Category::Missing]),),
    ];
}
