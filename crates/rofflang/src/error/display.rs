//! Formatting of diagnostics for the terminal

use super::{Diagnostic, Error, Severity};
use crate::color::Colorize;
use std::fmt;

/// Formats a diagnostic.
///
/// Backtrace lines come first, followed by a single line of the form
///     `file:line: warning: message`.
pub fn format_diagnostic(f: &mut fmt::Formatter<'_>, diagnostic: &Diagnostic) -> fmt::Result {
    for line in &diagnostic.backtrace {
        writeln!(f, "{}", line.as_str().dimmed())?;
    }
    if let Some((file_name, line)) = &diagnostic.location {
        write!(f, "{file_name}:{line}: ")?;
    }
    let label = match diagnostic.severity {
        Severity::Warning(_) => "warning:".bright_yellow(),
        Severity::Error => "error:".bright_red(),
        Severity::Fatal => "fatal error:".bright_red().bold(),
    };
    write!(f, "{label} {}", diagnostic.message)
}

/// Formats a fatal error, including its notes.
pub fn format_error(f: &mut fmt::Formatter<'_>, error: &Error) -> fmt::Result {
    format_diagnostic(f, &error.diagnostic())?;
    for note in error.notes() {
        write!(f, "\n  {} {note}", "note:".bright_cyan())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::*;

    #[test]
    fn warning_with_location() {
        colored_off();
        let diagnostic = Diagnostic {
            severity: Severity::Warning(Category::Mac),
            message: "macro `xx' not defined".into(),
            location: Some(("doc.roff".into(), 3)),
            backtrace: vec![],
        };
        assert_eq!(
            diagnostic.to_string(),
            "doc.roff:3: warning: macro `xx' not defined"
        );
    }

    #[test]
    fn error_with_backtrace_and_no_location() {
        colored_off();
        let diagnostic = Diagnostic {
            severity: Severity::Error,
            message: "bad escape character".into(),
            location: None,
            backtrace: vec!["m.tmac:4: backtrace: macro `xx'".into()],
        };
        assert_eq!(
            diagnostic.to_string(),
            "m.tmac:4: backtrace: macro `xx'\nerror: bad escape character"
        );
    }

    #[test]
    fn fatal_error_notes() {
        colored_off();
        let err = Error::new(SimpleFatalError::new("boom").with_note("details"));
        assert_eq!(err.to_string(), "fatal error: boom\n  note: details");
    }

    fn colored_off() {
        #[cfg(feature = "color")]
        colored::control::set_override(false);
    }
}
