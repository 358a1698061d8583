//! Error handling
//!
//! Rofflang has three severities of problem.
//!
//! - Warnings report malformed but recoverable input.
//!     Every warning belongs to a [Category], and is only issued if the category
//!     is enabled in the current [WarningMask].
//!
//! - Errors report input that is broken enough that the current construct is abandoned.
//!     Processing continues with a best-effort substitute.
//!
//! - Fatal errors stop the VM.
//!     They are returned as `Err(Box<Error>)` values and propagated with `?`.
//!
//! Warnings and errors are [Diagnostic]s, which are routed through the
//!     [diagnostic hook](crate::vm::RoffState::diagnostic_hook) of the state.

use std::rc::Rc;

pub mod display;

/// A warning category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Char,
    Number,
    Break,
    Delim,
    El,
    Scale,
    Range,
    Syntax,
    Di,
    Mac,
    Reg,
    Tab,
    RightBrace,
    Missing,
    Input,
    Escape,
    Space,
    Font,
    Ig,
    Color,
}

impl Category {
    pub const ALL: [Category; 20] = [
        Category::Char,
        Category::Number,
        Category::Break,
        Category::Delim,
        Category::El,
        Category::Scale,
        Category::Range,
        Category::Syntax,
        Category::Di,
        Category::Mac,
        Category::Reg,
        Category::Tab,
        Category::RightBrace,
        Category::Missing,
        Category::Input,
        Category::Escape,
        Category::Space,
        Category::Font,
        Category::Ig,
        Category::Color,
    ];

    /// The bit of the category in a warning mask.
    pub fn bit(self) -> u32 {
        1 << (self as u32)
    }

    /// The name of the category, as accepted by the `.warn` request and the `-w` flag.
    pub fn name(self) -> &'static str {
        match self {
            Category::Char => "char",
            Category::Number => "number",
            Category::Break => "break",
            Category::Delim => "delim",
            Category::El => "el",
            Category::Scale => "scale",
            Category::Range => "range",
            Category::Syntax => "syntax",
            Category::Di => "di",
            Category::Mac => "mac",
            Category::Reg => "reg",
            Category::Tab => "tab",
            Category::RightBrace => "right-brace",
            Category::Missing => "missing",
            Category::Input => "input",
            Category::Escape => "escape",
            Category::Space => "space",
            Category::Font => "font",
            Category::Ig => "ig",
            Category::Color => "color",
        }
    }

    pub fn from_name(name: &str) -> Option<Category> {
        Category::ALL.into_iter().find(|c| c.name() == name)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Set of enabled warning categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WarningMask(u32);

impl WarningMask {
    const TOTAL: u32 = (1 << Category::ALL.len()) - 1;

    pub const NONE: WarningMask = WarningMask(0);

    /// Every category; this is the `w` group.
    pub const EVERYTHING: WarningMask = WarningMask(WarningMask::TOTAL);

    pub fn from_bits(bits: u32) -> WarningMask {
        WarningMask(bits & WarningMask::TOTAL)
    }

    pub fn bits(&self) -> u32 {
        self.0
    }

    #[inline]
    pub fn is_enabled(&self, category: Category) -> bool {
        self.0 & category.bit() != 0
    }

    /// Returns the bits of a category or group name.
    ///
    /// Besides the category names, the groups `all`, `w` and `default` are recognized.
    pub fn lookup(name: &str) -> Option<u32> {
        match name {
            "all" => Some(
                WarningMask::TOTAL
                    & !(Category::Di.bit() | Category::Mac.bit() | Category::Reg.bit()),
            ),
            "w" => Some(WarningMask::TOTAL),
            "default" => Some(WarningMask::default().0),
            _ => Category::from_name(name).map(Category::bit),
        }
    }

    pub fn enable(&mut self, name: &str) -> Result<(), UnknownWarningError> {
        let bits = WarningMask::lookup(name).ok_or_else(|| UnknownWarningError(name.into()))?;
        self.0 |= bits;
        Ok(())
    }

    pub fn disable(&mut self, name: &str) -> Result<(), UnknownWarningError> {
        let bits = WarningMask::lookup(name).ok_or_else(|| UnknownWarningError(name.into()))?;
        self.0 &= !bits;
        Ok(())
    }
}

impl Default for WarningMask {
    fn default() -> Self {
        WarningMask(
            Category::Char.bit()
                | Category::Number.bit()
                | Category::Break.bit()
                | Category::Space.bit()
                | Category::Font.bit(),
        )
    }
}

/// Error returned when a warning category name is not recognized.
#[derive(Debug, PartialEq, Eq)]
pub struct UnknownWarningError(pub String);

impl std::fmt::Display for UnknownWarningError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown warning `{}'", self.0)
    }
}

/// Severity of a diagnostic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Warning(Category),
    Error,
    Fatal,
}

/// A warning or an error, as reported to the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    /// File name and line number.
    pub location: Option<(Rc<str>, usize)>,
    /// Lines of the input stack backtrace, innermost first.
    pub backtrace: Vec<String>,
}

impl Diagnostic {
    pub fn category(&self) -> Option<Category> {
        match self.severity {
            Severity::Warning(category) => Some(category),
            Severity::Error | Severity::Fatal => None,
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        display::format_diagnostic(f, self)
    }
}

/// Implementations of this trait describe a fatal error.
pub trait RoffError: std::fmt::Debug + 'static {
    fn title(&self) -> String;

    fn notes(&self) -> Vec<String> {
        vec![]
    }
}

/// A fatal error.
///
/// The location and backtrace are filled in by the VM when the error leaves a request.
#[derive(Debug)]
pub struct Error {
    pub error: Box<dyn RoffError>,
    pub location: Option<(Rc<str>, usize)>,
    pub backtrace: Vec<String>,
}

impl Error {
    pub fn new<E: RoffError>(error: E) -> Box<Error> {
        Box::new(Error {
            error: Box::new(error),
            location: None,
            backtrace: vec![],
        })
    }

    pub fn title(&self) -> String {
        self.error.title()
    }

    pub fn notes(&self) -> Vec<String> {
        self.error.notes()
    }

    /// Converts the error into the diagnostic that is reported for it.
    pub fn diagnostic(&self) -> Diagnostic {
        Diagnostic {
            severity: Severity::Fatal,
            message: self.title(),
            location: self.location.clone(),
            backtrace: self.backtrace.clone(),
        }
    }
}

impl<T: RoffError> From<T> for Box<Error> {
    fn from(err: T) -> Self {
        Error::new(err)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        display::format_error(f, self)
    }
}

impl std::error::Error for Error {}

/// Fatal error raised when the input stack is deeper than the configured limit.
#[derive(Debug)]
pub struct StackLimitError {
    pub limit: usize,
}

impl RoffError for StackLimitError {
    fn title(&self) -> String {
        format!(
            "input stack limit of {} levels exceeded (probable infinite loop)",
            self.limit
        )
    }
}

impl From<crate::input::StackLimitExceeded> for Box<Error> {
    fn from(err: crate::input::StackLimitExceeded) -> Self {
        Error::new(StackLimitError { limit: err.limit })
    }
}

#[derive(Debug)]
pub struct SimpleFatalError {
    pub title: String,
    pub text_notes: Vec<String>,
}

impl SimpleFatalError {
    /// Create a new simple fatal error.
    pub fn new<T: AsRef<str>>(title: T) -> Self {
        Self {
            title: title.as_ref().into(),
            text_notes: vec![],
        }
    }

    pub fn with_note<T: Into<String>>(mut self, note: T) -> Self {
        self.text_notes.push(note.into());
        self
    }
}

impl RoffError for SimpleFatalError {
    fn title(&self) -> String {
        self.title.clone()
    }

    fn notes(&self) -> Vec<String> {
        self.text_notes.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_bits() {
        assert_eq!(Category::Char.bit(), 1);
        assert_eq!(Category::Mac.bit(), 512);
        assert_eq!(Category::Space.bit(), 65536);
        assert_eq!(Category::Color.bit(), 524288);
    }

    #[test]
    fn category_names_round_trip() {
        for category in Category::ALL {
            assert_eq!(Category::from_name(category.name()), Some(category));
        }
        assert_eq!(Category::from_name("right-brace"), Some(Category::RightBrace));
        assert_eq!(Category::from_name("bogus"), None);
    }

    #[test]
    fn default_mask() {
        let mask = WarningMask::default();
        assert_eq!(mask.bits(), 1 | 2 | 4 | 65536 | 131072);
        assert!(mask.is_enabled(Category::Space));
        assert!(!mask.is_enabled(Category::Mac));
    }

    #[test]
    fn all_excludes_di_mac_and_reg() {
        let mut mask = WarningMask::NONE;
        mask.enable("all").unwrap();
        assert!(mask.is_enabled(Category::Escape));
        assert!(!mask.is_enabled(Category::Di));
        assert!(!mask.is_enabled(Category::Mac));
        assert!(!mask.is_enabled(Category::Reg));
        mask.enable("w").unwrap();
        assert_eq!(mask, WarningMask::EVERYTHING);
        mask.disable("mac").unwrap();
        assert!(!mask.is_enabled(Category::Mac));
    }

    #[test]
    fn unknown_warning() {
        let mut mask = WarningMask::default();
        let err = mask.enable("nonsense").unwrap_err();
        assert_eq!(err.to_string(), "unknown warning `nonsense'");
        assert_eq!(mask, WarningMask::default());
    }

    #[test]
    fn stack_limit_error_message() {
        let err: Box<Error> = crate::input::StackLimitExceeded { limit: 3 }.into();
        assert_eq!(
            err.title(),
            "input stack limit of 3 levels exceeded (probable infinite loop)"
        );
    }
}
