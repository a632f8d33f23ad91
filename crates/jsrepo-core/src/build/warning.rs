//! Build warnings and the handler they are delivered to.

use crate::resolver::ResolveWarning;
use std::fmt;
use std::path::PathBuf;

/// A non-fatal problem found during a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    /// Stable SCREAMING_SNAKE_CASE code.
    pub code: &'static str,
    pub message: String,
    /// Source file, relative to the project root.
    pub file: Option<PathBuf>,
    /// Import specifier or expression involved.
    pub specifier: Option<String>,
    pub line: Option<u32>,
}

impl Warning {
    #[must_use]
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            file: None,
            specifier: None,
            line: None,
        }
    }

    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn with_specifier(mut self, specifier: impl Into<String>) -> Self {
        self.specifier = Some(specifier.into());
        self
    }

    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    /// Convert a resolver warning for `file`.
    #[must_use]
    pub fn from_resolve(warning: &ResolveWarning, file: impl Into<PathBuf>) -> Self {
        Self::new(warning.code(), warning.to_string())
            .with_file(file)
            .with_specifier(warning.subject())
            .with_line(warning.line())
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] ", self.code)?;
        if let Some(file) = &self.file {
            write!(f, "{}", file.display())?;
            if let Some(line) = self.line {
                write!(f, ":{line}")?;
            }
            write!(f, ": ")?;
        }
        f.write_str(&self.message)
    }
}

/// Receives build warnings in a deterministic order.
pub trait WarningHandler {
    fn on_warning(&mut self, warning: Warning);
}

/// Collects warnings.
impl WarningHandler for Vec<Warning> {
    fn on_warning(&mut self, warning: Warning) {
        self.push(warning);
    }
}
