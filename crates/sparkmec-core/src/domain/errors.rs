use std::error::Error;
use std::fmt::{Display, Formatter};

pub type DiagnosticResult<T> = Result<T, DiagnosticError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticErrorCategory {
    InputError,
    IoSystemError,
    NumericError,
    ExternalDataError,
    InternalError,
}

impl DiagnosticErrorCategory {
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::InputError => 2,
            Self::IoSystemError => 3,
            Self::NumericError => 4,
            Self::ExternalDataError => 5,
            Self::InternalError => 6,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InputError => "InputError",
            Self::IoSystemError => "IoSystemError",
            Self::NumericError => "NumericError",
            Self::ExternalDataError => "ExternalDataError",
            Self::InternalError => "InternalError",
        }
    }
}

impl Display for DiagnosticErrorCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

/// Crate-wide error value. `placeholder` is a stable dotted code such as
/// `INPUT.SPECTRUM_TOO_SHORT` that callers can match on without parsing text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticError {
    category: DiagnosticErrorCategory,
    placeholder: &'static str,
    message: String,
}

impl DiagnosticError {
    pub fn new(
        category: DiagnosticErrorCategory,
        placeholder: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            placeholder,
            message: message.into(),
        }
    }

    pub fn input(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(DiagnosticErrorCategory::InputError, placeholder, message)
    }

    pub fn io_system(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(DiagnosticErrorCategory::IoSystemError, placeholder, message)
    }

    pub fn numeric(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(DiagnosticErrorCategory::NumericError, placeholder, message)
    }

    pub fn external_data(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(
            DiagnosticErrorCategory::ExternalDataError,
            placeholder,
            message,
        )
    }

    pub fn internal(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(DiagnosticErrorCategory::InternalError, placeholder, message)
    }

    pub const fn category(&self) -> DiagnosticErrorCategory {
        self.category
    }

    pub const fn placeholder(&self) -> &'static str {
        self.placeholder
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn exit_code(&self) -> i32 {
        self.category.exit_code()
    }

    pub fn diagnostic_line(&self) -> String {
        format!("ERROR: [{}] {}", self.placeholder, self.message)
    }

    pub fn fatal_exit_line(&self) -> String {
        format!("FATAL EXIT CODE: {}", self.exit_code())
    }
}

impl Display for DiagnosticError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] {}",
            self.category, self.placeholder, self.message
        )
    }
}

impl Error for DiagnosticError {}

#[cfg(test)]
mod tests {
    use super::{DiagnosticError, DiagnosticErrorCategory};

    #[test]
    fn exit_code_mapping_is_stable() {
        let cases = [
            (DiagnosticErrorCategory::InputError, 2, "InputError"),
            (DiagnosticErrorCategory::IoSystemError, 3, "IoSystemError"),
            (DiagnosticErrorCategory::NumericError, 4, "NumericError"),
            (
                DiagnosticErrorCategory::ExternalDataError,
                5,
                "ExternalDataError",
            ),
            (DiagnosticErrorCategory::InternalError, 6, "InternalError"),
        ];

        for (category, exit_code, name) in cases {
            assert_eq!(category.exit_code(), exit_code);
            assert_eq!(category.as_str(), name);
        }
    }

    #[test]
    fn error_renders_diagnostic_lines() {
        let error = DiagnosticError::numeric(
            "NUMERIC.TEMPERATURE",
            "Boltzmann slope -0.5 yields a non-physical temperature",
        );

        assert_eq!(error.exit_code(), 4);
        assert_eq!(
            error.diagnostic_line(),
            "ERROR: [NUMERIC.TEMPERATURE] Boltzmann slope -0.5 yields a non-physical temperature"
        );
        assert_eq!(error.fatal_exit_line(), "FATAL EXIT CODE: 4");
        assert_eq!(
            error.to_string(),
            "NumericError [NUMERIC.TEMPERATURE] Boltzmann slope -0.5 yields a non-physical temperature"
        );
    }
}
