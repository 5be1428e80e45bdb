//! Error type shared across the sqlctx crates.
mod code;

use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error;
use std::fmt;

pub use code::{ErrorCode, Severity};

pub type Result<T, E = DbError> = std::result::Result<T, E>;

/// Return early with a "not supported yet" error.
#[macro_export]
macro_rules! not_implemented {
    ($($arg:tt)+) => {{
        let msg = format!($($arg)+);
        return Err($crate::DbError::coded($crate::ErrorCode::NotSupportedYet, [msg]));
    }};
}

#[derive(Debug)]
pub struct DbError {
    inner: Box<DbErrorInner>,
}

#[derive(Debug)]
struct DbErrorInner {
    msg: String,
    /// Stable code and its arguments. Errors without a code are internal
    /// invariant failures.
    code: Option<(ErrorCode, Vec<String>)>,
    /// Additional structured context.
    fields: Vec<(&'static str, String)>,
    source: Option<Box<dyn Error + Send + Sync>>,
    backtrace: Backtrace,
}

impl DbError {
    pub fn new(msg: impl Into<String>) -> Self {
        DbError {
            inner: Box::new(DbErrorInner {
                msg: msg.into(),
                code: None,
                fields: Vec::new(),
                source: None,
                backtrace: Backtrace::capture(),
            }),
        }
    }

    /// Create an error carrying a stable code.
    pub fn coded<I, S>(code: ErrorCode, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        let mut err = Self::new(code.name());
        err.inner.code = Some((code, args));
        err
    }

    pub fn with_source(msg: impl Into<String>, source: Box<dyn Error + Send + Sync>) -> Self {
        let mut err = Self::new(msg);
        err.inner.source = Some(source);
        err
    }

    pub fn with_field(mut self, key: &'static str, value: impl fmt::Display) -> Self {
        self.inner.fields.push((key, value.to_string()));
        self
    }

    pub fn with_fields<I, V>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, V)>,
        V: fmt::Display,
    {
        for (key, value) in fields {
            self.inner.fields.push((key, value.to_string()));
        }
        self
    }

    pub fn message(&self) -> &str {
        &self.inner.msg
    }

    pub fn code(&self) -> Option<ErrorCode> {
        self.inner.code.as_ref().map(|(code, _)| *code)
    }

    /// Arguments for the code, empty if the error has no code.
    pub fn args(&self) -> &[String] {
        match &self.inner.code {
            Some((_, args)) => args,
            None => &[],
        }
    }

    pub fn fields(&self) -> &[(&'static str, String)] {
        &self.inner.fields
    }

    pub fn get_field(&self, key: &str) -> Option<&str> {
        self.inner
            .fields
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self.inner.backtrace.status() {
            BacktraceStatus::Captured => Some(&self.inner.backtrace),
            _ => None,
        }
    }
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner.msg)?;
        if let Some((code, args)) = &self.inner.code {
            write!(f, " [{}]", code.number())?;
            if !args.is_empty() {
                write!(f, " ({})", args.join(", "))?;
            }
        }
        for (key, value) in &self.inner.fields {
            write!(f, "\n    {key}: {value}")?;
        }
        if let Some(source) = &self.inner.source {
            write!(f, "\nError source: {source}")?;
        }
        Ok(())
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.inner.source.as_ref().map(|e| e.as_ref() as _)
    }
}

/// Extension trait for wrapping foreign errors.
pub trait ResultExt<T, E> {
    /// Wrap an error with a static context string.
    fn context(self, msg: &'static str) -> Result<T>;

    /// Wrap an error with a context string generated from a function.
    fn context_fn<F: Fn() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Error + Send + Sync + 'static> ResultExt<T, E> for std::result::Result<T, E> {
    fn context(self, msg: &'static str) -> Result<T> {
        match self {
            Ok(v) => Ok(v),
            Err(e) => Err(DbError::with_source(msg, Box::new(e))),
        }
    }

    fn context_fn<F: Fn() -> String>(self, f: F) -> Result<T> {
        match self {
            Ok(v) => Ok(v),
            Err(e) => Err(DbError::with_source(f(), Box::new(e))),
        }
    }
}

pub trait OptionExt<T> {
    /// Return an internal error if the option is None.
    fn required(self, what: &'static str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn required(self, what: &'static str) -> Result<T> {
        match self {
            Some(v) => Ok(v),
            None => Err(DbError::new(format!("Missing required value: {what}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coded_error_keeps_code_and_args() {
        let err = DbError::coded(ErrorCode::UnknownTable, ["t1", "MULTI DELETE"]);
        assert_eq!(Some(ErrorCode::UnknownTable), err.code());
        assert_eq!(&["t1".to_string(), "MULTI DELETE".to_string()], err.args());
    }

    #[test]
    fn uncoded_error_has_no_args() {
        let err = DbError::new("internal");
        assert_eq!(None, err.code());
        assert!(err.args().is_empty());
    }

    #[test]
    fn display_with_fields() {
        let err = DbError::new("Missing table")
            .with_field("table", "t1")
            .with_field("idx", 3);
        assert_eq!("Missing table\n    table: t1\n    idx: 3", err.to_string());
        assert_eq!(Some("3"), err.get_field("idx"));
    }

    #[test]
    fn context_wraps_source() {
        let res: std::result::Result<u8, _> = "abc".parse::<u8>();
        let err = res.context("failed to parse").unwrap_err();
        assert_eq!("failed to parse", err.message());
        assert!(err.source().is_some());
    }

    #[test]
    fn required_on_none() {
        let v: Option<u8> = None;
        let err = v.required("value").unwrap_err();
        assert_eq!(None, err.code());
    }

    #[test]
    fn not_implemented_is_coded() {
        fn unsupported() -> Result<()> {
            not_implemented!("feature {}", 1)
        }
        let err = unsupported().unwrap_err();
        assert_eq!(Some(ErrorCode::NotSupportedYet), err.code());
        assert_eq!(&["feature 1".to_string()], err.args());
    }
}
