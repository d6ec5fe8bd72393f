//! Error taxonomy for mapping operations.
//!
//! Failures are immediate and synchronous. A factory error surfaces to the
//! caller verbatim; mutations already applied to the target graph before the
//! failure are not rolled back.

use std::error::Error;
use std::fmt;

/// Everything that can go wrong while materializing or dematerializing.
#[derive(Debug)]
pub enum MapError {
    /// Configuration is malformed, e.g. process-wide defaults whose
    /// `ignore`/`include` entry is not a list, or a keyed sequence
    /// operation on a sequence that carries no key function.
    InvalidOptions(String),
    /// A wire-format entry point received empty input text.
    MissingSource,
    /// Two elements of one keyed array resolved to the same key.
    DuplicateKey(String),
    /// Input text is not valid JSON.
    Parse(serde_json::Error),
    /// An error returned by a user-supplied factory, passed through
    /// unaltered.
    User(Box<dyn Error>),
}

impl fmt::Display for MapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidOptions(detail) => write!(f, "invalid mapping options: {detail}"),
            Self::MissingSource => write!(f, "no source data supplied"),
            Self::DuplicateKey(key) => write!(f, "duplicate key in array: {key}"),
            Self::Parse(err) => write!(f, "source is not valid JSON: {err}"),
            Self::User(err) => write!(f, "{err}"),
        }
    }
}

impl Error for MapError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::User(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for MapError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err)
    }
}

impl MapError {
    /// Wrap an arbitrary error as a factory failure.
    pub fn user(err: impl Error + 'static) -> Self {
        Self::User(Box::new(err))
    }

    /// Factory failure from a bare message.
    pub fn msg(message: impl Into<String>) -> Self {
        struct Msg(String);
        impl fmt::Debug for Msg {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Debug::fmt(&self.0, f)
            }
        }
        impl fmt::Display for Msg {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
        impl Error for Msg {}
        Self::User(Box::new(Msg(message.into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_covers_every_variant() {
        assert_eq!(
            MapError::InvalidOptions("ignore must be a list".into()).to_string(),
            "invalid mapping options: ignore must be a list"
        );
        assert_eq!(MapError::MissingSource.to_string(), "no source data supplied");
        assert_eq!(
            MapError::DuplicateKey("7".into()).to_string(),
            "duplicate key in array: 7"
        );
        assert_eq!(MapError::msg("boom").to_string(), "boom");
    }

    #[test]
    fn user_error_keeps_source_chain() {
        let err = MapError::user(std::io::Error::other("inner"));
        assert!(err.source().is_some());
    }
}
