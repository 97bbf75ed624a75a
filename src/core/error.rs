use std::path::PathBuf;

use thiserror::Error;

/// Error returned by a record handler.
///
/// The reader never inspects or rewraps it: `Error::Handler` carries the
/// handler's value as-is, so callers can `downcast_ref` to their own type.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to open bag {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },
    #[error("bag is closed")]
    Closed,
    #[error("handler failed: {0}")]
    Handler(#[source] HandlerError),
    #[error("corrupt data: {0}")]
    Corrupt(&'static str),
    #[error("corrupt index: {0}")]
    CorruptIndex(String),
    #[error("unsupported: {0}")]
    Unsupported(&'static str),
    #[error("unsupported version: {0}")]
    UnsupportedVersion(u32),
    #[error("payload too large")]
    PayloadTooLarge,
    #[error("decode error: {0}")]
    Decode(&'static str),
    #[error("topic {topic} carries {found}, expected {expected}")]
    TypeMismatch {
        topic: String,
        expected: String,
        found: String,
    },
    #[error("bag already exists at {}", .0.display())]
    AlreadyExists(PathBuf),
}

impl Error {
    /// Wraps a failure raised while opening the bag at `path`.
    pub(crate) fn open(path: impl Into<PathBuf>, source: Error) -> Self {
        Error::Open {
            path: path.into(),
            source: Box::new(source),
        }
    }

    /// Returns the underlying cause of an `Open` failure, or `self`.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Open { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Rejected(u32);

    impl std::fmt::Display for Rejected {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "rejected record {}", self.0)
        }
    }

    impl std::error::Error for Rejected {}

    #[test]
    fn handler_error_keeps_original_value() {
        let err = Error::Handler(Box::new(Rejected(7)));
        let Error::Handler(inner) = &err else {
            panic!("expected handler error");
        };
        assert_eq!(inner.downcast_ref::<Rejected>().unwrap().0, 7);
        assert_eq!(err.to_string(), "handler failed: rejected record 7");
    }

    #[test]
    fn open_error_reports_path_and_cause() {
        let err = Error::open("/tmp/missing.bag", Error::Corrupt("chunk magic mismatch"));
        assert_eq!(
            err.to_string(),
            "failed to open bag /tmp/missing.bag: corrupt data: chunk magic mismatch"
        );
        assert!(matches!(err.root_cause(), Error::Corrupt(_)));
        assert!(std::error::Error::source(&err).is_some());
    }
}
