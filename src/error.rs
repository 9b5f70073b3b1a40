use core::fmt;

/// Which injected observer failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObserverKind {
    Rect,
    Offset,
}

impl fmt::Display for ObserverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObserverKind::Rect => f.write_str("element rect"),
            ObserverKind::Offset => f.write_str("element offset"),
        }
    }
}

/// Returned by a host observer that could not register.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObserveError {
    pub reason: &'static str,
}

impl ObserveError {
    pub fn new(reason: &'static str) -> Self {
        Self { reason }
    }
}

impl fmt::Display for ObserveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason)
    }
}

impl core::error::Error for ObserveError {}

/// Errors that cross the engine boundary.
///
/// Invalid sizes and lane counts are not errors here: they are logged and replaced by safe
/// defaults. Calls made after teardown are silently ignored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    Observe {
        observer: ObserverKind,
        source: ObserveError,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Observe { observer, source } => {
                write!(f, "failed to observe {observer}: {source}")
            }
        }
    }
}

impl core::error::Error for Error {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Error::Observe { source, .. } => Some(source),
        }
    }
}
