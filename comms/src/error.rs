use std::{
    error::Error,
    fmt::{self, Display},
};

/// Failure raised by a remote replica while serving a call.
///
/// Cloneable so a single failed call can be observed by every holder of its handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteErr {
    origin: String,
    msg: String,
}

impl RemoteErr {
    /// Creates a new `RemoteErr`.
    ///
    /// # Arguments
    /// * `origin` - The replica or task the failure comes from.
    /// * `msg` - The underlying error message, kept as is.
    pub fn new(origin: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            msg: msg.into(),
        }
    }

    /// The replica does not implement `op`.
    pub fn unsupported(origin: impl Into<String>, op: &str) -> Self {
        Self::new(origin, format!("{op} is not supported by this backend"))
    }

    #[inline]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    #[inline]
    pub fn msg(&self) -> &str {
        &self.msg
    }
}

impl Display for RemoteErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.origin, self.msg)
    }
}

impl Error for RemoteErr {}
