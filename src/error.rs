use std::fmt;

/// Error type of fallible map operations.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Error {
    /// A key without a total order reached a map whose collision groups are
    /// ordered trees.
    Unordered,
    /// A range passed to a bulk helper does not fit its source.
    OutOfBounds {
        offset: usize,
        limit: usize,
        len: usize,
    },
    /// An internal structure invariant does not hold.
    Invariant(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Unordered => write!(
                f,
                "key has no total order but the map keeps ordered collision groups"
            ),
            Error::OutOfBounds { offset, limit, len } => {
                write!(f, "range {}..{} out of bounds for length {}", offset, limit, len)
            }
            Error::Invariant(message) => write!(f, "invariant violated: {}", message),
        }
    }
}

impl std::error::Error for Error {}

/// Result type of fallible map operations.
pub type Result<T> = std::result::Result<T, Error>;

pub(crate) fn invariant<T>(message: impl Into<String>) -> Result<T> {
    Err(Error::Invariant(message.into()))
}

// Errors of the panicking forms are contract violations by the caller.
pub(crate) fn or_panic<T>(result: Result<T>) -> T {
    match result {
        Ok(value) => value,
        Err(error) => panic!("{}", error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(
            Error::OutOfBounds {
                offset: 3,
                limit: 9,
                len: 4
            }
            .to_string(),
            "range 3..9 out of bounds for length 4"
        );
        assert_eq!(
            Error::Invariant("size".into()).to_string(),
            "invariant violated: size"
        );
        assert!(Error::Unordered.to_string().contains("total order"));
    }

    #[test]
    fn invariant_helper() {
        assert_eq!(invariant::<()>("x"), Err(Error::Invariant("x".into())));
    }

    #[test]
    #[should_panic(expected = "total order")]
    fn or_panic_unordered() {
        or_panic::<()>(Err(Error::Unordered));
    }
}
