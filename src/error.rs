// Error taxonomy for diff generation and restore.
//
// Every failure is fatal to the current call: no partial diff is returned
// and nothing is retried. Collection failures arrive as `std::io::Error`;
// `ErrorKind::NotFound` is reported as `NotFound`, everything else as `Io`.

use std::fmt;
use std::io;

/// Which side of a diff an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The unmodified collection.
    Base,
    /// The transformed collection.
    Derived,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Base => f.write_str("base"),
            Self::Derived => f.write_str("derived"),
        }
    }
}

/// Errors raised while computing or applying a resource diff.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// A listed resource could not be read back from its own collection.
    #[error("{side} resource not found: {name}")]
    NotFound {
        side: Side,
        name: String,
        #[source]
        source: io::Error,
    },

    /// Underlying read failure while fetching or comparing resource bytes.
    #[error("I/O error reading {side} resource {name}: {source}")]
    Io {
        side: Side,
        name: String,
        #[source]
        source: io::Error,
    },

    /// Read failure while streaming both copies of a resource for comparison.
    #[error("I/O error comparing resource {name}: {source}")]
    Compare {
        name: String,
        #[source]
        source: io::Error,
    },

    /// The collection's name listing itself failed.
    #[error("cannot list {side} collection: {source}")]
    Listing {
        side: Side,
        #[source]
        source: io::Error,
    },

    /// A name occurs more than once in the base collection's listing.
    #[error("duplicate resource name in base collection: {0}")]
    DuplicateName(String),

    /// Releasing a collection failed after an otherwise successful run.
    #[error("failed to release collection: {0}")]
    Close(#[source] io::Error),

    /// A restored resource could not be handed to its destination.
    #[error("failed to write restored resource {name}: {source}")]
    Sink {
        name: String,
        #[source]
        source: io::Error,
    },

    /// A diff does not fit the derived collection it is being applied to.
    #[error("diff does not match derived collection at {name}: {reason}")]
    Inconsistent { name: String, reason: &'static str },
}

impl DiffError {
    /// Classify a lookup failure for `name` on `side`.
    pub(crate) fn lookup(side: Side, name: &str, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            Self::NotFound {
                side,
                name: name.to_owned(),
                source,
            }
        } else {
            Self::Io {
                side,
                name: name.to_owned(),
                source,
            }
        }
    }
}
