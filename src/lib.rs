//! Resdelta: resource-level diffs between a base collection and the
//! collection a transformation pipeline derived from it.
//!
//! The crate provides:
//! - The resource collection abstraction and two providers (`collection`)
//! - Diff generation with a streaming content comparator (`diff`)
//! - Reconstruction of the base from derived + diff (`restore`)
//! - A compact diff-file format (`format`)
//! - Directory-oriented helpers (`io`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```
//! use resdelta::collection::MemoryCollection;
//! use resdelta::diff::{DiffKind, generate_diff};
//!
//! let base = MemoryCollection::new()
//!     .with("a", b"1".to_vec())
//!     .with("b", b"2".to_vec());
//! let derived = MemoryCollection::new()
//!     .with("a", b"1".to_vec())
//!     .with("c", b"3".to_vec());
//!
//! let diffs = generate_diff(base, derived).unwrap();
//! assert_eq!(diffs.len(), 2);
//! assert_eq!(diffs[0].kind(), DiffKind::Removed);
//! assert_eq!(diffs[0].bytes(), Some(&b"2"[..]));
//! assert_eq!(diffs[1].kind(), DiffKind::Added);
//! ```

pub mod collection;
pub mod diff;
pub mod error;
pub mod format;
pub mod io;
pub mod restore;

#[cfg(feature = "cli")]
pub mod cli;

pub use collection::{DirCollection, MemoryCollection, ResourceCollection};
pub use diff::{DiffGenerator, DiffKind, DiffOptions, ResourceDiff, generate_diff};
pub use error::{DiffError, Side};
