// Resource diff generation.
//
// - `record`: DiffKind / ResourceDiff, one classified difference
// - `compare`: StreamComparator, chunked exact byte-equality of two streams
// - `scope`: ClosingPair, releases both collections on every exit path
// - `generator`: DiffGenerator, name reconciliation and classification

pub mod compare;
pub mod generator;
pub mod record;
pub mod scope;

pub use compare::{DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE, StreamComparator, streams_equal};
pub use generator::{DiffGenerator, DiffOptions, DuplicatePolicy, generate_diff};
pub use record::{DiffKind, DiffSummary, ResourceDiff};
pub use scope::{Closing, ClosingPair};
