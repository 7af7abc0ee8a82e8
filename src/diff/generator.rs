// Three-way reconciliation of resource names between base and derived.
//
// One pass over base's names against a working set of derived's names:
//   - a base name missing from the set was removed by the pipeline
//   - a base name found in the set is taken out of it and its content compared
//   - whatever is left in the set afterwards was added by the pipeline
//
// Both collections are owned by the generator for the duration of the call
// and closed on every exit path.

use std::collections::HashSet;

use crate::collection::ResourceCollection;
use crate::diff::compare::{DEFAULT_CHUNK_SIZE, StreamComparator};
use crate::diff::record::{DiffSummary, ResourceDiff};
use crate::diff::scope::ClosingPair;
use crate::error::{DiffError, Side};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// What to do when base lists the same name more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Abort with [`DiffError::DuplicateName`].
    #[default]
    Reject,
    /// Process each occurrence. The first claims the derived entry; every
    /// later occurrence finds it gone and is reported as removed.
    FirstWins,
}

/// Configuration for diff generation.
#[derive(Debug, Clone)]
pub struct DiffOptions {
    /// Bytes read per step when comparing content.
    pub chunk_size: usize,
    /// Handling of repeated base names.
    pub duplicates: DuplicatePolicy,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            duplicates: DuplicatePolicy::Reject,
        }
    }
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

/// Computes the resource diff between a base and a derived collection.
#[derive(Debug, Clone, Default)]
pub struct DiffGenerator {
    options: DiffOptions,
}

impl DiffGenerator {
    pub fn new(options: DiffOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &DiffOptions {
        &self.options
    }

    /// Diff `base` against `derived`, consuming and closing both.
    ///
    /// Removed and modified records come out in base's name order, added
    /// records sorted by name. Callers must not rely on the order.
    pub fn generate<B, D>(&self, base: B, derived: D) -> Result<Vec<ResourceDiff>, DiffError>
    where
        B: ResourceCollection,
        D: ResourceCollection,
    {
        let scope = ClosingPair::new(base, derived);
        // On error the scope is dropped here, which closes both collections.
        let diffs = self.reconcile(scope.first(), scope.second())?;
        scope.close().map_err(DiffError::Close)?;

        if log::log_enabled!(log::Level::Debug) {
            let s = DiffSummary::of(&diffs);
            log::debug!(
                "diff: {} added, {} removed, {} modified, {} base bytes retained",
                s.added,
                s.removed,
                s.modified,
                s.retained_bytes
            );
        }
        Ok(diffs)
    }

    fn reconcile<B, D>(&self, base: &B, derived: &D) -> Result<Vec<ResourceDiff>, DiffError>
    where
        B: ResourceCollection,
        D: ResourceCollection,
    {
        let derived_names = derived.names().map_err(|source| DiffError::Listing {
            side: Side::Derived,
            source,
        })?;
        let derived_len = derived_names.len();
        let mut remaining: HashSet<String> = derived_names.into_iter().collect();
        if remaining.len() != derived_len {
            log::debug!(
                "derived listing has {} duplicate names; collapsed",
                derived_len - remaining.len()
            );
        }

        let base_names = base.names().map_err(|source| DiffError::Listing {
            side: Side::Base,
            source,
        })?;
        log::debug!(
            "reconciling {} base names against {} derived names",
            base_names.len(),
            remaining.len()
        );

        let mut comparator = StreamComparator::new(self.options.chunk_size);
        let mut seen = HashSet::new();
        let mut diffs = Vec::new();

        for name in base_names {
            if self.options.duplicates == DuplicatePolicy::Reject && !seen.insert(name.clone()) {
                return Err(DiffError::DuplicateName(name));
            }

            if !remaining.remove(&name) {
                let bytes = read_base(base, &name)?;
                log::trace!("{name}: removed ({} bytes)", bytes.len());
                diffs.push(ResourceDiff::removed(name, bytes));
                continue;
            }

            if !content_equal(&mut comparator, base, derived, &name)? {
                let bytes = read_base(base, &name)?;
                log::trace!("{name}: modified");
                diffs.push(ResourceDiff::modified(name, bytes));
            }
        }

        let mut added: Vec<String> = remaining.into_iter().collect();
        added.sort_unstable();
        for name in added {
            log::trace!("{name}: added");
            diffs.push(ResourceDiff::added(name));
        }

        Ok(diffs)
    }
}

fn read_base<B: ResourceCollection>(base: &B, name: &str) -> Result<Vec<u8>, DiffError> {
    base.read_all(name)
        .map_err(|e| DiffError::lookup(Side::Base, name, e))
}

fn content_equal<B, D>(
    comparator: &mut StreamComparator,
    base: &B,
    derived: &D,
    name: &str,
) -> Result<bool, DiffError>
where
    B: ResourceCollection,
    D: ResourceCollection,
{
    let base_stream = base
        .open_stream(name)
        .map_err(|e| DiffError::lookup(Side::Base, name, e))?;
    let derived_stream = derived
        .open_stream(name)
        .map_err(|e| DiffError::lookup(Side::Derived, name, e))?;
    // Both streams are moved into the comparator and dropped there, whatever
    // the outcome.
    comparator
        .equal(base_stream, derived_stream)
        .map_err(|source| DiffError::Compare {
            name: name.to_owned(),
            source,
        })
}

// ---------------------------------------------------------------------------
// Convenience function
// ---------------------------------------------------------------------------

/// Diff two collections with default options.
pub fn generate_diff<B, D>(base: B, derived: D) -> Result<Vec<ResourceDiff>, DiffError>
where
    B: ResourceCollection,
    D: ResourceCollection,
{
    DiffGenerator::default().generate(base, derived)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::MemoryCollection;
    use crate::diff::record::DiffKind;
    use std::io::{self, Read};

    fn mem(entries: &[(&str, &str)]) -> MemoryCollection {
        entries.iter().map(|&(n, b)| (n, b.as_bytes().to_vec())).collect()
    }

    fn sorted(mut diffs: Vec<ResourceDiff>) -> Vec<(DiffKind, String, Option<Vec<u8>>)> {
        diffs.sort_by(|a, b| a.name().cmp(b.name()));
        diffs.into_iter().map(ResourceDiff::into_parts).collect()
    }

    #[test]
    fn identical_collections_give_empty_diff() {
        let diffs = generate_diff(mem(&[("a", "x"), ("b", "y")]), mem(&[("a", "x"), ("b", "y")]))
            .unwrap();
        assert!(diffs.is_empty());
    }

    #[test]
    fn removed_entry_keeps_base_bytes() {
        let diffs = generate_diff(mem(&[("a", "x"), ("b", "y")]), mem(&[("a", "x")])).unwrap();
        assert_eq!(diffs, vec![ResourceDiff::removed("b", b"y".to_vec())]);
    }

    #[test]
    fn added_entry_has_no_bytes() {
        let diffs = generate_diff(mem(&[("a", "x")]), mem(&[("a", "x"), ("c", "z")])).unwrap();
        assert_eq!(diffs, vec![ResourceDiff::added("c")]);
    }

    #[test]
    fn modified_entry_keeps_base_bytes() {
        let diffs = generate_diff(mem(&[("a", "x")]), mem(&[("a", "z")])).unwrap();
        assert_eq!(diffs, vec![ResourceDiff::modified("a", b"x".to_vec())]);
    }

    #[test]
    fn empty_sides_degenerate() {
        let diffs = generate_diff(mem(&[]), mem(&[("a", "x")])).unwrap();
        assert_eq!(diffs, vec![ResourceDiff::added("a")]);

        let diffs = generate_diff(mem(&[("a", "x"), ("b", "")]), mem(&[])).unwrap();
        assert_eq!(
            sorted(diffs),
            vec![
                (DiffKind::Removed, "a".into(), Some(b"x".to_vec())),
                (DiffKind::Removed, "b".into(), Some(Vec::new())),
            ]
        );

        assert!(generate_diff(mem(&[]), mem(&[])).unwrap().is_empty());
    }

    #[test]
    fn mixed_changes() {
        let base = mem(&[("keep", "same"), ("gone", "old"), ("edit", "v1"), ("grow", "ab")]);
        let derived = mem(&[("new2", "n"), ("edit", "v2"), ("keep", "same"), ("grow", "abc"), ("new1", "")]);
        let diffs = generate_diff(base, derived).unwrap();
        assert_eq!(
            sorted(diffs),
            vec![
                (DiffKind::Modified, "edit".into(), Some(b"v1".to_vec())),
                (DiffKind::Removed, "gone".into(), Some(b"old".to_vec())),
                (DiffKind::Modified, "grow".into(), Some(b"ab".to_vec())),
                (DiffKind::Added, "new1".into(), None),
                (DiffKind::Added, "new2".into(), None),
            ]
        );
    }

    #[test]
    fn added_records_are_sorted_after_base_order() {
        let base = mem(&[("z", "1"), ("y", "2")]);
        let derived = mem(&[("c", "1"), ("a", "1"), ("b", "1")]);
        let names: Vec<_> = generate_diff(base, derived)
            .unwrap()
            .iter()
            .map(|d| d.name().to_owned())
            .collect();
        assert_eq!(names, vec!["z", "y", "a", "b", "c"]);
    }

    #[test]
    fn small_chunks_compare_the_same() {
        let long = "0123456789".repeat(50);
        let mut other = long.clone();
        other.push('!');
        let generator = DiffGenerator::new(DiffOptions {
            chunk_size: 3,
            ..Default::default()
        });
        let diffs = generator
            .generate(
                mem(&[("a", long.as_str()), ("b", long.as_str())]),
                mem(&[("a", long.as_str()), ("b", other.as_str())]),
            )
            .unwrap();
        assert_eq!(diffs, vec![ResourceDiff::modified("b", long.into_bytes())]);
    }

    #[test]
    fn duplicate_base_names_rejected_by_default() {
        let mut base = MemoryCollection::new();
        base.push("a", "x");
        base.push("a", "x");
        let mut derived = mem(&[("a", "x")]);
        let err = generate_diff(&mut base, &mut derived).unwrap_err();
        assert!(matches!(err, DiffError::DuplicateName(ref n) if n == "a"));
        assert!(base.is_closed());
        assert!(derived.is_closed());
    }

    #[test]
    fn duplicate_base_names_first_wins() {
        let mut base = MemoryCollection::new();
        base.push("a", "x");
        base.push("a", "x");
        let generator = DiffGenerator::new(DiffOptions {
            duplicates: DuplicatePolicy::FirstWins,
            ..Default::default()
        });
        let diffs = generator.generate(base, mem(&[("a", "x")])).unwrap();
        assert_eq!(diffs, vec![ResourceDiff::removed("a", b"x".to_vec())]);
    }

    #[test]
    fn duplicate_derived_names_collapse() {
        let mut derived = MemoryCollection::new();
        derived.push("n", "1");
        derived.push("n", "1");
        let diffs = generate_diff(mem(&[]), derived).unwrap();
        assert_eq!(diffs, vec![ResourceDiff::added("n")]);
    }

    #[test]
    fn collections_closed_after_success() {
        let mut base = mem(&[("a", "x")]);
        let mut derived = mem(&[("a", "y")]);
        generate_diff(&mut base, &mut derived).unwrap();
        assert!(base.is_closed());
        assert!(derived.is_closed());
    }

    /// Lists a name it cannot serve.
    struct Broken {
        kind: io::ErrorKind,
        closed: bool,
    }

    impl ResourceCollection for Broken {
        fn names(&self) -> io::Result<Vec<String>> {
            Ok(vec!["a".into()])
        }

        fn read_all(&self, _name: &str) -> io::Result<Vec<u8>> {
            Err(io::Error::new(self.kind, "broken"))
        }

        fn open_stream(&self, _name: &str) -> io::Result<Box<dyn Read + '_>> {
            Err(io::Error::new(self.kind, "broken"))
        }

        fn close(&mut self) -> io::Result<()> {
            self.closed = true;
            Ok(())
        }
    }

    #[test]
    fn unreadable_listed_name_is_not_found() {
        let mut base = Broken {
            kind: io::ErrorKind::NotFound,
            closed: false,
        };
        let mut derived = mem(&[]);
        let err = generate_diff(&mut base, &mut derived).unwrap_err();
        assert!(matches!(err, DiffError::NotFound { side: Side::Base, ref name, .. } if name == "a"));
        assert!(base.closed);
        assert!(derived.is_closed());
    }

    #[test]
    fn stream_failure_aborts_with_io_error() {
        let mut base = mem(&[("a", "x")]);
        let mut derived = Broken {
            kind: io::ErrorKind::PermissionDenied,
            closed: false,
        };
        let err = generate_diff(&mut base, &mut derived).unwrap_err();
        assert!(matches!(err, DiffError::Io { side: Side::Derived, .. }));
        assert!(base.is_closed());
        assert!(derived.closed);
    }

    /// Serves a memory collection but fails to release it.
    struct StuckOnClose(MemoryCollection);

    impl ResourceCollection for StuckOnClose {
        fn names(&self) -> io::Result<Vec<String>> {
            self.0.names()
        }

        fn read_all(&self, name: &str) -> io::Result<Vec<u8>> {
            self.0.read_all(name)
        }

        fn open_stream(&self, name: &str) -> io::Result<Box<dyn Read + '_>> {
            self.0.open_stream(name)
        }

        fn close(&mut self) -> io::Result<()> {
            self.0.close()?;
            Err(io::Error::other("handle still busy"))
        }
    }

    #[test]
    fn close_failure_after_success_is_reported() {
        let mut base = StuckOnClose(mem(&[("a", "x")]));
        let mut derived = mem(&[("a", "y")]);
        let err = generate_diff(&mut base, &mut derived).unwrap_err();
        assert!(matches!(err, DiffError::Close(ref e) if e.to_string() == "handle still busy"));
        assert!(base.0.is_closed());
        assert!(derived.is_closed());

        let mut base = mem(&[("a", "x")]);
        let mut derived = StuckOnClose(mem(&[("a", "x")]));
        let err = generate_diff(&mut base, &mut derived).unwrap_err();
        assert!(matches!(err, DiffError::Close(_)));
        assert!(base.is_closed());
        assert!(derived.0.is_closed());
    }

    #[test]
    fn close_failure_does_not_mask_earlier_error() {
        let mut base = StuckOnClose(MemoryCollection::new().with("a", "x").with("a", "x"));
        let err = generate_diff(&mut base, mem(&[])).unwrap_err();
        assert!(matches!(err, DiffError::DuplicateName(_)));
        assert!(base.0.is_closed());
    }

    /// Streams fail with `ConnectionReset` after the first byte.
    struct ResetMidStream(MemoryCollection);

    struct Reset;

    impl Read for Reset {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
        }
    }

    impl ResourceCollection for ResetMidStream {
        fn names(&self) -> io::Result<Vec<String>> {
            self.0.names()
        }

        fn read_all(&self, name: &str) -> io::Result<Vec<u8>> {
            self.0.read_all(name)
        }

        fn open_stream(&self, name: &str) -> io::Result<Box<dyn Read + '_>> {
            let head = self.0.read_all(name)?.into_iter().take(1).collect::<Vec<u8>>();
            Ok(Box::new(io::Cursor::new(head).chain(Reset)))
        }

        fn close(&mut self) -> io::Result<()> {
            self.0.close()
        }
    }

    #[test]
    fn stream_failure_mid_comparison_is_compare_error() {
        for chunk_size in [1, DEFAULT_CHUNK_SIZE] {
            let generator = DiffGenerator::new(DiffOptions {
                chunk_size,
                ..Default::default()
            });
            let mut base = mem(&[("a", "xyz")]);
            let mut derived = ResetMidStream(mem(&[("a", "xyz")]));
            let err = generator.generate(&mut base, &mut derived).unwrap_err();
            assert!(
                matches!(err, DiffError::Compare { ref name, ref source }
                    if name == "a" && source.kind() == io::ErrorKind::ConnectionReset),
                "chunk_size={chunk_size}: {err:?}"
            );
            assert!(base.is_closed());
            assert!(derived.0.is_closed());
        }
    }

    #[test]
    fn huge_chunk_size_is_accepted() {
        let generator = DiffGenerator::new(DiffOptions {
            chunk_size: usize::MAX,
            ..Default::default()
        });
        assert!(generator.generate(mem(&[("a", "x")]), mem(&[("a", "x")])).unwrap().is_empty());
        assert_eq!(
            generator.generate(mem(&[("a", "x")]), mem(&[("a", "y")])).unwrap(),
            vec![ResourceDiff::modified("a", b"x".to_vec())]
        );
    }

    #[test]
    fn listing_failure_is_reported_per_side() {
        let mut closed = mem(&[("a", "x")]);
        closed.close().unwrap();
        let err = generate_diff(mem(&[]), closed).unwrap_err();
        assert!(matches!(err, DiffError::Listing { side: Side::Derived, .. }));
    }
}
