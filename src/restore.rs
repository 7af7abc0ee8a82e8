// Reconstruct base content from a derived collection and its diff.
//
// The derived collection supplies every resource the pipeline left untouched;
// the diff supplies the base bytes of everything it modified or removed, and
// names the resources it added so they can be left out.

use std::collections::{HashMap, HashSet};
use std::io;

use crate::collection::{MemoryCollection, ResourceCollection};
use crate::diff::record::{DiffKind, ResourceDiff};
use crate::diff::scope::Closing;
use crate::error::{DiffError, Side};

/// Counts reported by [`restore_base`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreCounts {
    /// Resources copied unchanged from derived.
    pub copied: usize,
    /// Resources taken from the diff (modified or removed).
    pub restored: usize,
    /// Derived resources left out because the diff marks them added.
    pub skipped: usize,
    /// Total bytes handed to the sink.
    pub bytes: u64,
}

/// Emit every base resource as `(name, bytes)` into `sink`.
///
/// Derived resources come first, in derived's listing order, followed by
/// removed resources in diff order. `derived` is consumed and closed on every
/// path. A diff that does not fit `derived` is rejected with
/// [`DiffError::Inconsistent`].
pub fn restore_base<D, F>(
    derived: D,
    diffs: &[ResourceDiff],
    sink: F,
) -> Result<RestoreCounts, DiffError>
where
    D: ResourceCollection,
    F: FnMut(&str, &[u8]) -> io::Result<()>,
{
    let derived = Closing::new(derived);
    // On error the guard is dropped here, which closes derived.
    let counts = restore_from(derived.get(), diffs, sink)?;
    derived.close().map_err(DiffError::Close)?;
    log::debug!(
        "restore: {} copied, {} restored, {} skipped, {} bytes",
        counts.copied,
        counts.restored,
        counts.skipped,
        counts.bytes
    );
    Ok(counts)
}

/// [`restore_base`] into a fresh [`MemoryCollection`].
pub fn restore_to_memory<D: ResourceCollection>(
    derived: D,
    diffs: &[ResourceDiff],
) -> Result<MemoryCollection, DiffError> {
    let mut out = MemoryCollection::new();
    restore_base(derived, diffs, |name, bytes| {
        out.push(name, bytes);
        Ok(())
    })?;
    Ok(out)
}

fn restore_from<D, F>(
    derived: &D,
    diffs: &[ResourceDiff],
    mut sink: F,
) -> Result<RestoreCounts, DiffError>
where
    D: ResourceCollection,
    F: FnMut(&str, &[u8]) -> io::Result<()>,
{
    let mut by_name: HashMap<&str, &ResourceDiff> = HashMap::with_capacity(diffs.len());
    for diff in diffs {
        if by_name.insert(diff.name(), diff).is_some() {
            return Err(DiffError::Inconsistent {
                name: diff.name().to_owned(),
                reason: "listed more than once in the diff",
            });
        }
    }

    let names = derived.names().map_err(|source| DiffError::Listing {
        side: Side::Derived,
        source,
    })?;

    let mut counts = RestoreCounts::default();
    let mut emit = |name: &str, bytes: &[u8], counts: &mut RestoreCounts| {
        counts.bytes += bytes.len() as u64;
        sink(name, bytes).map_err(|source| DiffError::Sink {
            name: name.to_owned(),
            source,
        })
    };

    let mut present = HashSet::with_capacity(names.len());
    for name in &names {
        if !present.insert(name.as_str()) {
            continue;
        }
        match by_name.get(name.as_str()).map(|d| (d.kind(), d.bytes())) {
            None => {
                let bytes = derived
                    .read_all(name)
                    .map_err(|e| DiffError::lookup(Side::Derived, name, e))?;
                emit(name, &bytes, &mut counts)?;
                counts.copied += 1;
            }
            Some((DiffKind::Added, _)) => counts.skipped += 1,
            Some((DiffKind::Modified, bytes)) => {
                emit(name, bytes.unwrap_or_default(), &mut counts)?;
                counts.restored += 1;
            }
            Some((DiffKind::Removed, _)) => {
                return Err(DiffError::Inconsistent {
                    name: name.clone(),
                    reason: "removed resource is present in derived",
                });
            }
        }
    }

    for diff in diffs {
        if present.contains(diff.name()) {
            continue;
        }
        match diff.kind() {
            DiffKind::Removed => {
                emit(diff.name(), diff.bytes().unwrap_or_default(), &mut counts)?;
                counts.restored += 1;
            }
            DiffKind::Added | DiffKind::Modified => {
                return Err(DiffError::Inconsistent {
                    name: diff.name().to_owned(),
                    reason: "resource is missing from derived",
                });
            }
        }
    }

    Ok(counts)
}
