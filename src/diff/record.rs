// Diff records: one classified difference per resource name.

use std::fmt;

/// How a resource differs between base and derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DiffKind {
    /// Present only in derived.
    Added,
    /// Present only in base.
    Removed,
    /// Present in both with different content.
    Modified,
}

impl DiffKind {
    /// Wire code used by the diff-file format.
    pub const fn code(self) -> u8 {
        match self {
            Self::Added => 0,
            Self::Removed => 1,
            Self::Modified => 2,
        }
    }

    /// Inverse of [`code`](Self::code).
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Added),
            1 => Some(Self::Removed),
            2 => Some(Self::Modified),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Added => "ADDED",
            Self::Removed => "REMOVED",
            Self::Modified => "MODIFIED",
        }
    }
}

impl fmt::Display for DiffKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A single resource difference.
///
/// Removed and modified records carry the base bytes of the resource; added
/// records never carry bytes. The constructors are the only way to build a
/// record, so the pairing always holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDiff {
    kind: DiffKind,
    name: String,
    bytes: Option<Vec<u8>>,
}

impl ResourceDiff {
    pub fn added(name: impl Into<String>) -> Self {
        Self {
            kind: DiffKind::Added,
            name: name.into(),
            bytes: None,
        }
    }

    pub fn removed(name: impl Into<String>, base_bytes: Vec<u8>) -> Self {
        Self {
            kind: DiffKind::Removed,
            name: name.into(),
            bytes: Some(base_bytes),
        }
    }

    pub fn modified(name: impl Into<String>, base_bytes: Vec<u8>) -> Self {
        Self {
            kind: DiffKind::Modified,
            name: name.into(),
            bytes: Some(base_bytes),
        }
    }

    pub fn kind(&self) -> DiffKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Base bytes for removed/modified records, `None` for added ones.
    pub fn bytes(&self) -> Option<&[u8]> {
        self.bytes.as_deref()
    }

    /// Split into owned parts.
    pub fn into_parts(self) -> (DiffKind, String, Option<Vec<u8>>) {
        (self.kind, self.name, self.bytes)
    }
}

/// Per-kind record counts of a diff.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffSummary {
    pub added: usize,
    pub removed: usize,
    pub modified: usize,
    /// Total base bytes retained by removed/modified records.
    pub retained_bytes: u64,
}

impl DiffSummary {
    pub fn of(diffs: &[ResourceDiff]) -> Self {
        let mut summary = Self::default();
        for diff in diffs {
            summary.record(diff);
        }
        summary
    }

    /// Count one more record.
    pub fn record(&mut self, diff: &ResourceDiff) {
        match diff.kind {
            DiffKind::Added => self.added += 1,
            DiffKind::Removed => self.removed += 1,
            DiffKind::Modified => self.modified += 1,
        }
        self.retained_bytes += diff.bytes().map_or(0, |b| b.len() as u64);
    }

    pub fn total(&self) -> usize {
        self.added + self.removed + self.modified
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_present_only_for_removed_and_modified() {
        assert_eq!(ResourceDiff::added("a").bytes(), None);
        assert_eq!(ResourceDiff::removed("a", b"x".to_vec()).bytes(), Some(&b"x"[..]));
        assert_eq!(ResourceDiff::modified("a", Vec::new()).bytes(), Some(&b""[..]));
    }

    #[test]
    fn kind_codes_are_stable() {
        for kind in [DiffKind::Added, DiffKind::Removed, DiffKind::Modified] {
            assert_eq!(DiffKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(DiffKind::from_code(3), None);
        assert_eq!(DiffKind::Modified.to_string(), "MODIFIED");
    }

    #[test]
    fn summary_counts_kinds() {
        let diffs = vec![
            ResourceDiff::added("a"),
            ResourceDiff::removed("b", b"123".to_vec()),
            ResourceDiff::modified("c", b"45".to_vec()),
            ResourceDiff::added("d"),
        ];
        let s = DiffSummary::of(&diffs);
        assert_eq!((s.added, s.removed, s.modified), (2, 1, 1));
        assert_eq!(s.retained_bytes, 5);
        assert_eq!(s.total(), 4);
    }
}
