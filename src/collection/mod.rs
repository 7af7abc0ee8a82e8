// Resource collections: the providers a diff is computed between.
//
// - `memory`: MemoryCollection, ordered in-memory entries
// - `dir`: DirCollection, files under a directory root

pub mod dir;
pub mod memory;

pub use dir::DirCollection;
pub use memory::MemoryCollection;

use std::io::{self, Read};

/// A scoped, closable set of named binary resources.
///
/// Every name returned by [`names`](Self::names) must be readable through
/// [`read_all`](Self::read_all) and [`open_stream`](Self::open_stream) until
/// the collection is closed. Lookups for unknown names fail with
/// `io::ErrorKind::NotFound`.
pub trait ResourceCollection {
    /// All resource names, in the collection's own order.
    fn names(&self) -> io::Result<Vec<String>>;

    /// Full byte content of `name`.
    fn read_all(&self, name: &str) -> io::Result<Vec<u8>>;

    /// A readable stream over the content of `name`.
    ///
    /// The stream is released when dropped.
    fn open_stream(&self, name: &str) -> io::Result<Box<dyn Read + '_>>;

    /// Release everything held by the collection.
    ///
    /// Calling it more than once must be harmless.
    fn close(&mut self) -> io::Result<()>;
}

impl<C: ResourceCollection + ?Sized> ResourceCollection for &mut C {
    fn names(&self) -> io::Result<Vec<String>> {
        (**self).names()
    }

    fn read_all(&self, name: &str) -> io::Result<Vec<u8>> {
        (**self).read_all(name)
    }

    fn open_stream(&self, name: &str) -> io::Result<Box<dyn Read + '_>> {
        (**self).open_stream(name)
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

impl<C: ResourceCollection + ?Sized> ResourceCollection for Box<C> {
    fn names(&self) -> io::Result<Vec<String>> {
        (**self).names()
    }

    fn read_all(&self, name: &str) -> io::Result<Vec<u8>> {
        (**self).read_all(name)
    }

    fn open_stream(&self, name: &str) -> io::Result<Box<dyn Read + '_>> {
        (**self).open_stream(name)
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

pub(crate) fn not_found(name: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("no such resource: {name}"),
    )
}

pub(crate) fn closed() -> io::Error {
    io::Error::other("collection is closed")
}
