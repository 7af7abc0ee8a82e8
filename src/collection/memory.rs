// In-memory resource collection.

use std::collections::HashMap;
use std::io::{self, Read};

use super::{ResourceCollection, closed, not_found};

/// Ordered in-memory collection of named resources.
///
/// Name order is insertion order. Pushing a name that already exists replaces
/// its content and appends the name to the listing again, so a listing with
/// duplicates can be modelled.
#[derive(Debug, Clone, Default)]
pub struct MemoryCollection {
    order: Vec<String>,
    content: HashMap<String, Vec<u8>>,
    closed: bool,
}

impl MemoryCollection {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a resource.
    pub fn push(&mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        let name = name.into();
        self.order.push(name.clone());
        self.content.insert(name, bytes.into());
    }

    /// Builder-style [`push`](Self::push).
    pub fn with(mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.push(name, bytes);
        self
    }

    /// Content of `name`, if present.
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.content.get(name).map(Vec::as_slice)
    }

    /// Number of entries in the name listing (duplicates included).
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Whether [`close`](ResourceCollection::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Iterate over `(name, bytes)` in listing order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.order
            .iter()
            .filter_map(|name| self.get(name).map(|bytes| (name.as_str(), bytes)))
    }

    fn lookup(&self, name: &str) -> io::Result<&[u8]> {
        if self.closed {
            return Err(closed());
        }
        self.get(name).ok_or_else(|| not_found(name))
    }
}

impl<N: Into<String>, B: Into<Vec<u8>>> FromIterator<(N, B)> for MemoryCollection {
    fn from_iter<I: IntoIterator<Item = (N, B)>>(iter: I) -> Self {
        let mut collection = Self::new();
        for (name, bytes) in iter {
            collection.push(name, bytes);
        }
        collection
    }
}

impl ResourceCollection for MemoryCollection {
    fn names(&self) -> io::Result<Vec<String>> {
        if self.closed {
            return Err(closed());
        }
        Ok(self.order.clone())
    }

    fn read_all(&self, name: &str) -> io::Result<Vec<u8>> {
        self.lookup(name).map(<[u8]>::to_vec)
    }

    fn open_stream(&self, name: &str) -> io::Result<Box<dyn Read + '_>> {
        let bytes = self.lookup(name)?;
        Ok(Box::new(bytes))
    }

    fn close(&mut self) -> io::Result<()> {
        self.closed = true;
        Ok(())
    }
}
