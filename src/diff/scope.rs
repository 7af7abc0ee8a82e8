// Guaranteed release of collections held for the length of one operation.

use std::io;

use crate::collection::ResourceCollection;

/// Owns a pair of collections and closes both when the scope ends.
///
/// [`close`](Self::close) releases both explicitly and reports the first
/// failure. If the pair is dropped without that (early return or error), both
/// are closed from `Drop` and failures are logged. Either way the second
/// collection is closed even when closing the first fails.
pub struct ClosingPair<A: ResourceCollection, B: ResourceCollection> {
    first: A,
    second: B,
    released: bool,
}

impl<A: ResourceCollection, B: ResourceCollection> ClosingPair<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self {
            first,
            second,
            released: false,
        }
    }

    pub fn first(&self) -> &A {
        &self.first
    }

    pub fn second(&self) -> &B {
        &self.second
    }

    /// Close both collections, returning the first close error.
    pub fn close(mut self) -> io::Result<()> {
        self.released = true;
        close_both(&mut self.first, &mut self.second)
    }
}

impl<A: ResourceCollection, B: ResourceCollection> Drop for ClosingPair<A, B> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = close_both(&mut self.first, &mut self.second) {
            log::warn!("failed to release collection: {e}");
        }
    }
}

/// Single-collection form of [`ClosingPair`].
pub struct Closing<C: ResourceCollection> {
    inner: C,
    released: bool,
}

impl<C: ResourceCollection> Closing<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            released: false,
        }
    }

    pub fn get(&self) -> &C {
        &self.inner
    }

    /// Close the collection, returning the close error if any.
    pub fn close(mut self) -> io::Result<()> {
        self.released = true;
        self.inner.close()
    }
}

impl<C: ResourceCollection> Drop for Closing<C> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.inner.close() {
            log::warn!("failed to release collection: {e}");
        }
    }
}

fn close_both<A: ResourceCollection, B: ResourceCollection>(
    first: &mut A,
    second: &mut B,
) -> io::Result<()> {
    let first_result = first.close();
    let second_result = second.close();
    first_result.and(second_result)
}
