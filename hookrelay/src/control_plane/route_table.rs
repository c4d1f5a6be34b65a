//! Route-table data model owned by the router loop.

use crate::delivery::Sink;
use std::collections::HashMap;

/// Exact-match mapping from request path to its sink.
///
/// Paths are compared byte-for-byte, leading slash included.
#[derive(Default)]
pub(crate) struct RouteTable {
    routes: HashMap<String, Sink>,
}

impl RouteTable {
    /// Creates an empty route table.
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Installs `path -> sink`, returning the sink it replaced, if any.
    pub(crate) fn insert(&mut self, path: String, sink: Sink) -> Option<Sink> {
        self.routes.insert(path, sink)
    }

    /// Removes the entry for `path`. Returns the removed sink only when it existed.
    pub(crate) fn remove(&mut self, path: &str) -> Option<Sink> {
        self.routes.remove(path)
    }

    pub(crate) fn get(&self, path: &str) -> Option<&Sink> {
        self.routes.get(path)
    }

    /// Removes `path` only if it still maps to the same channel as `sink`.
    pub(crate) fn remove_if_same(&mut self, path: &str, sink: &Sink) -> bool {
        match self.routes.get(path) {
            Some(current) if current.same_channel(sink) => {
                self.routes.remove(path);
                true
            }
            _ => false,
        }
    }

    /// Registered paths in lexical order.
    pub(crate) fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.routes.keys().cloned().collect();
        paths.sort();
        paths
    }

    pub(crate) fn len(&self) -> usize {
        self.routes.len()
    }
}
