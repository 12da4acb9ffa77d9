//! Record persistence.
//!
//! The store is an explicitly constructed client: `RecordStore::connect`
//! opens the database and `RecordStore::disconnect` releases it. Every
//! operation touches at most one record and runs under the connection lock,
//! so concurrent writes to the same record resolve as last-writer-wins.

mod sqlite;

pub use sqlite::RecordStore;

use crate::record::KindFilter;

/// Query filter for record search. Both criteria are combined with AND.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFilter {
    /// Case-insensitive substring on the record name
    pub name: Option<String>,
    /// Exact match on the mapped kind
    pub kind: Option<KindFilter>,
}

impl SearchFilter {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.kind.is_none()
    }
}
