//! Internal utility helpers for query escaping, serde shapes, and the last-summary store.

pub(crate) mod query;
pub(crate) mod serde;
pub(crate) mod store;
