//! Transform adapters from upstream API shapes into pipeline entity models.

pub(crate) mod adverse_event;
pub(crate) mod ingredients;
pub(crate) mod registry;
