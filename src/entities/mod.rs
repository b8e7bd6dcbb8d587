//! Lookup workflows and the report pipeline built on top of them.

pub(crate) mod adverse_event;
pub(crate) mod registry;
pub(crate) mod report;
