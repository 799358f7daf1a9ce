pub mod document_store;
pub mod featured_events;
pub mod featured_limit;
pub mod memory_store;
pub mod sanity;
pub mod sqlite_store;
