//! Generic record storage for the masking relay.
//!
//! Records are schemaless field maps grouped into named tables, the way a
//! spreadsheet-style database exposes them. Consumers read fields through
//! alias lists so alternate column spellings degrade to a missing field
//! instead of an error.

mod error;
mod record;
mod store;

pub use error::RecordStoreError;
pub use record::{Fields, Record};
pub use store::{MemoryStore, Predicate, RecordStore};
