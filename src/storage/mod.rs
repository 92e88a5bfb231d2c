//!  Storage is organized around [record_store::RecordStore].
//!  The basic idea is:
//!   - All projects and entries live in one JSON document, `store.json`.
//!   - Every mutation is a read-modify-write of that document under an exclusive lock.
//!   - Preferences are kept apart and are strictly best-effort.

pub mod entities;
pub mod json_store;
pub mod preferences;
pub mod record_store;
