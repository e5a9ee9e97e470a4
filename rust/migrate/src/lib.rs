//! One-shot copy of the relational store into the document store.
//!
//! Records are read in `(created_at, id)` order one page at a time. Each page
//! is written to the destination as a batch of overwrites, and only once the
//! batch committed is the position of its last record saved as the cursor for
//! that entity. A rerun picks up from the saved cursor, so an interrupted run
//! is resumed by running it again.

mod config;
mod cursor;
mod migrator;

pub use config::*;
pub use cursor::*;
pub use migrator::*;
