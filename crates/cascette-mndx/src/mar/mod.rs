//! MAR name databases
//!
//! A MAR database maps path names to dense integer indices. It is a
//! serialized LOUDS trie with succinct rank/select bit vectors, a transition
//! cache and shared label fragments that may be deferred into chained tiers.
//!
//! # Layout
//!
//! Every tier is stored as, in order: the LOUDS, terminal and link-flag
//! sparse arrays, the low-byte label table, the bit-packed link high bits,
//! the fragment store, the next tier (only when this tier has links but an
//! empty fragment store), the transition cache, the first-level node count
//! and the configuration mask. Only the outermost tier carries the `MAR\0`
//! signature.
//!
//! # Example
//!
//! ```rust,no_run
//! use cascette_mndx::mar::{FileNameDatabase, SearchCursor};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let data = std::fs::read("names.mar")?;
//! let database = FileNameDatabase::parse(&data)?;
//!
//! if let Some(index) = database.lookup("mods/core.stormmod/base.stormdata")? {
//!     println!("found at {index}");
//! }
//!
//! let mut cursor = SearchCursor::new("mods/");
//! while let Some(found) = database.enumerate_next(&mut cursor)? {
//!     println!("{} -> {}", found.name(), found.index);
//! }
//! # Ok(())
//! # }
//! ```

pub mod bit_vector;
pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod flat_vector;
pub mod search;
pub mod stream;
pub mod tail;

#[cfg(test)]
mod database_tests;

pub use bit_vector::{RankCheckpoint, SparseArray};
pub use cache::{FragmentTable, FragmentTableEntry};
pub use config::{CacheLevel, NodeOrder, TailMode, TrieConfig};
pub use database::{FileNameDatabase, MAR_SIGNATURE, Names};
pub use error::{MarError, Result};
pub use flat_vector::BitPackedArray;
pub use search::{FoundName, PathStop, SearchCursor, SearchPhase};
pub use stream::ByteStream;
pub use tail::FragmentStore;
