//! MNDX root files and MAR name databases for CASC storages
//!
#![allow(clippy::cast_possible_truncation)] // Intentional for binary format parsing
#![allow(clippy::cast_lossless)] // Sometimes clearer than From
#![allow(clippy::uninlined_format_args)] // Backwards compatibility
#![allow(clippy::doc_markdown)] // Many CASC-specific terms don't need backticks
#![allow(clippy::module_name_repetitions)] // Clear naming is preferred
#![allow(clippy::similar_names)] // Domain-specific naming patterns
//! This crate reads the name index used by CASC storages of StarCraft II engine
//! games. File names live in MAR databases: compact LOUDS tries with
//! succinct rank/select bit vectors, shared label fragments and a transition
//! cache. An MNDX root file bundles three such databases with the table of
//! content keys they index.
//!
//! # Modules
//!
//! - [`mar`]: MAR database parsing, exact lookup and prefix enumeration
//! - [`root`]: MNDX root parsing, package detection and path resolution
//!
//! All parsing is bounds-checked. Malformed input produces an error, never a
//! panic or an endless loop.

#![warn(missing_docs)]

pub mod mar;
pub mod root;

#[cfg(any(test, feature = "test-utils"))]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
pub mod test_utils;
