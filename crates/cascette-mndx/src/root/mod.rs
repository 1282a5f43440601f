//! MNDX root file support
//!
//! Games built on the StarCraft II engine (Heroes of the Storm, StarCraft II)
//! ship an `MNDX` root instead of the WoW root format. It names every file
//! through three MAR databases and maps each name to content keys:
//!
//! - **Database 0**: package names such as `mods/core.stormmod`
//! - **Database 1**: file names with their package prefix removed; the index
//!   of a name selects a group of root entries
//! - **Database 2**: full file names, used for listing
//!
//! Each entry group holds one entry per package that contains the name. The
//! last entry of a group carries a flag bit.
//!
//! # Example
//!
//! ```rust,no_run
//! use cascette_mndx::root::MndxRootFile;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let data = std::fs::read("root.mndx")?;
//! let root = MndxRootFile::parse(&data)?;
//!
//! for package in root.packages() {
//!     println!("{:>4} {}", package.index, package.name);
//! }
//!
//! if let Some(entry) = root.resolve("mods/core.stormmod/base.stormdata/gamedata.xml")? {
//!     println!("{} ({} bytes)", entry.content_key, entry.content_size);
//! }
//! # Ok(())
//! # }
//! ```

pub mod entry;
pub mod error;
pub mod file;
pub mod header;
pub mod package;

pub use entry::{ContentKey, MndxRootEntry};
pub use error::{MndxError, Result};
pub use file::{Files, MndxFile, MndxRootFile, normalize_path};
pub use header::{MAR_FILE_COUNT, MarInfo, MndxHeader};
pub use package::{MndxPackage, PackageList};
