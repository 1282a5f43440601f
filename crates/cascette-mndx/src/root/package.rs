//! MNDX packages
//!
//! Every full path in an MNDX root starts with the name of the package
//! (mod directory) it belongs to, for example `mods/core.stormmod`.

use crate::mar::{FileNameDatabase, Result};

/// A package name and its index in the package database
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct MndxPackage {
    /// Package path prefix
    pub name: String,
    /// Package index referenced by root entries
    pub index: u32,
}

/// All packages of an MNDX root
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageList {
    packages: Vec<MndxPackage>,
}

impl PackageList {
    /// Create a list from already known packages
    pub fn new(packages: Vec<MndxPackage>) -> Self {
        Self { packages }
    }

    /// Enumerate every name of the package database
    pub fn load(database: &FileNameDatabase) -> Result<Self> {
        let packages = database
            .names()
            .map(|found| {
                found.map(|found| MndxPackage {
                    name: found.name().into_owned(),
                    index: found.index,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { packages })
    }

    /// Number of packages
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Whether there are no packages
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Iterate over the packages in database order
    pub fn iter(&self) -> std::slice::Iter<'_, MndxPackage> {
        self.packages.iter()
    }

    /// Longest package name that is a strict prefix of `path`
    pub fn find(&self, path: &str) -> Option<&MndxPackage> {
        self.packages
            .iter()
            .filter(|package| package.name.len() < path.len() && path.starts_with(&package.name))
            .max_by_key(|package| package.name.len())
    }
}

impl<'a> IntoIterator for &'a PackageList {
    type Item = &'a MndxPackage;
    type IntoIter = std::slice::Iter<'a, MndxPackage>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
