//! MNDX root file parsing and name resolution

use crate::mar::FileNameDatabase;
use crate::mar::Names;
use crate::root::entry::{ContentKey, MndxRootEntry};
use crate::root::error::{MndxError, Result};
use crate::root::header::{MAR_FILE_COUNT, MarInfo, MndxHeader};
use crate::root::package::{MndxPackage, PackageList};
use binrw::BinRead;
use std::io::Cursor;
use tracing::debug;

/// Parsed MNDX root file
#[derive(Debug, Clone)]
pub struct MndxRootFile {
    /// File header
    pub header: MndxHeader,
    /// Location records of the three name databases
    pub mar_infos: Vec<MarInfo>,
    package_names: FileNameDatabase,
    stripped_names: FileNameDatabase,
    full_names: FileNameDatabase,
    entries: Vec<MndxRootEntry>,
    group_starts: Vec<usize>,
    packages: PackageList,
}

/// A named file resolved to its root entry
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct MndxFile {
    /// Full path including the package prefix
    pub name: String,
    /// Package the file belongs to
    pub package_index: u32,
    /// Content key of the file
    pub content_key: ContentKey,
    /// Decoded file size in bytes
    pub content_size: u32,
}

impl MndxFile {
    /// Check the name against a wildcard mask (`*` any run, `?` any byte),
    /// ignoring ASCII case
    pub fn matches_pattern(&self, pattern: &str) -> bool {
        wildcard_match(self.name.as_bytes(), pattern.as_bytes())
    }
}

impl MndxRootFile {
    /// Parse a decoded MNDX root file
    pub fn parse(data: &[u8]) -> Result<Self> {
        let header = MndxHeader::read(&mut Cursor::new(data))?;
        header.validate()?;

        let mut databases: [Option<FileNameDatabase>; MAR_FILE_COUNT] = Default::default();
        let mut mar_infos = Vec::with_capacity(header.mar_info_count as usize);
        for (slot, database) in databases
            .iter_mut()
            .enumerate()
            .take(header.mar_info_count as usize)
        {
            let offset = u64::from(header.mar_info_offset)
                + u64::from(header.mar_info_size) * slot as u64;
            let record = section(data, "MAR info", offset, u64::from(header.mar_info_size))?;
            let info = MarInfo::read(&mut Cursor::new(record))?;

            let blob = section(data, "MAR database", info.data_offset(), info.data_size())?;
            *database = Some(FileNameDatabase::parse(blob)?);
            mar_infos.push(info);
        }

        let [package_names, stripped_names, full_names] = databases;
        let package_names = package_names.ok_or(MndxError::MissingMarFile(0))?;
        let stripped_names = stripped_names.ok_or(MndxError::MissingMarFile(1))?;
        let full_names = full_names.ok_or(MndxError::MissingMarFile(2))?;

        if stripped_names.num_names() != header.entries_valid {
            return Err(MndxError::NameCountMismatch {
                names: stripped_names.num_names(),
                valid: header.entries_valid,
            });
        }

        let entries = read_entries(data, &header)?;
        let group_starts = group_starts(&entries, header.entries_valid)?;
        let packages = PackageList::load(&package_names)?;

        debug!(
            "Loaded MNDX root: {} packages, {} names, {} entries",
            packages.len(),
            header.entries_valid,
            entries.len()
        );

        Ok(Self {
            header,
            mar_infos,
            package_names,
            stripped_names,
            full_names,
            entries,
            group_starts,
            packages,
        })
    }

    /// All root entries in file order
    pub fn entries(&self) -> &[MndxRootEntry] {
        &self.entries
    }

    /// Packages known to the root
    pub const fn packages(&self) -> &PackageList {
        &self.packages
    }

    /// Package name database
    pub const fn package_names(&self) -> &FileNameDatabase {
        &self.package_names
    }

    /// Database of names with their package prefix removed
    pub const fn stripped_names(&self) -> &FileNameDatabase {
        &self.stripped_names
    }

    /// Database of full names
    pub const fn full_names(&self) -> &FileNameDatabase {
        &self.full_names
    }

    /// Package whose name is the longest strict prefix of `path`
    pub fn find_package(&self, path: &str) -> Option<&MndxPackage> {
        self.packages.find(&normalize_path(path))
    }

    /// Resolve a path to its root entry
    ///
    /// The path is lowercased and backslashes become slashes before the
    /// package prefix is stripped.
    pub fn resolve(&self, path: &str) -> Result<Option<&MndxRootEntry>> {
        let normalized = normalize_path(path);
        let Some(package) = self.packages.find(&normalized) else {
            return Ok(None);
        };
        let stripped = normalized[package.name.len()..].trim_start_matches('/');
        self.resolve_in_package(stripped, package.index)
    }

    /// Resolve a package-relative name within one package
    pub fn resolve_in_package(
        &self,
        stripped: &str,
        package_index: u32,
    ) -> Result<Option<&MndxRootEntry>> {
        let Some(name_index) = self.stripped_names.lookup(stripped)? else {
            return Ok(None);
        };
        let Some(&start) = self.group_starts.get(name_index as usize) else {
            return Ok(None);
        };
        if name_index >= self.header.entries_valid {
            return Ok(None);
        }

        for entry in &self.entries[start.min(self.entries.len())..] {
            if entry.package_index() == package_index {
                return Ok(Some(entry));
            }
            if entry.is_last() {
                break;
            }
        }
        Ok(None)
    }

    /// Content key of a path
    pub fn content_key(&self, path: &str) -> Result<Option<ContentKey>> {
        Ok(self.resolve(path)?.map(|entry| entry.content_key))
    }

    /// Iterate over every named file
    pub fn files(&self) -> Files<'_> {
        self.files_with_prefix("")
    }

    /// Iterate over the files whose full name starts with `prefix`
    pub fn files_with_prefix(&self, prefix: &str) -> Files<'_> {
        Files {
            root: self,
            names: self.full_names.names_with_prefix(normalize_path(prefix)),
        }
    }

    /// Files whose full name matches a wildcard mask
    ///
    /// The literal head of the mask narrows the enumeration before matching.
    pub fn find_files(&self, pattern: &str) -> Result<Vec<MndxFile>> {
        let pattern = normalize_path(pattern);
        let literal = pattern
            .find(['*', '?'])
            .map_or(pattern.as_str(), |end| &pattern[..end]);

        self.files_with_prefix(literal)
            .filter(|file| file.as_ref().map_or(true, |f| f.matches_pattern(&pattern)))
            .collect()
    }
}

/// Iterator over the files of an MNDX root
///
/// Names without a package or a root entry are skipped.
#[derive(Debug)]
pub struct Files<'a> {
    root: &'a MndxRootFile,
    names: Names<'a>,
}

impl Iterator for Files<'_> {
    type Item = Result<MndxFile>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let found = match self.names.next()? {
                Ok(found) => found,
                Err(e) => return Some(Err(e.into())),
            };
            let name = found.name().into_owned();
            match self.root.resolve(&name) {
                Ok(Some(entry)) => {
                    return Some(Ok(MndxFile {
                        name,
                        package_index: entry.package_index(),
                        content_key: entry.content_key,
                        content_size: entry.content_size,
                    }));
                }
                Ok(None) => debug!("Skipping {} without root entry", name),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Lowercase ASCII letters and turn backslashes into slashes
pub fn normalize_path(path: &str) -> String {
    path.chars()
        .map(|c| match c {
            '\\' => '/',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

fn section<'a>(data: &'a [u8], section: &'static str, offset: u64, size: u64) -> Result<&'a [u8]> {
    let out_of_range = || MndxError::DataOutOfRange {
        section,
        offset,
        size,
        available: data.len(),
    };
    let end = offset.checked_add(size).ok_or_else(out_of_range)?;
    if end > data.len() as u64 {
        return Err(out_of_range());
    }
    Ok(&data[offset as usize..end as usize])
}

fn read_entries(data: &[u8], header: &MndxHeader) -> Result<Vec<MndxRootEntry>> {
    let size = u64::from(header.entries_total) * u64::from(header.entry_size);
    let bytes = section(data, "root entries", u64::from(header.entries_offset), size)?;

    let mut cursor = Cursor::new(bytes);
    (0..header.entries_total)
        .map(|_| MndxRootEntry::read(&mut cursor).map_err(MndxError::from))
        .collect()
}

/// First entry of every name group, followed by one past the last group
fn group_starts(entries: &[MndxRootEntry], valid: u32) -> Result<Vec<usize>> {
    let mut starts = vec![0usize];
    for (i, entry) in entries.iter().enumerate() {
        if starts.len() > valid as usize {
            break;
        }
        if entry.is_last() {
            starts.push(i + 1);
        }
    }

    if starts.len() != valid as usize + 1 {
        return Err(MndxError::EntryGroupMismatch {
            groups: starts.len() - 1,
            expected: valid,
        });
    }
    Ok(starts)
}

/// Case-insensitive match with `*` and `?`
fn wildcard_match(name: &[u8], pattern: &[u8]) -> bool {
    let (mut n, mut p) = (0usize, 0usize);
    let mut backtrack: Option<(usize, usize)> = None;

    while n < name.len() {
        match pattern.get(p) {
            Some(b'*') => {
                backtrack = Some((p, n));
                p += 1;
            }
            Some(&c) if c == b'?' || c.eq_ignore_ascii_case(&name[n]) => {
                n += 1;
                p += 1;
            }
            _ => match backtrack {
                Some((star, matched)) => {
                    p = star + 1;
                    n = matched + 1;
                    backtrack = Some((star, matched + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p.min(pattern.len())..].iter().all(|&c| c == b'*')
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_utils::{EncodeOptions, RootFixtureFile, encode_mndx_root};
    use pretty_assertions::assert_eq;

    const CORE: &str = "mods/core.stormmod";
    const HEROES: &str = "mods/heroes.stormmod";
    const MAPS: &str = "mods/heroes.stormmod/base.stormmaps";

    fn fixture_files() -> Vec<RootFixtureFile> {
        vec![
            RootFixtureFile::new("mods/core.stormmod/base.stormdata/gamedata.xml", 1, 100),
            RootFixtureFile::new("mods/heroes.stormmod/base.stormdata/gamedata.xml", 2, 200),
            RootFixtureFile::new("mods/core.stormmod/base.stormassets/ui.dds", 3, 300),
            RootFixtureFile::new(
                "mods/heroes.stormmod/base.stormmaps/maps/alterac.stormmap",
                4,
                400,
            ),
            RootFixtureFile::new(
                "mods/heroes.stormmod/enus.stormdata/localizeddata/gamestrings.txt",
                5,
                500,
            ),
        ]
    }

    fn fixture_bytes() -> Vec<u8> {
        encode_mndx_root(&[CORE, HEROES, MAPS], &fixture_files(), &EncodeOptions::default())
    }

    fn fixture() -> MndxRootFile {
        MndxRootFile::parse(&fixture_bytes()).expect("fixture parses")
    }

    fn package_index(root: &MndxRootFile, name: &str) -> u32 {
        root.packages()
            .iter()
            .find(|package| package.name == name)
            .map(|package| package.index)
            .expect("package exists")
    }

    fn entry(package: u32, last: bool) -> MndxRootEntry {
        MndxRootEntry::new(package, last, ContentKey::default(), 0)
    }

    #[test]
    fn test_parse_fixture() {
        let root = fixture();
        assert_eq!(root.mar_infos.len(), MAR_FILE_COUNT);
        assert_eq!(root.packages().len(), 3);
        assert_eq!(root.header.entries_valid, 4);
        assert_eq!(root.entries().len(), 5);
        assert_eq!(root.stripped_names().num_names(), 4);
        assert_eq!(root.full_names().num_names(), 5);
        assert_eq!(root.package_names().num_names(), 3);
    }

    #[test]
    fn test_resolve_every_file() {
        let root = fixture();
        for file in fixture_files() {
            let entry = root.resolve(file.path).unwrap().expect(file.path);
            assert_eq!(entry.content_key, file.content_key);
            assert_eq!(entry.content_size, file.content_size);
            assert_eq!(root.content_key(file.path).unwrap(), Some(file.content_key));
        }
    }

    #[test]
    fn test_resolve_normalizes_path() {
        let root = fixture();
        let entry = root
            .resolve("Mods\\Heroes.StormMod\\Base.StormData\\GameData.xml")
            .unwrap()
            .unwrap();
        assert_eq!(entry.content_size, 200);
        assert_eq!(entry.package_index(), package_index(&root, HEROES));
    }

    #[test]
    fn test_shared_name_resolves_per_package() {
        let root = fixture();
        let stripped = "base.stormdata/gamedata.xml";

        let core = root
            .resolve_in_package(stripped, package_index(&root, CORE))
            .unwrap()
            .unwrap();
        let heroes = root
            .resolve_in_package(stripped, package_index(&root, HEROES))
            .unwrap()
            .unwrap();
        assert_eq!(core.content_size, 100);
        assert_eq!(heroes.content_size, 200);
        assert!(!core.is_last());
        assert!(heroes.is_last());

        // Known name, but not shipped by this package
        assert_eq!(
            root.resolve("mods/heroes.stormmod/base.stormassets/ui.dds")
                .unwrap(),
            None
        );
    }

    #[test]
    fn test_unresolvable_paths() {
        let root = fixture();
        assert_eq!(root.resolve(CORE).unwrap(), None);
        assert_eq!(root.resolve("mods/other.stormmod/a.xml").unwrap(), None);
        assert_eq!(root.resolve("mods/core.stormmod/missing.xml").unwrap(), None);
        assert_eq!(root.resolve("").unwrap(), None);
    }

    #[test]
    fn test_nested_package_wins() {
        let root = fixture();
        let path = "mods/heroes.stormmod/base.stormmaps/maps/alterac.stormmap";

        assert_eq!(root.find_package(path).unwrap().name, MAPS);
        let entry = root.resolve(path).unwrap().unwrap();
        assert_eq!(entry.package_index(), package_index(&root, MAPS));
    }

    #[test]
    fn test_list_files() {
        let root = fixture();
        let files = root.files().collect::<Result<Vec<_>>>().unwrap();

        let mut expected = fixture_files();
        expected.sort_by_key(|file| file.path);
        assert_eq!(files.len(), expected.len());
        for (file, expected) in files.iter().zip(&expected) {
            assert_eq!(file.name, expected.path);
            assert_eq!(file.content_key, expected.content_key);
            assert_eq!(file.content_size, expected.content_size);
        }

        let core: Vec<String> = root
            .files_with_prefix("MODS/Core.StormMod/")
            .map(|file| file.unwrap().name)
            .collect();
        assert_eq!(
            core,
            vec![
                "mods/core.stormmod/base.stormassets/ui.dds",
                "mods/core.stormmod/base.stormdata/gamedata.xml",
            ]
        );
    }

    #[test]
    fn test_find_files_by_mask() {
        let root = fixture();
        assert_eq!(root.find_files("*.xml").unwrap().len(), 2);
        assert_eq!(root.find_files("*GAMEDATA*").unwrap().len(), 2);
        assert_eq!(root.find_files("mods/*/maps/*").unwrap().len(), 1);
        assert_eq!(root.find_files("*").unwrap().len(), 5);
        assert!(root.find_files("*.mp3").unwrap().is_empty());
        assert_eq!(root.find_files("MODS\\HEROES.STORMMOD\\*").unwrap().len(), 3);
        assert!(root.find_files("mods/nothing*").unwrap().is_empty());
    }

    #[test]
    fn test_header_inconsistencies_rejected() {
        let data = fixture_bytes();

        let mut bad = data.clone();
        bad[0] = b'X';
        assert!(matches!(
            MndxRootFile::parse(&bad),
            Err(MndxError::InvalidMagic(_))
        ));

        let mut bad = data.clone();
        bad[32..36].copy_from_slice(&3u32.to_le_bytes());
        assert!(matches!(
            MndxRootFile::parse(&bad),
            Err(MndxError::NameCountMismatch { names: 4, valid: 3 })
        ));

        let mut bad = data.clone();
        bad[16..20].copy_from_slice(&2u32.to_le_bytes());
        assert!(matches!(
            MndxRootFile::parse(&bad),
            Err(MndxError::MissingMarFile(2))
        ));

        // Clear the last-entry flag of the final group
        let mut bad = data.clone();
        let flags = bad.len() - MndxRootEntry::SIZE + 3;
        bad[flags] &= 0x7F;
        assert!(matches!(
            MndxRootFile::parse(&bad),
            Err(MndxError::EntryGroupMismatch {
                groups: 3,
                expected: 4
            })
        ));

        let short = &data[..data.len() - 10];
        assert!(matches!(
            MndxRootFile::parse(short),
            Err(MndxError::DataOutOfRange {
                section: "root entries",
                ..
            })
        ));
    }

    #[test]
    fn test_truncation_never_panics() {
        let data = fixture_bytes();
        for length in 0..data.len() {
            assert!(MndxRootFile::parse(&data[..length]).is_err());
        }
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path("Mods\\Core.StormMod\\Base.StormData"),
            "mods/core.stormmod/base.stormdata"
        );
    }

    #[test]
    fn test_group_starts() {
        let entries = [
            entry(0, true),
            entry(0, false),
            entry(1, true),
            entry(2, true),
        ];
        assert_eq!(group_starts(&entries, 3).unwrap(), vec![0, 1, 3, 4]);
        assert!(matches!(
            group_starts(&entries, 4),
            Err(MndxError::EntryGroupMismatch {
                groups: 3,
                expected: 4
            })
        ));
    }

    #[test]
    fn test_group_scan_stops_after_valid_groups() {
        let entries = [entry(0, true), entry(0, true), entry(0, true)];
        assert_eq!(group_starts(&entries, 2).unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_wildcards() {
        assert!(wildcard_match(b"mods/core.stormmod/a.dds", b"*.DDS"));
        assert!(wildcard_match(b"mods/core.stormmod/a.dds", b"mods/*/?.dds"));
        assert!(wildcard_match(b"abc", b"a*b*c"));
        assert!(wildcard_match(b"abc", b"***"));
        assert!(wildcard_match(b"", b"*"));
        assert!(!wildcard_match(b"abc", b"a?"));
        assert!(!wildcard_match(b"abc", b"*d"));
        assert!(!wildcard_match(b"", b"?"));
    }

    #[test]
    fn test_section_bounds() {
        let data = [0u8; 16];
        assert_eq!(section(&data, "test", 8, 8).unwrap().len(), 8);
        assert!(matches!(
            section(&data, "test", 8, 9),
            Err(MndxError::DataOutOfRange { .. })
        ));
        assert!(section(&data, "test", u64::MAX, 2).is_err());
    }
}
