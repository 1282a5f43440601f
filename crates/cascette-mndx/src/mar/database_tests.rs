//! Tests for MAR database lookup and enumeration
#![allow(clippy::expect_used, clippy::unwrap_used)]

use super::*;
use crate::test_utils::{EncodeOptions, Encoded, encode_mar};
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;

const PATHS: &[&str] = &[
    "mods/core.stormmod/base.stormdata/gamedata.xml",
    "mods/core.stormmod/base.stormdata/gamedata/abildata.xml",
    "mods/core.stormmod/base.stormdata/gamedata/unitdata.xml",
    "mods/core.stormmod/base.stormassets/assets/textures/ui_icon.dds",
    "mods/heroes.stormmod/base.stormdata/gamedata.xml",
    "mods/heroes.stormmod/enus.stormdata/localizeddata/gamestrings.txt",
    "mods/heroes.stormmod/dede.stormdata/localizeddata/gamestrings.txt",
    "mods/heromods/azmodan.stormmod/base.stormdata/gamedata",
    "mods/heromods/azmodan.stormmod/base.stormdata/gamedata.xml",
    "versions.osxarchive",
    "versions.osxarchive/contents/info.plist",
    "a",
    "ab",
    "abc",
];

fn small_corpus() -> Vec<Vec<u8>> {
    PATHS.iter().map(|p| p.as_bytes().to_vec()).collect()
}

/// Enough names to span several rank blocks and select intervals
fn large_corpus() -> Vec<Vec<u8>> {
    let mut keys = small_corpus();
    for i in 0..1000 {
        keys.push(format!("mods/generated.stormmod/base.stormdata/file{i:04}.xml").into_bytes());
        if i % 7 == 0 {
            keys.push(format!("maps/map{i}.stormmap/minimap.tga").into_bytes());
        }
    }
    keys
}

fn variants() -> Vec<(&'static str, EncodeOptions)> {
    vec![
        (
            "text tail",
            EncodeOptions {
                max_tiers: 1,
                ..EncodeOptions::default()
            },
        ),
        (
            "binary tail",
            EncodeOptions {
                max_tiers: 1,
                tail_mode: TailMode::Binary,
                ..EncodeOptions::default()
            },
        ),
        ("two tiers", EncodeOptions::default()),
        (
            "three tiers",
            EncodeOptions {
                max_tiers: 3,
                tail_mode: TailMode::Binary,
                ..EncodeOptions::default()
            },
        ),
        (
            "tiny cache",
            EncodeOptions {
                cache_slots: 4,
                max_tiers: 3,
                ..EncodeOptions::default()
            },
        ),
        (
            "no usable cache",
            EncodeOptions {
                cache_slots: 1,
                ..EncodeOptions::default()
            },
        ),
        (
            "single byte links",
            EncodeOptions {
                link_single_chars: true,
                max_tiers: 3,
                ..EncodeOptions::default()
            },
        ),
    ]
}

fn build(keys: &[Vec<u8>], options: &EncodeOptions) -> (FileNameDatabase, Encoded) {
    let encoded = encode_mar(keys, options);
    let database = FileNameDatabase::parse(&encoded.data).expect("encoded database parses");
    (database, encoded)
}

fn collect_names(database: &FileNameDatabase, prefix: &[u8]) -> Vec<FoundName> {
    database
        .names_with_prefix(prefix)
        .collect::<Result<Vec<_>>>()
        .expect("enumeration succeeds")
}

#[test]
fn test_lookup_finds_every_name() {
    let keys = large_corpus();
    for (variant, options) in variants() {
        let (database, encoded) = build(&keys, &options);
        assert_eq!(database.num_names() as usize, encoded.indices.len(), "{variant}");

        for (key, &index) in &encoded.indices {
            assert_eq!(
                database.lookup(key).unwrap(),
                Some(index),
                "{variant}: {}",
                String::from_utf8_lossy(key)
            );
        }
    }
}

#[test]
fn test_lookup_rejects_absent_names() {
    let absent = [
        "",
        "b",
        "mods",
        "mods/",
        "mods/core.storm",
        "mods/core.stormmod/base.stormdata/gamedata.xm",
        "mods/core.stormmod/base.stormdata/gamedata.xmlx",
        "mods/core.stormmod/base.stormdata/gamedata/",
        "mods/generated.stormmod/base.stormdata/file1000.xml",
        "versions.osxarchive/contents",
        "zzz",
    ];
    let keys = large_corpus();
    for (variant, options) in variants() {
        let (database, _) = build(&keys, &options);
        for path in absent {
            assert_eq!(database.lookup(path).unwrap(), None, "{variant}: {path}");
        }
    }
}

#[test]
fn test_enumeration_yields_each_name_once_in_order() {
    let keys = large_corpus();
    let sorted: Vec<Vec<u8>> = keys.iter().cloned().collect::<BTreeSet<_>>().into_iter().collect();

    for (variant, options) in variants() {
        let (database, encoded) = build(&keys, &options);
        let names = collect_names(&database, b"");

        let paths: Vec<Vec<u8>> = names.iter().map(|found| found.path.clone()).collect();
        assert_eq!(paths, sorted, "{variant}");
        for found in &names {
            assert_eq!(found.index, encoded.indices[&found.path], "{variant}");
        }
    }
}

#[test]
fn test_prefix_enumeration() {
    let prefixes = [
        "",
        "mods/core.stormmod/",
        "mods/core.storm",
        "mods/heromods/azmodan.stormmod/base.stormdata/gamedata",
        "mods/generated.stormmod/base.stormdata/file09",
        "ab",
        "versions",
        "nothing/",
        "mods/core.stormmod/base.stormdata/gamedata.xml/more",
    ];
    let keys = large_corpus();

    for (variant, options) in variants() {
        let (database, encoded) = build(&keys, &options);
        for prefix in prefixes {
            let expected: Vec<&Vec<u8>> = encoded
                .indices
                .keys()
                .filter(|key| key.starts_with(prefix.as_bytes()))
                .collect();
            let names = collect_names(&database, prefix.as_bytes());
            let paths: Vec<&Vec<u8>> = names.iter().map(|found| &found.path).collect();

            assert_eq!(paths, expected, "{variant}: {prefix}");
            for found in &names {
                assert_eq!(found.index, encoded.indices[&found.path]);
            }
        }
    }
}

#[test]
fn test_match_step_reaches_terminal() {
    let keys = small_corpus();
    let (database, encoded) = build(&keys, &EncodeOptions::default());

    for (key, &index) in &encoded.indices {
        let mut cursor = SearchCursor::new(key);
        let mut steps = 0;
        while database.match_step(&mut cursor).unwrap() {
            steps += 1;
            // Only edges ending on a stored name are terminal
            let consumed = &key[..cursor.query_position()];
            assert_eq!(
                database.terminal_index(&cursor).unwrap(),
                encoded.indices.get(consumed).copied(),
                "{}",
                String::from_utf8_lossy(consumed)
            );
        }
        assert!(cursor.is_query_exhausted());
        assert!(steps <= key.len());
        assert_eq!(database.terminal_index(&cursor).unwrap(), Some(index));
    }

    // Walking to an inner node does not yield a name
    let mut cursor = SearchCursor::new("mods/");
    while database.match_step(&mut cursor).unwrap() {}
    assert!(cursor.is_query_exhausted());
    assert_eq!(database.terminal_index(&cursor).unwrap(), None);

    let mut cursor = SearchCursor::new("mods/x");
    while database.match_step(&mut cursor).unwrap() {}
    assert!(!cursor.is_query_exhausted());
}

#[test]
fn test_single_byte_labels_through_chained_tier() {
    let keys: Vec<Vec<u8>> = ["a", "ab", "abc"].iter().map(|k| k.as_bytes().to_vec()).collect();

    for max_tiers in [1, 2, 3] {
        let options = EncodeOptions {
            link_single_chars: true,
            max_tiers,
            ..EncodeOptions::default()
        };
        let (database, _) = build(&keys, &options);

        assert_eq!(database.tiers(), max_tiers.min(2) as usize);
        assert_eq!(database.lookup("a").unwrap(), Some(0));
        assert_eq!(database.lookup("ab").unwrap(), Some(1));
        assert_eq!(database.lookup("abc").unwrap(), Some(2));
        assert_eq!(database.lookup("abcd").unwrap(), None);
        assert_eq!(database.lookup("b").unwrap(), None);

        let names: Vec<(String, u32)> = collect_names(&database, b"")
            .iter()
            .map(|found| (found.name().into_owned(), found.index))
            .collect();
        assert_eq!(
            names,
            vec![("a".to_string(), 0), ("ab".to_string(), 1), ("abc".to_string(), 2)]
        );
    }
}

#[test]
fn test_tier_chain_depth() {
    let keys = small_corpus();
    let options = EncodeOptions {
        max_tiers: 3,
        ..EncodeOptions::default()
    };
    let (database, _) = build(&keys, &options);

    assert_eq!(database.tiers(), 3);
    let second = database.next_tier().unwrap();
    assert!(second.num_names() > 0);
    assert!(second.next_tier().unwrap().next_tier().is_none());
    assert_eq!(database.config().num_tries, 3);
    assert_eq!(database.config().node_order, NodeOrder::Label);
}

#[test]
fn test_copy_all_restores_reversed_fragments() {
    let keys: Vec<Vec<u8>> = ["mods/core.stormmod", "mods/heroes.stormmod"]
        .iter()
        .map(|k| k.as_bytes().to_vec())
        .collect();

    for cache_slots in [256, 1] {
        let options = EncodeOptions {
            cache_slots,
            ..EncodeOptions::default()
        };
        let (database, _) = build(&keys, &options);
        let fragments = database.next_tier().unwrap();

        // Chained tier holds "/sdom", "dommrots." -> {"eroc", "soreh"}
        for (node, expected) in [
            (1, "mods/"),
            (2, ".stormmod"),
            (3, "core.stormmod"),
            (4, "heroes.stormmod"),
        ] {
            let mut cursor = SearchCursor::new("");
            fragments.copy_all(&mut cursor, node).unwrap();
            assert_eq!(cursor.path(), expected.as_bytes(), "cache {cache_slots}");
        }
    }
}

#[test]
fn test_cursor_stays_finished_until_reset() {
    let (database, _) = build(&small_corpus(), &EncodeOptions::default());

    let mut cursor = SearchCursor::new("ab");
    let mut seen = Vec::new();
    while let Some(found) = database.enumerate_next(&mut cursor).unwrap() {
        seen.push(found.name().into_owned());
    }
    assert_eq!(seen, vec!["ab", "abc"]);
    assert_eq!(cursor.phase(), SearchPhase::Finished);
    assert_eq!(database.enumerate_next(&mut cursor).unwrap(), None);

    cursor.reset("versions.osxarchive/");
    let found = database.enumerate_next(&mut cursor).unwrap().unwrap();
    assert_eq!(found.name(), "versions.osxarchive/contents/info.plist");
    assert_eq!(cursor.phase(), SearchPhase::Searching);
    assert_eq!(database.enumerate_next(&mut cursor).unwrap(), None);
}

#[test]
fn test_empty_database() {
    let (database, _) = build(&[], &EncodeOptions::default());
    assert_eq!(database.num_names(), 0);
    assert_eq!(database.num_nodes(), 1);
    assert_eq!(database.lookup("a").unwrap(), None);
    assert_eq!(database.lookup("").unwrap(), None);
    assert!(collect_names(&database, b"").is_empty());
}

#[test]
fn test_empty_name() {
    let keys = vec![Vec::new(), b"x".to_vec()];
    let (database, _) = build(&keys, &EncodeOptions::default());
    assert_eq!(database.lookup("").unwrap(), Some(0));
    assert_eq!(database.lookup("x").unwrap(), Some(1));

    let names = collect_names(&database, b"");
    assert_eq!(names.len(), 2);
    assert!(names[0].path.is_empty());
}

#[test]
fn test_truncated_database_is_rejected() {
    let options = EncodeOptions {
        max_tiers: 3,
        tail_mode: TailMode::Binary,
        ..EncodeOptions::default()
    };
    let encoded = encode_mar(&small_corpus(), &options);

    for length in 0..encoded.data.len() {
        assert!(
            FileNameDatabase::parse(&encoded.data[..length]).is_err(),
            "prefix of {length} bytes parsed"
        );
    }
}

#[test]
fn test_trailing_bytes_are_ignored() {
    let mut encoded = encode_mar(&small_corpus(), &EncodeOptions::default());
    encoded.data.extend_from_slice(&[0xEE; 13]);

    let database = FileNameDatabase::parse(&encoded.data).unwrap();
    assert_eq!(database.lookup("abc").unwrap(), encoded.indices.get(b"abc".as_slice()).copied());
}

#[test]
fn test_signature_and_config_checked() {
    let encoded = encode_mar(&small_corpus(), &EncodeOptions::default());

    let mut data = encoded.data.clone();
    data[3] = b'!';
    assert!(matches!(
        FileNameDatabase::parse(&data),
        Err(MarError::InvalidMagic(_))
    ));

    let mut data = encoded.data;
    let config = data.len() - 4;
    data[config + 2] |= 0x10;
    assert!(matches!(
        FileNameDatabase::parse(&data),
        Err(MarError::InvalidConfig(_))
    ));
}

#[test]
fn test_fragment_links_into_the_store_need_high_bits() {
    let keys: Vec<Vec<u8>> = vec![b"stormdata".to_vec()];
    let options = EncodeOptions {
        max_tiers: 1,
        ..EncodeOptions::default()
    };
    let encoded = encode_mar(&keys, &options);
    let (database, _) = build(&keys, &options);
    assert_eq!(database.lookup("stormdata").unwrap(), Some(0));

    // Zero the high-bit entry count that follows the packed words
    let mut stream = ByteStream::new(&encoded.data[4..]);
    for _ in 0..3 {
        SparseArray::parse(&mut stream).unwrap();
    }
    stream.read_bytes().unwrap();
    stream.read_u32_array().unwrap();
    let count_offset = 4 + stream.position() + 8;

    let mut data = encoded.data;
    data[count_offset..count_offset + 8].copy_from_slice(&0u64.to_le_bytes());
    assert!(matches!(
        FileNameDatabase::parse(&data),
        Err(MarError::CorruptStructure(_))
    ));
}

mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Corrupting any byte must yield an error or a usable database, never a panic
        #[test]
        fn corrupted_database_never_panics(position in any::<prop::sample::Index>(), flip in 1u8..=255) {
            let options = EncodeOptions { max_tiers: 3, ..EncodeOptions::default() };
            let encoded = encode_mar(&small_corpus(), &options);
            let mut data = encoded.data;
            let position = position.index(data.len());
            data[position] ^= flip;

            if let Ok(database) = FileNameDatabase::parse(&data) {
                for path in PATHS {
                    let _ = database.lookup(path);
                }
                let _ = database.names().take(10_000).count();
                let _ = database.names_with_prefix("mods/").take(10_000).count();
            }
        }
    }
}
