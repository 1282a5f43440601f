//! Test utilities for building MAR databases and MNDX roots
//!
//! The encoders here write the on-disk layout the parsers read. They favor
//! simplicity over compactness: siblings are sorted by label, fragments are
//! never shared and the transition cache keeps the first entry per slot.

use crate::mar::bit_vector::{BLOCK_BITS, RankCheckpoint, SELECT_INTERVAL};
use crate::mar::cache::{FragmentTable, FragmentTableEntry};
use crate::mar::config::{CacheLevel, NodeOrder, TailMode, TrieConfig};
use crate::mar::database::MAR_SIGNATURE;
use crate::mar::flat_vector::BitPackedArray;
use crate::root::entry::{ContentKey, MndxRootEntry};
use crate::root::header::{MarInfo, MndxHeader};
use binrw::BinWriterExt;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::io::Cursor;

/// Length-prefixed array with its zero padding
pub fn encode_bytes(payload: &[u8]) -> Vec<u8> {
    let mut out = (payload.len() as u64).to_le_bytes().to_vec();
    out.extend_from_slice(payload);
    out.resize(out.len() + (8 - payload.len() % 8) % 8, 0);
    out
}

fn encode_u32s(values: &[u32]) -> Vec<u8> {
    let payload: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    encode_bytes(&payload)
}

/// Sparse array with rank checkpoints and select hints for `bits`
pub fn encode_sparse_array(bits: &[bool]) -> Vec<u8> {
    let total = bits.len() as u32;
    let mut words = vec![0u32; bits.len().div_ceil(32)];
    for (i, _) in bits.iter().enumerate().filter(|(_, bit)| **bit) {
        words[i / 32] |= 1 << (i % 32);
    }

    let mut prefix = Vec::with_capacity(bits.len() + 1);
    prefix.push(0u32);
    for &bit in bits {
        prefix.push(prefix[prefix.len() - 1] + u32::from(bit));
    }
    let ones_before = |end: usize| prefix[end.min(bits.len())];
    let valid = ones_before(bits.len());

    let mut checkpoints = Vec::new();
    for block in 0..total.div_ceil(BLOCK_BITS) as usize {
        let start = block * BLOCK_BITS as usize;
        let abs = ones_before(start);
        let mut rel = [0u32; 7];
        for (k, count) in rel.iter_mut().enumerate() {
            *count = ones_before(start + 64 * (k + 1)) - abs;
        }
        checkpoints.push(RankCheckpoint::from_counts(abs, rel));
    }
    checkpoints.push(RankCheckpoint::from_counts(valid, [0; 7]));

    let mut select0 = Vec::new();
    let mut select1 = Vec::new();
    let (mut zeros, mut ones) = (0u32, 0u32);
    for (position, &bit) in bits.iter().enumerate() {
        let (hints, count) = if bit {
            (&mut select1, &mut ones)
        } else {
            (&mut select0, &mut zeros)
        };
        if *count % SELECT_INTERVAL == 0 {
            hints.push(position as u32);
        }
        *count += 1;
    }
    select0.push(total);
    select1.push(total);

    let mut out = encode_u32s(&words);
    out.extend_from_slice(&total.to_le_bytes());
    out.extend_from_slice(&valid.to_le_bytes());
    let records: Vec<u8> = checkpoints
        .iter()
        .flat_map(|checkpoint| {
            let (lo, hi) = checkpoint.packed();
            [checkpoint.abs, lo, hi].into_iter().flat_map(u32::to_le_bytes)
        })
        .collect();
    out.extend(encode_bytes(&records));
    out.extend(encode_u32s(&select0));
    out.extend(encode_u32s(&select1));
    out
}

/// Bit-packed array of `values` at `bits` per entry
pub fn encode_bit_packed(values: &[u32], bits: u32) -> Vec<u8> {
    let mut words = Vec::new();
    if bits > 0 {
        words = vec![0u32; (values.len() * bits as usize).div_ceil(32)];
        for (i, &value) in values.iter().enumerate() {
            let position = i * bits as usize;
            let (index, offset) = (position / 32, position % 32);
            let value = u64::from(value & BitPackedArray::mask_for(bits)) << offset;
            words[index] |= value as u32;
            if offset + bits as usize > 32 {
                words[index + 1] |= (value >> 32) as u32;
            }
        }
    }

    let mut out = encode_u32s(&words);
    out.extend_from_slice(&bits.to_le_bytes());
    out.extend_from_slice(&BitPackedArray::mask_for(bits).to_le_bytes());
    out.extend_from_slice(&(values.len() as u64).to_le_bytes());
    out
}

/// Transition cache holding `entries`
pub fn encode_cache(entries: &[FragmentTableEntry]) -> Vec<u8> {
    let payload: Vec<u8> = entries
        .iter()
        .flat_map(|entry| [entry.parent, entry.child, entry.link])
        .flat_map(u32::to_le_bytes)
        .collect();
    encode_bytes(&payload)
}

/// Deterministic xorshift bit pattern
pub fn pseudo_random_bits(count: usize, seed: u64) -> Vec<bool> {
    let mut state = seed | 1;
    (0..count)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state & 1 != 0
        })
        .collect()
}

/// Knobs for [`encode_mar`]
#[derive(Debug, Clone)]
pub struct EncodeOptions {
    /// Fragment delimiting in the last tier
    pub tail_mode: TailMode,
    /// Transition cache size per tier, a power of two
    pub cache_slots: usize,
    /// Tiers to use; fragments of the last tier go to its fragment store
    pub max_tiers: u32,
    /// Store single-byte labels of the outermost tier as links too
    pub link_single_chars: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            tail_mode: TailMode::Text,
            cache_slots: 256,
            max_tiers: 2,
            link_single_chars: false,
        }
    }
}

/// Serialized database and the index assigned to every key
#[derive(Debug, Clone)]
pub struct Encoded {
    /// Database bytes starting with the signature
    pub data: Vec<u8>,
    /// Name index per key
    pub indices: BTreeMap<Vec<u8>, u32>,
}

/// Encode `keys` as a MAR database
pub fn encode_mar<K: AsRef<[u8]>>(keys: &[K], options: &EncodeOptions) -> Encoded {
    let keys: BTreeSet<Vec<u8>> = keys.iter().map(|k| k.as_ref().to_vec()).collect();
    let tier = encode_tier(&keys, 0, options);

    let mut data = MAR_SIGNATURE.to_le_bytes().to_vec();
    data.extend(tier.data);
    Encoded {
        data,
        indices: tier.indices,
    }
}

struct TierOutput {
    data: Vec<u8>,
    indices: BTreeMap<Vec<u8>, u32>,
    terminal_nodes: BTreeMap<Vec<u8>, u32>,
}

#[derive(Default)]
struct RadixNode {
    label: Vec<u8>,
    key: Option<Vec<u8>>,
    children: Vec<usize>,
    parent: usize,
}

fn insert_children(arena: &mut Vec<RadixNode>, node: usize, prefix: &[u8], suffixes: &[&[u8]]) {
    let mut groups: BTreeMap<u8, Vec<&[u8]>> = BTreeMap::new();
    for suffix in suffixes {
        match suffix.first() {
            Some(&first) => groups.entry(first).or_default().push(suffix),
            None => arena[node].key = Some(prefix.to_vec()),
        }
    }

    for group in groups.into_values() {
        let mut shared = group[0].len();
        for other in &group[1..] {
            shared = shared.min(
                group[0]
                    .iter()
                    .zip(other.iter())
                    .take_while(|(a, b)| a == b)
                    .count(),
            );
        }

        let label = group[0][..shared].to_vec();
        let child = arena.len();
        arena.push(RadixNode {
            label: label.clone(),
            parent: node,
            ..RadixNode::default()
        });
        arena[node].children.push(child);

        let mut child_prefix = prefix.to_vec();
        child_prefix.extend_from_slice(&label);
        let rest: Vec<&[u8]> = group.iter().map(|suffix| &suffix[shared..]).collect();
        insert_children(arena, child, &child_prefix, &rest);
    }
}

fn encode_tier(keys: &BTreeSet<Vec<u8>>, tier: u32, options: &EncodeOptions) -> TierOutput {
    let mut arena = vec![RadixNode::default()];
    let suffixes: Vec<&[u8]> = keys.iter().map(Vec::as_slice).collect();
    insert_children(&mut arena, 0, &[], &suffixes);

    // Level-order numbering
    let mut order = Vec::with_capacity(arena.len());
    let mut queue = VecDeque::from([0usize]);
    while let Some(node) = queue.pop_front() {
        order.push(node);
        queue.extend(arena[node].children.iter().copied());
    }
    let mut ids = vec![0u32; arena.len()];
    for (id, &node) in order.iter().enumerate() {
        ids[node] = id as u32;
    }

    let mut louds = vec![true, false];
    let mut terminals = Vec::with_capacity(order.len());
    for &node in &order {
        louds.extend(std::iter::repeat_n(true, arena[node].children.len()));
        louds.push(false);
        terminals.push(arena[node].key.is_some());
    }

    let mut indices = BTreeMap::new();
    let mut terminal_nodes = BTreeMap::new();
    let mut next_index = 0u32;
    for (id, &node) in order.iter().enumerate() {
        if let Some(key) = &arena[node].key {
            indices.insert(key.clone(), next_index);
            terminal_nodes.insert(key.clone(), id as u32);
            next_index += 1;
        }
    }

    // Outer tiers store labels as read; chained tiers store them reversed
    let content = |node: usize| -> Vec<u8> {
        let label = &arena[node].label;
        if tier == 0 {
            label.clone()
        } else {
            label.iter().rev().copied().collect()
        }
    };
    let is_link = |content: &[u8]| content.len() > 1 || (tier == 0 && options.link_single_chars);
    let defer = tier + 1 < options.max_tiers;

    let deferred: BTreeSet<Vec<u8>> = order[1..]
        .iter()
        .map(|&node| content(node))
        .filter(|c| is_link(c))
        .map(|c| c.into_iter().rev().collect())
        .collect();
    let next = (defer && !deferred.is_empty()).then(|| encode_tier(&deferred, tier + 1, options));

    let mut bases = vec![0u8; order.len()];
    let mut link_flags = vec![false; order.len()];
    let mut extras = Vec::new();
    let mut links = vec![None; order.len()];
    let mut tail = Vec::new();
    let mut end_marks = Vec::new();

    for (id, &node) in order.iter().enumerate().skip(1) {
        let content = content(node);
        if !is_link(&content) {
            bases[id] = content[0];
            continue;
        }

        let link = match &next {
            Some(next) => {
                let key: Vec<u8> = content.iter().rev().copied().collect();
                next.terminal_nodes[&key]
            }
            None => {
                let offset = tail.len() as u32;
                tail.extend_from_slice(&content);
                match options.tail_mode {
                    TailMode::Text => tail.push(0),
                    TailMode::Binary => {
                        end_marks.resize(tail.len(), false);
                        if let Some(last) = end_marks.last_mut() {
                            *last = true;
                        }
                    }
                }
                offset
            }
        };
        bases[id] = link as u8;
        link_flags[id] = true;
        extras.push(link >> 8);
        links[id] = Some(link);
    }

    let slot_mask = (options.cache_slots - 1) as u32;
    let mut cache = vec![FragmentTableEntry::EMPTY; options.cache_slots];
    for (id, &node) in order.iter().enumerate().skip(1) {
        let id = id as u32;
        let parent = ids[arena[node].parent];
        let content = content(node);
        let entry = match links[id as usize] {
            Some(link) => FragmentTableEntry::fragment(parent, id, link),
            None => FragmentTableEntry::literal(parent, id, content[0]),
        };
        let slot = if tier == 0 {
            FragmentTable::slot(parent, content[0], slot_mask)
        } else {
            id & slot_mask
        };
        if cache[slot as usize] == FragmentTableEntry::EMPTY {
            cache[slot as usize] = entry;
        }
    }

    let extra_bits = 32 - extras.iter().copied().max().unwrap_or(0).leading_zeros();
    let config = TrieConfig {
        num_tries: options.max_tiers,
        cache_level: CacheLevel::Normal,
        tail_mode: options.tail_mode,
        node_order: NodeOrder::Label,
    };

    let mut data = encode_sparse_array(&louds);
    data.extend(encode_sparse_array(&terminals));
    data.extend(encode_sparse_array(&link_flags));
    data.extend(encode_bytes(&bases));
    data.extend(encode_bit_packed(&extras, extra_bits));
    data.extend(encode_bytes(&tail));
    data.extend(encode_sparse_array(&end_marks));
    if let Some(next) = &next {
        data.extend_from_slice(&next.data);
    }
    data.extend(encode_cache(&cache));
    data.extend_from_slice(&(arena[0].children.len() as u32).to_le_bytes());
    data.extend_from_slice(&config.mask().to_le_bytes());

    TierOutput {
        data,
        indices,
        terminal_nodes,
    }
}

/// A file to place in a test MNDX root
#[derive(Debug, Clone)]
pub struct RootFixtureFile {
    /// Full path including the package prefix
    pub path: &'static str,
    /// Content key
    pub content_key: ContentKey,
    /// Decoded size
    pub content_size: u32,
}

impl RootFixtureFile {
    /// File whose content key repeats `fill`
    pub fn new(path: &'static str, fill: u8, content_size: u32) -> Self {
        Self {
            path,
            content_key: ContentKey::from_bytes([fill; 16]),
            content_size,
        }
    }
}

/// Encode an MNDX root for `packages` holding `files`
///
/// Every file path must start with one of the packages followed by `/`.
pub fn encode_mndx_root(
    packages: &[&str],
    files: &[RootFixtureFile],
    options: &EncodeOptions,
) -> Vec<u8> {
    let package_db = encode_mar(packages, options);

    let mut groups: BTreeMap<Vec<u8>, Vec<(u32, &RootFixtureFile)>> = BTreeMap::new();
    for file in files {
        let package = packages
            .iter()
            .filter(|p| file.path.len() > p.len() && file.path.starts_with(*p))
            .max_by_key(|p| p.len())
            .expect("file belongs to a package");
        let stripped = file.path[package.len()..].trim_start_matches('/');
        let package_index = package_db.indices[package.as_bytes()];
        groups
            .entry(stripped.as_bytes().to_vec())
            .or_default()
            .push((package_index, file));
    }

    let stripped: Vec<&Vec<u8>> = groups.keys().collect();
    let stripped_db = encode_mar(&stripped, options);
    let full_paths: Vec<&str> = files.iter().map(|f| f.path).collect();
    let full_db = encode_mar(&full_paths, options);

    let mut ordered: Vec<(&Vec<u8>, &Vec<(u32, &RootFixtureFile)>)> = groups.iter().collect();
    ordered.sort_by_key(|(name, _)| stripped_db.indices[*name]);

    let mut entries = Vec::new();
    for (_, group) in &ordered {
        for (i, (package_index, file)) in group.iter().enumerate() {
            entries.push(MndxRootEntry::new(
                *package_index,
                i + 1 == group.len(),
                file.content_key,
                file.content_size,
            ));
        }
    }

    let blobs = [&package_db.data, &stripped_db.data, &full_db.data];
    let header_size = 40u32;
    let info_size = MndxHeader::MAR_INFO_SIZE * blobs.len() as u32;
    let mut offset = header_size + info_size;
    let mut infos = Vec::new();
    for (index, blob) in blobs.iter().enumerate() {
        infos.push(MarInfo::new(index as u32, offset, blob.len() as u32));
        offset += blob.len() as u32;
    }

    let header = MndxHeader::new(
        2,
        header_size,
        offset,
        entries.len() as u32,
        ordered.len() as u32,
    );

    let mut cursor = Cursor::new(Vec::new());
    cursor.write_le(&header).expect("header writes");
    for info in &infos {
        cursor.write_le(info).expect("MAR info writes");
    }
    for blob in blobs {
        std::io::Write::write_all(&mut cursor, blob).expect("blob writes");
    }
    for entry in &entries {
        cursor.write_le(entry).expect("entry writes");
    }
    cursor.into_inner()
}
