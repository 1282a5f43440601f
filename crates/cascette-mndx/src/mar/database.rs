//! MAR file name database
//!
//! A LOUDS trie over path names. Labels longer than one byte are stored as
//! fragment links that point either into this tier's [`FragmentStore`] or, when
//! the tier defers its fragments, at a node of the chained next tier. Next
//! tiers store their fragments reversed so a fragment is restored by climbing
//! from the linked node to the tier root.
//!
//! Node 0 is the root. Nodes are numbered in level order, so every depth of
//! the trie is a contiguous id range and the children of consecutive nodes
//! are contiguous runs in the LOUDS array.

use crate::mar::bit_vector::SparseArray;
use crate::mar::cache::FragmentTable;
use crate::mar::config::TrieConfig;
use crate::mar::error::{MarError, Result};
use crate::mar::flat_vector::BitPackedArray;
use crate::mar::search::{FoundName, PathStop, SearchCursor, SearchPhase};
use crate::mar::stream::ByteStream;
use crate::mar::tail::FragmentStore;
use tracing::{debug, trace};

/// `MAR\0` as a little-endian `u32`
pub const MAR_SIGNATURE: u32 = 0x0052_414D;

/// One tier of a MAR name database, owning any chained tiers
#[derive(Debug, Clone)]
pub struct FileNameDatabase {
    louds: SparseArray,
    terminals: SparseArray,
    link_flags: SparseArray,
    bases: Vec<u8>,
    extras: BitPackedArray,
    tail: FragmentStore,
    next: Option<Box<FileNameDatabase>>,
    cache: FragmentTable,
    num_l1_nodes: u32,
    config: TrieConfig,
}

impl FileNameDatabase {
    /// Parse a database from a buffer starting with the `MAR\0` signature
    ///
    /// Construction is all-or-nothing: any structural inconsistency fails the
    /// whole parse.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut stream = ByteStream::new(data);
        let signature = stream.read_u32()?;
        if signature != MAR_SIGNATURE {
            return Err(MarError::InvalidMagic(signature));
        }

        let database = Self::read_tier(&mut stream, 1)?;
        if stream.remaining() != 0 {
            trace!(
                "Ignoring {} trailing bytes after MAR database",
                stream.remaining()
            );
        }

        debug!(
            "Loaded MAR database: {} names, {} nodes, {} tiers",
            database.num_names(),
            database.num_nodes(),
            database.tiers()
        );
        Ok(database)
    }

    fn read_tier(stream: &mut ByteStream<'_>, depth: usize) -> Result<Self> {
        if depth > TrieConfig::MAX_NUM_TRIES as usize {
            return Err(MarError::TierLimitExceeded(depth));
        }

        let louds = SparseArray::parse(stream)?;
        let terminals = SparseArray::parse(stream)?;
        let link_flags = SparseArray::parse(stream)?;
        let bases = stream.read_bytes()?;
        let extras = BitPackedArray::parse(stream)?;
        if extras.len() < link_flags.count_ones() {
            return Err(MarError::CorruptStructure(
                "fewer fragment high bits than fragment links",
            ));
        }

        let tail = FragmentStore::parse(stream)?;
        let next = if link_flags.count_ones() != 0 && tail.is_empty() {
            Some(Box::new(Self::read_tier(stream, depth + 1)?))
        } else {
            None
        };

        let cache = FragmentTable::parse(stream)?;
        let num_l1_nodes = stream.read_u32()?;
        let config = TrieConfig::from_mask(stream.read_u32()?)?;

        trace!(
            "MAR tier {}: {} nodes, {} links, {} fragment bytes, {} cache slots, {}",
            depth,
            terminals.len(),
            link_flags.count_ones(),
            tail.len(),
            cache.len(),
            config
        );

        Ok(Self {
            louds,
            terminals,
            link_flags,
            bases,
            extras,
            tail,
            next,
            cache,
            num_l1_nodes,
            config,
        })
    }

    /// Number of names stored in this tier
    pub const fn num_names(&self) -> u32 {
        self.terminals.count_ones()
    }

    /// Number of trie nodes in this tier
    pub fn num_nodes(&self) -> u32 {
        self.bases.len() as u32
    }

    /// Number of tiers including this one
    pub fn tiers(&self) -> usize {
        1 + self.next.as_ref().map_or(0, |next| next.tiers())
    }

    /// Chained tier holding deferred fragments
    pub fn next_tier(&self) -> Option<&Self> {
        self.next.as_deref()
    }

    /// Configuration mask of this tier
    pub const fn config(&self) -> &TrieConfig {
        &self.config
    }

    /// Find the index of `path`
    pub fn lookup(&self, path: impl AsRef<[u8]>) -> Result<Option<u32>> {
        let mut cursor = SearchCursor::new(path);
        while !cursor.is_query_exhausted() {
            if !self.find_child(&mut cursor)? {
                return Ok(None);
            }
        }
        self.terminal_index(&cursor)
    }

    /// Advance the cursor along one edge of the trie
    ///
    /// Returns `false` when no edge matches the remaining query. The cursor is
    /// not usable for further steps after a failed step.
    pub fn match_step(&self, cursor: &mut SearchCursor) -> Result<bool> {
        if cursor.is_query_exhausted() {
            return Ok(false);
        }
        self.find_child(cursor)
    }

    /// Index of the node the cursor rests on, if that node ends a name
    pub fn terminal_index(&self, cursor: &SearchCursor) -> Result<Option<u32>> {
        if self.terminals.is_present(cursor.node) {
            Ok(Some(self.terminals.rank(cursor.node)?))
        } else {
            Ok(None)
        }
    }

    /// Append the fragment that ends at `node` in this tier to the path
    ///
    /// Walks from `node` up to a first-level node, emitting each label in
    /// turn.
    pub fn copy_all(&self, cursor: &mut SearchCursor, node: u32) -> Result<()> {
        let mut node = node;
        loop {
            let entry = *self.cache.reverse(node);
            if entry.child == node {
                match entry.label() {
                    Some(label) => cursor.push(label),
                    None => self.copy_link(cursor, entry.link)?,
                }
                if entry.parent == 0 {
                    return Ok(());
                }
                node = climb(node, entry.parent)?;
            } else {
                if self.link_flags.is_present(node) {
                    self.copy_link(cursor, self.link_of(node)?)?;
                } else {
                    cursor.push(self.base(node)?);
                }
                if node <= self.num_l1_nodes {
                    return Ok(());
                }
                node = climb(node, self.parent(node)?)?;
            }
        }
    }

    /// Produce the next name under the cursor's prefix
    ///
    /// Names come out depth-first in trie order. `None` means the subtree is
    /// exhausted; the cursor then stays finished until reset.
    pub fn enumerate_next(&self, cursor: &mut SearchCursor) -> Result<Option<FoundName>> {
        match cursor.phase {
            SearchPhase::Finished => return Ok(None),
            SearchPhase::Searching => {}
            SearchPhase::Initializing => {
                cursor.begin();
                while !cursor.is_query_exhausted() {
                    if !self.find_child_and_copy(cursor)? {
                        cursor.phase = SearchPhase::Finished;
                        return Ok(None);
                    }
                }

                cursor
                    .stops
                    .push(PathStop::new(cursor.node, 0, cursor.path.len()));
                cursor.stop_count = 1;
                cursor.phase = SearchPhase::Searching;

                if let Some(index) = self.terminal_index(cursor)? {
                    return Ok(Some(FoundName {
                        path: cursor.path.clone(),
                        index,
                    }));
                }
            }
        }

        loop {
            if cursor.stop_count == cursor.stops.len() {
                if cursor.stops.len() > self.louds.len() as usize {
                    return Err(MarError::CorruptStructure(
                        "enumeration deeper than the node count",
                    ));
                }
                let parent = cursor.stops[cursor.stop_count - 1].node;
                let position = self.first_child_position(parent)?;
                let child = position - parent - 1;
                cursor.stops.push(PathStop::new(child, position, 0));
            }

            let depth = cursor.stop_count;
            let stop = &mut cursor.stops[depth];
            let position = stop.louds_pos;
            stop.louds_pos += 1;

            if self.louds.is_present(position) {
                cursor.stop_count += 1;
                let node = stop.node;
                if self.link_flags.is_present(node) {
                    let link = self.link(node, &mut stop.link_hi)?;
                    self.copy_link(cursor, link)?;
                } else {
                    cursor.push(self.base(node)?);
                }

                let path_len = cursor.path.len();
                let stop = &mut cursor.stops[depth];
                stop.path_len = path_len;

                if self.terminals.is_present(node) {
                    let index = match stop.key_id {
                        Some(previous) => next_index(previous)?,
                        None => self.terminals.rank(node)?,
                    };
                    stop.key_id = Some(index);
                    return Ok(Some(FoundName {
                        path: cursor.path.clone(),
                        index,
                    }));
                }
            } else {
                if cursor.stop_count == 1 {
                    cursor.phase = SearchPhase::Finished;
                    return Ok(None);
                }

                // Siblings' child runs are adjacent, so the exhausted stop is
                // left in place for the next sibling's children
                cursor.stops[cursor.stop_count - 1].node += 1;
                let path_len = cursor.stops[cursor.stop_count - 2].path_len;
                cursor.path.truncate(path_len);
                cursor.stop_count -= 1;
            }
        }
    }

    /// Iterate over every name in the database
    pub fn names(&self) -> Names<'_> {
        self.names_with_prefix("")
    }

    /// Iterate over the names starting with `prefix`
    pub fn names_with_prefix(&self, prefix: impl AsRef<[u8]>) -> Names<'_> {
        Names {
            database: self,
            cursor: SearchCursor::new(prefix),
            done: false,
        }
    }

    fn find_child(&self, cursor: &mut SearchCursor) -> Result<bool> {
        let Some(byte) = cursor.peek() else {
            return Ok(false);
        };
        let node = cursor.node;

        let entry = *self.cache.forward(node, byte);
        if entry.parent == node {
            let start = cursor.query_pos;
            let matched = match entry.label() {
                Some(label) if label == byte => {
                    cursor.advance();
                    true
                }
                Some(_) => false,
                None => self.match_link(cursor, entry.link)?,
            };
            if matched {
                cursor.node = entry.child;
                return Ok(true);
            }
            if cursor.query_pos != start {
                return Ok(false);
            }
        }

        let mut position = self.first_child_position(node)?;
        let mut child = position - node - 1;
        let mut link_hi = None;
        while self.louds.is_present(position) {
            if self.link_flags.is_present(child) {
                let link = self.link(child, &mut link_hi)?;
                let start = cursor.query_pos;
                if self.match_link(cursor, link)? {
                    cursor.node = child;
                    return Ok(true);
                }
                if cursor.query_pos != start {
                    return Ok(false);
                }
            } else if self.base(child)? == byte {
                cursor.advance();
                cursor.node = child;
                return Ok(true);
            }
            child += 1;
            position += 1;
        }
        Ok(false)
    }

    fn find_child_and_copy(&self, cursor: &mut SearchCursor) -> Result<bool> {
        let Some(byte) = cursor.peek() else {
            return Ok(false);
        };
        let node = cursor.node;

        let entry = *self.cache.forward(node, byte);
        if entry.parent == node {
            let start = cursor.query_pos;
            let matched = match entry.label() {
                Some(label) if label == byte => {
                    cursor.advance();
                    cursor.push(label);
                    true
                }
                Some(_) => false,
                None => self.match_and_copy_link(cursor, entry.link)?,
            };
            if matched {
                cursor.node = entry.child;
                return Ok(true);
            }
            if cursor.query_pos != start {
                return Ok(false);
            }
        }

        let mut position = self.first_child_position(node)?;
        let mut child = position - node - 1;
        let mut link_hi = None;
        while self.louds.is_present(position) {
            if self.link_flags.is_present(child) {
                let link = self.link(child, &mut link_hi)?;
                let start = cursor.query_pos;
                if self.match_and_copy_link(cursor, link)? {
                    cursor.node = child;
                    return Ok(true);
                }
                if cursor.query_pos != start {
                    return Ok(false);
                }
            } else {
                let label = self.base(child)?;
                if label == byte {
                    cursor.advance();
                    cursor.push(label);
                    cursor.node = child;
                    return Ok(true);
                }
            }
            child += 1;
            position += 1;
        }
        Ok(false)
    }

    /// Match a fragment stored in this tier, climbing from `node`
    fn match_fragment(&self, cursor: &mut SearchCursor, node: u32) -> Result<bool> {
        let mut node = node;
        loop {
            let entry = *self.cache.reverse(node);
            if entry.child == node {
                match entry.label() {
                    Some(label) => {
                        if cursor.peek() != Some(label) {
                            return Ok(false);
                        }
                        cursor.advance();
                    }
                    None => {
                        if !self.match_link(cursor, entry.link)? {
                            return Ok(false);
                        }
                    }
                }
                if entry.parent == 0 {
                    return Ok(true);
                }
                node = climb(node, entry.parent)?;
            } else {
                if self.link_flags.is_present(node) {
                    if !self.match_link(cursor, self.link_of(node)?)? {
                        return Ok(false);
                    }
                } else {
                    if cursor.peek() != Some(self.base(node)?) {
                        return Ok(false);
                    }
                    cursor.advance();
                }
                if node <= self.num_l1_nodes {
                    return Ok(true);
                }
                node = climb(node, self.parent(node)?)?;
            }

            if cursor.is_query_exhausted() {
                return Ok(false);
            }
        }
    }

    /// Match a fragment stored in this tier while query bytes remain, then
    /// copy the rest of it
    fn match_and_copy_fragment(&self, cursor: &mut SearchCursor, node: u32) -> Result<bool> {
        let mut node = node;
        loop {
            let entry = *self.cache.reverse(node);
            if entry.child == node {
                match entry.label() {
                    Some(label) => {
                        if cursor.peek() != Some(label) {
                            return Ok(false);
                        }
                        cursor.advance();
                        cursor.push(label);
                    }
                    None => {
                        if !self.match_and_copy_link(cursor, entry.link)? {
                            return Ok(false);
                        }
                    }
                }
                if entry.parent == 0 {
                    return Ok(true);
                }
                node = climb(node, entry.parent)?;
            } else {
                if self.link_flags.is_present(node) {
                    if !self.match_and_copy_link(cursor, self.link_of(node)?)? {
                        return Ok(false);
                    }
                } else {
                    let label = self.base(node)?;
                    if cursor.peek() != Some(label) {
                        return Ok(false);
                    }
                    cursor.advance();
                    cursor.push(label);
                }
                if node <= self.num_l1_nodes {
                    return Ok(true);
                }
                node = climb(node, self.parent(node)?)?;
            }

            if cursor.is_query_exhausted() {
                self.copy_all(cursor, node)?;
                return Ok(true);
            }
        }
    }

    fn match_link(&self, cursor: &mut SearchCursor, link: u32) -> Result<bool> {
        match &self.next {
            Some(next) => next.match_fragment(cursor, link),
            None => self.tail.matches(link, cursor),
        }
    }

    fn match_and_copy_link(&self, cursor: &mut SearchCursor, link: u32) -> Result<bool> {
        match &self.next {
            Some(next) => next.match_and_copy_fragment(cursor, link),
            None => self.tail.match_and_copy(link, cursor),
        }
    }

    fn copy_link(&self, cursor: &mut SearchCursor, link: u32) -> Result<()> {
        match &self.next {
            Some(next) => next.copy_all(cursor, link),
            None => self.tail.copy(link, cursor),
        }
    }

    /// Link of a node flagged in the link array, reusing the high-bit index
    /// of the previous link sibling when one was seen
    fn link(&self, node: u32, hi: &mut Option<u32>) -> Result<u32> {
        let index = match *hi {
            Some(previous) => next_index(previous)?,
            None => self.link_flags.rank(node)?,
        };
        *hi = Some(index);
        Ok((self.extras.get(index)? << 8) | u32::from(self.base(node)?))
    }

    fn link_of(&self, node: u32) -> Result<u32> {
        self.link(node, &mut None)
    }

    fn base(&self, node: u32) -> Result<u8> {
        self.bases
            .get(node as usize)
            .copied()
            .ok_or(MarError::CorruptStructure("node beyond label table"))
    }

    fn first_child_position(&self, node: u32) -> Result<u32> {
        let position = self.louds.select_zero(node)? + 1;
        if position <= node {
            return Err(MarError::CorruptStructure("LOUDS child run before its parent"));
        }
        Ok(position)
    }

    fn parent(&self, node: u32) -> Result<u32> {
        self.louds
            .select_one(node)?
            .checked_sub(node + 1)
            .ok_or(MarError::CorruptStructure("LOUDS parent before the root"))
    }
}

/// Parent step that must strictly move toward the root
fn climb(node: u32, parent: u32) -> Result<u32> {
    if parent < node {
        Ok(parent)
    } else {
        Err(MarError::CorruptStructure("parent link does not move toward the root"))
    }
}

fn next_index(previous: u32) -> Result<u32> {
    previous
        .checked_add(1)
        .ok_or(MarError::CorruptStructure("index overflow"))
}

/// Iterator over the names of a database
///
/// Created by [`FileNameDatabase::names`] and
/// [`FileNameDatabase::names_with_prefix`]. Stops after the first error.
#[derive(Debug)]
pub struct Names<'a> {
    database: &'a FileNameDatabase,
    cursor: SearchCursor,
    done: bool,
}

impl Iterator for Names<'_> {
    type Item = Result<FoundName>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.database.enumerate_next(&mut self.cursor) {
            Ok(Some(found)) => Some(Ok(found)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl std::iter::FusedIterator for Names<'_> {}
