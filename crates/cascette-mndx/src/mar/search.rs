//! Per-session search state for MAR databases

use std::borrow::Cow;

/// Progress of an enumeration driven by [`FileNameDatabase::enumerate_next`]
///
/// [`FileNameDatabase::enumerate_next`]: crate::mar::FileNameDatabase::enumerate_next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchPhase {
    /// The prefix has not been matched yet
    #[default]
    Initializing,
    /// Walking the subtree below the prefix
    Searching,
    /// No more names
    Finished,
}

/// Backtracking record for one depth of an enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathStop {
    /// Node currently visited at this depth
    pub node: u32,
    /// Next LOUDS position to probe
    pub louds_pos: u32,
    /// Path length after this depth's label was appended
    pub path_len: usize,
    /// Cached index into the fragment high-bit table
    pub link_hi: Option<u32>,
    /// Name index of the last terminal yielded at this depth
    pub key_id: Option<u32>,
}

impl PathStop {
    /// Create a stop with empty caches
    pub const fn new(node: u32, louds_pos: u32, path_len: usize) -> Self {
        Self {
            node,
            louds_pos,
            path_len,
            link_hi: None,
            key_id: None,
        }
    }
}

/// A name produced by enumeration together with its index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundName {
    /// Raw name bytes
    pub path: Vec<u8>,
    /// Index of the name in the database
    pub index: u32,
}

impl FoundName {
    /// Name as text, replacing invalid UTF-8
    pub fn name(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.path)
    }
}

/// Query, match position and enumeration stack for one search session
///
/// A cursor does not borrow the database it is used with. Create one per
/// lookup or enumeration and drop it when done.
#[derive(Debug, Clone, Default)]
pub struct SearchCursor {
    pub(crate) query: Vec<u8>,
    pub(crate) query_pos: usize,
    pub(crate) node: u32,
    pub(crate) path: Vec<u8>,
    pub(crate) stops: Vec<PathStop>,
    pub(crate) stop_count: usize,
    pub(crate) phase: SearchPhase,
}

impl SearchCursor {
    /// Create a cursor for `query`
    ///
    /// For enumeration the query is the prefix every yielded name starts with.
    pub fn new(query: impl AsRef<[u8]>) -> Self {
        Self {
            query: query.as_ref().to_vec(),
            ..Self::default()
        }
    }

    /// Restart the cursor with a new query, keeping allocations
    pub fn reset(&mut self, query: impl AsRef<[u8]>) {
        self.query.clear();
        self.query.extend_from_slice(query.as_ref());
        self.begin();
        self.phase = SearchPhase::Initializing;
    }

    /// The query being matched
    pub fn query(&self) -> &[u8] {
        &self.query
    }

    /// Number of query bytes consumed so far
    pub const fn query_position(&self) -> usize {
        self.query_pos
    }

    /// Whether every query byte has been consumed
    pub fn is_query_exhausted(&self) -> bool {
        self.query_pos >= self.query.len()
    }

    /// Node the cursor rests on
    pub const fn node(&self) -> u32 {
        self.node
    }

    /// Path assembled by enumeration or fragment copies
    pub fn path(&self) -> &[u8] {
        &self.path
    }

    /// Current enumeration phase
    pub const fn phase(&self) -> SearchPhase {
        self.phase
    }

    /// Active enumeration depth
    pub const fn depth(&self) -> usize {
        self.stop_count
    }

    pub(crate) fn begin(&mut self) {
        self.query_pos = 0;
        self.node = 0;
        self.path.clear();
        self.stops.clear();
        self.stop_count = 0;
    }

    pub(crate) fn peek(&self) -> Option<u8> {
        self.query.get(self.query_pos).copied()
    }

    pub(crate) fn advance(&mut self) {
        self.query_pos += 1;
    }

    pub(crate) fn push(&mut self, byte: u8) {
        self.path.push(byte);
    }

    pub(crate) fn extend(&mut self, bytes: &[u8]) {
        self.path.extend_from_slice(bytes);
    }
}
