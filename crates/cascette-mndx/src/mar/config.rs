//! Trailing configuration mask of a MAR tier

use crate::mar::error::{MarError, Result};
use std::fmt;

/// Cache size preset chosen by the encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheLevel {
    /// `0x80`
    Huge,
    /// `0x100`
    Large,
    /// `0x200`, also used when the field is zero
    #[default]
    Normal,
    /// `0x400`
    Small,
    /// `0x800`
    Tiny,
}

/// How the fragment store delimits fragments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TailMode {
    /// NUL-terminated fragments (`0x1000`, or zero)
    #[default]
    Text,
    /// End-mark delimited fragments (`0x2000`)
    Binary,
}

/// Sibling ordering chosen by the encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeOrder {
    /// Siblings sorted by label (`0x10000`)
    Label,
    /// Siblings sorted by weight (`0x20000`, or zero)
    #[default]
    Weight,
}

/// Decoded configuration mask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrieConfig {
    /// Number of tiers the encoder was asked for
    pub num_tries: u32,
    /// Cache size preset
    pub cache_level: CacheLevel,
    /// Fragment delimiting mode
    pub tail_mode: TailMode,
    /// Sibling ordering
    pub node_order: NodeOrder,
}

impl TrieConfig {
    /// Tier count used when the mask leaves it unset
    pub const DEFAULT_NUM_TRIES: u32 = 3;
    /// Largest tier count the mask can express
    pub const MAX_NUM_TRIES: u32 = 0x7F;

    const NUM_TRIES_MASK: u32 = 0x0000_007F;
    const CACHE_LEVEL_MASK: u32 = 0x0000_0F80;
    const TAIL_MODE_MASK: u32 = 0x0000_F000;
    const NODE_ORDER_MASK: u32 = 0x000F_0000;
    const RESERVED_MASK: u32 = 0xFFF0_0000;

    /// Decode and validate a configuration mask
    pub fn from_mask(mask: u32) -> Result<Self> {
        if mask & Self::RESERVED_MASK != 0 {
            return Err(MarError::InvalidConfig(mask));
        }

        let num_tries = match mask & Self::NUM_TRIES_MASK {
            0 => Self::DEFAULT_NUM_TRIES,
            n => n,
        };

        let cache_level = match mask & Self::CACHE_LEVEL_MASK {
            0 | 0x200 => CacheLevel::Normal,
            0x80 => CacheLevel::Huge,
            0x100 => CacheLevel::Large,
            0x400 => CacheLevel::Small,
            0x800 => CacheLevel::Tiny,
            _ => return Err(MarError::InvalidConfig(mask)),
        };

        let tail_mode = match mask & Self::TAIL_MODE_MASK {
            0 | 0x1000 => TailMode::Text,
            0x2000 => TailMode::Binary,
            _ => return Err(MarError::InvalidConfig(mask)),
        };

        let node_order = match mask & Self::NODE_ORDER_MASK {
            0 | 0x20000 => NodeOrder::Weight,
            0x10000 => NodeOrder::Label,
            _ => return Err(MarError::InvalidConfig(mask)),
        };

        Ok(Self {
            num_tries,
            cache_level,
            tail_mode,
            node_order,
        })
    }

    /// Encode back to the canonical mask
    pub const fn mask(&self) -> u32 {
        let cache_level = match self.cache_level {
            CacheLevel::Huge => 0x80,
            CacheLevel::Large => 0x100,
            CacheLevel::Normal => 0x200,
            CacheLevel::Small => 0x400,
            CacheLevel::Tiny => 0x800,
        };
        let tail_mode = match self.tail_mode {
            TailMode::Text => 0x1000,
            TailMode::Binary => 0x2000,
        };
        let node_order = match self.node_order {
            NodeOrder::Label => 0x10000,
            NodeOrder::Weight => 0x20000,
        };
        (self.num_tries & Self::NUM_TRIES_MASK) | cache_level | tail_mode | node_order
    }
}

impl Default for TrieConfig {
    fn default() -> Self {
        Self {
            num_tries: Self::DEFAULT_NUM_TRIES,
            cache_level: CacheLevel::default(),
            tail_mode: TailMode::default(),
            node_order: NodeOrder::default(),
        }
    }
}

impl fmt::Display for TrieConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} tries, {:?} cache, {:?} tail, {:?} order",
            self.num_tries, self.cache_level, self.tail_mode, self.node_order
        )
    }
}
