//! Append-only string storage shared by all records of one inventory.
//!
//! Paths, names, and sub-paths are stored once as NUL-terminated byte runs
//! inside a single growable buffer and referenced by [`StrOffset`]. Offsets
//! stay valid across growth because the buffer is append-only; nothing ever
//! hands out a raw pointer into it.

/// Handle to a string stored in a [`StringArena`].
///
/// Offsets are only meaningful for the arena that produced them.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StrOffset(u32);

impl StrOffset {
    /// Raw byte offset into the arena.
    #[must_use]
    pub fn as_u32(self) -> u32 {
        self.0
    }

    #[must_use]
    fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// Append-only arena of NUL-terminated strings.
#[derive(Debug, Default, Clone)]
pub struct StringArena {
    bytes: Vec<u8>,
}

impl StringArena {
    /// Create an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current length of the backing buffer in bytes.
    ///
    /// Every offset handed out so far is strictly less than this value.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check whether the arena holds no strings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Append a string and return its offset.
    ///
    /// The same string pushed twice gets two offsets; callers that want
    /// sharing (one offset per directory, say) intern once and reuse it.
    ///
    /// # Panics
    ///
    /// Panics if the string contains an interior NUL or the arena would
    /// exceed `u32::MAX` bytes. Both indicate a logic bug, not an
    /// environmental condition.
    pub fn push(&mut self, s: &str) -> StrOffset {
        debug_assert!(!s.as_bytes().contains(&0), "interior NUL in arena string");
        let start = self.bytes.len();
        assert!(
            start + s.len() + 1 <= u32::MAX as usize,
            "string arena exceeds u32 offset range"
        );
        self.bytes.extend_from_slice(s.as_bytes());
        self.bytes.push(0);
        StrOffset(start as u32)
    }

    /// Resolve an offset back to its string.
    ///
    /// # Panics
    ///
    /// Panics if the offset did not come from this arena.
    #[must_use]
    pub fn get(&self, offset: StrOffset) -> &str {
        let start = offset.as_usize();
        assert!(start < self.bytes.len(), "arena offset out of range");
        let run = &self.bytes[start..];
        let end = run
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(run.len());
        std::str::from_utf8(&run[..end]).expect("arena holds only UTF-8 runs")
    }
}
