//! Append-only instruction store backed by fixed-capacity chunks.
//!
//! The driver reserves a slot before decoding, lets the handler fill it in
//! place, and then either commits it or rolls it back. Rollback only adjusts
//! the accounting of the tail chunk; the chunk itself stays allocated and is
//! reused by the next reservation.

use super::AirInstr;

/// Default number of instructions per chunk.
pub const CHUNK_CAPACITY: usize = 128;

#[derive(Debug, Clone)]
struct Chunk {
    slots: Vec<AirInstr>,
}

impl Chunk {
    fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
        }
    }

    fn used(&self) -> usize {
        self.slots.len()
    }
}

/// Ordered sequence of committed AIR instructions.
#[derive(Debug, Clone)]
pub struct InstructionStore {
    chunks: Vec<Chunk>,
    chunk_capacity: usize,
    count: usize,
    /// Set between `reserve` and the matching `commit`/`rollback_last`.
    pending: bool,
}

impl Default for InstructionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InstructionStore {
    pub fn new() -> Self {
        Self::with_chunk_capacity(CHUNK_CAPACITY)
    }

    /// Create a store whose chunks hold `capacity` instructions (at least one).
    pub fn with_chunk_capacity(capacity: usize) -> Self {
        Self {
            chunks: Vec::new(),
            chunk_capacity: capacity.max(1),
            count: 0,
            pending: false,
        }
    }

    /// Hand out the next free slot, reset to an empty instruction.
    ///
    /// A new chunk is allocated only when the tail chunk is full. The count is
    /// incremented immediately; call [`rollback_last`](Self::rollback_last) to
    /// undo the reservation.
    pub fn reserve(&mut self) -> &mut AirInstr {
        let needs_chunk = self
            .chunks
            .last()
            .map_or(true, |tail| tail.used() == self.chunk_capacity);
        if needs_chunk {
            self.chunks.push(Chunk::new(self.chunk_capacity));
        }

        self.count += 1;
        self.pending = true;

        let tail_index = self.chunks.len() - 1;
        let tail = &mut self.chunks[tail_index];
        tail.slots.push(AirInstr::default());
        let last = tail.slots.len() - 1;
        &mut tail.slots[last]
    }

    /// Keep the most recently reserved slot.
    pub fn commit(&mut self) {
        self.pending = false;
    }

    /// Un-append the slot handed out by the last [`reserve`](Self::reserve).
    ///
    /// Returns the discarded instruction, or `None` (and changes nothing) if
    /// there is no outstanding reservation.
    pub fn rollback_last(&mut self) -> Option<AirInstr> {
        if !self.pending {
            return None;
        }
        self.pending = false;

        let discarded = self.chunks.last_mut()?.slots.pop()?;
        self.count -= 1;
        Some(discarded)
    }

    /// Number of committed instructions (plus an outstanding reservation, if any).
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Number of allocated chunks, including an empty tail left by a rollback.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn chunk_capacity(&self) -> usize {
        self.chunk_capacity
    }

    pub fn get(&self, index: usize) -> Option<&AirInstr> {
        if index >= self.count {
            return None;
        }
        let chunk = self.chunks.get(index / self.chunk_capacity)?;
        chunk.slots.get(index % self.chunk_capacity)
    }

    pub fn last(&self) -> Option<&AirInstr> {
        self.count.checked_sub(1).and_then(|i| self.get(i))
    }

    /// Iterate instructions from the head chunk to the tail chunk.
    pub fn iter(&self) -> impl Iterator<Item = &AirInstr> + '_ {
        self.chunks.iter().flat_map(|chunk| chunk.slots.iter())
    }

    /// Drop every chunk.
    pub fn clear(&mut self) {
        self.chunks.clear();
        self.count = 0;
        self.pending = false;
    }

    pub fn to_vec(&self) -> Vec<AirInstr> {
        self.iter().copied().collect()
    }
}

impl<'a> IntoIterator for &'a InstructionStore {
    type Item = &'a AirInstr;
    type IntoIter = Box<dyn Iterator<Item = &'a AirInstr> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

impl PartialEq for InstructionStore {
    /// Stores are equal when they hold the same instruction sequence,
    /// regardless of chunk layout.
    fn eq(&self, other: &Self) -> bool {
        self.count == other.count && self.iter().eq(other.iter())
    }
}
