/// LiveView Sequence Implementation
///
/// A Sequence is the lowest-level storage for the raw values of one column.
/// Two implementations are provided and selected per table by `StorageHint`:
/// - ArraySequence: contiguous vector, O(1) access, O(N) middle insert/remove
/// - TieredVectorSequence: list of bounded blocks, cheaper middle insert/remove

use crate::error::{Error, Result};
use std::fmt::Debug;

/// Storage operations every column backend supports.
pub trait Sequence<T: Clone> {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get a reference to the value at index, or None if out of range.
    fn get(&self, index: usize) -> Option<&T>;

    fn set(&mut self, index: usize, value: T) -> Result<()>;

    /// Insert value at index, shifting subsequent elements.
    fn insert(&mut self, index: usize, value: T) -> Result<()>;

    /// Remove and return the value at index.
    fn remove(&mut self, index: usize) -> Result<T>;

    fn push(&mut self, value: T);

    fn clear(&mut self);
}

/// Contiguous array storage.
#[derive(Debug, Clone)]
pub struct ArraySequence<T: Clone> {
    data: Vec<T>,
}

impl<T: Clone> ArraySequence<T> {
    pub fn new() -> Self {
        ArraySequence { data: Vec::new() }
    }
}

impl<T: Clone> Default for ArraySequence<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Debug> Sequence<T> for ArraySequence<T> {
    fn len(&self) -> usize {
        self.data.len()
    }

    fn get(&self, index: usize) -> Option<&T> {
        self.data.get(index)
    }

    fn set(&mut self, index: usize, value: T) -> Result<()> {
        let len = self.data.len();
        let slot = self
            .data
            .get_mut(index)
            .ok_or_else(|| Error::out_of_range(index, len))?;
        *slot = value;
        Ok(())
    }

    fn insert(&mut self, index: usize, value: T) -> Result<()> {
        if index > self.data.len() {
            return Err(Error::out_of_range(index, self.data.len() + 1));
        }
        self.data.insert(index, value);
        Ok(())
    }

    fn remove(&mut self, index: usize) -> Result<T> {
        if index >= self.data.len() {
            return Err(Error::out_of_range(index, self.data.len()));
        }
        Ok(self.data.remove(index))
    }

    fn push(&mut self, value: T) {
        self.data.push(value);
    }

    fn clear(&mut self) {
        self.data.clear();
    }
}

/// Block-list storage.
///
/// Values live in a list of blocks of at most `MAX_BLOCK_SIZE` elements.
/// A middle insert or remove only shifts elements inside one block; a full
/// block is split in half and an emptied block is dropped.
#[derive(Debug, Clone)]
pub struct TieredVectorSequence<T: Clone> {
    blocks: Vec<Vec<T>>,
    size: usize,
}

impl<T: Clone> TieredVectorSequence<T> {
    const MAX_BLOCK_SIZE: usize = 256;

    pub fn new() -> Self {
        TieredVectorSequence {
            blocks: Vec::new(),
            size: 0,
        }
    }

    /// Number of blocks currently allocated.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Find (block, offset) for an existing element.
    fn locate(&self, mut index: usize) -> Option<(usize, usize)> {
        if index >= self.size {
            return None;
        }
        for (block_idx, block) in self.blocks.iter().enumerate() {
            if index < block.len() {
                return Some((block_idx, index));
            }
            index -= block.len();
        }
        None
    }

    fn split_if_full(&mut self, block_idx: usize) {
        if self.blocks[block_idx].len() > Self::MAX_BLOCK_SIZE {
            let half = self.blocks[block_idx].len() / 2;
            let tail = self.blocks[block_idx].split_off(half);
            self.blocks.insert(block_idx + 1, tail);
        }
    }
}

impl<T: Clone> Default for TieredVectorSequence<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Debug> Sequence<T> for TieredVectorSequence<T> {
    fn len(&self) -> usize {
        self.size
    }

    fn get(&self, index: usize) -> Option<&T> {
        self.locate(index)
            .map(|(block, offset)| &self.blocks[block][offset])
    }

    fn set(&mut self, index: usize, value: T) -> Result<()> {
        let (block, offset) = self
            .locate(index)
            .ok_or_else(|| Error::out_of_range(index, self.size))?;
        self.blocks[block][offset] = value;
        Ok(())
    }

    fn insert(&mut self, index: usize, value: T) -> Result<()> {
        if index > self.size {
            return Err(Error::out_of_range(index, self.size + 1));
        }
        if index == self.size {
            self.push(value);
            return Ok(());
        }
        let (block, offset) = self
            .locate(index)
            .ok_or_else(|| Error::out_of_range(index, self.size))?;
        self.blocks[block].insert(offset, value);
        self.size += 1;
        self.split_if_full(block);
        Ok(())
    }

    fn remove(&mut self, index: usize) -> Result<T> {
        let (block, offset) = self
            .locate(index)
            .ok_or_else(|| Error::out_of_range(index, self.size))?;
        let value = self.blocks[block].remove(offset);
        if self.blocks[block].is_empty() {
            self.blocks.remove(block);
        }
        self.size -= 1;
        Ok(value)
    }

    fn push(&mut self, value: T) {
        match self.blocks.last_mut() {
            Some(last) if last.len() < Self::MAX_BLOCK_SIZE => last.push(value),
            _ => self.blocks.push(vec![value]),
        }
        self.size += 1;
    }

    fn clear(&mut self) {
        self.blocks.clear();
        self.size = 0;
    }
}
