//! Block geometry of a device.
//!
//! A device of `size` bytes is split into `ceil(size / block_size)` blocks.
//! Every block is `block_size` long except possibly the last one.

/// One block of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub index: u64,
    pub offset: u64,
    pub len: usize,
}

/// Block segmentation for a device of known size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLayout {
    size: u64,
    block_size: u64,
}

impl BlockLayout {
    /// `block_size` must be non-zero; callers validate it at the config boundary.
    pub fn new(size: u64, block_size: u64) -> Self {
        debug_assert!(block_size > 0, "block size must be non-zero");
        Self { size, block_size }
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    pub fn block_count(&self) -> u64 {
        self.size.div_ceil(self.block_size)
    }

    /// Block at `index`, or `None` past the end of the device.
    pub fn block(&self, index: u64) -> Option<Block> {
        if index >= self.block_count() {
            return None;
        }
        let offset = index * self.block_size;
        let len = (self.size - offset).min(self.block_size) as usize;
        Some(Block { index, offset, len })
    }

    /// All blocks in ascending index order.
    pub fn blocks(&self) -> impl Iterator<Item = Block> + '_ {
        (0..self.block_count()).filter_map(move |i| self.block(i))
    }
}
