//! Free-block bitmap kept in the superblock
use super::{Block, BlockDevice, DataBlock, FsError, Result, SuperBlock, BLOCK_SZ, SUPER_BLOCK_ID};

use alloc::sync::Arc;

/// The superblock viewed as 64-bit words, bit `i` stands for block `i`
pub type BitmapBlock = [u64; BLOCK_SZ / 8];

const BLOCK_BITS: usize = BLOCK_SZ * 8;

/// Allocation state of the first `maximum` blocks of a device
pub struct Bitmap {
    maximum: usize,
}

impl Bitmap {
    /// Bitmap over `blocks` blocks, capped at what one block can address
    pub fn new(blocks: usize) -> Self {
        Self {
            maximum: blocks.min(BLOCK_BITS),
        }
    }
    /// Allocate the lowest free block,
    /// `None` once every block below `maximum` is in use
    pub fn alloc(&self, block_device: &Arc<dyn BlockDevice>) -> Result<Option<usize>> {
        let maximum = self.maximum;
        self.modify(block_device, |bitmap_block| {
            let (bits64_pos, inner_pos) = bitmap_block
                .iter()
                .enumerate()
                .find(|(_, bits64)| **bits64 != u64::MAX)
                .map(|(bits64_pos, bits64)| (bits64_pos, bits64.trailing_ones() as usize))?;
            let bit = bits64_pos * 64 + inner_pos;
            if bit >= maximum {
                return None;
            }
            // set 1 to allocate block
            bitmap_block[bits64_pos] |= 1u64 << inner_pos;
            Some(bit)
        })
    }
    /// Deallocate a block
    pub fn dealloc(&self, block_device: &Arc<dyn BlockDevice>, bit: usize) -> Result<()> {
        let (bits64_pos, inner_pos) = self.decomposition(bit)?;
        self.modify(block_device, |bitmap_block| {
            // the bit must be allocated!
            if bitmap_block[bits64_pos] & (1u64 << inner_pos) == 0 {
                return Err(FsError::NotAllocated(bit));
            }
            bitmap_block[bits64_pos] &= !(1u64 << inner_pos);
            Ok(())
        })?
    }
    /// Whether `bit` is marked in use
    pub fn is_allocated(&self, block_device: &Arc<dyn BlockDevice>, bit: usize) -> Result<bool> {
        let (bits64_pos, inner_pos) = self.decomposition(bit)?;
        Ok(self.load(block_device)?[bits64_pos] & (1u64 << inner_pos) != 0)
    }
    /// Count the blocks still free
    pub fn count_free(&self, block_device: &Arc<dyn BlockDevice>) -> Result<usize> {
        let bitmap_block = self.load(block_device)?;
        let used: usize = (0..self.maximum)
            .filter(|bit| bitmap_block[bit / 64] & (1u64 << (bit % 64)) != 0)
            .count();
        Ok(self.maximum - used)
    }
    /// Get the max number of allocatable blocks
    pub fn maximum(&self) -> usize {
        self.maximum
    }
    /// Decomposition `bit` into (bits64_pos, inner_pos)
    fn decomposition(&self, bit: usize) -> Result<(usize, usize)> {
        if bit >= self.maximum {
            return Err(FsError::OutOfRange(bit));
        }
        Ok((bit / 64, bit % 64))
    }

    fn load(&self, block_device: &Arc<dyn BlockDevice>) -> Result<BitmapBlock> {
        let mut raw: DataBlock = [0u8; BLOCK_SZ];
        block_device.read_block(SUPER_BLOCK_ID, &mut raw)?;
        match Block::decode(SUPER_BLOCK_ID, &raw)? {
            Block::Super(super_block) => Ok(super_block.bitmap),
            _ => Err(FsError::Corrupted(SUPER_BLOCK_ID)),
        }
    }

    /// Read-modify-write of the superblock, written back only when `f` changed it
    fn modify<V>(
        &self,
        block_device: &Arc<dyn BlockDevice>,
        f: impl FnOnce(&mut BitmapBlock) -> V,
    ) -> Result<V> {
        let mut bitmap = self.load(block_device)?;
        let before = bitmap;
        let value = f(&mut bitmap);
        if bitmap != before {
            let raw = Block::Super(SuperBlock { bitmap }).encode();
            block_device.write_block(SUPER_BLOCK_ID, &raw)?;
        }
        Ok(value)
    }
}
