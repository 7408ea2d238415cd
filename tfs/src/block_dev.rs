use core::any::Any;

use alloc::vec;
use alloc::vec::Vec;
use spin::Mutex;

use crate::{FsError, Result, BLOCK_SZ};

/// BlockDevice is implemented by outer tiny-fs user
pub trait BlockDevice: Send + Sync + Any {
    /// Number of blocks the device holds
    fn num_blocks(&self) -> usize;
    /// read data from block device, `buf` is exactly one block
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<()>;
    /// write data to block device, `buf` is exactly one block
    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<()>;
    /// Persist anything the device still buffers
    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Block device kept in memory, lost when dropped
pub struct RamDisk {
    data: Mutex<Vec<u8>>,
    num_blocks: usize,
}

impl RamDisk {
    /// Create a zero-filled disk of `num_blocks` blocks
    pub fn new(num_blocks: usize) -> Self {
        Self {
            data: Mutex::new(vec![0u8; num_blocks * BLOCK_SZ]),
            num_blocks,
        }
    }

    fn range(&self, block_id: usize, len: usize) -> Result<core::ops::Range<usize>> {
        if block_id >= self.num_blocks {
            return Err(FsError::OutOfRange(block_id));
        }
        if len != BLOCK_SZ {
            return Err(FsError::Io(block_id));
        }
        let start = block_id * BLOCK_SZ;
        Ok(start..start + BLOCK_SZ)
    }
}

impl BlockDevice for RamDisk {
    fn num_blocks(&self) -> usize {
        self.num_blocks
    }

    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<()> {
        let range = self.range(block_id, buf.len())?;
        buf.copy_from_slice(&self.data.lock()[range]);
        Ok(())
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<()> {
        let range = self.range(block_id, buf.len())?;
        self.data.lock()[range].copy_from_slice(buf);
        Ok(())
    }
}
