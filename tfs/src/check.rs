//! Consistency check of a mounted tiny-fs
use super::{Block, BlockId, FsError, Result, TinyFileSystem};

use alloc::collections::BTreeSet;
use alloc::vec;
use log::debug;

/// What a successful check found on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Usage {
    /// Directories, the root included
    pub directories: usize,
    /// Data files
    pub files: usize,
    /// Data blocks owned by files
    pub data_blocks: usize,
    /// Blocks the allocator can hand out
    pub free_blocks: usize,
    /// Blocks marked in use that nothing references
    pub leaked: usize,
}

/// Walk the tree from the root and verify that every reachable block is
/// referenced exactly once and marked in use.
pub fn check(fs: &TinyFileSystem) -> Result<Usage> {
    let mut usage = Usage::default();
    let mut seen = BTreeSet::new();
    let mut claim = |block_id: BlockId| -> Result<()> {
        if !seen.insert(block_id) {
            return Err(FsError::Aliased(block_id.get()));
        }
        if !fs.is_allocated(block_id)? {
            return Err(FsError::Unallocated(block_id.get()));
        }
        Ok(())
    };
    claim(BlockId::ROOT)?;
    let mut pending = vec![BlockId::ROOT];
    while let Some(block_id) = pending.pop() {
        match fs.read(block_id)? {
            Block::Directory(dir) => {
                usage.directories += 1;
                for entry in dir.entries.iter() {
                    claim(entry.block())?;
                    pending.push(entry.block());
                }
            }
            Block::Inode(inode) => {
                usage.files += 1;
                for data_block in inode.blocks() {
                    claim(data_block)?;
                    usage.data_blocks += 1;
                }
            }
            _ => return Err(FsError::Corrupted(block_id.get())),
        }
    }
    usage.free_blocks = fs.free_blocks()?;
    // superblock + everything reachable
    let used = fs.total_blocks() - usage.free_blocks;
    let reachable = 1 + usage.directories + usage.files + usage.data_blocks;
    usage.leaked = used.saturating_sub(reachable);
    debug!("check: {:?}", usage);
    Ok(usage)
}
