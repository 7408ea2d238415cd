/*!
    The TinyFileSystem is the block store under every session:
    it owns the device and the free-block bitmap, and moves whole
    blocks between the device and their decoded form.
*/
use super::{
    Bitmap, Block, BlockDevice, BlockId, DataBlock, DirBlock, DiskInode, FsError, NodeKind,
    Result, SuperBlock, BLOCK_SZ, SUPER_BLOCK_ID,
};

use alloc::sync::Arc;
use log::{debug, trace, warn};
use spin::Mutex;

///An tiny filesystem on block
pub struct TinyFileSystem {
    ///Real device that implemented BlockDevice
    pub block_device: Arc<dyn BlockDevice>,
    ///Free-block bitmap
    pub bitmap: Bitmap,
}

/* core methods */
impl TinyFileSystem {
    ///Create a filesystem on block device, wiping everything on it
    pub fn format(block_device: Arc<dyn BlockDevice>) -> Result<Arc<Mutex<Self>>> {
        let tfs = Self::new(block_device)?;
        let zero: DataBlock = [0u8; BLOCK_SZ];
        for block_no in 0..tfs.total_blocks() {
            tfs.block_device.write_block(block_no, &zero)?;
        }
        tfs.write_raw(SUPER_BLOCK_ID, &Block::Super(SuperBlock::initialize()))?;
        tfs.write(BlockId::ROOT, &Block::Directory(DirBlock::new()))?;
        tfs.block_device.flush()?;
        debug!("formatted {} blocks", tfs.total_blocks());
        Ok(Arc::new(Mutex::new(tfs)))
    }
    ///Open a block device as a filesystem
    ///This function is often more commonly used than `format`
    pub fn mount(block_device: Arc<dyn BlockDevice>) -> Result<Arc<Mutex<Self>>> {
        let tfs = Self::new(block_device)?;
        let reserved = tfs.bitmap.is_allocated(&tfs.block_device, SUPER_BLOCK_ID)?
            && tfs.bitmap.is_allocated(&tfs.block_device, BlockId::ROOT.get())?;
        let root_ok = matches!(tfs.kind_of(BlockId::ROOT), Ok(NodeKind::Directory));
        if !reserved || !root_ok {
            warn!("mount rejected: no tiny-fs superblock or root directory");
            return Err(FsError::NotFormatted);
        }
        debug!(
            "mounted {} blocks, {} free",
            tfs.total_blocks(),
            tfs.free_blocks()?
        );
        Ok(Arc::new(Mutex::new(tfs)))
    }
    ///Flush the device, the store must not be used afterwards
    pub fn unmount(&self) -> Result<()> {
        debug!("unmount");
        self.block_device.flush()
    }
    ///Allocate a free block
    pub fn alloc(&mut self) -> Result<BlockId> {
        let bit = self
            .bitmap
            .alloc(&self.block_device)?
            .ok_or(FsError::DiskFull)?;
        let block_id = BlockId::new(bit).ok_or(FsError::Corrupted(SUPER_BLOCK_ID))?;
        trace!("alloc block {}", block_id);
        Ok(block_id)
    }
    ///Zero a block and return it to the free pool
    pub fn reclaim(&mut self, block_id: BlockId) -> Result<()> {
        if !self.is_allocated(block_id)? {
            return Err(FsError::NotAllocated(block_id.get()));
        }
        self.write_data(block_id, &[0u8; BLOCK_SZ])?;
        self.bitmap.dealloc(&self.block_device, block_id.get())?;
        trace!("reclaim block {}", block_id);
        Ok(())
    }
    ///Blocks the allocator can still hand out
    pub fn free_blocks(&self) -> Result<usize> {
        self.bitmap.count_free(&self.block_device)
    }
    ///Whether `block_id` is marked in use
    pub fn is_allocated(&self, block_id: BlockId) -> Result<bool> {
        self.bitmap.is_allocated(&self.block_device, block_id.get())
    }
    ///Blocks managed by this filesystem
    pub fn total_blocks(&self) -> usize {
        self.bitmap.maximum()
    }
}

/* block access */
impl TinyFileSystem {
    ///Read and decode a block
    pub fn read(&self, block_id: BlockId) -> Result<Block> {
        let raw = self.read_raw(block_id.get())?;
        Block::decode(block_id.get(), &raw)
    }
    ///Encode and write a block
    pub fn write(&self, block_id: BlockId, block: &Block) -> Result<()> {
        self.write_raw(block_id.get(), block)
    }
    ///Read a block that must be a directory
    pub fn read_dir(&self, block_id: BlockId) -> Result<DirBlock> {
        match self.read(block_id)? {
            Block::Directory(dir) => Ok(dir),
            _ => Err(FsError::Corrupted(block_id.get())),
        }
    }
    ///Read a block that must be an inode
    pub fn read_inode(&self, block_id: BlockId) -> Result<DiskInode> {
        match self.read(block_id)? {
            Block::Inode(inode) => Ok(inode),
            _ => Err(FsError::Corrupted(block_id.get())),
        }
    }
    ///Read a data block without interpreting its content
    pub fn read_data(&self, block_id: BlockId) -> Result<DataBlock> {
        self.read_raw(block_id.get())
    }
    ///Write raw file content
    pub fn write_data(&self, block_id: BlockId, data: &DataBlock) -> Result<()> {
        self.check_range(block_id.get())?;
        self.block_device.write_block(block_id.get(), data)
    }
    ///Kind of a block referenced from a directory entry
    pub fn kind_of(&self, block_id: BlockId) -> Result<NodeKind> {
        self.read(block_id)?
            .kind()
            .ok_or(FsError::Corrupted(block_id.get()))
    }
}

/* helper methods */
impl TinyFileSystem {
    fn new(block_device: Arc<dyn BlockDevice>) -> Result<Self> {
        let blocks = block_device.num_blocks();
        if blocks <= BlockId::ROOT.get() {
            return Err(FsError::DeviceTooSmall);
        }
        Ok(Self {
            bitmap: Bitmap::new(blocks),
            block_device,
        })
    }

    fn check_range(&self, block_no: usize) -> Result<()> {
        if block_no >= self.total_blocks() {
            return Err(FsError::OutOfRange(block_no));
        }
        Ok(())
    }

    fn read_raw(&self, block_no: usize) -> Result<DataBlock> {
        self.check_range(block_no)?;
        let mut raw: DataBlock = [0u8; BLOCK_SZ];
        self.block_device.read_block(block_no, &mut raw)?;
        Ok(raw)
    }

    fn write_raw(&self, block_no: usize, block: &Block) -> Result<()> {
        self.check_range(block_no)?;
        self.block_device.write_block(block_no, &block.encode())
    }
}
