use core::cmp::{max, min};
use core::fmt::{self, Debug, Display, Formatter};
use core::num::NonZeroU16;

use alloc::vec::Vec;

use super::{BitmapBlock, FsError, Result, TinyFileSystem, BLOCK_SZ};

/* Some constants */
/// Type tag at the start of every directory block
pub const DIR_MAGIC: u32 = 0xFFFF_FFFF;
/// Type tag at the start of every inode block
pub const INODE_MAGIC: u32 = 0xFFFF_FFFE;
/// The max length of a dir_entry name
pub const NAME_LENGTH_LIMIT: usize = 9;
/// Entries a single directory block can hold
pub const MAX_DIR_ENTRIES: usize = (BLOCK_SZ - HEADER_SZ) / DIR_ENTRY_SZ;
/// Direct data block references in an inode
pub const INODE_DIRECT_COUNT: usize = (BLOCK_SZ - HEADER_SZ) / 2;
/// Largest file an inode can describe
pub const MAX_FILE_SIZE: usize = INODE_DIRECT_COUNT * BLOCK_SZ;

// tag + count/size
const HEADER_SZ: usize = 8;
const DIR_ENTRY_SZ: usize = NAME_LENGTH_LIMIT + 1 + 2; // name + '\0' + block
/// Block number of the superblock, never handed out by the allocator
pub const SUPER_BLOCK_ID: usize = 0;

/// Raw content of a block
pub type DataBlock = [u8; BLOCK_SZ];

/**
    [BlockId_Description]:
    A non-null block number. The on-disk null reference `0` is
    `Option::<BlockId>::None`, and the superblock is not addressable
    through a `BlockId` at all.
*/
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(NonZeroU16);

impl BlockId {
    /// The root directory, present on every formatted disk
    pub const ROOT: BlockId = match NonZeroU16::new(1) {
        Some(id) => BlockId(id),
        None => unreachable!(),
    };

    /// `None` for the null block or a number that does not fit on disk
    pub fn new(block_id: usize) -> Option<Self> {
        u16::try_from(block_id).ok().and_then(NonZeroU16::new).map(BlockId)
    }
    /// Block number on the device
    pub fn get(self) -> usize {
        self.0.get() as usize
    }
    fn from_disk(raw: u16) -> Option<Self> {
        NonZeroU16::new(raw).map(BlockId)
    }
    fn to_disk(id: Option<Self>) -> u16 {
        id.map_or(0, |id| id.0.get())
    }
}

impl Debug for BlockId {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl Display for BlockId {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// What a directory entry points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Directory block
    Directory,
    /// Inode block of a data file
    File,
}

/**
    [FixedVec_Description]:
    Sequence of at most `N` items kept packed in `[0, len)`.
    Slots at or past `len` are always `None`, removal closes the gap
    by shifting the tail left.
*/
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct FixedVec<T: Copy, const N: usize> {
    slots: [Option<T>; N],
    len: usize,
}

impl<T: Copy, const N: usize> FixedVec<T, N> {
    /// Empty sequence
    pub fn new() -> Self {
        Self {
            slots: [None; N],
            len: 0,
        }
    }
    /// Number of items
    pub fn len(&self) -> usize {
        self.len
    }
    /// `true` when no item is stored
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
    /// `true` when another push would fail
    pub fn is_full(&self) -> bool {
        self.len == N
    }
    /// Item at `index`, `None` past the end
    pub fn get(&self, index: usize) -> Option<T> {
        self.slots.get(index).copied().flatten()
    }
    /// Append an item, handing it back if the sequence is full
    pub fn push(&mut self, item: T) -> core::result::Result<(), T> {
        if self.is_full() {
            return Err(item);
        }
        self.slots[self.len] = Some(item);
        self.len += 1;
        Ok(())
    }
    /// Remove the item at `index`, keeping the order of the others
    pub fn remove(&mut self, index: usize) -> Option<T> {
        if index >= self.len {
            return None;
        }
        let item = self.slots[index].take();
        self.slots[index..self.len].rotate_left(1);
        self.len -= 1;
        item
    }
    /// Position of the first item matching `pred`
    pub fn position(&self, mut pred: impl FnMut(&T) -> bool) -> Option<usize> {
        self.iter().position(|item| pred(item))
    }
    /// Items in stored order
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.slots[..self.len].iter().flatten()
    }
    /// Remove every item, returning them in stored order
    pub fn take_all(&mut self) -> Vec<T> {
        let items = self.iter().copied().collect();
        *self = Self::new();
        items
    }
}

impl<T: Copy, const N: usize> Default for FixedVec<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy + Debug, const N: usize> Debug for FixedVec<T, N> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/**
    [SuperBlock_Description]:
    Block 0 holds nothing but the free-block bitmap.
*/
#[derive(Clone, PartialEq, Eq)]
pub struct SuperBlock {
    /// One bit per block, set when the block is in use
    pub bitmap: BitmapBlock,
}

impl Debug for SuperBlock {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let used: u32 = self.bitmap.iter().map(|bits64| bits64.count_ones()).sum();
        f.debug_struct("SuperBlock").field("used_blocks", &used).finish()
    }
}

impl SuperBlock {
    /// Bitmap with only the superblock and the root directory in use
    pub fn initialize() -> Self {
        let mut bitmap: BitmapBlock = Default::default();
        bitmap[0] = 0b11;
        Self { bitmap }
    }

    fn decode(raw: &DataBlock) -> Self {
        let mut bitmap: BitmapBlock = Default::default();
        for (bits64, bytes) in bitmap.iter_mut().zip(raw.chunks_exact(8)) {
            let mut word = [0u8; 8];
            word.copy_from_slice(bytes);
            *bits64 = u64::from_le_bytes(word);
        }
        Self { bitmap }
    }

    fn encode(&self, raw: &mut DataBlock) {
        for (bits64, bytes) in self.bitmap.iter().zip(raw.chunks_exact_mut(8)) {
            bytes.copy_from_slice(&bits64.to_le_bytes());
        }
    }
}

/**
    [DirEntry_Description]:
    A `(name, block)` pair. The name is NUL-padded on disk, so it holds
    at most `NAME_LENGTH_LIMIT` bytes.
*/
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    name: [u8; NAME_LENGTH_LIMIT + 1], // '\0'
    len: u8,
    block: BlockId,
}

impl DirEntry {
    /// `name` must be non-empty, NUL-free and within `NAME_LENGTH_LIMIT`
    pub fn new(name: &str, block: BlockId) -> Result<Self> {
        if name.is_empty() || name.contains('\0') {
            return Err(FsError::InvalidName);
        }
        if name.len() > NAME_LENGTH_LIMIT {
            return Err(FsError::NameTooLong);
        }
        let mut name_bytes = [0u8; NAME_LENGTH_LIMIT + 1];
        name_bytes[..name.len()].copy_from_slice(name.as_bytes());
        Ok(Self {
            name: name_bytes,
            len: name.len() as u8,
            block,
        })
    }

    /// Entry name
    pub fn name(&self) -> &str {
        // validated when the entry was built or decoded
        core::str::from_utf8(&self.name[..self.len as usize]).unwrap_or_default()
    }

    /// Block the entry points at
    pub fn block(&self) -> BlockId {
        self.block
    }

    fn decode(raw: &[u8]) -> Option<Self> {
        let name = &raw[..NAME_LENGTH_LIMIT + 1];
        let len = name.iter().position(|b| *b == 0)?;
        let name = core::str::from_utf8(&name[..len]).ok()?;
        let block = BlockId::from_disk(read_u16(raw, NAME_LENGTH_LIMIT + 1))?;
        Self::new(name, block).ok()
    }

    fn encode(entry: Option<&Self>, raw: &mut [u8]) {
        raw.fill(0);
        if let Some(entry) = entry {
            raw[..NAME_LENGTH_LIMIT + 1].copy_from_slice(&entry.name);
            write_u16(raw, NAME_LENGTH_LIMIT + 1, BlockId::to_disk(Some(entry.block)));
        }
    }
}

impl Debug for DirEntry {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{:?} -> {:?}", self.name(), self.block)
    }
}

/// Entries of one directory, packed in insertion order
pub type DirEntries = FixedVec<DirEntry, MAX_DIR_ENTRIES>;

/**
    [DirBlock_Description]:
    A directory is a single block: tag, entry count, entries.
*/
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirBlock {
    /// Active entries
    pub entries: DirEntries,
}

impl DirBlock {
    /// Empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Block of the entry called `name`
    pub fn find(&self, name: &str) -> Option<BlockId> {
        self.entries
            .iter()
            .find(|entry| entry.name() == name)
            .map(DirEntry::block)
    }

    /// Unlink `name`, closing the gap it leaves behind
    pub fn remove(&mut self, name: &str) -> Option<BlockId> {
        let index = self.entries.position(|entry| entry.name() == name)?;
        self.entries.remove(index).map(|entry| entry.block())
    }

    fn decode(block_no: usize, raw: &DataBlock) -> Result<Self> {
        let count = read_u32(raw, 4) as usize;
        if count > MAX_DIR_ENTRIES {
            return Err(FsError::Corrupted(block_no));
        }
        let mut entries = DirEntries::new();
        for slot in raw[HEADER_SZ..].chunks_exact(DIR_ENTRY_SZ).take(count) {
            let entry = DirEntry::decode(slot).ok_or(FsError::Corrupted(block_no))?;
            entries
                .push(entry)
                .map_err(|_| FsError::Corrupted(block_no))?;
        }
        Ok(Self { entries })
    }

    fn encode(&self, raw: &mut DataBlock) {
        write_u32(raw, 0, DIR_MAGIC);
        write_u32(raw, 4, self.entries.len() as u32);
        for (i, slot) in raw[HEADER_SZ..].chunks_exact_mut(DIR_ENTRY_SZ).enumerate() {
            DirEntry::encode(self.entries.get(i).as_ref(), slot);
        }
    }
}

/// Direct references of an inode; entry `i` holds bytes `[i * BLOCK_SZ, (i + 1) * BLOCK_SZ)`
pub type DirectBlocks = FixedVec<BlockId, INODE_DIRECT_COUNT>;

/**
    [DiskInode_Description]:
    Each data file is described by an inode block:
    its size and up to `INODE_DIRECT_COUNT` direct data blocks.
*/
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiskInode {
    size: usize,
    direct: DirectBlocks,
}

/* Some core methods */
impl DiskInode {
    /// Empty file
    pub fn new() -> Self {
        Self::default()
    }
    /// File size in bytes
    pub fn size(&self) -> usize {
        self.size
    }
    /// Data blocks in file order
    pub fn blocks(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.direct.iter().copied()
    }
    /// First data block, `None` for an empty file
    pub fn first_block(&self) -> Option<BlockId> {
        self.direct.get(0)
    }
    /// Number of data blocks
    pub fn data_blocks(&self) -> usize {
        self.direct.len()
    }
    /// Data blocks that must be allocated to grow the file to `new_size`
    pub fn blocks_num_needed(&self, new_size: usize) -> usize {
        if new_size <= self.size {
            return 0;
        }
        let (start, end) = Self::span(self.size, new_size);
        (start..=end)
            .filter(|index| self.direct.get(*index).is_none())
            .count()
    }
    ///Write `data` past the current end of file
    ///`new_blocks` must hold exactly `blocks_num_needed` fresh blocks
    pub fn append(
        &mut self,
        data: &[u8],
        new_blocks: Vec<BlockId>,
        fs: &TinyFileSystem,
    ) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let new_size = self.size + data.len();
        if new_size > MAX_FILE_SIZE {
            return Err(FsError::FileSizeExceeded);
        }
        let mut new_blocks = new_blocks.into_iter();
        let mut written = 0usize;
        let (start, end) = Self::span(self.size, new_size);
        for index in start..=end {
            // part of this block covered by [size, new_size)
            let block_start = index * BLOCK_SZ;
            let from = max(self.size, block_start) - block_start;
            let to = min(new_size, block_start + BLOCK_SZ) - block_start;
            let (block_id, mut data_block) = match self.direct.get(index) {
                Some(block_id) if from == 0 && to == BLOCK_SZ => (block_id, [0u8; BLOCK_SZ]),
                Some(block_id) => (block_id, fs.read_data(block_id)?),
                None => {
                    let block_id = new_blocks.next().ok_or(FsError::DiskFull)?;
                    self.direct
                        .push(block_id)
                        .map_err(|_| FsError::FileSizeExceeded)?;
                    (block_id, [0u8; BLOCK_SZ])
                }
            };
            data_block[from..to].copy_from_slice(&data[written..written + to - from]);
            fs.write_data(block_id, &data_block)?;
            written += to - from;
        }
        self.size = new_size;
        Ok(())
    }
    ///Read everything from `offset` to the end of file
    pub fn read_at(&self, offset: usize, fs: &TinyFileSystem) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.size.saturating_sub(offset));
        // `direct` always covers exactly `size` bytes
        for (index, block_id) in self.blocks().enumerate().skip(offset / BLOCK_SZ) {
            let block_start = index * BLOCK_SZ;
            let from = max(offset, block_start) - block_start;
            let to = min(BLOCK_SZ, self.size - block_start);
            let data_block = fs.read_data(block_id)?;
            buf.extend_from_slice(&data_block[from..to]);
        }
        Ok(buf)
    }
    ///Clear size to zero and return blocks that should be deallocated
    pub fn clear_size(&mut self) -> Vec<BlockId> {
        self.size = 0;
        self.direct.take_all()
    }
}

/* Some helper methods */
impl DiskInode {
    /// Block indices touched by the byte range `[size, new_size)`, inclusive.
    /// When `new_size` ends on a block boundary the last index is the block
    /// holding the final byte, not the empty one after it.
    fn span(size: usize, new_size: usize) -> (usize, usize) {
        (size / BLOCK_SZ, (new_size - 1) / BLOCK_SZ)
    }

    fn _data_blocks(size: usize) -> usize {
        (size + BLOCK_SZ - 1) / BLOCK_SZ
    }

    fn decode(block_no: usize, raw: &DataBlock) -> Result<Self> {
        let size = read_u32(raw, 4) as usize;
        if size > MAX_FILE_SIZE {
            return Err(FsError::Corrupted(block_no));
        }
        let refs = raw[HEADER_SZ..]
            .chunks_exact(2)
            .map(|bytes| BlockId::from_disk(u16::from_le_bytes([bytes[0], bytes[1]])));
        let mut direct = DirectBlocks::new();
        let mut ended = false;
        for block_id in refs {
            match block_id {
                Some(_) if ended => return Err(FsError::Corrupted(block_no)),
                Some(block_id) => direct
                    .push(block_id)
                    .map_err(|_| FsError::Corrupted(block_no))?,
                None => ended = true,
            }
        }
        if direct.len() != Self::_data_blocks(size) {
            return Err(FsError::Corrupted(block_no));
        }
        Ok(Self { size, direct })
    }

    fn encode(&self, raw: &mut DataBlock) {
        write_u32(raw, 0, INODE_MAGIC);
        write_u32(raw, 4, self.size as u32);
        for (i, bytes) in raw[HEADER_SZ..].chunks_exact_mut(2).enumerate() {
            bytes.copy_from_slice(&BlockId::to_disk(self.direct.get(i)).to_le_bytes());
        }
    }
}

/**
    [Block_Description]:
    A block decoded once at read time. Directories and inodes are
    recognised by their tag; anything else is raw data.
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// Block 0
    Super(SuperBlock),
    /// Tagged directory block
    Directory(DirBlock),
    /// Tagged inode block
    Inode(DiskInode),
    /// Raw file content
    Data(DataBlock),
}

impl Block {
    /// Decode the raw content of block `block_no`
    pub fn decode(block_no: usize, raw: &DataBlock) -> Result<Self> {
        if block_no == SUPER_BLOCK_ID {
            return Ok(Block::Super(SuperBlock::decode(raw)));
        }
        match read_u32(raw, 0) {
            DIR_MAGIC => DirBlock::decode(block_no, raw).map(Block::Directory),
            INODE_MAGIC => DiskInode::decode(block_no, raw).map(Block::Inode),
            _ => Ok(Block::Data(*raw)),
        }
    }

    /// Serialize into one block of bytes
    pub fn encode(&self) -> DataBlock {
        let mut raw = [0u8; BLOCK_SZ];
        match self {
            Block::Super(super_block) => super_block.encode(&mut raw),
            Block::Directory(dir) => dir.encode(&mut raw),
            Block::Inode(inode) => inode.encode(&mut raw),
            Block::Data(data) => raw.copy_from_slice(data),
        }
        raw
    }

    /// Kind of a directory entry target, `None` for superblock and data
    pub fn kind(&self) -> Option<NodeKind> {
        match self {
            Block::Directory(_) => Some(NodeKind::Directory),
            Block::Inode(_) => Some(NodeKind::File),
            _ => None,
        }
    }
}

fn read_u16(raw: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([raw[offset], raw[offset + 1]])
}

fn write_u16(raw: &mut [u8], offset: usize, value: u16) {
    raw[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

fn read_u32(raw: &[u8], offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&raw[offset..offset + 4]);
    u32::from_le_bytes(bytes)
}

fn write_u32(raw: &mut [u8], offset: usize, value: u32) {
    raw[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}
