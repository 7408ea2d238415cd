/*!
    Session layer: the commands a shell issues, resolved against a
    current directory that belongs to the session, not to the store.
*/
use super::{
    Block, BlockId, DirBlock, DirEntry, DiskInode, FsError, NodeKind, Result, TinyFileSystem,
    MAX_FILE_SIZE, NAME_LENGTH_LIMIT,
};

use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt::{self, Display, Formatter};
use log::debug;
use spin::Mutex;

/// One line of `ls`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirListing {
    /// Entry name
    pub name: String,
    /// Kind of the referenced block
    pub kind: NodeKind,
}

impl Display for DirListing {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self.kind {
            NodeKind::Directory => write!(f, "{}/", self.name),
            NodeKind::File => write!(f, "{}", self.name),
        }
    }
}

/// Report of `stat`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stat {
    /// A directory and the block holding it
    Directory {
        /// Entry name
        name: String,
        /// Directory block
        block: BlockId,
    },
    /// A data file
    File {
        /// Inode block
        inode: BlockId,
        /// Bytes in file
        size: usize,
        /// Inode block plus data blocks
        blocks: usize,
        /// First data block, `None` when the file is empty
        first_block: Option<BlockId>,
    },
}

impl Display for Stat {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Stat::Directory { name, block } => {
                writeln!(f, "Directory name: {}/", name)?;
                write!(f, "Directory block: {}", block)
            }
            Stat::File {
                inode,
                size,
                blocks,
                first_block,
            } => {
                writeln!(f, "Inode block: {}", inode)?;
                writeln!(f, "Bytes in file: {}", size)?;
                writeln!(f, "Number of blocks: {}", blocks)?;
                write!(f, "First block: {}", first_block.map_or(0, BlockId::get))
            }
        }
    }
}

///A shell session over a mounted tiny-fs
pub struct Session {
    fs: Arc<Mutex<TinyFileSystem>>,
    cwd: BlockId,
}

/*
    Shell commands. Each one holds the store lock from its first read to
    its last write, and runs every check before the first write.
*/
impl Session {
    ///Open a session in the root directory
    pub fn new(fs: &Arc<Mutex<TinyFileSystem>>) -> Self {
        Self {
            fs: Arc::clone(fs),
            cwd: BlockId::ROOT,
        }
    }
    ///Current directory block
    pub fn cwd(&self) -> BlockId {
        self.cwd
    }
    ///Store shared by every session on this disk
    pub fn fs(&self) -> &Arc<Mutex<TinyFileSystem>> {
        &self.fs
    }
    ///Make an empty directory in the current directory
    pub fn mkdir(&mut self, name: &str) -> Result<BlockId> {
        let mut fs = self.fs.lock();
        let block_id = self.link(&mut fs, name, Block::Directory(DirBlock::new()))?;
        debug!("mkdir {} -> block {}", name, block_id);
        Ok(block_id)
    }
    ///Make an empty data file in the current directory
    pub fn create(&mut self, name: &str) -> Result<BlockId> {
        let mut fs = self.fs.lock();
        let block_id = self.link(&mut fs, name, Block::Inode(DiskInode::new()))?;
        debug!("create {} -> block {}", name, block_id);
        Ok(block_id)
    }
    ///Move into a subdirectory of the current directory
    pub fn cd(&mut self, name: &str) -> Result<()> {
        let fs = self.fs.lock();
        self.cwd = self.lookup(&fs, name, NodeKind::Directory)?;
        debug!("cd {} -> block {}", name, self.cwd);
        Ok(())
    }
    ///Move back to the root directory
    pub fn home(&mut self) {
        self.cwd = BlockId::ROOT;
    }
    ///Remove an empty directory
    pub fn rmdir(&mut self, name: &str) -> Result<()> {
        let mut fs = self.fs.lock();
        let block_id = self.lookup(&fs, name, NodeKind::Directory)?;
        if !fs.read_dir(block_id)?.entries.is_empty() {
            return Err(FsError::DirectoryNotEmpty);
        }
        self.unlink(&fs, name)?;
        fs.reclaim(block_id)?;
        debug!("rmdir {} (block {})", name, block_id);
        Ok(())
    }
    ///List the current directory in entry order
    pub fn ls(&self) -> Result<Vec<DirListing>> {
        let fs = self.fs.lock();
        fs.read_dir(self.cwd)?
            .entries
            .iter()
            .map(|entry| {
                Ok(DirListing {
                    name: entry.name().to_string(),
                    kind: fs.kind_of(entry.block())?,
                })
            })
            .collect()
    }
    ///Append `data` to the end of a data file, all or nothing
    pub fn append(&mut self, name: &str, data: &[u8]) -> Result<()> {
        let mut fs = self.fs.lock();
        let inode_id = self.lookup(&fs, name, NodeKind::File)?;
        let mut inode = fs.read_inode(inode_id)?;
        let new_size = inode
            .size()
            .checked_add(data.len())
            .filter(|size| *size <= MAX_FILE_SIZE)
            .ok_or(FsError::FileSizeExceeded)?;
        if data.is_empty() {
            return Ok(());
        }
        let needed = inode.blocks_num_needed(new_size);
        if needed > fs.free_blocks()? {
            return Err(FsError::DiskFull);
        }
        let new_blocks = (0..needed)
            .map(|_| fs.alloc())
            .collect::<Result<Vec<_>>>()?;
        inode.append(data, new_blocks, &fs)?;
        fs.write(inode_id, &Block::Inode(inode))?;
        debug!(
            "append {} bytes to {}, size now {}, {} new blocks",
            data.len(),
            name,
            new_size,
            needed
        );
        Ok(())
    }
    ///Whole content of a data file
    pub fn cat(&self, name: &str) -> Result<Vec<u8>> {
        let fs = self.fs.lock();
        let inode = fs.read_inode(self.lookup(&fs, name, NodeKind::File)?)?;
        inode.read_at(0, &fs)
    }
    ///Last `n` bytes of a data file, the whole file when `n` covers it
    pub fn tail(&self, name: &str, n: usize) -> Result<Vec<u8>> {
        let fs = self.fs.lock();
        let inode = fs.read_inode(self.lookup(&fs, name, NodeKind::File)?)?;
        inode.read_at(inode.size().saturating_sub(n), &fs)
    }
    ///Remove a data file and every block it owns
    pub fn rm(&mut self, name: &str) -> Result<()> {
        let mut fs = self.fs.lock();
        let inode_id = self.lookup(&fs, name, NodeKind::File)?;
        let mut inode = fs.read_inode(inode_id)?;
        self.unlink(&fs, name)?;
        // data blocks go back before the inode that lists them
        for block_id in inode.clear_size() {
            fs.reclaim(block_id)?;
        }
        fs.reclaim(inode_id)?;
        debug!("rm {} (inode {})", name, inode_id);
        Ok(())
    }
    ///Describe a file or directory of the current directory
    pub fn stat(&self, name: &str) -> Result<Stat> {
        let fs = self.fs.lock();
        let (block_id, kind) = self.find(&fs, name)?.ok_or(FsError::NotFound)?;
        Ok(match kind {
            NodeKind::Directory => Stat::Directory {
                name: name.to_string(),
                block: block_id,
            },
            NodeKind::File => {
                let inode = fs.read_inode(block_id)?;
                Stat::File {
                    inode: block_id,
                    size: inode.size(),
                    blocks: 1 + inode.data_blocks(),
                    first_block: inode.first_block(),
                }
            }
        })
    }
}

/* tiny-fs users tend not to use the following methods directly */
impl Session {
    ///Find `name` in the current directory along with its kind
    fn find(&self, fs: &TinyFileSystem, name: &str) -> Result<Option<(BlockId, NodeKind)>> {
        match fs.read_dir(self.cwd)?.find(name) {
            Some(block_id) => Ok(Some((block_id, fs.kind_of(block_id)?))),
            None => Ok(None),
        }
    }
    ///Find `name` and require it to be of `kind`
    fn lookup(&self, fs: &TinyFileSystem, name: &str, kind: NodeKind) -> Result<BlockId> {
        match self.find(fs, name)? {
            None => Err(FsError::NotFound),
            Some((_, found)) if found != kind => Err(FsError::WrongType { found }),
            Some((block_id, _)) => Ok(block_id),
        }
    }
    ///Allocate a block for `node`, persist it, then add it to the current directory
    fn link(&self, fs: &mut TinyFileSystem, name: &str, node: Block) -> Result<BlockId> {
        // NUL pads names on disk
        if name.is_empty() || name.contains('\0') {
            return Err(FsError::InvalidName);
        }
        if name.len() > NAME_LENGTH_LIMIT {
            return Err(FsError::NameTooLong);
        }
        if self.find(fs, name)?.is_some() {
            return Err(FsError::AlreadyExists);
        }
        let mut dir = fs.read_dir(self.cwd)?;
        if dir.entries.is_full() {
            return Err(FsError::DirectoryFull);
        }
        let block_id = fs.alloc()?;
        // child first, so the parent never points at garbage
        fs.write(block_id, &node)?;
        dir.entries
            .push(DirEntry::new(name, block_id)?)
            .map_err(|_| FsError::DirectoryFull)?;
        fs.write(self.cwd, &Block::Directory(dir))?;
        Ok(block_id)
    }
    ///Drop `name` from the current directory
    fn unlink(&self, fs: &TinyFileSystem, name: &str) -> Result<BlockId> {
        let mut dir = fs.read_dir(self.cwd)?;
        let block_id = dir.remove(name).ok_or(FsError::NotFound)?;
        fs.write(self.cwd, &Block::Directory(dir))?;
        Ok(block_id)
    }
}
