use thiserror::Error;

use crate::NodeKind;

/// Every way a tiny-fs operation can fail.
///
/// Each command validates before it writes, so an error leaves the disk and
/// the session exactly as they were.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FsError {
    /// Name longer than `NAME_LENGTH_LIMIT`
    #[error("File name is too long")]
    NameTooLong,
    /// Empty name
    #[error("File name is empty")]
    InvalidName,
    /// Name already used in the current directory
    #[error("File exists")]
    AlreadyExists,
    /// No entry with that name in the current directory
    #[error("File does not exist")]
    NotFound,
    /// Entry exists but is of the other kind
    #[error("{}", wrong_type(.found))]
    WrongType {
        /// Kind of the block that was found
        found: NodeKind,
    },
    /// Current directory already holds `MAX_DIR_ENTRIES`
    #[error("Directory is full")]
    DirectoryFull,
    /// rmdir on a directory with entries
    #[error("Directory is not empty")]
    DirectoryNotEmpty,
    /// No free block left for the request
    #[error("Disk is full")]
    DiskFull,
    /// Append would grow the file past `MAX_FILE_SIZE`
    #[error("Append exceeds maximum file size")]
    FileSizeExceeded,
    /// Block number outside of the mounted disk
    #[error("Block {0} is out of range")]
    OutOfRange(usize),
    /// The block device failed to transfer a block
    #[error("I/O error on block {0}")]
    Io(usize),
    /// Block content violates the on-disk format
    #[error("Block {0} is corrupted")]
    Corrupted(usize),
    /// Reclaim of a block that is already free
    #[error("Block {0} is not allocated")]
    NotAllocated(usize),
    /// Superblock or root directory missing
    #[error("Block device does not hold a tiny-fs file system")]
    NotFormatted,
    /// Device cannot even hold the superblock and the root directory
    #[error("Block device is too small")]
    DeviceTooSmall,
    /// Block reachable from more than one directory entry
    #[error("Block {0} is referenced more than once")]
    Aliased(usize),
    /// Reachable block whose bitmap bit is clear
    #[error("Block {0} is in use but marked free")]
    Unallocated(usize),
}

fn wrong_type(found: &NodeKind) -> &'static str {
    match found {
        NodeKind::Directory => "File is a directory",
        NodeKind::File => "File is not a directory",
    }
}

/// Result type of every tiny-fs operation
pub type Result<T> = core::result::Result<T, FsError>;
