//!An tiny file system on top of a fixed-size block device
//!
//! Layout of a tiny-fs disk:
//! - block 0: superblock, a single bitmap block tracking every block
//! - block 1: root directory
//! - any other block: directory, inode or raw data, allocated on demand
//!
//! Directories and inodes start with a type tag, so the kind of a block
//! referenced from a directory entry is decided by reading the block itself.
#![no_std]
#![deny(missing_docs)]

extern crate alloc;

mod bitmap;
mod block_dev;
mod check;
mod error;
mod layout;
mod tfs;
mod vfs;

/// Size of one block in bytes
pub const BLOCK_SZ: usize = 128;
/// Number of blocks on a default disk, one bitmap block addresses all of them
pub const NUM_BLOCKS: usize = BLOCK_SZ * 8;

pub use bitmap::{Bitmap, BitmapBlock};
pub use block_dev::{BlockDevice, RamDisk};
pub use check::{check, Usage};
pub use error::{FsError, Result};
pub use layout::*;
pub use tfs::TinyFileSystem;
pub use vfs::{DirListing, Session, Stat};
