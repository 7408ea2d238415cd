mod common;

use std::sync::Arc;

use common::{fresh, ls};
use tiny_fs::{
    check, Block, BlockDevice, BlockId, DirBlock, DirEntry, FsError, RamDisk, Session,
    TinyFileSystem, BLOCK_SZ, NUM_BLOCKS,
};

#[test]
fn blank_device_is_not_formatted() {
    let device: Arc<dyn BlockDevice> = Arc::new(RamDisk::new(16));
    assert_eq!(
        TinyFileSystem::mount(device).err(),
        Some(FsError::NotFormatted)
    );
}

#[test]
fn device_must_hold_root() {
    let device: Arc<dyn BlockDevice> = Arc::new(RamDisk::new(1));
    assert_eq!(
        TinyFileSystem::format(device).err(),
        Some(FsError::DeviceTooSmall)
    );
}

#[test]
fn remount_keeps_tree() {
    let device: Arc<dyn BlockDevice> = Arc::new(RamDisk::new(NUM_BLOCKS));
    {
        let tfs = TinyFileSystem::format(Arc::clone(&device)).unwrap();
        let mut session = Session::new(&tfs);
        session.mkdir("docs").unwrap();
        session.cd("docs").unwrap();
        session.create("note").unwrap();
        session.append("note", &[b'n'; 2 * BLOCK_SZ + 3]).unwrap();
        tfs.lock().unmount().unwrap();
    }
    let tfs = TinyFileSystem::mount(device).unwrap();
    let mut session = Session::new(&tfs);
    assert_eq!(ls(&session), ["docs/"]);
    session.cd("docs").unwrap();
    assert_eq!(session.cat("note").unwrap(), vec![b'n'; 2 * BLOCK_SZ + 3]);
    assert_eq!(tfs.lock().free_blocks().unwrap(), NUM_BLOCKS - 2 - 2 - 3);
}

#[test]
fn disk_size_is_capped_by_bitmap() {
    let (tfs, _session) = fresh(4 * NUM_BLOCKS);
    assert_eq!(tfs.lock().total_blocks(), NUM_BLOCKS);
}

#[test]
fn out_of_range_block_is_an_error() {
    let (tfs, _session) = fresh(8);
    let tfs = tfs.lock();
    let far = BlockId::new(8).unwrap();
    assert_eq!(tfs.read(far), Err(FsError::OutOfRange(8)));
    assert_eq!(
        tfs.write_data(far, &[0u8; BLOCK_SZ]),
        Err(FsError::OutOfRange(8))
    );
}

#[test]
fn reclaim_twice_fails() {
    let (tfs, _session) = fresh(8);
    let mut tfs = tfs.lock();
    let block = tfs.alloc().unwrap();
    tfs.reclaim(block).unwrap();
    assert_eq!(tfs.reclaim(block), Err(FsError::NotAllocated(block.get())));
}

#[test]
fn reclaimed_block_is_zeroed() {
    let (tfs, mut session) = fresh(8);
    let dir = session.mkdir("d").unwrap();
    session.rmdir("d").unwrap();
    let tfs = tfs.lock();
    assert_eq!(tfs.read(dir), Ok(Block::Data([0u8; BLOCK_SZ])));
    assert!(!tfs.is_allocated(dir).unwrap());
}

#[test]
fn check_detects_aliasing() {
    let (tfs, mut session) = fresh(16);
    let a = session.mkdir("a").unwrap();
    session.mkdir("b").unwrap();
    session.cd("b").unwrap();
    session.create("f").unwrap();

    // hand-link `a` into `b` as well
    let tfs = tfs.lock();
    let b = tfs.read_dir(BlockId::ROOT).unwrap().find("b").unwrap();
    let mut dir: DirBlock = tfs.read_dir(b).unwrap();
    dir.entries.push(DirEntry::new("again", a).unwrap()).unwrap();
    tfs.write(b, &Block::Directory(dir)).unwrap();
    assert_eq!(check(&tfs), Err(FsError::Aliased(a.get())));
}

#[test]
fn check_detects_free_but_referenced() {
    let (tfs, mut session) = fresh(16);
    session.create("f").unwrap();
    session.append("f", b"data").unwrap();
    let tfs = tfs.lock();
    let data = tfs.read_inode(BlockId::new(2).unwrap()).unwrap().first_block().unwrap();
    tfs.bitmap.dealloc(&tfs.block_device, data.get()).unwrap();
    assert_eq!(check(&tfs), Err(FsError::Unallocated(data.get())));
    drop(tfs);
    assert_eq!(session.cat("f").unwrap(), b"data");
}

#[test]
fn check_counts_leaks() {
    let (tfs, _session) = fresh(16);
    let mut tfs = tfs.lock();
    tfs.alloc().unwrap();
    let usage = check(&tfs).unwrap();
    assert_eq!(usage.leaked, 1);
    assert_eq!(usage.directories, 1);
    assert_eq!(usage.free_blocks, 13);
}
