//! Common utilities for tests
#![allow(dead_code)]

use std::sync::Arc;

use spin::Mutex;
use tiny_fs::{BlockDevice, RamDisk, Session, TinyFileSystem, NUM_BLOCKS};

/// Freshly formatted RAM disk of `blocks` blocks and a session in its root
pub fn fresh(blocks: usize) -> (Arc<Mutex<TinyFileSystem>>, Session) {
    let device: Arc<dyn BlockDevice> = Arc::new(RamDisk::new(blocks));
    let tfs = TinyFileSystem::format(device).unwrap();
    let session = Session::new(&tfs);
    (tfs, session)
}

/// Full-size disk
pub fn fresh_disk() -> (Arc<Mutex<TinyFileSystem>>, Session) {
    fresh(NUM_BLOCKS)
}

pub fn free_blocks(tfs: &Arc<Mutex<TinyFileSystem>>) -> usize {
    tfs.lock().free_blocks().unwrap()
}

/// Entry names as `ls` prints them
pub fn ls(session: &Session) -> Vec<String> {
    session
        .ls()
        .unwrap()
        .iter()
        .map(|entry| entry.to_string())
        .collect()
}

/// Printable payload of `len` random digits
pub fn random_payload(len: usize) -> Vec<u8> {
    (0..len).map(|_| b'0' + rand::random::<u8>() % 10).collect()
}
