mod common;

use common::{free_blocks, fresh, fresh_disk, ls, random_payload};
use tiny_fs::{check, BlockId, FsError, NodeKind, Stat, BLOCK_SZ, MAX_FILE_SIZE};

#[test]
fn hello_round_trip() {
    let (_tfs, mut session) = fresh_disk();
    session.create("greeting").unwrap();
    session.append("greeting", b"hello").unwrap();
    assert_eq!(session.cat("greeting").unwrap(), b"hello");
}

#[test]
fn new_file_is_empty() {
    let (tfs, mut session) = fresh_disk();
    let inode = session.create("f").unwrap();
    assert!(session.cat("f").unwrap().is_empty());
    assert!(session.tail("f", 3).unwrap().is_empty());
    assert_eq!(
        session.stat("f").unwrap(),
        Stat::File {
            inode,
            size: 0,
            blocks: 1,
            first_block: None,
        }
    );
    // only the inode was allocated
    assert_eq!(free_blocks(&tfs), tiny_fs::NUM_BLOCKS - 3);
}

#[test]
fn empty_append_touches_nothing() {
    let (tfs, mut session) = fresh_disk();
    session.create("f").unwrap();
    let free = free_blocks(&tfs);
    session.append("f", b"").unwrap();
    assert_eq!(free_blocks(&tfs), free);
    match session.stat("f").unwrap() {
        Stat::File { size, blocks, .. } => assert_eq!((size, blocks), (0, 1)),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn three_appends_across_block_boundaries() {
    let (_tfs, mut session) = fresh_disk();
    session.create("f").unwrap();
    let parts = [
        random_payload(BLOCK_SZ / 3),
        random_payload(3 * BLOCK_SZ + 17),
        random_payload(BLOCK_SZ / 2),
    ];
    let mut expected = Vec::new();
    for part in parts.iter() {
        session.append("f", part).unwrap();
        expected.extend_from_slice(part);
        assert_eq!(session.cat("f").unwrap(), expected);
    }
    let blocks = (expected.len() + BLOCK_SZ - 1) / BLOCK_SZ;
    match session.stat("f").unwrap() {
        Stat::File {
            size,
            blocks: total,
            first_block,
            ..
        } => {
            assert_eq!(size, expected.len());
            assert_eq!(total, 1 + blocks);
            assert!(first_block.is_some());
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn appends_landing_on_boundaries() {
    let (tfs, mut session) = fresh_disk();
    session.create("f").unwrap();
    let mut expected = Vec::new();
    // exact block, then starting at offset 0 of a new block, then spanning
    for len in [BLOCK_SZ, BLOCK_SZ, 1, BLOCK_SZ - 1, 2 * BLOCK_SZ + 5, BLOCK_SZ - 5] {
        let part = random_payload(len);
        session.append("f", &part).unwrap();
        expected.extend_from_slice(&part);
        assert_eq!(session.cat("f").unwrap(), expected);
    }
    assert_eq!(expected.len(), 6 * BLOCK_SZ);
    let usage = check(&tfs.lock()).unwrap();
    assert_eq!(usage.data_blocks, 6);
    assert_eq!(usage.leaked, 0);
}

#[test]
fn random_sized_appends() {
    let (_tfs, mut session) = fresh_disk();
    session.create("f").unwrap();
    let mut expected = Vec::new();
    loop {
        let len = rand::random::<usize>() % (3 * BLOCK_SZ) + 1;
        if expected.len() + len > MAX_FILE_SIZE {
            break;
        }
        let part = random_payload(len);
        session.append("f", &part).unwrap();
        expected.extend_from_slice(&part);
    }
    assert_eq!(session.cat("f").unwrap(), expected);
}

#[test]
fn max_file_size_is_enforced() {
    let (tfs, mut session) = fresh_disk();
    session.create("big").unwrap();
    let payload = random_payload(MAX_FILE_SIZE);
    session.append("big", &payload[..MAX_FILE_SIZE - 1]).unwrap();
    session.append("big", &payload[MAX_FILE_SIZE - 1..]).unwrap();
    let free = free_blocks(&tfs);

    assert_eq!(session.append("big", b"!"), Err(FsError::FileSizeExceeded));
    assert_eq!(free_blocks(&tfs), free);
    assert_eq!(session.cat("big").unwrap(), payload);
    match session.stat("big").unwrap() {
        Stat::File { size, blocks, .. } => {
            assert_eq!(size, MAX_FILE_SIZE);
            assert_eq!(blocks, 1 + MAX_FILE_SIZE / BLOCK_SZ);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn oversized_single_append_is_rejected() {
    let (tfs, mut session) = fresh_disk();
    session.create("f").unwrap();
    session.append("f", b"abc").unwrap();
    let free = free_blocks(&tfs);
    let payload = vec![b'x'; MAX_FILE_SIZE];
    assert_eq!(session.append("f", &payload), Err(FsError::FileSizeExceeded));
    assert_eq!(session.cat("f").unwrap(), b"abc");
    assert_eq!(free_blocks(&tfs), free);
}

#[test]
fn append_fails_whole_when_disk_is_short() {
    // superblock, root, inode and three free blocks
    let (tfs, mut session) = fresh(6);
    session.create("f").unwrap();
    session.append("f", b"12345").unwrap();
    assert_eq!(free_blocks(&tfs), 2);

    // needs the tail of block 0 plus three new blocks
    let payload = random_payload(3 * BLOCK_SZ);
    assert_eq!(session.append("f", &payload), Err(FsError::DiskFull));
    assert_eq!(free_blocks(&tfs), 2);
    assert_eq!(session.cat("f").unwrap(), b"12345");

    // two new blocks is exactly what is left
    let payload = random_payload(2 * BLOCK_SZ);
    session.append("f", &payload).unwrap();
    assert_eq!(free_blocks(&tfs), 0);
    let mut expected = b"12345".to_vec();
    expected.extend_from_slice(&payload);
    assert_eq!(session.cat("f").unwrap(), expected);
}

#[test]
fn tail_matches_cat_when_n_covers_file() {
    let (_tfs, mut session) = fresh_disk();
    session.create("f").unwrap();
    let payload = random_payload(2 * BLOCK_SZ + 40);
    session.append("f", &payload).unwrap();
    let whole = session.cat("f").unwrap();
    assert_eq!(session.tail("f", payload.len()).unwrap(), whole);
    assert_eq!(session.tail("f", payload.len() + 1000).unwrap(), whole);
}

#[test]
fn tail_from_inside_blocks() {
    let (_tfs, mut session) = fresh_disk();
    session.create("f").unwrap();
    let payload = random_payload(3 * BLOCK_SZ + 7);
    session.append("f", &payload).unwrap();
    for n in [0, 1, 7, 8, BLOCK_SZ, BLOCK_SZ + 7, 2 * BLOCK_SZ + 100] {
        let tail = session.tail("f", n).unwrap();
        assert_eq!(tail, &payload[payload.len() - n..], "tail {}", n);
    }
}

#[test]
fn tail_starting_on_block_boundaries() {
    let (_tfs, mut session) = fresh_disk();
    session.create("f").unwrap();
    let payload = random_payload(4 * BLOCK_SZ);
    session.append("f", &payload).unwrap();
    for blocks in 0..=4 {
        let n = blocks * BLOCK_SZ;
        let tail = session.tail("f", n).unwrap();
        assert_eq!(tail, &payload[payload.len() - n..], "tail {}", n);
    }
    assert_eq!(session.tail("f", BLOCK_SZ - 1).unwrap(), &payload[3 * BLOCK_SZ + 1..]);
}

#[test]
fn file_commands_reject_directories() {
    let (_tfs, mut session) = fresh_disk();
    session.mkdir("d").unwrap();
    let wrong = Err(FsError::WrongType {
        found: NodeKind::Directory,
    });
    assert_eq!(session.append("d", b"x"), wrong);
    assert_eq!(session.rm("d"), wrong);
    assert_eq!(session.cat("d").map(|_| ()), wrong);
    assert_eq!(session.tail("d", 1).map(|_| ()), wrong);
    assert_eq!(ls(&session), ["d/"]);
}

#[test]
fn file_commands_report_missing_names() {
    let (_tfs, mut session) = fresh_disk();
    assert_eq!(session.append("x", b"1"), Err(FsError::NotFound));
    assert_eq!(session.cat("x"), Err(FsError::NotFound));
    assert_eq!(session.tail("x", 1), Err(FsError::NotFound));
    assert_eq!(session.rm("x"), Err(FsError::NotFound));
    assert_eq!(session.stat("x"), Err(FsError::NotFound));
}

#[test]
fn rm_reclaims_every_block() {
    let (tfs, mut session) = fresh_disk();
    let before = free_blocks(&tfs);
    let inode = session.create("f").unwrap();
    session.create("g").unwrap();
    session.append("f", &random_payload(5 * BLOCK_SZ + 1)).unwrap();
    assert_eq!(free_blocks(&tfs), before - 2 - 6);

    session.rm("f").unwrap();
    assert_eq!(free_blocks(&tfs), before - 1);
    assert_eq!(ls(&session), ["g"]);
    assert_eq!(session.cat("f"), Err(FsError::NotFound));
    // the freed inode is the lowest free block again
    assert_eq!(session.create("h").unwrap(), inode);
    assert!(session.cat("h").unwrap().is_empty());
}

#[test]
fn stat_reports_first_block() {
    let (_tfs, mut session) = fresh_disk();
    let inode = session.create("f").unwrap();
    session.append("f", &[b'a'; BLOCK_SZ + 1]).unwrap();
    assert_eq!(
        session.stat("f").unwrap(),
        Stat::File {
            inode,
            size: BLOCK_SZ + 1,
            blocks: 3,
            first_block: BlockId::new(inode.get() + 1),
        }
    );
    assert_eq!(
        session.stat("f").unwrap().to_string(),
        format!(
            "Inode block: {}\nBytes in file: {}\nNumber of blocks: 3\nFirst block: {}",
            inode,
            BLOCK_SZ + 1,
            inode.get() + 1
        )
    );
}
