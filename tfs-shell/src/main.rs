//! tiny-fs shell over a disk image
mod logging;
mod shell;

use tiny_fs::{BlockDevice, FsError, RamDisk, Session, TinyFileSystem, BLOCK_SZ, NUM_BLOCKS};

use clap::{App, Arg};
use log::{info, warn};
use spin::Mutex as SpinMutex;
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Disk image file used as a block device
struct BlockFile(Mutex<File>, usize);

impl BlockFile {
    fn transfer(
        &self,
        block_id: usize,
        f: impl FnOnce(&mut File) -> io::Result<()>,
    ) -> tiny_fs::Result<()> {
        if block_id >= self.1 {
            return Err(FsError::OutOfRange(block_id));
        }
        let mut file = self.0.lock().map_err(|_| FsError::Io(block_id))?;
        file.seek(SeekFrom::Start((block_id * BLOCK_SZ) as u64))
            .and_then(|_| f(&mut *file))
            .map_err(|err| {
                warn!("block {}: {}", block_id, err);
                FsError::Io(block_id)
            })
    }
}

impl BlockDevice for BlockFile {
    fn num_blocks(&self) -> usize {
        self.1
    }

    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> tiny_fs::Result<()> {
        self.transfer(block_id, |file| file.read_exact(buf))
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> tiny_fs::Result<()> {
        self.transfer(block_id, |file| file.write_all(buf))
    }

    fn flush(&self) -> tiny_fs::Result<()> {
        let mut file = self.0.lock().map_err(|_| FsError::Io(0))?;
        file.flush()
            .and_then(|_| file.sync_all())
            .map_err(|_| FsError::Io(0))
    }
}

fn main() {
    if let Err(err) = tiny_fs_shell() {
        eprintln!("tiny-fs: {}", err);
        std::process::exit(1);
    }
}

fn tiny_fs_shell() -> io::Result<()> {
    let matches = App::new("TinyFileSystem shell")
        .arg(
            Arg::with_name("disk")
                .short("d")
                .long("disk")
                .takes_value(true)
                .help("Disk image, created and formatted when missing [default: DISK]"),
        )
        .arg(
            Arg::with_name("memory")
                .short("m")
                .long("memory")
                .conflicts_with("disk")
                .help("Run on a fresh in-memory disk"),
        )
        .arg(
            Arg::with_name("format")
                .short("f")
                .long("format")
                .help("Format the disk image before use"),
        )
        .arg(
            Arg::with_name("script")
                .short("s")
                .long("script")
                .takes_value(true)
                .help("Run commands from a file instead of the prompt"),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .multiple(true)
                .help("Log more, repeat for more detail"),
        )
        .get_matches();
    logging::init(matches.occurrences_of("verbose"));

    let tfs = if matches.is_present("memory") {
        open_fs(Arc::new(RamDisk::new(NUM_BLOCKS)), true)
    } else {
        let path = Path::new(matches.value_of("disk").unwrap_or("DISK"));
        let (image, fresh) = open_image(path)?;
        open_fs(Arc::new(image), fresh || matches.is_present("format"))
    }
    .map_err(fs_to_io)?;

    let mut session = Session::new(&tfs);
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match matches.value_of("script") {
        Some(script) => {
            let reader = BufReader::new(File::open(script)?);
            shell::run(&mut session, reader, &mut out, shell::Mode::Script)?
        }
        None => {
            let stdin = io::stdin();
            shell::run(&mut session, stdin.lock(), &mut out, shell::Mode::Interactive)?
        }
    }
    tfs.lock().unmount().map_err(fs_to_io)?;
    Ok(())
}

/// Open or create the image at `path`, sized to `NUM_BLOCKS` blocks.
/// The flag is set when the image did not exist yet.
fn open_image(path: &Path) -> io::Result<(BlockFile, bool)> {
    let fresh = !path.exists();
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(path)?;
    let expected = (NUM_BLOCKS * BLOCK_SZ) as u64;
    let len = file.metadata()?.len();
    if !fresh && len != expected {
        warn!(
            "disk image {} is {} bytes, resizing to {}",
            path.display(),
            len,
            expected
        );
    }
    file.set_len(expected)?;
    info!("disk image {}", path.display());
    Ok((BlockFile(Mutex::new(file), NUM_BLOCKS), fresh))
}

/// Mount `device`, formatting it first when asked or when it holds no tiny-fs
fn open_fs(
    device: Arc<dyn BlockDevice>,
    format: bool,
) -> tiny_fs::Result<Arc<SpinMutex<TinyFileSystem>>> {
    if format {
        return TinyFileSystem::format(device);
    }
    match TinyFileSystem::mount(Arc::clone(&device)) {
        Err(FsError::NotFormatted) => {
            warn!("no file system on disk, formatting");
            TinyFileSystem::format(device)
        }
        other => other,
    }
}

fn fs_to_io(err: FsError) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err.to_string())
}
