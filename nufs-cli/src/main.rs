//! `nufs-image`: a small command-line tool for creating and poking at a
//! `nufs` image directly, independent of any FUSE-style bridge. Useful
//! for manual testing and for the test suite's fixtures.

use std::io::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use nufs_core::{Filesystem, FsError};
use nufs_types::{BLOCKS, INODES};

#[derive(Parser)]
#[command(name = "nufs-image", about = "Inspect and poke at a nufs image file")]
struct Cli {
    /// Path to the image file. Created (and zero-initialized, with a
    /// root directory) if it does not already exist.
    image: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print attributes of a path.
    Stat { path: String },
    /// List a directory's entries.
    Ls { path: String },
    /// Create a directory.
    Mkdir {
        path: String,
        #[arg(long, value_parser = parse_mode, default_value = "755")]
        mode: u32,
    },
    /// Create a regular file.
    Mknod {
        path: String,
        #[arg(long, value_parser = parse_mode, default_value = "644")]
        mode: u32,
    },
    /// Write `data` at `offset` (default 0), creating the file first if
    /// it does not exist.
    Write {
        path: String,
        data: String,
        #[arg(long, default_value_t = 0)]
        offset: u64,
    },
    /// Read up to `len` bytes (default 4096) starting at `offset`
    /// (default 0) and print them to stdout.
    Read {
        path: String,
        #[arg(long, default_value_t = 0)]
        offset: u64,
        #[arg(long, default_value_t = 4096)]
        len: usize,
    },
    /// Remove a file, or a directory with `--dir`.
    Rm {
        path: String,
        #[arg(long)]
        dir: bool,
    },
    /// Add a hard link `to` pointing at the same inode as `from`.
    Link { from: String, to: String },
    /// Rename `from` to `to` (link then unlink).
    Mv { from: String, to: String },
    /// Change a path's mode bits.
    Chmod {
        path: String,
        #[arg(value_parser = parse_mode)]
        mode: u32,
    },
    /// Report inode/block allocator occupancy.
    Df,
}

/// Parses a mode argument the way `chmod`'s numeric form does: an
/// optional `0o` prefix, or a leading `0`, means octal; otherwise
/// decimal. `755`/`0755`/`0o755` are all accepted and mean the same
/// thing.
fn parse_mode(s: &str) -> Result<u32, String> {
    let (digits, radix) = match s.strip_prefix("0o") {
        Some(rest) => (rest, 8),
        None if s.len() > 1 && s.starts_with('0') => (s, 8),
        None => (s, 10),
    };
    u32::from_str_radix(digits, radix).map_err(|e| format!("invalid mode {s:?}: {e}"))
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("nufs-image: {err}");
            ExitCode::from(1)
        }
    }
}

fn run(cli: &Cli) -> Result<(), FsError> {
    let mut fs = Filesystem::mount(&cli.image)?;
    match &cli.command {
        Command::Stat { path } => print_stat(&fs, path)?,
        Command::Ls { path } => list(&fs, path)?,
        Command::Mkdir { path, mode } => fs.mkdir(path, *mode)?,
        Command::Mknod { path, mode } => fs.mknod(path, libc::S_IFREG | *mode)?,
        Command::Write { path, data, offset } => {
            if fs.access(path).is_err() {
                fs.mknod(path, libc::S_IFREG | 0o644)?;
            }
            fs.write(path, data.as_bytes(), *offset)?;
        }
        Command::Read { path, offset, len } => {
            let data = fs.read(path, *offset, *len)?;
            std::io::stdout().write_all(&data).expect("write to stdout");
        }
        Command::Rm { path, dir } => {
            if *dir {
                fs.rmdir(path)?;
            } else {
                fs.unlink(path)?;
            }
        }
        Command::Link { from, to } => fs.link(from, to)?,
        Command::Mv { from, to } => fs.rename(from, to)?,
        Command::Chmod { path, mode } => fs.chmod(path, *mode)?,
        Command::Df => {
            print_occupancy(&fs);
            return Ok(());
        }
    }
    fs.flush()
}

fn print_stat(fs: &Filesystem, path: &str) -> Result<(), FsError> {
    let stat = fs.getattr(path)?;
    println!("ino:     {}", stat.ino.get());
    println!("mode:    {:o}", stat.mode);
    println!("nlink:   {}", stat.nlink);
    println!("uid:     {}", stat.uid);
    println!("gid:     {}", stat.gid);
    println!("size:    {}", stat.size);
    println!("blocks:  {}", stat.blocks);
    println!("blksize: {}", stat.blksize);
    println!("mtime:   {}", stat.mtime);
    Ok(())
}

fn list(fs: &Filesystem, path: &str) -> Result<(), FsError> {
    for (name, ino) in fs.list(path)? {
        println!("{:>4}  {}", ino.get(), name);
    }
    Ok(())
}

fn print_occupancy(fs: &Filesystem) {
    let (used_inodes, used_blocks) = fs.occupancy();
    println!("inodes: {used_inodes}/{INODES}");
    println!("blocks: {used_blocks}/{BLOCKS}");
}
