//! A small on-disk file system over fixed-size-sector block devices.
//!
//! Five layers, leaves first:
//!
//!   + Device: synchronous sector read/write, supplied by the host.
//!   + Cache: bounded write-back LRU of sector slots; the only caller of
//!     the device.
//!   + Free map: persistent bitmap of allocated sectors.
//!   + Inodes: direct/indirect/double-indirect sector index, on-demand
//!     growth, open-while-removed lifecycle, reading, writing.
//!   + Directories and names: entry tables inside inodes, and `/`-paths
//!     over them.
//!
//! Everything hangs off a [`FileSystem`] context value; there is no
//! global state, so many independent file systems can coexist in one
//! process (tests lean on this with [`MemoryDisk`]-backed instances).
//!
//! ```
//! use sectorfs::{FileSystem, MemoryDisk};
//!
//! let disk = MemoryDisk::new(256);
//! let fs = FileSystem::format(&disk)?;
//! fs.create("/greeting", 0)?;
//! let mut file = fs.open("/greeting")?;
//! file.write(b"hello")?;
//! drop(file);
//! fs.close()?;
//!
//! let fs = FileSystem::mount(&disk)?;
//! let mut buf = [0_u8; 5];
//! fs.open("/greeting")?.read(&mut buf)?;
//! assert_eq!(&buf, b"hello");
//! # Ok::<(), sectorfs::Error>(())
//! ```

mod cache;
mod device;
mod dir;
mod error;
mod file;
mod free_map;
mod fs;
mod inode;
pub mod params;
mod path;
mod repr;

pub use self::{
    device::{BlockDevice, MemoryDisk},
    dir::Dir,
    error::{DiskError, Error},
    file::File,
    fs::FileSystem,
    inode::{Inode, LockedInode},
    repr::{
        FREE_MAP_SECTOR, MAX_FILE_BYTES, NAME_MAX, NUM_DIRECT, PTRS_PER_SECTOR, ROOT_DIR_SECTOR,
        SECTOR_SIZE, SectorNo,
    },
};
