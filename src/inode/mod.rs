//! Inodes.
//!
//! An inode describes a single unnamed file or directory. The on-disk
//! structure ([`DiskInode`]) occupies one whole sector and holds the
//! file's length, its kind, and the multi-level list of sectors holding
//! the content.
//!
//! The file system keeps a table of open inodes in memory to provide a
//! place for synchronizing access to inodes used by multiple threads.
//! Opening a sector that is already open returns a handle sharing the
//! existing table entry with its open count bumped; the entry leaves the
//! table when the last handle drops.
//!
//! Removal is deferred: [`Inode::remove`] only marks the entry, and the
//! last close walks the index tree, returns every sector to the free map
//! and purges it from the cache. Handles held across a removal keep
//! reading and writing normally until then.
//!
//! Two locks are involved per inode:
//!
//! * a metadata mutex for the open/removed/deny-write counters, and
//! * a content mutex serializing reads, writes and index growth.
//!
//! [`Inode::lock`] takes the content mutex and returns a [`LockedInode`]
//! so that a caller can perform a multi-step atomic sequence (directory
//! scans, appends) without re-locking per operation. The content mutex of
//! a parent directory is always taken before that of an entry below it;
//! the table lock and the cache lock nest innermost.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::{
    device::BlockDevice,
    error::Error,
    fs::FileSystem,
    repr::{DiskInode, SectorNo},
};

mod content;

/// Book-keeping for one open inode, shared by every handle on it.
pub(crate) struct Shared {
    sector: SectorNo,
    meta: Mutex<Meta>,
    /// Serializes content access; see module docs.
    content: Mutex<()>,
}

struct Meta {
    open_count: u32,
    removed: bool,
    deny_write_count: u32,
}

/// The open-inode table: at most one [`Shared`] per sector.
pub(crate) struct InodeTable {
    open: Mutex<Vec<Arc<Shared>>>,
}

impl InodeTable {
    pub(crate) fn new() -> Self {
        Self {
            open: Mutex::new(Vec::new()),
        }
    }
}

/// Initializes a freshly allocated sector as an inode.
///
/// All pointer slots start out unallocated; no data sectors are claimed
/// until a write reaches them.
pub(crate) fn create_on_disk<D: BlockDevice>(
    fs: &FileSystem<D>,
    sector: SectorNo,
    length: u32,
    is_dir: bool,
) -> Result<(), Error> {
    fs.cache.create(sector)?;
    fs.cache.write_obj(sector, &DiskInode::new(length, is_dir))?;
    Ok(())
}

/// Opens the inode living at `sector`.
///
/// Returns a handle sharing the existing table entry if the inode is
/// already open, otherwise validates the sector and inserts a new entry.
pub(crate) fn open<'fs, D: BlockDevice>(
    fs: &'fs FileSystem<D>,
    sector: SectorNo,
) -> Result<Inode<'fs, D>, Error> {
    let mut open = fs.inodes.open.lock().unwrap();

    if let Some(shared) = open.iter().find(|s| s.sector == sector) {
        shared.meta.lock().unwrap().open_count += 1;
        return Ok(Inode {
            fs,
            shared: Arc::clone(shared),
        });
    }

    let ino: DiskInode = fs.cache.read_obj(sector)?;
    if !ino.magic_ok() {
        return Err(Error::Corrupted { sector });
    }

    let shared = Arc::new(Shared {
        sector,
        meta: Mutex::new(Meta {
            open_count: 1,
            removed: false,
            deny_write_count: 0,
        }),
        content: Mutex::new(()),
    });
    open.push(Arc::clone(&shared));
    Ok(Inode { fs, shared })
}

/// An open handle to an inode.
///
/// Handles for the same sector share one table entry; cloning a handle is
/// another open. Dropping the last handle closes the inode and, if it was
/// removed in the meantime, frees its storage.
pub struct Inode<'fs, D: BlockDevice> {
    fs: &'fs FileSystem<D>,
    shared: Arc<Shared>,
}

impl<'fs, D: BlockDevice> Inode<'fs, D> {
    pub(crate) fn fs(&self) -> &'fs FileSystem<D> {
        self.fs
    }

    /// The inode's home sector, its stable identity.
    #[must_use]
    pub fn sector(&self) -> SectorNo {
        self.shared.sector
    }

    pub fn is_dir(&self) -> Result<bool, Error> {
        let ino: DiskInode = self.fs.cache.read_obj(self.shared.sector)?;
        Ok(ino.is_dir())
    }

    /// Locks the inode's content for a multi-step sequence.
    pub fn lock<'i>(&'i self) -> LockedInode<'fs, 'i, D> {
        LockedInode {
            fs: self.fs,
            shared: &self.shared,
            _guard: self.shared.content.lock().unwrap(),
        }
    }

    /// Marks the inode to be deleted when the last handle closes.
    pub fn remove(&self) {
        self.shared.meta.lock().unwrap().removed = true;
    }

    /// Forbids writes through any handle until a balancing
    /// [`allow_write`](Self::allow_write).
    pub fn deny_write(&self) {
        let mut meta = self.shared.meta.lock().unwrap();
        assert!(meta.deny_write_count < meta.open_count);
        meta.deny_write_count += 1;
    }

    /// Re-permits writes. Must balance a previous
    /// [`deny_write`](Self::deny_write).
    pub fn allow_write(&self) {
        let mut meta = self.shared.meta.lock().unwrap();
        assert!(meta.deny_write_count > 0, "allow_write without deny_write");
        meta.deny_write_count -= 1;
    }

    pub fn length(&self) -> Result<u64, Error> {
        self.lock().length()
    }

    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize, Error> {
        self.lock().read_at(buf, offset)
    }

    pub fn write_at(&self, buf: &[u8], offset: u64) -> Result<usize, Error> {
        self.lock().write_at(buf, offset)
    }

    /// Writes at the current end of file, atomically with respect to
    /// other appenders.
    pub fn append(&self, buf: &[u8]) -> Result<usize, Error> {
        self.lock().append(buf)
    }

    /// Explicit close; equivalent to dropping the handle.
    pub fn close(self) {}
}

impl<D: BlockDevice> Clone for Inode<'_, D> {
    fn clone(&self) -> Self {
        self.shared.meta.lock().unwrap().open_count += 1;
        Self {
            fs: self.fs,
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<D: BlockDevice> Drop for Inode<'_, D> {
    fn drop(&mut self) {
        let mut open = self.fs.inodes.open.lock().unwrap();
        let mut meta = self.shared.meta.lock().unwrap();
        meta.open_count -= 1;
        if meta.open_count > 0 {
            return;
        }
        assert_eq!(
            meta.deny_write_count, 0,
            "deny_write without matching allow_write"
        );
        let removed = meta.removed;
        drop(meta);
        open.retain(|s| s.sector != self.shared.sector);
        // Free storage outside the table lock; nothing references the
        // entry anymore.
        drop(open);

        if removed
            && let Err(err) = content::release(self.fs, self.shared.sector)
        {
            log::error!(
                "leaking sectors of removed inode {}: {err}",
                self.shared.sector
            );
        }
    }
}

/// An inode with its content mutex held.
///
/// Exposes the same content operations as [`Inode`] without re-locking,
/// which is what makes directory scan-then-mutate sequences and appends
/// atomic.
pub struct LockedInode<'fs, 'i, D: BlockDevice> {
    fs: &'fs FileSystem<D>,
    shared: &'i Shared,
    _guard: MutexGuard<'i, ()>,
}

impl<D: BlockDevice> LockedInode<'_, '_, D> {
    #[must_use]
    pub fn sector(&self) -> SectorNo {
        self.shared.sector
    }

    pub fn is_dir(&self) -> Result<bool, Error> {
        let ino: DiskInode = self.fs.cache.read_obj(self.shared.sector)?;
        Ok(ino.is_dir())
    }

    /// Releases the content mutex.
    pub fn unlock(self) {}
}
