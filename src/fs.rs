//! The file system context and its top-level operations.
//!
//! A [`FileSystem`] owns the buffer cache, the free map, and the open
//! inode table for one block device. There is no global state: tests and
//! hosts instantiate as many independent file systems as they like, each
//! over its own device.

use log::debug;

use crate::{
    cache::BlockCache,
    device::BlockDevice,
    dir::Dir,
    error::Error,
    file::File,
    free_map::FreeMap,
    inode::{self, Inode, InodeTable},
    params::CACHE_SLOTS,
    path,
    repr::{FREE_MAP_SECTOR, MAX_FILE_BYTES, ROOT_DIR_SECTOR, SECTOR_SIZE},
};

pub struct FileSystem<D: BlockDevice> {
    pub(crate) cache: BlockCache<D>,
    pub(crate) free_map: FreeMap,
    pub(crate) inodes: InodeTable,
}

impl<D: BlockDevice> FileSystem<D> {
    /// Formats `device` with an empty root directory and returns the
    /// running file system.
    ///
    /// Overwrites whatever the device held before.
    pub fn format(device: D) -> Result<Self, Error> {
        let sectors = device.sector_count();
        assert!(sectors >= 4, "device too small to format");
        debug!("formatting {sectors} sectors of {SECTOR_SIZE} bytes");

        let fs = Self {
            cache: BlockCache::new(device, CACHE_SLOTS),
            free_map: FreeMap::new_formatted(sectors),
            inodes: InodeTable::new(),
        };
        inode::create_on_disk(
            &fs,
            FREE_MAP_SECTOR,
            FreeMap::file_length(sectors),
            false,
        )?;
        inode::create_on_disk(&fs, ROOT_DIR_SECTOR, 0, true)?;

        // The first write hands the bitmap file its own data sectors;
        // the second records those very allocations.
        fs.write_free_map()?;
        fs.write_free_map()?;
        fs.cache.flush()?;
        Ok(fs)
    }

    /// Mounts an already-formatted device.
    pub fn mount(device: D) -> Result<Self, Error> {
        let sectors = device.sector_count();
        let fs = Self {
            cache: BlockCache::new(device, CACHE_SLOTS),
            free_map: FreeMap::new_unloaded(sectors),
            inodes: InodeTable::new(),
        };

        {
            let map_inode = inode::open(&fs, FREE_MAP_SECTOR)?;
            if map_inode.length()? != u64::from(FreeMap::file_length(sectors)) {
                return Err(Error::Corrupted {
                    sector: FREE_MAP_SECTOR,
                });
            }
            let mut bytes = vec![0; FreeMap::file_length(sectors) as usize];
            map_inode.read_at(&mut bytes, 0)?;
            fs.free_map.load(&bytes);

            let root = inode::open(&fs, ROOT_DIR_SECTOR)?;
            if !root.is_dir()? {
                return Err(Error::Corrupted {
                    sector: ROOT_DIR_SECTOR,
                });
            }
        }
        debug!("mounted {sectors} sectors of {SECTOR_SIZE} bytes");
        Ok(fs)
    }

    /// Writes every dirty cache slot and the free map back to the device
    /// while the system keeps running.
    pub fn flush(&self) -> Result<(), Error> {
        self.write_free_map()?;
        self.cache.flush()?;
        Ok(())
    }

    /// Shuts the file system down: persists the free map and all dirty
    /// cache slots, then frees the cache.
    ///
    /// All handles must be closed first; the borrow checker enforces it.
    pub fn close(self) -> Result<(), Error> {
        self.write_free_map()?;
        self.cache.close()?;
        Ok(())
    }

    /// Creates a file of `initial_size` bytes at `path`.
    ///
    /// The size is all hole: no data sectors are allocated until writes
    /// arrive, and reads before then return zeroes.
    pub fn create(&self, path: &str, initial_size: u32) -> Result<(), Error> {
        self.create_inode(path, initial_size, false)
    }

    /// Creates an empty directory at `path`.
    pub fn create_dir(&self, path: &str) -> Result<(), Error> {
        self.create_inode(path, 0, true)
    }

    fn create_inode(&self, path: &str, initial_size: u32, is_dir: bool) -> Result<(), Error> {
        if u64::from(initial_size) > MAX_FILE_BYTES {
            // No index shape can ever back a file this large.
            return Err(Error::DiskFull);
        }
        let (parent, name) = path::resolve_parent(self, path)?;
        let sector = self.free_map.allocate().ok_or(Error::DiskFull)?;

        let linked = (|| {
            inode::create_on_disk(self, sector, initial_size, is_dir)?;
            parent.add(name, sector)
        })();
        if let Err(err) = linked {
            self.cache.discard(sector);
            self.free_map.release(sector);
            return Err(err);
        }
        Ok(())
    }

    /// Opens the file at `path`. Directories are rejected; use
    /// [`open_inode`](Self::open_inode) or [`open_dir`](Self::open_dir)
    /// for those.
    pub fn open(&self, path: &str) -> Result<File<'_, D>, Error> {
        let inode = path::resolve(self, path)?;
        if inode.is_dir()? {
            return Err(Error::IsADirectory);
        }
        Ok(File::new(inode))
    }

    /// Opens the inode at `path`, file or directory.
    pub fn open_inode(&self, path: &str) -> Result<Inode<'_, D>, Error> {
        path::resolve(self, path)
    }

    /// Opens the directory at `path`.
    pub fn open_dir(&self, path: &str) -> Result<Dir<'_, D>, Error> {
        Dir::from_inode(path::resolve(self, path)?)
    }

    /// Opens the root directory.
    pub fn open_root(&self) -> Result<Dir<'_, D>, Error> {
        Dir::from_inode(inode::open(self, ROOT_DIR_SECTOR)?)
    }

    /// Removes the file or empty directory at `path`.
    ///
    /// Storage is reclaimed when the last open handle closes; handles
    /// open at removal time keep working until then.
    pub fn remove(&self, path: &str) -> Result<(), Error> {
        let (parent, name) = path::resolve_parent(self, path)?;
        parent.remove(name)
    }

    /// The device this file system runs on.
    pub fn device(&self) -> &D {
        self.cache.device()
    }

    fn write_free_map(&self) -> Result<(), Error> {
        let map_inode = inode::open(self, FREE_MAP_SECTOR)?;
        let bytes = self.free_map.snapshot();
        let written = map_inode.write_at(&bytes, 0)?;
        if written != bytes.len() {
            return Err(Error::DiskFull);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MemoryDisk;

    #[test]
    fn test_file_system_is_sync_and_send() {
        fn check<T: Sync + Send>() {}
        check::<FileSystem<MemoryDisk>>();
    }

    #[test]
    fn test_mount_unformatted_device_fails() {
        let disk = MemoryDisk::new(32);
        assert!(matches!(
            FileSystem::mount(&disk),
            Err(Error::Corrupted { .. })
        ));
    }
}
