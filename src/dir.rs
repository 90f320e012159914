//! Directories.
//!
//! A directory is an inode flagged as such whose bytes are an array of
//! fixed-width [`DirEntry`] records; a record is either in use, naming an
//! inode sector, or free for reuse. Names are unique among the in-use
//! records of one directory.
//!
//! Every scan-then-mutate sequence here runs on a [`LockedInode`], so
//! two threads adding the same name race on the directory's content
//! mutex rather than on the entry array.

use dataview::PodMethods as _;

use crate::{
    device::BlockDevice,
    error::Error,
    inode::{self, Inode, LockedInode},
    repr::{DIR_ENTRY_SIZE, DirEntry, NAME_MAX, SectorNo},
};

/// A handle on a directory inode.
pub struct Dir<'fs, D: BlockDevice> {
    inode: Inode<'fs, D>,
}

impl<'fs, D: BlockDevice> Dir<'fs, D> {
    /// Wraps a directory inode, rejecting non-directories.
    pub fn from_inode(inode: Inode<'fs, D>) -> Result<Self, Error> {
        if !inode.is_dir()? {
            return Err(Error::NotADirectory);
        }
        Ok(Self { inode })
    }

    #[must_use]
    pub fn inode(&self) -> &Inode<'fs, D> {
        &self.inode
    }

    #[must_use]
    pub fn into_inode(self) -> Inode<'fs, D> {
        self.inode
    }

    /// Looks up `name` and opens the inode it refers to.
    pub fn lookup(&self, name: &str) -> Result<Inode<'fs, D>, Error> {
        let dir = self.inode.lock();
        let Some((entry, _off)) = find_entry(&dir, name)? else {
            return Err(Error::NotFound);
        };
        inode::open(self.inode.fs(), entry.sector())
    }

    /// Adds an entry mapping `name` to `sector`.
    ///
    /// Reuses the first free record, or grows the directory file by one
    /// record. Fails if the name is present or longer than [`NAME_MAX`].
    pub fn add(&self, name: &str, sector: SectorNo) -> Result<(), Error> {
        assert!(!name.is_empty());
        if name.len() > NAME_MAX {
            return Err(Error::NameTooLong);
        }

        let dir = self.inode.lock();
        let mut free_off = None;
        for off in entry_offsets(&dir)? {
            let entry = read_entry(&dir, off)?;
            if !entry.is_in_use() {
                free_off = free_off.or(Some(off));
            } else if entry.is_same_name(name) {
                return Err(Error::AlreadyExists);
            }
        }
        let off = match free_off {
            Some(off) => off,
            None => dir.length()?,
        };

        write_entry(&dir, off, &DirEntry::new(name, sector))
    }

    /// Removes the entry for `name` and marks its inode for deletion on
    /// last close. A directory must be empty to be removed.
    pub fn remove(&self, name: &str) -> Result<(), Error> {
        let dir = self.inode.lock();
        let Some((entry, off)) = find_entry(&dir, name)? else {
            return Err(Error::NotFound);
        };

        let target = inode::open(self.inode.fs(), entry.sector())?;
        if target.is_dir()? {
            let locked = target.lock();
            if !is_empty(&locked)? {
                return Err(Error::DirectoryNotEmpty);
            }
        }

        write_entry(&dir, off, &DirEntry::zeroed())?;
        target.remove();
        Ok(())
    }

    /// Names of all in-use entries, in table order.
    pub fn names(&self) -> Result<Vec<String>, Error> {
        let dir = self.inode.lock();
        let mut names = Vec::new();
        for off in entry_offsets(&dir)? {
            let entry = read_entry(&dir, off)?;
            if entry.is_in_use() {
                names.push(String::from_utf8_lossy(entry.name()).into_owned());
            }
        }
        Ok(names)
    }

    /// Whether the directory holds no in-use entries.
    pub fn is_empty(&self) -> Result<bool, Error> {
        is_empty(&self.inode.lock())
    }
}

fn entry_offsets<D: BlockDevice>(
    dir: &LockedInode<'_, '_, D>,
) -> Result<impl Iterator<Item = u64>, Error> {
    let length = dir.length()?;
    Ok((0..length / DIR_ENTRY_SIZE as u64).map(|i| i * DIR_ENTRY_SIZE as u64))
}

fn read_entry<D: BlockDevice>(dir: &LockedInode<'_, '_, D>, off: u64) -> Result<DirEntry, Error> {
    let mut entry = DirEntry::zeroed();
    let read = dir.read_at(entry.as_bytes_mut(), off)?;
    assert_eq!(read, DIR_ENTRY_SIZE);
    Ok(entry)
}

fn write_entry<D: BlockDevice>(
    dir: &LockedInode<'_, '_, D>,
    off: u64,
    entry: &DirEntry,
) -> Result<(), Error> {
    let written = dir.write_at(entry.as_bytes(), off)?;
    if written != DIR_ENTRY_SIZE {
        // Ran out of sectors mid-record; scrub the fragment so a torn
        // entry is never taken for a live one.
        let zeroes = DirEntry::zeroed();
        dir.write_at(&zeroes.as_bytes()[..written], off)?;
        return Err(Error::DiskFull);
    }
    Ok(())
}

fn find_entry<D: BlockDevice>(
    dir: &LockedInode<'_, '_, D>,
    name: &str,
) -> Result<Option<(DirEntry, u64)>, Error> {
    for off in entry_offsets(dir)? {
        let entry = read_entry(dir, off)?;
        if entry.is_in_use() && entry.is_same_name(name) {
            return Ok(Some((entry, off)));
        }
    }
    Ok(None)
}

fn is_empty<D: BlockDevice>(dir: &LockedInode<'_, '_, D>) -> Result<bool, Error> {
    for off in entry_offsets(dir)? {
        if read_entry(dir, off)?.is_in_use() {
            return Ok(false);
        }
    }
    Ok(true)
}
