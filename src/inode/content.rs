//! Inode content.
//!
//! The bytes of a file live in data sectors reached through the inode's
//! index: `NUM_DIRECT` direct slots, one single-indirect sector, and one
//! double-indirect sector of index sectors. A zero slot is an unmade
//! reference; writes allocate through such slots on demand, so files grow
//! implicitly and may be sparse. Reads never allocate, and a read of a
//! hole below the file length yields zeroes.
//!
//! Every access to the inode sector, the index sectors, and the data
//! sectors goes through the buffer cache; whole sectors are read into
//! stack-local structured values, mutated, and written back.

use super::LockedInode;
use crate::{
    device::BlockDevice,
    error::Error,
    fs::FileSystem,
    repr::{
        DiskInode, IndexSector, MAX_FILE_BYTES, NUM_DIRECT, PTRS_PER_SECTOR, SECTOR_SIZE, SectorNo,
    },
};

impl<D: BlockDevice> LockedInode<'_, '_, D> {
    fn disk_inode(&self) -> Result<DiskInode, Error> {
        Ok(self.fs.cache.read_obj(self.shared.sector)?)
    }

    fn save_inode(&self, ino: &DiskInode) -> Result<(), Error> {
        Ok(self.fs.cache.write_obj(self.shared.sector, ino)?)
    }

    /// File size in bytes.
    pub fn length(&self) -> Result<u64, Error> {
        Ok(u64::from(self.disk_inode()?.length()))
    }

    /// Reads up to `buf.len()` bytes starting at byte `offset`.
    ///
    /// Stops at end of file; the returned count is short when `offset +
    /// buf.len()` reaches past the length.
    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize, Error> {
        let length = self.length()?;
        if offset >= length {
            return Ok(0);
        }
        let n = usize::try_from(u64::min(buf.len() as u64, length - offset)).unwrap();
        let offset = usize::try_from(offset).unwrap();

        let mut tot = 0;
        while tot < n {
            let pos = offset + tot;
            let m = usize::min(n - tot, SECTOR_SIZE - pos % SECTOR_SIZE);
            match self.data_sector(pos / SECTOR_SIZE, false)? {
                Some(sector) => {
                    self.fs
                        .cache
                        .read(sector, &mut buf[tot..tot + m], pos % SECTOR_SIZE)?;
                }
                // A hole below the length; never written, reads as zeroes.
                None => buf[tot..tot + m].fill(0),
            }
            tot += m;
        }
        Ok(tot)
    }

    /// Writes `buf` starting at byte `offset`, allocating data and index
    /// sectors on demand.
    ///
    /// The length is extended through the cache before any data lands, so
    /// the growth is visible no later than the bytes. Returns a short
    /// count when the device runs out of sectors mid-write (everything
    /// already written stays readable) and `0` while writes are denied.
    pub fn write_at(&self, buf: &[u8], offset: u64) -> Result<usize, Error> {
        if self.shared.meta.lock().unwrap().deny_write_count > 0 {
            return Ok(0);
        }
        if buf.is_empty() || offset >= MAX_FILE_BYTES {
            return Ok(0);
        }
        let n = usize::try_from(u64::min(buf.len() as u64, MAX_FILE_BYTES - offset)).unwrap();
        let offset = usize::try_from(offset).unwrap();
        let end = u32::try_from(offset + n).unwrap();

        let mut ino = self.disk_inode()?;
        if ino.length() < end {
            ino.set_length(end);
            self.save_inode(&ino)?;
        }

        let mut tot = 0;
        while tot < n {
            let pos = offset + tot;
            let m = usize::min(n - tot, SECTOR_SIZE - pos % SECTOR_SIZE);
            let sector = match self.data_sector(pos / SECTOR_SIZE, true) {
                Ok(Some(sector)) => sector,
                Ok(None) | Err(Error::DiskFull) => break,
                Err(err) => return Err(err),
            };
            self.fs
                .cache
                .write(sector, &buf[tot..tot + m], pos % SECTOR_SIZE)?;
            tot += m;
        }
        Ok(tot)
    }

    /// Writes at the current end of file.
    ///
    /// The length is re-read under the held content mutex, so concurrent
    /// appenders land one after the other instead of overlapping.
    pub fn append(&self, buf: &[u8]) -> Result<usize, Error> {
        let offset = self.length()?;
        self.write_at(buf, offset)
    }

    /// Finds the data sector holding the `index`th sector-sized piece of
    /// the file.
    ///
    /// With `alloc` set (write walks), zero slots encountered along the
    /// way are filled by allocating fresh zeroed sectors; index sectors
    /// allocated for a chain that then fails are released again. Without
    /// `alloc` (read walks), a zero slot terminates the walk with `None`.
    fn data_sector(&self, index: usize, alloc: bool) -> Result<Option<SectorNo>, Error> {
        let mut ino = self.disk_inode()?;

        if index < NUM_DIRECT {
            if let Some(sector) = ino.direct(index) {
                return Ok(Some(sector));
            }
            if !alloc {
                return Ok(None);
            }
            let sector = allocate_sector(self.fs)?;
            ino.set_direct(index, Some(sector));
            self.save_inode(&ino)?;
            return Ok(Some(sector));
        }

        let index = index - NUM_DIRECT;
        if index < PTRS_PER_SECTOR {
            let (table, table_fresh) = match ino.indirect() {
                Some(table) => (table, false),
                None if !alloc => return Ok(None),
                None => {
                    let table = allocate_sector(self.fs)?;
                    ino.set_indirect(Some(table));
                    self.save_inode(&ino)?;
                    (table, true)
                }
            };
            return match self.index_slot(table, index, alloc) {
                Ok(found) => Ok(found.map(|(sector, _)| sector)),
                Err(err) => {
                    if table_fresh {
                        ino.set_indirect(None);
                        self.save_inode(&ino)?;
                        release_sector(self.fs, table);
                    }
                    Err(err)
                }
            };
        }

        let index = index - PTRS_PER_SECTOR;
        assert!(index < PTRS_PER_SECTOR * PTRS_PER_SECTOR);
        let (outer, outer_fresh) = match ino.double_indirect() {
            Some(outer) => (outer, false),
            None if !alloc => return Ok(None),
            None => {
                let outer = allocate_sector(self.fs)?;
                ino.set_double_indirect(Some(outer));
                self.save_inode(&ino)?;
                (outer, true)
            }
        };

        let result = (|| {
            let Some((inner, inner_fresh)) =
                self.index_slot(outer, index / PTRS_PER_SECTOR, alloc)?
            else {
                return Ok(None);
            };
            match self.index_slot(inner, index % PTRS_PER_SECTOR, alloc) {
                Ok(found) => Ok(found.map(|(sector, _)| sector)),
                Err(err) => {
                    if inner_fresh {
                        if !outer_fresh {
                            let mut table: IndexSector = self.fs.cache.read_obj(outer)?;
                            table.set(index / PTRS_PER_SECTOR, None);
                            self.fs.cache.write_obj(outer, &table)?;
                        }
                        release_sector(self.fs, inner);
                    }
                    Err(err)
                }
            }
        })();

        match result {
            Ok(found) => Ok(found),
            Err(err) => {
                if outer_fresh {
                    ino.set_double_indirect(None);
                    self.save_inode(&ino)?;
                    release_sector(self.fs, outer);
                }
                Err(err)
            }
        }
    }

    /// Looks at one slot of an index sector, allocating through it when
    /// `alloc` is set. The flag in the result reports a fresh allocation.
    fn index_slot(
        &self,
        table: SectorNo,
        index: usize,
        alloc: bool,
    ) -> Result<Option<(SectorNo, bool)>, Error> {
        let mut entries: IndexSector = self.fs.cache.read_obj(table)?;
        if let Some(sector) = entries.get(index) {
            return Ok(Some((sector, false)));
        }
        if !alloc {
            return Ok(None);
        }
        let sector = allocate_sector(self.fs)?;
        entries.set(index, Some(sector));
        self.fs.cache.write_obj(table, &entries)?;
        Ok(Some((sector, true)))
    }
}

/// Allocates a sector and installs its zeroed content in the cache.
fn allocate_sector<D: BlockDevice>(fs: &FileSystem<D>) -> Result<SectorNo, Error> {
    let sector = fs.free_map.allocate().ok_or(Error::DiskFull)?;
    if let Err(err) = fs.cache.create(sector) {
        fs.free_map.release(sector);
        return Err(err.into());
    }
    Ok(sector)
}

/// Returns a sector to the free map, dropping any cached copy unwritten.
fn release_sector<D: BlockDevice>(fs: &FileSystem<D>, sector: SectorNo) {
    fs.cache.discard(sector);
    fs.free_map.release(sector);
}

/// Frees everything a removed inode owns: every allocated data sector,
/// every index sector, and the inode sector itself. Runs on last close.
pub(crate) fn release<D: BlockDevice>(fs: &FileSystem<D>, sector: SectorNo) -> Result<(), Error> {
    let ino: DiskInode = fs.cache.read_obj(sector)?;

    for i in 0..NUM_DIRECT {
        if let Some(data) = ino.direct(i) {
            release_sector(fs, data);
        }
    }
    if let Some(table) = ino.indirect() {
        release_index(fs, table)?;
    }
    if let Some(outer) = ino.double_indirect() {
        let entries: IndexSector = fs.cache.read_obj(outer)?;
        for inner in entries.allocated() {
            release_index(fs, inner)?;
        }
        release_sector(fs, outer);
    }
    release_sector(fs, sector);
    Ok(())
}

/// Frees one index sector and every data sector it references.
fn release_index<D: BlockDevice>(fs: &FileSystem<D>, table: SectorNo) -> Result<(), Error> {
    let entries: IndexSector = fs.cache.read_obj(table)?;
    for data in entries.allocated() {
        release_sector(fs, data);
    }
    release_sector(fs, table);
    Ok(())
}
