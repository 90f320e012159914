//! Block device interface.
//!
//! The device is the file system's only external collaborator: a flat
//! array of [`SECTOR_SIZE`]-byte sectors with synchronous reads and
//! writes. All access is funneled through the buffer cache; nothing else
//! in the crate talks to the device.

use std::sync::{
    Mutex,
    atomic::{AtomicU64, Ordering},
};

use crate::{
    error::DiskError,
    repr::{SECTOR_SIZE, SectorNo},
};

/// A device of fixed-size sectors addressed by a 0-based sector index.
pub trait BlockDevice {
    /// Total number of sectors on the device.
    fn sector_count(&self) -> u32;

    /// Reads the sector into `data`.
    fn read(&self, sector: SectorNo, data: &mut [u8; SECTOR_SIZE]) -> Result<(), DiskError>;

    /// Writes `data` to the sector.
    fn write(&self, sector: SectorNo, data: &[u8; SECTOR_SIZE]) -> Result<(), DiskError>;
}

impl<T: BlockDevice + ?Sized> BlockDevice for &T {
    fn sector_count(&self) -> u32 {
        (**self).sector_count()
    }

    fn read(&self, sector: SectorNo, data: &mut [u8; SECTOR_SIZE]) -> Result<(), DiskError> {
        (**self).read(sector, data)
    }

    fn write(&self, sector: SectorNo, data: &[u8; SECTOR_SIZE]) -> Result<(), DiskError> {
        (**self).write(sector, data)
    }
}

impl<T: BlockDevice + ?Sized> BlockDevice for std::sync::Arc<T> {
    fn sector_count(&self) -> u32 {
        (**self).sector_count()
    }

    fn read(&self, sector: SectorNo, data: &mut [u8; SECTOR_SIZE]) -> Result<(), DiskError> {
        (**self).read(sector, data)
    }

    fn write(&self, sector: SectorNo, data: &[u8; SECTOR_SIZE]) -> Result<(), DiskError> {
        (**self).write(sector, data)
    }
}

/// A memory-backed block device.
///
/// Starts out all zeroes. Counts sector reads and writes so tests can
/// observe cache behavior (hit rates, write-back, flush idempotence).
pub struct MemoryDisk {
    sectors: Vec<Mutex<Box<[u8; SECTOR_SIZE]>>>,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl MemoryDisk {
    /// Creates a zero-filled device of `sector_count` sectors.
    #[must_use]
    pub fn new(sector_count: u32) -> Self {
        Self {
            sectors: (0..sector_count)
                .map(|_| Mutex::new(Box::new([0; SECTOR_SIZE])))
                .collect(),
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        }
    }

    /// Number of sector reads served so far.
    #[must_use]
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Number of sector writes served so far.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    fn sector(&self, sector: SectorNo) -> Result<&Mutex<Box<[u8; SECTOR_SIZE]>>, DiskError> {
        self.sectors.get(sector.as_index()).ok_or(DiskError { sector })
    }
}

impl BlockDevice for MemoryDisk {
    fn sector_count(&self) -> u32 {
        u32::try_from(self.sectors.len()).unwrap()
    }

    fn read(&self, sector: SectorNo, data: &mut [u8; SECTOR_SIZE]) -> Result<(), DiskError> {
        let stored = self.sector(sector)?.lock().unwrap();
        data.copy_from_slice(&**stored);
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn write(&self, sector: SectorNo, data: &[u8; SECTOR_SIZE]) -> Result<(), DiskError> {
        let mut stored = self.sector(sector)?.lock().unwrap();
        stored.copy_from_slice(data);
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_disk_round_trip() {
        let disk = MemoryDisk::new(4);
        let mut data = [0xab; SECTOR_SIZE];
        disk.write(SectorNo::new(2), &data).unwrap();
        data.fill(0);
        disk.read(SectorNo::new(2), &mut data).unwrap();
        assert_eq!(data, [0xab; SECTOR_SIZE]);
        assert_eq!(disk.read_count(), 1);
        assert_eq!(disk.write_count(), 1);
    }

    #[test]
    fn test_memory_disk_out_of_range() {
        let disk = MemoryDisk::new(4);
        let mut data = [0; SECTOR_SIZE];
        assert!(disk.read(SectorNo::new(4), &mut data).is_err());
    }
}
