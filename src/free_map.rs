//! Free-space accounting.
//!
//! One bit per sector, first-fit allocation. The bitmap lives in memory
//! while the file system runs and is persisted as an ordinary file whose
//! inode sits at the well-known sector 0, so it travels through the same
//! inode and cache machinery as everything else.

use std::sync::Mutex;

use crate::repr::{FREE_MAP_SECTOR, ROOT_DIR_SECTOR, SectorNo};

/// In-memory sector bitmap. Bit set = sector allocated.
struct Bitmap {
    bytes: Vec<u8>,
    sectors: u32,
}

impl Bitmap {
    fn new(sectors: u32) -> Self {
        Self {
            bytes: vec![0; Self::byte_len(sectors)],
            sectors,
        }
    }

    fn byte_len(sectors: u32) -> usize {
        (sectors as usize).div_ceil(8)
    }

    fn bit(&self, n: usize) -> bool {
        self.bytes[n / 8] & (1 << (n % 8)) != 0
    }

    fn set_bit(&mut self, n: usize) {
        self.bytes[n / 8] |= 1 << (n % 8);
    }

    fn clear_bit(&mut self, n: usize) {
        self.bytes[n / 8] &= !(1 << (n % 8));
    }

    /// First-fit scan for a clear bit; sets and returns it.
    fn take_first_clear(&mut self) -> Option<usize> {
        let n = (0..self.sectors as usize).find(|&n| !self.bit(n))?;
        self.set_bit(n);
        Some(n)
    }
}

pub(crate) struct FreeMap {
    bits: Mutex<Bitmap>,
}

impl FreeMap {
    /// A fresh map for a newly formatted device: everything free except
    /// the two well-known inode sectors.
    pub(crate) fn new_formatted(sectors: u32) -> Self {
        let mut bits = Bitmap::new(sectors);
        bits.set_bit(FREE_MAP_SECTOR.as_index());
        bits.set_bit(ROOT_DIR_SECTOR.as_index());
        Self {
            bits: Mutex::new(bits),
        }
    }

    /// A placeholder for the mount path: everything marked allocated, so
    /// an allocation before [`load`](Self::load) fails loudly.
    pub(crate) fn new_unloaded(sectors: u32) -> Self {
        let mut bits = Bitmap::new(sectors);
        bits.bytes.fill(0xff);
        Self {
            bits: Mutex::new(bits),
        }
    }

    /// Byte length of the persisted bitmap file.
    pub(crate) fn file_length(sectors: u32) -> u32 {
        u32::try_from(Bitmap::byte_len(sectors)).unwrap()
    }

    /// Replaces the bitmap with the persisted `bytes` read at mount.
    pub(crate) fn load(&self, bytes: &[u8]) {
        let mut bits = self.bits.lock().unwrap();
        assert_eq!(bytes.len(), bits.bytes.len());
        bits.bytes.copy_from_slice(bytes);
    }

    /// Snapshot of the bitmap bytes for persisting.
    pub(crate) fn snapshot(&self) -> Vec<u8> {
        self.bits.lock().unwrap().bytes.clone()
    }

    /// Allocates one sector, first fit. `None` when the device is full.
    pub(crate) fn allocate(&self) -> Option<SectorNo> {
        let Some(n) = self.bits.lock().unwrap().take_first_clear() else {
            log::warn!("out of sectors");
            return None;
        };
        Some(SectorNo::new(u32::try_from(n).unwrap()))
    }

    /// Returns a sector to the pool.
    pub(crate) fn release(&self, sector: SectorNo) {
        let mut bits = self.bits.lock().unwrap();
        assert!(bits.bit(sector.as_index()), "releasing free sector");
        bits.clear_bit(sector.as_index());
    }
}
