//! Write-back buffer cache for sector I/O.
//!
//! The cache is the single point through which every sector is read or
//! written; the device is never touched directly by the layers above.
//! It keeps a bounded list of sector-sized slots ordered by recency
//! (front = most recently used) and evicts from the tail, writing dirty
//! victims back to the device. Repeated touches to a cached sector cost
//! no I/O.

use std::{collections::VecDeque, sync::Mutex};

use dataview::{Pod, PodMethods as _};

use crate::{
    device::BlockDevice,
    error::DiskError,
    repr::{SECTOR_SIZE, SectorNo},
};

/// One cached sector.
struct Slot {
    sector: SectorNo,
    dirty: bool,
    data: Box<[u8; SECTOR_SIZE]>,
}

pub(crate) struct BlockCache<D> {
    device: D,
    capacity: usize,
    /// Front is most recently used, back is least. At most one slot per
    /// distinct sector.
    slots: Mutex<VecDeque<Slot>>,
}

impl<D: BlockDevice> BlockCache<D> {
    pub(crate) fn new(device: D, capacity: usize) -> Self {
        assert!(capacity > 0);
        Self {
            device,
            capacity,
            slots: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub(crate) fn device(&self) -> &D {
        &self.device
    }

    /// Copies `dst.len()` bytes out of the sector, starting at `offset`.
    pub(crate) fn read(
        &self,
        sector: SectorNo,
        dst: &mut [u8],
        offset: usize,
    ) -> Result<(), DiskError> {
        assert!(offset + dst.len() <= SECTOR_SIZE);
        if dst.is_empty() {
            return Ok(());
        }
        let mut slots = self.slots.lock().unwrap();
        let slot = self.slot_to_front(&mut slots, sector, true)?;
        dst.copy_from_slice(&slot.data[offset..offset + dst.len()]);
        Ok(())
    }

    /// Copies `src` into the sector at `offset` and marks the slot dirty.
    pub(crate) fn write(
        &self,
        sector: SectorNo,
        src: &[u8],
        offset: usize,
    ) -> Result<(), DiskError> {
        assert!(offset + src.len() <= SECTOR_SIZE);
        if src.is_empty() {
            return Ok(());
        }
        let mut slots = self.slots.lock().unwrap();
        let slot = self.slot_to_front(&mut slots, sector, true)?;
        slot.data[offset..offset + src.len()].copy_from_slice(src);
        slot.dirty = true;
        Ok(())
    }

    /// Installs a zeroed slot for a freshly allocated sector.
    ///
    /// The sector's disk content is garbage, so no read is issued; the
    /// zeroes only exist in the cache until written back.
    pub(crate) fn create(&self, sector: SectorNo) -> Result<(), DiskError> {
        let mut slots = self.slots.lock().unwrap();
        let slot = self.slot_to_front(&mut slots, sector, false)?;
        slot.data.fill(0);
        slot.dirty = true;
        Ok(())
    }

    /// Drops the slot for a sector that is being freed.
    ///
    /// Never writes back: the content is garbage about to be reused.
    /// This is distinct from eviction, which always preserves dirty data.
    pub(crate) fn discard(&self, sector: SectorNo) {
        let mut slots = self.slots.lock().unwrap();
        if let Some(pos) = slots.iter().position(|s| s.sector == sector) {
            slots.remove(pos);
        }
    }

    /// Writes every dirty slot to the device and clears its dirty bit.
    ///
    /// Slots stay resident, so a repeated flush with no interleaved
    /// writes issues no I/O.
    pub(crate) fn flush(&self) -> Result<(), DiskError> {
        let mut slots = self.slots.lock().unwrap();
        for slot in slots.iter_mut() {
            if slot.dirty {
                self.device.write(slot.sector, &slot.data)?;
                slot.dirty = false;
            }
        }
        Ok(())
    }

    /// Writes every dirty slot, then frees all slots. Shutdown path.
    pub(crate) fn close(&self) -> Result<(), DiskError> {
        let mut slots = self.slots.lock().unwrap();
        while let Some(slot) = slots.pop_front() {
            if slot.dirty {
                self.device.write(slot.sector, &slot.data)?;
            }
        }
        Ok(())
    }

    /// Reads a whole sector into a stack-local structured value.
    pub(crate) fn read_obj<T: Pod>(&self, sector: SectorNo) -> Result<T, DiskError> {
        let mut value = T::zeroed();
        let bytes = value.as_bytes_mut();
        assert_eq!(bytes.len(), SECTOR_SIZE);
        self.read(sector, bytes, 0)?;
        Ok(value)
    }

    /// Writes a whole structured value over a sector.
    pub(crate) fn write_obj<T: Pod>(&self, sector: SectorNo, value: &T) -> Result<(), DiskError> {
        let bytes = value.as_bytes();
        assert_eq!(bytes.len(), SECTOR_SIZE);
        self.write(sector, bytes, 0)
    }

    /// Returns the sector's slot, moved to the front of the recency list.
    ///
    /// On a miss the slot is installed fresh, evicting the tail (with
    /// write-back if dirty) when the cache is full. `load` controls
    /// whether a miss reads the sector from the device.
    fn slot_to_front<'a>(
        &self,
        slots: &'a mut VecDeque<Slot>,
        sector: SectorNo,
        load: bool,
    ) -> Result<&'a mut Slot, DiskError> {
        if let Some(pos) = slots.iter().position(|s| s.sector == sector) {
            let slot = slots.remove(pos).unwrap();
            slots.push_front(slot);
            return Ok(slots.front_mut().unwrap());
        }

        // Miss. Displace the least recently used slot if at capacity.
        if slots.len() == self.capacity {
            let victim = slots.pop_back().unwrap();
            if victim.dirty {
                self.device.write(victim.sector, &victim.data)?;
            }
        }

        let mut slot = Slot {
            sector,
            dirty: false,
            data: Box::new([0; SECTOR_SIZE]),
        };
        if load {
            self.device.read(sector, &mut slot.data)?;
        }
        slots.push_front(slot);
        Ok(slots.front_mut().unwrap())
    }
}
