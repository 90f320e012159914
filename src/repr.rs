//! On-disk data layout.
//!
//! The disk is an array of `SECTOR_SIZE`-byte sectors:
//!
//! | sector no. | content                 | type                        |
//! |------------|-------------------------|-----------------------------|
//! | 0          | free-map file's inode   | [`DiskInode`]               |
//! | 1          | root directory's inode  | [`DiskInode`]               |
//! | 2..        | data, index and inode sectors, handed out by the free map |
//!
//! Every persistent structure here is a plain-old-data view of sector
//! bytes; all multi-byte fields are little-endian `u32`s.

use core::fmt;

use dataview::{Pod, PodMethods as _};

/// Sector size in bytes.
pub const SECTOR_SIZE: usize = 512;

/// Number of sectors directly referenced by an inode.
pub const NUM_DIRECT: usize = 12;

/// Number of sector indices held by one index sector.
pub const PTRS_PER_SECTOR: usize = SECTOR_SIZE / size_of::<u32>();

/// Largest file, in sectors: direct + single-indirect + double-indirect.
pub const MAX_FILE_SECTORS: usize =
    NUM_DIRECT + PTRS_PER_SECTOR + PTRS_PER_SECTOR * PTRS_PER_SECTOR;

/// Largest file, in bytes.
pub const MAX_FILE_BYTES: u64 = (MAX_FILE_SECTORS * SECTOR_SIZE) as u64;

/// Maximum length of a directory entry name, in bytes.
pub const NAME_MAX: usize = 14;

/// Sentinel stored in every inode sector.
pub const INODE_MAGIC: u32 = 0x494e_4f44;

/// Sector holding the free-map file's inode.
pub const FREE_MAP_SECTOR: SectorNo = SectorNo::new(0);

/// Sector holding the root directory's inode.
pub const ROOT_DIR_SECTOR: SectorNo = SectorNo::new(1);

/// Disk sector number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Pod)]
#[repr(transparent)]
pub struct SectorNo(u32);

impl fmt::Display for SectorNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl SectorNo {
    #[must_use]
    pub const fn new(n: u32) -> Self {
        Self(n)
    }

    #[must_use]
    pub const fn value(&self) -> u32 {
        self.0
    }

    #[must_use]
    pub fn as_index(&self) -> usize {
        usize::try_from(self.0).unwrap()
    }
}

/// Converts a pointer-slot word into a sector number.
///
/// A zero word means the slot is unallocated; sector 0 itself is the
/// free-map inode's well-known home and never appears in a pointer slot.
fn slot(n: u32) -> Option<SectorNo> {
    if n == 0 { None } else { Some(SectorNo::new(n)) }
}

fn slot_word(n: Option<SectorNo>) -> u32 {
    n.map_or(0, |n| {
        assert_ne!(n.value(), 0);
        n.value()
    })
}

/// On-disk inode. Occupies exactly one sector.
#[derive(Pod)]
#[repr(C)]
pub struct DiskInode {
    /// File size in bytes.
    length: u32,
    /// Bit 0 set if this inode holds directory entries.
    flags: u32,
    /// Directly referenced data sectors.
    direct: [u32; NUM_DIRECT],
    /// Sector of `PTRS_PER_SECTOR` data-sector indices.
    indirect: u32,
    /// Sector of `PTRS_PER_SECTOR` indices of index sectors.
    double_indirect: u32,
    /// Must be [`INODE_MAGIC`].
    magic: u32,
    reserved: [u32; 111],
}
const _: () = const { assert!(size_of::<DiskInode>() == SECTOR_SIZE) };

const FLAG_DIR: u32 = 1 << 0;

impl DiskInode {
    #[must_use]
    pub fn new(length: u32, is_dir: bool) -> Self {
        let mut ino = Self::zeroed();
        ino.length = length;
        ino.flags = if is_dir { FLAG_DIR } else { 0 };
        ino.magic = INODE_MAGIC;
        ino
    }

    #[must_use]
    pub fn magic_ok(&self) -> bool {
        self.magic == INODE_MAGIC
    }

    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.flags & FLAG_DIR != 0
    }

    #[must_use]
    pub fn length(&self) -> u32 {
        self.length
    }

    pub fn set_length(&mut self, length: u32) {
        self.length = length;
    }

    #[must_use]
    pub fn direct(&self, i: usize) -> Option<SectorNo> {
        slot(self.direct[i])
    }

    pub fn set_direct(&mut self, i: usize, n: Option<SectorNo>) {
        self.direct[i] = slot_word(n);
    }

    #[must_use]
    pub fn indirect(&self) -> Option<SectorNo> {
        slot(self.indirect)
    }

    pub fn set_indirect(&mut self, n: Option<SectorNo>) {
        self.indirect = slot_word(n);
    }

    #[must_use]
    pub fn double_indirect(&self) -> Option<SectorNo> {
        slot(self.double_indirect)
    }

    pub fn set_double_indirect(&mut self, n: Option<SectorNo>) {
        self.double_indirect = slot_word(n);
    }
}

/// An index sector: `PTRS_PER_SECTOR` sector indices.
#[derive(Pod)]
#[repr(transparent)]
pub struct IndexSector([u32; PTRS_PER_SECTOR]);
const _: () = const { assert!(size_of::<IndexSector>() == SECTOR_SIZE) };

impl IndexSector {
    #[must_use]
    pub fn get(&self, i: usize) -> Option<SectorNo> {
        slot(self.0[i])
    }

    pub fn set(&mut self, i: usize, n: Option<SectorNo>) {
        self.0[i] = slot_word(n);
    }

    /// Iterates over the allocated slots.
    pub fn allocated(&self) -> impl Iterator<Item = SectorNo> + '_ {
        self.0.iter().filter_map(|&n| slot(n))
    }
}

/// A directory is a file containing a sequence of these records.
#[derive(Debug, Pod)]
#[repr(C)]
pub struct DirEntry {
    sector: u32,
    in_use: u8,
    name: [u8; NAME_MAX + 1],
}

/// Size of one directory entry record, in bytes.
pub const DIR_ENTRY_SIZE: usize = size_of::<DirEntry>();
const _: () = const { assert!(DIR_ENTRY_SIZE == 20) };

impl DirEntry {
    #[must_use]
    pub fn new(name: &str, sector: SectorNo) -> Self {
        assert!(!name.is_empty() && name.len() <= NAME_MAX);
        let mut de = Self::zeroed();
        de.sector = sector.value();
        de.in_use = 1;
        de.name[..name.len()].copy_from_slice(name.as_bytes());
        de
    }

    #[must_use]
    pub fn is_in_use(&self) -> bool {
        self.in_use != 0
    }

    #[must_use]
    pub fn sector(&self) -> SectorNo {
        SectorNo::new(self.sector)
    }

    /// The NUL-padded name bytes, up to the first NUL.
    #[must_use]
    pub fn name(&self) -> &[u8] {
        let len = memchr::memchr(0, &self.name).unwrap_or(self.name.len());
        &self.name[..len]
    }

    #[must_use]
    pub fn is_same_name(&self, name: &str) -> bool {
        self.name() == name.as_bytes()
    }
}
