//! File growth through the index levels, sparse files, and exhaustion.

use rand::{RngCore as _, SeedableRng as _, rngs::StdRng};
use sectorfs::{
    Error, FileSystem, MemoryDisk, NUM_DIRECT, PTRS_PER_SECTOR, ROOT_DIR_SECTOR, SECTOR_SIZE,
};

const DIRECT_BYTES: u64 = (NUM_DIRECT * SECTOR_SIZE) as u64;
const SINGLE_BYTES: u64 = ((NUM_DIRECT + PTRS_PER_SECTOR) * SECTOR_SIZE) as u64;

fn random_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut data = vec![0; len];
    StdRng::seed_from_u64(seed).fill_bytes(&mut data);
    data
}

#[test]
fn test_write_spanning_direct_to_indirect_boundary() {
    let disk = MemoryDisk::new(1024);
    let fs = FileSystem::format(&disk).unwrap();
    fs.create("/f", 0).unwrap();
    let inode = fs.open_inode("/f").unwrap();

    let data = random_bytes(SECTOR_SIZE, 1);
    let offset = DIRECT_BYTES - SECTOR_SIZE as u64 / 2;
    assert_eq!(inode.write_at(&data, offset).unwrap(), data.len());

    let mut buf = vec![0; data.len()];
    assert_eq!(inode.read_at(&mut buf, offset).unwrap(), data.len());
    assert_eq!(buf, data);
}

#[test]
fn test_write_spanning_indirect_to_double_indirect_boundary() {
    let disk = MemoryDisk::new(1024);
    let fs = FileSystem::format(&disk).unwrap();
    fs.create("/f", 0).unwrap();
    let inode = fs.open_inode("/f").unwrap();

    let data = random_bytes(SECTOR_SIZE, 2);
    let offset = SINGLE_BYTES - SECTOR_SIZE as u64 / 2;
    assert_eq!(inode.write_at(&data, offset).unwrap(), data.len());

    let mut buf = vec![0; data.len()];
    assert_eq!(inode.read_at(&mut buf, offset).unwrap(), data.len());
    assert_eq!(buf, data);
    assert_eq!(inode.length().unwrap(), offset + data.len() as u64);
}

#[test]
fn test_big_file_round_trips_through_remount() {
    let disk = MemoryDisk::new(1024);
    let fs = FileSystem::format(&disk).unwrap();
    fs.create("/big", 0).unwrap();

    let data = random_bytes(200_000, 3);
    assert_eq!(
        fs.open_inode("/big").unwrap().write_at(&data, 0).unwrap(),
        data.len()
    );
    fs.close().unwrap();

    // 200 000 bytes reaches well into the double-indirect range.
    assert!(data.len() as u64 > SINGLE_BYTES);

    let fs = FileSystem::mount(&disk).unwrap();
    let inode = fs.open_inode("/big").unwrap();
    assert_eq!(inode.length().unwrap(), data.len() as u64);
    let mut buf = vec![0; data.len()];
    assert_eq!(inode.read_at(&mut buf, 0).unwrap(), data.len());
    assert_eq!(buf, data);
}

#[test]
fn test_sparse_write_reads_zeroes_in_the_hole() {
    let disk = MemoryDisk::new(1024);
    let fs = FileSystem::format(&disk).unwrap();
    fs.create("/f", 0).unwrap();
    let inode = fs.open_inode("/f").unwrap();

    inode.write_at(b"tail", 300_000).unwrap();
    assert_eq!(inode.length().unwrap(), 300_004);

    let mut buf = [0xff_u8; 64];
    assert_eq!(inode.read_at(&mut buf, 150_000).unwrap(), buf.len());
    assert!(buf.iter().all(|&b| b == 0));

    let mut tail = [0_u8; 4];
    assert_eq!(inode.read_at(&mut tail, 300_000).unwrap(), 4);
    assert_eq!(&tail, b"tail");
}

#[test]
fn test_read_past_end_is_short() {
    let disk = MemoryDisk::new(256);
    let fs = FileSystem::format(&disk).unwrap();
    fs.create("/f", 0).unwrap();
    let inode = fs.open_inode("/f").unwrap();
    inode.write_at(b"0123456789", 0).unwrap();

    let mut buf = [0_u8; 32];
    assert_eq!(inode.read_at(&mut buf, 4).unwrap(), 6);
    assert_eq!(&buf[..6], b"456789");
    assert_eq!(inode.read_at(&mut buf, 10).unwrap(), 0);
    assert_eq!(inode.read_at(&mut buf, 1000).unwrap(), 0);
}

#[test]
fn test_empty_write_allocates_nothing() {
    let disk = MemoryDisk::new(256);
    let fs = FileSystem::format(&disk).unwrap();
    fs.create("/f", 0).unwrap();
    let inode = fs.open_inode("/f").unwrap();
    assert_eq!(inode.write_at(&[], 0).unwrap(), 0);
    assert_eq!(inode.length().unwrap(), 0);
}

#[test]
fn test_eviction_heavy_workload_preserves_data() {
    // 100 data sectors, well past the 64 cache slots.
    let disk = MemoryDisk::new(1024);
    let fs = FileSystem::format(&disk).unwrap();
    fs.create("/f", 0).unwrap();
    let inode = fs.open_inode("/f").unwrap();

    let data = random_bytes(100 * SECTOR_SIZE, 4);
    assert_eq!(inode.write_at(&data, 0).unwrap(), data.len());
    let mut buf = vec![0; data.len()];
    assert_eq!(inode.read_at(&mut buf, 0).unwrap(), data.len());
    assert_eq!(buf, data);
    // The workload forced evictions: more sectors were written back than
    // the cache can hold at once.
    assert!(disk.write_count() > 64);
}

#[test]
fn test_full_disk_write_is_short_and_consistent() {
    let disk = MemoryDisk::new(64);
    let fs = FileSystem::format(&disk).unwrap();
    fs.create("/big", 0).unwrap();
    let inode = fs.open_inode("/big").unwrap();

    let data = random_bytes(100_000, 5);
    let written = inode.write_at(&data, 0).unwrap();
    assert!(written > 0 && written < data.len());

    // Everything that landed is still readable.
    let mut buf = vec![0; written];
    assert_eq!(inode.read_at(&mut buf, 0).unwrap(), written);
    assert_eq!(buf, data[..written]);

    // And a follow-up write still finds no space.
    assert_eq!(inode.write_at(b"more", 400_000).unwrap(), 0);

    // Creation fails cleanly too: no sector for the inode, no phantom
    // directory entry.
    assert!(matches!(fs.create("/another", 0), Err(Error::DiskFull)));
    assert_eq!(fs.open_root().unwrap().names().unwrap(), ["big"]);
}

#[test]
fn test_removing_open_file_defers_reclamation() {
    let disk = MemoryDisk::new(64);
    let fs = FileSystem::format(&disk).unwrap();
    fs.create("/x", 0).unwrap();
    let inode = fs.open_inode("/x").unwrap();
    let first = inode.write_at(&random_bytes(100_000, 6), 0).unwrap();
    assert!(first > 0);

    fs.remove("/x").unwrap();
    assert!(matches!(fs.open_inode("/x"), Err(Error::NotFound)));

    // The open handle still reads and writes.
    let mut buf = [0_u8; 16];
    assert_eq!(inode.read_at(&mut buf, 0).unwrap(), buf.len());
    assert_eq!(inode.write_at(b"still here", 0).unwrap(), 10);

    // Last close frees the whole index tree; the space is usable again.
    drop(inode);
    fs.create("/y", 0).unwrap();
    let second = fs
        .open_inode("/y")
        .unwrap()
        .write_at(&random_bytes(100_000, 7), 0)
        .unwrap();
    assert!(second >= first);
}

#[test]
fn test_append_after_remount_continues_at_end() {
    let disk = MemoryDisk::new(256);
    let fs = FileSystem::format(&disk).unwrap();
    fs.create("/log", 0).unwrap();
    fs.open_inode("/log").unwrap().append(b"one").unwrap();
    fs.close().unwrap();

    let fs = FileSystem::mount(&disk).unwrap();
    let inode = fs.open_inode("/log").unwrap();
    inode.append(b"two").unwrap();
    let mut buf = [0_u8; 6];
    assert_eq!(inode.read_at(&mut buf, 0).unwrap(), 6);
    assert_eq!(&buf, b"onetwo");
}

#[test]
fn test_max_file_offset_is_enforced() {
    let disk = MemoryDisk::new(256);
    let fs = FileSystem::format(&disk).unwrap();
    fs.create("/f", 0).unwrap();
    let inode = fs.open_inode("/f").unwrap();
    assert_eq!(inode.write_at(b"x", sectorfs::MAX_FILE_BYTES).unwrap(), 0);
    assert_eq!(inode.length().unwrap(), 0);
}

#[test]
fn test_root_sector_is_stable() {
    let disk = MemoryDisk::new(256);
    let fs = FileSystem::format(&disk).unwrap();
    assert_eq!(
        fs.open_root().unwrap().inode().sector(),
        ROOT_DIR_SECTOR
    );
}
