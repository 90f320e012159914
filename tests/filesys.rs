//! Facade-level behavior: naming, directories, persistence, flushing.

use sectorfs::{BlockDevice as _, Error, FileSystem, MemoryDisk, SECTOR_SIZE, SectorNo};

fn dump(disk: &MemoryDisk) -> Vec<[u8; SECTOR_SIZE]> {
    (0..disk.sector_count())
        .map(|i| {
            let mut data = [0; SECTOR_SIZE];
            disk.read(SectorNo::new(i), &mut data).unwrap();
            data
        })
        .collect()
}

#[test]
fn test_write_survives_remount() {
    let disk = MemoryDisk::new(256);
    let fs = FileSystem::format(&disk).unwrap();
    fs.create("a", 0).unwrap();
    let mut file = fs.open("a").unwrap();
    assert_eq!(file.write(b"hello").unwrap(), 5);
    assert_eq!(file.length().unwrap(), 5);
    drop(file);
    fs.close().unwrap();

    let fs = FileSystem::mount(&disk).unwrap();
    let mut file = fs.open("a").unwrap();
    let mut buf = [0_u8; 5];
    assert_eq!(file.read(&mut buf).unwrap(), 5);
    assert_eq!(&buf, b"hello");
    assert_eq!(file.length().unwrap(), 5);
}

#[test]
fn test_create_rejects_duplicate_names() {
    let disk = MemoryDisk::new(256);
    let fs = FileSystem::format(&disk).unwrap();
    fs.create("/a", 0).unwrap();
    assert!(matches!(fs.create("/a", 0), Err(Error::AlreadyExists)));
    assert!(matches!(fs.create_dir("/a"), Err(Error::AlreadyExists)));
    fs.close().unwrap();
}

#[test]
fn test_open_missing_name() {
    let disk = MemoryDisk::new(256);
    let fs = FileSystem::format(&disk).unwrap();
    assert!(matches!(fs.open("/nope"), Err(Error::NotFound)));
    assert!(matches!(fs.remove("/nope"), Err(Error::NotFound)));
    assert!(matches!(fs.open("/no/pe"), Err(Error::NotFound)));
}

#[test]
fn test_open_rejects_directories() {
    let disk = MemoryDisk::new(256);
    let fs = FileSystem::format(&disk).unwrap();
    fs.create_dir("/d").unwrap();
    assert!(matches!(fs.open("/d"), Err(Error::IsADirectory)));
    // The inode-level open takes either kind.
    assert!(fs.open_inode("/d").unwrap().is_dir().unwrap());
}

#[test]
fn test_file_as_path_component_fails() {
    let disk = MemoryDisk::new(256);
    let fs = FileSystem::format(&disk).unwrap();
    fs.create("/f", 0).unwrap();
    assert!(matches!(fs.create("/f/g", 0), Err(Error::NotADirectory)));
    assert!(matches!(fs.open("/f/g"), Err(Error::NotADirectory)));
}

#[test]
fn test_empty_path_is_root_only() {
    let disk = MemoryDisk::new(256);
    let fs = FileSystem::format(&disk).unwrap();
    assert!(fs.open_inode("").unwrap().is_dir().unwrap());
    assert!(fs.open_inode("/").unwrap().is_dir().unwrap());
    assert!(matches!(fs.create("/", 0), Err(Error::NotFound)));
    assert!(matches!(fs.remove("/"), Err(Error::NotFound)));
}

#[test]
fn test_name_length_limit() {
    let disk = MemoryDisk::new(256);
    let fs = FileSystem::format(&disk).unwrap();
    fs.create("/abcdefghijklmn", 0).unwrap();
    assert!(matches!(
        fs.create("/abcdefghijklmno", 0),
        Err(Error::NameTooLong)
    ));
}

#[test]
fn test_remove_persists_across_remount() {
    let disk = MemoryDisk::new(256);
    let fs = FileSystem::format(&disk).unwrap();
    fs.create("/gone", 0).unwrap();
    fs.open("/gone").unwrap().write(b"data").unwrap();
    fs.remove("/gone").unwrap();
    assert!(matches!(fs.open("/gone"), Err(Error::NotFound)));
    fs.close().unwrap();

    let fs = FileSystem::mount(&disk).unwrap();
    assert!(matches!(fs.open("/gone"), Err(Error::NotFound)));
}

#[test]
fn test_non_empty_directory_cannot_be_removed() {
    let disk = MemoryDisk::new(256);
    let fs = FileSystem::format(&disk).unwrap();
    fs.create_dir("/d").unwrap();
    fs.create("/d/f", 0).unwrap();
    assert!(matches!(fs.remove("/d"), Err(Error::DirectoryNotEmpty)));
    fs.remove("/d/f").unwrap();
    fs.remove("/d").unwrap();
    assert!(matches!(fs.open_dir("/d"), Err(Error::NotFound)));
}

#[test]
fn test_nested_directories() {
    let disk = MemoryDisk::new(256);
    let fs = FileSystem::format(&disk).unwrap();
    fs.create_dir("/a").unwrap();
    fs.create_dir("/a/b").unwrap();
    fs.create("/a/b/c", 0).unwrap();
    fs.open("/a/b/c").unwrap().write(b"deep").unwrap();

    let dir = fs.open_dir("/a/b").unwrap();
    assert_eq!(dir.names().unwrap(), ["c"]);
    assert!(!dir.is_empty().unwrap());
    drop(dir);
    fs.close().unwrap();

    let fs = FileSystem::mount(&disk).unwrap();
    let mut buf = [0_u8; 4];
    fs.open("/a/b/c").unwrap().read(&mut buf).unwrap();
    assert_eq!(&buf, b"deep");
    assert_eq!(fs.open_root().unwrap().names().unwrap(), ["a"]);
}

#[test]
fn test_removed_entry_slot_is_reused() {
    let disk = MemoryDisk::new(256);
    let fs = FileSystem::format(&disk).unwrap();
    fs.create("/a", 0).unwrap();
    fs.create("/b", 0).unwrap();
    let root_len = fs.open_root().unwrap().inode().length().unwrap();

    fs.remove("/a").unwrap();
    fs.create("/c", 0).unwrap();
    // "/c" lands in the record "/a" vacated; the directory did not grow.
    assert_eq!(fs.open_root().unwrap().inode().length().unwrap(), root_len);
    assert_eq!(fs.open_root().unwrap().names().unwrap(), ["c", "b"]);
}

#[test]
fn test_initial_size_is_all_hole() {
    let disk = MemoryDisk::new(64);
    let fs = FileSystem::format(&disk).unwrap();
    // Larger than the free space on this device; still fine, since no
    // data sectors back it until writes arrive.
    fs.create("/sparse", 100_000).unwrap();
    let inode = fs.open_inode("/sparse").unwrap();
    assert_eq!(inode.length().unwrap(), 100_000);
    let mut buf = [0xff_u8; 1000];
    assert_eq!(inode.read_at(&mut buf, 50_000).unwrap(), 1000);
    assert!(buf.iter().all(|&b| b == 0));
}

#[test]
fn test_deny_write_blocks_all_handles() {
    let disk = MemoryDisk::new(256);
    let fs = FileSystem::format(&disk).unwrap();
    fs.create("/exe", 0).unwrap();

    let mut loader = fs.open("/exe").unwrap();
    loader.deny_write();
    assert_eq!(fs.open("/exe").unwrap().write(b"overwrite").unwrap(), 0);
    assert_eq!(loader.inode().write_at(b"x", 0).unwrap(), 0);

    // Dropping the denying handle re-permits writes.
    drop(loader);
    assert_eq!(fs.open("/exe").unwrap().write(b"overwrite").unwrap(), 9);
}

#[test]
fn test_flush_is_idempotent_on_disk_contents() {
    let disk = MemoryDisk::new(256);
    let fs = FileSystem::format(&disk).unwrap();
    fs.create("/f", 0).unwrap();
    fs.open("/f").unwrap().write(b"payload").unwrap();

    fs.flush().unwrap();
    let before = dump(&disk);
    fs.flush().unwrap();
    fs.flush().unwrap();
    assert_eq!(dump(&disk), before);
}

#[test]
fn test_flushed_image_mounts_without_close() {
    let disk = MemoryDisk::new(256);
    let fs = FileSystem::format(&disk).unwrap();
    fs.create("/f", 0).unwrap();
    fs.open("/f").unwrap().write(b"kept").unwrap();
    fs.flush().unwrap();
    // Abandon without close; the flushed image must stand on its own.
    drop(fs);

    let fs = FileSystem::mount(&disk).unwrap();
    let mut buf = [0_u8; 4];
    fs.open("/f").unwrap().read(&mut buf).unwrap();
    assert_eq!(&buf, b"kept");
}

#[test]
fn test_seek_and_tell() {
    let disk = MemoryDisk::new(256);
    let fs = FileSystem::format(&disk).unwrap();
    fs.create("/f", 0).unwrap();
    let mut file = fs.open("/f").unwrap();
    file.write(b"abcdef").unwrap();
    assert_eq!(file.tell(), 6);
    file.seek(2);
    let mut buf = [0_u8; 2];
    file.read(&mut buf).unwrap();
    assert_eq!(&buf, b"cd");
    assert_eq!(file.tell(), 4);
}
