use crate::repr::{NAME_MAX, SectorNo};

/// Errors surfaced by file system operations.
///
/// Contract violations (out-of-range sector offsets, unbalanced
/// `allow_write`, handles from a different file system) are not errors,
/// they are bugs, and abort via assertion instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The free map could not grant a sector.
    #[error("no free sectors left on the device")]
    DiskFull,
    /// The name already exists in the target directory.
    #[error("name already exists")]
    AlreadyExists,
    /// A path component did not resolve.
    #[error("no such file or directory")]
    NotFound,
    /// A non-final path component, or a directory operand, is not a directory.
    #[error("not a directory")]
    NotADirectory,
    /// A file-only operation was applied to a directory.
    #[error("is a directory")]
    IsADirectory,
    /// A directory still holding entries cannot be removed.
    #[error("directory is not empty")]
    DirectoryNotEmpty,
    /// A path component exceeds [`NAME_MAX`] bytes.
    #[error("name longer than {NAME_MAX} bytes")]
    NameTooLong,
    /// An inode sector failed its magic check.
    #[error("inode at sector {sector} is corrupted")]
    Corrupted { sector: SectorNo },
    /// The block device reported an I/O failure.
    #[error(transparent)]
    Disk(#[from] DiskError),
}

/// An I/O failure reported by a [`BlockDevice`](crate::BlockDevice).
///
/// The file system does not retry or recover; the error propagates to the
/// caller with the failing sector attached.
#[derive(Debug, thiserror::Error)]
#[error("disk I/O failed at sector {sector}")]
pub struct DiskError {
    pub sector: SectorNo,
}
