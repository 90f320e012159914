//! Sequential file handles.
//!
//! A [`File`] pairs an open inode with a byte position, giving hosts the
//! usual read/write/seek surface. It also carries the deny-write pairing
//! used for "this file is currently an executable" semantics: denial is
//! bound to the handle and undone automatically when the handle closes.

use crate::{device::BlockDevice, error::Error, inode::Inode};

pub struct File<'fs, D: BlockDevice> {
    inode: Inode<'fs, D>,
    pos: u64,
    writes_denied: bool,
}

impl<'fs, D: BlockDevice> File<'fs, D> {
    pub(crate) fn new(inode: Inode<'fs, D>) -> Self {
        Self {
            inode,
            pos: 0,
            writes_denied: false,
        }
    }

    #[must_use]
    pub fn inode(&self) -> &Inode<'fs, D> {
        &self.inode
    }

    /// Reads from the current position, advancing it by the count read.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        let n = self.inode.read_at(buf, self.pos)?;
        self.pos += n as u64;
        Ok(n)
    }

    /// Writes at the current position, advancing it by the count written.
    pub fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
        let n = self.inode.write_at(buf, self.pos)?;
        self.pos += n as u64;
        Ok(n)
    }

    pub fn seek(&mut self, pos: u64) {
        self.pos = pos;
    }

    #[must_use]
    pub fn tell(&self) -> u64 {
        self.pos
    }

    pub fn length(&self) -> Result<u64, Error> {
        self.inode.length()
    }

    /// Blocks writes to the underlying inode through any handle until
    /// this handle allows them again or closes.
    pub fn deny_write(&mut self) {
        if !self.writes_denied {
            self.inode.deny_write();
            self.writes_denied = true;
        }
    }

    /// Undoes this handle's [`deny_write`](Self::deny_write), if any.
    pub fn allow_write(&mut self) {
        if self.writes_denied {
            self.inode.allow_write();
            self.writes_denied = false;
        }
    }
}

impl<D: BlockDevice> Drop for File<'_, D> {
    fn drop(&mut self) {
        self.allow_write();
    }
}
