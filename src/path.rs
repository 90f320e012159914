//! Path resolution.
//!
//! Paths are `/`-delimited; a leading `/` is absolute. The host prefixes
//! relative names with its current-directory string before they reach
//! this crate, so both shapes walk from the root here. Empty components
//! are elided, which also makes a trailing `/` harmless.

use crate::{
    device::BlockDevice,
    dir::Dir,
    error::Error,
    fs::FileSystem,
    inode::{self, Inode},
    repr::ROOT_DIR_SECTOR,
};

/// Splits the next path component off `path`.
///
/// Returns the component and the remainder with leading slashes removed,
/// or `None` when no component is left:
///
/// * `"a/bb/c"` → `("a", "bb/c")`
/// * `"///a//bb"` → `("a", "bb")`
/// * `"a/"` → `("a", "")`
/// * `""`, `"///"` → `None`
fn skip_elem(path: &str) -> Option<(&str, &str)> {
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        return None;
    }
    let end = memchr::memchr(b'/', path.as_bytes()).unwrap_or(path.len());
    let (elem, rest) = path.split_at(end);
    Some((elem, rest.trim_start_matches('/')))
}

/// Resolves `path` to an inode, walking directories from the root.
///
/// The empty path resolves to the root directory's inode.
pub(crate) fn resolve<'fs, D: BlockDevice>(
    fs: &'fs FileSystem<D>,
    path: &str,
) -> Result<Inode<'fs, D>, Error> {
    let mut ip = inode::open(fs, ROOT_DIR_SECTOR)?;
    let mut rest = path;
    while let Some((name, after)) = skip_elem(rest) {
        rest = after;
        ip = Dir::from_inode(ip)?.lookup(name)?;
    }
    Ok(ip)
}

/// Resolves `path` up to its final component.
///
/// Returns the parent directory and the final component. The empty path
/// has no parent (the root can be neither created nor removed).
pub(crate) fn resolve_parent<'fs, 'p, D: BlockDevice>(
    fs: &'fs FileSystem<D>,
    path: &'p str,
) -> Result<(Dir<'fs, D>, &'p str), Error> {
    let mut ip = inode::open(fs, ROOT_DIR_SECTOR)?;
    let mut rest = path;
    while let Some((name, after)) = skip_elem(rest) {
        let dir = Dir::from_inode(ip)?;
        if skip_elem(after).is_none() {
            // Stop one level early.
            return Ok((dir, name));
        }
        rest = after;
        ip = dir.lookup(name)?;
    }
    Err(Error::NotFound)
}
