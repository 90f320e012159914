/// Number of slots in the buffer cache.
pub const CACHE_SLOTS: usize = 64;
