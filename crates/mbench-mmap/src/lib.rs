//! Anonymous shared memory for the benchmark harness's pre-`fork()` state.
//!
//! A `SharedRegion` is an anonymous `MAP_SHARED` mapping: `memmap2`'s
//! anonymous mappings are shared (not private), so anything the parent
//! writes into one before calling `fork()` stays visible to every worker
//! process afterward, with no file or path involved. The harness uses one
//! region for the phase barrier + sample ring and a second for
//! thread-specific scratch space.

use memmap2::MmapMut;
use std::io;

pub struct SharedRegion {
    mmap: MmapMut,
}

impl SharedRegion {
    /// Allocates a new zero-filled anonymous shared mapping of `len` bytes.
    pub fn new(len: usize) -> io::Result<Self> {
        let mmap = memmap2::MmapOptions::new().len(len).map_anon()?;
        Ok(Self { mmap })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.mmap.as_ptr()
    }

    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.mmap.as_mut_ptr()
    }

    /// Returns a typed pointer into the region at byte `offset`.
    ///
    /// # Safety
    /// The caller must ensure `offset + size_of::<T>() <= self.len()` and
    /// that `T`'s alignment is satisfied at that offset; this is a raw
    /// reinterpretation of mapped bytes, not a bounds- or type-checked cast.
    #[inline]
    pub unsafe fn typed_ptr<T>(&self, offset: usize) -> *mut T {
        unsafe { self.mmap.as_ptr().add(offset) as *mut T }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_region_is_zeroed() {
        let region = SharedRegion::new(4096).unwrap();
        let bytes = unsafe { std::slice::from_raw_parts(region.as_ptr(), region.len()) };
        assert!(bytes.iter().all(|&b| b == 0));
    }

    #[test]
    fn writes_are_visible_through_a_second_pointer() {
        let mut region = SharedRegion::new(4096).unwrap();
        unsafe {
            let p = region.as_mut_ptr();
            *p.add(0) = 0xAB;
            *p.add(1) = 0xCD;
        }
        let p2 = region.as_ptr();
        unsafe {
            assert_eq!(*p2.add(0), 0xAB);
            assert_eq!(*p2.add(1), 0xCD);
        }
    }

    #[test]
    fn typed_ptr_round_trips_a_value() {
        let mut region = SharedRegion::new(4096).unwrap();
        unsafe {
            let p: *mut u64 = region.typed_ptr(8);
            p.write(0x1122_3344_5566_7788);
            assert_eq!(*region.typed_ptr::<u64>(8), 0x1122_3344_5566_7788);
        }
        let _ = &mut region;
    }
}
