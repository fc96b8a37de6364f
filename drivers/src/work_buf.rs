/*++

Licensed under the Apache-2.0 license.

File Name:

    work_buf.rs

Abstract:

    File contains the boot work buffer: a bump allocator over a caller
    supplied byte buffer.

--*/

use crate::cprintln;
use vboot_error::{VbootError, VbootResult};
use zeroize::Zeroize;

/// Allocation alignment in bytes
pub const WORKBUF_ALIGN: usize = 16;

/// Work buffer size that fits a firmware verification with the largest keys
pub const WORKBUF_RECOMMENDED_SIZE: usize = 12 * 1024;

/// Smallest work buffer a boot context accepts
pub const WORKBUF_MIN_SIZE: usize = 1024;

/// Handle to an allocation inside the work buffer
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct WorkBufRegion {
    offset: u32,
    size: u32,
}

impl WorkBufRegion {
    /// Offset from the start of the work buffer
    pub fn offset(&self) -> usize {
        self.offset as usize
    }

    /// Size of the allocation
    pub fn size(&self) -> usize {
        self.size as usize
    }
}

/// Work buffer
///
/// Allocations only move forward for the lifetime of the buffer; nothing
/// is freed. The used part is wiped when the buffer is dropped.
pub struct WorkBuf<'a> {
    buf: &'a mut [u8],
    used: usize,
}

fn align_up(val: usize) -> Option<usize> {
    val.checked_add(WORKBUF_ALIGN - 1)
        .map(|v| v & !(WORKBUF_ALIGN - 1))
}

impl<'a> WorkBuf<'a> {
    /// Wrap a caller supplied buffer
    pub fn new(buf: &'a mut [u8]) -> VbootResult<Self> {
        if buf.len() < WORKBUF_MIN_SIZE {
            cprintln!("[workbuf] Buffer too small: {}", buf.len());
            return Err(VbootError::WORKBUF_TOO_SMALL);
        }
        Ok(Self { buf, used: 0 })
    }

    /// Total size of the buffer
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Bytes consumed by allocations, including alignment padding
    pub fn used(&self) -> usize {
        self.used
    }

    /// Bytes still available
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.used
    }

    /// Allocate `size` zeroed bytes
    pub fn alloc(&mut self, size: usize) -> VbootResult<WorkBufRegion> {
        let end = self
            .used
            .checked_add(size)
            .filter(|end| *end <= self.buf.len())
            .ok_or(VbootError::WORKBUF_ALLOC_SIZE)?;
        let next = align_up(end)
            .map(|next| core::cmp::min(next, self.buf.len()))
            .ok_or(VbootError::WORKBUF_ALLOC_SIZE)?;

        let region = WorkBufRegion {
            offset: self.used as u32,
            size: size as u32,
        };
        self.buf[self.used..end].fill(0);
        self.used = next;
        Ok(region)
    }

    /// Allocate a copy of `data`
    pub fn alloc_copy(&mut self, data: &[u8]) -> VbootResult<WorkBufRegion> {
        let region = self.alloc(data.len())?;
        self.get_mut(region)?.copy_from_slice(data);
        Ok(region)
    }

    fn range(&self, region: WorkBufRegion) -> VbootResult<core::ops::Range<usize>> {
        let start = region.offset();
        let end = start
            .checked_add(region.size())
            .filter(|end| *end <= self.used)
            .ok_or(VbootError::WORKBUF_INVALID_REGION)?;
        Ok(start..end)
    }

    /// Contents of an allocation
    pub fn get(&self, region: WorkBufRegion) -> VbootResult<&[u8]> {
        let range = self.range(region)?;
        Ok(&self.buf[range])
    }

    /// Mutable contents of an allocation
    pub fn get_mut(&mut self, region: WorkBufRegion) -> VbootResult<&mut [u8]> {
        let range = self.range(region)?;
        Ok(&mut self.buf[range])
    }

    /// Copy bytes between two allocations
    ///
    /// # Arguments
    ///
    /// * `src` - Source allocation
    /// * `src_offset` - Offset inside `src`
    /// * `dst` - Destination allocation
    /// * `dst_offset` - Offset inside `dst`
    /// * `len` - Number of bytes
    pub fn copy(
        &mut self,
        src: WorkBufRegion,
        src_offset: usize,
        dst: WorkBufRegion,
        dst_offset: usize,
        len: usize,
    ) -> VbootResult<()> {
        let src_range = self.range(src)?;
        let dst_range = self.range(dst)?;
        let sub = |range: core::ops::Range<usize>, offset: usize| {
            range
                .start
                .checked_add(offset)
                .and_then(|start| Some(start..start.checked_add(len)?))
                .filter(|sub| sub.end <= range.end)
                .ok_or(VbootError::WORKBUF_INVALID_REGION)
        };
        let from = sub(src_range, src_offset)?;
        let to = sub(dst_range, dst_offset)?;
        self.buf.copy_within(from, to.start);
        Ok(())
    }
}

impl Drop for WorkBuf<'_> {
    fn drop(&mut self) {
        self.buf[..self.used].zeroize();
    }
}
