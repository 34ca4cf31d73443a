use std::ops::Range;

use memchr::memmem;
use memproc_core::{Gfn, PAGE_MASK, PAGE_SIZE, Pa, PhysicalMemory, VmmError};
use zerocopy::{
    FromBytes,
    byteorder::little_endian::{U32, U64},
};

use crate::{EprocessLayout, WindowsError};

/// Number of bytes read from the backend per scan step.
const CHUNK_SIZE: u64 = 2 * 1024 * 1024;

/// Tail of the previous chunk kept in front of the current one, so that a
/// process object split across the chunk boundary is still seen whole.
const BACKLOG: usize = PAGE_SIZE as usize;

fn read_u64(buffer: &[u8], offset: usize) -> Option<u64> {
    let bytes = buffer.get(offset..offset.checked_add(8)?)?;
    U64::read_from_bytes(bytes).ok().map(U64::get)
}

fn read_u32(buffer: &[u8], offset: usize) -> Option<u32> {
    let bytes = buffer.get(offset..offset.checked_add(4)?)?;
    U32::read_from_bytes(bytes).ok().map(U32::get)
}

/// Address of `offset` within a buffer that starts at `base`.
///
/// The first scan chunk starts below the scanned range, so `base` may have
/// wrapped; any offset that actually holds data maps back into the range.
fn address(base: Pa, offset: usize) -> Pa {
    Pa(base.0.wrapping_add(offset as u64))
}

/// Checks whether the paging root of a process object sits at `offset`.
fn match_header(layout: &EprocessLayout, buffer: &[u8], offset: usize) -> Option<u64> {
    let dtb = read_u64(buffer, offset)?;
    if dtb == 0 || dtb & layout.dtb_reserved_mask != 0 {
        return None;
    }

    for &delta in &layout.pointer_offsets {
        let pointer = read_u64(buffer, offset.checked_sub(delta)?)?;
        if pointer & layout.kernel_pointer_mask != layout.kernel_pointer_mask {
            return None;
        }
    }

    let signal_state = read_u32(buffer, offset.checked_sub(layout.signal_state_offset)?)?;
    if signal_state != 0 {
        return None;
    }

    Some(dtb)
}

/// Recovers the kernel paging root from the system process object.
///
/// `buffer` holds physical memory starting at `base`, and `offset` is the
/// position in it where the image name `"System"` is expected. If the name
/// matches, the bytes before it are searched for the head of the process
/// object: a plausible paging root preceded by four kernel-space pointers
/// and a zero 32-bit field.
///
/// The buffer length must be a multiple of 8 and both the length and the
/// offset must be at least the scan window (0x500 bytes), otherwise `None`
/// is returned without looking at the contents.
///
/// This is a heuristic. A hit should be confirmed by successfully walking
/// the process list through the returned paging root.
pub fn find_paging_root(buffer: &[u8], base: Pa, offset: usize) -> Option<Pa> {
    find_paging_root_with_layout(&EprocessLayout::WIN64, buffer, base, offset)
}

/// Like [`find_paging_root`], with explicit layout constants.
pub fn find_paging_root_with_layout(
    layout: &EprocessLayout,
    buffer: &[u8],
    base: Pa,
    offset: usize,
) -> Option<Pa> {
    let len = buffer.len();

    if len < offset.checked_add(8)? {
        return None;
    }

    if len % 8 != 0 || len < layout.scan_window || offset < layout.scan_window {
        return None;
    }

    if read_u64(buffer, offset)? != layout.name_signature {
        return None;
    }

    if read_u64(buffer, offset + 8)? & layout.name_padding_mask != 0 {
        return None;
    }

    (0..layout.scan_window)
        .step_by(8)
        .map(|back| offset - back)
        .find_map(|position| {
            let dtb = match_header(layout, buffer, position)?;

            tracing::trace!(
                name = %address(base, offset),
                header = %address(base, position),
                dtb = %Pa(dtb),
                "process object candidate"
            );

            Some(Pa(dtb & PAGE_MASK))
        })
}

/// Scans a range of physical memory for the system process object and
/// returns the kernel paging root found in it.
///
/// Pages the backend cannot provide are treated as zero-filled; other
/// backend errors abort the scan.
pub fn scan_for_paging_root(
    driver: &impl PhysicalMemory,
    range: Range<Pa>,
) -> Result<Option<Pa>, VmmError> {
    scan_for_paging_root_with_layout(driver, range, &EprocessLayout::WIN64)
}

/// Like [`scan_for_paging_root`], with explicit layout constants.
pub fn scan_for_paging_root_with_layout(
    driver: &impl PhysicalMemory,
    range: Range<Pa>,
    layout: &EprocessLayout,
) -> Result<Option<Pa>, VmmError> {
    layout.validate()?;

    if range.start >= range.end {
        return Err(WindowsError::InvalidRange {
            start: range.start,
            end: range.end,
        }
        .into());
    }

    if layout.scan_window + layout.signal_state_offset > BACKLOG {
        return Err(WindowsError::InvalidLayout("scan window exceeds the chunk backlog").into());
    }

    tracing::debug!(start = %range.start, end = %range.end, "scanning for system process");

    let needle = layout.name_signature.to_le_bytes();
    let finder = memmem::Finder::new(&needle);

    let mut buffer = vec![0u8; BACKLOG + CHUNK_SIZE as usize];
    let mut chunk = range.start.page_align();

    while chunk < range.end {
        let chunk_size = (range.end - chunk).min(CHUNK_SIZE);
        let pages = chunk_size.div_ceil(PAGE_SIZE);
        let len = BACKLOG + (pages * PAGE_SIZE) as usize;

        let mut present = 0;
        for (index, slot) in buffer[BACKLOG..len]
            .chunks_exact_mut(PAGE_SIZE as usize)
            .enumerate()
        {
            let gfn = Gfn(chunk.gfn().0 + index as u64);

            match driver.read_page(gfn) {
                Ok(page) => {
                    let size = page.len().min(slot.len());
                    slot[..size].copy_from_slice(&page[..size]);
                    slot[size..].fill(0);
                    present += 1;
                }
                Err(VmmError::PageNotPresent(_)) => slot.fill(0),
                Err(err) => return Err(err),
            }
        }

        if present > 0 {
            // The backlog of the first chunk lies below the range; it is
            // zero-filled and never matches.
            let base = Pa(chunk.0.wrapping_sub(BACKLOG as u64));

            // Start one qword into the backlog: a name at the very end of the
            // previous chunk could not be checked against its padding there.
            let origin = BACKLOG - 8;
            let window = &buffer[..len];

            for position in finder.find_iter(&window[origin..]) {
                let offset = origin + position;
                if offset % 8 != 0 {
                    continue;
                }

                if let Some(dtb) = find_paging_root_with_layout(layout, window, base, offset) {
                    tracing::info!(%dtb, name = %address(base, offset), "found system process");
                    return Ok(Some(dtb));
                }
            }
        }
        else {
            tracing::trace!(%chunk, "skipping unreadable chunk");
        }

        buffer.copy_within(len - BACKLOG..len, 0);
        chunk = chunk + pages * PAGE_SIZE;
    }

    Ok(None)
}
