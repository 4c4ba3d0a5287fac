//! Region pass: sorts one input window into a run file.

use std::fs::OpenOptions;
use std::mem;
use std::path::Path;

use crate::mmap::{MapUsage, MappedRegion, MappedRegionMut};
use crate::scan::LineScanner;
use crate::sort::SortError;

/// Sorts the complete lines of the input window `[offset, offset + in_size)`
/// into `run_path`, one newline-terminated line after another.
///
/// `carry` holds the unterminated tail of the previous window; it is spliced
/// onto the window's first line before sorting. On return it holds this
/// window's unterminated tail (empty when the window ends on a newline).
///
/// Returns whether anything was written. A window without a single complete
/// line leaves the run file uncommitted so the caller can reuse the path,
/// and the carry grows instead.
pub fn sort_region(
    input_path: &Path,
    offset: u64,
    in_size: usize,
    run_path: &Path,
    carry: &mut Vec<u8>,
) -> Result<bool, SortError> {
    // Upper bound: the sorted payload never exceeds the window plus the
    // carried prefix.
    let out_size = in_size + carry.len();
    let run_file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(run_path)?;
    run_file.set_len(out_size as u64)?;
    drop(run_file);

    let input = MappedRegion::map(input_path, offset, in_size)?;
    input.advise(MapUsage::Random)?;
    let mut run = MappedRegionMut::map(run_path, 0, out_size)?;
    run.advise(MapUsage::Sequential)?;

    // The first line is the only one that may span two windows; when a carry
    // is pending it is materialized into an owning buffer, since the previous
    // window's mapping is long gone.
    let mut first_line: Vec<u8> = Vec::new();
    let mut lines: Vec<&[u8]> = Vec::new();
    let mut scanner = LineScanner::new(&input);

    if let Some(first) = scanner.next() {
        if carry.is_empty() {
            if first.terminated {
                lines.push(first.bytes);
            } else {
                carry.extend_from_slice(first.bytes);
            }
        } else {
            first_line = mem::take(carry);
            first_line.extend_from_slice(first.bytes);
            if first.terminated {
                lines.push(&first_line);
            } else {
                *carry = mem::take(&mut first_line);
            }
        }
    }
    for line in scanner {
        if line.terminated {
            lines.push(line.bytes);
        } else {
            // carry was consumed above, so this is a plain assignment
            carry.extend_from_slice(line.bytes);
        }
    }

    lines.sort_unstable();

    log::debug!("region at offset {}: {} complete lines", offset, lines.len());

    let mut pos = 0;
    for line in &lines {
        run[pos..pos + line.len()].copy_from_slice(line);
        pos += line.len();
        run[pos] = b'\n';
        pos += 1;
    }

    if lines.is_empty() {
        return Ok(false);
    }

    // Release the mapping before shrinking the file under it.
    drop(run);
    let run_file = OpenOptions::new().write(true).open(run_path)?;
    run_file.set_len(pos as u64)?;

    Ok(true)
}
