//! K-way run merger.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use crate::mmap::{MapUsage, MappedRegion, MappedRegionMut};
use crate::scan::LineScanner;
use crate::sort::SortError;

/// Sliding read-write window over the output file.
///
/// Covers `[offset, offset + min(window_size, total - offset))`; when the
/// write cursor reaches the window's end the mapping is released, flushing
/// its pages, before the next window is created.
struct OutputWindow {
    path: PathBuf,
    total: u64,
    window_size: usize,
    offset: u64,
    cursor: usize,
    map: Option<MappedRegionMut>,
}

impl OutputWindow {
    /// Maps the first window of a file of `total` bytes. `total` must be
    /// non-zero.
    fn create(path: &Path, total: u64, window_size: usize) -> Result<OutputWindow, SortError> {
        let mut window = OutputWindow {
            path: path.to_path_buf(),
            total,
            window_size,
            offset: 0,
            cursor: 0,
            map: None,
        };
        window.map = Some(window.map_window(0)?);
        Ok(window)
    }

    fn map_window(&self, offset: u64) -> Result<MappedRegionMut, SortError> {
        if offset >= self.total {
            return Err(SortError::IO(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "write past the end of the output allocation",
            )));
        }
        let len = u64::min(self.window_size as u64, self.total - offset) as usize;
        let map = MappedRegionMut::map(&self.path, offset, len)?;
        map.advise(MapUsage::Sequential)?;
        Ok(map)
    }

    fn window_len(&self) -> usize {
        self.map.as_ref().map_or(0, |map| map.len())
    }

    /// Advances to the next window.
    fn roll(&mut self) -> Result<(), SortError> {
        // unmap the current window before the next one is created
        self.map = None;
        self.offset += self.window_size as u64;
        self.cursor = 0;
        self.map = Some(self.map_window(self.offset)?);
        Ok(())
    }

    /// Copies `bytes` at the write cursor, rolling the window forward as
    /// many times as the copy requires.
    fn write(&mut self, mut bytes: &[u8]) -> Result<(), SortError> {
        while !bytes.is_empty() {
            if self.cursor == self.window_len() {
                self.roll()?;
            }
            let cursor = self.cursor;
            let map = self.map.as_mut().expect("current window is mapped");
            let chunk = usize::min(bytes.len(), map.len() - cursor);
            map[cursor..cursor + chunk].copy_from_slice(&bytes[..chunk]);
            self.cursor += chunk;
            bytes = &bytes[chunk..];
        }
        Ok(())
    }

    /// Unmaps the final window and returns the total bytes written.
    fn finish(mut self) -> u64 {
        self.map = None;
        self.offset + self.cursor as u64
    }
}

/// Merges sorted run files into `output_path`.
///
/// Every run must hold newline-terminated lines in ascending byte order,
/// otherwise the result is undefined. The output holds the sorted union of
/// all run lines, newline-separated, with no trailing newline, and is
/// written through a sliding window of `window_size` bytes.
pub fn merge_runs(
    run_paths: &[PathBuf],
    output_path: &Path,
    window_size: usize,
) -> Result<(), SortError> {
    let mut total: u64 = 0;
    for path in run_paths {
        total += fs::metadata(path)?.len();
    }

    let output_file = OpenOptions::new()
        .write(true)
        .create(true)
        .open(output_path)?;
    output_file.set_len(total)?;
    drop(output_file);

    log::info!("merging {} runs ({} bytes)", run_paths.len(), total);

    if total == 0 {
        return Ok(());
    }

    let mut runs: Vec<MappedRegion> = Vec::with_capacity(run_paths.len());
    for path in run_paths {
        let size = fs::metadata(path)?.len() as usize;
        if size == 0 {
            continue;
        }
        let run = MappedRegion::map(path, 0, size)?;
        run.advise(MapUsage::Sequential)?;
        runs.push(run);
    }

    // binary heap is a max-heap by default so line views are reversed to
    // convert it to a min-heap; the run index participates in ordering only
    // as an arbitrary tie-break between equal lines
    let mut cursors: Vec<LineScanner<'_>> = runs.iter().map(|run| LineScanner::new(run)).collect();
    let mut heap: BinaryHeap<(Reverse<&[u8]>, usize)> = BinaryHeap::with_capacity(cursors.len());
    for (idx, cursor) in cursors.iter_mut().enumerate() {
        if let Some(line) = cursor.next() {
            heap.push((Reverse(line.bytes), idx));
        }
    }

    let mut output = OutputWindow::create(output_path, total, window_size)?;
    while let Some((Reverse(line), idx)) = heap.pop() {
        output.write(line)?;
        output.write(b"\n")?;
        if let Some(next) = cursors[idx].next() {
            heap.push((Reverse(next.bytes), idx));
        }
    }

    // Every emitted line was newline-terminated; dropping the last newline
    // yields the newline-separated output. The window is unmapped before
    // the file shrinks under it.
    let written = output.finish();
    let output_file = OpenOptions::new().write(true).open(output_path)?;
    output_file.set_len(written.saturating_sub(1))?;

    Ok(())
}
