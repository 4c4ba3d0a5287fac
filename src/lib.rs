//! `fsort` is a memory-mapped external line sorter.
//!
//! External sorting is a class of sorting algorithms that can handle massive amounts of data:
//! it is required when the file being sorted does not fit into the main memory (RAM) of a
//! computer. Sorting is achieved in two passes. During the first pass the input is partitioned
//! into fixed-size region windows whose complete lines are sorted in memory and written to
//! temporary run files; during the second pass the runs are merged through a min-heap into the
//! output file. For more information see
//! [External Sorting](https://en.wikipedia.org/wiki/External_sorting).
//!
//! Both passes work on memory-mapped views of the underlying files rather than buffered I/O:
//! the input is read through per-region read-only mappings and the output is written through a
//! sliding read-write window. Lines are compared as raw bytes, so the order is byte-lexicographic
//! and sorting is not locale-aware. The output separates lines with single newlines and writes
//! no trailing newline after the final line.
//!
//! A line longer than one region window is carried in memory until its terminating newline is
//! found, so peak memory grows with the longest input line.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use fsort::FileSorterBuilder;
//!
//! fn main() {
//!     let mut sorter = FileSorterBuilder::new()
//!         .with_num_pages(250)
//!         .with_tmp_dir(Path::new("./fsort_tmp"))
//!         .build()
//!         .unwrap();
//!
//!     sorter
//!         .sort_file(Path::new("input.txt"), Path::new("output.txt"))
//!         .unwrap();
//! }
//! ```

pub mod merger;
pub mod mmap;
pub mod region;
pub mod scan;
pub mod sort;

pub use merger::merge_runs;
pub use mmap::{page_size, MapUsage, MappedRegion, MappedRegionMut};
pub use region::sort_region;
pub use scan::{LineScanner, ScannedLine};
pub use sort::{FileSorter, FileSorterBuilder, SortError, DEFAULT_NUM_PAGES};
