//! External file sorter.

use std::env;
use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::fs;
use std::io;
use std::io::prelude::*;
use std::path::{Path, PathBuf};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::merger::merge_runs;
use crate::mmap;
use crate::region::sort_region;

/// Length of the random run-file names.
const TMP_NAME_LEN: usize = 5;

/// Default number of pages per region.
pub const DEFAULT_NUM_PAGES: usize = 250;

/// Sorting error.
#[derive(Debug)]
pub enum SortError {
    /// Region size or temp directory configuration rejected.
    Config(String),
    /// Input or output path is not a regular file.
    Input(String),
    /// Common I/O error.
    IO(io::Error),
}

impl Error for SortError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self {
            SortError::Config(_) => None,
            SortError::Input(_) => None,
            SortError::IO(err) => Some(err),
        }
    }
}

impl Display for SortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            SortError::Config(msg) => write!(f, "invalid configuration: {}", msg),
            SortError::Input(msg) => write!(f, "invalid input: {}", msg),
            SortError::IO(err) => write!(f, "I/O operation failed: {}", err),
        }
    }
}

impl From<io::Error> for SortError {
    fn from(err: io::Error) -> SortError {
        SortError::IO(err)
    }
}

/// File sorter builder. Provides methods for [`FileSorter`] initialization.
#[derive(Clone)]
pub struct FileSorterBuilder {
    /// Number of pages spanned by one region window.
    num_pages: usize,
    /// Directory to be used to store run files.
    tmp_dir: Option<Box<Path>>,
}

impl FileSorterBuilder {
    /// Creates an instance of a builder with default parameters.
    pub fn new() -> Self {
        FileSorterBuilder::default()
    }

    /// Sets the number of pages spanned by one region window.
    pub fn with_num_pages(mut self, num_pages: usize) -> FileSorterBuilder {
        self.num_pages = num_pages;
        return self;
    }

    /// Sets directory to be used to store run files.
    pub fn with_tmp_dir(mut self, path: &Path) -> FileSorterBuilder {
        self.tmp_dir = Some(path.into());
        return self;
    }

    /// Builds a [`FileSorter`] instance using provided configuration.
    pub fn build(self) -> Result<FileSorter, SortError> {
        FileSorter::new(self.tmp_dir.as_deref(), self.num_pages)
    }
}

impl Default for FileSorterBuilder {
    fn default() -> Self {
        FileSorterBuilder {
            num_pages: DEFAULT_NUM_PAGES,
            tmp_dir: None,
        }
    }
}

/// Memory-mapped external file sorter.
///
/// Partitions the input into fixed-size region windows, sorts each window's
/// complete lines into a run file, and merges the runs into the output.
pub struct FileSorter {
    /// Directory holding the run files.
    tmp_dir: PathBuf,
    /// Region window size in bytes; a multiple of the page size below 2³².
    region_size: usize,
    /// Run-file name generator.
    rng: SmallRng,
}

impl FileSorter {
    /// Creates a new file sorter instance.
    ///
    /// # Arguments
    /// * `tmp_path` - Directory to be used to store run files. If the
    ///   parameter is [`None`] the default OS temporary directory is used.
    ///   Must exist and be a directory.
    /// * `num_pages` - Number of OS pages spanned by one region window. The
    ///   resulting region size must stay below 2³² bytes.
    pub fn new(tmp_path: Option<&Path>, num_pages: usize) -> Result<FileSorter, SortError> {
        let tmp_dir = match tmp_path {
            Some(path) => path.to_path_buf(),
            None => env::temp_dir(),
        };
        if !tmp_dir.is_dir() {
            return Err(SortError::Config(format!(
                "{} is not a directory",
                tmp_dir.display()
            )));
        }

        if num_pages == 0 {
            return Err(SortError::Config(
                "a region must span at least one page".to_string(),
            ));
        }
        let page_size = mmap::page_size()?;
        let region_size = num_pages
            .checked_mul(page_size)
            .filter(|size| (*size as u64) < (1 << 32))
            .ok_or_else(|| {
                SortError::Config(format!("a region of {} pages is too large", num_pages))
            })?;

        log::info!("using {} as a temporary directory", tmp_dir.display());

        return Ok(FileSorter {
            tmp_dir,
            region_size,
            rng: SmallRng::from_entropy(),
        });
    }

    /// Sorts the lines of `input_path` into `output_path`.
    ///
    /// The output is created or overwritten; its lines are the input's lines
    /// in ascending byte order, newline-separated, with no trailing newline.
    /// Run files are removed once the output is fully written.
    pub fn sort_file(&mut self, input_path: &Path, output_path: &Path) -> Result<(), SortError> {
        if !input_path.is_file() {
            return Err(SortError::Input(format!(
                "{} is not a regular file",
                input_path.display()
            )));
        }
        if output_path.exists() && !output_path.is_file() {
            return Err(SortError::Input(format!(
                "{} exists and is not a regular file",
                output_path.display()
            )));
        }

        let input_size = fs::metadata(input_path)?.len();
        let region_size = self.region_size as u64;
        let num_regions = (input_size + region_size - 1) / region_size;
        log::info!(
            "sorting {} ({} bytes, {} regions)",
            input_path.display(),
            input_size,
            num_regions
        );

        let mut run_paths: Vec<PathBuf> = Vec::new();
        let mut carry: Vec<u8> = Vec::new();
        // A region without a complete line leaves its path uncommitted; the
        // next region reuses it instead of leaking a file per empty run.
        let mut spare_path: Option<PathBuf> = None;
        for region in 0..num_regions {
            let run_path = match spare_path.take() {
                Some(path) => path,
                None => self.next_tmp_path(),
            };
            let offset = region * region_size;
            let in_size = u64::min(region_size, input_size - offset) as usize;
            if sort_region(input_path, offset, in_size, &run_path, &mut carry)? {
                run_paths.push(run_path);
            } else {
                spare_path = Some(run_path);
            }
        }
        log::debug!("region pass done ({} runs)", run_paths.len());

        if !carry.is_empty() {
            // The trailing partial line becomes a one-line run of its own;
            // the merger treats its newline as the line terminator.
            let run_path = match spare_path.take() {
                Some(path) => path,
                None => self.next_tmp_path(),
            };
            let mut run = fs::File::create(&run_path)?;
            run.write_all(&carry)?;
            run.write_all(b"\n")?;
            run_paths.push(run_path);
        }
        if let Some(path) = spare_path {
            fs::remove_file(&path)?;
        }

        merge_runs(&run_paths, output_path, self.region_size)?;

        for path in &run_paths {
            fs::remove_file(path)?;
        }

        log::info!("sorted into {}", output_path.display());
        return Ok(());
    }

    fn next_tmp_path(&mut self) -> PathBuf {
        loop {
            let name: String = (0..TMP_NAME_LEN)
                .map(|_| self.rng.gen_range(b'a'..=b'z') as char)
                .collect();
            let path = self.tmp_dir.join(name);
            if !path.exists() {
                return path;
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::fs;

    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};
    use rstest::*;

    use super::{FileSorterBuilder, SortError};

    fn sort_bytes(input: &[u8], num_pages: usize) -> Vec<u8> {
        let dir = tempfile::tempdir().unwrap();
        let input_path = dir.path().join("input");
        let output_path = dir.path().join("output");
        fs::write(&input_path, input).unwrap();

        let mut sorter = FileSorterBuilder::new()
            .with_num_pages(num_pages)
            .with_tmp_dir(dir.path())
            .build()
            .unwrap();
        sorter.sort_file(&input_path, &output_path).unwrap();

        fs::read(&output_path).unwrap()
    }

    #[rstest]
    #[case(&b"banana\napple\ncherry\n"[..], &b"apple\nbanana\ncherry"[..])]
    #[case(&b"b\na\nc"[..], &b"a\nb\nc"[..])]
    #[case(&b""[..], &b""[..])]
    #[case(&b"z\n"[..], &b"z"[..])]
    #[case(&b"dup\ndup\ndup\n"[..], &b"dup\ndup\ndup"[..])]
    #[case(&b"\n"[..], &b""[..])]
    #[case(&b"\n\n\n"[..], &b"\n\n"[..])]
    fn test_sort_file(#[case] input: &[u8], #[case] expected: &[u8]) {
        assert_eq!(sort_bytes(input, 1), expected);
    }

    #[rstest]
    fn test_line_spanning_regions_is_reassembled() {
        // The middle line crosses at least one region boundary; the last
        // line has no terminating newline.
        let mut input = Vec::new();
        input.extend(vec![b'a'; 4000]);
        input.push(b'\n');
        input.extend(vec![b'b'; 6000]);
        input.push(b'\n');
        input.extend(vec![b'c'; 100]);

        let mut expected = Vec::new();
        expected.extend(vec![b'a'; 4000]);
        expected.push(b'\n');
        expected.extend(vec![b'b'; 6000]);
        expected.push(b'\n');
        expected.extend(vec![b'c'; 100]);

        assert_eq!(sort_bytes(&input, 1), expected);
    }

    #[rstest]
    fn test_random_lines_sorted_across_regions() {
        let mut rng = SmallRng::seed_from_u64(17);
        let mut lines: Vec<Vec<u8>> = Vec::new();
        for _ in 0..10_000 {
            let len = rng.gen_range(1..=80);
            lines.push((0..len).map(|_| rng.gen_range(b'/'..=b'~')).collect());
        }
        let mut input = lines.join(&b"\n"[..]);
        input.push(b'\n');

        let sorted = sort_bytes(&input, 1);

        lines.sort_unstable();
        let expected = lines.join(&b"\n"[..]);
        assert_eq!(sorted, expected);

        // sorting a sorted file changes nothing, with any region size
        assert_eq!(sort_bytes(&sorted, 1), expected);
        assert_eq!(sort_bytes(&input, 3), expected);
    }

    #[rstest]
    fn test_run_files_removed_after_sorting() {
        let dir = tempfile::tempdir().unwrap();
        let tmp_dir = dir.path().join("runs");
        fs::create_dir(&tmp_dir).unwrap();
        let input_path = dir.path().join("input");
        let output_path = dir.path().join("output");
        fs::write(&input_path, b"b\na\nc").unwrap();

        let mut sorter = FileSorterBuilder::new()
            .with_tmp_dir(&tmp_dir)
            .build()
            .unwrap();
        sorter.sort_file(&input_path, &output_path).unwrap();

        assert_eq!(fs::read(&output_path).unwrap(), b"a\nb\nc");
        assert_eq!(fs::read_dir(&tmp_dir).unwrap().count(), 0);
    }

    #[rstest]
    fn test_tmp_path_collision_is_retried() {
        let dir = tempfile::tempdir().unwrap();
        let mut sorter = FileSorterBuilder::new()
            .with_tmp_dir(dir.path())
            .build()
            .unwrap();
        sorter.rng = SmallRng::seed_from_u64(17);

        // Replay the generator stream to learn the first two names it will
        // try, and occupy the first one.
        let mut rng = SmallRng::seed_from_u64(17);
        let first: String = (0..super::TMP_NAME_LEN)
            .map(|_| rng.gen_range(b'a'..=b'z') as char)
            .collect();
        let second: String = (0..super::TMP_NAME_LEN)
            .map(|_| rng.gen_range(b'a'..=b'z') as char)
            .collect();
        assert_ne!(first, second);
        fs::write(dir.path().join(&first), b"").unwrap();

        let path = sorter.next_tmp_path();

        assert_eq!(path, dir.path().join(&second));
        assert!(!path.exists());
    }

    #[rstest]
    fn test_rejects_oversized_region() {
        let result = FileSorterBuilder::new()
            .with_num_pages(usize::MAX / 2)
            .build();
        assert!(matches!(result, Err(SortError::Config(_))));

        let result = FileSorterBuilder::new().with_num_pages(1 << 31).build();
        assert!(matches!(result, Err(SortError::Config(_))));
    }

    #[rstest]
    fn test_rejects_zero_pages() {
        let result = FileSorterBuilder::new().with_num_pages(0).build();
        assert!(matches!(result, Err(SortError::Config(_))));
    }

    #[rstest]
    fn test_rejects_missing_tmp_dir() {
        let dir = tempfile::tempdir().unwrap();
        let result = FileSorterBuilder::new()
            .with_tmp_dir(&dir.path().join("absent"))
            .build();
        assert!(matches!(result, Err(SortError::Config(_))));
    }

    #[rstest]
    fn test_rejects_directory_input() {
        let dir = tempfile::tempdir().unwrap();
        let mut sorter = FileSorterBuilder::new()
            .with_tmp_dir(dir.path())
            .build()
            .unwrap();

        let result = sorter.sort_file(dir.path(), &dir.path().join("output"));
        assert!(matches!(result, Err(SortError::Input(_))));
    }

    #[rstest]
    fn test_rejects_directory_output() {
        let dir = tempfile::tempdir().unwrap();
        let input_path = dir.path().join("input");
        fs::write(&input_path, b"a\n").unwrap();
        let mut sorter = FileSorterBuilder::new()
            .with_tmp_dir(dir.path())
            .build()
            .unwrap();

        let result = sorter.sort_file(&input_path, dir.path());
        assert!(matches!(result, Err(SortError::Input(_))));
    }
}
