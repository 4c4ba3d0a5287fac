//! Scoped memory-mapped file regions.

use std::fs::{File, OpenOptions};
use std::io;
use std::ops;
use std::path::Path;

use memmap2::{Advice, Mmap, MmapMut, MmapOptions};

/// Expected access pattern of a mapped region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapUsage {
    Random,
    Sequential,
}

impl From<MapUsage> for Advice {
    fn from(usage: MapUsage) -> Advice {
        match usage {
            MapUsage::Random => Advice::Random,
            MapUsage::Sequential => Advice::Sequential,
        }
    }
}

/// Returns the OS page size in bytes.
pub fn page_size() -> io::Result<usize> {
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size <= 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(size as usize)
}

/// Read-only mapping of `[offset, offset + len)` of a file.
///
/// The requested range is exposed as a byte slice; page alignment of the
/// underlying mapping is handled internally, so `offset` may be arbitrary.
/// The file descriptor is closed before the constructor returns and the
/// range is unmapped on drop.
pub struct MappedRegion {
    map: Mmap,
}

impl MappedRegion {
    /// Maps a byte range of the file at `path` for reading.
    ///
    /// The range must lie within the file; `len` must be non-zero.
    pub fn map(path: &Path, offset: u64, len: usize) -> io::Result<MappedRegion> {
        let file = File::open(path)?;
        let map = unsafe { MmapOptions::new().offset(offset).len(len).map(&file)? };
        Ok(MappedRegion { map })
    }

    /// Declares the expected access pattern. Hint only.
    pub fn advise(&self, usage: MapUsage) -> io::Result<()> {
        self.map.advise(usage.into())
    }
}

impl ops::Deref for MappedRegion {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.map
    }
}

/// Read-write mapping of `[offset, offset + len)` of a file.
///
/// The mapping is shared with the filesystem: writes persist once the
/// region is unmapped or its pages are written back.
pub struct MappedRegionMut {
    map: MmapMut,
}

impl MappedRegionMut {
    /// Maps a byte range of the file at `path` for reading and writing.
    ///
    /// The file must already exist and span the range; `len` must be
    /// non-zero.
    pub fn map(path: &Path, offset: u64, len: usize) -> io::Result<MappedRegionMut> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let map = unsafe { MmapOptions::new().offset(offset).len(len).map_mut(&file)? };
        Ok(MappedRegionMut { map })
    }

    /// Declares the expected access pattern. Hint only.
    pub fn advise(&self, usage: MapUsage) -> io::Result<()> {
        self.map.advise(usage.into())
    }
}

impl ops::Deref for MappedRegionMut {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.map
    }
}

impl ops::DerefMut for MappedRegionMut {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.map
    }
}

#[cfg(test)]
mod test {
    use std::fs;

    use rstest::*;

    use super::{page_size, MapUsage, MappedRegion, MappedRegionMut};

    #[fixture]
    fn tmp_dir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    #[rstest]
    fn test_page_size() {
        let size = page_size().unwrap();
        assert!(size > 0);
        assert!(size.is_power_of_two());
    }

    #[rstest]
    fn test_read_mapping_at_unaligned_offset(tmp_dir: tempfile::TempDir) {
        let path = tmp_dir.path().join("data");
        fs::write(&path, b"hello, mapped world").unwrap();

        let map = MappedRegion::map(&path, 7, 6).unwrap();
        map.advise(MapUsage::Sequential).unwrap();
        map.advise(MapUsage::Random).unwrap();

        assert_eq!(&map[..], b"mapped");
    }

    #[rstest]
    fn test_write_mapping_persists_on_drop(tmp_dir: tempfile::TempDir) {
        let path = tmp_dir.path().join("data");
        fs::write(&path, vec![b'.'; 16]).unwrap();

        {
            let mut map = MappedRegionMut::map(&path, 4, 4).unwrap();
            map.advise(MapUsage::Sequential).unwrap();
            map[..].copy_from_slice(b"data");
        }

        assert_eq!(fs::read(&path).unwrap(), b"....data........");
    }

    #[rstest]
    fn test_mapping_missing_file_fails(tmp_dir: tempfile::TempDir) {
        let path = tmp_dir.path().join("absent");
        assert!(MappedRegion::map(&path, 0, 1).is_err());
        assert!(MappedRegionMut::map(&path, 0, 1).is_err());
    }
}
