//! Little-endian binary streams shared by every bake file.
//!
//! [`IStream`] maps the file when the `mmap` feature is on and falls back to
//! buffered reads otherwise. Every read checks the remaining size first, so a
//! truncated file surfaces as [`Error::UnexpectedEof`] at the offending offset.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
#[cfg(feature = "mmap")]
use memmap2::Mmap;

use crate::util::{Error, Result};

/// Open a file for reading, mapping "not found" to [`Error::FileNotFound`].
pub(crate) fn open_existing(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::FileNotFound(path.to_path_buf())
        } else {
            Error::Io(e)
        }
    })
}

/// Output stream for bake files.
pub struct OStream {
    writer: BufWriter<File>,
    pos: u64,
}

impl OStream {
    /// Create (or truncate) the file at `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        Ok(Self {
            writer: BufWriter::with_capacity(2 * 1024 * 1024, file), // 2MB buffer
            pos: 0,
        })
    }

    /// Get the current write position.
    #[inline]
    pub fn pos(&self) -> u64 {
        self.pos
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.writer.write_u32::<LittleEndian>(value)?;
        self.pos += 4;
        Ok(())
    }

    /// Write a run of u32 values.
    pub fn write_u32_slice(&mut self, values: &[u32]) -> Result<()> {
        let mut chunk = [0u8; 4096];
        for run in values.chunks(chunk.len() / 4) {
            let bytes = &mut chunk[..run.len() * 4];
            LittleEndian::write_u32_into(run, bytes);
            self.writer.write_all(bytes)?;
        }
        self.pos += values.len() as u64 * 4;
        Ok(())
    }

    /// Write a run of f32 values.
    pub fn write_f32_slice(&mut self, values: &[f32]) -> Result<()> {
        let mut chunk = [0u8; 4096];
        for run in values.chunks(chunk.len() / 4) {
            let bytes = &mut chunk[..run.len() * 4];
            LittleEndian::write_f32_into(run, bytes);
            self.writer.write_all(bytes)?;
        }
        self.pos += values.len() as u64 * 4;
        Ok(())
    }

    /// Flush the buffer to disk.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

enum Source {
    /// Memory-mapped file (preferred for large adjacency maps)
    #[cfg(feature = "mmap")]
    Mmap(Mmap),
    /// Buffered file access (fallback)
    File(BufReader<File>),
}

/// Input stream for bake files.
pub struct IStream {
    source: Source,
    pos: u64,
    size: u64,
}

impl IStream {
    /// Open a file, memory-mapped when the `mmap` feature is enabled.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_opts(path, cfg!(feature = "mmap"))
    }

    /// Open a file with optional memory mapping.
    pub fn open_opts(path: impl AsRef<Path>, use_mmap: bool) -> Result<Self> {
        let file = open_existing(path.as_ref())?;
        let size = file.metadata()?.len();

        #[cfg(feature = "mmap")]
        if use_mmap && size > 0 {
            // Safety: the file is opened read-only and not modified while mapped
            let mmap = unsafe { Mmap::map(&file) }?;
            return Ok(Self { source: Source::Mmap(mmap), pos: 0, size });
        }
        #[cfg(not(feature = "mmap"))]
        let _ = use_mmap;

        Ok(Self {
            source: Source::File(BufReader::with_capacity(1024 * 1024, file)),
            pos: 0,
            size,
        })
    }

    /// Total file size in bytes.
    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Current read position.
    #[inline]
    pub fn pos(&self) -> u64 {
        self.pos
    }

    /// Bytes left to read.
    #[inline]
    pub fn remaining(&self) -> u64 {
        self.size.saturating_sub(self.pos)
    }

    /// Fail with `UnexpectedEof` unless `bytes` more bytes are available.
    pub fn ensure(&self, bytes: u64) -> Result<()> {
        if self.remaining() < bytes {
            return Err(Error::UnexpectedEof(self.size));
        }
        Ok(())
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.ensure(4)?;
        let value = match &mut self.source {
            #[cfg(feature = "mmap")]
            Source::Mmap(mmap) => LittleEndian::read_u32(&mmap[self.pos as usize..]),
            Source::File(reader) => reader.read_u32::<LittleEndian>()?,
        };
        self.pos += 4;
        Ok(value)
    }

    /// Fill `dst` with consecutive u32 values.
    pub fn read_u32_into(&mut self, dst: &mut [u32]) -> Result<()> {
        let bytes = dst.len() as u64 * 4;
        self.ensure(bytes)?;
        match &mut self.source {
            #[cfg(feature = "mmap")]
            Source::Mmap(mmap) => {
                let start = self.pos as usize;
                LittleEndian::read_u32_into(&mmap[start..start + bytes as usize], dst);
            }
            Source::File(reader) => reader.read_u32_into::<LittleEndian>(dst)?,
        }
        self.pos += bytes;
        Ok(())
    }

    /// Fill `dst` with consecutive f32 values.
    pub fn read_f32_into(&mut self, dst: &mut [f32]) -> Result<()> {
        let bytes = dst.len() as u64 * 4;
        self.ensure(bytes)?;
        match &mut self.source {
            #[cfg(feature = "mmap")]
            Source::Mmap(mmap) => {
                let start = self.pos as usize;
                LittleEndian::read_f32_into(&mmap[start..start + bytes as usize], dst);
            }
            Source::File(reader) => reader.read_f32_into::<LittleEndian>(dst)?,
        }
        self.pos += bytes;
        Ok(())
    }

    /// Read `count` u32 values.
    pub fn read_u32_vec(&mut self, count: usize) -> Result<Vec<u32>> {
        self.ensure(count as u64 * 4)?;
        let mut values = vec![0u32; count];
        self.read_u32_into(&mut values)?;
        Ok(values)
    }

    /// Read `count` f32 values.
    pub fn read_f32_vec(&mut self, count: usize) -> Result<Vec<f32>> {
        self.ensure(count as u64 * 4)?;
        let mut values = vec![0.0f32; count];
        self.read_f32_into(&mut values)?;
        Ok(values)
    }

    /// Skip `bytes` bytes.
    pub fn skip(&mut self, bytes: u64) -> Result<()> {
        self.ensure(bytes)?;
        if let Source::File(reader) = &mut self.source {
            std::io::copy(&mut reader.by_ref().take(bytes), &mut std::io::sink())?;
        }
        self.pos += bytes;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_both_modes() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut out = OStream::create(file.path()).unwrap();
        out.write_u32(7).unwrap();
        out.write_f32_slice(&[1.5, -2.0]).unwrap();
        out.write_u32_slice(&(0..3000).collect::<Vec<u32>>()).unwrap();
        assert_eq!(out.pos(), 4 + 8 + 12000);
        out.flush().unwrap();
        drop(out);

        for use_mmap in [false, true] {
            let mut input = IStream::open_opts(file.path(), use_mmap).unwrap();
            assert_eq!(input.read_u32().unwrap(), 7);
            assert_eq!(input.read_f32_vec(2).unwrap(), vec![1.5, -2.0]);
            let ints = input.read_u32_vec(3000).unwrap();
            assert_eq!(ints[2999], 2999);
            assert_eq!(input.remaining(), 0);
            assert!(matches!(input.read_u32(), Err(Error::UnexpectedEof(_))));
        }
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = IStream::open(dir.path().join("nope.AO")).err().unwrap();
        assert!(matches!(err, Error::FileNotFound(_)));
    }

    #[test]
    fn test_skip() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut out = OStream::create(file.path()).unwrap();
        out.write_u32_slice(&[1, 2, 3]).unwrap();
        out.flush().unwrap();
        drop(out);

        let mut input = IStream::open_opts(file.path(), false).unwrap();
        input.skip(8).unwrap();
        assert_eq!(input.read_u32().unwrap(), 3);
        assert!(input.skip(1).is_err());
    }
}
