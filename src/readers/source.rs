use crate::error::{ProcessingError, Result};
use clap::ValueEnum;
use memmap2::Mmap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::path::Path;
use tracing::debug;

/// How the input file is brought into memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReadStrategy {
    /// Map the whole file; keys are borrowed from the mapping.
    #[default]
    Mmap,
    /// Positioned reads into per-worker window buffers.
    Read,
}

impl fmt::Display for ReadStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadStrategy::Mmap => write!(f, "mmap"),
            ReadStrategy::Read => write!(f, "read"),
        }
    }
}

/// Random-access, read-only view of the input shared by all workers.
pub trait ByteSource: Send + Sync {
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fill `buf` with the bytes starting at `offset`.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// The whole input as one slice, when it is resident.
    fn mapped(&self) -> Option<&[u8]> {
        None
    }
}

fn check_range(offset: u64, wanted: usize, len: u64) -> Result<()> {
    let end = offset.checked_add(wanted as u64);
    match end {
        Some(end) if end <= len => Ok(()),
        _ => Err(ProcessingError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!(
                "read of {} bytes at offset {} past end of input ({} bytes)",
                wanted, offset, len
            ),
        ))),
    }
}

pub struct MmapSource {
    // None for an empty file, which cannot be mapped on every platform
    mmap: Option<Mmap>,
}

impl MmapSource {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();

        let mmap = if len == 0 {
            None
        } else {
            // SAFETY: the input is treated as immutable for the life of the run
            let mmap = unsafe { Mmap::map(&file)? };
            #[cfg(unix)]
            mmap.advise(memmap2::Advice::Sequential)?;
            Some(mmap)
        };

        debug!("Mapped {} ({} bytes)", path.display(), len);
        Ok(Self { mmap })
    }
}

impl ByteSource for MmapSource {
    fn len(&self) -> u64 {
        self.mmap.as_ref().map_or(0, |m| m.len() as u64)
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        check_range(offset, buf.len(), self.len())?;
        let bytes = self.mapped().unwrap_or(&[]);
        let start = offset as usize;
        buf.copy_from_slice(&bytes[start..start + buf.len()]);
        Ok(())
    }

    fn mapped(&self) -> Option<&[u8]> {
        Some(self.mmap.as_deref().unwrap_or(&[]))
    }
}

pub struct FileSource {
    file: File,
    len: u64,
}

impl FileSource {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        debug!("Opened {} for positioned reads ({} bytes)", path.display(), len);
        Ok(Self { file, len })
    }
}

impl ByteSource for FileSource {
    fn len(&self) -> u64 {
        self.len
    }

    #[cfg(unix)]
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        use std::os::unix::fs::FileExt;

        check_range(offset, buf.len(), self.len)?;
        self.file.read_exact_at(buf, offset)?;
        Ok(())
    }

    #[cfg(windows)]
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        use std::os::windows::fs::FileExt;

        check_range(offset, buf.len(), self.len)?;
        let mut filled = 0;
        while filled < buf.len() {
            let read = self
                .file
                .seek_read(&mut buf[filled..], offset + filled as u64)?;
            if read == 0 {
                return Err(ProcessingError::Io(std::io::Error::from(
                    std::io::ErrorKind::UnexpectedEof,
                )));
            }
            filled += read;
        }
        Ok(())
    }
}

/// Owned bytes behaving like a mapped file.
pub struct InMemorySource {
    bytes: Vec<u8>,
}

impl InMemorySource {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }
}

impl ByteSource for InMemorySource {
    fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        check_range(offset, buf.len(), self.len())?;
        let start = offset as usize;
        buf.copy_from_slice(&self.bytes[start..start + buf.len()]);
        Ok(())
    }

    fn mapped(&self) -> Option<&[u8]> {
        Some(&self.bytes)
    }
}

/// Open `path` with the requested strategy.
pub fn open_source(path: &Path, strategy: ReadStrategy) -> Result<Box<dyn ByteSource>> {
    Ok(match strategy {
        ReadStrategy::Mmap => Box::new(MmapSource::open(path)?),
        ReadStrategy::Read => Box::new(FileSource::open(path)?),
    })
}
