use std::{
    fs::File,
    io::{BufReader, Read, Seek, SeekFrom},
    path::{Path, PathBuf},
};

use anyhow::Context as _;

use crate::error::{PageflipError, PageflipResult};

/// Metadata of one container entry, surfaced before its payload is consumed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryInfo {
    pub name: String,
    pub size: u64,
    pub is_dir: bool,
}

/// A forward-only walk over the entries of one open container.
///
/// The underlying formats only support forward iteration, so there is no
/// seek here at all: going backward means dropping the stream and opening a
/// fresh one from the same path (see [`ArchiveStream::rewind`]).
///
/// The spec-level `next`/`read` and `next`/`skip` pairs are fused into
/// single calls because a streaming entry borrows the reader until its
/// payload has been either buffered or discarded.
pub trait EntryStream {
    /// Advance past the next entry, discarding its payload.
    fn skip_next(&mut self) -> PageflipResult<Option<EntryInfo>>;

    /// Advance to the next entry and buffer its full payload.
    ///
    /// Directory entries come back with an empty payload. An entry whose
    /// declared size exceeds the stream's byte limit is a hard error.
    fn read_next(&mut self) -> PageflipResult<Option<(EntryInfo, Vec<u8>)>>;
}

/// Opens paths as containers. `Ok(None)` means "not a recognized container
/// format" and lets the caller fall back to single-image handling; actual
/// I/O failures are errors.
pub trait ArchiveSource {
    fn open(&self, path: &Path) -> PageflipResult<Option<Box<dyn EntryStream>>>;
}

const ZIP_LOCAL_HEADER_MAGIC: [u8; 4] = [0x50, 0x4b, 0x03, 0x04];
const ZIP_EMPTY_EOCD_MAGIC: [u8; 4] = [0x50, 0x4b, 0x05, 0x06];

/// Zip-backed [`ArchiveSource`]. Reads entries strictly in stream order via
/// the zip crate's streaming API, never the central directory.
pub struct ZipSource {
    max_entry_size: u64,
}

impl ZipSource {
    pub fn new(max_entry_size: u64) -> Self {
        Self { max_entry_size }
    }
}

impl ArchiveSource for ZipSource {
    fn open(&self, path: &Path) -> PageflipResult<Option<Box<dyn EntryStream>>> {
        let mut file =
            File::open(path).with_context(|| format!("open source '{}'", path.display()))?;

        let mut magic = [0u8; 4];
        match file.read_exact(&mut magic) {
            Ok(()) => {}
            // Shorter than any zip: treat as a plain file.
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => {
                return Err(anyhow::Error::new(e)
                    .context(format!("probe source '{}'", path.display()))
                    .into());
            }
        }
        // An EOCD-only file is a valid zip with zero entries. The
        // streaming parser only understands local headers, so serve it
        // as an already-drained stream instead of handing it over.
        if magic == ZIP_EMPTY_EOCD_MAGIC {
            return Ok(Some(Box::new(EmptyEntryStream)));
        }
        if magic != ZIP_LOCAL_HEADER_MAGIC {
            return Ok(None);
        }

        file.seek(SeekFrom::Start(0))
            .with_context(|| format!("rewind probe of '{}'", path.display()))?;

        Ok(Some(Box::new(ZipEntryStream {
            reader: BufReader::new(file),
            limit: self.max_entry_size,
        })))
    }
}

/// Stream over a zip that has an end-of-central-directory record and
/// nothing else.
struct EmptyEntryStream;

impl EntryStream for EmptyEntryStream {
    fn skip_next(&mut self) -> PageflipResult<Option<EntryInfo>> {
        Ok(None)
    }

    fn read_next(&mut self) -> PageflipResult<Option<(EntryInfo, Vec<u8>)>> {
        Ok(None)
    }
}

struct ZipEntryStream {
    reader: BufReader<File>,
    limit: u64,
}

impl ZipEntryStream {
    fn info_of(file: &zip::read::ZipFile<'_, BufReader<File>>) -> EntryInfo {
        EntryInfo {
            name: file.name().to_string(),
            size: file.size(),
            is_dir: file.is_dir(),
        }
    }
}

impl EntryStream for ZipEntryStream {
    fn skip_next(&mut self) -> PageflipResult<Option<EntryInfo>> {
        match zip::read::read_zipfile_from_stream(&mut self.reader) {
            // Dropping the entry drains its payload and leaves the reader
            // at the next local header.
            Ok(Some(file)) => Ok(Some(Self::info_of(&file))),
            Ok(None) => Ok(None),
            Err(e) => Err(PageflipError::archive(format!("read entry header: {e}"))),
        }
    }

    fn read_next(&mut self) -> PageflipResult<Option<(EntryInfo, Vec<u8>)>> {
        let mut file = match zip::read::read_zipfile_from_stream(&mut self.reader) {
            Ok(Some(file)) => file,
            Ok(None) => return Ok(None),
            Err(e) => return Err(PageflipError::archive(format!("read entry header: {e}"))),
        };

        let info = Self::info_of(&file);
        if info.is_dir {
            return Ok(Some((info, Vec::new())));
        }
        if info.size > self.limit {
            return Err(PageflipError::OversizedEntry {
                name: info.name,
                size: info.size,
                limit: self.limit,
            });
        }

        let mut payload = Vec::with_capacity(info.size as usize);
        file.read_to_end(&mut payload)
            .map_err(|e| PageflipError::archive(format!("read entry '{}': {e}", info.name)))?;
        if payload.len() as u64 != info.size {
            return Err(PageflipError::archive(format!(
                "entry '{}' truncated: got {} of {} bytes",
                info.name,
                payload.len(),
                info.size
            )));
        }
        Ok(Some((info, payload)))
    }
}

/// One open container plus the bookkeeping needed to emulate seeking over a
/// forward-only stream.
///
/// All positions are image-entry indices: directory entries are skipped
/// transparently and never counted.
pub struct ArchiveStream {
    path: PathBuf,
    stream: Box<dyn EntryStream>,
    pos: usize,
}

impl ArchiveStream {
    /// Dry-scan: count the image entries of `path` without buffering any
    /// payload. `Ok(None)` if the path is not a container.
    pub fn scan(source: &dyn ArchiveSource, path: &Path) -> PageflipResult<Option<usize>> {
        let Some(mut stream) = source.open(path)? else {
            return Ok(None);
        };
        let mut total = 0usize;
        while let Some(info) = stream.skip_next()? {
            if !info.is_dir {
                total += 1;
            }
        }
        Ok(Some(total))
    }

    /// Open `path` positioned at image entry `start`, replaying (and
    /// discarding) every earlier entry. O(start) by the nature of the
    /// format.
    pub fn open_at(
        source: &dyn ArchiveSource,
        path: &Path,
        start: usize,
    ) -> PageflipResult<Option<Self>> {
        let Some(stream) = source.open(path)? else {
            return Ok(None);
        };
        let mut this = Self {
            path: path.to_path_buf(),
            stream,
            pos: 0,
        };
        let skipped = this.skip_images(start)?;
        if skipped != start {
            return Err(PageflipError::archive(format!(
                "'{}' ended at entry {} while replaying to {}",
                this.path.display(),
                skipped,
                start
            )));
        }
        Ok(Some(this))
    }

    /// Index of the next unread image entry.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Next image entry with its payload; directories pass by silently.
    pub fn next_image(&mut self) -> PageflipResult<Option<(EntryInfo, Vec<u8>)>> {
        loop {
            match self.stream.read_next()? {
                Some((info, _)) if info.is_dir => continue,
                Some(entry) => {
                    self.pos += 1;
                    return Ok(Some(entry));
                }
                None => return Ok(None),
            }
        }
    }

    /// Fast-forward over up to `n` image entries without buffering or
    /// decoding anything. Returns how many were actually skipped (short at
    /// end of stream).
    pub fn skip_images(&mut self, n: usize) -> PageflipResult<usize> {
        let mut skipped = 0usize;
        while skipped < n {
            match self.stream.skip_next()? {
                Some(info) if info.is_dir => continue,
                Some(_) => {
                    self.pos += 1;
                    skipped += 1;
                }
                None => break,
            }
        }
        Ok(skipped)
    }

    /// Backward seek: close the stream, reopen from the path and replay to
    /// `target`. The only rewind mechanism the format allows.
    pub fn rewind(&mut self, source: &dyn ArchiveSource, target: usize) -> PageflipResult<()> {
        tracing::debug!(path = %self.path.display(), target, "rewind by reopen");
        let fresh = Self::open_at(source, &self.path, target)?.ok_or_else(|| {
            PageflipError::archive(format!(
                "'{}' is no longer a recognized container",
                self.path.display()
            ))
        })?;
        *self = fresh;
        Ok(())
    }
}
