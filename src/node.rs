use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::{
    archive::{ArchiveSource, ArchiveStream},
    decode::{DecodedImage, ImageDecoder},
    error::{PageflipError, PageflipResult},
};

/// One node of the active path. The path is a stack, root first: a
/// [`SourceListNode`] at the bottom, at most one [`ContainerNode`] above
/// it, and a [`PageNode`] on top once navigation has settled.
///
/// Ownership is strictly top-down along the stack; popping a node releases
/// everything it owns (decoded buffers, open streams) exactly once.
pub enum Node {
    SourceList(SourceListNode),
    Container(ContainerNode),
    Page(PageNode),
}

/// Result of asking a node to produce the next materialized child.
pub enum SourceStep {
    /// The current source opened as a container; descend into it.
    Container(ContainerNode),
    /// The current source(s) decoded directly into a page.
    Page(PageNode),
    /// No sources left. A terminal signal, not an error.
    Exhausted,
}

/// Outcome of a relative seek on a container.
pub enum ContainerSeek {
    /// The stream is positioned so the next advance materializes the
    /// requested page; the payload is the entry delta actually applied.
    Done(i64),
    /// The container is fully consumed; the caller must tear it down and
    /// continue the seek one level up.
    Cascade,
}

/// The permanent root: the ordered source paths given at startup.
///
/// `cursor` points at the source currently materialized above this node
/// (or next to materialize). `exhausted` is set when navigation has walked
/// past the final source, so a spent trailing container is never reopened
/// by accident.
pub struct SourceListNode {
    label: String,
    sources: Vec<PathBuf>,
    cursor: usize,
    exhausted: bool,
}

impl SourceListNode {
    pub fn new(label: impl Into<String>, sources: Vec<PathBuf>) -> Self {
        Self {
            label: label.into(),
            sources,
            cursor: 0,
            exhausted: false,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn source_at(&self, idx: usize) -> &Path {
        &self.sources[idx]
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub(crate) fn set_cursor(&mut self, cursor: usize) {
        self.cursor = cursor.min(self.sources.len().saturating_sub(1));
        self.exhausted = false;
    }

    /// Step past a source whose container just ran dry during a descent.
    pub(crate) fn bump_cursor(&mut self) {
        self.cursor += 1;
        if self.cursor >= self.sources.len() {
            self.exhausted = true;
        }
    }

    /// Step back to the previous source during a backward descent.
    pub(crate) fn retreat_cursor(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
        self.exhausted = false;
    }

    /// Reposition the cursor by a list-index delta, clamped into
    /// `[0, len-1]`. Returns the delta actually applied.
    pub fn seek_by(&mut self, offset: i64) -> i64 {
        let base = self.cursor as i64;
        let max = self.sources.len() as i64 - 1;
        let target = (base + offset).clamp(0, max.max(0));
        self.cursor = target as usize;
        self.exhausted = false;
        target - base
    }

    /// Continue a forward seek that cascaded out of a spent container at
    /// `cursor`. Unlike [`seek_by`](Self::seek_by) this does not clamp at
    /// the last index: overshooting the end marks the list exhausted so
    /// the engine can apply its end-of-sequence policy instead of
    /// reopening the source the seek just left.
    pub(crate) fn seek_cascade(&mut self, offset: i64) {
        debug_assert!(offset > 0);
        let target = self.cursor as i64 + offset;
        if target >= self.sources.len() as i64 {
            self.exhausted = true;
        } else {
            self.cursor = target as usize;
            self.exhausted = false;
        }
    }

    /// Materialize whatever the cursor points at: a container to descend
    /// into, or a page built from up to `per_page` consecutive plain
    /// images (grouping mirrors container pagination).
    pub fn advance(
        &mut self,
        source: &dyn ArchiveSource,
        decoder: &dyn ImageDecoder,
        per_page: usize,
    ) -> PageflipResult<SourceStep> {
        if self.exhausted || self.cursor >= self.sources.len() {
            self.exhausted = true;
            return Ok(SourceStep::Exhausted);
        }

        let path = self.sources[self.cursor].clone();
        if let Some(container) = ContainerNode::materialize(source, &path)? {
            return Ok(SourceStep::Container(container));
        }

        // Plain image at the cursor: group consecutive plain images into
        // one page, stopping early at a container or the end of the list.
        let mut leaves = vec![read_leaf(decoder, &path)?];
        while leaves.len() < per_page {
            let idx = self.cursor + leaves.len();
            let Some(next) = self.sources.get(idx) else {
                break;
            };
            if let Some(probe) = source.open(next)? {
                drop(probe);
                break;
            }
            leaves.push(read_leaf(decoder, next)?);
        }

        Ok(SourceStep::Page(PageNode::new(self.cursor, leaves)))
    }
}

fn read_leaf(decoder: &dyn ImageDecoder, path: &Path) -> PageflipResult<LeafImage> {
    let bytes =
        std::fs::read(path).with_context(|| format!("read source '{}'", path.display()))?;
    let image = decoder.decode(&bytes)?;
    Ok(LeafImage {
        label: display_name(path),
        image,
    })
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// An open container over one source path. Dropping it closes the stream.
pub struct ContainerNode {
    label: String,
    stream: ArchiveStream,
    total: usize,
}

impl ContainerNode {
    /// Dry-scan `path` for its entry count, then open it for real at entry
    /// zero. `Ok(None)` if the path is not a container.
    pub fn materialize(
        source: &dyn ArchiveSource,
        path: &Path,
    ) -> PageflipResult<Option<Self>> {
        let Some(total) = ArchiveStream::scan(source, path)? else {
            return Ok(None);
        };
        let stream = ArchiveStream::open_at(source, path, 0)?.ok_or_else(|| {
            PageflipError::archive(format!(
                "'{}' stopped being a container between scan and open",
                path.display()
            ))
        })?;
        tracing::debug!(path = %path.display(), total, "opened container");
        Ok(Some(Self {
            label: display_name(path),
            stream,
            total,
        }))
    }

    /// Open positioned at image entry `start` (used for end-of-sequence
    /// clamping and absolute jumps).
    pub fn materialize_at(
        source: &dyn ArchiveSource,
        path: &Path,
        start: usize,
        total: usize,
    ) -> PageflipResult<Self> {
        let stream = ArchiveStream::open_at(source, path, start)?.ok_or_else(|| {
            PageflipError::archive(format!(
                "'{}' stopped being a container between scan and open",
                path.display()
            ))
        })?;
        Ok(Self {
            label: display_name(path),
            stream,
            total,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Image entries consumed so far; never exceeds [`total`](Self::total).
    pub fn consumed(&self) -> usize {
        self.stream.position()
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Fast-forward a freshly opened container to image entry `start`
    /// without decoding anything on the way.
    pub(crate) fn skip_to(&mut self, start: usize) -> PageflipResult<()> {
        let pos = self.stream.position();
        if start > pos {
            self.stream.skip_images(start - pos)?;
        }
        Ok(())
    }

    /// Pull up to `per_page` images into a fresh page, decoding eagerly.
    /// `Ok(None)` means the container is spent and must be torn down.
    pub fn advance(
        &mut self,
        decoder: &dyn ImageDecoder,
        per_page: usize,
    ) -> PageflipResult<Option<PageNode>> {
        let start = self.stream.position();
        let mut leaves = Vec::new();
        while leaves.len() < per_page {
            match self.stream.next_image()? {
                Some((info, payload)) => leaves.push(LeafImage {
                    label: info.name,
                    image: decoder.decode(&payload)?,
                }),
                None => break,
            }
        }
        if leaves.is_empty() {
            return Ok(None);
        }
        Ok(Some(PageNode::new(start, leaves)))
    }

    /// Relative seek in image entries. `released` is the image count of
    /// the page that was just popped off the stack; the stream already
    /// sits past it, so the effective stream motion is `offset -
    /// released`. Forward motion clamps so at least one entry remains to
    /// materialize; backward motion rewinds via reopen-and-replay.
    pub fn seek_by(
        &mut self,
        source: &dyn ArchiveSource,
        offset: i64,
        released: usize,
    ) -> PageflipResult<ContainerSeek> {
        let rel = offset - released as i64;
        let page_start = self.stream.position() as i64 - released as i64;

        if rel >= 0 {
            let remaining = self.total.saturating_sub(self.stream.position());
            if remaining == 0 {
                return Ok(ContainerSeek::Cascade);
            }
            let skip = (rel as usize).min(remaining - 1);
            self.stream.skip_images(skip)?;
        } else {
            let target = (self.stream.position() as i64 + rel).max(0) as usize;
            self.stream.rewind(source, target)?;
        }

        Ok(ContainerSeek::Done(
            self.stream.position() as i64 - page_start,
        ))
    }
}

/// One decoded image, owned exclusively by its page.
pub struct LeafImage {
    label: String,
    image: DecodedImage,
}

impl LeafImage {
    pub fn new(label: impl Into<String>, image: DecodedImage) -> Self {
        Self {
            label: label.into(),
            image,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn image(&self) -> &DecodedImage {
        &self.image
    }
}

/// The unit of display: 1..K decoded images shown side by side.
pub struct PageNode {
    label: String,
    start: usize,
    leaves: Vec<LeafImage>,
}

impl PageNode {
    pub fn new(start: usize, leaves: Vec<LeafImage>) -> Self {
        debug_assert!(!leaves.is_empty());
        let label = leaves
            .iter()
            .map(LeafImage::label)
            .collect::<Vec<_>>()
            .join(" + ");
        Self {
            label,
            start,
            leaves,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Entry index of the first leaf within the parent node.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Entries this page consumed from its parent.
    pub fn span(&self) -> usize {
        self.leaves.len()
    }

    pub fn leaves(&self) -> &[LeafImage] {
        &self.leaves
    }
}
