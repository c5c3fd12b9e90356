use std::path::PathBuf;

use crate::{
    archive::{ArchiveSource, ArchiveStream},
    decode::ImageDecoder,
    error::{PageflipError, PageflipResult},
    layout::plan_page,
    node::{ContainerNode, ContainerSeek, Node, PageNode, SourceListNode, SourceStep},
    present::{NavCommand, PageView, Presenter},
    title::compose_title,
};

#[derive(Clone, Copy, Debug)]
pub struct NavigatorConfig {
    /// Images displayed side by side per page (K).
    pub per_page: usize,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self { per_page: 1 }
    }
}

/// Where a descent ended up.
enum Descent {
    Page,
    Exhausted,
}

/// Drives the node tree: descends from the source list to a concrete page
/// of decoded images, seeks by arbitrary offsets across node boundaries,
/// and materializes/releases nodes as the position moves.
///
/// The active path is a stack: index 0 is always the source list, above it
/// at most one container, topped by the active page. Pushing materializes,
/// popping releases (buffers are freed and streams closed by drop).
///
/// Everything runs inline on the caller's thread; a navigation command
/// blocks on archive I/O and decoding until it completes.
pub struct Navigator {
    source: Box<dyn ArchiveSource>,
    decoder: Box<dyn ImageDecoder>,
    per_page: usize,
    path: Vec<Node>,
}

impl Navigator {
    pub fn new(
        label: impl Into<String>,
        sources: Vec<PathBuf>,
        source: Box<dyn ArchiveSource>,
        decoder: Box<dyn ImageDecoder>,
        config: NavigatorConfig,
    ) -> PageflipResult<Self> {
        if config.per_page == 0 {
            return Err(PageflipError::config("per_page must be at least 1"));
        }
        Ok(Self {
            source,
            decoder,
            per_page: config.per_page,
            path: vec![Node::SourceList(SourceListNode::new(label, sources))],
        })
    }

    /// The active path, root first.
    pub fn active_path(&self) -> &[Node] {
        &self.path
    }

    pub fn current_page(&self) -> Option<&PageNode> {
        match self.path.last() {
            Some(Node::Page(page)) => Some(page),
            _ => None,
        }
    }

    pub fn title(&self) -> String {
        compose_title(&self.path)
    }

    fn root_mut(&mut self) -> PageflipResult<&mut SourceListNode> {
        match self.path.first_mut() {
            Some(Node::SourceList(sl)) => Ok(sl),
            _ => Err(anyhow::anyhow!("active path lost its root (bug)").into()),
        }
    }

    fn root(&self) -> PageflipResult<&SourceListNode> {
        match self.path.first() {
            Some(Node::SourceList(sl)) => Ok(sl),
            _ => Err(anyhow::anyhow!("active path lost its root (bug)").into()),
        }
    }

    /// Materialize the first page. Fails if nothing at all is displayable.
    #[tracing::instrument(skip(self))]
    pub fn load_initial(&mut self) -> PageflipResult<()> {
        if self.root()?.is_empty() {
            return Err(PageflipError::Empty);
        }
        match self.descend(false)? {
            Descent::Page => Ok(()),
            Descent::Exhausted => Err(PageflipError::Empty),
        }
    }

    /// Seek by `offset` entries and materialize the page there. Returns
    /// the entry delta actually applied at the level that performed the
    /// seek (less than requested when clamped at either end, zero when
    /// the end-of-sequence clamp kicked in).
    #[tracing::instrument(skip(self), level = "debug")]
    pub fn move_by(&mut self, offset: i64) -> PageflipResult<i64> {
        // Release the active page first; the offset to satisfy is
        // unchanged, the seek below accounts for the released span.
        let released = match self.path.last() {
            Some(Node::Page(_)) => match self.path.pop() {
                Some(Node::Page(page)) => page.span(),
                _ => 0,
            },
            _ => 0,
        };

        enum Seek {
            Applied(i64),
            Cascade,
        }

        let seek = match self.path.last_mut() {
            Some(Node::Container(container)) => {
                match container.seek_by(&*self.source, offset, released)? {
                    ContainerSeek::Done(delta) => Seek::Applied(delta),
                    ContainerSeek::Cascade => Seek::Cascade,
                }
            }
            Some(Node::SourceList(sl)) => {
                // The released page absorbs the first page-size of a
                // forward offset even when it is short (grouping stopped
                // at a container); only whole extra pages move further
                // slots. Backward motion stays a raw slot delta.
                let delta = if offset > 0 {
                    released as i64 + (offset - self.per_page as i64).max(0)
                } else {
                    offset
                };
                Seek::Applied(sl.seek_by(delta))
            }
            _ => return Err(anyhow::anyhow!("seek on an empty active path (bug)").into()),
        };

        let applied = match seek {
            Seek::Applied(delta) => delta,
            Seek::Cascade => {
                // Spent container: close it and continue the walk one
                // level up. One slot steps past the container itself;
                // the released page already covered the first page-size
                // of the offset.
                tracing::debug!("container spent, cascading to source list");
                self.path.pop();
                let residual = (offset - self.per_page as i64).max(0);
                self.root_mut()?.seek_cascade(residual + 1);
                offset
            }
        };

        match self.descend(offset < 0)? {
            Descent::Page => Ok(applied),
            Descent::Exhausted => {
                self.clamp_to_last_page()?;
                Ok(0)
            }
        }
    }

    /// [`move_by`](Self::move_by) scaled by the configured images-per-page.
    pub fn move_by_pages(&mut self, pages: i64) -> PageflipResult<i64> {
        self.move_by(pages.saturating_mul(self.per_page as i64))
    }

    /// Jump to the page containing flattened entry `n`, counting every
    /// image of every source in order. Rewinds to the start and walks
    /// forward, dry-scanning containers to hop over them; O(n) like any
    /// other backward seek in this design. Out-of-range targets clamp to
    /// the first/last page.
    #[tracing::instrument(skip(self), level = "debug")]
    pub fn move_to_absolute(&mut self, n: i64) -> PageflipResult<()> {
        let mut remaining = n.max(0) as u64;

        while self.path.len() > 1 {
            self.path.pop();
        }
        self.root_mut()?.set_cursor(0);

        loop {
            let root = self.root()?;
            if root.is_exhausted() || root.cursor() >= root.len() {
                break;
            }
            let path = root.source_at(root.cursor()).to_path_buf();

            if let Some(total) = ArchiveStream::scan(&*self.source, &path)? {
                if remaining < total as u64 {
                    let start = (remaining as usize / self.per_page) * self.per_page;
                    let container =
                        ContainerNode::materialize_at(&*self.source, &path, start, total)?;
                    self.path.push(Node::Container(container));
                    return match self.descend(false)? {
                        Descent::Page => Ok(()),
                        Descent::Exhausted => self.clamp_to_last_page(),
                    };
                }
                remaining -= total as u64;
                self.root_mut()?.bump_cursor();
            } else {
                if remaining == 0 {
                    return match self.descend(false)? {
                        Descent::Page => Ok(()),
                        Descent::Exhausted => self.clamp_to_last_page(),
                    };
                }
                remaining -= 1;
                self.root_mut()?.bump_cursor();
            }
        }

        self.clamp_to_last_page()
    }

    /// Advance the top of the path until a page is materialized. `back`
    /// marks a backward-initiated move: containers entered on the way are
    /// then positioned at their final page, and empty containers fall
    /// toward earlier sources instead of later ones.
    fn descend(&mut self, back: bool) -> PageflipResult<Descent> {
        let mut back = back;
        loop {
            enum Act {
                Done(Descent),
                Push(Node),
                PopSpentContainer,
            }

            let act = match self.path.last_mut() {
                Some(Node::Page(_)) => Act::Done(Descent::Page),
                Some(Node::Container(container)) => {
                    match container.advance(&*self.decoder, self.per_page)? {
                        Some(page) => Act::Push(Node::Page(page)),
                        None => Act::PopSpentContainer,
                    }
                }
                Some(Node::SourceList(sl)) => {
                    match sl.advance(&*self.source, &*self.decoder, self.per_page)? {
                        SourceStep::Container(mut container) => {
                            if back && container.total() > 0 {
                                let start =
                                    ((container.total() - 1) / self.per_page) * self.per_page;
                                container.skip_to(start)?;
                            }
                            Act::Push(Node::Container(container))
                        }
                        SourceStep::Page(page) => Act::Push(Node::Page(page)),
                        SourceStep::Exhausted => Act::Done(Descent::Exhausted),
                    }
                }
                None => return Err(anyhow::anyhow!("descend on an empty active path (bug)").into()),
            };

            match act {
                Act::Done(outcome) => return Ok(outcome),
                Act::Push(node) => {
                    let done = matches!(node, Node::Page(_));
                    self.path.push(node);
                    if done {
                        return Ok(Descent::Page);
                    }
                }
                Act::PopSpentContainer => {
                    tracing::debug!("container exhausted during descent");
                    self.path.pop();
                    let root = self.root_mut()?;
                    if back && root.cursor() > 0 {
                        root.retreat_cursor();
                    } else {
                        back = false;
                        root.bump_cursor();
                    }
                }
            }
        }
    }

    /// End-of-sequence policy: materialize the final displayable page,
    /// scanning sources from the back. Never reopens a source at position
    /// zero after walking past its end.
    fn clamp_to_last_page(&mut self) -> PageflipResult<()> {
        tracing::debug!("clamping to the last displayable page");
        while self.path.len() > 1 {
            self.path.pop();
        }

        let len = self.root()?.len();
        for idx in (0..len).rev() {
            self.root_mut()?.set_cursor(idx);
            let path = self.root()?.source_at(idx).to_path_buf();

            if let Some(total) = ArchiveStream::scan(&*self.source, &path)? {
                if total == 0 {
                    continue;
                }
                let start = ((total - 1) / self.per_page) * self.per_page;
                let container = ContainerNode::materialize_at(&*self.source, &path, start, total)?;
                self.path.push(Node::Container(container));
                if let Descent::Page = self.descend(false)? {
                    return Ok(());
                }
                while self.path.len() > 1 {
                    self.path.pop();
                }
            } else if let Descent::Page = self.descend(false)? {
                return Ok(());
            }
        }
        Err(PageflipError::Empty)
    }

    fn present_current(&self, presenter: &mut dyn Presenter) -> PageflipResult<()> {
        let Some(page) = self.current_page() else {
            return Err(anyhow::anyhow!("present without an active page (bug)").into());
        };
        let view = PageView {
            title: compose_title(&self.path),
            page,
            placements: plan_page(page, presenter.viewport()),
        };
        presenter.present(&view)
    }

    /// Drain navigation commands from the presenter until it quits,
    /// presenting the fresh page after every successful move.
    pub fn run(&mut self, presenter: &mut dyn Presenter) -> PageflipResult<()> {
        self.load_initial()?;
        self.present_current(presenter)?;
        loop {
            match presenter.next_command()? {
                NavCommand::Quit => return Ok(()),
                NavCommand::Redraw => {}
                NavCommand::StepForward(n) => {
                    self.move_by_pages(n as i64)?;
                }
                NavCommand::StepBackward(n) => {
                    self.move_by_pages(-(n as i64))?;
                }
                NavCommand::JumpToStart => self.move_to_absolute(0)?,
                NavCommand::JumpToEnd => self.move_to_absolute(i64::MAX)?,
            }
            self.present_current(presenter)?;
        }
    }
}

impl Drop for Navigator {
    fn drop(&mut self) {
        // Shutdown teardown walks the active path leaf to root.
        while self.path.pop().is_some() {}
    }
}
