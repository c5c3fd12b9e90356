use std::io::{BufRead, Write};

use anyhow::Context as _;

use crate::{
    error::PageflipResult,
    layout::{Placement, Viewport},
    node::PageNode,
};

/// A discrete navigation command from the presenter, in page units.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NavCommand {
    Quit,
    StepForward(u32),
    StepBackward(u32),
    JumpToStart,
    JumpToEnd,
    /// Re-present the current page without moving.
    Redraw,
}

/// Everything the display side needs for one successful navigation.
pub struct PageView<'a> {
    pub title: String,
    pub page: &'a PageNode,
    pub placements: Vec<Placement>,
}

/// The display collaborator: consumes page views, produces commands.
/// Pixel blitting and event dispatch live behind this seam, out of the
/// engine's sight.
pub trait Presenter {
    fn viewport(&self) -> Viewport;
    fn present(&mut self, view: &PageView<'_>) -> PageflipResult<()>;
    fn next_command(&mut self) -> PageflipResult<NavCommand>;
}

#[derive(Debug, serde::Serialize)]
struct PlacedImage<'a> {
    name: &'a str,
    x: i32,
    y: i32,
    width: u32,
    height: u32,
    source_width: u32,
    source_height: u32,
}

#[derive(Debug, serde::Serialize)]
struct PageRecord<'a> {
    title: &'a str,
    images: Vec<PlacedImage<'a>>,
}

/// Line-oriented [`Presenter`]: reads one command per input line, writes
/// one JSON object per presented page. Useful for driving the engine from
/// scripts and for tests; a windowed presenter would replace it wholesale.
pub struct LinePresenter<R, W> {
    input: R,
    output: W,
    viewport: Viewport,
}

impl<R: BufRead, W: Write> LinePresenter<R, W> {
    pub fn new(input: R, output: W, viewport: Viewport) -> Self {
        Self {
            input,
            output,
            viewport,
        }
    }

    fn parse(line: &str) -> Option<NavCommand> {
        let mut words = line.split_whitespace();
        let head = words.next()?;
        let count = words
            .next()
            .map(|w| w.parse::<u32>())
            .transpose()
            .ok()?
            .unwrap_or(1);
        match head {
            "q" | "quit" => Some(NavCommand::Quit),
            "n" | "next" => Some(NavCommand::StepForward(count)),
            "p" | "prev" => Some(NavCommand::StepBackward(count)),
            "g" | "first" => Some(NavCommand::JumpToStart),
            "G" | "last" => Some(NavCommand::JumpToEnd),
            "r" | "redraw" => Some(NavCommand::Redraw),
            _ => None,
        }
    }
}

impl<R: BufRead, W: Write> Presenter for LinePresenter<R, W> {
    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn present(&mut self, view: &PageView<'_>) -> PageflipResult<()> {
        let leaves = view.page.leaves();
        let record = PageRecord {
            title: &view.title,
            images: view
                .placements
                .iter()
                .map(|p| {
                    let leaf = &leaves[p.index];
                    let img = leaf.image();
                    PlacedImage {
                        name: leaf.label(),
                        x: p.x,
                        y: p.y,
                        width: p.width,
                        height: p.height,
                        source_width: img.width,
                        source_height: img.height,
                    }
                })
                .collect(),
        };
        let line = serde_json::to_string(&record).context("serialize page record")?;
        writeln!(self.output, "{line}").context("write page record")?;
        self.output.flush().context("flush page record")?;
        Ok(())
    }

    fn next_command(&mut self) -> PageflipResult<NavCommand> {
        let mut line = String::new();
        loop {
            line.clear();
            let n = self
                .input
                .read_line(&mut line)
                .context("read navigation command")?;
            if n == 0 {
                return Ok(NavCommand::Quit);
            }
            match Self::parse(&line) {
                Some(cmd) => return Ok(cmd),
                None => tracing::warn!(line = line.trim(), "unrecognized command"),
            }
        }
    }
}
