//! Resource accounting over instrumented stand-ins: every stream opened is
//! closed exactly once, and nothing is decoded that never becomes part of
//! a materialized page.

use std::{
    cell::Cell,
    collections::BTreeMap,
    path::{Path, PathBuf},
    rc::Rc,
};

use pageflip::{
    ArchiveSource, DecodedImage, EntryInfo, EntryStream, ImageDecoder, Navigator, NavigatorConfig,
    PageflipResult,
};

#[derive(Default)]
struct Counters {
    opened: Cell<usize>,
    closed: Cell<usize>,
    decoded: Cell<usize>,
}

#[derive(Clone)]
struct MockEntry {
    name: String,
    bytes: Vec<u8>,
}

fn images(prefix: &str, n: usize) -> Vec<MockEntry> {
    (0..n)
        .map(|i| MockEntry {
            name: format!("{prefix}{i}.png"),
            bytes: vec![0xAB; 8],
        })
        .collect()
}

/// Deterministic on reopen: every open replays the same entry list.
struct MockSource {
    archives: BTreeMap<PathBuf, Vec<MockEntry>>,
    counters: Rc<Counters>,
}

impl ArchiveSource for MockSource {
    fn open(&self, path: &Path) -> PageflipResult<Option<Box<dyn EntryStream>>> {
        let Some(entries) = self.archives.get(path) else {
            return Ok(None);
        };
        self.counters.opened.set(self.counters.opened.get() + 1);
        Ok(Some(Box::new(MockStream {
            entries: entries.clone(),
            idx: 0,
            counters: Rc::clone(&self.counters),
        })))
    }
}

struct MockStream {
    entries: Vec<MockEntry>,
    idx: usize,
    counters: Rc<Counters>,
}

impl MockStream {
    fn info(entry: &MockEntry) -> EntryInfo {
        EntryInfo {
            name: entry.name.clone(),
            size: entry.bytes.len() as u64,
            is_dir: entry.name.ends_with('/'),
        }
    }
}

impl EntryStream for MockStream {
    fn skip_next(&mut self) -> PageflipResult<Option<EntryInfo>> {
        let Some(entry) = self.entries.get(self.idx) else {
            return Ok(None);
        };
        self.idx += 1;
        Ok(Some(Self::info(entry)))
    }

    fn read_next(&mut self) -> PageflipResult<Option<(EntryInfo, Vec<u8>)>> {
        let Some(entry) = self.entries.get(self.idx) else {
            return Ok(None);
        };
        self.idx += 1;
        Ok(Some((Self::info(entry), entry.bytes.clone())))
    }
}

impl Drop for MockStream {
    fn drop(&mut self) {
        self.counters.closed.set(self.counters.closed.get() + 1);
    }
}

struct MockDecoder {
    counters: Rc<Counters>,
}

impl ImageDecoder for MockDecoder {
    fn decode(&self, _bytes: &[u8]) -> PageflipResult<DecodedImage> {
        self.counters.decoded.set(self.counters.decoded.get() + 1);
        Ok(DecodedImage {
            width: 1,
            height: 1,
            rgba8: vec![0, 0, 0, 255],
        })
    }
}

fn rig(
    archives: Vec<(&str, Vec<MockEntry>)>,
    sources: Vec<&str>,
    per_page: usize,
) -> (Navigator, Rc<Counters>) {
    let counters = Rc::new(Counters::default());
    let archives = archives
        .into_iter()
        .map(|(name, entries)| (PathBuf::from(format!("/mock/{name}")), entries))
        .collect();
    let sources = sources
        .into_iter()
        .map(|name| PathBuf::from(format!("/mock/{name}")))
        .collect();
    let nav = Navigator::new(
        "mock",
        sources,
        Box::new(MockSource {
            archives,
            counters: Rc::clone(&counters),
        }),
        Box::new(MockDecoder {
            counters: Rc::clone(&counters),
        }),
        NavigatorConfig { per_page },
    )
    .unwrap();
    (nav, counters)
}

fn label(nav: &Navigator) -> String {
    nav.current_page().unwrap().label().to_string()
}

#[test]
fn every_open_is_closed_exactly_once_at_shutdown() {
    let (mut nav, counters) = rig(
        vec![("a.zip", images("a", 3))],
        vec!["a.zip"],
        1,
    );
    nav.load_initial().unwrap();
    nav.move_by(1).unwrap();
    assert!(counters.opened.get() > counters.closed.get());

    drop(nav);
    assert_eq!(counters.opened.get(), counters.closed.get());
}

#[test]
fn fast_forward_skips_without_decoding() {
    let (mut nav, counters) = rig(
        vec![("a.zip", images("a", 10))],
        vec!["a.zip"],
        1,
    );
    nav.load_initial().unwrap();
    assert_eq!(counters.decoded.get(), 1);

    nav.move_by(5).unwrap();
    assert_eq!(label(&nav), "a5.png");
    // Only the landing page was decoded; the four skipped entries and the
    // dry scan cost nothing.
    assert_eq!(counters.decoded.get(), 2);
}

#[test]
fn backward_seek_reopens_and_closes_the_stale_stream() {
    let (mut nav, counters) = rig(
        vec![("a.zip", images("a", 3))],
        vec!["a.zip"],
        1,
    );
    nav.load_initial().unwrap();
    // Dry scan plus the live stream.
    assert_eq!(counters.opened.get(), 2);
    assert_eq!(counters.closed.get(), 1);

    nav.move_by(-1).unwrap();
    assert_eq!(label(&nav), "a0.png");
    assert_eq!(counters.opened.get(), 3);
    assert_eq!(counters.closed.get(), 2);

    drop(nav);
    assert_eq!(counters.opened.get(), counters.closed.get());
}

#[test]
fn forward_cascade_closes_the_spent_container() {
    let (mut nav, counters) = rig(
        vec![("a.zip", images("a", 1)), ("b.zip", images("b", 1))],
        vec!["a.zip", "b.zip"],
        1,
    );
    nav.load_initial().unwrap();
    assert_eq!(label(&nav), "a0.png");

    nav.move_by(1).unwrap();
    assert_eq!(label(&nav), "b0.png");
    // a.zip is fully released the moment navigation moved past it.
    assert_eq!(counters.opened.get(), 4);
    assert_eq!(counters.closed.get(), 3);

    drop(nav);
    assert_eq!(counters.opened.get(), counters.closed.get());
    assert_eq!(counters.decoded.get(), 2);
}

#[test]
fn absolute_jump_scans_skipped_containers_without_decoding() {
    let (mut nav, counters) = rig(
        vec![("a.zip", images("a", 3)), ("b.zip", images("b", 3))],
        vec!["a.zip", "b.zip"],
        1,
    );
    nav.load_initial().unwrap();
    assert_eq!(counters.decoded.get(), 1);

    nav.move_to_absolute(4).unwrap();
    assert_eq!(label(&nav), "b1.png");
    assert_eq!(counters.decoded.get(), 2);

    drop(nav);
    assert_eq!(counters.opened.get(), counters.closed.get());
}

#[test]
fn directory_entries_never_reach_the_decoder() {
    let mut entries = vec![MockEntry {
        name: "art/".to_string(),
        bytes: Vec::new(),
    }];
    entries.extend(images("art/a", 2));
    let (mut nav, counters) = rig(vec![("a.zip", entries)], vec!["a.zip"], 2);

    nav.load_initial().unwrap();
    assert_eq!(label(&nav), "art/a0.png + art/a1.png");
    assert_eq!(nav.title(), "mock [1/1] | a.zip [2/2] | art/a0.png + art/a1.png");
    assert_eq!(counters.decoded.get(), 2);
}

#[test]
fn plain_sources_bypass_the_archive_reader() {
    let tmp = std::env::temp_dir().join(format!(
        "pageflip_lifecycle_plain_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    std::fs::create_dir_all(&tmp).unwrap();
    let plain = tmp.join("p.png");
    std::fs::write(&plain, b"raw bytes, decoder is mocked").unwrap();

    let counters = Rc::new(Counters::default());
    let mut nav = Navigator::new(
        "mock",
        vec![plain, PathBuf::from("/mock/a.zip")],
        Box::new(MockSource {
            archives: BTreeMap::from([(PathBuf::from("/mock/a.zip"), images("a", 1))]),
            counters: Rc::clone(&counters),
        }),
        Box::new(MockDecoder {
            counters: Rc::clone(&counters),
        }),
        NavigatorConfig { per_page: 1 },
    )
    .unwrap();

    nav.load_initial().unwrap();
    assert_eq!(label(&nav), "p.png");
    assert_eq!(counters.opened.get(), 0);

    nav.move_by(1).unwrap();
    assert_eq!(label(&nav), "a0.png");

    drop(nav);
    assert_eq!(counters.opened.get(), counters.closed.get());
    std::fs::remove_dir_all(&tmp).ok();
}
