use std::fmt::Write as _;

use crate::node::Node;

/// Compose the breadcrumb title for an active path, root first.
///
/// List and container levels contribute `"<label> [<position>/<total>] | "`,
/// the page contributes its own label. Recomputed on every render because
/// the position counters move; never cached.
pub fn compose_title(path: &[Node]) -> String {
    let mut out = String::new();
    for node in path {
        match node {
            Node::SourceList(sl) => {
                let shown = (sl.cursor() + 1).min(sl.len());
                let _ = write!(out, "{} [{}/{}] | ", sl.label(), shown, sl.len());
            }
            Node::Container(c) => {
                let _ = write!(out, "{} [{}/{}] | ", c.label(), c.consumed(), c.total());
            }
            Node::Page(p) => out.push_str(p.label()),
        }
    }
    out
}
