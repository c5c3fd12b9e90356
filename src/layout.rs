use crate::node::PageNode;

/// The display area placements are computed for, in pixels.
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Target rectangle for one page image. `index` refers back into the
/// page's leaf order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Placement {
    pub index: usize,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Compute side-by-side placements for a page within `viewport`.
///
/// One uniform scale factor fits the combined page (sum of widths, max of
/// heights) into the viewport without distorting aspect ratios. The row is
/// centered horizontally as a whole and vertically as a group. Zero-sized
/// images contribute zero footprint instead of failing.
pub fn plan_page(page: &PageNode, viewport: Viewport) -> Vec<Placement> {
    let dims: Vec<(u32, u32)> = page
        .leaves()
        .iter()
        .map(|leaf| {
            let img = leaf.image();
            (img.width, img.height)
        })
        .collect();

    let combined_w: u64 = dims
        .iter()
        .filter(|(w, h)| *w > 0 && *h > 0)
        .map(|(w, _)| *w as u64)
        .sum();
    let combined_h: u64 = dims
        .iter()
        .filter(|(w, h)| *w > 0 && *h > 0)
        .map(|(_, h)| *h as u64)
        .max()
        .unwrap_or(0);

    let scale = if combined_w == 0 || combined_h == 0 || viewport.width == 0 || viewport.height == 0
    {
        0.0
    } else {
        let sx = viewport.width as f64 / combined_w as f64;
        let sy = viewport.height as f64 / combined_h as f64;
        sx.min(sy)
    };

    let row_w = combined_w as f64 * scale;
    let x0 = (viewport.width as f64 - row_w) / 2.0;

    let mut placements = Vec::with_capacity(dims.len());
    let mut advanced: u64 = 0; // natural widths consumed so far
    for (index, (w, h)) in dims.iter().copied().enumerate() {
        // Left and right edges round the same x0-inclusive positions, so
        // neighbours stay gap-free even when the row starts mid-pixel.
        let left = (x0 + advanced as f64 * scale).round() as i64;
        if w == 0 || h == 0 {
            placements.push(Placement {
                index,
                x: left as i32,
                y: (viewport.height / 2) as i32,
                width: 0,
                height: 0,
            });
            continue;
        }

        let right = (x0 + (advanced + w as u64) as f64 * scale).round() as i64;
        let height = (h as f64 * scale).round().max(0.0) as u32;
        let y = ((viewport.height as f64 - height as f64) / 2.0).round() as i32;

        placements.push(Placement {
            index,
            x: left as i32,
            y,
            width: (right - left).max(0) as u32,
            height,
        });
        advanced += w as u64;
    }
    placements
}
