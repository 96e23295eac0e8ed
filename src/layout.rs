use crate::client::ClientId;
use serde::Deserialize;

/// Smallest width or height a tile may be given.
pub const MIN_TILE: u32 = 100;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Shrink by `border` on every side so the drawn border stays inside.
    fn inset(self, border: u32) -> Self {
        Self {
            x: self.x + border as i32,
            y: self.y + border as i32,
            width: self.width.saturating_sub(2 * border),
            height: self.height.saturating_sub(2 * border),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    Monocle,
    Floating,
    #[default]
    Tiling,
}

impl Layout {
    pub fn next(self) -> Self {
        match self {
            Layout::Tiling => Layout::Monocle,
            Layout::Monocle => Layout::Floating,
            Layout::Floating => Layout::Tiling,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Layout::Monocle => "monocle",
            Layout::Floating => "floating",
            Layout::Tiling => "tiling",
        }
    }
}

/// Which way the tiling layout splits master from stack.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SplitAxis {
    /// Master on the left, stack on the right.
    #[default]
    Vertical,
    /// Master on top, stack below.
    Horizontal,
}

impl SplitAxis {
    pub fn flip(self) -> Self {
        match self {
            SplitAxis::Vertical => SplitAxis::Horizontal,
            SplitAxis::Horizontal => SplitAxis::Vertical,
        }
    }
}

/// Compute a geometry for every client of a workspace.
///
/// `clients` is in list order (head first) paired with the last geometry
/// sent for each client. Returns nothing when the usable area is too small
/// to hold a tile.
pub fn apply(
    clients: &[(ClientId, Rect)],
    bounds: Rect,
    layout: Layout,
    axis: SplitAxis,
    border: u32,
) -> Vec<(ClientId, Rect)> {
    if clients.is_empty() {
        return Vec::new();
    }
    let usable_w = bounds.width.saturating_sub(2 * border);
    let usable_h = bounds.height.saturating_sub(2 * border);
    if usable_w < MIN_TILE || usable_h < MIN_TILE {
        log::debug!(
            "Usable area {}x{} below minimum tile, skipping layout",
            usable_w,
            usable_h
        );
        return Vec::new();
    }

    match layout {
        Layout::Monocle => monocle(clients, bounds, border),
        Layout::Floating => floating(clients, bounds, border),
        Layout::Tiling => tile(clients, bounds, axis, border),
    }
}

fn monocle(clients: &[(ClientId, Rect)], bounds: Rect, border: u32) -> Vec<(ClientId, Rect)> {
    let full = bounds.inset(border);
    clients.iter().map(|&(id, _)| (id, full)).collect()
}

fn floating(clients: &[(ClientId, Rect)], bounds: Rect, border: u32) -> Vec<(ClientId, Rect)> {
    let avail_w = bounds.width.saturating_sub(2 * border);
    let avail_h = bounds.height.saturating_sub(2 * border);
    let width = (avail_w * 6 / 10).max(MIN_TILE).min(bounds.width);
    let height = (avail_h * 6 / 10).max(MIN_TILE).min(bounds.height);

    clients
        .iter()
        .map(|&(id, last)| (id, Rect::new(last.x, last.y, width, height)))
        .collect()
}

fn tile(
    clients: &[(ClientId, Rect)],
    bounds: Rect,
    axis: SplitAxis,
    border: u32,
) -> Vec<(ClientId, Rect)> {
    let (master, stack) = match clients.split_first() {
        Some(split) => split,
        None => return Vec::new(),
    };
    if stack.is_empty() {
        return vec![(master.0, bounds.inset(border))];
    }

    let mut placed = Vec::with_capacity(clients.len());
    let count = stack.len() as u32;

    match axis {
        SplitAxis::Vertical => {
            let master_w = (bounds.width / 2).max(MIN_TILE).min(bounds.width);
            let (stack_x, stack_w) = split_remainder(bounds.x, bounds.width, master_w);
            placed.push((
                master.0,
                Rect::new(bounds.x, bounds.y, master_w, bounds.height).inset(border),
            ));
            for (&(id, _), (y, h)) in stack.iter().zip(slots(bounds.y, bounds.height, count)) {
                placed.push((id, Rect::new(stack_x, y, stack_w, h).inset(border)));
            }
        }
        SplitAxis::Horizontal => {
            let master_h = (bounds.height / 2).max(MIN_TILE).min(bounds.height);
            let (stack_y, stack_h) = split_remainder(bounds.y, bounds.height, master_h);
            placed.push((
                master.0,
                Rect::new(bounds.x, bounds.y, bounds.width, master_h).inset(border),
            ));
            for (&(id, _), (x, w)) in stack.iter().zip(slots(bounds.x, bounds.width, count)) {
                placed.push((id, Rect::new(x, stack_y, w, stack_h).inset(border)));
            }
        }
    }
    placed
}

/// Start and extent of the stack region once the master took `master`.
/// A region thinner than a tile is pulled back over the master.
fn split_remainder(start: i32, extent: u32, master: u32) -> (i32, u32) {
    let rest = extent - master;
    if rest >= MIN_TILE {
        (start + master as i32, rest)
    } else {
        let width = MIN_TILE.min(extent);
        (start + (extent - width) as i32, width)
    }
}

/// Divide `extent` into `count` slots. The last slot absorbs the integer
/// remainder. Slots never shrink below a tile; when they do not fit they
/// are spread evenly across `extent` and overlap.
fn slots(start: i32, extent: u32, count: u32) -> impl Iterator<Item = (i32, u32)> {
    let even = extent / count;
    let size = even.max(MIN_TILE).min(extent);
    let crowded = size > even;
    (0..count).map(move |i| {
        if crowded {
            let step = u64::from(extent - size) * u64::from(i) / u64::from(count - 1);
            return (start + step as i32, size);
        }
        let len = if i + 1 == count {
            extent - even * (count - 1)
        } else {
            even
        };
        (start + (i * even) as i32, len)
    })
}
