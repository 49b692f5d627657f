use image::{Rgba, RgbaImage};

use crate::error::EditError;

/// A pixel with zero alpha. Cells are either this or fully opaque — the
/// canvas model has no partial transparency.
pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Build the opaque cell value for an RGB triple.
#[inline]
pub fn opaque(rgb: [u8; 3]) -> Rgba<u8> {
    Rgba([rgb[0], rgb[1], rgb[2], 255])
}

/// True when a cell counts as content for classification and export.
#[inline]
pub fn is_opaque(px: Rgba<u8>) -> bool {
    px[3] != 0
}

// ============================================================================
// ANCHOR — where old content sits inside a resized canvas
// ============================================================================

/// One of the nine positions content can hug during a canvas resize.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Anchor {
    TopLeft,
    Top,
    TopRight,
    Left,
    #[default]
    Center,
    Right,
    BottomLeft,
    Bottom,
    BottomRight,
}

impl Anchor {
    /// Per-axis placement: 0 = start edge, 1 = centered, 2 = end edge.
    fn axes(self) -> (u8, u8) {
        match self {
            Anchor::TopLeft => (0, 0),
            Anchor::Top => (1, 0),
            Anchor::TopRight => (2, 0),
            Anchor::Left => (0, 1),
            Anchor::Center => (1, 1),
            Anchor::Right => (2, 1),
            Anchor::BottomLeft => (0, 2),
            Anchor::Bottom => (1, 2),
            Anchor::BottomRight => (2, 2),
        }
    }

    pub fn all() -> &'static [Anchor] {
        &[
            Anchor::TopLeft,
            Anchor::Top,
            Anchor::TopRight,
            Anchor::Left,
            Anchor::Center,
            Anchor::Right,
            Anchor::BottomLeft,
            Anchor::Bottom,
            Anchor::BottomRight,
        ]
    }
}

/// Signed offset of the old image's origin inside the new canvas for one
/// axis. Positive pads (growing), negative crops (shrinking); the same
/// formula covers both because the copy below clips to both buffers.
fn axis_offset(placement: u8, old: u32, new: u32) -> i64 {
    match placement {
        0 => 0,
        1 => (new as i64 - old as i64) / 2,
        _ => new as i64 - old as i64,
    }
}

// ============================================================================
// CANVAS STATE — the bounded cell grid
// ============================================================================

/// The editable cell grid: `width × height` RGBA cells where alpha is 0
/// (transparent, excluded from all palette work) or 255.
///
/// The grid is exclusively owned by one [`crate::project::Project`]; all
/// mutation outside tests goes through the stroke recorder or the bulk-edit
/// helpers in [`crate::ops`] so that every change lands in undo history.
#[derive(Clone)]
pub struct CanvasState {
    width: u32,
    height: u32,
    pixels: RgbaImage,
}

impl CanvasState {
    /// Create a fully transparent canvas. Dimensions must be at least 1×1
    /// and no axis may exceed `max_dim`.
    pub fn new(width: u32, height: u32, max_dim: u32) -> Result<Self, EditError> {
        validate_dimensions(width, height, max_dim)?;
        Ok(Self {
            width,
            height,
            pixels: RgbaImage::from_pixel(width, height, TRANSPARENT),
        })
    }

    /// Wrap an existing RGBA buffer, normalising alpha to the 0/255 model.
    pub fn from_image(img: &RgbaImage, max_dim: u32) -> Result<Self, EditError> {
        let mut state = Self::new(img.width(), img.height(), max_dim)?;
        for (x, y, px) in img.enumerate_pixels() {
            let cell = if px[3] == 0 {
                TRANSPARENT
            } else {
                opaque([px[0], px[1], px[2]])
            };
            state.pixels.put_pixel(x, y, cell);
        }
        Ok(state)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// O(1) bounds-checked read.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> Option<Rgba<u8>> {
        if x < self.width && y < self.height {
            Some(*self.pixels.get_pixel(x, y))
        } else {
            None
        }
    }

    /// O(1) bounds-checked write. Out-of-range coordinates are ignored.
    #[inline]
    pub fn set(&mut self, x: u32, y: u32, px: Rgba<u8>) {
        if x < self.width && y < self.height {
            self.pixels.put_pixel(x, y, px);
        }
    }

    /// Iterate every cell as `(x, y, pixel)`.
    pub fn cells(&self) -> impl Iterator<Item = (u32, u32, Rgba<u8>)> + '_ {
        self.pixels.enumerate_pixels().map(|(x, y, px)| (x, y, *px))
    }

    /// Number of opaque cells.
    pub fn opaque_count(&self) -> usize {
        self.pixels.pixels().filter(|px| is_opaque(**px)).count()
    }

    /// Reset every cell to transparent. History is not touched; callers
    /// wanting an undoable clear use `ops::quantize::clear_with_undo`.
    pub fn clear(&mut self) {
        for px in self.pixels.pixels_mut() {
            *px = TRANSPARENT;
        }
    }

    /// Owned copy of the raw pixel grid, for diffing, export and encoding.
    pub fn to_rgba_image(&self) -> RgbaImage {
        self.pixels.clone()
    }

    /// Replace the whole grid with `img` (dimensions must match). Used by
    /// bulk edits after the replacement buffer has been fully computed.
    pub(crate) fn replace_pixels(&mut self, img: RgbaImage) {
        debug_assert_eq!((img.width(), img.height()), (self.width, self.height));
        self.pixels = img;
    }

    /// Resize the grid, anchoring the old content per `anchor`. Growing
    /// exposes transparent cells; shrinking crops from the edge opposite the
    /// anchor. Pixels always copy 1:1, never interpolated.
    ///
    /// This is a structural replacement: old and new coordinate spaces are
    /// incompatible, so the caller must clear undo history afterwards
    /// (`Project::resize_canvas` does).
    pub fn resize(&mut self, new_w: u32, new_h: u32, anchor: Anchor) {
        if new_w == 0 || new_h == 0 || (new_w == self.width && new_h == self.height) {
            return;
        }

        let (ax, ay) = anchor.axes();
        let offset_x = axis_offset(ax, self.width, new_w);
        let offset_y = axis_offset(ay, self.height, new_h);

        let mut next = RgbaImage::from_pixel(new_w, new_h, TRANSPARENT);
        for y in 0..self.height {
            for x in 0..self.width {
                let nx = x as i64 + offset_x;
                let ny = y as i64 + offset_y;
                if nx >= 0 && ny >= 0 && (nx as u32) < new_w && (ny as u32) < new_h {
                    next.put_pixel(nx as u32, ny as u32, *self.pixels.get_pixel(x, y));
                }
            }
        }

        self.width = new_w;
        self.height = new_h;
        self.pixels = next;
    }
}

/// Shared dimension check for create, resize and snapshot restore.
pub fn validate_dimensions(width: u32, height: u32, max_dim: u32) -> Result<(), EditError> {
    if width < 1 || height < 1 || width > max_dim || height > max_dim {
        return Err(EditError::Validation(format!(
            "canvas size {}×{} out of range (1..={} per axis)",
            width, height, max_dim
        )));
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
