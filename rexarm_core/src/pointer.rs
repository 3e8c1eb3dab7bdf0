//! Pointer-to-world resolution.
//!
//! `resolve` is a pure function of the cursor position, the display rectangle,
//! the latest depth frame, the (optional) camera calibration and the depth
//! decode constants. The pointer loop calls it on a timer and publishes the
//! result; tests call it directly.

use std::fmt;

use nalgebra::{Matrix3, Vector2};
use parking_lot::Mutex;
use rexarm_traits::DepthImage;

/// Window-pixel rectangle the video image is drawn into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayRect {
    pub min_x: i32,
    pub max_x: i32,
    pub min_y: i32,
    pub max_y: i32,
}

impl Default for DisplayRect {
    fn default() -> Self {
        Self {
            min_x: 240,
            max_x: 880,
            min_y: 40,
            max_y: 520,
        }
    }
}

impl DisplayRect {
    /// Half-open containment used for cursor tracking.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.min_x && x < self.max_x && y >= self.min_y && y < self.max_y
    }

    /// Closed containment used for clicks.
    pub fn contains_inclusive(&self, x: i32, y: i32) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Window pixel → image-local pixel.
    pub fn to_local(&self, x: i32, y: i32) -> (i32, i32) {
        (x - self.min_x, y - self.min_y)
    }

    pub fn width(&self) -> usize {
        usize::try_from(self.max_x - self.min_x).unwrap_or(0)
    }

    pub fn height(&self) -> usize {
        usize::try_from(self.max_y - self.min_y).unwrap_or(0)
    }
}

/// Raw depth → distance: `Z = scale * tan(raw / divisor + phase)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthModel {
    pub scale: f64,
    pub divisor: f64,
    pub phase: f64,
    /// Camera-to-base-plane distance; `Z_base = plane_offset - Z`.
    pub plane_offset: f64,
}

impl Default for DepthModel {
    fn default() -> Self {
        Self {
            scale: 12.36,
            divisor: 2842.5,
            phase: 1.1863,
            plane_offset: 95.0,
        }
    }
}

impl DepthModel {
    /// Camera distance for a raw sample.
    #[inline]
    pub fn distance(&self, raw: u16) -> f64 {
        self.scale * (f64::from(raw) / self.divisor + self.phase).tan()
    }

    /// Height above the base plane for a raw sample.
    #[inline]
    pub fn height_above_base(&self, raw: u16) -> f64 {
        self.plane_offset - self.distance(raw)
    }
}

/// Pixel origin plus pixel→world map. Only the top-left 2×2 block of `affine`
/// is applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationContext {
    pub pixel_origin: Vector2<f64>,
    pub affine: Matrix3<f64>,
}

impl CalibrationContext {
    pub fn new(origin_x: f64, origin_y: f64, map: [[f64; 2]; 2]) -> Self {
        let mut affine = Matrix3::identity();
        affine[(0, 0)] = map[0][0];
        affine[(0, 1)] = map[0][1];
        affine[(1, 0)] = map[1][0];
        affine[(1, 1)] = map[1][1];
        Self {
            pixel_origin: Vector2::new(origin_x, origin_y),
            affine,
        }
    }

    /// Identity map around the given origin.
    pub fn identity(origin_x: f64, origin_y: f64) -> Self {
        Self::new(origin_x, origin_y, [[1.0, 0.0], [0.0, 1.0]])
    }

    /// Image-local pixel → world (X, Y). The vertical axis is flipped.
    pub fn pixel_to_world(&self, x: f64, y: f64) -> (f64, f64) {
        let centered = Vector2::new(x - self.pixel_origin.x, self.pixel_origin.y - y);
        let w = self.affine.fixed_view::<2, 2>(0, 0) * centered;
        (w.x, w.y)
    }

    /// Row-major top-left 2×2 block.
    pub fn map(&self) -> [[f64; 2]; 2] {
        [
            [self.affine[(0, 0)], self.affine[(0, 1)]],
            [self.affine[(1, 0)], self.affine[(1, 1)]],
        ]
    }
}

/// What the pointer currently resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum PointerReadout {
    #[default]
    NoPosition,
    /// Inside the image with depth, no calibration yet.
    Pixel { x: i32, y: i32, raw: u16 },
    World {
        x: i32,
        y: i32,
        raw: u16,
        /// (X, Y, `Z_base`)
        world: [f64; 3],
    },
}

const NO_DATA: &str = "(-,-,-)";

impl PointerReadout {
    pub fn pixel_text(&self) -> String {
        match *self {
            Self::NoPosition => NO_DATA.to_string(),
            Self::Pixel { x, y, raw } | Self::World { x, y, raw, .. } => {
                format!("({x},{y},{raw})")
            }
        }
    }

    pub fn world_text(&self) -> String {
        match self {
            Self::World { world, .. } => {
                format!("({:.0},{:.0},{:.1})", world[0], world[1], world[2])
            }
            _ => NO_DATA.to_string(),
        }
    }

    pub fn world(&self) -> Option<[f64; 3]> {
        match self {
            Self::World { world, .. } => Some(*world),
            _ => None,
        }
    }
}

impl fmt::Display for PointerReadout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pixel {} world {}", self.pixel_text(), self.world_text())
    }
}

/// Resolve a window-pixel cursor into a readout.
pub fn resolve(
    cursor: (i32, i32),
    rect: &DisplayRect,
    depth: &DepthImage,
    calibration: Option<&CalibrationContext>,
    model: &DepthModel,
) -> PointerReadout {
    let (cx, cy) = cursor;
    if !rect.contains(cx, cy) {
        return PointerReadout::NoPosition;
    }
    let (x, y) = rect.to_local(cx, cy);
    if !depth.is_populated() {
        return PointerReadout::NoPosition;
    }
    let (Ok(row), Ok(col)) = (usize::try_from(y), usize::try_from(x)) else {
        return PointerReadout::NoPosition;
    };
    let Some(raw) = depth.sample(row, col) else {
        return PointerReadout::NoPosition;
    };
    let z_base = model.height_above_base(raw);
    match calibration {
        None => PointerReadout::Pixel { x, y, raw },
        Some(cal) => {
            let (wx, wy) = cal.pixel_to_world(f64::from(x), f64::from(y));
            PointerReadout::World {
                x,
                y,
                raw,
                world: [wx, wy, z_base],
            }
        }
    }
}

#[derive(Debug, Default)]
struct PointerInner {
    cursor: Option<(i32, i32)>,
    last_click: Option<(i32, i32)>,
    new_click: bool,
}

/// Cursor position and click capture, shared between the input boundary and
/// the loops.
#[derive(Debug, Default)]
pub struct Pointer {
    inner: Mutex<PointerInner>,
}

impl Pointer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the cursor in window pixels.
    pub fn move_to(&self, x: i32, y: i32) {
        self.inner.lock().cursor = Some((x, y));
    }

    /// Cursor left the window.
    pub fn leave(&self) {
        self.inner.lock().cursor = None;
    }

    pub fn cursor(&self) -> Option<(i32, i32)> {
        self.inner.lock().cursor
    }

    /// Capture a click. Clicks outside `rect` are ignored; accepted clicks are
    /// stored image-local and flagged as new. Returns whether it was accepted.
    pub fn click(&self, x: i32, y: i32, rect: &DisplayRect) -> bool {
        if !rect.contains_inclusive(x, y) {
            return false;
        }
        let mut g = self.inner.lock();
        g.last_click = Some(rect.to_local(x, y));
        g.new_click = true;
        true
    }

    /// Consume the pending click, if any.
    pub fn take_click(&self) -> Option<(i32, i32)> {
        let mut g = self.inner.lock();
        if g.new_click {
            g.new_click = false;
            g.last_click
        } else {
            None
        }
    }

    pub fn last_click(&self) -> Option<(i32, i32)> {
        self.inner.lock().last_click
    }

    pub fn has_new_click(&self) -> bool {
        self.inner.lock().new_click
    }
}
