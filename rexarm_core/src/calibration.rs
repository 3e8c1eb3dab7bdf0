//! Camera calibration from clicked reference points.
//!
//! The first click marks the pixel under the arm base. Every following click is
//! paired with the next configured world point; once all are collected the 2×2
//! pixel→world map is fitted by least squares over the re-centered pixels.

use nalgebra::{Matrix2, Vector2};

use crate::pointer::CalibrationContext;

/// Least-squares `A` minimizing `Σ |A·p − w|²` over `(p, w)` pairs.
///
/// Pixels must already be re-centered on the origin with the vertical axis
/// flipped, matching `CalibrationContext::pixel_to_world`.
pub fn fit_pixel_to_world(pairs: &[(Vector2<f64>, Vector2<f64>)]) -> eyre::Result<[[f64; 2]; 2]> {
    if pairs.len() < 2 {
        eyre::bail!("calibration requires at least two reference points, got {}", pairs.len());
    }
    let mut s_pp = Matrix2::<f64>::zeros();
    let mut s_wp = Matrix2::<f64>::zeros();
    for (p, w) in pairs {
        s_pp += p * p.transpose();
        s_wp += w * p.transpose();
    }
    let Some(inv) = s_pp.try_inverse() else {
        eyre::bail!("calibration points are collinear with the origin (degenerate pixel spread)");
    };
    let a = s_wp * inv;
    if a.iter().any(|v| !v.is_finite()) {
        eyre::bail!("calibration produced a non-finite map");
    }
    Ok([[a[(0, 0)], a[(0, 1)]], [a[(1, 0)], a[(1, 1)]]])
}

/// What a click did to an in-progress capture.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureStep {
    OriginSet,
    /// Reference point `index` (0-based) recorded.
    PointRecorded { index: usize, remaining: usize },
    Complete(CalibrationContext),
}

/// Accumulates clicks for one calibration run.
#[derive(Debug, Clone, Default)]
pub struct CalibrationCapture {
    origin: Option<(f64, f64)>,
    pairs: Vec<(Vector2<f64>, Vector2<f64>)>,
}

impl CalibrationCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn origin(&self) -> Option<(f64, f64)> {
        self.origin
    }

    pub fn recorded(&self) -> usize {
        self.pairs.len()
    }

    /// Feed one image-local click. `targets` are world points in click order.
    pub fn click(&mut self, x: i32, y: i32, targets: &[[f64; 2]]) -> eyre::Result<CaptureStep> {
        let (x, y) = (f64::from(x), f64::from(y));
        let Some((ox, oy)) = self.origin else {
            self.origin = Some((x, y));
            return Ok(CaptureStep::OriginSet);
        };
        let index = self.pairs.len();
        let Some(target) = targets.get(index) else {
            eyre::bail!("no world reference point configured for click {}", index + 1);
        };
        self.pairs
            .push((Vector2::new(x - ox, oy - y), Vector2::new(target[0], target[1])));
        let remaining = targets.len() - self.pairs.len();
        if remaining > 0 {
            return Ok(CaptureStep::PointRecorded { index, remaining });
        }
        let map = fit_pixel_to_world(&self.pairs)?;
        Ok(CaptureStep::Complete(CalibrationContext::new(ox, oy, map)))
    }
}
