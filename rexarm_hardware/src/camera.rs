//! Simulated RGB-D camera looking down on a flat work surface.

use rexarm_traits::{CapError, DepthImage, RgbImage, VisionProvider};

use crate::error::HwError;

/// Depth decode constants of the simulated sensor (`Z = a * tan(raw / b + c)`).
const DEPTH_A: f64 = 12.36;
const DEPTH_B: f64 = 2842.5;
const DEPTH_C: f64 = 1.1863;

/// Inverse of the sensor decode: raw sample for a camera distance.
pub fn raw_for_distance(z: f64) -> u16 {
    let raw = ((z / DEPTH_A).atan() - DEPTH_C) * DEPTH_B;
    raw.round().clamp(1.0, 2047.0) as u16
}

/// Box resting on the surface, in image pixels.
#[derive(Debug, Clone, Copy)]
pub struct SimBlock {
    pub row: usize,
    pub col: usize,
    pub size: usize,
    pub height: f64,
}

pub struct SimulatedCamera {
    width: usize,
    height: usize,
    surface_distance: f64,
    blocks: Vec<SimBlock>,
    warmup_frames: u32,
    captured: u32,
    depth: DepthImage,
    rgb: RgbImage,
}

impl SimulatedCamera {
    /// `surface_distance` is the camera-to-table distance in sensor units.
    pub fn new(width: usize, height: usize, surface_distance: f64) -> Self {
        SimulatedCamera {
            width,
            height,
            surface_distance,
            blocks: Vec::new(),
            warmup_frames: 0,
            captured: 0,
            depth: DepthImage::zeros(width, height),
            rgb: RgbImage::blank(width, height),
        }
    }

    /// The first `n` depth captures yield an empty frame, like a sensor spinning up.
    pub fn with_warmup(mut self, n: u32) -> Self {
        self.warmup_frames = n;
        self
    }

    pub fn with_block(mut self, block: SimBlock) -> Self {
        self.blocks.push(block);
        self
    }

    fn render_depth(&self) -> DepthImage {
        let mut depth = DepthImage::zeros(self.width, self.height);
        let table = raw_for_distance(self.surface_distance);
        depth.data.fill(table);
        for b in &self.blocks {
            let raw = raw_for_distance(self.surface_distance - b.height);
            for row in b.row..(b.row + b.size).min(self.height) {
                for col in b.col..(b.col + b.size).min(self.width) {
                    depth.set(row, col, raw);
                }
            }
        }
        depth
    }
}

impl VisionProvider for SimulatedCamera {
    fn capture_video_frame(&mut self) -> Result<(), CapError> {
        let mut rgb = RgbImage::blank(self.width, self.height);
        for (i, px) in rgb.data.chunks_exact_mut(3).enumerate() {
            let row = i / self.width.max(1);
            let col = i % self.width.max(1);
            px[0] = (col * 255 / self.width.max(1)) as u8;
            px[1] = (row * 255 / self.height.max(1)) as u8;
            px[2] = 96;
        }
        for b in &self.blocks {
            for row in b.row..(b.row + b.size).min(self.height) {
                for col in b.col..(b.col + b.size).min(self.width) {
                    let i = (row * self.width + col) * 3;
                    rgb.data[i..i + 3].copy_from_slice(&[220, 40, 40]);
                }
            }
        }
        self.rgb = rgb;
        Ok(())
    }

    fn capture_depth_frame(&mut self) -> Result<(), CapError> {
        self.captured = self.captured.saturating_add(1);
        if self.captured <= self.warmup_frames {
            self.depth = DepthImage::zeros(self.width, self.height);
            return Ok(());
        }
        self.depth = self.render_depth();
        Ok(())
    }

    fn convert_frame(&mut self) -> Result<RgbImage, CapError> {
        Ok(self.rgb.clone())
    }

    fn convert_depth_frame(&mut self) -> Result<RgbImage, CapError> {
        if self.depth.data.len() != self.width * self.height {
            return Err(Box::new(HwError::SensorNotReady));
        }
        // Map the 11-bit raw range onto a grey ramp, near is bright.
        let mut out = RgbImage::blank(self.width, self.height);
        for (px, &raw) in out.data.chunks_exact_mut(3).zip(&self.depth.data) {
            let v = 255u16.saturating_sub(raw >> 3) as u8;
            px.copy_from_slice(&[v, v, v]);
        }
        Ok(out)
    }

    fn current_depth_frame(&self) -> DepthImage {
        self.depth.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_round_trips_through_decode() {
        let raw = raw_for_distance(95.0);
        let z = DEPTH_A * (f64::from(raw) / DEPTH_B + DEPTH_C).tan();
        assert!((z - 95.0).abs() < 0.5, "z = {z}");
    }

    #[test]
    fn warmup_frames_are_empty() {
        let mut cam = SimulatedCamera::new(8, 6, 95.0).with_warmup(1);
        cam.capture_depth_frame().unwrap();
        assert!(!cam.current_depth_frame().is_populated());
        cam.capture_depth_frame().unwrap();
        assert!(cam.current_depth_frame().is_populated());
    }

    #[test]
    fn block_is_closer_than_table() {
        let mut cam = SimulatedCamera::new(10, 10, 95.0).with_block(SimBlock {
            row: 2,
            col: 2,
            size: 3,
            height: 4.0,
        });
        cam.capture_depth_frame().unwrap();
        let d = cam.current_depth_frame();
        let table = d.sample(0, 0).unwrap();
        let block = d.sample(3, 3).unwrap();
        assert!(block < table, "block {block} should decode nearer than table {table}");
    }
}
