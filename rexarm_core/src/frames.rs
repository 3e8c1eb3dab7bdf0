//! Latest-frame-wins buffers written by the acquisition loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;
use rexarm_traits::{DepthImage, RgbImage};

/// One complete acquisition: display images plus the raw depth they came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frames {
    pub rgb: RgbImage,
    pub depth_display: RgbImage,
    pub depth_raw: DepthImage,
    /// Acquisition sequence number; 0 until the first publish.
    pub seq: u64,
}

/// Shared frame buffers. Readers always see a whole `Frames`.
#[derive(Debug)]
pub struct FrameStore {
    current: ArcSwap<Frames>,
    seq: AtomicU64,
}

impl FrameStore {
    /// Start with an all-zero depth frame of the given size (the "not populated" sentinel).
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            current: ArcSwap::from_pointee(Frames {
                rgb: RgbImage::blank(width, height),
                depth_display: RgbImage::blank(width, height),
                depth_raw: DepthImage::zeros(width, height),
                seq: 0,
            }),
            seq: AtomicU64::new(0),
        }
    }

    /// Replace the published frames; stamps and returns the sequence number.
    pub fn publish(&self, rgb: RgbImage, depth_display: RgbImage, depth_raw: DepthImage) -> u64 {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        self.current.store(Arc::new(Frames {
            rgb,
            depth_display,
            depth_raw,
            seq,
        }));
        seq
    }

    pub fn latest(&self) -> Arc<Frames> {
        self.current.load_full()
    }

    pub fn seq(&self) -> u64 {
        self.current.load().seq
    }
}
