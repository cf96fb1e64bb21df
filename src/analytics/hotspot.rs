//! Gaze hotspot: a 2-D histogram of eye centres over the capture frame, and its PNG rendering.

use std::io::Write;

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use serde::Serialize;

use crate::config::AnalyticsConfig;

/// Side length, in pixels, of one histogram cell in the rendered image.
const CELL_PX: u32 = 4;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Hotspot {
    pub bins_x: usize,
    pub bins_y: usize,
    pub width: u32,
    pub height: u32,
    /// Row-major counts; row 0 holds the smallest y values.
    pub counts: Vec<u32>,
    /// Points outside `[0, width] x [0, height]`, not binned.
    pub out_of_bounds: u64,
}

impl Hotspot {
    pub fn new(bins_x: usize, bins_y: usize, width: u32, height: u32) -> Self {
        let bins_x = bins_x.max(1);
        let bins_y = bins_y.max(1);
        Self {
            bins_x,
            bins_y,
            width: width.max(1),
            height: height.max(1),
            counts: vec![0; bins_x * bins_y],
            out_of_bounds: 0,
        }
    }

    pub fn from_config(config: &AnalyticsConfig) -> Self {
        Self::new(
            config.hotspot_bins_x,
            config.hotspot_bins_y,
            config.capture_width,
            config.capture_height,
        )
    }

    /// Bins one point. The right and top edges belong to the last bin.
    pub fn add(&mut self, x: f64, y: f64) -> bool {
        let (Some(bx), Some(by)) = (
            bin_index(x, self.width, self.bins_x),
            bin_index(y, self.height, self.bins_y),
        ) else {
            self.out_of_bounds += 1;
            return false;
        };
        self.counts[by * self.bins_x + bx] += 1;
        true
    }

    pub fn count(&self, bx: usize, by: usize) -> u32 {
        if bx >= self.bins_x || by >= self.bins_y {
            return 0;
        }
        self.counts[by * self.bins_x + bx]
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().map(|&c| c as u64).sum()
    }

    pub fn max(&self) -> u32 {
        self.counts.iter().copied().max().unwrap_or(0)
    }

    /// RGB8 pixels with the origin at the bottom-left, each cell `CELL_PX` square.
    pub fn to_rgb(&self) -> (u32, u32, Vec<u8>) {
        let img_w = self.bins_x as u32 * CELL_PX;
        let img_h = self.bins_y as u32 * CELL_PX;
        let max = self.max().max(1) as f64;

        let mut buffer = Vec::with_capacity((img_w * img_h * 3) as usize);
        for py in 0..img_h {
            // 图像第一行是直方图最顶部的一行
            let by = self.bins_y - 1 - (py / CELL_PX) as usize;
            for px in 0..img_w {
                let bx = (px / CELL_PX) as usize;
                let t = self.count(bx, by) as f64 / max;
                buffer.extend_from_slice(&hot_color(t));
            }
        }
        (img_w, img_h, buffer)
    }

    pub fn write_png<W: Write>(&self, out: W) -> Result<(), image::ImageError> {
        let (w, h, buffer) = self.to_rgb();
        PngEncoder::new(out).write_image(&buffer, w, h, ExtendedColorType::Rgb8)
    }
}

fn bin_index(v: f64, extent: u32, bins: usize) -> Option<usize> {
    let extent = extent as f64;
    if !(0.0..=extent).contains(&v) {
        return None;
    }
    let idx = (v / extent * bins as f64).floor() as usize;
    Some(idx.min(bins - 1))
}

/// Black -> red -> yellow -> white ramp for `t` in [0, 1].
pub fn hot_color(t: f64) -> [u8; 3] {
    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
    let channel = |lo: f64, hi: f64| (((t - lo) / (hi - lo)).clamp(0.0, 1.0) * 255.0).round() as u8;
    [channel(0.0, 0.375), channel(0.375, 0.75), channel(0.75, 1.0)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn points_land_in_expected_bins() {
        let mut h = Hotspot::new(100, 100, 1920, 1080);
        assert!(h.add(0.0, 0.0));
        assert!(h.add(1920.0, 1080.0));
        assert!(h.add(960.0, 540.0));
        assert_eq!(h.count(0, 0), 1);
        assert_eq!(h.count(99, 99), 1);
        assert_eq!(h.count(50, 50), 1);
        assert_eq!(h.total(), 3);
    }

    #[test]
    fn out_of_frame_points_are_counted_not_binned() {
        let mut h = Hotspot::new(10, 10, 100, 100);
        assert!(!h.add(-1.0, 5.0));
        assert!(!h.add(5.0, 100.5));
        assert!(!h.add(f64::NAN, 5.0));
        assert_eq!(h.total(), 0);
        assert_eq!(h.out_of_bounds, 3);
    }

    #[test]
    fn zero_bins_fall_back_to_one() {
        let mut h = Hotspot::new(0, 0, 0, 0);
        assert!(h.add(1.0, 1.0));
        assert_eq!(h.count(0, 0), 1);
    }

    #[test]
    fn hot_ramp_endpoints() {
        assert_eq!(hot_color(0.0), [0, 0, 0]);
        assert_eq!(hot_color(0.375), [255, 0, 0]);
        assert_eq!(hot_color(0.75), [255, 255, 0]);
        assert_eq!(hot_color(1.0), [255, 255, 255]);
        assert_eq!(hot_color(f64::NAN), [0, 0, 0]);
    }

    #[test]
    fn render_puts_origin_bottom_left() {
        let mut h = Hotspot::new(2, 2, 10, 10);
        h.add(1.0, 1.0);
        let (w, ht, buf) = h.to_rgb();
        assert_eq!((w, ht), (2 * CELL_PX, 2 * CELL_PX));

        let pixel = |x: u32, y: u32| {
            let i = ((y * w + x) * 3) as usize;
            [buf[i], buf[i + 1], buf[i + 2]]
        };
        assert_eq!(pixel(0, ht - 1), [255, 255, 255]);
        assert_eq!(pixel(0, 0), [0, 0, 0]);
    }

    #[test]
    fn png_has_signature() {
        let mut h = Hotspot::new(4, 3, 40, 30);
        h.add(5.0, 5.0);
        let mut out = Vec::new();
        h.write_png(&mut out).expect("encode");
        assert_eq!(&out[..8], b"\x89PNG\r\n\x1a\n");
    }
}
