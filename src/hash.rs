//! Perceptual hashing of face crops.
//!
//! 64-bit DCT hash: the crop is reduced to 32x32 grayscale, transformed with
//! a 2-D DCT-II, and the top-left 8x8 of the frequency plane is thresholded
//! against its median. Visually similar crops land within a few bits of each
//! other under Hamming distance, which is what the duplicate suppressor
//! compares.

use std::fmt;

use image::imageops::{self, FilterType};

use crate::frame::Frame;

const HASH_SIZE: usize = 8;
const DCT_SIZE: usize = HASH_SIZE * 4;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FaceHash(u64);

impl FaceHash {
    /// Hash a crop. Returns `None` for degenerate crops; callers treat a
    /// missing hash as "never a duplicate".
    pub fn of(crop: &Frame) -> Option<FaceHash> {
        if crop.width() == 0 || crop.height() == 0 {
            return None;
        }

        let gray = imageops::grayscale(crop.image());
        let small = imageops::resize(
            &gray,
            DCT_SIZE as u32,
            DCT_SIZE as u32,
            FilterType::Triangle,
        );

        let mut pixels = [[0f64; DCT_SIZE]; DCT_SIZE];
        for (y, row) in pixels.iter_mut().enumerate() {
            for (x, px) in row.iter_mut().enumerate() {
                *px = small.get_pixel(x as u32, y as u32)[0] as f64;
            }
        }

        let freq = dct_2d(&pixels);

        let mut low = [0f64; HASH_SIZE * HASH_SIZE];
        for r in 0..HASH_SIZE {
            for c in 0..HASH_SIZE {
                low[r * HASH_SIZE + c] = freq[r][c];
            }
        }
        let median = median_of(&mut low.clone());

        let mut bits = 0u64;
        for r in 0..HASH_SIZE {
            for c in 0..HASH_SIZE {
                if freq[r][c] > median {
                    bits |= 1 << (63 - (r * HASH_SIZE + c));
                }
            }
        }
        Some(FaceHash(bits))
    }

    /// Hamming distance in bits.
    pub fn distance(self, other: FaceHash) -> u32 {
        (self.0 ^ other.0).count_ones()
    }

    pub fn to_hex(self) -> String {
        hex::encode(self.0.to_be_bytes())
    }

    pub fn from_bits(bits: u64) -> FaceHash {
        FaceHash(bits)
    }

    pub fn bits(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for FaceHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FaceHash({})", self.to_hex())
    }
}

impl fmt::Display for FaceHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Unnormalized DCT-II along rows then columns. The scale factor cancels in
/// the median threshold, so no orthonormal correction is applied.
fn dct_2d(input: &[[f64; DCT_SIZE]; DCT_SIZE]) -> [[f64; DCT_SIZE]; DCT_SIZE] {
    let mut rows = [[0f64; DCT_SIZE]; DCT_SIZE];
    for (r, row) in input.iter().enumerate() {
        rows[r] = dct_1d(row);
    }

    let mut out = [[0f64; DCT_SIZE]; DCT_SIZE];
    for c in 0..DCT_SIZE {
        let mut col = [0f64; DCT_SIZE];
        for r in 0..DCT_SIZE {
            col[r] = rows[r][c];
        }
        let col = dct_1d(&col);
        for r in 0..DCT_SIZE {
            out[r][c] = col[r];
        }
    }
    out
}

fn dct_1d(input: &[f64; DCT_SIZE]) -> [f64; DCT_SIZE] {
    let n = DCT_SIZE as f64;
    let mut out = [0f64; DCT_SIZE];
    for (k, out_k) in out.iter_mut().enumerate() {
        let mut sum = 0.0;
        for (i, &x) in input.iter().enumerate() {
            sum += x
                * (std::f64::consts::PI * k as f64 * (2.0 * i as f64 + 1.0) / (2.0 * n)).cos();
        }
        *out_k = 2.0 * sum;
    }
    out
}

fn median_of(values: &mut [f64]) -> f64 {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn gradient_frame() -> Frame {
        let img = RgbImage::from_fn(64, 64, |x, y| {
            let v = ((x * 4) as u16 + (y * 2) as u16).min(255) as u8;
            image::Rgb([v, v, v])
        });
        Frame::new(img)
    }

    fn checker_frame() -> Frame {
        let img = RgbImage::from_fn(64, 64, |x, y| {
            if (x / 8 + y / 8) % 2 == 0 {
                image::Rgb([255, 255, 255])
            } else {
                image::Rgb([0, 0, 0])
            }
        });
        Frame::new(img)
    }

    #[test]
    fn identical_crops_hash_identically() {
        let a = FaceHash::of(&gradient_frame()).unwrap();
        let b = FaceHash::of(&gradient_frame()).unwrap();
        assert_eq!(a.distance(b), 0);
    }

    #[test]
    fn dissimilar_crops_are_far_apart() {
        let a = FaceHash::of(&gradient_frame()).unwrap();
        let b = FaceHash::of(&checker_frame()).unwrap();
        assert!(a.distance(b) > 5, "distance {} too small", a.distance(b));
    }

    #[test]
    fn distance_counts_differing_bits() {
        let a = FaceHash::from_bits(0b1011);
        let b = FaceHash::from_bits(0b0001);
        assert_eq!(a.distance(b), 2);
        assert_eq!(b.distance(a), 2);
    }

    #[test]
    fn hex_form_is_16_chars() {
        let h = FaceHash::from_bits(0xdead_beef_0000_0001);
        assert_eq!(h.to_hex(), "deadbeef00000001");
    }
}
