// SPDX-License-Identifier: GPL-3.0-or-later

//! Perceptual hashing of sampled frames against a reference hash store.
//!
//! The hash is the classic DCT variant: grayscale, shrink to 32x32,
//! 2D DCT, keep the 8x8 low-frequency block minus the DC term, and
//! threshold against the median. Robust to re-encodes and scaling,
//! which is exactly what distinguishes two rips of the same film.

use async_trait::async_trait;
use image::imageops::FilterType;
use image::GrayImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use vidsort_domain::{CatalogId, Evidence, EvidenceSource};

const HASH_INPUT_SIZE: u32 = 32;
const HASH_BLOCK: usize = 8;
const HASH_BITS: u32 = 64;

/// Best store hit for one frame hash.
#[derive(Debug, Clone, PartialEq)]
pub struct HashMatch {
    pub catalog_id: CatalogId,
    pub title: String,
    pub year: Option<u16>,
    /// Hamming similarity in [0, 1].
    pub score: f32,
}

/// Reference hash lookup, implemented by the SQLite adapter and mocked
/// in pipeline tests.
#[async_trait]
pub trait HashStore: Send + Sync {
    async fn nearest(&self, hash: u64) -> anyhow::Result<Option<HashMatch>>;
}

/// Frame-level matcher over a [`HashStore`].
pub struct PhashMatcher {
    store: Arc<dyn HashStore>,
}

impl PhashMatcher {
    pub fn new(store: Arc<dyn HashStore>) -> Self {
        Self { store }
    }

    /// Hash every sampled frame, query the store for each, and keep the
    /// single best hit. Undecodable frames are skipped.
    pub async fn match_frames(&self, frames: &[PathBuf]) -> anyhow::Result<Option<Evidence>> {
        let mut best: Option<HashMatch> = None;

        for frame in frames {
            let hash = match hash_file(frame) {
                Ok(hash) => hash,
                Err(e) => {
                    warn!(target: "hashdb", "could not hash {}: {}", frame.display(), e);
                    continue;
                }
            };

            if let Some(hit) = self.store.nearest(hash).await? {
                let replace = best.as_ref().map(|b| hit.score > b.score).unwrap_or(true);
                if replace {
                    best = Some(hit);
                }
            }
        }

        Ok(best.map(|hit| {
            debug!(
                target: "hashdb",
                "best reference hit: '{}' score {:.2}",
                hit.title, hit.score
            );
            Evidence {
                source: EvidenceSource::PerceptualHash,
                score: hit.score,
                matched_title: Some(hit.title),
                matched_id: Some(hit.catalog_id),
                matched_year: hit.year,
                detail: None,
            }
        }))
    }
}

/// Compute the 64-bit perceptual hash of an image file.
pub fn hash_file(path: &Path) -> anyhow::Result<u64> {
    let img = image::open(path)?;
    let gray = img
        .resize_exact(HASH_INPUT_SIZE, HASH_INPUT_SIZE, FilterType::Triangle)
        .to_luma8();
    Ok(hash_gray(&gray))
}

/// Hash an already-decoded grayscale image (any size; resized here).
pub fn hash_gray(gray: &GrayImage) -> u64 {
    let gray = if gray.dimensions() == (HASH_INPUT_SIZE, HASH_INPUT_SIZE) {
        gray.clone()
    } else {
        image::imageops::resize(gray, HASH_INPUT_SIZE, HASH_INPUT_SIZE, FilterType::Triangle)
    };

    let n = HASH_INPUT_SIZE as usize;
    let pixels: Vec<f64> = gray.pixels().map(|p| f64::from(p.0[0])).collect();
    let coeffs = dct_2d(&pixels, n);

    // low-frequency 8x8 block, skipping the DC coefficient
    let mut block = Vec::with_capacity(HASH_BLOCK * HASH_BLOCK - 1);
    for v in 0..HASH_BLOCK {
        for u in 0..HASH_BLOCK {
            if u == 0 && v == 0 {
                continue;
            }
            block.push(coeffs[v * n + u]);
        }
    }

    let mut sorted = block.clone();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let median = sorted[sorted.len() / 2];

    let mut hash = 0u64;
    for (bit, value) in block.iter().enumerate() {
        if *value > median {
            hash |= 1 << bit;
        }
    }
    hash
}

/// Hamming similarity between two hashes, in [0, 1].
pub fn hamming_similarity(a: u64, b: u64) -> f32 {
    1.0 - (a ^ b).count_ones() as f32 / HASH_BITS as f32
}

fn dct_2d(pixels: &[f64], n: usize) -> Vec<f64> {
    let mut cos_table = vec![0.0; n * n];
    for k in 0..n {
        for i in 0..n {
            cos_table[k * n + i] =
                (std::f64::consts::PI / n as f64 * (i as f64 + 0.5) * k as f64).cos();
        }
    }

    // rows, then columns
    let mut rows = vec![0.0; n * n];
    for y in 0..n {
        for u in 0..n {
            let mut sum = 0.0;
            for x in 0..n {
                sum += pixels[y * n + x] * cos_table[u * n + x];
            }
            rows[y * n + u] = sum;
        }
    }

    let mut out = vec![0.0; n * n];
    for u in 0..n {
        for v in 0..n {
            let mut sum = 0.0;
            for y in 0..n {
                sum += rows[y * n + u] * cos_table[v * n + y];
            }
            out[v * n + u] = sum;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn gradient(scale: u32) -> GrayImage {
        GrayImage::from_fn(64, 64, move |x, y| Luma([((x * scale + y) % 256) as u8]))
    }

    fn checkerboard(cell: u32) -> GrayImage {
        GrayImage::from_fn(64, 64, move |x, y| {
            if (x / cell + y / cell) % 2 == 0 {
                Luma([255])
            } else {
                Luma([0])
            }
        })
    }

    #[test]
    fn identical_images_hash_identically() {
        assert_eq!(hash_gray(&gradient(2)), hash_gray(&gradient(2)));
    }

    #[test]
    fn hash_survives_rescaling() {
        let small = image::imageops::resize(&gradient(2), 32, 32, FilterType::Triangle);
        let sim = hamming_similarity(hash_gray(&gradient(2)), hash_gray(&small));
        assert!(sim > 0.9, "similarity {}", sim);
    }

    #[test]
    fn different_structures_hash_apart() {
        let sim = hamming_similarity(hash_gray(&gradient(2)), hash_gray(&checkerboard(8)));
        assert!(sim < 0.85, "similarity {}", sim);
    }

    #[test]
    fn similarity_bounds_hold() {
        assert_eq!(hamming_similarity(0, 0), 1.0);
        assert_eq!(hamming_similarity(0, u64::MAX), 0.0);
        let mid = hamming_similarity(0, 0x00FF_00FF_00FF_00FF);
        assert!((mid - 0.5).abs() < 1e-6);
    }
}
