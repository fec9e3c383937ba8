//! Brand compliance scoring for rendered variants.
//!
//! Weighted sum: exact target dimensions (30%), a brand color among
//! the dominant palette (40%), logo mark present (30%). A variant
//! passes at or above the configured threshold.

use creative_core::config::BrandConfig;
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, RgbaImage};
use tracing::debug;

const DIMENSION_WEIGHT: f64 = 0.30;
const COLOR_WEIGHT: f64 = 0.40;
const LOGO_WEIGHT: f64 = 0.30;

/// Colors closer than this Euclidean distance count as a match.
const COLOR_TOLERANCE: f64 = 50.0;
const PALETTE_SIZE: usize = 5;
const THUMBNAIL_EDGE: u32 = 150;

/// Per-check breakdown behind a variant's score.
#[derive(Debug, Clone)]
pub struct ComplianceOutcome {
    pub score: f64,
    pub dimensions_ok: bool,
    pub matched_colors: Vec<String>,
    pub logo_present: bool,
}

pub struct ComplianceChecker {
    brand_colors: Vec<(String, [u8; 3])>,
    logo: Option<GrayImage>,
    require_logo: bool,
    threshold: f64,
}

impl ComplianceChecker {
    pub fn new(brand: &BrandConfig) -> Self {
        let brand_colors = brand
            .colors
            .iter()
            .filter_map(|(name, hex)| parse_hex_color(hex).map(|rgb| (name.clone(), rgb)))
            .collect();

        // Missing logo file with require_logo on means the check can
        // never pass; that is surfaced per variant, not at startup.
        let logo = if brand.require_logo {
            image::open(&brand.logo_path)
                .ok()
                .map(|l| l.resize(64, 64, FilterType::Triangle).to_luma8())
        } else {
            None
        };

        Self {
            brand_colors,
            logo,
            require_logo: brand.require_logo,
            threshold: brand.compliance_threshold,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Score a rendered variant against the expected dimensions.
    pub fn check(&self, img: &RgbaImage, expected: (u32, u32)) -> ComplianceOutcome {
        let dimensions_ok = img.dimensions() == expected;

        let palette = dominant_colors(img);
        let mut matched_colors = Vec::new();
        for (name, brand_rgb) in &self.brand_colors {
            if palette
                .iter()
                .any(|p| color_distance(*brand_rgb, *p) < COLOR_TOLERANCE)
            {
                matched_colors.push(name.clone());
            }
        }

        let logo_present = if self.require_logo {
            self.logo
                .as_ref()
                .map(|logo| logo_match(img, logo))
                .unwrap_or(false)
        } else {
            // Logo enforcement disabled: the mark is composited
            // upstream, so the weight is granted.
            true
        };

        let mut score = 0.0;
        if dimensions_ok {
            score += DIMENSION_WEIGHT;
        }
        if !matched_colors.is_empty() {
            score += COLOR_WEIGHT;
        }
        if logo_present {
            score += LOGO_WEIGHT;
        }
        let score = score.clamp(0.0, 1.0);

        debug!(
            score,
            dimensions_ok,
            colors = matched_colors.len(),
            logo_present,
            "compliance checked"
        );

        ComplianceOutcome {
            score,
            dimensions_ok,
            matched_colors,
            logo_present,
        }
    }
}

/// Approximate dominant palette: thumbnail the image and average five
/// equal pixel regions.
fn dominant_colors(img: &RgbaImage) -> Vec<[u8; 3]> {
    let thumb = DynamicImage::ImageRgba8(img.clone())
        .resize(THUMBNAIL_EDGE, THUMBNAIL_EDGE, FilterType::Triangle)
        .to_rgb8();
    let pixels: Vec<_> = thumb.pixels().collect();
    if pixels.is_empty() {
        return Vec::new();
    }

    let step = (pixels.len() / PALETTE_SIZE).max(1);
    let mut colors = Vec::with_capacity(PALETTE_SIZE);
    for region in pixels.chunks(step).take(PALETTE_SIZE) {
        let mut sums = [0u64; 3];
        for p in region {
            for i in 0..3 {
                sums[i] += p.0[i] as u64;
            }
        }
        let n = region.len() as u64;
        colors.push([
            (sums[0] / n) as u8,
            (sums[1] / n) as u8,
            (sums[2] / n) as u8,
        ]);
    }
    colors
}

/// Coarse template match: slide the logo thumbnail over a grayscale
/// thumbnail of the variant and look for a window with low mean
/// absolute difference.
fn logo_match(img: &RgbaImage, logo: &GrayImage) -> bool {
    const MATCH_THRESHOLD: f64 = 28.0;
    const STRIDE: u32 = 8;

    let scene = DynamicImage::ImageRgba8(img.clone())
        .resize(256, 256, FilterType::Triangle)
        .to_luma8();
    let (sw, sh) = scene.dimensions();
    let (lw, lh) = logo.dimensions();
    if lw > sw || lh > sh {
        return false;
    }

    let mut best = f64::MAX;
    let mut y = 0;
    while y + lh <= sh {
        let mut x = 0;
        while x + lw <= sw {
            let mut diff = 0u64;
            for ly in (0..lh).step_by(2) {
                for lx in (0..lw).step_by(2) {
                    let s = scene.get_pixel(x + lx, y + ly).0[0] as i64;
                    let l = logo.get_pixel(lx, ly).0[0] as i64;
                    diff += (s - l).unsigned_abs();
                }
            }
            let samples = ((lh.div_ceil(2)) * (lw.div_ceil(2))) as f64;
            best = best.min(diff as f64 / samples);
            x += STRIDE;
        }
        y += STRIDE;
    }
    best < MATCH_THRESHOLD
}

pub(crate) fn parse_hex_color(hex: &str) -> Option<[u8; 3]> {
    let hex = hex.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some([r, g, b])
}

fn color_distance(a: [u8; 3], b: [u8; 3]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = *x as f64 - *y as f64;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}
