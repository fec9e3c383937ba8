//! Produces the aspect-ratio variants for one product/language pair.

use std::path::Path;

use ab_glyph::FontArc;
use creative_core::config::BrandConfig;
use creative_core::types::{AspectRatio, Variant};
use image::imageops::FilterType;
use image::{DynamicImage, Rgba};
use tracing::{info, warn};

use crate::compliance::{parse_hex_color, ComplianceChecker};
use crate::overlay::TextOverlay;
use crate::RenderError;

/// Font files tried when the configured brand font is unavailable.
const FALLBACK_FONTS: [&str; 3] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
];

/// Renders a source image into one target aspect ratio: proportional
/// cover scale, center crop, brand text overlay, compliance score.
pub struct VariantRenderer {
    overlay: Option<TextOverlay>,
    checker: ComplianceChecker,
}

impl VariantRenderer {
    pub fn new(brand: &BrandConfig) -> Self {
        let overlay = load_font(brand).map(|font| {
            let color = brand
                .colors
                .get("text")
                .and_then(|hex| parse_hex_color(hex))
                .map(|[r, g, b]| Rgba([r, g, b, 255]))
                .unwrap_or(Rgba([255, 255, 255, 255]));
            TextOverlay::new(font, color, brand)
        });
        if overlay.is_none() {
            warn!("no usable overlay font found, variants will render without text");
        }
        Self {
            overlay,
            checker: ComplianceChecker::new(brand),
        }
    }

    /// Render one variant to `out_path` and score it.
    pub fn render(
        &self,
        source: &[u8],
        ratio: AspectRatio,
        language: &str,
        overlay_text: &str,
        out_path: &Path,
    ) -> Result<Variant, RenderError> {
        let img = image::load_from_memory(source).map_err(|e| RenderError::Decode(e.to_string()))?;

        let dims = ratio.dimensions();
        let mut canvas = cover_crop(img, dims).to_rgba8();

        if !overlay_text.is_empty() {
            if let Some(overlay) = &self.overlay {
                overlay.apply(&mut canvas, overlay_text);
            }
        }

        let outcome = self.checker.check(&canvas, dims);

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        DynamicImage::ImageRgba8(canvas)
            .save(out_path)
            .map_err(|e| RenderError::Encode(e.to_string()))?;

        metrics::counter!("variants_rendered_total").increment(1);
        info!(
            ratio = ratio.label(),
            language,
            score = outcome.score,
            path = %out_path.display(),
            "variant rendered"
        );

        Ok(Variant {
            aspect_ratio: ratio,
            language: language.to_string(),
            location: out_path.to_path_buf(),
            compliance_score: outcome.score,
            compliant: outcome.score >= self.checker.threshold(),
        })
    }
}

fn load_font(brand: &BrandConfig) -> Option<FontArc> {
    let configured = brand.font_path.clone();
    let candidates = std::iter::once(configured.as_path())
        .chain(FALLBACK_FONTS.iter().map(Path::new));
    for path in candidates {
        if let Ok(bytes) = std::fs::read(path) {
            match FontArc::try_from_vec(bytes) {
                Ok(font) => return Some(font),
                Err(e) => warn!(path = %path.display(), error = %e, "unreadable font file"),
            }
        }
    }
    None
}

/// Scale proportionally so the target is fully covered, then crop the
/// overflow evenly from both sides.
fn cover_crop(img: DynamicImage, (tw, th): (u32, u32)) -> DynamicImage {
    let img_ratio = img.width() as f64 / img.height() as f64;
    let target_ratio = tw as f64 / th as f64;

    let (nw, nh) = if img_ratio > target_ratio {
        (((th as f64) * img_ratio).ceil() as u32, th)
    } else {
        (tw, ((tw as f64) / img_ratio).ceil() as u32)
    };
    let resized = img.resize_exact(nw.max(tw), nh.max(th), FilterType::Lanczos3);

    let left = (resized.width() - tw) / 2;
    let top = (resized.height() - th) / 2;
    resized.crop_imm(left, top, tw, th)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, RgbaImage};
    use std::io::Cursor;

    fn png_bytes(w: u32, h: u32, rgb: [u8; 3]) -> Vec<u8> {
        let img = RgbaImage::from_pixel(w, h, Rgba([rgb[0], rgb[1], rgb[2], 255]));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut buf, image::ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    // 1. Geometry ------------------------------------------------------------

    #[test]
    fn test_cover_crop_wide_source_to_square() {
        let img = DynamicImage::ImageRgba8(RgbaImage::new(400, 200));
        let out = cover_crop(img, (100, 100));
        assert_eq!(out.dimensions(), (100, 100));
    }

    #[test]
    fn test_cover_crop_tall_source_to_wide() {
        let img = DynamicImage::ImageRgba8(RgbaImage::new(300, 900));
        let out = cover_crop(img, (192, 108));
        assert_eq!(out.dimensions(), (192, 108));
    }

    // 2. Full render ---------------------------------------------------------

    #[test]
    fn test_render_produces_exact_dimensions_and_passes() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = VariantRenderer::new(&BrandConfig::default());
        let source = png_bytes(1200, 800, [0xFF, 0x6B, 0x35]);

        let out = dir.path().join("sq").join("lamp_final.png");
        let variant = renderer
            .render(&source, AspectRatio::Square, "en", "Light up your nights", &out)
            .unwrap();

        assert!(out.exists());
        let written = image::open(&out).unwrap();
        assert_eq!(written.dimensions(), (1080, 1080));
        assert!((0.0..=1.0).contains(&variant.compliance_score));
        assert!(variant.compliant);
        assert_eq!(variant.language, "en");
    }

    #[test]
    fn test_each_ratio_renders_its_target() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = VariantRenderer::new(&BrandConfig::default());
        let source = png_bytes(1024, 1024, [0xFF, 0x6B, 0x35]);

        for ratio in AspectRatio::ALL {
            let out = dir.path().join(format!("{}.png", ratio.tag()));
            let variant = renderer.render(&source, ratio, "en", "", &out).unwrap();
            let written = image::open(&variant.location).unwrap();
            assert_eq!(written.dimensions(), ratio.dimensions());
        }
    }

    // 3. Corrupt source fails only this variant ------------------------------

    #[test]
    fn test_corrupt_source_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = VariantRenderer::new(&BrandConfig::default());

        let err = renderer
            .render(
                b"not an image",
                AspectRatio::Wide,
                "en",
                "",
                &dir.path().join("bad.png"),
            )
            .unwrap_err();
        assert!(matches!(err, RenderError::Decode(_)));
    }
}
