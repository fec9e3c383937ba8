//! Campaign-message text overlay with brand styling and drop shadow.

use ab_glyph::{Font, FontArc, PxScale, ScaleFont};
use creative_core::config::{BrandConfig, OverlayPosition};
use image::{Rgba, RgbaImage};

/// Lays campaign text onto rendered variants per the brand guidelines.
pub struct TextOverlay {
    font: FontArc,
    color: Rgba<u8>,
    shadow: bool,
    shadow_offset: i32,
    position: OverlayPosition,
    padding: u32,
    max_width_percent: u32,
    font_size: f32,
}

impl TextOverlay {
    pub fn new(font: FontArc, color: Rgba<u8>, brand: &BrandConfig) -> Self {
        Self {
            font,
            color,
            shadow: brand.shadow,
            shadow_offset: brand.shadow_offset,
            position: brand.overlay_position,
            padding: brand.overlay_padding,
            max_width_percent: brand.max_width_percent,
            font_size: brand.font_size,
        }
    }

    /// Composite `text` onto `img`, wrapped and positioned per config.
    pub fn apply(&self, img: &mut RgbaImage, text: &str) {
        let scale = PxScale::from(self.font_size);
        let scaled = self.font.as_scaled(scale);
        let line_height = (scaled.ascent() - scaled.descent() + scaled.line_gap()).ceil();

        let max_width = (img.width() * self.max_width_percent / 100) as f32;
        let lines = wrap_text(&self.font, scale, text, max_width);
        let block_height = line_height * lines.len() as f32;

        let mut y = match self.position {
            OverlayPosition::Top => self.padding as f32 + scaled.ascent(),
            OverlayPosition::Center => {
                (img.height() as f32 - block_height) / 2.0 + scaled.ascent()
            }
            OverlayPosition::Bottom => {
                img.height() as f32 - self.padding as f32 - block_height + scaled.ascent()
            }
        };

        for line in &lines {
            let width = measure_line(&self.font, scale, line);
            let x = (img.width() as f32 - width) / 2.0;
            if self.shadow {
                let offset = self.shadow_offset as f32;
                draw_line(
                    img,
                    &self.font,
                    scale,
                    line,
                    x + offset,
                    y + offset,
                    Rgba([0, 0, 0, 200]),
                );
            }
            draw_line(img, &self.font, scale, line, x, y, self.color);
            y += line_height;
        }
    }
}

/// Greedy word wrap against a pixel budget. A single word wider than
/// the budget gets its own line rather than being split.
pub fn wrap_text(font: &FontArc, scale: PxScale, text: &str, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };
        if measure_line(font, scale, &candidate) <= max_width || current.is_empty() {
            current = candidate;
        } else {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn measure_line(font: &FontArc, scale: PxScale, line: &str) -> f32 {
    let scaled = font.as_scaled(scale);
    let mut width = 0.0;
    let mut prev = None;
    for c in line.chars() {
        let id = scaled.glyph_id(c);
        if let Some(prev) = prev {
            width += scaled.kern(prev, id);
        }
        width += scaled.h_advance(id);
        prev = Some(id);
    }
    width
}

fn draw_line(
    img: &mut RgbaImage,
    font: &FontArc,
    scale: PxScale,
    line: &str,
    start_x: f32,
    baseline_y: f32,
    color: Rgba<u8>,
) {
    let scaled = font.as_scaled(scale);
    let mut x = start_x;
    let mut prev = None;
    for c in line.chars() {
        let id = scaled.glyph_id(c);
        if let Some(prev) = prev {
            x += scaled.kern(prev, id);
        }
        let glyph = id.with_scale_and_position(scale, ab_glyph::point(x, baseline_y));
        if let Some(outlined) = font.outline_glyph(glyph) {
            let bounds = outlined.px_bounds();
            outlined.draw(|gx, gy, coverage| {
                let px = bounds.min.x as i64 + gx as i64;
                let py = bounds.min.y as i64 + gy as i64;
                if px >= 0 && py >= 0 && (px as u32) < img.width() && (py as u32) < img.height() {
                    blend(img.get_pixel_mut(px as u32, py as u32), color, coverage);
                }
            });
        }
        x += scaled.h_advance(id);
        prev = Some(id);
    }
}

fn blend(dst: &mut Rgba<u8>, src: Rgba<u8>, coverage: f32) {
    let alpha = coverage * src.0[3] as f32 / 255.0;
    for i in 0..3 {
        dst.0[i] = (src.0[i] as f32 * alpha + dst.0[i] as f32 * (1.0 - alpha)) as u8;
    }
    dst.0[3] = dst.0[3].max((alpha * 255.0) as u8);
}
