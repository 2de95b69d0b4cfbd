use std::io::Cursor;

use ab_glyph::{FontArc, PxScale};
use chrono::NaiveDate;
use font_kit::family_name::FamilyName;
use font_kit::properties::{Properties, Weight};
use font_kit::source::SystemSource;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_line_segment_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use once_cell::sync::Lazy;
use tracing::warn;

use crate::models::PriceBar;

pub const CHART_WIDTH: u32 = 1000;
pub const CHART_HEIGHT: u32 = 560;
const PLOT_LEFT: f32 = 80.0;
const PLOT_RIGHT: f32 = 24.0;
const PLOT_TOP: f32 = 64.0;
const PLOT_BOTTOM: f32 = 48.0;
const GRID_LINES: usize = 5;

const CANVAS_BG: Rgba<u8> = Rgba([255, 255, 255, 255]);
const GRID_COLOR: Rgba<u8> = Rgba([229, 231, 235, 255]);
const TEXT_COLOR: Rgba<u8> = Rgba([31, 41, 55, 255]);
const MARKER_COLOR: Rgba<u8> = Rgba([99, 102, 241, 255]);
pub const BULL_COLOR: Rgba<u8> = Rgba([38, 166, 91, 255]);
pub const BEAR_COLOR: Rgba<u8> = Rgba([220, 53, 69, 255]);

/// Render a PNG candlestick chart of the price window around an earnings release.
///
/// Returns `Ok(None)` when there are no bars, so the caller can omit the chart.
/// CPU-bound; async callers should run it on the blocking pool.
pub fn render_candlestick(
    symbol: &str,
    release_date: NaiveDate,
    bars: &[PriceBar],
) -> Result<Option<Vec<u8>>, String> {
    if bars.is_empty() {
        return Ok(None);
    }

    let image = DynamicImage::ImageRgba8(draw_chart(symbol, release_date, bars, FONT.as_ref()));
    let mut buffer = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .map_err(|e| format!("failed to encode png: {e}"))?;

    Ok(Some(buffer))
}

/// System font, looked up once per process. `None` draws charts without text.
static FONT: Lazy<Option<FontArc>> = Lazy::new(|| match load_font() {
    Ok(font) => Some(font),
    Err(e) => {
        warn!("Rendering charts without labels: {}", e);
        None
    }
});

fn load_font() -> Result<FontArc, String> {
    let handle = SystemSource::new()
        .select_best_match(
            &[FamilyName::SansSerif],
            &Properties::new().weight(Weight::BOLD),
        )
        .map_err(|e| format!("Failed to find system font: {}", e))?;

    let font = handle
        .load()
        .map_err(|e| format!("Failed to load font: {}", e))?;

    let font_data = font
        .copy_font_data()
        .ok_or_else(|| "Failed to copy font data".to_string())?
        .to_vec();

    FontArc::try_from_vec(font_data)
        .map_err(|_| "Failed to create FontArc from system font".to_string())
}

/// Maps bar indices and prices onto canvas coordinates.
#[derive(Debug, Clone, Copy)]
pub struct Layout {
    count: usize,
    min: f64,
    max: f64,
}

impl Layout {
    pub fn new(bars: &[PriceBar]) -> Self {
        let min = bars.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
        let max = bars.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
        Self {
            count: bars.len().max(1),
            min,
            max,
        }
    }

    fn plot_width() -> f32 {
        CHART_WIDTH as f32 - PLOT_LEFT - PLOT_RIGHT
    }

    fn plot_height() -> f32 {
        CHART_HEIGHT as f32 - PLOT_TOP - PLOT_BOTTOM
    }

    pub fn slot_width(&self) -> f32 {
        Self::plot_width() / self.count as f32
    }

    pub fn x_center(&self, idx: usize) -> f32 {
        PLOT_LEFT + self.slot_width() * (idx as f32 + 0.5)
    }

    /// Flat series (max == min) sit on the vertical middle of the plot.
    pub fn y(&self, price: f64) -> f32 {
        let range = self.max - self.min;
        if !range.is_finite() || range <= f64::EPSILON {
            return PLOT_TOP + Self::plot_height() / 2.0;
        }
        PLOT_TOP + ((self.max - price) / range) as f32 * Self::plot_height()
    }
}

/// Draw the chart onto a fresh canvas. Text is skipped when `font` is `None`.
pub fn draw_chart(
    symbol: &str,
    release_date: NaiveDate,
    bars: &[PriceBar],
    font: Option<&FontArc>,
) -> RgbaImage {
    let mut img = RgbaImage::from_pixel(CHART_WIDTH, CHART_HEIGHT, CANVAS_BG);
    if bars.is_empty() {
        return img;
    }
    let layout = Layout::new(bars);

    for step in 0..=GRID_LINES {
        let price = layout.min + (layout.max - layout.min) * step as f64 / GRID_LINES as f64;
        let y = layout.y(price);
        draw_line_segment_mut(
            &mut img,
            (PLOT_LEFT, y),
            (CHART_WIDTH as f32 - PLOT_RIGHT, y),
            GRID_COLOR,
        );
        if let Some(font) = font {
            draw_text_mut(
                &mut img,
                TEXT_COLOR,
                8,
                y as i32 - 8,
                PxScale::from(16.0),
                font,
                &format!("{price:.2}"),
            );
        }
    }

    if let Some(idx) = bars.iter().position(|b| b.date >= release_date) {
        draw_release_marker(&mut img, layout.x_center(idx));
    }

    let body_width = (layout.slot_width() * 0.6).max(1.0);
    for (idx, bar) in bars.iter().enumerate() {
        let color = if bar.is_bullish() { BULL_COLOR } else { BEAR_COLOR };
        let x = layout.x_center(idx);

        draw_line_segment_mut(&mut img, (x, layout.y(bar.high)), (x, layout.y(bar.low)), color);

        let top = layout.y(bar.open.max(bar.close));
        let bottom = layout.y(bar.open.min(bar.close));
        let height = (bottom - top).round().max(1.0) as u32;
        let rect = Rect::at((x - body_width / 2.0).round() as i32, top.round() as i32)
            .of_size(body_width.round().max(1.0) as u32, height);
        draw_filled_rect_mut(&mut img, rect, color);
    }

    if let Some(font) = font {
        let title = format!(
            "Candlestick Chart for {} (Earnings Release: {})",
            symbol,
            release_date.format("%Y-%m-%d")
        );
        draw_centered_text(&mut img, font, &title, PxScale::from(24.0), 16);

        let label_y = CHART_HEIGHT as i32 - PLOT_BOTTOM as i32 + 12;
        let mut label_idx = vec![0, bars.len() / 2, bars.len() - 1];
        label_idx.dedup();
        for idx in label_idx {
            let label = bars[idx].date.format("%m-%d").to_string();
            let (tw, _) = text_size(PxScale::from(16.0), font, &label);
            let x = layout.x_center(idx) as i32 - tw as i32 / 2;
            draw_text_mut(&mut img, TEXT_COLOR, x, label_y, PxScale::from(16.0), font, &label);
        }
    }

    img
}

fn draw_release_marker(img: &mut RgbaImage, x: f32) {
    let bottom = CHART_HEIGHT as f32 - PLOT_BOTTOM;
    let mut y = PLOT_TOP;
    while y < bottom {
        let end = (y + 6.0).min(bottom);
        draw_line_segment_mut(img, (x, y), (x, end), MARKER_COLOR);
        y += 12.0;
    }
}

fn draw_centered_text(img: &mut RgbaImage, font: &FontArc, text: &str, scale: PxScale, y: i32) {
    let (tw, _) = text_size(scale, font, text);
    let x = (CHART_WIDTH as i32 - tw as i32) / 2;
    draw_text_mut(img, TEXT_COLOR, x, y, scale, font, text);
}
