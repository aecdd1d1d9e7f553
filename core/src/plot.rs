//! Line plots rendered straight to PNG.
//!
//! A [`Figure`] holds one or more [`Series`] drawn over a shared pair of axes
//! with tick labels, optional grid and legend. Sizes follow the usual
//! inches × dpi convention; the default is 10 × 4 inches at 100 dpi.

use crate::error::Result;
use crate::font::{glyph, text_width, GLYPH_ADVANCE, GLYPH_HEIGHT, GLYPH_WIDTH};
use image::{Rgb, RgbImage};
use std::path::Path;

pub const DEFAULT_DPI: u32 = 100;
const FIGURE_WIDTH_IN: f64 = 10.0;
const FIGURE_HEIGHT_IN: f64 = 4.0;
const TARGET_TICKS: usize = 6;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
const GRID: Rgb<u8> = Rgb([220, 220, 220]);

/// Default series colors, cycled by series index
const PALETTE: [[u8; 3]; 4] = [[31, 119, 180], [255, 127, 14], [44, 160, 44], [214, 39, 40]];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    Solid,
    Dashed,
}

#[derive(Debug, Clone)]
pub struct Series {
    pub label: Option<String>,
    pub points: Vec<(f64, f64)>,
    pub style: LineStyle,
    pub color: Option<[u8; 3]>,
}

impl Series {
    pub fn new(points: Vec<(f64, f64)>) -> Self {
        Self {
            label: None,
            points,
            style: LineStyle::Solid,
            color: None,
        }
    }

    /// Pair timestamps with sample values
    pub fn from_samples<T: Copy + Into<f64>>(times: &[f64], values: &[T]) -> Self {
        Self::new(
            times
                .iter()
                .zip(values)
                .map(|(&t, &v)| (t, v.into()))
                .collect(),
        )
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn with_style(mut self, style: LineStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_color(mut self, color: [u8; 3]) -> Self {
        self.color = Some(color);
        self
    }

    fn bounds(&self) -> Option<((f64, f64), (f64, f64))> {
        let finite = self.points.iter().filter(|(x, y)| x.is_finite() && y.is_finite());
        finite.fold(None, |acc, &(x, y)| match acc {
            None => Some(((x, x), (y, y))),
            Some(((x0, x1), (y0, y1))) => Some(((x0.min(x), x1.max(x)), (y0.min(y), y1.max(y)))),
        })
    }
}

pub struct Figure {
    title: String,
    x_label: String,
    y_label: String,
    dpi: u32,
    grid: bool,
    x_limits: Option<(f64, f64)>,
    y_limits: Option<(f64, f64)>,
    series: Vec<Series>,
}

impl Figure {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            x_label: "Time (s)".to_string(),
            y_label: "Amplitude".to_string(),
            dpi: DEFAULT_DPI,
            grid: false,
            x_limits: None,
            y_limits: None,
            series: Vec::new(),
        }
    }

    pub fn x_label(mut self, label: &str) -> Self {
        self.x_label = label.to_string();
        self
    }

    pub fn y_label(mut self, label: &str) -> Self {
        self.y_label = label.to_string();
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.dpi = dpi.clamp(25, 600);
        self
    }

    pub fn grid(mut self, grid: bool) -> Self {
        self.grid = grid;
        self
    }

    pub fn x_limits(mut self, lo: f64, hi: f64) -> Self {
        self.x_limits = Some((lo, hi));
        self
    }

    pub fn y_limits(mut self, lo: f64, hi: f64) -> Self {
        self.y_limits = Some((lo, hi));
        self
    }

    pub fn add_series(mut self, series: Series) -> Self {
        self.series.push(series);
        self
    }

    /// Output size in pixels
    pub fn dimensions(&self) -> (u32, u32) {
        (
            (FIGURE_WIDTH_IN * self.dpi as f64).round() as u32,
            (FIGURE_HEIGHT_IN * self.dpi as f64).round() as u32,
        )
    }

    /// Axis ranges the figure is drawn with, `((x0, x1), (y0, y1))`
    pub fn limits(&self) -> ((f64, f64), (f64, f64)) {
        let bounds = self
            .series
            .iter()
            .filter_map(Series::bounds)
            .reduce(|a, b| {
                (
                    (a.0 .0.min(b.0 .0), a.0 .1.max(b.0 .1)),
                    (a.1 .0.min(b.1 .0), a.1 .1.max(b.1 .1)),
                )
            });

        let (x_data, y_data) = bounds.unwrap_or(((0.0, 1.0), (-1.0, 1.0)));

        let x = self.x_limits.unwrap_or(x_data);
        let y = self.y_limits.unwrap_or_else(|| {
            let pad = 0.05 * (y_data.1 - y_data.0);
            (y_data.0 - pad, y_data.1 + pad)
        });

        (widen(x, 0.5), widen(y, 1.0))
    }

    pub fn render(&self) -> RgbImage {
        let (width, height) = self.dimensions();
        let mut canvas = Canvas::new(width, height, self.dpi);

        let ((x0, x1), (y0, y1)) = self.limits();
        let x_ticks = nice_ticks(x0, x1, TARGET_TICKS);
        let y_ticks = nice_ticks(y0, y1, TARGET_TICKS);
        let x_step = tick_step(&x_ticks);
        let y_step = tick_step(&y_ticks);
        let x_tick_labels: Vec<String> = x_ticks.iter().map(|&v| format_tick(v, x_step)).collect();
        let y_tick_labels: Vec<String> = y_ticks.iter().map(|&v| format_tick(v, y_step)).collect();

        let s = canvas.scale;
        let ts = canvas.text_scale;
        let line_height = GLYPH_HEIGHT * ts;
        let widest_y_label = y_tick_labels.iter().map(|l| text_width(l)).max().unwrap_or(0) * ts;

        let left = 10 * s + line_height + 10 * s + widest_y_label + 8 * s;
        let right = 20 * s;
        let top = 15 * s + line_height + 10 * s;
        let bottom = 8 * s + line_height + 10 * s + line_height + 10 * s;

        let area = Rect {
            left,
            top,
            right: width.saturating_sub(right).max(left + 1),
            bottom: height.saturating_sub(bottom).max(top + 1),
        };

        let map_x = |x: f64| area.left as f64 + (x - x0) / (x1 - x0) * area.width();
        let map_y = |y: f64| area.top as f64 + (1.0 - (y - y0) / (y1 - y0)) * area.height();

        // grid and ticks
        for (&v, label) in x_ticks.iter().zip(&x_tick_labels) {
            let px = map_x(v).round() as i64;
            if self.grid {
                canvas.vline(px, area.top as i64, area.bottom as i64, GRID);
            }
            canvas.vline(px, area.bottom as i64, (area.bottom + 5 * s) as i64, BLACK);
            let w = text_width(label) * ts;
            canvas.text(px - w as i64 / 2, (area.bottom + 8 * s) as i64, label, BLACK);
        }
        for (&v, label) in y_ticks.iter().zip(&y_tick_labels) {
            let py = map_y(v).round() as i64;
            if self.grid {
                canvas.hline(area.left as i64, area.right as i64, py, GRID);
            }
            canvas.hline(area.left as i64 - 5 * s as i64, area.left as i64, py, BLACK);
            let w = text_width(label) * ts;
            canvas.text(
                area.left as i64 - 8 * s as i64 - w as i64,
                py - line_height as i64 / 2,
                label,
                BLACK,
            );
        }

        // series, clipped to the plot area
        for (i, series) in self.series.iter().enumerate() {
            let color = Rgb(series.color.unwrap_or(PALETTE[i % PALETTE.len()]));
            let mut dash = DashState::new(series.style, s);
            let mut previous: Option<(f64, f64)> = None;
            for &(x, y) in &series.points {
                if !x.is_finite() || !y.is_finite() {
                    previous = None;
                    continue;
                }
                let point = (map_x(x), map_y(y));
                if let Some(prev) = previous {
                    canvas.segment(prev, point, color, &area, &mut dash);
                }
                previous = Some(point);
            }
            if series.points.len() == 1 {
                let (px, py) = (map_x(series.points[0].0), map_y(series.points[0].1));
                canvas.dot(px.round() as i64, py.round() as i64, color, &area);
            }
        }

        canvas.frame(&area, BLACK);

        // annotations
        let title_w = text_width(&self.title) * ts;
        canvas.text(
            (width as i64 - title_w as i64) / 2,
            (15 * s) as i64,
            &self.title,
            BLACK,
        );

        let x_label_w = text_width(&self.x_label) * ts;
        canvas.text(
            area.left as i64 + (area.width() as i64 - x_label_w as i64) / 2,
            (area.bottom + 8 * s + line_height + 10 * s) as i64,
            &self.x_label,
            BLACK,
        );

        let y_label_w = text_width(&self.y_label) * ts;
        canvas.text_vertical(
            (10 * s) as i64,
            area.top as i64 + (area.height() as i64 + y_label_w as i64) / 2,
            &self.y_label,
            BLACK,
        );

        self.draw_legend(&mut canvas, &area);

        canvas.image
    }

    fn draw_legend(&self, canvas: &mut Canvas, area: &Rect) {
        let entries: Vec<(usize, &Series, &str)> = self
            .series
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.label.as_deref().map(|l| (i, s, l)))
            .collect();
        if entries.is_empty() {
            return;
        }

        let s = canvas.scale;
        let ts = canvas.text_scale;
        let row = GLYPH_HEIGHT * ts + 6 * s;
        let sample_len = 30 * s;
        let widest = entries.iter().map(|(_, _, l)| text_width(l)).max().unwrap_or(0) * ts;

        let box_w = 8 * s + sample_len + 6 * s + widest + 8 * s;
        let box_h = 6 * s + row * entries.len() as u32;
        let box_right = area.right.saturating_sub(8 * s);
        let legend = Rect {
            left: box_right.saturating_sub(box_w),
            top: area.top + 8 * s,
            right: box_right,
            bottom: area.top + 8 * s + box_h,
        };

        canvas.fill(&legend, WHITE);
        canvas.frame(&legend, GRID);

        for (n, (i, series, label)) in entries.iter().enumerate() {
            let color = Rgb(series.color.unwrap_or(PALETTE[i % PALETTE.len()]));
            let cy = legend.top as f64 + 6.0 * s as f64 + row as f64 * n as f64 + (GLYPH_HEIGHT * ts) as f64 / 2.0;
            let x_start = (legend.left + 8 * s) as f64;
            let mut dash = DashState::new(series.style, s);
            canvas.segment((x_start, cy), (x_start + sample_len as f64, cy), color, &legend, &mut dash);
            canvas.text(
                (legend.left + 8 * s + sample_len + 6 * s) as i64,
                cy as i64 - (GLYPH_HEIGHT * ts) as i64 / 2,
                label,
                BLACK,
            );
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let image = self.render();
        image.save(path.as_ref())?;
        log::debug!(
            "Saved plot {:?} ({}x{}) to {}",
            self.title,
            image.width(),
            image.height(),
            path.as_ref().display()
        );
        Ok(())
    }
}

/// Expand a degenerate range so it can be mapped to pixels
fn widen((lo, hi): (f64, f64), margin: f64) -> (f64, f64) {
    if !lo.is_finite() || !hi.is_finite() {
        return (0.0, 1.0);
    }
    if hi - lo <= f64::EPSILON * lo.abs().max(hi.abs()).max(1.0) {
        return (lo - margin, hi + margin);
    }
    (lo, hi)
}

/// Round tick positions (steps of 1, 2 or 5 × 10^k) covering `[lo, hi]`
pub fn nice_ticks(lo: f64, hi: f64, target: usize) -> Vec<f64> {
    let span = hi - lo;
    if !(span > 0.0) || !span.is_finite() || target == 0 {
        return vec![lo];
    }

    let raw = span / target as f64;
    let magnitude = 10f64.powf(raw.log10().floor());
    let normalized = raw / magnitude;
    let step = magnitude
        * if normalized < 1.5 {
            1.0
        } else if normalized < 3.0 {
            2.0
        } else if normalized < 7.0 {
            5.0
        } else {
            10.0
        };

    let first = (lo / step - 1e-9).ceil() as i64;
    let last = (hi / step + 1e-9).floor() as i64;
    (first..=last)
        .map(|k| {
            let v = k as f64 * step;
            if v.abs() < step * 1e-9 {
                0.0
            } else {
                v
            }
        })
        .collect()
}

fn tick_step(ticks: &[f64]) -> f64 {
    if ticks.len() >= 2 {
        ticks[1] - ticks[0]
    } else {
        1.0
    }
}

/// Format a tick value with just enough decimals for the given step
pub fn format_tick(value: f64, step: f64) -> String {
    let decimals = if step > 0.0 {
        (-(step.log10() + 1e-9).floor()).clamp(0.0, 8.0) as usize
    } else {
        0
    };
    format!("{:.*}", decimals, value)
}

#[derive(Debug, Clone, Copy)]
struct Rect {
    left: u32,
    top: u32,
    right: u32,
    bottom: u32,
}

impl Rect {
    fn width(&self) -> f64 {
        (self.right - self.left) as f64
    }

    fn height(&self) -> f64 {
        (self.bottom - self.top) as f64
    }

    fn contains(&self, x: i64, y: i64) -> bool {
        x >= self.left as i64 && x <= self.right as i64 && y >= self.top as i64 && y <= self.bottom as i64
    }
}

/// Tracks the on/off phase of a dash pattern across consecutive segments
struct DashState {
    pattern: Option<(u32, u32)>,
    position: u32,
}

impl DashState {
    fn new(style: LineStyle, scale: u32) -> Self {
        Self {
            pattern: match style {
                LineStyle::Solid => None,
                LineStyle::Dashed => Some((8 * scale, 5 * scale)),
            },
            position: 0,
        }
    }

    fn step(&mut self) -> bool {
        match self.pattern {
            None => true,
            Some((on, off)) => {
                let visible = self.position < on;
                self.position = (self.position + 1) % (on + off);
                visible
            }
        }
    }
}

struct Canvas {
    image: RgbImage,
    scale: u32,
    text_scale: u32,
}

impl Canvas {
    fn new(width: u32, height: u32, dpi: u32) -> Self {
        let scale = ((dpi as f64 / DEFAULT_DPI as f64).round() as u32).max(1);
        Self {
            image: RgbImage::from_pixel(width.max(1), height.max(1), WHITE),
            scale,
            text_scale: 2 * scale,
        }
    }

    fn put(&mut self, x: i64, y: i64, color: Rgb<u8>) {
        if x >= 0 && y >= 0 && (x as u32) < self.image.width() && (y as u32) < self.image.height() {
            self.image.put_pixel(x as u32, y as u32, color);
        }
    }

    fn block(&mut self, x: i64, y: i64, size: u32, color: Rgb<u8>) {
        for dy in 0..size as i64 {
            for dx in 0..size as i64 {
                self.put(x + dx, y + dy, color);
            }
        }
    }

    fn hline(&mut self, x0: i64, x1: i64, y: i64, color: Rgb<u8>) {
        for x in x0.min(x1)..=x0.max(x1) {
            self.block(x, y, self.scale, color);
        }
    }

    fn vline(&mut self, x: i64, y0: i64, y1: i64, color: Rgb<u8>) {
        for y in y0.min(y1)..=y0.max(y1) {
            self.block(x, y, self.scale, color);
        }
    }

    fn frame(&mut self, rect: &Rect, color: Rgb<u8>) {
        let (l, t, r, b) = (rect.left as i64, rect.top as i64, rect.right as i64, rect.bottom as i64);
        self.hline(l, r, t, color);
        self.hline(l, r, b, color);
        self.vline(l, t, b, color);
        self.vline(r, t, b, color);
    }

    fn fill(&mut self, rect: &Rect, color: Rgb<u8>) {
        for y in rect.top..=rect.bottom {
            for x in rect.left..=rect.right {
                self.put(x as i64, y as i64, color);
            }
        }
    }

    fn dot(&mut self, x: i64, y: i64, color: Rgb<u8>, clip: &Rect) {
        let size = 3 * self.scale;
        let half = size as i64 / 2;
        for dy in 0..size as i64 {
            for dx in 0..size as i64 {
                if clip.contains(x - half + dx, y - half + dy) {
                    self.put(x - half + dx, y - half + dy, color);
                }
            }
        }
    }

    /// Bresenham line, `scale` pixels thick, drawn only inside `clip`
    fn segment(&mut self, from: (f64, f64), to: (f64, f64), color: Rgb<u8>, clip: &Rect, dash: &mut DashState) {
        let (mut x, mut y) = (from.0.round() as i64, from.1.round() as i64);
        let (x1, y1) = (to.0.round() as i64, to.1.round() as i64);

        // skip segments entirely outside the clip box
        let (min_x, max_x) = (x.min(x1), x.max(x1));
        let (min_y, max_y) = (y.min(y1), y.max(y1));
        if max_x < clip.left as i64 || min_x > clip.right as i64 || max_y < clip.top as i64 || min_y > clip.bottom as i64 {
            return;
        }

        let dx = (x1 - x).abs();
        let dy = -(y1 - y).abs();
        let sx = if x < x1 { 1 } else { -1 };
        let sy = if y < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        let thickness = self.scale;
        let offset = thickness as i64 / 2;

        loop {
            if dash.step() {
                for oy in 0..thickness as i64 {
                    for ox in 0..thickness as i64 {
                        let (px, py) = (x - offset + ox, y - offset + oy);
                        if clip.contains(px, py) {
                            self.put(px, py, color);
                        }
                    }
                }
            }
            if x == x1 && y == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    fn text(&mut self, x: i64, y: i64, text: &str, color: Rgb<u8>) {
        let ts = self.text_scale;
        for (i, c) in text.chars().enumerate() {
            let rows = glyph(c);
            let origin = x + (i as u32 * GLYPH_ADVANCE * ts) as i64;
            for (row, bits) in rows.iter().enumerate() {
                for col in 0..GLYPH_WIDTH {
                    if bits & (0b10000 >> col) != 0 {
                        self.block(origin + (col * ts) as i64, y + (row as u32 * ts) as i64, ts, color);
                    }
                }
            }
        }
    }

    /// Text rotated a quarter turn counter-clockwise, starting at `(x, y)` and reading upwards
    fn text_vertical(&mut self, x: i64, y: i64, text: &str, color: Rgb<u8>) {
        let ts = self.text_scale;
        for (i, c) in text.chars().enumerate() {
            let rows = glyph(c);
            let origin = y - (i as u32 * GLYPH_ADVANCE * ts) as i64;
            for (row, bits) in rows.iter().enumerate() {
                for col in 0..GLYPH_WIDTH {
                    if bits & (0b10000 >> col) != 0 {
                        self.block(x + (row as u32 * ts) as i64, origin - ((col + 1) * ts) as i64, ts, color);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_color(pixel: &Rgb<u8>, color: [u8; 3]) -> bool {
        pixel.0 == color
    }

    #[test]
    fn test_nice_ticks() {
        let ticks = nice_ticks(0.0, 1.0, 5);
        assert_eq!(ticks.len(), 6);
        assert!((ticks[1] - 0.2).abs() < 1e-12);

        let ticks = nice_ticks(-10500.0, 10500.0, 6);
        assert!(ticks.contains(&0.0));
        assert!(ticks.contains(&-10000.0) && ticks.contains(&10000.0));
    }

    #[test]
    fn test_nice_ticks_small_window() {
        let ticks = nice_ticks(0.5, 0.505, 6);
        assert!(ticks.len() >= 4);
        assert!(ticks.iter().all(|&t| (0.5 - 1e-12..=0.505 + 1e-12).contains(&t)));
    }

    #[test]
    fn test_nice_ticks_degenerate() {
        assert_eq!(nice_ticks(1.0, 1.0, 5), vec![1.0]);
    }

    #[test]
    fn test_format_tick() {
        assert_eq!(format_tick(0.4, 0.2), "0.4");
        assert_eq!(format_tick(0.502, 0.001), "0.502");
        assert_eq!(format_tick(-5000.0, 5000.0), "-5000");
        assert_eq!(format_tick(1.0, 1.0), "1");
        assert_eq!(format_tick(0.3, 0.1), "0.3");
    }

    #[test]
    fn test_tick_labels_for_period_window() {
        let ticks = nice_ticks(0.5, 0.505, TARGET_TICKS);
        let step = tick_step(&ticks);
        let labels: Vec<String> = ticks.iter().map(|&v| format_tick(v, step)).collect();
        assert_eq!(labels, vec!["0.500", "0.501", "0.502", "0.503", "0.504", "0.505"]);
    }

    #[test]
    fn test_default_dimensions() {
        let figure = Figure::new("Sound Envelope");
        assert_eq!(figure.dimensions(), (1000, 400));
        assert_eq!(Figure::new("x").dpi(300).dimensions(), (3000, 1200));
    }

    #[test]
    fn test_render_draws_series_in_its_color() {
        let times: Vec<f64> = (0..100).map(|i| i as f64 / 100.0).collect();
        let values: Vec<f32> = times.iter().map(|t| (t * 6.0).sin() as f32).collect();
        let figure = Figure::new("Test")
            .add_series(Series::from_samples(&times, &values).with_color([255, 0, 0]));

        let image = figure.render();
        assert_eq!(image.dimensions(), (1000, 400));
        assert!(image.pixels().any(|p| is_color(p, [255, 0, 0])));
    }

    #[test]
    fn test_render_legend_and_dashed_series() {
        let solid = Series::new(vec![(0.0, 0.0), (1.0, 1.0)]).with_label("Original");
        let dashed = Series::new(vec![(0.0, 1.0), (1.0, 0.0)])
            .with_label("Fitted")
            .with_style(LineStyle::Dashed);
        let image = Figure::new("Fit").add_series(solid).add_series(dashed).grid(true).render();

        assert!(image.pixels().any(|p| is_color(p, PALETTE[0])));
        assert!(image.pixels().any(|p| is_color(p, PALETTE[1])));
    }

    #[test]
    fn test_render_empty_and_flat() {
        let empty = Figure::new("Empty").render();
        assert_eq!(empty.dimensions(), (1000, 400));

        let flat = Figure::new("Flat")
            .add_series(Series::new(vec![(0.0, 0.0), (1.0, 0.0)]))
            .render();
        assert_eq!(flat.dimensions(), (1000, 400));
    }

    #[test]
    fn test_save_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plot.png");
        Figure::new("Saved")
            .add_series(Series::new(vec![(0.0, -1.0), (0.5, 1.0), (1.0, -1.0)]))
            .save(&path)
            .unwrap();

        let reloaded = image::open(&path).unwrap();
        assert_eq!((reloaded.width(), reloaded.height()), (1000, 400));
    }
}
