use ab_glyph::{FontVec, PxScale};
use anyhow::{Context, Result};
use clap::Parser;
use image::{Rgba, RgbaImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut,
    draw_text_mut,
};
use imageproc::rect::Rect;
use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use log::{info, warn};
use plotters::prelude::*;
use rayon::prelude::*;
use resonance_common::{deg_to_rad, rotation_index, FieldState, HistoryLog, Vec2};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Command-line arguments for the visualizer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// History file written by the engine (.json, .bin or .msgpack)
    #[arg(short, long)]
    input: PathBuf,

    /// Directory the images are written to
    #[arg(short, long, default_value = "visuals")]
    output_dir: PathBuf,

    /// Width of the history plot in pixels
    #[arg(long, default_value_t = 1000)]
    plot_width: u32,

    /// Height of the history plot in pixels
    #[arg(long, default_value_t = 900)]
    plot_height: u32,

    /// Also render one arrow frame per history sample
    #[arg(long)]
    frames: bool,

    /// TrueType font for the field value panel (common system fonts are tried otherwise)
    #[arg(long)]
    font: Option<PathBuf>,
}

const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);
const DIAL: Rgba<u8> = Rgba([200, 200, 200, 255]);
const NEEDLE: Rgba<u8> = Rgba([200, 30, 30, 255]);
const PIVOT: Rgba<u8> = Rgba([40, 40, 40, 255]);
const TEXT: Rgba<u8> = Rgba([0, 0, 0, 255]);
const BUTTON_ON: Rgba<u8> = Rgba([40, 160, 60, 255]);
const BUTTON_OFF: Rgba<u8> = Rgba([120, 120, 120, 255]);

const BUTTON_WIDTH: u32 = 40;
const BUTTON_HEIGHT: u32 = 24;
const PANEL_MARGIN: i32 = 10;
const LINE_HEIGHT: i32 = 20;

const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSansMono.ttf",
    "/usr/share/fonts/TTF/DejaVuSansMono.ttf",
    "/usr/share/fonts/dejavu/DejaVuSansMono.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationMono-Regular.ttf",
    "/System/Library/Fonts/Menlo.ttc",
    "C:\\Windows\\Fonts\\consola.ttf",
];

/// Needle geometry for one rotation, as offsets from the pivot in units of the needle length.
#[derive(Debug, Clone, Copy)]
struct ArrowSprite {
    tip: Vec2,
    tail: Vec2,
    barb_left: Vec2,
    barb_right: Vec2,
}

/// The 360 needle rotations, indexed by whole degrees.
///
/// Built once up front; the renderer only ever looks sprites up by
/// `round(theta) mod 360`.
struct RotationTable {
    sprites: Vec<ArrowSprite>,
}

impl RotationTable {
    fn new() -> Self {
        let barb_angle = deg_to_rad(150.0);
        let sprites = (0..360)
            .map(|deg| {
                let theta = deg_to_rad(deg as f64);
                let dir = Vec2::from_angle(theta);
                let tip = dir;
                ArrowSprite {
                    tip,
                    tail: dir.scale(-1.0),
                    barb_left: Vec2::new(tip.x + 0.35 * (theta + barb_angle).cos(), tip.y + 0.35 * (theta + barb_angle).sin()),
                    barb_right: Vec2::new(tip.x + 0.35 * (theta - barb_angle).cos(), tip.y + 0.35 * (theta - barb_angle).sin()),
                }
            })
            .collect();
        Self { sprites }
    }

    fn sprite(&self, theta_deg: f64) -> &ArrowSprite {
        &self.sprites[rotation_index(theta_deg) as usize]
    }
}

/// Converts a needle offset to pixels; screen y grows downwards, angles turn counter-clockwise.
fn to_screen(center: (f64, f64), offset: Vec2, length: f64) -> (f32, f32) {
    ((center.0 + offset.x * length) as f32, (center.1 - offset.y * length) as f32)
}

/// Needle length that fits the grid spacing.
fn needle_length(log: &HistoryLog) -> f64 {
    let xdist = log.canvas_width / (log.columns + 1) as f64;
    let ydist = log.canvas_height / (log.rows + 2) as f64;
    0.4 * xdist.min(ydist)
}

/// Text lines of the value panel: time, the three field settings and the switches.
fn panel_lines(time: f64, fields: &FieldState) -> [String; 4] {
    let switch = |on: bool| if on { "on" } else { "off" };
    [
        format!("t = {:.2} s", time),
        format!("B0 = {:.3} ({})", fields.static_magnitude, switch(fields.static_on)),
        format!("B1 = {:.3} ({})", fields.driven_magnitude, switch(fields.driven_on)),
        format!("B1 freq = {:.3} Hz", fields.driven_frequency),
    ]
}

/// Top-left corners of the B0 and B1 switch buttons, right-aligned on the canvas.
fn button_origins(width: u32) -> [(i32, i32); 2] {
    let step = (BUTTON_WIDTH as i32) + PANEL_MARGIN;
    let right = width as i32 - PANEL_MARGIN;
    [(right - 2 * step, PANEL_MARGIN), (right - step, PANEL_MARGIN)]
}

/// Draws the field values and the two on/off buttons above the grid.
///
/// The buttons are drawn without a font, so the switch state shows even when
/// no font could be loaded.
fn draw_panel(image: &mut RgbaImage, time: f64, fields: &FieldState, font: Option<&FontVec>) {
    let labels = ["B0", "B1"];
    let states = [fields.static_on, fields.driven_on];
    for ((x, y), (label, on)) in button_origins(image.width()).into_iter().zip(labels.into_iter().zip(states)) {
        let rect = Rect::at(x, y).of_size(BUTTON_WIDTH, BUTTON_HEIGHT);
        if on {
            draw_filled_rect_mut(image, rect, BUTTON_ON);
        } else {
            draw_hollow_rect_mut(image, rect, BUTTON_OFF);
        }
        if let Some(font) = font {
            draw_text_mut(image, TEXT, x + 10, y + 4, PxScale::from(16.0), font, label);
        }
    }

    let Some(font) = font else {
        return;
    };
    let scale = PxScale::from(18.0);
    for (k, line) in panel_lines(time, fields).iter().enumerate() {
        draw_text_mut(image, TEXT, PANEL_MARGIN, PANEL_MARGIN + k as i32 * LINE_HEIGHT, scale, font, line);
    }
}

/// Loads the panel font from `path`, or from the first system font found.
fn load_font(path: Option<&Path>) -> Result<Option<FontVec>> {
    if let Some(path) = path {
        let data = fs::read(path).with_context(|| format!("Failed to read font '{}'", path.display()))?;
        let font = FontVec::try_from_vec(data).with_context(|| format!("'{}' is not a usable font", path.display()))?;
        return Ok(Some(font));
    }
    for candidate in FONT_CANDIDATES {
        if let Ok(data) = fs::read(candidate) {
            if let Ok(font) = FontVec::try_from_vec(data) {
                info!("Using panel font {}", candidate);
                return Ok(Some(font));
            }
        }
    }
    warn!("No font found, frames will show the field switches without values (use --font).");
    Ok(None)
}

/// Draws every oscillator as a compass needle at its cell position, under the value panel.
fn draw_frame(
    log: &HistoryLog,
    orientations: &[f64],
    time: f64,
    fields: &FieldState,
    table: &RotationTable,
    font: Option<&FontVec>,
) -> RgbaImage {
    let width = log.canvas_width.max(1.0) as u32;
    let height = log.canvas_height.max(1.0) as u32;
    let mut image = RgbaImage::from_pixel(width, height, BACKGROUND);
    draw_panel(&mut image, time, fields, font);
    let length = needle_length(log);

    for (&center, &theta) in log.cell_positions.iter().zip(orientations) {
        let sprite = table.sprite(theta);
        let pivot = (center.0 as i32, center.1 as i32);
        draw_hollow_circle_mut(&mut image, pivot, (length * 1.1) as i32, DIAL);

        let tip = to_screen(center, sprite.tip, length);
        draw_line_segment_mut(&mut image, to_screen(center, sprite.tail, length), tip, NEEDLE);
        draw_line_segment_mut(&mut image, tip, to_screen(center, sprite.barb_left, length), NEEDLE);
        draw_line_segment_mut(&mut image, tip, to_screen(center, sprite.barb_right, length), NEEDLE);
        draw_filled_circle_mut(&mut image, pivot, (length * 0.08).max(1.0) as i32, PIVOT);
    }
    image
}

/// Reads a history log, picking the decoder from the file extension.
fn read_history(path: &Path) -> Result<HistoryLog> {
    let file = File::open(path).with_context(|| format!("Failed to open history file '{}'", path.display()))?;
    let reader = BufReader::new(file);
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
    let log: HistoryLog = match extension {
        "bin" => bincode::deserialize_from(reader).context("Failed to decode bincode history")?,
        "msgpack" => rmp_serde::from_read(reader).context("Failed to decode MessagePack history")?,
        _ => serde_json::from_reader(reader).context("Failed to decode JSON history")?,
    };
    Ok(log)
}

/// Min/max of a series with a little headroom; flat series get a unit band.
fn padded_range(values: impl IntoIterator<Item = f64>) -> (f64, f64) {
    let (lo, hi) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !lo.is_finite() {
        return (0.0, 1.0);
    }
    if (hi - lo).abs() < 1e-12 {
        return (lo - 0.5, hi + 0.5);
    }
    let pad = 0.05 * (hi - lo);
    (lo - pad, hi + pad)
}

/// Four stacked panels: static field, driven frequency, per-cell orientation
/// and the orientation spread over time. Resets are marked on the last two.
fn plot_history(log: &HistoryLog, path: &Path, size: (u32, u32)) -> Result<()> {
    let samples = &log.samples;
    let times = padded_range(samples.iter().map(|s| s.time));
    let x_range = times.0.max(0.0)..times.1;

    let root = BitMapBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE).map_err(|e| anyhow::anyhow!("backend error: {e}"))?;
    let panels = root.split_evenly((4, 1));

    {
        let (lo, hi) = padded_range(samples.iter().map(|s| s.fields.effective_static_magnitude()));
        let mut chart = ChartBuilder::on(&panels[0])
            .caption("B0 field", ("sans-serif", 20))
            .margin(10)
            .x_label_area_size(25)
            .y_label_area_size(60)
            .build_cartesian_2d(x_range.clone(), lo..hi)
            .map_err(|e| anyhow::anyhow!("chart error: {e}"))?;
        chart.configure_mesh().draw().map_err(|e| anyhow::anyhow!("mesh error: {e}"))?;
        chart
            .draw_series(LineSeries::new(samples.iter().map(|s| (s.time, s.fields.effective_static_magnitude())), &BLUE))
            .map_err(|e| anyhow::anyhow!("draw error: {e}"))?;
    }

    {
        let (lo, hi) = padded_range(samples.iter().map(|s| s.fields.effective_driven_frequency()));
        let mut chart = ChartBuilder::on(&panels[1])
            .caption("B1 freq [Hz]", ("sans-serif", 20))
            .margin(10)
            .x_label_area_size(25)
            .y_label_area_size(60)
            .build_cartesian_2d(x_range.clone(), lo..hi)
            .map_err(|e| anyhow::anyhow!("chart error: {e}"))?;
        chart.configure_mesh().draw().map_err(|e| anyhow::anyhow!("mesh error: {e}"))?;
        chart
            .draw_series(LineSeries::new(samples.iter().map(|s| (s.time, s.fields.effective_driven_frequency())), &BLUE))
            .map_err(|e| anyhow::anyhow!("draw error: {e}"))?;
    }

    {
        let (lo, hi) = padded_range(samples.iter().flat_map(|s| s.orientations.iter().copied()));
        let mut chart = ChartBuilder::on(&panels[2])
            .caption("Theta", ("sans-serif", 20))
            .margin(10)
            .x_label_area_size(25)
            .y_label_area_size(60)
            .build_cartesian_2d(x_range.clone(), lo..hi)
            .map_err(|e| anyhow::anyhow!("chart error: {e}"))?;
        chart.configure_mesh().draw().map_err(|e| anyhow::anyhow!("mesh error: {e}"))?;

        // resets as red vertical lines
        chart
            .draw_series(log.resets.iter().map(|&t| PathElement::new(vec![(t, lo), (t, hi)], &RED)))
            .map_err(|e| anyhow::anyhow!("draw error: {e}"))?;

        let cells = samples.first().map_or(0, |s| s.orientations.len());
        for cell in 0..cells {
            let color = Palette99::pick(cell);
            chart
                .draw_series(LineSeries::new(
                    samples.iter().filter_map(|s| s.orientations.get(cell).map(|&theta| (s.time, theta))),
                    &color,
                ))
                .map_err(|e| anyhow::anyhow!("draw error: {e}"))?;
        }
    }

    {
        let (lo, hi) = padded_range(samples.iter().map(|s| s.orientation_spread));
        let mut chart = ChartBuilder::on(&panels[3])
            .caption("Std Dev Theta", ("sans-serif", 20))
            .margin(10)
            .x_label_area_size(25)
            .y_label_area_size(60)
            .build_cartesian_2d(x_range, lo..hi)
            .map_err(|e| anyhow::anyhow!("chart error: {e}"))?;
        chart.configure_mesh().x_desc("time [s]").draw().map_err(|e| anyhow::anyhow!("mesh error: {e}"))?;
        chart
            .draw_series(log.resets.iter().map(|&t| PathElement::new(vec![(t, lo), (t, hi)], &RED)))
            .map_err(|e| anyhow::anyhow!("draw error: {e}"))?;
        chart
            .draw_series(LineSeries::new(samples.iter().map(|s| (s.time, s.orientation_spread)), &BLACK))
            .map_err(|e| anyhow::anyhow!("draw error: {e}"))?;
    }

    root.present().map_err(|e| anyhow::anyhow!("render error: {e}"))?;
    Ok(())
}

/// Renders one frame per history sample in parallel.
fn render_frames(log: &HistoryLog, table: &RotationTable, font: Option<&FontVec>, dir: &Path) -> Result<()> {
    let progress_bar = ProgressBar::new(log.samples.len() as u64);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} frames ({percent}%) [{eta}]")
            .map_err(|e| anyhow::anyhow!("Invalid progress bar template: {e}"))?
            .progress_chars("#>-"),
    );

    log.samples
        .par_iter()
        .enumerate()
        .progress_with(progress_bar.clone())
        .try_for_each(|(index, sample)| -> Result<()> {
            let frame = draw_frame(log, &sample.orientations, sample.time, &sample.fields, table, font);
            let path = dir.join(format!("frame_{:05}.png", index));
            frame.save(&path).with_context(|| format!("Failed to write frame {}", path.display()))
        })?;

    progress_bar.finish_with_message("frames done");
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    run_with_args(Args::parse())
}

fn run_with_args(args: Args) -> Result<()> {
    let start_time = Instant::now();
    let log = read_history(&args.input)?;
    info!(
        "Loaded {}x{} grid with {} samples and {} resets from {}",
        log.columns,
        log.rows,
        log.samples.len(),
        log.resets.len(),
        args.input.display()
    );
    if log.cell_positions.len() != log.final_orientations.len() {
        anyhow::bail!(
            "History has {} cell positions but {} orientations.",
            log.cell_positions.len(),
            log.final_orientations.len()
        );
    }

    fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("Failed to create output directory {}", args.output_dir.display()))?;

    let table = RotationTable::new();
    let font = load_font(args.font.as_deref())?;
    let final_path = args.output_dir.join("final_frame.png");
    draw_frame(&log, &log.final_orientations, log.end_time, &log.final_fields, &table, font.as_ref())
        .save(&final_path)
        .with_context(|| format!("Failed to write {}", final_path.display()))?;
    info!("Final frame saved to {}", final_path.display());

    if log.samples.is_empty() {
        warn!("History contains no samples; skipping plot.");
    } else {
        let plot_path = args.output_dir.join("history.png");
        plot_history(&log, &plot_path, (args.plot_width, args.plot_height))?;
        info!("History plot saved to {}", plot_path.display());

        if args.frames {
            render_frames(&log, &table, font.as_ref(), &args.output_dir)?;
        }
    }

    info!("Visualization completed in {:.2?}", start_time.elapsed());
    Ok(())
}
