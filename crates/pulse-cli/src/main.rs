use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use plotters::{
    coord::Shift,
    prelude::*,
    style::text_anchor::{HPos, Pos, VPos},
};
use pulse_lib::{
    io::{read_dataset, synthetic_dataset, text as text_io, write_csv_dataset, Dataset},
    plot::{self, draw_trace, DrawingSurface, Grid, TraceLabel},
    SampleBuffer, SegmentDetector, Segments,
};
use pulse_run::{
    read_config, write_summary, FrameOutcome, FrameRow, ManualClock, PlaybackConfig, Session,
    SessionSummary,
};
use serde::Serialize;
use std::{
    io::{self, Read},
    path::{Path, PathBuf},
};

#[derive(Parser)]
#[command(
    name = "pulse",
    version,
    about = "Pulse: ECG-driven cardiac cycle playback tools"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct DatasetArgs {
    /// CSV or JSON dataset; a synthetic one is generated when omitted
    #[arg(long)]
    dataset: Option<PathBuf>,
    /// Seed for the synthetic dataset
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

#[derive(clap::Args)]
struct SessionArgs {
    /// TOML playback configuration
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, default_value_t = 0)]
    patient: usize,
    #[arg(long)]
    no_normalize: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect P/QRS/T segments in the last samples read from stdin or --input file
    Segments {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// List the patient selector entries of a dataset
    Patients {
        #[command(flatten)]
        data: DatasetArgs,
    },
    /// Write a synthetic dataset as CSV
    Generate {
        #[arg(long)]
        out: PathBuf,
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// Run the playback session offline with a simulated clock
    Simulate {
        #[command(flatten)]
        data: DatasetArgs,
        #[command(flatten)]
        session: SessionArgs,
        /// Playback speed multiplier, overriding the config
        #[arg(long)]
        speed: Option<f64>,
        /// Display refreshes to simulate
        #[arg(long, default_value_t = 280)]
        frames: usize,
        /// Simulated time between refreshes
        #[arg(long, default_value_t = 16)]
        interval_ms: u64,
        /// Print one summary object instead of a JSON line per processed frame
        #[arg(long)]
        summary: bool,
        /// Also write processed frames as TSV
        #[arg(long)]
        frames_out: Option<PathBuf>,
        /// Also write the run summary as JSON
        #[arg(long)]
        summary_out: Option<PathBuf>,
    },
    /// Render the ECG trace of a patient at a cycle index to PNG via plotters
    Plot {
        #[command(flatten)]
        data: DatasetArgs,
        #[command(flatten)]
        session: SessionArgs,
        #[arg(long, default_value_t = 0)]
        index: usize,
        #[arg(long, default_value_t = 800)]
        width: u32,
        #[arg(long, default_value_t = 200)]
        height: u32,
        /// Skip the P/Q/R/S/T text labels
        #[arg(long)]
        no_labels: bool,
        #[arg(long)]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Segments { input, config } => cmd_segments(input.as_deref(), config.as_deref())?,
        Commands::Patients { data } => cmd_patients(&data)?,
        Commands::Generate { out, seed } => cmd_generate(&out, seed)?,
        Commands::Simulate {
            data,
            session,
            speed,
            frames,
            interval_ms,
            summary,
            frames_out,
            summary_out,
        } => {
            let mut cfg = playback_config(&session)?;
            if let Some(speed) = speed {
                cfg.speed = speed;
            }
            let out = SimulateOutput {
                summary,
                frames_out: frames_out.as_deref(),
                summary_out: summary_out.as_deref(),
            };
            cmd_simulate(&data, &session, cfg, frames, interval_ms, &out)?
        }
        Commands::Plot {
            data,
            session,
            index,
            width,
            height,
            no_labels,
            out,
        } => cmd_plot(&data, &session, index, (width, height), no_labels, &out)?,
    }
    Ok(())
}

fn read_samples(input: Option<&Path>) -> Result<Vec<f64>> {
    match input {
        Some(path) => text_io::read_f64_series(path),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            text_io::parse_f64_series(&buf)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<PlaybackConfig> {
    match path {
        Some(path) => read_config(path),
        None => Ok(PlaybackConfig::default()),
    }
}

fn load_dataset(args: &DatasetArgs) -> Result<Dataset> {
    match &args.dataset {
        Some(path) => read_dataset(path),
        None => Ok(synthetic_dataset(args.seed)),
    }
}

fn playback_config(args: &SessionArgs) -> Result<PlaybackConfig> {
    let mut cfg = load_config(args.config.as_deref())?;
    if args.no_normalize {
        cfg.normalize = false;
    }
    Ok(cfg)
}

fn open_session(
    data: &DatasetArgs,
    playback: &SessionArgs,
    cfg: PlaybackConfig,
    clock: ManualClock,
) -> Result<Session<ManualClock>> {
    let dataset = load_dataset(data)?;
    let mut session = Session::new(dataset, cfg, clock);
    if playback.patient != 0 {
        session
            .select_patient(playback.patient)
            .with_context(|| format!("selecting patient {}", playback.patient))?;
    }
    Ok(session)
}

#[derive(Serialize)]
struct SegmentsOutput {
    samples: usize,
    detected: bool,
    segments: Segments,
    /// `(start, end)` per wave, `(-1, -1)` when undetected.
    pairs: [(i64, i64); 3],
}

fn cmd_segments(input: Option<&Path>, config: Option<&Path>) -> Result<()> {
    let cfg = load_config(config)?;
    let samples = read_samples(input)?;
    let mut buffer = SampleBuffer::new(cfg.buffer_len());
    for &v in &samples {
        buffer.push(v);
    }
    let mut detector = SegmentDetector::new(cfg.segments);
    let detected = detector.update(&buffer);
    let segments = *detector.segments();
    let out = SegmentsOutput {
        samples: samples.len(),
        detected,
        segments,
        pairs: segments.as_pairs(),
    };
    println!("{}", serde_json::to_string(&out)?);
    Ok(())
}

#[derive(Serialize)]
struct PatientEntry<'a> {
    index: usize,
    name: String,
    label: &'a str,
    heart_rate: Option<u32>,
}

fn cmd_patients(data: &DatasetArgs) -> Result<()> {
    let dataset = load_dataset(data)?;
    let entries: Vec<PatientEntry> = dataset
        .patients()
        .iter()
        .enumerate()
        .map(|(index, p)| PatientEntry {
            index,
            name: p.selector_label(index),
            label: p.label.as_str(),
            heart_rate: p.heart_rate,
        })
        .collect();
    println!("{}", serde_json::to_string(&entries)?);
    Ok(())
}

fn cmd_generate(out: &Path, seed: u64) -> Result<()> {
    let dataset = synthetic_dataset(seed);
    write_csv_dataset(out, &dataset)?;
    info!("wrote {} synthetic patients to {}", dataset.len(), out.display());
    println!(
        "{}",
        serde_json::json!({ "out": out.display().to_string(), "patients": dataset.len() })
    );
    Ok(())
}

/// Where `simulate` sends its results besides the per-frame JSON lines.
struct SimulateOutput<'a> {
    summary: bool,
    frames_out: Option<&'a Path>,
    summary_out: Option<&'a Path>,
}

fn cmd_simulate(
    data: &DatasetArgs,
    playback: &SessionArgs,
    cfg: PlaybackConfig,
    frames: usize,
    interval_ms: u64,
    out: &SimulateOutput,
) -> Result<()> {
    let clock = ManualClock::new(0);
    let mut session = open_session(data, playback, cfg, clock.clone())?;
    let mut totals = SessionSummary::new(
        session.patient_index(),
        session.patient().label.as_str(),
        session.speed(),
    );
    let mut rows = Vec::new();
    for _ in 0..frames {
        clock.advance(interval_ms);
        let outcome = session.tick();
        totals.record(&outcome);
        if let FrameOutcome::Advanced(report) = &outcome {
            if out.frames_out.is_some() {
                rows.push(FrameRow::from(report.as_ref()));
            }
            if !out.summary {
                println!("{}", serde_json::to_string(report)?);
            }
        }
    }
    if let Some(path) = out.frames_out {
        pulse_run::write_frames_tsv(path, &rows)?;
    }
    if let Some(path) = out.summary_out {
        write_summary(path, &totals)?;
        info!("wrote run summary to {}", path.display());
    }
    if out.summary {
        println!("{}", serde_json::to_string(&totals)?);
    }
    Ok(())
}

fn cmd_plot(
    data: &DatasetArgs,
    playback: &SessionArgs,
    index: usize,
    size: (u32, u32),
    no_labels: bool,
    out: &Path,
) -> Result<()> {
    // Process every sample so the detector has seen a full cycle before `index`.
    let cfg = PlaybackConfig {
        speed: 1.0,
        slow_factor: 1,
        ..playback_config(playback)?
    };
    let mut session = open_session(data, playback, cfg, ManualClock::new(0))?;
    let target = index % pulse_lib::CYCLE_LEN;
    for _ in 0..pulse_lib::CYCLE_LEN + target + 1 {
        session.tick();
    }
    let trace = session.trace(size.0 as f64, size.1 as f64);
    let mut surface = PngSurface::new(out, size, !no_labels);
    draw_trace(&mut surface, &trace)?;
    surface.finish()?;
    info!("wrote ECG trace to {}", out.display());
    Ok(())
}

fn rgb(color: plot::Color) -> RGBColor {
    let (r, g, b) = color.rgb();
    RGBColor(r, g, b)
}

fn to_px(p: [f64; 2]) -> (i32, i32) {
    (p[0].round() as i32, p[1].round() as i32)
}

/// `DrawingSurface` over a plotters bitmap.
struct PngSurface<'a> {
    root: DrawingArea<BitMapBackend<'a>, Shift>,
    labels: bool,
}

impl<'a> PngSurface<'a> {
    fn new(path: &'a Path, size: (u32, u32), labels: bool) -> Self {
        let root = BitMapBackend::new(path, size).into_drawing_area();
        Self { root, labels }
    }

    fn finish(self) -> Result<()> {
        self.root.present()?;
        Ok(())
    }

    fn lines(&mut self, lines: &[[[f64; 2]; 2]], color: plot::Color) -> Result<()> {
        let style = ShapeStyle::from(&rgb(color)).stroke_width(1);
        for [from, to] in lines {
            self.root
                .draw(&PathElement::new(vec![to_px(*from), to_px(*to)], style))?;
        }
        Ok(())
    }
}

impl DrawingSurface for PngSurface<'_> {
    fn clear(&mut self, _width: f64, _height: f64) -> Result<()> {
        self.root.fill(&BLACK)?;
        Ok(())
    }

    fn grid(&mut self, grid: &Grid) -> Result<()> {
        self.lines(&grid.minor, plot::Color::GRID_MINOR)?;
        self.lines(&grid.major, plot::Color::GRID_MAJOR)
    }

    fn polyline(&mut self, series: &plot::LineSeries) -> Result<()> {
        let style = ShapeStyle::from(&rgb(series.style.color))
            .stroke_width(series.style.width.round().max(1.0) as u32);
        let points: Vec<(i32, i32)> = series.points.iter().map(|p| to_px(*p)).collect();
        self.root.draw(&PathElement::new(points, style))?;
        Ok(())
    }

    fn label(&mut self, label: &TraceLabel) -> Result<()> {
        if !self.labels {
            return Ok(());
        }
        let font = ("sans-serif", 14)
            .into_font()
            .color(&rgb(label.color))
            .pos(Pos::new(HPos::Left, VPos::Bottom));
        self.root
            .draw(&Text::new(label.text.clone(), to_px([label.x, label.y]), font))?;
        Ok(())
    }
}
