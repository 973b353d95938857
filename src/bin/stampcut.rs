// src/bin/stampcut.rs
//
// Command-line front end: split composites, re-run directories, check
// finished artifacts, derive store images and pick chroma keys.

use clap::{Parser, Subcommand};
use color_eyre::eyre::{bail, eyre, Result, WrapErr};
use rayon::prelude::*;
use serde::Serialize;
use stampcut::engine::io::{grid_inputs, prompts_background, select_inputs, write_atomic, write_png, InputMode};
use stampcut::engine::layout::{main_image, tab_image};
use stampcut::engine::palette::{dominant_colors, select_chroma_key};
use stampcut::engine::pipeline::{ProcessedGrid, StickerSummary};
use stampcut::engine::{get_pool, read_image, FirewallConfig, QualityReport, StickerPipeline};
use stampcut::{Color, Settings, StickerFormat};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stampcut")]
#[command(version, about = "Background removal and quality control for sticker packs", long_about = None)]
struct Cli {
    /// Settings file (TOML)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Quality profile: strict or lenient
    #[arg(long, global = true, value_name = "NAME")]
    profile: Option<String>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split grid composites into stickers and run the strict pipeline on each cell
    Split {
        /// Composite images, or directories whose grid_*.png are taken in order
        #[arg(value_name = "INPUT", required = true)]
        inputs: Vec<PathBuf>,

        /// Output directory
        #[arg(short, long, value_name = "DIR", default_value = "stickers")]
        out: PathBuf,

        #[arg(long, default_value_t = 3)]
        rows: u32,

        #[arg(long, default_value_t = 4)]
        cols: u32,

        /// Output format: stamp, emoji, main or tab
        #[arg(long, value_name = "FORMAT", default_value = "stamp")]
        format: String,

        /// Skip the per-cell border seam cleaner
        #[arg(long)]
        no_clean_edges: bool,

        /// Shrink cells larger than the format before processing
        #[arg(long)]
        fit: bool,

        /// Write a JSON report of every cell
        #[arg(long, value_name = "FILE")]
        report: Option<PathBuf>,
    },

    /// Re-run the pipeline in place on the stickers of a directory
    Fix {
        #[arg(value_name = "DIR")]
        dir: PathBuf,

        /// Which files to touch: package, eco or all
        #[arg(long, default_value = "package")]
        mode: String,

        /// Fixed background color; defaults to _prompts.json
        #[arg(long, value_name = "#RRGGBB")]
        background: Option<Color>,
    },

    /// Evaluate finished stickers without modifying them
    Check {
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,

        /// Background color the stickers were keyed on
        #[arg(long, value_name = "#RRGGBB", default_value = "#00FF00")]
        background: Color,

        /// Print reports as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write main.png and tab.png from a finished sticker
    Package {
        #[arg(value_name = "STICKER")]
        sticker: PathBuf,

        #[arg(short, long, value_name = "DIR", default_value = ".")]
        out: PathBuf,
    },

    /// Show the dominant colors of a character and a safe chroma key
    Palette {
        #[arg(value_name = "CHARACTER")]
        character: PathBuf,

        /// Number of colors to report
        #[arg(short = 'n', long, default_value_t = 5)]
        count: usize,
    },
}

#[derive(Serialize)]
struct CellRecord<'a> {
    path: String,
    #[serde(flatten)]
    summary: StickerSummary<'a>,
}

#[derive(Serialize)]
struct CheckRecord<'a> {
    path: String,
    report: &'a QualityReport,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_target(false)
        .init();
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load(path).wrap_err_with(|| format!("loading {}", path.display()))?,
        None => Settings::default(),
    };
    if let Some(profile) = &cli.profile {
        settings.profile = Some(profile.clone());
    }
    Ok(settings)
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn print_report(label: &str, report: &QualityReport) {
    if report.errors().is_empty() && report.warnings().is_empty() {
        return;
    }
    println!(" - {label}:");
    for e in report.errors() {
        println!("     [NG] {e}");
    }
    for w in report.warnings() {
        println!("     [WARN] {w}");
    }
}

fn cell_path(out: &Path, index: usize) -> PathBuf {
    out.join(format!("{index:02}.png"))
}

/// Expand directories to their grid_*.png composites.
fn collect_composites(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut composites = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let grids = grid_inputs(input)?;
            if grids.is_empty() {
                warn!(dir = %input.display(), "no grid_*.png composites found");
            }
            composites.extend(grids);
        } else {
            composites.push(input.clone());
        }
    }
    Ok(composites)
}

#[allow(clippy::too_many_arguments)]
fn run_split(
    pipeline: StickerPipeline,
    inputs: &[PathBuf],
    out: &Path,
    rows: u32,
    cols: u32,
    format: &str,
    clean_edges: bool,
    fit: bool,
    report_path: Option<&Path>,
) -> Result<()> {
    let format = StickerFormat::get(format).ok_or_else(|| eyre!("unknown format '{format}'"))?;
    let pipeline = pipeline.with_format(format).with_fit_to_format(fit);
    let composites = collect_composites(inputs)?;
    if composites.is_empty() {
        bail!("no composite images to split");
    }
    std::fs::create_dir_all(out).wrap_err_with(|| format!("creating {}", out.display()))?;

    let firewall = FirewallConfig::strict();
    let req = pipeline.grid_request(rows, cols).with_clean_edges(clean_edges);
    let mut index = 1usize;
    let mut total = 0usize;
    let mut failed = 0usize;
    let mut grids: Vec<(usize, ProcessedGrid)> = Vec::new();

    for composite in &composites {
        let first = index;
        let grid = match read_image(composite, &firewall).and_then(|img| pipeline.process_grid(&img, &req)) {
            Ok(grid) => grid,
            Err(e) => {
                // reserve the composite's cell numbers
                index += req.cell_count();
                total += req.cell_count();
                failed += req.cell_count();
                error!(
                    composite = %composite.display(),
                    category = e.category().as_str(),
                    error = %e,
                    "composite failed"
                );
                println!(" - {}:\n     [NG] {e}", file_label(composite));
                continue;
            }
        };
        info!(
            composite = %composite.display(),
            rows = grid.layout.rows,
            cols = grid.layout.cols,
            swapped = grid.layout.swapped,
            "split"
        );
        for result in &grid.stickers {
            let path = cell_path(out, index);
            index += 1;
            total += 1;
            match result {
                Ok(sticker) => {
                    write_atomic(&path, &sticker.png)?;
                    if !sticker.ok() {
                        failed += 1;
                    }
                    print_report(&file_label(&path), &sticker.report);
                }
                Err(e) => {
                    failed += 1;
                    error!(path = %path.display(), category = e.category().as_str(), error = %e, "cell failed");
                    println!(" - {}:\n     [NG] {e}", file_label(&path));
                }
            }
        }
        grids.push((first, grid));
    }

    if let Some(report_path) = report_path {
        let records: Vec<CellRecord<'_>> = grids
            .iter()
            .flat_map(|(first, grid)| {
                grid.stickers.iter().enumerate().filter_map(move |(i, result)| {
                    result.as_ref().ok().map(|sticker| CellRecord {
                        path: cell_path(out, first + i).display().to_string(),
                        summary: sticker.summary(),
                    })
                })
            })
            .collect();
        let json = serde_json::to_vec_pretty(&records)?;
        write_atomic(report_path, &json)?;
    }
    println!("\n{}/{} PASS", total - failed, total);
    println!("output: {}", out.display());
    if failed > 0 {
        bail!("{failed} sticker(s) have fatal quality errors");
    }
    Ok(())
}

fn run_fix(pipeline: StickerPipeline, dir: &Path, mode: &str, background: Option<Color>) -> Result<()> {
    let mode: InputMode = mode.parse()?;
    let files = select_inputs(dir, mode)?;
    if files.is_empty() {
        warn!(dir = %dir.display(), ?mode, "nothing to fix");
        return Ok(());
    }
    let background = match background {
        Some(c) => Some(c),
        None => prompts_background(dir)?,
    };
    let pipeline = match background {
        Some(color) => {
            info!(background = %color, "using fixed background");
            pipeline.with_fixed_background(color)
        }
        None => pipeline,
    };

    println!("re-processing {} file(s)...", files.len());
    let firewall = FirewallConfig::strict();
    let fix_one = |path: &PathBuf| -> stampcut::Result<bool> {
        let img = read_image(path, &firewall)?;
        let sticker = pipeline.process(img)?;
        write_atomic(path, &sticker.png)?;
        debug!(path = %path.display(), bg = %sticker.background_color(), "rewritten");
        print_report(&file_label(path), &sticker.report);
        Ok(sticker.ok())
    };
    let results: Vec<_> = match get_pool() {
        Some(pool) => pool.install(|| files.par_iter().map(fix_one).collect()),
        None => files.iter().map(fix_one).collect(),
    };

    let mut failed = 0;
    for (path, result) in files.iter().zip(&results) {
        match result {
            Ok(true) => {}
            Ok(false) => failed += 1,
            Err(e) => {
                failed += 1;
                error!(path = %path.display(), category = e.category().as_str(), error = %e, "fix failed");
            }
        }
    }
    println!("{}/{} PASS", files.len() - failed, files.len());
    if failed > 0 {
        bail!("{failed} file(s) still fail quality checks");
    }
    Ok(())
}

fn run_check(pipeline: StickerPipeline, files: &[PathBuf], background: Color, json: bool) -> Result<()> {
    let firewall = FirewallConfig::strict();
    let mut reports = Vec::with_capacity(files.len());
    for path in files {
        let img = read_image(path, &firewall)?;
        let len = std::fs::metadata(path)
            .wrap_err_with(|| format!("reading {}", path.display()))?
            .len() as usize;
        reports.push((path, pipeline.evaluate(&img, background, Some(len))));
    }

    if json {
        let records: Vec<_> = reports
            .iter()
            .map(|(path, report)| CheckRecord {
                path: path.display().to_string(),
                report,
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else {
        for (path, report) in &reports {
            print_report(&file_label(path), report);
        }
    }

    let failed = reports.iter().filter(|(_, r)| !r.ok()).count();
    if !json {
        println!("{}/{} PASS", reports.len() - failed, reports.len());
    }
    if failed > 0 {
        bail!("{failed} file(s) fail quality checks");
    }
    Ok(())
}

fn run_package(pipeline: &StickerPipeline, sticker: &Path, out: &Path) -> Result<()> {
    let img = read_image(sticker, &FirewallConfig::strict())?;
    std::fs::create_dir_all(out).wrap_err_with(|| format!("creating {}", out.display()))?;
    let main = main_image(&img)?;
    let tab = tab_image(&img)?;
    let main_path = out.join("main.png");
    let tab_path = out.join("tab.png");
    let main_bytes = write_png(&main_path, &main, pipeline.png_preset())?;
    let tab_bytes = write_png(&tab_path, &tab, pipeline.png_preset())?;
    println!("{} ({} bytes)", main_path.display(), main_bytes);
    println!("{} ({} bytes)", tab_path.display(), tab_bytes);
    Ok(())
}

fn run_palette(character: &Path, count: usize) -> Result<()> {
    let img = read_image(character, &FirewallConfig::strict())?;
    let colors = dominant_colors(&img, count)?;
    for (i, c) in colors.iter().enumerate() {
        println!("{:>2}. {c}", i + 1);
    }
    let key = select_chroma_key(&colors);
    println!("chroma key: {}", key.describe());
    Ok(())
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = load_settings(&cli)?;
    let pipeline = settings.build_pipeline()?;
    debug!(passes = ?pipeline.passes().names(), format = pipeline.format().name, "pipeline ready");

    match &cli.command {
        Commands::Split {
            inputs,
            out,
            rows,
            cols,
            format,
            no_clean_edges,
            fit,
            report,
        } => run_split(
            pipeline,
            inputs,
            out,
            *rows,
            *cols,
            format,
            !*no_clean_edges,
            *fit,
            report.as_deref(),
        ),
        Commands::Fix { dir, mode, background } => run_fix(pipeline, dir, mode, *background),
        Commands::Check {
            files,
            background,
            json,
        } => run_check(pipeline, files, *background, *json),
        Commands::Package { sticker, out } => run_package(&pipeline, sticker, out),
        Commands::Palette { character, count } => run_palette(character, *count),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stampcut::engine::RasterImage;
    use tempfile::tempdir;

    // Green cell with a white-rimmed red block in the middle
    fn create_test_cell(size: u32) -> RasterImage {
        let (lo, hi) = (size / 4, size - size / 4);
        RasterImage::from_fn(size, size, |x, y| {
            if x < lo || x >= hi || y < lo || y >= hi {
                [0, 255, 0, 255]
            } else if x < lo + 4 || x >= hi - 4 || y < lo + 4 || y >= hi - 4 {
                [255, 255, 255, 255]
            } else {
                [210, 40, 40, 255]
            }
        })
        .unwrap()
    }

    mod split_tests {
        use super::*;

        #[test]
        fn test_unreadable_composite_is_reported_and_others_split() {
            let dir = tempdir().unwrap();
            let broken = dir.path().join("grid_1.png");
            std::fs::write(&broken, b"not a png").unwrap();
            let tile = create_test_cell(100);
            let composite =
                RasterImage::from_fn(400, 300, |x, y| tile.rgba(x % 100, y % 100)).unwrap();
            let good = dir.path().join("grid_2.png");
            write_png(&good, &composite, 2).unwrap();
            let out = dir.path().join("out");
            let report = dir.path().join("report.json");

            let result = run_split(
                StickerPipeline::strict(),
                &[broken, good],
                &out,
                3,
                4,
                "stamp",
                true,
                false,
                Some(&report),
            );
            // the broken composite's 12 cells count as failures
            assert!(result.is_err());
            assert!(!out.join("01.png").exists());
            assert!(out.join("13.png").exists());
            assert!(out.join("24.png").exists());

            let records: Vec<serde_json::Value> =
                serde_json::from_slice(&std::fs::read(&report).unwrap()).unwrap();
            assert_eq!(records.len(), 12);
            assert!(records[0]["path"].as_str().unwrap().ends_with("13.png"));
        }
    }
}
