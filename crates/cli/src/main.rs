//! Orbita CLI - field analyses on a remote compute platform

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use orbita_algorithms::temporal::{assess, CropType};
use orbita_cloud::{
    BearerAuth, CloudAuth, ComputePlatform, HttpPlatform, HttpPlatformOptions, InMemoryPlatform,
    NoAuth,
};
use orbita_engine::{
    AnalysisRequest, ConfigLoader, DownloadReport, Engine, ExecutionReport, OrbitaConfig,
    PlatformConfig, StartReport, StatusReport,
};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "orbita")]
#[command(author, version, about = "Vegetation indicators, management zones and exports for a field", long_about = None)]
struct Cli {
    /// Verbose output (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Directory holding `.env` / `.env.local`
    #[arg(long, global = true, env = "ORBITA_ENV_DIR")]
    env_dir: Option<PathBuf>,

    /// Persist job manifests here so later invocations can track them
    #[arg(long, global = true)]
    manifest_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyse a field and submit its exports
    Execute {
        /// Job identifier, used in folder and task names
        #[arg(long)]
        job_id: String,
        /// GeoJSON file with the field boundary
        #[arg(long)]
        roi: PathBuf,
        /// First day of the analysis window (YYYY-MM-DD)
        #[arg(long)]
        start: NaiveDate,
        /// Last day of the analysis window (YYYY-MM-DD)
        #[arg(long)]
        end: NaiveDate,
        /// Crop name, Spanish or English (olivo, viñedo, almendro, ...)
        #[arg(long, default_value = "other")]
        crop: String,
        /// Buffer around the boundary in meters
        #[arg(long, default_value = "0")]
        buffer: f64,
        /// Free-form label carried into the KPI record
        #[arg(long, default_value = "baseline")]
        analysis_type: String,
        /// Maximum scene cloud cover in percent
        #[arg(long)]
        cloud_threshold: Option<f64>,
        /// Analysis pixel size in meters
        #[arg(long)]
        scale: Option<f64>,
        /// Root export folder
        #[arg(long)]
        output_base: Option<String>,
    },
    /// Progress of a job's export tasks
    Status {
        job_id: String,
    },
    /// Whether a job's results are ready, and where
    Download {
        job_id: String,
    },
    /// Start a job's queued export tasks
    Start {
        job_id: String,
    },
    /// Expected NDVI and status for a crop on a given day (offline)
    Phenology {
        #[arg(long)]
        crop: String,
        /// Day of year, 1-366
        #[arg(long)]
        doy: u32,
        /// Observed NDVI
        #[arg(long)]
        ndvi: Option<f64>,
        /// Seasonal z-score, used when the crop has no reference curve
        #[arg(long, allow_hyphen_values = true)]
        zscore: Option<f64>,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    let json = std::env::var("ORBITA_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow!("could not install log subscriber: {e}"))
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn load_config(cli: &Cli) -> Result<OrbitaConfig> {
    let loader = match &cli.env_dir {
        Some(dir) => ConfigLoader::with_base_dir(dir.clone()),
        None => ConfigLoader::new(),
    };
    let mut config = loader.load().context("Failed to load configuration")?;
    if let Some(dir) = &cli.manifest_dir {
        config.engine.manifest_dir = Some(dir.clone());
    }
    Ok(config)
}

fn connect(config: &PlatformConfig) -> Result<Arc<dyn ComputePlatform>> {
    let Some(url) = &config.base_url else {
        warn!("ORBITA_PLATFORM_URL is not set; using an empty in-memory platform");
        return Ok(Arc::new(InMemoryPlatform::new()));
    };
    let auth: Box<dyn CloudAuth> = match &config.token {
        Some(token) => Box::new(BearerAuth::new(token.clone()).context("Invalid platform token")?),
        None => Box::new(NoAuth),
    };
    let options = HttpPlatformOptions {
        request_timeout: Duration::from_secs(config.timeout_secs),
        ..HttpPlatformOptions::default()
    };
    let platform = HttpPlatform::new(url, auth, options).context("Failed to create platform client")?;
    info!(url = %url, "connected to compute platform");
    Ok(Arc::new(platform))
}

fn read_roi(path: &PathBuf) -> Result<Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read ROI file {}", path.display()))?;
    let value: Value = serde_json::from_str(&text).context("ROI file is not valid JSON")?;
    // GeoJSON stored as a JSON string
    match value {
        Value::String(inner) => serde_json::from_str(&inner).context("ROI string is not valid JSON"),
        other => Ok(other),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn opt(v: Option<f64>, digits: usize) -> String {
    v.map_or_else(|| "-".to_string(), |v| format!("{v:.digits$}"))
}

fn print_execution(report: &ExecutionReport, elapsed: Duration) {
    let k = &report.kpis;
    println!("Job: {}", report.job_id);
    println!(
        "Observation: {} (DOY {}), {} scene(s) composited",
        k.observation_date, k.doy, k.scene_count
    );
    println!("Area: {:.2} ha", k.area_ha);
    println!(
        "NDVI: mean {:.3}  std {:.3}  p10 {:.3}  p50 {:.3}  p90 {:.3}",
        k.ndvi_mean, k.ndvi_std, k.ndvi_p10, k.ndvi_p50, k.ndvi_p90
    );
    println!("NDWI: mean {}   EVI: mean {}", opt(k.ndwi_mean, 3), opt(k.evi_mean, 3));
    if k.ndci_fallback {
        println!("NDCI: {} (NDVI fallback, no red-edge band)", opt(k.ndci_mean, 3));
    }
    println!("Stress: {:.2} ha ({} %)", k.stress_ha, opt(k.stress_pct, 1));
    println!(
        "Z-score: {}   seasonal: {} (n={})",
        opt(k.zscore, 2),
        opt(k.seasonal_zscore, 2),
        k.seasonal_count
    );
    println!(
        "Phenology: {} / expected {} / deviation {} % / {}",
        k.phase,
        opt(k.expected_ndvi, 2),
        opt(k.deviation_pct, 1),
        k.status.as_str()
    );

    match (&report.vra_stats, &report.vra_error) {
        (Some(zones), _) => {
            println!("\nZones:");
            for z in zones {
                println!(
                    "  {}  {:<12} {:<12} {:>8.2} ha  NDVI {:.3}",
                    z.zone_id, z.label, z.recommendation, z.area_ha, z.ndvi_mean
                );
            }
        }
        (None, Some(reason)) => println!("\nZones: skipped ({reason})"),
        (None, None) => {}
    }

    println!("\nExports -> {}", report.folders.base);
    for t in &report.tasks {
        let id = t.remote_task_id.as_deref().unwrap_or("-");
        println!("  {:<18} {:<10} {}", t.name, t.state.as_str(), id);
        if let Some(err) = &t.error {
            println!("    error: {err}");
        }
    }
    println!("  Processing time: {:.2?}", elapsed);
}

fn print_status(report: &StatusReport) {
    println!(
        "Job {}: {}/{} completed ({} %), {} running, {} pending, {} failed",
        report.job_id,
        report.completed,
        report.total,
        report.progress_pct,
        report.running,
        report.pending,
        report.failed
    );
    if report.png_complete {
        println!("Previews are ready");
    }
    for t in &report.tasks {
        println!("  {:<18} {:<10} {}", t.name, t.state.as_str(), t.file_name);
    }
}

fn print_download(report: &DownloadReport) {
    if !report.download_ready {
        println!("Job {}: waiting ({} %)", report.job_id, report.progress_pct);
        return;
    }
    println!(
        "Job {}: ready in {}",
        report.job_id,
        report.base_folder.as_deref().unwrap_or("-")
    );
    for (folder, files) in &report.files {
        for f in files {
            println!("  {folder}/{f}");
        }
    }
}

fn print_started(job_id: &str, report: &StartReport) {
    println!("Job {job_id}: started {} task(s)", report.started);
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;
    let format = cli.format;

    if let Commands::Phenology {
        crop,
        doy,
        ndvi,
        zscore,
    } = &cli.command
    {
        if !(1..=366).contains(doy) {
            bail!("day of year must be between 1 and 366, got {doy}");
        }
        let crop = CropType::from(crop.clone());
        let assessment = assess(crop, *doy, *ndvi, *zscore);
        return match format {
            OutputFormat::Json => print_json(&assessment),
            OutputFormat::Text => {
                println!("Crop: {crop}  DOY {doy}");
                println!("Phase: {}", assessment.phase);
                println!("Expected NDVI: {}", opt(assessment.expected_ndvi, 2));
                println!("Deviation: {} %", opt(assessment.deviation_pct, 1));
                println!("Status: {}", assessment.status.as_str());
                Ok(())
            }
        };
    }

    let config = load_config(&cli)?;
    let platform = connect(&config.platform)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(async move {
        match cli.command {
            Commands::Execute {
                job_id,
                roi,
                start,
                end,
                crop,
                buffer,
                analysis_type,
                cloud_threshold,
                scale,
                output_base,
            } => {
                let mut engine_config = config.engine;
                if let Some(v) = cloud_threshold {
                    engine_config.cloud_threshold_pct = v;
                }
                if let Some(v) = scale {
                    engine_config.scale_m = v;
                }
                if let Some(v) = output_base {
                    engine_config.output_base = v;
                }
                let engine = Engine::new(platform, engine_config).context("Invalid configuration")?;

                let request = AnalysisRequest::new(job_id, read_roi(&roi)?, start, end, CropType::from(crop))
                    .with_buffer(buffer)
                    .with_analysis_type(analysis_type);

                let pb = spinner("Running analysis...");
                let started = Instant::now();
                let result = engine.execute(request).await;
                pb.finish_and_clear();

                match result {
                    Ok(report) => match format {
                        OutputFormat::Json => print_json(&report),
                        OutputFormat::Text => {
                            print_execution(&report, started.elapsed());
                            Ok(())
                        }
                    },
                    Err(failure) => {
                        if format == OutputFormat::Json {
                            print_json(&failure)?;
                        }
                        Err(anyhow::Error::new(failure))
                    }
                }
            }

            Commands::Status { job_id } => {
                let engine = Engine::new(platform, config.engine)?;
                let pb = spinner("Checking tasks...");
                let report = engine.check_status(&job_id).await;
                pb.finish_and_clear();
                let report = report.context("Failed to check status")?;
                match format {
                    OutputFormat::Json => print_json(&report),
                    OutputFormat::Text => {
                        print_status(&report);
                        Ok(())
                    }
                }
            }

            Commands::Download { job_id } => {
                let engine = Engine::new(platform, config.engine)?;
                let report = engine
                    .download_results(&job_id)
                    .await
                    .context("Failed to check results")?;
                match format {
                    OutputFormat::Json => print_json(&report),
                    OutputFormat::Text => {
                        print_download(&report);
                        Ok(())
                    }
                }
            }

            Commands::Start { job_id } => {
                let engine = Engine::new(platform, config.engine)?;
                let report = engine
                    .start_tasks(&job_id)
                    .await
                    .context("Failed to start tasks")?;
                match format {
                    OutputFormat::Json => print_json(&report),
                    OutputFormat::Text => {
                        print_started(&job_id, &report);
                        Ok(())
                    }
                }
            }

            Commands::Phenology { .. } => Ok(()),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_execute() {
        let cli = Cli::try_parse_from([
            "orbita", "--format", "json", "execute", "--job-id", "j1", "--roi", "field.geojson",
            "--start", "2024-06-01", "--end", "2024-06-30", "--crop", "olivar",
        ])
        .unwrap();
        assert!(cli.format == OutputFormat::Json);
        match cli.command {
            Commands::Execute { start, crop, buffer, .. } => {
                assert_eq!(start, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
                assert_eq!(CropType::from(crop), CropType::Olive);
                assert_eq!(buffer, 0.0);
            }
            _ => panic!("expected execute"),
        }
    }

    #[test]
    fn negative_zscore_is_a_value() {
        let cli = Cli::try_parse_from([
            "orbita", "phenology", "--crop", "other", "--doy", "100", "--zscore", "-1.5",
        ])
        .unwrap();
        match cli.command {
            Commands::Phenology { zscore, .. } => assert_eq!(zscore, Some(-1.5)),
            _ => panic!("expected phenology"),
        }
    }

    #[test]
    fn rejects_bad_dates() {
        assert!(Cli::try_parse_from([
            "orbita", "execute", "--job-id", "j1", "--roi", "f.json", "--start", "2024-13-01",
            "--end", "2024-06-30",
        ])
        .is_err());
    }
}
