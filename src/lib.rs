pub mod classify;
pub mod cli;
pub mod config;
pub mod data;
pub mod dedupe;
pub mod drift;
pub mod encode;
pub mod error;
pub mod filter;
pub mod frame;
pub mod frequency;
pub mod impute;
pub mod io_utils;
pub mod loader;
pub mod outliers;
pub mod pipeline;
pub mod render;
pub mod scale;
pub mod schema;
pub mod stage;
pub mod stats;
pub mod track;

use std::{env, fs, path::Path, sync::OnceLock};

use anyhow::{Context, Result, bail};
use clap::Parser;
use itertools::Itertools;
use log::{LevelFilter, debug, info, warn};

use crate::{
    cli::{Cli, CleanArgs, Commands, DriftArgs, FilterArgs, InputArgs, ProbeArgs, ProfileArgs},
    config::PipelineConfig,
    drift::{DRIFT_HEADERS, DriftDetector, StatisticalDriftDetector},
    frequency::FREQUENCY_HEADERS,
    loader::LoadOptions,
    pipeline::{HISTORY_HEADERS, Pipeline},
    render::headers,
    schema::Schema,
    stats::SUMMARY_HEADERS,
    track::{DvcTracker, Tracker},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("data_wrangler", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Probe(args) => handle_probe(&args),
        Commands::Profile(args) => handle_profile(&args),
        Commands::Clean(args) => handle_clean(&args),
        Commands::Filter(args) => handle_filter(&args),
        Commands::Drift(args) => handle_drift(&args),
    }
}

fn load_schema(path: Option<&Path>) -> Result<Option<Schema>> {
    path.map(|path| {
        Schema::load(path).with_context(|| format!("Loading schema from {path:?}"))
    })
    .transpose()
}

fn load_options(args: &InputArgs) -> Result<LoadOptions> {
    Ok(LoadOptions {
        delimiter: args.delimiter,
        encoding: io_utils::resolve_encoding(args.input_encoding.as_deref())?,
        schema: load_schema(args.schema.as_deref())?,
        sample_rows: args.sample_rows,
    })
}

fn handle_probe(args: &ProbeArgs) -> Result<()> {
    let options = load_options(&args.input)?;
    info!(
        "Probing '{}' with delimiter '{}'",
        args.input.input.display(),
        io_utils::printable_delimiter(io_utils::resolve_delimiter(
            Some(&args.input.input),
            options.delimiter
        ))
    );
    let schema = loader::infer_schema(&args.input.input, &options)
        .with_context(|| format!("Inferring schema from {:?}", args.input.input))?;
    match &args.output {
        Some(path) => {
            schema
                .save(path)
                .with_context(|| format!("Writing schema to {path:?}"))?;
            info!(
                "Inferred schema for {} column(s) written to {path:?}",
                schema.columns.len()
            );
        }
        None => print!(
            "{}",
            serde_yaml::to_string(&schema).context("Serializing schema")?
        ),
    }
    Ok(())
}

fn handle_profile(args: &ProfileArgs) -> Result<()> {
    let table = loader::load_table(&args.input.input, &load_options(&args.input)?)?;
    let profile = stats::profile(&table, args.top);
    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&profile).context("Serializing profile")?
        );
        return Ok(());
    }

    let overview = &profile.overview;
    println!(
        "{} row(s) x {} column(s), {} missing cell(s), {} duplicate row(s)",
        overview.shape.rows, overview.shape.columns, overview.missing_cells, overview.duplicate_rows
    );
    let column_rows: Vec<Vec<String>> = overview
        .columns
        .iter()
        .map(|c| {
            vec![
                c.name.clone(),
                c.datatype.to_string(),
                c.kind.to_string(),
                c.missing.to_string(),
            ]
        })
        .collect();
    println!();
    render::print_table(&headers(&["column", "type", "kind", "missing"]), &column_rows);

    if !profile.summaries.is_empty() {
        let rows: Vec<Vec<String>> = profile.summaries.iter().map(|s| s.render_row()).collect();
        println!();
        render::print_table(&headers(&SUMMARY_HEADERS), &rows);
    }
    let frequency_rows: Vec<Vec<String>> = profile
        .frequencies
        .iter()
        .flat_map(|(column, counts)| counts.iter().map(move |vc| vc.render_row(column)))
        .collect();
    if !frequency_rows.is_empty() {
        println!();
        render::print_table(&headers(&FREQUENCY_HEADERS), &frequency_rows);
    }
    Ok(())
}

fn handle_clean(args: &CleanArgs) -> Result<()> {
    let base = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    let config = args.apply_overrides(base);
    debug!("Effective pipeline config:\n{}", config.to_yaml_string()?);
    let settings = config.settings();
    let enabled = settings.enabled();
    if enabled.is_empty() {
        warn!("No cleaning stage enabled; the table is written unchanged");
    } else {
        info!("Stages: {}", enabled.iter().join(" -> "));
    }

    let table = loader::load_table(&args.input.input, &load_options(&args.input)?)?;
    let columns = if config.columns.is_empty() {
        table.column_names()
    } else {
        config.columns.clone()
    };
    let mut pipeline = Pipeline::new(table);
    pipeline.select_columns(columns)?;
    pipeline.configure(settings)?;
    let output = pipeline.finish()?;
    debug!("Working columns: {}", pipeline.selection().iter().join(", "));

    let failed = output.history.failures().count();
    if failed > 0 {
        warn!("{failed} stage(s) failed and left the table unchanged");
    }
    if args.output.is_some() {
        let rows: Vec<Vec<String>> = output
            .history
            .reports()
            .iter()
            .map(|r| r.render_row())
            .collect();
        render::print_table(&headers(&HISTORY_HEADERS), &rows);
    }
    if let Some(path) = &args.history {
        let json = serde_json::to_string_pretty(&output.history)
            .context("Serializing stage history")?;
        fs::write(path, json).with_context(|| format!("Writing stage history to {path:?}"))?;
        info!("Stage history written to {path:?}");
    }

    let output_delimiter = args.output_delimiter.or(args.input.delimiter);
    let encoding = io_utils::resolve_encoding(args.output_encoding.as_deref())?;
    loader::write_table(&output.table, args.output.as_deref(), output_delimiter, encoding)?;

    if let Some(path) = &args.checkpoint {
        let checkpoint = track::checkpoint(&output.table, path)?;
        eprintln!("{}  {}", checkpoint.sha256, checkpoint.path.display());
        if let Some(repo) = &args.track {
            let mut tracker = DvcTracker::new(repo);
            tracker.initialize()?;
            let absolute = fs::canonicalize(path)
                .with_context(|| format!("Resolving checkpoint path {path:?}"))?;
            tracker.track(&absolute, &args.message)?;
            if args.push {
                tracker.push()?;
            }
        }
    }
    Ok(())
}

fn handle_filter(args: &FilterArgs) -> Result<()> {
    let filters = filter::parse_filters(&args.filters)?;
    let table = loader::load_table(&args.input.input, &load_options(&args.input)?)?;
    let filtered = filter::apply_filters(&table, &filters)?;
    info!(
        "{} of {} row(s) match {} filter(s)",
        filtered.row_count(),
        table.row_count(),
        filters.len()
    );
    match args.preview {
        Some(limit) => print!("{}", render::render_preview(&filtered, limit)),
        None => loader::write_table(
            &filtered,
            args.output.as_deref(),
            args.output_delimiter.or(args.input.delimiter),
            encoding_rs::UTF_8,
        )?,
    }
    Ok(())
}

fn handle_drift(args: &DriftArgs) -> Result<()> {
    let options = LoadOptions {
        delimiter: args.delimiter,
        encoding: io_utils::resolve_encoding(args.input_encoding.as_deref())?,
        schema: load_schema(args.schema.as_deref())?,
        ..LoadOptions::default()
    };
    let reference = loader::load_table(&args.reference, &options)?;
    let current = loader::load_table(&args.current, &options)?;
    let report = StatisticalDriftDetector::default().detect(&reference, &current)?;
    let rows: Vec<Vec<String>> = report.columns.iter().map(|c| c.render_row()).collect();
    render::print_table(&headers(&DRIFT_HEADERS), &rows);
    println!(
        "Dataset drift: {} ({} of {} column(s) drifted)",
        if report.dataset_drift { "yes" } else { "no" },
        report.drifted_columns,
        report.compared_columns
    );
    if let Some(path) = &args.report {
        fs::write(path, report.to_json()?)
            .with_context(|| format!("Writing drift report to {path:?}"))?;
        info!("Drift report written to {path:?}");
    }
    if args.fail_on_drift && report.dataset_drift {
        bail!("Dataset drift detected");
    }
    Ok(())
}
