use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::{
    config::{EncodeSpec, FillLiteral, ImputeSpec, OutlierSpec, PipelineConfig, ScaleSpec},
    io_utils,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Clean, filter and compare tabular datasets", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Infer column types from a CSV or JSON file and save them as a YAML schema
    Probe(ProbeArgs),
    /// Print an overview, numeric summaries and top values for each column
    Profile(ProfileArgs),
    /// Run the cleaning stages (impute, dedupe, outliers, scale, encode)
    Clean(CleanArgs),
    /// Keep the rows that satisfy every column filter
    Filter(FilterArgs),
    /// Compare two datasets and report distribution drift
    Drift(DriftArgs),
}

/// Options shared by every command that reads a dataset.
#[derive(Debug, Clone, Args)]
pub struct InputArgs {
    /// Input CSV, TSV or JSON file (`-` reads CSV from stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Schema file produced by `probe`; types are inferred when omitted
    #[arg(short, long)]
    pub schema: Option<PathBuf>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Number of rows to sample when inferring types (0 means full scan)
    #[arg(long, default_value_t = crate::schema::DEFAULT_SAMPLE_ROWS)]
    pub sample_rows: usize,
}

#[derive(Debug, Args)]
pub struct ProbeArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Destination schema file (printed to stdout if omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ProfileArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Number of most frequent values listed per categorical or text column
    #[arg(long, default_value_t = 5)]
    pub top: usize,
    /// Emit the profile as JSON instead of tables
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct CleanArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Output CSV file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// YAML pipeline configuration; flags below override its sections
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
    /// Working columns (comma separated); defaults to every column
    #[arg(short = 'C', long = "columns", value_delimiter = ',')]
    pub columns: Vec<String>,
    /// Imputation strategy: mean, median, most_frequent, constant, knn, iterative
    #[arg(long)]
    pub impute: Option<String>,
    /// Fill value for the constant strategy
    #[arg(long = "fill-value")]
    pub fill_value: Option<String>,
    /// Remove duplicate rows
    #[arg(long)]
    pub dedupe: bool,
    /// Outlier method: zscore, iqr, quantile
    #[arg(long)]
    pub outliers: Option<String>,
    /// Threshold for the zscore and iqr outlier methods
    #[arg(long)]
    pub threshold: Option<f64>,
    /// Lower quantile kept by the quantile outlier method (default 0.05)
    #[arg(long = "lower-quantile")]
    pub lower_quantile: Option<f64>,
    /// Upper quantile kept by the quantile outlier method (default 0.95)
    #[arg(long = "upper-quantile")]
    pub upper_quantile: Option<f64>,
    /// Scaling method: standard, minmax, robust, maxabs
    #[arg(long)]
    pub scale: Option<String>,
    /// Encoding method: label, onehot, ordinal, binary
    #[arg(long)]
    pub encode: Option<String>,
    /// Write the stage history as JSON to this file
    #[arg(long)]
    pub history: Option<PathBuf>,
    /// Also write the cleaned table here and print its SHA-256 digest
    #[arg(long)]
    pub checkpoint: Option<PathBuf>,
    /// Record the checkpoint with DVC and commit it to git in this directory
    #[arg(long = "track", requires = "checkpoint")]
    pub track: Option<PathBuf>,
    /// Commit message used when tracking the checkpoint
    #[arg(long = "message", default_value = "Update cleaned dataset")]
    pub message: String,
    /// Push git history and DVC data after tracking
    #[arg(long, requires = "track")]
    pub push: bool,
    /// Delimiter to use for output (defaults to input delimiter)
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<u8>,
    /// Character encoding for the output file/stdout (defaults to utf-8)
    #[arg(long = "output-encoding")]
    pub output_encoding: Option<String>,
}

impl CleanArgs {
    /// Lays the command-line stage flags over `base`.
    pub fn apply_overrides(&self, mut base: PipelineConfig) -> PipelineConfig {
        if !self.columns.is_empty() {
            base.columns = self.columns.clone();
        }
        if let Some(strategy) = &self.impute {
            let spec = base.impute.get_or_insert_with(ImputeSpec::default);
            spec.strategy = strategy.clone();
        }
        if let Some(fill) = &self.fill_value {
            let spec = base.impute.get_or_insert_with(|| ImputeSpec {
                strategy: "constant".to_string(),
                ..ImputeSpec::default()
            });
            spec.fill_value = Some(FillLiteral::Text(fill.clone()));
        }
        if self.dedupe {
            base.dedupe = true;
        }
        if let Some(method) = &self.outliers {
            let spec = base.outliers.get_or_insert_with(OutlierSpec::default);
            spec.method = method.clone();
        }
        if let Some(spec) = base.outliers.as_mut() {
            if let Some(threshold) = self.threshold {
                spec.threshold = Some(threshold);
            }
            if let Some(lower) = self.lower_quantile {
                spec.lower_quantile = Some(lower);
            }
            if let Some(upper) = self.upper_quantile {
                spec.upper_quantile = Some(upper);
            }
        }
        if let Some(method) = &self.scale {
            base.scale.get_or_insert_with(ScaleSpec::default).method = method.clone();
        }
        if let Some(method) = &self.encode {
            base.encode.get_or_insert_with(EncodeSpec::default).method = method.clone();
        }
        base
    }
}

#[derive(Debug, Args)]
pub struct FilterArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Column filters such as `age=18..30`, `city in X|Y`, `name contains ann`
    #[arg(long = "filter", action = clap::ArgAction::Append, required = true)]
    pub filters: Vec<String>,
    /// Output CSV file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Print the first N matching rows as a table instead of writing CSV
    #[arg(long)]
    pub preview: Option<usize>,
    /// Delimiter to use for output (defaults to input delimiter)
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<u8>,
}

#[derive(Debug, Args)]
pub struct DriftArgs {
    /// Reference dataset
    #[arg(short = 'r', long = "reference")]
    pub reference: PathBuf,
    /// Current dataset compared against the reference
    #[arg(short = 'c', long = "current")]
    pub current: PathBuf,
    /// Schema applied to both datasets
    #[arg(short, long)]
    pub schema: Option<PathBuf>,
    /// Write the JSON drift report to this file
    #[arg(short = 'o', long = "report")]
    pub report: Option<PathBuf>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of both inputs (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Exit with an error status when dataset drift is detected
    #[arg(long)]
    pub fail_on_drift: bool,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    io_utils::parse_delimiter(value).map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean_args(args: &[&str]) -> CleanArgs {
        let mut argv = vec!["data-wrangler", "clean", "-i", "in.csv"];
        argv.extend_from_slice(args);
        match Cli::parse_from(argv).command {
            Commands::Clean(args) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn flags_override_config_sections() {
        let base = PipelineConfig::from_yaml_str(
            "impute:\n  strategy: mean\nscale:\n  method: standard\n",
        )
        .unwrap();
        let args = clean_args(&["--impute", "median", "--outliers", "iqr", "--threshold", "2"]);
        let merged = args.apply_overrides(base);
        assert_eq!(merged.impute.unwrap().strategy, "median");
        let outliers = merged.outliers.unwrap();
        assert_eq!(outliers.method, "iqr");
        assert_eq!(outliers.threshold, Some(2.0));
        assert_eq!(merged.scale.unwrap().method, "standard");
    }

    #[test]
    fn quantile_bounds_reach_the_outlier_stage() {
        let merged = clean_args(&["--outliers", "quantile", "--upper-quantile", "0.9"])
            .apply_overrides(PipelineConfig::default());
        let outliers = merged.outliers.as_ref().unwrap();
        assert_eq!(outliers.lower_quantile, None);
        assert_eq!(outliers.upper_quantile, Some(0.9));
        let config = merged.settings().outliers.unwrap().config.unwrap();
        assert_eq!(config.quantiles, Some((0.05, 0.9)));

        let merged = clean_args(&["--lower-quantile", "0.2"])
            .apply_overrides(PipelineConfig::default());
        assert!(merged.outliers.is_none());
    }

    #[test]
    fn fill_value_alone_implies_constant_imputation() {
        let merged = clean_args(&["--fill-value", "0", "--columns", "a,b"])
            .apply_overrides(PipelineConfig::default());
        let impute = merged.impute.unwrap();
        assert_eq!(impute.strategy, "constant");
        assert_eq!(impute.fill_value, Some(FillLiteral::Text("0".into())));
        assert_eq!(merged.columns, vec!["a", "b"]);
    }

    #[test]
    fn push_requires_tracking() {
        assert!(
            Cli::try_parse_from(["data-wrangler", "clean", "-i", "in.csv", "--push"]).is_err()
        );
    }
}
