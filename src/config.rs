//! YAML pipeline configuration.
//!
//! ```yaml
//! columns: [age, city, income]
//! impute:
//!   strategy: knn
//!   neighbors: 3
//! dedupe: true
//! outliers:
//!   method: iqr
//!   threshold: 1.5
//!   columns: [income]
//! scale:
//!   method: minmax
//! encode:
//!   method: ordinal
//!   order:
//!     size: [S, M, L]
//! ```
//!
//! Method names stay plain strings until [`PipelineConfig::settings`] resolves
//! them, so a misspelt method disables only its own stage.

use std::{collections::HashMap, fmt, fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    encode::{EncodeConfig, EncodeMethod},
    error::ConfigError,
    impute::{CategoricalStrategy, ImputeConfig, ImputeStrategy},
    outliers::{DEFAULT_QUANTILES, OutlierConfig, OutlierMethod},
    pipeline::{StagePlan, StageSettings},
    scale::ScaleMethod,
};

/// Fill literal as written in YAML; numbers and booleans are accepted unquoted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FillLiteral {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for FillLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FillLiteral::Bool(b) => write!(f, "{b}"),
            FillLiteral::Integer(i) => write!(f, "{i}"),
            FillLiteral::Float(v) => write!(f, "{v}"),
            FillLiteral::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImputeSpec {
    pub strategy: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categorical_strategy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_value: Option<FillLiteral>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub neighbors: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_rounds: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tolerance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutlierSpec {
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lower_quantile: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upper_quantile: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScaleSpec {
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncodeSpec {
    pub method: String,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub order: HashMap<String, Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Working columns; empty selects every column.
    pub columns: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impute: Option<ImputeSpec>,
    pub dedupe: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outliers: Option<OutlierSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<ScaleSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encode: Option<EncodeSpec>,
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("Opening pipeline config {path:?}"))?;
        serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing pipeline config {path:?}"))
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Parsing pipeline config")
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Serializing pipeline config")
    }

    /// Resolves every stage section into engine configuration.
    pub fn settings(&self) -> StageSettings {
        StageSettings {
            impute: self.impute.as_ref().map(resolve_impute),
            dedupe: self.dedupe,
            outliers: self.outliers.as_ref().map(resolve_outliers),
            scale: self.scale.as_ref().map(|spec| {
                plan(spec.method.parse::<ScaleMethod>(), spec.columns.clone())
            }),
            encode: self.encode.as_ref().map(|spec| {
                let config = spec.method.parse::<EncodeMethod>().map(|method| EncodeConfig {
                    method,
                    order: spec.order.clone(),
                });
                plan(config, spec.columns.clone())
            }),
        }
    }
}

fn plan<C>(
    config: Result<C, ConfigError>,
    columns: Option<Vec<String>>,
) -> StagePlan<C> {
    let plan = match config {
        Ok(config) => StagePlan::new(config),
        Err(err) => StagePlan::invalid(err),
    };
    match columns {
        Some(columns) => plan.on_columns(columns),
        None => plan,
    }
}

fn resolve_impute(spec: &ImputeSpec) -> StagePlan<ImputeConfig> {
    let config = spec.strategy.parse::<ImputeStrategy>().and_then(|strategy| {
        let mut config = ImputeConfig::new(strategy);
        config.categorical_strategy = spec
            .categorical_strategy
            .as_deref()
            .map(str::parse::<CategoricalStrategy>)
            .transpose()?;
        config.fill_value = spec.fill_value.as_ref().map(FillLiteral::to_string);
        if let Some(neighbors) = spec.neighbors {
            config.neighbors = neighbors;
        }
        if let Some(max_rounds) = spec.max_rounds {
            config.max_rounds = max_rounds;
        }
        if let Some(tolerance) = spec.tolerance {
            config.tolerance = tolerance;
        }
        Ok(config)
    });
    plan(config, spec.columns.clone())
}

fn resolve_outliers(spec: &OutlierSpec) -> StagePlan<OutlierConfig> {
    let config = spec.method.parse::<OutlierMethod>().map(|method| {
        let mut config = OutlierConfig::new(method);
        config.threshold = spec.threshold;
        if spec.lower_quantile.is_some() || spec.upper_quantile.is_some() {
            let (lower, upper) = DEFAULT_QUANTILES;
            config.quantiles = Some((
                spec.lower_quantile.unwrap_or(lower),
                spec.upper_quantile.unwrap_or(upper),
            ));
        }
        config
    });
    plan(config, spec.columns.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_section() {
        let config = PipelineConfig::from_yaml_str(
            r#"
columns: [age, city]
impute:
  strategy: constant
  fill_value: 0
dedupe: true
outliers:
  method: quantile
  upper_quantile: 0.9
scale:
  method: robust
  columns: [age]
encode:
  method: ordinal
  order:
    city: [X, Y]
"#,
        )
        .unwrap();
        let settings = config.settings();
        let impute = settings.impute.unwrap().config.unwrap();
        assert_eq!(impute.strategy, ImputeStrategy::Constant);
        assert_eq!(impute.fill_value.as_deref(), Some("0"));
        assert!(settings.dedupe);
        let outliers = settings.outliers.unwrap().config.unwrap();
        assert_eq!(outliers.quantiles, Some((0.05, 0.9)));
        let scale = settings.scale.unwrap();
        assert_eq!(scale.columns, Some(vec!["age".to_string()]));
        assert_eq!(scale.config, Ok(ScaleMethod::Robust));
        let encode = settings.encode.unwrap().config.unwrap();
        assert_eq!(encode.order["city"], vec!["X", "Y"]);
    }

    #[test]
    fn unknown_method_only_invalidates_its_stage() {
        let config = PipelineConfig::from_yaml_str(
            "impute:\n  strategy: average\nscale:\n  method: minmax\n",
        )
        .unwrap();
        let settings = config.settings();
        assert!(matches!(
            settings.impute.unwrap().config,
            Err(ConfigError::UnsupportedMethod { .. })
        ));
        assert_eq!(settings.scale.unwrap().config, Ok(ScaleMethod::MinMax));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(PipelineConfig::from_yaml_str("dedup: true\n").is_err());
    }

    #[test]
    fn round_trips_through_yaml() {
        let config = PipelineConfig {
            dedupe: true,
            scale: Some(ScaleSpec {
                method: "standard".into(),
                columns: None,
            }),
            ..PipelineConfig::default()
        };
        let yaml = config.to_yaml_string().unwrap();
        assert_eq!(PipelineConfig::from_yaml_str(&yaml).unwrap(), config);
    }
}
