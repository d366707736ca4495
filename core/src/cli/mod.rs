pub mod report;

use crate::error::ConfigurationError;
use crate::pipeline::PipelineConfig;
use crate::preprocess::{NormalizeMethod, Transform, DEFAULT_SIGMA_MM};

use clap::{Parser, ValueEnum};
use regex::Regex;
use std::path::PathBuf;
use std::sync::OnceLock;

/// Command-line arguments for dcmnii
#[derive(Parser, Debug)]
#[command(name = "dcmnii")]
#[command(about = "Convert DICOM studies to NIfTI with optional preprocessing")]
#[command(version)]
pub struct Cli {
    /// Input directory: one DICOM series, or a root of study directories
    #[arg(short, long, value_name = "DIR")]
    pub input: PathBuf,

    /// Output directory receiving one .nii.gz per study
    #[arg(short, long, value_name = "DIR")]
    pub output: PathBuf,

    /// Clamp intensities to the given range before other transforms,
    /// e.g. "-50,800" for a CT soft-tissue window
    #[arg(long, value_name = "MIN,MAX", allow_hyphen_values = true)]
    pub clip: Option<String>,

    /// Resample to the given voxel spacing in mm, e.g. "1,1,1"
    #[arg(long, value_name = "SX,SY,SZ")]
    pub resample: Option<String>,

    /// Correct low-frequency intensity bias
    #[arg(long)]
    pub bias_correct: bool,

    /// Smoothing scale of the bias-field estimate in mm
    #[arg(long, value_name = "MM", default_value_t = DEFAULT_SIGMA_MM)]
    pub bias_sigma: f32,

    /// Normalize intensities after all other transforms
    #[arg(long, value_name = "METHOD")]
    pub normalize: Option<NormalizeArg>,

    /// Treat volumes as label maps (nearest-neighbor resampling)
    #[arg(long)]
    pub label_mode: bool,

    /// Re-process studies whose output file already exists
    #[arg(long)]
    pub overwrite: bool,

    /// Output format for the run summary
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Normalization method options
#[derive(Debug, Clone, ValueEnum)]
pub enum NormalizeArg {
    /// Zero mean, unit standard deviation
    Zscore,
    /// Rescale observed intensities to [0, 1]
    Minmax,
}

impl From<NormalizeArg> for NormalizeMethod {
    fn from(arg: NormalizeArg) -> Self {
        match arg {
            NormalizeArg::Zscore => NormalizeMethod::ZScore,
            NormalizeArg::Minmax => NormalizeMethod::MinMax,
        }
    }
}

/// Summary output format options
#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format
    Text,
    /// JSON format
    Json,
}

impl Cli {
    /// Resolves the CLI flags into the immutable pipeline configuration
    ///
    /// Flags map onto the canonical transform order
    /// clip -> resample -> bias-correct -> normalize.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` for malformed tuples, non-positive
    /// spacing, or a missing input directory; nothing is processed in that
    /// case (exit code 2).
    pub fn into_config(self) -> Result<PipelineConfig, ConfigurationError> {
        if !self.input.is_dir() {
            return Err(ConfigurationError::InputNotADirectory { path: self.input });
        }

        let mut transforms = Vec::new();

        if let Some(clip) = &self.clip {
            let (min, max) = parse_clip_range(clip)?;
            transforms.push(Transform::Clip { min, max });
        }
        if let Some(resample) = &self.resample {
            transforms.push(Transform::Resample {
                target_spacing: parse_spacing(resample)?,
                label_mode: self.label_mode,
            });
        }
        if self.bias_correct {
            if self.bias_sigma <= 0.0 || !self.bias_sigma.is_finite() {
                return Err(ConfigurationError::InvalidBiasSigma {
                    value: self.bias_sigma,
                });
            }
            transforms.push(Transform::BiasCorrect {
                sigma_mm: self.bias_sigma,
            });
        }
        if let Some(method) = self.normalize {
            transforms.push(Transform::Normalize {
                method: method.into(),
            });
        }

        Ok(PipelineConfig {
            input: self.input,
            output: self.output,
            transforms,
            overwrite: self.overwrite,
        })
    }
}

fn number_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"[-+]?\d*\.?\d+(?:[eE][-+]?\d+)?").expect("Failed to compile regex")
    })
}

fn parse_numbers(s: &str) -> Vec<f32> {
    number_regex()
        .find_iter(s)
        .filter_map(|m| m.as_str().parse().ok())
        .collect()
}

/// Parses a "sx,sy,sz" spacing tuple; all components must be positive
pub fn parse_spacing(s: &str) -> Result<[f32; 3], ConfigurationError> {
    let numbers = parse_numbers(s);
    if numbers.len() != 3 {
        return Err(ConfigurationError::InvalidSpacing {
            value: s.to_string(),
            reason: format!("expected 3 components, found {}", numbers.len()),
        });
    }
    for &n in &numbers {
        if n <= 0.0 || !n.is_finite() {
            return Err(ConfigurationError::InvalidSpacing {
                value: s.to_string(),
                reason: format!("component {} is not positive", n),
            });
        }
    }
    Ok([numbers[0], numbers[1], numbers[2]])
}

/// Parses a "min,max" clip range; requires min < max
pub fn parse_clip_range(s: &str) -> Result<(f32, f32), ConfigurationError> {
    let numbers = parse_numbers(s);
    if numbers.len() != 2 {
        return Err(ConfigurationError::InvalidClipRange {
            value: s.to_string(),
            reason: format!("expected 2 components, found {}", numbers.len()),
        });
    }
    let (min, max) = (numbers[0], numbers[1]);
    if !min.is_finite() || !max.is_finite() || min >= max {
        return Err(ConfigurationError::InvalidClipRange {
            value: s.to_string(),
            reason: "min must be less than max".to_string(),
        });
    }
    Ok((min, max))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("1,1,1", [1.0, 1.0, 1.0])]
    #[case("0.5, 0.5, 2", [0.5, 0.5, 2.0])]
    #[case("1.5e0,1,2", [1.5, 1.0, 2.0])]
    fn test_parse_spacing_valid(#[case] input: &str, #[case] expected: [f32; 3]) {
        assert_eq!(parse_spacing(input).unwrap(), expected);
    }

    #[rstest]
    #[case("1,1")]
    #[case("1,1,1,1")]
    #[case("abc")]
    #[case("")]
    fn test_parse_spacing_malformed(#[case] input: &str) {
        assert!(matches!(
            parse_spacing(input),
            Err(ConfigurationError::InvalidSpacing { .. })
        ));
    }

    #[rstest]
    #[case("0,1,1")]
    #[case("1,-1,1")]
    fn test_parse_spacing_non_positive(#[case] input: &str) {
        assert!(matches!(
            parse_spacing(input),
            Err(ConfigurationError::InvalidSpacing { .. })
        ));
    }

    #[test]
    fn test_parse_clip_range() {
        assert_eq!(parse_clip_range("-50,800").unwrap(), (-50.0, 800.0));
        assert!(parse_clip_range("800,-50").is_err());
        assert!(parse_clip_range("1").is_err());
        assert!(parse_clip_range("5,5").is_err());
    }

    #[test]
    fn test_into_config_transform_order() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let cli = Cli::parse_from([
            "dcmnii",
            "--input",
            temp_dir.path().to_str().unwrap(),
            "--output",
            "/tmp/out",
            "--normalize",
            "zscore",
            "--resample",
            "1,1,1",
            "--clip",
            "-50,800",
            "--bias-correct",
        ]);

        let config = cli.into_config().unwrap();
        let names: Vec<&str> = config.transforms.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["clip", "resample", "bias-correct", "normalize"]);
    }

    #[test]
    fn test_into_config_missing_input() {
        let cli = Cli::parse_from([
            "dcmnii",
            "--input",
            "/definitely/not/a/real/path",
            "--output",
            "/tmp/out",
        ]);
        assert!(matches!(
            cli.into_config(),
            Err(ConfigurationError::InputNotADirectory { .. })
        ));
    }

    #[test]
    fn test_into_config_rejects_bad_spacing_before_processing() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let cli = Cli::parse_from([
            "dcmnii",
            "--input",
            temp_dir.path().to_str().unwrap(),
            "--output",
            "/tmp/out",
            "--resample",
            "1,0,1",
        ]);
        assert!(cli.into_config().is_err());
    }

    #[test]
    fn test_label_mode_selects_nearest_neighbor() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let cli = Cli::parse_from([
            "dcmnii",
            "--input",
            temp_dir.path().to_str().unwrap(),
            "--output",
            "/tmp/out",
            "--resample",
            "2,2,2",
            "--label-mode",
        ]);
        let config = cli.into_config().unwrap();
        assert_eq!(
            config.transforms,
            vec![Transform::Resample {
                target_spacing: [2.0, 2.0, 2.0],
                label_mode: true,
            }]
        );
    }
}
