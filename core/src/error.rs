use std::path::PathBuf;
use thiserror::Error;

/// Result type for dcmnii operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors raised while assembling a volume from a DICOM series
#[derive(Error, Debug)]
pub enum LoadError {
    /// Directory contains no readable DICOM files
    #[error("no readable DICOM files in {}", path.display())]
    NoDicomFiles { path: PathBuf },

    /// Slices in the series do not share in-plane dimensions
    #[error("inconsistent slice dimensions: expected {expected_rows}x{expected_cols}, found {found_rows}x{found_cols}")]
    InconsistentDimensions {
        expected_rows: usize,
        expected_cols: usize,
        found_rows: usize,
        found_cols: usize,
    },

    /// Slice spacing cannot be determined from the available metadata
    #[error("cannot determine slice spacing: {0}")]
    MissingSpacing(String),

    /// Pixel data could not be decoded
    #[error("failed to decode pixel data: {0}")]
    PixelData(String),

    /// DICOM reading error
    #[error("DICOM error: {0}")]
    Dicom(String),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// Convert dicom-object errors
impl From<dicom_object::ReadError> for LoadError {
    fn from(e: dicom_object::ReadError) -> Self {
        LoadError::Dicom(format!("{}", e))
    }
}

impl From<dicom_core::value::ConvertValueError> for LoadError {
    fn from(e: dicom_core::value::ConvertValueError) -> Self {
        LoadError::Dicom(format!("{}", e))
    }
}

/// Invalid run configuration, detected before any study is processed.
///
/// Fatal for the whole run (exit code 2).
#[derive(Error, Debug)]
pub enum ConfigurationError {
    /// Malformed or non-positive spacing tuple
    #[error("invalid spacing '{value}': {reason}")]
    InvalidSpacing { value: String, reason: String },

    /// Malformed clip range
    #[error("invalid clip range '{value}': {reason}")]
    InvalidClipRange { value: String, reason: String },

    /// Invalid bias-correction smoothing sigma
    #[error("invalid bias sigma {value}: must be positive and finite")]
    InvalidBiasSigma { value: f32 },

    /// Input path is missing or not a directory
    #[error("input is not a directory: {}", path.display())]
    InputNotADirectory { path: PathBuf },
}

/// A numeric preprocessing step cannot produce a meaningful result
#[derive(Error, Debug)]
pub enum DegenerateInputError {
    /// Volume has zero intensity variance
    #[error("zero-variance volume: cannot z-score normalize")]
    ZeroVariance,

    /// All voxels carry the same intensity
    #[error("constant-intensity volume: cannot min-max normalize")]
    ConstantIntensity,

    /// Volume carries no positive signal to estimate a bias field from
    #[error("no positive signal: cannot estimate bias field")]
    NoSignal,
}

/// Errors raised while serializing a volume to NIfTI
#[derive(Error, Debug)]
pub enum WriteError {
    /// NIfTI serialization failed
    #[error("NIfTI serialization failed: {0}")]
    Nifti(String),

    /// Output path has no file name component
    #[error("output path has no file name: {}", path.display())]
    InvalidPath { path: PathBuf },

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<nifti::error::NiftiError> for WriteError {
    fn from(e: nifti::error::NiftiError) -> Self {
        WriteError::Nifti(format!("{}", e))
    }
}

/// Any error a single study can fail with
///
/// Configuration errors abort the whole run before any study is touched;
/// the other kinds are recorded per study without halting the batch.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("load error: {0}")]
    Load(#[from] LoadError),

    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("degenerate input: {0}")]
    DegenerateInput(#[from] DegenerateInputError),

    #[error("write error: {0}")]
    Write(#[from] WriteError),
}

impl PipelineError {
    /// Stable error-kind name used in run summaries
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Load(_) => "LoadError",
            PipelineError::Configuration(_) => "ConfigurationError",
            PipelineError::DegenerateInput(_) => "DegenerateInputError",
            PipelineError::Write(_) => "WriteError",
        }
    }
}
