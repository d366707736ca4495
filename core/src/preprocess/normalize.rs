use crate::error::DegenerateInputError;
use crate::volume::Volume;

/// Intensity normalization method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizeMethod {
    /// Subtract the mean and divide by the standard deviation
    ZScore,
    /// Rescale observed intensities to [0, 1]
    MinMax,
}

impl NormalizeMethod {
    pub fn name(self) -> &'static str {
        match self {
            NormalizeMethod::ZScore => "zscore",
            NormalizeMethod::MinMax => "minmax",
        }
    }
}

/// Rescales the volume's intensities
///
/// Statistics are computed over the whole volume in one pass.
///
/// # Errors
///
/// Returns `DegenerateInputError` when the volume has zero variance
/// (zscore) or constant intensity (minmax).
pub fn normalize(volume: Volume, method: NormalizeMethod) -> Result<Volume, DegenerateInputError> {
    let stats = volume.intensity_stats();

    match method {
        NormalizeMethod::ZScore => {
            if stats.std == 0.0 {
                return Err(DegenerateInputError::ZeroVariance);
            }
            let mean = stats.mean as f32;
            let std = stats.std as f32;
            Ok(volume.map_intensities(|v| (v - mean) / std))
        }
        NormalizeMethod::MinMax => {
            if stats.max == stats.min {
                return Err(DegenerateInputError::ConstantIntensity);
            }
            let min = stats.min;
            let range = stats.max - stats.min;
            Ok(volume.map_intensities(|v| (v - min) / range))
        }
    }
}
