use crate::volume::Volume;

/// Clamps all intensities to `[min, max]`
///
/// The typical use is windowing CT volumes to a Hounsfield range before
/// resampling, so interpolation does not smear extreme outliers (metal
/// artifacts, air padding) into tissue.
pub fn clip(volume: Volume, min: f32, max: f32) -> Volume {
    volume.map_intensities(|v| v.clamp(min, max))
}
