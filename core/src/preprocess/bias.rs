use crate::error::DegenerateInputError;
use crate::volume::{Volume, VolumeData};
use ndarray::{s, Array3, Array4, ArrayView3, Axis};

/// Default smoothing scale of the estimated bias field, in millimeters
pub const DEFAULT_SIGMA_MM: f32 = 20.0;

/// Number of box-filter passes approximating the Gaussian
const PASSES: usize = 3;

/// Field values below this fraction of the mean are left uncorrected
const MIN_FIELD: f32 = 1e-6;

/// Corrects low-frequency multiplicative intensity bias
///
/// Estimates the bias field by smoothing the volume itself with a separable
/// box-filter approximation of a Gaussian (sigma given in mm, converted to
/// voxels via the spacing), normalizes the field to unit mean, and divides it
/// out. Intended for magnitude-like images with a positive mean intensity;
/// deterministic for a given input and sigma.
///
/// # Errors
///
/// Returns `DegenerateInputError::NoSignal` when the volume's mean intensity
/// is not positive, since no meaningful field can be estimated.
pub fn correct(volume: Volume, sigma_mm: f32) -> Result<Volume, DegenerateInputError> {
    let spacing = volume.spacing();
    let sigma_vox = [
        (sigma_mm / spacing[0]) as f64,
        (sigma_mm / spacing[1]) as f64,
        (sigma_mm / spacing[2]) as f64,
    ];

    let data = match volume.data() {
        VolumeData::D3(a) => VolumeData::D3(correct3(&a.view(), sigma_vox)?),
        VolumeData::D4(a) => {
            let frames: Vec<Array3<f32>> = a
                .axis_iter(Axis(3))
                .map(|frame| correct3(&frame, sigma_vox))
                .collect::<Result<_, _>>()?;

            let (mx, my, mz) = frames[0].dim();
            let mut out = Array4::<f32>::zeros((mx, my, mz, frames.len()));
            for (t, frame) in frames.iter().enumerate() {
                out.slice_mut(s![.., .., .., t]).assign(frame);
            }
            VolumeData::D4(out)
        }
    };

    let origin = volume.origin();
    Ok(volume.with_grid(data, spacing, origin))
}

fn correct3(
    src: &ArrayView3<f32>,
    sigma_vox: [f64; 3],
) -> Result<Array3<f32>, DegenerateInputError> {
    let field = smooth(src, sigma_vox);

    let mean: f64 =
        field.iter().map(|&v| v as f64).sum::<f64>() / field.len().max(1) as f64;
    if mean <= f64::EPSILON {
        return Err(DegenerateInputError::NoSignal);
    }

    let mean = mean as f32;
    let mut out = src.to_owned();
    ndarray::Zip::from(&mut out).and(&field).for_each(|v, &f| {
        let relative = f / mean;
        if relative > MIN_FIELD {
            *v /= relative;
        }
    });
    Ok(out)
}

/// Separable Gaussian smoothing by repeated box filtering
fn smooth(src: &ArrayView3<f32>, sigma_vox: [f64; 3]) -> Array3<f32> {
    let widths = [
        box_sizes(sigma_vox[0], PASSES),
        box_sizes(sigma_vox[1], PASSES),
        box_sizes(sigma_vox[2], PASSES),
    ];

    let mut out = src.to_owned();
    for pass in 0..PASSES {
        for axis in 0..3 {
            let n = out.shape()[axis];
            let width = clamp_width(widths[axis][pass], n);
            if width < 3 {
                continue;
            }

            let mut buf = vec![0.0f64; n];
            for mut lane in out.lanes_mut(Axis(axis)) {
                for (b, v) in buf.iter_mut().zip(lane.iter()) {
                    *b = *v as f64;
                }
                box_filter_line(&mut buf, width);
                for (v, b) in lane.iter_mut().zip(buf.iter()) {
                    *v = *b as f32;
                }
            }
        }
    }
    out
}

/// Box widths whose repeated application approximates a Gaussian of the
/// given sigma (in voxels)
fn box_sizes(sigma: f64, passes: usize) -> Vec<usize> {
    if sigma <= 0.0 {
        return vec![0; passes];
    }

    let ideal = ((12.0 * sigma * sigma / passes as f64) + 1.0).sqrt();
    let mut lower = ideal as usize;
    if lower % 2 == 0 {
        lower = lower.saturating_sub(1);
    }
    let lower = lower.max(1);
    let upper = lower + 2;

    let (lf, p) = (lower as f64, passes as f64);
    let m_ideal =
        (12.0 * sigma * sigma - p * lf * lf - 4.0 * p * lf - 3.0 * p) / (-4.0 * lf - 4.0);
    let m = m_ideal.round().clamp(0.0, p) as usize;

    (0..passes).map(|i| if i < m { lower } else { upper }).collect()
}

/// Largest usable odd width not exceeding the lane length
fn clamp_width(width: usize, n: usize) -> usize {
    let mut w = width.min(n);
    if w % 2 == 0 {
        w = w.saturating_sub(1);
    }
    w
}

/// In-place sliding-window mean with shrinking windows at the edges
///
/// `width` must be odd; widths below 3 or longer than the line are no-ops
/// (handled by the caller via `clamp_width`).
fn box_filter_line(line: &mut [f64], width: usize) {
    let n = line.len();
    if width < 3 || width % 2 == 0 || n < width {
        return;
    }
    let r = width / 2;

    let src = line.to_vec();
    let mut sum: f64 = src[..r].iter().sum();

    // Window grows from the left edge
    for i in 0..=r {
        sum += src[i + r];
        line[i] = sum / (i + r + 1) as f64;
    }
    // Full window
    for i in (r + 1)..(n - r) {
        sum += src[i + r] - src[i - r - 1];
        line[i] = sum / width as f64;
    }
    // Window shrinks toward the right edge
    for i in (n - r)..n {
        sum -= src[i - r - 1];
        line[i] = sum / (n - i + r) as f64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::IDENTITY_DIRECTION;
    use ndarray::Array3;

    fn volume_from(data: Array3<f32>) -> Volume {
        Volume::from_array3(data, [1.0, 1.0, 1.0], [0.0, 0.0, 0.0], IDENTITY_DIRECTION)
    }

    fn coefficient_of_variation(volume: &Volume) -> f64 {
        let stats = volume.intensity_stats();
        stats.std / stats.mean
    }

    #[test]
    fn test_box_filter_uniform_line() {
        let mut line = vec![4.0; 12];
        box_filter_line(&mut line, 5);
        for &v in &line {
            assert!((v - 4.0).abs() < 1e-12, "uniform line changed to {}", v);
        }
    }

    #[test]
    fn test_box_filter_smooths_spike() {
        let mut line = vec![0.0; 11];
        line[5] = 10.0;
        box_filter_line(&mut line, 3);
        assert!(line[5] < 10.0);
        assert!(line[4] > 0.0 && line[6] > 0.0);
    }

    #[test]
    fn test_box_filter_short_line_untouched() {
        let mut line = vec![1.0, 2.0];
        let original = line.clone();
        box_filter_line(&mut line, 5);
        assert_eq!(line, original);
    }

    #[test]
    fn test_box_sizes_are_odd() {
        for sigma in [0.5, 2.0, 5.0, 20.0] {
            for w in box_sizes(sigma, 3) {
                assert_eq!(w % 2, 1, "width {} for sigma {} is even", w, sigma);
            }
        }
    }

    #[test]
    fn test_box_sizes_zero_sigma() {
        assert_eq!(box_sizes(0.0, 3), vec![0, 0, 0]);
    }

    #[test]
    fn test_correct_uniform_volume_unchanged() {
        let volume = volume_from(Array3::from_elem((8, 8, 8), 100.0));
        let corrected = correct(volume, 4.0).unwrap();
        for &v in corrected.data().iter() {
            assert!((v - 100.0).abs() < 1e-3, "uniform voxel became {}", v);
        }
    }

    #[test]
    fn test_correct_reduces_smooth_gradient() {
        // Multiplicative ramp along x, as a receive-field artifact would look
        let n = 16;
        let data =
            Array3::from_shape_fn((n, n, n), |(i, _, _)| 100.0 * (1.0 + 0.5 * i as f32 / n as f32));
        let volume = volume_from(data);

        let before = coefficient_of_variation(&volume);
        let corrected = correct(volume, 8.0).unwrap();
        let after = coefficient_of_variation(&corrected);

        assert!(
            after < before,
            "correction did not reduce variation: {} -> {}",
            before,
            after
        );
    }

    #[test]
    fn test_correct_zero_volume_fails() {
        let volume = volume_from(Array3::zeros((4, 4, 4)));
        let result = correct(volume, 4.0);
        assert!(matches!(result, Err(DegenerateInputError::NoSignal)));
    }

    #[test]
    fn test_correct_preserves_metadata() {
        let volume = Volume::from_array3(
            Array3::from_elem((4, 4, 4), 50.0),
            [1.0, 1.0, 2.5],
            [3.0, 2.0, 1.0],
            IDENTITY_DIRECTION,
        );
        let corrected = correct(volume, 10.0).unwrap();
        assert_eq!(corrected.spacing(), [1.0, 1.0, 2.5]);
        assert_eq!(corrected.origin(), [3.0, 2.0, 1.0]);
    }
}
