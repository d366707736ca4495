use crate::volume::{Volume, VolumeData};
use ndarray::{s, Array3, Array4, ArrayView3, Axis};

/// Resamples the volume onto a voxel grid at the target spacing
///
/// The new extent along each axis is `round(n * spacing / target)` (at least
/// one voxel) so the physical field of view is preserved. The grids share
/// their origin: voxel (0, 0, 0) stays at the same physical position, and the
/// output spacing is exactly the target.
///
/// Continuous intensities are interpolated trilinearly; `label_mode` switches
/// to nearest-neighbor so discrete label values survive.
///
/// Target spacing is validated at configuration time and must be positive.
pub fn resample(volume: Volume, target: [f32; 3], label_mode: bool) -> Volume {
    let spacing = volume.spacing();
    let origin = volume.origin();

    let data = match volume.data() {
        VolumeData::D3(a) => VolumeData::D3(resample3(&a.view(), spacing, target, label_mode)),
        VolumeData::D4(a) => {
            let frames: Vec<Array3<f32>> = a
                .axis_iter(Axis(3))
                .map(|frame| resample3(&frame, spacing, target, label_mode))
                .collect();

            let (mx, my, mz) = frames[0].dim();
            let mut out = Array4::<f32>::zeros((mx, my, mz, frames.len()));
            for (t, frame) in frames.iter().enumerate() {
                out.slice_mut(s![.., .., .., t]).assign(frame);
            }
            VolumeData::D4(out)
        }
    };

    volume.with_grid(data, target, origin)
}

fn resample3(
    src: &ArrayView3<f32>,
    spacing: [f32; 3],
    target: [f32; 3],
    label_mode: bool,
) -> Array3<f32> {
    let (nx, ny, nz) = src.dim();
    let new_extent =
        |n: usize, s: f32, t: f32| ((n as f32 * s / t).round() as usize).max(1);

    let mx = new_extent(nx, spacing[0], target[0]);
    let my = new_extent(ny, spacing[1], target[1]);
    let mz = new_extent(nz, spacing[2], target[2]);

    // Scale factors from output index to source index space
    let fx = target[0] / spacing[0];
    let fy = target[1] / spacing[1];
    let fz = target[2] / spacing[2];

    Array3::from_shape_fn((mx, my, mz), |(i, j, k)| {
        let x = (i as f32 * fx).clamp(0.0, (nx - 1) as f32);
        let y = (j as f32 * fy).clamp(0.0, (ny - 1) as f32);
        let z = (k as f32 * fz).clamp(0.0, (nz - 1) as f32);

        if label_mode {
            src[[
                x.round() as usize,
                y.round() as usize,
                z.round() as usize,
            ]]
        } else {
            trilinear(src, x, y, z)
        }
    })
}

#[inline]
fn trilinear(src: &ArrayView3<f32>, x: f32, y: f32, z: f32) -> f32 {
    let (nx, ny, nz) = src.dim();

    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let z0 = z.floor() as usize;
    let x1 = (x0 + 1).min(nx - 1);
    let y1 = (y0 + 1).min(ny - 1);
    let z1 = (z0 + 1).min(nz - 1);

    let dx = x - x0 as f32;
    let dy = y - y0 as f32;
    let dz = z - z0 as f32;

    // Interpolate along x on each of the four (y, z) edges, then collapse
    let c00 = src[[x0, y0, z0]].mul_add(1.0 - dx, src[[x1, y0, z0]] * dx);
    let c10 = src[[x0, y1, z0]].mul_add(1.0 - dx, src[[x1, y1, z0]] * dx);
    let c01 = src[[x0, y0, z1]].mul_add(1.0 - dx, src[[x1, y0, z1]] * dx);
    let c11 = src[[x0, y1, z1]].mul_add(1.0 - dx, src[[x1, y1, z1]] * dx);

    let c0 = c00.mul_add(1.0 - dy, c10 * dy);
    let c1 = c01.mul_add(1.0 - dy, c11 * dy);

    c0.mul_add(1.0 - dz, c1 * dz)
}
