use ndarray::{Array3, Array4};

/// Identity direction-cosine matrix (axis-aligned volume)
pub const IDENTITY_DIRECTION: [[f32; 3]; 3] =
    [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

/// Voxel data of a volume, rank 3 `(x, y, z)` or rank 4 `(x, y, z, t)`
///
/// Keeping the two ranks as separate variants makes unsupported ranks
/// unrepresentable; every consumer matches exhaustively.
#[derive(Debug, Clone, PartialEq)]
pub enum VolumeData {
    D3(Array3<f32>),
    D4(Array4<f32>),
}

impl VolumeData {
    /// Array rank (3 or 4)
    pub fn rank(&self) -> usize {
        match self {
            VolumeData::D3(_) => 3,
            VolumeData::D4(_) => 4,
        }
    }

    /// Array shape
    pub fn shape(&self) -> &[usize] {
        match self {
            VolumeData::D3(a) => a.shape(),
            VolumeData::D4(a) => a.shape(),
        }
    }

    /// Total number of voxels
    pub fn len(&self) -> usize {
        match self {
            VolumeData::D3(a) => a.len(),
            VolumeData::D4(a) => a.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterator over all voxel intensities
    pub fn iter(&self) -> Box<dyn Iterator<Item = &f32> + '_> {
        match self {
            VolumeData::D3(a) => Box::new(a.iter()),
            VolumeData::D4(a) => Box::new(a.iter()),
        }
    }
}

/// Single-pass intensity statistics over a volume
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntensityStats {
    pub min: f32,
    pub max: f32,
    pub mean: f64,
    pub std: f64,
    pub count: usize,
}

/// A dense voxel volume with its spatial metadata
///
/// The array shape, `spacing`, `origin` and `direction` are kept consistent:
/// constructors take already-validated inputs, and every transform that
/// changes the grid updates the metadata in the same step.
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    data: VolumeData,
    /// Physical distance (mm) per voxel step along x/y/z
    spacing: [f32; 3],
    /// Physical position of voxel (0, 0, 0)
    origin: [f32; 3],
    /// Direction cosines; column j maps voxel axis j to physical axes
    direction: [[f32; 3]; 3],
}

impl Volume {
    /// Creates a rank-3 volume
    pub fn from_array3(
        data: Array3<f32>,
        spacing: [f32; 3],
        origin: [f32; 3],
        direction: [[f32; 3]; 3],
    ) -> Self {
        Self {
            data: VolumeData::D3(data),
            spacing,
            origin,
            direction,
        }
    }

    /// Creates a rank-4 volume (x, y, z, t)
    pub fn from_array4(
        data: Array4<f32>,
        spacing: [f32; 3],
        origin: [f32; 3],
        direction: [[f32; 3]; 3],
    ) -> Self {
        Self {
            data: VolumeData::D4(data),
            spacing,
            origin,
            direction,
        }
    }

    pub fn data(&self) -> &VolumeData {
        &self.data
    }

    pub fn rank(&self) -> usize {
        self.data.rank()
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn spacing(&self) -> [f32; 3] {
        self.spacing
    }

    pub fn origin(&self) -> [f32; 3] {
        self.origin
    }

    pub fn direction(&self) -> [[f32; 3]; 3] {
        self.direction
    }

    /// Returns a copy of this volume with the voxel grid replaced
    ///
    /// Used by resampling, which changes shape and spacing together.
    pub fn with_grid(&self, data: VolumeData, spacing: [f32; 3], origin: [f32; 3]) -> Self {
        Self {
            data,
            spacing,
            origin,
            direction: self.direction,
        }
    }

    /// Applies an elementwise intensity mapping, preserving all metadata
    pub fn map_intensities(mut self, f: impl Fn(f32) -> f32) -> Self {
        match &mut self.data {
            VolumeData::D3(a) => a.mapv_inplace(&f),
            VolumeData::D4(a) => a.mapv_inplace(&f),
        }
        self
    }

    /// Computes min/max/mean/std over all voxels in one pass
    ///
    /// Mean and standard deviation accumulate in f64; std is the population
    /// standard deviation.
    pub fn intensity_stats(&self) -> IntensityStats {
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        let mut sum = 0.0f64;
        let mut sum_sq = 0.0f64;
        let mut count = 0usize;

        for &v in self.data.iter() {
            min = min.min(v);
            max = max.max(v);
            let v = v as f64;
            sum += v;
            sum_sq += v * v;
            count += 1;
        }

        let mean = if count > 0 { sum / count as f64 } else { 0.0 };
        let variance = if count > 0 {
            (sum_sq / count as f64 - mean * mean).max(0.0)
        } else {
            0.0
        };

        IntensityStats {
            min,
            max,
            mean,
            std: variance.sqrt(),
            count,
        }
    }
}
