use crate::error::WriteError;
use crate::volume::{Volume, VolumeData};

use nifti::writer::WriterOptions;
use nifti::NiftiHeader;
use std::fs;
use std::path::{Path, PathBuf};

/// Serializes volumes to NIfTI-1 files
///
/// Output is float32; gzip compression is selected by the `.nii.gz`
/// extension. Unsupported ranks cannot occur here: `VolumeData` only admits
/// rank 3 and 4.
pub struct NiftiWriter;

impl NiftiWriter {
    /// Writes the volume to `path`
    ///
    /// The file is first written to a hidden temp name in the destination
    /// directory and renamed into place, so a failed write never leaves a
    /// partial file under the final name.
    ///
    /// # Errors
    ///
    /// Returns `WriteError` when the destination is unwritable or NIfTI
    /// serialization fails.
    pub fn write(volume: &Volume, path: &Path) -> Result<(), WriteError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| WriteError::InvalidPath {
                path: path.to_path_buf(),
            })?;
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        // Keeps the real extension so compression is still inferred
        let tmp = dir.join(format!(".tmp-{}", file_name));

        let header = build_header(volume);
        let result = match volume.data() {
            VolumeData::D3(a) => WriterOptions::new(&tmp)
                .reference_header(&header)
                .write_nifti(a),
            VolumeData::D4(a) => WriterOptions::new(&tmp)
                .reference_header(&header)
                .write_nifti(a),
        };

        if let Err(e) = result {
            let _ = fs::remove_file(&tmp);
            return Err(WriteError::from(e));
        }

        if let Err(e) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(WriteError::Io(e));
        }
        Ok(())
    }
}

/// Header carrying the spatial metadata; dim/datatype are filled in by the
/// writer from the array itself
fn build_header(volume: &Volume) -> NiftiHeader {
    let s = volume.spacing();
    let o = volume.origin();
    let d = volume.direction();

    let mut pixdim = [1.0f32; 8];
    pixdim[1] = s[0];
    pixdim[2] = s[1];
    pixdim[3] = s[2];

    NiftiHeader {
        pixdim,
        srow_x: [d[0][0] * s[0], d[0][1] * s[1], d[0][2] * s[2], o[0]],
        srow_y: [d[1][0] * s[0], d[1][1] * s[1], d[1][2] * s[2], o[1]],
        srow_z: [d[2][0] * s[0], d[2][1] * s[1], d[2][2] * s[2], o[2]],
        sform_code: 1,
        scl_slope: 1.0,
        scl_inter: 0.0,
        ..Default::default()
    }
}
