pub mod meta;

use crate::error::LoadError;
use crate::study::StudyTags;
use crate::volume::{Volume, IDENTITY_DIRECTION};

use dicom::pixeldata::{ConvertOptions, ModalityLutOption, PixelDecoder};
use dicom_dictionary_std::tags;
use dicom_object::{open_file, DefaultDicomObject};
use log::warn;
use ndarray::{s, Array2, Array3, Ix3};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// A volume assembled from one DICOM series plus its identifying tags
#[derive(Debug)]
pub struct LoadedSeries {
    pub volume: Volume,
    pub tags: StudyTags,
}

/// One decoded slice with the metadata needed for ordering
struct SliceRecord {
    image: Array2<f32>,
    /// Position projected onto the slice normal, if known
    projection: Option<f64>,
    position: Option<[f64; 3]>,
    instance_number: Option<i32>,
}

/// Assembles DICOM slice files into a single ordered volume
pub struct VolumeLoader;

impl VolumeLoader {
    /// Loads a volume from a directory containing one DICOM series
    ///
    /// # Errors
    ///
    /// Returns `LoadError` if the directory has no readable DICOM files,
    /// slices disagree on in-plane dimensions, or slice spacing cannot be
    /// determined.
    pub fn load_from_directory(path: impl AsRef<Path>) -> Result<LoadedSeries, LoadError> {
        let path = path.as_ref();
        let paths = collect_dicom_files(path)?;
        if paths.is_empty() {
            return Err(LoadError::NoDicomFiles {
                path: path.to_path_buf(),
            });
        }

        let mut objects = Vec::with_capacity(paths.len());
        for file in &paths {
            match open_file(file) {
                Ok(obj) => objects.push(obj),
                Err(e) => warn!("Skipping unreadable file {}: {}", file.display(), e),
            }
        }
        if objects.is_empty() {
            return Err(LoadError::NoDicomFiles {
                path: path.to_path_buf(),
            });
        }

        Self::load_from_objects(&objects)
    }

    /// Assembles already-opened DICOM objects into a volume
    ///
    /// When the objects span multiple series, only the most frequent
    /// SeriesInstanceUID is kept.
    pub fn load_from_objects(objects: &[DefaultDicomObject]) -> Result<LoadedSeries, LoadError> {
        let series = dominant_series(objects);
        let tags = meta::study_tags(series[0]);

        // A single multi-frame object carries the whole stack itself
        if series.len() == 1 {
            let frames = decode_frames(series[0])?;
            if frames.shape()[0] > 1 {
                let spacing = derive_spacing(&series, &[])?;
                let direction = derive_direction(&series);
                let origin = meta::multi_f64_value(series[0], tags::IMAGE_POSITION_PATIENT)
                    .filter(|p| p.len() >= 3)
                    .map(|p| [p[0] as f32, p[1] as f32, p[2] as f32])
                    .unwrap_or([0.0, 0.0, 0.0]);

                // (frames, rows, cols) = (z, y, x) -> (x, y, z)
                let volume = Volume::from_array3(
                    frames.permuted_axes([2, 1, 0]).as_standard_layout().to_owned(),
                    spacing,
                    origin,
                    direction,
                );
                return Ok(LoadedSeries { volume, tags });
            }
        }

        let mut slices = Vec::with_capacity(series.len());
        for obj in &series {
            slices.push(extract_slice(obj)?);
        }

        sort_slices(&mut slices)?;
        validate_dimensions(&slices)?;

        let spacing = derive_spacing(&series, &slices)?;
        let direction = derive_direction(&series);
        let origin = slices[0]
            .position
            .map(|p| [p[0] as f32, p[1] as f32, p[2] as f32])
            .unwrap_or([0.0, 0.0, 0.0]);

        let volume = Volume::from_array3(stack_slices(&slices), spacing, origin, direction);
        Ok(LoadedSeries { volume, tags })
    }

    /// Reads the identifying tags of a study without assembling the volume
    ///
    /// Used to derive the output name before deciding whether the study can
    /// be skipped.
    pub fn peek_tags(path: impl AsRef<Path>) -> Result<StudyTags, LoadError> {
        let path = path.as_ref();
        let paths = collect_dicom_files(path)?;
        let first = paths.first().ok_or_else(|| LoadError::NoDicomFiles {
            path: path.to_path_buf(),
        })?;
        let obj = open_file(first)?;
        Ok(meta::study_tags(&obj))
    }
}

/// Collects DICOM files in a directory (non-recursive)
///
/// Accepts `.dcm`, `.dicom` and `.ima` extensions (case-insensitive); files
/// without an extension are sniffed for the DICM magic. The result is sorted
/// for deterministic processing order.
pub fn collect_dicom_files(directory: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in std::fs::read_dir(directory)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        match path.extension().and_then(|e| e.to_str()) {
            Some(ext)
                if ext.eq_ignore_ascii_case("dcm")
                    || ext.eq_ignore_ascii_case("dicom")
                    || ext.eq_ignore_ascii_case("ima") =>
            {
                files.push(path);
            }
            Some(_) => {}
            None => {
                if has_dicom_magic(&path) {
                    files.push(path);
                }
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Checks whether a directory directly contains DICOM files
pub fn contains_dicom_files(directory: &Path) -> bool {
    collect_dicom_files(directory)
        .map(|files| !files.is_empty())
        .unwrap_or(false)
}

/// Checks for the standard DICOM header: 128-byte preamble followed by "DICM"
fn has_dicom_magic(path: &Path) -> bool {
    use std::fs::File;
    use std::io::Read;

    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(_) => return false,
    };

    let mut buffer = [0u8; 132];
    match file.read(&mut buffer) {
        Ok(n) if n >= 132 => &buffer[128..132] == b"DICM",
        _ => false,
    }
}

/// Keeps only the objects of the most frequent SeriesInstanceUID
fn dominant_series(objects: &[DefaultDicomObject]) -> Vec<&DefaultDicomObject> {
    let mut counts: HashMap<Option<String>, usize> = HashMap::new();
    for obj in objects {
        let uid = meta::string_value(obj, tags::SERIES_INSTANCE_UID);
        *counts.entry(uid).or_insert(0) += 1;
    }

    if counts.len() <= 1 {
        return objects.iter().collect();
    }

    let dominant = counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
        .map(|(uid, _)| uid)
        .unwrap_or(None);

    let kept: Vec<&DefaultDicomObject> = objects
        .iter()
        .filter(|obj| meta::string_value(obj, tags::SERIES_INSTANCE_UID) == dominant)
        .collect();

    warn!(
        "Directory spans multiple series; keeping {} of {} files",
        kept.len(),
        objects.len()
    );
    kept
}

fn extract_slice(obj: &DefaultDicomObject) -> Result<SliceRecord, LoadError> {
    let image = decode_slice(obj)?;

    let position = meta::multi_f64_value(obj, tags::IMAGE_POSITION_PATIENT)
        .filter(|p| p.len() >= 3)
        .map(|p| [p[0], p[1], p[2]]);

    let normal = slice_normal(obj);
    let projection = position.map(|p| p[0] * normal[0] + p[1] * normal[1] + p[2] * normal[2]);

    Ok(SliceRecord {
        image,
        projection,
        position,
        instance_number: meta::int_value(obj, tags::INSTANCE_NUMBER),
    })
}

/// Decodes one slice to f32 with the modality LUT applied
fn decode_slice(obj: &DefaultDicomObject) -> Result<Array2<f32>, LoadError> {
    let frames = decode_frames(obj)?;
    Ok(frames.index_axis_move(ndarray::Axis(0), 0))
}

/// Decodes all frames of one object to (frames, rows, cols)
fn decode_frames(obj: &DefaultDicomObject) -> Result<Array3<f32>, LoadError> {
    let decoded = obj
        .decode_pixel_data()
        .map_err(|e| LoadError::PixelData(format!("{}", e)))?;

    let options = ConvertOptions::new().with_modality_lut(ModalityLutOption::Default);
    let pixels = decoded
        .to_ndarray_with_options::<f32>(&options)
        .map_err(|e| LoadError::PixelData(format!("{}", e)))?;

    // (frames, rows, cols, samples) -> first sample
    pixels
        .slice_move(s![.., .., .., 0])
        .into_dimensionality::<Ix3>()
        .map_err(|e| LoadError::PixelData(format!("{}", e)))
}

/// Row/column direction cosines and their normal, defaulting to axis-aligned
fn slice_geometry(obj: &DefaultDicomObject) -> ([f64; 3], [f64; 3], [f64; 3]) {
    if let Some(v) = meta::multi_f64_value(obj, tags::IMAGE_ORIENTATION_PATIENT) {
        if v.len() >= 6 {
            let row = [v[0], v[1], v[2]];
            let col = [v[3], v[4], v[5]];
            let normal = [
                row[1] * col[2] - row[2] * col[1],
                row[2] * col[0] - row[0] * col[2],
                row[0] * col[1] - row[1] * col[0],
            ];
            return (row, col, normal);
        }
    }
    ([1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0])
}

fn slice_normal(obj: &DefaultDicomObject) -> [f64; 3] {
    slice_geometry(obj).2
}

/// Orders slices by physical position along the slice normal
///
/// Falls back to InstanceNumber only when no slice carries a position; a
/// mix of positioned and unpositioned slices is rejected because the stack
/// order would be undefined.
fn sort_slices(slices: &mut [SliceRecord]) -> Result<(), LoadError> {
    let with_position = slices.iter().filter(|s| s.projection.is_some()).count();

    if with_position == slices.len() {
        slices.sort_by(|a, b| {
            a.projection
                .partial_cmp(&b.projection)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(())
    } else if with_position == 0 {
        slices.sort_by_key(|s| s.instance_number.unwrap_or(i32::MAX));
        Ok(())
    } else {
        Err(LoadError::MissingSpacing(format!(
            "{} of {} slices are missing ImagePositionPatient",
            slices.len() - with_position,
            slices.len()
        )))
    }
}

fn validate_dimensions(slices: &[SliceRecord]) -> Result<(), LoadError> {
    let (rows, cols) = slices[0].image.dim();
    for slice in slices {
        let (r, c) = slice.image.dim();
        if (r, c) != (rows, cols) {
            return Err(LoadError::InconsistentDimensions {
                expected_rows: rows,
                expected_cols: cols,
                found_rows: r,
                found_cols: c,
            });
        }
    }
    Ok(())
}

/// Derives voxel spacing: in-plane from PixelSpacing, slice step from the
/// median distance between adjacent sorted positions
fn derive_spacing(
    objects: &[&DefaultDicomObject],
    slices: &[SliceRecord],
) -> Result<[f32; 3], LoadError> {
    let in_plane = objects
        .iter()
        .find_map(|obj| {
            meta::multi_f64_value(obj, tags::PIXEL_SPACING).filter(|ps| ps.len() >= 2)
        })
        .ok_or_else(|| LoadError::MissingSpacing("missing PixelSpacing".to_string()))?;

    // PixelSpacing is (row spacing, column spacing) = (y, x)
    let sy = in_plane[0];
    let sx = in_plane[1];
    if sx <= 0.0 || sy <= 0.0 {
        return Err(LoadError::MissingSpacing(format!(
            "non-positive PixelSpacing {}\\{}",
            sy, sx
        )));
    }

    let sz = slice_step(objects, slices)?;
    Ok([sx as f32, sy as f32, sz as f32])
}

fn slice_step(
    objects: &[&DefaultDicomObject],
    slices: &[SliceRecord],
) -> Result<f64, LoadError> {
    if slices.len() >= 2 && slices.iter().all(|s| s.projection.is_some()) {
        let mut diffs: Vec<f64> = slices
            .windows(2)
            .filter_map(|w| match (w[0].projection, w[1].projection) {
                (Some(a), Some(b)) => Some(b - a),
                _ => None,
            })
            .collect();
        diffs.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let step = diffs[diffs.len() / 2];
        if step <= f64::EPSILON {
            return Err(LoadError::MissingSpacing(
                "duplicate slice positions".to_string(),
            ));
        }
        return Ok(step);
    }

    // Single slice, or no positions at all: fall back to explicit tags.
    let fallback = objects.iter().find_map(|obj| {
        meta::f64_value(obj, tags::SPACING_BETWEEN_SLICES)
            .or_else(|| meta::f64_value(obj, tags::SLICE_THICKNESS))
    });

    match fallback {
        Some(step) if step > 0.0 => Ok(step),
        Some(step) => Err(LoadError::MissingSpacing(format!(
            "non-positive slice thickness {}",
            step
        ))),
        None => Err(LoadError::MissingSpacing(
            "missing position and thickness metadata".to_string(),
        )),
    }
}

/// Direction-cosine matrix: columns are the x (row cosines), y (column
/// cosines) and z (normal) physical directions
fn derive_direction(objects: &[&DefaultDicomObject]) -> [[f32; 3]; 3] {
    let (row, col, normal) = slice_geometry(objects[0]);
    let mut direction = IDENTITY_DIRECTION;
    for i in 0..3 {
        direction[i][0] = row[i] as f32;
        direction[i][1] = col[i] as f32;
        direction[i][2] = normal[i] as f32;
    }
    direction
}

/// Stacks sorted (rows, cols) slices into an (x, y, z) volume
fn stack_slices(slices: &[SliceRecord]) -> Array3<f32> {
    let (rows, cols) = slices[0].image.dim();
    let depth = slices.len();

    let mut stacked = Array3::<f32>::zeros((depth, rows, cols));
    for (i, slice) in slices.iter().enumerate() {
        stacked.slice_mut(s![i, .., ..]).assign(&slice.image);
    }

    // (z, y, x) -> (x, y, z)
    stacked.permuted_axes([2, 1, 0]).as_standard_layout().to_owned()
}
