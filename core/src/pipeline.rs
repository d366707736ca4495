use crate::error::PipelineError;
use crate::loader::{self, VolumeLoader};
use crate::preprocess::Transform;
use crate::study::Study;
use crate::volume::IntensityStats;
use crate::writer::NiftiWriter;

use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Immutable run configuration, resolved once at startup
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Input root: one DICOM series, or a directory of study directories
    pub input: PathBuf,
    /// Output directory receiving one NIfTI file per study
    pub output: PathBuf,
    /// Ordered preprocessing operations
    pub transforms: Vec<Transform>,
    /// Re-process studies whose output file already exists
    pub overwrite: bool,
}

/// Per-study progress through the pipeline
///
/// States only advance; `Done` is terminal, and a failure freezes the
/// outcome at the last state reached.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub enum StudyState {
    Pending,
    Loaded,
    Transformed(usize),
    Written,
    Done,
}

impl fmt::Display for StudyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StudyState::Pending => write!(f, "pending"),
            StudyState::Loaded => write!(f, "loaded"),
            StudyState::Transformed(n) => write!(f, "transformed({})", n),
            StudyState::Written => write!(f, "written"),
            StudyState::Done => write!(f, "done"),
        }
    }
}

/// One recorded study failure
#[derive(Debug)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct FailureRecord {
    /// Study identifier (path relative to the input root)
    pub study: String,
    /// Stable error-kind name
    pub kind: &'static str,
    /// Human-readable cause
    pub message: String,
    /// Last state reached before the failure
    pub reached: StudyState,
}

/// Intensity statistics aggregated over every successfully processed volume
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct GlobalStats {
    pub voxels: u64,
    pub mean: f64,
    pub std: f64,
}

/// Outcome of a whole batch run
#[derive(Debug)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub failures: Vec<FailureRecord>,
    pub global_stats: Option<GlobalStats>,
}

impl RunSummary {
    /// Process exit code: 0 when every attempted study succeeded, 1 otherwise
    pub fn exit_code(&self) -> i32 {
        if self.failed > 0 {
            1
        } else {
            0
        }
    }
}

/// Running sums for the global statistics (original pipeline's final step)
#[derive(Default)]
struct StatsAccumulator {
    voxels: u64,
    sum: f64,
    sum_sq: f64,
}

impl StatsAccumulator {
    fn add(&mut self, stats: &IntensityStats) {
        let n = stats.count as f64;
        self.voxels += stats.count as u64;
        self.sum += stats.mean * n;
        self.sum_sq += (stats.std * stats.std + stats.mean * stats.mean) * n;
    }

    fn finish(&self) -> Option<GlobalStats> {
        if self.voxels == 0 {
            return None;
        }
        let n = self.voxels as f64;
        let mean = self.sum / n;
        let variance = (self.sum_sq / n - mean * mean).max(0.0);
        Some(GlobalStats {
            voxels: self.voxels,
            mean,
            std: variance.sqrt(),
        })
    }
}

/// Sequential batch driver: Loader -> Transforms -> Writer per study
///
/// Best-effort semantics: a study failure is recorded and the batch
/// continues; only configuration errors (handled before construction) abort
/// the run.
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Runs the whole batch and returns the summary
    pub fn run(&self) -> RunSummary {
        let studies = discover_studies(&self.config.input);
        info!("Discovered {} studies under {}", studies.len(), self.config.input.display());

        if let Err(e) = fs::create_dir_all(&self.config.output) {
            warn!(
                "Could not create output directory {}: {}",
                self.config.output.display(),
                e
            );
        }

        let mut used_names: HashSet<String> = HashSet::new();
        let mut mapping: Vec<(String, PathBuf)> = Vec::new();
        let mut accumulator = StatsAccumulator::default();
        let mut summary = RunSummary {
            total: studies.len(),
            succeeded: 0,
            failed: 0,
            skipped: 0,
            failures: Vec::new(),
            global_stats: None,
        };

        for study in &studies {
            let tags = match VolumeLoader::peek_tags(&study.path) {
                Ok(tags) => tags,
                Err(e) => {
                    self.record_failure(&mut summary, study, StudyState::Pending, e.into());
                    continue;
                }
            };

            let stem = unique_name(tags.output_stem(&study.dir_name()), &mut used_names);
            let file_name = format!("{}.nii.gz", stem);
            let out_path = self.config.output.join(&file_name);

            if out_path.exists() && !self.config.overwrite {
                info!("Skipping {}: {} already exists", study.id, file_name);
                summary.skipped += 1;
                mapping.push((file_name, study.path.clone()));
                continue;
            }

            match self.process_study(study, &out_path) {
                Ok(stats) => {
                    info!("Finished {} -> {}", study.id, file_name);
                    summary.succeeded += 1;
                    accumulator.add(&stats);
                    mapping.push((file_name, study.path.clone()));
                }
                Err((reached, e)) => {
                    self.record_failure(&mut summary, study, reached, e);
                }
            }
        }

        if !mapping.is_empty() {
            if let Err(e) = self.write_mapping(&mapping) {
                warn!("Could not write name_mapping.csv: {}", e);
            }
        }

        summary.global_stats = accumulator.finish();
        summary
    }

    /// Processes one study through the full state machine
    fn process_study(
        &self,
        study: &Study,
        out_path: &Path,
    ) -> std::result::Result<IntensityStats, (StudyState, PipelineError)> {
        let loaded = VolumeLoader::load_from_directory(&study.path)
            .map_err(|e| (StudyState::Pending, PipelineError::from(e)))?;
        let mut state = StudyState::Loaded;
        debug!("Loaded {}: shape {:?}", study.id, loaded.volume.shape());

        let mut volume = loaded.volume;
        for (i, transform) in self.config.transforms.iter().enumerate() {
            volume = match transform.apply(volume) {
                Ok(v) => v,
                Err(e) => return Err((state, e)),
            };
            state = StudyState::Transformed(i + 1);
            debug!("Applied {} to {}", transform.name(), study.id);
        }

        let stats = volume.intensity_stats();
        if let Err(e) = NiftiWriter::write(&volume, out_path) {
            return Err((state, e.into()));
        }
        Ok(stats)
    }

    fn record_failure(
        &self,
        summary: &mut RunSummary,
        study: &Study,
        reached: StudyState,
        e: PipelineError,
    ) {
        error!("Study {} failed ({}): {}", study.id, e.kind(), e);
        summary.failed += 1;
        summary.failures.push(FailureRecord {
            study: study.id.clone(),
            kind: e.kind(),
            message: e.to_string(),
            reached,
        });
    }

    /// Writes the output-to-source mapping alongside the NIfTI files
    fn write_mapping(&self, rows: &[(String, PathBuf)]) -> Result<(), csv::Error> {
        let path = self.config.output.join("name_mapping.csv");
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(["output", "source"])?;
        for (name, source) in rows {
            let source = source.display().to_string();
            writer.write_record([name.as_str(), source.as_str()])?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Enumerates the studies under an input root
///
/// A root that directly contains DICOM files is a single study; otherwise
/// every descendant directory containing DICOM files becomes one. When
/// nothing is found the root itself is returned so the loader reports the
/// failure instead of the run silently succeeding.
pub fn discover_studies(input: &Path) -> Vec<Study> {
    let root_id = input
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "study".to_string());

    if loader::contains_dicom_files(input) {
        return vec![Study::new(input.to_path_buf(), root_id)];
    }

    let mut found = Vec::new();
    walk(input, input, &mut found);
    found.sort_by(|a, b| a.path.cmp(&b.path));

    if found.is_empty() {
        return vec![Study::new(input.to_path_buf(), root_id)];
    }
    found
}

fn walk(root: &Path, dir: &Path, found: &mut Vec<Study>) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Could not read {}: {}", dir.display(), e);
            return;
        }
    };

    let mut subdirs: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    subdirs.sort();

    for sub in subdirs {
        if loader::contains_dicom_files(&sub) {
            let id = sub
                .strip_prefix(root)
                .map(|p| p.to_string_lossy().to_string())
                .unwrap_or_else(|_| sub.display().to_string());
            found.push(Study::new(sub.clone(), id));
        }
        walk(root, &sub, found);
    }
}

/// Resolves name collisions with a deterministic numeric suffix
fn unique_name(stem: String, used: &mut HashSet<String>) -> String {
    if used.insert(stem.clone()) {
        return stem;
    }
    let mut i = 2;
    loop {
        let candidate = format!("{}-{}", stem, i);
        if used.insert(candidate.clone()) {
            return candidate;
        }
        i += 1;
    }
}
