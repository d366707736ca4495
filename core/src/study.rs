use regex::Regex;
use std::path::PathBuf;
use std::sync::OnceLock;

/// Identifying tags of a study, used only for output naming
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StudyTags {
    /// Patient ID (0010,0020)
    pub patient_id: Option<String>,
    /// Series Instance UID (0020,000E)
    pub series_uid: Option<String>,
    /// Series Description (0008,103E)
    pub series_description: Option<String>,
    /// Series Number (0020,0011)
    pub series_number: Option<i32>,
}

impl StudyTags {
    /// Derives a deterministic output file stem from the identifying tags
    ///
    /// Prefers PatientID plus series description (or number); falls back to
    /// the given name (typically the study directory name) when no tags are
    /// present. The result is always sanitized.
    pub fn output_stem(&self, fallback: &str) -> String {
        let mut parts: Vec<String> = Vec::new();

        if let Some(id) = &self.patient_id {
            let clean = sanitize_component(id);
            if !clean.is_empty() {
                parts.push(clean);
            }
        }
        if let Some(desc) = &self.series_description {
            let clean = sanitize_component(desc);
            if !clean.is_empty() {
                parts.push(clean);
            }
        } else if let Some(num) = self.series_number {
            parts.push(format!("series{}", num));
        }

        if parts.is_empty() {
            sanitize_name(fallback)
        } else {
            parts.join("_")
        }
    }
}

/// One input study: a source directory plus its identifying tags
#[derive(Debug, Clone)]
pub struct Study {
    /// Directory holding the study's DICOM files
    pub path: PathBuf,
    /// Short identifier used in logs and reports (path relative to the input
    /// root when possible)
    pub id: String,
}

impl Study {
    pub fn new(path: PathBuf, id: String) -> Self {
        Self { path, id }
    }

    /// Fallback name component: the study directory's own name
    pub fn dir_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "study".to_string())
    }
}

fn disallowed() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("Failed to compile regex"))
}

fn sanitize_component(name: &str) -> String {
    disallowed()
        .replace_all(name, "_")
        .trim_matches(|c: char| matches!(c, '-' | '_' | ' ' | '.'))
        .to_string()
}

/// Strips path-hostile and non-ASCII characters from a name component
///
/// Mirrors the cleanup applied to patient-supplied names before they become
/// file names; an empty result maps to "study".
pub fn sanitize_name(name: &str) -> String {
    let clean = sanitize_component(name);
    if clean.is_empty() {
        "study".to_string()
    } else {
        clean
    }
}
