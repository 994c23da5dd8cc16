//! Result materialization for completed tasks.
//!
//! Turns the output-file list of a `completed` status payload into a
//! [`ResultRecord`]: the consolidated transcript first, then the per-segment
//! parts in the order the backend listed them.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::status::{lenient_number, StatusPayload};

/// Substring that marks the merged, full-length transcript.
pub const CONSOLIDATED_MARKER: &str = "_completo.txt";

/// Display name used when the payload carries no usable filename.
pub const PLACEHOLDER_NAME: &str = "Archivo procesado";

/// Segment count assumed when the payload does not report one.
pub const DEFAULT_SEGMENTS: u32 = 1;

static PART_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_parte(\d+)").expect("valid regex"));

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Role of one output file within a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "part", rename_all = "snake_case")]
pub enum OutputKind {
    /// The merged transcript covering every segment.
    Consolidated,
    /// A per-segment transcript, numbered when the filename says so.
    Part(Option<u32>),
}

/// A downloadable output file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputFile {
    pub filename: String,
    pub kind: OutputKind,
}

impl OutputFile {
    /// Button-style label for the file.
    pub fn label(&self) -> String {
        match self.kind {
            OutputKind::Consolidated => "Descargar Completo".to_string(),
            OutputKind::Part(Some(n)) => format!("Parte {n}"),
            OutputKind::Part(None) => "Descargar".to_string(),
        }
    }

    pub fn is_consolidated(&self) -> bool {
        self.kind == OutputKind::Consolidated
    }
}

/// Presentation record for a completed task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultRecord {
    pub original_file: String,
    pub num_segments: u32,
    /// Consolidated file first (if any), then parts in payload order.
    pub files: Vec<OutputFile>,
}

impl ResultRecord {
    pub fn consolidated(&self) -> Option<&OutputFile> {
        self.files.iter().find(|f| f.is_consolidated())
    }

    pub fn parts(&self) -> impl Iterator<Item = &OutputFile> {
        self.files.iter().filter(|f| !f.is_consolidated())
    }

    /// `"Dividido en N partes"` for split recordings, `None` otherwise.
    pub fn split_message(&self) -> Option<String> {
        (self.num_segments > 1).then(|| format!("Dividido en {} partes", self.num_segments))
    }
}

// ---------------------------------------------------------------------------
// Materialization
// ---------------------------------------------------------------------------

/// Build the result record for a completed payload.
pub fn materialize(payload: &StatusPayload) -> ResultRecord {
    let output_files = payload.output_files.as_deref().unwrap_or_default();
    ResultRecord {
        original_file: display_name(payload),
        num_segments: segment_count(payload),
        files: classify_outputs(output_files),
    }
}

/// Classify output filenames.
///
/// The first name containing [`CONSOLIDATED_MARKER`] is the consolidated
/// file and moves to the front. Every other name is a part; parts keep the
/// payload order.
pub fn classify_outputs(names: &[String]) -> Vec<OutputFile> {
    let consolidated_idx = names.iter().position(|n| n.contains(CONSOLIDATED_MARKER));

    let mut files = Vec::with_capacity(names.len());
    if let Some(idx) = consolidated_idx {
        files.push(OutputFile {
            filename: names[idx].clone(),
            kind: OutputKind::Consolidated,
        });
    }
    files.extend(
        names
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != consolidated_idx)
            .map(|(_, name)| OutputFile {
                filename: name.clone(),
                kind: OutputKind::Part(part_number(name)),
            }),
    );
    files
}

/// Extract the segment number from a `_parteN` marker.
pub fn part_number(filename: &str) -> Option<u32> {
    PART_RE
        .captures(filename)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Top-level `original_file`, then `result.original_file`, then
/// `filename`, then [`PLACEHOLDER_NAME`].
fn display_name(payload: &StatusPayload) -> String {
    let nested = payload.result.as_ref().and_then(|r| r.original_file.as_deref());
    [payload.original_file.as_deref(), nested, payload.filename.as_deref()]
        .into_iter()
        .flatten()
        .find(|name| !name.trim().is_empty())
        .unwrap_or(PLACEHOLDER_NAME)
        .to_string()
}

/// Top-level `num_segments`, then `result.num_segments`, then
/// [`DEFAULT_SEGMENTS`].
fn segment_count(payload: &StatusPayload) -> u32 {
    let nested = payload.result.as_ref().and_then(|r| r.num_segments.as_ref());
    lenient_number(payload.num_segments.as_ref())
        .or_else(|| lenient_number(nested))
        .map(|n| n.round().max(1.0).min(f64::from(u32::MAX)) as u32)
        .unwrap_or(DEFAULT_SEGMENTS)
}
