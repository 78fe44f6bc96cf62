//! Run artifacts: confusion-matrix images and serialized models
//!
//! Every training run renders into its own [`ArtifactScratch`] directory.
//! Rendered files are [`TempArtifact`] guards: the file is removed when the
//! guard drops, whether or not the tracker accepted the upload.

use crate::metrics::ConfusionMatrix;
use crate::{Error, Result};
use ndarray::Array1;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const CELL: u32 = 120;
const MARGIN: u32 = 90;

/// A rendered file owned by one run; deleted on drop
#[derive(Debug)]
pub struct TempArtifact {
    path: PathBuf,
}

impl TempArtifact {
    /// Location of the rendered file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name component, used as the tracker artifact key
    #[must_use]
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove temporary artifact");
            }
        }
    }
}

/// Per-run scratch namespace for rendered artifacts
#[derive(Debug)]
pub struct ArtifactScratch {
    dir: TempDir,
}

impl ArtifactScratch {
    /// Create a fresh scratch directory under the system temp dir.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the directory cannot be created.
    pub fn new() -> Result<Self> {
        Ok(Self {
            dir: tempfile::Builder::new().prefix("lifestyle-risk-").tempdir()?,
        })
    }

    /// Scratch directory path
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    fn write(&self, file_name: &str, contents: &[u8]) -> Result<TempArtifact> {
        let path = self.dir.path().join(file_name);
        fs::write(&path, contents)?;
        Ok(TempArtifact { path })
    }

    /// Compute the confusion matrix and render it to
    /// `confusion_matrix_{model_name}.svg`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Data`] for mismatched or non-binary labels and
    /// [`Error::Io`] if the file cannot be written.
    pub fn render_confusion_matrix(
        &self,
        y_true: &Array1<f64>,
        y_pred: &Array1<f64>,
        model_name: &str,
    ) -> Result<(ConfusionMatrix, TempArtifact)> {
        let cm = ConfusionMatrix::from_labels(y_true, y_pred)?;
        if cm.total() != y_true.len() {
            return Err(Error::Data(format!(
                "confusion matrix holds {} cells for {} labels",
                cm.total(),
                y_true.len()
            )));
        }
        let svg = confusion_matrix_svg(&cm, model_name);
        let artifact = self.write(&confusion_matrix_file_name(model_name), svg.as_bytes())?;
        Ok((cm, artifact))
    }

    /// Write a fitted model's JSON state to `model_{model_name}.json`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] or [`Error::Io`] on failure.
    pub fn write_model(&self, model_name: &str, state: &Value) -> Result<TempArtifact> {
        let bytes = serde_json::to_vec_pretty(state)?;
        self.write(&format!("model_{}.json", file_stem(model_name)), &bytes)
    }
}

/// Deterministic image file name for a model's confusion matrix
#[must_use]
pub fn confusion_matrix_file_name(model_name: &str) -> String {
    format!("confusion_matrix_{}.svg", file_stem(model_name))
}

fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Render a 2×2 confusion matrix as a standalone SVG heatmap.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn confusion_matrix_svg(cm: &ConfusionMatrix, model_name: &str) -> String {
    let width = MARGIN + 2 * CELL + 20;
    let height = MARGIN + 2 * CELL + 40;
    let rows = cm.as_rows();
    let max = rows.iter().flatten().copied().max().unwrap_or(0).max(1) as f64;

    let mut body = String::new();
    body.push_str(&format!(
        "<text x=\"{}\" y=\"24\" text-anchor=\"middle\" font-size=\"16\">Confusion Matrix - {}</text>",
        width / 2,
        escape(model_name)
    ));
    for (i, row) in rows.iter().enumerate() {
        for (j, &count) in row.iter().enumerate() {
            let x = MARGIN + j as u32 * CELL;
            let y = MARGIN + i as u32 * CELL;
            // White to blue by count
            let shade = 255 - (count as f64 / max * 200.0).round() as u32;
            let ink = if shade < 150 { "white" } else { "black" };
            body.push_str(&format!(
                "<rect x=\"{x}\" y=\"{y}\" width=\"{CELL}\" height=\"{CELL}\" fill=\"rgb({shade},{shade},255)\" stroke=\"black\" />\
                 <text x=\"{}\" y=\"{}\" text-anchor=\"middle\" font-size=\"20\" fill=\"{ink}\">{count}</text>",
                x + CELL / 2,
                y + CELL / 2 + 7
            ));
        }
    }
    for (k, label) in ["0", "1"].iter().enumerate() {
        let offset = k as u32 * CELL + CELL / 2;
        body.push_str(&format!(
            "<text x=\"{}\" y=\"{}\" text-anchor=\"middle\" font-size=\"14\">{label}</text>\
             <text x=\"{}\" y=\"{}\" text-anchor=\"middle\" font-size=\"14\">{label}</text>",
            MARGIN + offset,
            MARGIN - 10,
            MARGIN - 20,
            MARGIN + offset + 5
        ));
    }
    body.push_str(&format!(
        "<text x=\"{}\" y=\"{}\" text-anchor=\"middle\" font-size=\"14\">Predicted</text>\
         <text x=\"20\" y=\"{}\" text-anchor=\"middle\" font-size=\"14\" transform=\"rotate(-90 20 {})\">Actual</text>",
        MARGIN + CELL,
        MARGIN - 40,
        MARGIN + CELL,
        MARGIN + CELL
    ));

    format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\">{body}</svg>"
    )
}
