use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

/// Options for [`CaptureEngine::export_mesh`](crate::engine::CaptureEngine::export_mesh).
///
/// The engine owns the file layout; these only describe where to write and how
/// much to simplify first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshExportOptions {
    pub destination: Utf8PathBuf,

    /// Fraction of faces to remove before writing (0.1 drops 10%)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimate: Option<f32>,

    /// Laplacian smoothing passes applied before writing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smoothing: Option<u32>,
}

impl MeshExportOptions {
    pub fn new(destination: impl Into<Utf8PathBuf>) -> Self {
        Self {
            destination: destination.into(),
            decimate: None,
            smoothing: None,
        }
    }

    /// Same options, written somewhere else.
    pub fn with_destination(&self, destination: impl Into<Utf8PathBuf>) -> Self {
        Self {
            destination: destination.into(),
            ..self.clone()
        }
    }
}

impl Default for MeshExportOptions {
    fn default() -> Self {
        Self {
            destination: Utf8PathBuf::from("/tmp/scan-station.ply"),
            decimate: Some(0.1),
            smoothing: Some(3),
        }
    }
}

/// Post-processing applied to a freshly generated mesh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshPostProcess {
    pub smoothing_iterations: u32,
    pub reverse_normals: bool,
    pub apply_viewport_edits: bool,
}

impl Default for MeshPostProcess {
    fn default() -> Self {
        Self {
            smoothing_iterations: 3,
            reverse_normals: true,
            apply_viewport_edits: true,
        }
    }
}
