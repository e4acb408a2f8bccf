use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Job status lifecycle: Pending -> Processing -> Completed/Failed
///
/// `Completed` and `Failed` are terminal; nothing transitions out of them.
/// A user "reset" discards the whole job value rather than transitioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "processing" => Some(JobStatus::Processing),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    /// True for `Completed` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Snapshot of a backend job, replaced wholesale on every status poll.
///
/// The backend is the sole source of truth; the client never mutates a
/// snapshot in place. Every field beyond `id` and `status` is optional on
/// the wire so older backend versions still parse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSnapshot {
    #[serde(alias = "job_id")]
    pub id: String,
    pub status: JobStatus,
    /// Percent complete, 0-100. Meaningful only while `processing`.
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Present only when `status` is `failed`.
    #[serde(default)]
    pub error_message: Option<String>,
    /// Output artifact name reported by the backend once rendering is done.
    #[serde(default)]
    pub output_file: Option<String>,
}

impl JobSnapshot {
    /// Synthesize the local placeholder held between job creation and the
    /// first poll response.
    pub fn pending(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: JobStatus::Pending,
            progress: 0,
            created_at: Some(Utc::now()),
            completed_at: None,
            error_message: None,
            output_file: None,
        }
    }

    /// True only when the job completed and the backend reported an
    /// artifact name.
    pub fn output_available(&self) -> bool {
        self.status == JobStatus::Completed && self.output_file.is_some()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Response body of `POST /api/collage/create`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateResponse {
    pub job_id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Downloaded collage artifact plus a suggested filename.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub bytes: Vec<u8>,
    /// Derived from the job id and the configured output encoding.
    pub filename: String,
}

/// Outcome of watching a job until it leaves the poll loop.
#[derive(Debug, Clone)]
pub enum PollOutcome {
    /// The job reached `completed`; the artifact can be downloaded.
    Completed { snapshot: JobSnapshot },
    /// The backend reported `failed`; `error_message` carries the reason.
    Failed { snapshot: JobSnapshot },
    /// The cancel flag was set before a terminal state was observed.
    Cancelled,
    /// The configured overall timeout elapsed first.
    TimedOut,
}

impl PollOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, PollOutcome::Completed { .. })
    }
}

// ── Grid optimization (pass-through payloads) ───────────────────────

/// Shape of the grid the current image count would produce.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentGrid {
    pub columns: u32,
    pub rows: u32,
    #[serde(alias = "total")]
    pub total_images: u32,
    /// True when the final row is fully filled.
    pub is_perfect: bool,
}

/// Direction of a perfect-grid suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridAction {
    AddImages,
    RemoveImages,
}

/// One perfect-grid alternative reachable by adding or removing images.
///
/// Rendered verbatim; the client performs no arithmetic over these numbers
/// beyond the apply-action guardrails in [`crate::advisor`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridOption {
    #[serde(rename = "type")]
    pub action: GridAction,
    pub columns: u32,
    pub rows: u32,
    /// Image count after applying this option.
    pub total_images: u32,
    #[serde(default)]
    pub images_needed: Option<u32>,
    #[serde(default)]
    pub images_to_remove: Option<u32>,
}

impl GridOption {
    /// The number of images this option adds or removes.
    pub fn delta(&self) -> u32 {
        match self.action {
            GridAction::AddImages => self.images_needed.unwrap_or(0),
            GridAction::RemoveImages => self.images_to_remove.unwrap_or(0),
        }
    }
}

/// Pixel dimensions the backend derived from the canvas parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanvasInfo {
    pub width_px: u32,
    pub height_px: u32,
}

/// Response body of `POST /api/collage/optimize-grid`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridOptimization {
    pub current_grid: CurrentGrid,
    /// Absent when the current count already forms a perfect grid.
    #[serde(default)]
    pub closest_perfect_grid: Option<GridOption>,
    #[serde(default)]
    pub alternative_options: Vec<GridOption>,
    #[serde(default)]
    pub canvas: Option<CanvasInfo>,
}

// ── Overlap analysis (pass-through payloads) ────────────────────────

/// One overlapping pair of placed images, by upload-set index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlapPair {
    pub image_a: usize,
    pub image_b: usize,
    #[serde(default)]
    pub overlap_percentage: f64,
}

/// An image the backend suggests dropping to resolve overlaps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestedRemoval {
    pub index: usize,
    pub filename: String,
}

/// Response body of `POST /api/collage/analyze-overlaps`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlapAnalysis {
    pub has_overlaps: bool,
    #[serde(default)]
    pub overlap_count: u32,
    #[serde(default)]
    pub overlapping_pairs: Vec<OverlapPair>,
    #[serde(default)]
    pub recommendation: Option<String>,
    #[serde(default)]
    pub suggested_removals: Vec<SuggestedRemoval>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for s in ["pending", "processing", "completed", "failed"] {
            assert_eq!(JobStatus::parse(s).unwrap().as_str(), s);
        }
        assert!(JobStatus::parse("cancelled").is_none());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn test_snapshot_parses_minimal_body() {
        let snap: JobSnapshot = serde_json::from_str(
            r#"{"job_id": "abc-123", "status": "processing", "progress": 40}"#,
        )
        .unwrap();
        assert_eq!(snap.id, "abc-123");
        assert_eq!(snap.status, JobStatus::Processing);
        assert_eq!(snap.progress, 40);
        assert!(snap.created_at.is_none());
        assert!(!snap.output_available());
    }

    #[test]
    fn test_snapshot_output_available() {
        let snap: JobSnapshot = serde_json::from_str(
            r#"{"job_id": "abc", "status": "completed", "output_file": "x.jpg"}"#,
        )
        .unwrap();
        assert!(snap.output_available());

        let no_file: JobSnapshot =
            serde_json::from_str(r#"{"job_id": "abc", "status": "completed"}"#).unwrap();
        assert!(!no_file.output_available());
    }

    #[test]
    fn test_pending_placeholder() {
        let snap = JobSnapshot::pending("job-1");
        assert_eq!(snap.status, JobStatus::Pending);
        assert_eq!(snap.progress, 0);
        assert!(snap.created_at.is_some());
        assert!(!snap.is_terminal());
    }

    #[test]
    fn test_failed_snapshot_carries_message() {
        let snap: JobSnapshot = serde_json::from_str(
            r#"{"job_id": "j", "status": "failed", "error_message": "decode error"}"#,
        )
        .unwrap();
        assert!(snap.is_terminal());
        assert_eq!(snap.error_message.as_deref(), Some("decode error"));
    }

    #[test]
    fn test_parse_grid_optimization() {
        let opt: GridOptimization = serde_json::from_str(
            r#"{
            "current_grid": {"columns": 4, "rows": 3, "total": 10, "is_perfect": false},
            "closest_perfect_grid": {
                "type": "add_images", "columns": 3, "rows": 4,
                "total_images": 12, "images_needed": 2
            },
            "alternative_options": [
                {"type": "remove_images", "columns": 3, "rows": 3,
                 "total_images": 9, "images_to_remove": 1}
            ],
            "canvas": {"width_px": 3600, "height_px": 2400}
        }"#,
        )
        .unwrap();

        assert_eq!(opt.current_grid.total_images, 10);
        assert!(!opt.current_grid.is_perfect);

        let closest = opt.closest_perfect_grid.unwrap();
        assert_eq!(closest.action, GridAction::AddImages);
        assert_eq!(closest.total_images, 12);
        assert_eq!(closest.delta(), 2);

        assert_eq!(opt.alternative_options.len(), 1);
        assert_eq!(opt.alternative_options[0].delta(), 1);
        assert_eq!(opt.canvas.unwrap().width_px, 3600);
    }

    #[test]
    fn test_parse_perfect_grid_has_no_suggestion() {
        let opt: GridOptimization = serde_json::from_str(
            r#"{"current_grid": {"columns": 3, "rows": 4, "total": 12, "is_perfect": true}}"#,
        )
        .unwrap();
        assert!(opt.current_grid.is_perfect);
        assert!(opt.closest_perfect_grid.is_none());
        assert!(opt.alternative_options.is_empty());
    }

    #[test]
    fn test_parse_overlap_analysis() {
        let analysis: OverlapAnalysis = serde_json::from_str(
            r#"{
            "has_overlaps": true,
            "overlap_count": 2,
            "overlapping_pairs": [
                {"image_a": 0, "image_b": 3, "overlap_percentage": 41.5},
                {"image_a": 1, "image_b": 2, "overlap_percentage": 12.0}
            ],
            "recommendation": "Remove 1 image to reduce overlaps",
            "suggested_removals": [{"index": 3, "filename": "d.png"}]
        }"#,
        )
        .unwrap();

        assert!(analysis.has_overlaps);
        assert_eq!(analysis.overlap_count, 2);
        assert_eq!(analysis.overlapping_pairs[0].image_b, 3);
        assert_eq!(analysis.suggested_removals[0].filename, "d.png");
    }

    #[test]
    fn test_create_response_parses() {
        let resp: CreateResponse = serde_json::from_str(
            r#"{"job_id": "j-9", "status": "pending", "message": "Job created"}"#,
        )
        .unwrap();
        assert_eq!(resp.job_id, "j-9");
        assert_eq!(resp.status.as_deref(), Some("pending"));
    }
}
