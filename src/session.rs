use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::client::CollageClient;
use crate::config::{CollageConfig, OutputFormat};
use crate::error::{CollageError, Result};
use crate::poller::PollConfig;
use crate::types::{Artifact, JobSnapshot, JobStatus, PollOutcome};
use crate::upload::{UploadLimits, UploadSet};

struct ActiveJob {
    snapshot: JobSnapshot,
    cancel: Arc<AtomicBool>,
    output_format: Option<OutputFormat>,
}

/// Session-scoped context owning the single active job and its poll loop.
///
/// There is at most one active job and one cancel flag per session, and
/// both live here rather than in ambient globals. Submitting a new job
/// sets the previous job's cancel flag first, so an old poll loop can
/// never resurrect stale updates; [`reset`](Self::reset) tears the whole
/// context down, revoking every staged preview exactly once.
///
/// # Example
/// ```no_run
/// use collage_client::{CollageClient, CollageConfig, CollageSession, UploadLimits};
///
/// # async fn example() -> collage_client::Result<()> {
/// let client = CollageClient::new("http://127.0.0.1:8000");
/// let mut session = CollageSession::new(client, UploadLimits::default());
///
/// session.uploads_mut().add_from_path("a.jpg")?;
/// session.uploads_mut().add_from_path("b.jpg")?;
///
/// session.submit(&CollageConfig::new()).await?;
/// let outcome = session.watch(|s| println!("{}%", s.progress)).await?;
/// if outcome.is_completed() {
///     let artifact = session.download().await?;
///     std::fs::write(&artifact.filename, &artifact.bytes).unwrap();
/// }
/// # Ok(())
/// # }
/// ```
pub struct CollageSession {
    client: CollageClient,
    uploads: UploadSet,
    poll_config: PollConfig,
    active: Option<ActiveJob>,
}

impl CollageSession {
    pub fn new(client: CollageClient, limits: UploadLimits) -> Self {
        Self {
            client,
            uploads: UploadSet::new(limits),
            poll_config: PollConfig::default(),
            active: None,
        }
    }

    /// Override the poll loop settings.
    pub fn with_poll_config(mut self, config: PollConfig) -> Self {
        self.poll_config = config;
        self
    }

    pub fn client(&self) -> &CollageClient {
        &self.client
    }

    pub fn uploads(&self) -> &UploadSet {
        &self.uploads
    }

    pub fn uploads_mut(&mut self) -> &mut UploadSet {
        &mut self.uploads
    }

    /// The latest snapshot of the active job, if any.
    pub fn active_job(&self) -> Option<&JobSnapshot> {
        self.active.as_ref().map(|job| &job.snapshot)
    }

    /// The active job's cancel flag, for wiring to UI controls.
    pub fn cancel_handle(&self) -> Option<Arc<AtomicBool>> {
        self.active.as_ref().map(|job| job.cancel.clone())
    }

    /// Submit the staged files with the given configuration.
    ///
    /// Any previous job's poll loop is cancelled before the new job
    /// becomes active. Returns the new job id. On failure the session is
    /// left exactly as it was, previous job included.
    pub async fn submit(&mut self, config: &CollageConfig) -> Result<String> {
        let snapshot = self.client.create_job(config, &self.uploads).await?;
        let id = snapshot.id.clone();
        self.invalidate_active();
        self.active = Some(ActiveJob {
            snapshot,
            cancel: Arc::new(AtomicBool::new(false)),
            output_format: config.output_format,
        });
        Ok(id)
    }

    /// Adopt an already-created backend job (e.g. found via
    /// [`CollageClient::list_jobs`]) as the session's active job.
    pub fn attach_job(&mut self, snapshot: JobSnapshot, output_format: Option<OutputFormat>) {
        self.invalidate_active();
        self.active = Some(ActiveJob {
            snapshot,
            cancel: Arc::new(AtomicBool::new(false)),
            output_format,
        });
    }

    /// Poll the active job until it reaches a terminal state, the session
    /// is cancelled, or the poll config's timeout elapses. The session's
    /// snapshot tracks every applied update.
    pub async fn watch<U>(&mut self, mut on_update: U) -> Result<PollOutcome>
    where
        U: FnMut(&JobSnapshot),
    {
        let (id, cancel) = match &self.active {
            Some(job) => (job.snapshot.id.clone(), job.cancel.clone()),
            None => return Err(CollageError::NoActiveJob),
        };

        let client = self.client.clone();
        let mut latest: Option<JobSnapshot> = None;
        let outcome = client
            .watch_job(&id, &self.poll_config, &cancel, |snapshot| {
                latest = Some(snapshot.clone());
                on_update(snapshot);
            })
            .await?;

        // Updates applied before cancellation are kept; after it, nothing
        // is written back.
        if !cancel.load(Ordering::Relaxed) {
            if let (Some(snapshot), Some(active)) = (latest, self.active.as_mut()) {
                if active.snapshot.id == snapshot.id {
                    active.snapshot = snapshot;
                }
            }
        }
        Ok(outcome)
    }

    /// Stop the active job's poll loop. The backend job keeps running;
    /// only the client-side watch stops.
    pub fn cancel(&self) {
        if let Some(job) = &self.active {
            job.cancel.store(true, Ordering::Relaxed);
        }
    }

    /// Download the active job's artifact. Refused until the job's latest
    /// snapshot reports `completed`.
    pub async fn download(&self) -> Result<Artifact> {
        let job = self.active.as_ref().ok_or(CollageError::NoActiveJob)?;
        if job.snapshot.status != JobStatus::Completed {
            return Err(CollageError::NotCompleted(job.snapshot.id.clone()));
        }
        self.client
            .download(&job.snapshot.id, job.output_format)
            .await
    }

    /// Tear the session down: cancel any poll loop, discard the job, and
    /// clear the upload set (revoking every preview exactly once).
    pub fn reset(&mut self) {
        self.invalidate_active();
        self.active = None;
        self.uploads.clear();
    }

    fn invalidate_active(&mut self) {
        if let Some(job) = &self.active {
            job.cancel.store(true, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> CollageSession {
        CollageSession::new(
            CollageClient::new("http://192.0.2.1:1"),
            UploadLimits::default(),
        )
    }

    fn snapshot(id: &str, status: JobStatus) -> JobSnapshot {
        JobSnapshot {
            id: id.to_string(),
            status,
            progress: 0,
            created_at: None,
            completed_at: None,
            error_message: None,
            output_file: None,
        }
    }

    #[tokio::test]
    async fn test_watch_without_job_is_refused() {
        let mut session = session();
        let err = session.watch(|_| {}).await.unwrap_err();
        assert!(matches!(err, CollageError::NoActiveJob));
    }

    #[tokio::test]
    async fn test_download_without_job_is_refused() {
        let session = session();
        let err = session.download().await.unwrap_err();
        assert!(matches!(err, CollageError::NoActiveJob));
    }

    #[tokio::test]
    async fn test_download_gated_on_completed() {
        let mut session = session();
        session.attach_job(snapshot("j-1", JobStatus::Processing), None);
        let err = session.download().await.unwrap_err();
        match err {
            CollageError::NotCompleted(id) => assert_eq!(id, "j-1"),
            other => panic!("Expected NotCompleted, got {:?}", other),
        }
    }

    #[test]
    fn test_attach_cancels_previous_job() {
        let mut session = session();
        session.attach_job(snapshot("old", JobStatus::Processing), None);
        let old_cancel = session.cancel_handle().unwrap();

        session.attach_job(snapshot("new", JobStatus::Pending), None);
        assert!(old_cancel.load(Ordering::Relaxed));
        // The new job starts with a fresh, unset flag
        assert!(!session.cancel_handle().unwrap().load(Ordering::Relaxed));
        assert_eq!(session.active_job().unwrap().id, "new");
    }

    #[test]
    fn test_cancel_flips_only_active_flag() {
        let mut session = session();
        assert!(session.cancel_handle().is_none());
        session.attach_job(snapshot("j", JobStatus::Pending), None);
        session.cancel();
        assert!(session.cancel_handle().unwrap().load(Ordering::Relaxed));
    }

    #[test]
    fn test_reset_discards_job_and_uploads() {
        let mut session = session();
        session
            .uploads_mut()
            .add("a.jpg", "image/jpeg", vec![1, 2])
            .unwrap();
        session.attach_job(snapshot("j", JobStatus::Processing), None);
        let cancel = session.cancel_handle().unwrap();

        session.reset();
        assert!(cancel.load(Ordering::Relaxed));
        assert!(session.active_job().is_none());
        assert!(session.uploads().is_empty());
    }
}
