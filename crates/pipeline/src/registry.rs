//! Process-wide job registry.
//!
//! The only structure shared across jobs. Holds, per job id: the stored
//! video path, the lifecycle record (`done`/`error`), the current run's
//! control flags and epoch, and the consumer half of the run's event
//! channel. Always passed around as an injected `Arc<JobRegistry>` so
//! call sites make the concurrent-access discipline visible.
//!
//! Each run of a job carries an epoch. A runner captures its epoch at
//! start; terminal writes with a stale epoch (a loop superseded by a
//! restart) are silently discarded, which resolves the
//! old-loop-vs-new-loop race without timing assumptions.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::RwLock;
use tokio::time::Instant;

use pyrowatch_core::error::CoreError;
use pyrowatch_core::types::JobId;
use pyrowatch_events::channel::{self, EventReceiver, EventSender, DEFAULT_CAPACITY};

/// How long a restart waits for the superseded loop to acknowledge its
/// stop before installing the new run anyway.
const RESTART_GRACE: Duration = Duration::from_millis(500);

/// Poll interval while waiting out the restart grace window.
const RESTART_POLL: Duration = Duration::from_millis(25);

// ---------------------------------------------------------------------------
// Flags and commands
// ---------------------------------------------------------------------------

/// Per-run control flags.
///
/// Written only by the control handler, read at the top of every loop
/// iteration. Atomics give the required cross-task visibility; a `stop`
/// is observed within one iteration (or one pause poll).
#[derive(Debug, Default)]
pub struct JobFlags {
    paused: AtomicBool,
    stop: AtomicBool,
}

impl JobFlags {
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    fn apply(&self, cmd: ControlCommand) {
        match cmd {
            ControlCommand::Pause => self.paused.store(true, Ordering::SeqCst),
            ControlCommand::Resume => self.paused.store(false, Ordering::SeqCst),
            ControlCommand::Stop => self.stop.store(true, Ordering::SeqCst),
        }
    }

    fn view(&self) -> FlagsView {
        FlagsView {
            paused: self.is_paused(),
            stop: self.stop_requested(),
        }
    }
}

/// Snapshot of the flags, returned to the control caller.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FlagsView {
    pub paused: bool,
    pub stop: bool,
}

/// A control command addressed to a running job. All three are idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Pause,
    Resume,
    Stop,
}

impl ControlCommand {
    /// Parse the wire command string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pause" => Some(ControlCommand::Pause),
            "resume" => Some(ControlCommand::Resume),
            "stop" => Some(ControlCommand::Stop),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// How a run ended.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// End of stream or explicit stop.
    Completed,
    /// Unrecoverable failure; the message ends up on the job record and in
    /// the terminal `error` event.
    Failed(String),
}

/// Everything a runner needs for one run of one job.
pub struct JobContext {
    pub job_id: JobId,
    /// The run's generation; terminal writes check it against the record.
    pub epoch: u64,
    pub video_path: PathBuf,
    pub flags: Arc<JobFlags>,
    pub sender: EventSender,
    /// Set by the runner on exit regardless of epoch; restart polls it to
    /// let the superseded loop wind down before installing new state.
    pub finished: Arc<AtomicBool>,
}

/// External view of a job's lifecycle record.
#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    pub job_id: JobId,
    pub done: bool,
    pub error: Option<String>,
}

struct JobEntry {
    video_path: PathBuf,
    done: bool,
    error: Option<String>,
    epoch: u64,
    /// `None` once the run has terminated: control commands then fail
    /// with not-found until a restart installs fresh flags.
    flags: Option<Arc<JobFlags>>,
    /// Consumer half of the current run's channel, handed out once.
    receiver: Option<EventReceiver>,
    run_finished: Arc<AtomicBool>,
    last_access: Instant,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Map of all known jobs. Lives behind an `Arc`, lock-guarded.
pub struct JobRegistry {
    jobs: RwLock<HashMap<JobId, JobEntry>>,
    /// Finished jobs idle longer than this are evicted by the sweeper.
    ttl: Duration,
}

impl JobRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Register a new job for a stored video and hand back the context
    /// for its first run.
    ///
    /// The caller picks the id so the stored file can be named after it
    /// before the job exists.
    pub async fn register(&self, job_id: JobId, video_path: PathBuf) -> JobContext {
        let (sender, receiver) = channel::channel(DEFAULT_CAPACITY);
        let flags = Arc::new(JobFlags::default());
        let finished = Arc::new(AtomicBool::new(false));

        let entry = JobEntry {
            video_path: video_path.clone(),
            done: false,
            error: None,
            epoch: 0,
            flags: Some(Arc::clone(&flags)),
            receiver: Some(receiver),
            run_finished: Arc::clone(&finished),
            last_access: Instant::now(),
        };
        self.jobs.write().await.insert(job_id, entry);

        tracing::info!(%job_id, path = %video_path.display(), "Job registered");

        JobContext {
            job_id,
            epoch: 0,
            video_path,
            flags,
            sender,
            finished,
        }
    }

    /// Apply a control command to the current run.
    ///
    /// Fails with not-found for an unknown job id and for a job whose run
    /// has terminated (its flags are released on completion).
    pub async fn control(&self, job_id: JobId, cmd: ControlCommand) -> Result<FlagsView, CoreError> {
        let mut jobs = self.jobs.write().await;
        let entry = jobs
            .get_mut(&job_id)
            .ok_or_else(|| CoreError::unknown_job(job_id))?;
        entry.last_access = Instant::now();

        let flags = entry
            .flags
            .as_ref()
            .ok_or_else(|| CoreError::unknown_job(job_id))?;
        flags.apply(cmd);
        tracing::info!(%job_id, ?cmd, "Control command applied");
        Ok(flags.view())
    }

    /// Begin a fresh run of an existing job: stop the old loop, wait out
    /// a bounded grace window for it to finish, then install fresh flags,
    /// channel, and a bumped epoch.
    ///
    /// The grace wait is best-effort; the epoch guard on terminal writes
    /// is what actually keeps a straggling old loop from corrupting the
    /// new run's record.
    pub async fn restart(&self, job_id: JobId) -> Result<JobContext, CoreError> {
        let old_finished = {
            let mut jobs = self.jobs.write().await;
            let entry = jobs
                .get_mut(&job_id)
                .ok_or_else(|| CoreError::unknown_job(job_id))?;
            entry.last_access = Instant::now();
            if let Some(flags) = &entry.flags {
                flags.apply(ControlCommand::Stop);
            }
            Arc::clone(&entry.run_finished)
        };

        // Let the old loop observe its stop flag and exit.
        let deadline = Instant::now() + RESTART_GRACE;
        while !old_finished.load(Ordering::SeqCst) && Instant::now() < deadline {
            tokio::time::sleep(RESTART_POLL).await;
        }

        let mut jobs = self.jobs.write().await;
        let entry = jobs
            .get_mut(&job_id)
            .ok_or_else(|| CoreError::unknown_job(job_id))?;

        let (sender, receiver) = channel::channel(DEFAULT_CAPACITY);
        let flags = Arc::new(JobFlags::default());
        let finished = Arc::new(AtomicBool::new(false));

        entry.epoch += 1;
        entry.done = false;
        entry.error = None;
        entry.flags = Some(Arc::clone(&flags));
        entry.receiver = Some(receiver);
        entry.run_finished = Arc::clone(&finished);
        entry.last_access = Instant::now();

        tracing::info!(%job_id, epoch = entry.epoch, "Job restarted");

        Ok(JobContext {
            job_id,
            epoch: entry.epoch,
            video_path: entry.video_path.clone(),
            flags,
            sender,
            finished,
        })
    }

    /// Hand out the consumer half of the current run's channel.
    ///
    /// Each run has exactly one stream consumer; a second subscription
    /// fails with a conflict until a restart installs a fresh channel.
    pub async fn take_receiver(&self, job_id: JobId) -> Result<EventReceiver, CoreError> {
        let mut jobs = self.jobs.write().await;
        let entry = jobs
            .get_mut(&job_id)
            .ok_or_else(|| CoreError::unknown_job(job_id))?;
        entry.last_access = Instant::now();
        entry
            .receiver
            .take()
            .ok_or_else(|| CoreError::Conflict("event stream already attached".to_string()))
    }

    /// Lifecycle view of a job.
    pub async fn status(&self, job_id: JobId) -> Result<JobStatus, CoreError> {
        let mut jobs = self.jobs.write().await;
        let entry = jobs
            .get_mut(&job_id)
            .ok_or_else(|| CoreError::unknown_job(job_id))?;
        entry.last_access = Instant::now();
        Ok(JobStatus {
            job_id,
            done: entry.done,
            error: entry.error.clone(),
        })
    }

    /// The stored video path for a job (used by restart-capable callers).
    pub async fn video_path(&self, job_id: JobId) -> Result<PathBuf, CoreError> {
        let jobs = self.jobs.read().await;
        jobs.get(&job_id)
            .map(|e| e.video_path.clone())
            .ok_or_else(|| CoreError::unknown_job(job_id))
    }

    /// Record a run's terminal outcome and release its control flags.
    ///
    /// A stale epoch (the run was superseded by a restart) is discarded.
    pub async fn finish(&self, job_id: JobId, epoch: u64, outcome: RunOutcome) {
        let mut jobs = self.jobs.write().await;
        let Some(entry) = jobs.get_mut(&job_id) else {
            tracing::debug!(%job_id, "Terminal write for an evicted job discarded");
            return;
        };
        if entry.epoch != epoch {
            tracing::debug!(
                %job_id,
                write_epoch = epoch,
                current_epoch = entry.epoch,
                "Stale terminal write discarded"
            );
            return;
        }

        match outcome {
            RunOutcome::Completed => {
                entry.done = true;
                tracing::info!(%job_id, "Job completed");
            }
            RunOutcome::Failed(message) => {
                tracing::error!(%job_id, error = %message, "Job failed");
                entry.error = Some(message);
            }
        }
        entry.flags = None;
        entry.last_access = Instant::now();
    }

    /// Number of jobs whose run is still live (flags not yet released).
    pub async fn active_jobs(&self) -> usize {
        self.jobs
            .read()
            .await
            .values()
            .filter(|e| e.flags.is_some())
            .count()
    }

    /// Evict finished jobs idle longer than the TTL. Returns how many
    /// were removed. Running jobs are never evicted.
    pub async fn sweep(&self) -> usize {
        let now = Instant::now();
        let ttl = self.ttl;
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|job_id, entry| {
            let keep = entry.flags.is_some() || now.duration_since(entry.last_access) < ttl;
            if !keep {
                tracing::info!(%job_id, "Evicting expired job");
            }
            keep
        });
        before - jobs.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn registry() -> JobRegistry {
        JobRegistry::new(Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn control_unknown_job_is_not_found() {
        let reg = registry();
        let err = reg
            .control(JobId::new_v4(), ControlCommand::Pause)
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::NotFound { .. });
    }

    #[tokio::test]
    async fn control_flags_round_trip() {
        let reg = registry();
        let job_id = JobId::new_v4();
        let ctx = reg.register(job_id, PathBuf::from("/tmp/a.mp4")).await;

        let view = reg.control(job_id, ControlCommand::Pause).await.unwrap();
        assert!(view.paused);
        assert!(ctx.flags.is_paused());

        let view = reg.control(job_id, ControlCommand::Resume).await.unwrap();
        assert!(!view.paused);

        let view = reg.control(job_id, ControlCommand::Stop).await.unwrap();
        assert!(view.stop);
        assert!(ctx.flags.stop_requested());
    }

    #[tokio::test]
    async fn finished_job_rejects_control() {
        let reg = registry();
        let job_id = JobId::new_v4();
        let ctx = reg.register(job_id, PathBuf::from("/tmp/a.mp4")).await;
        reg.finish(job_id, ctx.epoch, RunOutcome::Completed).await;

        let err = reg
            .control(job_id, ControlCommand::Pause)
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::NotFound { .. });

        let status = reg.status(job_id).await.unwrap();
        assert!(status.done);
        assert_eq!(status.error, None);
    }

    #[tokio::test]
    async fn stale_terminal_write_is_discarded() {
        let reg = registry();
        let job_id = JobId::new_v4();
        let old_ctx = reg.register(job_id, PathBuf::from("/tmp/a.mp4")).await;
        old_ctx.finished.store(true, Ordering::SeqCst);

        let new_ctx = reg.restart(job_id).await.unwrap();
        assert_eq!(new_ctx.epoch, old_ctx.epoch + 1);

        // The superseded loop reports failure; the record must not change.
        reg.finish(job_id, old_ctx.epoch, RunOutcome::Failed("stale".into()))
            .await;
        let status = reg.status(job_id).await.unwrap();
        assert!(!status.done);
        assert_eq!(status.error, None);

        // The current run's write lands.
        reg.finish(job_id, new_ctx.epoch, RunOutcome::Completed).await;
        assert!(reg.status(job_id).await.unwrap().done);
    }

    #[tokio::test]
    async fn restart_sets_stop_on_old_run() {
        let reg = registry();
        let job_id = JobId::new_v4();
        let old_ctx = reg.register(job_id, PathBuf::from("/tmp/a.mp4")).await;
        old_ctx.finished.store(true, Ordering::SeqCst);

        let _new_ctx = reg.restart(job_id).await.unwrap();
        assert!(old_ctx.flags.stop_requested());
    }

    #[tokio::test]
    async fn receiver_handed_out_once_per_run() {
        let reg = registry();
        let job_id = JobId::new_v4();
        let _ctx = reg.register(job_id, PathBuf::from("/tmp/a.mp4")).await;

        assert!(reg.take_receiver(job_id).await.is_ok());
        assert_matches!(
            reg.take_receiver(job_id).await.unwrap_err(),
            CoreError::Conflict(_)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_evicts_only_expired_finished_jobs() {
        let reg = JobRegistry::new(Duration::from_secs(60));
        let done_id = JobId::new_v4();
        let done_ctx = reg.register(done_id, PathBuf::from("/tmp/a.mp4")).await;
        let live_id = JobId::new_v4();
        let _live_ctx = reg.register(live_id, PathBuf::from("/tmp/b.mp4")).await;
        reg.finish(done_id, done_ctx.epoch, RunOutcome::Completed).await;

        // Not yet expired.
        assert_eq!(reg.sweep().await, 0);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(reg.sweep().await, 1);
        assert_matches!(
            reg.status(done_id).await.unwrap_err(),
            CoreError::NotFound { .. }
        );
        // The running job survives arbitrary idle time.
        assert!(reg.status(live_id).await.is_ok());
    }

    #[test]
    fn control_command_parse() {
        assert_eq!(ControlCommand::parse("pause"), Some(ControlCommand::Pause));
        assert_eq!(ControlCommand::parse("resume"), Some(ControlCommand::Resume));
        assert_eq!(ControlCommand::parse("stop"), Some(ControlCommand::Stop));
        assert_eq!(ControlCommand::parse("restart"), None);
        assert_eq!(ControlCommand::parse(""), None);
    }
}
