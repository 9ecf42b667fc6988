//! Crawler coordinator - main run orchestration logic
//!
//! This module contains the batch loop that drives a run:
//! - Resolving the start pointer from the stored resume point
//! - Dispatching each batch to the worker pool and joining it
//! - Applying outcomes in visitation order and committing one transaction per batch
//! - Checking the storage cap, the circuit breaker and cancellation between batches

use crate::config::{Config, TransportErrorPolicy};
use crate::crawler::breaker::CircuitBreaker;
use crate::crawler::fetcher::{Fetcher, HttpFetcher};
use crate::crawler::outcome::{resolve, Outcome};
use crate::crawler::parser::{Classifier, HtmlClassifier};
use crate::crawler::scheduler::RangeScheduler;
use crate::output::progress::{render_line, ProgressReporter};
use crate::state::{CancelFlag, Direction, HaltReason, RunPhase, RunState};
use crate::storage::{SqliteStorage, Storage};
use crate::SweepError;
use futures::future::join_all;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Longest title fragment shown in per-identifier log lines
const LOG_TITLE_CHARS: usize = 45;

/// How a finished run went
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub run_id: i64,
    pub reason: HaltReason,
    pub live_count: u64,

    /// Pointer after the last committed batch
    pub final_pointer: i64,

    /// Failure streak when the run stopped
    pub streak: u32,

    pub elapsed: Duration,
}

/// What applying one batch did
#[derive(Debug, Default)]
struct BatchReport {
    /// Furthest identifier (in run direction) that was attempted and applied
    last_attempted: Option<i64>,

    /// The breaker tripped before every outcome was applied
    tripped: bool,
}

/// Workers of one batch that have been spawned but not joined
struct DispatchedBatch {
    stopped: Vec<Outcome>,
    workers: Vec<(i64, JoinHandle<Outcome>)>,
}

impl DispatchedBatch {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            stopped: Vec::new(),
            workers: Vec::with_capacity(capacity),
        }
    }

    /// Waits for every worker; a worker that panicked resolves to ERROR
    async fn join(self) -> Vec<Outcome> {
        let (ids, handles): (Vec<i64>, Vec<_>) = self.workers.into_iter().unzip();
        let mut outcomes = self.stopped;

        for (id, joined) in ids.into_iter().zip(join_all(handles).await) {
            outcomes.push(joined.unwrap_or_else(|e| Outcome::Error {
                id,
                message: format!("Worker failed: {}", e),
            }));
        }

        outcomes
    }
}

/// Start pointer for a run over a range beginning at `start`
///
/// Continues one step past the resume point, but never starts before the
/// configured start. Returns None when the resume point is the last
/// representable identifier, so nothing is left to visit.
pub fn resume_pointer(start: i64, resume: Option<i64>, direction: Direction) -> Option<i64> {
    match resume {
        None => Some(start),
        Some(point) => direction
            .checked_step(point)
            .map(|next| direction.furthest(next, start)),
    }
}

/// Main crawler coordinator structure
pub struct Coordinator {
    storage: SqliteStorage,
    fetcher: Arc<dyn Fetcher>,
    classifier: Arc<dyn Classifier>,
    scheduler: RangeScheduler,
    breaker: CircuitBreaker,
    progress: ProgressReporter,
    state: RunState,
    error_policy: TransportErrorPolicy,
    max_database_bytes: u64,
    config_hash: String,
    /// Set once the pointer cannot step past the last attempted identifier
    exhausted: bool,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `config_hash` - Hash of the configuration file, recorded with the run
    /// * `clean` - Whether to discard all persisted state before starting
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(SweepError)` - Failed to initialize
    pub fn new(config: &Config, config_hash: &str, clean: bool) -> Result<Self, SweepError> {
        let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
        let fetcher = Arc::new(HttpFetcher::from_config(&config.fetch)?);
        let classifier = Arc::new(HtmlClassifier::new()?);

        Self::from_parts(config, config_hash, storage, fetcher, classifier, clean)
    }

    /// Creates a coordinator around explicit collaborators
    pub fn from_parts(
        config: &Config,
        config_hash: &str,
        mut storage: SqliteStorage,
        fetcher: Arc<dyn Fetcher>,
        classifier: Arc<dyn Classifier>,
        clean: bool,
    ) -> Result<Self, SweepError> {
        if clean {
            tracing::info!("Discarding all persisted records, tombstones and runs");
            storage.clear_all()?;
        }

        let crawler = &config.crawler;
        let direction = config.direction();
        let resume = storage.resume_point(direction)?;
        let next = resume_pointer(crawler.start_id, resume, direction);
        let pointer = next.unwrap_or(crawler.end_id);

        match resume {
            Some(point) if next.is_none() => tracing::info!(
                "Resume point {} is the last identifier, nothing left to visit",
                point
            ),
            Some(point) => tracing::info!(
                "Resume point {} found, continuing at {} ({})",
                point,
                pointer,
                direction
            ),
            None => tracing::info!("Empty store, starting at {} ({})", pointer, direction),
        }

        let state = RunState::new(
            crawler.start_id,
            crawler.end_id,
            direction,
            pointer,
            CancelFlag::new(),
        );

        Ok(Self {
            storage,
            fetcher,
            classifier,
            scheduler: RangeScheduler::new(direction, crawler.end_id, crawler.workers as usize),
            breaker: CircuitBreaker::new(crawler.fail_limit),
            progress: ProgressReporter::new(),
            state,
            error_policy: crawler.transport_errors,
            max_database_bytes: config.output.max_database_bytes,
            config_hash: config_hash.to_string(),
            exhausted: next.is_none(),
        })
    }

    /// Shares `cancel` with this coordinator's run state
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.state = self.state.with_cancel_flag(cancel);
        self
    }

    /// Returns a handle that cancels the run at the next batch boundary
    pub fn cancel_flag(&self) -> CancelFlag {
        self.state.cancel_flag()
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn storage(&self) -> &SqliteStorage {
        &self.storage
    }

    /// Runs the main batch loop until a halt condition is reached
    ///
    /// Each iteration:
    /// 1. Halts with `StorageLimit` if the database exceeds the cap
    /// 2. Takes the next batch, halting with `RangeExhausted` if it is empty
    /// 3. Dispatches and joins the batch, then applies and commits it
    /// 4. Advances the pointer past the last attempted identifier
    /// 5. Halts with `CircuitOpen` or `Cancelled` if either was signalled
    pub async fn run(&mut self) -> Result<RunSummary, SweepError> {
        self.state.transition(RunPhase::Running)?;
        self.state.started_at = Instant::now();

        let run_id = self.storage.create_run(
            &self.config_hash,
            self.state.range_start,
            self.state.range_end,
        )?;

        tracing::info!(
            "Starting run {} at {} | Target: {} | Workers: {}",
            run_id,
            self.state.current_pointer,
            self.state.range_end,
            self.scheduler.batch_size()
        );

        let reason = loop {
            if self.storage_limit_reached()? {
                break HaltReason::StorageLimit;
            }

            if self.exhausted {
                break HaltReason::RangeExhausted;
            }

            let batch = self.scheduler.next_batch(self.state.current_pointer);
            if batch.is_empty() {
                break HaltReason::RangeExhausted;
            }

            let report = self.process_batch(&batch, self.error_policy).await?;

            if let Some(last) = report.last_attempted {
                match self.state.direction.checked_step(last) {
                    Some(next) => self.state.current_pointer = next,
                    None => {
                        self.state.current_pointer = last;
                        self.exhausted = true;
                    }
                }
            }
            self.report_progress(
                self.state.current_pointer,
                self.state.initial_pointer,
                self.scheduler.target(),
                self.state.range_end,
            );

            if report.tripped {
                break HaltReason::CircuitOpen;
            }

            if self.state.is_cancel_requested() {
                break HaltReason::Cancelled;
            }
        };

        self.finish(run_id, reason)
    }

    /// Re-dispatches every recorded transport error through the batch loop
    ///
    /// Identifiers are visited in run direction, one batch of `workers` at a
    /// time. Failures are recorded again regardless of the configured policy
    /// so their attempt count keeps growing.
    pub async fn retry_errors(&mut self) -> Result<RunSummary, SweepError> {
        self.state.transition(RunPhase::Running)?;
        self.state.started_at = Instant::now();

        let ids = self.storage.get_error_ids(self.state.direction)?;
        let run_id = self.storage.create_run(
            &self.config_hash,
            self.state.range_start,
            self.state.range_end,
        )?;

        tracing::info!(
            "Starting retry run {} over {} recorded errors",
            run_id,
            ids.len()
        );

        let total = ids.len() as i64;
        let mut done = 0i64;
        let mut batches = ids.chunks(self.scheduler.batch_size());

        let reason = loop {
            if self.storage_limit_reached()? {
                break HaltReason::StorageLimit;
            }

            let Some(batch) = batches.next() else {
                break HaltReason::RangeExhausted;
            };

            let report = self
                .process_batch(batch, TransportErrorPolicy::Record)
                .await?;

            done += batch.len() as i64;
            self.report_progress(done, 0, total, total);

            if report.tripped {
                break HaltReason::CircuitOpen;
            }

            if self.state.is_cancel_requested() {
                break HaltReason::Cancelled;
            }
        };

        self.finish(run_id, reason)
    }

    /// Dispatches one batch, waits for all of it, then applies and commits it
    async fn process_batch(
        &mut self,
        ids: &[i64],
        policy: TransportErrorPolicy,
    ) -> Result<BatchReport, SweepError> {
        let mut outcomes = self.dispatch(ids).join().await;

        let direction = self.state.direction;
        outcomes.sort_by(|a, b| direction.compare(a.id(), b.id()));

        let mut report = BatchReport::default();
        let mut writes = Vec::with_capacity(outcomes.len());

        for outcome in &outcomes {
            log_outcome(outcome);

            if let Some(write) = outcome.to_write(policy) {
                writes.push(write);
            }

            if matches!(outcome, Outcome::Live { .. }) {
                self.state.total_live_count += 1;
            }

            if outcome.was_attempted() {
                report.last_attempted = Some(outcome.id());
            }

            self.breaker.observe(outcome);
            if self.breaker.should_halt() {
                tracing::warn!(
                    "Limit of {} consecutive failures reached at {}",
                    self.breaker.threshold(),
                    outcome.id()
                );
                report.tripped = true;
                break;
            }
        }

        self.storage.write_batch(&writes)?;
        tracing::trace!("Committed {} writes for batch of {}", writes.len(), ids.len());

        Ok(report)
    }

    /// Spawns one worker per identifier
    ///
    /// Identifiers reached after cancellation was requested resolve to STOP
    /// without a request.
    fn dispatch(&self, ids: &[i64]) -> DispatchedBatch {
        let mut batch = DispatchedBatch::with_capacity(ids.len());

        for &id in ids {
            if self.state.is_cancel_requested() {
                batch.stopped.push(Outcome::Stop { id });
                continue;
            }

            let fetcher = Arc::clone(&self.fetcher);
            let classifier = Arc::clone(&self.classifier);
            batch.workers.push((
                id,
                tokio::spawn(async move {
                    let fetched = fetcher.fetch(id).await;
                    resolve(id, &fetched, classifier.as_ref())
                }),
            ));
        }

        batch
    }

    fn storage_limit_reached(&self) -> Result<bool, SweepError> {
        if self.max_database_bytes == 0 {
            return Ok(false);
        }

        let size = self.storage.size_on_disk()?;
        if size > self.max_database_bytes {
            tracing::warn!(
                "Database is {} bytes, over the {} byte limit",
                size,
                self.max_database_bytes
            );
            return Ok(true);
        }

        Ok(false)
    }

    fn report_progress(&mut self, current: i64, initial: i64, target: i64, shown_target: i64) {
        let progress = self
            .progress
            .update(current, initial, target, self.state.started_at.elapsed());

        tracing::info!(
            "{}",
            render_line(&progress, self.breaker.streak(), current, shown_target)
        );
    }

    /// Records the halt, closes the run ledger entry and stops
    fn finish(&mut self, run_id: i64, reason: HaltReason) -> Result<RunSummary, SweepError> {
        self.state.transition(RunPhase::Halted(reason))?;
        self.storage
            .finish_run(run_id, reason, self.state.total_live_count)?;

        match reason {
            HaltReason::RangeExhausted => tracing::info!("Range exhausted"),
            HaltReason::CircuitOpen => tracing::warn!("Stopped by the circuit breaker"),
            HaltReason::Cancelled => tracing::warn!("Cancelled after committing the last batch"),
            HaltReason::StorageLimit => tracing::warn!("Stopped at the database size limit"),
        }

        self.state.transition(RunPhase::Stopped)?;

        let summary = RunSummary {
            run_id,
            reason,
            live_count: self.state.total_live_count,
            final_pointer: self.state.current_pointer,
            streak: self.breaker.streak(),
            elapsed: self.state.started_at.elapsed(),
        };

        tracing::info!(
            "Run {} complete: {} live records in {:?}",
            summary.run_id,
            summary.live_count,
            summary.elapsed
        );

        Ok(summary)
    }
}

fn log_outcome(outcome: &Outcome) {
    match outcome {
        Outcome::Live { id, page } => {
            let title: String = page.title.chars().take(LOG_TITLE_CHARS).collect();
            tracing::debug!("[HIT]  {} | {} | {}", id, page.category, title);
        }
        Outcome::Error { id, message } => tracing::debug!("[ERR]  {} - {}", id, message),
        Outcome::Dead { id, status } => tracing::debug!("[DEAD] {} ({})", id, status),
        Outcome::Unknown { id, title } => tracing::debug!(
            "[UNKNOWN] {} {}",
            id,
            title.as_deref().unwrap_or("(no title)")
        ),
        other => tracing::debug!("[{}] {}", other.label(), other.id()),
    }
}
