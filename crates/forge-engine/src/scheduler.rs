//! Task scheduler
//!
//! A fixed pool of worker threads drains a bounded FIFO queue of
//! generation tasks. Submission deduplicates by request fingerprint:
//! while a task is in flight, every identical submission receives a
//! handle to the same task. Completed results from deterministic
//! backends short-circuit through the result cache.
//!
//! Each task runs up to `retry_attempts` generation attempts with
//! exponential backoff; only transient backend failures consume the
//! retry budget. Admission denials, invalid requests, and fatal
//! backend errors fail the task on the spot.

use crate::cache::ResultCache;
use crate::governor::GpuGovernor;
use crate::registry::ModelRegistry;
use forge_backend::GenerateCtx;
use forge_conform::{conform, AssetBundle, PlatformFailure, PlatformProfile, RawMesh};
use forge_core::{
    EngineConfig, Fingerprint, ForgeConfig, ForgeError, GenerationRequest, Result,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Largest texture resolution a request may ask for
const MAX_TEXTURE_SIZE: u32 = 8192;

/// Observable lifecycle of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Queued,
    Running { attempt: u32 },
    Retrying { attempt: u32 },
    Succeeded,
    Failed,
}

struct TaskProgress {
    state: TaskState,
    attempts: u32,
    outcome: Option<Result<Arc<AssetBundle>>>,
    created: Instant,
    started: Option<Instant>,
    finished: Option<Instant>,
    /// Most recent transient error, kept across retries
    last_error: Option<ForgeError>,
}

struct TaskShared {
    fingerprint: Fingerprint,
    progress: Mutex<TaskProgress>,
    done: Condvar,
    cancel: Arc<AtomicBool>,
}

impl TaskShared {
    fn new(fingerprint: Fingerprint) -> Arc<Self> {
        Arc::new(Self {
            fingerprint,
            progress: Mutex::new(TaskProgress {
                state: TaskState::Queued,
                attempts: 0,
                outcome: None,
                created: Instant::now(),
                started: None,
                finished: None,
                last_error: None,
            }),
            done: Condvar::new(),
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    fn lock(&self) -> MutexGuard<'_, TaskProgress> {
        self.progress.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn set_running(&self, attempt: u32) {
        let mut progress = self.lock();
        progress.state = TaskState::Running { attempt };
        progress.attempts = attempt;
        if progress.started.is_none() {
            progress.started = Some(Instant::now());
        }
    }

    fn set_retrying(&self, attempt: u32, error: ForgeError) {
        let mut progress = self.lock();
        progress.state = TaskState::Retrying { attempt };
        progress.last_error = Some(error);
    }

    fn finish(&self, outcome: Result<Arc<AssetBundle>>) {
        let mut progress = self.lock();
        progress.state = if outcome.is_ok() {
            TaskState::Succeeded
        } else {
            TaskState::Failed
        };
        progress.outcome = Some(outcome);
        progress.finished = Some(Instant::now());
        self.done.notify_all();
    }
}

/// Caller-side handle to a scheduled task. Cloned handles (including
/// those returned to deduplicated submitters) all observe the same
/// task.
#[derive(Clone)]
pub struct TaskHandle {
    shared: Arc<TaskShared>,
}

impl TaskHandle {
    /// Block until the task completes and return its result
    pub fn wait(&self) -> Result<Arc<AssetBundle>> {
        let mut progress = self.shared.lock();
        loop {
            if let Some(outcome) = &progress.outcome {
                return outcome.clone();
            }
            progress = self
                .shared
                .done
                .wait(progress)
                .unwrap_or_else(|p| p.into_inner());
        }
    }

    /// The result, if the task already completed
    pub fn try_result(&self) -> Option<Result<Arc<AssetBundle>>> {
        self.shared.lock().outcome.clone()
    }

    pub fn state(&self) -> TaskState {
        self.shared.lock().state
    }

    /// Generation attempts started so far
    pub fn attempts(&self) -> u32 {
        self.shared.lock().attempts
    }

    /// When the task was submitted
    pub fn created_at(&self) -> Instant {
        self.shared.lock().created
    }

    /// When the first generation attempt began, if any
    pub fn started_at(&self) -> Option<Instant> {
        self.shared.lock().started
    }

    /// When the task reached a terminal state, if it has
    pub fn finished_at(&self) -> Option<Instant> {
        self.shared.lock().finished
    }

    /// The most recent transient error. Populated while the task is
    /// `Retrying` and kept afterwards, so a task that recovered still
    /// shows what it recovered from.
    pub fn last_error(&self) -> Option<ForgeError> {
        self.shared.lock().last_error.clone()
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.shared.fingerprint
    }

    /// Request cooperative cancellation. A queued task fails before
    /// its first attempt; a running attempt stops at its next
    /// cancellation check.
    pub fn cancel(&self) {
        self.shared.cancel.store(true, Ordering::Relaxed);
    }
}

struct Job {
    request: GenerationRequest,
    shared: Arc<TaskShared>,
}

struct SchedCtx {
    config: ForgeConfig,
    registry: Arc<ModelRegistry>,
    governor: Arc<GpuGovernor>,
    cache: Arc<ResultCache>,
    in_flight: Mutex<HashMap<Fingerprint, Arc<TaskShared>>>,
}

impl SchedCtx {
    fn lock_in_flight(&self) -> MutexGuard<'_, HashMap<Fingerprint, Arc<TaskShared>>> {
        self.in_flight.lock().unwrap_or_else(|p| p.into_inner())
    }
}

pub struct TaskScheduler {
    ctx: Arc<SchedCtx>,
    queue_tx: Option<mpsc::SyncSender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl TaskScheduler {
    pub fn new(
        config: ForgeConfig,
        registry: Arc<ModelRegistry>,
        governor: Arc<GpuGovernor>,
        cache: Arc<ResultCache>,
    ) -> Self {
        let worker_count = config.engine.max_concurrent_tasks.max(1);
        let queue_depth = config.engine.max_queue_depth.max(1);
        let (queue_tx, queue_rx) = mpsc::sync_channel::<Job>(queue_depth);
        let queue_rx = Arc::new(Mutex::new(queue_rx));

        let ctx = Arc::new(SchedCtx {
            config,
            registry,
            governor,
            cache,
            in_flight: Mutex::new(HashMap::new()),
        });

        let workers = (0..worker_count)
            .map(|_| {
                let ctx = Arc::clone(&ctx);
                let queue_rx = Arc::clone(&queue_rx);
                std::thread::spawn(move || worker_loop(ctx, queue_rx))
            })
            .collect();

        Self {
            ctx,
            queue_tx: Some(queue_tx),
            workers,
        }
    }

    /// Enqueue a task. Identical in-flight requests share one task;
    /// cached results complete immediately. When `max_queue_depth`
    /// tasks are already waiting, the submission is rejected with
    /// `ResourceExhausted` instead of blocking the caller.
    pub fn submit(&self, request: GenerationRequest) -> Result<TaskHandle> {
        validate_request(&request, &self.ctx.config)?;
        // Constructing the backend here surfaces config problems
        // (missing API key, disabled backend) at submit time
        let backend = self.ctx.registry.get(request.backend)?;
        let deterministic = backend.info().deterministic;

        let fingerprint = Fingerprint::of_request(&request);

        let mut in_flight = self.ctx.lock_in_flight();
        if let Some(shared) = in_flight.get(&fingerprint) {
            return Ok(TaskHandle {
                shared: Arc::clone(shared),
            });
        }

        if deterministic {
            if let Some(bundle) = self.ctx.cache.lookup(&fingerprint) {
                let shared = TaskShared::new(fingerprint);
                shared.finish(Ok(bundle));
                return Ok(TaskHandle { shared });
            }
        }

        let shared = TaskShared::new(fingerprint);
        in_flight.insert(fingerprint, Arc::clone(&shared));

        let tx = self.queue_tx.as_ref().ok_or_else(|| {
            ForgeError::ResourceExhausted("Scheduler is shut down".to_string())
        })?;
        let job = Job {
            request,
            shared: Arc::clone(&shared),
        };
        if let Err(e) = tx.try_send(job) {
            in_flight.remove(&fingerprint);
            return Err(match e {
                mpsc::TrySendError::Full(_) => {
                    ForgeError::ResourceExhausted("Task queue is full".to_string())
                }
                mpsc::TrySendError::Disconnected(_) => {
                    ForgeError::ResourceExhausted("Scheduler is shut down".to_string())
                }
            });
        }

        Ok(TaskHandle { shared })
    }

    /// Tasks currently queued or running
    pub fn in_flight_count(&self) -> usize {
        self.ctx.lock_in_flight().len()
    }
}

impl Drop for TaskScheduler {
    fn drop(&mut self) {
        // Closing the channel lets workers drain the queue and exit
        self.queue_tx.take();
        for worker in self.workers.drain(..) {
            worker.join().ok();
        }
    }
}

fn validate_request(request: &GenerationRequest, config: &ForgeConfig) -> Result<()> {
    if request.name.trim().is_empty() {
        return Err(ForgeError::InvalidRequest(
            "Asset name must not be empty".to_string(),
        ));
    }
    if request.platforms.is_empty() {
        return Err(ForgeError::InvalidRequest(
            "At least one target platform is required".to_string(),
        ));
    }
    let texture_size = request.params.texture_size;
    if texture_size == 0 || texture_size > MAX_TEXTURE_SIZE {
        return Err(ForgeError::InvalidRequest(format!(
            "Texture size {} is outside 1..={}",
            texture_size, MAX_TEXTURE_SIZE
        )));
    }
    let platforms = config.resolved_platforms();
    for name in &request.platforms {
        if !platforms.contains_key(name) {
            let mut known: Vec<&str> = platforms.keys().map(|k| k.as_str()).collect();
            known.sort();
            return Err(ForgeError::InvalidRequest(format!(
                "Unknown platform '{}'. Available: {}",
                name,
                known.join(", ")
            )));
        }
    }
    Ok(())
}

fn worker_loop(ctx: Arc<SchedCtx>, queue_rx: Arc<Mutex<mpsc::Receiver<Job>>>) {
    loop {
        let job = {
            let guard = match queue_rx.lock() {
                Ok(guard) => guard,
                Err(_) => break,
            };
            guard.recv()
        };
        match job {
            Ok(job) => run_task(&ctx, job),
            Err(_) => break,
        }
    }
}

fn run_task(ctx: &SchedCtx, job: Job) {
    let outcome = execute(ctx, &job.request, &job.shared);
    ctx.lock_in_flight().remove(&job.shared.fingerprint);
    job.shared.finish(outcome);
}

fn execute(
    ctx: &SchedCtx,
    request: &GenerationRequest,
    shared: &TaskShared,
) -> Result<Arc<AssetBundle>> {
    let profiles = resolve_profiles(request, &ctx.config)?;
    let backend = ctx.registry.get(request.backend)?;
    let info = backend.info();
    let engine: &EngineConfig = &ctx.config.engine;
    let max_attempts = engine.retry_attempts.max(1);

    let mut attempt = 0u32;
    let mesh = loop {
        attempt += 1;
        shared.set_running(attempt);
        if shared.cancel.load(Ordering::Relaxed) {
            return Err(ForgeError::Cancelled);
        }

        // A backend evicted with a failing unload is in an unknown
        // state; drop its instance so the next request rebuilds it
        for kind in ctx.governor.admit(&backend)? {
            ctx.registry.forget(kind);
        }
        let gen_ctx = GenerateCtx::new(
            Arc::clone(&shared.cancel),
            Duration::from_secs(engine.task_timeout_secs),
        );
        let generated = backend.generate(request, &gen_ctx);
        ctx.governor.release(info.kind);

        match generated {
            Ok(mesh) => break mesh,
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let delay_ms = engine
                    .retry_delay_ms
                    .saturating_mul(1u64 << (attempt - 1).min(16));
                shared.set_retrying(attempt, e);
                std::thread::sleep(Duration::from_millis(delay_ms));
            }
            Err(e) => return Err(e),
        }
    };

    let bundle = conform_all(request, &info.name, mesh, &profiles)?;
    let bundle = Arc::new(bundle);
    if info.deterministic {
        ctx.cache
            .store(shared.fingerprint, Arc::clone(&bundle));
    }
    Ok(bundle)
}

fn resolve_profiles(
    request: &GenerationRequest,
    config: &ForgeConfig,
) -> Result<Vec<PlatformProfile>> {
    let table = config.resolved_platforms();
    request
        .platforms
        .iter()
        .map(|name| {
            let limits = table.get(name).ok_or_else(|| {
                ForgeError::InvalidRequest(format!("Unknown platform '{}'", name))
            })?;
            PlatformProfile::from_limits(name, limits)
        })
        .collect()
}

/// Run the conformance pipeline for every requested platform. A task
/// succeeds as long as at least one platform conformed; per-platform
/// failures travel inside the bundle.
fn conform_all(
    request: &GenerationRequest,
    backend_name: &str,
    mesh: RawMesh,
    profiles: &[PlatformProfile],
) -> Result<AssetBundle> {
    let mut platforms = Vec::new();
    let mut failures = Vec::new();
    let mut first_error: Option<ForgeError> = None;

    for profile in profiles {
        match conform(&mesh, profile) {
            Ok(asset) => platforms.push(asset),
            Err(e) => {
                failures.push(PlatformFailure {
                    platform: profile.name.clone(),
                    detail: e.to_string(),
                });
                first_error.get_or_insert(e);
            }
        }
    }

    if platforms.is_empty() {
        if let Some(e) = first_error {
            return Err(e);
        }
    }

    Ok(AssetBundle {
        name: request.name.clone(),
        backend: backend_name.to_string(),
        raw_triangles: mesh.triangle_count(),
        raw_vertices: mesh.vertex_count(),
        platforms,
        failures,
    })
}
