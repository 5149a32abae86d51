//! The daemon runtime.
//!
//! Four cooperating tasks, all shut down through one broadcast channel:
//!
//! - **socket server** — accepts JSON-lines clients, rate-limits mutating
//!   commands per actor, forwards work to the job processor;
//! - **job processor** — serializes apply/pull/plan/confirm/cancel per
//!   daemon instance, owns the pending-deletion transitions;
//! - **watcher** — watches the template mirrors for changes and enqueues an
//!   apply for the affected space, debounced;
//! - **sweeper** — expires pending deletion confirmations cooperatively.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::Instant;

use concord_core::template;
use concord_core::types::ActorId;
use concord_engine::{
    format_report, DeletionWorkflow, LiveSnapshot, ReconciliationResult, Reconciler, WorkflowState,
};
use concord_engine::memory::InMemorySpace;
use concord_mirror::metadata;
use concord_rest::{RestAdapter, RestConfig};

use crate::config::DaemonConfig;
use crate::error::{io_err, DaemonError};
use crate::limiter::{Decision, RateLimiter};
use crate::paths::{mirrors_root, run_dir, socket_path, CONFIRMATION_TTL, DEBOUNCE_WINDOW};
use crate::pending::PendingDeletions;
use crate::protocol::{DaemonRequest, DaemonResponse};

/// Actor name used for watcher-triggered applies. Exempt from rate
/// limiting because it never passes through the socket layer.
const WATCHER_ACTOR: &str = "watcher";

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum JobKind {
    Apply { template_override: Option<PathBuf> },
    Pull,
    Plan { template_override: Option<PathBuf> },
    Confirm,
    Cancel,
}

struct Job {
    kind: JobKind,
    space: String,
    actor: String,
    respond_to: oneshot::Sender<Result<Value, String>>,
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Start the daemon runtime and block the current thread until it exits.
pub fn start_blocking(config: DaemonConfig) -> Result<(), DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(config))
}

/// Run the daemon runtime.
pub async fn run(config: DaemonConfig) -> Result<(), DaemonError> {
    ensure_runtime_dirs(&config.home)?;

    let config = Arc::new(config);
    let pending = Arc::new(Mutex::new(PendingDeletions::new()));
    let limiter = Arc::new(Mutex::new(RateLimiter::new(
        config.rate_window,
        config.rate_max,
        config.exempt_actors.clone(),
    )));
    let started_at_unix = unix_seconds_now();

    let (job_tx, job_rx) = mpsc::channel::<Job>(64);
    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let watcher_handle = {
        let shutdown = shutdown_tx.clone();
        let home = config.home.clone();
        let job_tx = job_tx.clone();
        tokio::spawn(async move {
            let result = watcher_task(home, job_tx, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let processor_handle = {
        let shutdown = shutdown_tx.clone();
        let config = config.clone();
        let pending = pending.clone();
        tokio::spawn(async move {
            let result = job_processor_task(config, pending, job_rx, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let socket_handle = {
        let shutdown = shutdown_tx.clone();
        let config = config.clone();
        let pending = pending.clone();
        let limiter = limiter.clone();
        let job_tx = job_tx.clone();
        tokio::spawn(async move {
            let result = socket_server_task(
                config,
                pending,
                limiter,
                job_tx,
                shutdown.clone(),
                shutdown.subscribe(),
                started_at_unix,
            )
            .await;
            let _ = shutdown.send(());
            result
        })
    };

    let sweeper_handle = {
        let shutdown = shutdown_tx.clone();
        let pending = pending.clone();
        tokio::spawn(async move { sweeper_task(pending, shutdown.subscribe()).await })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down daemon");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Protocol(format!("ctrl-c handler failed: {err}"))),
                    }
                }
            }
        })
    };

    let (watcher_result, processor_result, socket_result, sweeper_result, signal_result) = tokio::join!(
        watcher_handle,
        processor_handle,
        socket_handle,
        sweeper_handle,
        signal_handle
    );

    handle_join("watcher", watcher_result)?;
    handle_join("job_processor", processor_result)?;
    handle_join("socket_server", socket_result)?;
    handle_join("sweeper", sweeper_result)?;
    handle_join("signal_handler", signal_result)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Watcher
// ---------------------------------------------------------------------------

async fn watcher_task(
    home: PathBuf,
    job_tx: mpsc::Sender<Job>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let mirrors = mirrors_root(&home);
    if !mirrors.exists() {
        fs::create_dir_all(&mirrors).map_err(|e| io_err(mirrors.display(), e))?;
    }
    let mirrors = fs::canonicalize(&mirrors).unwrap_or(mirrors);

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
    let mut watcher: RecommendedWatcher = recommended_watcher(move |event| {
        let _ = event_tx.send(event);
    })?;
    watcher.watch(&mirrors, RecursiveMode::Recursive)?;

    let mut debounce = HashMap::<String, Instant>::new();

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            event = event_rx.recv() => {
                let Some(event) = event else { break };
                let event = match event {
                    Ok(event) => event,
                    Err(err) => {
                        tracing::warn!(error = %err, "watcher event error");
                        continue;
                    }
                };
                if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)) {
                    continue;
                }

                for path in event.paths {
                    let Some(space) = space_for_path(&path, &mirrors) else { continue };
                    if is_git_internal(&path) {
                        continue;
                    }
                    if !should_process_event(&mut debounce, &space, Instant::now()) {
                        continue;
                    }

                    tracing::info!(space = %space, path = %path.display(), "mirror changed, re-applying template");
                    match enqueue(&job_tx, JobKind::Apply { template_override: None }, &space, WATCHER_ACTOR).await {
                        Ok(payload) => {
                            tracing::info!(space = %space, converged = payload["converged"].as_bool().unwrap_or(false), "watcher-triggered apply completed");
                        }
                        Err(err) => {
                            tracing::error!(space = %space, error = %err, "watcher-triggered apply failed");
                        }
                    }
                }
            }
        }
    }

    Ok(())
}

/// Map a changed path to the space whose mirror contains it.
fn space_for_path(path: &Path, mirrors: &Path) -> Option<String> {
    let relative = path.strip_prefix(mirrors).ok()?;
    relative
        .components()
        .next()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
}

fn is_git_internal(path: &Path) -> bool {
    path.components()
        .any(|c| c.as_os_str().to_string_lossy() == ".git")
}

fn should_process_event(
    debounce: &mut HashMap<String, Instant>,
    space: &str,
    now: Instant,
) -> bool {
    debounce.retain(|_, seen_at| now.duration_since(*seen_at) <= Duration::from_secs(30));
    match debounce.get(space) {
        Some(last_seen) if now.duration_since(*last_seen) < DEBOUNCE_WINDOW => false,
        _ => {
            debounce.insert(space.to_string(), now);
            true
        }
    }
}

// ---------------------------------------------------------------------------
// Job processor
// ---------------------------------------------------------------------------

async fn job_processor_task(
    config: Arc<DaemonConfig>,
    pending: Arc<Mutex<PendingDeletions>>,
    mut job_rx: mpsc::Receiver<Job>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            maybe_job = job_rx.recv() => {
                let Some(job) = maybe_job else { break };
                let outcome = process_job(&config, &pending, &job).await;
                let _ = job.respond_to.send(outcome);
            }
        }
    }
    Ok(())
}

async fn process_job(
    config: &DaemonConfig,
    pending: &Mutex<PendingDeletions>,
    job: &Job,
) -> Result<Value, String> {
    match &job.kind {
        JobKind::Apply { template_override } => {
            apply_space(config, pending, &job.space, &job.actor, template_override.as_deref()).await
        }
        JobKind::Pull => {
            let home = config.home.clone();
            let space = job.space.clone();
            let (outcome, _) = tokio::task::spawn_blocking(move || {
                concord_mirror::pull_at(&home, &space)
            })
            .await
            .map_err(|e| format!("mirror task join error: {e}"))?
            .map_err(|e| e.to_string())?;

            let mut payload =
                apply_space(config, pending, &job.space, &job.actor, None).await?;
            if let Some(map) = payload.as_object_mut() {
                map.insert("commit".to_string(), json!(outcome.commit));
                map.insert("mirror_changed".to_string(), json!(outcome.changed));
            }
            Ok(payload)
        }
        JobKind::Plan { template_override } => {
            plan_space(config, &job.space, template_override.as_deref()).await
        }
        JobKind::Confirm => confirm_space(config, pending, &job.space, &job.actor).await,
        JobKind::Cancel => {
            let entry = lock(pending).take(&job.space);
            match entry {
                Some(mut entry) => {
                    entry
                        .workflow
                        .cancel(concord_engine::CancelReason::Dismissed)
                        .map_err(|e| e.to_string())?;
                    Ok(json!({ "space": job.space, "cancelled": true }))
                }
                None => Err(format!("no pending deletion for space '{}'", job.space)),
            }
        }
    }
}

fn adapter_for(config: &DaemonConfig, space: &str) -> RestAdapter {
    RestAdapter::new(RestConfig::new(
        config.api_url.clone(),
        config.token.clone(),
        space,
    ))
}

/// Resolve the template location: explicit override, or the configured
/// source's mirror directory.
fn resolve_template_dir(
    config: &DaemonConfig,
    space: &str,
    template_override: Option<&Path>,
) -> Result<PathBuf, String> {
    match template_override {
        Some(path) => Ok(path.to_path_buf()),
        None => {
            let source = metadata::load_at(&config.home, space).map_err(|e| e.to_string())?;
            Ok(concord_mirror::template_dir(&config.home, &source))
        }
    }
}

async fn apply_space(
    config: &DaemonConfig,
    pending: &Mutex<PendingDeletions>,
    space: &str,
    actor: &str,
    template_override: Option<&Path>,
) -> Result<Value, String> {
    let template_dir = resolve_template_dir(config, space, template_override)?;
    let template = template::load(&template_dir).map_err(|e| e.to_string())?;

    let adapter = adapter_for(config, space);
    let result = Reconciler::new(config.policy())
        .run(&template, &adapter)
        .await
        .map_err(|e| e.to_string())?;

    let drift = result.drift();
    let offered = if drift.is_empty() {
        0
    } else {
        let objects = drift.objects();
        let count = objects.len();
        let workflow = DeletionWorkflow::offer(objects, ActorId::from(actor));
        lock(pending).offer(space, workflow, CONFIRMATION_TTL, Instant::now().into_std());
        count
    };

    Ok(apply_payload(space, &result, offered, false))
}

async fn plan_space(
    config: &DaemonConfig,
    space: &str,
    template_override: Option<&Path>,
) -> Result<Value, String> {
    let template_dir = resolve_template_dir(config, space, template_override)?;
    let template = template::load(&template_dir).map_err(|e| e.to_string())?;

    let adapter = adapter_for(config, space);
    let snapshot = LiveSnapshot::read(&adapter).await.map_err(|e| e.to_string())?;
    let rehearsal = InMemorySpace::from_snapshot(&snapshot);

    let result = Reconciler::new(config.policy())
        .run(&template, &rehearsal)
        .await
        .map_err(|e| e.to_string())?;

    Ok(apply_payload(space, &result, 0, true))
}

async fn confirm_space(
    config: &DaemonConfig,
    pending: &Mutex<PendingDeletions>,
    space: &str,
    actor: &str,
) -> Result<Value, String> {
    // Take the entry out while transitioning; the processor serializes all
    // workflow commands, so nothing else can observe the gap.
    let Some(mut entry) = lock(pending).take(space) else {
        return Err(format!("no pending deletion for space '{space}'"));
    };

    if entry.workflow.requested_by().0 != actor {
        let owner = entry.workflow.requested_by().clone();
        lock(pending).reinsert(space, entry);
        return Err(format!(
            "pending deletion for '{space}' belongs to '{owner}'"
        ));
    }

    let adapter = adapter_for(config, space);
    match entry.workflow.state().clone() {
        WorkflowState::Offered => {
            match entry.workflow.begin_confirmation(&adapter).await {
                Ok(()) => {
                    let objects: Vec<String> = entry
                        .workflow
                        .objects()
                        .iter()
                        .map(|o| o.label())
                        .collect();
                    lock(pending).reinsert(space, entry);
                    Ok(json!({
                        "space": space,
                        "state": "pending_confirmation",
                        "objects": objects,
                        "message": "re-run confirm to delete, or cancel",
                    }))
                }
                Err(err) => {
                    // Permission failures leave the workflow in Offered.
                    lock(pending).reinsert(space, entry);
                    Err(err.to_string())
                }
            }
        }
        WorkflowState::PendingConfirmation => {
            let report = entry
                .workflow
                .confirm(&adapter)
                .await
                .map_err(|e| e.to_string())?;
            Ok(json!({
                "space": space,
                "state": "applied",
                "deleted": report.deleted,
                "failed": report.failed,
            }))
        }
        WorkflowState::Applied(_) | WorkflowState::Cancelled(_) => {
            Err("deletion workflow already completed".to_string())
        }
    }
}

fn apply_payload(space: &str, result: &ReconciliationResult, offered: usize, plan: bool) -> Value {
    json!({
        "space": space,
        "plan": plan,
        "template": result.template_name,
        "created": result.created_count(),
        "updated": result.updated_count(),
        "failed": result.failed_count(),
        "converged": result.is_converged(),
        "drift_offered": offered,
        "report": format_report(result),
    })
}

// ---------------------------------------------------------------------------
// Sweeper
// ---------------------------------------------------------------------------

async fn sweeper_task(
    pending: Arc<Mutex<PendingDeletions>>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let mut interval = tokio::time::interval(Duration::from_secs(5));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    interval.tick().await; // consume the first immediate tick

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = interval.tick() => {
                let expired = lock(&pending).expire(std::time::Instant::now());
                for space in expired {
                    tracing::info!(space = %space, "pending deletion expired, cancelled");
                }
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Socket server
// ---------------------------------------------------------------------------

#[allow(clippy::too_many_arguments)]
async fn socket_server_task(
    config: Arc<DaemonConfig>,
    pending: Arc<Mutex<PendingDeletions>>,
    limiter: Arc<Mutex<RateLimiter>>,
    job_tx: mpsc::Sender<Job>,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
    started_at_unix: u64,
) -> Result<(), DaemonError> {
    let run = run_dir(&config.home);
    if !run.exists() {
        fs::create_dir_all(&run).map_err(|e| io_err(run.display(), e))?;
    }

    let socket = socket_path(&config.home);
    prepare_socket_for_bind(&socket)?;

    let listener = UnixListener::bind(&socket).map_err(|e| io_err(socket.display(), e))?;
    set_socket_permissions(&socket)?;
    tracing::info!(socket = %socket.display(), "daemon listening");

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, _) = accepted.map_err(|e| io_err(socket.display(), e))?;
                let config = config.clone();
                let pending = pending.clone();
                let limiter = limiter.clone();
                let job_tx = job_tx.clone();
                let shutdown_tx = shutdown_tx.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_client(
                        stream,
                        config,
                        pending,
                        limiter,
                        job_tx,
                        shutdown_tx,
                        started_at_unix,
                    )
                    .await
                    {
                        tracing::error!(error = %err, "socket client error");
                    }
                });
            }
        }
    }

    if socket.exists() {
        let _ = fs::remove_file(&socket);
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn handle_client(
    stream: UnixStream,
    config: Arc<DaemonConfig>,
    pending: Arc<Mutex<PendingDeletions>>,
    limiter: Arc<Mutex<RateLimiter>>,
    job_tx: mpsc::Sender<Job>,
    shutdown_tx: broadcast::Sender<()>,
    started_at_unix: u64,
) -> Result<(), DaemonError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| io_err("daemon socket read", e))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let request: Result<DaemonRequest, _> = serde_json::from_str(&line);
        let request = match request {
            Ok(request) => request,
            Err(err) => {
                write_response(
                    &mut writer,
                    &DaemonResponse::error(format!("invalid request JSON: {err}")),
                )
                .await?;
                continue;
            }
        };

        let cmd = request.cmd.clone();
        let response =
            dispatch(&request, &config, &pending, &limiter, &job_tx, &shutdown_tx, started_at_unix)
                .await;
        write_response(&mut writer, &response).await?;
        if cmd == "stop" {
            break;
        }
    }

    Ok(())
}

async fn dispatch(
    request: &DaemonRequest,
    config: &DaemonConfig,
    pending: &Mutex<PendingDeletions>,
    limiter: &Mutex<RateLimiter>,
    job_tx: &mpsc::Sender<Job>,
    shutdown_tx: &broadcast::Sender<()>,
    started_at_unix: u64,
) -> DaemonResponse {
    match request.cmd.as_str() {
        "status" => DaemonResponse::ok(status_payload(config, pending, started_at_unix)),
        "stop" => {
            let _ = shutdown_tx.send(());
            DaemonResponse::ok(json!({ "stopping": true }))
        }
        cmd @ ("apply" | "pull" | "plan" | "confirm" | "cancel") => {
            let Some(space) = request.space.clone() else {
                return DaemonResponse::error(format!("'{cmd}' requires a space"));
            };
            let actor = request.actor.clone().unwrap_or_else(|| "anonymous".to_string());

            {
                let mut limiter = lock(limiter);
                let now = std::time::Instant::now();
                if let Decision::Limited { retry_after } = limiter.check(&actor, now) {
                    if limiter.should_notify(&actor, now) {
                        return DaemonResponse::error(format!(
                            "rate limited; retry in {}s",
                            retry_after.as_secs().max(1)
                        ));
                    }
                    return DaemonResponse::error("rate limited".to_string());
                }
            }

            let kind = match cmd {
                "apply" => JobKind::Apply {
                    template_override: request.template.clone().map(PathBuf::from),
                },
                "pull" => JobKind::Pull,
                "plan" => JobKind::Plan {
                    template_override: request.template.clone().map(PathBuf::from),
                },
                "confirm" => JobKind::Confirm,
                _ => JobKind::Cancel,
            };

            match enqueue(job_tx, kind, &space, &actor).await {
                Ok(payload) => DaemonResponse::ok(payload),
                Err(err) => DaemonResponse::error(err.to_string()),
            }
        }
        other => DaemonResponse::error(format!("unknown command '{other}'")),
    }
}

fn status_payload(
    config: &DaemonConfig,
    pending: &Mutex<PendingDeletions>,
    started_at_unix: u64,
) -> Value {
    let sources = metadata::list_at(&config.home).unwrap_or_default();
    let spaces: Vec<Value> = sources
        .iter()
        .map(|s| {
            json!({
                "space": s.space,
                "repository": s.repository,
                "branch": s.branch,
                "last_commit": s.last_commit,
                "fetched_at": s.fetched_at.map(|t| t.to_rfc3339()),
            })
        })
        .collect();

    let pending_count = lock(pending).len();

    json!({
        "running": true,
        "started_at_unix": started_at_unix,
        "spaces": spaces,
        "pending_deletions": pending_count,
        "socket": socket_path(&config.home).display().to_string(),
    })
}

async fn enqueue(
    job_tx: &mpsc::Sender<Job>,
    kind: JobKind,
    space: &str,
    actor: &str,
) -> Result<Value, DaemonError> {
    let (tx, rx) = oneshot::channel();
    job_tx
        .send(Job {
            kind,
            space: space.to_string(),
            actor: actor.to_string(),
            respond_to: tx,
        })
        .await
        .map_err(|_| DaemonError::ChannelClosed("job queue"))?;

    let outcome = rx
        .await
        .map_err(|_| DaemonError::ChannelClosed("job response"))?;
    outcome.map_err(DaemonError::Protocol)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn ensure_runtime_dirs(home: &Path) -> Result<(), DaemonError> {
    for dir in [run_dir(home), mirrors_root(home)] {
        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(|e| io_err(dir.display(), e))?;
        }
    }
    Ok(())
}

fn prepare_socket_for_bind(socket: &Path) -> Result<(), DaemonError> {
    if !socket.exists() {
        return Ok(());
    }

    match StdUnixStream::connect(socket) {
        Ok(_) => {
            return Err(DaemonError::Protocol(format!(
                "daemon socket already in use: {}",
                socket.display()
            )));
        }
        Err(err) => {
            tracing::warn!(
                socket = %socket.display(),
                error = %err,
                "removing stale daemon socket before bind",
            );
        }
    }

    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket.display(), err)),
    }
}

async fn write_response(
    writer: &mut OwnedWriteHalf,
    response: &DaemonResponse,
) -> Result<(), DaemonError> {
    let payload = serde_json::to_string(response)?;
    writer
        .write_all(payload.as_bytes())
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .flush()
        .await
        .map_err(|e| io_err("daemon socket flush", e))?;
    Ok(())
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Protocol(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

fn unix_seconds_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[cfg(unix)]
fn set_socket_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path.display(), e))
}

#[cfg(not(unix))]
fn set_socket_permissions(_path: &Path) -> Result<(), DaemonError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
