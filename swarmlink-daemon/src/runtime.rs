//! Watcher runtime: filesystem watcher + dispatcher + control socket.
//!
//! One notify-backed producer feeds a single dispatcher task over an mpsc
//! channel. The dispatcher owns all mutable shared state (dedup ledger,
//! rate limiter); the control socket only reads counter snapshots. Shutdown
//! is a broadcast: the watcher stops producing, the dispatcher finishes the
//! event in flight, and the runtime waits up to the drain timeout.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;

use swarmlink_core::{
    classify::is_excluded, store, Category, ChangeEvent, ChangeKind, Config,
};

use crate::dispatch::{Dispatcher, SharedCounters, SinkSet, Tuning};
use crate::error::{io_err, DaemonError};
use crate::paths::{logs_dir, run_dir, socket_path, DEBOUNCE_WINDOW, DRAIN_TIMEOUT};
use crate::protocol::{WatcherRequest, WatcherResponse};

/// Start the watcher runtime and block the current thread until it exits.
pub fn start_blocking(config: Config) -> Result<(), DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(config))
}

/// Run the watcher runtime.
pub async fn run(config: Config) -> Result<(), DaemonError> {
    ensure_runtime_dirs(&config.data_root)?;

    // The OS reports canonical event paths (macOS resolves /tmp and /var
    // through /private), so the root the classifier strips must be the
    // canonical one too.
    let root = canonical_root(&config.data_root);

    let counters: SharedCounters = Default::default();
    let started_at_unix = unix_seconds_now();

    let (event_tx, event_rx) = mpsc::channel::<ChangeEvent>(256);
    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let watcher_handle = {
        let shutdown = shutdown_tx.clone();
        let root = root.clone();
        tokio::spawn(async move {
            let result = watcher_task(root, event_tx, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let dispatcher_handle = {
        let shutdown = shutdown_tx.clone();
        let dispatcher = Dispatcher::new(
            root.clone(),
            config.notify.clone(),
            SinkSet::from_config(&config),
            Tuning::default(),
            counters.clone(),
        );
        tokio::spawn(async move {
            let result = dispatcher_task(dispatcher, event_rx, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let socket_handle = {
        let shutdown = shutdown_tx.clone();
        let root = root.clone();
        let counters = counters.clone();
        tokio::spawn(async move {
            let result = socket_server_task(
                root,
                counters,
                shutdown.clone(),
                shutdown.subscribe(),
                started_at_unix,
            )
            .await;
            let _ = shutdown.send(());
            result
        })
    };

    let rotation_handle = {
        let shutdown = shutdown_tx.clone();
        let root = root.clone();
        tokio::spawn(async move {
            let result = log_rotation_task(root, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
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
                            tracing::info!("received ctrl-c, shutting down watcher");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Protocol(format!(
                            "ctrl-c handler failed: {err}"
                        ))),
                    }
                }
            }
        })
    };

    let (watcher_result, socket_result, rotation_result, signal_result) =
        tokio::join!(watcher_handle, socket_handle, rotation_handle, signal_handle);

    // The dispatcher may still be mid-pipeline (stability wait, backoff
    // sleep); give it the drain window before giving up on the join.
    match tokio::time::timeout(DRAIN_TIMEOUT, dispatcher_handle).await {
        Ok(result) => handle_join("dispatcher", result)?,
        Err(_) => {
            tracing::warn!(
                timeout_secs = DRAIN_TIMEOUT.as_secs(),
                "dispatcher did not drain before timeout",
            );
        }
    }

    handle_join("watcher", watcher_result)?;
    handle_join("socket_server", socket_result)?;
    handle_join("log_rotation", rotation_result)?;
    handle_join("signal_handler", signal_result)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Watcher task
// ---------------------------------------------------------------------------

async fn watcher_task(
    root: PathBuf,
    event_tx: mpsc::Sender<ChangeEvent>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    // `root` is already canonical, so event paths and classification agree.
    let data = store::data_dir_at(&root);

    let (raw_tx, mut raw_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
    let mut _watcher: RecommendedWatcher = recommended_watcher(move |event| {
        let _ = raw_tx.send(event);
    })?;
    _watcher.watch(&data, RecursiveMode::Recursive)?;
    tracing::info!(path = %data.display(), "watching record tree");

    let mut debounce = HashMap::<PathBuf, Instant>::new();

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            event = raw_rx.recv() => {
                let Some(event) = event else { break };
                let event = match event {
                    Ok(event) => event,
                    Err(err) => {
                        tracing::warn!(error = %err, "watcher event error");
                        continue;
                    }
                };
                let Some(kind) = change_kind(&event.kind) else {
                    continue;
                };

                for path in event.paths {
                    if path.is_dir() || is_excluded(&path) {
                        continue;
                    }
                    if !debounce_admits(&mut debounce, &path, Instant::now(), DEBOUNCE_WINDOW) {
                        continue;
                    }

                    let change = ChangeEvent::new(path, kind);
                    if event_tx.send(change).await.is_err() {
                        return Err(DaemonError::ChannelClosed("event queue"));
                    }
                }
            }
        }
    }

    Ok(())
}

fn change_kind(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Created),
        EventKind::Modify(_) => Some(ChangeKind::Modified),
        EventKind::Remove(_) => Some(ChangeKind::Deleted),
        _ => None,
    }
}

/// Admit a path if no event for it was admitted within `window`. Entries
/// older than 30s are pruned to keep the map small.
fn debounce_admits(
    debounce: &mut HashMap<PathBuf, Instant>,
    path: &Path,
    now: Instant,
    window: Duration,
) -> bool {
    debounce.retain(|_, seen_at| now.duration_since(*seen_at) <= Duration::from_secs(30));
    match debounce.get(path) {
        Some(last_seen) if now.duration_since(*last_seen) < window => false,
        _ => {
            debounce.insert(path.to_path_buf(), now);
            true
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatcher task
// ---------------------------------------------------------------------------

async fn dispatcher_task(
    mut dispatcher: Dispatcher,
    mut event_rx: mpsc::Receiver<ChangeEvent>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            maybe_event = event_rx.recv() => {
                let Some(event) = maybe_event else { break };
                // handle_event is infallible by contract; a bad record is
                // counted and logged inside the pipeline.
                dispatcher.handle_event(event).await;
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Control socket
// ---------------------------------------------------------------------------

async fn socket_server_task(
    root: PathBuf,
    counters: SharedCounters,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
    started_at_unix: u64,
) -> Result<(), DaemonError> {
    let run = run_dir(&root);
    if !run.exists() {
        fs::create_dir_all(&run).map_err(|e| io_err(&run, e))?;
    }

    let socket = socket_path(&root);
    prepare_socket_for_bind(&socket)?;

    let listener = UnixListener::bind(&socket).map_err(|e| io_err(&socket, e))?;
    set_socket_permissions(&socket)?;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, _) = accepted.map_err(|e| io_err(&socket, e))?;
                let root = root.clone();
                let counters = counters.clone();
                let shutdown_tx = shutdown_tx.clone();
                tokio::spawn(async move {
                    if let Err(err) =
                        handle_socket_client(stream, root, counters, shutdown_tx, started_at_unix)
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

async fn handle_socket_client(
    stream: UnixStream,
    root: PathBuf,
    counters: SharedCounters,
    shutdown_tx: broadcast::Sender<()>,
    started_at_unix: u64,
) -> Result<(), DaemonError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| io_err("watcher socket read", e))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let request: Result<WatcherRequest, _> = serde_json::from_str(&line);
        let request = match request {
            Ok(request) => request,
            Err(err) => {
                write_response(
                    &mut writer,
                    &WatcherResponse::error(format!("invalid request JSON: {err}")),
                )
                .await?;
                continue;
            }
        };

        let response = match request.cmd.as_str() {
            "status" => {
                let payload =
                    build_status_payload(&root, counters.clone(), started_at_unix).await;
                WatcherResponse::ok(payload)
            }
            "stop" => {
                let _ = shutdown_tx.send(());
                WatcherResponse::ok(json!({ "stopping": true }))
            }
            other => WatcherResponse::error(format!("unknown command '{other}'")),
        };

        write_response(&mut writer, &response).await?;
        if request.cmd == "stop" {
            break;
        }
    }

    Ok(())
}

async fn build_status_payload(
    root: &Path,
    counters: SharedCounters,
    started_at_unix: u64,
) -> Value {
    // Snapshot under the read lock, assemble JSON after dropping it.
    let snapshot = { counters.read().await.clone() };

    let categories: Vec<&str> = Category::ALL.iter().map(|c| c.dir_name()).collect();

    json!({
        "running": true,
        "started_at_unix": started_at_unix,
        "data_root": store::data_dir_at(root).display().to_string(),
        "socket": socket_path(root).display().to_string(),
        "categories": categories,
        "counters": snapshot,
    })
}

// ---------------------------------------------------------------------------
// Housekeeping tasks and helpers
// ---------------------------------------------------------------------------

async fn log_rotation_task(
    root: PathBuf,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let mut interval = tokio::time::interval(Duration::from_secs(60));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = interval.tick() => {
                let root = root.clone();
                tokio::task::spawn_blocking(move || {
                    crate::log_rotation::rotate_logs(&root);
                })
                .await
                .ok();
            }
        }
    }
    Ok(())
}

fn canonical_root(root: &Path) -> PathBuf {
    fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf())
}

fn ensure_runtime_dirs(root: &Path) -> Result<(), DaemonError> {
    for category in Category::ALL {
        let dir = store::category_dir_at(root, category);
        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
        }
    }
    for dir in [run_dir(root), logs_dir(root)] {
        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
        }
    }
    Ok(())
}

fn prepare_socket_for_bind(socket: &Path) -> Result<(), DaemonError> {
    if !socket.exists() {
        return Ok(());
    }

    match std::os::unix::net::UnixStream::connect(socket) {
        Ok(_) => Err(DaemonError::Protocol(format!(
            "watcher socket already in use: {}",
            socket.display()
        ))),
        Err(err) => {
            tracing::warn!(
                socket = %socket.display(),
                error = %err,
                "removing stale watcher socket before bind",
            );
            match fs::remove_file(socket) {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(err) => Err(io_err(socket, err)),
            }
        }
    }
}

async fn write_response(
    writer: &mut OwnedWriteHalf,
    response: &WatcherResponse,
) -> Result<(), DaemonError> {
    let payload = serde_json::to_string(response)?;
    writer
        .write_all(payload.as_bytes())
        .await
        .map_err(|e| io_err("watcher socket write", e))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| io_err("watcher socket write", e))?;
    writer
        .flush()
        .await
        .map_err(|e| io_err("watcher socket flush", e))?;
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
    chrono::Utc::now().timestamp().max(0) as u64
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[cfg(unix)]
fn set_socket_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_socket_permissions(_path: &Path) -> Result<(), DaemonError> {
    Ok(())
}
