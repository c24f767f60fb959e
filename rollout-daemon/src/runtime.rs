use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, Mutex, OwnedMutexGuard};

use rollout_config::{UserConfig, CONFIG_FILE_NAME};
use rollout_core::{store, AppName, DeploymentStatus};
use rollout_deploy::{
    deploy, DeployOptions, DeployOrchestrator, DeployRequest, DeployResponse, FileUploader,
    LocalOrchestrator,
};

use crate::config::DaemonConfig;
use crate::error::{io_err, DaemonError};
use crate::paths::socket_path;
use crate::protocol::{AppSnapshot, DaemonRequest, DaemonResponse};

/// One async mutex per application, held across admission, upload and run.
#[derive(Default)]
struct AppLocks {
    inner: Mutex<HashMap<AppName, Arc<Mutex<()>>>>,
}

impl AppLocks {
    async fn acquire(&self, app: &AppName) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.inner.lock().await;
            locks.entry(app.clone()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Forget the lock for `app` once no request holds or awaits it.
    async fn release(&self, app: &AppName) {
        let mut locks = self.inner.lock().await;
        if locks.get(app).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(app);
        }
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

struct Daemon {
    home: PathBuf,
    config: DaemonConfig,
    orchestrator: Arc<LocalOrchestrator>,
    uploader: Arc<FileUploader>,
    locks: AppLocks,
    started_at_unix: u64,
}

impl Daemon {
    fn new(home: PathBuf, config: DaemonConfig) -> Self {
        Self {
            orchestrator: Arc::new(
                LocalOrchestrator::new(&home, config.apis_base_url.clone())
                    .with_capacity(config.capacity()),
            ),
            uploader: Arc::new(FileUploader::new(&home)),
            locks: AppLocks::default(),
            started_at_unix: unix_seconds_now(),
            home,
            config,
        }
    }

    /// Mark `app` idle after the settle window unless a newer run supersedes it.
    fn schedule_settle(&self, app: AppName) {
        let generation = self.orchestrator.generation(&app);
        let orchestrator = self.orchestrator.clone();
        let settle = self.config.settle();
        tokio::spawn(async move {
            tokio::time::sleep(settle).await;
            if !orchestrator.settle(&app, generation) {
                tracing::debug!(app = %app, generation, "settle superseded by newer run");
            }
        });
    }
}

/// Start the daemon runtime and block the current thread until it exits.
pub fn start_blocking(home: &Path) -> Result<(), DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(home.to_path_buf()))
}

/// Run the daemon runtime until a `stop` request or ctrl-c.
pub async fn run(home: PathBuf) -> Result<(), DaemonError> {
    let config = DaemonConfig::load_at(&home)?;
    ensure_runtime_dirs(&home)?;
    tracing::info!(
        apis_base_url = %config.apis_base_url,
        settle_ms = config.settle_ms,
        "starting rollout daemon",
    );

    let daemon = Arc::new(Daemon::new(home, config));
    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let socket_handle = {
        let shutdown = shutdown_tx.clone();
        let daemon = daemon.clone();
        tokio::spawn(async move {
            let result = socket_server_task(daemon, shutdown.clone(), shutdown.subscribe()).await;
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

    let (socket_result, signal_result) = tokio::join!(socket_handle, signal_handle);
    handle_join("socket_server", socket_result)?;
    handle_join("signal_handler", signal_result)?;
    Ok(())
}

async fn socket_server_task(
    daemon: Arc<Daemon>,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let socket = socket_path(&daemon.home);
    prepare_socket_for_bind(&socket)?;

    let listener = UnixListener::bind(&socket).map_err(|e| io_err(&socket, e))?;
    set_socket_permissions(&socket)?;
    tracing::info!(socket = %socket.display(), "listening");

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, _) = accepted.map_err(|e| io_err(&socket, e))?;
                let daemon = daemon.clone();
                let shutdown_tx = shutdown_tx.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_socket_client(stream, daemon, shutdown_tx).await {
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
    daemon: Arc<Daemon>,
    shutdown_tx: broadcast::Sender<()>,
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

        let request: DaemonRequest = match serde_json::from_str(&line) {
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
        let response = match cmd.as_str() {
            "status" => DaemonResponse::ok(build_status_payload(&daemon)),
            "deploy" => respond(handle_deploy(daemon.clone(), request).await),
            "get" => respond(handle_get(&daemon, request.app).await),
            "stop" => {
                let _ = shutdown_tx.send(());
                DaemonResponse::ok(json!({ "stopping": true }))
            }
            other => DaemonResponse::error(format!("unknown command '{other}'")),
        };

        write_response(&mut writer, &response).await?;
        if cmd == "stop" {
            break;
        }
    }

    Ok(())
}

fn respond<T: serde::Serialize>(result: Result<T, DaemonError>) -> DaemonResponse {
    match result.and_then(|data| serde_json::to_value(data).map_err(DaemonError::from)) {
        Ok(data) => DaemonResponse::ok(data),
        Err(err) => DaemonResponse::error(err.to_string()),
    }
}

async fn handle_deploy(
    daemon: Arc<Daemon>,
    request: DaemonRequest,
) -> Result<DeployResponse, DaemonError> {
    let project = request.project.as_deref().map(hex::decode).transpose()?;
    let config = request.config.map(String::into_bytes);
    let app = config.as_deref().and_then(peek_app_name);
    let deploy_request = DeployRequest {
        config,
        project,
        options: DeployOptions {
            force: request.force,
            ignore_cache: request.ignore_cache,
        },
    };

    // An unparseable document or invalid name fails inside the pipeline before any lookup.
    let guard = match &app {
        Some(app) => Some(daemon.locks.acquire(app).await),
        None => None,
    };

    let worker = daemon.clone();
    let result = tokio::task::spawn_blocking(move || {
        deploy(
            &deploy_request,
            worker.orchestrator.as_ref(),
            worker.uploader.as_ref(),
        )
    })
    .await;

    if let Ok(Ok(response)) = &result {
        if let Some(context) = response.context.as_ref() {
            daemon.schedule_settle(context.app_name().clone());
        }
    }
    drop(guard);
    if let Some(app) = &app {
        daemon.locks.release(app).await;
    }

    let response =
        result.map_err(|err| DaemonError::Protocol(format!("deploy task join failure: {err}")))??;
    Ok(response)
}

async fn handle_get(daemon: &Daemon, app: Option<String>) -> Result<AppSnapshot, DaemonError> {
    let app = app
        .filter(|name| !name.trim().is_empty())
        .map(AppName::from)
        .ok_or_else(|| DaemonError::Protocol("get requires an 'app' name".to_string()))?;
    app.check()
        .map_err(|reason| DaemonError::Protocol(format!("invalid app name '{app}': {reason}")))?;

    let home = daemon.home.clone();
    let lookup = app.clone();
    let record = tokio::task::spawn_blocking(move || store::load_current_at(&home, &lookup))
        .await
        .map_err(|err| DaemonError::Protocol(format!("get task join failure: {err}")))??
        .ok_or_else(|| DaemonError::Protocol(format!("no deployment found for '{app}'")))?;

    let status = daemon.orchestrator.deployment_status(&app)?;
    Ok(AppSnapshot {
        app,
        status,
        deployed_at: record.deployed_at,
        context: record.context,
    })
}

fn peek_app_name(config: &[u8]) -> Option<AppName> {
    UserConfig::parse(CONFIG_FILE_NAME, config)
        .ok()
        .map(|parsed| AppName::from(parsed.app.name))
        .filter(|app| app.check().is_ok())
}

/// Every app with a stored deployment, plus any the orchestrator is tracking.
fn build_status_payload(daemon: &Daemon) -> Value {
    let mut known: BTreeMap<AppName, DeploymentStatus> = match store::list_apps_at(&daemon.home) {
        Ok(apps) => apps
            .into_iter()
            .map(|app| (app, DeploymentStatus::default()))
            .collect(),
        Err(err) => {
            tracing::warn!(error = %err, "failed to list deployed apps");
            BTreeMap::new()
        }
    };
    known.extend(daemon.orchestrator.statuses());
    let apps: Vec<Value> = known
        .into_iter()
        .map(|(app, status)| json!({ "app": app, "status": status }))
        .collect();

    json!({
        "running": true,
        "pid": std::process::id(),
        "started_at_unix": daemon.started_at_unix,
        "socket": socket_path(&daemon.home).display().to_string(),
        "apis_base_url": daemon.config.apis_base_url,
        "settle_ms": daemon.config.settle_ms,
        "apps": apps,
    })
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
        Err(err) => Err(io_err(socket, err)),
    }
}

fn ensure_runtime_dirs(home: &Path) -> Result<(), DaemonError> {
    let root = store::rollout_root_at(home);
    if !root.exists() {
        fs::create_dir_all(&root).map_err(|e| io_err(&root, e))?;
    }
    Ok(())
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
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_socket_permissions(_path: &Path) -> Result<(), DaemonError> {
    Ok(())
}
