use std::future::Future;
use std::path::PathBuf;

use serde_json::Value;
use tokio::time::MissedTickBehavior;

use ensemble_core::Coordinator;
use ensemble_store::FileStore;

use crate::config::HostConfig;
use crate::error::{io_err, HostError};
use crate::shape::{HostShape, ShapeSpec};

/// Everything `ensemble join` needs to run one instance.
#[derive(Debug, Clone)]
pub struct JoinOptions {
    pub home: PathBuf,
    /// Overrides the configured session.
    pub session: Option<String>,
    /// Overrides the configured poll interval.
    pub poll_interval_ms: Option<u64>,
    pub shape: ShapeSpec,
    pub metadata: Value,
}

/// Run one instance and block the current thread until it has left the registry.
pub fn start_blocking(options: JoinOptions) -> Result<(), HostError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(options, shutdown_signal()))
}

/// Join the session, track shape and membership, leave when `shutdown` resolves.
///
/// The coordinator departs on every exit path: explicitly after `shutdown`,
/// or through its `Drop` when an error returns early.
pub async fn run<F>(options: JoinOptions, shutdown: F) -> Result<(), HostError>
where
    F: Future<Output = ()>,
{
    let config = HostConfig::load_at(&options.home)?
        .with_overrides(options.session, options.poll_interval_ms);

    let store = FileStore::open_at(&options.home, &config.session)?;
    let mut watcher = store.watch()?;
    let shapes = HostShape::open(options.shape)?;

    let mut coordinator = Coordinator::new(store, shapes);
    coordinator.set_win_change_callback(|windows| {
        tracing::info!(count = windows.len(), ids = ?windows.ids(), "instances changed");
    });
    coordinator.set_win_shape_change_callback(|record| {
        tracing::info!(id = %record.id, shape = %record.shape, "local shape changed");
    });
    coordinator.init(options.metadata)?;
    tracing::info!(
        session = %config.session,
        id = ?coordinator.this_window_id(),
        path = %watcher.dir().display(),
        "instance joined",
    );

    let mut interval = tokio::time::interval(config.poll_interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("shutdown signal received, leaving registry");
                break;
            }
            _ = interval.tick() => {
                coordinator.update()?;
            }
            event = watcher.recv() => {
                let Some(event) = event else {
                    tracing::warn!("store watcher closed, leaving registry");
                    break;
                };
                coordinator.handle_event(&event)?;
            }
        }
    }

    coordinator.shutdown()?;
    Ok(())
}

/// Resolves on ctrl-c, or SIGTERM on unix.
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    result = tokio::signal::ctrl_c() => log_ctrl_c(result),
                    _ = terminate.recv() => tracing::info!("received SIGTERM"),
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "SIGTERM handler unavailable");
                log_ctrl_c(tokio::signal::ctrl_c().await);
            }
        }
    }
    #[cfg(not(unix))]
    log_ctrl_c(tokio::signal::ctrl_c().await);
}

fn log_ctrl_c(result: std::io::Result<()>) {
    match result {
        Ok(()) => tracing::info!("received ctrl-c"),
        Err(err) => tracing::error!(error = %err, "ctrl-c handler failed"),
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}
