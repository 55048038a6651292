//! Wiring of the long-running process.

use std::sync::Arc;

use {
    anyhow::{Context, Result},
    tokio::sync::mpsc,
    tokio_util::sync::CancellationToken,
    tracing::{info, warn},
};

use {
    clockname_config::ConfigStore,
    clockname_scheduler::{NameFormat, SystemClock},
    clockname_supervisor::{
        AccountSupervisor, ConfigWatcher, LivenessMarker, PollingChangeDetector,
        ShutdownCoordinator, SupervisorOptions, WatcherSettings,
    },
    clockname_telegram::TelegramConnector,
};

use crate::args::Args;

/// Companion tool that edits the account file.
const ACCOUNT_TOOL: &str = "tg-cli";

/// Exit status when a repeated signal aborts a stalled shutdown.
const FORCED_EXIT_CODE: i32 = 130;

pub async fn run(args: Args) -> Result<()> {
    let paths = args.paths();
    let clock = match args.time_zone()? {
        Some(tz) => SystemClock::in_zone(tz),
        None => SystemClock::local(),
    };

    paths
        .ensure_dirs()
        .with_context(|| format!("failed to create {}", paths.sessions_dir.display()))?;

    let root = CancellationToken::new();
    install_signal_handlers(root.clone())?;

    let mut coordinator = ShutdownCoordinator::new(root.clone());
    coordinator.set_marker(LivenessMarker::create(&paths.pid_file)?);

    info!(
        pid = std::process::id(),
        version = env!("CARGO_PKG_VERSION"),
        timezone = clock.zone().map_or("local", |tz| tz.name()),
        "clockname daemon starting"
    );

    let options = SupervisorOptions::new(&paths.sessions_dir)
        .with_clock(Arc::new(clock))
        .with_format(NameFormat::new(&args.zone_suffix));
    let connector = Arc::new(
        TelegramConnector::new(&args.sidecar_url).with_request_timeout(args.request_timeout()),
    );
    let mut supervisor = AccountSupervisor::new(connector, options, root.clone());

    let store = ConfigStore::open(&paths.config_file);
    supervisor.start_all(store.current()).await;

    let (updates_tx, mut updates_rx) = mpsc::channel(8);
    let watcher_cancel = root.child_token();
    let watcher = ConfigWatcher::new(
        PollingChangeDetector::new(store),
        WatcherSettings::default(),
        updates_tx,
        watcher_cancel.clone(),
    )
    .spawn();
    coordinator.set_watcher(watcher_cancel, watcher);

    info!(
        config = %paths.config_file.display(),
        "daemon running, manage accounts with `{ACCOUNT_TOOL}`"
    );

    supervisor.serve(&mut updates_rx, &root).await;
    coordinator.shutdown(&mut supervisor).await;
    Ok(())
}

/// Cancel `cancel` on the first signal. Returns once a second signal
/// arrives, or `false` if the signal source goes away first.
async fn escalate(signals: &mut mpsc::Receiver<&'static str>, cancel: &CancellationToken) -> bool {
    let Some(signal) = signals.recv().await else {
        return false;
    };
    info!(signal, "received signal");
    cancel.cancel();

    match signals.recv().await {
        Some(signal) => {
            warn!(signal, "second signal received, exiting without cleanup");
            true
        },
        None => false,
    }
}

fn spawn_escalation(mut signals: mpsc::Receiver<&'static str>, cancel: CancellationToken) {
    tokio::spawn(async move {
        if escalate(&mut signals, &cancel).await {
            std::process::exit(FORCED_EXIT_CODE);
        }
    });
}

#[cfg(unix)]
fn install_signal_handlers(cancel: CancellationToken) -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt()).context("failed to install SIGINT handler")?;
    let mut sigterm =
        signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
    let (tx, rx) = mpsc::channel(2);
    tokio::spawn(async move {
        loop {
            let name = tokio::select! {
                Some(()) = sigint.recv() => "SIGINT",
                Some(()) = sigterm.recv() => "SIGTERM",
                else => break,
            };
            if tx.send(name).await.is_err() {
                break;
            }
        }
    });
    spawn_escalation(rx, cancel);
    Ok(())
}

#[cfg(not(unix))]
fn install_signal_handlers(cancel: CancellationToken) -> Result<()> {
    let (tx, rx) = mpsc::channel(2);
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if tx.send("ctrl-c").await.is_err() {
                break;
            }
        }
    });
    spawn_escalation(rx, cancel);
    Ok(())
}
