//! Watch command: run the full detection + reconciliation pipeline.

use std::time::Duration;

use crate::config::Settings;
use crate::service::SyncService;
use crate::sync::DryRunRemote;

const LIVENESS_CHECK: Duration = Duration::from_millis(500);

/// Why the watch loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Deadline,
    Interrupted,
    ServiceExited,
}

pub fn run_watch(settings: &Settings, for_secs: Option<u64>) -> anyhow::Result<()> {
    if settings.monitor.paths.is_empty() {
        eprintln!("No [[monitor.paths]] configured; nothing to watch.");
        return Ok(());
    }

    let service = SyncService::start(settings, DryRunRemote)?;
    eprintln!(
        "Watching {} director{} (server '{}')",
        settings.monitor.paths.len(),
        if settings.monitor.paths.len() == 1 { "y" } else { "ies" },
        settings.sync.server
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let reason = runtime.block_on(wait_for_stop(&service, for_secs.map(Duration::from_secs)));

    match reason {
        StopReason::Interrupted => eprintln!("Received shutdown signal, draining queue..."),
        StopReason::ServiceExited => eprintln!("Service exited unexpectedly"),
        StopReason::Deadline => {}
    }

    let count = service.stop()?;
    println!("Stopped. {count} synced files on record.");
    Ok(())
}

/// Block until Ctrl-C, the optional deadline, or a pipeline thread exits.
async fn wait_for_stop(service: &SyncService, limit: Option<Duration>) -> StopReason {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let deadline = async {
        match limit {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);
    let mut liveness = tokio::time::interval(LIVENESS_CHECK);
    let mut listening = true;

    loop {
        tokio::select! {
            result = &mut ctrl_c, if listening => {
                match result {
                    Ok(()) => return StopReason::Interrupted,
                    Err(e) => {
                        tracing::warn!("[watch] cannot listen for Ctrl-C: {e}");
                        listening = false;
                    }
                }
            }
            () = &mut deadline => return StopReason::Deadline,
            _ = liveness.tick() => {
                if !service.is_running() {
                    return StopReason::ServiceExited;
                }
            }
        }
    }
}
