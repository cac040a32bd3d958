// Background poll worker: every tick, read the hub snapshot, merge spoke
// documents, run one engine cycle against the persisted stores, write the
// stores back, and log anything newly earned.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::interval;
use tracing::{info, warn};

use crate::achievements::{AchievementStore, Catalog};
use crate::aggregate::AggregateStore;
use crate::alias::AliasMap;
use crate::engine::{self, CycleOutcome};
use crate::models::{ServerRecord, Snapshot};
use crate::store;

/// File locations the worker reads and writes.
pub struct WorkerPaths {
    pub status_file: PathBuf,
    pub spoke_dir: Option<PathBuf>,
    pub aggregate_path: PathBuf,
    pub achievements_path: PathBuf,
    pub alias_path: PathBuf,
}

pub struct WorkerConfig {
    pub interval_secs: u64,
    pub spoke_stale_secs: u64,
    /// How often to log app stats (real seconds).
    pub stats_log_interval_secs: u64,
}

pub fn spawn(
    paths: WorkerPaths,
    config: WorkerConfig,
    mut shutdown_rx: oneshot::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let paths = Arc::new(paths);
        let catalog = Arc::new(Catalog::standard());
        let spoke_stale = Duration::from_secs(config.spoke_stale_secs);

        let mut tick = interval(Duration::from_secs(config.interval_secs));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut stats_log_tick =
            interval(Duration::from_secs(config.stats_log_interval_secs));
        stats_log_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let mut cycles_total: u64 = 0;
        let mut awarded_total: u64 = 0;

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    // File I/O is synchronous; keep it off the runtime threads.
                    let paths = paths.clone();
                    let catalog = catalog.clone();
                    let result = tokio::task::spawn_blocking(move || {
                        run_poll_cycle(&paths, &catalog, spoke_stale)
                    })
                    .await;
                    match result {
                        Ok(Ok(outcome)) => {
                            cycles_total += 1;
                            awarded_total += outcome.newly_earned.len() as u64;
                            for earned in &outcome.newly_earned {
                                info!(
                                    user = %earned.user,
                                    achievement = %earned.achievement_id,
                                    name = %earned.achievement.name,
                                    "achievement earned"
                                );
                            }
                        }
                        Ok(Err(e)) => {
                            warn!(error = %e, "poll cycle failed");
                        }
                        Err(e) => {
                            warn!(error = %e, "poll cycle task failed");
                        }
                    }
                }
                _ = &mut shutdown_rx => {
                    tracing::debug!("Worker shutting down");
                    break;
                }
                _ = stats_log_tick.tick() => {
                    info!(
                        cycles_total,
                        awarded_total,
                        "app stats"
                    );
                }
            }
        }
    })
}

/// One full poll cycle: snapshot in, both stores read-modify-written. Exposed
/// so tests and one-shot invocations can drive it without the loop.
pub fn run_poll_cycle(
    paths: &WorkerPaths,
    catalog: &Catalog,
    spoke_stale: Duration,
) -> anyhow::Result<CycleOutcome> {
    let mut snapshot: Snapshot = store::load_or_default(&paths.status_file);
    if let Some(ref spoke_dir) = paths.spoke_dir {
        merge_spokes(&mut snapshot, spoke_dir, spoke_stale)?;
    }
    anyhow::ensure!(
        !snapshot.servers.is_empty(),
        "no server records (missing {} and no spokes)",
        paths.status_file.display()
    );

    let aliases = AliasMap::load(&paths.alias_path);
    let mut aggregate: AggregateStore = store::load_or_default(&paths.aggregate_path);
    let mut achievements: AchievementStore = store::load_or_default(&paths.achievements_path);

    let outcome = engine::run_cycle(
        &snapshot,
        &aliases,
        catalog,
        &mut aggregate,
        &mut achievements,
        chrono::Utc::now(),
    );

    store::save(&paths.aggregate_path, &aggregate)?;
    store::save(&paths.achievements_path, &achievements)?;

    Ok(outcome)
}

/// Merge per-machine spoke documents into the hub snapshot. A spoke record
/// replaces a same-named hub server. Stale or unreadable spoke files become
/// errored servers so the machine stays listed but contributes nothing.
pub fn merge_spokes(
    snapshot: &mut Snapshot,
    spoke_dir: &Path,
    stale_after: Duration,
) -> anyhow::Result<()> {
    if !spoke_dir.exists() {
        return Ok(());
    }
    for entry in std::fs::read_dir(spoke_dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let machine = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();

        let age = entry
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|t| t.elapsed().ok());
        let record = if age.is_none_or(|a| a > stale_after) {
            warn!(machine = %machine, "stale spoke file; marking server unreachable");
            ServerRecord {
                name: machine,
                error: Some("stale spoke file".to_string()),
                ..Default::default()
            }
        } else {
            match std::fs::read(&path)
                .map_err(anyhow::Error::from)
                .and_then(|b| serde_json::from_slice::<ServerRecord>(&b).map_err(Into::into))
            {
                Ok(mut record) => {
                    if record.name.is_empty() {
                        record.name = machine;
                    }
                    record
                }
                Err(e) => {
                    warn!(machine = %machine, error = %e, "unreadable spoke file");
                    ServerRecord {
                        name: machine,
                        error: Some("unreadable spoke file".to_string()),
                        ..Default::default()
                    }
                }
            }
        };

        match snapshot.servers.iter_mut().find(|s| s.name == record.name) {
            Some(existing) => *existing = record,
            None => snapshot.servers.push(record),
        }
    }
    Ok(())
}
