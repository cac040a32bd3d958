// Single pass over one Snapshot: per-user transient stats for the threshold
// checks, per-server occupancy sets for the coop checks, and per-user/cluster
// totals for the aggregate updater. Nothing here is persisted.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::alias::AliasMap;
use crate::models::Snapshot;

/// Server CPU above this marks the machine as a CPU hog for everyone on it
/// (achievement attribution is server-wide, not per process).
const CPU_HOG_UTIL: f64 = 95.0;

/// Lower threshold at which a `"<server> (CPU)"` tag widens the machine set
/// fed into the lifetime aggregate.
const CPU_ATTRIBUTION_UTIL: f64 = 80.0;

/// Per-user statistics for one poll cycle. Built fresh each cycle and
/// discarded after evaluation.
#[derive(Debug, Clone, Default)]
pub struct TransientUserStats {
    /// Distinct `server:index` pairs touched this cycle.
    pub gpus: HashSet<String>,
    pub machines: HashSet<String>,
    pub total_mem_mb: u64,
    pub max_gpu_mem_percent: f64,
    pub max_gpu_util: f64,
    pub max_process_hours: f64,
    /// Machines where this user was present while server CPU exceeded the
    /// hog threshold.
    pub cpu_machines: HashSet<String>,
}

impl TransientUserStats {
    pub fn gpu_count(&self) -> usize {
        self.gpus.len()
    }
}

/// Occupancy sets for one server, consumed by the coop achievement pass.
#[derive(Debug, Clone, Default)]
pub struct ServerCoop {
    pub name: String,
    /// Canonical users seen anywhere on this server.
    pub users: HashSet<String>,
    /// GPU index -> canonical users on that GPU. Every GPU of the server has
    /// an entry, occupied or not (full-house needs the total count).
    pub gpu_users: HashMap<u32, HashSet<String>>,
}

/// Per-user snapshot totals handed to the aggregate updater.
#[derive(Debug, Clone, Default)]
pub struct UserSnapshotTotals {
    pub mem_mb: u64,
    pub machines: HashSet<String>,
    pub raw_users: HashSet<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SnapshotReduction {
    pub user_stats: HashMap<String, TransientUserStats>,
    pub coop: Vec<ServerCoop>,
    pub totals: HashMap<String, UserSnapshotTotals>,
    /// Sum of `mem_total` over all GPUs on non-errored servers, MiB.
    pub total_capacity_mb: u64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ElapsedTimeError {
    #[error("expected H:MM:SS or D-H:MM:SS, got {0:?}")]
    BadFormat(String),
    #[error("non-numeric component in {0:?}")]
    BadNumber(String),
}

/// Parse an elapsed-time string (`H:MM:SS` or `D-H:MM:SS`) into hours.
pub fn parse_elapsed_hours(s: &str) -> Result<f64, ElapsedTimeError> {
    let (days, clock) = match s.split_once('-') {
        Some((d, rest)) => {
            let days: u64 = d
                .trim()
                .parse()
                .map_err(|_| ElapsedTimeError::BadNumber(s.to_string()))?;
            (days, rest)
        }
        None => (0, s),
    };
    let fields: Vec<&str> = clock.split(':').collect();
    if fields.len() != 3 {
        return Err(ElapsedTimeError::BadFormat(s.to_string()));
    }
    let mut parts = [0u64; 3];
    for (slot, field) in parts.iter_mut().zip(&fields) {
        *slot = field
            .trim()
            .parse()
            .map_err(|_| ElapsedTimeError::BadNumber(s.to_string()))?;
    }
    let [hours, minutes, seconds] = parts;
    Ok(days as f64 * 24.0 + hours as f64 + minutes as f64 / 60.0 + seconds as f64 / 3600.0)
}

/// Walk one snapshot. Errored servers are skipped; processes owned by root
/// are excluded from every statistic; a malformed elapsed-time string counts
/// as zero hours rather than failing the pass.
pub fn reduce(snapshot: &Snapshot, aliases: &AliasMap) -> SnapshotReduction {
    let mut out = SnapshotReduction::default();

    for server in &snapshot.servers {
        if server.error.is_some() {
            continue;
        }

        let mut coop = ServerCoop {
            name: server.name.clone(),
            ..Default::default()
        };

        for gpu in &server.gpus {
            let on_this_gpu = coop.gpu_users.entry(gpu.index).or_default();
            out.total_capacity_mb += gpu.mem_total;

            for proc in &gpu.processes {
                if proc.user == "root" {
                    continue;
                }
                let canonical = aliases.canonicalize(&proc.user);

                coop.users.insert(canonical.clone());
                on_this_gpu.insert(canonical.clone());

                let stats = out.user_stats.entry(canonical.clone()).or_default();
                stats.gpus.insert(format!("{}:{}", server.name, gpu.index));
                stats.machines.insert(server.name.clone());
                stats.total_mem_mb += proc.mem;
                if gpu.mem_total > 0 {
                    let mem_percent = gpu.mem_used as f64 / gpu.mem_total as f64 * 100.0;
                    stats.max_gpu_mem_percent = stats.max_gpu_mem_percent.max(mem_percent);
                }
                stats.max_gpu_util = stats.max_gpu_util.max(gpu.util);
                let hours = parse_elapsed_hours(&proc.elapsed_time).unwrap_or(0.0);
                stats.max_process_hours = stats.max_process_hours.max(hours);

                let totals = out.totals.entry(canonical).or_default();
                totals.mem_mb += proc.mem;
                totals.machines.insert(server.name.clone());
                totals.raw_users.insert(proc.user.clone());
            }
        }

        if server.cpu_util > CPU_HOG_UTIL {
            for user in &coop.users {
                if let Some(stats) = out.user_stats.get_mut(user) {
                    stats.cpu_machines.insert(server.name.clone());
                }
            }
        }
        if server.cpu_util > CPU_ATTRIBUTION_UTIL {
            for user in &coop.users {
                if let Some(totals) = out.totals.get_mut(user) {
                    totals.machines.insert(format!("{} (CPU)", server.name));
                }
            }
        }

        out.coop.push(coop);
    }

    out
}
