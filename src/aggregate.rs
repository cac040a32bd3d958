// Lifetime usage aggregate: per-user accumulators plus a cluster-wide
// capacity singleton, folded forward one snapshot at a time. Persisted as a
// whole JSON document (see store.rs).

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::reducer::UserSnapshotTotals;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregateStore {
    #[serde(default)]
    pub users: HashMap<String, AggregateUserRecord>,
    #[serde(default)]
    pub cluster: ClusterAggregate,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Ever-growing per-user record. `samples`, `total_mem_accum`,
/// `total_gb_hours` and `all_machines` never decrease across cycles.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregateUserRecord {
    /// Accumulated MiB-samples of GPU memory.
    #[serde(default)]
    pub total_mem_accum: u64,
    /// Derived: MiB-samples -> GiB-hours under a one-sample-per-minute cadence.
    #[serde(default)]
    pub total_gb_hours: f64,
    #[serde(default)]
    pub samples: u64,
    /// Derived: total_mem_accum / samples.
    #[serde(default)]
    pub avg_mem: f64,
    #[serde(default)]
    pub last_sample_mem: u64,
    #[serde(default)]
    pub first_seen: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
    #[serde(default)]
    pub all_machines: BTreeSet<String>,
    #[serde(default)]
    pub last_sample_machines: BTreeSet<String>,
    #[serde(default)]
    pub raw_users_seen: BTreeSet<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterAggregate {
    /// Accumulated MiB-samples of total GPU capacity.
    #[serde(default)]
    pub total_capacity_accum: u64,
    #[serde(default)]
    pub samples: u64,
    #[serde(default)]
    pub last_capacity: u64,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

/// MiB-samples -> GiB-hours, assuming one sample per minute. The cadence is
/// assumed, not measured.
fn gb_hours(total_mem_accum: u64) -> f64 {
    total_mem_accum as f64 / 1024.0 / 60.0
}

/// Fold one snapshot's totals into the store. Must run before the lifetime
/// achievement pass of the same cycle, which reads the updated records.
pub fn update(
    store: &mut AggregateStore,
    totals: &HashMap<String, UserSnapshotTotals>,
    capacity_mb: u64,
    now: DateTime<Utc>,
) {
    store.cluster.total_capacity_accum += capacity_mb;
    store.cluster.samples += 1;
    store.cluster.last_capacity = capacity_mb;
    store.cluster.last_updated = Some(now);

    for (user, user_totals) in totals {
        let record = store.users.entry(user.clone()).or_default();
        if record.first_seen.is_none() {
            record.first_seen = Some(now);
        }
        record.total_mem_accum += user_totals.mem_mb;
        record.samples += 1;
        record.last_sample_mem = user_totals.mem_mb;
        record.last_seen = Some(now);
        record
            .all_machines
            .extend(user_totals.machines.iter().cloned());
        record.last_sample_machines = user_totals.machines.iter().cloned().collect();
        record
            .raw_users_seen
            .extend(user_totals.raw_users.iter().cloned());
        record.avg_mem = record.total_mem_accum as f64 / record.samples as f64;
        record.total_gb_hours = gb_hours(record.total_mem_accum);
    }

    store.updated_at = Some(now);
}
