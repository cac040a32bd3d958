// One evaluation cycle: reduce the snapshot, fold the aggregate, then run the
// achievement checks. The aggregate update must complete before the lifetime
// pass, which reads the just-updated records; this module owns that ordering.

use chrono::{DateTime, Utc};

use crate::achievements::{AchievementStore, Catalog, EarnedAchievement, check_achievements};
use crate::aggregate::{self, AggregateStore};
use crate::alias::AliasMap;
use crate::models::Snapshot;
use crate::reducer::reduce;

#[derive(Debug)]
pub struct CycleOutcome {
    pub newly_earned: Vec<EarnedAchievement>,
    /// Distinct canonical users active in this snapshot.
    pub active_users: usize,
    /// Cluster GPU capacity seen in this snapshot, MiB.
    pub capacity_mb: u64,
}

/// Consume one snapshot: mutates both stores, returns what was newly earned.
pub fn run_cycle(
    snapshot: &Snapshot,
    aliases: &AliasMap,
    catalog: &Catalog,
    aggregate: &mut AggregateStore,
    achievements: &mut AchievementStore,
    now: DateTime<Utc>,
) -> CycleOutcome {
    let reduction = reduce(snapshot, aliases);
    aggregate::update(
        aggregate,
        &reduction.totals,
        reduction.total_capacity_mb,
        now,
    );
    let newly_earned = check_achievements(
        &reduction,
        aggregate,
        aliases,
        achievements,
        catalog,
        now,
    );
    CycleOutcome {
        newly_earned,
        active_users: reduction.user_stats.len(),
        capacity_mb: reduction.total_capacity_mb,
    }
}
