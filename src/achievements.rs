// Achievement catalog, two-phase evaluator, and the write-once earn store.
// Awarding is idempotent: an (user, id) pair is inserted at most once and is
// never re-timestamped or revoked.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate::AggregateStore;
use crate::alias::AliasMap;
use crate::reducer::SnapshotReduction;

/// Display-ordering rarity rank. Platinum sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl Tier {
    pub fn rank(self) -> u8 {
        match self {
            Tier::Platinum => 0,
            Tier::Gold => 1,
            Tier::Silver => 2,
            Tier::Bronze => 3,
        }
    }
}

impl Default for Tier {
    fn default() -> Self {
        Tier::Bronze
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AchievementDef {
    pub id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub tier: Tier,
}

/// Immutable id -> definition table, injected into the evaluator so tests can
/// substitute a reduced catalog.
#[derive(Debug, Clone, Default)]
pub struct Catalog(HashMap<String, AchievementDef>);

fn def(id: &str, name: &str, description: &str, icon: &str, tier: Tier) -> AchievementDef {
    AchievementDef {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        icon: icon.to_string(),
        tier,
    }
}

impl Catalog {
    pub fn from_defs(defs: impl IntoIterator<Item = AchievementDef>) -> Self {
        Self(defs.into_iter().map(|d| (d.id.clone(), d)).collect())
    }

    /// The standard catalog. Fixed for the process lifetime.
    pub fn standard() -> Self {
        Self::from_defs([
            // GPU
            def(
                "quad_gpu_master",
                "Quad GPU Master",
                "Use 4 or more GPUs simultaneously",
                "🎯",
                Tier::Gold,
            ),
            def(
                "gpu_hoarder",
                "GPU Hoarder",
                "Use 8 or more GPUs simultaneously",
                "💎",
                Tier::Platinum,
            ),
            def(
                "memory_titan",
                "Memory Titan",
                "Achieve >= 90% memory utilization on a single GPU",
                "🏔️",
                Tier::Gold,
            ),
            def(
                "memory_perfectionist",
                "Memory Perfectionist",
                "Achieve >= 99% memory utilization on a single GPU",
                "💯",
                Tier::Platinum,
            ),
            def(
                "utilization_champion",
                "Utilization Champion",
                "Achieve >= 95% GPU utilization",
                "⚡",
                Tier::Gold,
            ),
            def(
                "gpu_marathon",
                "GPU Marathon",
                "Run a process for over 24 hours on a GPU",
                "🏃",
                Tier::Silver,
            ),
            def(
                "gpu_ultra_marathon",
                "GPU Ultra Marathon",
                "Run a process for over 7 days on a GPU",
                "🏃‍♂️💨",
                Tier::Gold,
            ),
            // Memory
            def(
                "ram_beast",
                "RAM Beast",
                "Use more than 300GB RAM at once",
                "🐂",
                Tier::Gold,
            ),
            def(
                "ram_monster",
                "RAM Monster",
                "Use more than 500GB RAM at once",
                "👹",
                Tier::Platinum,
            ),
            // CPU
            def(
                "cpu_maximus",
                "CPU Maximus",
                "Use all CPU cores (>95% CPU utilization)",
                "🔥",
                Tier::Gold,
            ),
            // Multi-machine
            def(
                "cluster_commander",
                "Cluster Commander",
                "Use GPUs on 3 or more different machines simultaneously",
                "🎖️",
                Tier::Gold,
            ),
            def(
                "cluster_overlord",
                "Cluster Overlord",
                "Use GPUs on 5 or more different machines simultaneously",
                "👑",
                Tier::Platinum,
            ),
            // Lifetime
            def(
                "gpu_veteran",
                "GPU Veteran",
                "Accumulate 100 GB-Hours of GPU usage",
                "🎖️",
                Tier::Silver,
            ),
            def(
                "gpu_hero",
                "GPU Hero",
                "Accumulate 1,000 GB-Hours of GPU usage",
                "🦸",
                Tier::Gold,
            ),
            def(
                "gpu_legend",
                "GPU Legend",
                "Accumulate 10,000 GB-Hours of GPU usage",
                "⭐",
                Tier::Platinum,
            ),
            // Coop
            def(
                "gpu_roommate",
                "GPU Roommate",
                "Share a GPU with another user",
                "🤝",
                Tier::Bronze,
            ),
            def(
                "party_machine",
                "Party Machine",
                "Have 4 or more different users using GPUs on the same machine",
                "🎉",
                Tier::Gold,
            ),
            def(
                "full_house",
                "Full House",
                "Have all GPUs on a machine occupied by different users",
                "🏠",
                Tier::Gold,
            ),
            // Milestones
            def(
                "first_blood",
                "First Blood",
                "Use your first GPU",
                "🩸",
                Tier::Bronze,
            ),
            def(
                "globe_trotter",
                "Globe Trotter",
                "Use GPUs on 10 different machines (lifetime)",
                "🌍",
                Tier::Platinum,
            ),
            def(
                "efficiency_expert",
                "Efficiency Expert",
                "Maintain >80% GPU utilization across all your active GPUs",
                "📊",
                Tier::Gold,
            ),
        ])
    }

    pub fn get(&self, id: &str) -> Option<&AchievementDef> {
        self.0.get(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One earned achievement as persisted: timestamp plus a snapshot of the
/// definition at earn time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarnRecord {
    pub earned_at: DateTime<Utc>,
    pub achievement: AchievementDef,
}

/// Persisted user -> achievement id -> earn record mapping.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AchievementStore {
    #[serde(default)]
    pub users: HashMap<String, HashMap<String, EarnRecord>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Notification event emitted on first insertion of a (user, id) pair.
#[derive(Debug, Clone, Serialize)]
pub struct EarnedAchievement {
    pub user: String,
    pub achievement_id: String,
    pub achievement: AchievementDef,
    pub timestamp: DateTime<Utc>,
}

impl AchievementStore {
    /// Insert (user, id) if absent; append a notification event on first
    /// insertion only. Existing records are never touched.
    fn award(
        &mut self,
        catalog: &Catalog,
        user: &str,
        id: &str,
        now: DateTime<Utc>,
        newly_earned: &mut Vec<EarnedAchievement>,
    ) {
        let user_achievements = self.users.entry(user.to_string()).or_default();
        if user_achievements.contains_key(id) {
            return;
        }
        let achievement = catalog.get(id).cloned().unwrap_or_default();
        user_achievements.insert(
            id.to_string(),
            EarnRecord {
                earned_at: now,
                achievement: achievement.clone(),
            },
        );
        newly_earned.push(EarnedAchievement {
            user: user.to_string(),
            achievement_id: id.to_string(),
            achievement,
            timestamp: now,
        });
    }

    /// All achievements of one user, sorted by tier rank (platinum first)
    /// then earn time ascending. Definitions resolve from the current
    /// catalog, falling back to the persisted snapshot for retired ids.
    pub fn user_achievements(&self, catalog: &Catalog, user: &str) -> Vec<UserAchievement> {
        let Some(user_achievements) = self.users.get(user) else {
            return Vec::new();
        };
        let mut list: Vec<UserAchievement> = user_achievements
            .iter()
            .map(|(id, record)| {
                let def = catalog.get(id).unwrap_or(&record.achievement);
                UserAchievement {
                    id: id.clone(),
                    name: def.name.clone(),
                    description: def.description.clone(),
                    icon: def.icon.clone(),
                    tier: def.tier,
                    earned_at: record.earned_at,
                }
            })
            .collect();
        list.sort_by(|a, b| {
            a.tier
                .rank()
                .cmp(&b.tier.rank())
                .then(a.earned_at.cmp(&b.earned_at))
        });
        list
    }

    /// Global distribution and leaderboard.
    pub fn overall_stats(&self) -> OverallStats {
        let mut distribution: HashMap<String, u64> = HashMap::new();
        let mut achievers: Vec<TopAchiever> = Vec::with_capacity(self.users.len());
        let mut total_earned = 0u64;

        for (user, user_achievements) in &self.users {
            total_earned += user_achievements.len() as u64;
            achievers.push(TopAchiever {
                user: user.clone(),
                count: user_achievements.len() as u64,
            });
            for id in user_achievements.keys() {
                *distribution.entry(id.clone()).or_insert(0) += 1;
            }
        }

        achievers.sort_by(|a, b| b.count.cmp(&a.count).then(a.user.cmp(&b.user)));
        achievers.truncate(10);

        OverallStats {
            total_earned,
            users_with_achievements: self.users.len(),
            distribution,
            top_achievers: achievers,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UserAchievement {
    pub id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub tier: Tier,
    pub earned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct OverallStats {
    pub total_earned: u64,
    pub users_with_achievements: usize,
    pub distribution: HashMap<String, u64>,
    pub top_achievers: Vec<TopAchiever>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopAchiever {
    pub user: String,
    pub count: u64,
}

/// Evaluate one cycle: coop pass over server occupancy, threshold pass over
/// transient stats, lifetime pass over the (already-updated) aggregate.
/// Returns the achievements earned for the first time this cycle.
pub fn check_achievements(
    reduction: &SnapshotReduction,
    aggregate: &AggregateStore,
    aliases: &AliasMap,
    store: &mut AchievementStore,
    catalog: &Catalog,
    now: DateTime<Utc>,
) -> Vec<EarnedAchievement> {
    let mut newly_earned = Vec::new();

    // Coop pass, per server.
    for server in &reduction.coop {
        if server.users.len() >= 4 {
            for user in &server.users {
                store.award(catalog, user, "party_machine", now, &mut newly_earned);
            }
        }

        let total_gpus = server.gpu_users.len();
        let occupied: Vec<_> = server
            .gpu_users
            .values()
            .filter(|users| !users.is_empty())
            .collect();
        if occupied.len() >= 2 && occupied.len() == total_gpus {
            let distinct: std::collections::HashSet<&String> =
                occupied.iter().flat_map(|users| users.iter()).collect();
            if distinct.len() >= 2 {
                for user in distinct {
                    store.award(catalog, user, "full_house", now, &mut newly_earned);
                }
            }
        }

        for users in server.gpu_users.values() {
            if users.len() >= 2 {
                for user in users {
                    store.award(catalog, user, "gpu_roommate", now, &mut newly_earned);
                }
            }
        }
    }

    // Threshold pass, per user with transient stats.
    for (user, stats) in &reduction.user_stats {
        store.award(catalog, user, "first_blood", now, &mut newly_earned);

        if stats.gpu_count() >= 4 {
            store.award(catalog, user, "quad_gpu_master", now, &mut newly_earned);
        }
        if stats.gpu_count() >= 8 {
            store.award(catalog, user, "gpu_hoarder", now, &mut newly_earned);
        }

        let total_mem_gb = stats.total_mem_mb as f64 / 1024.0;
        if total_mem_gb >= 300.0 {
            store.award(catalog, user, "ram_beast", now, &mut newly_earned);
        }
        if total_mem_gb >= 500.0 {
            store.award(catalog, user, "ram_monster", now, &mut newly_earned);
        }

        if stats.max_gpu_mem_percent >= 90.0 {
            store.award(catalog, user, "memory_titan", now, &mut newly_earned);
        }
        if stats.max_gpu_mem_percent >= 99.0 {
            store.award(catalog, user, "memory_perfectionist", now, &mut newly_earned);
        }

        if stats.max_gpu_util >= 95.0 {
            store.award(catalog, user, "utilization_champion", now, &mut newly_earned);
        }

        if stats.max_process_hours >= 24.0 {
            store.award(catalog, user, "gpu_marathon", now, &mut newly_earned);
        }
        if stats.max_process_hours >= 168.0 {
            store.award(catalog, user, "gpu_ultra_marathon", now, &mut newly_earned);
        }

        if !stats.cpu_machines.is_empty() {
            store.award(catalog, user, "cpu_maximus", now, &mut newly_earned);
        }

        if stats.machines.len() >= 3 {
            store.award(catalog, user, "cluster_commander", now, &mut newly_earned);
        }
        if stats.machines.len() >= 5 {
            store.award(catalog, user, "cluster_overlord", now, &mut newly_earned);
        }

        // Checks the maximum utilization only, not every active GPU.
        if stats.gpu_count() >= 1 && stats.max_gpu_util >= 80.0 {
            store.award(catalog, user, "efficiency_expert", now, &mut newly_earned);
        }
    }

    // Lifetime pass over the aggregate; keys are canonicalized too, so an
    // alias-merged history lands on the canonical identity.
    for (raw_user, record) in &aggregate.users {
        let user = aliases.canonicalize(raw_user);

        if record.total_gb_hours >= 100.0 {
            store.award(catalog, &user, "gpu_veteran", now, &mut newly_earned);
        }
        if record.total_gb_hours >= 1000.0 {
            store.award(catalog, &user, "gpu_hero", now, &mut newly_earned);
        }
        if record.total_gb_hours >= 10000.0 {
            store.award(catalog, &user, "gpu_legend", now, &mut newly_earned);
        }

        if record.all_machines.len() >= 10 {
            store.award(catalog, &user, "globe_trotter", now, &mut newly_earned);
        }
    }

    store.updated_at = Some(now);
    newly_earned
}
