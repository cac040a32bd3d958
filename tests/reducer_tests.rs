// Snapshot reducer tests: elapsed-time parsing, root exclusion, cpu-hog
// attribution, capacity and totals

mod common;

use common::*;
use gpustats::alias::AliasMap;
use gpustats::reducer::{ElapsedTimeError, parse_elapsed_hours, reduce};

#[test]
fn parse_elapsed_hours_plain_clock() {
    let hours = parse_elapsed_hours("00:10:00").unwrap();
    assert!((hours - 1.0 / 6.0).abs() < 1e-9);
}

#[test]
fn parse_elapsed_hours_with_days() {
    let hours = parse_elapsed_hours("1-02:34:56").unwrap();
    let expected = 24.0 + 2.0 + 34.0 / 60.0 + 56.0 / 3600.0;
    assert!((hours - expected).abs() < 1e-9);
}

#[test]
fn parse_elapsed_hours_rejects_garbage() {
    assert_eq!(
        parse_elapsed_hours("garbage"),
        Err(ElapsedTimeError::BadFormat("garbage".to_string()))
    );
    assert!(parse_elapsed_hours("12:34").is_err());
    assert!(parse_elapsed_hours("a:b:c").is_err());
    assert!(parse_elapsed_hours("x-01:02:03").is_err());
}

#[test]
fn malformed_elapsed_time_counts_as_zero_hours() {
    let snap = snapshot(vec![server(
        "lambda",
        0.0,
        vec![gpu(0, 100, 1000, 10.0, vec![proc("alice", 100, "garbage")])],
    )]);
    let reduction = reduce(&snap, &AliasMap::new());
    let stats = &reduction.user_stats["alice"];
    assert_eq!(stats.max_process_hours, 0.0);
    // The rest of the record still counts.
    assert_eq!(stats.total_mem_mb, 100);
}

#[test]
fn root_processes_are_excluded_everywhere() {
    let snap = snapshot(vec![server(
        "lambda",
        99.0,
        vec![gpu(0, 999, 1000, 99.0, vec![proc("root", 500_000, "2-00:00:00")])],
    )]);
    let reduction = reduce(&snap, &AliasMap::new());
    assert!(reduction.user_stats.is_empty());
    assert!(reduction.totals.is_empty());
    assert!(reduction.coop[0].users.is_empty());
    // Capacity is a cluster property, counted regardless of who runs there.
    assert_eq!(reduction.total_capacity_mb, 1000);
}

#[test]
fn errored_server_contributes_nothing() {
    let mut bad = server(
        "down",
        0.0,
        vec![gpu(0, 500, 1000, 50.0, vec![proc("alice", 100, "01:00:00")])],
    );
    bad.error = Some("Failed to connect or run nvidia-smi.".to_string());
    let snap = snapshot(vec![bad]);
    let reduction = reduce(&snap, &AliasMap::new());
    assert!(reduction.user_stats.is_empty());
    assert!(reduction.coop.is_empty());
    assert_eq!(reduction.total_capacity_mb, 0);
}

#[test]
fn transient_stats_track_distinct_gpus_and_maxima() {
    let snap = snapshot(vec![
        server(
            "lambda",
            0.0,
            vec![
                gpu(
                    0,
                    900,
                    1000,
                    97.0,
                    vec![proc("alice", 100, "01:00:00"), proc("alice", 50, "25:00:00")],
                ),
                gpu(1, 100, 1000, 12.0, vec![proc("alice", 200, "00:30:00")]),
            ],
        ),
        server(
            "titan",
            0.0,
            vec![gpu(0, 10, 1000, 5.0, vec![proc("alice", 300, "00:00:30")])],
        ),
    ]);
    let reduction = reduce(&snap, &AliasMap::new());
    let stats = &reduction.user_stats["alice"];
    assert_eq!(stats.gpu_count(), 3);
    assert_eq!(stats.machines.len(), 2);
    assert_eq!(stats.total_mem_mb, 650);
    assert_eq!(stats.max_gpu_mem_percent, 90.0);
    assert_eq!(stats.max_gpu_util, 97.0);
    assert_eq!(stats.max_process_hours, 25.0);
    assert_eq!(reduction.total_capacity_mb, 3000);
}

#[test]
fn zero_mem_total_does_not_divide() {
    let snap = snapshot(vec![server(
        "lambda",
        0.0,
        vec![gpu(0, 500, 0, 10.0, vec![proc("alice", 100, "00:01:00")])],
    )]);
    let reduction = reduce(&snap, &AliasMap::new());
    assert_eq!(reduction.user_stats["alice"].max_gpu_mem_percent, 0.0);
}

#[test]
fn cpu_hog_attribution_is_server_wide() {
    // alice on GPU0 only; the server is a CPU hog, so she gets the machine
    // even though her process didn't cause it.
    let snap = snapshot(vec![server(
        "lambda",
        96.0,
        vec![
            gpu(0, 100, 1000, 10.0, vec![proc("alice", 100, "00:01:00")]),
            gpu(1, 100, 1000, 10.0, vec![proc("bob", 100, "00:01:00")]),
        ],
    )]);
    let reduction = reduce(&snap, &AliasMap::new());
    assert_eq!(reduction.user_stats["alice"].cpu_machines.len(), 1);
    assert_eq!(reduction.user_stats["bob"].cpu_machines.len(), 1);
}

#[test]
fn cpu_hog_threshold_is_strictly_above_95() {
    let snap = snapshot(vec![server(
        "lambda",
        95.0,
        vec![gpu(0, 100, 1000, 10.0, vec![proc("alice", 100, "00:01:00")])],
    )]);
    let reduction = reduce(&snap, &AliasMap::new());
    assert!(reduction.user_stats["alice"].cpu_machines.is_empty());
}

#[test]
fn cpu_tag_widens_aggregate_machines_at_lower_threshold() {
    let snap = snapshot(vec![server(
        "lambda",
        85.0,
        vec![gpu(0, 100, 1000, 10.0, vec![proc("alice", 100, "00:01:00")])],
    )]);
    let reduction = reduce(&snap, &AliasMap::new());
    // Transient cpu_machines only fills above the 95% hog threshold.
    assert!(reduction.user_stats["alice"].cpu_machines.is_empty());
    let totals = &reduction.totals["alice"];
    assert!(totals.machines.contains("lambda"));
    assert!(totals.machines.contains("lambda (CPU)"));
}

#[test]
fn totals_sum_mem_and_collect_raw_users() {
    let aliases = AliasMap::from_pairs([("jsmith", "john"), ("jdoe", "john")]);
    let snap = snapshot(vec![server(
        "lambda",
        0.0,
        vec![gpu(
            0,
            100,
            1000,
            10.0,
            vec![proc("jsmith", 100, "00:01:00"), proc("jdoe", 200, "00:01:00")],
        )],
    )]);
    let reduction = reduce(&snap, &aliases);
    let totals = &reduction.totals["john"];
    assert_eq!(totals.mem_mb, 300);
    assert_eq!(totals.raw_users.len(), 2);
    assert!(totals.raw_users.contains("jsmith"));
}

#[test]
fn empty_username_maps_to_unknown() {
    let snap = snapshot(vec![server(
        "lambda",
        0.0,
        vec![gpu(0, 100, 1000, 10.0, vec![proc("", 100, "00:01:00")])],
    )]);
    let reduction = reduce(&snap, &AliasMap::new());
    assert!(reduction.user_stats.contains_key("unknown"));
}

#[test]
fn unoccupied_gpus_still_appear_in_coop_sets() {
    let snap = snapshot(vec![server(
        "lambda",
        0.0,
        vec![
            gpu(0, 100, 1000, 10.0, vec![proc("alice", 100, "00:01:00")]),
            gpu(1, 0, 1000, 0.0, vec![]),
        ],
    )]);
    let reduction = reduce(&snap, &AliasMap::new());
    let coop = &reduction.coop[0];
    assert_eq!(coop.gpu_users.len(), 2);
    assert!(coop.gpu_users[&1].is_empty());
}
