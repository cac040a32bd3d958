// Snapshot document types (shape written by the fetch scripts on hub and spokes)

use serde::{Deserialize, Serialize};

/// One poll cycle across the cluster. Field defaults are deliberate: snapshot
/// documents come from external collectors and may omit anything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub servers: Vec<ServerRecord>,
    #[serde(default)]
    pub last_updated: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerRecord {
    #[serde(default)]
    pub name: String,
    /// Server-wide CPU utilization percent, 0 when the collector didn't report it.
    #[serde(default)]
    pub cpu_util: f64,
    /// Set when the collector failed to reach the machine; such a server
    /// contributes nothing to reduction.
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub gpus: Vec<GpuRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GpuRecord {
    #[serde(default)]
    pub index: u32,
    /// MiB
    #[serde(default)]
    pub mem_used: u64,
    /// MiB
    #[serde(default)]
    pub mem_total: u64,
    /// Percent
    #[serde(default)]
    pub util: f64,
    #[serde(default)]
    pub processes: Vec<ProcessRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessRecord {
    /// PIDs arrive as strings (csv output of the inventory tool).
    #[serde(default)]
    pub pid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub user: String,
    /// GPU memory used by this process, MiB.
    #[serde(default)]
    pub mem: u64,
    /// `H:MM:SS` or `D-H:MM:SS`. Older collectors wrote this under `time`.
    #[serde(default, alias = "time")]
    pub elapsed_time: String,
}
