// Shared test helpers

use gpustats::models::*;

pub fn proc(user: &str, mem: u64, elapsed_time: &str) -> ProcessRecord {
    ProcessRecord {
        pid: "1234".to_string(),
        name: "python".to_string(),
        user: user.to_string(),
        mem,
        elapsed_time: elapsed_time.to_string(),
    }
}

pub fn gpu(index: u32, mem_used: u64, mem_total: u64, util: f64, processes: Vec<ProcessRecord>) -> GpuRecord {
    GpuRecord {
        index,
        mem_used,
        mem_total,
        util,
        processes,
    }
}

pub fn server(name: &str, cpu_util: f64, gpus: Vec<GpuRecord>) -> ServerRecord {
    ServerRecord {
        name: name.to_string(),
        cpu_util,
        error: None,
        gpus,
    }
}

pub fn snapshot(servers: Vec<ServerRecord>) -> Snapshot {
    Snapshot {
        servers,
        last_updated: None,
    }
}
