//! Field alias table.
//!
//! Producers written at different times used different key names for the
//! same value. Each canonical field lists its aliases in priority order; the
//! first alias holding a usable value wins. Changing an order here changes
//! how existing documents normalize.

/// Canonical name first, then legacy names, newest producer first.
pub const TOTAL_MEMORY: &[&str] = &[
    "totalMemory",
    "total_memory",
    "memoria_total",
    "ram_total",
    "total_ram",
    "total",
];

pub const USED_MEMORY: &[&str] = &[
    "usedMemory",
    "used_memory",
    "memoria_usada",
    "ram_used",
    "uso_ram",
    "uso",
];

pub const FREE_MEMORY: &[&str] = &[
    "freeMemory",
    "free_memory",
    "memoria_libre",
    "ram_free",
    "ram_libre",
    "libre",
];

pub const MEMORY_USED_PERCENT: &[&str] = &[
    "memoryUsedPercent",
    "memory_used_percent",
    "memoryUsagePercent",
    "porcentaje_ram",
    "ram_percentage",
    "porcentaje_uso",
    "porcentaje",
];

pub const CPU_USED_PERCENT: &[&str] = &[
    "cpuUsedPercent",
    "cpu_used_percent",
    "cpuUsagePercent",
    "porcentaje_cpu_uso",
    "cpu_usage",
    "porcentaje_cpu",
    "porcentajeUso",
];

pub const RUNNING: &[&str] = &[
    "running",
    "runningProcesses",
    "running_processes",
    "procesos_corriendo",
];

pub const SLEEPING: &[&str] = &[
    "sleeping",
    "sleepingProcesses",
    "sleeping_processes",
    "procesos_durmiendo",
];

pub const STOPPED: &[&str] = &[
    "stopped",
    "stoppedProcesses",
    "stopped_processes",
    "procesos_parados",
];

pub const ZOMBIE: &[&str] = &[
    "zombie",
    "zombieProcesses",
    "zombie_processes",
    "procesos_zombie",
];

/// Process total inside a nested `processCounts` object.
pub const NESTED_TOTAL_PROCESSES: &[&str] =
    &["total", "totalProcesses", "total_processes", "total_procesos"];

/// Process total at the top level. Plain `total` is excluded: at this level
/// it is a memory alias.
pub const TOTAL_PROCESSES: &[&str] = &["totalProcesses", "total_processes", "total_procesos"];

pub const CAPTURED_AT: &[&str] = &["capturedAt", "captured_at", "hora", "timestamp"];

/// Key of the canonical nested process-count object.
pub const PROCESS_COUNTS: &str = "processCounts";
