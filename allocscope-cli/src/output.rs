use allocscope::{ReportEntry, ScanReport, ScanStats};
use serde::Serialize;

/// Print `data` as JSON (if `json`) or call `display_fn` for human-readable output.
pub fn print_output<T: Serialize>(
    data: &T,
    json: bool,
    display_fn: impl FnOnce(&T) -> anyhow::Result<()>,
) -> anyhow::Result<()> {
    if json {
        let json = serde_json::to_string_pretty(data)?;
        println!("{json}");
        Ok(())
    } else {
        display_fn(data)
    }
}

#[derive(Debug, Serialize)]
struct AllocationOutput {
    kind: String,
    type_name: String,
    il_offset: u32,
    document: Option<String>,
    line: Option<u32>,
}

#[derive(Debug, Serialize)]
struct MethodOutput {
    method: String,
    callers: Vec<String>,
    allocations: Vec<AllocationOutput>,
}

#[derive(Debug, Serialize)]
struct StatsOutput {
    methods_scanned: usize,
    methods_with_allocations: usize,
    objects: usize,
    arrays: usize,
    boxes: usize,
    pruned_edges: usize,
}

impl From<&ScanStats> for StatsOutput {
    fn from(stats: &ScanStats) -> Self {
        StatsOutput {
            methods_scanned: stats.methods_scanned,
            methods_with_allocations: stats.methods_with_allocations,
            objects: stats.objects,
            arrays: stats.arrays,
            boxes: stats.boxes,
            pruned_edges: stats.pruned_edges,
        }
    }
}

/// Serializable form of a finished scan.
#[derive(Debug, Serialize)]
pub struct ReportOutput {
    root: String,
    methods: Vec<MethodOutput>,
    stats: StatsOutput,
}

impl ReportOutput {
    pub fn new(report: &ScanReport, entries: Vec<ReportEntry>) -> Self {
        let methods = entries
            .into_iter()
            .map(|entry| MethodOutput {
                method: entry.method,
                callers: entry.callers,
                allocations: entry
                    .allocations
                    .into_iter()
                    .map(|allocation| AllocationOutput {
                        kind: allocation.kind.to_string(),
                        type_name: allocation.type_name,
                        il_offset: allocation.offset,
                        document: allocation.document,
                        line: allocation.line,
                    })
                    .collect(),
            })
            .collect();

        ReportOutput {
            root: report.root().to_string(),
            methods,
            stats: report.stats().into(),
        }
    }
}
