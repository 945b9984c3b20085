use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use similar::TextDiff;

use crate::engine::RepairOutcome;
use crate::run_report::RepairRunReport;
use crate::source::GeneratedSource;
use crate::store::StoreSnapshot;
use crate::variant::VariantId;

/// Unified diff of every file that differs between `original` and `variant`,
/// in path order. Empty when the programs are identical.
pub fn unified_diff(original: &GeneratedSource, variant: &GeneratedSource) -> String {
    let mut out = String::new();
    for file in variant.files() {
        let before = original.file(&file.path).map(|f| f.text()).unwrap_or_default();
        if before == file.text() {
            continue;
        }
        let name = file.path.display().to_string();
        let diff = TextDiff::from_lines(before, file.text());
        out.push_str(
            &diff
                .unified_diff()
                .context_radius(3)
                .header(&format!("a/{name}"), &format!("b/{name}"))
                .to_string(),
        );
    }
    out
}

/// Write every artifact of a finished run into `out_dir`.
pub fn write_all(out_dir: &Path, outcome: &RepairOutcome, report: &RepairRunReport) -> Result<()> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create output dir {:?}", out_dir))?;
    write_history_json(out_dir, outcome)?;
    write_patches(out_dir, outcome)?;
    write_log(out_dir, report)
}

/// Write `history.json`: the store snapshot plus the lineage of each solution.
pub fn write_history_json(out_dir: &Path, outcome: &RepairOutcome) -> Result<()> {
    #[derive(Debug, Serialize)]
    struct SolutionLineage {
        id: VariantId,
        ancestors: Vec<VariantId>,
    }

    #[derive(Debug, Serialize)]
    struct HistoryFile {
        #[serde(flatten)]
        snapshot: StoreSnapshot,
        solutions: Vec<SolutionLineage>,
    }

    let store = &outcome.store;
    let file = HistoryFile {
        snapshot: store.snapshot(),
        solutions: outcome
            .solutions()
            .iter()
            .map(|v| SolutionLineage {
                id: v.id(),
                ancestors: store.lineage(v.id()).iter().map(|a| a.id()).collect(),
            })
            .collect(),
    };

    write_pretty_json(&out_dir.join("history.json"), &file)
}

/// Write `patches/000001.diff` per solution, named by variant id.
pub fn write_patches(out_dir: &Path, outcome: &RepairOutcome) -> Result<()> {
    let dir = out_dir.join("patches");
    fs::create_dir_all(&dir).with_context(|| format!("failed to create patch dir {:?}", dir))?;

    let original = outcome.store.initial().source();
    for v in outcome.solutions() {
        let path = dir.join(format!("{:06}.diff", v.id().0));
        let content = unified_diff(original, v.source());
        fs::write(&path, content).with_context(|| format!("failed to write {:?}", path))?;
    }
    Ok(())
}

/// Write a stable `log` file (no timestamps) with the run summary and error.
pub fn write_log(out_dir: &Path, report: &RepairRunReport) -> Result<()> {
    let path = out_dir.join("log");

    let mut lines = Vec::new();
    lines.push(format!("tool: {}", report.tool));
    lines.push(format!("version: {}", report.version));
    lines.push(format!("project_root: {}", report.project_root.display()));
    lines.push(format!("seed: {}", report.seed));
    if let Some(initial) = &report.initial {
        lines.push(format!(
            "initial: build_success={} passed={} total={}",
            initial.build_success, initial.passed, initial.total
        ));
    }
    if let Some(stop) = report.stop {
        lines.push(format!("stop: {stop:?}"));
    }
    lines.push(format!("generations: {}", report.generations.len()));
    lines.push(format!("variants: {}", report.variants));
    let ids: Vec<String> = report.solutions.iter().map(|s| s.id.to_string()).collect();
    lines.push(format!("solutions: {}", ids.join(" ")).trim_end().to_string());
    if let Some(err) = &report.error {
        lines.push(format!("error: {err}"));
    }

    let content = lines.join("\n") + "\n";
    fs::write(&path, content).with_context(|| format!("failed to write {:?}", path))?;
    Ok(())
}

// `?Sized` allows passing unsized values such as slices.
fn write_pretty_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("serialize json")?;
    fs::write(path, json).with_context(|| format!("failed to write {:?}", path))?;
    Ok(())
}
