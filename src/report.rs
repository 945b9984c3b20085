use crate::ast::Location;
use crate::fl::Suspiciousness;
use crate::run_report::RepairRunReport;
use crate::variant::{Base, Operation};

/// Print every solution with its edits and diff.
pub fn print_solutions(report: &RepairRunReport) {
    if report.solutions.is_empty() {
        return;
    }

    println!("--- solutions ({}) ---", report.solutions.len());
    for s in &report.solutions {
        println!(
            "{} (generation {}, {} edits)",
            s.id,
            s.generation,
            s.gene.len()
        );
        for base in s.gene.bases() {
            println!("  {}", format_base(base));
        }
        print!("{}", s.diff);
    }
}

/// Print the `top` most suspicious statements.
pub fn print_suspicious(ranked: &[Suspiciousness], top: usize) {
    if ranked.is_empty() {
        println!("no suspicious statements (no failing test executes product code)");
        return;
    }

    println!(
        "--- suspicious statements ({} of {}) ---",
        ranked.len().min(top),
        ranked.len()
    );
    for s in ranked.iter().take(top) {
        println!("{:>7.4}  {}", s.value, format_location(&s.location));
    }
}

/// `file:line[-line] kind: text`, with the text cut to one line.
pub fn format_location(location: &Location) -> String {
    let lines = if location.lines.start == location.lines.end {
        location.lines.start.to_string()
    } else {
        format!("{}-{}", location.lines.start, location.lines.end)
    };
    format!(
        "{file}:{lines} {kind:?}: {text}",
        file = location.file.display(),
        kind = location.kind,
        text = one_line(&location.text),
    )
}

/// One edit as a single readable line.
pub fn format_base(base: &Base) -> String {
    let target = format_location(&base.location);
    match &base.operation {
        Operation::Delete | Operation::NoOp => format!("{} {}", base.operation.name(), target),
        Operation::Insert { donor } | Operation::Replace { donor } => format!(
            "{} {} <- {:?}",
            base.operation.name(),
            target,
            one_line(&donor.text)
        ),
    }
}

fn one_line(text: &str) -> String {
    const MAX: usize = 60;
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= MAX {
        flat
    } else {
        let cut: String = flat.chars().take(MAX - 3).collect();
        format!("{cut}...")
    }
}
