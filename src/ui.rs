use console::{Term, style};
use std::{env, fmt::Display};

use crate::engine::GenerationSummary;
use crate::variant::{Fitness, Variant};

/// Small UI helper:
/// - normal mode: human output to stdout, errors to stderr
/// - `--json` mode: ALL human output to stderr (stdout stays machine-readable JSON)
/// - fancy styling only on a real TTY and when NO_COLOR/CI are not set
#[derive(Debug, Clone)]
pub struct Ui {
    out: Term,
    err: Term,
    fancy: bool,
    enabled: bool,

    // Observability hooks for unit tests. These do not affect output formatting.
    generations_reported: u64,
    solutions_reported: u64,
    build_failures_seen: u64,
}

impl Ui {
    pub fn new(json: bool) -> Self {
        // In --json mode, keep stdout clean for JSON and send all human output to stderr.
        let out = if json { Term::stderr() } else { Term::stdout() };
        let err = Term::stderr();

        // Fancy output must only activate when the actual stream used for human output is a TTY.
        let out_is_tty = out.is_term();

        let no_color = env::var_os("NO_COLOR").is_some();
        let in_ci = env::var_os("CI").is_some();

        let fancy = out_is_tty && !no_color && !in_ci;

        Self {
            out,
            err,
            fancy,
            enabled: true,
            generations_reported: 0,
            solutions_reported: 0,
            build_failures_seen: 0,
        }
    }

    /// Kept behind cfg(test) so it doesn't trigger dead_code in `cargo run`.
    #[cfg(test)]
    pub fn silent() -> Self {
        Self {
            out: Term::stdout(),
            err: Term::stderr(),
            fancy: false,
            enabled: false,
            generations_reported: 0,
            solutions_reported: 0,
            build_failures_seen: 0,
        }
    }

    fn write_out(&self, s: &str) {
        if self.enabled {
            let _ = self.out.write_line(s);
        }
    }

    fn write_err(&self, s: &str) {
        if self.enabled {
            let _ = self.err.write_line(s);
        }
    }

    pub fn line(&self, msg: impl Display) {
        self.write_out(&msg.to_string());
    }

    pub fn title(&self, msg: impl Display) {
        let s = msg.to_string();
        if self.fancy {
            self.write_out(&style(s).bold().to_string());
        } else {
            self.write_out(&s);
        }
    }

    pub fn warn(&self, msg: impl Display) {
        let s = msg.to_string();
        if self.fancy {
            self.write_err(&style(s).yellow().to_string());
        } else {
            self.write_err(&s);
        }
    }

    pub fn error(&self, msg: impl Display) {
        let s = msg.to_string();
        if self.fancy {
            self.write_err(&style(s).red().bold().to_string());
        } else {
            self.write_err(&s);
        }
    }

    /// Outcome of building and testing the unmodified program.
    pub fn initial_result(&mut self, initial: &Variant) {
        if !initial.build().success {
            self.build_failures_seen += 1;
            self.warn("original program does not build; every test counts as failing");
            return;
        }
        let tests = initial.test_results();
        self.line(format!(
            "original program: {} of {} tests pass",
            tests.passed_count(),
            tests.total()
        ));
    }

    /// One line per finished generation.
    ///
    /// In non-fancy mode the line is plain and stable for snapshot tests.
    pub fn generation_progress(&mut self, summary: &GenerationSummary) {
        self.generations_reported += 1;
        self.build_failures_seen += summary.build_failures as u64;

        let best = fitness_label(summary.best);
        if !self.fancy {
            self.line(format!(
                "generation {}: {} variants, {} build failures, {} complete, best {}",
                summary.generation, summary.offspring, summary.build_failures, summary.complete, best
            ));
            return;
        }

        let tag = if summary.complete > 0 {
            style("FOUND").green().bold()
        } else {
            style("SEARCH").cyan().bold()
        };
        self.line(format!(
            "{tag} {ms:>6}ms  gen {g:>3}  {n} variants  {f} build failures  best {best}",
            ms = summary.elapsed_ms,
            g = summary.generation,
            n = summary.offspring,
            f = summary.build_failures,
        ));
    }

    pub fn solution_found(&mut self, variant: &Variant) {
        self.solutions_reported += 1;
        let msg = format!(
            "solution {} found in generation {} ({} edits)",
            variant.id(),
            variant.generation(),
            variant.gene().len()
        );
        if self.fancy {
            self.line(style(msg).green().to_string());
        } else {
            self.line(msg);
        }
    }

    pub fn is_fancy(&self) -> bool {
        self.fancy && self.enabled
    }
}

/// `passed/total` for evaluated programs.
pub fn fitness_label(fitness: Fitness) -> String {
    match fitness {
        Fitness::BuildFailed => "build failed".to_string(),
        Fitness::Evaluated { passed, total } => format!("{passed}/{total}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::BuildResult;
    use crate::source::GeneratedSource;
    use crate::test_results::TestResults;
    use crate::variant::{Gene, HistoricalElement, VariantId};
    use std::sync::Arc;

    #[test]
    fn is_fancy_requires_fancy_and_enabled() {
        let base = Ui::silent();

        let mut a = base.clone();
        a.fancy = true;
        assert!(!a.is_fancy());

        let mut b = base.clone();
        b.enabled = true;
        assert!(!b.is_fancy());

        let mut c = base;
        c.fancy = true;
        c.enabled = true;
        assert!(c.is_fancy());
    }

    #[test]
    fn progress_tracks_generations_and_failures() {
        let mut ui = Ui::silent();
        let summary = GenerationSummary {
            generation: 1,
            offspring: 4,
            build_failures: 3,
            duplicates: 0,
            complete: 0,
            best: Fitness::Evaluated { passed: 1, total: 2 },
            elapsed_ms: 5,
        };
        ui.generation_progress(&summary);
        ui.generation_progress(&summary);
        assert_eq!(ui.generations_reported, 2);
        assert_eq!(ui.build_failures_seen, 6);

        let broken = Variant::new(
            VariantId(0),
            0,
            Gene::default(),
            HistoricalElement::Initial,
            Arc::new(GeneratedSource::default()),
            BuildResult::failure("nope"),
            TestResults::empty(),
        );
        ui.initial_result(&broken);
        assert_eq!(ui.build_failures_seen, 7);
        ui.solution_found(&broken);
        assert_eq!(ui.solutions_reported, 1);
    }

    #[test]
    fn fitness_labels() {
        assert_eq!(fitness_label(Fitness::BuildFailed), "build failed");
        assert_eq!(fitness_label(Fitness::Evaluated { passed: 2, total: 3 }), "2/3");
    }
}
