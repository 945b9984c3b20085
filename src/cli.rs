use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use crate::engine::RepairEngine;
use crate::options::{DonorSelection, FaultLocalizationKind, FileConfig, Options, SecondParentStrategy};
use crate::out;
use crate::project::TargetProject;
use crate::report::{print_solutions, print_suspicious};
use crate::run_report::{InitialReport, LocalizeReport, RepairRunReport};
use crate::scan::{ProjectOverview, scan_project};
use crate::source::GeneratedSource;
use crate::ui::{Ui, fitness_label};

const EXIT_OK: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_NO_SOLUTION: i32 = 2;

/// Top-level CLI arguments for the `genrepair` binary.
#[derive(Debug, Parser)]
#[command(
    name = "genrepair",
    version,
    about = "Automated program repair by test-driven genetic search"
)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Log at DEBUG level (RUST_LOG overrides).
    #[arg(long, short = 'v', global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Log errors only (RUST_LOG overrides).
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

/// Subcommands supported by `genrepair`.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print an overview of the project's sources.
    Scan {
        #[command(flatten)]
        args: ProjectArgs,
    },

    /// Build and test the original program and rank suspicious statements.
    Localize {
        #[command(flatten)]
        args: ProjectArgs,

        /// Number of statements to print.
        #[arg(long, default_value_t = 10)]
        top: usize,

        /// Emit a machine-readable JSON report to stdout.
        #[arg(long)]
        json: bool,
    },

    /// Search for repairs.
    Run {
        #[command(flatten)]
        args: ProjectArgs,

        /// Emit a machine-readable JSON report to stdout.
        #[arg(long)]
        json: bool,
    },
}

/// Project location plus overrides for every config file key.
#[derive(Debug, Clone, Args)]
pub struct ProjectArgs {
    /// Path to the project root [default: .].
    #[arg(long)]
    pub project: Option<PathBuf>,

    /// TOML file with run options. Flags take precedence.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Product source directory, relative to the root (repeatable).
    #[arg(long = "source")]
    pub sources: Vec<PathBuf>,

    /// Test source directory, relative to the root (repeatable).
    #[arg(long = "test")]
    pub tests: Vec<PathBuf>,

    /// Extra classpath entries, `:`-separated.
    #[arg(long, value_delimiter = ':')]
    pub classpath: Vec<PathBuf>,

    #[arg(long)]
    pub seed: Option<u64>,

    #[arg(long)]
    pub max_generations: Option<u32>,

    /// Wall-clock limit of the search, in seconds.
    #[arg(long)]
    pub time_limit: Option<u64>,

    /// Survivors kept per generation.
    #[arg(long)]
    pub headcount: Option<usize>,

    /// Mutation offspring per generation.
    #[arg(long)]
    pub mutations: Option<usize>,

    /// Crossover offspring per generation.
    #[arg(long)]
    pub crossovers: Option<usize>,

    #[arg(long)]
    pub max_gene_length: Option<usize>,

    #[arg(long)]
    pub required_solutions: Option<usize>,

    /// Upper bound on one test worker run, in seconds.
    #[arg(long)]
    pub test_timeout: Option<u64>,

    /// Size of the evaluation pool.
    #[arg(long)]
    pub workers: Option<usize>,

    #[arg(long, value_enum)]
    pub fault_localization: Option<FaultLocalizationKind>,

    #[arg(long, value_enum)]
    pub second_parent: Option<SecondParentStrategy>,

    #[arg(long, value_enum)]
    pub donor_selection: Option<DonorSelection>,

    /// javac-compatible compiler program.
    #[arg(long)]
    pub compiler: Option<String>,

    /// Test worker command line; split on whitespace.
    #[arg(long)]
    pub test_worker: Option<String>,

    /// Directory receiving history.json, patches and the log.
    #[arg(long)]
    pub out_dir: Option<PathBuf>,
}

impl ProjectArgs {
    /// Root named on the command line, for messages before options resolve.
    fn root(&self) -> PathBuf {
        self.project.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Defaults, then the config file, then flags.
    pub fn to_options(&self, json: bool) -> Result<Options> {
        let mut options = Options::new(PathBuf::from("."));
        if let Some(path) = &self.config {
            options.apply_file(FileConfig::load(path)?);
        }
        if let Some(root) = &self.project {
            options.project_root = root.clone();
        }

        macro_rules! flag {
            ($($arg:ident => $field:ident),* $(,)?) => {
                $(if let Some(v) = self.$arg.clone() { options.$field = v; })*
            };
        }
        flag!(
            seed => seed,
            max_generations => max_generations,
            headcount => headcount,
            mutations => mutation_generating_count,
            crossovers => crossover_generating_count,
            max_gene_length => max_gene_length,
            required_solutions => required_solutions,
            workers => workers,
            fault_localization => fault_localization,
            second_parent => second_parent,
            donor_selection => donor_selection,
            compiler => compiler,
            out_dir => out_dir,
        );
        if !self.sources.is_empty() {
            options.product_dirs = self.sources.clone();
        }
        if !self.tests.is_empty() {
            options.test_dirs = self.tests.clone();
        }
        if !self.classpath.is_empty() {
            options.classpath = self.classpath.clone();
        }
        if let Some(secs) = self.time_limit {
            options.time_limit = Duration::from_secs(secs);
        }
        if let Some(secs) = self.test_timeout {
            options.test_timeout = Duration::from_secs(secs);
        }
        if let Some(cmd) = &self.test_worker {
            options.test_worker = cmd.split_whitespace().map(String::from).collect();
        }
        options.json_output = json;

        options.validate()?;
        Ok(options)
    }
}

/// Install the fmt subscriber on stderr.
fn init_tracing(verbose: bool, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    let level = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn print_json_and_exit<T: Serialize>(report: &T, exit_code: i32) -> ! {
    match serde_json::to_string_pretty(report) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("failed to serialize report: {e}");
            std::process::exit(EXIT_ERROR);
        }
    }
    std::process::exit(exit_code);
}

/// Resolve options, discover the project and parse the original program.
fn load(args: &ProjectArgs, json: bool) -> Result<(Options, TargetProject, GeneratedSource)> {
    let options = args.to_options(json)?;
    let project = TargetProject::from_options(&options)?;
    let source = project
        .load_initial_source()
        .context("failed to load the original program")?;
    Ok((options, project, source))
}

/// Parse CLI arguments and dispatch the selected command.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match cli.command {
        Command::Scan { args } => {
            let options = args.to_options(false)?;

            println!("genrepair: scan");
            println!("project: {:?}", options.project_root);

            let project = TargetProject::from_options(&options)?;
            let overview = scan_project(&project)?;
            print_scan_summary(&overview);
            Ok(())
        }

        Command::Localize { args, top, json } => {
            let ui = Ui::new(json);
            ui.title("genrepair: localize");
            ui.line(format!("project: {:?}", args.root()));

            let (options, project, source) = match load(&args, json) {
                Ok(loaded) => loaded,
                Err(e) => {
                    if json {
                        let report =
                            RepairRunReport::failure(args.root(), 0, format!("{e:#}"));
                        print_json_and_exit(&report, EXIT_ERROR);
                    }
                    ui.error(format!("failed to load project: {e:#}"));
                    return Err(e);
                }
            };

            let engine = RepairEngine::new(&options, &project)?;
            let (evaluation, ranked) = engine.localize(&source);
            let initial = InitialReport::new(&evaluation.build, &evaluation.test_results);

            if json {
                let report = LocalizeReport::new(
                    options.project_root.clone(),
                    engine.formula(),
                    initial,
                    ranked,
                );
                print_json_and_exit(&report, EXIT_OK);
            }

            ui.line(format!(
                "original program: {} ({} formula)",
                fitness_label(initial.fitness),
                engine.formula()
            ));
            if !evaluation.build.success {
                ui.warn(first_lines(&evaluation.build.diagnostics, 5));
            }
            for test in &initial.failed_tests {
                ui.line(format!("failing: {test}"));
            }
            print_suspicious(&ranked, top);
            Ok(())
        }

        Command::Run { args, json } => {
            let mut ui = Ui::new(json);
            ui.title("genrepair: run");
            ui.line(format!("project: {:?}", args.root()));

            let (options, project, source) = match load(&args, json) {
                Ok(loaded) => loaded,
                Err(e) => {
                    if json {
                        let report =
                            RepairRunReport::failure(args.root(), 0, format!("{e:#}"));
                        print_json_and_exit(&report, EXIT_ERROR);
                    }
                    ui.error(format!("failed to load project: {e:#}"));
                    return Err(e);
                }
            };
            ui.line(format!(
                "seed {}, up to {} generations, {}s limit",
                options.seed,
                options.max_generations,
                options.time_limit.as_secs()
            ));

            let engine = RepairEngine::new(&options, &project)?;
            let outcome = engine.run(source, &mut ui)?;
            let report = RepairRunReport::success(options.project_root.clone(), options.seed, &outcome);

            if let Err(e) = out::write_all(&options.out_dir, &outcome, &report) {
                ui.warn(format!("failed to write results to {:?}: {e:#}", options.out_dir));
            }

            let exit_code = if report.found_solution() {
                EXIT_OK
            } else {
                EXIT_NO_SOLUTION
            };

            if json {
                print_json_and_exit(&report, exit_code);
            }

            println!("--- repair run summary ---");
            println!("stop reason:  {:?}", outcome.stop);
            println!("generations:  {}", outcome.generations.len());
            println!("variants:     {}", report.variants);
            println!("solutions:    {}", report.solutions.len());
            println!("elapsed:      {}ms", report.elapsed_ms);
            println!("output:       {}", options.out_dir.display());
            print_solutions(&report);

            if exit_code != EXIT_OK {
                eprintln!("no repair found");
                std::process::exit(exit_code);
            }
            Ok(())
        }
    }
}

fn first_lines(text: &str, n: usize) -> String {
    text.lines().take(n).collect::<Vec<_>>().join("\n")
}

/// Print a short summary based on the project overview.
fn print_scan_summary(overview: &ProjectOverview) {
    println!("--- project overview ---");
    println!("project root:            {}", overview.root.display());
    println!("product files:           {}", overview.product_files);
    println!("test files:              {}", overview.test_files);
    println!("product lines:           {}", overview.product_lines);
    println!("test lines:              {}", overview.test_lines);
    println!("statements:              {}", overview.statements);
    println!("eligible statements:     {}", overview.eligible_statements);
}
