use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::builder::{CommandCompiler, Compiler, ProjectBuilder};
use crate::catalog::StatementCatalog;
use crate::crossover::SinglePointCrossover;
use crate::evaluator::{Evaluation, Evaluator};
use crate::fl::{FaultLocalization, Suspiciousness, rank};
use crate::mutation::RandomMutation;
use crate::options::{DonorSelection, Options, SecondParentStrategy};
use crate::patch::apply_gene;
use crate::project::TargetProject;
use crate::random::RandomSource;
use crate::runner::{ProcessTestRunner, TestRunner};
use crate::source::GeneratedSource;
use crate::store::VariantStore;
use crate::survivor::select_survivors;
use crate::ui::Ui;
use crate::variant::{Fitness, Gene, HistoricalElement, Variant, VariantId};

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The original program already passes every test.
    InitialPasses,
    SolutionsFound,
    MaxGenerations,
    TimeLimit,
    /// No operator could produce a new program.
    Exhausted,
}

/// Per-generation counters.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationSummary {
    pub generation: u32,
    pub offspring: usize,
    pub build_failures: usize,
    pub duplicates: usize,
    pub complete: usize,
    pub best: Fitness,
    pub elapsed_ms: u64,
}

/// Result of [`RepairEngine::run`].
#[derive(Debug)]
pub struct RepairOutcome {
    pub store: VariantStore,
    pub stop: StopReason,
    pub generations: Vec<GenerationSummary>,
    pub elapsed: Duration,
}

impl RepairOutcome {
    pub fn solutions(&self) -> Vec<Arc<Variant>> {
        self.store.solutions()
    }
}

/// Limits and counts that shape the search.
#[derive(Debug, Clone)]
struct SearchLimits {
    max_generations: u32,
    time_limit: Duration,
    headcount: usize,
    mutation_generating_count: usize,
    crossover_generating_count: usize,
    max_gene_length: usize,
    required_solutions: usize,
}

impl From<&Options> for SearchLimits {
    fn from(o: &Options) -> Self {
        Self {
            max_generations: o.max_generations,
            time_limit: o.time_limit,
            headcount: o.headcount,
            mutation_generating_count: o.mutation_generating_count,
            crossover_generating_count: o.crossover_generating_count,
            max_gene_length: o.max_gene_length,
            required_solutions: o.required_solutions,
        }
    }
}

/// An offspring proposed on the control thread, before evaluation.
struct Candidate {
    id: VariantId,
    gene: Gene,
    history: HistoricalElement,
    source: Arc<GeneratedSource>,
    /// Set when the program never reaches the compiler.
    preset: Option<Evaluation>,
}

/// Everything that varies per operator slot but not per candidate.
struct Proposal {
    gene: Gene,
    history: HistoricalElement,
}

/// Runs the generation loop over one project.
pub struct RepairEngine {
    limits: SearchLimits,
    evaluator: Evaluator,
    fault_localization: Box<dyn FaultLocalization>,
    second_parent: SecondParentStrategy,
    donor_selection: DonorSelection,
    rng: RandomSource,
}

impl RepairEngine {
    /// Engine using the configured compiler and test worker processes.
    pub fn new(options: &Options, project: &TargetProject) -> Result<Self> {
        let compiler = CommandCompiler::new(options.compiler.clone());
        let runner = ProcessTestRunner::new(
            options.test_worker.clone(),
            project.root.clone(),
            project.classpath.clone(),
            options.test_timeout,
        );
        Self::with_collaborators(
            options,
            Box::new(compiler),
            Box::new(runner),
            project.classpath.clone(),
        )
    }

    pub fn with_collaborators(
        options: &Options,
        compiler: Box<dyn Compiler>,
        runner: Box<dyn TestRunner>,
        classpath: Vec<PathBuf>,
    ) -> Result<Self> {
        let builder = ProjectBuilder::new(compiler, classpath);
        let evaluator = Evaluator::new(builder, runner, options.workers)?;
        Ok(Self {
            limits: SearchLimits::from(options),
            evaluator,
            fault_localization: options.fault_localization.build(),
            second_parent: options.second_parent,
            donor_selection: options.donor_selection,
            rng: RandomSource::seeded(options.seed),
        })
    }

    /// Name of the suspiciousness formula in use.
    pub fn formula(&self) -> &'static str {
        self.fault_localization.name()
    }

    /// Build and test the original program, then score it.
    pub fn localize(&self, original: &GeneratedSource) -> (Evaluation, Vec<Suspiciousness>) {
        let evaluation = self.evaluator.evaluate(VariantId(0), original);
        let ranked = rank(
            self.fault_localization
                .score(original, &evaluation.test_results),
        );
        (evaluation, ranked)
    }

    /// Search for repairs of `original` until enough solutions are found or
    /// a budget runs out.
    pub fn run(mut self, original: GeneratedSource, ui: &mut Ui) -> Result<RepairOutcome> {
        let start = Instant::now();
        let deadline = start + self.limits.time_limit;
        let original = Arc::new(original);

        let evaluation = self.evaluator.evaluate(VariantId(0), &original);
        let initial = Variant::new(
            VariantId(0),
            0,
            Gene::default(),
            HistoricalElement::Initial,
            Arc::clone(&original),
            evaluation.build,
            evaluation.test_results,
        );
        let mut store = VariantStore::new(initial).context("failed to seed the variant store")?;
        ui.initial_result(store.initial());
        tracing::info!(
            variant = %store.initial().id(),
            generation = 0,
            fitness = ?store.initial().fitness(),
            "evaluated original program"
        );

        if store.initial().is_complete() {
            return Ok(RepairOutcome {
                store,
                stop: StopReason::InitialPasses,
                generations: Vec::new(),
                elapsed: start.elapsed(),
            });
        }

        let mutation = RandomMutation::new(StatementCatalog::from_source(&original), self.donor_selection);
        let crossover = SinglePointCrossover::new(self.second_parent.build());
        let mut summaries = Vec::new();
        let mut stop = StopReason::MaxGenerations;

        for generation in 1..=self.limits.max_generations {
            if Instant::now() >= deadline {
                stop = StopReason::TimeLimit;
                break;
            }
            let gen_start = Instant::now();
            let population = store.current().to_vec();

            let proposals = self.propose(&population, &mutation, &crossover, generation);
            let (candidates, duplicates) = self.materialize(&mut store, &original, proposals);

            let jobs: Vec<(VariantId, &GeneratedSource)> = candidates
                .iter()
                .filter(|c| c.preset.is_none())
                .map(|c| (c.id, c.source.as_ref()))
                .collect();
            let mut evaluated = self.evaluator.evaluate_all(&jobs, Some(deadline)).into_iter();

            let mut offspring = Vec::new();
            let mut unfinished = false;
            for candidate in candidates {
                let evaluation = match candidate.preset {
                    Some(preset) => preset,
                    None => match evaluated.next().flatten() {
                        Some(e) => e,
                        None => {
                            unfinished = true;
                            continue;
                        }
                    },
                };
                let variant = Variant::new(
                    candidate.id,
                    generation,
                    candidate.gene,
                    candidate.history,
                    candidate.source,
                    evaluation.build,
                    evaluation.test_results,
                );
                let variant = store
                    .add(variant)
                    .context("offspring broke the variant lineage")?;
                if variant.is_complete() {
                    ui.solution_found(&variant);
                }
                offspring.push(variant);
            }

            let summary = GenerationSummary {
                generation,
                offspring: offspring.len(),
                build_failures: offspring.iter().filter(|v| !v.build().success).count(),
                duplicates,
                complete: offspring.iter().filter(|v| v.is_complete()).count(),
                best: offspring
                    .iter()
                    .chain(population.iter())
                    .map(|v| v.fitness())
                    .max()
                    .unwrap_or(Fitness::BuildFailed),
                elapsed_ms: gen_start.elapsed().as_millis() as u64,
            };
            tracing::info!(
                generation,
                offspring = summary.offspring,
                build_failures = summary.build_failures,
                complete = summary.complete,
                "generation finished"
            );
            ui.generation_progress(&summary);
            let produced = summary.offspring;
            summaries.push(summary);

            let mut pool = population;
            pool.extend(offspring);
            store.proceed(select_survivors(pool, self.limits.headcount));

            if store.solutions().len() >= self.limits.required_solutions {
                stop = StopReason::SolutionsFound;
                break;
            }
            if unfinished || Instant::now() >= deadline {
                stop = StopReason::TimeLimit;
                break;
            }
            if produced == 0 && duplicates == 0 {
                stop = StopReason::Exhausted;
                break;
            }
        }

        Ok(RepairOutcome {
            store,
            stop,
            generations: summaries,
            elapsed: start.elapsed(),
        })
    }

    /// Draw every offspring gene of one generation, in slot order.
    fn propose(
        &mut self,
        population: &[Arc<Variant>],
        mutation: &RandomMutation,
        crossover: &SinglePointCrossover,
        generation: u32,
    ) -> Vec<Proposal> {
        let mut ranked: HashMap<VariantId, Vec<Suspiciousness>> = HashMap::new();
        let mut proposals = Vec::new();

        for _ in 0..self.limits.mutation_generating_count {
            if let Some(p) = self.mutation_slot(population, mutation, &mut ranked, generation) {
                proposals.push(p);
            }
        }

        for _ in 0..self.limits.crossover_generating_count {
            match crossover.cross(population, self.limits.max_gene_length, &mut self.rng) {
                Ok(child) => proposals.push(Proposal {
                    gene: child.gene,
                    history: HistoricalElement::Crossover {
                        parent1: child.parent1,
                        parent2: child.parent2,
                        split1: child.split1,
                        split2: child.split2,
                    },
                }),
                Err(reason) => {
                    tracing::debug!(
                        generation,
                        stage = "crossover",
                        strategy = crossover.strategy().name(),
                        %reason,
                        "falling back to mutation"
                    );
                    if let Some(p) = self.mutation_slot(population, mutation, &mut ranked, generation) {
                        proposals.push(p);
                    }
                }
            }
        }
        proposals
    }

    fn mutation_slot(
        &mut self,
        population: &[Arc<Variant>],
        mutation: &RandomMutation,
        ranked: &mut HashMap<VariantId, Vec<Suspiciousness>>,
        generation: u32,
    ) -> Option<Proposal> {
        let parent = self.rng.choose(population)?;
        let fl = &self.fault_localization;
        let suspicious = ranked
            .entry(parent.id())
            .or_insert_with(|| rank(fl.score(parent.source(), parent.test_results())));

        match mutation.mutate(parent.gene(), suspicious, self.limits.max_gene_length, &mut self.rng) {
            Ok(child) => Some(Proposal {
                gene: child.gene,
                history: HistoricalElement::Mutation {
                    parent: parent.id(),
                    appended: child.appended,
                },
            }),
            Err(reason) => {
                tracing::debug!(
                    generation,
                    variant = %parent.id(),
                    stage = "mutation",
                    %reason,
                    "mutation slot skipped"
                );
                None
            }
        }
    }

    /// Generate sources and allocate ids. Programs identical to an existing
    /// one are dropped and counted.
    fn materialize(
        &self,
        store: &mut VariantStore,
        original: &Arc<GeneratedSource>,
        proposals: Vec<Proposal>,
    ) -> (Vec<Candidate>, usize) {
        let mut seen: HashSet<String> = HashSet::new();
        let mut duplicates = 0;
        let mut candidates = Vec::new();

        for proposal in proposals {
            let (source, preset) = match apply_gene(original, &proposal.gene) {
                Ok(outcome) => {
                    let digest = outcome.source.digest();
                    if store.contains_source(&digest) || !seen.insert(digest) {
                        duplicates += 1;
                        continue;
                    }
                    (Arc::new(outcome.source), None)
                }
                Err(invalid) => {
                    tracing::info!(stage = "patch", error = %invalid, "generated source does not parse");
                    (
                        Arc::clone(original),
                        Some(Evaluation::invalid_source(format!("syntax: {invalid}"))),
                    )
                }
            };
            candidates.push(Candidate {
                id: store.next_id(),
                gene: proposal.gene,
                history: proposal.history,
                source,
                preset,
            });
        }
        (candidates, duplicates)
    }
}
