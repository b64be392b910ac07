use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::aligners::{build_aligner, Aligner, AlignerChoice, AlignerConfig};
use crate::core::rank::{Level, TaxonomyRank};
use crate::core::table::AbundanceTable;
use crate::engine::function::{format_function_profile, profile_functions, FunctionDatabase};
use crate::engine::normalize::normalize_by_median_depth;
use crate::engine::redistribute::{redistribute_with, RedistributionConfig};
use crate::model::metadata::Database;
use crate::model::shear::ConfusionModel;
use crate::parsing::taxatable::{format_taxatable, read_taxatable};
use crate::pipeline::artifact::{fingerprint, write_atomic, ArtifactCache};
use crate::pipeline::PipelineError;
use crate::utils::paths::{insert_before_extension, sibling_with_suffix};

/// Where a pipeline run has got to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PipelineState {
    NotStarted,
    Aligned,
    Redistributed,
    FunctionProfiled,
    Done,
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::NotStarted => "not started",
            Self::Aligned => "aligned",
            Self::Redistributed => "redistributed",
            Self::FunctionProfiled => "function profiled",
            Self::Done => "done",
        };
        write!(f, "{name}")
    }
}

/// Everything a pipeline run needs, fixed before it starts
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Combined sequences in QIIME format
    pub input: PathBuf,
    /// Database directory holding `metadata.yaml`
    pub database: PathBuf,
    /// Output directory
    pub output: PathBuf,
    pub aligner: AlignerChoice,
    pub level: Level,
    /// Run functional profiling on genus, species and strain tables
    pub function: bool,
    pub capitalist: bool,
    pub threads: usize,
    pub redistribution: RedistributionConfig,
}

impl PipelineConfig {
    pub fn new(
        input: impl Into<PathBuf>,
        database: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
    ) -> Self {
        Self {
            input: input.into(),
            database: database.into(),
            output: output.into(),
            aligner: AlignerChoice::default(),
            level: Level::default(),
            function: true,
            capitalist: true,
            threads: crate::aligners::default_threads(),
            redistribution: RedistributionConfig::default(),
        }
    }
}

/// Outcome of a run
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub state: PipelineState,
    /// Stages that ran
    pub executed: Vec<String>,
    /// Stages whose outputs were already complete
    pub skipped: Vec<String>,
    /// Every output the run is responsible for, in stage order
    pub outputs: Vec<PathBuf>,
}

/// Stage plan for one aligner
struct AlignerPlan {
    aligner: Box<dyn Aligner>,
    alignment: PathBuf,
    taxatable: PathBuf,
    /// Per-rank redistribution outputs; empty when the level is `off`
    redistributed: Vec<(TaxonomyRank, PathBuf)>,
}

/// Function stage for one redistributed table
struct FunctionPlan {
    table: PathBuf,
    rank: TaxonomyRank,
    normalized: PathBuf,
    kegg: PathBuf,
}

/// Confusion model resolved and validated before any stage runs
struct LoadedModel {
    path: PathBuf,
    model: Arc<ConfusionModel>,
}

/// Function database resolved and validated before any stage runs
struct LoadedFunctions {
    path: PathBuf,
    db: FunctionDatabase,
}

pub struct Pipeline {
    config: PipelineConfig,
    plans: Vec<AlignerPlan>,
    functions: Vec<FunctionPlan>,
    model: Option<LoadedModel>,
    function_db: Option<LoadedFunctions>,
    state: PipelineState,
}

impl Pipeline {
    /// Load the database, build the aligners and plan every output.
    ///
    /// The confusion model (unless the level is `off`) and the function
    /// database (when profiling) are loaded here, so a broken database fails
    /// before any aligner runs.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Metadata` if the database cannot be loaded,
    /// `PipelineError::MissingInput` if the input does not exist,
    /// `PipelineError::ArtifactConflict` if two stages would write the same
    /// file, and `PipelineError::Model` or `PipelineError::Parse` if the
    /// confusion model or function database is invalid.
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        if !config.input.exists() {
            return Err(PipelineError::MissingInput(config.input.clone()));
        }
        let database = Database::load(&config.database)?;
        let aligner_config = AlignerConfig {
            database: database.clone(),
            threads: config.threads,
            capitalist: config.capitalist,
        };

        let plans: Vec<AlignerPlan> = config
            .aligner
            .kinds()
            .into_iter()
            .map(|kind| {
                let aligner = build_aligner(kind, &aligner_config);
                let alignment = config.output.join(aligner.artifact_name());
                let taxatable = config.output.join(format!("taxatable.{}.txt", aligner.name()));
                let base = if config.aligner.is_all() {
                    config
                        .output
                        .join(format!("taxatable.{}.{}.txt", aligner.name(), config.level))
                } else {
                    config.output.join(format!("taxatable.{}.txt", config.level))
                };
                AlignerPlan {
                    aligner,
                    alignment,
                    taxatable,
                    redistributed: level_outputs(config.level, &base),
                }
            })
            .collect();

        let functions: Vec<FunctionPlan> = if config.function {
            plans
                .iter()
                .flat_map(|plan| plan.redistributed.iter())
                .filter(|(rank, _)| rank.supports_functional_profiling())
                .map(|(rank, table)| FunctionPlan {
                    table: table.clone(),
                    rank: *rank,
                    normalized: sibling_with_suffix(table, &config.output, "normalized.txt"),
                    kegg: sibling_with_suffix(table, &config.output, "kegg.txt"),
                })
                .collect()
        } else {
            Vec::new()
        };

        check_conflicts(&config.input, &planned_outputs(&plans, &functions))?;

        let model = if config.level.is_off() {
            None
        } else {
            let path = database.shear_path()?;
            let model = Arc::new(ConfusionModel::load(&path)?);
            info!(path = %path.display(), references = model.len(), "Loaded confusion model");
            Some(LoadedModel { path, model })
        };

        let function_db = if functions.is_empty() {
            None
        } else {
            let path = database.function_path()?;
            info!(path = %path.display(), "Loading the functional database");
            let db = FunctionDatabase::load(&path)?;
            Some(LoadedFunctions { path, db })
        };

        Ok(Self {
            config,
            plans,
            functions,
            model,
            function_db,
            state: PipelineState::NotStarted,
        })
    }

    #[must_use]
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Every planned output, in stage order
    #[must_use]
    pub fn planned_outputs(&self) -> Vec<PathBuf> {
        planned_outputs(&self.plans, &self.functions)
    }

    fn advance(&mut self, state: PipelineState) {
        if state > self.state {
            debug!(from = %self.state, to = %state, "Pipeline state");
            self.state = state;
        }
    }

    /// Run every stage, skipping those whose outputs are already complete.
    ///
    /// # Errors
    ///
    /// Stops at the first failing stage and returns its error; outputs of
    /// stages that finished before it are kept.
    pub fn run(mut self) -> Result<PipelineReport, PipelineError> {
        std::fs::create_dir_all(&self.config.output).map_err(|source| PipelineError::Io {
            path: self.config.output.clone(),
            source,
        })?;
        let mut cache = ArtifactCache::open(&self.config.output);
        let mut report = PipelineReport {
            state: self.state,
            executed: Vec::new(),
            skipped: Vec::new(),
            outputs: self.planned_outputs(),
        };

        let plans = std::mem::take(&mut self.plans);
        for plan in &plans {
            self.align_stage(plan, &mut cache, &mut report)?;
            self.assign_stage(plan, &mut cache, &mut report)?;
            self.advance(PipelineState::Aligned);

            if let Some(loaded) = &self.model {
                if !plan.redistributed.is_empty() {
                    self.redistribute_stage(plan, loaded, &mut cache, &mut report)?;
                }
            }
            self.advance(PipelineState::Redistributed);
        }

        if let Some(loaded) = &self.function_db {
            for function in &self.functions {
                self.function_stage(function, loaded, &mut cache, &mut report)?;
            }
            self.advance(PipelineState::FunctionProfiled);
        }

        self.advance(PipelineState::Done);
        report.state = self.state;
        info!(
            executed = report.executed.len(),
            skipped = report.skipped.len(),
            "Pipeline finished"
        );
        Ok(report)
    }

    /// Run the aligner unless its artifact is already on disk
    fn align_stage(
        &self,
        plan: &AlignerPlan,
        cache: &mut ArtifactCache,
        report: &mut PipelineReport,
    ) -> Result<(), PipelineError> {
        let stage = format!("align.{}", plan.aligner.name());
        let print = fingerprint(&stage, &[&self.config.input], &plan.aligner.parameters())?;
        let artifacts = vec![plan.alignment.clone()];

        if cache.status(&stage, &print, &artifacts).is_complete() {
            info!(stage = %stage, "Skipping, alignment is complete");
            report.skipped.push(stage);
            return Ok(());
        }

        plan.aligner.align(&self.config.input, &self.config.output)?;
        cache.record(&stage, print, artifacts)?;
        report.executed.push(stage);
        Ok(())
    }

    /// Turn the alignment artifact into `taxatable.<aligner>.txt`
    fn assign_stage(
        &self,
        plan: &AlignerPlan,
        cache: &mut ArtifactCache,
        report: &mut PipelineReport,
    ) -> Result<(), PipelineError> {
        let stage = format!("assign.{}", plan.aligner.name());
        let mut params = plan.aligner.parameters();
        params.push(format!("capitalist={}", self.config.capitalist));
        let print = fingerprint(&stage, &[&plan.alignment], &params)?;
        let artifacts = vec![plan.taxatable.clone()];

        if cache.status(&stage, &print, &artifacts).is_complete() {
            info!(stage = %stage, "Skipping, taxatable is complete");
            report.skipped.push(stage);
            return Ok(());
        }

        let table = plan.aligner.post_align(&plan.alignment)?;
        write_atomic(&plan.taxatable, format_taxatable(&table).as_bytes())?;
        info!(
            aligner = plan.aligner.name(),
            rows = table.len(),
            samples = table.samples().len(),
            path = %plan.taxatable.display(),
            "Wrote taxatable"
        );

        cache.record(&stage, print, artifacts)?;
        report.executed.push(stage);
        Ok(())
    }

    fn redistribute_stage(
        &self,
        plan: &AlignerPlan,
        loaded: &LoadedModel,
        cache: &mut ArtifactCache,
        report: &mut PipelineReport,
    ) -> Result<(), PipelineError> {
        let stage = format!("redistribute.{}.{}", plan.aligner.name(), self.config.level);
        let params = vec![
            format!("level={}", self.config.level),
            format!("fallback={:?}", self.config.redistribution.fallback),
        ];
        let print = fingerprint(&stage, &[&plan.taxatable, &loaded.path], &params)?;
        let artifacts: Vec<PathBuf> = plan.redistributed.iter().map(|(_, p)| p.clone()).collect();

        if cache.status(&stage, &print, &artifacts).is_complete() {
            info!(stage = %stage, "Skipping, outputs are complete");
            report.skipped.push(stage);
            return Ok(());
        }

        let table = read_taxatable(&plan.taxatable)?;
        write_redistributed(
            &table,
            &loaded.model,
            &plan.redistributed,
            &self.config.redistribution,
        )?;

        cache.record(&stage, print, artifacts)?;
        report.executed.push(stage);
        Ok(())
    }

    fn function_stage(
        &self,
        function: &FunctionPlan,
        loaded: &LoadedFunctions,
        cache: &mut ArtifactCache,
        report: &mut PipelineReport,
    ) -> Result<(), PipelineError> {
        let stage = format!(
            "function.{}",
            function
                .table
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        );
        let print = fingerprint(
            &stage,
            &[&function.table, &loaded.path],
            &[format!("rank={}", function.rank)],
        )?;
        let artifacts = vec![function.normalized.clone(), function.kegg.clone()];

        if cache.status(&stage, &print, &artifacts).is_complete() {
            info!(stage = %stage, "Skipping, outputs are complete");
            report.skipped.push(stage);
            return Ok(());
        }

        let table = read_taxatable(&function.table)?;
        write_function_outputs(
            &table,
            &loaded.db,
            function.rank,
            &function.normalized,
            &function.kegg,
        )?;

        cache.record(&stage, print, artifacts)?;
        report.executed.push(stage);
        Ok(())
    }
}

fn planned_outputs(plans: &[AlignerPlan], functions: &[FunctionPlan]) -> Vec<PathBuf> {
    let mut outputs = Vec::new();
    for plan in plans {
        outputs.push(plan.alignment.clone());
        outputs.push(plan.taxatable.clone());
        outputs.extend(plan.redistributed.iter().map(|(_, path)| path.clone()));
    }
    for function in functions {
        outputs.push(function.normalized.clone());
        outputs.push(function.kegg.clone());
    }
    outputs
}

/// Fail on the first output claimed twice, or claiming the input
fn check_conflicts(input: &Path, outputs: &[PathBuf]) -> Result<(), PipelineError> {
    let mut seen: HashSet<&Path> = HashSet::new();
    seen.insert(input);
    for path in outputs {
        if !seen.insert(path.as_path()) {
            return Err(PipelineError::ArtifactConflict { path: path.clone() });
        }
    }
    Ok(())
}

/// Output paths for each rank of `level`.
///
/// A single rank writes to `outfile` itself; `all` inserts each rank name
/// before the extension (`taxatable.all.txt` -> `taxatable.all.genus.txt`);
/// `off` writes nothing.
#[must_use]
pub fn level_outputs(level: Level, outfile: &Path) -> Vec<(TaxonomyRank, PathBuf)> {
    match level {
        Level::Off => Vec::new(),
        Level::Rank(rank) => vec![(rank, outfile.to_path_buf())],
        Level::All => TaxonomyRank::ALL
            .iter()
            .map(|&rank| (rank, insert_before_extension(outfile, rank.name())))
            .collect(),
    }
}

fn write_redistributed(
    table: &AbundanceTable,
    model: &ConfusionModel,
    outputs: &[(TaxonomyRank, PathBuf)],
    config: &RedistributionConfig,
) -> Result<(), PipelineError> {
    outputs.par_iter().try_for_each(|(rank, path)| {
        let redistributed = redistribute_with(table, model, *rank, config);
        write_atomic(path, format_taxatable(&redistributed).as_bytes())?;
        info!(
            rank = %rank,
            rows = redistributed.len(),
            path = %path.display(),
            "Wrote redistributed taxatable"
        );
        Ok(())
    })
}

/// Redistribute `table` to every rank of `level`, one file per rank
///
/// # Errors
///
/// Returns `PipelineError::Io` if an output cannot be written.
pub fn redistribute_to_files(
    table: &AbundanceTable,
    model: &ConfusionModel,
    level: Level,
    outfile: &Path,
    config: &RedistributionConfig,
) -> Result<Vec<(TaxonomyRank, PathBuf)>, PipelineError> {
    let outputs = level_outputs(level, outfile);
    write_redistributed(table, model, &outputs, config)?;
    Ok(outputs)
}

fn write_function_outputs(
    table: &AbundanceTable,
    db: &FunctionDatabase,
    rank: TaxonomyRank,
    normalized_path: &Path,
    kegg_path: &Path,
) -> Result<(), PipelineError> {
    let normalized = normalize_by_median_depth(table);
    write_atomic(normalized_path, format_taxatable(&normalized).as_bytes())?;

    let profile = profile_functions(&normalized, db, rank);
    write_atomic(kegg_path, format_function_profile(&profile).as_bytes())?;
    info!(
        rank = %rank,
        kos = profile.len(),
        path = %kegg_path.display(),
        "Wrote functional profile"
    );
    Ok(())
}

/// Median-normalize a taxatable and profile its functions into `output_dir`.
///
/// Ranks coarser than genus are skipped and return `None`.
///
/// # Errors
///
/// Returns `PipelineError::Parse` if the table cannot be read and
/// `PipelineError::Io` if an output cannot be written.
pub fn function_to_files(
    table_path: &Path,
    db: &FunctionDatabase,
    rank: TaxonomyRank,
    output_dir: &Path,
) -> Result<Option<(PathBuf, PathBuf)>, PipelineError> {
    if !rank.supports_functional_profiling() {
        info!(rank = %rank, "Skipping functional profiling above genus");
        return Ok(None);
    }
    let normalized = sibling_with_suffix(table_path, output_dir, "normalized.txt");
    let kegg = sibling_with_suffix(table_path, output_dir, "kegg.txt");
    let table = read_taxatable(table_path)?;
    write_function_outputs(&table, db, rank, &normalized, &kegg)?;
    Ok(Some((normalized, kegg)))
}
