use anyhow::{Context, Result};
use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::error::EngineError;
use crate::model::{load_model_file, model_path, save_model_file, ModelFile};
use crate::output::{results_path, write_results_csv};
use crate::scoring::{ScoreOutput, Scorer, TrainOutput, Trainer};
use crate::table::{load_years, IndicatorTable, Year};

/// Train every stratum as an independent blocking task.
///
/// Strata share nothing mutable; results are keyed by stratum so the model
/// does not depend on task completion order.
pub async fn train_concurrently(
    trainer: Arc<Trainer>,
    table: &IndicatorTable,
) -> Result<TrainOutput, EngineError> {
    let training = trainer.training_table(table)?;

    let mut tasks = FuturesUnordered::new();
    for (strata_id, rows) in training.partition_by_stratum() {
        let trainer = Arc::clone(&trainer);
        tasks.push(tokio::task::spawn_blocking(move || {
            let params = trainer.train_stratum(&rows);
            (strata_id, rows.len(), params)
        }));
    }

    let mut trained = BTreeMap::new();
    while let Some(joined) = tasks.next().await {
        let (strata_id, rows, params) = joined.map_err(|e| EngineError::Worker(e.to_string()))?;
        tracing::debug!(strata_id = %strata_id, rows, weight_sum = params.weight_sum(), "trained stratum");
        trained.insert(strata_id, params);
    }

    Ok(trainer.assemble(trained))
}

/// Score every stratum as an independent blocking task.
///
/// Coverage is checked up front so every missing stratum is reported
/// together and no partial scores are produced.
pub async fn score_concurrently(
    scorer: Arc<Scorer>,
    table: &IndicatorTable,
) -> Result<ScoreOutput, EngineError> {
    scorer.check_coverage(table)?;

    let mut tasks = FuturesUnordered::new();
    for (strata_id, rows) in table.partition_by_stratum() {
        let scorer = Arc::clone(&scorer);
        tasks.push(tokio::task::spawn_blocking(move || {
            let result = scorer.score_stratum(&strata_id, &rows);
            (strata_id, result)
        }));
    }

    let mut partitions = BTreeMap::new();
    while let Some(joined) = tasks.next().await {
        let (strata_id, result) = joined.map_err(|e| EngineError::Worker(e.to_string()))?;
        let scores = result?;
        tracing::debug!(strata_id = %strata_id, rows = scores.len(), "scored stratum");
        partitions.insert(strata_id, scores);
    }

    Ok(scorer.assemble(partitions))
}

#[derive(Debug)]
pub struct TrainSummary {
    pub model_path: PathBuf,
    pub rows: usize,
    pub output: TrainOutput,
    pub elapsed: Duration,
}

/// Load the training years, learn the model and persist it.
pub async fn run_training(config: &Config) -> Result<TrainSummary> {
    let start = Instant::now();
    let schema = config.schema()?;
    let keys = config.table_keys();

    tracing::info!(years = ?config.training_years, dir = %config.paths.raw_data_dir.display(), "loading training data");
    let table = load_years(&config.paths.raw_data_dir, &config.training_years, &schema, &keys)?;

    let trainer = Arc::new(Trainer::new(schema, config.training_years.clone()));
    let output = train_concurrently(trainer, &table).await?;

    let path = model_path(&config.paths.model_dir);
    let model_file = ModelFile::from_model(&output.model, &config.training_years, Utc::now());
    save_model_file(&path, &model_file)?;

    let elapsed = start.elapsed();
    tracing::info!(
        strata = output.model.len(),
        rows = table.len(),
        path = %path.display(),
        elapsed = %humantime::format_duration(round_millis(elapsed)),
        "model trained"
    );

    Ok(TrainSummary {
        model_path: path,
        rows: table.len(),
        output,
        elapsed,
    })
}

#[derive(Debug)]
pub struct ScoreSummary {
    pub results_path: PathBuf,
    pub years: BTreeSet<Year>,
    pub output: ScoreOutput,
    pub elapsed: Duration,
}

/// Score `years` (default: `all_years`) against the persisted model and
/// export the results.
pub async fn run_scoring(config: &Config, years: Option<BTreeSet<Year>>) -> Result<ScoreSummary> {
    let start = Instant::now();
    let schema = config.schema()?;
    let keys = config.table_keys();
    let years = years.unwrap_or_else(|| config.all_years.clone());

    let path = model_path(&config.paths.model_dir);
    let model = load_model_file(&path)?
        .into_model()
        .with_context(|| format!("Failed to load model from {}", path.display()))?;
    tracing::info!(strata = model.len(), path = %path.display(), "model loaded");

    let table = load_years(&config.paths.raw_data_dir, &years, &schema, &keys)?;
    if table.is_empty() {
        anyhow::bail!(
            "No indicator data found for years {:?} in {}",
            years,
            config.paths.raw_data_dir.display()
        );
    }

    let scorer = Arc::new(Scorer::new(schema, Arc::new(model))?);
    let output = score_concurrently(scorer, &table).await?;

    let results = results_path(&config.paths.results_dir);
    write_results_csv(&results, &output.scores)?;

    let elapsed = start.elapsed();
    tracing::info!(
        rows = output.scores.len(),
        path = %results.display(),
        elapsed = %humantime::format_duration(round_millis(elapsed)),
        "scores written"
    );

    Ok(ScoreSummary {
        results_path: results,
        years: table.years(),
        output,
        elapsed,
    })
}

fn round_millis(d: Duration) -> Duration {
    Duration::from_millis(d.as_millis() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{IndicatorRow, IndicatorSchema, StrataId, UnitId, INDICATOR_COUNT};

    fn table(strata: usize) -> IndicatorTable {
        let mut rows = Vec::new();
        for s in 0..strata {
            for year in [2018, 2019, 2020, 2023] {
                for u in 0..4 {
                    let seed = (s * 31 + u * 7) as f64 + f64::from(year - 2018) * 1.3;
                    let mut values = [None; INDICATOR_COUNT];
                    for (j, v) in values.iter_mut().enumerate() {
                        *v = Some(((seed + j as f64) * 0.37).sin() * 10.0 + 20.0);
                    }
                    rows.push(IndicatorRow {
                        unit_id: UnitId(format!("S{}U{}", s, u)),
                        year,
                        strata_id: StrataId(format!("{}", 100 + s)),
                        values,
                    });
                }
            }
        }
        IndicatorTable::new(rows)
    }

    fn trainer() -> Arc<Trainer> {
        Arc::new(Trainer::new(
            IndicatorSchema::reference(),
            [2018, 2019, 2020].into_iter().collect(),
        ))
    }

    #[tokio::test]
    async fn test_concurrent_training_matches_sequential() {
        let table = table(6);
        let concurrent = train_concurrently(trainer(), &table).await.unwrap();
        let sequential = trainer().train(&table).unwrap();
        assert_eq!(concurrent.model, sequential.model);
        assert_eq!(concurrent.model.len(), 6);
    }

    #[tokio::test]
    async fn test_concurrent_scoring_matches_sequential() {
        let table = table(5);
        let model = Arc::new(trainer().train(&table).unwrap().model);
        let scorer = Arc::new(Scorer::new(IndicatorSchema::reference(), model).unwrap());

        let concurrent = score_concurrently(Arc::clone(&scorer), &table).await.unwrap();
        let sequential = scorer.score(&table).unwrap();
        assert_eq!(concurrent.scores, sequential.scores);
        assert_eq!(concurrent.scores.len(), table.len());
    }

    #[tokio::test]
    async fn test_concurrent_scoring_reports_missing_strata() {
        let training = table(2);
        let model = Arc::new(trainer().train(&training).unwrap().model);
        let scorer = Arc::new(Scorer::new(IndicatorSchema::reference(), model).unwrap());

        let err = score_concurrently(scorer, &table(4)).await.unwrap_err();
        match err {
            EngineError::ModelIncomplete(e) => {
                assert_eq!(e.missing, vec![StrataId::from("102"), StrataId::from("103")]);
            }
            other => panic!("expected ModelIncomplete, got {other:?}"),
        }
    }
}
