//! tabflow CLI
//!
//! Inspect a dataset, fit a workflow with a held-out test set, predict with a
//! saved workflow, and compare models by cross-validation.

use clap::{Parser, Subcommand};
use colored::*;
use polars::prelude::*;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::PipelineConfig;
use crate::data::{DataLoader, DataSaver, DatasetSummary};
use crate::metrics::{ConfusionMatrix, MetricEstimate, RocCurve, PRED_CLASS};
use crate::resample::{compare_workflows, ResampleControl};
use crate::split::{initial_split, vfold_cv};
use crate::workflow::{last_fit, FittedWorkflow, PredictType};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString    { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
    let _ = std::io::stdout().flush();
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn fmt_value(v: f64) -> String {
    if v.is_nan() { "NA".to_string() } else { format!("{:.4}", v) }
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "tabflow")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Tabular modeling pipelines: split, preprocess, fit, evaluate")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Summarise a dataset
    Info {
        /// Input CSV/TSV file
        #[arg(short, long)]
        data: PathBuf,
    },

    /// Split the data, fit a workflow on the training set and evaluate on the test set
    Fit {
        /// Input CSV/TSV file
        #[arg(short, long)]
        data: PathBuf,

        /// Outcome column (required without --config)
        #[arg(short, long)]
        target: Option<String>,

        /// Pipeline configuration JSON
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Name of the configured model to fit
        #[arg(short, long, default_value = "logistic_reg")]
        model: String,

        /// Random seed for the split and the model
        #[arg(long)]
        seed: Option<u64>,

        /// Write the fitted workflow as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the test-set ROC curve as CSV
        #[arg(long)]
        roc: Option<PathBuf>,
    },

    /// Predict with a saved workflow
    Predict {
        /// Fitted workflow JSON
        #[arg(short, long)]
        model: PathBuf,

        /// Input CSV/TSV file
        #[arg(short, long)]
        data: PathBuf,

        /// Prediction type (class, prob, numeric); all prediction columns when omitted
        #[arg(long = "type")]
        kind: Option<String>,

        /// Output CSV file; a preview is printed when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compare every configured model by v-fold cross-validation on the training set
    Resample {
        /// Input CSV/TSV file
        #[arg(short, long)]
        data: PathBuf,

        /// Outcome column (required without --config)
        #[arg(short, long)]
        target: Option<String>,

        /// Pipeline configuration JSON
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of folds; overrides the configuration
        #[arg(short = 'v', long)]
        folds: Option<usize>,

        /// Random seed for the split, the folds and the models
        #[arg(long)]
        seed: Option<u64>,

        /// Evaluate folds one at a time
        #[arg(long)]
        sequential: bool,
    },
}

// ─── Shared setup ──────────────────────────────────────────────────────────────

fn load_data(path: &Path) -> anyhow::Result<DataFrame> {
    step_run("Loading data");
    let start = Instant::now();
    let df = DataLoader::new().load(path)?;
    step_done(&format!("{} rows × {} cols in {:?}", df.height(), df.width(), start.elapsed()));
    Ok(df)
}

fn load_config(
    config: Option<&Path>,
    target: Option<&str>,
    seed: Option<u64>,
) -> anyhow::Result<PipelineConfig> {
    let mut config = match (config, target) {
        (Some(path), _) => PipelineConfig::from_json_file(path)?,
        (None, Some(target)) => PipelineConfig::classification_default(target),
        (None, None) => anyhow::bail!("either --target or --config is required"),
    };
    if let Some(target) = target {
        if config.split.strata.as_deref() == Some(config.outcome.as_str()) {
            config.split.strata = Some(target.to_string());
        }
        config.outcome = target.to_string();
    }
    if let Some(seed) = seed {
        config = config.with_seed(seed);
    }
    config.validate()?;
    Ok(config)
}

fn print_metrics(estimates: &[MetricEstimate]) {
    println!("  {:<14} {:<12} {:>10}", muted(".metric"), muted(".estimator"), muted(".estimate"));
    println!("  {}", dim(&"─".repeat(38)));
    for e in estimates {
        println!(
            "  {:<14} {:<12} {:>10}",
            e.metric.name(),
            e.estimator,
            fmt_value(e.estimate).white().bold()
        );
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_info(data_path: &Path) -> anyhow::Result<()> {
    section("Data Info");

    let df = DataLoader::new().load(data_path)?;
    let summary = DatasetSummary::from_frame(&df)?;

    println!("  {:<12} {}", muted("File"), data_path.display());
    println!("  {:<12} {}", muted("Rows"), summary.n_rows);
    println!("  {:<12} {}", muted("Columns"), summary.columns.len());
    println!("  {:<12} {:.2} MB", muted("Memory"), df.estimated_size() as f64 / 1024.0 / 1024.0);
    println!();

    println!(
        "  {:<20} {:<10} {:>6} {:>8} {:>10} {:>10}",
        muted("Column"), muted("Type"), muted("Nulls"), muted("Unique"), muted("Mean"), muted("SD")
    );
    println!("  {}", dim(&"─".repeat(70)));

    for col in &summary.columns {
        println!(
            "  {:<20} {:<10} {:>6} {:>8} {:>10} {:>10}",
            col.name,
            format!("{:?}", col.dtype).to_lowercase().truecolor(140, 140, 140),
            col.null_count,
            col.unique_count,
            col.mean.map(fmt_value).unwrap_or_default(),
            col.std.map(fmt_value).unwrap_or_default(),
        );
    }

    println!();
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn cmd_fit(
    data_path: &Path,
    target: Option<&str>,
    config_path: Option<&Path>,
    model_name: &str,
    seed: Option<u64>,
    output: Option<&Path>,
    roc: Option<&Path>,
) -> anyhow::Result<()> {
    section("Fit");

    let config = load_config(config_path, target, seed)?;
    let df = load_data(data_path)?;

    let (name, workflow) = config
        .workflows()
        .into_iter()
        .find(|(name, _)| name == model_name)
        .ok_or_else(|| {
            let names: Vec<String> = config.models.iter().map(|m| m.name.clone()).collect();
            anyhow::anyhow!("no model named '{}' (configured: {})", model_name, names.join(", "))
        })?;

    step_run("Splitting");
    let split = initial_split(&df, &config.split)?;
    step_done(&format!(
        "{} train / {} test",
        split.train_indices().len(),
        split.test_indices().len()
    ));

    step_run(&format!("Fitting {}", name.cyan()));
    let start = Instant::now();
    let result = last_fit(&workflow, &split, &df, &config.metrics)?;
    step_done(&format!("{:?}", start.elapsed()));

    section("Test-set metrics");
    print_metrics(result.collect_metrics());

    let fitted = result.extract_workflow();
    let predictions = result.collect_predictions();
    if let Some(levels) = fitted.levels() {
        let truth: Vec<String> = crate::data::string_values(predictions, fitted.outcome())?
            .into_iter()
            .flatten()
            .collect();
        let estimate: Vec<String> = crate::data::string_values(predictions, PRED_CLASS)?
            .into_iter()
            .flatten()
            .collect();
        if truth.len() == estimate.len() {
            let cm = ConfusionMatrix::new(&truth, &estimate, levels)?;
            section("Confusion matrix (columns: truth)");
            for line in cm.to_string().lines() {
                println!("  {}", line);
            }
        }

        if let Some(path) = roc {
            let curve = RocCurve::from_frame(predictions, fitted.outcome(), levels)?;
            curve.write_csv(path)?;
            println!();
            println!("  {} ROC curve → {}", ok("✓"), path.display());
        }
    } else if roc.is_some() {
        println!("  {}", "ROC curves need a classification outcome; skipped".yellow());
    }

    if let Some(path) = output {
        fitted.save(path)?;
        println!("  {} workflow → {}", ok("✓"), path.display());
    }

    println!();
    Ok(())
}

pub fn cmd_predict(
    model_path: &Path,
    data_path: &Path,
    kind: Option<&str>,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    section("Predict");

    step_run("Loading workflow");
    let workflow = FittedWorkflow::load(model_path)?;
    step_done(&format!("{} predictors", workflow.predictors().len()));

    let df = load_data(data_path)?;

    step_run("Predicting");
    let start = Instant::now();
    let predictions = match kind {
        Some(kind) => workflow.predict(&df, kind.parse::<PredictType>()?)?,
        None => workflow.augment(&df)?,
    };
    step_done(&format!("{} rows in {:?}", predictions.height(), start.elapsed()));

    match output {
        Some(path) => {
            DataSaver::write_csv(&predictions, path)?;
            println!("  {} predictions → {}", ok("✓"), path.display());
        }
        None => {
            println!();
            println!("{}", predictions.head(Some(10)));
        }
    }

    println!();
    Ok(())
}

pub fn cmd_resample(
    data_path: &Path,
    target: Option<&str>,
    config_path: Option<&Path>,
    folds: Option<usize>,
    seed: Option<u64>,
    sequential: bool,
) -> anyhow::Result<()> {
    section("Resample");

    let mut config = load_config(config_path, target, seed)?;
    if let Some(v) = folds {
        config.resampling.v = v;
    }
    let rank_metric = config.rank_metric()?;
    let df = load_data(data_path)?;

    step_run("Splitting");
    let split = initial_split(&df, &config.split)?;
    let training = split.training(&df)?;
    let resamples = vfold_cv(&training, &config.resampling)?;
    step_done(&format!("{} folds over {} training rows", resamples.len(), training.height()));

    let control = ResampleControl::new().with_parallel(!sequential);
    step_run(&format!("Resampling {} models", config.models.len()));
    let start = Instant::now();
    let comparison = compare_workflows(
        &config.workflows(),
        &resamples,
        &training,
        &config.metrics,
        &control,
        rank_metric,
    )?;
    step_done(&format!("{:?}", start.elapsed()));

    println!();
    println!(
        "  {:<6} {:<20} {:>10} {:>10} {:>10}",
        muted("Rank"), muted("Model"), muted(rank_metric.name()), muted("std_err"), muted("Time")
    );
    println!("  {}", dim(&"─".repeat(60)));
    for entry in &comparison.entries {
        match &entry.error {
            None => {
                let summary = entry.summary_for(rank_metric);
                println!(
                    "  {:<6} {:<20} {:>10} {:>10} {:>9.2}s",
                    entry.rank,
                    entry.name,
                    summary.map_or("NA".to_string(), |s| fmt_value(s.mean)),
                    summary.map_or("NA".to_string(), |s| fmt_value(s.std_err)),
                    entry.fit_time_secs
                );
            }
            Some(e) => {
                println!("  {:<6} {:<20} {}", entry.rank, entry.name, format!("err: {}", e).red());
            }
        }
    }
    println!("  {}", dim(&"─".repeat(60)));

    if let Some(best) = comparison.best() {
        println!();
        println!(
            "  {} {} {} {}",
            ok("best"),
            best.name.white().bold(),
            muted(&format!("{}:", rank_metric)),
            best.summary_for(rank_metric).map_or("NA".to_string(), |s| fmt_value(s.mean))
        );
        for summary in &best.metrics {
            println!(
                "    {:<14} {:>10} {}",
                muted(summary.metric.name()),
                fmt_value(summary.mean),
                dim(&format!("± {} (n = {})", fmt_value(summary.std_err), summary.n))
            );
        }
    }

    println!();
    Ok(())
}

/// Dispatch a parsed command line
pub fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Info { data } => cmd_info(&data),
        Commands::Fit { data, target, config, model, seed, output, roc } => cmd_fit(
            &data,
            target.as_deref(),
            config.as_deref(),
            &model,
            seed,
            output.as_deref(),
            roc.as_deref(),
        ),
        Commands::Predict { model, data, kind, output } => {
            cmd_predict(&model, &data, kind.as_deref(), output.as_deref())
        }
        Commands::Resample { data, target, config, folds, seed, sequential } => cmd_resample(
            &data,
            target.as_deref(),
            config.as_deref(),
            folds,
            seed,
            sequential,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_fit() {
        let cli = Cli::try_parse_from([
            "tabflow", "fit", "-d", "data.csv", "-t", "class", "--seed", "7", "--roc", "roc.csv",
        ])
        .unwrap();
        match cli.command {
            Commands::Fit { target, seed, roc, model, .. } => {
                assert_eq!(target.as_deref(), Some("class"));
                assert_eq!(seed, Some(7));
                assert_eq!(roc, Some(PathBuf::from("roc.csv")));
                assert_eq!(model, "logistic_reg");
            }
            _ => panic!("expected fit"),
        }
    }

    #[test]
    fn test_load_config_needs_target_or_file() {
        assert!(load_config(None, None, None).is_err());
        let config = load_config(None, Some("y"), Some(3)).unwrap();
        assert_eq!(config.outcome, "y");
        assert_eq!(config.split.seed, Some(3));
    }

    #[test]
    fn test_fit_and_predict_commands() {
        let dir = tempfile::tempdir().unwrap();
        let n = 60;
        let x: Vec<f64> = (0..n).map(|i| (i as f64 * 0.53).sin() * 2.0 + i as f64 / 20.0).collect();
        let g: Vec<&str> = (0..n).map(|i| ["p", "q", "r"][i % 3]).collect();
        let class: Vec<&str> = x
            .iter()
            .enumerate()
            .map(|(i, v)| if *v > 1.0 || i % 9 == 0 { "one" } else { "two" })
            .collect();
        let df = df!("x" => x, "g" => g, "class" => class).unwrap();
        let data = dir.path().join("data.csv");
        DataSaver::write_csv(&df, &data).unwrap();

        let model = dir.path().join("model.json");
        let roc = dir.path().join("roc.csv");
        cmd_fit(&data, Some("class"), None, "logistic_reg", Some(1), Some(&model), Some(&roc)).unwrap();
        assert!(model.exists());
        assert!(roc.exists());

        let out = dir.path().join("pred.csv");
        cmd_predict(&model, &data, Some("prob"), Some(&out)).unwrap();
        let preds = DataLoader::new().load(&out).unwrap();
        assert_eq!(preds.height(), n);
        assert_eq!(preds.width(), 2);
    }
}
