//! Integration test: v-fold resampling, model comparison and pipeline configs

use polars::prelude::*;
use std::collections::HashSet;
use tabflow::config::PipelineConfig;
use tabflow::data::{numeric_values, string_values};
use tabflow::metrics::{prob_column, Metric, MetricSet};
use tabflow::model::{decision_tree, linear_reg, logistic_reg};
use tabflow::recipe::{all_numeric_predictors, Recipe};
use tabflow::resample::{compare_workflows, fit_resamples, ResampleControl};
use tabflow::split::{initial_split, vfold_cv, VfoldConfig};
use tabflow::workflow::Workflow;

fn create_classification_dataset(n: usize) -> DataFrame {
    let f1: Vec<f64> = (0..n).map(|i| (i as f64 * 0.37).sin() * 3.0).collect();
    let f2: Vec<f64> = (0..n).map(|i| (i as f64 * 0.11).cos() * 2.0).collect();
    let group: Vec<&str> = (0..n).map(|i| ["u", "v"][i % 2]).collect();
    let class: Vec<&str> = (0..n)
        .map(|i| {
            let score = f1[i] - f2[i] + (i as f64 * 1.7).sin();
            if score > 0.0 { "yes" } else { "no" }
        })
        .collect();
    df!("f1" => f1, "f2" => f2, "group" => group, "class" => class).unwrap()
}

#[test]
fn test_vfold_partitions_every_row_once() {
    let df = create_classification_dataset(103);
    let folds = vfold_cv(&df, &VfoldConfig::new(10).with_seed(1)).unwrap();
    assert_eq!(folds.len(), 10);
    assert_eq!(folds.ids()[0], "Fold01");
    assert_eq!(folds.ids()[9], "Fold10");

    let mut seen = vec![0usize; df.height()];
    for fold in &folds.folds {
        assert_eq!(fold.analysis.len() + fold.assessment.len(), df.height());
        let analysis: HashSet<usize> = fold.analysis.iter().copied().collect();
        assert!(fold.assessment.iter().all(|i| !analysis.contains(i)));
        for &i in &fold.assessment {
            seen[i] += 1;
        }
    }
    assert!(seen.iter().all(|&c| c == 1));
}

#[test]
fn test_stratified_folds_keep_class_balance() {
    let df = create_classification_dataset(200);
    let folds = vfold_cv(&df, &VfoldConfig::new(5).with_strata("class").with_seed(2)).unwrap();
    let classes: Vec<String> = string_values(&df, "class").unwrap().into_iter().flatten().collect();
    let overall = classes.iter().filter(|c| *c == "yes").count() as f64 / classes.len() as f64;

    for fold in &folds.folds {
        let yes = fold.assessment.iter().filter(|&&i| classes[i] == "yes").count() as f64;
        let share = yes / fold.assessment.len() as f64;
        assert!((share - overall).abs() < 0.06, "fold {} share {}", fold.id, share);
    }
}

#[test]
fn test_repeated_folds() {
    let df = create_classification_dataset(40);
    let folds = vfold_cv(&df, &VfoldConfig::new(4).with_repeats(2).with_seed(3)).unwrap();
    assert_eq!(folds.len(), 8);
    assert_eq!(folds.ids()[0], "Repeat1_Fold1");
    assert_eq!(folds.ids()[7], "Repeat2_Fold4");
}

#[test]
fn test_fit_resamples_with_saved_predictions() {
    let df = create_classification_dataset(120);
    let folds = vfold_cv(&df, &VfoldConfig::new(5).with_seed(4)).unwrap();
    let workflow = Workflow::new()
        .add_recipe(Recipe::new("class").step_dummy(tabflow::recipe::all_nominal_predictors()))
        .add_model(logistic_reg());

    let control = ResampleControl::new().with_save_pred(true);
    let results = fit_resamples(&workflow, &folds, &df, &MetricSet::classification_default(), &control)
        .unwrap();

    assert_eq!(results.n_failed(), 0);
    assert_eq!(results.fold_metrics().len(), 10);

    let summaries = results.collect_metrics();
    assert_eq!(summaries.len(), 2);
    for s in &summaries {
        assert_eq!(s.n, 5);
        assert!(s.std_err.is_finite());
    }
    assert!(results.summary_for(Metric::RocAuc).unwrap().mean > 0.75);

    let predictions = results.collect_predictions().unwrap();
    assert_eq!(predictions.height(), df.height());
    assert!(predictions.column("id").is_ok());
    assert!(predictions.column(".row").is_ok());
}

#[test]
fn test_compare_workflows_ranks_by_metric_direction() {
    let n = 90;
    let x: Vec<f64> = (0..n).map(|i| i as f64 / 3.0).collect();
    let y: Vec<f64> = x.iter().enumerate().map(|(i, v)| 1.5 * v - 2.0 + (i as f64).sin() * 0.2).collect();
    let df = df!("x" => x, "y" => y).unwrap();
    let folds = vfold_cv(&df, &VfoldConfig::new(5).with_seed(8)).unwrap();

    let base = Workflow::new().add_recipe(Recipe::new("y").step_normalize(all_numeric_predictors()));
    let workflows = vec![
        ("stump".to_string(), base.update_model(decision_tree().with_tree_depth(1))),
        ("linear".to_string(), base.update_model(linear_reg())),
    ];

    for metric in [Metric::Rmse, Metric::Rsq] {
        let comparison = compare_workflows(
            &workflows,
            &folds,
            &df,
            &MetricSet::regression_default(),
            &ResampleControl::new().with_parallel(false),
            metric,
        )
        .unwrap();
        assert_eq!(comparison.best().unwrap().name, "linear", "ranked by {}", metric);
        assert_eq!(comparison.entries[1].rank, 2);
        assert!(comparison.entries.iter().all(|e| e.fit_time_secs >= 0.0));
    }
}

#[test]
fn test_pipeline_config_drives_comparison() {
    let df = create_classification_dataset(160);
    let mut config = PipelineConfig::classification_default("class").with_seed(21);
    config.resampling = VfoldConfig::new(3).with_seed(21);
    config.models[1].spec = config.models[1].spec.clone().with_trees(20);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pipeline.json");
    config.to_json_file(&path).unwrap();
    let config = PipelineConfig::from_json_file(&path).unwrap();

    let split = initial_split(&df, &config.split).unwrap();
    let training = split.training(&df).unwrap();
    let folds = vfold_cv(&training, &config.resampling).unwrap();
    let comparison = compare_workflows(
        &config.workflows(),
        &folds,
        &training,
        &config.metrics,
        &ResampleControl::new(),
        config.rank_metric().unwrap(),
    )
    .unwrap();

    assert_eq!(comparison.entries.len(), 2);
    assert!(comparison.entries.iter().all(|e| e.error.is_none()));
    assert!(comparison.entries.iter().all(|e| e.summary_for(Metric::RocAuc).is_some()));
    assert_eq!(comparison.to_frame().unwrap().height(), 2);
}

#[test]
fn test_class_seen_only_in_one_assessment_set() {
    let n = 50;
    let x: Vec<f64> = (0..n).map(|i| i as f64).collect();
    let class: Vec<&str> = (0..n)
        .map(|i| if i == 17 { "rare" } else if i < 25 { "lo" } else { "hi" })
        .collect();
    let df = df!("x" => x, "class" => class).unwrap();
    let folds = vfold_cv(&df, &VfoldConfig::new(5).with_seed(6)).unwrap();
    let workflow = Workflow::new().add_variables("class").add_model(decision_tree());

    let control = ResampleControl::new().with_save_pred(true);
    let results = fit_resamples(&workflow, &folds, &df, &MetricSet::classification_default(), &control)
        .unwrap();
    assert_eq!(results.n_failed(), 0);

    let predictions = results.collect_predictions().unwrap();
    assert_eq!(predictions.height(), n);
    let truth = string_values(&predictions, "class").unwrap();
    let rare = numeric_values(&predictions, &prob_column("rare")).unwrap();
    let at = truth.iter().position(|t| t.as_deref() == Some("rare")).unwrap();
    assert_eq!(rare[at], Some(0.0), "the rare row's analysis set never saw its class");
}
