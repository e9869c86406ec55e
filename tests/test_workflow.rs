//! Integration test: full pipeline (split → recipe → workflow → last fit → save/load)

use polars::prelude::*;
use tabflow::data::{levels, numeric_values, string_values};
use tabflow::metrics::{prob_column, Metric, MetricSet, PRED_CLASS, PRED_NUMERIC};
use tabflow::model::{decision_tree, linear_reg, logistic_reg, rand_forest, Mode};
use tabflow::recipe::{all_nominal_predictors, all_numeric_predictors, all_predictors, Recipe, Role};
use tabflow::split::{initial_split, SplitConfig};
use tabflow::workflow::{last_fit, FittedWorkflow, PredictType, Workflow};

fn create_classification_dataset(n: usize) -> DataFrame {
    let mut id = Vec::with_capacity(n);
    let mut f1 = Vec::with_capacity(n);
    let mut f2 = Vec::with_capacity(n);
    let mut group = Vec::with_capacity(n);
    let mut class = Vec::with_capacity(n);

    for i in 0..n {
        let x = i as f64;
        let a = (x * 0.37).sin() * 3.0;
        let b = (x * 0.11).cos() * 2.0;
        let g = ["north", "south", "west"][i % 3];
        let noise = (x * 1.7).sin();
        id.push(format!("s{}", i));
        f1.push(a);
        f2.push(b);
        group.push(g);
        class.push(if a - b + noise > 0.0 { "event" } else { "other" });
    }

    df!(
        "id" => id,
        "f1" => f1,
        "f2" => f2,
        "group" => group,
        "class" => class,
    )
    .unwrap()
}

fn create_regression_dataset(n: usize) -> DataFrame {
    let x1: Vec<f64> = (0..n).map(|i| i as f64 / 10.0).collect();
    let x2: Vec<f64> = (0..n).map(|i| (i as f64 / 10.0).sin()).collect();
    let y: Vec<f64> = x1
        .iter()
        .zip(x2.iter())
        .enumerate()
        .map(|(i, (a, b))| 2.0 * a + 3.0 * b + 0.5 + (i as f64 * 2.3).sin() * 0.1)
        .collect();
    df!("x1" => x1, "x2" => x2, "y" => y).unwrap()
}

fn classification_recipe() -> Recipe {
    Recipe::new("class")
        .update_role(&["id"], Role::Id)
        .step_dummy(all_nominal_predictors())
        .step_corr(all_numeric_predictors(), 0.9)
        .step_normalize(all_numeric_predictors())
        .step_zv(all_predictors())
}

#[test]
fn test_full_classification_pipeline() {
    let df = create_classification_dataset(200);
    let split = initial_split(&df, &SplitConfig::new().with_strata("class").with_seed(11)).unwrap();
    assert_eq!(split.train_indices().len() + split.test_indices().len(), 200);

    let workflow = Workflow::new().add_recipe(classification_recipe()).add_model(logistic_reg());
    let result = last_fit(&workflow, &split, &df, &MetricSet::classification_default()).unwrap();

    let metrics = result.collect_metrics();
    assert_eq!(metrics.len(), 2);
    let accuracy = metrics.iter().find(|m| m.metric == Metric::Accuracy).unwrap().estimate;
    let auc = metrics.iter().find(|m| m.metric == Metric::RocAuc).unwrap().estimate;
    assert!(accuracy > 0.7, "accuracy {}", accuracy);
    assert!(auc > 0.8, "roc_auc {}", auc);

    let predictions = result.collect_predictions();
    assert_eq!(predictions.height(), split.test_indices().len());
    for column in [PRED_CLASS, ".pred_event", ".pred_other", ".row", "id", "class"] {
        assert!(predictions.column(column).is_ok(), "missing {}", column);
    }

    // Probabilities sum to one
    let p_event = numeric_values(predictions, &prob_column("event")).unwrap();
    let p_other = numeric_values(predictions, &prob_column("other")).unwrap();
    for (a, b) in p_event.iter().zip(p_other.iter()) {
        assert!((a.unwrap() + b.unwrap() - 1.0).abs() < 1e-9);
    }

    let fitted = result.extract_workflow();
    assert_eq!(fitted.mode(), Mode::Classification);
    assert_eq!(fitted.levels().unwrap(), levels(&df, "class").unwrap().as_slice());
    assert!(fitted.predictors().iter().any(|p| p.starts_with("group_")));
    assert!(!fitted.predictors().contains(&"id".to_string()));
}

#[test]
fn test_random_forest_is_reproducible_with_seed() {
    let df = create_classification_dataset(150);
    let spec = rand_forest().with_trees(25).with_seed(5).with_num_threads(2);
    let workflow = Workflow::new().add_recipe(classification_recipe()).add_model(spec);

    let a = workflow.fit(&df).unwrap().predict(&df, PredictType::Prob).unwrap();
    let b = workflow.fit(&df).unwrap().predict(&df, PredictType::Prob).unwrap();
    assert!(a.equals(&b));
    assert_eq!(a.width(), 2);
}

#[test]
fn test_saved_workflow_predicts_the_same() {
    let df = create_classification_dataset(120);
    let fitted = Workflow::new()
        .add_recipe(classification_recipe())
        .add_model(decision_tree().with_tree_depth(4))
        .fit(&df)
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tree.json");
    fitted.save(&path).unwrap();
    let loaded = FittedWorkflow::load(&path).unwrap();

    let before = string_values(&fitted.predict(&df, PredictType::Class).unwrap(), PRED_CLASS).unwrap();
    let after = string_values(&loaded.predict(&df, PredictType::Class).unwrap(), PRED_CLASS).unwrap();
    assert_eq!(before, after);
    assert!(loaded.extract_recipe().juice().is_err());
}

#[test]
fn test_predict_without_outcome_column() {
    let df = create_classification_dataset(90);
    let fitted = Workflow::new()
        .add_recipe(classification_recipe())
        .add_model(logistic_reg())
        .fit(&df)
        .unwrap();

    let new_data = df.drop("class").unwrap();
    let augmented = fitted.augment(&new_data).unwrap();
    assert_eq!(augmented.height(), 90);
    assert!(augmented.column(PRED_CLASS).is_ok());
    assert!(fitted.evaluate(&new_data, &MetricSet::classification_default()).is_err());
}

#[test]
fn test_regression_workflow_end_to_end() {
    let df = create_regression_dataset(120);
    let split = initial_split(&df, &SplitConfig::new().with_prop(0.8).with_seed(3)).unwrap();
    let workflow = Workflow::new()
        .add_recipe(Recipe::new("y").step_normalize(all_numeric_predictors()))
        .add_model(linear_reg());

    let result = last_fit(&workflow, &split, &df, &MetricSet::regression_default()).unwrap();
    let rsq = result.collect_metrics().iter().find(|m| m.metric == Metric::Rsq).unwrap().estimate;
    assert!(rsq > 0.99, "rsq {}", rsq);
    assert!(result.collect_predictions().column(PRED_NUMERIC).is_ok());
    assert_eq!(result.extract_workflow().mode(), Mode::Regression);
    assert!(result.extract_workflow().levels().is_none());
}

#[test]
fn test_unknown_mode_follows_outcome_type() {
    let df = create_regression_dataset(60);
    let fitted = Workflow::new().add_variables("y").add_model(decision_tree()).fit(&df).unwrap();
    assert_eq!(fitted.mode(), Mode::Regression);

    let df = create_classification_dataset(60).drop("id").unwrap().drop("group").unwrap();
    let fitted = Workflow::new().add_variables("class").add_model(decision_tree()).fit(&df).unwrap();
    assert_eq!(fitted.mode(), Mode::Classification);
}

#[test]
fn test_multiclass_forest() {
    let n = 150;
    let x: Vec<f64> = (0..n).map(|i| i as f64).collect();
    let noise: Vec<f64> = (0..n).map(|i| (i as f64 * 0.9).sin()).collect();
    let label: Vec<&str> = (0..n).map(|i| ["low", "mid", "high"][i * 3 / n]).collect();
    let df = df!("x" => x, "noise" => noise, "label" => label).unwrap();

    let fitted = Workflow::new()
        .add_variables("label")
        .add_model(rand_forest().with_trees(30).with_seed(9))
        .fit(&df)
        .unwrap();
    assert_eq!(fitted.levels().unwrap().len(), 3);

    let estimates = fitted
        .evaluate(&df, &MetricSet::new(&[Metric::Accuracy, Metric::RocAuc]))
        .unwrap();
    assert!(estimates[0].estimate > 0.9);
    assert_eq!(estimates[1].estimator, "hand_till");
}

#[test]
fn test_logistic_rejects_multiclass() {
    let n = 30;
    let x: Vec<f64> = (0..n).map(|i| i as f64).collect();
    let label: Vec<&str> = (0..n).map(|i| ["a", "b", "c"][i % 3]).collect();
    let df = df!("x" => x, "label" => label).unwrap();
    let result = Workflow::new().add_variables("label").add_model(logistic_reg()).fit(&df);
    assert!(result.is_err());
}
