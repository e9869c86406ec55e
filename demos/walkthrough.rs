//! Walkthrough Example
//!
//! Split a synthetic two-class dataset, preprocess it with a recipe, fit a
//! logistic regression and a random forest, evaluate both on the test set and
//! compare them with 10-fold cross-validation on the training set.

use polars::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::time::Instant;
use tabflow::prelude::*;

/// Cell-image style data: skewed positive measurements, a redundant copy of
/// one of them, a constant column, a nominal plate id and an id column
fn synthetic_cells(n: usize, seed: u64) -> PolarsResult<DataFrame> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut id = Vec::with_capacity(n);
    let mut area = Vec::with_capacity(n);
    let mut area_copy = Vec::with_capacity(n);
    let mut intensity = Vec::with_capacity(n);
    let mut shape = Vec::with_capacity(n);
    let mut constant = Vec::with_capacity(n);
    let mut plate = Vec::with_capacity(n);
    let mut class = Vec::with_capacity(n);

    for i in 0..n {
        let a: f64 = (rng.gen::<f64>() * 3.0).exp() * 50.0;
        let b: f64 = rng.gen::<f64>() * 200.0 + 10.0;
        let s: f64 = rng.gen::<f64>();
        let p = ["A", "B", "C"][rng.gen_range(0..3)];
        let score = (a.ln() - 5.4) * 1.2 - (b - 110.0) / 60.0 + (s - 0.5) * 2.0
            + if p == "C" { 0.5 } else { 0.0 }
            + (rng.gen::<f64>() - 0.5) * 2.0;

        id.push(format!("cell_{:04}", i));
        area.push(a);
        area_copy.push(a * 1.01 + rng.gen::<f64>());
        intensity.push(b);
        shape.push(s);
        constant.push(1.0);
        plate.push(p);
        class.push(if score > 0.0 { "PS" } else { "WS" });
    }

    df!(
        "cell_id" => id,
        "area" => area,
        "area_copy" => area_copy,
        "intensity" => intensity,
        "shape" => shape,
        "constant" => constant,
        "plate" => plate,
        "class" => class,
    )
}

fn print_metrics(estimates: &[MetricEstimate]) {
    for e in estimates {
        println!("  {:<14} {:<12} {:>8.4}", e.metric.name(), e.estimator, e.estimate);
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tabflow=warn".into()),
        )
        .init();

    let cells = synthetic_cells(1000, 123)?;
    println!("Dataset: {} samples, {} columns", cells.height(), cells.width());
    println!("Class levels: {:?}\n", tabflow::data::levels(&cells, "class")?);

    // Stratified 3/4 split
    let split = initial_split(&cells, &SplitConfig::new().with_strata("class").with_seed(123))?;
    let train = split.training(&cells)?;
    let test = split.testing(&cells)?;
    println!("Train: {} rows, Test: {} rows\n", train.height(), test.height());

    let recipe = Recipe::new("class")
        .update_role(&["cell_id"], Role::Id)
        .step_dummy(all_nominal_predictors())
        .step_log(columns(&["area", "area_copy"]))
        .step_corr(all_numeric_predictors(), 0.9)
        .step_normalize(all_numeric_predictors())
        .step_zv(all_predictors());

    let prepared = recipe.prep(&train)?;
    println!("Prepared recipe keeps {} predictors: {:?}", prepared.predictors().len(), prepared.predictors());
    let baked = prepared.bake(&test)?;
    println!("Baked test set: {} rows × {} cols\n", baked.height(), baked.width());

    let metrics = MetricSet::classification_default();
    let base = Workflow::new().add_recipe(recipe);
    let logistic = base.update_model(logistic_reg());
    let forest = base.update_model(
        rand_forest()
            .with_trees(100)
            .with_num_threads(4)
            .with_seed(123)
            .set_mode(Mode::Classification)?,
    );

    // Fit on training, evaluate on testing
    for (name, workflow) in [("logistic_reg", &logistic), ("rand_forest", &forest)] {
        let start = Instant::now();
        let result = last_fit(workflow, &split, &cells, &metrics)?;
        println!("{} (test set, {} ms)", name, start.elapsed().as_millis());
        print_metrics(result.collect_metrics());

        let predictions = result.collect_predictions();
        let levels = result.extract_workflow().levels().unwrap_or_default();
        let roc = RocCurve::from_frame(predictions, "class", levels)?;
        for ((level, points), (_, area)) in roc.curves.iter().zip(roc.areas()) {
            println!("  ROC curve for {}: {} points, area {:.4}", level, points.len(), area);
        }
        println!();
    }

    let fitted = logistic.fit(&train)?;
    if let Some(coefs) = fitted.extract_fit().coefficients() {
        println!("Logistic regression coefficients (intercept {:.4}):", coefs.intercept);
        for (name, w) in fitted.predictors().iter().zip(coefs.weights.iter()) {
            println!("  {:<14} {:>8.4}", name, w);
        }
        println!();
    }

    let augmented = fitted.augment(&test)?;
    println!("{}\n", augmented.select([".pred_class", ".pred_PS", ".pred_WS", "class"])?.head(Some(5)));

    // Resampled comparison
    let folds = vfold_cv(&train, &VfoldConfig::new(10).with_seed(123))?;
    let comparison = compare_workflows(
        &[("logistic_reg".to_string(), logistic), ("rand_forest".to_string(), forest)],
        &folds,
        &train,
        &metrics,
        &ResampleControl::new(),
        Metric::RocAuc,
    )?;

    println!("10-fold cross-validation on the training set");
    println!("{:<6} {:<16} {:>10} {:>10} {:>10}", "Rank", "Model", "roc_auc", "std_err", "Time (s)");
    println!("{}", "-".repeat(56));
    for entry in &comparison.entries {
        let summary = entry.summary_for(Metric::RocAuc);
        println!(
            "{:<6} {:<16} {:>10.4} {:>10.4} {:>10.2}",
            entry.rank,
            entry.name,
            summary.map_or(f64::NAN, |s| s.mean),
            summary.map_or(f64::NAN, |s| s.std_err),
            entry.fit_time_secs
        );
    }

    Ok(())
}
