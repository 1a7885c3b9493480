use optimizer_distributed::prelude::*;

#[test]
fn test_optimize_sequential_quadratic() {
    let mut study = Study::builder().seed(9).build();
    let x = FloatParam::new(-10.0, 10.0).name("x");

    study
        .optimize(30, |trial| {
            let v = x.suggest(trial)?;
            Ok::<_, Error>((v - 3.0).powi(2))
        })
        .unwrap();

    assert_eq!(study.n_trials(), 30);
    let best = study.best_trial().unwrap();
    assert_eq!(best.value, study.best_value().ok());
    assert!(best.get(&x).is_some());
}

#[test]
fn test_optimize_with_pruning() {
    let mut study = Study::builder()
        .pruner(ThresholdPruner::new().upper(1.0))
        .build();

    study
        .optimize(5, |trial| {
            for step in 0..3 {
                trial.report(2.0 * (step + 1) as f64, step)?;
                trial.should_prune()?;
            }
            Ok::<_, Error>(0.0)
        })
        .unwrap_err();

    // Every trial pruned, so there is no completed trial to report.
    assert_eq!(study.get_trials(&[TrialState::Pruned]).len(), 5);
}

#[test]
fn test_optimize_records_failures() {
    let mut study = Study::new(Direction::Maximize);
    study
        .optimize(6, |trial| {
            if trial.id() % 2 == 0 {
                Err("odd ones only")
            } else {
                Ok(trial.id() as f64)
            }
        })
        .unwrap();

    assert_eq!(study.get_trials(&[TrialState::Failed]).len(), 3);
    assert_eq!(study.best_value().unwrap(), 5.0);
}

#[test]
fn test_local_trial_user_attrs() {
    let mut study = Study::new(Direction::Minimize);
    study
        .optimize(1, |trial| {
            trial.set_user_attr("epoch", 42_i64.into())?;
            trial.set_user_attr("tag", "baseline".into())?;
            let attrs = trial.user_attrs()?;
            assert_eq!(attrs.get("epoch"), Some(&AttrValue::Int(42)));
            Ok::<_, Error>(1.0)
        })
        .unwrap();

    let record = &study.trials()[0];
    assert_eq!(
        record.user_attr("tag"),
        Some(&AttrValue::String("baseline".into()))
    );
}
