use super::*;

fn pruned_above(limit: f64) -> DistributedStudy {
    let study = Study::builder()
        .minimize()
        .sampler(RandomSampler::with_seed(21))
        .pruner(ThresholdPruner::new().upper(limit))
        .build();
    DistributedStudy::from_study(study, None)
}

#[test]
fn should_prune_ends_the_trial_as_pruned() {
    let mut study = pruned_above(5.0);
    study
        .optimize(8, 4, |trial: &mut RemoteTrial| {
            for step in 0..5 {
                trial.report(10.0 + step as f64, step)?;
                trial.should_prune()?;
            }
            Ok::<_, Error>(0.0)
        })
        .unwrap();

    let pruned = study.get_trials(&[TrialState::Pruned]);
    assert_eq!(pruned.len(), 8);
    for trial in pruned {
        assert_eq!(trial.intermediate_values, vec![(0, 10.0)]);
        assert!(trial.value.is_none());
    }
    assert!(matches!(study.best_value(), Err(Error::NoCompletedTrials)));
}

#[test]
fn swallowed_prune_signal_still_prunes() {
    let mut study = pruned_above(5.0);
    study
        .optimize(3, 3, |trial: &mut RemoteTrial| {
            trial.report(9.0, 0)?;
            let signal = trial.should_prune();
            assert!(matches!(signal, Err(Error::TrialPruned)));
            assert!(trial.was_pruned());
            Ok::<_, Error>(1.0)
        })
        .unwrap();

    assert_eq!(study.get_trials(&[TrialState::Pruned]).len(), 3);
}

#[test]
fn only_trials_over_the_threshold_are_pruned() {
    let mut study = pruned_above(0.5);
    study
        .optimize(20, 4, |trial: &mut RemoteTrial| {
            let x = trial.suggest_float("x", 0.0, 1.0)?;
            trial.report(x, 0)?;
            trial.should_prune()?;
            Ok::<_, Error>(x)
        })
        .unwrap();

    for trial in study.trials() {
        let ParamValue::Float(x) = trial.params["x"] else {
            panic!("x should be a float");
        };
        match trial.state {
            TrialState::Pruned => assert!(x > 0.5),
            TrialState::Complete => assert!(x <= 0.5),
            other => panic!("unexpected state {other:?}"),
        }
    }
}

#[test]
fn trial_without_reports_is_never_pruned() {
    let mut study = pruned_above(-1.0);
    study
        .optimize(4, 2, |trial: &mut RemoteTrial| {
            assert!(!trial.should_prune()?);
            Ok::<_, Error>(2.0)
        })
        .unwrap();
    assert_eq!(study.get_trials(&[TrialState::Complete]).len(), 4);
}

#[test]
fn median_pruner_sees_completed_trials_from_other_workers() {
    let study = Study::builder()
        .minimize()
        .pruner(MedianPruner::new(Direction::Minimize).n_min_trials(1))
        .build();
    let mut study = DistributedStudy::from_study(study, None);
    // Serial run: trial 0 completes with low curves before trial 1 reports high ones.
    study
        .optimize(2, 1, |trial: &mut RemoteTrial| {
            let level = if trial.id() == 0 { 1.0 } else { 100.0 };
            for step in 0..3 {
                trial.report(level, step)?;
                trial.should_prune()?;
            }
            Ok::<_, Error>(level)
        })
        .unwrap();

    assert_eq!(study.study().trial(0).unwrap().state, TrialState::Complete);
    assert_eq!(study.study().trial(1).unwrap().state, TrialState::Pruned);
}

#[test]
fn median_pruner_without_a_minimum_lets_the_first_trial_run() {
    let study = Study::builder()
        .minimize()
        .pruner(MedianPruner::new(Direction::Minimize).n_min_trials(0))
        .build();
    let mut study = DistributedStudy::from_study(study, None);
    study
        .optimize(3, 1, |trial: &mut RemoteTrial| {
            trial.report(1.0, 0)?;
            assert!(!trial.should_prune()?);
            Ok::<_, Error>(1.0)
        })
        .unwrap();

    assert_eq!(study.get_trials(&[TrialState::Complete]).len(), 3);
}
