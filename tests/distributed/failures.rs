use std::thread;
use std::time::Duration;

use optimizer_distributed::OptimizeConfig;
use optimizer_distributed::pruner::Pruner;

use super::*;

fn assert_nothing_left_open(study: &DistributedStudy) {
    let open = study.get_trials(&[TrialState::Pending, TrialState::Running]);
    assert!(open.is_empty(), "unfinished trials: {open:?}");
}

#[test]
fn one_failing_trial_does_not_stop_the_run() {
    let mut study = minimizing(11);
    study
        .optimize(10, 4, |trial: &mut RemoteTrial| {
            let x = trial.suggest_float("x", 0.0, 1.0)?;
            if trial.id() == 3 {
                return Err(Error::Objective("trial 3 blew up".into()));
            }
            Ok(x)
        })
        .expect("failures are absorbed by default");

    let failed = study.get_trials(&[TrialState::Failed]);
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].id, 3);
    assert_eq!(study.get_trials(&[TrialState::Complete]).len(), 9);
}

#[test]
fn panicking_objective_marks_the_trial_failed() {
    let mut study = minimizing(12);
    study
        .optimize(6, 2, |trial: &mut RemoteTrial| {
            assert!(trial.id() != 4, "bad trial");
            Ok::<_, Error>(1.0)
        })
        .unwrap();

    let failed = study.get_trials(&[TrialState::Failed]);
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].id, 4);
    assert_eq!(study.trials().len(), 6);
}

#[test]
fn catch_none_aborts_and_fails_unfinished_trials() {
    let mut study = minimizing(13);
    let config = OptimizeConfig::new().n_jobs(2).catch(Catch::None);
    let err = study
        .optimize_with(20, &config, |trial: &mut RemoteTrial| -> core::result::Result<f64, Box<dyn std::error::Error>> {
            let x = trial.suggest_float("x", 0.0, 1.0)?;
            if trial.id() == 2 {
                return Err("diverged".into());
            }
            thread::sleep(Duration::from_millis(5));
            Ok(x)
        })
        .unwrap_err();

    assert!(matches!(&err, Error::Objective(m) if m == "diverged"), "{err}");
    assert_eq!(study.study().trial(2).unwrap().state, TrialState::Failed);
    assert!(study.study().n_trials() < 20);
    assert_nothing_left_open(&study);
    assert!(study.last_run().is_none());
}

#[test]
fn catch_matching_only_absorbs_matching_failures() {
    let mut study = minimizing(14);
    let config = OptimizeConfig::new()
        .n_jobs(1)
        .catch(Catch::matching(|m| m.contains("transient")));
    let err = study
        .optimize_with(10, &config, |trial: &mut RemoteTrial| match trial.id() {
            1 | 2 => Err("transient network error".to_owned()),
            5 => Err("fatal: disk full".to_owned()),
            _ => Ok(0.5),
        })
        .unwrap_err();

    assert!(matches!(err, Error::Objective(ref m) if m.starts_with("fatal")));
    // One job at a time: trials after the fatal one were never created.
    assert_eq!(study.study().n_trials(), 6);
    assert_eq!(study.get_trials(&[TrialState::Failed]).len(), 3);
    assert_eq!(study.get_trials(&[TrialState::Complete]).len(), 3);
    assert_nothing_left_open(&study);
}

#[test]
fn refused_dispatch_is_fatal() {
    let study = Study::new(Direction::Minimize);
    let mut study = DistributedStudy::from_study(study, Some(FlakyExecutor::new(0)));
    let err = study
        .optimize(5, 2, |_: &mut RemoteTrial| Ok::<_, Error>(1.0))
        .unwrap_err();

    assert!(matches!(err, Error::WorkerDispatch(ref m) if m.contains("node lost")));
    assert_eq!(study.study().n_trials(), 1);
    assert_eq!(study.study().trial(0).unwrap().state, TrialState::Failed);
}

#[test]
fn dispatch_failure_mid_run_fails_what_is_still_running() {
    let study = Study::new(Direction::Minimize);
    let mut study = DistributedStudy::from_study(study, Some(FlakyExecutor::new(3)));
    let err = study
        .optimize(10, 1, |trial: &mut RemoteTrial| {
            let x = trial.suggest_float("x", 0.0, 1.0)?;
            Ok::<_, Error>(x)
        })
        .unwrap_err();

    assert!(matches!(err, Error::WorkerDispatch(_)));
    assert!(!err.is_trial_scoped());
    assert_eq!(study.study().n_trials(), 4);
    assert_eq!(study.get_trials(&[TrialState::Complete]).len(), 3);
    assert_eq!(study.study().trial(3).unwrap().state, TrialState::Failed);
    assert_nothing_left_open(&study);
}

#[test]
fn parameter_conflict_fails_only_that_trial() {
    let mut study = minimizing(15);
    study
        .optimize(4, 2, |trial: &mut RemoteTrial| {
            let x = trial.suggest_float("x", 0.0, 1.0)?;
            if trial.id() == 0 {
                let err = trial.suggest_int("x", 0, 3).unwrap_err();
                assert!(matches!(err, Error::ParameterConflict { ref name, .. } if name == "x"));
                return Err(err);
            }
            // Re-suggesting with the same distribution returns the stored value.
            assert_eq!(trial.suggest_float("x", 0.0, 1.0)?, x);
            Ok(x)
        })
        .unwrap();

    assert_eq!(study.study().trial(0).unwrap().state, TrialState::Failed);
    assert_eq!(study.get_trials(&[TrialState::Complete]).len(), 3);
}

/// Panics on every decision.
struct ExplodingPruner;

impl Pruner for ExplodingPruner {
    fn should_prune(
        &mut self,
        _trial_id: u64,
        _step: u64,
        _intermediate_values: &[(u64, f64)],
        _history: &[TrialRecord],
    ) -> bool {
        panic!("pruner exploded")
    }
}

#[test]
fn panicking_pruner_aborts_the_run_without_leaving_trials_open() {
    let study = Study::builder().minimize().pruner(ExplodingPruner).build();
    let executor = Arc::new(ThreadExecutor::with_name("fragile"));
    let mut study = DistributedStudy::from_study(study, Some(executor));
    let err = study
        .optimize(8, 3, |trial: &mut RemoteTrial| {
            let x = trial.suggest_float("x", 0.0, 1.0)?;
            trial.report(x, 0)?;
            trial.should_prune()?;
            Ok::<_, Error>(x)
        })
        .unwrap_err();

    assert!(
        matches!(&err, Error::StudyPanicked(m) if m.contains("pruner exploded")),
        "{err}"
    );
    assert!(!err.is_trial_scoped());
    assert_nothing_left_open(&study);
    assert!(study.last_run().is_none());
}

#[test]
fn full_width_integer_range_is_sampled() {
    let mut study = minimizing(16);
    study
        .optimize(6, 3, |trial: &mut RemoteTrial| {
            let n = trial.suggest_int_with(
                "n",
                IntDistribution {
                    step: Some(1),
                    ..IntDistribution::uniform(i64::MIN, i64::MAX)
                },
            )?;
            Ok::<_, Error>(n as f64)
        })
        .unwrap();

    assert_eq!(study.get_trials(&[TrialState::Complete]).len(), 6);
}
