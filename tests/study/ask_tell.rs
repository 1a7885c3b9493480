use optimizer_distributed::distribution::{Distribution, FloatDistribution};
use optimizer_distributed::{Direction, Error, ParamValue, Study, TrialOutcome, TrialState};

fn float(low: f64, high: f64) -> Distribution {
    FloatDistribution::uniform(low, high).into()
}

#[test]
fn test_ask_and_tell_basic() {
    let mut study = Study::new(Direction::Minimize);

    for _ in 0..10 {
        let id = study.ask();
        let ParamValue::Float(x) = study.suggest(id, "x", float(0.0, 10.0)).unwrap() else {
            panic!("expected a float");
        };
        study.tell(id, TrialOutcome::Complete(x * x)).unwrap();
    }

    assert_eq!(study.n_trials(), 10);
    assert!(study.best_value().unwrap() >= 0.0);
}

#[test]
fn test_ask_and_tell_with_failures() {
    let mut study = Study::new(Direction::Minimize);

    // Alternate success and failure
    for i in 0..10 {
        let id = study.ask();
        study.suggest(id, "x", float(-5.0, 5.0)).unwrap();
        let outcome = if i % 2 == 0 {
            TrialOutcome::Complete(f64::from(i))
        } else {
            TrialOutcome::Failed("simulated failure".into())
        };
        study.tell(id, outcome).unwrap();
    }

    assert_eq!(study.n_trials(), 10);
    assert_eq!(study.get_trials(&[TrialState::Complete]).len(), 5);
    assert_eq!(study.get_trials(&[TrialState::Failed]).len(), 5);
    assert_eq!(study.best_value().unwrap(), 0.0);
}

#[test]
fn test_tell_twice_is_rejected() {
    let mut study = Study::new(Direction::Maximize);
    let id = study.ask();
    study.tell(id, TrialOutcome::Pruned).unwrap();
    assert!(matches!(
        study.tell(id, TrialOutcome::Complete(1.0)),
        Err(Error::InvalidTransition {
            from: TrialState::Pruned,
            to: TrialState::Complete,
            ..
        })
    ));
}

#[test]
fn test_unknown_trial() {
    let mut study = Study::new(Direction::Minimize);
    assert!(matches!(study.trial(9), Err(Error::TrialNotFound(9))));
    assert!(matches!(
        study.report(9, 0, 1.0),
        Err(Error::TrialNotFound(9))
    ));
}

#[test]
fn test_failed_pending_trial_never_started() {
    let mut study = Study::new(Direction::Minimize);
    let id = study.ask();
    let record = study
        .tell(id, TrialOutcome::Failed("never ran".into()))
        .unwrap();
    assert_eq!(record.state, TrialState::Failed);
    assert!(record.started_at.is_none());
    assert!(record.completed_at.is_some());
}
