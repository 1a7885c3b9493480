use optimizer_distributed::{Direction, Study, TrialOutcome};

fn study_with(direction: Direction, outcomes: Vec<TrialOutcome>) -> Study {
    let mut study = Study::new(direction);
    for outcome in outcomes {
        let id = study.ask();
        study.tell(id, outcome).unwrap();
    }
    study
}

#[test]
fn test_top_trials_minimize() {
    let study = study_with(
        Direction::Minimize,
        vec![
            TrialOutcome::Complete(3.0),
            TrialOutcome::Failed("x".into()),
            TrialOutcome::Complete(1.0),
            TrialOutcome::Pruned,
            TrialOutcome::Complete(2.0),
        ],
    );
    let values: Vec<_> = study.top_trials(10).iter().map(|t| t.value).collect();
    assert_eq!(values, vec![Some(1.0), Some(2.0), Some(3.0)]);
}

#[test]
fn test_top_trials_maximize_truncates() {
    let study = study_with(
        Direction::Maximize,
        vec![
            TrialOutcome::Complete(3.0),
            TrialOutcome::Complete(7.0),
            TrialOutcome::Complete(5.0),
        ],
    );
    let top = study.top_trials(2);
    assert_eq!(top.len(), 2);
    assert_eq!(top[0].id, 1);
    assert_eq!(top[1].id, 2);
}

#[test]
fn test_best_trial_ignores_nan() {
    let study = study_with(
        Direction::Minimize,
        vec![TrialOutcome::Complete(f64::NAN), TrialOutcome::Complete(4.0)],
    );
    assert_eq!(study.best_trial().unwrap().id, 1);
    assert_eq!(study.best_params().unwrap().len(), 0);
}
