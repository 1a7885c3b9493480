use std::collections::HashMap;

use optimizer_distributed::distribution::Distribution;

use super::*;

#[test]
fn enqueued_parameters_reach_remote_trials() {
    let mut study = minimizing(41);
    study.enqueue(HashMap::from([
        ("x".to_owned(), ParamValue::Float(0.25)),
        ("n".to_owned(), ParamValue::Int(7)),
    ]));
    study
        .optimize(3, 1, |trial: &mut RemoteTrial| {
            let x = trial.suggest_float("x", 0.0, 1.0)?;
            let n = trial.suggest_int("n", 0, 10)?;
            Ok::<_, Error>(x + n as f64)
        })
        .unwrap();

    let first = study.study().trial(0).unwrap();
    assert_eq!(first.params["x"], ParamValue::Float(0.25));
    assert_eq!(first.params["n"], ParamValue::Int(7));
    assert_eq!(study.study().n_enqueued(), 0);
}

#[test]
fn remote_reads_see_coordinator_state() {
    let mut study = minimizing(42);
    study
        .optimize(4, 2, |trial: &mut RemoteTrial| {
            let lr = trial.suggest_float("lr", 1e-3, 1e-1)?;
            let layers = trial.suggest_categorical("layers", &[1, 2, 4])?;
            trial.set_user_attr("note", "remote".into())?;

            let params = trial.params()?;
            assert_eq!(params["lr"], ParamValue::Float(lr));
            assert!(matches!(params["layers"], ParamValue::Categorical(i) if i < 3));
            assert_eq!(
                trial.user_attrs()?.get("note"),
                Some(&AttrValue::String("remote".into()))
            );
            Ok::<_, Error>(lr * f64::from(layers))
        })
        .unwrap();

    for trial in study.trials() {
        assert_eq!(trial.user_attr("note"), Some(&AttrValue::String("remote".into())));
        assert_eq!(trial.params.len(), 2);
    }
}

#[test]
fn ask_and_tell_mix_with_optimize() {
    let mut study = minimizing(43);
    let manual = study.ask();
    study.tell(manual, TrialOutcome::Complete(-100.0)).unwrap();

    study
        .optimize(5, 2, |trial: &mut RemoteTrial| {
            let x = trial.suggest_float("x", 0.0, 1.0)?;
            Ok::<_, Error>(x)
        })
        .unwrap();

    assert_eq!(study.trials().len(), 6);
    assert_eq!(study.best_value().unwrap(), -100.0);
    assert_eq!(study.best_trial().unwrap().id, manual);

    let late = study.ask();
    study.tell(late, TrialOutcome::Complete(-200.0)).unwrap();
    assert_eq!(study.best_trial().unwrap().id, late);
}

#[test]
fn study_attributes_and_unwrapping() {
    let mut study = minimizing(44);
    study.set_user_attr("dataset", "mnist");
    assert_eq!(study.direction(), Direction::Minimize);
    assert_eq!(
        study.user_attrs().get("dataset"),
        Some(&AttrValue::String("mnist".into()))
    );

    study
        .optimize(2, 2, |_: &mut RemoteTrial| Ok::<_, Error>(3.0))
        .unwrap();
    let study = study.into_study();
    assert_eq!(study.n_trials(), 2);
    assert_eq!(study.best_value().unwrap(), 3.0);
    assert!(study.user_attrs().contains_key("dataset"));
}

#[test]
fn parameter_helpers_work_remotely() {
    let x = FloatParam::new(-5.0, 5.0).name("x");
    let depth = IntParam::new(1, 8).name("depth");
    let bias = BoolParam::new().name("bias");

    let mut study = minimizing(45);
    let (px, pd, pb) = (x.clone(), depth.clone(), bias.clone());
    study
        .optimize(6, 3, move |trial: &mut RemoteTrial| {
            let v = px.suggest(trial)?;
            let d = pd.suggest(trial)?;
            let b = pb.suggest(trial)?;
            Ok::<_, Error>(v.abs() + d as f64 + if b { 1.0 } else { 0.0 })
        })
        .unwrap();

    let best = study.best_trial().unwrap();
    assert!(best.get(&x).unwrap().abs() <= 5.0);
    assert!((1..=8).contains(&best.get(&depth).unwrap()));
    assert!(best.get(&bias).is_some());
}

#[test]
fn remote_trials_see_their_distributions_and_start_time() {
    let mut study = minimizing(45);
    study
        .optimize(3, 2, |trial: &mut RemoteTrial| {
            assert!(trial.distributions()?.is_empty());
            let x = trial.suggest_float("x", 0.0, 1.0)?;
            let n = trial.suggest_int("n", 0, 5)?;

            let distributions = trial.distributions()?;
            assert_eq!(distributions.len(), 2);
            assert!(matches!(distributions["n"], Distribution::Int(ref d) if d.high == 5));
            assert!(trial.started_at()?.is_some());
            Ok::<_, Error>(x + n as f64)
        })
        .unwrap();

    for trial in study.trials() {
        assert!(trial.started_at.is_some());
    }
}
