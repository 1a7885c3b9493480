use core::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Barrier;
use std::thread;
use std::time::Duration;

use super::*;

#[test]
fn every_trial_ends_in_a_terminal_state() {
    init_tracing();
    let mut study = minimizing(1);
    study
        .optimize(25, 4, |trial: &mut RemoteTrial| {
            let x = trial.suggest_float("x", -1.0, 1.0)?;
            let n = trial.suggest_int("n", 0, 5)?;
            Ok::<_, Error>(x * x + n as f64)
        })
        .expect("optimization should succeed");

    assert_eq!(study.study().n_trials(), 25);
    assert_eq!(study.trials().len(), 25);
    assert!(study.trials().iter().all(|t| t.state.is_finished()));

    let run = study.last_run().expect("a run was recorded");
    assert_eq!(run.dispatched, 25);
    assert_eq!(run.completed, 25);
    assert_eq!(run.running, 0);
}

#[test]
fn running_trials_overlap_up_to_n_jobs() {
    let current = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    // Three trials at a time must meet here, so the run only ends if they overlap.
    let rendezvous = Arc::new(Barrier::new(3));
    let (c, p, r) = (Arc::clone(&current), Arc::clone(&peak), Arc::clone(&rendezvous));

    let executor = Arc::new(ThreadExecutor::with_name("overlap"));
    let mut study = DistributedStudy::from_study(Study::new(Direction::Minimize), Some(executor));
    study
        .optimize(30, 3, move |trial: &mut RemoteTrial| {
            let now = c.fetch_add(1, Ordering::SeqCst) + 1;
            p.fetch_max(now, Ordering::SeqCst);
            let x = trial.suggest_float("x", 0.0, 1.0);
            r.wait();
            thread::sleep(Duration::from_millis(2));
            c.fetch_sub(1, Ordering::SeqCst);
            Ok::<_, Error>(x?)
        })
        .unwrap();

    assert_eq!(study.last_run().unwrap().max_concurrency, 3);
    assert_eq!(peak.load(Ordering::SeqCst), 3);
    assert_eq!(current.load(Ordering::SeqCst), 0);
}

#[test]
fn n_jobs_beyond_local_cpus_is_honoured_on_other_executors() {
    let cpus = thread::available_parallelism().map_or(1, usize::from);
    let n_jobs = cpus + 3;
    let rendezvous = Arc::new(Barrier::new(n_jobs));
    let r = Arc::clone(&rendezvous);

    let executor = Arc::new(ThreadExecutor::with_name("cluster"));
    let mut study = DistributedStudy::from_study(Study::new(Direction::Minimize), Some(executor));
    study
        .optimize(n_jobs, n_jobs, move |trial: &mut RemoteTrial| {
            r.wait();
            Ok::<_, Error>(trial.id() as f64)
        })
        .unwrap();

    assert_eq!(study.last_run().unwrap().max_concurrency, n_jobs);
    assert_eq!(study.trials().len(), n_jobs);
}

#[test]
fn default_executor_caps_n_jobs_to_local_cpus() {
    let cpus = thread::available_parallelism().map_or(1, usize::from);
    let mut study = minimizing(5);
    study
        .optimize(2, cpus + 5, |_: &mut RemoteTrial| Ok::<_, Error>(0.0))
        .unwrap();
    assert_eq!(study.last_run().unwrap().max_concurrency, cpus);
}

#[test]
fn quadratic_with_four_jobs() {
    let mut study = minimizing(42);
    study
        .optimize(20, 4, |trial: &mut RemoteTrial| {
            let x = trial.suggest_float("x", -10.0, 10.0)?;
            Ok::<_, Error>(x * x)
        })
        .unwrap();

    assert_eq!(study.trials().len(), 20);
    let best = study.best_value().unwrap();
    assert!(best >= 0.0);
    for trial in study.get_trials(&[TrialState::Complete]) {
        assert!(best <= trial.value.unwrap());
    }
    let ParamValue::Float(x) = study.best_params().unwrap()["x"] else {
        panic!("x should be a float");
    };
    assert!((x * x - best).abs() < 1e-12);
}

#[test]
fn best_value_only_considers_complete_trials() {
    let mut study = minimizing(7);
    study
        .optimize(12, 4, |trial: &mut RemoteTrial| {
            let x = trial.suggest_float("x", 0.0, 1.0)?;
            match trial.id() % 3 {
                0 => Err(Error::Objective("unlucky".into())),
                1 => Err(Error::TrialPruned),
                _ => Ok(x + 10.0),
            }
        })
        .unwrap();

    assert_eq!(study.get_trials(&[TrialState::Failed]).len(), 4);
    assert_eq!(study.get_trials(&[TrialState::Pruned]).len(), 4);
    let complete = study.get_trials(&[TrialState::Complete]);
    assert_eq!(complete.len(), 4);

    let expected = complete
        .iter()
        .filter_map(|t| t.value)
        .fold(f64::INFINITY, f64::min);
    assert_eq!(study.best_value().unwrap(), expected);
    assert!(study.best_value().unwrap() >= 10.0);
}

#[test]
fn single_job_runs_trials_in_order() {
    let mut study = minimizing(3);
    study
        .optimize(5, 1, |trial: &mut RemoteTrial| Ok::<_, Error>(trial.id() as f64))
        .unwrap();

    let trials = study.trials();
    assert!(trials.windows(2).all(|w| {
        let (a, b) = (&w[0], &w[1]);
        a.completed_at.unwrap() <= b.started_at.unwrap()
    }));
    assert_eq!(study.best_trial().unwrap().id, 0);
}

#[test]
fn zero_jobs_means_available_parallelism() {
    let available = thread::available_parallelism().map_or(1, usize::from);
    let mut study = minimizing(4);
    study
        .optimize(4, 0, |_: &mut RemoteTrial| Ok::<_, Error>(1.0))
        .unwrap();
    assert_eq!(study.last_run().unwrap().max_concurrency, available);
}

#[test]
fn custom_executor_receives_every_trial() {
    let executor = Arc::new(ThreadExecutor::with_name("custom"));
    let study = Study::new(Direction::Maximize);
    let mut study = DistributedStudy::from_study(study, Some(executor.clone()));
    study
        .optimize(8, 2, |trial: &mut RemoteTrial| {
            let name = thread::current().name().unwrap_or_default().to_owned();
            trial.set_user_attr("thread", name.into())?;
            Ok::<_, Error>(1.0)
        })
        .unwrap();

    assert_eq!(executor.spawned(), 8);
    for trial in study.trials() {
        let Some(AttrValue::String(name)) = trial.user_attr("thread") else {
            panic!("thread attribute missing");
        };
        assert!(name.starts_with("custom-"));
    }
}
