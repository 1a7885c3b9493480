use std::thread;
use std::time::{Duration, Instant};

use optimizer_distributed::OptimizeConfig;

use super::*;

#[test]
fn timeout_stops_dispatch_and_drains_running_trials() {
    init_tracing();
    let mut study = minimizing(31);
    let config = OptimizeConfig::new()
        .n_jobs(2)
        .timeout(Duration::from_millis(60));
    let started = Instant::now();
    study
        .optimize_with(10_000, &config, |trial: &mut RemoteTrial| {
            let x = trial.suggest_float("x", 0.0, 1.0)?;
            thread::sleep(Duration::from_millis(10));
            Ok::<_, Error>(x)
        })
        .expect("a timeout is not an error");

    assert!(started.elapsed() < Duration::from_secs(10));
    let run = study.last_run().unwrap();
    assert!(run.dispatched < 10_000);
    assert_eq!(run.dispatched, run.completed);
    assert_eq!(study.trials().len(), study.study().n_trials());
    assert_eq!(study.get_trials(&[TrialState::Complete]).len(), run.completed);
}

#[test]
fn silent_trials_are_waited_on_through_heartbeats() {
    init_tracing();
    let mut study = minimizing(32);
    let config = OptimizeConfig::new()
        .n_jobs(2)
        .heartbeat_interval(Duration::from_millis(2));
    study
        .optimize_with(4, &config, |_: &mut RemoteTrial| {
            thread::sleep(Duration::from_millis(20));
            Ok::<_, Error>(1.0)
        })
        .unwrap();
    assert_eq!(study.get_trials(&[TrialState::Complete]).len(), 4);
}
