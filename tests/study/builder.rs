use optimizer_distributed::prelude::*;
use optimizer_distributed::storage::MemoryStorage;

#[test]
fn test_builder_defaults_to_minimize() {
    let study = Study::builder().build();
    assert_eq!(study.direction(), Direction::Minimize);
    assert_eq!(study.n_trials(), 0);
}

#[test]
fn test_builder_full_configuration() {
    let mut study = Study::builder()
        .maximize()
        .sampler(RandomSampler::with_seed(1))
        .pruner(ThresholdPruner::new().lower(0.0))
        .storage(MemoryStorage::new())
        .build();
    assert_eq!(study.direction(), Direction::Maximize);

    let id = study.ask();
    study.start(id).unwrap();
    study.report(id, 0, -1.0).unwrap();
    assert!(study.should_prune(id).unwrap());
}

#[test]
fn test_seed_is_reproducible() {
    let run = |seed| {
        let mut study = Study::builder().seed(seed).build();
        let x = FloatParam::new(0.0, 1.0).name("x");
        study
            .optimize(5, |trial| x.suggest(trial).map(|v| v * 2.0))
            .unwrap();
        study
            .trials()
            .iter()
            .map(|t| t.params["x"].clone())
            .collect::<Vec<_>>()
    };
    assert_eq!(run(5), run(5));
    assert_ne!(run(5), run(6));
}
