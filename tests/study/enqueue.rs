use std::collections::HashMap;

use optimizer_distributed::prelude::*;

#[test]
fn test_enqueue_params_evaluated_first() {
    let mut study = Study::new(Direction::Minimize);
    let x = FloatParam::new(0.0, 10.0).name("x");
    let y = IntParam::new(1, 100).name("y");

    // Enqueue a specific configuration
    study.enqueue(HashMap::from([
        ("x".to_owned(), ParamValue::Float(5.0)),
        ("y".to_owned(), ParamValue::Int(42)),
    ]));

    study
        .optimize(1, |trial| {
            let x_val = x.suggest(trial)?;
            let y_val = y.suggest(trial)?;
            assert_eq!(x_val, 5.0);
            assert_eq!(y_val, 42);
            Ok::<_, Error>(x_val)
        })
        .unwrap();
}

#[test]
fn test_enqueue_fifo_order() {
    let mut study = Study::new(Direction::Minimize);
    let x = FloatParam::new(0.0, 10.0).name("x");

    study.enqueue(HashMap::from([("x".to_owned(), ParamValue::Float(1.0))]));
    study.enqueue(HashMap::from([("x".to_owned(), ParamValue::Float(2.0))]));
    assert_eq!(study.n_enqueued(), 2);

    study
        .optimize(3, |trial| x.suggest(trial))
        .unwrap();

    let values: Vec<f64> = study
        .trials()
        .iter()
        .map(|t| t.get(&x).unwrap())
        .collect();
    assert_eq!(values[..2], [1.0, 2.0]);
    assert_eq!(study.n_enqueued(), 0);
}

#[test]
fn test_enqueue_partial_config_samples_the_rest() {
    let mut study = Study::new(Direction::Minimize);
    study.enqueue(HashMap::from([("a".to_owned(), ParamValue::Int(3))]));

    let id = study.ask();
    let a = study
        .suggest(id, "a", IntDistribution::uniform(0, 5).into())
        .unwrap();
    let b = study
        .suggest(id, "b", IntDistribution::uniform(10, 20).into())
        .unwrap();
    assert_eq!(a, ParamValue::Int(3));
    assert!(matches!(b, ParamValue::Int(v) if (10..=20).contains(&v)));
}
