use api::ml::{Model, ModelRecord, TrainConfig, predict, train::train_with_rng};
use rand::{Rng, SeedableRng, rngs::StdRng};

fn separable_set(n: usize, rng: &mut StdRng) -> (Vec<Vec<f32>>, Vec<f32>) {
    let mut x = Vec::with_capacity(n);
    let mut y = Vec::with_capacity(n);
    for _ in 0..n {
        let a: f32 = rng.gen_range(-1.0..1.0);
        let b: f32 = rng.gen_range(-1.0..1.0);
        y.push(if a + 2.0 * b > 0.0 { 1.0 } else { 0.0 });
        x.push(vec![a, b]);
    }
    (x, y)
}

#[test]
fn separable_set_reaches_high_training_accuracy() {
    let mut rng = StdRng::seed_from_u64(2024);
    let (x, y) = separable_set(200, &mut rng);

    let cfg = TrainConfig::new(100, 16);
    let outcome = train_with_rng(&x, &y, &cfg, &mut rng).expect("train");

    let correct = x
        .iter()
        .zip(&y)
        .filter(|(row, label)| {
            let p = predict(row, Some(&outcome.model)).expect("predict").probability;
            (p > 0.5) == (**label > 0.5)
        })
        .count();
    let accuracy = correct as f64 / x.len() as f64;
    assert!(accuracy > 0.9, "accuracy = {accuracy}");
}

#[test]
fn trained_model_survives_json_round_trip() {
    let mut rng = StdRng::seed_from_u64(17);
    let (x, y) = separable_set(40, &mut rng);
    let outcome = train_with_rng(&x, &y, &TrainConfig::new(5, 8), &mut rng).expect("train");

    let json = serde_json::to_string(&outcome.model.to_record()).expect("serialize");
    let record: ModelRecord = serde_json::from_str(&json).expect("deserialize");
    let restored = Model::from_record(record).expect("from record");

    assert_eq!(restored.input_size(), 2);
    for row in &x {
        let a = outcome.model.forward_one(row);
        let b = restored.forward_one(row);
        assert!((a - b).abs() <= f32::EPSILON, "{a} vs {b}");
    }
}

#[test]
fn predictions_are_probabilities_for_any_input() {
    let mut rng = StdRng::seed_from_u64(99);
    let model = Model::with_rng(6, &mut rng);
    for _ in 0..200 {
        let x: Vec<f32> = (0..6).map(|_| rng.gen_range(-50.0..50.0)).collect();
        let p = predict(&x, Some(&model)).expect("predict");
        assert!((0.0..=1.0).contains(&p.probability));
        assert!((p.confidence - (p.probability - 0.5).abs() * 2.0).abs() < 1e-6);
    }
}
