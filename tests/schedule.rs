//! Learning-rate schedule tests over a full 300-epoch run

use approx::assert_relative_eq;
use densenet_cifar::training::{InverseTimeDecay, LearningRateSchedule};
use densenet_cifar::TrainingConfig;

#[test]
fn test_reference_run_schedule() {
    let schedule = TrainingConfig::default().build_schedule();
    assert_eq!(schedule.step_epochs(), vec![150, 225]);

    let rates = schedule.rates(300);
    assert_eq!(rates.len(), 300);
    assert_relative_eq!(rates[0], 0.1);
    assert_relative_eq!(rates[1], 0.1 / (1.0 + 1e-4), max_relative = 1e-12);

    // Step-downs on top of the inverse-time decay
    assert_relative_eq!(rates[150] / rates[149], 1.0 / ((1.0 + 1.5e-2) * 10.0), max_relative = 1e-9);
    assert_relative_eq!(rates[225] / rates[224], 1.0 / ((1.0 + 2.25e-2) * 100.0), max_relative = 1e-9);
}

#[test]
fn test_rates_never_increase() {
    let rates = InverseTimeDecay::new(0.1, 1e-4, 300).rates(300);
    assert!(rates.windows(2).all(|w| w[1] <= w[0]));
    assert!(rates.iter().all(|&r| r > 0.0));
}

#[test]
fn test_rate_is_pure_function_of_epoch() {
    let schedule = InverseTimeDecay::new(0.1, 1e-4, 40);
    let forward: Vec<f64> = (0..40).map(|e| schedule.learning_rate(e)).collect();
    let backward: Vec<f64> = (0..40).rev().map(|e| schedule.learning_rate(e)).collect();
    assert_eq!(forward, backward.into_iter().rev().collect::<Vec<_>>());
}
