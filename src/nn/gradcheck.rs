//! Finite-difference helpers shared by the layer tests

use ndarray::Array4;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::error::Result;

/// Uniform(-1, 1) tensor from a fixed seed
pub fn random_tensor(shape: (usize, usize, usize, usize), seed: u64) -> Array4<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array4::random_using(shape, Uniform::new(-1.0f32, 1.0), &mut rng)
}

/// Compare the analytic input gradient of `layer` against central differences
/// of `sum(forward(x) * upstream)` at a spread of input positions.
pub fn assert_input_gradient<L, F, B>(
    layer: &mut L,
    x: &Array4<f32>,
    seed: u64,
    mut forward: F,
    mut backward: B,
) where
    F: FnMut(&mut L, &Array4<f32>) -> Result<Array4<f32>>,
    B: FnMut(&mut L, &Array4<f32>) -> Result<Array4<f32>>,
{
    let output = forward(layer, x).unwrap();
    let upstream = random_tensor(output.dim(), seed);
    let analytic = backward(layer, &upstream).unwrap();
    assert_eq!(analytic.dim(), x.dim());

    let eps = 1e-2f32;
    let len = x.len();
    let step = (len / 7).max(1);
    for flat in (0..len).step_by(step) {
        let mut plus = x.clone();
        plus.as_slice_mut().unwrap()[flat] += eps;
        let mut minus = x.clone();
        minus.as_slice_mut().unwrap()[flat] -= eps;

        let f_plus = (&forward(layer, &plus).unwrap() * &upstream).sum();
        let f_minus = (&forward(layer, &minus).unwrap() * &upstream).sum();
        let numeric = (f_plus - f_minus) / (2.0 * eps);
        let exact = analytic.as_slice().unwrap()[flat];

        assert!(
            (numeric - exact).abs() < 2e-2 * (1.0 + numeric.abs()),
            "input {}: numeric {} vs analytic {}",
            flat,
            numeric,
            exact
        );
    }
}
