//! DenseNet Network Implementation
//!
//! The complete DenseNet image classifier: initial convolution, dense blocks
//! joined by transitions, and a BN → ReLU → global pool → softmax head.

use std::fmt;

use ndarray::{Array2, Array4};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::block::DenseBlock;
use super::config::DenseNetConfig;
use super::transition::TransitionLayer;
use crate::error::{DenseNetError, Result};
use crate::nn::loss::softmax;
use crate::nn::{AvgPool2d, BatchNorm2d, Conv2d, GlobalAvgPool, Linear, ParamSlot, Relu, Trainable};

/// Kernel size of the stem convolution
const INITIAL_KERNEL_SIZE: usize = 3;

/// Complete DenseNet model
#[derive(Debug, Clone)]
pub struct DenseNet {
    /// Model configuration
    pub config: DenseNetConfig,

    initial_conv: Conv2d,

    /// Dense blocks
    dense_blocks: Vec<DenseBlock>,

    /// Transition layers, one between each pair of blocks
    transitions: Vec<TransitionLayer>,

    final_bn: BatchNorm2d,
    final_relu: Relu,
    global_pool: GlobalAvgPool,
    classifier: Linear,
}

impl DenseNet {
    /// Create a new DenseNet with entropy-seeded weights
    pub fn new(config: DenseNetConfig) -> Result<Self> {
        Self::with_rng(config, &mut StdRng::from_entropy())
    }

    /// Create a new DenseNet with weights drawn from `rng`
    pub fn with_rng<R: Rng + ?Sized>(config: DenseNetConfig, rng: &mut R) -> Result<Self> {
        config.validate()?;
        let units = config.units_per_block()?;

        let initial_conv = Conv2d::new(config.input_shape[0], config.nb_filter, INITIAL_KERNEL_SIZE, rng);

        let mut dense_blocks = Vec::with_capacity(config.nb_dense_block);
        let mut transitions = Vec::with_capacity(config.nb_dense_block - 1);
        let mut num_features = config.nb_filter;

        for i in 0..config.nb_dense_block {
            let block = DenseBlock::new(units, num_features, config.growth_rate, config.dropout_rate, rng);
            num_features = block.out_channels;
            dense_blocks.push(block);

            // Transition layer (except after last block)
            if i + 1 < config.nb_dense_block {
                let trans = TransitionLayer::new(num_features, config.compression, config.dropout_rate, rng);
                num_features = trans.out_channels;
                transitions.push(trans);
            }
        }

        let classifier = Linear::new(num_features, config.num_classes, rng);

        Ok(Self {
            initial_conv,
            dense_blocks,
            transitions,
            final_bn: BatchNorm2d::new(num_features),
            final_relu: Relu::new(),
            global_pool: GlobalAvgPool::new(),
            classifier,
            config,
        })
    }

    /// Forward pass through the network
    ///
    /// Input: [batch, channels, rows, cols]
    /// Output: class probabilities [batch, num_classes]
    pub fn forward(&mut self, x: &Array4<f32>, training: bool) -> Result<Array2<f32>> {
        let (_, channels, rows, cols) = x.dim();
        if [channels, rows, cols] != self.config.input_shape {
            return Err(DenseNetError::shape_mismatch(
                self.config.input_shape,
                [channels, rows, cols],
            ));
        }

        let mut features = self.initial_conv.forward(x, training)?;

        for (i, block) in self.dense_blocks.iter_mut().enumerate() {
            features = block.forward(&features, training)?;
            if let Some(trans) = self.transitions.get_mut(i) {
                features = trans.forward(&features, training)?;
            }
        }

        let normalized = self.final_bn.forward(&features, training)?;
        let activated = self.final_relu.forward(&normalized, training);
        let pooled = self.global_pool.forward(&activated, training);
        let logits = self.classifier.forward(&pooled, training)?;

        Ok(softmax(&logits))
    }

    /// Backward pass from the gradient w.r.t. the pre-softmax logits
    ///
    /// Accumulates into every parameter's gradient, then adds the L2 term
    /// `2 · weight_decay · w` so the gradients match the regularized loss.
    pub fn backward(&mut self, grad_logits: &Array2<f32>) -> Result<()> {
        let grad = self.classifier.backward(grad_logits)?;
        let grad = self.global_pool.backward(&grad)?;
        let grad = self.final_relu.backward(&grad)?;
        let mut grad = self.final_bn.backward(&grad)?;

        for i in (0..self.dense_blocks.len()).rev() {
            if let Some(trans) = self.transitions.get_mut(i) {
                grad = trans.backward(&grad)?;
            }
            grad = self.dense_blocks[i].backward(&grad)?;
        }

        self.initial_conv.backward(&grad)?;

        let decay = 2.0 * self.config.weight_decay as f32;
        if decay > 0.0 {
            for slot in self.parameters() {
                let ParamSlot { value, mut grad } = slot;
                grad.scaled_add(decay, &value);
            }
        }

        Ok(())
    }

    /// L2 penalty `weight_decay · Σ w²` over all parameters
    pub fn regularization_loss(&self) -> f32 {
        self.config.weight_decay as f32 * self.squared_norm()
    }

    /// Per-layer output shapes and parameter counts
    pub fn layer_summaries(&self) -> Vec<LayerSummary> {
        let [in_channels, mut rows, mut cols] = self.config.input_shape;
        let mut layers = vec![LayerSummary::new("input", vec![in_channels, rows, cols], 0)];

        layers.push(LayerSummary::new(
            "initial_conv",
            vec![self.config.nb_filter, rows, cols],
            self.initial_conv.num_parameters(),
        ));

        for (i, block) in self.dense_blocks.iter().enumerate() {
            layers.push(LayerSummary::new(
                format!("dense_block_{}", i + 1),
                vec![block.out_channels, rows, cols],
                block.num_parameters(),
            ));
            if let Some(trans) = self.transitions.get(i) {
                rows = AvgPool2d::output_size(rows);
                cols = AvgPool2d::output_size(cols);
                layers.push(LayerSummary::new(
                    format!("transition_{}", i + 1),
                    vec![trans.out_channels, rows, cols],
                    trans.num_parameters(),
                ));
            }
        }

        let channels = self.final_bn.channels;
        layers.push(LayerSummary::new(
            "final_bn_relu",
            vec![channels, rows, cols],
            self.final_bn.num_parameters(),
        ));
        layers.push(LayerSummary::new("global_avg_pool", vec![channels], 0));
        layers.push(LayerSummary::new(
            "dense_softmax",
            vec![self.config.num_classes],
            self.classifier.num_parameters(),
        ));

        layers
    }

    /// Get model summary
    pub fn summary(&self) -> String {
        let mut s = String::new();
        s.push_str(&format!(
            "DenseNet-{} (k={}, blocks={})\n",
            self.config.depth, self.config.growth_rate, self.config.nb_dense_block
        ));
        s.push_str(&"=".repeat(64));
        s.push('\n');
        s.push_str(&format!("{:<24}{:<24}{:>16}\n", "Layer", "Output shape", "Params"));
        s.push_str(&"-".repeat(64));
        s.push('\n');

        for layer in self.layer_summaries() {
            s.push_str(&format!("{}\n", layer));
        }

        s.push_str(&"=".repeat(64));
        s.push('\n');
        s.push_str(&format!("Total parameters: {}\n", self.num_parameters()));
        s.push_str(&format!("Dropout: {:.2}\n", self.config.dropout_rate));
        s.push_str(&format!("Compression: {:.2}\n", self.config.compression));
        s.push_str(&format!("Weight decay: {:e}\n", self.config.weight_decay));

        s
    }
}

impl Trainable for DenseNet {
    fn parameters(&mut self) -> Vec<ParamSlot<'_>> {
        let mut params = self.initial_conv.parameters();
        let mut transitions = self.transitions.iter_mut();
        for block in self.dense_blocks.iter_mut() {
            params.extend(block.parameters());
            if let Some(trans) = transitions.next() {
                params.extend(trans.parameters());
            }
        }
        params.extend(self.final_bn.parameters());
        params.extend(self.classifier.parameters());
        params
    }

    fn num_parameters(&self) -> usize {
        self.initial_conv.num_parameters()
            + self.dense_blocks.iter().map(|b| b.num_parameters()).sum::<usize>()
            + self.transitions.iter().map(|t| t.num_parameters()).sum::<usize>()
            + self.final_bn.num_parameters()
            + self.classifier.num_parameters()
    }

    fn squared_norm(&self) -> f32 {
        self.initial_conv.squared_norm()
            + self.dense_blocks.iter().map(|b| b.squared_norm()).sum::<f32>()
            + self.transitions.iter().map(|t| t.squared_norm()).sum::<f32>()
            + self.final_bn.squared_norm()
            + self.classifier.squared_norm()
    }
}

/// One row of the model summary
#[derive(Debug, Clone, PartialEq)]
pub struct LayerSummary {
    pub name: String,

    /// Output shape without the batch axis
    pub output_shape: Vec<usize>,

    pub parameters: usize,
}

impl LayerSummary {
    fn new(name: impl Into<String>, output_shape: Vec<usize>, parameters: usize) -> Self {
        Self {
            name: name.into(),
            output_shape,
            parameters,
        }
    }
}

impl fmt::Display for LayerSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<24}{:<24}{:>16}",
            self.name,
            format!("{:?}", self.output_shape),
            self.parameters
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::gradcheck::random_tensor;
    use crate::nn::loss::{categorical_cross_entropy, softmax_cross_entropy_grad};

    fn tiny_model(seed: u64) -> DenseNet {
        let mut rng = StdRng::seed_from_u64(seed);
        DenseNet::with_rng(DenseNetConfig::tiny(), &mut rng).unwrap()
    }

    #[test]
    fn test_densenet_creation() {
        let model = tiny_model(0);
        assert_eq!(model.dense_blocks.len(), 3);
        assert_eq!(model.transitions.len(), 2);
        assert_eq!(
            model.num_parameters(),
            model.config.estimate_parameters().unwrap()
        );
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = DenseNetConfig {
            depth: 12,
            nb_dense_block: 3,
            ..DenseNetConfig::tiny()
        };
        assert!(matches!(
            DenseNet::new(config),
            Err(DenseNetError::InvalidArchitecture(_))
        ));
    }

    #[test]
    fn test_densenet_forward() {
        let mut model = tiny_model(1);
        let probs = model.forward(&random_tensor((4, 3, 8, 8), 2), false).unwrap();

        assert_eq!(probs.dim(), (4, 10));
        for row in probs.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_forward_rejects_wrong_input_shape() {
        let mut model = tiny_model(1);
        let result = model.forward(&random_tensor((1, 3, 16, 16), 2), false);
        assert!(matches!(result, Err(DenseNetError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_inference_forward_keeps_no_caches() {
        let mut model = tiny_model(2);
        let x = random_tensor((2, 3, 8, 8), 3);
        model.forward(&x, true).unwrap();
        model.forward(&x, false).unwrap();

        assert!(model.classifier.backward(&Array2::zeros((2, 10))).is_err());
        let conv = &mut model.dense_blocks[0].layers[0].conv;
        let grad = Array4::zeros((2, conv.out_channels, 8, 8));
        assert!(matches!(
            conv.backward(&grad),
            Err(DenseNetError::MissingForwardCache("Conv2d"))
        ));
        assert!(model.backward(&Array2::zeros((2, 10))).is_err());
    }

    #[test]
    fn test_parameters_cover_every_layer() {
        let mut model = tiny_model(4);
        let expected = model.num_parameters();
        let slots = model.parameters();
        assert_eq!(slots.iter().map(|s| s.value.len()).sum::<usize>(), expected);
        assert!(slots.iter().all(|s| s.value.shape() == s.grad.shape()));
    }

    #[test]
    fn test_backward_includes_weight_decay() {
        let mut model = tiny_model(3);
        let x = random_tensor((2, 3, 8, 8), 4);
        model.forward(&x, true).unwrap();
        model.zero_grad();
        model.backward(&Array2::zeros((2, 10))).unwrap();

        // With a zero data gradient only the L2 term remains
        let decay = 2.0 * model.config.weight_decay as f32;
        for slot in model.parameters() {
            for (g, w) in slot.grad.iter().zip(slot.value.iter()) {
                assert!((g - decay * w).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_sgd_steps_reduce_loss() {
        let mut model = tiny_model(5);
        let x = random_tensor((4, 3, 8, 8), 6);
        let mut targets = Array2::zeros((4, 10));
        for (i, label) in [1, 3, 5, 7].into_iter().enumerate() {
            targets[[i, label]] = 1.0;
        }

        let loss_at = |model: &mut DenseNet| {
            let probs = model.forward(&x, true).unwrap();
            categorical_cross_entropy(&probs, &targets)
        };
        let initial = loss_at(&mut model);

        for _ in 0..10 {
            model.zero_grad();
            let probs = model.forward(&x, true).unwrap();
            model.backward(&softmax_cross_entropy_grad(&probs, &targets)).unwrap();
            for mut slot in model.parameters() {
                let grad = slot.grad.to_owned();
                slot.value.scaled_add(-0.05, &grad);
            }
        }

        assert!(loss_at(&mut model) < initial);
    }

    #[test]
    fn test_model_summary() {
        let model = tiny_model(7);
        let layers = model.layer_summaries();
        assert_eq!(layers.first().unwrap().name, "input");
        assert_eq!(layers.last().unwrap().output_shape, vec![10]);
        assert_eq!(
            layers.iter().map(|l| l.parameters).sum::<usize>(),
            model.num_parameters()
        );

        let summary = model.summary();
        assert!(summary.contains("DenseNet-7"));
        assert!(summary.contains("transition_2"));
        assert!(summary.contains("Total parameters"));
    }
}
