//! Feed-forward fraud network trained by mini-batch gradient descent
//!
//! Architecture: `Linear(d→64) → ReLU → Dropout → Linear(64→32) → ReLU →
//! Dropout → Linear(32→1) → Sigmoid`. The hidden widths and dropout rate are
//! configurable; the final layer always squashes to a single probability.
//!
//! Training minimises binary cross-entropy with Adam. Loss and gradient are
//! computed from the pre-sigmoid logit, which keeps both finite for saturated
//! outputs.

use super::{check_width, FitEpoch, FitReport, FraudModel, LabeledMatrix, ModelKind};
use crate::errors::{FraudError, Result};
use crate::metrics::{roc_auc, LossAccumulator};
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Network shape and optimisation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub hidden_layers: Vec<usize>,
    pub dropout: f64,
    pub learning_rate: f64,
    pub epochs: usize,
    pub batch_size: usize,
    pub seed: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            hidden_layers: vec![64, 32],
            dropout: 0.3,
            learning_rate: 1e-3,
            epochs: 10,
            batch_size: 512,
            seed: 42,
        }
    }
}

impl NetworkConfig {
    pub fn validate(&self) -> Result<()> {
        if self.hidden_layers.iter().any(|&w| w == 0) {
            return Err(FraudError::InvalidConfig(
                "hidden layer widths must be positive".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(FraudError::InvalidConfig(format!(
                "dropout must lie in [0, 1), got {}",
                self.dropout
            )));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(FraudError::InvalidConfig(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.epochs == 0 || self.batch_size == 0 {
            return Err(FraudError::InvalidConfig(
                "epochs and batch_size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Fully connected layer, `weights` shaped `(inputs, outputs)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Dense {
    weights: Array2<f64>,
    bias: Array1<f64>,
}

impl Dense {
    /// He-uniform weights, zero bias
    fn new(inputs: usize, outputs: usize, rng: &mut StdRng) -> Self {
        let bound = (6.0 / inputs as f64).sqrt();
        Self {
            weights: Array2::from_shape_fn((inputs, outputs), |_| rng.gen_range(-bound..bound)),
            bias: Array1::zeros(outputs),
        }
    }

    fn forward(&self, input: &Array2<f64>) -> Array2<f64> {
        input.dot(&self.weights) + &self.bias
    }
}

/// Adam moments for one layer
#[derive(Debug, Clone)]
struct Moments {
    m_w: Array2<f64>,
    v_w: Array2<f64>,
    m_b: Array1<f64>,
    v_b: Array1<f64>,
}

#[derive(Debug, Clone)]
struct Adam {
    step: i32,
    moments: Vec<Moments>,
}

impl Adam {
    const BETA1: f64 = 0.9;
    const BETA2: f64 = 0.999;
    const EPSILON: f64 = 1e-8;

    fn for_layers(layers: &[Dense]) -> Self {
        Self {
            step: 0,
            moments: layers
                .iter()
                .map(|l| Moments {
                    m_w: Array2::zeros(l.weights.raw_dim()),
                    v_w: Array2::zeros(l.weights.raw_dim()),
                    m_b: Array1::zeros(l.bias.raw_dim()),
                    v_b: Array1::zeros(l.bias.raw_dim()),
                })
                .collect(),
        }
    }

    fn apply(&mut self, layers: &mut [Dense], grads: &[(Array2<f64>, Array1<f64>)], lr: f64) {
        self.step += 1;
        let c1 = 1.0 - Self::BETA1.powi(self.step);
        let c2 = 1.0 - Self::BETA2.powi(self.step);

        for ((layer, m), (g_w, g_b)) in layers.iter_mut().zip(&mut self.moments).zip(grads) {
            m.m_w.zip_mut_with(g_w, |m, &g| *m = Self::BETA1 * *m + (1.0 - Self::BETA1) * g);
            m.v_w.zip_mut_with(g_w, |v, &g| *v = Self::BETA2 * *v + (1.0 - Self::BETA2) * g * g);
            m.m_b.zip_mut_with(g_b, |m, &g| *m = Self::BETA1 * *m + (1.0 - Self::BETA1) * g);
            m.v_b.zip_mut_with(g_b, |v, &g| *v = Self::BETA2 * *v + (1.0 - Self::BETA2) * g * g);

            ndarray::Zip::from(&mut layer.weights)
                .and(&m.m_w)
                .and(&m.v_w)
                .for_each(|w, &mw, &vw| *w -= lr * (mw / c1) / ((vw / c2).sqrt() + Self::EPSILON));
            ndarray::Zip::from(&mut layer.bias)
                .and(&m.m_b)
                .and(&m.v_b)
                .for_each(|b, &mb, &vb| *b -= lr * (mb / c1) / ((vb / c2).sqrt() + Self::EPSILON));
        }
    }
}

/// Activations kept from a training forward pass for backpropagation
struct ForwardCache {
    /// Input of every layer (after dropout of the previous layer)
    inputs: Vec<Array2<f64>>,
    /// ReLU outputs before dropout, per hidden layer
    activations: Vec<Array2<f64>>,
    /// Inverted-dropout scale masks, per hidden layer
    masks: Vec<Option<Array2<f64>>>,
    logits: Array1<f64>,
}

/// Losses, probabilities and labels collected over one pass of a split
#[derive(Debug, Clone, Default)]
pub struct EpochPass {
    pub losses: LossAccumulator,
    pub probabilities: Vec<f64>,
    pub labels: Vec<f64>,
}

impl EpochPass {
    pub fn auc(&self) -> Option<f64> {
        roc_auc(&self.labels, &self.probabilities)
    }
}

/// Variant A: feed-forward network with a sigmoid output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FraudNet {
    input_dim: usize,
    config: NetworkConfig,
    layers: Vec<Dense>,
    #[serde(skip)]
    optimizer: Option<Adam>,
}

impl FraudNet {
    /// Build a freshly initialised network for `input_dim` features.
    pub fn new(input_dim: usize, config: NetworkConfig) -> Result<Self> {
        config.validate()?;
        if input_dim == 0 {
            return Err(FraudError::InvalidConfig(
                "network needs at least one input feature".to_string(),
            ));
        }

        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut widths = vec![input_dim];
        widths.extend(&config.hidden_layers);
        widths.push(1);

        let layers = widths
            .windows(2)
            .map(|w| Dense::new(w[0], w[1], &mut rng))
            .collect();

        Ok(Self {
            input_dim,
            config,
            layers,
            optimizer: None,
        })
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Check decoded parameters: the layer chain must run from `input_dim`
    /// to a single output, with every bias matching its layer width.
    pub(crate) fn validate(&self) -> Result<()> {
        self.config.validate()?;
        let first = self.layers.first().ok_or_else(|| {
            FraudError::ArtifactLoad("network has no layers".to_string())
        })?;
        if first.weights.nrows() != self.input_dim {
            return Err(FraudError::DimensionMismatch {
                expected: self.input_dim,
                actual: first.weights.nrows(),
            });
        }
        for (i, layer) in self.layers.iter().enumerate() {
            if layer.bias.len() != layer.weights.ncols() {
                return Err(FraudError::ArtifactLoad(format!(
                    "layer {i} has {} outputs but {} biases",
                    layer.weights.ncols(),
                    layer.bias.len()
                )));
            }
            if let Some(next) = self.layers.get(i + 1) {
                if next.weights.nrows() != layer.weights.ncols() {
                    return Err(FraudError::ArtifactLoad(format!(
                        "layer {} expects {} inputs, layer {i} produces {}",
                        i + 1,
                        next.weights.nrows(),
                        layer.weights.ncols()
                    )));
                }
            }
            if layer.weights.iter().chain(layer.bias.iter()).any(|v| !v.is_finite()) {
                return Err(FraudError::ArtifactLoad(format!(
                    "layer {i} holds non-finite parameters"
                )));
            }
        }
        let outputs = self.layers.last().map_or(0, |l| l.weights.ncols());
        if outputs != 1 {
            return Err(FraudError::ArtifactLoad(format!(
                "network must end in a single output, got {outputs}"
            )));
        }
        Ok(())
    }

    /// Generator for batch shuffling and dropout, derived from the config seed
    pub fn training_rng(&self) -> StdRng {
        StdRng::seed_from_u64(self.config.seed ^ 0x9E37_79B9_7F4A_7C15)
    }

    fn forward_train(&self, input: &Array2<f64>, rng: &mut StdRng) -> ForwardCache {
        let hidden = self.layers.len() - 1;
        let keep = 1.0 - self.config.dropout;
        let mut cache = ForwardCache {
            inputs: Vec::with_capacity(self.layers.len()),
            activations: Vec::with_capacity(hidden),
            masks: Vec::with_capacity(hidden),
            logits: Array1::zeros(input.nrows()),
        };

        let mut current = input.clone();
        for layer in &self.layers[..hidden] {
            let activated = layer.forward(&current).mapv(|z| z.max(0.0));
            let mask = (self.config.dropout > 0.0).then(|| {
                Array2::from_shape_fn(activated.raw_dim(), |_| {
                    if rng.gen::<f64>() < keep {
                        1.0 / keep
                    } else {
                        0.0
                    }
                })
            });
            let next = match &mask {
                Some(mask) => &activated * mask,
                None => activated.clone(),
            };
            cache.inputs.push(current);
            cache.activations.push(activated);
            cache.masks.push(mask);
            current = next;
        }

        cache.logits = self.layers[hidden].forward(&current).column(0).to_owned();
        cache.inputs.push(current);
        cache
    }

    fn logits(&self, input: &Array2<f64>) -> Array1<f64> {
        let hidden = self.layers.len() - 1;
        let mut current = input.clone();
        for layer in &self.layers[..hidden] {
            current = layer.forward(&current).mapv(|z| z.max(0.0));
        }
        self.layers[hidden].forward(&current).column(0).to_owned()
    }

    /// One gradient step on a mini-batch; returns the mean batch loss and the
    /// probabilities produced by the (dropout-active) forward pass.
    pub fn train_batch(
        &mut self,
        features: &Array2<f64>,
        labels: &[f64],
        rng: &mut StdRng,
    ) -> Result<(f64, Vec<f64>)> {
        check_width(self.input_dim, features)?;
        if features.nrows() != labels.len() {
            return Err(FraudError::DimensionMismatch {
                expected: features.nrows(),
                actual: labels.len(),
            });
        }
        if labels.is_empty() {
            return Ok((0.0, Vec::new()));
        }

        let cache = self.forward_train(features, rng);
        let n = labels.len() as f64;

        let mut loss = 0.0;
        let mut probabilities = Vec::with_capacity(labels.len());
        let mut delta = Array2::<f64>::zeros((labels.len(), 1));
        for (i, (&z, &y)) in cache.logits.iter().zip(labels).enumerate() {
            let (l, g) = bce_with_logits(z, y);
            loss += l;
            delta[[i, 0]] = g / n;
            probabilities.push(sigmoid(z));
        }

        // backpropagate from the output layer down
        let mut grads = Vec::with_capacity(self.layers.len());
        for idx in (0..self.layers.len()).rev() {
            let input = &cache.inputs[idx];
            grads.push((input.t().dot(&delta), delta.sum_axis(Axis(0))));
            if idx == 0 {
                break;
            }
            let mut upstream = delta.dot(&self.layers[idx].weights.t());
            if let Some(mask) = &cache.masks[idx - 1] {
                upstream *= mask;
            }
            upstream.zip_mut_with(&cache.activations[idx - 1], |d, &a| {
                if a <= 0.0 {
                    *d = 0.0;
                }
            });
            delta = upstream;
        }
        grads.reverse();

        let lr = self.config.learning_rate;
        let optimizer = self
            .optimizer
            .get_or_insert_with(|| Adam::for_layers(&self.layers));
        optimizer.apply(&mut self.layers, &grads, lr);

        Ok((loss / n, probabilities))
    }

    /// One shuffled pass over `train` in `batch_size` mini-batches.
    pub fn train_epoch(&mut self, train: &LabeledMatrix, rng: &mut StdRng) -> Result<EpochPass> {
        check_width(self.input_dim, &train.features)?;
        let mut order: Vec<usize> = (0..train.len()).collect();
        order.shuffle(rng);

        let mut pass = EpochPass::default();
        for batch in order.chunks(self.config.batch_size) {
            let features = train.features.select(Axis(0), batch);
            let labels: Vec<f64> = batch.iter().map(|&i| train.labels[i]).collect();
            let (loss, probabilities) = self.train_batch(&features, &labels, rng)?;
            pass.losses.add(loss);
            pass.probabilities.extend(probabilities);
            pass.labels.extend(labels);
        }
        Ok(pass)
    }

    /// Score `data` in order without updating parameters or applying dropout.
    pub fn evaluate(&self, data: &LabeledMatrix) -> Result<EpochPass> {
        check_width(self.input_dim, &data.features)?;
        let mut pass = EpochPass::default();
        for start in (0..data.len()).step_by(self.config.batch_size) {
            let end = (start + self.config.batch_size).min(data.len());
            let logits = self.logits(&data.features.slice(ndarray::s![start..end, ..]).to_owned());
            let labels = &data.labels[start..end];
            let loss: f64 = logits
                .iter()
                .zip(labels)
                .map(|(&z, &y)| bce_with_logits(z, y).0)
                .sum();
            pass.losses.add(loss / labels.len() as f64);
            pass.probabilities.extend(logits.iter().map(|&z| sigmoid(z)));
            pass.labels.extend_from_slice(labels);
        }
        Ok(pass)
    }
}

impl FraudModel for FraudNet {
    fn kind(&self) -> ModelKind {
        ModelKind::FraudNet
    }

    fn feature_count(&self) -> usize {
        self.input_dim
    }

    /// Runs exactly `config.epochs` epochs; there is no early stopping and the
    /// final-epoch parameters are kept.
    fn fit(&mut self, train: &LabeledMatrix, eval: Option<&LabeledMatrix>) -> Result<FitReport> {
        check_width(self.input_dim, &train.features)?;
        if let Some(eval) = eval {
            check_width(self.input_dim, &eval.features)?;
        }

        let mut rng = self.training_rng();
        let mut report = FitReport::default();
        for epoch in 0..self.config.epochs {
            let pass = self.train_epoch(train, &mut rng)?;
            let evaluated = eval.map(|e| self.evaluate(e)).transpose()?;
            let record = FitEpoch {
                epoch,
                train_loss: pass.losses.mean(),
                train_auc: pass.auc(),
                eval_loss: evaluated.as_ref().map(|p| p.losses.mean()),
                eval_auc: evaluated.as_ref().and_then(EpochPass::auc),
            };
            debug!(epoch, train_loss = record.train_loss, "network epoch");
            report.history.push(record);
        }
        info!(epochs = self.config.epochs, "network fit complete");
        Ok(report)
    }

    fn predict_proba(&self, features: &Array2<f64>) -> Result<Vec<f64>> {
        check_width(self.input_dim, features)?;
        Ok(self.logits(features).iter().map(|&z| sigmoid(z)).collect())
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let model: FraudNet = bincode::deserialize(bytes)?;
        model.validate()?;
        Ok(model)
    }
}

/// Numerically stable sigmoid
pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Binary cross-entropy on a logit: `(loss, d loss / d logit)`
#[inline]
fn bce_with_logits(logit: f64, target: f64) -> (f64, f64) {
    let loss = logit.max(0.0) - logit * target + (-logit.abs()).exp().ln_1p();
    (loss, sigmoid(logit) - target)
}

#[cfg(test)]
impl FraudNet {
    /// Replace layer `index` with a zeroed `(inputs, outputs)` layer.
    pub(crate) fn reshape_layer(&mut self, index: usize, inputs: usize, outputs: usize) {
        self.layers[index] = Dense {
            weights: Array2::zeros((inputs, outputs)),
            bias: Array1::zeros(outputs),
        };
    }

    pub(crate) fn set_input_dim(&mut self, input_dim: usize) {
        self.input_dim = input_dim;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AnyModel;
    use ndarray::array;

    fn separable() -> LabeledMatrix {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..80 {
            let x = (i as f64 - 40.0) / 10.0;
            rows.extend_from_slice(&[x, -x * 0.5]);
            labels.push(if x > 0.0 { 1.0 } else { 0.0 });
        }
        LabeledMatrix::new(Array2::from_shape_vec((80, 2), rows).unwrap(), labels).unwrap()
    }

    fn small_config() -> NetworkConfig {
        NetworkConfig {
            hidden_layers: vec![8, 4],
            dropout: 0.0,
            learning_rate: 0.05,
            epochs: 30,
            batch_size: 16,
            seed: 7,
        }
    }

    #[test]
    fn test_probabilities_in_unit_interval() {
        let net = FraudNet::new(3, NetworkConfig::default()).unwrap();
        let probs = net
            .predict_proba(&array![[0.0, 1.0, 2.0], [1e6, -1e6, 3.0]])
            .unwrap();
        assert_eq!(probs.len(), 2);
        assert!(probs.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_fit_learns_separable_data() {
        let data = separable();
        let mut net = FraudNet::new(2, small_config()).unwrap();
        let report = net.fit(&data, Some(&data)).unwrap();
        assert_eq!(report.epochs_run(), 30);
        assert!(!report.stopped_early);
        let first = report.history[0].train_loss;
        let last = report.history[29].train_loss;
        assert!(last < first, "loss did not decrease: {first} -> {last}");
        assert!(report.history[29].eval_auc.unwrap() > 0.95);
    }

    #[test]
    fn test_width_mismatch_is_rejected() {
        let mut net = FraudNet::new(3, small_config()).unwrap();
        let err = net.fit(&separable(), None).unwrap_err();
        assert!(matches!(err, FraudError::DimensionMismatch { expected: 3, actual: 2 }));
        assert!(net.predict_proba(&array![[1.0]]).is_err());
    }

    #[test]
    fn test_initialisation_is_seeded() {
        let a = FraudNet::new(4, NetworkConfig::default()).unwrap();
        let b = FraudNet::new(4, NetworkConfig::default()).unwrap();
        let x = array![[0.5, -0.5, 1.0, 2.0]];
        assert_eq!(a.predict_proba(&x).unwrap(), b.predict_proba(&x).unwrap());
    }

    #[test]
    fn test_bytes_round_trip_is_exact() {
        let data = separable();
        let mut net = FraudNet::new(2, small_config()).unwrap();
        net.fit(&data, None).unwrap();
        let restored = FraudNet::from_bytes(&net.to_bytes().unwrap()).unwrap();
        assert_eq!(
            net.predict_proba(&data.features).unwrap(),
            restored.predict_proba(&data.features).unwrap()
        );
    }

    #[test]
    fn test_decoding_rejects_input_dim_disagreement() {
        let mut net = FraudNet::new(2, small_config()).unwrap();
        net.set_input_dim(3);
        let bytes = AnyModel::from(net.clone()).to_bytes().unwrap();

        let err = FraudNet::from_bytes(&net.to_bytes().unwrap()).unwrap_err();
        assert!(matches!(err, FraudError::DimensionMismatch { expected: 3, actual: 2 }));
        assert!(AnyModel::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_decoding_rejects_broken_layer_chain() {
        let mut net = FraudNet::new(2, small_config()).unwrap();
        net.reshape_layer(1, 5, 8);
        assert!(matches!(
            FraudNet::from_bytes(&net.to_bytes().unwrap()),
            Err(FraudError::ArtifactLoad(_))
        ));

        let mut wide = FraudNet::new(2, small_config()).unwrap();
        let last = wide.layers.len() - 1;
        let inputs = wide.layers[last].weights.nrows();
        wide.reshape_layer(last, inputs, 2);
        assert!(AnyModel::from_bytes(&AnyModel::from(wide).to_bytes().unwrap()).is_err());
    }

    #[test]
    fn test_fit_reports_train_auc() {
        let data = separable();
        let mut net = FraudNet::new(2, small_config()).unwrap();
        let report = net.fit(&data, None).unwrap();
        assert!(report.history.iter().all(|e| e.train_auc.is_some()));
    }

    #[test]
    fn test_evaluate_does_not_change_parameters() {
        let data = separable();
        let net = FraudNet::new(2, small_config()).unwrap();
        let before = net.predict_proba(&data.features).unwrap();
        let pass = net.evaluate(&data).unwrap();
        for (a, b) in pass.probabilities.iter().zip(&before) {
            assert!((a - b).abs() < 1e-12);
        }
        assert_eq!(net.predict_proba(&data.features).unwrap(), before);
        assert_eq!(pass.losses.batches(), 5);
    }

    #[test]
    fn test_bce_with_logits_is_stable() {
        let (loss, grad) = bce_with_logits(1000.0, 0.0);
        assert!(loss.is_finite() && (loss - 1000.0).abs() < 1e-9);
        assert!((grad - 1.0).abs() < 1e-12);
        assert!(bce_with_logits(-1000.0, 0.0).0 < 1e-12);
    }

    #[test]
    fn test_config_validation() {
        let mut config = NetworkConfig::default();
        config.dropout = 1.0;
        assert!(config.validate().is_err());
        config = NetworkConfig {
            batch_size: 0,
            ..NetworkConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(FraudNet::new(0, NetworkConfig::default()).is_err());
    }
}
