pub mod embedding;
pub mod layers;
pub mod loss;
pub mod variant;

use std::{collections::HashMap, fmt};

pub use embedding::EmbeddingTable;
pub use layers::{LayerSpec, Linear};
pub use loss::LossMode;
pub use variant::{Eval, Move, MoveOutput, NetworkVariant, Zero, ZeroOutput};

use crate::{format::RecordFormat, optimiser::OptimiserState, rng::ParamRng, Error, Result};

pub const EMBEDDING_WEIGHT: &str = "embedding.weight";

/// Legacy first-layer bias. Always zero, never trained, but part of the blob
/// layout the inference engine reads.
pub const L1_BIAS: &str = "l1.bias";

/// Named parameter tensors, shaped like a network's trainable tensors.
#[derive(Clone, Debug, Default)]
pub struct Gradients {
    tensors: Vec<(String, Vec<f32>)>,
}

impl Gradients {
    pub fn get(&self, id: &str) -> Option<&[f32]> {
        self.tensors.iter().find(|(name, _)| name == id).map(|(_, t)| t.as_slice())
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut [f32]> {
        self.tensors.iter_mut().find(|(name, _)| name == id).map(|(_, t)| t.as_mut_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f32])> {
        self.tensors.iter().map(|(id, t)| (id.as_str(), t.as_slice()))
    }

    pub fn zero(&mut self) {
        for (_, t) in &mut self.tensors {
            t.fill(0.0);
        }
    }
}

/// An embedding-pooled network with the heads of `V`.
#[derive(Clone, Debug, PartialEq)]
pub struct Network<V> {
    variant: V,
    embedding: EmbeddingTable,
    l1_bias: Vec<f32>,
    layers: Vec<Linear>,
}

impl<V: NetworkVariant> Network<V> {
    pub fn zeroed(variant: V) -> Self {
        Self {
            variant,
            embedding: EmbeddingTable::zeroed(V::WIDTH2),
            l1_bias: vec![0.0; V::WIDTH2],
            layers: V::LAYERS.iter().map(Linear::zeroed).collect(),
        }
    }

    /// Seeded initial parameters; the same seed always gives the same network.
    pub fn new(variant: V, seed: u64) -> Self {
        let mut rng = ParamRng::new(seed);
        let embedding = EmbeddingTable::random(V::WIDTH2, &mut rng);
        let layers = V::LAYERS.iter().map(|spec| Linear::random(spec, &mut rng)).collect();

        Self { variant, embedding, l1_bias: vec![0.0; V::WIDTH2], layers }
    }

    pub fn variant(&self) -> &V {
        &self.variant
    }

    pub fn set_variant(&mut self, variant: V) {
        self.variant = variant;
    }

    pub fn embedding(&self) -> &EmbeddingTable {
        &self.embedding
    }

    pub fn l1_bias(&self) -> &[f32] {
        &self.l1_bias
    }

    pub fn layers(&self) -> &[Linear] {
        &self.layers
    }

    pub fn layer(&self, id: &str) -> Option<&Linear> {
        V::LAYERS.iter().position(|spec| spec.id == id).map(|i| &self.layers[i])
    }

    /// Replaces the embedding with another network's, e.g. a pretrained one.
    pub fn load_embedding(&mut self, embedding: &EmbeddingTable) -> Result<()> {
        if embedding.width() != V::WIDTH2 {
            return Err(Error::ShapeMismatch(format!(
                "embedding width {} cannot be loaded into a {} network (width {})",
                embedding.width(),
                V::NAME,
                V::WIDTH2,
            )));
        }

        self.embedding = EmbeddingTable::from_weights(V::WIDTH2, embedding.weights().to_vec())?;
        Ok(())
    }

    /// The shared input stage: `relu([pool(own), pool(opp)])`.
    pub fn hidden(&self, own: &[u16], opp: &[u16]) -> Vec<f32> {
        let mut hidden = vec![0.0; 2 * V::WIDTH2];
        let (own_half, opp_half) = hidden.split_at_mut(V::WIDTH2);

        self.embedding.pool(own, own_half);
        self.embedding.pool(opp, opp_half);
        layers::relu(&mut hidden);

        hidden
    }

    pub fn forward(&self, record: &V::Record) -> V::Output {
        V::heads(self, &self.hidden(record.own(), record.opp()))
    }

    pub fn loss(&self, record: &V::Record) -> f32 {
        self.variant.loss(&self.forward(record), record)
    }

    /// Every named parameter, including the frozen `l1.bias`, in storage order.
    pub fn tensors(&self) -> Vec<(String, &[f32])> {
        let mut res = vec![(EMBEDDING_WEIGHT.to_string(), self.embedding.weights()), (L1_BIAS.to_string(), &self.l1_bias[..])];

        for (spec, layer) in V::LAYERS.iter().zip(&self.layers) {
            res.push((format!("{}.weight", spec.id), layer.weights()));
            res.push((format!("{}.bias", spec.id), layer.biases()));
        }

        res
    }

    fn trainable_mut(&mut self) -> Vec<(String, &mut [f32])> {
        let mut res = vec![(EMBEDDING_WEIGHT.to_string(), self.embedding.weights_mut())];

        for (spec, layer) in V::LAYERS.iter().zip(self.layers.iter_mut()) {
            res.push((format!("{}.weight", spec.id), layer.weights.as_mut_slice()));
            res.push((format!("{}.bias", spec.id), layer.biases.as_mut_slice()));
        }

        res
    }

    /// Rebuilds a network from named tensors, as written by [`Network::tensors`].
    pub fn from_tensors(variant: V, tensors: Vec<(String, Vec<f32>)>) -> Result<Self> {
        let mut by_id: HashMap<String, Vec<f32>> = HashMap::with_capacity(tensors.len());
        for (id, values) in tensors {
            if by_id.insert(id.clone(), values).is_some() {
                return Err(Error::ShapeMismatch(format!("duplicate tensor `{id}`")));
            }
        }

        let mut take = |id: &str, len: usize| -> Result<Vec<f32>> {
            let values = by_id
                .remove(id)
                .ok_or_else(|| Error::ShapeMismatch(format!("missing tensor `{id}` for a {} network", V::NAME)))?;

            if values.len() != len {
                return Err(Error::ShapeMismatch(format!(
                    "tensor `{id}` has {} values, expected {len}",
                    values.len()
                )));
            }

            Ok(values)
        };

        let embedding = EmbeddingTable::from_weights(V::WIDTH2, take(EMBEDDING_WEIGHT, embedding::ROWS * V::WIDTH2)?)?;
        let l1_bias = take(L1_BIAS, V::WIDTH2)?;

        let mut layers = Vec::with_capacity(V::LAYERS.len());
        for spec in V::LAYERS {
            layers.push(Linear {
                inputs: spec.inputs,
                outputs: spec.outputs,
                weights: take(&format!("{}.weight", spec.id), spec.inputs * spec.outputs)?,
                biases: take(&format!("{}.bias", spec.id), spec.outputs)?,
            });
        }

        if let Some(id) = by_id.keys().next() {
            return Err(Error::ShapeMismatch(format!("unexpected tensor `{id}` for a {} network", V::NAME)));
        }

        Ok(Self { variant, embedding, l1_bias, layers })
    }

    /// A zeroed gradient for every trainable tensor.
    pub fn zero_gradients(&self) -> Gradients {
        let tensors = self
            .tensors()
            .into_iter()
            .filter(|(id, _)| id != L1_BIAS)
            .map(|(id, values)| (id, vec![0.0; values.len()]))
            .collect();

        Gradients { tensors }
    }

    /// The only place parameters change during training.
    ///
    /// Masks the padding row of the embedding gradient, then passes every
    /// trainable tensor to `optimiser`. `l1.bias` is never updated.
    pub fn apply_gradients<O: OptimiserState>(
        &mut self,
        grads: &mut Gradients,
        optimiser: &mut O,
        gradient_factor: f32,
        learning_rate: f32,
    ) -> Result<()> {
        let embedding_grad = grads
            .get_mut(EMBEDDING_WEIGHT)
            .ok_or_else(|| Error::ShapeMismatch(format!("missing gradient `{EMBEDDING_WEIGHT}`")))?;
        self.embedding.mask_padding(embedding_grad);

        for (id, weights) in self.trainable_mut() {
            let grad = grads.get(&id).ok_or_else(|| Error::ShapeMismatch(format!("missing gradient `{id}`")))?;

            if grad.len() != weights.len() {
                return Err(Error::ShapeMismatch(format!(
                    "gradient `{id}` has {} values, expected {}",
                    grad.len(),
                    weights.len()
                )));
            }

            optimiser.update_single_weight(weights, grad, &id, gradient_factor, learning_rate);
        }

        Ok(())
    }

    pub fn parameter_count(&self) -> usize {
        self.tensors().iter().map(|(_, t)| t.len()).sum()
    }
}

impl<V: NetworkVariant> fmt::Display for Network<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} -> {})x2", embedding::ROWS - 1, V::WIDTH2)?;
        for spec in V::LAYERS {
            write!(f, " | {}: {} -> {}", spec.id, spec.inputs, spec.outputs)?;
        }
        Ok(())
    }
}
