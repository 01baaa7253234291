use crate::rng::ParamRng;

/// Declared shape of one dense layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayerSpec {
    pub id: &'static str,
    pub inputs: usize,
    pub outputs: usize,
}

impl LayerSpec {
    pub const fn new(id: &'static str, inputs: usize, outputs: usize) -> Self {
        Self { id, inputs, outputs }
    }

    /// Number of parameters: weights plus biases.
    pub const fn size(&self) -> usize {
        (self.inputs + 1) * self.outputs
    }
}

/// Fully connected layer. Weights are row-major `[outputs][inputs]`.
#[derive(Clone, Debug, PartialEq)]
pub struct Linear {
    pub(crate) inputs: usize,
    pub(crate) outputs: usize,
    pub(crate) weights: Vec<f32>,
    pub(crate) biases: Vec<f32>,
}

impl Linear {
    pub fn zeroed(spec: &LayerSpec) -> Self {
        Self {
            inputs: spec.inputs,
            outputs: spec.outputs,
            weights: vec![0.0; spec.inputs * spec.outputs],
            biases: vec![0.0; spec.outputs],
        }
    }

    /// Weights and biases uniform in `±1/sqrt(inputs)`.
    pub fn random(spec: &LayerSpec, rng: &mut ParamRng) -> Self {
        let bound = (1.0 / spec.inputs as f32).sqrt();

        Self {
            inputs: spec.inputs,
            outputs: spec.outputs,
            weights: rng.uniform(spec.inputs * spec.outputs, bound),
            biases: rng.uniform(spec.outputs, bound),
        }
    }

    pub fn inputs(&self) -> usize {
        self.inputs
    }

    pub fn outputs(&self) -> usize {
        self.outputs
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    pub fn biases(&self) -> &[f32] {
        &self.biases
    }

    pub fn forward(&self, input: &[f32]) -> Vec<f32> {
        assert_eq!(input.len(), self.inputs, "Layer input has the wrong width!");

        self.weights
            .chunks_exact(self.inputs)
            .zip(&self.biases)
            .map(|(row, &bias)| bias + row.iter().zip(input).map(|(w, x)| w * x).sum::<f32>())
            .collect()
    }
}

pub fn relu(xs: &mut [f32]) {
    for x in xs {
        *x = x.max(0.0);
    }
}

/// Applies `layers` in order with a ReLU between consecutive layers.
pub fn forward_stack(layers: &[Linear], input: &[f32]) -> Vec<f32> {
    let mut x = input.to_vec();

    for (i, layer) in layers.iter().enumerate() {
        if i > 0 {
            relu(&mut x);
        }
        x = layer.forward(&x);
    }

    x
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(inputs: usize, outputs: usize, weights: &[f32], biases: &[f32]) -> Linear {
        Linear { inputs, outputs, weights: weights.to_vec(), biases: biases.to_vec() }
    }

    #[test]
    fn linear_forward() {
        // [ -1.0,  2.0,  0.0 ]
        // [  4.0, -2.0, -3.0 ]
        let l = layer(3, 2, &[-1.0, 2.0, 0.0, 4.0, -2.0, -3.0], &[0.5, -1.0]);
        assert_eq!(l.forward(&[1.0, 1.0, 1.0]), vec![1.5, -2.0]);
        assert_eq!(l.forward(&[0.0, 0.0, 2.0]), vec![0.5, -7.0]);
    }

    #[test]
    fn stack_applies_relu_between_layers_only() {
        let a = layer(1, 1, &[1.0], &[0.0]);
        let b = layer(1, 1, &[-1.0], &[-1.0]);

        // -3 -> relu(-3) = 0 -> -1, last output is not rectified
        assert_eq!(forward_stack(&[a.clone(), b.clone()], &[-3.0]), vec![-1.0]);
        assert_eq!(forward_stack(&[b, a], &[2.0]), vec![0.0]);
    }

    #[test]
    fn random_init_is_bounded() {
        let spec = LayerSpec::new("l", 16, 4);
        let l = Linear::random(&spec, &mut ParamRng::new(1));
        assert_eq!(l.weights().len(), 64);
        assert_eq!(l.biases().len(), 4);
        assert!(l.weights().iter().chain(l.biases()).all(|x| x.abs() <= 0.25));
        assert_eq!(spec.size(), 68);
    }
}
