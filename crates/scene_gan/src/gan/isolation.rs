use std::ops::Deref;

use burn::{module::Module, prelude::Backend};

/// A copy of a module whose parameters are excluded from autodiff.
///
/// Forward passes through a frozen module still carry gradients to their
/// inputs, but no gradient is ever registered for its own parameters. The
/// copy is dropped at the end of the phase that created it.
#[derive(Debug, Clone)]
pub struct Frozen<M> {
    module: M,
}

impl<M> Frozen<M> {
    pub fn of<B: Backend>(module: &M) -> Self
    where
        M: Module<B>,
    {
        Self {
            module: module.clone().no_grad(),
        }
    }
}

impl<M> Deref for Frozen<M> {
    type Target = M;

    fn deref(&self) -> &Self::Target {
        &self.module
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::{
        backend::{Autodiff, NdArray},
        nn::{Linear, LinearConfig},
        tensor::Tensor,
    };

    type TestBackend = Autodiff<NdArray<f32>>;

    #[test]
    fn frozen_module_passes_gradients_to_inputs_only() {
        let device = Default::default();
        let linear: Linear<TestBackend> = LinearConfig::new(2, 1).init(&device);
        let frozen = Frozen::of::<TestBackend>(&linear);

        let x = Tensor::<TestBackend, 2>::from_floats([[1.0, 2.0]], &device).require_grad();
        let grads = frozen.forward(x.clone()).sum().backward();

        assert!(x.grad(&grads).is_some());
        assert!(frozen.weight.val().grad(&grads).is_none());
        assert!(linear.weight.val().grad(&grads).is_none());
    }
}
