use burn::{
    module::AutodiffModule,
    optim::{GradientsParams, Optimizer},
    prelude::Tensor,
    tensor::backend::AutodiffBackend,
};

/// An optimizer bound to the learning rate of one training phase.
#[derive(Clone)]
pub struct PhaseOptimizer<O> {
    optimizer: O,
    learning_rate: f64,
}

impl<O> PhaseOptimizer<O> {
    pub fn new(optimizer: O, learning_rate: f64) -> Self {
        Self {
            optimizer,
            learning_rate,
        }
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Backpropagates `loss` and steps `module` with the gradients of its own
    /// parameters only. Gradients registered for other modules are dropped.
    pub fn update_params<B, M>(&mut self, loss: Tensor<B, 1>, module: M) -> M
    where
        B: AutodiffBackend,
        M: AutodiffModule<B>,
        O: Optimizer<M, B>,
    {
        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &module);
        self.optimizer.step(self.learning_rate, module, grads)
    }
}
