use std::collections::BTreeMap;

use burn::{
    prelude::{Backend, Tensor},
    tensor::cast::ToElement,
};

use crate::error::GanError;

/// Detached per-term loss values, keyed by term name.
pub type LossLog = BTreeMap<String, f64>;

/// Collects named, weighted loss terms into a single backpropagatable total.
///
/// The total starts out empty and is assigned by the first term instead of
/// being summed into a zero tensor. The log only holds plain `f64` values so
/// nothing in it keeps the autodiff graph of a step alive.
#[derive(Debug)]
pub struct LossLedger<B: Backend> {
    total: Option<Tensor<B, 1>>,
    terms: LossLog,
}

impl<B: Backend> Default for LossLedger<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> LossLedger<B> {
    pub fn new() -> Self {
        Self {
            total: None,
            terms: LossLog::new(),
        }
    }

    /// Adds `loss * weight` under `name`.
    ///
    /// Names must be unique within a ledger; a repeated name is rejected and
    /// leaves the ledger untouched.
    pub fn add_loss(&mut self, loss: Tensor<B, 1>, name: &str, weight: f64) -> Result<(), GanError> {
        if self.terms.contains_key(name) {
            return Err(GanError::DuplicateLossTerm(name.into()));
        }
        let cur_loss = loss.mul_scalar(weight);
        let value = cur_loss.clone().detach().into_scalar().to_f64();

        self.total = Some(match self.total.take() {
            Some(total) => total + cur_loss,
            None => cur_loss,
        });
        self.terms.insert(name.into(), value);
        Ok(())
    }

    pub fn total(&self) -> Option<&Tensor<B, 1>> {
        self.total.as_ref()
    }

    pub fn log(&self) -> &LossLog {
        &self.terms
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &f64)> {
        self.terms.iter()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Splits the ledger into the total to backpropagate and the log.
    pub fn into_parts(self) -> Result<(Tensor<B, 1>, LossLog), GanError> {
        match self.total {
            Some(total) => Ok((total, self.terms)),
            None => Err(GanError::EmptyLedger),
        }
    }
}
