pub mod adversarial;
pub mod ledger;

pub use adversarial::{DiscriminatorLoss, GanLoss, GeneratorLoss};
pub use ledger::{LossLedger, LossLog};
