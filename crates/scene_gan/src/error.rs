use thiserror::Error;

/// Contract violations raised by the discriminators, the crop primitive,
/// the loss ledger and the training orchestrator.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GanError {
    #[error("batch contains no {}", .0)]
    EmptyBatch(&'static str),
    #[error("{} has length {} but {} expected", .field, .found, .expected)]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("{}[{}] = {} is out of range [0, {})", .field, .index, .value, .bound)]
    IndexOutOfRange {
        field: &'static str,
        index: usize,
        value: i64,
        bound: usize,
    },
    #[error("shape mismatch for {}: expected {}, found {}", .what, .expected, .found)]
    ShapeMismatch {
        what: &'static str,
        expected: String,
        found: String,
    },
    #[error("box {} has non finite coordinates {:?}", .index, .coords)]
    InvalidBox { index: usize, coords: [f32; 4] },
    #[error("a layout was passed to a patch discriminator built with layout_dim = 0")]
    UnexpectedLayout,
    #[error("the patch discriminator expects a layout with {} channels but none was passed", .0)]
    MissingLayout(usize),
    #[error("invalid layer {:?} in architecture: {}", .layer, .reason)]
    InvalidArchitecture { layer: String, reason: String },
    #[error("{:?} is not a valid {}", .value, .kind)]
    UnknownOption { kind: &'static str, value: String },
    #[error("invalid flag value {:?}: {}", .value, .reason)]
    InvalidFlag { value: String, reason: String },
    #[error("loss term {:?} was already added to this ledger", .0)]
    DuplicateLossTerm(String),
    #[error("no loss term was added to the ledger")]
    EmptyLedger,
    #[error("failed to read tensor data due to {}", .0)]
    TensorData(String),
}
