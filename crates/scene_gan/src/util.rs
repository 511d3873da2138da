use burn::{
    prelude::{Backend, Tensor},
    tensor::{Int, TensorData},
};

use crate::error::GanError;

/// Parses `"64,64"` into `[64, 64]`.
pub fn int_tuple(s: &str) -> Result<Vec<i64>, GanError> {
    s.split(',')
        .map(|v| {
            v.trim().parse::<i64>().map_err(|e| GanError::InvalidFlag {
                value: s.into(),
                reason: e.to_string(),
            })
        })
        .collect()
}

pub fn float_tuple(s: &str) -> Result<Vec<f64>, GanError> {
    s.split(',')
        .map(|v| {
            v.trim().parse::<f64>().map_err(|e| GanError::InvalidFlag {
                value: s.into(),
                reason: e.to_string(),
            })
        })
        .collect()
}

pub fn str_tuple(s: &str) -> Vec<String> {
    s.split(',').map(|v| v.to_string()).collect()
}

/// Only `"1"` and `"0"` are accepted.
pub fn bool_flag(s: &str) -> Result<bool, GanError> {
    match s {
        "1" => Ok(true),
        "0" => Ok(false),
        other => Err(GanError::InvalidFlag {
            value: other.into(),
            reason: "bool flags must be 0 or 1".into(),
        }),
    }
}

pub(crate) fn read_ints<B: Backend, const D: usize>(
    tensor: &Tensor<B, D, Int>,
) -> Result<Vec<i64>, GanError> {
    read_data(tensor.to_data())
}

pub(crate) fn read_floats<B: Backend, const D: usize>(
    tensor: &Tensor<B, D>,
) -> Result<Vec<f32>, GanError> {
    read_data(tensor.to_data())
}

fn read_data<E: burn::tensor::Element>(data: TensorData) -> Result<Vec<E>, GanError> {
    data.convert::<E>()
        .to_vec::<E>()
        .map_err(|e| GanError::TensorData(format!("{:?}", e)))
}
