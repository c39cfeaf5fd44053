//! Conversions between host vectors and burn tensors.

use burn::prelude::*;
use burn::tensor::{ElementConversion, TensorData};

use crate::error::{PpoError, Result};

/// Stack equally sized rows into a `[rows, width]` tensor.
pub fn rows_to_tensor<B: Backend>(
    rows: &[Vec<f32>],
    width: usize,
    what: &str,
    device: &B::Device,
) -> Result<Tensor<B, 2>> {
    let mut flat = Vec::with_capacity(rows.len() * width);
    for row in rows {
        if row.len() != width {
            return Err(PpoError::shape(what, width, row.len()));
        }
        flat.extend_from_slice(row);
    }
    Ok(Tensor::from_data(TensorData::new(flat, [rows.len(), width]), device))
}

/// Build a `[len]` tensor from a slice.
pub fn vec_to_tensor<B: Backend>(values: &[f32], device: &B::Device) -> Tensor<B, 1> {
    Tensor::from_data(TensorData::new(values.to_vec(), [values.len()]), device)
}

/// Copy a 1-D tensor back to the host.
pub fn tensor_to_vec<B: Backend>(tensor: Tensor<B, 1>) -> Vec<f32> {
    tensor.into_data().iter::<f32>().collect()
}

/// Copy a 2-D tensor back to the host, one vector per row.
pub fn tensor_to_rows<B: Backend>(tensor: Tensor<B, 2>) -> Vec<Vec<f32>> {
    let [_, width] = tensor.dims();
    let flat: Vec<f32> = tensor.into_data().iter::<f32>().collect();
    if width == 0 {
        return Vec::new();
    }
    flat.chunks(width).map(|row| row.to_vec()).collect()
}

/// Read a single-element tensor.
pub fn scalar<B: Backend>(tensor: Tensor<B, 1>) -> f32 {
    tensor.into_scalar().elem::<f32>()
}
