use anyhow::{bail, Result};
use candle_core::{DType, Tensor};

/// Mean over unmasked tokens followed by L2 normalisation: `[B,T,H] -> [B,H]`.
pub fn masked_mean_l2(hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    let (batch, hidden_dim) = match hidden.dims() {
        [b, _, h] => (*b, *h),
        other => bail!("hidden states must be [B,T,H], got {:?}", other),
    };

    let mask = attention_mask.to_device(hidden.device())?.to_dtype(hidden.dtype())?;
    let mask_3d = mask.unsqueeze(2)?.broadcast_as(hidden.shape())?;
    let sum = (hidden * &mask_3d)?.sum(1)?;
    // all-padding rows would divide by zero
    let lengths = mask.sum(1)?.unsqueeze(1)?.maximum(1f64)?.to_dtype(sum.dtype())?;
    let mean = sum.broadcast_div(&lengths)?;

    let eps_val = match hidden.dtype() { DType::F16 => 1e-6f32, _ => 1e-12f32 };
    let eps = Tensor::new(&[eps_val], hidden.device())?.to_dtype(hidden.dtype())?.unsqueeze(0)?;
    let norm = mean.sqr()?.sum_keepdim(1)?.sqrt()?.broadcast_add(&eps)?;
    let out = mean.broadcast_div(&norm)?;
    if out.dims() != [batch, hidden_dim] {
        bail!("pooled shape {:?} != [{batch}, {hidden_dim}]", out.dims());
    }
    Ok(out)
}
