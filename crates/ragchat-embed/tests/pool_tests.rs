use candle_core::{DType, Device, Tensor};
use ragchat_embed::masked_mean_l2;

fn unit(v: [f32; 4]) -> [f32; 4] {
    let n = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    v.map(|x| x / n)
}

#[test]
fn padding_tokens_are_excluded_per_row() {
    let dev = Device::Cpu;
    // Two rows of two tokens, hidden dim 4. Row 0 masks its second token.
    let h = Tensor::from_slice(
        &[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 1.0, 0.0, 0.0, 0.0, 3.0, 0.0, 0.0, 0.0],
        (2, 2, 4),
        &dev,
    )
    .unwrap();
    let mask = Tensor::from_slice(&[1u32, 0, 1, 1], (2, 2), &dev).unwrap();

    let rows: Vec<Vec<f32>> = masked_mean_l2(&h, &mask).unwrap().to_vec2().unwrap();
    let expected = [unit([1.0, 2.0, 3.0, 4.0]), unit([2.0, 0.0, 0.0, 0.0])];
    for (row, want) in rows.iter().zip(expected) {
        for (a, b) in row.iter().cloned().zip(want) {
            assert!((a - b).abs() < 1e-5, "a={a} b={b}");
        }
    }
}

#[test]
fn fully_masked_row_stays_finite() {
    let dev = Device::Cpu;
    let h = Tensor::ones((1, 3, 4), DType::F32, &dev).unwrap();
    let mask = Tensor::zeros((1, 3), DType::U32, &dev).unwrap();
    let rows: Vec<Vec<f32>> = masked_mean_l2(&h, &mask).unwrap().to_vec2().unwrap();
    assert!(rows[0].iter().all(|x| x.is_finite()));
}

#[test]
fn wrong_rank_is_rejected() {
    let dev = Device::Cpu;
    let h = Tensor::ones((3, 4), DType::F32, &dev).unwrap();
    let mask = Tensor::ones((1, 3), DType::U32, &dev).unwrap();
    assert!(masked_mean_l2(&h, &mask).is_err());
}
