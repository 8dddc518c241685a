//! Image quality metrics.

pub use super::*;

use std::f64::consts::LN_10;

/// Peak signal-to-noise ratio of images ranging from `0.0` to `1.0`.
///
/// ## Shapes
///
/// * `rendered` - `[N, C, H, W]`
/// * `target` - `[N, C, H, W]`
/// * output - `[N]`
pub fn psnr<B: Backend>(
    rendered: Tensor<B, 4>,
    target: Tensor<B, 4>,
) -> Tensor<B, 1> {
    let mse = (rendered - target)
        .powf_scalar(2.0)
        .flatten::<2>(1, 3)
        .mean_dim(1)
        .squeeze::<1>(1);

    mse.log().mul_scalar(-10.0 / LN_10)
}

#[cfg(test)]
mod tests {
    #[test]
    fn psnr_per_image() {
        use super::*;
        use burn::backend::NdArray;

        let device = Default::default();
        let target = Tensor::<NdArray, 4>::zeros([2, 3, 4, 4], &device);
        let rendered = Tensor::cat(
            vec![
                Tensor::<NdArray, 4>::full([1, 3, 4, 4], 0.1, &device),
                Tensor::<NdArray, 4>::full([1, 3, 4, 4], 0.01, &device),
            ],
            0,
        );

        let output = psnr(rendered, target).into_data().to_vec::<f32>().unwrap();
        assert_eq!(output.len(), 2);
        assert!((output[0] - 20.0).abs() < 1e-3, "{}", output[0]);
        assert!((output[1] - 40.0).abs() < 1e-3, "{}", output[1]);
    }
}
