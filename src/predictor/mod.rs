//! Splat predictors.

pub use crate::scene::GaussianSplats;
pub use burn::{
    module::Module,
    tensor::{backend::Backend, Tensor},
};

use std::fmt;

/// A feed-forward network predicting Gaussian splats from conditioning views.
///
/// The architecture lives outside of this crate.
/// The trainer needs it on an autodiff backend so that the optimizer,
/// the EMA and the checkpoints can walk through its parameters.
/// Its valid module on the inner backend is used for evaluation.
pub trait SplatPredictor<B: Backend>: Module<B> {
    /// Predicting the splats of every scene in the batch at once.
    fn predict(
        &self,
        input: PredictorInput<B>,
    ) -> GaussianSplats<B>;
}

/// The conditioning views of a batch.
///
/// - `S` is the scene count.
/// - `V_i` is the count of conditioning views.
/// - `C` is `3`, or `4` if the origin distances are concatenated.
#[derive(Clone)]
pub struct PredictorInput<B: Backend> {
    /// `[S, V_i, 2]`
    pub focals_pixels: Option<Tensor<B, 3>>,
    /// `[S, V_i, C, H, W]`
    pub images: Tensor<B, 5>,
    /// `[S, V_i, 4]`
    pub rotation_quaternions: Tensor<B, 3>,
    /// `[S, V_i, 4, 4]`
    pub view_to_world_transforms: Tensor<B, 4>,
}

impl<B: Backend> fmt::Debug for PredictorInput<B> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct(&format!("PredictorInput<{}>", B::name()))
            .field(
                "focals_pixels.dims()",
                &self.focals_pixels.as_ref().map(Tensor::dims),
            )
            .field("images.dims()", &self.images.dims())
            .field(
                "rotation_quaternions.dims()",
                &self.rotation_quaternions.dims(),
            )
            .field(
                "view_to_world_transforms.dims()",
                &self.view_to_world_transforms.dims(),
            )
            .finish()
    }
}
