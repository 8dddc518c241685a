//! Predicted Gaussian splats.

pub mod property;

pub use crate::error::Error;
pub use burn::tensor::{backend::Backend, Tensor};

use std::fmt;

/// The Gaussian splats predicted for a batch of scenes.
///
/// - `S` is [`Self::scene_count`].
/// - `P` is [`Self::point_count`].
#[derive(Clone)]
pub struct GaussianSplats<B: Backend> {
    /// `[S, P, 3]`, ranging from `0.0` to `1.0`
    pub colors_rgb: Tensor<B, 3>,
    /// `[S, P, 1]`, ranging from `0.0` to `1.0`
    pub opacities: Tensor<B, 3>,
    /// `[S, P, 3]`
    pub positions: Tensor<B, 3>,
    /// `[S, P, 4]`, normalized quaternions
    pub rotations: Tensor<B, 3>,
    /// `[S, P, 3]`, positive
    pub scalings: Tensor<B, 3>,
}

/// The Gaussian splats of a single scene.
///
/// - `P` is [`Self::point_count`].
#[derive(Clone)]
pub struct SplatScene<B: Backend> {
    /// `[P, 3]`
    pub colors_rgb: Tensor<B, 2>,
    /// `[P, 1]`
    pub opacities: Tensor<B, 2>,
    /// `[P, 3]`
    pub positions: Tensor<B, 2>,
    /// `[P, 4]`
    pub rotations: Tensor<B, 2>,
    /// `[P, 3]`
    pub scalings: Tensor<B, 2>,
}

impl<B: Backend> fmt::Debug for GaussianSplats<B> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct(&format!("GaussianSplats<{}>", B::name()))
            .field("colors_rgb.dims()", &self.colors_rgb.dims())
            .field("opacities.dims()", &self.opacities.dims())
            .field("positions.dims()", &self.positions.dims())
            .field("rotations.dims()", &self.rotations.dims())
            .field("scalings.dims()", &self.scalings.dims())
            .finish()
    }
}

impl<B: Backend> fmt::Debug for SplatScene<B> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct(&format!("SplatScene<{}>", B::name()))
            .field("colors_rgb.dims()", &self.colors_rgb.dims())
            .field("opacities.dims()", &self.opacities.dims())
            .field("positions.dims()", &self.positions.dims())
            .field("rotations.dims()", &self.rotations.dims())
            .field("scalings.dims()", &self.scalings.dims())
            .finish()
    }
}
