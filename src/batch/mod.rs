//! Batches of multi-view scenes.

pub mod view;

pub use crate::{error::Error, predictor::PredictorInput};
pub use burn::tensor::{
    backend::{AutodiffBackend, Backend},
    Tensor,
};
pub use view::*;

use std::fmt;

/// A batch of scenes, each observed from the same count of views.
///
/// - `S` is [`SceneBatch::scene_count`].
/// - `V` is [`SceneBatch::view_count`].
/// - `H` and `W` come from [`SceneBatch::image_size`].
///
/// The first views of each scene condition the prediction,
/// and the remaining views supervise it.
#[derive(Clone)]
pub struct SceneBatch<B: Backend> {
    /// `[S, V, 3]`
    pub camera_centers: Tensor<B, 3>,
    /// `[S, V, 2]`
    pub focals_pixels: Option<Tensor<B, 3>>,
    /// `[S, V, 4, 4]`
    pub full_proj_transforms: Tensor<B, 4>,
    /// `[S, V, 3, H, W]`, ranging from `0.0` to `1.0`
    pub gt_images: Tensor<B, 5>,
    /// `[S, V, 1, H, W]`
    pub origin_distances: Option<Tensor<B, 5>>,
    /// `[S, V, 4]`
    pub source_cv2wt_quats: Tensor<B, 3>,
    /// `[S, V, 4, 4]`
    pub view_to_world_transforms: Tensor<B, 4>,
    /// `[S, V, 4, 4]`
    pub world_view_transforms: Tensor<B, 4>,
}

/// The camera of a single view.
#[derive(Clone)]
pub struct ViewCamera<B: Backend> {
    /// `[3]`
    pub camera_center: Tensor<B, 1>,
    /// `[2]`
    pub focals_pixels: Option<Tensor<B, 1>>,
    /// `[4, 4]`
    pub full_proj_transform: Tensor<B, 2>,
    pub image_height: usize,
    pub image_width: usize,
    /// `[4, 4]`
    pub world_view_transform: Tensor<B, 2>,
}

impl<AB: AutodiffBackend> SceneBatch<AB> {
    /// Moving to the inner backend, where no gradient is tracked.
    pub fn inner(self) -> SceneBatch<AB::InnerBackend> {
        SceneBatch {
            camera_centers: self.camera_centers.inner(),
            focals_pixels: self.focals_pixels.map(Tensor::inner),
            full_proj_transforms: self.full_proj_transforms.inner(),
            gt_images: self.gt_images.inner(),
            origin_distances: self.origin_distances.map(Tensor::inner),
            source_cv2wt_quats: self.source_cv2wt_quats.inner(),
            view_to_world_transforms: self.view_to_world_transforms.inner(),
            world_view_transforms: self.world_view_transforms.inner(),
        }
    }
}

impl<B: Backend> fmt::Debug for SceneBatch<B> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct(&format!("SceneBatch<{}>", B::name()))
            .field("camera_centers.dims()", &self.camera_centers.dims())
            .field(
                "focals_pixels.dims()",
                &self.focals_pixels.as_ref().map(Tensor::dims),
            )
            .field(
                "full_proj_transforms.dims()",
                &self.full_proj_transforms.dims(),
            )
            .field("gt_images.dims()", &self.gt_images.dims())
            .field(
                "origin_distances.dims()",
                &self.origin_distances.as_ref().map(Tensor::dims),
            )
            .field("source_cv2wt_quats.dims()", &self.source_cv2wt_quats.dims())
            .field(
                "view_to_world_transforms.dims()",
                &self.view_to_world_transforms.dims(),
            )
            .field(
                "world_view_transforms.dims()",
                &self.world_view_transforms.dims(),
            )
            .finish()
    }
}

impl<B: Backend> fmt::Debug for ViewCamera<B> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct(&format!("ViewCamera<{}>", B::name()))
            .field("has_focals_pixels", &self.focals_pixels.is_some())
            .field("image_height", &self.image_height)
            .field("image_width", &self.image_width)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture;
    use burn::backend::{Autodiff, NdArray};

    #[test]
    fn inner_keeps_the_shapes() {
        let batch = fixture::scene_batch::<Autodiff<NdArray>>(2, 3, 2, 2, true);

        let output: SceneBatch<NdArray> = batch.inner();
        output.validate().unwrap();
        assert_eq!(output.image_size(), (2, 2));
        assert_eq!(output.origin_distances.unwrap().dims(), [2, 3, 1, 2, 2]);
    }
}
