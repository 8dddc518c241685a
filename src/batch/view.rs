//! View selection of the scene batches.

pub use super::*;

use std::ops::Range;

/// Dimension operations
impl<B: Backend> SceneBatch<B> {
    /// `S`
    #[inline]
    pub fn scene_count(&self) -> usize {
        self.gt_images.dims()[0]
    }

    /// `V`
    #[inline]
    pub fn view_count(&self) -> usize {
        self.gt_images.dims()[1]
    }

    /// `(H, W)`
    #[inline]
    pub fn image_size(&self) -> (usize, usize) {
        let dims = self.gt_images.dims();
        (dims[3], dims[4])
    }

    /// The supervision views following `input_images` conditioning views.
    pub fn supervision_views(
        &self,
        input_images: usize,
    ) -> Result<Range<usize>, Error> {
        let view_count = self.view_count();
        if input_images == 0 || input_images >= view_count {
            return Err(Error::Validation(
                format!("The count of conditioning views ({input_images})"),
                format!("from 1 to {}", view_count.saturating_sub(1)),
            ));
        }
        Ok(input_images..view_count)
    }

    /// Checking the shape of every field against `S`, `V`, `H` and `W`.
    pub fn validate(&self) -> Result<(), Error> {
        let [scene_count, view_count, channel_count, image_height, image_width] =
            self.gt_images.dims();
        if channel_count != 3 {
            return Err(Error::Validation(
                format!("The channel count of gt_images ({channel_count})"),
                "3".into(),
            ));
        }

        let [s, v, h, w] = [scene_count, view_count, image_height, image_width];
        let shapes = [
            ("camera_centers", Some(self.camera_centers.dims().to_vec()), vec![s, v, 3]),
            (
                "focals_pixels",
                self.focals_pixels.as_ref().map(|t| t.dims().to_vec()),
                vec![s, v, 2],
            ),
            (
                "full_proj_transforms",
                Some(self.full_proj_transforms.dims().to_vec()),
                vec![s, v, 4, 4],
            ),
            (
                "origin_distances",
                self.origin_distances.as_ref().map(|t| t.dims().to_vec()),
                vec![s, v, 1, h, w],
            ),
            (
                "source_cv2wt_quats",
                Some(self.source_cv2wt_quats.dims().to_vec()),
                vec![s, v, 4],
            ),
            (
                "view_to_world_transforms",
                Some(self.view_to_world_transforms.dims().to_vec()),
                vec![s, v, 4, 4],
            ),
            (
                "world_view_transforms",
                Some(self.world_view_transforms.dims().to_vec()),
                vec![s, v, 4, 4],
            ),
        ];

        shapes.into_iter().try_for_each(|(name, dims, target)| match dims {
            Some(dims) if dims != target => Err(Error::Validation(
                format!("The shape of {name} ({dims:?})"),
                format!("{target:?}"),
            )),
            _ => Ok(()),
        })
    }
}

/// View selection
impl<B: Backend> SceneBatch<B> {
    /// The input of the predictor from the first `input_images` views.
    ///
    /// If `with_origin_distances` is `true`, the origin distances are
    /// concatenated to the images as the 4th channel, and the focal lengths
    /// of the conditioning views are passed along.
    pub fn conditioning(
        &self,
        input_images: usize,
        with_origin_distances: bool,
    ) -> Result<PredictorInput<B>, Error> {
        let scene_count = self.scene_count();
        let view_count = self.view_count();
        if input_images == 0 || input_images > view_count {
            return Err(Error::Validation(
                format!("The count of conditioning views ({input_images})"),
                format!("from 1 to {view_count}"),
            ));
        }

        let ranges = [0..scene_count, 0..input_images];
        let mut images = self.gt_images.to_owned().slice(ranges.to_owned());
        let mut focals_pixels = None;

        if with_origin_distances {
            let origin_distances =
                self.origin_distances.as_ref().ok_or_else(|| {
                    Error::Validation(
                        "origin_distances".into(),
                        "present for the data category".into(),
                    )
                })?;
            let focals = self.focals_pixels.as_ref().ok_or_else(|| {
                Error::Validation(
                    "focals_pixels".into(),
                    "present for the data category".into(),
                )
            })?;

            images = Tensor::cat(
                vec![images, origin_distances.to_owned().slice(ranges.to_owned())],
                2,
            );
            focals_pixels = Some(focals.to_owned().slice(ranges.to_owned()));
        }

        Ok(PredictorInput {
            focals_pixels,
            images,
            rotation_quaternions: self
                .source_cv2wt_quats
                .to_owned()
                .slice(ranges.to_owned()),
            view_to_world_transforms: self
                .view_to_world_transforms
                .to_owned()
                .slice(ranges),
        })
    }

    /// The camera of the view at `view` in the scene at `scene`.
    pub fn camera(
        &self,
        scene: usize,
        view: usize,
    ) -> ViewCamera<B> {
        let ranges = [scene..scene + 1, view..view + 1];
        let (image_height, image_width) = self.image_size();

        ViewCamera {
            camera_center: self
                .camera_centers
                .to_owned()
                .slice(ranges.to_owned())
                .reshape([3]),
            focals_pixels: self
                .focals_pixels
                .as_ref()
                .map(|focals| focals.to_owned().slice(ranges.to_owned()).reshape([2])),
            full_proj_transform: self
                .full_proj_transforms
                .to_owned()
                .slice(ranges.to_owned())
                .reshape([4, 4]),
            image_height,
            image_width,
            world_view_transform: self
                .world_view_transforms
                .to_owned()
                .slice(ranges)
                .reshape([4, 4]),
        }
    }

    /// `[3, H, W]`
    pub fn target_image(
        &self,
        scene: usize,
        view: usize,
    ) -> Tensor<B, 3> {
        let (image_height, image_width) = self.image_size();
        self.gt_images
            .to_owned()
            .slice([scene..scene + 1, view..view + 1])
            .reshape([3, image_height, image_width])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture;
    use burn::backend::NdArray;

    #[test]
    fn conditioning_slices_input_views() {
        let batch = fixture::scene_batch::<NdArray>(2, 3, 4, 5, false);
        batch.validate().unwrap();

        let input = batch.conditioning(1, false).unwrap();
        assert_eq!(input.images.dims(), [2, 1, 3, 4, 5]);
        assert_eq!(input.view_to_world_transforms.dims(), [2, 1, 4, 4]);
        assert_eq!(input.rotation_quaternions.dims(), [2, 1, 4]);
        assert!(input.focals_pixels.is_none());

        assert_eq!(batch.supervision_views(1).unwrap(), 1..3);
    }

    #[test]
    fn conditioning_with_origin_distances() {
        let batch = fixture::scene_batch::<NdArray>(1, 4, 2, 2, true);

        let input = batch.conditioning(2, true).unwrap();
        assert_eq!(input.images.dims(), [1, 2, 4, 2, 2]);
        assert_eq!(input.focals_pixels.unwrap().dims(), [1, 2, 2]);

        let distances = input
            .images
            .slice([0..1, 0..2, 3..4])
            .into_data()
            .to_vec::<f32>()
            .unwrap();
        assert!(distances.iter().all(|&d| d == fixture::ORIGIN_DISTANCE));
    }

    #[test]
    fn conditioning_invalid() {
        let batch = fixture::scene_batch::<NdArray>(1, 2, 2, 2, false);

        let output = batch.conditioning(1, true);
        assert!(matches!(output, Err(Error::Validation(_, _))));

        let output = batch.conditioning(3, false);
        assert!(matches!(output, Err(Error::Validation(_, _))));

        let output = batch.supervision_views(2);
        assert!(matches!(output, Err(Error::Validation(_, _))));
    }

    #[test]
    fn camera_and_target() {
        let batch = fixture::scene_batch::<NdArray>(2, 3, 4, 5, true);

        let camera = batch.camera(1, 2);
        assert_eq!(camera.world_view_transform.dims(), [4, 4]);
        assert_eq!(camera.full_proj_transform.dims(), [4, 4]);
        assert_eq!(camera.camera_center.dims(), [3]);
        assert_eq!(camera.focals_pixels.unwrap().dims(), [2]);
        assert_eq!((camera.image_height, camera.image_width), (4, 5));

        let target = batch.target_image(1, 2);
        assert_eq!(target.dims(), [3, 4, 5]);
    }

    #[test]
    fn validate_mismatched_fields() {
        let mut batch = fixture::scene_batch::<NdArray>(2, 3, 4, 5, false);
        batch.camera_centers =
            Tensor::zeros([2, 2, 3], &Default::default());
        assert!(matches!(batch.validate(), Err(Error::Validation(_, _))));
    }

    #[test]
    fn validate_mismatched_trailing_dims() {
        let device = Default::default();
        let batch = fixture::scene_batch::<NdArray>(2, 3, 4, 5, true);

        let mut output = batch.to_owned();
        output.camera_centers = Tensor::zeros([2, 3, 4], &device);
        assert!(matches!(output.validate(), Err(Error::Validation(name, _)) if name.contains("camera_centers")));

        let mut output = batch.to_owned();
        output.focals_pixels = Some(Tensor::zeros([2, 3, 3], &device));
        assert!(matches!(output.validate(), Err(Error::Validation(_, _))));

        let mut output = batch.to_owned();
        output.world_view_transforms = Tensor::zeros([2, 3, 4, 3], &device);
        assert!(matches!(output.validate(), Err(Error::Validation(_, _))));

        let mut output = batch.to_owned();
        output.origin_distances = Some(Tensor::zeros([2, 3, 1, 5, 4], &device));
        assert!(matches!(output.validate(), Err(Error::Validation(_, _))));

        let mut output = batch;
        output.source_cv2wt_quats = Tensor::zeros([2, 3, 3], &device);
        assert!(matches!(output.validate(), Err(Error::Validation(_, _))));
    }
}
