//! Shared fixtures of the tests.

use crate::{
    batch::{SceneBatch, ViewCamera},
    config::DataConfig,
    dataset::{DatasetProvider, DatasetSplit, SceneDataset, SceneItem},
    error::Error,
    predictor::{PredictorInput, SplatPredictor},
    render::SplatRenderer,
    scene::{GaussianSplats, SplatScene},
};
use burn::{
    module::{Module, Param},
    tensor::{backend::Backend, Tensor, TensorData},
};
use std::sync::Arc;

pub const ORIGIN_DISTANCE: f32 = 2.5;
pub const FOCAL_PIXELS: f32 = 100.0;

/// A predictor of uniform splats, one for each pixel of a view.
#[derive(Module, Debug)]
pub struct ToyPredictor<B: Backend> {
    /// `[3]`
    pub colors: Param<Tensor<B, 1>>,
    /// `[3]`
    pub log_scalings: Param<Tensor<B, 1>>,
}

/// A module shaped differently from [`ToyPredictor`] on its first parameter.
#[derive(Module, Debug)]
pub struct WideToyPredictor<B: Backend> {
    /// `[6]`
    pub colors: Param<Tensor<B, 1>>,
    /// `[3]`
    pub log_scalings: Param<Tensor<B, 1>>,
}

/// A predictor of a single splat per scene, sharing the parameters of [`ToyPredictor`].
#[derive(Module, Debug)]
pub struct SingleSplatPredictor<B: Backend> {
    pub inner: ToyPredictor<B>,
}

/// A renderer filling the image with the mean opaque color of the splats.
#[derive(Clone, Copy, Debug, Default)]
pub struct ToyRenderer;

/// A dataset of uniform scenes.
#[derive(Clone, Debug)]
pub struct ToyDataset {
    failure_index: Option<usize>,
    image_height: usize,
    image_width: usize,
    len: usize,
    view_count: usize,
}

#[derive(Clone, Debug)]
pub struct ToyProvider {
    dataset: ToyDataset,
}

impl<B: Backend> ToyPredictor<B> {
    pub fn new(
        colors: [f32; 3],
        scaling: f32,
        device: &B::Device,
    ) -> Self {
        Self {
            colors: Param::from_tensor(Tensor::from_floats(colors, device)),
            log_scalings: Param::from_tensor(Tensor::full(
                [3],
                scaling.ln(),
                device,
            )),
        }
    }
}

impl<B: Backend> WideToyPredictor<B> {
    pub fn new(device: &B::Device) -> Self {
        Self {
            colors: Param::from_tensor(Tensor::full([6], 0.9, device)),
            log_scalings: Param::from_tensor(Tensor::full([3], -1.0, device)),
        }
    }
}

impl<B: Backend> SplatPredictor<B> for ToyPredictor<B> {
    fn predict(
        &self,
        input: PredictorInput<B>,
    ) -> GaussianSplats<B> {
        let [scene_count, _, _, image_height, image_width] = input.images.dims();
        let point_count = image_height * image_width;
        let device = input.images.device();
        let zeros = |channel_count: usize| {
            Tensor::<B, 3>::zeros([scene_count, point_count, channel_count], &device)
        };

        GaussianSplats {
            colors_rgb: zeros(3) + self.colors.val().reshape([1, 1, 3]),
            opacities: zeros(1).add_scalar(1.0),
            positions: zeros(3),
            rotations: zeros(4)
                + Tensor::<B, 1>::from_floats([1.0, 0.0, 0.0, 0.0], &device)
                    .reshape([1, 1, 4]),
            scalings: zeros(3) + self.log_scalings.val().exp().reshape([1, 1, 3]),
        }
    }
}

impl<B: Backend> SplatPredictor<B> for SingleSplatPredictor<B> {
    fn predict(
        &self,
        input: PredictorInput<B>,
    ) -> GaussianSplats<B> {
        let splats = self.inner.predict(input);
        let scene_count = splats.scene_count();
        let first = |tensor: Tensor<B, 3>| {
            let channel_count = tensor.dims()[2];
            tensor.slice([0..scene_count, 0..1, 0..channel_count])
        };

        GaussianSplats {
            colors_rgb: first(splats.colors_rgb),
            opacities: first(splats.opacities),
            positions: first(splats.positions),
            rotations: first(splats.rotations),
            scalings: first(splats.scalings),
        }
    }
}

impl<B: Backend> SplatRenderer<B> for ToyRenderer {
    fn render(
        &self,
        scene: &SplatScene<B>,
        camera: &ViewCamera<B>,
        background: Tensor<B, 1>,
    ) -> Result<Tensor<B, 3>, Error> {
        let device = scene.colors_rgb.device();
        let alpha = scene.opacities.to_owned().mean().reshape([1, 1, 1]);
        let color = (scene.colors_rgb.to_owned() * scene.opacities.to_owned())
            .mean_dim(0)
            .reshape([3, 1, 1]);
        let background = background.reshape([3, 1, 1]);
        let canvas = Tensor::<B, 3>::zeros(
            [3, camera.image_height, camera.image_width],
            &device,
        );

        Ok(canvas + color + background * (alpha.neg().add_scalar(1.0)))
    }
}

impl ToyDataset {
    pub fn new(
        len: usize,
        view_count: usize,
        image_height: usize,
        image_width: usize,
    ) -> Self {
        Self {
            failure_index: None,
            image_height,
            image_width,
            len,
            view_count,
        }
    }

    /// Failing to load the scene at `index`.
    pub fn with_failure(
        mut self,
        index: usize,
    ) -> Self {
        self.failure_index = Some(index);
        self
    }
}

impl SceneDataset for ToyDataset {
    fn len(&self) -> usize {
        self.len
    }

    fn get(
        &self,
        index: usize,
    ) -> Result<SceneItem, Error> {
        if self.failure_index == Some(index) || index >= self.len {
            return Err(Error::Dataset(format!("Failed to load the scene {index}")));
        }

        let value = (index + 1) as f32 / (self.len + 1) as f32;
        Ok(scene_item(
            self.view_count,
            self.image_height,
            self.image_width,
            false,
            value,
        ))
    }
}

impl ToyProvider {
    pub fn new(
        len: usize,
        view_count: usize,
        image_height: usize,
        image_width: usize,
    ) -> Self {
        Self {
            dataset: ToyDataset::new(len, view_count, image_height, image_width),
        }
    }
}

impl DatasetProvider for ToyProvider {
    fn dataset(
        &self,
        _split: DatasetSplit,
        _config: &DataConfig,
    ) -> Result<Arc<dyn SceneDataset>, Error> {
        Ok(Arc::new(self.dataset.to_owned()))
    }
}

/// A scene with uniform images of `value`.
pub fn scene_item(
    view_count: usize,
    image_height: usize,
    image_width: usize,
    with_origin_distances: bool,
    value: f32,
) -> SceneItem {
    let full = |value: f32, shape: Vec<usize>| {
        let count = shape.iter().product();
        TensorData::new(vec![value; count], shape)
    };
    let [v, h, w] = [view_count, image_height, image_width];
    let quaternions = (0..v).flat_map(|_| [1.0, 0.0, 0.0, 0.0]).collect();

    SceneItem {
        camera_centers: full(0.0, vec![v, 3]),
        focals_pixels: with_origin_distances
            .then(|| full(FOCAL_PIXELS, vec![v, 2])),
        full_proj_transforms: full(0.0, vec![v, 4, 4]),
        gt_images: full(value, vec![v, 3, h, w]),
        origin_distances: with_origin_distances
            .then(|| full(ORIGIN_DISTANCE, vec![v, 1, h, w])),
        source_cv2wt_quats: TensorData::new::<f32, _>(quaternions, [v, 4]),
        view_to_world_transforms: full(0.0, vec![v, 4, 4]),
        world_view_transforms: full(0.0, vec![v, 4, 4]),
    }
}

/// A batch of uniform scenes with images of `0.5`.
pub fn scene_batch<B: Backend>(
    scene_count: usize,
    view_count: usize,
    image_height: usize,
    image_width: usize,
    with_origin_distances: bool,
) -> SceneBatch<B> {
    let items = (0..scene_count)
        .map(|_| {
            scene_item(
                view_count,
                image_height,
                image_width,
                with_origin_distances,
                0.5,
            )
        })
        .collect();

    SceneBatch::from_items(items, &Default::default()).unwrap()
}

/// Splats of `color` and `scaling` in every channel.
pub fn splats<B: Backend>(
    scene_count: usize,
    point_count: usize,
    color: f32,
    scaling: f32,
) -> GaussianSplats<B> {
    let device = Default::default();
    let full = |channel_count: usize, value: f32| {
        Tensor::<B, 3>::full([scene_count, point_count, channel_count], value, &device)
    };

    GaussianSplats {
        colors_rgb: full(3, color),
        opacities: full(1, 1.0),
        positions: full(3, 0.0),
        rotations: full(4, 0.5),
        scalings: full(3, scaling),
    }
}
