//! Visualization of the splats and the rendered views.

pub use crate::{error::Error, render::RenderedViews, scene::GaussianSplats};
pub use burn::tensor::{backend::Backend, Tensor};

use image::{GrayImage, RgbImage};
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// A writer of PNG images into a directory.
#[derive(Clone, Debug)]
pub struct Visualizer {
    directory: PathBuf,
}

enum HostImage {
    Gray(GrayImage),
    Rgb(RgbImage),
}

impl Visualizer {
    pub fn new(directory: PathBuf) -> Result<Self, Error> {
        fs::create_dir_all(&directory)?;
        Ok(Self { directory })
    }

    #[inline]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Writing the property maps of the first scene.
    ///
    /// ## Details
    ///
    /// The first `H * W` splats are laid out as an image in row-major order.
    /// If there are fewer splats than pixels, the remaining pixels are black.
    /// Opacities and colors are clamped to `[0, 1]`, while scalings and
    /// positions are normalized to `[0, 1]` per channel.
    ///
    /// ## Outputs
    ///
    /// `opacity`, `rgb`, `scale` and `xyz` maps, named as `<map>-<iteration>.png`.
    /// Nothing is written for an empty scene.
    pub fn write_splat_maps<B: Backend>(
        &self,
        splats: &GaussianSplats<B>,
        image_size: (usize, usize),
        iteration: u64,
    ) -> Result<Vec<PathBuf>, Error> {
        let (image_height, image_width) = image_size;
        let pixel_count = image_height * image_width;
        if splats.scene_count() == 0 || splats.point_count() == 0 {
            return Ok(vec![]);
        }

        let scene = splats.scene(0);
        let point_count = scene.point_count();
        if point_count < pixel_count {
            log::warn!(
                target: "gausplat::feedforward::visualize",
                "Only {point_count} splats for {pixel_count} pixels of the maps at iteration {iteration}",
            );
        }

        let shown_count = point_count.min(pixel_count);
        let select =
            |tensor: Tensor<B, 2>| to_host(tensor.slice([0..shown_count]));
        let mut opacities = select(scene.opacities)?;
        let mut colors_rgb = select(scene.colors_rgb)?;
        let mut scalings = select(scene.scalings)?;
        let mut positions = select(scene.positions)?;
        normalize_channels(&mut scalings, 3);
        normalize_channels(&mut positions, 3);

        opacities.resize(pixel_count, 0.0);
        [&mut colors_rgb, &mut scalings, &mut positions]
            .into_iter()
            .for_each(|values| values.resize(pixel_count * 3, 0.0));

        let (width, height) = (image_width as u32, image_height as u32);
        let images = [
            ("opacity", gray(width, height, &opacities)?),
            ("rgb", rgb(width, height, &colors_rgb)?),
            ("scale", rgb(width, height, &scalings)?),
            ("xyz", rgb(width, height, &positions)?),
        ];

        self.write(images.into_iter().map(|(name, image)| {
            (format!("{name}-{iteration:06}.png"), image)
        }))
    }

    /// Writing each rendered view beside its target.
    ///
    /// The outputs are named as `render-<iteration>-<view>.png`.
    pub fn write_views<B: Backend>(
        &self,
        views: &RenderedViews<B>,
        iteration: u64,
    ) -> Result<Vec<PathBuf>, Error> {
        let [view_count, _, image_height, image_width] = views.rendered.dims();
        if view_count == 0 {
            return Ok(vec![]);
        }

        // [N, H, W * 2, 3]
        let pairs = Tensor::cat(
            vec![
                views.rendered.to_owned().permute([0, 2, 3, 1]),
                views.target.to_owned().permute([0, 2, 3, 1]),
            ],
            2,
        );
        let values = to_host(pairs)?;

        let (width, height) = ((image_width * 2) as u32, image_height as u32);
        let images = values
            .chunks_exact(values.len() / view_count)
            .take(view_count)
            .enumerate()
            .map(|(index, values)| {
                Ok((
                    format!("render-{iteration:06}-{index}.png"),
                    rgb(width, height, values)?,
                ))
            })
            .collect::<Result<Vec<_>, Error>>()?;

        self.write(images.into_iter())
    }

    fn write(
        &self,
        images: impl Iterator<Item = (String, HostImage)>,
    ) -> Result<Vec<PathBuf>, Error> {
        let paths = images
            .map(|(name, image)| (self.directory.join(name), image))
            .collect::<Vec<_>>()
            .into_par_iter()
            .map(|(path, image)| {
                match image {
                    HostImage::Gray(image) => image.save(&path)?,
                    HostImage::Rgb(image) => image.save(&path)?,
                }
                Ok(path)
            })
            .collect::<Result<Vec<_>, Error>>()?;

        #[cfg(all(debug_assertions, not(test)))]
        log::debug!(
            target: "gausplat::feedforward::visualize",
            "write > {} images to {:?}",
            paths.len(),
            self.directory,
        );

        Ok(paths)
    }
}

fn to_host<B: Backend, const D: usize>(
    tensor: Tensor<B, D>
) -> Result<Vec<f32>, Error> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(Error::TensorData)
}

/// Min-max normalization of interleaved channels.
fn normalize_channels(
    values: &mut [f32],
    channel_count: usize,
) {
    (0..channel_count).for_each(|channel| {
        let (min, max) = values
            .iter()
            .skip(channel)
            .step_by(channel_count)
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(min, max), &value| {
                (min.min(value), max.max(value))
            });
        let range = max - min;

        values
            .iter_mut()
            .skip(channel)
            .step_by(channel_count)
            .for_each(|value| {
                *value = if range > 0.0 { (*value - min) / range } else { 0.0 };
            });
    });
}

#[inline]
fn quantize(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn gray(
    width: u32,
    height: u32,
    values: &[f32],
) -> Result<HostImage, Error> {
    let bytes = values.iter().copied().map(quantize).collect();
    GrayImage::from_raw(width, height, bytes)
        .map(HostImage::Gray)
        .ok_or_else(|| image_size_error(width, height, values.len()))
}

fn rgb(
    width: u32,
    height: u32,
    values: &[f32],
) -> Result<HostImage, Error> {
    let bytes = values.iter().copied().map(quantize).collect();
    RgbImage::from_raw(width, height, bytes)
        .map(HostImage::Rgb)
        .ok_or_else(|| image_size_error(width, height, values.len()))
}

fn image_size_error(
    width: u32,
    height: u32,
    value_count: usize,
) -> Error {
    Error::Validation(
        format!("The value count of the {width}x{height} image ({value_count})"),
        "matched to the size".into(),
    )
}
