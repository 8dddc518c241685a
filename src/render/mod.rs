//! Splat rendering.

pub use crate::{
    batch::{SceneBatch, ViewCamera},
    error::Error,
    scene::{GaussianSplats, SplatScene},
};
pub use burn::tensor::{backend::Backend, Tensor};

use std::fmt;

/// A differentiable rasterizer of Gaussian splats.
///
/// The rasterizer lives outside of this crate.
pub trait SplatRenderer<B: Backend>: fmt::Debug {
    /// Rendering the scene under the camera over the background.
    ///
    /// ## Shapes
    ///
    /// * `background` - `[3]`
    /// * output - `[3, H, W]`, where `H` and `W` come from the camera
    fn render(
        &self,
        scene: &SplatScene<B>,
        camera: &ViewCamera<B>,
        background: Tensor<B, 1>,
    ) -> Result<Tensor<B, 3>, Error>;
}

/// The rendered images paired with their targets.
#[derive(Clone)]
pub struct RenderedViews<B: Backend> {
    /// `[N, 3, H, W]`
    pub rendered: Tensor<B, 4>,
    /// `[N, 3, H, W]`
    pub target: Tensor<B, 4>,
}

impl<B: Backend> RenderedViews<B> {
    /// Rendering every supervision view of every scene.
    ///
    /// The splats of a scene are selected once and reused for all its views.
    /// The views are ordered by scene, then by view.
    pub fn render<R: SplatRenderer<B> + ?Sized>(
        renderer: &R,
        splats: &GaussianSplats<B>,
        batch: &SceneBatch<B>,
        input_images: usize,
        background: Tensor<B, 1>,
    ) -> Result<Self, Error> {
        let scene_count = batch.scene_count();
        if splats.scene_count() != scene_count {
            return Err(Error::Validation(
                format!("The scene count of splats ({})", splats.scene_count()),
                format!("{scene_count}"),
            ));
        }

        let views = batch.supervision_views(input_images)?;
        let capacity = scene_count * views.len();
        let mut rendered = Vec::with_capacity(capacity);
        let mut target = Vec::with_capacity(capacity);

        for (scene_index, scene) in splats.scenes().enumerate() {
            for view_index in views.to_owned() {
                let camera = batch.camera(scene_index, view_index);
                let image =
                    renderer.render(&scene, &camera, background.to_owned())?;
                let target_image = batch.target_image(scene_index, view_index);
                if image.dims() != target_image.dims() {
                    return Err(Error::Validation(
                        format!("The shape of rendered image ({:?})", image.dims()),
                        format!("{:?}", target_image.dims()),
                    ));
                }
                rendered.push(image);
                target.push(target_image);
            }
        }

        Ok(Self {
            rendered: Tensor::stack(rendered, 0),
            target: Tensor::stack(target, 0),
        })
    }

    /// `N`
    #[inline]
    pub fn view_count(&self) -> usize {
        self.rendered.dims()[0]
    }
}

impl<B: Backend> fmt::Debug for RenderedViews<B> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct(&format!("RenderedViews<{}>", B::name()))
            .field("rendered.dims()", &self.rendered.dims())
            .field("target.dims()", &self.target.dims())
            .finish()
    }
}
