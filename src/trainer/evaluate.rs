//! Validation and visualization of the inference model.

pub use super::*;

use crate::loss::psnr;
use burn::tensor::ElementConversion;
use std::path::PathBuf;

impl<AB, P, R> Trainer<AB, P, R>
where
    AB: AutodiffBackend,
    P: AutodiffModule<AB> + SplatPredictor<AB>,
    P::InnerModule: SplatPredictor<AB::InnerBackend>,
    R: SplatRenderer<AB> + SplatRenderer<AB::InnerBackend>,
{
    /// The mean PSNR of the inference model over every rendered view
    /// of the validation batches.
    ///
    /// It runs on the inner backend and is `0.0` if there is no batch.
    pub fn evaluate(
        &self,
        loader: &SceneLoader<AB>,
    ) -> Result<f64, Error> {
        let model = self.inference_model().valid();
        let mut psnr_sum = 0.0;
        let mut view_count = 0;

        for batch in loader.batches() {
            let views = self.render_novel_views(&model, &batch?.inner())?;
            view_count += views.view_count();
            psnr_sum += psnr(views.rendered, views.target)
                .sum()
                .into_scalar()
                .elem::<f64>();
        }

        let psnr_mean = if view_count == 0 {
            0.0
        } else {
            psnr_sum / view_count as f64
        };

        log::info!(
            target: "gausplat::feedforward::trainer::evaluate",
            "PSNR_novel is {psnr_mean:.4} over {view_count} views on iteration {}",
            self.iteration,
        );

        Ok(psnr_mean)
    }

    /// Writing the views of the first batch rendered by the inference model.
    pub fn visualize_views(
        &self,
        loader: &SceneLoader<AB>,
    ) -> Result<Vec<PathBuf>, Error> {
        let visualizer = match &self.visualizer {
            Some(visualizer) => visualizer,
            None => return Ok(vec![]),
        };
        let batch = match loader.batches().next() {
            Some(batch) => batch?.inner(),
            None => return Ok(vec![]),
        };

        let model = self.inference_model().valid();
        let views = self.render_novel_views(&model, &batch)?;
        visualizer.write_views(&views, self.iteration)
    }

    /// Rendering the supervision views by the valid model.
    pub fn render_novel_views(
        &self,
        model: &P::InnerModule,
        batch: &SceneBatch<AB::InnerBackend>,
    ) -> Result<RenderedViews<AB::InnerBackend>, Error> {
        let input_images = self.config.data.input_images;
        let input = batch.conditioning(
            input_images,
            self.config.data.category.has_origin_distances(),
        )?;
        let splats = model.predict(input);

        RenderedViews::render(
            &self.renderer,
            &splats,
            batch,
            input_images,
            self.background.to_owned().inner(),
        )
    }
}
