//! A single training iteration.

pub use super::*;
pub use crate::scene::GaussianSplats;

use burn::{optim::GradientsParams, optim::Optimizer, tensor::ElementConversion};

/// The scalars of an iteration.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StepStatistics {
    pub big_gaussian_count: usize,
    pub big_gaussian_loss: f64,
    pub iteration: u64,
    /// The weighted total loss
    pub loss: f64,
    /// The unweighted pixel loss
    pub pixel_loss: f64,
    /// The unweighted perceptual loss
    pub perceptual_loss: Option<f64>,
    pub small_gaussian_count: usize,
    pub small_gaussian_loss: f64,
}

/// The outcome of [`Trainer::step`].
#[derive(Clone, Debug)]
pub struct StepOutput<B: burn::tensor::backend::Backend> {
    /// `(H, W)` of the batch
    pub image_size: (usize, usize),
    /// The predicted splats without the computation graph
    pub splats: GaussianSplats<B>,
    pub statistics: StepStatistics,
}

impl<AB, P, R> Trainer<AB, P, R>
where
    AB: AutodiffBackend,
    P: AutodiffModule<AB> + SplatPredictor<AB>,
    R: SplatRenderer<AB>,
{
    /// Running an iteration on the batch.
    ///
    /// ## Details
    ///
    /// 1. Predicting the splats from the conditioning views.
    /// 2. Rendering every supervision view.
    /// 3. Composing the losses and the scale regularization.
    /// 4. Stepping the optimizer and the EMA.
    ///
    /// A non-finite loss is fatal, and nothing is updated in that case.
    pub fn step(
        &mut self,
        batch: &SceneBatch<AB>,
    ) -> Result<StepOutput<AB>, Error> {
        let iteration = self.iteration + 1;
        #[cfg(all(debug_assertions, not(test)))]
        let global_rank = self.context.process.global_rank;
        let input_images = self.config.data.input_images;

        #[cfg(all(debug_assertions, not(test)))]
        log::debug!(
            target: "gausplat::feedforward::trainer::step",
            "starting iteration {iteration} on process {global_rank}",
        );

        let input = batch.conditioning(
            input_images,
            self.config.data.category.has_origin_distances(),
        )?;
        let splats = self.predictor.predict(input);
        let regularization = self.objective.regularize(splats.scalings.to_owned());
        let views = RenderedViews::render(
            &self.renderer,
            &splats,
            batch,
            input_images,
            self.background.to_owned(),
        )?;
        let terms = self
            .objective
            .compose(views.rendered, views.target, regularization);

        let loss = scalar(&terms.total);
        if !loss.is_finite() {
            return Err(Error::NonFiniteLoss { iteration, loss });
        }

        let mut statistics = StepStatistics {
            iteration,
            loss,
            pixel_loss: scalar(&terms.pixel),
            perceptual_loss: terms.perceptual.as_ref().map(scalar),
            ..Default::default()
        };
        if let Some(regularization) = &terms.regularization {
            statistics.big_gaussian_count = regularization.big_count;
            statistics.big_gaussian_loss = scalar(&regularization.big_loss);
            statistics.small_gaussian_count = regularization.small_count;
            statistics.small_gaussian_loss = scalar(&regularization.small_loss);

            if regularization.big_count > 0 {
                log::info!(
                    target: "gausplat::feedforward::trainer::step",
                    "Regularizing {} big Gaussians on iteration {iteration}",
                    regularization.big_count,
                );
            }
            if regularization.small_count > 0 {
                log::info!(
                    target: "gausplat::feedforward::trainer::step",
                    "Regularizing {} small Gaussians on iteration {iteration}",
                    regularization.small_count,
                );
            }
        }

        #[cfg(all(debug_assertions, not(test)))]
        log::debug!(
            target: "gausplat::feedforward::trainer::step",
            "finished forward {iteration} on process {global_rank}",
        );

        let grads = GradientsParams::from_grads(terms.total.backward(), &self.predictor);
        self.predictor = self.optimizer.step(
            self.config.opt.base_lr,
            self.predictor.to_owned(),
            grads,
        );

        #[cfg(all(debug_assertions, not(test)))]
        log::debug!(
            target: "gausplat::feedforward::trainer::step",
            "finished opt {iteration} on process {global_rank}",
        );

        if let Some(ema) = &mut self.ema {
            ema.update(&self.predictor);
        }
        self.iteration = iteration;

        #[cfg(all(debug_assertions, not(test)))]
        log::debug!(
            target: "gausplat::feedforward::trainer::step",
            "finished iteration {iteration} on process {global_rank}",
        );

        Ok(StepOutput {
            image_size: batch.image_size(),
            splats: splats.detach(),
            statistics,
        })
    }
}

#[inline]
fn scalar<B: burn::tensor::backend::Backend>(tensor: &Tensor<B, 1>) -> f64 {
    tensor.to_owned().into_scalar().elem::<f64>()
}
