//! The training loop.

pub use super::*;

/// The outcome of [`Trainer::fit`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FitSummary {
    pub best_psnr: f64,
    pub epoch_count: u64,
    pub iteration: u64,
    pub last_statistics: Option<StepStatistics>,
}

impl<AB, P, R> Trainer<AB, P, R>
where
    AB: AutodiffBackend,
    P: AutodiffModule<AB> + SplatPredictor<AB>,
    P::InnerModule: SplatPredictor<AB::InnerBackend>,
    R: SplatRenderer<AB> + SplatRenderer<AB::InnerBackend>,
{
    /// Training until `opt.iterations` iterations are finished.
    ///
    /// ## Details
    ///
    /// Each epoch reshuffles the training split by its number.
    /// After every iteration, the coordinating process does the periodic
    /// tracking, visualization, validation and checkpointing.
    /// The latest checkpoint is also saved when the training ends.
    ///
    /// The first error stops the training, including a non-finite loss.
    pub fn fit(
        &mut self,
        loaders: &mut SceneLoaders<AB>,
    ) -> Result<FitSummary, Error> {
        let iterations = self.config.opt.iterations;
        if self.iteration < iterations && loaders.train.is_empty() {
            return Err(Error::Dataset(
                "The training split has no batch for this process".into(),
            ));
        }

        log::info!(
            target: "gausplat::feedforward::trainer::fit",
            "Beginning training from iteration {} to {iterations}",
            self.iteration,
        );

        let mut epoch = 0;
        let mut last_statistics = None;

        while self.iteration < iterations {
            loaders.train.set_epoch(epoch);
            epoch += 1;

            for batch in loaders.train.batches() {
                let output = self.step(&batch?)?;
                self.after_step(&output, &loaders.val, &loaders.vis)?;
                last_statistics = Some(output.statistics);

                if self.iteration >= iterations {
                    break;
                }
            }
        }

        let loss = last_statistics.map(|statistics: StepStatistics| statistics.loss);
        self.context
            .process
            .on_global_zero(|| self.save_checkpoint(LATEST_FILE_NAME, loss))
            .transpose()?;

        log::info!(
            target: "gausplat::feedforward::trainer::fit",
            "Finished training on iteration {} with the best PSNR {:.4}",
            self.iteration,
            self.best_psnr,
        );

        Ok(FitSummary {
            best_psnr: self.best_psnr,
            epoch_count: epoch,
            iteration: self.iteration,
            last_statistics,
        })
    }

    /// The periodic work after an iteration on the coordinating process.
    fn after_step(
        &mut self,
        output: &StepOutput<AB>,
        val: &SceneLoader<AB>,
        vis: &SceneLoader<AB>,
    ) -> Result<(), Error> {
        if !self.context.process.is_global_zero() {
            return Ok(());
        }

        let iteration = self.iteration;
        let logging = self.config.logging.to_owned();
        let is_due = |interval: u64| interval != 0 && iteration % interval == 0;
        let statistics = &output.statistics;

        if is_due(logging.loss_log) {
            let mut scalars = vec![
                ("training_loss", (statistics.loss + 1e-8).log10()),
                ("training_l12_loss", statistics.pixel_loss),
                ("big_gaussian_count", statistics.big_gaussian_count as f64),
                ("big_gaussian_reg_loss", statistics.big_gaussian_loss),
                ("small_gaussian_count", statistics.small_gaussian_count as f64),
                ("small_gaussian_reg_loss", statistics.small_gaussian_loss),
            ];
            if let Some(perceptual_loss) = statistics.perceptual_loss {
                scalars.push(("training_lpips_loss", perceptual_loss));
            }
            self.track(&scalars)?;
        }

        if is_due(logging.splat_map_log) {
            if let Some(visualizer) = &self.visualizer {
                visualizer.write_splat_maps(
                    &output.splats,
                    output.image_size,
                    iteration,
                )?;
            }
        }

        if is_due(logging.render_log) {
            self.visualize_views(vis)?;
        }

        if is_due(logging.val_log) || iteration == 1 {
            let psnr = self.evaluate(val)?;
            self.track(&[("PSNR_novel", psnr)])?;

            if psnr > self.best_psnr {
                self.best_psnr = psnr;
                self.save_checkpoint(BEST_FILE_NAME, Some(statistics.loss))?;
            }
        }

        if is_due(logging.ckpt_iterations) {
            self.save_checkpoint(LATEST_FILE_NAME, Some(statistics.loss))?;
        }

        Ok(())
    }

    fn track(
        &mut self,
        scalars: &[(&str, f64)],
    ) -> Result<(), Error> {
        let iteration = self.iteration;
        match &mut self.tracker {
            Some(tracker) => tracker.log(iteration, scalars),
            None => Ok(()),
        }
    }
}
