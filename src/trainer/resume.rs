//! Resuming from the checkpoints.

pub use super::*;

use std::path::Path;

/// Where the trainer resumed from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ResumeSource {
    /// The latest checkpoint in the run directory.
    Latest,
    /// The latest checkpoint of a pretrained run.
    Pretrained,
    /// Nothing.
    Fresh,
    /// The process is not the coordinating one.
    Skipped,
}

impl<AB, P, R> Trainer<AB, P, R>
where
    AB: AutodiffBackend,
    P: AutodiffModule<AB> + SplatPredictor<AB>,
    R: SplatRenderer<AB>,
{
    /// Resuming the training state on the coordinating process.
    ///
    /// ## Details
    ///
    /// 1. If the run directory has the latest checkpoint, the parameters,
    ///    the iteration and the best PSNR are restored.
    /// 2. Otherwise, if `opt.pretrained_ckpt` is set, the parameters and
    ///    the best PSNR are restored from its latest checkpoint.
    /// 3. Otherwise, the best PSNR is reset to `0.0`.
    ///
    /// Mismatched parameters keep their values.
    /// The EMA shadow restarts from the restored predictor.
    pub fn resume(&mut self) -> Result<ResumeSource, Error> {
        if !self.context.process.is_global_zero() {
            return Ok(ResumeSource::Skipped);
        }

        let path_latest = self.context.run_dir.join(LATEST_FILE_NAME);
        let source = if path_latest.is_file() {
            log::info!(
                target: "gausplat::feedforward::trainer::resume",
                "Loading an existing model from {path_latest:?}",
            );
            let checkpoint = self.restore(&path_latest)?;
            self.iteration = checkpoint.iteration;
            self.best_psnr = checkpoint.best_psnr;
            ResumeSource::Latest
        } else if let Some(directory) = self.config.opt.pretrained_ckpt.to_owned()
        {
            let path = Path::new(&directory).join(LATEST_FILE_NAME);
            log::info!(
                target: "gausplat::feedforward::trainer::resume",
                "Loading a pretrained model from {path:?}",
            );
            let checkpoint = self.restore(&path)?;
            self.best_psnr = checkpoint.best_psnr;
            ResumeSource::Pretrained
        } else {
            self.best_psnr = 0.0;
            ResumeSource::Fresh
        };

        if let Some(ema) = &mut self.ema {
            *ema = ModelEma::new(&self.predictor, self.config.opt.ema.to_owned());
        }

        log::info!(
            target: "gausplat::feedforward::trainer::resume",
            "Resumed ({source:?}) on iteration {} with the best PSNR {:.4}",
            self.iteration,
            self.best_psnr,
        );

        Ok(source)
    }

    fn restore(
        &mut self,
        path: &Path,
    ) -> Result<Checkpoint, Error> {
        let checkpoint = Checkpoint::load(path)?;
        let (predictor, _) =
            checkpoint.restore(self.predictor.to_owned(), &self.context.device);
        self.predictor = predictor;
        Ok(checkpoint)
    }
}
