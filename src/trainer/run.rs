//! The whole training procedure.

pub use super::*;
pub use crate::dataset::DatasetProvider;

use std::path::PathBuf;

/// Training a predictor as a process of the job in the environment.
///
/// ## Details
///
/// 1. The process group is joined from `RANK` and `WORLD_SIZE`.
/// 2. The trainer is built in `run_dir`.
/// 3. It continues from the checkpoints, see [`Trainer::run`].
pub fn train<AB, P, R, D>(
    config: TrainerConfig,
    provider: &D,
    predictor: P,
    renderer: R,
    perceptual_loss: Option<Box<dyn PerceptualLoss<AB>>>,
    run_dir: PathBuf,
    device: AB::Device,
) -> Result<FitSummary, Error>
where
    AB: AutodiffBackend,
    P: AutodiffModule<AB> + SplatPredictor<AB>,
    P::InnerModule: SplatPredictor<AB::InnerBackend>,
    R: SplatRenderer<AB> + SplatRenderer<AB::InnerBackend>,
    D: DatasetProvider + ?Sized,
{
    let process = ProcessGroup::launch(&config.general)?;
    let context = TrainingContext {
        device,
        process,
        run_dir,
    };

    Trainer::new(config, context, predictor, renderer, perceptual_loss)?
        .run(provider)
}

impl<AB, P, R> Trainer<AB, P, R>
where
    AB: AutodiffBackend,
    P: AutodiffModule<AB> + SplatPredictor<AB>,
    P::InnerModule: SplatPredictor<AB::InnerBackend>,
    R: SplatRenderer<AB> + SplatRenderer<AB::InnerBackend>,
{
    /// Resuming, loading the datasets and then training.
    pub fn run<D: DatasetProvider + ?Sized>(
        &mut self,
        provider: &D,
    ) -> Result<FitSummary, Error> {
        self.resume()?;

        let mut loaders = SceneLoaders::from_provider(
            provider,
            &self.config,
            self.context.process,
            &self.context.device,
        )?;

        self.fit(&mut loaders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        fixture::{ToyPredictor, ToyProvider, ToyRenderer},
        trainer::tests::{config, TestBackend},
    };

    #[test]
    fn train_continues_from_latest_checkpoint() {
        let directory = tempfile::tempdir().unwrap();
        let device = Default::default();
        let mut config = config();
        config.opt.iterations = 4;

        let previous =
            ToyPredictor::<TestBackend>::new([0.2, 0.2, 0.2], 1.0, &device);
        Checkpoint::from_module(&previous, 3, 12.5, Some(0.1))
            .unwrap()
            .save(&directory.path().join(LATEST_FILE_NAME))
            .unwrap();

        let predictor =
            ToyPredictor::<TestBackend>::new([0.9, 0.9, 0.9], 1.0, &device);
        let summary = train(
            config,
            &ToyProvider::new(3, 2, 2, 2),
            predictor,
            ToyRenderer,
            None,
            directory.path().to_owned(),
            device,
        )
        .unwrap();

        assert_eq!(summary.iteration, 4);
        assert_eq!(summary.epoch_count, 1);
        assert_eq!(summary.last_statistics.unwrap().iteration, 4);
        assert_eq!(summary.best_psnr, 12.5);

        let latest =
            Checkpoint::load(&directory.path().join(LATEST_FILE_NAME)).unwrap();
        assert_eq!(latest.iteration, 4);
        assert_eq!(latest.best_psnr, 12.5);
    }

    #[test]
    fn run_from_scratch() {
        let directory = tempfile::tempdir().unwrap();
        let mut config = config();
        config.opt.iterations = 2;
        let mut trainer = crate::trainer::tests::trainer(
            config,
            directory.path(),
            ProcessGroup::local(),
        );

        let summary = trainer.run(&ToyProvider::new(3, 2, 2, 2)).unwrap();
        assert_eq!(summary.iteration, 2);
        // The validation on iteration 1 sets the best PSNR.
        assert!(summary.best_psnr > 0.0);
        assert!(directory.path().join(BEST_FILE_NAME).is_file());
    }
}
