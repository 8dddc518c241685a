//! Training of splat predictors.

pub mod evaluate;
pub mod fit;
pub mod resume;
pub mod run;
pub mod step;

pub use crate::{
    batch::SceneBatch,
    checkpoint::{Checkpoint, BEST_FILE_NAME, LATEST_FILE_NAME},
    config::TrainerConfig,
    dataset::{SceneLoader, SceneLoaders},
    distributed::ProcessGroup,
    ema::ModelEma,
    error::Error,
    loss::{Objective, PerceptualLoss, ScaleRegularizer},
    predictor::SplatPredictor,
    render::{RenderedViews, SplatRenderer},
    tracking::{RunTracker, Tracker},
    visualize::Visualizer,
};
pub use burn::{
    module::AutodiffModule,
    tensor::{backend::AutodiffBackend, Tensor},
};
pub use evaluate::*;
pub use fit::*;
pub use resume::*;
pub use run::*;
pub use step::*;

use burn::optim::{adaptor::OptimizerAdaptor, Adam, AdamConfig};
use std::{fmt, path::PathBuf};

pub type PredictorOptimizer<AB, P> =
    OptimizerAdaptor<Adam<<AB as AutodiffBackend>::InnerBackend>, P, AB>;

/// Where the training runs.
#[derive(Clone, Debug)]
pub struct TrainingContext<AB: AutodiffBackend> {
    pub device: AB::Device,
    pub process: ProcessGroup,
    /// The directory of checkpoints, tracking and visualizations.
    pub run_dir: PathBuf,
}

/// The trainer of a splat predictor.
///
/// Only the coordinating process does checkpoint I/O, tracking,
/// visualization and EMA updates.
pub struct Trainer<AB, P, R>
where
    AB: AutodiffBackend,
    P: AutodiffModule<AB> + SplatPredictor<AB>,
    R: SplatRenderer<AB>,
{
    /// The best validation PSNR so far.
    pub best_psnr: f64,
    pub config: TrainerConfig,
    pub context: TrainingContext<AB>,
    pub ema: Option<ModelEma<AB, P>>,
    /// The count of finished iterations.
    pub iteration: u64,
    pub objective: Objective<AB>,
    pub predictor: P,
    pub renderer: R,
    background: Tensor<AB, 1>,
    optimizer: PredictorOptimizer<AB, P>,
    tracker: Option<Box<dyn Tracker>>,
    visualizer: Option<Visualizer>,
}

impl<AB, P, R> Trainer<AB, P, R>
where
    AB: AutodiffBackend,
    P: AutodiffModule<AB> + SplatPredictor<AB>,
    R: SplatRenderer<AB>,
{
    pub const ADAM_EPSILON: f32 = 1e-15;

    /// Building the trainer around the predictor.
    ///
    /// ## Details
    ///
    /// * The scale regularizer is enabled only for the categories needing it.
    /// * The perceptual loss is required if `opt.lambda_lpips` is not zero.
    /// * On the coordinating process, the tracker and the visualizer
    ///   are initialized in `run_dir`.
    pub fn new(
        config: TrainerConfig,
        context: TrainingContext<AB>,
        predictor: P,
        renderer: R,
        perceptual_loss: Option<Box<dyn PerceptualLoss<AB>>>,
    ) -> Result<Self, Error> {
        config.validate()?;

        let regularizer = config
            .data
            .category
            .regularizes_scalings()
            .then(ScaleRegularizer::default);
        let objective = Objective::new(
            config.opt.loss,
            config.opt.loss_weights(),
            perceptual_loss,
            regularizer,
        )?;

        let [beta_1, beta_2] = config.opt.betas;
        let optimizer = AdamConfig::new()
            .with_beta_1(beta_1)
            .with_beta_2(beta_2)
            .with_epsilon(Self::ADAM_EPSILON)
            .init();

        let is_global_zero = context.process.is_global_zero();
        let ema = (config.opt.ema.enabled && is_global_zero)
            .then(|| ModelEma::new(&predictor, config.opt.ema.to_owned()));
        let background =
            Tensor::from_floats(config.background_color(), &context.device);

        let (tracker, visualizer) = context
            .process
            .on_global_zero(|| -> Result<_, Error> {
                let tracker = RunTracker::init(
                    &context.run_dir,
                    &config.logging.project,
                    &config,
                )?;
                let visualizer =
                    Visualizer::new(context.run_dir.join("visualizations"))?;
                Ok((Box::new(tracker) as Box<dyn Tracker>, visualizer))
            })
            .transpose()?
            .unzip();

        Ok(Self {
            best_psnr: 0.0,
            config,
            context,
            ema,
            iteration: 0,
            objective,
            predictor,
            renderer,
            background,
            optimizer,
            tracker,
            visualizer,
        })
    }

    /// Replacing the tracker of the coordinating process.
    pub fn with_tracker(
        mut self,
        tracker: Box<dyn Tracker>,
    ) -> Self {
        if self.context.process.is_global_zero() {
            self.tracker = Some(tracker);
        }
        self
    }

    /// The model used for validation, visualization and checkpoints.
    ///
    /// It is the EMA shadow if it is enabled.
    #[inline]
    pub fn inference_model(&self) -> &P {
        self.ema
            .as_ref()
            .map(ModelEma::model)
            .unwrap_or(&self.predictor)
    }

    /// Saving the inference model to the file named `file_name` in `run_dir`.
    pub fn save_checkpoint(
        &self,
        file_name: &str,
        loss: Option<f64>,
    ) -> Result<Checkpoint, Error> {
        let checkpoint = Checkpoint::from_module(
            self.inference_model(),
            self.iteration,
            self.best_psnr,
            loss,
        )?;
        checkpoint.save(&self.context.run_dir.join(file_name))?;
        Ok(checkpoint)
    }
}

impl<AB, P, R> fmt::Debug for Trainer<AB, P, R>
where
    AB: AutodiffBackend,
    P: AutodiffModule<AB> + SplatPredictor<AB>,
    R: SplatRenderer<AB>,
{
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct(&format!("Trainer<{}>", AB::name()))
            .field("best_psnr", &self.best_psnr)
            .field("config", &self.config)
            .field("context", &self.context)
            .field("ema", &self.ema)
            .field("iteration", &self.iteration)
            .field("objective", &self.objective)
            .field("renderer", &self.renderer)
            .field("has_tracker", &self.tracker.is_some())
            .field("visualizer", &self.visualizer)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::DataCategory,
        fixture::{ToyPredictor, ToyRenderer},
    };
    use burn::backend::{Autodiff, NdArray};

    pub(super) type TestBackend = Autodiff<NdArray>;
    pub(super) type TestTrainer =
        Trainer<TestBackend, ToyPredictor<TestBackend>, ToyRenderer>;

    pub(super) fn config() -> TrainerConfig {
        let mut config = TrainerConfig::default();
        config.data.input_images = 1;
        config.data.training_resolution = 2;
        config.opt.batch_size = 2;
        config.opt.ema.update_after_step = 1;
        config.opt.ema.update_every = 1;
        config
    }

    pub(super) fn trainer(
        config: TrainerConfig,
        run_dir: &std::path::Path,
        process: ProcessGroup,
    ) -> TestTrainer {
        let device = Default::default();
        let context = TrainingContext {
            device,
            process,
            run_dir: run_dir.to_owned(),
        };
        let predictor =
            ToyPredictor::<TestBackend>::new([0.3, 0.4, 0.6], 1.0, &device);
        Trainer::new(config, context, predictor, ToyRenderer, None).unwrap()
    }

    #[test]
    fn new_on_global_zero() {
        let directory = tempfile::tempdir().unwrap();
        let trainer = trainer(config(), directory.path(), ProcessGroup::local());

        assert!(trainer.ema.is_some());
        assert!(trainer.objective.regularizer.is_none());
        assert!(directory.path().join("tracking/latest-run").is_dir());
        assert!(directory.path().join("visualizations").is_dir());
        assert_eq!(trainer.iteration, 0);
        assert_eq!(trainer.best_psnr, 0.0);
    }

    #[test]
    fn new_on_other_ranks() {
        let directory = tempfile::tempdir().unwrap();
        let process = ProcessGroup {
            global_rank: 1,
            world_size: 2,
        };
        let mut config = config();
        config.data.category = DataCategory::Hydrants;
        let trainer = trainer(config, directory.path(), process);

        assert!(trainer.ema.is_none());
        assert!(trainer.objective.regularizer.is_some());
        assert_eq!(std::fs::read_dir(directory.path()).unwrap().count(), 0);
    }

    #[test]
    fn new_requires_perceptual_loss() {
        let directory = tempfile::tempdir().unwrap();
        let mut config = config();
        config.opt.lambda_lpips = 0.5;
        let device = Default::default();
        let context = TrainingContext::<TestBackend> {
            device,
            process: ProcessGroup::local(),
            run_dir: directory.path().to_owned(),
        };
        let predictor =
            ToyPredictor::<TestBackend>::new([0.5; 3], 1.0, &device);

        let output = Trainer::new(config, context, predictor, ToyRenderer, None);
        assert!(matches!(output, Err(Error::Validation(_, _))));
    }
}
