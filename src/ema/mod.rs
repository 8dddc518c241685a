//! Exponential moving average of model parameters.

pub use crate::config::EmaConfig;
pub use burn::{module::Module, tensor::backend::Backend};

use crate::function::{collect_params, replace_params};
use std::{fmt, marker};

/// A shadow copy of a model, smoothed by an exponential moving average.
///
/// ## Details
///
/// The shadow follows the model exactly during the warm-up steps,
/// then the decay grows with the steps and is capped by [`EmaConfig::beta`].
#[derive(Clone)]
pub struct ModelEma<B: Backend, M: Module<B>> {
    config: EmaConfig,
    shadow: M,
    step: u64,
    __: marker::PhantomData<B>,
}

/// The effect of [`ModelEma::update`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EmaUpdate {
    /// The step is not a multiple of [`EmaConfig::update_every`].
    Skipped,
    /// The shadow copies the model.
    Copied,
    /// The shadow blends with the model by the decay.
    Blended { decay: f64 },
}

impl<B: Backend, M: Module<B>> ModelEma<B, M> {
    const DECAY_POWER: f64 = 2.0 / 3.0;

    pub fn new(
        model: &M,
        config: EmaConfig,
    ) -> Self {
        Self {
            config,
            shadow: model.to_owned().no_grad(),
            step: 0,
            __: marker::PhantomData,
        }
    }

    /// The smoothed model.
    #[inline]
    pub fn model(&self) -> &M {
        &self.shadow
    }

    /// The count of updates called.
    #[inline]
    pub fn step(&self) -> u64 {
        self.step
    }

    /// The decay used by the update at `step`.
    pub fn decay(
        &self,
        step: u64,
    ) -> f64 {
        let epoch = (step + 1).saturating_sub(self.config.update_after_step + 1);
        if epoch == 0 {
            return 0.0;
        }

        let value = 1.0 - (1.0 + epoch as f64).powf(-Self::DECAY_POWER);
        value.clamp(0.0, self.config.beta)
    }

    /// Updating the shadow with the current model.
    pub fn update(
        &mut self,
        model: &M,
    ) -> EmaUpdate {
        let step = self.step;
        self.step += 1;

        if step % self.config.update_every != 0 {
            return EmaUpdate::Skipped;
        }
        if step <= self.config.update_after_step {
            self.copy_from(model);
            return EmaUpdate::Copied;
        }

        let decay = self.decay(step);
        self.shadow = replace_params(
            self.shadow.to_owned(),
            collect_params(model),
            |shadow, current| {
                shadow.mul_scalar(decay) + current.mul_scalar(1.0 - decay)
            },
        )
        .0;

        EmaUpdate::Blended { decay }
    }

    /// Copying the model into the shadow without changing the step.
    pub fn copy_from(
        &mut self,
        model: &M,
    ) {
        self.shadow =
            replace_params(self.shadow.to_owned(), collect_params(model), |_, current| {
                current
            })
            .0;
    }
}

impl<B: Backend, M: Module<B>> fmt::Debug for ModelEma<B, M> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct(&format!("ModelEma<{}>", B::name()))
            .field("config", &self.config)
            .field("step", &self.step)
            .finish()
    }
}
