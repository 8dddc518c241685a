//! Training configuration.
//!
//! The configuration is resolved once per run from a JSON file and
//! `section.key=value` overrides, and stays immutable during training.

pub mod category;

pub use crate::{error::Error, loss::PixelLossKind};
pub use burn::{config::Config, LearningRate};
pub use category::*;

use crate::loss::LossWeights;
use serde_json::Value as JsonValue;
use std::{fs, path::Path};

#[derive(Config, Debug)]
pub struct TrainerConfig {
    pub general: GeneralConfig,
    pub data: DataConfig,
    pub model: ModelConfig,
    pub opt: OptimizationConfig,
    pub logging: LoggingConfig,
}

#[derive(Config, Copy, Debug)]
pub struct GeneralConfig {
    #[config(default = false)]
    pub mixed_precision: bool,

    #[config(default = 1)]
    pub num_devices: usize,

    /// It seeds the shuffling of the training data.
    #[config(default = 0)]
    pub random_seed: u64,
}

#[derive(Config, Copy, Debug)]
pub struct DataConfig {
    #[config(default = "DataCategory::Cars")]
    pub category: DataCategory,

    /// The count of conditioning views at the front of each scene.
    #[config(default = 1)]
    pub input_images: usize,

    /// The side length of the square images in every split.
    #[config(default = 128)]
    pub training_resolution: u32,

    #[config(default = true)]
    pub white_background: bool,
}

#[derive(Config, Copy, Debug)]
pub struct ModelConfig {
    #[config(default = true)]
    pub network_with_offset: bool,

    #[config(default = false)]
    pub network_without_offset: bool,
}

#[derive(Config, Debug)]
pub struct OptimizationConfig {
    #[config(default = "5e-5")]
    pub base_lr: LearningRate,

    #[config(default = 8)]
    pub batch_size: usize,

    #[config(default = "[0.9, 0.999]")]
    pub betas: [f32; 2],

    pub ema: EmaConfig,

    #[config(default = 800_001)]
    pub iterations: u64,

    /// It ranges from `0.0` to `1.0`.
    #[config(default = 0.0)]
    pub lambda_lpips: f64,

    #[config(default = "PixelLossKind::L2")]
    pub loss: PixelLossKind,

    /// The directory containing `model_latest.safetensors` to start from.
    pub pretrained_ckpt: Option<String>,
}

#[derive(Config, Copy, Debug)]
pub struct EmaConfig {
    #[config(default = "0.9999")]
    pub beta: f64,

    #[config(default = true)]
    pub enabled: bool,

    #[config(default = 100)]
    pub update_after_step: u64,

    #[config(default = 10)]
    pub update_every: u64,
}

/// The intervals are in iterations. Zero disables the event.
#[derive(Config, Debug)]
pub struct LoggingConfig {
    #[config(default = 1000)]
    pub ckpt_iterations: u64,

    #[config(default = 10)]
    pub loss_log: u64,

    /// The project name of the experiment tracking.
    #[config(default = "String::from(\"gs_pred\")")]
    pub project: String,

    #[config(default = 10000)]
    pub render_log: u64,

    #[config(default = 100)]
    pub splat_map_log: u64,

    #[config(default = 10000)]
    pub val_log: u64,
}

impl TrainerConfig {
    /// Resolving the configuration from an optional JSON file and overrides.
    ///
    /// ## Details
    ///
    /// * The file may omit any key, the defaults fill the rest.
    /// * Each override looks like `opt.lambda_lpips=0.5`.
    ///   The value is parsed as JSON and falls back to a string.
    /// * Overriding an unknown key is an error.
    pub fn resolve<S: AsRef<str>>(
        file: Option<&Path>,
        overrides: &[S],
    ) -> Result<Self, Error> {
        let mut value = serde_json::to_value(Self::default())?;

        if let Some(file) = file {
            let source = fs::read_to_string(file)?;
            merge_json(&mut value, serde_json::from_str(&source)?);
        }
        for entry in overrides {
            apply_override(&mut value, entry.as_ref())?;
        }

        let config = serde_json::from_value::<Self>(value)?;
        config.validate()?;

        #[cfg(all(debug_assertions, not(test)))]
        log::debug!(target: "gausplat::feedforward::config", "resolve");

        Ok(config)
    }

    /// Checking the value ranges.
    pub fn validate(&self) -> Result<(), Error> {
        let opt = &self.opt;

        if !(0.0..=1.0).contains(&opt.lambda_lpips) {
            return Err(Error::Validation(
                format!("opt.lambda_lpips ({})", opt.lambda_lpips),
                "in the range of 0.0 to 1.0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&opt.ema.beta) {
            return Err(Error::Validation(
                format!("opt.ema.beta ({})", opt.ema.beta),
                "in the range of 0.0 to 1.0".into(),
            ));
        }
        if opt.ema.update_every == 0 {
            return Err(Error::Validation(
                "opt.ema.update_every".into(),
                "positive".into(),
            ));
        }
        if opt.batch_size == 0 {
            return Err(Error::Validation(
                "opt.batch_size".into(),
                "positive".into(),
            ));
        }
        if self.data.input_images == 0 {
            return Err(Error::Validation(
                "data.input_images".into(),
                "positive".into(),
            ));
        }
        if self.data.training_resolution == 0 {
            return Err(Error::Validation(
                "data.training_resolution".into(),
                "positive".into(),
            ));
        }
        if self.general.num_devices == 0 {
            return Err(Error::Validation(
                "general.num_devices".into(),
                "positive".into(),
            ));
        }
        if !self.model.network_with_offset && !self.model.network_without_offset
        {
            return Err(Error::Validation(
                "model.network_with_offset or model.network_without_offset"
                    .into(),
                "enabled".into(),
            ));
        }

        Ok(())
    }

    /// The fully resolved configuration as JSON.
    #[inline]
    pub fn to_json(&self) -> Result<JsonValue, Error> {
        Ok(serde_json::to_value(self)?)
    }

    /// The RGB background color of the rendered images.
    #[inline]
    pub fn background_color(&self) -> [f32; 3] {
        if self.data.white_background {
            [1.0; 3]
        } else {
            [0.0; 3]
        }
    }
}

impl GeneralConfig {
    /// The precision label of the run.
    #[inline]
    pub fn precision(&self) -> &'static str {
        if self.mixed_precision {
            "16-mixed"
        } else {
            "32-true"
        }
    }
}

impl OptimizationConfig {
    /// `lambda_l12 = 1 - lambda_lpips`
    #[inline]
    pub fn loss_weights(&self) -> LossWeights {
        LossWeights::from_perceptual(self.lambda_lpips)
    }
}

impl Default for TrainerConfig {
    #[inline]
    fn default() -> Self {
        Self::new(
            GeneralConfig::new(),
            DataConfig::new(),
            ModelConfig::new(),
            OptimizationConfig::new(EmaConfig::new()),
            LoggingConfig::new(),
        )
    }
}

fn merge_json(
    target: &mut JsonValue,
    source: JsonValue,
) {
    match (target, source) {
        (JsonValue::Object(target), JsonValue::Object(source)) => {
            for (key, source) in source {
                match target.get_mut(&key) {
                    Some(target) => merge_json(target, source),
                    None => {
                        target.insert(key, source);
                    },
                }
            }
        },
        (target, source) => *target = source,
    }
}

fn apply_override(
    target: &mut JsonValue,
    entry: &str,
) -> Result<(), Error> {
    let (path, raw) = entry.split_once('=').ok_or_else(|| {
        Error::Config(format!("The override \"{entry}\" has no \"=\""))
    })?;
    let value = serde_json::from_str(raw.trim())
        .unwrap_or_else(|_| JsonValue::String(raw.trim().to_owned()));

    let mut keys = path.trim().split('.').peekable();
    let mut node = target;
    while let Some(key) = keys.next() {
        let object = node.as_object_mut().ok_or_else(|| {
            Error::Config(format!("The override key \"{path}\" is too deep"))
        })?;
        let child = object.get_mut(key).ok_or_else(|| {
            Error::Config(format!("The override key \"{path}\" is unknown"))
        })?;
        if keys.peek().is_none() {
            *child = value;
            return Ok(());
        }
        node = child;
    }

    Err(Error::Config(format!("The override key \"{path}\" is empty")))
}
