//! Training checkpoints.
//!
//! A checkpoint is a safetensors file holding the float parameters of a model
//! in visiting order, named `params.NNNNN`, with the training state as metadata.

pub use crate::error::Error;
pub use burn::{
    module::Module,
    tensor::{backend::Backend, Tensor, TensorData},
};

use crate::function::{collect_params, replace_params, ParamSnapshot};
use humansize::{format_size, BINARY};
use safetensors::{tensor::TensorView, Dtype, SafeTensors};
use std::{collections::HashMap, fs, path::Path};

/// The file name of the latest checkpoint in a run directory.
pub const LATEST_FILE_NAME: &str = "model_latest.safetensors";

/// The file name of the best checkpoint in a run directory.
pub const BEST_FILE_NAME: &str = "model_best.safetensors";

const PARAM_NAME_PREFIX: &str = "params.";

/// A snapshot of the training state.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Checkpoint {
    /// The best validation PSNR so far.
    pub best_psnr: f64,
    /// The iteration when it was taken.
    pub iteration: u64,
    /// The last training loss.
    pub loss: Option<f64>,
    /// The float parameters of the model in visiting order.
    pub params: Vec<ParamRecord>,
}

/// A float parameter on the host.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParamRecord {
    pub dims: Vec<usize>,
    pub values: Vec<f32>,
}

/// The outcome of [`Checkpoint::restore`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RestoreReport {
    /// Whether every parameter is loaded from every record.
    pub is_strict: bool,
    /// The count of parameters loaded from the records.
    pub loaded_count: usize,
    /// The count of parameters in the module.
    pub param_count: usize,
    /// The count of records in the checkpoint.
    pub record_count: usize,
}

impl Checkpoint {
    /// Taking the parameters from the module.
    pub fn from_module<B: Backend, M: Module<B>>(
        module: &M,
        iteration: u64,
        best_psnr: f64,
        loss: Option<f64>,
    ) -> Result<Self, Error> {
        let params = collect_params(module)
            .into_iter()
            .map(|param| {
                let values = param
                    .values
                    .into_data()
                    .convert::<f32>()
                    .to_vec::<f32>()
                    .map_err(Error::TensorData)?;
                Ok(ParamRecord {
                    dims: param.dims,
                    values,
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;

        Ok(Self {
            best_psnr,
            iteration,
            loss,
            params,
        })
    }

    /// Restoring the parameters into the module.
    ///
    /// ## Details
    ///
    /// The records are matched to the parameters by position and shape.
    /// If any of them mismatches, the matched parameters are still loaded
    /// and the rest keep their values. It never fails.
    pub fn restore<B: Backend, M: Module<B>>(
        &self,
        module: M,
        device: &B::Device,
    ) -> (M, RestoreReport) {
        let params = self
            .params
            .iter()
            .map(|record| ParamSnapshot {
                dims: record.dims.to_owned(),
                values: Tensor::from_data(
                    TensorData::new(record.values.to_owned(), [record.values.len()]),
                    device,
                ),
            })
            .collect();

        let (module, replacer) = replace_params(module, params, |_, loaded| loaded);
        let report = RestoreReport {
            is_strict: replacer.is_exact(),
            loaded_count: replacer.replaced_count,
            param_count: replacer.visited_count(),
            record_count: replacer.offered_count(),
        };

        if !report.is_strict {
            log::warn!(
                target: "gausplat::feedforward::checkpoint",
                "Model mismatch: loaded {} of {} parameters from {} records, was this expected?",
                report.loaded_count,
                report.param_count,
                report.record_count,
            );
        }

        (module, report)
    }

    /// Encoding in the safetensors format.
    ///
    /// The values are little-endian.
    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        let mut metadata = HashMap::from([
            ("best_psnr".to_owned(), self.best_psnr.to_string()),
            ("iteration".to_owned(), self.iteration.to_string()),
        ]);
        if let Some(loss) = self.loss {
            metadata.insert("loss".to_owned(), loss.to_string());
        }

        let buffers = self
            .params
            .iter()
            .map(|record| {
                record
                    .values
                    .iter()
                    .flat_map(|value| value.to_le_bytes())
                    .collect::<Vec<u8>>()
            })
            .collect::<Vec<_>>();
        let views = self
            .params
            .iter()
            .zip(&buffers)
            .enumerate()
            .map(|(index, (record, buffer))| {
                let view =
                    TensorView::new(Dtype::F32, record.dims.to_owned(), buffer)?;
                Ok((format!("{PARAM_NAME_PREFIX}{index:05}"), view))
            })
            .collect::<Result<Vec<_>, Error>>()?;

        Ok(safetensors::serialize(
            views.iter().map(|(name, view)| (name, view)),
            &Some(metadata),
        )?)
    }

    /// Decoding from the bytes made by [`Self::encode`].
    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        let (_, header) = SafeTensors::read_metadata(bytes)?;
        let metadata = header.metadata().to_owned().unwrap_or_default();
        let tensors = SafeTensors::deserialize(bytes)?;

        let mut params = tensors
            .tensors()
            .into_iter()
            .map(|(name, view)| {
                let index = name
                    .strip_prefix(PARAM_NAME_PREFIX)
                    .and_then(|index| index.parse::<usize>().ok())
                    .ok_or_else(|| {
                        Error::Validation(
                            format!("The checkpoint tensor name ({name})"),
                            format!("\"{PARAM_NAME_PREFIX}\" with an index"),
                        )
                    })?;
                if view.dtype() != Dtype::F32 {
                    return Err(Error::Validation(
                        format!("The data type of {name} ({:?})", view.dtype()),
                        "F32".into(),
                    ));
                }

                let record = ParamRecord {
                    dims: view.shape().to_vec(),
                    values: view
                        .data()
                        .chunks_exact(4)
                        .map(|bytes| {
                            f32::from_le_bytes(bytemuck::pod_read_unaligned(bytes))
                        })
                        .collect(),
                };
                Ok((index, record))
            })
            .collect::<Result<Vec<_>, Error>>()?;
        params.sort_by_key(|(index, _)| *index);

        Ok(Self {
            best_psnr: parse_metadata(&metadata, "best_psnr")?,
            iteration: parse_metadata(&metadata, "iteration")?,
            loss: metadata
                .contains_key("loss")
                .then(|| parse_metadata(&metadata, "loss"))
                .transpose()?,
            params: params.into_iter().map(|(_, record)| record).collect(),
        })
    }

    /// Saving to the file, replacing it entirely.
    pub fn save(
        &self,
        path: &Path,
    ) -> Result<(), Error> {
        let bytes = self.encode()?;
        let path_temporary = path.with_extension("safetensors.tmp");
        fs::write(&path_temporary, &bytes)?;
        fs::rename(&path_temporary, path)?;

        log::info!(
            target: "gausplat::feedforward::checkpoint",
            "Saved the checkpoint of iteration {} to {:?} ({})",
            self.iteration,
            path,
            format_size(bytes.len(), BINARY),
        );

        Ok(())
    }

    /// Loading from the file.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let bytes = fs::read(path)?;
        let checkpoint = Self::decode(&bytes)?;

        log::info!(
            target: "gausplat::feedforward::checkpoint",
            "Loaded the checkpoint of iteration {} from {:?} ({})",
            checkpoint.iteration,
            path,
            format_size(bytes.len(), BINARY),
        );

        Ok(checkpoint)
    }
}

fn parse_metadata<T: std::str::FromStr>(
    metadata: &HashMap<String, String>,
    key: &str,
) -> Result<T, Error> {
    let value = metadata
        .get(key)
        .ok_or_else(|| Error::MissingCheckpointMetadata(key.to_owned()))?;
    value.parse::<T>().map_err(|_| {
        Error::Validation(
            format!("The checkpoint metadata {key} ({value})"),
            "a number".into(),
        )
    })
}
