//! Datasets of multi-view scenes.
//!
//! The concrete datasets live outside of this crate.
//! They hand out [`SceneItem`]s on the host, which the [`SceneLoader`]
//! gathers into [`SceneBatch`]es on the device.

pub mod item;
pub mod loader;

pub use crate::{
    batch::SceneBatch,
    config::{DataConfig, TrainerConfig},
    distributed::ProcessGroup,
    error::Error,
};
pub use burn::tensor::{backend::Backend, TensorData};
pub use item::*;
pub use loader::*;

use std::{fmt, sync::Arc};

/// A random-access dataset of scenes.
pub trait SceneDataset: Send + Sync {
    /// The count of scenes.
    fn len(&self) -> usize;

    /// Loading the scene at `index`.
    fn get(
        &self,
        index: usize,
    ) -> Result<SceneItem, Error>;

    #[inline]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The split of a dataset.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum DatasetSplit {
    /// Training
    Train,
    /// Validation
    Val,
    /// Visualization
    Vis,
}

/// A source of datasets for every split.
pub trait DatasetProvider {
    fn dataset(
        &self,
        split: DatasetSplit,
        config: &DataConfig,
    ) -> Result<Arc<dyn SceneDataset>, Error>;
}

impl fmt::Display for DatasetSplit {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(match self {
            Self::Train => "train",
            Self::Val => "val",
            Self::Vis => "vis",
        })
    }
}
