//! Batched loading of the datasets.

pub use super::*;

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use rayon::{iter::IntoParallelRefIterator, iter::ParallelIterator, ThreadPool};

/// A loader gathering the scenes of a dataset into batches.
///
/// ## Details
///
/// When shuffled, the order is determined by the seed plus the epoch.
/// When sharded, the indices are padded by repeating from the start
/// to a multiple of the world size, then each rank takes every
/// `world_size`-th index starting from its own rank.
/// The last partial batch is kept.
pub struct SceneLoader<B: Backend> {
    pub batch_size: usize,
    dataset: Arc<dyn SceneDataset>,
    device: B::Device,
    epoch: u64,
    image_size: Option<(usize, usize)>,
    pool: Option<ThreadPool>,
    process: Option<ProcessGroup>,
    seed: Option<u64>,
}

/// An iterator of the batches in the current epoch.
pub struct SceneBatches<'a, B: Backend> {
    indices: std::vec::IntoIter<Vec<usize>>,
    loader: &'a SceneLoader<B>,
}

/// The loaders of every split.
#[derive(Debug)]
pub struct SceneLoaders<B: Backend> {
    pub train: SceneLoader<B>,
    pub val: SceneLoader<B>,
    pub vis: SceneLoader<B>,
}

impl<B: Backend> SceneLoader<B> {
    /// An ordered and unsharded loader loading inline.
    pub fn new(
        dataset: Arc<dyn SceneDataset>,
        batch_size: usize,
        device: &B::Device,
    ) -> Result<Self, Error> {
        if batch_size == 0 {
            return Err(Error::Validation(
                "The batch size (0)".into(),
                "positive".into(),
            ));
        }

        Ok(Self {
            batch_size,
            dataset,
            device: device.to_owned(),
            epoch: 0,
            image_size: None,
            pool: None,
            process: None,
            seed: None,
        })
    }

    /// Shuffling the order by the seed plus the epoch.
    pub fn with_shuffle(
        mut self,
        seed: u64,
    ) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Requiring every image to be `(H, W)`.
    pub fn with_image_size(
        mut self,
        image_size: (usize, usize),
    ) -> Self {
        self.image_size = Some(image_size);
        self
    }

    /// Taking only the shard of the process.
    pub fn with_sharding(
        mut self,
        process: ProcessGroup,
    ) -> Self {
        self.process = Some(process);
        self
    }

    /// Loading the items on a pool of `worker_count` threads.
    ///
    /// The items are loaded inline if `worker_count` is zero.
    pub fn with_workers(
        mut self,
        worker_count: usize,
    ) -> Result<Self, Error> {
        self.pool = match worker_count {
            0 => None,
            count => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(count)
                    .thread_name(|index| format!("scene-loader-{index}"))
                    .build()?,
            ),
        };
        Ok(self)
    }

    /// Reseeding the shuffle for the epoch.
    #[inline]
    pub fn set_epoch(
        &mut self,
        epoch: u64,
    ) {
        self.epoch = epoch;
    }

    #[inline]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    #[inline]
    pub fn dataset(&self) -> &Arc<dyn SceneDataset> {
        &self.dataset
    }

    /// The scene indices of this process in the current epoch.
    pub fn indices(&self) -> Vec<usize> {
        let len = self.dataset.len();
        let mut indices = (0..len).collect::<Vec<_>>();

        if let Some(seed) = self.seed {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(self.epoch));
            indices.shuffle(&mut rng);
        }

        match self.process {
            Some(process) if process.world_size > 1 && len > 0 => {
                let world_size = process.world_size;
                let total = len.div_ceil(world_size) * world_size;
                indices
                    .iter()
                    .cycle()
                    .take(total)
                    .skip(process.global_rank)
                    .step_by(world_size)
                    .copied()
                    .collect()
            },
            _ => indices,
        }
    }

    /// The count of batches in an epoch.
    #[inline]
    pub fn len(&self) -> usize {
        self.indices().len().div_ceil(self.batch_size)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterating over the batches of the current epoch.
    pub fn batches(&self) -> SceneBatches<'_, B> {
        let indices = self
            .indices()
            .chunks(self.batch_size)
            .map(<[usize]>::to_vec)
            .collect::<Vec<_>>();

        SceneBatches {
            indices: indices.into_iter(),
            loader: self,
        }
    }

    /// Loading the batch of the scenes at `indices`.
    pub fn load(
        &self,
        indices: &[usize],
    ) -> Result<SceneBatch<B>, Error> {
        let dataset = &self.dataset;
        let items = match &self.pool {
            Some(pool) => pool.install(|| {
                indices
                    .par_iter()
                    .map(|&index| dataset.get(index))
                    .collect::<Result<Vec<_>, Error>>()
            })?,
            None => indices
                .iter()
                .map(|&index| dataset.get(index))
                .collect::<Result<Vec<_>, Error>>()?,
        };

        let batch = SceneBatch::from_items(items, &self.device)?;
        match self.image_size {
            Some(image_size) if batch.image_size() != image_size => {
                Err(Error::Validation(
                    format!("The image size of the batch ({:?})", batch.image_size()),
                    format!("{image_size:?}"),
                ))
            },
            _ => Ok(batch),
        }
    }
}

impl<B: Backend> Iterator for SceneBatches<'_, B> {
    type Item = Result<SceneBatch<B>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let indices = self.indices.next()?;
        Some(self.loader.load(&indices))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.indices.size_hint()
    }
}

impl<B: Backend> SceneLoaders<B> {
    /// Building the loaders of every split from the provider.
    ///
    /// - `train` is batched by the configured size, shuffled and sharded.
    /// - `val` is batched by one and ordered.
    /// - `vis` is batched by one and shuffled.
    ///
    /// The images of every split must be square in `data.training_resolution`.
    pub fn from_provider<P: DatasetProvider + ?Sized>(
        provider: &P,
        config: &TrainerConfig,
        process: ProcessGroup,
        device: &B::Device,
    ) -> Result<Self, Error> {
        let worker_count = config.data.category.loader_worker_count();
        let seed = config.general.random_seed;
        let resolution = config.data.training_resolution as usize;
        let image_size = (resolution, resolution);

        let train = SceneLoader::new(
            provider.dataset(DatasetSplit::Train, &config.data)?,
            config.opt.batch_size,
            device,
        )?
        .with_image_size(image_size)
        .with_shuffle(seed)
        .with_sharding(process)
        .with_workers(worker_count)?;
        let val = SceneLoader::new(
            provider.dataset(DatasetSplit::Val, &config.data)?,
            1,
            device,
        )?
        .with_image_size(image_size)
        .with_workers(worker_count)?;
        let vis = SceneLoader::new(
            provider.dataset(DatasetSplit::Vis, &config.data)?,
            1,
            device,
        )?
        .with_image_size(image_size)
        .with_shuffle(seed);

        log::info!(
            target: "gausplat::feedforward::dataset",
            "Loaded {} training, {} validation and {} visualization scenes ({})",
            train.dataset.len(),
            val.dataset.len(),
            vis.dataset.len(),
            config.data.category,
        );

        Ok(Self { train, val, vis })
    }
}

impl<B: Backend> fmt::Debug for SceneLoader<B> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct(&format!("SceneLoader<{}>", B::name()))
            .field("batch_size", &self.batch_size)
            .field("dataset.len()", &self.dataset.len())
            .field("epoch", &self.epoch)
            .field("image_size", &self.image_size)
            .field("has_pool", &self.pool.is_some())
            .field("process", &self.process)
            .field("seed", &self.seed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{ToyDataset, ToyProvider};
    use burn::backend::NdArray;
    use std::collections::BTreeSet;

    fn loader(
        len: usize,
        batch_size: usize,
    ) -> SceneLoader<NdArray> {
        let dataset = Arc::new(ToyDataset::new(len, 3, 2, 2));
        SceneLoader::new(dataset, batch_size, &Default::default()).unwrap()
    }

    #[test]
    fn ordered_batches_keep_last_partial() {
        let loader = loader(5, 2);
        assert_eq!(loader.len(), 3);
        assert_eq!(loader.indices(), vec![0, 1, 2, 3, 4]);

        let scene_counts = loader
            .batches()
            .map(|batch| batch.unwrap().scene_count())
            .collect::<Vec<_>>();
        assert_eq!(scene_counts, vec![2, 2, 1]);
    }

    #[test]
    fn shuffle_by_seed_and_epoch() {
        let mut loader = loader(32, 4).with_shuffle(7);
        let first = loader.indices();
        assert_eq!(loader.indices(), first);
        assert_eq!(first.iter().copied().collect::<BTreeSet<_>>().len(), 32);

        loader.set_epoch(1);
        assert_ne!(loader.indices(), first);

        loader.set_epoch(0);
        assert_eq!(loader.indices(), first);
    }

    #[test]
    fn shards_are_disjoint_and_cover() {
        let world_size = 3;
        let shards = (0..world_size)
            .map(|global_rank| {
                loader(10, 2)
                    .with_shuffle(1)
                    .with_sharding(ProcessGroup {
                        global_rank,
                        world_size,
                    })
                    .indices()
            })
            .collect::<Vec<_>>();

        shards.iter().for_each(|shard| assert_eq!(shard.len(), 4));

        let covered = shards.iter().flatten().copied().collect::<BTreeSet<_>>();
        assert_eq!(covered, (0..10).collect());

        // Only the padding at the tail repeats.
        let unpadded = shards
            .iter()
            .flat_map(|shard| shard.iter().take(3))
            .collect::<BTreeSet<_>>();
        assert_eq!(unpadded.len(), 9);
    }

    #[test]
    fn load_on_pool() {
        let loader = loader(6, 3).with_workers(2).unwrap();
        let batches = loader.batches().collect::<Result<Vec<_>, _>>().unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[1].gt_images.dims(), [3, 3, 3, 2, 2]);
    }

    #[test]
    fn load_error_propagates() {
        let dataset = Arc::new(ToyDataset::new(2, 3, 2, 2).with_failure(1));
        let loader =
            SceneLoader::<NdArray>::new(dataset, 2, &Default::default()).unwrap();

        let output = loader.batches().next().unwrap();
        assert!(matches!(output, Err(Error::Dataset(_))));
    }

    #[test]
    fn loaders_from_provider() {
        let mut config = TrainerConfig::default();
        config.opt.batch_size = 2;
        let process = ProcessGroup {
            global_rank: 1,
            world_size: 2,
        };

        let loaders = SceneLoaders::<NdArray>::from_provider(
            &ToyProvider::new(5, 3, 2, 2),
            &config,
            process,
            &Default::default(),
        )
        .unwrap();
        assert_eq!(loaders.train.indices().len(), 3);
        assert_eq!(loaders.train.len(), 2);
        assert_eq!(loaders.val.indices(), vec![0, 1, 2, 3, 4]);
        assert_eq!(loaders.vis.len(), 5);
    }

    #[test]
    fn loaders_check_training_resolution() {
        let mut config = TrainerConfig::default();
        config.data.training_resolution = 2;
        let provider = ToyProvider::new(2, 3, 2, 2);
        let process = ProcessGroup::local();
        let device = Default::default();

        let loaders =
            SceneLoaders::<NdArray>::from_provider(&provider, &config, process, &device)
                .unwrap();
        assert_eq!(loaders.val.batches().next().unwrap().unwrap().image_size(), (2, 2));

        config.data.training_resolution = 4;
        let loaders =
            SceneLoaders::<NdArray>::from_provider(&provider, &config, process, &device)
                .unwrap();
        let output = loaders.train.batches().next().unwrap();
        assert!(matches!(output, Err(Error::Validation(_, _))));
    }

    #[test]
    fn zero_batch_size() {
        let dataset = Arc::new(ToyDataset::new(2, 3, 2, 2));
        let output =
            SceneLoader::<NdArray>::new(dataset, 0, &Default::default());
        assert!(matches!(output, Err(Error::Validation(_, _))));
    }
}
