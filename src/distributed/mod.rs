//! Distributed process model.
//!
//! Gradient synchronization and process spawning belong to the external
//! runtime. This module only knows which process it is running in, so that
//! side effects can be restricted to the coordinating process.

pub use crate::{config::GeneralConfig, error::Error};

use std::env;

/// The position of the current process in a data-parallel job.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ProcessGroup {
    pub global_rank: usize,
    pub world_size: usize,
}

impl ProcessGroup {
    pub const RANK_VAR: &'static str = "RANK";
    pub const WORLD_SIZE_VAR: &'static str = "WORLD_SIZE";

    /// A single process job.
    #[inline]
    pub const fn local() -> Self {
        Self {
            global_rank: 0,
            world_size: 1,
        }
    }

    /// Reading the rank and the world size from the environment.
    ///
    /// The missing variables fall back to [`Self::local`].
    pub fn from_env() -> Result<Self, Error> {
        Self::from_vars(
            env::var(Self::RANK_VAR).ok().as_deref(),
            env::var(Self::WORLD_SIZE_VAR).ok().as_deref(),
        )
    }

    pub fn from_vars(
        rank: Option<&str>,
        world_size: Option<&str>,
    ) -> Result<Self, Error> {
        let parse = |name: &str, value: Option<&str>, default: usize| {
            value.map_or(Ok(default), |value| {
                value.trim().parse::<usize>().map_err(|_| {
                    Error::Validation(
                        format!("{name} ({value:?})"),
                        "an unsigned integer".into(),
                    )
                })
            })
        };

        let group = Self {
            global_rank: parse(Self::RANK_VAR, rank, 0)?,
            world_size: parse(Self::WORLD_SIZE_VAR, world_size, 1)?,
        };
        group.validate()?;

        Ok(group)
    }

    /// Joining the job described by the environment.
    pub fn launch(config: &GeneralConfig) -> Result<Self, Error> {
        let group = Self::from_env()?;

        if group.world_size != config.num_devices {
            log::warn!(
                target: "gausplat::feedforward::distributed",
                "The world size is {}, but {} devices are configured",
                group.world_size,
                config.num_devices,
            );
        }
        if group.is_global_zero() {
            log::info!(
                target: "gausplat::feedforward::distributed",
                "Launched {} process(es) with precision {}",
                group.world_size,
                config.precision(),
            );
        }

        Ok(group)
    }

    /// Whether it is the coordinating process.
    #[inline]
    pub const fn is_global_zero(&self) -> bool {
        self.global_rank == 0
    }

    /// Running `f` only on the coordinating process.
    #[inline]
    pub fn on_global_zero<T>(
        &self,
        f: impl FnOnce() -> T,
    ) -> Option<T> {
        self.is_global_zero().then(f)
    }

    fn validate(&self) -> Result<(), Error> {
        if self.world_size == 0 {
            return Err(Error::Validation(
                "world size".into(),
                "positive".into(),
            ));
        }
        if self.global_rank >= self.world_size {
            return Err(Error::Validation(
                format!("global rank ({})", self.global_rank),
                format!("less than the world size ({})", self.world_size),
            ));
        }
        Ok(())
    }
}

impl Default for ProcessGroup {
    #[inline]
    fn default() -> Self {
        Self::local()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_vars() {
        let group = ProcessGroup::from_vars(None, None).unwrap();
        assert_eq!(group, ProcessGroup::local());
        assert!(group.is_global_zero());

        let group = ProcessGroup::from_vars(Some("3"), Some(" 4 ")).unwrap();
        assert_eq!(group.global_rank, 3);
        assert_eq!(group.world_size, 4);
        assert!(!group.is_global_zero());
    }

    #[test]
    fn from_vars_invalid() {
        let output = ProcessGroup::from_vars(Some("4"), Some("4"));
        assert!(matches!(output, Err(Error::Validation(_, _))));

        let output = ProcessGroup::from_vars(Some("zero"), None);
        assert!(matches!(output, Err(Error::Validation(_, _))));

        let output = ProcessGroup::from_vars(None, Some("0"));
        assert!(matches!(output, Err(Error::Validation(_, _))));
    }

    #[test]
    fn on_global_zero() {
        let mut count = 0;
        ProcessGroup::local().on_global_zero(|| count += 1);
        ProcessGroup {
            global_rank: 1,
            world_size: 2,
        }
        .on_global_zero(|| count += 1);
        assert_eq!(count, 1);
    }
}
