//! Data categories.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The category of the training data.
///
/// Some categories change how the batches are shaped and how the
/// predicted splats are regularized.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DataCategory {
    #[default]
    Cars,
    Chairs,
    Hydrants,
    Teddybears,
    Nmr,
    Objaverse,
}

impl DataCategory {
    /// Whether the conditioning images carry an extra per-pixel distance channel
    /// and the predictor receives the conditioning focal lengths.
    #[inline]
    pub const fn has_origin_distances(self) -> bool {
        matches!(self, Self::Hydrants | Self::Teddybears)
    }

    /// Whether degenerate splat scalings are penalized.
    #[inline]
    pub const fn regularizes_scalings(self) -> bool {
        matches!(self, Self::Hydrants | Self::Teddybears)
    }

    /// The number of threads loading the training items.
    ///
    /// `0` loads the items on the calling thread.
    #[inline]
    pub const fn loader_worker_count(self) -> usize {
        match self {
            Self::Nmr | Self::Objaverse => 12,
            _ => 0,
        }
    }
}

impl fmt::Display for DataCategory {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let name = match self {
            Self::Cars => "cars",
            Self::Chairs => "chairs",
            Self::Hydrants => "hydrants",
            Self::Teddybears => "teddybears",
            Self::Nmr => "nmr",
            Self::Objaverse => "objaverse",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn category_flags() {
        use super::*;

        assert!(DataCategory::Hydrants.has_origin_distances());
        assert!(DataCategory::Teddybears.regularizes_scalings());
        assert!(!DataCategory::Cars.has_origin_distances());
        assert!(!DataCategory::Objaverse.regularizes_scalings());

        assert_eq!(DataCategory::Nmr.loader_worker_count(), 12);
        assert_eq!(DataCategory::Objaverse.loader_worker_count(), 12);
        assert_eq!(DataCategory::Chairs.loader_worker_count(), 0);
    }

    #[test]
    fn category_serde() {
        use super::*;

        let category =
            serde_json::from_str::<DataCategory>("\"teddybears\"").unwrap();
        assert_eq!(category, DataCategory::Teddybears);
        assert_eq!(category.to_string(), "teddybears");

        let target = "\"nmr\"";
        let output = serde_json::to_string(&DataCategory::Nmr).unwrap();
        assert_eq!(output, target);
    }
}
