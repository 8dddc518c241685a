//! Splat property implementation.

pub use super::*;

/// Dimension operations
impl<B: Backend> GaussianSplats<B> {
    /// `S`
    #[inline]
    pub fn scene_count(&self) -> usize {
        self.positions.dims()[0]
    }

    /// `P`
    #[inline]
    pub fn point_count(&self) -> usize {
        self.positions.dims()[1]
    }

    /// Checking that every property has the shape `[S, P, C]` with its own `C`.
    pub fn validate(&self) -> Result<(), Error> {
        let scene_count = self.scene_count();
        let point_count = self.point_count();

        [
            ("colors_rgb", self.colors_rgb.dims(), 3),
            ("opacities", self.opacities.dims(), 1),
            ("positions", self.positions.dims(), 3),
            ("rotations", self.rotations.dims(), 4),
            ("scalings", self.scalings.dims(), 3),
        ]
        .into_iter()
        .try_for_each(|(name, dims, channel_count)| {
            let target = [scene_count, point_count, channel_count];
            if dims != target {
                return Err(Error::Validation(
                    format!("The shape of splat {name} ({dims:?})"),
                    format!("{target:?}"),
                ));
            }
            Ok(())
        })
    }
}

/// Scene selection
impl<B: Backend> GaussianSplats<B> {
    /// The splats of the scene at `index`.
    pub fn scene(
        &self,
        index: usize,
    ) -> SplatScene<B> {
        let select = |tensor: &Tensor<B, 3>| {
            tensor.to_owned().slice([index..index + 1]).squeeze::<2>(0)
        };

        SplatScene {
            colors_rgb: select(&self.colors_rgb),
            opacities: select(&self.opacities),
            positions: select(&self.positions),
            rotations: select(&self.rotations),
            scalings: select(&self.scalings),
        }
    }

    /// The splats of every scene in order.
    pub fn scenes(&self) -> impl Iterator<Item = SplatScene<B>> + '_ {
        (0..self.scene_count()).map(|index| self.scene(index))
    }

    /// The splats without the computation graph.
    pub fn detach(self) -> Self {
        Self {
            colors_rgb: self.colors_rgb.detach(),
            opacities: self.opacities.detach(),
            positions: self.positions.detach(),
            rotations: self.rotations.detach(),
            scalings: self.scalings.detach(),
        }
    }
}

impl<B: Backend> SplatScene<B> {
    /// `P`
    #[inline]
    pub fn point_count(&self) -> usize {
        self.positions.dims()[0]
    }
}
