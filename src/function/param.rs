//! Positional access to the float parameters of modules.
//!
//! The parameters are matched by their visiting order and shapes,
//! so the modules built separately with the same architecture line up
//! even though their parameter IDs differ.

use burn::{
    module::{Module, ModuleMapper, ModuleVisitor, ParamId},
    tensor::{backend::Backend, Tensor},
};
use std::fmt;

/// A flattened float parameter.
#[derive(Clone)]
pub struct ParamSnapshot<B: Backend> {
    pub dims: Vec<usize>,
    /// `[dims.product()]`
    pub values: Tensor<B, 1>,
}

/// Collecting the float parameters in visiting order.
pub struct ParamCollector<B: Backend> {
    pub params: Vec<ParamSnapshot<B>>,
}

/// Replacing the float parameters in visiting order.
///
/// A parameter is replaced by `combine(current, snapshot)` only if the snapshot
/// at the same position has the same shape, otherwise it is kept.
pub struct ParamReplacer<B: Backend, F> {
    combine: F,
    params: Vec<ParamSnapshot<B>>,
    pub position: usize,
    pub replaced_count: usize,
}

/// Collecting the float parameters of the module.
pub fn collect_params<B: Backend, M: Module<B>>(
    module: &M
) -> Vec<ParamSnapshot<B>> {
    let mut collector = ParamCollector { params: Vec::new() };
    module.visit(&mut collector);
    collector.params
}

/// Replacing the float parameters of the module with the snapshots.
///
/// It returns the module and the replacer for inspecting the counts.
pub fn replace_params<B: Backend, M: Module<B>, F>(
    module: M,
    params: Vec<ParamSnapshot<B>>,
    combine: F,
) -> (M, ParamReplacer<B, F>)
where
    F: FnMut(Tensor<B, 1>, Tensor<B, 1>) -> Tensor<B, 1>,
{
    let mut replacer = ParamReplacer {
        combine,
        params,
        position: 0,
        replaced_count: 0,
    };
    let module = module.map(&mut replacer);
    (module, replacer)
}

impl<B: Backend> ParamSnapshot<B> {
    #[inline]
    pub fn element_count(&self) -> usize {
        self.dims.iter().product()
    }
}

impl<B: Backend, F> ParamReplacer<B, F> {
    /// The count of parameters visited in the module.
    #[inline]
    pub fn visited_count(&self) -> usize {
        self.position
    }

    /// The count of snapshots offered.
    #[inline]
    pub fn offered_count(&self) -> usize {
        self.params.len()
    }

    /// Whether every parameter is replaced by every snapshot.
    #[inline]
    pub fn is_exact(&self) -> bool {
        self.replaced_count == self.position
            && self.position == self.params.len()
    }
}

impl<B: Backend> ModuleVisitor<B> for ParamCollector<B> {
    fn visit_float<const D: usize>(
        &mut self,
        _id: &ParamId,
        tensor: &Tensor<B, D>,
    ) {
        let dims = tensor.dims().to_vec();
        let count = dims.iter().product::<usize>();
        let values = tensor.to_owned().detach().reshape([count]);
        self.params.push(ParamSnapshot { dims, values });
    }
}

impl<B: Backend, F> ModuleMapper<B> for ParamReplacer<B, F>
where
    F: FnMut(Tensor<B, 1>, Tensor<B, 1>) -> Tensor<B, 1>,
{
    fn map_float<const D: usize>(
        &mut self,
        _id: &ParamId,
        tensor: Tensor<B, D>,
    ) -> Tensor<B, D> {
        let position = self.position;
        self.position += 1;

        let dims = tensor.dims();
        let snapshot = match self.params.get(position) {
            Some(snapshot) if snapshot.dims == dims => snapshot,
            _ => return tensor,
        };

        let is_require_grad = tensor.is_require_grad();
        let current = tensor.detach().reshape([snapshot.element_count()]);
        let value = (self.combine)(current, snapshot.values.to_owned());
        self.replaced_count += 1;

        value.reshape(dims).set_require_grad(is_require_grad)
    }
}

impl<B: Backend> fmt::Debug for ParamSnapshot<B> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct(&format!("ParamSnapshot<{}>", B::name()))
            .field("dims", &self.dims)
            .finish()
    }
}
