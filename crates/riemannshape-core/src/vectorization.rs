//! Batch-shape resolution and the batch-merge / delegate / batch-split helper.
//!
//! Every contract operation accepts arrays whose trailing axes equal the
//! manifold's point shape and whose leading axes, possibly none, form a
//! batch. Arguments are broadcast against each other before the batch
//! shape is read off.
//!
//! Composite manifolds fold extra per-point axes (the copy axis of an n-fold
//! product) into the batch so that the base manifold is called exactly once
//! on a flat `[n, *base_shape]` array:
//!
//! ```text
//! [*batch, *group, *base]  --merge-->  [prod(batch) * prod(group), *base]
//!                          --delegate-->  [n, *trailing]
//!                          --split-->  [*batch, *group, *trailing]
//! ```

use crate::error::{ManifoldError, Result};
use crate::types::{Tensor, TensorView};
use ndarray::{ArrayD, ArrayViewD, Axis, ErrorKind, IxDyn, ShapeError};

fn incompatible() -> ManifoldError {
    ShapeError::from_kind(ErrorKind::IncompatibleShape).into()
}

fn shape_len(shape: &[usize]) -> usize {
    shape.iter().product()
}

/// Broadcasts two shapes (right-aligned, size-1 axes stretch).
pub fn broadcast_shapes(a: &[usize], b: &[usize]) -> Result<Vec<usize>> {
    let ndim = a.len().max(b.len());
    let pad_a = ndim - a.len();
    let pad_b = ndim - b.len();

    (0..ndim)
        .map(|i| {
            let da = if i < pad_a { 1 } else { a[i - pad_a] };
            let db = if i < pad_b { 1 } else { b[i - pad_b] };
            match (da, db) {
                _ if da == db => Ok(da),
                (1, _) => Ok(db),
                (_, 1) => Ok(da),
                _ => Err(incompatible()),
            }
        })
        .collect()
}

/// Broadcasts every array to their common shape, returning owned
/// standard-layout copies.
pub fn broadcast_arrays(arrays: &[TensorView<'_>]) -> Result<Vec<Tensor>> {
    let mut shape: Vec<usize> = Vec::new();
    for array in arrays {
        shape = broadcast_shapes(&shape, array.shape())?;
    }
    arrays
        .iter()
        .map(|array| {
            array
                .broadcast(IxDyn(&shape))
                .map(|view| view.as_standard_layout().into_owned())
                .ok_or_else(incompatible)
        })
        .collect()
}

/// Returns the leading batch shape shared by `arrays` for a point shape.
///
/// Each array must carry at least `point_shape.len()` axes and its trailing
/// axes must equal `point_shape`; leading axes are broadcast together. An
/// empty result denotes a single unbatched point.
pub fn get_batch_shape(point_shape: &[usize], arrays: &[TensorView<'_>]) -> Result<Vec<usize>> {
    let point_ndim = point_shape.len();
    let mut batch_shape: Vec<usize> = Vec::new();

    for array in arrays {
        let shape = array.shape();
        if shape.len() < point_ndim || &shape[shape.len() - point_ndim..] != point_shape {
            return Err(ManifoldError::dimension_mismatch(
                format!("[..., {}]", join(point_shape)),
                format!("[{}]", join(shape)),
            ));
        }
        batch_shape = broadcast_shapes(&batch_shape, &shape[..shape.len() - point_ndim])?;
    }

    Ok(batch_shape)
}

fn join(shape: &[usize]) -> String {
    shape
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Elementwise `|a - b| <= atol + rtol * |b|` after broadcasting. Shape
/// incompatibility yields `false`.
pub fn allclose(a: &TensorView<'_>, b: &TensorView<'_>, rtol: f64, atol: f64) -> bool {
    match broadcast_arrays(&[a.view(), b.view()]) {
        Ok(arrays) => arrays[0]
            .iter()
            .zip(arrays[1].iter())
            .all(|(&x, &y)| (x - y).abs() <= atol + rtol * y.abs()),
        Err(_) => false,
    }
}

/// Reduces the trailing `n_axes` axes of every batch element with `reduce`.
///
/// `[*batch, *trailing]` becomes `[*batch]`; an unbatched input yields a 0-d
/// array.
pub fn reduce_trailing<A, B, F>(array: ArrayD<A>, n_axes: usize, reduce: F) -> Result<ArrayD<B>>
where
    A: Clone,
    F: Fn(ArrayViewD<'_, A>) -> B,
{
    let ndim = array.ndim();
    if n_axes > ndim {
        return Err(incompatible());
    }
    let batch_shape = array.shape()[..ndim - n_axes].to_vec();
    let inner_len = shape_len(&array.shape()[ndim - n_axes..]);
    let rows = array
        .as_standard_layout()
        .into_owned()
        .into_shape_with_order(IxDyn(&[shape_len(&batch_shape), inner_len]))?;
    let reduced: Vec<B> = rows.outer_iter().map(|row| reduce(row)).collect();
    Ok(ArrayD::from_shape_vec(IxDyn(&batch_shape), reduced)?)
}

/// Sums `a * b` over the trailing `n_axes` axes after broadcasting.
pub fn batched_dot(a: &TensorView<'_>, b: &TensorView<'_>, n_axes: usize) -> Result<Tensor> {
    let arrays = broadcast_arrays(&[a.view(), b.view()])?;
    let product = &arrays[0] * &arrays[1];
    reduce_trailing(product, n_axes, |row| row.sum())
}

/// Stacks equally shaped tensors along a new leading axis.
pub fn stack(inner_shape: &[usize], items: &[Tensor]) -> Result<Tensor> {
    let mut shape = vec![items.len()];
    shape.extend_from_slice(inner_shape);
    let mut data = Vec::with_capacity(shape_len(&shape));
    for item in items {
        if item.shape() != inner_shape {
            return Err(incompatible());
        }
        data.extend(item.iter().copied());
    }
    Ok(ArrayD::from_shape_vec(IxDyn(&shape), data)?)
}

/// Folds batch and group axes into one leading axis and unfolds results.
///
/// A composite point has shape `[*group, *base]`; for the n-fold product the
/// group is `[n_copies]`, for per-element solvers it is empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchMerge {
    batch_shape: Vec<usize>,
    group_shape: Vec<usize>,
    base_shape: Vec<usize>,
}

impl BatchMerge {
    /// Builds a merge plan from explicit shapes.
    pub fn new(batch_shape: Vec<usize>, group_shape: Vec<usize>, base_shape: Vec<usize>) -> Self {
        Self {
            batch_shape,
            group_shape,
            base_shape,
        }
    }

    /// Resolves the batch shape of `arrays`, whose per-point shape is
    /// `[*group_shape, *base_shape]`.
    pub fn resolve(
        group_shape: &[usize],
        base_shape: &[usize],
        arrays: &[TensorView<'_>],
    ) -> Result<Self> {
        let point_shape: Vec<usize> = group_shape.iter().chain(base_shape).copied().collect();
        let batch_shape = get_batch_shape(&point_shape, arrays)?;
        Ok(Self::new(batch_shape, group_shape.to_vec(), base_shape.to_vec()))
    }

    /// Leading batch shape.
    pub fn batch_shape(&self) -> &[usize] {
        &self.batch_shape
    }

    /// Number of leading batch axes.
    pub fn batch_ndim(&self) -> usize {
        self.batch_shape.len()
    }

    /// Number of batch elements (1 for an unbatched call).
    pub fn batch_len(&self) -> usize {
        shape_len(&self.batch_shape)
    }

    /// Number of group elements per batch element.
    pub fn group_len(&self) -> usize {
        shape_len(&self.group_shape)
    }

    /// Length of the merged leading axis.
    pub fn merged_len(&self) -> usize {
        self.batch_len() * self.group_len()
    }

    /// `[*batch, *group, *base]`.
    pub fn full_shape(&self) -> Vec<usize> {
        self.batch_shape
            .iter()
            .chain(&self.group_shape)
            .chain(&self.base_shape)
            .copied()
            .collect()
    }

    /// Broadcasts `array` to the full shape and folds batch and group axes
    /// into a single leading axis: `[merged_len, *base]`.
    pub fn merge(&self, array: &TensorView<'_>) -> Result<Tensor> {
        let full = self.full_shape();
        let broadcast = array.broadcast(IxDyn(&full)).ok_or_else(incompatible)?;
        let mut merged_shape = vec![self.merged_len()];
        merged_shape.extend_from_slice(&self.base_shape);
        Ok(broadcast
            .as_standard_layout()
            .into_owned()
            .into_shape_with_order(IxDyn(&merged_shape))?)
    }

    /// Unfolds a `[merged_len, *trailing]` result into
    /// `[*batch, *group, *trailing]`.
    pub fn split<A: Clone>(&self, merged: ArrayD<A>, trailing: &[usize]) -> Result<ArrayD<A>> {
        let shape: Vec<usize> = self
            .batch_shape
            .iter()
            .chain(&self.group_shape)
            .chain(trailing)
            .copied()
            .collect();
        Ok(merged
            .as_standard_layout()
            .into_owned()
            .into_shape_with_order(IxDyn(&shape))?)
    }

    /// Unfolds a per-element `[merged_len]` result and reduces the group
    /// axes of every batch element with `reduce`, yielding `[*batch]`.
    pub fn split_reduce<A, B, F>(&self, merged: ArrayD<A>, reduce: F) -> Result<ArrayD<B>>
    where
        A: Clone,
        F: Fn(ArrayViewD<'_, A>) -> B,
    {
        let rows = merged
            .as_standard_layout()
            .into_owned()
            .into_shape_with_order(IxDyn(&[self.batch_len(), self.group_len()]))?;
        let reduced: Vec<B> = rows.outer_iter().map(|row| reduce(row)).collect();
        Ok(ArrayD::from_shape_vec(IxDyn(&self.batch_shape), reduced)?)
    }

    /// Applies `f` to every merged element `[*base]` independently and
    /// stacks the outputs, each of shape `trailing`.
    pub fn map_elements<F>(&self, merged: &[Tensor], trailing: &[usize], f: F) -> Result<Tensor>
    where
        F: Fn(&[TensorView<'_>]) -> Result<Tensor>,
    {
        let outputs = (0..self.merged_len())
            .map(|i| {
                let views: Vec<TensorView<'_>> =
                    merged.iter().map(|m| m.index_axis(Axis(0), i)).collect();
                f(&views)
            })
            .collect::<Result<Vec<_>>>()?;
        let stacked = stack(trailing, &outputs)?;
        self.split(stacked, trailing)
    }
}
