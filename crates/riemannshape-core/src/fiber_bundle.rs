//! Fiber bundles and the quotient metrics they induce.
//!
//! A fiber bundle π: E → B groups the points of a total space E into fibers,
//! the orbits of a group action. At every point the tangent space splits
//! into a vertical part (tangent to the fiber) and a horizontal part
//! (orthogonal to it under the total-space metric):
//!
//! ```text
//! v = ver(v) + hor(v),    <ver(v), hor(v)> = 0
//! ```
//!
//! Distances in the quotient B are total-space distances after moving one
//! point along its fiber so that it is as close as possible to the other
//! (alignment).

use crate::{
    config::SolverConfig,
    error::Result,
    geodesic::Geodesic,
    metric::RiemannianMetric,
    types::{BoolTensor, Tensor, TensorView},
};
use ndarray::ArrayD;
use std::fmt::Debug;

/// Outcome of aligning points to base points along their fibers.
#[derive(Debug, Clone)]
pub struct Alignment {
    /// Aligned points `[*batch, *shape]`.
    pub aligned: Tensor,
    /// Change of the point in the iteration that produced `aligned`,
    /// `[*batch]`.
    pub gap: Tensor,
    /// Largest relative vertical part `|ver(v)| / |v|` of the velocity
    /// along the sampled geodesic from the base point to `aligned`,
    /// `[*batch]`. Zero means the joining geodesic is horizontal.
    pub horizontality: Tensor,
    /// Iterations used, `[*batch]`.
    pub iterations: ArrayD<usize>,
    /// Whether `gap` fell below the threshold, `[*batch]`.
    pub converged: BoolTensor,
}

impl Alignment {
    /// True when every batch element converged.
    pub fn all_converged(&self) -> bool {
        self.converged.iter().all(|&c| c)
    }
}

/// A geodesic of the total space that is horizontal up to solver tolerance.
#[derive(Debug, Clone)]
pub struct HorizontalGeodesic<'a, M: RiemannianMetric> {
    alignment: Alignment,
    geodesic: Geodesic<'a, M>,
}

impl<'a, M: RiemannianMetric> HorizontalGeodesic<'a, M> {
    /// Joins an alignment with the geodesic to its aligned end points.
    pub fn new(alignment: Alignment, geodesic: Geodesic<'a, M>) -> Self {
        Self {
            alignment,
            geodesic,
        }
    }

    /// Evaluates the path at `times`: `[*batch, times.len(), *shape]`.
    pub fn eval(&self, times: &[f64]) -> Result<Tensor> {
        self.geodesic.eval(times)
    }

    /// Evaluates the path at a single time.
    pub fn at(&self, t: f64) -> Result<Tensor> {
        self.geodesic.at(t)
    }

    /// Aligned end points.
    pub fn end_point(&self) -> &Tensor {
        &self.alignment.aligned
    }

    /// Convergence report of the alignment.
    pub fn alignment(&self) -> &Alignment {
        &self.alignment
    }

    /// Underlying total-space geodesic.
    pub fn geodesic(&self) -> &Geodesic<'a, M> {
        &self.geodesic
    }
}

/// A total space with a group action whose orbits are the fibers.
pub trait FiberBundle: Debug + Send + Sync {
    /// Metric of the total space.
    type Metric: RiemannianMetric;

    /// The total-space metric used for the vertical/horizontal split.
    fn total_space_metric(&self) -> &Self::Metric;

    /// Vertical component of `tangent_vec` together with its coordinates in
    /// the spanning set of the vertical space.
    fn vertical_projection_with_norm(
        &self,
        tangent_vec: &TensorView<'_>,
        base_point: &TensorView<'_>,
    ) -> Result<(Tensor, Tensor)>;

    /// Vertical component of `tangent_vec`.
    fn vertical_projection(
        &self,
        tangent_vec: &TensorView<'_>,
        base_point: &TensorView<'_>,
    ) -> Result<Tensor> {
        Ok(self.vertical_projection_with_norm(tangent_vec, base_point)?.0)
    }

    /// Horizontal component `v - ver(v)` with the vertical coordinates.
    fn horizontal_projection_with_norm(
        &self,
        tangent_vec: &TensorView<'_>,
        base_point: &TensorView<'_>,
    ) -> Result<(Tensor, Tensor)> {
        let (vertical, norms) = self.vertical_projection_with_norm(tangent_vec, base_point)?;
        Ok((tangent_vec - &vertical, norms))
    }

    /// Horizontal component `v - ver(v)`.
    fn horizontal_projection(
        &self,
        tangent_vec: &TensorView<'_>,
        base_point: &TensorView<'_>,
    ) -> Result<Tensor> {
        Ok(self.horizontal_projection_with_norm(tangent_vec, base_point)?.0)
    }

    /// Tests whether the vertical component vanishes within `atol`.
    fn is_horizontal(
        &self,
        tangent_vec: &TensorView<'_>,
        base_point: &TensorView<'_>,
        atol: f64,
    ) -> Result<BoolTensor> {
        let vertical = self.vertical_projection(tangent_vec, base_point)?;
        let norms = self
            .total_space_metric()
            .norm(&vertical.view(), base_point)?;
        Ok(norms.mapv(|n| n <= atol))
    }

    /// Tests whether the horizontal component vanishes within `atol`.
    fn is_vertical(
        &self,
        tangent_vec: &TensorView<'_>,
        base_point: &TensorView<'_>,
        atol: f64,
    ) -> Result<BoolTensor> {
        let horizontal = self.horizontal_projection(tangent_vec, base_point)?;
        let norms = self
            .total_space_metric()
            .norm(&horizontal.view(), base_point)?;
        Ok(norms.mapv(|n| n <= atol))
    }

    /// Moves `point` along its fiber toward `base_point`.
    fn align(
        &self,
        point: &TensorView<'_>,
        base_point: &TensorView<'_>,
        config: &SolverConfig,
    ) -> Result<Alignment>;

    /// Horizontal geodesic from `initial_point` to the fiber of `end_point`.
    ///
    /// The path starts at `initial_point` and ends at the aligned
    /// representative of `end_point`.
    fn horizontal_geodesic(
        &self,
        initial_point: &TensorView<'_>,
        end_point: &TensorView<'_>,
        config: &SolverConfig,
    ) -> Result<HorizontalGeodesic<'_, Self::Metric>>
    where
        Self: Sized,
    {
        let alignment = self.align(end_point, initial_point, config)?;
        let geodesic = self.total_space_metric().geodesic(
            initial_point,
            Some(&alignment.aligned.view()),
            None,
        )?;
        Ok(HorizontalGeodesic::new(alignment, geodesic))
    }
}

/// Metric on the quotient space induced by a fiber bundle.
#[derive(Debug, Clone)]
pub struct QuotientMetric<B: FiberBundle> {
    bundle: B,
    config: SolverConfig,
}

impl<B: FiberBundle> QuotientMetric<B> {
    /// Builds the quotient metric with validated solver settings.
    pub fn new(bundle: B, config: SolverConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { bundle, config })
    }

    /// The underlying bundle.
    pub fn bundle(&self) -> &B {
        &self.bundle
    }

    /// Solver settings used for alignment.
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Aligns `point_b` to `point_a` with the configured settings.
    pub fn align(&self, point_a: &TensorView<'_>, point_b: &TensorView<'_>) -> Result<Alignment> {
        self.bundle.align(point_b, point_a, &self.config)
    }

    /// Squared quotient distance: total-space squared distance from
    /// `point_a` to `point_b` aligned onto `point_a`.
    pub fn squared_dist(&self, point_a: &TensorView<'_>, point_b: &TensorView<'_>) -> Result<Tensor> {
        let alignment = self.align(point_a, point_b)?;
        self.bundle
            .total_space_metric()
            .squared_dist(point_a, &alignment.aligned.view())
    }

    /// Quotient distance.
    pub fn dist(&self, point_a: &TensorView<'_>, point_b: &TensorView<'_>) -> Result<Tensor> {
        Ok(self
            .squared_dist(point_a, point_b)?
            .mapv(|sq| sq.max(0.0).sqrt()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::DefaultMetric;
    use crate::utils::test_manifolds::{MinimalTestManifold, ScaledTestMetric};
    use crate::vectorization::batched_dot;
    use approx::assert_relative_eq;
    use ndarray::{array, IxDyn};

    /// Translations along the first axis acting on the plane.
    #[derive(Debug)]
    struct FirstAxisBundle {
        metric: ScaledTestMetric,
    }

    impl FirstAxisBundle {
        fn new() -> Self {
            let equipped = MinimalTestManifold::new(2).equip().unwrap();
            Self {
                metric: equipped.into_metric(),
            }
        }
    }

    impl FiberBundle for FirstAxisBundle {
        type Metric = ScaledTestMetric;

        fn total_space_metric(&self) -> &Self::Metric {
            &self.metric
        }

        fn vertical_projection_with_norm(
            &self,
            tangent_vec: &TensorView<'_>,
            _base_point: &TensorView<'_>,
        ) -> Result<(Tensor, Tensor)> {
            let axis = array![1.0, 0.0].into_dyn();
            let coefficient = batched_dot(tangent_vec, &axis.view(), 1)?;
            let mut vertical = tangent_vec.to_owned();
            vertical.index_axis_mut(ndarray::Axis(vertical.ndim() - 1), 1).fill(0.0);
            Ok((vertical, coefficient))
        }

        fn align(
            &self,
            point: &TensorView<'_>,
            base_point: &TensorView<'_>,
            _config: &SolverConfig,
        ) -> Result<Alignment> {
            let mut aligned = point.to_owned();
            aligned[[0]] = base_point[[0]];
            Ok(Alignment {
                aligned,
                gap: ArrayD::zeros(IxDyn(&[])),
                horizontality: ArrayD::zeros(IxDyn(&[])),
                iterations: ArrayD::zeros(IxDyn(&[])),
                converged: ArrayD::from_elem(IxDyn(&[]), true),
            })
        }
    }

    #[test]
    fn test_projections_sum_and_are_orthogonal() {
        let bundle = FirstAxisBundle::new();
        let v = array![3.0, -2.0].into_dyn();
        let p = array![0.0, 0.0].into_dyn();
        let vertical = bundle.vertical_projection(&v.view(), &p.view()).unwrap();
        let horizontal = bundle.horizontal_projection(&v.view(), &p.view()).unwrap();
        assert_relative_eq!(&vertical + &horizontal, v, epsilon = 1e-12);

        let inner = bundle
            .total_space_metric()
            .inner_product(&vertical.view(), &horizontal.view(), &p.view())
            .unwrap();
        assert_relative_eq!(inner[IxDyn(&[])], 0.0, epsilon = 1e-12);

        assert!(bundle.is_horizontal(&horizontal.view(), &p.view(), 1e-10).unwrap()[IxDyn(&[])]);
        assert!(bundle.is_vertical(&vertical.view(), &p.view(), 1e-10).unwrap()[IxDyn(&[])]);
        assert!(!bundle.is_vertical(&v.view(), &p.view(), 1e-10).unwrap()[IxDyn(&[])]);
    }

    #[test]
    fn test_quotient_distance_ignores_fiber_direction() {
        let metric = QuotientMetric::new(FirstAxisBundle::new(), SolverConfig::default()).unwrap();
        let a = array![0.0, 0.0].into_dyn();
        let b = array![5.0, 2.0].into_dyn();
        let dist = metric.dist(&a.view(), &b.view()).unwrap();
        assert_relative_eq!(dist[IxDyn(&[])], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_horizontal_geodesic_ends_at_aligned_point() {
        let bundle = FirstAxisBundle::new();
        let a = array![1.0, 0.0].into_dyn();
        let b = array![5.0, 2.0].into_dyn();
        let geodesic = bundle
            .horizontal_geodesic(&a.view(), &b.view(), &SolverConfig::default())
            .unwrap();
        assert!(geodesic.alignment().all_converged());
        assert_relative_eq!(geodesic.at(0.0).unwrap(), a, epsilon = 1e-12);
        assert_relative_eq!(geodesic.at(1.0).unwrap(), array![1.0, 2.0].into_dyn(), epsilon = 1e-12);
        assert_eq!(geodesic.end_point(), &array![1.0, 2.0].into_dyn());
    }

    #[test]
    fn test_quotient_metric_rejects_bad_config() {
        let config = SolverConfig {
            max_iter: 0,
            ..SolverConfig::default()
        };
        assert!(QuotientMetric::new(FirstAxisBundle::new(), config).is_err());
    }
}
