//! Exhaustive grid search.

/// Best point found by [`grid_search`].
#[derive(Debug, Clone, PartialEq)]
pub struct GridPoint {
    pub params: Vec<f64>,
    pub value: f64,
    pub evaluated: usize,
}

/// Minimizes `objective` over the Cartesian product of `axes`, first axis outermost. Ties keep
/// the earliest point and NaN values are never selected. `None` when an axis is empty or every
/// point evaluates to NaN.
pub fn grid_search<F>(axes: &[&[f64]], objective: F) -> Option<GridPoint>
where
    F: Fn(&[f64]) -> f64,
{
    if axes.is_empty() || axes.iter().any(|axis| axis.is_empty()) {
        return None;
    }

    let mut cursor = vec![0usize; axes.len()];
    let mut point: Vec<f64> = axes.iter().map(|axis| axis[0]).collect();
    let mut best: Option<GridPoint> = None;
    let mut evaluated = 0;

    loop {
        let value = objective(&point);
        evaluated += 1;
        let improves = !value.is_nan()
            && best
                .as_ref()
                .map_or(true, |b| value.total_cmp(&b.value).is_lt());
        if improves {
            best = Some(GridPoint {
                params: point.clone(),
                value,
                evaluated: 0,
            });
        }

        // Odometer step, last axis fastest.
        let mut axis = axes.len();
        loop {
            if axis == 0 {
                return best.map(|b| GridPoint { evaluated, ..b });
            }
            axis -= 1;
            cursor[axis] += 1;
            if cursor[axis] < axes[axis].len() {
                point[axis] = axes[axis][cursor[axis]];
                break;
            }
            cursor[axis] = 0;
            point[axis] = axes[axis][0];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_the_minimum_of_a_bowl() {
        let xs = [0.0, 1.0, 2.0, 3.0];
        let ys = [-1.0, 0.0, 1.0];
        let best = grid_search(&[&xs[..], &ys[..]], |p| (p[0] - 2.0).powi(2) + (p[1] + 1.0).powi(2))
            .expect("non-empty grid");
        assert_eq!(best.params, vec![2.0, -1.0]);
        assert_eq!(best.value, 0.0);
        assert_eq!(best.evaluated, 12);
    }

    #[test]
    fn ties_keep_the_first_point() {
        let xs = [0.0, 1.0, 2.0];
        let best = grid_search(&[&xs[..]], |_| 1.0).expect("non-empty grid");
        assert_eq!(best.params, vec![0.0]);
    }

    #[test]
    fn nan_points_are_skipped() {
        let xs = [0.0, 1.0, 2.0, 3.0];
        let best = grid_search(&[&xs[..]], |p| if p[0] == 0.0 { f64::NAN } else { p[0] })
            .expect("finite points exist");
        assert_eq!(best.params, vec![1.0]);
        assert_eq!(best.value, 1.0);
        assert_eq!(best.evaluated, 4);

        assert!(grid_search(&[&xs[..]], |_| f64::NAN).is_none());
    }

    #[test]
    fn empty_axes_yield_nothing() {
        let empty: [f64; 0] = [];
        assert!(grid_search(&[&empty[..]], |_| 0.0).is_none());
        assert!(grid_search(&[], |_| 0.0).is_none());
    }
}
