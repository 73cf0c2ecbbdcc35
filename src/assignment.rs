//! Minimum-cost perfect matching on a square cost matrix.

use munkres::{solve_assignment, WeightMatrix};
use ndarray::prelude::*;
use tracing::warn;

/// Stand-in for costs the solver cannot digest (NaN, infinities)
const INVALID_COST: f64 = 1.0e6;

/// Solves the assignment problem for a square, non-negative cost matrix.
///
/// Entry `i` of the result is the column assigned to row `i`, or `None` when
/// no valid assignment exists. Identical input always gives identical output.
pub fn solve(costs: ArrayView2<'_, f64>) -> Vec<Option<usize>> {
    let (rows, cols) = costs.dim();

    if rows == 0 && cols == 0 {
        return Vec::new();
    }

    if rows != cols {
        warn!(rows, cols, "assignment requires a square cost matrix");
        return vec![None; rows];
    }

    let n = rows;
    let mut weights = WeightMatrix::from_fn(n, |(r, c)| {
        let cost = costs[[r, c]];

        if cost.is_finite() {
            cost.clamp(0.0, INVALID_COST)
        } else {
            INVALID_COST
        }
    });

    match solve_assignment(&mut weights) {
        Ok(positions) => {
            let mut result = vec![None; n];

            for pos in positions {
                if pos.row < n && pos.column < n {
                    result[pos.row] = Some(pos.column);
                }
            }

            result
        }
        Err(_) => {
            warn!(n, "assignment could not be solved");
            vec![None; n]
        }
    }
}

/// Sum of the costs picked by an assignment, unassigned rows skipped
pub fn total_cost(costs: ArrayView2<'_, f64>, assignment: &[Option<usize>]) -> f64 {
    assignment
        .iter()
        .enumerate()
        .filter_map(|(r, c)| c.map(|c| costs[[r, c]]))
        .sum()
}
