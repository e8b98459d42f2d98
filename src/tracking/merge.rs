//! Deterministic concatenation of per-partition results.

use nalgebra::Point3;

use super::partition::PartitionResult;

/// Global point buffer plus line records indexing into it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PolylineTopology {
    pub points: Vec<Point3<f64>>,
    /// Each line is a contiguous run of indices into `points`.
    pub lines: Vec<Vec<usize>>,
}

impl PolylineTopology {
    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    pub fn num_lines(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Points of line `i` in order, or `None` if there is no such line.
    pub fn line_points(&self, i: usize) -> Option<Vec<Point3<f64>>> {
        self.lines
            .get(i)
            .map(|line| line.iter().map(|&idx| self.points[idx]).collect())
    }
}

/// Merge worker buffers in ascending partition order.
///
/// Line indices of each partition are offset by the number of points already
/// in the global buffer. Points are not deduplicated.
pub fn merge_results(mut results: Vec<PartitionResult>) -> PolylineTopology {
    results.sort_by_key(|r| r.partition);

    let total_points = results.iter().map(|r| r.points.len()).sum();
    let total_lines = results.iter().map(|r| r.lines.len()).sum();
    let mut topology = PolylineTopology {
        points: Vec::with_capacity(total_points),
        lines: Vec::with_capacity(total_lines),
    };

    for result in results {
        let offset = topology.points.len();
        topology.points.extend(result.points);
        topology.lines.extend(
            result
                .lines
                .into_iter()
                .map(|line| line.into_iter().map(|idx| idx + offset).collect()),
        );
    }

    topology
}
