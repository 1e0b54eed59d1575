//! Distance fields
//!
//! Multi-source breadth-first flood fill over a caller-defined passable set.
//! Used to route hallways and to score how remote a port is.

use std::collections::VecDeque;

use super::map::Grid;
use super::point::Point;

const UNREACHED: u32 = u32::MAX;

/// Per-cell BFS distance from a seed set
#[derive(Debug, Clone)]
pub struct DistanceField {
    cells: Grid<u32>,
    max_val: u32,
}

impl DistanceField {
    /// Create an empty field where every cell is unreached
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            cells: Grid::new(width, height, UNREACHED),
            max_val: 0,
        }
    }

    /// Highest finite distance assigned by the last populate
    pub fn max_val(&self) -> u32 {
        self.max_val
    }

    /// Flood from every seed at distance 0 through passable cells.
    ///
    /// Seeds are assigned regardless of the predicate; the predicate is
    /// evaluated each time a neighbour is considered.
    pub fn populate<F>(&mut self, seeds: &[Point], mut is_passable: F)
    where
        F: FnMut(Point) -> bool,
    {
        self.max_val = 0;
        let mut to_visit: VecDeque<(Point, u32)> = seeds
            .iter()
            .filter(|p| self.cells.in_bounds(**p))
            .map(|p| (*p, 0))
            .collect();

        while let Some((point, val)) = to_visit.pop_front() {
            match self.cells.get(point) {
                Some(&current) if current <= val => continue,
                Some(_) => {}
                None => continue,
            }
            self.cells.set(point, val);
            self.max_val = self.max_val.max(val);

            for neighbor in point.orthogonal_neighbors() {
                let Some(&existing) = self.cells.get(neighbor) else {
                    continue;
                };
                if existing <= val + 1 {
                    continue;
                }
                if is_passable(neighbor) {
                    to_visit.push_back((neighbor, val + 1));
                }
            }
        }
    }

    /// Distance at a point, `None` when unreached or out of bounds
    pub fn get(&self, point: Point) -> Option<u32> {
        self.cells.get(point).copied().filter(|v| *v != UNREACHED)
    }

    /// Manually override a single cell
    pub fn set(&mut self, point: Point, value: u32) {
        self.cells.set(point, value);
    }

    /// `1 - d / max` for reached cells; for debug overlays only
    pub fn normalized_value(&self, point: Point) -> Option<f64> {
        let val = self.get(point)?;
        if self.max_val == 0 {
            return None;
        }
        Some(1.0 - f64::from(val) / f64::from(self.max_val))
    }

    /// Reached point with the smallest distance satisfying `filter`
    pub fn find_minimum<F>(&self, mut filter: F) -> Option<Point>
    where
        F: FnMut(Point) -> bool,
    {
        let mut best: Option<(Point, u32)> = None;
        for (point, &val) in self.cells.iter() {
            if val == UNREACHED {
                continue;
            }
            if best.is_some_and(|(_, b)| val >= b) {
                continue;
            }
            if filter(point) {
                best = Some((point, val));
            }
        }
        best.map(|(point, _)| point)
    }

    /// Reached point with the largest distance satisfying `filter`
    pub fn find_maximum<F>(&self, mut filter: F) -> Option<Point>
    where
        F: FnMut(Point) -> bool,
    {
        let mut best: Option<(Point, u32)> = None;
        for (point, &val) in self.cells.iter() {
            if val == UNREACHED {
                continue;
            }
            if best.is_some_and(|(_, b)| val <= b) {
                continue;
            }
            if filter(point) {
                best = Some((point, val));
            }
        }
        best.map(|(point, _)| point)
    }
}
