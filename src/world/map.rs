//! Grid storage
//!
//! A fixed-size 2D array addressed by `Point`. Out-of-bounds reads return
//! `None` and out-of-bounds writes are ignored.

use serde::{Deserialize, Serialize};

use super::point::{Point, Rect};

/// Row-major 2D array
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid<T> {
    width: i32,
    height: i32,
    cells: Vec<T>,
}

impl<T: Clone> Grid<T> {
    /// Create a grid filled with `fill`
    pub fn new(width: i32, height: i32, fill: T) -> Self {
        let width = width.max(0);
        let height = height.max(0);
        Self {
            width,
            height,
            cells: vec![fill; width as usize * height as usize],
        }
    }

    /// Reset every cell to `fill`
    pub fn fill(&mut self, fill: T) {
        for cell in &mut self.cells {
            *cell = fill.clone();
        }
    }
}

impl<T> Grid<T> {
    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    /// Bounds as a rectangle at the origin
    pub fn rect(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }

    /// Convert 2D coordinates to 1D index
    #[inline]
    fn xy_to_idx(&self, point: Point) -> usize {
        (point.y * self.width + point.x) as usize
    }

    /// Check if coordinates are within bounds
    #[inline]
    pub fn in_bounds(&self, point: Point) -> bool {
        self.rect().contains(point)
    }

    pub fn get(&self, point: Point) -> Option<&T> {
        if self.in_bounds(point) {
            Some(&self.cells[self.xy_to_idx(point)])
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, point: Point) -> Option<&mut T> {
        if self.in_bounds(point) {
            let idx = self.xy_to_idx(point);
            Some(&mut self.cells[idx])
        } else {
            None
        }
    }

    /// Write a cell; returns false if the point is out of bounds
    pub fn set(&mut self, point: Point, value: T) -> bool {
        match self.get_mut(point) {
            Some(cell) => {
                *cell = value;
                true
            }
            None => false,
        }
    }

    /// All cells with their coordinates, row-major
    pub fn iter(&self) -> impl Iterator<Item = (Point, &T)> {
        self.rect().points().zip(self.cells.iter())
    }

    /// Points whose cell satisfies the predicate, row-major
    pub fn points_where<F>(&self, mut predicate: F) -> Vec<Point>
    where
        F: FnMut(Point, &T) -> bool,
    {
        self.iter()
            .filter(|(point, cell)| predicate(*point, *cell))
            .map(|(point, _)| point)
            .collect()
    }
}
