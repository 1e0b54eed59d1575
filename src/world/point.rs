//! Grid coordinates, directions and rectangles

use std::ops::{Add, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

/// Integer grid coordinate, also used as a direction vector
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const ZERO: Point = Point { x: 0, y: 0 };
    pub const EAST: Point = Point { x: 1, y: 0 };
    pub const WEST: Point = Point { x: -1, y: 0 };
    pub const NORTH: Point = Point { x: 0, y: -1 };
    pub const SOUTH: Point = Point { x: 0, y: 1 };

    /// The four orthogonal directions, in the order neighbours are visited
    pub const ORTHOGONAL: [Point; 4] = [Point::WEST, Point::EAST, Point::NORTH, Point::SOUTH];

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Manhattan distance to another point
    pub fn distance(&self, other: &Point) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    /// Rotate a direction a quarter turn clockwise (y grows downward)
    pub fn rotated_cw(self) -> Point {
        Point::new(-self.y, self.x)
    }

    pub fn is_zero(&self) -> bool {
        *self == Point::ZERO
    }

    /// Orthogonal neighbours, unfiltered
    pub fn orthogonal_neighbors(self) -> impl Iterator<Item = Point> {
        Point::ORTHOGONAL.into_iter().map(move |d| self + d)
    }

    /// All eight neighbours, unfiltered
    pub fn all_neighbors(self) -> impl Iterator<Item = Point> {
        (-1..=1)
            .flat_map(|dy| (-1..=1).map(move |dx| Point::new(dx, dy)))
            .filter(|d| !d.is_zero())
            .map(move |d| self + d)
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Neg for Point {
    type Output = Point;

    fn neg(self) -> Point {
        Point::new(-self.x, -self.y)
    }
}

impl Mul<i32> for Point {
    type Output = Point;

    fn mul(self, rhs: i32) -> Point {
        Point::new(self.x * rhs, self.y * rhs)
    }
}

/// Axis-aligned rectangle, `x`/`y` inclusive, `w`/`h` in cells
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    pub fn moved_to(&self, point: Point) -> Rect {
        Rect::new(point.x, point.y, self.w, self.h)
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x < self.x + self.w && point.y >= self.y && point.y < self.y + self.h
    }

    /// Every point inside, row-major
    pub fn points(&self) -> impl Iterator<Item = Point> {
        let Rect { x, y, w, h } = *self;
        (y..y + h).flat_map(move |py| (x..x + w).map(move |px| Point::new(px, py)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation() {
        assert_eq!(Point::EAST.rotated_cw(), Point::SOUTH);
        assert_eq!(Point::SOUTH.rotated_cw(), Point::WEST);
        assert_eq!(-Point::NORTH, Point::SOUTH);
    }

    #[test]
    fn test_rect_points_row_major() {
        let points: Vec<Point> = Rect::new(1, 1, 2, 2).points().collect();
        assert_eq!(
            points,
            vec![
                Point::new(1, 1),
                Point::new(2, 1),
                Point::new(1, 2),
                Point::new(2, 2)
            ]
        );
    }

    #[test]
    fn test_neighbors() {
        assert_eq!(Point::new(3, 3).all_neighbors().count(), 8);
        assert!(Point::new(3, 3).orthogonal_neighbors().all(|p| p.distance(&Point::new(3, 3)) == 1));
    }
}
