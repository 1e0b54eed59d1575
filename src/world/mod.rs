//! World module
//!
//! Grid geometry, cell model, distance fields and level generation.

pub mod point;
pub mod map;
pub mod tile;
pub mod distance;
pub mod generation;

pub use point::{Point, Rect};
pub use map::Grid;
pub use tile::{BasicType, CellFlags, GeneratorCell, PoiDefinition, PoiKind};
pub use distance::DistanceField;
