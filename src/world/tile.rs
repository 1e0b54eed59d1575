//! Generator cell definitions
//!
//! The per-cell state the generator works on. The generator only knows
//! empty/floor/wall plus a handful of flags; what a door or a point of
//! interest means is left to the caller.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::map::Grid;
use super::point::Point;

/// Coarse cell classification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BasicType {
    /// Unassigned space
    #[default]
    Empty,
    Floor,
    Wall,
}

bitflags! {
    /// Independent per-cell markers
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct CellFlags: u16 {
        /// Interior of a placed prefab
        const ROOM = 0x0001;
        const PORT_UNUSED = 0x0002;
        const PORT_USED = 0x0004;
        /// Used port drawn as plain floor
        const INVISIBLE_DOOR = 0x0008;
        const CREATED_TO_ADD_CYCLE = 0x0010;
        const LATE_STAGE_HALLWAY = 0x0020;
        const DEBUG_POINT = 0x0040;
        /// Drawn by a prefab whose ports become real doors
        const HAS_DOORS = 0x0080;
    }
}

/// Kinds of points of interest a prefab can declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PoiKind {
    Mob,
    Item,
    Weapon,
    Armor,
    Entrance,
    Exit,
    Stim,
    /// Synthetic marker left on late-stage hallway endpoints
    Hall,
}

/// A point-of-interest definition, as declared in prefab metadata
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PoiDefinition {
    /// Glyph used in the prefab's marks layer
    pub code: char,
    pub kind: PoiKind,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_required: bool,
}

impl PoiDefinition {
    /// Marker left at both ends of an injected hallway
    pub fn hall() -> Self {
        Self {
            code: 'h',
            kind: PoiKind::Hall,
            tags: vec!["hall".to_string()],
            is_required: false,
        }
    }
}

/// State of a single grid cell during generation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorCell {
    pub basic_type: BasicType,
    pub flags: CellFlags,
    /// Side of the cell that can connect; `Some(Point::ZERO)` for zero ports
    pub port_direction: Option<Point>,
    pub poi: Option<PoiDefinition>,
    /// Template that drew this cell
    pub prefab_id: Option<String>,
}

impl GeneratorCell {
    pub fn new(basic_type: BasicType) -> Self {
        Self {
            basic_type,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.basic_type == BasicType::Empty
    }

    pub fn is_floor(&self) -> bool {
        self.basic_type == BasicType::Floor
    }

    pub fn is_passable(&self) -> bool {
        self.basic_type == BasicType::Floor || self.flags.contains(CellFlags::PORT_USED)
    }

    pub fn is_port_used(&self) -> bool {
        self.flags.contains(CellFlags::PORT_USED)
    }

    pub fn is_port_unused(&self) -> bool {
        self.flags.contains(CellFlags::PORT_UNUSED)
    }

    /// Flip an unused port to used
    pub fn use_port(&mut self) {
        self.flags.remove(CellFlags::PORT_UNUSED);
        self.flags.insert(CellFlags::PORT_USED);
    }

    /// Flip a used port back to unused
    pub fn release_port(&mut self) {
        self.flags.remove(CellFlags::PORT_USED);
        self.flags.insert(CellFlags::PORT_UNUSED);
    }

    /// Forget that this cell was ever a port
    pub fn strip_port(&mut self) {
        self.flags.remove(CellFlags::PORT_UNUSED | CellFlags::PORT_USED);
        self.port_direction = None;
    }

    /// ASCII glyph for debug output
    pub fn glyph(&self) -> char {
        if self.flags.contains(CellFlags::PORT_USED) {
            if self.flags.contains(CellFlags::INVISIBLE_DOOR) {
                return '.';
            }
            return '+';
        }
        if let Some(poi) = &self.poi {
            return poi.code;
        }
        match self.basic_type {
            BasicType::Empty => ' ',
            BasicType::Floor => '.',
            BasicType::Wall => '#',
        }
    }
}

impl Grid<GeneratorCell> {
    /// Every cell carrying a point of interest that satisfies the predicate
    pub fn poi_points<F>(&self, mut predicate: F) -> Vec<(Point, &PoiDefinition)>
    where
        F: FnMut(&PoiDefinition) -> bool,
    {
        self.iter()
            .filter_map(|(point, cell)| cell.poi.as_ref().map(|poi| (point, poi)))
            .filter(|(_, poi)| predicate(*poi))
            .collect()
    }

    /// Multi-line ASCII rendering, one row per line
    pub fn to_ascii(&self) -> String {
        let mut out = String::with_capacity(((self.width() + 1) * self.height()) as usize);
        for y in 0..self.height() {
            for x in 0..self.width() {
                let glyph = self
                    .get(Point::new(x, y))
                    .map_or(' ', GeneratorCell::glyph);
                out.push(glyph);
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passability() {
        let mut cell = GeneratorCell::new(BasicType::Wall);
        assert!(!cell.is_passable());
        cell.flags.insert(CellFlags::PORT_UNUSED);
        assert!(!cell.is_passable());
        cell.use_port();
        assert!(cell.is_passable());
        assert!(!cell.is_port_unused());
        cell.release_port();
        assert!(cell.is_port_unused() && !cell.is_port_used());
    }

    #[test]
    fn test_glyphs() {
        let mut door = GeneratorCell::new(BasicType::Wall);
        door.flags.insert(CellFlags::PORT_USED);
        assert_eq!(door.glyph(), '+');
        door.flags.insert(CellFlags::INVISIBLE_DOOR);
        assert_eq!(door.glyph(), '.');
        assert_eq!(GeneratorCell::default().glyph(), ' ');
    }

    #[test]
    fn test_points_scan() {
        let mut grid = Grid::new(3, 3, GeneratorCell::default());
        let mut cell = GeneratorCell::new(BasicType::Floor);
        cell.poi = Some(PoiDefinition::hall());
        grid.set(Point::new(1, 2), cell);

        let halls = grid.poi_points(|poi| poi.kind == PoiKind::Hall);
        assert_eq!(halls.len(), 1);
        assert_eq!(halls[0].0, Point::new(1, 2));
        assert!(grid.poi_points(|poi| poi.kind == PoiKind::Exit).is_empty());
        assert_eq!(grid.to_ascii().lines().nth(2), Some(" h "));
    }
}
