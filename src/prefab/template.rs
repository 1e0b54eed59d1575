//! Prefab templates
//!
//! A template is a named, tagged rectangular drawing. The `tiles` layer
//! holds the structure (`#` wall, `.` floor, space for nothing) and the
//! optional `marks` layer holds ports and point-of-interest codes:
//!
//! ```text
//! >  east port      <  west port
//! ^  north port     v  south port
//! *  zero port (undirected)
//! ```
//!
//! Any other mark must match the `code` of one of the template's POI
//! definitions.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::{GenError, Result};
use crate::world::{BasicType, CellFlags, GeneratorCell, Grid, PoiDefinition, Point, Rect};

/// A connectable edge cell of a template or instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Port {
    pub point: Point,
    pub direction: Point,
}

impl Port {
    pub fn new(point: Point, direction: Point) -> Self {
        Self { point, direction }
    }

    /// Same port translated by `offset`
    pub fn moved(&self, offset: Point) -> Port {
        Port::new(self.point + offset, self.direction)
    }

    pub fn is_zero(&self) -> bool {
        self.direction.is_zero()
    }

    /// The cell this port faces
    pub fn facing(&self) -> Point {
        self.point + self.direction
    }
}

/// Tag matching shared by templates and whitelists
pub trait Tagged {
    fn tags(&self) -> &[String];

    fn matches(&self, tag: &str) -> bool {
        tag == "*" || self.tags().iter().any(|t| t == tag)
    }

    /// True if any of `wanted` is one of our tags, or `wanted` holds `*`
    fn matches_any(&self, wanted: &[String]) -> bool {
        wanted.iter().any(|w| self.matches(w))
    }
}

fn default_weight() -> f64 {
    1.0
}

fn default_neighbor_tags() -> Vec<String> {
    vec!["*".to_string()]
}

/// On-disk template description
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrefabDefinition {
    pub id: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default = "default_neighbor_tags")]
    pub neighbor_tags: Vec<String>,
    #[serde(default)]
    pub max_instances: Option<usize>,
    #[serde(default)]
    pub max_connections: Option<usize>,
    #[serde(default)]
    pub has_doors: bool,
    #[serde(default)]
    pub poi: Vec<PoiDefinition>,
    pub tiles: Vec<String>,
    #[serde(default)]
    pub marks: Vec<String>,
}

/// Everything about a template except its drawing
#[derive(Debug, Clone, PartialEq)]
pub struct PrefabMetadata {
    pub id: String,
    pub tags: Vec<String>,
    pub weight: f64,
    pub neighbor_tags: Vec<String>,
    /// Placement cap per run, `None` for unlimited
    pub max_instances: Option<usize>,
    /// Connection budget per instance, `None` for unlimited
    pub max_connections: Option<usize>,
    pub poi_definitions: Vec<PoiDefinition>,
    pub has_doors: bool,
}

/// An immutable template, compared and hashed by id
#[derive(Debug, Clone)]
pub struct Prefab {
    pub metadata: PrefabMetadata,
    cells: Grid<GeneratorCell>,
    ports: Vec<Port>,
}

impl Prefab {
    /// Build a template from its definition, classifying every glyph
    pub fn from_definition(def: PrefabDefinition) -> Result<Self> {
        let height = def.tiles.len() as i32;
        let width = def.tiles.iter().map(|row| row.chars().count()).max().unwrap_or(0) as i32;
        if width == 0 || height == 0 {
            return Err(GenError::MalformedPrefab {
                prefab: def.id,
                reason: "empty drawing".to_string(),
            });
        }
        if def.marks.len() as i32 > height {
            return Err(GenError::MalformedPrefab {
                prefab: def.id,
                reason: format!("{} mark rows for {} tile rows", def.marks.len(), height),
            });
        }
        if !(def.weight >= 0.0) {
            return Err(GenError::MalformedPrefab {
                prefab: def.id,
                reason: format!("invalid weight {}", def.weight),
            });
        }

        let mut cells = Grid::new(width, height, GeneratorCell::default());
        let mut ports = Vec::new();

        for (y, row) in def.tiles.iter().enumerate() {
            let marks: Vec<char> = def
                .marks
                .get(y)
                .map(|m| m.chars().collect())
                .unwrap_or_default();
            // Short rows are padded with empty space
            let row: Vec<char> = row.chars().collect();
            for x in 0..width as usize {
                let point = Point::new(x as i32, y as i32);
                let tile = row.get(x).copied().unwrap_or(' ');
                let mark = marks.get(x).copied().unwrap_or(' ');
                let cell = classify(&def, point, tile, mark)?;
                if let Some(direction) = cell.port_direction {
                    ports.push(Port::new(point, direction));
                }
                cells.set(point, cell);
            }
        }

        let metadata = PrefabMetadata {
            id: def.id,
            tags: def.tags,
            weight: def.weight,
            neighbor_tags: def.neighbor_tags,
            max_instances: def.max_instances,
            max_connections: def.max_connections,
            poi_definitions: def.poi,
            has_doors: def.has_doors,
        };

        Ok(Self {
            metadata,
            cells,
            ports,
        })
    }

    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    /// Bounds relative to the template origin
    pub fn rect(&self) -> Rect {
        self.cells.rect()
    }

    pub fn cells(&self) -> &Grid<GeneratorCell> {
        &self.cells
    }

    /// Ports relative to the template origin, including zero ports
    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    /// Directed ports facing `direction`
    pub fn ports_facing(&self, direction: Point) -> impl Iterator<Item = &Port> {
        self.ports
            .iter()
            .filter(move |p| p.direction == direction && !p.is_zero())
    }

    pub fn has_port_facing(&self, direction: Point) -> bool {
        self.ports_facing(direction).next().is_some()
    }

    /// Both templates accept each other as neighbours
    pub fn is_compatible_with(&self, other: &Prefab) -> bool {
        other.matches_any(&self.metadata.neighbor_tags)
            && self.matches_any(&other.metadata.neighbor_tags)
    }
}

impl Tagged for Prefab {
    fn tags(&self) -> &[String] {
        &self.metadata.tags
    }
}

impl PartialEq for Prefab {
    fn eq(&self, other: &Self) -> bool {
        self.metadata.id == other.metadata.id
    }
}

impl Eq for Prefab {}

impl Hash for Prefab {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.metadata.id.hash(state);
    }
}

/// Turn one tile/mark glyph pair into a generator cell
fn classify(def: &PrefabDefinition, point: Point, tile: char, mark: char) -> Result<GeneratorCell> {
    let unknown = |glyph: char| GenError::UnknownGlyph {
        prefab: def.id.clone(),
        glyph,
        x: point.x,
        y: point.y,
    };

    let basic_type = match tile {
        '#' => BasicType::Wall,
        '.' => BasicType::Floor,
        ' ' => BasicType::Empty,
        other => return Err(unknown(other)),
    };

    let mut cell = GeneratorCell::new(basic_type);
    if basic_type == BasicType::Empty {
        if mark != ' ' {
            return Err(GenError::MalformedPrefab {
                prefab: def.id.clone(),
                reason: format!("mark '{}' on empty cell ({}, {})", mark, point.x, point.y),
            });
        }
        return Ok(cell);
    }

    cell.prefab_id = Some(def.id.clone());
    if basic_type == BasicType::Floor {
        cell.flags.insert(CellFlags::ROOM);
    }
    if def.has_doors {
        cell.flags.insert(CellFlags::HAS_DOORS);
    }

    let direction = match mark {
        ' ' => None,
        '>' => Some(Point::EAST),
        '<' => Some(Point::WEST),
        '^' => Some(Point::NORTH),
        'v' => Some(Point::SOUTH),
        '*' => Some(Point::ZERO),
        code => {
            let poi = def
                .poi
                .iter()
                .find(|poi| poi.code == code)
                .ok_or_else(|| unknown(code))?;
            cell.poi = Some(poi.clone());
            None
        }
    };
    if let Some(direction) = direction {
        cell.flags.insert(CellFlags::PORT_UNUSED);
        cell.port_direction = Some(direction);
    }

    Ok(cell)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::PoiKind;

    fn definition(tiles: &[&str], marks: &[&str]) -> PrefabDefinition {
        PrefabDefinition {
            id: "test".to_string(),
            tags: vec!["room".to_string()],
            weight: 1.0,
            neighbor_tags: vec!["hall".to_string()],
            max_instances: None,
            max_connections: None,
            has_doors: true,
            poi: vec![PoiDefinition {
                code: 'e',
                kind: PoiKind::Entrance,
                tags: Vec::new(),
                is_required: true,
            }],
            tiles: tiles.iter().map(|s| s.to_string()).collect(),
            marks: marks.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_ports_are_scanned() {
        let prefab = Prefab::from_definition(definition(
            &["#####", "#...#", "#####"],
            &["  ^  ", "<   >", "  *  "],
        ))
        .unwrap();

        assert_eq!(prefab.rect(), Rect::new(0, 0, 5, 3));
        assert_eq!(prefab.ports().len(), 4);
        assert!(prefab.ports().contains(&Port::new(Point::new(2, 0), Point::NORTH)));
        assert!(prefab.ports().contains(&Port::new(Point::new(0, 1), Point::WEST)));
        assert!(prefab.ports().contains(&Port::new(Point::new(4, 1), Point::EAST)));
        assert!(prefab.ports().contains(&Port::new(Point::new(2, 2), Point::ZERO)));
        // Zero ports never count as facing a direction
        assert!(!prefab.has_port_facing(Point::SOUTH));
        assert!(prefab.has_port_facing(Point::EAST));
    }

    #[test]
    fn test_cells_are_classified() {
        let prefab =
            Prefab::from_definition(definition(&["###", "#.#", "###"], &["", " e "])).unwrap();
        let center = prefab.cells().get(Point::new(1, 1)).unwrap();
        assert_eq!(center.basic_type, BasicType::Floor);
        assert!(center.flags.contains(CellFlags::ROOM | CellFlags::HAS_DOORS));
        assert_eq!(center.poi.as_ref().map(|p| p.kind), Some(PoiKind::Entrance));
        assert_eq!(center.prefab_id.as_deref(), Some("test"));
        let corner = prefab.cells().get(Point::new(0, 0)).unwrap();
        assert!(!corner.flags.contains(CellFlags::ROOM));
    }

    #[test]
    fn test_unknown_glyph_is_fatal() {
        let err = Prefab::from_definition(definition(&["#x#"], &[])).unwrap_err();
        assert!(matches!(err, GenError::UnknownGlyph { glyph: 'x', x: 1, y: 0, .. }));

        let err = Prefab::from_definition(definition(&["#.#"], &[" q "])).unwrap_err();
        assert!(matches!(err, GenError::UnknownGlyph { glyph: 'q', .. }));
    }

    #[test]
    fn test_equality_is_by_id() {
        let a = Prefab::from_definition(definition(&["#"], &[])).unwrap();
        let b = Prefab::from_definition(definition(&["..."], &[])).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_compatibility_is_mutual() {
        let room = Prefab::from_definition(definition(&["#"], &[])).unwrap();
        let mut hall_def = definition(&["#"], &[]);
        hall_def.id = "hall".to_string();
        hall_def.tags = vec!["hall".to_string()];
        hall_def.neighbor_tags = vec!["*".to_string()];
        let hall = Prefab::from_definition(hall_def).unwrap();

        assert!(room.is_compatible_with(&hall));
        assert!(hall.is_compatible_with(&room));
        // room only accepts halls
        assert!(!room.is_compatible_with(&room));
    }
}
