//! Prefab-and-hallway level generation
//!
//! The generator owns every piece of run state: the cell grid, the arena of
//! placed instances and the connections between them, and the queues of
//! open ports. Scripts drive it one command at a time.

pub mod config;
mod growth;
mod cleanup;
mod hallways;

pub use config::GeneratorConfig;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{GenError, Result};
use crate::prefab::{
    ConnectionId, InstanceId, Port, Prefab, PrefabConnection, PrefabInstance, PrefabLibrary,
};
use crate::script::Command;
use crate::world::{CellFlags, DistanceField, GeneratorCell, Grid, PoiDefinition, Point};

/// A point of interest found in the finished grid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointOfInterest {
    pub point: Point,
    pub poi: PoiDefinition,
}

/// What the caller keeps after a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedLevel {
    pub cells: Grid<GeneratorCell>,
    pub points_of_interest: Vec<PointOfInterest>,
}

impl GeneratedLevel {
    pub fn from_cells(cells: Grid<GeneratorCell>) -> Self {
        let points_of_interest = cells
            .poi_points(|_| true)
            .into_iter()
            .map(|(point, poi)| PointOfInterest {
                point,
                poi: poi.clone(),
            })
            .collect();
        Self {
            cells,
            points_of_interest,
        }
    }
}

/// Prefab-and-hallway generator state
pub struct Generator {
    cells: Grid<GeneratorCell>,
    library: Arc<PrefabLibrary>,
    config: GeneratorConfig,
    instances: Vec<Option<PrefabInstance>>,
    connections: Vec<Option<PrefabConnection>>,
    open_ports: Vec<(InstanceId, Port)>,
    zero_ports: Vec<(InstanceId, Port)>,
    /// Templates with a directed port facing each direction
    by_direction: BTreeMap<Point, Vec<Arc<Prefab>>>,
    placement_counts: BTreeMap<String, usize>,
    port_failures: BTreeMap<(InstanceId, Port), u32>,
    hallway_attempts: BTreeSet<Point>,
    debug_distance_field: Option<DistanceField>,
}

impl Generator {
    /// Create an empty generator for a `width` x `height` grid
    pub fn new(
        library: Arc<PrefabLibrary>,
        width: i32,
        height: i32,
        config: GeneratorConfig,
    ) -> Self {
        let by_direction = Point::ORTHOGONAL
            .iter()
            .map(|dir| (*dir, library.facing(*dir)))
            .collect();
        Self {
            cells: Grid::new(width, height, GeneratorCell::default()),
            library,
            config: config.sanitized(),
            instances: Vec::new(),
            connections: Vec::new(),
            open_ports: Vec::new(),
            zero_ports: Vec::new(),
            by_direction,
            placement_counts: BTreeMap::new(),
            port_failures: BTreeMap::new(),
            hallway_attempts: BTreeSet::new(),
            debug_distance_field: None,
        }
    }

    pub fn cells(&self) -> &Grid<GeneratorCell> {
        &self.cells
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn library(&self) -> &Arc<PrefabLibrary> {
        &self.library
    }

    /// Last "remoteness" field built by hallway injection
    pub fn debug_distance_field(&self) -> Option<&DistanceField> {
        self.debug_distance_field.as_ref()
    }

    pub fn instance(&self, id: InstanceId) -> Option<&PrefabInstance> {
        self.instances.get(id.0).and_then(Option::as_ref)
    }

    fn instance_mut(&mut self, id: InstanceId) -> Option<&mut PrefabInstance> {
        self.instances.get_mut(id.0).and_then(Option::as_mut)
    }

    /// Surviving instances in registration order
    pub fn instances(&self) -> impl Iterator<Item = (InstanceId, &PrefabInstance)> {
        self.instances
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| slot.as_ref().map(|i| (InstanceId(idx), i)))
    }

    pub fn connection(&self, id: ConnectionId) -> Option<&PrefabConnection> {
        self.connections.get(id.0).and_then(Option::as_ref)
    }

    /// Instances connected to `id`
    pub fn neighbors(&self, id: InstanceId) -> Vec<InstanceId> {
        let Some(instance) = self.instance(id) else {
            return Vec::new();
        };
        instance
            .connections()
            .filter_map(|(_, conn)| self.connection(*conn))
            .filter_map(|conn| conn.neighbor(id))
            .collect()
    }

    /// Directed ports still waiting to grow
    pub fn open_ports(&self) -> &[(InstanceId, Port)] {
        &self.open_ports
    }

    /// How many times a template has been placed this run
    pub fn placement_count(&self, prefab_id: &str) -> usize {
        self.placement_counts.get(prefab_id).copied().unwrap_or(0)
    }

    /// Hand the finished grid and its points of interest to the caller
    pub fn into_level(self) -> GeneratedLevel {
        GeneratedLevel::from_cells(self.cells)
    }

    /// Execute one script command
    pub fn run_command(&mut self, command: &Command, rng: &mut StdRng) -> Result<()> {
        log::debug!("Running {:?}", command);
        match command {
            Command::PlacePrefab { tag } => {
                self.place_prefab(tag, rng)?;
            }
            Command::GrowPrefabs { iterations } => self.grow_prefabs(*iterations, rng)?,
            Command::ConnectAdjacentPorts { max_cycles } => {
                let max_cycles = max_cycles.unwrap_or(self.config.default_max_cycles);
                self.connect_adjacent_ports(max_cycles, rng);
            }
            Command::RemoveDeadEnds { tag } => self.remove_dead_ends(tag),
            Command::AddHallwaysToRemoteAreas { count, iterations } => {
                self.add_hallways_to_remote_areas(*count, *iterations);
            }
            Command::AddWallsNextToBareFloor => self.add_walls_next_to_bare_floor(),
            Command::RemoveDoubleDoors => self.remove_double_doors(),
        }
        Ok(())
    }

    /// Place a template matching `tag` at a random in-bounds offset.
    ///
    /// No overlap check; meant for the first, isolated seed room.
    pub fn place_prefab(&mut self, tag: &str, rng: &mut StdRng) -> Result<InstanceId> {
        let candidates = self.library.with_tag(tag);
        let prefab = Arc::clone(choose_weighted(rng, &candidates, tag)?);
        let rect = prefab.rect();
        if rect.w > self.cells.width() || rect.h > self.cells.height() {
            return Err(GenError::PrefabTooLarge {
                prefab: prefab.id().to_string(),
                w: rect.w,
                h: rect.h,
            });
        }
        let x = rng.gen_range(0..=self.cells.width() - rect.w);
        let y = rng.gen_range(0..=self.cells.height() - rect.h);
        log::info!("Placing seed prefab '{}' at ({}, {})", prefab.id(), x, y);
        Ok(self.register(PrefabInstance::new(prefab, Point::new(x, y))))
    }

    /// Place a specific template at a fixed offset, without overlap checks
    pub fn place_prefab_at(&mut self, prefab_id: &str, point: Point) -> Result<InstanceId> {
        let prefab = self
            .library
            .get(prefab_id)
            .cloned()
            .ok_or_else(|| GenError::EmptyChoice(format!("no prefab with id '{}'", prefab_id)))?;
        Ok(self.register(PrefabInstance::new(prefab, point)))
    }

    /// Add an instance to the arena, queue its ports and commit its cells
    fn register(&mut self, instance: PrefabInstance) -> InstanceId {
        let id = InstanceId(self.instances.len());
        for port in instance.unused_ports() {
            if port.is_zero() {
                self.zero_ports.push((id, *port));
            } else {
                self.open_ports.push((id, *port));
            }
        }
        self.commit(&instance);
        *self
            .placement_counts
            .entry(instance.prefab().id().to_string())
            .or_insert(0) += 1;
        self.instances.push(Some(instance));
        id
    }

    /// Connect two instance ports with a new edge and refresh both cells
    fn link(&mut self, a: (InstanceId, Port), b: (InstanceId, Port), extra: CellFlags) {
        let conn = ConnectionId(self.connections.len());
        self.connections
            .push(Some(PrefabConnection::new(a.0, a.1, b.0, b.1)));
        for (id, port) in [a, b] {
            if let Some(instance) = self.instance_mut(id) {
                instance.connect(conn, port);
                instance.update_cell(port.point, |cell| cell.flags.insert(extra));
            }
            self.refresh_cell(id, port.point);
        }
        self.open_ports.retain(|entry| *entry != a && *entry != b);
        self.zero_ports.retain(|entry| *entry != a && *entry != b);
    }

    /// Delete an instance and detach it from all its neighbours
    fn remove_instance(&mut self, id: InstanceId) {
        let Some(mut instance) = self.instances.get_mut(id.0).and_then(Option::take) else {
            return;
        };
        for conn_id in instance.disconnect_from_all() {
            let Some(conn) = self.connections.get_mut(conn_id.0).and_then(Option::take) else {
                continue;
            };
            if let Some(other) = conn.neighbor(id).and_then(|n| self.instance_mut(n)) {
                other.disconnect(conn_id);
            }
        }
        log::debug!("Removed {:?}", instance);
    }

    /// Rebuild the open and zero port queues from surviving instances
    fn rebuild_port_lists(&mut self) {
        let mut open_ports = Vec::new();
        let mut zero_ports = Vec::new();
        for (id, instance) in self.instances() {
            for port in instance.unused_ports() {
                if port.is_zero() {
                    zero_ports.push((id, *port));
                } else {
                    open_ports.push((id, *port));
                }
            }
        }
        self.open_ports = open_ports;
        self.zero_ports = zero_ports;
        self.port_failures.clear();
    }

    fn is_open(&self, id: InstanceId, port: &Port) -> bool {
        self.instance(id).is_some_and(|i| i.is_port_unused(port))
    }

    fn commit(&mut self, instance: &PrefabInstance) {
        for point in instance.live_points() {
            if let Some(cell) = instance.generator_cell(point) {
                self.commit_cell(point, cell);
            }
        }
    }

    /// Re-commit one instance cell after its state changed
    fn refresh_cell(&mut self, id: InstanceId, point: Point) {
        if let Some(cell) = self.instance(id).and_then(|i| i.generator_cell(point)) {
            self.commit_cell(point, cell);
        }
    }

    /// Merge rule: a newly used port wins, otherwise the first writer stays
    fn commit_cell(&mut self, point: Point, cell: GeneratorCell) {
        let Some(existing) = self.cells.get_mut(point) else {
            return;
        };
        if existing.is_empty() || (cell.is_port_used() && !existing.is_port_used()) {
            *existing = cell;
        }
    }

    /// Rebuild the whole grid from the surviving instances
    fn recommit_everything(&mut self) {
        self.cells.fill(GeneratorCell::default());
        let instances = std::mem::take(&mut self.instances);
        for instance in instances.iter().flatten() {
            self.commit(instance);
        }
        self.instances = instances;
    }
}

/// Pick one template by weight. Zero-weight templates are never picked.
pub(crate) fn choose_weighted<'a>(
    rng: &mut StdRng,
    candidates: &'a [Arc<Prefab>],
    context: &str,
) -> Result<&'a Arc<Prefab>> {
    let pickable: Vec<&Arc<Prefab>> = candidates.iter().filter(|p| is_pickable(p)).collect();
    if pickable.is_empty() {
        return Err(GenError::EmptyChoice(context.to_string()));
    }
    let dist = WeightedIndex::new(pickable.iter().map(|p| p.metadata.weight))
        .map_err(|e| GenError::EmptyChoice(format!("{}: {}", context, e)))?;
    Ok(pickable[dist.sample(rng)])
}

pub(crate) fn is_pickable(prefab: &Prefab) -> bool {
    prefab.metadata.weight > 0.0
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Small library used across generator tests.
    ///
    /// `box` is a 3x3 room with an east port, `plug` a 3x3 room with a west
    /// port, `block` a solid 3x3 wall, `hall_*` straight corridor pieces.
    pub const LIBRARY: &str = r####"(
        prefabs: [
            (
                id: "box",
                tags: ["start", "room"],
                tiles: ["###", "#.#", "###"],
                marks: ["   ", "  >", "   "],
            ),
            (
                id: "plug",
                tags: ["room"],
                tiles: ["###", "#.#", "###"],
                marks: ["   ", "<  ", "   "],
            ),
            (
                id: "block",
                tags: ["filler"],
                tiles: ["###", "###", "###"],
            ),
        ],
    )"####;

    pub fn library(source: &str) -> Arc<PrefabLibrary> {
        Arc::new(PrefabLibrary::from_ron_str(source).unwrap())
    }

    pub fn generator(source: &str, width: i32, height: i32) -> Generator {
        Generator::new(library(source), width, height, GeneratorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::world::BasicType;
    use rand::SeedableRng;

    #[test]
    fn test_place_prefab_stays_in_bounds() {
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut gen = generator(LIBRARY, 5, 4);
            let id = gen.place_prefab("start", &mut rng).unwrap();
            let instance = gen.instance(id).unwrap();
            assert!(instance.rect().points().all(|p| gen.cells().in_bounds(p)));
            assert_eq!(instance.prefab().id(), "box");
        }
    }

    #[test]
    fn test_place_prefab_commits_cells() {
        let mut gen = generator(LIBRARY, 6, 6);
        let id = gen.place_prefab_at("box", Point::new(1, 1)).unwrap();
        let center = gen.cells().get(Point::new(2, 2)).unwrap();
        assert_eq!(center.basic_type, BasicType::Floor);
        assert!(center.flags.contains(CellFlags::ROOM));
        assert!(gen.cells().get(Point::new(3, 2)).unwrap().is_port_unused());
        assert_eq!(gen.open_ports(), &[(id, Port::new(Point::new(3, 2), Point::EAST))]);
        assert_eq!(gen.placement_count("box"), 1);
    }

    #[test]
    fn test_unknown_tag_is_fatal() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut gen = generator(LIBRARY, 6, 6);
        assert!(matches!(
            gen.place_prefab("nope", &mut rng),
            Err(GenError::EmptyChoice(_))
        ));
    }

    #[test]
    fn test_prefab_too_large() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut gen = generator(LIBRARY, 2, 2);
        assert!(matches!(
            gen.place_prefab("start", &mut rng),
            Err(GenError::PrefabTooLarge { .. })
        ));
    }

    #[test]
    fn test_weighted_choice_respects_zero_weight() {
        let lib = library(
            r####"(prefabs: [
                (id: "a", tags: ["x"], weight: 0.0, tiles: ["#"]),
                (id: "b", tags: ["x"], weight: 1.0, tiles: ["#"]),
            ])"####,
        );
        let candidates = lib.with_tag("x");
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            assert_eq!(choose_weighted(&mut rng, &candidates, "x").unwrap().id(), "b");
        }
        assert!(choose_weighted(&mut rng, &[], "none").is_err());
    }

    #[test]
    fn test_zero_weight_templates_are_never_chosen() {
        let lib = library(
            r####"(prefabs: [
                (id: "a", tags: ["x"], weight: 0.0, tiles: ["#"]),
                (id: "b", tags: ["x"], weight: 0.0, tiles: ["#"]),
                (id: "c", tags: ["y"], weight: 0.0, tiles: ["#"]),
            ])"####,
        );
        let mut rng = StdRng::seed_from_u64(3);
        assert!(matches!(
            choose_weighted(&mut rng, &lib.with_tag("x"), "x"),
            Err(GenError::EmptyChoice(_))
        ));
        assert!(matches!(
            choose_weighted(&mut rng, &lib.with_tag("y"), "y"),
            Err(GenError::EmptyChoice(_))
        ));
    }

    #[test]
    fn test_level_collects_points_of_interest() {
        let lib = r####"(prefabs: [
            (
                id: "exit",
                tags: ["room"],
                poi: [(code: 'x', kind: Exit)],
                tiles: ["###", "#.#", "###"],
                marks: ["", " x ", ""],
            ),
        ])"####;
        let mut gen = generator(lib, 5, 5);
        gen.place_prefab_at("exit", Point::ZERO).unwrap();
        let level = gen.into_level();
        assert_eq!(level.points_of_interest.len(), 1);
        assert_eq!(level.points_of_interest[0].point, Point::new(1, 1));
    }
}
