//! Port-driven growth
//!
//! Each step pops a random open port, picks a compatible template with a
//! port facing back at it and tries to place that template flush against
//! the source. A new prefab may overlap earlier ones only where the cell
//! types agree; the overlapping cells defer to whatever is already there.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::Result;
use crate::prefab::{InstanceId, Port, Prefab, PrefabInstance};
use crate::world::{CellFlags, Point};

use super::{choose_weighted, is_pickable, Generator};

impl Generator {
    /// Run `iterations` growth steps
    pub fn grow_prefabs(&mut self, iterations: usize, rng: &mut StdRng) -> Result<()> {
        let mut placed = 0;
        for _ in 0..iterations {
            if self.open_ports.is_empty() {
                log::debug!("No open ports left after {} placements", placed);
                break;
            }
            if self.grow_once(rng)? {
                placed += 1;
            }
        }
        log::info!(
            "growPrefabs: placed {} prefabs in {} iterations, {} open ports left",
            placed,
            iterations,
            self.open_ports.len()
        );
        Ok(())
    }

    /// One growth step. Returns true if a prefab was placed.
    fn grow_once(&mut self, rng: &mut StdRng) -> Result<bool> {
        self.open_ports.shuffle(rng);
        let Some((source_id, port)) = self.open_ports.pop() else {
            return Ok(false);
        };
        let Some(source) = self.instance(source_id) else {
            return Ok(false);
        };
        if !source.is_port_unused(&port) {
            return Ok(false);
        }
        if source.available_ports() == 0 {
            log::debug!("{:?} is out of connections, dropping {:?}", source, port);
            return Ok(false);
        }

        let inverse = -port.direction;
        let source_prefab = Arc::clone(source.prefab());
        let candidates: Vec<Arc<Prefab>> = self
            .by_direction
            .get(&inverse)
            .map(|list| {
                list.iter()
                    .filter(|c| {
                        is_pickable(c)
                            && c.is_compatible_with(&source_prefab)
                            && self.under_cap(c)
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        if candidates.is_empty() {
            log::debug!(
                "No candidates for {:?} on '{}', dropping it",
                port,
                source_prefab.id()
            );
            return Ok(false);
        }

        let prefab = Arc::clone(choose_weighted(rng, &candidates, "growth candidates")?);
        // 0 shares the source's door cell, 1 leaves two doors side by side
        let offset = if rng.gen_bool(self.config.setback_chance) { 1 } else { 0 };
        let target = port.point + port.direction * offset;

        match self.try_prefab(&prefab, target, inverse, offset == 0, rng) {
            Some((instance, new_port)) => {
                log::trace!(
                    "Grew '{}' at {:?} from '{}'",
                    prefab.id(),
                    instance.point(),
                    source_prefab.id()
                );
                let new_id = self.register(instance);
                self.link((source_id, port), (new_id, new_port), CellFlags::empty());
                self.port_failures.remove(&(source_id, port));
                Ok(true)
            }
            None => {
                self.requeue_after_failure(source_id, port);
                Ok(false)
            }
        }
    }

    fn under_cap(&self, prefab: &Prefab) -> bool {
        prefab
            .metadata
            .max_instances
            .map_or(true, |max| self.placement_count(prefab.id()) < max)
    }

    /// Try to fit `prefab` so one of its ports facing `direction` lands on
    /// `target`. On success returns the instance, with overlaps already
    /// recorded as replacements, and its connecting port.
    fn try_prefab(
        &self,
        prefab: &Arc<Prefab>,
        target: Point,
        direction: Point,
        shared_door: bool,
        rng: &mut StdRng,
    ) -> Option<(PrefabInstance, Port)> {
        let valid: Vec<&Port> = prefab.ports_facing(direction).collect();
        let port = **valid.choose(rng)?;
        let (mut instance, absolute) = PrefabInstance::aligned(Arc::clone(prefab), port, target);

        let mut overlaps = Vec::new();
        for point in instance.live_points() {
            let existing = self.cells.get(point)?;
            if point == target {
                // Shared door: the source's port cell
                if shared_door || existing.is_empty() {
                    continue;
                }
                return None;
            }
            if existing.is_empty() {
                continue;
            }
            if existing.is_port_used() {
                return None;
            }
            let own = instance.generator_cell(point)?;
            if own.basic_type != existing.basic_type {
                return None;
            }
            overlaps.push(point);
        }

        for point in overlaps {
            instance.add_replacement(point);
        }
        Some((instance, absolute))
    }

    fn requeue_after_failure(&mut self, id: InstanceId, port: Port) {
        let failures = self.port_failures.entry((id, port)).or_insert(0);
        *failures += 1;
        if *failures < self.config.growth_retry_limit {
            self.open_ports.push((id, port));
        } else {
            log::debug!("Giving up on {:?} after {} failed placements", port, failures);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::world::{BasicType, GeneratorCell, Grid};
    use rand::SeedableRng;

    #[test]
    fn test_walled_port_stays_open() {
        let mut gen = generator(LIBRARY, 10, 3);
        let room = gen.place_prefab_at("box", Point::ZERO).unwrap();
        for x in 0..3 {
            gen.place_prefab_at("block", Point::new(3 + x * 3, 0)).unwrap();
        }
        let before: Grid<GeneratorCell> = gen.cells().clone();
        let port = Port::new(Point::new(2, 1), Point::EAST);

        let mut rng = StdRng::seed_from_u64(99);
        gen.grow_prefabs(1, &mut rng).unwrap();

        assert_eq!(gen.cells(), &before);
        assert!(gen.cells().get(port.point).unwrap().is_port_unused());
        assert!(gen.instance(room).unwrap().is_port_unused(&port));
        assert_eq!(gen.instances().count(), 4);
    }

    #[test]
    fn test_retry_limit_drops_port() {
        let mut gen = generator(LIBRARY, 10, 3);
        gen.place_prefab_at("box", Point::ZERO).unwrap();
        for x in 0..3 {
            gen.place_prefab_at("block", Point::new(3 + x * 3, 0)).unwrap();
        }
        let mut rng = StdRng::seed_from_u64(5);
        gen.grow_prefabs(10, &mut rng).unwrap();
        assert!(gen.open_ports().is_empty());
    }

    #[test]
    fn test_growth_connects_both_sides() {
        let mut gen = generator(LIBRARY, 12, 5);
        let room = gen.place_prefab_at("box", Point::new(0, 1)).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        gen.grow_prefabs(1, &mut rng).unwrap();

        assert_eq!(gen.instances().count(), 2);
        let neighbors = gen.neighbors(room);
        assert_eq!(neighbors.len(), 1);
        let plug = gen.instance(neighbors[0]).unwrap();
        assert_eq!(plug.prefab().id(), "plug");
        assert_eq!(plug.connection_count(), 1);
        // Either a shared door at x = 2 or two doors at x = 2 and x = 3
        assert!(plug.point() == Point::new(2, 1) || plug.point() == Point::new(3, 1));

        let door = gen.cells().get(Point::new(2, 2)).unwrap();
        assert!(door.is_port_used());
        assert!(door.is_passable());
        assert!(gen.open_ports().is_empty());
    }

    #[test]
    fn test_overlap_needs_matching_types() {
        let mut gen = generator(LIBRARY, 12, 5);
        gen.place_prefab_at("box", Point::new(0, 1)).unwrap();
        let plug = gen.library().get("plug").unwrap().clone();
        let mut rng = StdRng::seed_from_u64(1);

        // Shared door: walls overlap walls
        let (instance, port) = gen
            .try_prefab(&plug, Point::new(2, 2), Point::WEST, true, &mut rng)
            .unwrap();
        assert_eq!(instance.point(), Point::new(2, 1));
        assert_eq!(port, Port::new(Point::new(2, 2), Point::WEST));
        assert_eq!(instance.replacements().count(), 2);

        // One cell further left puts the plug's floor on the box's door wall
        assert!(gen
            .try_prefab(&plug, Point::new(1, 2), Point::WEST, true, &mut rng)
            .is_none());
    }

    #[test]
    fn test_zero_weight_candidates_drop_the_port() {
        let lib = r#####"(prefabs: [
            (
                id: "box",
                tags: ["start"],
                tiles: ["###", "#.#", "###"],
                marks: ["   ", "  >", "   "],
            ),
            (
                id: "plug",
                tags: ["room"],
                weight: 0.0,
                tiles: ["###", "#.#", "###"],
                marks: ["   ", "<  ", "   "],
            ),
            (
                id: "plug_wide",
                tags: ["room"],
                weight: 0.0,
                tiles: ["####", "#..#", "####"],
                marks: ["    ", "<   ", "    "],
            ),
        ])"#####;
        let mut gen = generator(lib, 12, 5);
        let room = gen.place_prefab_at("box", Point::new(0, 1)).unwrap();
        let mut rng = StdRng::seed_from_u64(8);
        gen.grow_prefabs(5, &mut rng).unwrap();

        assert_eq!(gen.instances().count(), 1);
        assert!(gen.open_ports().is_empty());
        assert!(gen
            .instance(room)
            .unwrap()
            .is_port_unused(&Port::new(Point::new(2, 2), Point::EAST)));
    }

    #[test]
    fn test_max_instances_is_respected() {
        let lib = r####"(prefabs: [
            (
                id: "hall",
                tags: ["hall"],
                max_instances: Some(2),
                tiles: ["###", "...", "###"],
                marks: ["", "< >", ""],
            ),
        ])"####;
        let mut gen = generator(lib, 40, 3);
        gen.place_prefab_at("hall", Point::ZERO).unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        gen.grow_prefabs(20, &mut rng).unwrap();
        assert_eq!(gen.placement_count("hall"), 2);
        assert_eq!(gen.instances().count(), 2);
        assert!(gen
            .cells()
            .iter()
            .all(|(_, c)| c.basic_type != BasicType::Floor || c.flags.contains(CellFlags::ROOM)));
    }
}
