//! Post-growth passes: extra cycles, dead-end pruning, wall closing and
//! double-door cleanup

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::prefab::{InstanceId, Port, Tagged};
use crate::world::{BasicType, CellFlags, GeneratorCell, Grid, Point};

use super::Generator;

impl Generator {
    /// Join open ports that ended up touching a compatible port of another
    /// instance, up to `max_cycles` joins
    pub fn connect_adjacent_ports(&mut self, max_cycles: usize, rng: &mut StdRng) {
        let mut by_point: BTreeMap<Point, (InstanceId, Port)> = BTreeMap::new();
        for &(id, port) in &self.zero_ports {
            if self.is_open(id, &port) {
                by_point.insert(port.point, (id, port));
            }
        }

        let mut candidates = self.open_ports.clone();
        candidates.shuffle(rng);

        let mut cycles = 0;
        for (id, port) in candidates {
            if cycles >= max_cycles {
                break;
            }
            if !self.is_open(id, &port) || !self.has_budget(id) {
                continue;
            }
            let facing = port.facing();
            if let Some(&(other_id, other_port)) = by_point.get(&facing) {
                let opposed = other_port.is_zero() || other_port.direction == -port.direction;
                if other_id != id
                    && opposed
                    && self.is_open(other_id, &other_port)
                    && self.has_budget(other_id)
                {
                    by_point.remove(&facing);
                    self.link(
                        (id, port),
                        (other_id, other_port),
                        CellFlags::CREATED_TO_ADD_CYCLE,
                    );
                    cycles += 1;
                    continue;
                }
            }
            by_point.insert(port.point, (id, port));
        }
        log::info!("connectAdjacentPorts: added {} cycles (max {})", cycles, max_cycles);
    }

    fn has_budget(&self, id: InstanceId) -> bool {
        self.instance(id).is_some_and(|i| i.available_ports() > 0)
    }

    /// Repeatedly delete instances tagged `tag` that have exactly one
    /// connection, then rebuild the grid from what's left
    pub fn remove_dead_ends(&mut self, tag: &str) {
        let mut removed = 0;
        loop {
            let dead: Vec<InstanceId> = self
                .instances()
                .filter(|(_, i)| i.connection_count() == 1 && i.prefab().matches(tag))
                .map(|(id, _)| id)
                .collect();
            if dead.is_empty() {
                break;
            }
            for id in dead {
                self.remove_instance(id);
                removed += 1;
            }
        }
        self.rebuild_port_lists();
        self.recommit_everything();
        log::info!("removeDeadEnds: removed {} '{}' instances", removed, tag);
    }

    /// Close every passable cell off with walls, then demote doors that
    /// no longer join exactly two passable cells
    pub fn add_walls_next_to_bare_floor(&mut self) {
        let passable = self.cells.points_where(|_, c| c.is_passable());
        let mut walled = 0;
        for point in passable {
            for neighbor in point.all_neighbors() {
                if let Some(cell) = self.cells.get_mut(neighbor) {
                    if cell.is_empty() {
                        cell.basic_type = BasicType::Wall;
                        walled += 1;
                    }
                }
            }
        }

        // Demoting one door can break the door next to it, so run to a fixpoint
        let mut demoted = 0;
        loop {
            let broken = self
                .cells
                .points_where(|p, c| c.is_port_used() && passable_neighbors(&self.cells, p) != 2);
            if broken.is_empty() {
                break;
            }
            for point in broken {
                if let Some(cell) = self.cells.get_mut(point) {
                    cell.release_port();
                    demoted += 1;
                }
            }
        }
        log::info!(
            "addWallsNextToBareFloor: walled {} cells, demoted {} doors",
            walled,
            demoted
        );
    }

    /// Hide one of each pair of orthogonally adjacent visible doors
    pub fn remove_double_doors(&mut self) {
        let doors = self.cells.points_where(|_, c| is_visible_door(c));
        let mut hidden = 0;
        for point in doors {
            if !self.cells.get(point).is_some_and(is_visible_door) {
                continue;
            }
            let doubled = point
                .orthogonal_neighbors()
                .any(|n| self.cells.get(n).is_some_and(is_visible_door));
            if doubled {
                if let Some(cell) = self.cells.get_mut(point) {
                    cell.flags.insert(CellFlags::INVISIBLE_DOOR);
                    hidden += 1;
                }
            }
        }
        log::info!("removeDoubleDoors: hid {} doors", hidden);
    }
}

fn is_visible_door(cell: &GeneratorCell) -> bool {
    cell.is_port_used() && !cell.flags.contains(CellFlags::INVISIBLE_DOOR)
}

fn passable_neighbors(cells: &Grid<GeneratorCell>, point: Point) -> usize {
    point
        .orthogonal_neighbors()
        .filter(|n| cells.get(*n).is_some_and(GeneratorCell::is_passable))
        .count()
}
