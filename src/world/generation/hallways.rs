//! Late-stage hallway injection
//!
//! Finds unused ports far away from any existing loop and digs a short
//! corridor from one of them to another unused port that is far away
//! through the existing rooms but close through empty space.

use crate::prefab::Port;
use crate::world::{BasicType, CellFlags, DistanceField, GeneratorCell, PoiDefinition, Point};

use super::Generator;

fn passable_or_port(cell: &GeneratorCell) -> bool {
    cell.is_passable() || cell.is_port_unused()
}

impl Generator {
    /// Make `count` attempts, each trying up to `iterations` origins
    pub fn add_hallways_to_remote_areas(&mut self, count: usize, iterations: usize) {
        let mut added = 0;
        for _ in 0..count {
            if self.add_hallway_to_port_furthest_from_a_cycle(iterations) {
                added += 1;
            }
        }
        log::info!("addHallwaysToRemoteAreas: added {} of {} hallways", added, count);
    }

    fn add_hallway_to_port_furthest_from_a_cycle(&mut self, iterations: usize) -> bool {
        let mut seeds = self
            .cells
            .points_where(|_, c| c.flags.contains(CellFlags::CREATED_TO_ADD_CYCLE));
        if seeds.is_empty() {
            match self.cells.points_where(|_, c| c.is_port_used()).first() {
                Some(first) => seeds.push(*first),
                None => {
                    log::warn!("No doors to measure remoteness from, skipping hallways");
                    return false;
                }
            }
        }

        let mut field = DistanceField::new(self.cells.width(), self.cells.height());
        field.populate(&seeds, |p| self.cells.get(p).is_some_and(passable_or_port));

        let mut added = false;
        for _ in 0..iterations {
            let origin = field.find_maximum(|p| {
                !self.hallway_attempts.contains(&p) && self.is_exposed_port(p)
            });
            let Some(origin) = origin else {
                log::debug!("No remote ports left to try");
                break;
            };
            self.hallway_attempts.insert(origin);
            if self.add_hallway_to_nearest_unused_port(origin) {
                added = true;
                break;
            }
        }
        self.debug_distance_field = Some(field);
        added
    }

    /// Unused port with empty space on at least one side
    fn is_exposed_port(&self, point: Point) -> bool {
        self.cells.get(point).is_some_and(GeneratorCell::is_port_unused)
            && point
                .orthogonal_neighbors()
                .any(|n| self.cells.get(n).is_some_and(GeneratorCell::is_empty))
    }

    /// Route from `origin` towards the nearest acceptable unused port,
    /// carving the path only if the whole route fits
    fn add_hallway_to_nearest_unused_port(&mut self, origin: Point) -> bool {
        let (width, height) = (self.cells.width(), self.cells.height());

        let mut reach = DistanceField::new(width, height);
        reach.populate(&[origin], |p| self.cells.get(p).is_some_and(passable_or_port));

        let min_distance = self.config.hallway_min_port_distance;
        let targets = self.cells.points_where(|p, c| {
            p != origin
                && c.is_port_unused()
                && reach.get(p).map_or(true, |d| d > min_distance)
        });
        if targets.is_empty() {
            log::debug!("No far ports to route to from {:?}", origin);
            return false;
        }

        let mut route = DistanceField::new(width, height);
        route.populate(&targets, |p| {
            self.cells
                .get(p)
                .is_some_and(|c| c.is_empty() || c.is_floor())
        });
        route.set(origin, route.max_val() + 1);

        let Some((path, destination)) = self.walk_route(&route, origin) else {
            return false;
        };
        self.carve_hallway(origin, &path, destination);
        log::debug!(
            "Carved {}-cell hallway from {:?} to {:?}",
            path.len(),
            origin,
            destination
        );
        true
    }

    /// Greedy descent through `route`. Returns the cells to carve and the
    /// floor or port cell the walk ended on.
    fn walk_route(&self, route: &DistanceField, origin: Point) -> Option<(Vec<Point>, Point)> {
        let mut path = Vec::new();
        let mut current = origin;
        loop {
            let value = route.get(current)?;
            let next = current
                .orthogonal_neighbors()
                .filter_map(|n| route.get(n).map(|v| (n, v)))
                .filter(|(_, v)| *v < value)
                // The first step must leave the origin's prefab
                .filter(|(n, _)| {
                    current != origin || self.cells.get(*n).is_some_and(GeneratorCell::is_empty)
                })
                .min_by_key(|(_, v)| *v)
                .map(|(n, _)| n)?;

            let cell = self.cells.get(next)?;
            if cell.is_floor() || cell.is_port_unused() {
                return Some((path, next));
            }
            path.push(next);
            if path.len() > self.config.max_hallway_length {
                log::debug!("Hallway from {:?} too long, abandoning", origin);
                return None;
            }
            current = next;
        }
    }

    fn carve_hallway(&mut self, origin: Point, path: &[Point], destination: Point) {
        let endpoint = CellFlags::CREATED_TO_ADD_CYCLE
            | CellFlags::LATE_STAGE_HALLWAY
            | CellFlags::DEBUG_POINT;

        self.mark_hallway_door(origin, endpoint);
        if self.cells.get(destination).is_some_and(GeneratorCell::is_port_unused) {
            self.mark_hallway_door(destination, endpoint);
        } else if let Some(cell) = self.cells.get_mut(destination) {
            cell.flags.insert(CellFlags::LATE_STAGE_HALLWAY);
        }

        let mut previous = origin;
        for point in path {
            let direction = *point - previous;
            if let Some(cell) = self.cells.get_mut(*point) {
                cell.basic_type = BasicType::Floor;
                cell.flags
                    .insert(CellFlags::CREATED_TO_ADD_CYCLE | CellFlags::LATE_STAGE_HALLWAY);
                cell.port_direction = Some(direction.rotated_cw());
            }
            previous = *point;
        }

        for point in [origin, destination] {
            self.claim_ports_at(point);
        }
    }

    /// Hand the doors at `point` over to a hallway: the owning instances
    /// stop offering them and neither port queue keeps them
    fn claim_ports_at(&mut self, point: Point) {
        for instance in self.instances.iter_mut().flatten() {
            let claimed: Vec<Port> = instance
                .unused_ports()
                .iter()
                .filter(|p| p.point == point)
                .copied()
                .collect();
            for port in claimed {
                instance.claim_port(port);
            }
        }
        self.open_ports.retain(|(_, port)| port.point != point);
        self.zero_ports.retain(|(_, port)| port.point != point);
    }

    fn mark_hallway_door(&mut self, point: Point, flags: CellFlags) {
        if let Some(cell) = self.cells.get_mut(point) {
            cell.use_port();
            cell.flags.insert(flags);
            cell.poi = Some(PoiDefinition::hall());
        }
    }
}
