//! Placed prefabs and the connections between them
//!
//! Instances live in an arena owned by the generator. Connections refer to
//! their two endpoints by `InstanceId`, so neither side keeps the other
//! alive and deleting an instance never leaves a dangling reference.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::world::{GeneratorCell, Grid, Point, Rect};

use super::template::{Port, Prefab};

/// Index of an instance in the generator's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub usize);

/// Index of a connection in the generator's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub usize);

/// An edge between exactly two instances
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefabConnection {
    pub a: InstanceId,
    pub b: InstanceId,
    /// Absolute port on `a`
    pub port_a: Port,
    /// Absolute port on `b`
    pub port_b: Port,
}

impl PrefabConnection {
    pub fn new(a: InstanceId, port_a: Port, b: InstanceId, port_b: Port) -> Self {
        Self { a, b, port_a, port_b }
    }

    /// The other endpoint, or `None` if `instance` isn't part of this edge
    pub fn neighbor(&self, instance: InstanceId) -> Option<InstanceId> {
        if instance == self.a {
            Some(self.b)
        } else if instance == self.b {
            Some(self.a)
        } else {
            None
        }
    }
}

/// A mutable copy of a template placed at a grid offset
#[derive(Clone)]
pub struct PrefabInstance {
    prefab: Arc<Prefab>,
    point: Point,
    /// Local copy of the template cells, in template coordinates
    cells: Grid<GeneratorCell>,
    connections: BTreeMap<Port, ConnectionId>,
    /// Absolute-coordinate overrides for cells shared with earlier instances
    replacements: BTreeMap<Point, GeneratorCell>,
    used_ports: Vec<Port>,
    unused_ports: Vec<Port>,
}

impl PrefabInstance {
    /// Place a template with its origin at `point`
    pub fn new(prefab: Arc<Prefab>, point: Point) -> Self {
        let cells = prefab.cells().clone();
        let unused_ports = prefab.ports().iter().map(|p| p.moved(point)).collect();
        Self {
            prefab,
            point,
            cells,
            connections: BTreeMap::new(),
            replacements: BTreeMap::new(),
            used_ports: Vec::new(),
            unused_ports,
        }
    }

    /// Place a template so that its template-relative `port` lands on `target`
    pub fn aligned(prefab: Arc<Prefab>, port: Port, target: Point) -> (Self, Port) {
        // Port at (1, 1) aimed at (1, 10) puts the origin at (0, 9)
        let origin = target - port.point;
        let instance = Self::new(prefab, origin);
        (instance, port.moved(origin))
    }

    pub fn prefab(&self) -> &Arc<Prefab> {
        &self.prefab
    }

    pub fn point(&self) -> Point {
        self.point
    }

    /// Template rect translated to the instance's offset
    pub fn rect(&self) -> Rect {
        self.prefab.rect().moved_to(self.point)
    }

    /// Every port in absolute coordinates
    pub fn ports(&self) -> Vec<Port> {
        self.prefab.ports().iter().map(|p| p.moved(self.point)).collect()
    }

    pub fn used_ports(&self) -> &[Port] {
        &self.used_ports
    }

    pub fn unused_ports(&self) -> &[Port] {
        &self.unused_ports
    }

    pub fn is_port_unused(&self, port: &Port) -> bool {
        self.unused_ports.contains(port)
    }

    pub fn connections(&self) -> impl Iterator<Item = (&Port, &ConnectionId)> {
        self.connections.iter()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Ports that can still take a connection, capped by the template budget
    pub fn available_ports(&self) -> usize {
        let unused = self.unused_ports.len();
        match self.prefab.metadata.max_connections {
            Some(max) => unused.min(max.saturating_sub(self.connections.len())),
            None => unused,
        }
    }

    /// Absolute points of every non-empty template cell
    pub fn live_points(&self) -> Vec<Point> {
        self.cells
            .iter()
            .filter(|(_, cell)| !cell.is_empty())
            .map(|(local, _)| local + self.point)
            .collect()
    }

    /// The cell this instance contributes at an absolute point
    pub fn generator_cell(&self, at: Point) -> Option<GeneratorCell> {
        if let Some(cell) = self.replacements.get(&at) {
            return Some(cell.clone());
        }
        self.cells.get(at - self.point).cloned()
    }

    /// Apply `f` to the instance's own cell at an absolute point
    pub fn update_cell<F>(&mut self, at: Point, f: F)
    where
        F: FnOnce(&mut GeneratorCell),
    {
        if let Some(cell) = self.cells.get_mut(at - self.point) {
            f(cell);
        }
    }

    /// Defer to an earlier instance at `at`: drop our port there, if any,
    /// and record the override cell
    pub fn add_replacement(&mut self, at: Point) {
        let Some(mut cell) = self.cells.get(at - self.point).cloned() else {
            return;
        };
        cell.strip_port();
        self.unused_ports.retain(|p| p.point != at);
        self.replacements.insert(at, cell);
    }

    pub fn replacements(&self) -> impl Iterator<Item = (&Point, &GeneratorCell)> {
        self.replacements.iter()
    }

    /// Record a connection through one of our ports; the port becomes used
    pub fn connect(&mut self, connection: ConnectionId, port: Port) {
        self.claim_port(port);
        self.connections.insert(port, connection);
    }

    /// Mark a port used without an edge behind it
    pub fn claim_port(&mut self, port: Port) {
        self.unused_ports.retain(|p| *p != port);
        if !self.used_ports.contains(&port) {
            self.used_ports.push(port);
        }
        self.update_cell(port.point, GeneratorCell::use_port);
    }

    /// Drop one connection; its port reverts to unused
    pub fn disconnect(&mut self, connection: ConnectionId) -> Option<Port> {
        let port = self
            .connections
            .iter()
            .find(|(_, c)| **c == connection)
            .map(|(p, _)| *p)?;
        self.connections.remove(&port);
        self.release(port);
        Some(port)
    }

    /// Drop every connection, returning their ids so the caller can
    /// detach the other endpoints. Grid cells are not touched.
    pub fn disconnect_from_all(&mut self) -> Vec<ConnectionId> {
        let connections: Vec<(Port, ConnectionId)> =
            std::mem::take(&mut self.connections).into_iter().collect();
        for (port, _) in &connections {
            self.release(*port);
        }
        connections.into_iter().map(|(_, c)| c).collect()
    }

    fn release(&mut self, port: Port) {
        self.used_ports.retain(|p| *p != port);
        if !self.unused_ports.contains(&port) {
            self.unused_ports.push(port);
        }
        self.update_cell(port.point, GeneratorCell::release_port);
    }
}

impl fmt::Debug for PrefabInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrefabInstance(prefab={}, point={:?})", self.prefab.id(), self.point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefab::template::PrefabDefinition;
    use crate::world::CellFlags;

    fn room(max_connections: Option<usize>) -> Arc<Prefab> {
        let def = PrefabDefinition {
            id: "room".to_string(),
            tags: vec!["room".to_string()],
            weight: 1.0,
            neighbor_tags: vec!["*".to_string()],
            max_instances: None,
            max_connections,
            has_doors: false,
            poi: Vec::new(),
            tiles: vec!["###".into(), "#.#".into(), "###".into()],
            marks: vec!["   ".into(), "< >".into(), "   ".into()],
        };
        Arc::new(Prefab::from_definition(def).unwrap())
    }

    #[test]
    fn test_aligned_placement() {
        let prefab = room(None);
        let west = Port::new(Point::new(0, 1), Point::WEST);
        let (instance, absolute) = PrefabInstance::aligned(prefab, west, Point::new(10, 5));
        assert_eq!(instance.point(), Point::new(10, 4));
        assert_eq!(absolute, Port::new(Point::new(10, 5), Point::WEST));
        assert_eq!(instance.rect(), Rect::new(10, 4, 3, 3));
        assert_eq!(instance.live_points().len(), 9);
    }

    #[test]
    fn test_connect_and_disconnect() {
        let mut instance = PrefabInstance::new(room(None), Point::new(2, 2));
        let east = Port::new(Point::new(4, 3), Point::EAST);
        assert_eq!(instance.available_ports(), 2);

        instance.connect(ConnectionId(0), east);
        assert_eq!(instance.used_ports(), &[east]);
        assert_eq!(instance.available_ports(), 1);
        let cell = instance.generator_cell(east.point).unwrap();
        assert!(cell.flags.contains(CellFlags::PORT_USED));
        assert!(!cell.flags.contains(CellFlags::PORT_UNUSED));

        assert_eq!(instance.disconnect(ConnectionId(0)), Some(east));
        assert!(instance.is_port_unused(&east));
        assert!(instance.generator_cell(east.point).unwrap().is_port_unused());
        assert_eq!(instance.disconnect(ConnectionId(0)), None);
    }

    #[test]
    fn test_disconnect_from_all() {
        let mut instance = PrefabInstance::new(room(None), Point::ZERO);
        let ports = instance.ports();
        instance.connect(ConnectionId(3), ports[0]);
        instance.connect(ConnectionId(4), ports[1]);
        let mut released = instance.disconnect_from_all();
        released.sort();
        assert_eq!(released, vec![ConnectionId(3), ConnectionId(4)]);
        assert_eq!(instance.connection_count(), 0);
        assert_eq!(instance.unused_ports().len(), 2);
    }

    #[test]
    fn test_connection_budget() {
        let mut instance = PrefabInstance::new(room(Some(1)), Point::ZERO);
        assert_eq!(instance.available_ports(), 1);
        let port = instance.ports()[0];
        instance.connect(ConnectionId(0), port);
        assert_eq!(instance.available_ports(), 0);
    }

    #[test]
    fn test_replacement_drops_port() {
        let mut instance = PrefabInstance::new(room(None), Point::ZERO);
        let west = Point::new(0, 1);
        instance.add_replacement(west);
        assert_eq!(instance.unused_ports().len(), 1);
        let cell = instance.generator_cell(west).unwrap();
        assert!(cell.port_direction.is_none());
        assert!(!cell.is_port_unused());
    }

    #[test]
    fn test_connection_neighbor() {
        let port = Port::new(Point::ZERO, Point::EAST);
        let conn = PrefabConnection::new(InstanceId(1), port, InstanceId(2), port);
        assert_eq!(conn.neighbor(InstanceId(1)), Some(InstanceId(2)));
        assert_eq!(conn.neighbor(InstanceId(2)), Some(InstanceId(1)));
        assert_eq!(conn.neighbor(InstanceId(3)), None);
    }
}
