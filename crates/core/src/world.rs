//! In-memory world and structure used to drive ports outside a full game.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::{
    env::{NeighborQuery, PartHost, Role, StructureController},
    geometry::{BlockPos, Facing},
    resource::SharedHandler,
};

/// Notification a part sent to its host, in the order it was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    /// A block update was scheduled.
    BlockUpdate(BlockPos),
    /// The cell across `outward` was told about a state change.
    OutwardNeighborsNotified {
        /// Cell of the notifying part.
        pos: BlockPos,
        /// Face the notification went out through.
        outward: Facing,
    },
    /// Persisted state was flagged as changed.
    MarkedDirty(BlockPos),
    /// The model was marked for re-render.
    RenderUpdateMarked(BlockPos),
    /// A render refresh was requested.
    RenderUpdateRequested(BlockPos),
}

/// Minimal composite structure: an assembly flag and one reservoir.
pub struct Structure {
    assembled: bool,
    reservoir: SharedHandler,
    port_changes: usize,
}

impl Structure {
    /// Unassembled structure owning `reservoir`.
    pub fn new(reservoir: SharedHandler) -> Self {
        Self {
            assembled: false,
            reservoir,
            port_changes: 0,
        }
    }

    /// Mark the structure assembled.
    pub fn assemble(&mut self) {
        self.assembled = true;
    }

    /// Mark the structure broken.
    pub fn disassemble(&mut self) {
        self.assembled = false;
    }

    /// The reservoir regardless of assembly state.
    pub fn raw_reservoir(&self) -> &SharedHandler {
        &self.reservoir
    }

    /// Number of port-change callbacks received.
    pub fn port_changes(&self) -> usize {
        self.port_changes
    }
}

impl StructureController for Structure {
    fn is_assembled(&self) -> bool {
        self.assembled
    }

    fn reservoir(&self) -> Option<SharedHandler> {
        self.assembled.then(|| self.reservoir.clone())
    }

    fn on_fluid_port_changed(&mut self, port: BlockPos) {
        self.port_changes += 1;
        debug!(%port, changes = self.port_changes, "structure saw port change");
    }
}

struct EndpointCell {
    handler: SharedHandler,
    faces: Vec<Facing>,
}

/// Grid of resource endpoints plus the structure a part is attached to.
///
/// Every notification a part sends is recorded as a [`HostEvent`].
pub struct World {
    role: Role,
    structure: Option<Structure>,
    endpoints: HashMap<BlockPos, EndpointCell>,
    unloaded: HashSet<BlockPos>,
    events: Vec<HostEvent>,
}

impl World {
    /// Empty world running on `role`.
    pub fn new(role: Role) -> Self {
        Self {
            role,
            structure: None,
            endpoints: HashMap::new(),
            unloaded: HashSet::new(),
            events: Vec::new(),
        }
    }

    /// Empty authoritative world.
    pub fn authoritative() -> Self {
        Self::new(Role::Authoritative)
    }

    /// Empty presentation world.
    pub fn presentation() -> Self {
        Self::new(Role::Presentation)
    }

    /// Attach the part to `structure`, replacing any previous one.
    pub fn attach(&mut self, structure: Structure) -> Option<Structure> {
        self.structure.replace(structure)
    }

    /// Detach the part from its structure.
    pub fn detach(&mut self) -> Option<Structure> {
        self.structure.take()
    }

    /// Structure the part is attached to.
    pub fn structure(&self) -> Option<&Structure> {
        self.structure.as_ref()
    }

    /// Mutable access to the attached structure.
    pub fn structure_mut(&mut self) -> Option<&mut Structure> {
        self.structure.as_mut()
    }

    /// Place `handler` at `pos`, reachable through `faces`.
    pub fn place_endpoint(&mut self, pos: BlockPos, handler: SharedHandler, faces: &[Facing]) {
        self.unloaded.remove(&pos);
        self.endpoints.insert(
            pos,
            EndpointCell {
                handler,
                faces: faces.to_vec(),
            },
        );
    }

    /// Place `handler` at `pos`, reachable from every face.
    pub fn place_tank(&mut self, pos: BlockPos, handler: SharedHandler) {
        self.place_endpoint(pos, handler, &Facing::ALL);
    }

    /// Remove whatever sits at `pos`.
    pub fn remove_endpoint(&mut self, pos: BlockPos) -> Option<SharedHandler> {
        self.endpoints.remove(&pos).map(|cell| cell.handler)
    }

    /// Make `pos` unreachable without removing its contents.
    pub fn unload(&mut self, pos: BlockPos) {
        self.unloaded.insert(pos);
    }

    /// Notifications recorded so far.
    pub fn events(&self) -> &[HostEvent] {
        &self.events
    }

    /// Drain the recorded notifications.
    pub fn take_events(&mut self) -> Vec<HostEvent> {
        std::mem::take(&mut self.events)
    }
}

impl NeighborQuery for World {
    fn is_loaded(&self, pos: BlockPos) -> bool {
        !self.unloaded.contains(&pos)
    }

    fn endpoint(&self, pos: BlockPos, face: Facing) -> Option<SharedHandler> {
        if !self.is_loaded(pos) {
            return None;
        }
        self.endpoints
            .get(&pos)
            .filter(|cell| cell.faces.contains(&face))
            .map(|cell| cell.handler.clone())
    }
}

impl PartHost for World {
    fn role(&self) -> Role {
        self.role
    }

    fn controller(&self) -> Option<&dyn StructureController> {
        self.structure
            .as_ref()
            .map(|structure| structure as &dyn StructureController)
    }

    fn controller_mut(&mut self) -> Option<&mut dyn StructureController> {
        self.structure
            .as_mut()
            .map(|structure| structure as &mut dyn StructureController)
    }

    fn notify_block_update(&mut self, pos: BlockPos) {
        self.events.push(HostEvent::BlockUpdate(pos));
    }

    fn notify_outward_neighbors(&mut self, pos: BlockPos, outward: Facing) {
        self.events
            .push(HostEvent::OutwardNeighborsNotified { pos, outward });
    }

    fn mark_dirty(&mut self, pos: BlockPos) {
        self.events.push(HostEvent::MarkedDirty(pos));
    }

    fn mark_for_render_update(&mut self, pos: BlockPos) {
        self.events.push(HostEvent::RenderUpdateMarked(pos));
    }

    fn request_render_update(&mut self, pos: BlockPos) {
        self.events.push(HostEvent::RenderUpdateRequested(pos));
    }
}
