//! Connection discovery and capability exposure for a single port.

use std::sync::{Arc, Weak};

use tracing::{debug, trace};

use crate::{
    env::PartHost,
    geometry::{BlockPos, Facing},
    io::{IoDirection, IoMode},
    resource::{PortKind, ResourceHandler, ResourceStack, SharedHandler, TransferAction},
};

/// Live grant backing a [`PortCapability`]. Owned by the handler only.
struct CapabilityGrant {
    target: SharedHandler,
    direction: IoDirection,
}

/// Revocable transfer access handed to the neighbor of a port.
///
/// Input ports admit fills and Output ports admit drains, never both. Once
/// the owning handler revokes the grant every operation reports nothing.
#[derive(Clone)]
pub struct PortCapability {
    kind: PortKind,
    grant: Weak<CapabilityGrant>,
}

impl PortCapability {
    /// Whether the grant behind this handle is still live.
    pub fn is_valid(&self) -> bool {
        self.grant.strong_count() > 0
    }

    /// Direction the port had when the grant was issued.
    pub fn direction(&self) -> Option<IoDirection> {
        self.grant.upgrade().map(|grant| grant.direction)
    }
}

impl std::fmt::Debug for PortCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortCapability")
            .field("kind", &self.kind)
            .field("valid", &self.is_valid())
            .finish()
    }
}

impl ResourceHandler for PortCapability {
    fn kind(&self) -> PortKind {
        self.kind
    }

    fn contents(&self) -> Option<ResourceStack> {
        let grant = self.grant.upgrade()?;
        let contents = grant.target.read().contents();
        contents
    }

    fn capacity(&self) -> u64 {
        self.grant
            .upgrade()
            .map(|grant| grant.target.read().capacity())
            .unwrap_or(0)
    }

    fn fill(&mut self, stack: &ResourceStack, action: TransferAction) -> u64 {
        match self.grant.upgrade() {
            Some(grant) if grant.direction.is_input() => grant.target.write().fill(stack, action),
            _ => 0,
        }
    }

    fn drain(&mut self, max: u64, action: TransferAction) -> Option<ResourceStack> {
        let grant = self.grant.upgrade()?;
        if !grant.direction.is_output() {
            return None;
        }
        let drained = grant.target.write().drain(max, action);
        drained
    }
}

/// Decides whether a port is usable and gates neighbor access accordingly.
pub struct PortConnectionHandler {
    kind: PortKind,
    mode: IoMode,
    outward: Facing,
    connected: bool,
    capability: Option<Arc<CapabilityGrant>>,
}

impl PortConnectionHandler {
    /// Handler for a port of `kind` facing `outward`.
    pub fn new(kind: PortKind, mode: IoMode, outward: Facing) -> Self {
        Self {
            kind,
            mode,
            outward,
            connected: false,
            capability: None,
        }
    }

    /// Kind of resource the port carries.
    pub fn kind(&self) -> PortKind {
        self.kind
    }

    /// Mode the handler was created with.
    pub fn mode(&self) -> IoMode {
        self.mode
    }

    /// Face the port exposes to the world.
    pub fn outward(&self) -> Facing {
        self.outward
    }

    /// Whether a compatible endpoint sits across the outward face.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Re-run neighbor discovery and refresh the capability if the result changed.
    pub fn check_connections<H>(&mut self, host: &H, position: BlockPos, direction: IoDirection)
    where
        H: PartHost + ?Sized,
    {
        let was_connected = self.connected;
        self.connected = self.lookup(host, position);
        if was_connected != self.connected {
            debug!(
                %position,
                connected = self.connected,
                kind = self.kind.label(),
                "port connection changed"
            );
            self.refresh(host, direction);
        }
    }

    /// Recompute the capability from the current connection state, direction
    /// and structure. The neighbor cell is not consulted.
    ///
    /// Calling this again with nothing changed keeps the same live grant.
    pub fn update<H>(&mut self, host: &H, direction: IoDirection)
    where
        H: PartHost + ?Sized,
    {
        self.refresh(host, direction);
    }

    /// Re-run neighbor discovery, then [`update`](Self::update) unconditionally.
    ///
    /// Used when the topology changed under the port: assembly, breaking,
    /// attaching, merging or detaching.
    pub fn recheck<H>(&mut self, host: &H, position: BlockPos, direction: IoDirection)
    where
        H: PartHost + ?Sized,
    {
        self.connected = self.lookup(host, position);
        self.update(host, direction);
    }

    /// Handle for `kind` on `side`, present only on the outward face of a
    /// connected port whose structure exposes a reservoir.
    pub fn capability(&self, kind: PortKind, side: Option<Facing>) -> Option<PortCapability> {
        if side != Some(self.outward) || kind != self.kind || !self.connected {
            return None;
        }
        self.capability.as_ref().map(|grant| PortCapability {
            kind: self.kind,
            grant: Arc::downgrade(grant),
        })
    }

    /// Revoke any exposed handle. Safe to call repeatedly.
    pub fn invalidate(&mut self) {
        if self.capability.take().is_some() {
            trace!(kind = self.kind.label(), "port capability invalidated");
        }
    }

    fn lookup<H>(&self, host: &H, position: BlockPos) -> bool
    where
        H: PartHost + ?Sized,
    {
        let target = position.offset(self.outward);
        if !host.is_loaded(target) {
            return false;
        }
        host.endpoint(target, self.outward.opposite())
            .map(|endpoint| endpoint.read().kind() == self.kind)
            .unwrap_or(false)
    }

    fn refresh<H>(&mut self, host: &H, direction: IoDirection)
    where
        H: PartHost + ?Sized,
    {
        let reservoir = if self.connected {
            host.controller()
                .filter(|controller| controller.is_assembled())
                .and_then(|controller| controller.reservoir())
                .filter(|reservoir| reservoir.read().kind() == self.kind)
        } else {
            None
        };

        let Some(reservoir) = reservoir else {
            self.invalidate();
            return;
        };
        let unchanged = self.capability.as_ref().is_some_and(|grant| {
            grant.direction == direction && Arc::ptr_eq(&grant.target, &reservoir)
        });
        if unchanged {
            return;
        }

        trace!(direction = direction.label(), "port capability issued");
        self.capability = Some(Arc::new(CapabilityGrant {
            target: reservoir,
            direction,
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        resource::{shared, Reservoir},
        world::{Structure, World},
    };

    const PORT: BlockPos = BlockPos::new(0, 0, 0);

    fn assembled_world(kind: PortKind) -> World {
        let mut world = World::authoritative();
        let mut structure = Structure::new(shared(Reservoir::with_contents(
            kind,
            1_000,
            ResourceStack::new("steam", 500),
        )));
        structure.assemble();
        world.attach(structure);
        world
    }

    #[test]
    fn connects_only_to_matching_kind_on_the_opposite_face() {
        let mut world = assembled_world(PortKind::Gas);
        let mut handler = PortConnectionHandler::new(PortKind::Gas, IoMode::Passive, Facing::East);
        let neighbor = PORT.offset(Facing::East);

        world.place_endpoint(neighbor, shared(Reservoir::new(PortKind::Liquid, 100)), &Facing::ALL);
        handler.check_connections(&world, PORT, IoDirection::Input);
        assert!(!handler.is_connected());

        world.place_endpoint(neighbor, shared(Reservoir::new(PortKind::Gas, 100)), &[Facing::North]);
        handler.check_connections(&world, PORT, IoDirection::Input);
        assert!(!handler.is_connected());

        world.place_endpoint(neighbor, shared(Reservoir::new(PortKind::Gas, 100)), &[Facing::West]);
        handler.check_connections(&world, PORT, IoDirection::Input);
        assert!(handler.is_connected());
        assert!(handler.capability(PortKind::Gas, Some(Facing::East)).is_some());
    }

    #[test]
    fn unloaded_neighbor_is_not_a_connection() {
        let mut world = assembled_world(PortKind::Gas);
        let neighbor = PORT.offset(Facing::Up);
        world.place_tank(neighbor, shared(Reservoir::new(PortKind::Gas, 100)));
        world.unload(neighbor);

        let mut handler = PortConnectionHandler::new(PortKind::Gas, IoMode::Passive, Facing::Up);
        handler.check_connections(&world, PORT, IoDirection::Input);
        assert!(!handler.is_connected());
    }

    #[test]
    fn capability_queries_off_face_or_kind_are_empty() {
        let mut world = assembled_world(PortKind::Gas);
        world.place_tank(PORT.offset(Facing::East), shared(Reservoir::new(PortKind::Gas, 100)));
        let mut handler = PortConnectionHandler::new(PortKind::Gas, IoMode::Passive, Facing::East);
        handler.recheck(&world, PORT, IoDirection::Input);

        assert!(handler.capability(PortKind::Gas, Some(Facing::East)).is_some());
        assert!(handler.capability(PortKind::Gas, Some(Facing::West)).is_none());
        assert!(handler.capability(PortKind::Gas, None).is_none());
        assert!(handler.capability(PortKind::Liquid, Some(Facing::East)).is_none());
    }

    #[test]
    fn update_is_idempotent_and_direction_change_reissues() {
        let mut world = assembled_world(PortKind::Gas);
        world.place_tank(PORT.offset(Facing::East), shared(Reservoir::new(PortKind::Gas, 100)));
        let mut handler = PortConnectionHandler::new(PortKind::Gas, IoMode::Passive, Facing::East);

        handler.recheck(&world, PORT, IoDirection::Input);
        let first = handler.capability(PortKind::Gas, Some(Facing::East)).expect("capability");
        handler.update(&world, IoDirection::Input);
        handler.update(&world, IoDirection::Input);
        assert!(first.is_valid());

        handler.update(&world, IoDirection::Output);
        assert!(!first.is_valid());
        let second = handler.capability(PortKind::Gas, Some(Facing::East)).expect("capability");
        assert_eq!(second.direction(), Some(IoDirection::Output));
    }

    #[test]
    fn invalidate_revokes_until_next_update() {
        let mut world = assembled_world(PortKind::Gas);
        world.place_tank(PORT.offset(Facing::East), shared(Reservoir::new(PortKind::Gas, 100)));
        let mut handler = PortConnectionHandler::new(PortKind::Gas, IoMode::Passive, Facing::East);
        handler.recheck(&world, PORT, IoDirection::Input);
        let held = handler.capability(PortKind::Gas, Some(Facing::East)).expect("capability");

        handler.invalidate();
        handler.invalidate();
        assert!(handler.is_connected());
        assert!(handler.capability(PortKind::Gas, Some(Facing::East)).is_none());
        assert!(!held.is_valid());

        handler.check_connections(&world, PORT, IoDirection::Input);
        assert!(handler.capability(PortKind::Gas, Some(Facing::East)).is_none());

        handler.update(&world, IoDirection::Input);
        assert!(handler.capability(PortKind::Gas, Some(Facing::East)).is_some());
    }

    #[test]
    fn update_keeps_connection_state_without_a_recheck() {
        let mut world = assembled_world(PortKind::Gas);
        let mut handler = PortConnectionHandler::new(PortKind::Gas, IoMode::Passive, Facing::East);
        handler.recheck(&world, PORT, IoDirection::Input);
        assert!(!handler.is_connected());

        world.place_tank(PORT.offset(Facing::East), shared(Reservoir::new(PortKind::Gas, 100)));
        handler.update(&world, IoDirection::Output);
        assert!(!handler.is_connected());
        assert!(handler.capability(PortKind::Gas, Some(Facing::East)).is_none());

        handler.recheck(&world, PORT, IoDirection::Output);
        assert!(handler.is_connected());
        assert!(handler.capability(PortKind::Gas, Some(Facing::East)).is_some());
    }

    #[test]
    fn handle_admits_only_the_direction_it_was_issued_for() {
        let mut world = assembled_world(PortKind::Gas);
        world.place_tank(PORT.offset(Facing::East), shared(Reservoir::new(PortKind::Gas, 100)));
        let mut handler = PortConnectionHandler::new(PortKind::Gas, IoMode::Passive, Facing::East);
        let steam = ResourceStack::new("steam", 10);

        handler.recheck(&world, PORT, IoDirection::Input);
        let mut input = handler.capability(PortKind::Gas, Some(Facing::East)).expect("capability");
        assert_eq!(input.fill(&steam, TransferAction::Execute), 10);
        assert_eq!(input.drain(10, TransferAction::Execute), None);

        handler.update(&world, IoDirection::Output);
        let mut output = handler.capability(PortKind::Gas, Some(Facing::East)).expect("capability");
        assert_eq!(output.fill(&steam, TransferAction::Execute), 0);
        assert_eq!(output.drain(10, TransferAction::Execute).map(|s| s.amount), Some(10));

        assert_eq!(input.fill(&steam, TransferAction::Execute), 0);
        assert_eq!(input.contents(), None);
        assert_eq!(input.capacity(), 0);
    }
}
