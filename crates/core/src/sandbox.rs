//! A single port on a single structure, with one neighbor cell to play with.
//!
//! The sandbox owns the authoritative side: it applies user commands as the
//! lifecycle events a real structure would fire and steps the simulation.

use tracing::info;

use crate::{
    config::AppConfig,
    env::{PartHost, StructureController},
    geometry::{BlockPos, Facing},
    io::{IoMode, SyncData},
    port::{FluidPort, PortStatus},
    resource::{shared, PortKind, Reservoir, ResourceStack, SharedHandler, TransferAction},
    snapshot::SandboxState,
    transfer,
    world::{HostEvent, Structure, World},
};

/// Cell the sandbox port occupies.
pub const PORT_POSITION: BlockPos = BlockPos::new(0, 0, 0);
/// Face the sandbox port exposes.
pub const PORT_FACING: Facing = Facing::East;

/// What happened during one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepReport {
    /// Step counter after this step.
    pub tick: u64,
    /// Amount the port pushed into the neighbor.
    pub pushed: u64,
    /// Amount the neighbor pumped into the structure through the port.
    pub pumped: u64,
}

/// Fill level of one tank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TankLevel {
    /// Kind of resource held.
    pub kind: PortKind,
    /// Amount stored.
    pub amount: u64,
    /// Capacity.
    pub capacity: u64,
}

impl TankLevel {
    fn of(handler: &SharedHandler) -> Self {
        let handler = handler.read();
        Self {
            kind: handler.kind(),
            amount: handler.contents().map(|stack| stack.amount).unwrap_or(0),
            capacity: handler.capacity(),
        }
    }
}

/// Everything the frontend shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SandboxView {
    /// Port status.
    pub status: PortStatus,
    /// Whether the port is attached to the structure.
    pub attached: bool,
    /// Structure reservoir.
    pub reservoir: TankLevel,
    /// Neighbor tank, if placed.
    pub neighbor: Option<TankLevel>,
    /// Steps run so far.
    pub tick: u64,
}

struct Layout<'a> {
    assembled: bool,
    attached: bool,
    port: &'a SyncData,
}

/// Authoritative simulation of one port.
pub struct Sandbox {
    world: World,
    port: FluidPort,
    reservoir: SharedHandler,
    detached: Option<Structure>,
    neighbor: Option<SharedHandler>,
    resource: String,
    neighbor_capacity: u64,
    pump_rate: u64,
    tick: u64,
}

impl Sandbox {
    /// Assembled structure with an attached input port and a half-full neighbor.
    pub fn new(config: &AppConfig) -> Self {
        let kind = config.port_kind;
        let reservoir = shared(Reservoir::with_contents(
            kind,
            config.reservoir_capacity,
            ResourceStack::new(config.resource.clone(), config.initial_reservoir),
        ));
        let neighbor = shared(Reservoir::with_contents(
            kind,
            config.neighbor_capacity,
            ResourceStack::new(config.resource.clone(), config.neighbor_capacity / 2),
        ));
        let layout = Layout {
            assembled: true,
            attached: true,
            port: &SyncData::new(),
        };
        let mut sandbox = Self::build(config, reservoir, Some(neighbor), layout);
        sandbox.world.take_events();
        sandbox
    }

    /// Rebuild a sandbox from a snapshot.
    pub fn restore(config: &AppConfig, state: &SandboxState) -> Self {
        let reservoir = shared(state.reservoir.clone());
        let neighbor = state.neighbor.clone().map(shared);
        let layout = Layout {
            assembled: state.assembled,
            attached: state.attached,
            port: &state.port,
        };
        let mut sandbox = Self::build(config, reservoir, neighbor, layout);
        sandbox.world.take_events();
        info!(
            assembled = state.assembled,
            attached = state.attached,
            "sandbox restored"
        );
        sandbox
    }

    fn build(
        config: &AppConfig,
        reservoir: SharedHandler,
        neighbor: Option<SharedHandler>,
        layout: Layout<'_>,
    ) -> Self {
        let kind = reservoir.read().kind();
        let mut world = World::authoritative();
        let mut structure = Structure::new(reservoir.clone());
        if layout.assembled {
            structure.assemble();
        }
        let detached = if layout.attached {
            world.attach(structure);
            None
        } else {
            Some(structure)
        };
        if let Some(neighbor) = &neighbor {
            world.place_tank(PORT_POSITION.offset(PORT_FACING), neighbor.clone());
        }

        let mut port = FluidPort::new(PORT_POSITION, PORT_FACING, kind, IoMode::Passive);
        port.on_attached(&world);
        if layout.assembled && layout.attached {
            port.on_post_assembled(&mut world);
        }
        port.sync_data_from(layout.port, &mut world);

        Self {
            world,
            port,
            reservoir,
            detached,
            neighbor,
            resource: config.resource.clone(),
            neighbor_capacity: config.neighbor_capacity,
            pump_rate: config.pump_rate,
            tick: 0,
        }
    }

    /// Flip the port between input and output.
    pub fn toggle_direction(&mut self) {
        let direction = self.port.direction().toggled();
        self.port.set_direction(direction, &mut self.world);
        info!(direction = direction.label(), "direction toggled");
    }

    /// Assemble a broken structure or break an assembled one.
    pub fn toggle_assembly(&mut self) {
        let Some(structure) = self.world.structure_mut() else {
            info!("assembly toggle ignored: port is detached");
            return;
        };
        if structure.is_assembled() {
            structure.disassemble();
            self.port.on_post_broken(&mut self.world);
        } else {
            structure.assemble();
            self.port.on_post_assembled(&mut self.world);
        }
    }

    /// Detach the port from its structure or attach it back.
    pub fn toggle_attachment(&mut self) {
        match self.detached.take() {
            Some(structure) => {
                self.world.attach(structure);
                self.port.on_attached(&self.world);
                info!("port attached");
            }
            None => {
                self.detached = self.world.detach();
                self.port.on_detached(&self.world);
                info!("port detached");
            }
        }
    }

    /// Place or remove the neighbor tank.
    pub fn toggle_neighbor(&mut self) {
        let target = PORT_POSITION.offset(PORT_FACING);
        match self.neighbor.take() {
            Some(_) => {
                self.world.remove_endpoint(target);
            }
            None => {
                let kind = self.port.handler().kind();
                let tank = shared(Reservoir::new(kind, self.neighbor_capacity));
                self.world.place_tank(target, tank.clone());
                self.neighbor = Some(tank);
            }
        }
        self.port.on_neighbor_block_changed(&mut self.world);
    }

    /// Replace the neighbor with an empty tank of the other kind.
    pub fn swap_neighbor_kind(&mut self) {
        let Some(current) = self.neighbor.take() else {
            return;
        };
        let kind = current.read().kind().toggled();
        let tank = shared(Reservoir::new(kind, self.neighbor_capacity));
        self.world
            .place_tank(PORT_POSITION.offset(PORT_FACING), tank.clone());
        self.neighbor = Some(tank);
        self.port.on_neighbor_tile_changed(&mut self.world);
        info!(kind = kind.label(), "neighbor kind swapped");
    }

    /// Run one simulation step.
    pub fn step(&mut self) -> StepReport {
        self.tick += 1;
        let pushed = self.port.on_tick(&self.world);
        let pumped = self.pump();
        StepReport {
            tick: self.tick,
            pushed,
            pumped,
        }
    }

    /// The neighbor pushes into an input port through its capability.
    fn pump(&self) -> u64 {
        let Some(neighbor) = &self.neighbor else {
            return 0;
        };
        let kind = neighbor.read().kind();
        let Some(capability) = self.port.capability(kind, Some(PORT_FACING)) else {
            return 0;
        };
        transfer::transfer_between(
            neighbor,
            &shared(capability),
            self.pump_rate,
            TransferAction::Execute,
        )
    }

    /// Current view for the frontend.
    pub fn view(&self) -> SandboxView {
        SandboxView {
            status: self.port.status(&self.world),
            attached: self.world.controller().is_some(),
            reservoir: TankLevel::of(&self.reservoir),
            neighbor: self.neighbor.as_ref().map(TankLevel::of),
            tick: self.tick,
        }
    }

    /// The port's sync blob as it would be sent to mirrors.
    pub fn sync_data(&self) -> SyncData {
        let mut data = SyncData::new();
        self.port.sync_data_to(&mut data);
        data
    }

    /// Capture the sandbox for persistence.
    pub fn state(&self) -> SandboxState {
        let assembled = self
            .world
            .structure()
            .or(self.detached.as_ref())
            .map(|structure| structure.is_assembled())
            .unwrap_or(false);
        SandboxState {
            port: self.sync_data(),
            assembled,
            attached: self.detached.is_none(),
            reservoir: reservoir_copy(&self.reservoir, &self.resource),
            neighbor: self
                .neighbor
                .as_ref()
                .map(|handler| reservoir_copy(handler, &self.resource)),
        }
    }

    /// Notifications the port sent since the last call.
    pub fn drain_events(&mut self) -> Vec<HostEvent> {
        self.world.take_events()
    }
}

fn reservoir_copy(handler: &SharedHandler, fallback_resource: &str) -> Reservoir {
    let handler = handler.read();
    let stack = handler
        .contents()
        .unwrap_or_else(|| ResourceStack::new(fallback_resource, 0));
    Reservoir::with_contents(handler.kind(), handler.capacity(), stack)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::IoDirection;

    fn config() -> AppConfig {
        AppConfig {
            reservoir_capacity: 1_000,
            initial_reservoir: 600,
            neighbor_capacity: 400,
            pump_rate: 50,
            ..AppConfig::default()
        }
    }

    #[test]
    fn starts_connected_as_an_input() {
        let sandbox = Sandbox::new(&config());
        let view = sandbox.view();
        assert!(view.status.connected && view.status.assembled && view.attached);
        assert_eq!(view.status.direction, IoDirection::Input);
        assert_eq!(view.status.variant, 1);
        assert_eq!(view.reservoir.amount, 600);
        assert_eq!(view.neighbor.map(|tank| tank.amount), Some(200));
    }

    #[test]
    fn input_pumps_in_and_output_pushes_out() {
        let mut sandbox = Sandbox::new(&config());

        let report = sandbox.step();
        assert_eq!(report, StepReport { tick: 1, pushed: 0, pumped: 50 });
        assert_eq!(sandbox.view().reservoir.amount, 650);

        sandbox.toggle_direction();
        assert_eq!(sandbox.view().status.variant, 3);
        let report = sandbox.step();
        assert_eq!(report.pumped, 0);
        assert_eq!(report.pushed, 250);
        assert_eq!(sandbox.view().neighbor.map(|tank| tank.amount), Some(400));
        assert_eq!(sandbox.view().reservoir.amount, 400);
    }

    #[test]
    fn broken_structure_stops_both_flows() {
        let mut sandbox = Sandbox::new(&config());
        sandbox.toggle_assembly();
        assert_eq!(sandbox.view().status.variant, 0);
        assert_eq!(sandbox.step(), StepReport { tick: 1, pushed: 0, pumped: 0 });

        sandbox.toggle_direction();
        assert_eq!(sandbox.step(), StepReport { tick: 2, pushed: 0, pumped: 0 });

        sandbox.toggle_assembly();
        assert_eq!(sandbox.step().pushed, 200);
    }

    #[test]
    fn mismatched_neighbor_disconnects() {
        let mut sandbox = Sandbox::new(&config());
        sandbox.swap_neighbor_kind();
        let view = sandbox.view();
        assert!(!view.status.connected);
        assert_ne!(view.neighbor.map(|tank| tank.kind), Some(view.status.kind));
        assert_eq!(sandbox.step().pumped, 0);

        sandbox.toggle_neighbor();
        assert!(sandbox.view().neighbor.is_none());
        sandbox.toggle_neighbor();
        assert!(sandbox.view().status.connected);
    }

    #[test]
    fn detached_port_ignores_assembly_toggle() {
        let mut sandbox = Sandbox::new(&config());
        sandbox.toggle_attachment();
        assert!(!sandbox.view().attached);
        sandbox.toggle_assembly();
        assert!(sandbox.state().assembled);
        assert_eq!(sandbox.step().pumped, 0);

        sandbox.toggle_attachment();
        assert!(sandbox.view().attached);
        assert_eq!(sandbox.step().pumped, 50);
    }

    #[test]
    fn state_restores_the_same_view() {
        let mut sandbox = Sandbox::new(&config());
        sandbox.toggle_direction();
        sandbox.step();
        let state = sandbox.state();

        let restored = Sandbox::restore(&config(), &state);
        let (before, after) = (sandbox.view(), restored.view());
        assert_eq!(before.status, after.status);
        assert_eq!(before.reservoir, after.reservoir);
        assert_eq!(before.neighbor, after.neighbor);
    }

    #[test]
    fn direction_toggle_is_reported_as_host_events() {
        let mut sandbox = Sandbox::new(&config());
        assert!(sandbox.drain_events().is_empty());
        sandbox.toggle_direction();
        let events = sandbox.drain_events();
        assert!(events.contains(&HostEvent::MarkedDirty(PORT_POSITION)));
        assert!(sandbox.drain_events().is_empty());
    }
}
