//! The fluid port part: direction, lifecycle hooks, per-step transfer and sync.

use tracing::{debug, info};

use crate::{
    env::PartHost,
    geometry::{BlockPos, Facing},
    handler::{PortCapability, PortConnectionHandler},
    io::{IoDirection, IoMode, SyncData},
    resource::{PortKind, TransferAction},
    transfer::{self, MAX_TRANSFER_PER_STEP},
};

/// Key the port owns in the shared sync blob.
pub const DIRECTION_KEY: &str = "iodir";

/// Model variant shown by a port.
///
/// `0` doubles as "structure not assembled".
pub fn model_variant_index(assembled: bool, direction: IoDirection, connected: bool) -> u8 {
    if !assembled {
        return 0;
    }
    let base = if direction.is_input() { 0 } else { 2 };
    base + u8::from(connected)
}

/// Point-in-time view of a port for presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortStatus {
    /// Cell of the port.
    pub position: BlockPos,
    /// Face the port exposes.
    pub outward: Facing,
    /// Kind of resource carried.
    pub kind: PortKind,
    /// Mode the handler was created with.
    pub mode: IoMode,
    /// Current direction.
    pub direction: IoDirection,
    /// Whether a compatible endpoint is adjacent.
    pub connected: bool,
    /// Whether the owning structure is assembled.
    pub assembled: bool,
    /// Model variant derived from the three flags above.
    pub variant: u8,
}

/// A single-face resource connection point on a composite structure.
pub struct FluidPort {
    position: BlockPos,
    direction: IoDirection,
    handler: PortConnectionHandler,
}

impl FluidPort {
    /// Port at `position` exposing `outward`, starting as an input.
    pub fn new(position: BlockPos, outward: Facing, kind: PortKind, mode: IoMode) -> Self {
        Self {
            position,
            direction: IoDirection::Input,
            handler: PortConnectionHandler::new(kind, mode, outward),
        }
    }

    /// Cell of the port.
    pub fn position(&self) -> BlockPos {
        self.position
    }

    /// Face the port exposes.
    pub fn outward(&self) -> Facing {
        self.handler.outward()
    }

    /// Current direction.
    pub fn direction(&self) -> IoDirection {
        self.direction
    }

    /// The owned connection handler.
    pub fn handler(&self) -> &PortConnectionHandler {
        &self.handler
    }

    /// Whether a compatible endpoint is adjacent.
    pub fn is_connected(&self) -> bool {
        self.handler.is_connected()
    }

    /// Change direction, firing every side effect of the transition.
    ///
    /// Setting the current direction again does nothing at all.
    pub fn set_direction<H>(&mut self, direction: IoDirection, host: &mut H)
    where
        H: PartHost + ?Sized,
    {
        if self.direction == direction {
            return;
        }

        self.direction = direction;
        self.handler.update(&*host, direction);
        if let Some(controller) = host.controller_mut() {
            controller.on_fluid_port_changed(self.position);
        }
        host.notify_block_update(self.position);

        if host.role().is_authoritative() {
            host.notify_outward_neighbors(self.position, self.outward());
            host.mark_dirty(self.position);
        } else {
            host.mark_for_render_update(self.position);
        }
        debug!(position = %self.position, direction = direction.label(), "port direction changed");
    }

    /// A neighboring block changed.
    pub fn on_neighbor_block_changed<H>(&mut self, host: &mut H)
    where
        H: PartHost + ?Sized,
    {
        self.on_neighbor_changed(host);
    }

    /// A neighboring tile was created, changed or destroyed.
    pub fn on_neighbor_tile_changed<H>(&mut self, host: &mut H)
    where
        H: PartHost + ?Sized,
    {
        self.on_neighbor_changed(host);
    }

    fn on_neighbor_changed<H>(&mut self, host: &mut H)
    where
        H: PartHost + ?Sized,
    {
        if host.controller().is_some() {
            self.handler
                .check_connections(&*host, self.position, self.direction);
        }
        host.request_render_update(self.position);
    }

    /// The structure finished assembling.
    pub fn on_post_assembled<H>(&mut self, host: &mut H)
    where
        H: PartHost + ?Sized,
    {
        info!(position = %self.position, "port structure assembled");
        self.handler.recheck(&*host, self.position, self.direction);
        host.notify_outward_neighbors(self.position, self.outward());
    }

    /// The structure broke apart.
    pub fn on_post_broken<H>(&mut self, host: &mut H)
    where
        H: PartHost + ?Sized,
    {
        info!(position = %self.position, "port structure broken");
        self.handler.recheck(&*host, self.position, self.direction);
        host.notify_outward_neighbors(self.position, self.outward());
    }

    /// The part joined a structure.
    pub fn on_attached<H>(&mut self, host: &H)
    where
        H: PartHost + ?Sized,
    {
        self.handler.recheck(host, self.position, self.direction);
    }

    /// The part's structure merged into another one.
    pub fn on_assimilated<H>(&mut self, host: &H)
    where
        H: PartHost + ?Sized,
    {
        self.handler.recheck(host, self.position, self.direction);
    }

    /// The part left its structure.
    pub fn on_detached<H>(&mut self, host: &H)
    where
        H: PartHost + ?Sized,
    {
        self.handler.recheck(host, self.position, self.direction);
    }

    /// One simulation step. Output ports push into the outward neighbor;
    /// returns the amount moved.
    pub fn on_tick<H>(&self, host: &H) -> u64
    where
        H: PartHost + ?Sized,
    {
        if !self.direction.is_output() {
            return 0;
        }
        let Some(reservoir) = host
            .controller()
            .filter(|controller| controller.is_assembled())
            .and_then(|controller| controller.reservoir())
        else {
            return 0;
        };

        let outward = self.outward();
        transfer::try_transfer(
            &reservoir,
            host,
            self.position.offset(outward),
            outward.opposite(),
            MAX_TRANSFER_PER_STEP,
            TransferAction::Execute,
        )
    }

    /// The part was removed or unloaded; revoke anything exposed.
    pub fn remove(&mut self) {
        self.handler.invalidate();
    }

    /// Capability for `kind` on `side`, if the port grants one.
    pub fn capability(&self, kind: PortKind, side: Option<Facing>) -> Option<PortCapability> {
        self.handler.capability(kind, side)
    }

    /// Like [`FluidPort::capability`], falling back to the base part's own set.
    pub fn capability_or_else<F>(
        &self,
        kind: PortKind,
        side: Option<Facing>,
        base: F,
    ) -> Option<PortCapability>
    where
        F: FnOnce(PortKind, Option<Facing>) -> Option<PortCapability>,
    {
        self.capability(kind, side).or_else(|| base(kind, side))
    }

    /// Model variant for the current state.
    pub fn model_variant_index<H>(&self, host: &H) -> u8
    where
        H: PartHost + ?Sized,
    {
        model_variant_index(
            Self::is_assembled(host),
            self.direction,
            self.handler.is_connected(),
        )
    }

    /// Snapshot for presentation.
    pub fn status<H>(&self, host: &H) -> PortStatus
    where
        H: PartHost + ?Sized,
    {
        let assembled = Self::is_assembled(host);
        PortStatus {
            position: self.position,
            outward: self.outward(),
            kind: self.handler.kind(),
            mode: self.handler.mode(),
            direction: self.direction,
            connected: self.handler.is_connected(),
            assembled,
            variant: model_variant_index(assembled, self.direction, self.handler.is_connected()),
        }
    }

    /// Apply state received from the blob, through [`FluidPort::set_direction`].
    pub fn sync_data_from<H>(&mut self, data: &SyncData, host: &mut H)
    where
        H: PartHost + ?Sized,
    {
        let direction = IoDirection::read(data, DIRECTION_KEY, IoDirection::Input);
        self.set_direction(direction, host);
    }

    /// Write the port's state into the blob.
    pub fn sync_data_to<'a>(&self, data: &'a mut SyncData) -> &'a mut SyncData {
        IoDirection::write(data, DIRECTION_KEY, self.direction);
        data
    }

    fn is_assembled<H>(host: &H) -> bool
    where
        H: PartHost + ?Sized,
    {
        host.controller()
            .map(|controller| controller.is_assembled())
            .unwrap_or(false)
    }
}
