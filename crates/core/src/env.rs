//! Collaborators the port talks to: the world around it and the structure it belongs to.

use crate::{
    geometry::{BlockPos, Facing},
    resource::SharedHandler,
};

/// Which side of the simulation is running an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The simulation that owns and persists state.
    Authoritative,
    /// A mirror that only renders what the authoritative side sends it.
    Presentation,
}

impl Role {
    /// `true` for [`Role::Authoritative`].
    pub fn is_authoritative(self) -> bool {
        matches!(self, Role::Authoritative)
    }
}

/// Read-only lookup of resource endpoints in the world.
pub trait NeighborQuery {
    /// Whether the cell at `pos` is present and reachable.
    fn is_loaded(&self, pos: BlockPos) -> bool;

    /// Resource endpoint exposed by the cell at `pos` on its `face`, if any.
    fn endpoint(&self, pos: BlockPos, face: Facing) -> Option<SharedHandler>;
}

/// The composite structure a port belongs to.
pub trait StructureController {
    /// Whether the structure is currently assembled.
    fn is_assembled(&self) -> bool;

    /// The structure's internal reservoir, `None` when unassembled or absent.
    fn reservoir(&self) -> Option<SharedHandler>;

    /// Informational callback fired when a port changed its direction.
    fn on_fluid_port_changed(&mut self, port: BlockPos);
}

/// Base-part services: the world the part lives in and the plumbing around it.
pub trait PartHost: NeighborQuery {
    /// Side this host runs on.
    fn role(&self) -> Role;

    /// Controller of the structure the part is attached to.
    fn controller(&self) -> Option<&dyn StructureController>;

    /// Mutable access to the controller.
    fn controller_mut(&mut self) -> Option<&mut dyn StructureController>;

    /// Schedule a block update for the part's cell.
    fn notify_block_update(&mut self, pos: BlockPos);

    /// Tell the cell across `outward` that this part changed state.
    fn notify_outward_neighbors(&mut self, pos: BlockPos, outward: Facing);

    /// Flag the part's persisted state as changed.
    fn mark_dirty(&mut self, pos: BlockPos);

    /// Mark the part's model for re-render on the presentation side.
    fn mark_for_render_update(&mut self, pos: BlockPos);

    /// Ask the presentation side to refresh the part's render state.
    fn request_render_update(&mut self, pos: BlockPos);
}
