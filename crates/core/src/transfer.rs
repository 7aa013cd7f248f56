//! Moving resource between two handlers.

use std::sync::Arc;

use tracing::debug;

use crate::{
    env::NeighborQuery,
    geometry::{BlockPos, Facing},
    resource::{SharedHandler, TransferAction},
};

/// Upper bound on what a port pushes in one step.
pub const MAX_TRANSFER_PER_STEP: u64 = u64::MAX;

/// Push up to `max` from `source` into the endpoint at `target`, accepted on
/// `side`. Returns the amount the target accepted; `0` when there is no
/// endpoint, the kinds differ, or nothing fits.
pub fn try_transfer<Q>(
    source: &SharedHandler,
    neighbors: &Q,
    target: BlockPos,
    side: Facing,
    max: u64,
    action: TransferAction,
) -> u64
where
    Q: NeighborQuery + ?Sized,
{
    match neighbors.endpoint(target, side) {
        Some(destination) => transfer_between(source, &destination, max, action),
        None => 0,
    }
}

/// Move up to `max` from `source` into `destination`.
///
/// Each handler is locked for one call at a time, so a destination that is
/// itself a view onto `source` cannot deadlock.
pub fn transfer_between(
    source: &SharedHandler,
    destination: &SharedHandler,
    max: u64,
    action: TransferAction,
) -> u64 {
    if max == 0 || Arc::ptr_eq(source, destination) {
        return 0;
    }
    let source_kind = source.read().kind();
    if source_kind != destination.read().kind() {
        return 0;
    }

    let Some(offered) = source.write().drain(max, TransferAction::Simulate) else {
        return 0;
    };
    let accepted = destination.write().fill(&offered, TransferAction::Simulate);
    if accepted == 0 || !action.is_execute() {
        return accepted;
    }

    let Some(drained) = source.write().drain(accepted, TransferAction::Execute) else {
        return 0;
    };
    let moved = destination.write().fill(&drained, TransferAction::Execute);
    debug!(
        resource = %drained.resource,
        moved,
        kind = source_kind.label(),
        "resource transferred"
    );
    moved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        resource::{shared, PortKind, Reservoir, ResourceStack},
        world::World,
    };

    fn steam_tank(amount: u64, capacity: u64) -> SharedHandler {
        shared(Reservoir::with_contents(
            PortKind::Gas,
            capacity,
            ResourceStack::new("steam", amount),
        ))
    }

    fn amount(handler: &SharedHandler) -> u64 {
        let contents = handler.read().contents();
        contents.map(|stack| stack.amount).unwrap_or(0)
    }

    #[test]
    fn moves_what_the_destination_accepts() {
        let source = steam_tank(500, 1_000);
        let destination = steam_tank(0, 200);

        assert_eq!(transfer_between(&source, &destination, u64::MAX, TransferAction::Execute), 200);
        assert_eq!(amount(&source), 300);
        assert_eq!(amount(&destination), 200);

        assert_eq!(transfer_between(&source, &destination, u64::MAX, TransferAction::Execute), 0);
        assert_eq!(amount(&source), 300);
    }

    #[test]
    fn simulate_leaves_both_sides_untouched() {
        let source = steam_tank(500, 1_000);
        let destination = steam_tank(0, 200);

        assert_eq!(transfer_between(&source, &destination, 50, TransferAction::Simulate), 50);
        assert_eq!(amount(&source), 500);
        assert_eq!(amount(&destination), 0);
    }

    #[test]
    fn kinds_never_mix() {
        let source = steam_tank(500, 1_000);
        let water = shared(Reservoir::new(PortKind::Liquid, 1_000));
        assert_eq!(transfer_between(&source, &water, 100, TransferAction::Execute), 0);
        assert_eq!(amount(&source), 500);
    }

    #[test]
    fn missing_endpoint_moves_nothing() {
        let world = World::authoritative();
        let source = steam_tank(500, 1_000);
        let moved = try_transfer(
            &source,
            &world,
            BlockPos::new(1, 0, 0),
            Facing::West,
            MAX_TRANSFER_PER_STEP,
            TransferAction::Execute,
        );
        assert_eq!(moved, 0);
        assert_eq!(amount(&source), 500);
    }

    #[test]
    fn transfers_into_endpoint_on_the_given_side() {
        let mut world = World::authoritative();
        let target = BlockPos::new(1, 0, 0);
        let destination = steam_tank(0, 300);
        world.place_endpoint(target, destination.clone(), &[Facing::West]);
        let source = steam_tank(500, 1_000);

        let wrong_side = try_transfer(&source, &world, target, Facing::Up, 100, TransferAction::Execute);
        assert_eq!(wrong_side, 0);

        let moved = try_transfer(&source, &world, target, Facing::West, 100, TransferAction::Execute);
        assert_eq!(moved, 100);
        assert_eq!(amount(&destination), 100);
        assert_eq!(amount(&source), 400);
    }
}
