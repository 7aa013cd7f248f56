//! Resource stacks, the handler contract, and the reference tank.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Physical kind of resource a port or tank carries. Kinds never interoperate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortKind {
    /// Liquids such as water or coolant.
    #[default]
    Liquid,
    /// Gases such as steam.
    Gas,
}

impl PortKind {
    /// The other kind.
    pub fn toggled(self) -> Self {
        match self {
            PortKind::Liquid => PortKind::Gas,
            PortKind::Gas => PortKind::Liquid,
        }
    }

    /// Lowercase label used in status lines.
    pub fn label(self) -> &'static str {
        match self {
            PortKind::Liquid => "liquid",
            PortKind::Gas => "gas",
        }
    }
}

/// An amount of one named resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceStack {
    /// Resource identifier, e.g. `steam`.
    pub resource: String,
    /// Quantity in base units.
    pub amount: u64,
}

impl ResourceStack {
    /// Build a stack of `amount` units of `resource`.
    pub fn new(resource: impl Into<String>, amount: u64) -> Self {
        Self {
            resource: resource.into(),
            amount,
        }
    }

    /// `true` when the stack carries nothing.
    pub fn is_empty(&self) -> bool {
        self.amount == 0
    }

    /// Same resource, different amount.
    pub fn with_amount(&self, amount: u64) -> Self {
        Self {
            resource: self.resource.clone(),
            amount,
        }
    }
}

/// Whether a transfer only reports what would happen or actually moves resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferAction {
    /// Compute the outcome without mutating anything.
    Simulate,
    /// Move the resource.
    Execute,
}

impl TransferAction {
    /// `true` for [`TransferAction::Execute`].
    pub fn is_execute(self) -> bool {
        matches!(self, TransferAction::Execute)
    }
}

/// Anything that can accept or hand out a resource.
pub trait ResourceHandler {
    /// Kind of resource this handler carries.
    fn kind(&self) -> PortKind;

    /// Current contents, `None` when empty or unavailable.
    fn contents(&self) -> Option<ResourceStack>;

    /// Maximum amount the handler can hold.
    fn capacity(&self) -> u64;

    /// Offer `stack`; returns the amount accepted.
    fn fill(&mut self, stack: &ResourceStack, action: TransferAction) -> u64;

    /// Take up to `max`; returns what was (or would be) removed.
    fn drain(&mut self, max: u64, action: TransferAction) -> Option<ResourceStack>;
}

/// A resource handler shared between its owner and whoever holds it as a neighbor.
pub type SharedHandler = Arc<RwLock<dyn ResourceHandler + Send + Sync>>;

/// Wrap a handler so it can be shared.
pub fn shared<H>(handler: H) -> SharedHandler
where
    H: ResourceHandler + Send + Sync + 'static,
{
    Arc::new(RwLock::new(handler))
}

/// Single-resource tank used for structure reservoirs and neighbor endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservoir {
    kind: PortKind,
    capacity: u64,
    #[serde(default)]
    stored: Option<ResourceStack>,
}

impl Reservoir {
    /// Empty tank of the given kind and capacity.
    pub fn new(kind: PortKind, capacity: u64) -> Self {
        Self {
            kind,
            capacity,
            stored: None,
        }
    }

    /// Tank pre-filled with `stack`, clamped to `capacity`.
    pub fn with_contents(kind: PortKind, capacity: u64, stack: ResourceStack) -> Self {
        let amount = stack.amount.min(capacity);
        Self {
            kind,
            capacity,
            stored: (amount > 0).then(|| stack.with_amount(amount)),
        }
    }

    /// Amount currently stored.
    pub fn amount(&self) -> u64 {
        self.stored.as_ref().map(|stack| stack.amount).unwrap_or(0)
    }

    /// Free space left in the tank.
    pub fn space(&self) -> u64 {
        self.capacity.saturating_sub(self.amount())
    }
}

impl ResourceHandler for Reservoir {
    fn kind(&self) -> PortKind {
        self.kind
    }

    fn contents(&self) -> Option<ResourceStack> {
        self.stored.clone()
    }

    fn capacity(&self) -> u64 {
        self.capacity
    }

    fn fill(&mut self, stack: &ResourceStack, action: TransferAction) -> u64 {
        if stack.is_empty() {
            return 0;
        }
        if let Some(stored) = &self.stored {
            if stored.resource != stack.resource {
                return 0;
            }
        }

        let accepted = stack.amount.min(self.space());
        if accepted > 0 && action.is_execute() {
            let amount = self.amount() + accepted;
            self.stored = Some(stack.with_amount(amount));
        }
        accepted
    }

    fn drain(&mut self, max: u64, action: TransferAction) -> Option<ResourceStack> {
        let stored = self.stored.as_ref()?;
        let amount = stored.amount.min(max);
        if amount == 0 {
            return None;
        }

        let drained = stored.with_amount(amount);
        if action.is_execute() {
            let remaining = stored.amount - amount;
            self.stored = (remaining > 0).then(|| stored.with_amount(remaining));
        }
        Some(drained)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_respects_capacity_and_resource_identity() {
        let mut tank = Reservoir::new(PortKind::Gas, 100);
        let steam = ResourceStack::new("steam", 70);

        assert_eq!(tank.fill(&steam, TransferAction::Simulate), 70);
        assert_eq!(tank.amount(), 0);

        assert_eq!(tank.fill(&steam, TransferAction::Execute), 70);
        assert_eq!(tank.fill(&steam, TransferAction::Execute), 30);
        assert_eq!(tank.amount(), 100);

        let mut other = Reservoir::with_contents(PortKind::Gas, 100, ResourceStack::new("steam", 10));
        assert_eq!(other.fill(&ResourceStack::new("hydrogen", 5), TransferAction::Execute), 0);
        assert_eq!(other.amount(), 10);
    }

    #[test]
    fn drain_empties_the_tank() {
        let mut tank = Reservoir::with_contents(PortKind::Liquid, 50, ResourceStack::new("water", 40));

        let simulated = tank.drain(25, TransferAction::Simulate).expect("simulated drain");
        assert_eq!(simulated.amount, 25);
        assert_eq!(tank.amount(), 40);

        let drained = tank.drain(u64::MAX, TransferAction::Execute).expect("drain");
        assert_eq!(drained, ResourceStack::new("water", 40));
        assert_eq!(tank.contents(), None);
        assert_eq!(tank.drain(1, TransferAction::Execute), None);
    }

    #[test]
    fn prefill_is_clamped() {
        let tank = Reservoir::with_contents(PortKind::Liquid, 10, ResourceStack::new("water", 40));
        assert_eq!(tank.amount(), 10);
        assert_eq!(tank.space(), 0);
    }
}
