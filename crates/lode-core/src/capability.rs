//! Seams between an extractor and the machine around it.
//!
//! The engine never sees items, fluids or power networks directly. It talks
//! to three narrow traits; hosts plug in whatever backs them. In-crate
//! implementations cover the common cases and the tests.

use crate::catalog::Material;
use serde::{Deserialize, Serialize};

/// Where extracted material goes.
pub trait OutputSink {
    /// Insert up to `quantity` of `material`, returning how much fits.
    /// With `simulate` set nothing changes.
    fn try_insert(&mut self, material: &Material, quantity: u32, simulate: bool) -> u32;
}

/// Energy or fuel required to advance one tick.
pub trait ResourceGate {
    /// Returns `true` if `amount` is available. With `simulate` set the
    /// resource is only checked, not drawn.
    fn consume(&mut self, amount: u32, simulate: bool) -> bool;
}

/// An optional tool installed in an extractor.
pub trait DrillHead {
    fn efficiency(&self) -> u32;
    fn apply_wear(&mut self, amount: u32);
}

/// A gate that always has resource available.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unmetered;

impl ResourceGate for Unmetered {
    fn consume(&mut self, _amount: u32, _simulate: bool) -> bool {
        true
    }
}

/// A quantity of one material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialStack {
    pub material: Material,
    pub quantity: u32,
}

/// Capacity-bounded buffer holding any mix of materials.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputBuffer {
    pub stacks: Vec<MaterialStack>,
    pub capacity: u32,
}

impl OutputBuffer {
    pub fn new(capacity: u32) -> Self {
        Self {
            stacks: Vec::new(),
            capacity,
        }
    }

    pub fn quantity(&self, material: &Material) -> u32 {
        self.stacks
            .iter()
            .find(|s| &s.material == material)
            .map(|s| s.quantity)
            .unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.stacks.iter().map(|s| s.quantity).sum()
    }

    pub fn space(&self) -> u32 {
        self.capacity.saturating_sub(self.total())
    }

    /// Take up to `quantity` out. Returns the amount actually removed.
    #[must_use = "returns the quantity actually removed, which may be less than requested"]
    pub fn take(&mut self, material: &Material, quantity: u32) -> u32 {
        let Some(stack) = self.stacks.iter_mut().find(|s| &s.material == material) else {
            return 0;
        };
        let taken = quantity.min(stack.quantity);
        stack.quantity -= taken;
        if stack.quantity == 0 {
            self.stacks.retain(|s| s.quantity > 0);
        }
        taken
    }

    /// Empty the buffer, returning what it held.
    pub fn drain(&mut self) -> Vec<MaterialStack> {
        std::mem::take(&mut self.stacks)
    }
}

impl OutputSink for OutputBuffer {
    fn try_insert(&mut self, material: &Material, quantity: u32, simulate: bool) -> u32 {
        let accepted = quantity.min(self.space());
        if simulate || accepted == 0 {
            return accepted;
        }
        match self.stacks.iter_mut().find(|s| &s.material == material) {
            Some(stack) => stack.quantity += accepted,
            None => self.stacks.push(MaterialStack {
                material: material.clone(),
                quantity: accepted,
            }),
        }
        accepted
    }
}

/// Drill head with a tier and finite durability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleDrillHead {
    pub level: u32,
    pub durability: u32,
}

impl SimpleDrillHead {
    pub fn new(level: u32, durability: u32) -> Self {
        Self { level, durability }
    }

    pub fn is_broken(&self) -> bool {
        self.durability == 0
    }
}

impl DrillHead for SimpleDrillHead {
    fn efficiency(&self) -> u32 {
        if self.is_broken() { 0 } else { self.level }
    }

    fn apply_wear(&mut self, amount: u32) {
        self.durability = self.durability.saturating_sub(amount);
    }
}
