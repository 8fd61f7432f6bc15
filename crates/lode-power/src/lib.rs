//! Resource gates for Lode extractors.
//!
//! An extractor asks its gate for a fixed amount every tick, first
//! simulated, then for real once it knows the tick will produce. Two
//! strategies cover the machines in play:
//!
//! - [`EnergyBuffer`] -- an electric buffer charged from outside and drained
//!   per tick.
//! - [`FuelBurner`] -- a solid-fuel firebox that burns items into ticks of
//!   burn time.
//!
//! [`PowerSource`] wraps both so a single simulation can mix electric and
//! fuel-fired machines.

use lode_core::capability::ResourceGate;
use lode_core::fixed::{Fixed64, ratio};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Electric buffer
// ---------------------------------------------------------------------------

/// Internal energy store of an electric machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnergyBuffer {
    /// Maximum stored energy.
    pub capacity: u64,
    /// Current stored energy. Clamped to [0, capacity].
    pub stored: u64,
    /// Most energy accepted by one [`charge`](EnergyBuffer::charge) call.
    pub input_rate: u64,
}

impl EnergyBuffer {
    pub fn new(capacity: u64, input_rate: u64) -> Self {
        Self {
            capacity,
            stored: 0,
            input_rate,
        }
    }

    /// A buffer that starts full.
    pub fn full(capacity: u64, input_rate: u64) -> Self {
        Self {
            stored: capacity,
            ..Self::new(capacity, input_rate)
        }
    }

    /// Push energy in. Returns the amount accepted.
    pub fn charge(&mut self, amount: u64) -> u64 {
        let headroom = self.capacity.saturating_sub(self.stored);
        let accepted = amount.min(self.input_rate).min(headroom);
        self.stored += accepted;
        accepted
    }

    /// Stored energy as a fraction of capacity.
    pub fn fill_ratio(&self) -> Fixed64 {
        ratio(self.stored, self.capacity)
    }

    pub fn is_empty(&self) -> bool {
        self.stored == 0
    }
}

impl ResourceGate for EnergyBuffer {
    fn consume(&mut self, amount: u32, simulate: bool) -> bool {
        let amount = u64::from(amount);
        if self.stored < amount {
            return false;
        }
        if !simulate {
            self.stored -= amount;
        }
        true
    }
}

// ---------------------------------------------------------------------------
// Solid fuel
// ---------------------------------------------------------------------------

/// Firebox that turns fuel items into burn ticks.
///
/// One item is lit only when the current burn cannot cover a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuelBurner {
    /// Unlit fuel items waiting in the input slot.
    pub fuel_items: u32,
    /// Burn ticks one item provides.
    pub burn_ticks_per_item: u32,
    /// Ticks left on the item currently burning.
    pub burn_remaining: u32,
}

impl FuelBurner {
    /// Burn time of one piece of coal.
    pub const COAL_BURN_TICKS: u32 = 1600;

    pub fn new(burn_ticks_per_item: u32) -> Self {
        Self {
            fuel_items: 0,
            burn_ticks_per_item,
            burn_remaining: 0,
        }
    }

    pub fn coal() -> Self {
        Self::new(Self::COAL_BURN_TICKS)
    }

    /// Put fuel items in the input slot.
    pub fn add_fuel(&mut self, items: u32) {
        self.fuel_items = self.fuel_items.saturating_add(items);
    }

    /// Whether an item is currently burning.
    pub fn burning(&self) -> bool {
        self.burn_remaining > 0
    }

    /// Total ticks available, including unlit items.
    pub fn ticks_available(&self) -> u64 {
        u64::from(self.burn_remaining)
            + u64::from(self.fuel_items) * u64::from(self.burn_ticks_per_item)
    }
}

impl ResourceGate for FuelBurner {
    fn consume(&mut self, amount: u32, simulate: bool) -> bool {
        if self.burn_remaining >= amount {
            if !simulate {
                self.burn_remaining -= amount;
            }
            return true;
        }
        if self.fuel_items == 0 || self.burn_ticks_per_item == 0 {
            return false;
        }
        let after_lighting = u64::from(self.burn_remaining) + u64::from(self.burn_ticks_per_item);
        if after_lighting < u64::from(amount) {
            return false;
        }
        if !simulate {
            self.fuel_items -= 1;
            self.burn_remaining = (after_lighting - u64::from(amount)) as u32;
        }
        true
    }
}

// ---------------------------------------------------------------------------
// Mixed sources
// ---------------------------------------------------------------------------

/// Either kind of gate, for simulations running both kinds of machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerSource {
    Electric(EnergyBuffer),
    Fuel(FuelBurner),
}

impl PowerSource {
    pub fn as_electric_mut(&mut self) -> Option<&mut EnergyBuffer> {
        match self {
            PowerSource::Electric(b) => Some(b),
            PowerSource::Fuel(_) => None,
        }
    }

    pub fn as_fuel_mut(&mut self) -> Option<&mut FuelBurner> {
        match self {
            PowerSource::Fuel(f) => Some(f),
            PowerSource::Electric(_) => None,
        }
    }
}

impl ResourceGate for PowerSource {
    fn consume(&mut self, amount: u32, simulate: bool) -> bool {
        match self {
            PowerSource::Electric(b) => b.consume(amount, simulate),
            PowerSource::Fuel(f) => f.consume(amount, simulate),
        }
    }
}

impl From<EnergyBuffer> for PowerSource {
    fn from(b: EnergyBuffer) -> Self {
        PowerSource::Electric(b)
    }
}

impl From<FuelBurner> for PowerSource {
    fn from(f: FuelBurner) -> Self {
        PowerSource::Fuel(f)
    }
}
