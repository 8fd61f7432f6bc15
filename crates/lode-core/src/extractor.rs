//! Extractor state machine.
//!
//! An extractor sits at a block position, binds to the region under it and
//! advances one step per tick. Every tick runs the same pipeline:
//!
//! 1. **Bind** - resolve the region; stay unbound if it has no deposit on the
//!    class's layer.
//! 2. **Pause** - a disabled extractor does nothing.
//! 3. **Gate** - simulate the energy/fuel draw; on failure roll progress back.
//! 4. **Probe** - compute the quantity and material once, then simulate the
//!    insert so a full sink stops the tick before anything is spent.
//! 5. **Commit** - draw the gate for real and advance progress.
//! 6. **Deliver** - on a full cycle, insert for real and, only if everything
//!    fit, wear the head and roll depletion.
//!
//! Backpressure is state (`sink_full`, `power_starved`), never an error.

use crate::allocator::RegionAllocator;
use crate::capability::{DrillHead, OutputSink, ResourceGate};
use crate::catalog::Material;
use crate::depletion::{DepletionEngine, DepletionOutcome, DepletionRequest, current_yield};
use crate::fixed::{Fixed64, ratio};
use crate::region::RegionStore;
use crate::world::{Biome, BlockPos, DimensionContext, RegionKey};
use serde::{Deserialize, Serialize};

/// Ticks per cycle for electric and deep-drill rigs.
pub const FAST_CYCLE: u32 = 20;
/// Ticks per cycle for the small electric and coal-fired miners.
pub const SLOW_CYCLE: u32 = 200;

/// What happens to progress when the gate runs dry mid-cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RollbackPolicy {
    /// Drop straight back to 1.
    HardReset,
    /// Lose two ticks, never below 1.
    #[default]
    SoftRollback,
}

impl RollbackPolicy {
    pub fn apply(self, progress: u32) -> u32 {
        if progress < 2 {
            return progress;
        }
        match self {
            RollbackPolicy::HardReset => 1,
            RollbackPolicy::SoftRollback => progress.saturating_sub(2).max(1),
        }
    }
}

/// How much one cycle produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum YieldFormula {
    /// Fixed quantity regardless of deposit or head.
    Flat(u32),
    /// `base + efficiency`.
    HeadEfficiency { base: u32 },
    /// `current_yield * efficiency / divisor`.
    DepositScaled { divisor: u32 },
}

impl YieldFormula {
    pub fn quantity(&self, current_yield: i32, efficiency: u32) -> u32 {
        match *self {
            YieldFormula::Flat(n) => n,
            YieldFormula::HeadEfficiency { base } => base.saturating_add(efficiency),
            YieldFormula::DepositScaled { divisor } => {
                if divisor == 0 {
                    return 0;
                }
                let scaled = i64::from(current_yield.max(0)) * i64::from(efficiency)
                    / i64::from(divisor);
                scaled.min(i64::from(u32::MAX)) as u32
            }
        }
    }
}

/// Static description of a kind of extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractorClass {
    pub name: String,
    pub progress_max: u32,
    #[serde(default)]
    pub rollback: RollbackPolicy,
    pub yield_formula: YieldFormula,
    /// Only bind to deposits on this layer. `None` accepts any layer.
    #[serde(default)]
    pub layer: Option<i32>,
    pub energy_per_tick: u32,
    /// Rig-level one-in-N gate in front of natural depletion. 1 always passes.
    #[serde(default = "default_odds")]
    pub depletion_odds: u32,
    /// Durability taken from the drill head per delivered cycle.
    #[serde(default)]
    pub head_wear: u32,
}

fn default_odds() -> u32 {
    1
}

impl ExtractorClass {
    /// Small electric miner: slow cycle, one item plus head efficiency.
    pub fn basic() -> Self {
        Self {
            name: "basic".into(),
            progress_max: SLOW_CYCLE,
            rollback: RollbackPolicy::SoftRollback,
            yield_formula: YieldFormula::HeadEfficiency { base: 1 },
            layer: None,
            energy_per_tick: 8,
            depletion_odds: 1,
            head_wear: 1,
        }
    }

    /// Burns solid fuel, always produces four.
    pub fn coal_fired() -> Self {
        Self {
            name: "coal_fired".into(),
            progress_max: SLOW_CYCLE,
            rollback: RollbackPolicy::SoftRollback,
            yield_formula: YieldFormula::Flat(4),
            layer: None,
            energy_per_tick: 1,
            depletion_odds: 1,
            head_wear: 0,
        }
    }

    /// Multiblock rig working the bottom layer, output scales with what is
    /// left in the deposit.
    pub fn deep_drill() -> Self {
        Self {
            name: "deep_drill".into(),
            progress_max: FAST_CYCLE,
            rollback: RollbackPolicy::SoftRollback,
            yield_formula: YieldFormula::DepositScaled { divisor: 100 },
            layer: Some(0),
            energy_per_tick: 30,
            depletion_odds: 1,
            head_wear: 1,
        }
    }

    pub fn with_rollback(mut self, rollback: RollbackPolicy) -> Self {
        self.rollback = rollback;
        self
    }

    pub fn accepts_layer(&self, layer: i32) -> bool {
        self.layer.is_none_or(|l| l == layer)
    }
}

/// Mutable per-extractor state. This is what gets persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractorState {
    pub progress: u32,
    pub active: bool,
    #[serde(default = "enabled")]
    pub working_enabled: bool,
    pub bound_region: Option<RegionKey>,
    pub sink_full: bool,
    pub power_starved: bool,
    #[serde(default)]
    pub needs_sync: bool,
}

fn enabled() -> bool {
    true
}

impl Default for ExtractorState {
    fn default() -> Self {
        Self {
            progress: 0,
            active: false,
            working_enabled: true,
            bound_region: None,
            sink_full: false,
            power_starved: false,
            needs_sync: false,
        }
    }
}

/// Where an extractor stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    pub dimension: DimensionContext,
    pub position: BlockPos,
    pub biome: Biome,
}

impl Site {
    pub fn new(dimension: DimensionContext, position: BlockPos, biome: Biome) -> Self {
        Self {
            dimension,
            position,
            biome,
        }
    }

    pub fn region_key(&self) -> RegionKey {
        RegionKey::from_block(self.dimension.id, self.position)
    }
}

/// Shared world state an extractor reads and drains during a tick.
pub struct TickContext<'a> {
    pub allocator: &'a RegionAllocator,
    pub regions: &'a mut RegionStore,
    pub depletion: &'a mut DepletionEngine,
}

/// The machine-side capabilities of one extractor.
pub struct MachineIo<'a> {
    pub gate: &'a mut dyn ResourceGate,
    pub sink: &'a mut dyn OutputSink,
    pub head: Option<&'a mut dyn DrillHead>,
}

/// Result of a single tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// No suitable deposit under the extractor.
    Unbound,
    /// Working is disabled.
    Paused,
    /// The gate could not supply this tick's energy or fuel.
    NoPower,
    /// The formula produced nothing (for example, no drill head installed).
    NothingToExtract,
    /// The simulated insert did not fit.
    OutputFull,
    /// Progress advanced without completing a cycle.
    Progressed,
    /// A cycle completed and everything was inserted.
    Delivered {
        material: Material,
        quantity: u32,
        depleted: bool,
    },
    /// A cycle completed but the real insert came up short.
    Rejected { inserted: u32 },
}

/// One extractor: its class, its site and its state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extractor {
    pub class: ExtractorClass,
    pub site: Site,
    pub state: ExtractorState,
}

impl Extractor {
    pub fn new(class: ExtractorClass, site: Site) -> Self {
        Self {
            class,
            site,
            state: ExtractorState::default(),
        }
    }

    /// Advance one tick.
    ///
    /// Delivery is checked with a simulated insert before progress moves.
    /// If the real insert at the end of a cycle still comes up short, the
    /// items that went in stay in the sink, progress resets to zero, the
    /// drill head takes no wear and the region is not depleted. The tick
    /// reports [`TickOutcome::Rejected`] with the partial count.
    pub fn tick(&mut self, ctx: &mut TickContext<'_>, io: &mut MachineIo<'_>) -> TickOutcome {
        let key = self.site.region_key();
        let record = ctx
            .allocator
            .resolve(ctx.regions, key, &self.site.biome, &self.site.dimension);
        let deposit = record
            .deposit()
            .filter(|d| self.class.accepts_layer(d.layer))
            .cloned();
        let yield_now = current_yield(record);

        let Some(deposit) = deposit else {
            if self.state.bound_region.take().is_some() {
                tracing::debug!(class = %self.class.name, "extractor lost its deposit");
            }
            self.set_active(false);
            return TickOutcome::Unbound;
        };
        if self.state.bound_region.is_none() {
            tracing::debug!(
                class = %self.class.name,
                deposit = %deposit.id,
                group_x = key.group_x,
                group_z = key.group_z,
                "extractor bound"
            );
            self.state.bound_region = Some(key);
            self.state.needs_sync = true;
        }

        if !self.state.working_enabled {
            return TickOutcome::Paused;
        }

        let energy = self.class.energy_per_tick;
        if !io.gate.consume(energy, true) {
            self.state.progress = self.class.rollback.apply(self.state.progress);
            self.set_power_starved(true);
            self.set_active(false);
            return TickOutcome::NoPower;
        }
        self.set_power_starved(false);

        let efficiency = io.head.as_deref().map_or(0, |h| h.efficiency());
        let quantity = self.class.yield_formula.quantity(yield_now, efficiency);
        let material = match ctx.depletion.next_material(&deposit) {
            Some(m) if quantity > 0 => m.clone(),
            _ => {
                self.set_active(false);
                return TickOutcome::NothingToExtract;
            }
        };

        if io.sink.try_insert(&material, quantity, true) < quantity {
            self.state.sink_full = true;
            self.set_active(false);
            return TickOutcome::OutputFull;
        }
        self.state.sink_full = false;

        io.gate.consume(energy, false);
        self.set_active(true);
        self.state.progress += 1;
        if self.state.progress < self.class.progress_max {
            return TickOutcome::Progressed;
        }
        self.state.progress = 0;

        let inserted = io.sink.try_insert(&material, quantity, false);
        if inserted < quantity {
            self.state.sink_full = true;
            self.set_active(false);
            return TickOutcome::Rejected { inserted };
        }

        if let Some(head) = io.head.as_deref_mut() {
            head.apply_wear(self.class.head_wear);
        }
        let depleted = ctx.depletion.roll_odds(self.class.depletion_odds)
            && matches!(
                ctx.depletion
                    .deplete(ctx.regions, &key, DepletionRequest::Natural),
                DepletionOutcome::Depleted { .. }
            );
        TickOutcome::Delivered {
            material,
            quantity,
            depleted,
        }
    }

    pub fn set_working_enabled(&mut self, enabled: bool) {
        if self.state.working_enabled != enabled {
            self.state.working_enabled = enabled;
            self.state.needs_sync = true;
        }
    }

    /// Active, enabled and not waiting on power.
    pub fn is_working(&self) -> bool {
        self.state.active && self.state.working_enabled && !self.state.power_starved
    }

    pub fn progress_percent(&self) -> Fixed64 {
        ratio(
            u64::from(self.state.progress),
            u64::from(self.class.progress_max),
        )
    }

    /// Returns and clears the sync flag.
    pub fn take_sync(&mut self) -> bool {
        std::mem::take(&mut self.state.needs_sync)
    }

    fn set_active(&mut self, active: bool) {
        if self.state.active != active {
            self.state.active = active;
            self.state.needs_sync = true;
        }
    }

    fn set_power_starved(&mut self, starved: bool) {
        if self.state.power_starved != starved {
            self.state.power_starved = starved;
            self.state.needs_sync = true;
        }
    }
}
