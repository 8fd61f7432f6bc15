//! Saving and restoring regions and extractor state mid-run.

use lode_core::catalog::YieldRange;
use lode_core::engine::{MachineParts, SimConfig, Simulation};
use lode_core::extractor::{Extractor, ExtractorClass, TickOutcome};
use lode_core::region::MAX_OPERATIONS;
use lode_core::serialize::{
    DEPLETION_KEY, DeserializeError, KeyValueStore, MemoryStore, REGION_PREFIX,
    decode_extractor_state, encode_extractor_state, region_storage_key,
};
use lode_core::test_utils::*;
use lode_power::{EnergyBuffer, PowerSource};

fn varied_catalog() -> std::sync::Arc<lode_core::catalog::DepositCatalog> {
    let mut iron = fixed_deposit("iron", 3, 0, 500);
    iron.yield_range = YieldRange { min: 10, max: 90 };
    let mut tin = fixed_deposit("tin", 2, 0, 250);
    tin.yield_range = YieldRange { min: 40, max: 60 };
    catalog_of([iron, tin])
}

#[test]
fn snapshot_round_trip_keeps_regions_and_ticking_continues() {
    let mut sim = simulation(iron_catalog(), 21);
    let class = with_cycle(ExtractorClass::basic(), 1);
    add_unmetered(&mut sim, class.clone(), site_at(0, 0), 1000);
    sim.survey(key(0, 0), 2, &overworld(), |_| plains());
    sim.run(5);
    let bytes = sim.save_regions().unwrap();

    let mut reloaded = simulation(iron_catalog(), 21);
    assert_eq!(reloaded.load_regions(&bytes).unwrap(), 0);
    assert_eq!(reloaded.regions().len(), 25);
    for (k, record) in sim.regions().iter() {
        assert_eq!(reloaded.region(k), Some(record));
    }
    assert!(!reloaded.regions().is_dirty());

    add_unmetered(&mut reloaded, class, site_at(0, 0), 1000);
    reloaded.run(5);
    assert_eq!(
        reloaded.region(&key(0, 0)).unwrap().operations_remaining(),
        MAX_OPERATIONS - 10 * 1000
    );
}

#[test]
fn empty_snapshot_is_rejected() {
    let mut sim = simulation(iron_catalog(), 1);
    sim.resolve_region(key(0, 0), &plains(), &overworld());
    assert!(matches!(
        sim.load_regions(&[]),
        Err(DeserializeError::Decode(_))
    ));
    // A failed load leaves the table alone.
    assert_eq!(sim.regions().len(), 1);
}

#[test]
fn kv_persist_writes_only_changed_regions() {
    let mut sim = simulation(varied_catalog(), 4);
    let class = with_cycle(ExtractorClass::basic(), 1);
    add_unmetered(&mut sim, class, site_at(0, 0), 1000);
    sim.survey(key(0, 0), 1, &overworld(), |_| plains());

    let mut kv = MemoryStore::new();
    assert_eq!(sim.persist(&mut kv).unwrap(), 9);
    assert_eq!(kv.keys_with_prefix(REGION_PREFIX).len(), 9);
    assert!(kv.get(DEPLETION_KEY).is_some());
    assert_eq!(sim.persist(&mut kv).unwrap(), 0);

    // Only the mined region changes.
    sim.run(3);
    assert_eq!(sim.persist(&mut kv).unwrap(), 1);

    let mut restored = simulation(varied_catalog(), 4);
    assert_eq!(restored.restore(&kv), 0);
    assert_eq!(restored.regions().len(), 9);
    assert_eq!(restored.depletion(), sim.depletion());
    for (k, record) in sim.regions().iter() {
        assert_eq!(restored.region(k), Some(record));
    }
}

#[test]
fn corrupt_entry_is_dropped_and_rerolled_identically() {
    let mut sim = simulation(varied_catalog(), 77);
    sim.survey(key(0, 0), 1, &overworld(), |_| plains());
    sim.deplete_region(&key(1, 1), 40_000);
    let original = sim.region(&key(1, 1)).unwrap().clone();

    let mut kv = MemoryStore::new();
    sim.persist(&mut kv).unwrap();
    kv.put(&region_storage_key(&key(1, 1)), Vec::new());

    let mut restored = simulation(varied_catalog(), 77);
    assert_eq!(restored.restore(&kv), 1);
    assert!(restored.region(&key(1, 1)).is_none());

    // Same seed, same key: same deposit and yield, but a fresh budget.
    let rerolled = restored
        .resolve_region(key(1, 1), &plains(), &overworld())
        .clone();
    assert_eq!(rerolled.deposit_id(), original.deposit_id());
    assert_eq!(rerolled.initial_yield(), original.initial_yield());
    assert_eq!(rerolled.operations_remaining(), MAX_OPERATIONS);
    assert_eq!(original.operations_remaining(), MAX_OPERATIONS - 40_000);
}

#[test]
fn entry_under_the_wrong_key_is_dropped() {
    let mut sim = simulation(varied_catalog(), 5);
    sim.resolve_region(key(0, 0), &plains(), &overworld());
    let mut kv = MemoryStore::new();
    sim.persist(&mut kv).unwrap();

    let blob = kv.get(&region_storage_key(&key(0, 0))).unwrap().to_vec();
    kv.put(&region_storage_key(&key(9, 9)), blob);

    let mut restored = simulation(varied_catalog(), 5);
    assert_eq!(restored.restore(&kv), 1);
    assert!(restored.region(&key(0, 0)).is_some());
    assert!(restored.region(&key(9, 9)).is_none());
}

#[test]
fn removed_deposit_restores_as_empty_region() {
    let mut sim = simulation(varied_catalog(), 8);
    let class = with_cycle(ExtractorClass::basic(), 1);
    add_unmetered(&mut sim, class.clone(), site_at(0, 0), 1000);
    sim.run(1);
    let mut kv = MemoryStore::new();
    sim.persist(&mut kv).unwrap();
    let mined = sim.region(&key(0, 0)).unwrap().deposit_id().unwrap().to_owned();

    // Reload with a catalog that no longer has the mined deposit.
    let survivors = varied_catalog()
        .iter()
        .filter(|d| d.id != mined)
        .map(|d| (**d).clone())
        .collect::<Vec<_>>();
    let mut restored = simulation(catalog_of(survivors), 8);
    assert_eq!(restored.restore(&kv), 0);
    assert_eq!(restored.region(&key(0, 0)).unwrap().deposit_id(), None);

    let id = add_unmetered(&mut restored, class, site_at(0, 0), 1000);
    assert_eq!(restored.step().outcome(id), Some(&TickOutcome::Unbound));
}

#[test]
fn extractor_state_survives_save_mid_cycle() {
    let mut sim: Simulation<PowerSource> =
        Simulation::new(iron_catalog(), SimConfig { world_seed: 6 });
    let id = sim.add_extractor(
        Extractor::new(with_cycle(ExtractorClass::basic(), 10), site_at(0, 0)),
        MachineParts::new(
            EnergyBuffer::full(10_000, 100).into(),
            lode_core::capability::OutputBuffer::new(100),
        ),
    );
    sim.run(7);
    sim.extractor_mut(id).unwrap().set_working_enabled(false);

    let saved_state = encode_extractor_state(&sim.extractor(id).unwrap().state).unwrap();
    let mut kv = MemoryStore::new();
    sim.persist(&mut kv).unwrap();
    let (extractor, parts) = sim.remove_extractor(id).unwrap();
    assert_eq!(sim.extractor_count(), 0);

    let mut restored: Simulation<PowerSource> =
        Simulation::new(iron_catalog(), SimConfig { world_seed: 6 });
    restored.restore(&kv);
    let mut again = Extractor::new(extractor.class, extractor.site);
    again.state = decode_extractor_state(&saved_state).unwrap();
    assert_eq!(again.state.progress, 7);
    assert!(!again.state.working_enabled);
    let id = restored.add_extractor(again, parts);

    assert_eq!(restored.step().outcome(id), Some(&TickOutcome::Paused));
    restored
        .extractor_mut(id)
        .unwrap()
        .set_working_enabled(true);
    // Three more ticks finish the cycle.
    assert_eq!(restored.run(3), 1);
    assert_eq!(restored.extractor(id).unwrap().state.progress, 0);
}
