//! Whole-system integration scenarios, separate from the per-module unit
//! tests under `src/`. Each test here exercises the public API the way a
//! host embedding this crate would, rather than reaching into table
//! internals.

use std::cell::RefCell;
use std::rc::Rc;

use sim_core::derived::{DerivedRunner, DerivedSystem};
use sim_core::driver::{Context, Driver, InputBuffer, System};
use sim_core::fixed::{Fx, FxVec2};
use sim_core::table::{AnyTable, UNIT_TABLE};
use sim_core::world::World;

#[test]
fn allocate_free_allocate_cycles_the_raw_id_and_bumps_generation() {
    let mut world = World::new();
    let h1 = world.units.allocate().unwrap();
    assert_eq!(h1.raw_id(), 0);
    assert_eq!(h1.generation(), 0);

    world.units.free(h1);
    let h2 = world.units.allocate().unwrap();
    assert_eq!(h2.raw_id(), 0);
    assert_eq!(h2.generation(), 1);

    assert_eq!(world.units.get_slot(h1), None);
    assert_eq!(world.units.get_slot(h2), Some(0));
}

#[test]
fn swap_pop_relocates_the_last_row_into_the_freed_slot() {
    let mut world = World::new();
    let a = world.units.allocate().unwrap();
    let b = world.units.allocate().unwrap();
    let c = world.units.allocate().unwrap();
    world.units.set_health(world.units.get_slot(a).unwrap(), 10);
    world.units.set_health(world.units.get_slot(b).unwrap(), 20);
    world.units.set_health(world.units.get_slot(c).unwrap(), 30);

    world.units.free(b);

    assert_eq!(world.units.health(0), 10);
    assert_eq!(world.units.health(1), 30);
    assert_eq!(world.units.count(), 2);
    assert_eq!(world.units.get_slot(c), Some(1));
}

#[test]
fn radius_query_returns_the_exact_hit_set_in_grid_cell_order() {
    let mut world = World::new();
    let positions = [FxVec2::from_ints(0, 0), FxVec2::from_ints(100, 0), FxVec2::from_ints(0, 100), FxVec2::from_ints(1000, 1000)];
    for pos in positions {
        let h = world.units.allocate().unwrap();
        let slot = world.units.get_slot(h).unwrap();
        world.units.set_position(slot, pos);
    }
    world.units.spatial_sort();

    let hits: Vec<u32> = world.units.query_radius(FxVec2::from_ints(0, 0), Fx::from_int(150)).collect();
    assert_eq!(hits, vec![0, 1, 2]);
}

#[test]
fn world_round_trip_preserves_state_hash_across_three_tables() {
    let mut world = World::new();
    for i in 0..100 {
        let h = world.units.allocate().unwrap();
        let slot = world.units.get_slot(h).unwrap();
        world.units.set_position(slot, FxVec2::from_ints(i, i * 3));
        world.units.set_health(slot, 100 - i);
    }
    for i in 0..50 {
        let h = world.buildings.allocate(i);
        let slot = world.buildings.get_slot(h).unwrap();
        world.buildings.set_position(slot, FxVec2::from_ints(i * 7, i));
    }
    world.match_state.set_frame(42);
    world.match_state.set_session_seed(9001);

    let hash_before = world.compute_state_hash();
    let snapshot = world.save_to();

    world.reset();
    assert_ne!(world.compute_state_hash(), hash_before);

    world.load_from(&snapshot).unwrap();
    assert_eq!(world.compute_state_hash(), hash_before);
    assert_eq!(world.units.count(), 100);
    assert_eq!(world.buildings.count(), 50);
    assert_eq!(world.match_state.frame(), 42);
}

struct HealthSumCache {
    total: Rc<RefCell<i32>>,
    rebuild_calls: Rc<RefCell<u32>>,
}

impl DerivedSystem for HealthSumCache {
    fn dependencies(&self) -> &[sim_core::handle::TableId] {
        &[UNIT_TABLE]
    }

    fn invalidate(&mut self) {}

    fn rebuild(&mut self, world: &World) {
        *self.total.borrow_mut() = world.units.healths()[..world.units.count() as usize].iter().sum();
        *self.rebuild_calls.borrow_mut() += 1;
    }
}

#[test]
fn derived_cache_rebuilds_every_pass_and_reflects_the_latest_mutation() {
    let mut world = World::new();
    let mut runner = DerivedRunner::new();
    let total = Rc::new(RefCell::new(0));
    let rebuild_calls = Rc::new(RefCell::new(0));
    runner.register(Box::new(HealthSumCache { total: total.clone(), rebuild_calls: rebuild_calls.clone() }));

    runner.rebuild_all(&world);
    assert_eq!(*total.borrow(), 0);
    assert_eq!(*rebuild_calls.borrow(), 1);

    let h = world.units.allocate().unwrap();
    let slot = world.units.get_slot(h).unwrap();
    world.units.set_health(slot, 7);
    runner.rebuild_all(&world);
    assert_eq!(*total.borrow(), 7);

    runner.rebuild_all(&world);
    assert_eq!(*rebuild_calls.borrow(), 3, "rebuild runs every pass even with no further mutation");
}

#[test]
fn stale_handle_survives_a_full_cycle_of_the_raw_id_space() {
    let mut world = World::new();
    let h = world.units.allocate().unwrap();
    world.units.free(h);

    // Cycle through enough allocate/free pairs to wrap the 16-bit raw_id
    // space at least once; capacity is far smaller than u16::MAX so this
    // allocates into the same handful of slots repeatedly.
    for _ in 0..(u16::MAX as u32 + 1) {
        let cycle = world.units.allocate().unwrap();
        world.units.free(cycle);
    }

    assert_eq!(world.units.get_slot(h), None);
}

#[derive(Clone, Default)]
struct DummyInput {
    spawn_health: i32,
}

struct SpawnFromInput {
    spawned: bool,
}

impl System<DummyInput> for SpawnFromInput {
    fn tick(&mut self, ctx: &Context<'_, DummyInput>, world: &mut World) {
        if !self.spawned {
            let h = world.units.allocate().unwrap();
            let slot = world.units.get_slot(h).unwrap();
            world.units.set_health(slot, ctx.get_input(0).spawn_health);
            self.spawned = true;
        }
    }
}

fn run_script(session_seed: i32) -> (World, u64) {
    let mut world = World::new();
    let mut runner = DerivedRunner::new();
    let mut inputs: InputBuffer<DummyInput> = InputBuffer::new(16, 1);
    inputs.set(0, 0, DummyInput { spawn_health: 77 });

    let mut driver: Driver<DummyInput> = Driver::new();
    driver.register(Box::new(SpawnFromInput { spawned: false }));

    for _ in 0..10 {
        driver.tick(&mut world, &mut runner, &inputs, 1, session_seed);
    }

    let hash = world.compute_state_hash();
    (world, hash)
}

#[test]
fn identical_seed_and_input_script_produces_identical_state_hash() {
    let (_world_a, hash_a) = run_script(1234);
    let (_world_b, hash_b) = run_script(1234);
    assert_eq!(hash_a, hash_b);
}

#[test]
fn garrison_handle_resolves_through_the_world_table_map() {
    let mut world = World::new();
    let building = world.buildings.allocate(0);
    let unit = world.units.allocate().unwrap();
    let unit_slot = world.units.get_slot(unit).unwrap();
    world.units.set_garrisoned_in(unit_slot, building);

    let garrisoned = world.units.garrisoned_in(unit_slot);
    assert_eq!(garrisoned, building);
    assert!(world.table(garrisoned.table_id()).count() > 0);
}
