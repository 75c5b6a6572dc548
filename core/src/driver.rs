//! Tick driver: ordered system list, per-tick `Context`, and deterministic
//! frame advancement.

use crate::derived::DerivedRunner;
use crate::world::World;

/// A pre-populated ring buffer of per-player input, indexed by `(frame,
/// player)`. The host fills it ahead of each tick; the core only reads it.
pub struct InputBuffer<I> {
    capacity_frames: usize,
    player_count: usize,
    slots: Vec<I>,
}

impl<I: Default + Clone> InputBuffer<I> {
    pub fn new(capacity_frames: usize, player_count: usize) -> Self {
        InputBuffer { capacity_frames, player_count, slots: vec![I::default(); capacity_frames * player_count] }
    }

    fn index(&self, frame: i32, player_id: i32) -> usize {
        let frame_slot = (frame as usize) % self.capacity_frames;
        frame_slot * self.player_count + player_id as usize
    }

    pub fn set(&mut self, frame: i32, player_id: i32, input: I) {
        let idx = self.index(frame, player_id);
        self.slots[idx] = input;
    }

    pub fn get(&self, frame: i32, player_id: i32) -> &I {
        &self.slots[self.index(frame, player_id)]
    }
}

/// A per-tick read-only bundle carried by value into every system.
pub struct Context<'a, I> {
    pub frame: i32,
    pub player_count: i32,
    pub session_seed: i32,
    inputs: &'a InputBuffer<I>,
}

impl<'a, I: Default + Clone> Context<'a, I> {
    pub fn get_input(&self, player_id: i32) -> &I {
        self.inputs.get(self.frame, player_id)
    }
}

/// A gameplay system invoked once per tick in registration order. Systems
/// mutate tables through the typed accessors on `World`'s fields; every
/// mutation bumps the owning table's version counter, which the derived
/// runner observes on the next tick.
pub trait System<I> {
    fn tick(&mut self, ctx: &Context<'_, I>, world: &mut World);
}

/// Holds the ordered system list and the frame counter.
pub struct Driver<I> {
    systems: Vec<Box<dyn System<I>>>,
    frame: i32,
}

impl<I: Default + Clone> Driver<I> {
    pub fn new() -> Self {
        Driver { systems: Vec::new(), frame: 0 }
    }

    pub fn register(&mut self, system: Box<dyn System<I>>) {
        self.systems.push(system);
    }

    pub fn frame(&self) -> i32 {
        self.frame
    }

    /// Runs one tick: composes `Context`, rebuilds derived caches, invokes
    /// every system in registration order, then advances the frame counter.
    /// Systems must not capture iteration state across ticks.
    pub fn tick(&mut self, world: &mut World, runner: &mut DerivedRunner, inputs: &InputBuffer<I>, player_count: i32, session_seed: i32) {
        let ctx = Context { frame: self.frame, player_count, session_seed, inputs };
        runner.rebuild_all(world);
        for system in &mut self.systems {
            system.tick(&ctx, world);
        }
        self.frame += 1;
    }
}

impl<I: Default + Clone> Default for Driver<I> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::AnyTable;

    #[derive(Clone, Default, PartialEq, Debug)]
    struct DummyInput {
        move_x: i32,
    }

    struct SpawnOnFirstTick {
        spawned: bool,
    }

    impl System<DummyInput> for SpawnOnFirstTick {
        fn tick(&mut self, ctx: &Context<'_, DummyInput>, world: &mut World) {
            if !self.spawned {
                let h = world.units.allocate().unwrap();
                let slot = world.units.get_slot(h).unwrap();
                world.units.set_health(slot, ctx.get_input(0).move_x);
                self.spawned = true;
            }
        }
    }

    #[test]
    fn tick_composes_context_rebuilds_and_advances_frame() {
        let mut world = World::new();
        let mut runner = DerivedRunner::new();
        let mut inputs: InputBuffer<DummyInput> = InputBuffer::new(8, 2);
        inputs.set(0, 0, DummyInput { move_x: 7 });

        let mut driver: Driver<DummyInput> = Driver::new();
        driver.register(Box::new(SpawnOnFirstTick { spawned: false }));

        assert_eq!(driver.frame(), 0);
        driver.tick(&mut world, &mut runner, &inputs, 2, 1234);
        assert_eq!(driver.frame(), 1);
        assert_eq!(world.units.count(), 1);
        assert_eq!(world.units.health(0), 7);
    }

    #[test]
    fn systems_run_in_registration_order() {
        use std::cell::RefCell;
        use std::rc::Rc;

        struct OrderSystem {
            id: i32,
            order: Rc<RefCell<Vec<i32>>>,
        }
        impl System<DummyInput> for OrderSystem {
            fn tick(&mut self, _ctx: &Context<'_, DummyInput>, _world: &mut World) {
                self.order.borrow_mut().push(self.id);
            }
        }

        let mut world = World::new();
        let mut runner = DerivedRunner::new();
        let inputs: InputBuffer<DummyInput> = InputBuffer::new(4, 1);
        let order = Rc::new(RefCell::new(Vec::new()));

        let mut driver: Driver<DummyInput> = Driver::new();
        driver.register(Box::new(OrderSystem { id: 1, order: order.clone() }));
        driver.register(Box::new(OrderSystem { id: 2, order: order.clone() }));
        driver.tick(&mut world, &mut runner, &inputs, 1, 0);

        assert_eq!(*order.borrow(), vec![1, 2]);
    }

    #[test]
    fn input_buffer_wraps_around_its_frame_capacity() {
        let mut inputs: InputBuffer<DummyInput> = InputBuffer::new(4, 1);
        inputs.set(0, 0, DummyInput { move_x: 1 });
        inputs.set(4, 0, DummyInput { move_x: 2 });
        // frame 4 wraps to the same physical slot as frame 0.
        assert_eq!(inputs.get(0, 0).move_x, 2);
    }
}
