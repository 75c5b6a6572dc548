//! Derived-system runner: version-polling cache invalidation in place of
//! push-based events. Caches pull when a dependency's version has advanced,
//! rather than being pushed an event by the mutation itself.

use crate::handle::TableId;
use crate::world::World;

/// A read-only cache over one or more tables, with an explicit rebuild step.
pub trait DerivedSystem {
    /// Table ids this system reads. Declaration order here determines which
    /// stored version slot each dependency occupies.
    fn dependencies(&self) -> &[TableId];

    /// Marks the cache stale. Called only when a dependency's version has
    /// advanced since the last `rebuild_all`, or via `invalidate_all`.
    fn invalidate(&mut self);

    /// Recomputes cache state from the current world. Always called by
    /// `rebuild_all`, regardless of whether `invalidate` was called this pass.
    fn rebuild(&mut self, world: &World);
}

struct Entry {
    system: Box<dyn DerivedSystem>,
    last_versions: Vec<u32>,
}

/// Owns an ordered list of `(system, dependencies)`. Declaration order is a
/// dependency pipeline: later systems may read caches rebuilt by earlier ones
/// within the same `rebuild_all` pass.
#[derive(Default)]
pub struct DerivedRunner {
    entries: Vec<Entry>,
}

impl DerivedRunner {
    pub fn new() -> Self {
        DerivedRunner { entries: Vec::new() }
    }

    /// Registers a system in pipeline order. Its stored versions start at zero,
    /// matching a fresh table's starting version — so the very first
    /// `rebuild_all` does not call `invalidate` unless a table has already
    /// mutated, but always calls `rebuild`.
    pub fn register(&mut self, system: Box<dyn DerivedSystem>) {
        let dep_count = system.dependencies().len();
        self.entries.push(Entry { system, last_versions: vec![0; dep_count] });
    }

    /// Marks every system stale and zeroes stored versions, forcing the next
    /// `rebuild_all` to treat every dependency as changed. Used after
    /// `world.load_from`, since a loaded snapshot changes every row without
    /// the version counters having moved through their usual increments.
    pub fn invalidate_all(&mut self) {
        for entry in &mut self.entries {
            entry.system.invalidate();
            entry.last_versions.iter_mut().for_each(|v| *v = 0);
        }
    }

    /// For each system in declared order: compare current dependency versions
    /// to the stored ones; if any differ, call `invalidate` and store the new
    /// versions; then always call `rebuild`.
    pub fn rebuild_all(&mut self, world: &World) {
        for entry in &mut self.entries {
            let deps = entry.system.dependencies();
            let current: Vec<u32> = deps.iter().map(|&id| world.table(id).version()).collect();
            let changed = current != entry.last_versions;
            if changed {
                entry.system.invalidate();
                entry.last_versions = current;
            }
            entry.system.rebuild(world);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::UNIT_TABLE;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Counts {
        invalidate_calls: u32,
        rebuild_calls: u32,
    }

    struct CountingSystem {
        deps: Vec<TableId>,
        counts: Rc<RefCell<Counts>>,
    }

    impl DerivedSystem for CountingSystem {
        fn dependencies(&self) -> &[TableId] {
            &self.deps
        }

        fn invalidate(&mut self) {
            self.counts.borrow_mut().invalidate_calls += 1;
        }

        fn rebuild(&mut self, _world: &World) {
            self.counts.borrow_mut().rebuild_calls += 1;
        }
    }

    #[test]
    fn rebuild_is_always_called_but_invalidate_only_on_version_change() {
        // S5.
        let mut world = World::new();
        let counts = Rc::new(RefCell::new(Counts::default()));
        let mut runner = DerivedRunner::new();
        runner.register(Box::new(CountingSystem { deps: vec![UNIT_TABLE], counts: counts.clone() }));

        runner.rebuild_all(&world);
        assert_eq!(counts.borrow().invalidate_calls, 0);
        assert_eq!(counts.borrow().rebuild_calls, 1);

        world.units.allocate().unwrap();
        runner.rebuild_all(&world);
        assert_eq!(counts.borrow().invalidate_calls, 1);
        assert_eq!(counts.borrow().rebuild_calls, 2);

        runner.rebuild_all(&world);
        assert_eq!(counts.borrow().invalidate_calls, 1, "no table change, invalidate must not fire again");
        assert_eq!(counts.borrow().rebuild_calls, 3);
    }

    #[test]
    fn invalidate_all_forces_a_cold_rebuild_after_load() {
        let mut world = World::new();
        let counts = Rc::new(RefCell::new(Counts::default()));
        let mut runner = DerivedRunner::new();
        runner.register(Box::new(CountingSystem { deps: vec![UNIT_TABLE], counts: counts.clone() }));
        runner.rebuild_all(&world);

        runner.invalidate_all();
        assert_eq!(counts.borrow().invalidate_calls, 1);

        runner.rebuild_all(&world);
        assert_eq!(counts.borrow().rebuild_calls, 2);
    }

    #[test]
    fn declaration_order_is_a_pipeline_not_a_fixed_point() {
        let world = World::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        struct OrderTrackingSystem {
            id: u32,
            order: Rc<RefCell<Vec<u32>>>,
        }
        impl DerivedSystem for OrderTrackingSystem {
            fn dependencies(&self) -> &[TableId] {
                &[]
            }
            fn invalidate(&mut self) {}
            fn rebuild(&mut self, _world: &World) {
                self.order.borrow_mut().push(self.id);
            }
        }

        let mut runner = DerivedRunner::new();
        runner.register(Box::new(OrderTrackingSystem { id: 1, order: order.clone() }));
        runner.register(Box::new(OrderTrackingSystem { id: 2, order: order.clone() }));
        runner.rebuild_all(&world);

        assert_eq!(*order.borrow(), vec![1, 2]);
    }
}
