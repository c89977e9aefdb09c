//! The schedule's concurrency core (spec §4.6): a dependency/conflict gate
//! that dispatches each ready node onto its executor pool, cascades
//! completion to its dependents, and collects non-fatal system errors.
//! Gated behind the `multi_threaded` feature; the fallback below runs
//! every node sequentially in topological order instead.

use crate::error::{RunError, RunScheduleError};
use crate::executors::Executors;
use crate::world::World;

use super::graph::Graph;

#[cfg(feature = "multi_threaded")]
pub use threaded::run;

#[cfg(not(feature = "multi_threaded"))]
pub use sequential::run;

#[cfg(feature = "multi_threaded")]
mod threaded {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use parking_lot::{Condvar, Mutex};

    use crate::access::{self, AccessSet};

    /// Nodes race onto worker threads as soon as they are both
    /// dependency-ready (`depends_count == 0`, ordinary `after`/`before`
    /// edges) and membership-ready (`children_count == 0`, every direct
    /// `in_set` member has finished) — the second counter lets a pure
    /// grouping node stand in for "this set's whole subtree is done"
    /// without needing its own synthetic system.
    struct SendPtr<T: ?Sized>(*const T);
    unsafe impl<T: ?Sized> Send for SendPtr<T> {}
    unsafe impl<T: ?Sized> Sync for SendPtr<T> {}
    impl<T: ?Sized> Clone for SendPtr<T> {
        fn clone(&self) -> Self {
            *self
        }
    }
    impl<T: ?Sized> Copy for SendPtr<T> {}

    struct SendMutPtr<T: ?Sized>(*mut T);
    unsafe impl<T: ?Sized> Send for SendMutPtr<T> {}
    unsafe impl<T: ?Sized> Sync for SendMutPtr<T> {}
    impl<T: ?Sized> Clone for SendMutPtr<T> {
        fn clone(&self) -> Self {
            *self
        }
    }
    impl<T: ?Sized> Copy for SendMutPtr<T> {}

    /// Shared dispatch state, guarded by `gate`'s mutex and signaled by its
    /// condvar whenever a node finishes or newly becomes ready.
    struct Gate {
        ready: Mutex<VecDeque<usize>>,
        running: Mutex<Vec<usize>>,
        condvar: Condvar,
        finished: AtomicUsize,
        errors: Mutex<Vec<(String, RunError)>>,
    }

    /// Runs every node of `graph` to completion against `world`.
    ///
    /// # Safety contract
    /// This function does not return until every dispatched closure has run
    /// to completion (`finished == n`), so the raw pointers into `graph` and
    /// `world` captured by those closures never outlive the borrows taken
    /// here — the same pointer-handle discipline `system::param` relies on,
    /// just applied to cross-thread dispatch instead of a single-thread
    /// parameter.
    pub fn run(
        graph: &mut Graph,
        world: &World,
        executors: &Executors,
    ) -> Result<Vec<(String, RunError)>, RunScheduleError> {
        let n = graph.nodes.len();
        if n == 0 {
            return Ok(Vec::new());
        }

        let depends_count: Arc<Vec<AtomicUsize>> =
            Arc::new(graph.cache.iter().map(|c| AtomicUsize::new(c.parents.len())).collect());
        let children_count: Arc<Vec<AtomicUsize>> =
            Arc::new(graph.cache.iter().map(|c| AtomicUsize::new(c.children_count)).collect());

        let initial_ready: VecDeque<usize> = (0..n)
            .filter(|&i| {
                depends_count[i].load(Ordering::Relaxed) == 0
                    && children_count[i].load(Ordering::Relaxed) == 0
            })
            .collect();

        let gate = Arc::new(Gate {
            ready: Mutex::new(initial_ready),
            running: Mutex::new(Vec::new()),
            condvar: Condvar::new(),
            finished: AtomicUsize::new(0),
            errors: Mutex::new(Vec::new()),
        });

        let nodes_ptr = SendMutPtr(graph.nodes.as_mut_ptr());
        let successors: Arc<Vec<Vec<usize>>> =
            Arc::new(graph.cache.iter().map(|c| c.successors.clone()).collect());
        let in_set_parents: Arc<Vec<Vec<usize>>> =
            Arc::new(graph.cache.iter().map(|c| c.in_set_parents.clone()).collect());
        let world_ptr = SendPtr(world as *const World);

        loop {
            if gate.finished.load(Ordering::Acquire) == n {
                break;
            }

            let dispatched_any = dispatch_ready(
                &gate,
                nodes_ptr,
                world_ptr,
                executors,
                &depends_count,
                &children_count,
                &successors,
                &in_set_parents,
            );

            let mut running = gate.running.lock();
            if gate.finished.load(Ordering::Acquire) == n {
                break;
            }
            if !dispatched_any && running.is_empty() {
                let remaining = n - gate.finished.load(Ordering::Acquire);
                return Err(RunScheduleError::sets_remaining(remaining));
            }
            gate.condvar.wait(&mut running);
        }

        let errors = std::mem::take(&mut *gate.errors.lock());
        Ok(errors)
    }

    /// Starts every ready node whose access doesn't conflict with a node
    /// already running: each pass scans the whole `ready` queue for the
    /// first such node, starts it, and repeats until no remaining node can
    /// start. A later-queued but non-conflicting node can therefore start
    /// ahead of an earlier one that's merely blocked by what's currently
    /// running — conflicting systems never overlap, but their relative
    /// start order across runs is unspecified unless the caller adds an
    /// explicit edge between them (spec §4.3).
    #[allow(clippy::too_many_arguments)]
    fn dispatch_ready(
        gate: &Arc<Gate>,
        nodes_ptr: SendMutPtr<super::super::set::SetNode>,
        world_ptr: SendPtr<World>,
        executors: &Executors,
        depends_count: &Arc<Vec<AtomicUsize>>,
        children_count: &Arc<Vec<AtomicUsize>>,
        successors: &Arc<Vec<Vec<usize>>>,
        in_set_parents: &Arc<Vec<Vec<usize>>>,
    ) -> bool {
        let mut started_any = false;
        loop {
            let mut ready = gate.ready.lock();
            let mut running = gate.running.lock();

            let candidate = ready.iter().position(|&idx| {
                let node = unsafe { &*nodes_ptr.0.add(idx) };
                let access = node_access(node);
                !running.iter().any(|&r| {
                    let other = unsafe { &*nodes_ptr.0.add(r) };
                    access::conflict(&access, &node_access(other))
                })
            });

            let Some(pos) = candidate else {
                break;
            };
            let idx = ready.remove(pos).unwrap();
            running.push(idx);
            drop(running);
            drop(ready);

            started_any = true;
            dispatch_one(
                idx,
                gate.clone(),
                nodes_ptr,
                world_ptr,
                executors,
                depends_count.clone(),
                children_count.clone(),
                successors.clone(),
                in_set_parents.clone(),
            );
        }
        started_any
    }

    fn node_access(node: &super::super::set::SetNode) -> AccessSet {
        node.system.as_ref().map(|s| s.meta().access().clone()).unwrap_or_default()
    }

    /// Evaluates `node`'s run-conditions on the calling (dispatcher) thread,
    /// then either runs its system on `label`'s executor pool or, for a
    /// condition failure or a pure grouping node, completes it inline.
    #[allow(clippy::too_many_arguments)]
    fn dispatch_one(
        idx: usize,
        gate: Arc<Gate>,
        nodes_ptr: SendMutPtr<super::super::set::SetNode>,
        world_ptr: SendPtr<World>,
        executors: &Executors,
        depends_count: Arc<Vec<AtomicUsize>>,
        children_count: Arc<Vec<AtomicUsize>>,
        successors: Arc<Vec<Vec<usize>>>,
        in_set_parents: Arc<Vec<Vec<usize>>>,
    ) {
        let node = unsafe { &mut *nodes_ptr.0.add(idx) };
        let world = unsafe { &*world_ptr.0 };

        let mut should_run = true;
        for condition in &mut node.run_conditions {
            match condition.run(world) {
                Ok(true) => {}
                Ok(false) => should_run = false,
                Err(err) => {
                    gate.errors.lock().push((node_name(node), err));
                    should_run = false;
                }
            }
        }

        if !should_run || node.system.is_none() {
            finish(idx, &gate, &depends_count, &children_count, &successors, &in_set_parents);
            return;
        }

        let executor_label = node.executor.clone();
        let name = node_name(node);

        let job = move || {
            let node = unsafe { &mut *nodes_ptr.0.add(idx) };
            let world = unsafe { &*world_ptr.0 };
            let system = node.system.as_mut().expect("checked Some above");
            // `System::run` already wraps the user function in
            // `catch_unwind` (spec §4.2), so a panic surfaces here as an
            // ordinary `Err`.
            if let Err(err) = system.run(world) {
                gate.errors.lock().push((name, err));
            }
            finish(idx, &gate, &depends_count, &children_count, &successors, &in_set_parents);
        };

        if let Err(err) = executors.spawn(executor_label.as_ref(), job) {
            gate.errors.lock().push((node_name(node), err));
            finish(idx, &gate, &depends_count, &children_count, &successors, &in_set_parents);
        }
    }

    fn node_name(node: &super::super::set::SetNode) -> String {
        node.name.clone().unwrap_or_else(|| format!("{:?}", node.label))
    }

    /// Marks `idx` finished, decrementing its successors' `depends_count`
    /// and its `in_set` parents' `children_count`, pushing anything that
    /// reaches zero on both counters onto the ready queue, then wakes the
    /// dispatcher.
    fn finish(
        idx: usize,
        gate: &Arc<Gate>,
        depends_count: &Arc<Vec<AtomicUsize>>,
        children_count: &Arc<Vec<AtomicUsize>>,
        successors: &Arc<Vec<Vec<usize>>>,
        in_set_parents: &Arc<Vec<Vec<usize>>>,
    ) {
        {
            let mut running = gate.running.lock();
            running.retain(|&r| r != idx);
        }

        let mut newly_ready = Vec::new();
        for &succ in &successors[idx] {
            let prev = depends_count[succ].fetch_sub(1, Ordering::AcqRel);
            if prev == 1 && children_count[succ].load(Ordering::Acquire) == 0 {
                newly_ready.push(succ);
            }
        }
        for &parent in &in_set_parents[idx] {
            let prev = children_count[parent].fetch_sub(1, Ordering::AcqRel);
            if prev == 1 && depends_count[parent].load(Ordering::Acquire) == 0 {
                newly_ready.push(parent);
            }
        }

        if !newly_ready.is_empty() {
            let mut ready = gate.ready.lock();
            ready.extend(newly_ready);
        }

        gate.finished.fetch_add(1, Ordering::AcqRel);
        gate.condvar.notify_all();
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::schedule::graph;
        use crate::schedule::set::SetNode;
        use crate::system::function_system::IntoSystem;
        use crate::system::param::ResMut;

        struct Counter(u32);

        #[test]
        fn independent_systems_all_run() {
            let mut world = World::new();
            world.insert_resource(Counter(0));

            let a = (|mut c: ResMut<Counter>| c.get_mut().0 += 1).into_system("a");
            let b = (|mut c: ResMut<Counter>| c.get_mut().0 += 10).into_system("b");

            let mut a_node = SetNode::leaf(a);
            let mut b_node = SetNode::leaf(b);
            a_node.system.as_mut().unwrap().initialize(&mut world);
            b_node.system.as_mut().unwrap().initialize(&mut world);

            let mut graph = graph::build(vec![a_node, b_node]).unwrap();
            let executors = Executors::new_default();
            let errors = run(&mut graph, &world, &executors).unwrap();
            assert!(errors.is_empty());
            assert_eq!(world.get_resource::<Counter>().unwrap().0, 11);
        }

        #[test]
        fn system_panic_is_collected_not_fatal() {
            let mut world = World::new();
            let panics = (|| panic!("boom")).into_system("panics");
            let mut node = SetNode::leaf(panics);
            node.system.as_mut().unwrap().initialize(&mut world);

            let mut graph = graph::build(vec![node]).unwrap();
            let executors = Executors::new_default();
            let errors = run(&mut graph, &world, &executors).unwrap();
            assert_eq!(errors.len(), 1);
            assert!(matches!(errors[0].1, RunError::Panicked(_)));
        }
    }
}

/// Single-threaded fallback used when the `multi_threaded` feature is
/// disabled: every node runs on the calling thread, in the graph's
/// topological order, with no conflict checking needed since nothing ever
/// runs concurrently.
#[cfg(not(feature = "multi_threaded"))]
mod sequential {
    use super::*;

    pub fn run(
        graph: &mut Graph,
        world: &World,
        _executors: &Executors,
    ) -> Result<Vec<(String, RunError)>, RunScheduleError> {
        let mut errors = Vec::new();

        for &idx in &graph.topo_order {
            let node = &mut graph.nodes[idx];

            let mut should_run = true;
            for condition in &mut node.run_conditions {
                match condition.run(world) {
                    Ok(true) => {}
                    Ok(false) => should_run = false,
                    Err(err) => {
                        errors.push((node_name(node), err));
                        should_run = false;
                    }
                }
            }

            if should_run {
                if let Some(system) = node.system.as_mut() {
                    if let Err(err) = system.run(world) {
                        errors.push((node_name(node), err));
                    }
                }
            }
        }

        Ok(errors)
    }

    fn node_name(node: &super::super::set::SetNode) -> String {
        node.name.clone().unwrap_or_else(|| format!("{:?}", node.label))
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::schedule::graph;
        use crate::schedule::set::SetNode;
        use crate::system::function_system::IntoSystem;
        use crate::system::param::ResMut;

        struct Counter(u32);

        #[test]
        fn systems_run_in_topological_order() {
            let mut world = World::new();
            world.insert_resource(Counter(0));

            let a = (|mut c: ResMut<Counter>| c.get_mut().0 = 1).into_system("a");
            let b = (|mut c: ResMut<Counter>| c.get_mut().0 *= 10).into_system("b");

            let mut a_node = SetNode::leaf(a);
            a_node.system.as_mut().unwrap().initialize(&mut world);
            let mut b_node = SetNode::leaf(b);
            b_node.system.as_mut().unwrap().initialize(&mut world);
            b_node.depends_on.push(a_node.label.clone());

            let mut graph = graph::build(vec![a_node, b_node]).unwrap();
            let executors = Executors::new_default();
            let errors = run(&mut graph, &world, &executors).unwrap();
            assert!(errors.is_empty());
            assert_eq!(world.get_resource::<Counter>().unwrap().0, 10);
        }
    }
}
