use std::sync::Arc;

use powerflow::cluster::{NodeHealth, NodeRegistry, WorkerNode};
use powerflow::error::PowerflowError;
use powerflow::scheduler::Task;

#[test]
fn test_register_node() {
    let mut registry = NodeRegistry::new();
    let node = registry.register("A", 100).unwrap();

    assert_eq!(node.id(), "A");
    assert_eq!(node.total_capacity(), 100);
    assert_eq!(node.available_capacity(), 100);
    assert!(node.is_active());
    assert_eq!(node.health(), NodeHealth::Healthy);
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_register_rejects_zero_capacity() {
    let mut registry = NodeRegistry::new();
    let result = registry.register("A", 0);

    assert!(matches!(
        result,
        Err(PowerflowError::InvalidCapacity { ref node_id, capacity: 0 }) if node_id == "A"
    ));
    assert!(registry.is_empty());
}

#[test]
fn test_register_overwrites_existing_node() {
    let mut registry = NodeRegistry::new();
    let old = registry.register("A", 100).unwrap();
    assert!(old.try_reserve(70));
    old.set_active(false);

    let new = registry.register("A", 40).unwrap();

    assert_eq!(registry.len(), 1);
    assert_eq!(new.total_capacity(), 40);
    assert_eq!(new.available_capacity(), 40);
    assert!(new.is_active());
    assert!(Arc::ptr_eq(&registry.get("A").unwrap(), &new));
}

#[test]
fn test_unregister_is_idempotent() {
    let mut registry = NodeRegistry::new();
    registry.register("A", 100).unwrap();

    assert!(registry.unregister("A").is_some());
    assert!(registry.unregister("A").is_none());
    assert!(registry.unregister("never-registered").is_none());
    assert!(registry.get("A").is_none());
}

#[test]
fn test_list_is_sorted_snapshot() {
    let mut registry = NodeRegistry::new();
    registry.register("C", 10).unwrap();
    registry.register("A", 30).unwrap();
    registry.register("B", 20).unwrap();

    let snapshot = registry.list();
    let ids: Vec<&str> = snapshot.iter().map(|n| n.id()).collect();
    assert_eq!(ids, vec!["A", "B", "C"]);

    // Later registry changes do not affect an existing snapshot
    registry.unregister("B");
    assert_eq!(snapshot.len(), 3);
    assert_eq!(registry.list().len(), 2);

    // The snapshot can be iterated again
    let again: Vec<&str> = snapshot.iter().map(|n| n.id()).collect();
    assert_eq!(again, ids);
}

#[test]
fn test_snapshot_sees_capacity_changes() {
    let mut registry = NodeRegistry::new();
    registry.register("A", 100).unwrap();

    let snapshot = registry.list();
    assert!(registry.get("A").unwrap().try_reserve(25));
    assert_eq!(snapshot[0].available_capacity(), 75);
}

#[test]
fn test_performance_threshold_applies_to_new_nodes() {
    let mut registry = NodeRegistry::with_performance_threshold(60);
    let node = registry.register("A", 10).unwrap();

    assert_eq!(registry.optimal_performance(), 60);
    assert_eq!(node.optimal_performance(), 60);
    node.set_performance(65);
    assert!(node.is_performing_optimally());
    node.set_performance(59);
    assert!(!node.is_performing_optimally());
}

#[test]
fn test_concurrent_reservations_never_exceed_capacity() {
    let node = Arc::new(WorkerNode::new("A", 100, 80));

    let successes: usize = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let node = node.clone();
                scope.spawn(move || (0..20).filter(|_| node.try_reserve(10)).count())
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).sum()
    });

    assert_eq!(successes, 10);
    assert_eq!(node.available_capacity(), 0);
}

#[test]
fn test_concurrent_reserve_and_release_stay_in_bounds() {
    let node = Arc::new(WorkerNode::new("A", 50, 80));

    std::thread::scope(|scope| {
        for _ in 0..4 {
            let node = node.clone();
            scope.spawn(move || {
                for _ in 0..1000 {
                    if node.try_reserve(7) {
                        let available = node.available_capacity();
                        assert!(available <= 50);
                        node.release(7).unwrap();
                    }
                }
            });
        }
    });

    assert_eq!(node.available_capacity(), 50);
}

#[test]
fn test_assigned_tasks_listed_in_order() {
    let node = WorkerNode::new("A", 100, 80);
    assert!(node.try_reserve(10));
    node.assign(Task::new("T1", 10, 100));
    assert!(node.try_reserve(20));
    node.assign(Task::new("T2", 20, 100));

    let ids: Vec<String> = node.assigned_tasks().into_iter().map(|t| t.id).collect();
    assert_eq!(ids, vec!["T1", "T2"]);
    assert_eq!(node.snapshot().assigned_tasks, 2);
    assert_eq!(node.snapshot().available_capacity, 70);
}
