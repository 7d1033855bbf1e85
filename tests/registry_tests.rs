mod common;

use std::sync::Arc;
use std::thread;

use ciu_agent::models::{Rect, ZoneKind};
use ciu_agent::registry::ZoneRegistry;
use common::test_zone;

#[test]
fn replace_all_is_observed_atomically() {
    // Writers keep swapping between two complete sets; readers must
    // only ever observe one set or the other, never a mixture.
    let registry = Arc::new(ZoneRegistry::new());
    let set_a: Vec<_> = (0..8)
        .map(|i| test_zone(&format!("a{i}"), Rect::new(i * 10, 0, 10, 10)))
        .collect();
    let set_b: Vec<_> = (0..5)
        .map(|i| test_zone(&format!("b{i}"), Rect::new(i * 10, 100, 10, 10)))
        .collect();
    registry.replace_all(set_a.clone());

    let writer = {
        let registry = registry.clone();
        let (set_a, set_b) = (set_a.clone(), set_b.clone());
        thread::spawn(move || {
            for round in 0..500 {
                if round % 2 == 0 {
                    registry.replace_all(set_b.clone());
                } else {
                    registry.replace_all(set_a.clone());
                }
            }
        })
    };

    let reader = {
        let registry = registry.clone();
        thread::spawn(move || {
            for _ in 0..500 {
                let snapshot = registry.all();
                let a_count = snapshot.iter().filter(|z| z.id.starts_with('a')).count();
                let b_count = snapshot.iter().filter(|z| z.id.starts_with('b')).count();
                assert!(
                    (a_count == 8 && b_count == 0) || (a_count == 0 && b_count == 5),
                    "mixed registry state observed: {a_count} a-zones, {b_count} b-zones"
                );
            }
        })
    };

    writer.join().unwrap();
    reader.join().unwrap();
}

#[test]
fn ids_stay_unique_under_concurrent_registration() {
    let registry = Arc::new(ZoneRegistry::new());
    let mut handles = Vec::new();
    for _ in 0..4 {
        let registry = registry.clone();
        handles.push(thread::spawn(move || {
            for i in 0..100 {
                registry.register(test_zone(&format!("z{i}"), Rect::new(i, i, 5, 5)));
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(registry.count(), 100);
}

#[test]
fn label_and_kind_queries_return_clones() {
    let registry = ZoneRegistry::new();
    let mut zone = test_zone("zone_save", Rect::new(0, 0, 40, 20));
    zone.label = "Save As".to_string();
    zone.kind = ZoneKind::Button;
    registry.register(zone);

    let by_label = registry.find_by_label("save");
    assert_eq!(by_label.len(), 1);
    let by_kind = registry.find_by_kind(ZoneKind::Button);
    assert_eq!(by_kind.len(), 1);
    assert!(registry.find_by_label("quit").is_empty());

    // Mutating the returned clone does not touch the store.
    let mut clone = by_label.into_iter().next().unwrap();
    clone.label = "changed".to_string();
    assert_eq!(registry.get("zone_save").unwrap().label, "Save As");
}
