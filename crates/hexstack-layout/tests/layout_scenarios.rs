//! End-to-end stacking scenarios over the in-memory scene.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use hexstack_layout::topology::{CellKey, GridMath, HexGrid, Point};
use hexstack_layout::{
    newcomer_center, EntityDirectory, EntityId, EntityPatch, EntitySnapshot, Error, HostEvent,
    LayoutEngine, LayoutService, LayoutSettings, LayoutTask, MemoryScene, MutationError,
    NotificationSource, PositionChange,
};

const UNIT: f64 = 100.0;

const A: EntityId = EntityId(1);
const B: EntityId = EntityId(2);
const C: EntityId = EntityId(3);

const C0: CellKey = CellKey::new(0, 0);
const C1: CellKey = CellKey::new(1, 0);
const C2: CellKey = CellKey::new(3, 0);

struct Harness {
    scene: Rc<MemoryScene>,
    settings: Rc<RefCell<LayoutSettings>>,
    service: Rc<LayoutService<HexGrid>>,
}

impl Harness {
    fn new(entities: Vec<EntitySnapshot>) -> Self {
        let scene = Rc::new(MemoryScene::new());
        for e in entities {
            scene.insert(e);
        }
        let settings = Rc::new(RefCell::new(LayoutSettings::default()));
        let service = LayoutService::new(scene.context(HexGrid::new(UNIT), settings.clone()));
        service.initialize();
        Self {
            scene,
            settings,
            service,
        }
    }

    fn grid(&self) -> &GridMath<HexGrid> {
        &self.service.host().grid
    }

    /// Top-left corner that centers a one-cell entity drawn at `scale` in `cell`.
    fn top_left(&self, cell: CellKey, scale: f64) -> Point {
        top_left(cell, scale)
    }

    fn entity(&self, id: EntityId) -> EntitySnapshot {
        self.scene.entities().into_iter().find(|e| e.id == id).expect("entity exists")
    }

    fn cell_of(&self, id: EntityId) -> Option<CellKey> {
        self.service.state().occupancy().cell_of(id)
    }
}

fn top_left(cell: CellKey, scale: f64) -> Point {
    let center = GridMath::new(HexGrid::new(UNIT)).center_of(cell);
    let half = UNIT * scale / 2.0;
    Point::new(center.x - half, center.y - half)
}

fn at(id: EntityId, cell: CellKey, scale: f64) -> EntitySnapshot {
    EntitySnapshot::new(id, top_left(cell, scale)).with_scale(scale)
}

fn assert_close(actual: Point, expected: Point) {
    assert!(
        (actual - expected).length() < 1e-6,
        "expected {expected}, got {actual}"
    );
}

#[tokio::test]
async fn solo_entry_centers_at_solo_scale() {
    let h = Harness::new(vec![]);

    // Dropped off-center but inside C1, at a leftover small scale.
    let mut snapshot = at(A, C1, 0.4);
    snapshot.position = snapshot.position + Point::new(12.0, -8.0);
    h.scene.spawn(snapshot);
    h.service.drain().await.unwrap();

    assert_eq!(h.cell_of(A), Some(C1));
    let a = h.entity(A);
    assert_close(a.position, h.top_left(C1, 1.0));
    assert_eq!(a.scale, Some(1.0));
    assert_eq!(h.scene.mutation_count(), 1);
}

#[tokio::test]
async fn created_into_occupied_cell_only_rescales() {
    let h = Harness::new(vec![at(A, C1, 1.0)]);

    let spawned = at(B, C1, 1.0);
    let original = spawned.position;
    h.scene.spawn(spawned);
    h.service.drain().await.unwrap();

    let b = h.entity(B);
    assert_eq!(b.position, original);
    assert_eq!(b.scale, Some(0.4));
    assert_eq!(h.entity(A).scale, Some(1.0));
    assert_eq!(h.scene.mutations()[0].patch, EntityPatch::default().with_scale(0.4));
}

#[tokio::test]
async fn pairing_shrinks_first_and_places_newcomer() {
    let h = Harness::new(vec![at(A, C1, 1.0), at(B, C0, 1.0)]);
    let a_before = h.entity(A).position;

    assert!(h.scene.drag(B, h.top_left(C1, 1.0)));
    h.service.drain().await.unwrap();

    let a = h.entity(A);
    assert_eq!(a.position, a_before);
    assert_eq!(a.scale, Some(0.4));

    let expected_center = newcomer_center(
        h.grid().center_of(C0),
        h.grid().center_of(C1),
        UNIT,
        &LayoutSettings::default(),
    );
    let b = h.entity(B);
    assert_close(b.position, Point::new(expected_center.x - 20.0, expected_center.y - 20.0));
    assert_eq!(b.scale, Some(0.4));

    let occupancy = h.service.state().occupancy();
    assert_eq!(occupancy.occupants_of(C1), &[A, B]);
    assert_eq!(occupancy.first_occupant_of(C1), Some(A));
    assert!(occupancy.occupants_of(C0).is_empty());
}

#[tokio::test]
async fn own_write_echoes_are_ignored() {
    let h = Harness::new(vec![at(A, C1, 1.0), at(B, C0, 1.0)]);

    h.scene.drag(B, h.top_left(C1, 1.0));
    h.service.drain().await.unwrap();

    // Two writes, each echoed as pre/post-update while busy: nothing re-queued.
    assert_eq!(h.scene.mutation_count(), 2);
    assert_eq!(h.service.queued(), 0);
    assert_eq!(h.service.state().pending_count(), 0);
    assert_eq!(h.cell_of(B), Some(C1));
    assert!(!h.service.state().guard().is_busy(A));
    assert!(!h.service.state().guard().is_busy(B));
}

#[tokio::test]
async fn departure_restores_remaining_occupant() {
    let mut b = at(B, C1, 0.4);
    b.position = b.position + Point::new(-10.0, -10.0);
    let h = Harness::new(vec![at(A, C1, 0.4), b]);
    let a_before = h.entity(A).position;

    h.scene.drag(B, h.top_left(C2, 0.4));
    h.service.drain().await.unwrap();

    let a = h.entity(A);
    assert_eq!(a.scale, Some(1.0));
    assert_eq!(a.position, a_before);
    assert_eq!(h.scene.mutations()[0].patch, EntityPatch::default().with_scale(1.0));

    let b = h.entity(B);
    assert_eq!(h.cell_of(B), Some(C2));
    assert_close(b.position, h.top_left(C2, 1.0));
    assert_eq!(b.scale, Some(1.0));
}

#[tokio::test]
async fn deletion_to_empty_issues_nothing() {
    let h = Harness::new(vec![at(A, C1, 1.0)]);

    h.scene.despawn(A);
    h.service.drain().await.unwrap();

    assert!(h.service.state().occupancy().is_empty());
    assert_eq!(h.service.state().occupancy().first_occupant_of(C1), None);
    assert_eq!(h.scene.mutation_count(), 0);
}

#[tokio::test]
async fn deletion_leaving_one_restores_solo_scale() {
    let h = Harness::new(vec![at(A, C1, 0.4), at(B, C1, 0.4)]);

    h.scene.despawn(A);
    h.service.drain().await.unwrap();

    assert_eq!(h.service.state().occupancy().first_occupant_of(C1), Some(B));
    assert_eq!(h.entity(B).scale, Some(1.0));
    assert_eq!(h.scene.mutation_count(), 1);
}

#[tokio::test]
async fn bootstrap_seeds_without_mutations() {
    let entities: Vec<_> = (0..12u64)
        .map(|i| {
            let cell = CellKey::new((i % 5) as i64 * 2, 1);
            at(EntityId(i), cell, if i < 5 { 1.0 } else { 0.4 })
        })
        .collect();
    let h = Harness::new(entities);

    let occupancy = h.service.state().occupancy();
    assert_eq!(occupancy.entity_count(), 12);
    assert_eq!(occupancy.len(), 5);
    for k in 0..5i64 {
        let cell = CellKey::new(k * 2, 1);
        let occupants = occupancy.occupants_of(cell);
        assert!(occupants.iter().all(|e| e.0 % 5 == k as u64));
        // Seeding walks the scene in id order, so the lowest id is first.
        assert_eq!(occupancy.first_occupant_of(cell), Some(EntityId(k as u64)));
    }
    assert_eq!(h.scene.mutation_count(), 0);
}

#[tokio::test]
async fn first_occupant_passes_to_earliest_remaining() {
    let h = Harness::new(vec![at(A, C1, 0.4), at(B, C1, 0.4), at(C, C1, 0.4)]);

    h.scene.drag(A, h.top_left(C2, 0.4));
    h.service.drain().await.unwrap();

    let occupancy = h.service.state().occupancy();
    assert_eq!(occupancy.first_occupant_of(C1), Some(B));
    assert_eq!(occupancy.occupants_of(C1), &[B, C]);
    // Two remain in C1, so neither is rescaled.
    assert_eq!(h.entity(B).scale, Some(0.4));
    assert_eq!(h.entity(C).scale, Some(0.4));
}

#[tokio::test]
async fn repeated_scale_write_is_issued_once() {
    let h = Harness::new(vec![at(A, C1, 0.4)]);
    let engine = LayoutEngine::new(h.service.state(), h.service.host());

    let task = LayoutTask::Removed { id: B, cell: C1 };
    engine.run(task.clone()).await.unwrap();
    engine.run(task).await.unwrap();

    assert_eq!(h.scene.mutation_count(), 1);
    assert_eq!(h.entity(A).scale, Some(1.0));
}

#[tokio::test]
async fn rejected_write_is_reported_and_released() {
    let h = Harness::new(vec![at(A, C1, 1.0), at(B, C0, 1.0)]);
    h.scene.reject_updates_for(A);

    h.scene.drag(B, h.top_left(C1, 1.0));
    let err = h.service.drain().await.unwrap_err();

    assert!(matches!(err, Error::Mutation(MutationError::Rejected { entity, .. }) if entity == A));
    assert!(!h.service.state().guard().is_busy(A));
    // The newcomer is still placed.
    assert_eq!(h.entity(B).scale, Some(0.4));
    assert_eq!(h.entity(A).scale, Some(1.0));
}

#[tokio::test]
async fn stale_entity_is_skipped_silently() {
    let h = Harness::new(vec![at(A, C1, 0.4), at(B, C1, 0.4)]);
    h.scene.forget(A);

    h.scene.drag(B, h.top_left(C2, 0.4));
    h.service.drain().await.unwrap();

    assert_eq!(h.scene.mutation_count(), 1);
    assert_eq!(h.scene.mutations()[0].id, B);
}

#[tokio::test]
async fn same_cell_drag_is_not_a_transition() {
    let h = Harness::new(vec![at(A, C1, 1.0)]);

    let nudged = h.top_left(C1, 1.0) + Point::new(5.0, 5.0);
    h.scene.drag(A, nudged);
    h.service.drain().await.unwrap();

    assert_eq!(h.service.state().pending_count(), 0);
    assert_eq!(h.scene.mutation_count(), 0);
    assert_eq!(h.entity(A).position, nudged);
}

#[tokio::test]
async fn non_positional_and_unmatched_notifications_are_noops() {
    let h = Harness::new(vec![at(A, C1, 1.0)]);

    let ran = h
        .service
        .handle(&HostEvent::PreUpdate {
            id: A,
            changes: PositionChange::default(),
        })
        .await
        .unwrap();
    assert_eq!(ran, 0);

    let ran = h.service.handle(&HostEvent::PostUpdate { id: A }).await.unwrap();
    assert_eq!(ran, 0);
    assert_eq!(h.scene.mutation_count(), 0);
}

#[tokio::test]
async fn disabled_layout_ignores_notifications() {
    let h = Harness::new(vec![at(A, C1, 1.0)]);
    h.settings.borrow_mut().enabled = false;

    h.scene.spawn(at(B, C1, 1.0));
    h.scene.drag(A, h.top_left(C2, 1.0));
    h.service.drain().await.unwrap();

    assert_eq!(h.scene.mutation_count(), 0);
    assert_eq!(h.cell_of(B), None);
    assert_eq!(h.cell_of(A), Some(C1));

    // Settings are read per notification, so re-enabling takes effect at once.
    h.settings.borrow_mut().enabled = true;
    h.scene.drag(A, h.top_left(C2, 1.0) + Point::new(1.0, 0.0));
    h.service.drain().await.unwrap();
    assert_eq!(h.cell_of(A), Some(C2));
}

#[tokio::test]
async fn untracked_mover_takes_origin_from_its_position() {
    let h = Harness::new(vec![at(A, C1, 1.0)]);
    h.settings.borrow_mut().enabled = false;
    h.scene.spawn(at(B, C0, 1.0));
    h.settings.borrow_mut().enabled = true;
    assert_eq!(h.cell_of(B), None);

    h.scene.drag(B, h.top_left(C1, 1.0));
    h.service.drain().await.unwrap();

    let occupancy = h.service.state().occupancy();
    assert_eq!(occupancy.occupants_of(C1), &[A, B]);
    assert!(occupancy.occupants_of(C0).is_empty());
    drop(occupancy);

    // Placed as a newcomer arriving from C0, inferred from where it stood.
    let expected_center = newcomer_center(
        h.grid().center_of(C0),
        h.grid().center_of(C1),
        UNIT,
        &LayoutSettings::default(),
    );
    let b = h.entity(B);
    assert_close(b.position, Point::new(expected_center.x - 20.0, expected_center.y - 20.0));
    assert_eq!(b.scale, Some(0.4));
    assert_eq!(h.entity(A).scale, Some(0.4));
}

#[tokio::test]
async fn moves_queued_together_only_lay_out_the_final_cell() {
    let h = Harness::new(vec![at(A, C1, 1.0), at(B, C0, 1.0)]);

    // Both drags land before any layout work runs.
    h.scene.drag(B, h.top_left(C1, 1.0));
    h.scene.drag(B, h.top_left(C2, 1.0) + Point::new(3.0, 0.0));
    assert_eq!(h.service.queued(), 2);
    assert_eq!(h.service.drain().await.unwrap(), 2);

    assert_eq!(h.cell_of(B), Some(C2));
    let mutations = h.scene.mutations();
    assert_eq!(mutations.len(), 1);
    assert_eq!(mutations[0].id, B);
    assert_close(h.entity(B).position, h.top_left(C2, 1.0));

    // A never shared its cell once layout ran.
    assert_eq!(h.entity(A).scale, Some(1.0));
    assert_eq!(h.entity(A).position, h.top_left(C1, 1.0));
}

#[tokio::test]
async fn delete_during_own_write_still_deregisters() {
    let h = Harness::new(vec![at(A, C1, 0.4), at(B, C1, 0.4)]);

    // Delete A from inside the broadcast of the write that restores its scale.
    let scene = Rc::downgrade(&h.scene);
    let fired = Rc::new(Cell::new(false));
    let once = fired.clone();
    h.scene.subscribe(Rc::new(move |event: &HostEvent| {
        if matches!(event, HostEvent::PreUpdate { id, .. } if *id == A) && !once.replace(true) {
            if let Some(scene) = scene.upgrade() {
                scene.despawn(A);
            }
        }
    }));

    h.scene.drag(B, h.top_left(C2, 0.4));
    assert_eq!(h.service.drain().await.unwrap(), 2);

    assert!(fired.get());
    assert_eq!(h.cell_of(A), None);
    assert!(h.service.state().occupancy().occupants_of(C1).is_empty());
    assert_eq!(h.cell_of(B), Some(C2));
    assert!(!h.service.state().guard().is_busy(A));
    assert_eq!(h.service.queued(), 0);
}

#[tokio::test]
async fn reinitialize_does_not_leak_subscriptions() {
    let h = Harness::new(vec![at(A, C1, 1.0)]);
    assert_eq!(h.scene.active_subscriptions(), 1);

    assert_eq!(h.service.initialize(), 1);
    assert_eq!(h.scene.active_subscriptions(), 1);

    h.service.cleanup();
    h.service.cleanup();
    assert_eq!(h.scene.active_subscriptions(), 0);
    assert!(h.service.state().occupancy().is_empty());

    // Events after cleanup go nowhere.
    h.scene.spawn(at(B, C0, 1.0));
    assert_eq!(h.service.queued(), 0);
    let err = h.service.handle(&HostEvent::Create { id: B }).await.unwrap_err();
    assert!(matches!(err, Error::NotInitialized));
}

#[tokio::test]
async fn dropping_service_unsubscribes() {
    let scene = Rc::new(MemoryScene::new());
    let settings = Rc::new(LayoutSettings::default());
    let service = LayoutService::new(scene.context(HexGrid::new(UNIT), settings));
    service.initialize();
    assert_eq!(scene.active_subscriptions(), 1);

    drop(service);
    assert_eq!(scene.active_subscriptions(), 0);
}

#[tokio::test]
async fn reset_all_restores_baseline_and_clears_arranged() {
    let h = Harness::new(vec![at(A, C1, 1.0), at(B, C0, 1.0)]);
    h.scene.drag(B, h.top_left(C1, 1.0));
    h.service.drain().await.unwrap();
    assert_eq!(h.service.state().guard().arranged(), vec![A, B]);

    let report = h.service.reset_all().await;
    assert_eq!(report.reset, 2);
    assert_eq!(report.failed, 0);
    assert_eq!(h.entity(A).scale, Some(1.0));
    assert_eq!(h.entity(B).scale, Some(1.0));
    assert!(h.service.state().guard().arranged().is_empty());

    // Reset echoes never turn into layout work.
    assert_eq!(h.service.queued(), 0);
}

#[tokio::test]
async fn reset_all_counts_failures() {
    let h = Harness::new(vec![at(A, C1, 0.4), at(B, C0, 1.0), at(C, C2, 0.4)]);
    h.scene.reject_updates_for(C);

    let report = h.service.reset_all().await;
    assert_eq!(report.reset, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.failed, 1);
}
