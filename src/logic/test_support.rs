//! Catalog and request fixtures shared by the engine tests

use chrono::{NaiveDate, Utc};

use crate::logic::pot_detection::PotConflictDetector;
use crate::logic::slot_detection::SlotConflictDetector;
use crate::logic::snapshot::CatalogSnapshot;
use crate::model::{
    Assignment, AssignmentStatus, CapacityPot, ConflictDocument, ConflictKind, DepartureTime, Id, PhaseStatus,
    Request, RequestStatus, Slot, SlotStructure, TrafficMode,
};
use crate::store::{CatalogStore, MemoryStore, RequestBatch, RequestStore};

pub fn ids(v: &[&str]) -> Vec<Id> {
    v.iter().map(|s| s.to_string()).collect()
}

pub fn request(id: &str, operator: &str, fee: f64, slot_id: &str) -> Request {
    Request {
        id: id.to_string(),
        operator: operator.to_string(),
        train_number: None,
        traffic_mode: TrafficMode::Sgv,
        traffic_days: "Mo-Fr".to_string(),
        valid_from: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
        valid_to: NaiveDate::from_ymd_opt(2026, 3, 6).unwrap(),
        fee,
        assignments: vec![Assignment::new(slot_id.to_string())],
        status: RequestStatus::InReview,
        updated_at: Utc::now(),
    }
}

pub fn parent_slot(id: &str, pot_id: &str, minute: u8) -> Slot {
    Slot {
        id: id.to_string(),
        structure: SlotStructure::Eltern,
        parent_kind: None,
        parent_id: None,
        child_ids: Vec::new(),
        line: "L1".to_string(),
        from: "A".to_string(),
        to: "B".to_string(),
        departure: DepartureTime { hour: 8, minute },
        traffic_mode: TrafficMode::Sgv,
        calendar_week: 10,
        traffic_days: "Mo-Fr".to_string(),
        pot_id: Some(pot_id.to_string()),
    }
}

pub fn pot(id: &str, max_capacity: usize, slot_ids: Vec<Id>, request_ids: Vec<Id>) -> CapacityPot {
    CapacityPot {
        id: id.to_string(),
        section: "A-B".to_string(),
        calendar_week: 10,
        traffic_days: "Mo-Fr".to_string(),
        traffic_mode: TrafficMode::Sgv,
        time_window_start: 8,
        max_capacity,
        slot_ids,
        request_ids,
    }
}

/// Pot "pot-1" with `slot_count` parent slots, request i assigned to slot i modulo the count
pub fn pot_fixture_with_slots(
    max_capacity: usize,
    slot_count: usize,
    requests: &[(&str, &str, f64)],
) -> (CatalogSnapshot, Vec<Request>) {
    let slots: Vec<Slot> = (1..=slot_count)
        .map(|i| parent_slot(&format!("slot-{i}"), "pot-1", (i * 5) as u8))
        .collect();
    let requests: Vec<Request> = requests
        .iter()
        .enumerate()
        .map(|(i, (id, operator, fee))| request(id, operator, *fee, &slots[i % slot_count].id))
        .collect();
    let pot = pot(
        "pot-1",
        max_capacity,
        slots.iter().map(|s| s.id.clone()).collect(),
        requests.iter().map(|r| r.id.clone()).collect(),
    );
    (CatalogSnapshot::from_parts(vec![pot], slots), requests)
}

/// Four slots, so the market-share quota is 2
pub fn pot_fixture(max_capacity: usize, requests: &[(&str, &str, f64)]) -> (CatalogSnapshot, Vec<Request>) {
    pot_fixture_with_slots(max_capacity, requests.len().max(4), requests)
}

/// Every request won its pot and sits on "slot-1"
pub fn slot_fixture(requests: &[(&str, &str, f64)]) -> (CatalogSnapshot, Vec<Request>) {
    let (catalog, mut requests) = pot_fixture_with_slots(10, 4, requests);
    for request in requests.iter_mut() {
        request.assignments[0].slot_id = "slot-1".to_string();
        request.assignments[0].set_status(AssignmentStatus::Pot(PhaseStatus::Confirmed), None);
    }
    (catalog, requests)
}

/// Pot fixture run through detection, so the pot conflict is open and every request waits on it
pub fn open_pot_conflict(
    max_capacity: usize,
    requests: &[(&str, &str, f64)],
) -> (CatalogSnapshot, ConflictDocument, RequestBatch) {
    let (catalog, requests) = pot_fixture(max_capacity, requests);
    open_conflict_on(catalog, requests, ConflictKind::Pot)
}

/// Same for a slot conflict on "slot-1"
pub fn open_slot_conflict(requests: &[(&str, &str, f64)]) -> (CatalogSnapshot, ConflictDocument, RequestBatch) {
    let (catalog, requests) = slot_fixture(requests);
    open_conflict_on(catalog, requests, ConflictKind::Slot)
}

fn open_conflict_on(
    catalog: CatalogSnapshot,
    requests: Vec<Request>,
    kind: ConflictKind,
) -> (CatalogSnapshot, ConflictDocument, RequestBatch) {
    let mut batch = RequestBatch::from_requests(requests);
    let outcome = match kind {
        ConflictKind::Pot => PotConflictDetector::detect(&catalog, Vec::new(), &mut batch, Utc::now()),
        ConflictKind::Slot => SlotConflictDetector::detect(&catalog, &[], Vec::new(), &mut batch, Utc::now()).unwrap(),
    };
    let conflict = outcome.conflicts.into_iter().next().expect("fixture must be overbooked");
    (catalog, conflict, batch)
}

/// Current phase of the request's first assignment
pub fn phase(batch: &RequestBatch, id: &str) -> PhaseStatus {
    batch.get(id).unwrap().assignments[0].status.phase().unwrap()
}

/// In-memory store holding the fixture catalog and requests
pub async fn seeded_store(catalog: &CatalogSnapshot, requests: Vec<Request>) -> MemoryStore {
    let store = MemoryStore::new();
    for pot in catalog.pots.values() {
        store.upsert_pot(pot.clone()).await.unwrap();
    }
    for slot in catalog.slots.values() {
        store.upsert_slot(slot.clone()).await.unwrap();
    }
    for request in requests {
        store.upsert_request(request).await.unwrap();
    }
    store
}
