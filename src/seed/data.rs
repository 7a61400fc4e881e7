use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};

use crate::model::{
    Assignment, CapacityPot, DepartureTime, Id, ParentSlotKind, Request, RequestStatus, Slot, SlotStructure,
    TrafficMode,
};
use crate::store::{CatalogStore, RequestStore, Store};

const WEEK: u32 = 10;
const DAYS: &str = "Mo-Fr";

/// Helper function to create a parent slot with its child segment
fn create_parent_slot(
    id: &str,
    pot_id: &str,
    line: &str,
    from: &str,
    to: &str,
    departure: (u8, u8),
    kind: ParentSlotKind,
) -> (Slot, Slot) {
    let child_id = format!("{id}-K1");
    let parent = Slot {
        id: id.to_string(),
        structure: SlotStructure::Eltern,
        parent_kind: Some(kind),
        parent_id: None,
        child_ids: vec![child_id.clone()],
        line: line.to_string(),
        from: from.to_string(),
        to: to.to_string(),
        departure: DepartureTime {
            hour: departure.0,
            minute: departure.1,
        },
        traffic_mode: TrafficMode::Sgv,
        calendar_week: WEEK,
        traffic_days: DAYS.to_string(),
        pot_id: Some(pot_id.to_string()),
    };
    let child = Slot {
        id: child_id,
        structure: SlotStructure::Kind,
        parent_kind: None,
        parent_id: Some(id.to_string()),
        child_ids: Vec::new(),
        pot_id: None,
        ..parent.clone()
    };
    (parent, child)
}

fn create_pot(id: &str, section: &str, window_start: u8, max_capacity: usize, slot_ids: &[&Slot]) -> CapacityPot {
    CapacityPot {
        id: id.to_string(),
        section: section.to_string(),
        calendar_week: WEEK,
        traffic_days: DAYS.to_string(),
        traffic_mode: TrafficMode::Sgv,
        time_window_start: window_start,
        max_capacity,
        slot_ids: slot_ids.iter().map(|s| s.id.clone()).collect(),
        request_ids: Vec::new(),
    }
}

fn create_request(
    id: &str,
    operator: &str,
    train: &str,
    fee: f64,
    period: (NaiveDate, NaiveDate),
    slots: &[&Slot],
) -> Request {
    Request {
        id: id.to_string(),
        operator: operator.to_string(),
        train_number: Some(train.to_string()),
        traffic_mode: TrafficMode::Sgv,
        traffic_days: DAYS.to_string(),
        valid_from: period.0,
        valid_to: period.1,
        fee,
        assignments: slots.iter().map(|s| Assignment::new(s.id.clone())).collect(),
        status: RequestStatus::InReview,
        updated_at: Utc::now(),
    }
}

/// Register the request on the pot of every slot it was matched to
fn link(pots: &mut [CapacityPot], slots: &[Slot], request: &Request) {
    for assignment in &request.assignments {
        let pot_id: Option<&Id> = slots
            .iter()
            .find(|s| s.id == assignment.slot_id)
            .and_then(|s| s.pot_id.as_ref());
        if let Some(pot) = pots.iter_mut().find(|p| Some(&p.id) == pot_id) {
            if !pot.request_ids.contains(&request.id) {
                pot.request_ids.push(request.id.clone());
            }
        }
    }
}

/// Demo catalog: an overbooked morning pot on Hamburg-Hannover with its quiet neighbour,
/// and a night pot whose shared slot is only rationed on pot level.
pub async fn load_seed_data<S: Store + ?Sized>(store: &S) -> Result<()> {
    let morning = [
        create_parent_slot("SL-HH-H-0615", "KT-HH-H-06", "L100", "Hamburg", "Hannover", (6, 15), ParentSlotKind::Tag),
        create_parent_slot("SL-HH-H-0635", "KT-HH-H-06", "L100", "Hamburg", "Hannover", (6, 35), ParentSlotKind::Tag),
        create_parent_slot("SL-HH-H-0655", "KT-HH-H-06", "L100", "Hamburg", "Hannover", (6, 55), ParentSlotKind::Tag),
        create_parent_slot("SL-HH-H-0715", "KT-HH-H-06", "L100", "Hamburg", "Hannover", (7, 15), ParentSlotKind::Tag),
    ];
    let later = [
        create_parent_slot("SL-HH-H-0815", "KT-HH-H-08", "L100", "Hamburg", "Hannover", (8, 15), ParentSlotKind::Tag),
        create_parent_slot("SL-HH-H-0845", "KT-HH-H-08", "L100", "Hamburg", "Hannover", (8, 45), ParentSlotKind::Tag),
        create_parent_slot("SL-HH-H-0915", "KT-HH-H-08", "L100", "Hamburg", "Hannover", (9, 15), ParentSlotKind::Tag),
    ];
    let night = [
        create_parent_slot("SL-H-KS-2310", "KT-H-KS-22", "L200", "Hannover", "Kassel", (23, 10), ParentSlotKind::Nacht),
        create_parent_slot("SL-H-KS-2340", "KT-H-KS-22", "L200", "Hannover", "Kassel", (23, 40), ParentSlotKind::Nacht),
    ];

    let parents = |set: &[(Slot, Slot)]| -> Vec<Slot> { set.iter().map(|(p, _)| p.clone()).collect() };
    let (morning_parents, later_parents, night_parents) = (parents(&morning), parents(&later), parents(&night));

    let mut pots = vec![
        create_pot("KT-HH-H-06", "Hamburg-Hannover", 6, 2, &morning_parents.iter().collect::<Vec<_>>()),
        create_pot("KT-HH-H-08", "Hamburg-Hannover", 8, 3, &later_parents.iter().collect::<Vec<_>>()),
        create_pot("KT-H-KS-22", "Hannover-Kassel", 22, 2, &night_parents.iter().collect::<Vec<_>>()),
    ];

    let period = (
        NaiveDate::from_ymd_opt(2026, 3, 2).context("invalid seed start date")?,
        NaiveDate::from_ymd_opt(2026, 3, 6).context("invalid seed end date")?,
    );
    let requests = vec![
        create_request("A-1001", "Nordfracht", "GZ 41001", 1000.0, period, &[&morning_parents[0]]),
        create_request("A-1002", "Elbe Cargo", "GZ 41002", 900.0, period, &[&morning_parents[0]]),
        create_request("A-1003", "Heide Logistik", "GZ 41003", 900.0, period, &[&morning_parents[1]]),
        create_request("A-1004", "Nordfracht", "GZ 41004", 700.0, period, &[&morning_parents[2]]),
        create_request("A-1005", "Elbe Cargo", "GZ 41005", 650.0, period, &[&later_parents[0]]),
        create_request("A-2001", "Nordfracht", "GZ 42001", 400.0, period, &[&night_parents[0]]),
        create_request("A-2002", "Heide Logistik", "GZ 42002", 380.0, period, &[&night_parents[0]]),
    ];

    let all_slots: Vec<Slot> = morning
        .iter()
        .chain(later.iter())
        .chain(night.iter())
        .flat_map(|(p, c)| [p.clone(), c.clone()])
        .collect();
    for request in &requests {
        link(&mut pots, &all_slots, request);
    }

    // pots first, parent slots reference them
    for pot in &pots {
        store.upsert_pot(pot.clone()).await?;
    }
    for slot in &all_slots {
        store.upsert_slot(slot.clone()).await?;
    }
    for request in &requests {
        store.upsert_request(request.clone()).await?;
    }

    log::info!(
        "Seed data loaded: {} pots, {} slots, {} requests",
        pots.len(),
        all_slots.len(),
        requests.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::detect_pot_conflicts;
    use crate::model::ConflictTrigger;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_seed_catalog_overbooks_only_the_morning_pot() {
        let store = MemoryStore::new();
        load_seed_data(&store).await.unwrap();

        let pots = store.list_pots().await.unwrap();
        assert_eq!(pots.len(), 3);
        let morning = pots.iter().find(|p| p.id == "KT-HH-H-06").unwrap();
        assert_eq!(morning.request_ids.len(), 4);

        let report = detect_pot_conflicts(&store).await.unwrap();
        assert_eq!(report.summary.created, 1);
        let conflict = &report.conflicts[0];
        assert_eq!(
            conflict.trigger,
            ConflictTrigger::Pot {
                triggering_pot: "KT-HH-H-06".to_string()
            }
        );
        assert_eq!(conflict.participants.len(), 4);
    }
}
