use serde::{Deserialize, Serialize};

use crate::model::Id;

/// Width of one pot time window in hours
pub const TIME_WINDOW_HOURS: u8 = 2;

/// Share of a pot's slots a single operator may win ("Marktanteil-Limit")
pub const MARKET_SHARE_LIMIT: f64 = 0.56;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TrafficMode {
    /// Long-distance passenger
    Spfv,
    /// Regional passenger
    Spnv,
    /// Freight
    Sgv,
}

impl std::fmt::Display for TrafficMode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            TrafficMode::Spfv => write!(f, "SPFV"),
            TrafficMode::Spnv => write!(f, "SPNV"),
            TrafficMode::Sgv => write!(f, "SGV"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SlotStructure {
    /// Unit requests point at and slot conflicts are counted on ("ELTERN")
    Eltern,
    /// Concrete timed alternative below a parent ("KIND")
    Kind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ParentSlotKind {
    Tag,
    /// Night paths are only rationed on pot level
    Nacht,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartureTime {
    pub hour: u8,
    pub minute: u8,
}

impl std::fmt::Display for DepartureTime {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:02}{:02}", self.hour, self.minute)
    }
}

/// A schedulable path instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub id: Id,
    pub structure: SlotStructure,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_kind: Option<ParentSlotKind>,
    /// Parent of a child slot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Id>,
    #[serde(default)]
    pub child_ids: Vec<Id>,
    pub line: String,
    pub from: String,
    pub to: String,
    pub departure: DepartureTime,
    pub traffic_mode: TrafficMode,
    pub calendar_week: u32,
    pub traffic_days: String,
    /// Owning capacity pot ("VerweisAufTopf"), set on parent slots
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pot_id: Option<Id>,
}

impl Slot {
    pub fn is_parent(&self) -> bool {
        self.structure == SlotStructure::Eltern
    }

    pub fn is_night(&self) -> bool {
        self.parent_kind == Some(ParentSlotKind::Nacht)
    }

    /// Resource shape used when grouping slot conflicts
    pub fn shape_key(&self) -> String {
        format!(
            "{}#{}#{}#{}#{}",
            self.line, self.from, self.to, self.departure, self.traffic_mode
        )
    }
}

/// Capacity pot ("Kapazitaetstopf") aggregating parallel parent slots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityPot {
    pub id: Id,
    pub section: String,
    pub calendar_week: u32,
    pub traffic_days: String,
    pub traffic_mode: TrafficMode,
    /// First hour of the time window, the window spans `TIME_WINDOW_HOURS`
    pub time_window_start: u8,
    pub max_capacity: usize,
    /// Parent slots in this pot ("ListeDerSlots")
    #[serde(default)]
    pub slot_ids: Vec<Id>,
    /// Requests currently touching this pot ("ListeDerAnfragen")
    #[serde(default)]
    pub request_ids: Vec<Id>,
}

impl CapacityPot {
    pub fn market_share_quota(&self) -> usize {
        (MARKET_SHARE_LIMIT * self.slot_ids.len() as f64).floor() as usize
    }

    pub fn time_window(&self) -> String {
        format!(
            "{:02}-{:02}",
            self.time_window_start,
            (self.time_window_start as u16 + TIME_WINDOW_HOURS as u16) % 24
        )
    }

    /// Same section, week, traffic days and mode, adjacent time window
    pub fn is_neighbor_of(&self, other: &CapacityPot) -> bool {
        if self.id == other.id
            || self.section != other.section
            || self.calendar_week != other.calendar_week
            || self.traffic_days != other.traffic_days
            || self.traffic_mode != other.traffic_mode
        {
            return false;
        }
        let diff = (24 + self.time_window_start as i16 - other.time_window_start as i16) % 24;
        diff == TIME_WINDOW_HOURS as i16 || diff == 24 - TIME_WINDOW_HOURS as i16
    }

    /// Resource shape used when grouping pot conflicts
    pub fn shape_key(&self) -> String {
        format!("{}#{}", self.max_capacity, self.market_share_quota())
    }
}
