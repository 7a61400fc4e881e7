use serde::{Deserialize, Serialize};

/// Granularity a conflict is fought out on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictKind {
    /// Capacity pot ("Kapazitaetstopf") overbooked
    Pot,
    /// Single parent slot requested more than once
    Slot,
}

impl ConflictKind {
    fn suffix(self) -> &'static str {
        match self {
            ConflictKind::Pot => "topf",
            ConflictKind::Slot => "slot",
        }
    }
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ConflictKind::Pot => write!(f, "POT"),
            ConflictKind::Slot => write!(f, "SLOT"),
        }
    }
}

impl std::str::FromStr for ConflictKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "POT" | "KAPAZITAETSTOPF" => Ok(ConflictKind::Pot),
            "SLOT" => Ok(ConflictKind::Slot),
            _ => Err(format!("Unknown conflict kind: {}", s)),
        }
    }
}

/// Position of one assignment inside the arbitration procedure of one level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhaseStatus {
    AwaitingConflict,
    Confirmed,
    Renounced,
    Deferred,
    AwaitingFeeDecision,
    ConfirmedByFee,
    RejectedByFee,
    /// Only ever issued on pot level
    RejectedByMarketShare,
    AwaitingHighestPrice,
    ConfirmedByHighestPrice,
    RejectedByHighestPrice,
    InvalidBid,
    NoBid,
}

impl PhaseStatus {
    pub const ALL: [PhaseStatus; 13] = [
        PhaseStatus::AwaitingConflict,
        PhaseStatus::Confirmed,
        PhaseStatus::Renounced,
        PhaseStatus::Deferred,
        PhaseStatus::AwaitingFeeDecision,
        PhaseStatus::ConfirmedByFee,
        PhaseStatus::RejectedByFee,
        PhaseStatus::RejectedByMarketShare,
        PhaseStatus::AwaitingHighestPrice,
        PhaseStatus::ConfirmedByHighestPrice,
        PhaseStatus::RejectedByHighestPrice,
        PhaseStatus::InvalidBid,
        PhaseStatus::NoBid,
    ];

    pub fn is_waiting(self) -> bool {
        matches!(
            self,
            PhaseStatus::AwaitingConflict
                | PhaseStatus::AwaitingFeeDecision
                | PhaseStatus::AwaitingHighestPrice
        )
    }

    pub fn is_confirmed(self) -> bool {
        matches!(
            self,
            PhaseStatus::Confirmed
                | PhaseStatus::ConfirmedByFee
                | PhaseStatus::ConfirmedByHighestPrice
        )
    }

    pub fn is_rejected(self) -> bool {
        !self.is_waiting() && !self.is_confirmed()
    }

    pub fn is_terminal(self) -> bool {
        !self.is_waiting()
    }

    fn wire(self, kind: ConflictKind) -> String {
        let l = kind.suffix();
        match self {
            PhaseStatus::AwaitingConflict => format!("wartet_konflikt_{l}"),
            PhaseStatus::Confirmed => format!("bestaetigt_{l}"),
            PhaseStatus::Renounced => format!("abgelehnt_{l}_verzichtet"),
            PhaseStatus::Deferred => format!("abgelehnt_{l}_verschoben"),
            PhaseStatus::AwaitingFeeDecision => format!("wartet_entgeltentscheidung_{l}"),
            PhaseStatus::ConfirmedByFee => format!("bestaetigt_{l}_entgelt"),
            PhaseStatus::RejectedByFee => format!("abgelehnt_{l}_entgelt"),
            PhaseStatus::RejectedByMarketShare => format!("abgelehnt_{l}_marktanteil"),
            PhaseStatus::AwaitingHighestPrice => format!("wartet_hoechstpreis_{l}"),
            PhaseStatus::ConfirmedByHighestPrice => format!("bestaetigt_{l}_hoechstpreis"),
            PhaseStatus::RejectedByHighestPrice => format!("abgelehnt_{l}_hoechstpreis"),
            PhaseStatus::InvalidBid => format!("abgelehnt_{l}_hoechstpreis_ungueltig"),
            PhaseStatus::NoBid => format!("abgelehnt_{l}_hoechstpreis_kein_gebot"),
        }
    }
}

/// Status of a single assignment ("statusEinzelzuweisung")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum AssignmentStatus {
    /// Matched to a slot, not yet looked at by conflict detection
    Unchecked,
    Pot(PhaseStatus),
    Slot(PhaseStatus),
}

impl AssignmentStatus {
    pub fn at(kind: ConflictKind, phase: PhaseStatus) -> Self {
        match kind {
            ConflictKind::Pot => AssignmentStatus::Pot(phase),
            ConflictKind::Slot => AssignmentStatus::Slot(phase),
        }
    }

    pub fn phase(self) -> Option<PhaseStatus> {
        match self {
            AssignmentStatus::Unchecked => None,
            AssignmentStatus::Pot(p) | AssignmentStatus::Slot(p) => Some(p),
        }
    }

    /// Phase of this status if it belongs to the given level
    pub fn phase_at(self, kind: ConflictKind) -> Option<PhaseStatus> {
        match (kind, self) {
            (ConflictKind::Pot, AssignmentStatus::Pot(p)) => Some(p),
            (ConflictKind::Slot, AssignmentStatus::Slot(p)) => Some(p),
            _ => None,
        }
    }

    pub fn is_rejected(self) -> bool {
        self.phase().map(PhaseStatus::is_rejected).unwrap_or(false)
    }

    pub fn is_waiting(self) -> bool {
        self.phase().map(PhaseStatus::is_waiting).unwrap_or(false)
    }

    pub fn is_confirmed(self) -> bool {
        self.phase().map(PhaseStatus::is_confirmed).unwrap_or(false)
    }

    pub fn is_slot_level(self) -> bool {
        matches!(self, AssignmentStatus::Slot(_))
    }

    /// Counts against the single-slot capacity
    pub fn is_slot_active(self) -> bool {
        match self {
            AssignmentStatus::Pot(p) => p.is_confirmed(),
            AssignmentStatus::Slot(p) => p.is_waiting() || p.is_confirmed(),
            AssignmentStatus::Unchecked => false,
        }
    }

    /// Took part in slot arbitration, whether still active or already decided
    pub fn is_slot_active_or_decided(self) -> bool {
        self.is_slot_active() || matches!(self, AssignmentStatus::Slot(p) if p.is_rejected())
    }

    pub fn all() -> Vec<AssignmentStatus> {
        let mut all = vec![AssignmentStatus::Unchecked];
        for kind in [ConflictKind::Pot, ConflictKind::Slot] {
            all.extend(PhaseStatus::ALL.iter().map(|p| AssignmentStatus::at(kind, *p)));
        }
        all
    }
}

impl Default for AssignmentStatus {
    fn default() -> Self {
        AssignmentStatus::Unchecked
    }
}

impl std::fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            AssignmentStatus::Unchecked => write!(f, "in_konfliktpruefung"),
            AssignmentStatus::Pot(p) => write!(f, "{}", p.wire(ConflictKind::Pot)),
            AssignmentStatus::Slot(p) => write!(f, "{}", p.wire(ConflictKind::Slot)),
        }
    }
}

impl std::str::FromStr for AssignmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AssignmentStatus::all()
            .into_iter()
            .find(|status| status.to_string() == s)
            .ok_or_else(|| format!("Unknown assignment status: {}", s))
    }
}

impl From<AssignmentStatus> for String {
    fn from(status: AssignmentStatus) -> Self {
        status.to_string()
    }
}

impl TryFrom<String> for AssignmentStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Resolution step a coordinator submits a decision for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionPhase {
    Renunciation,
    FeeComparison,
    HighestPrice,
}

impl std::fmt::Display for ResolutionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ResolutionPhase::Renunciation => write!(f, "Verzicht/Verschub"),
            ResolutionPhase::FeeComparison => write!(f, "Entgeltvergleich"),
            ResolutionPhase::HighestPrice => write!(f, "Höchstpreisverfahren"),
        }
    }
}

/// State machine of one conflict document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConflictStatus {
    #[serde(rename = "offen")]
    Open,
    #[serde(rename = "in_bearbeitung_entgelt")]
    InFeeComparison,
    #[serde(rename = "in_bearbeitung_hoechstpreis")]
    InHighestPrice,
    #[serde(rename = "geloest")]
    Resolved,
}

impl ConflictStatus {
    /// Phase that may be applied next
    pub fn expected_phase(self) -> Option<ResolutionPhase> {
        match self {
            ConflictStatus::Open => Some(ResolutionPhase::Renunciation),
            ConflictStatus::InFeeComparison => Some(ResolutionPhase::FeeComparison),
            ConflictStatus::InHighestPrice => Some(ResolutionPhase::HighestPrice),
            ConflictStatus::Resolved => None,
        }
    }

    pub fn accepts(self, phase: ResolutionPhase) -> bool {
        self.expected_phase() == Some(phase)
    }

    pub fn after_renunciation(remaining_fit: bool) -> Self {
        if remaining_fit {
            ConflictStatus::Resolved
        } else {
            ConflictStatus::InFeeComparison
        }
    }

    pub fn after_fee_comparison(highest_price_pending: bool) -> Self {
        if highest_price_pending {
            ConflictStatus::InHighestPrice
        } else {
            ConflictStatus::Resolved
        }
    }

    pub fn after_highest_price(still_tied: bool) -> Self {
        Self::after_fee_comparison(still_tied)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConflictStatus::Open => "offen",
            ConflictStatus::InFeeComparison => "in_bearbeitung_entgelt",
            ConflictStatus::InHighestPrice => "in_bearbeitung_hoechstpreis",
            ConflictStatus::Resolved => "geloest",
        }
    }
}

impl std::fmt::Display for ConflictStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ConflictStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "offen" => Ok(ConflictStatus::Open),
            "in_bearbeitung_entgelt" => Ok(ConflictStatus::InFeeComparison),
            "in_bearbeitung_hoechstpreis" => Ok(ConflictStatus::InHighestPrice),
            "geloest" => Ok(ConflictStatus::Resolved),
            _ => Err(format!("Unknown conflict status: {}", s)),
        }
    }
}

/// Status of a conflict group, derived from its members
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupStatus {
    #[serde(rename = "offen")]
    Open,
    #[serde(rename = "in_bearbeitung_entgelt")]
    InFeeComparison,
    #[serde(rename = "in_bearbeitung_hoechstpreis")]
    InHighestPrice,
    #[serde(rename = "geloest")]
    Resolved,
    /// Members disagree on their status; only a group reset is accepted
    #[serde(rename = "invalide")]
    Invalid,
}

impl GroupStatus {
    pub fn derive<I>(member_statuses: I) -> Self
    where
        I: IntoIterator<Item = ConflictStatus>,
    {
        let mut statuses = member_statuses.into_iter();
        let Some(first) = statuses.next() else {
            return GroupStatus::Invalid;
        };
        if statuses.any(|s| s != first) {
            return GroupStatus::Invalid;
        }
        match first {
            ConflictStatus::Open => GroupStatus::Open,
            ConflictStatus::InFeeComparison => GroupStatus::InFeeComparison,
            ConflictStatus::InHighestPrice => GroupStatus::InHighestPrice,
            ConflictStatus::Resolved => GroupStatus::Resolved,
        }
    }

    pub fn accepts(self, phase: ResolutionPhase) -> bool {
        match self {
            GroupStatus::Open => phase == ResolutionPhase::Renunciation,
            GroupStatus::InFeeComparison => phase == ResolutionPhase::FeeComparison,
            GroupStatus::InHighestPrice => phase == ResolutionPhase::HighestPrice,
            GroupStatus::Resolved | GroupStatus::Invalid => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GroupStatus::Open => "offen",
            GroupStatus::InFeeComparison => "in_bearbeitung_entgelt",
            GroupStatus::InHighestPrice => "in_bearbeitung_hoechstpreis",
            GroupStatus::Resolved => "geloest",
            GroupStatus::Invalid => "invalide",
        }
    }
}

impl std::fmt::Display for GroupStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for GroupStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "offen" => Ok(GroupStatus::Open),
            "in_bearbeitung_entgelt" => Ok(GroupStatus::InFeeComparison),
            "in_bearbeitung_hoechstpreis" => Ok(GroupStatus::InHighestPrice),
            "geloest" => Ok(GroupStatus::Resolved),
            "invalide" => Ok(GroupStatus::Invalid),
            _ => Err(format!("Unknown group status: {}", s)),
        }
    }
}

/// Aggregate status of a request, recomputed from its assignments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    #[serde(rename = "in_pruefung")]
    InReview,
    #[serde(rename = "in_konfliktloesung")]
    InConflictResolution,
    #[serde(rename = "vollstaendig_bestaetigt")]
    FullyConfirmed,
    #[serde(rename = "teilweise_bestaetigt")]
    PartiallyConfirmed,
    #[serde(rename = "vollstaendig_abgelehnt")]
    FullyRejected,
}

impl Default for RequestStatus {
    fn default() -> Self {
        RequestStatus::InReview
    }
}
