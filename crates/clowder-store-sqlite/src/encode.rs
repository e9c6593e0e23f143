//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. Structured fields (payload
//! maps, score breakdowns) are stored as compact JSON. UUIDs are stored as
//! hyphenated lowercase strings. Enum tags match the serde snake_case forms.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use clowder_core::{
  audit::{AuditEntry, EditType},
  config::MatchField,
  decision::{
    DecisionType, FieldContribution, MatchDecision, ReviewAction,
  },
  entity::{Entity, EntityKind},
  household::{HouseholdMember, HouseholdRole, MembershipSource},
  identifier::{IdType, Identifier},
  record::{RawRecord, SourceSystem, source_system_tag},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn decode_uuid_opt(s: Option<&str>) -> Result<Option<Uuid>> {
  s.map(decode_uuid).transpose()
}

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(format!("timestamp: {e}")))
}

// ─── SourceSystem ────────────────────────────────────────────────────────────

pub fn encode_source_system(s: SourceSystem) -> &'static str {
  source_system_tag(s)
}

pub fn decode_source_system(s: &str) -> Result<SourceSystem> {
  match s {
    "clinic_export" => Ok(SourceSystem::ClinicExport),
    "shelter_feed" => Ok(SourceSystem::ShelterFeed),
    "volunteer_roster" => Ok(SourceSystem::VolunteerRoster),
    "master_list" => Ok(SourceSystem::MasterList),
    "intake_form" => Ok(SourceSystem::IntakeForm),
    "chip_registry" => Ok(SourceSystem::ChipRegistry),
    other => Err(Error::Decode(format!("unknown source system: {other:?}"))),
  }
}

// ─── EntityKind ──────────────────────────────────────────────────────────────

pub fn encode_entity_kind(k: EntityKind) -> &'static str {
  match k {
    EntityKind::Person => "person",
    EntityKind::Cat => "cat",
    EntityKind::Place => "place",
    EntityKind::PseudoProfile => "pseudo_profile",
  }
}

pub fn decode_entity_kind(s: &str) -> Result<EntityKind> {
  match s {
    "person" => Ok(EntityKind::Person),
    "cat" => Ok(EntityKind::Cat),
    "place" => Ok(EntityKind::Place),
    "pseudo_profile" => Ok(EntityKind::PseudoProfile),
    other => Err(Error::Decode(format!("unknown entity kind: {other:?}"))),
  }
}

// ─── IdType ──────────────────────────────────────────────────────────────────

pub fn encode_id_type(t: IdType) -> &'static str {
  match t {
    IdType::Email => "email",
    IdType::Phone => "phone",
  }
}

pub fn decode_id_type(s: &str) -> Result<IdType> {
  match s {
    "email" => Ok(IdType::Email),
    "phone" => Ok(IdType::Phone),
    other => Err(Error::Decode(format!("unknown id type: {other:?}"))),
  }
}

// ─── DecisionType / ReviewAction ─────────────────────────────────────────────

pub fn encode_decision_type(d: DecisionType) -> &'static str {
  match d {
    DecisionType::AutoMatch => "auto_match",
    DecisionType::NewEntity => "new_entity",
    DecisionType::ReviewNeeded => "review_needed",
    DecisionType::Rejected => "rejected",
  }
}

pub fn decode_decision_type(s: &str) -> Result<DecisionType> {
  match s {
    "auto_match" => Ok(DecisionType::AutoMatch),
    "new_entity" => Ok(DecisionType::NewEntity),
    "review_needed" => Ok(DecisionType::ReviewNeeded),
    "rejected" => Ok(DecisionType::Rejected),
    other => Err(Error::Decode(format!("unknown decision type: {other:?}"))),
  }
}

pub fn encode_review_action(a: ReviewAction) -> &'static str {
  match a {
    ReviewAction::Merge => "merge",
    ReviewAction::KeepSeparate => "keep_separate",
    ReviewAction::AddToHousehold => "add_to_household",
    ReviewAction::Reject => "reject",
  }
}

pub fn decode_review_action(s: &str) -> Result<ReviewAction> {
  match s {
    "merge" => Ok(ReviewAction::Merge),
    "keep_separate" => Ok(ReviewAction::KeepSeparate),
    "add_to_household" => Ok(ReviewAction::AddToHousehold),
    "reject" => Ok(ReviewAction::Reject),
    other => Err(Error::Decode(format!("unknown review action: {other:?}"))),
  }
}

// ─── MatchField ──────────────────────────────────────────────────────────────

pub fn encode_match_field(f: MatchField) -> &'static str {
  match f {
    MatchField::Email => "email",
    MatchField::Phone => "phone",
    MatchField::Name => "name",
    MatchField::Address => "address",
  }
}

pub fn decode_match_field(s: &str) -> Result<MatchField> {
  match s {
    "email" => Ok(MatchField::Email),
    "phone" => Ok(MatchField::Phone),
    "name" => Ok(MatchField::Name),
    "address" => Ok(MatchField::Address),
    other => Err(Error::Decode(format!("unknown match field: {other:?}"))),
  }
}

// ─── EditType ────────────────────────────────────────────────────────────────

pub fn encode_edit_type(e: EditType) -> &'static str {
  match e {
    EditType::Created => "created",
    EditType::Merged => "merged",
    EditType::IdentifierAttached => "identifier_attached",
    EditType::HouseholdLinked => "household_linked",
    EditType::ReviewResolved => "review_resolved",
  }
}

pub fn decode_edit_type(s: &str) -> Result<EditType> {
  match s {
    "created" => Ok(EditType::Created),
    "merged" => Ok(EditType::Merged),
    "identifier_attached" => Ok(EditType::IdentifierAttached),
    "household_linked" => Ok(EditType::HouseholdLinked),
    "review_resolved" => Ok(EditType::ReviewResolved),
    other => Err(Error::Decode(format!("unknown edit type: {other:?}"))),
  }
}

// ─── Household enums ─────────────────────────────────────────────────────────

pub fn encode_household_role(r: HouseholdRole) -> &'static str {
  match r {
    HouseholdRole::Resident => "resident",
    HouseholdRole::Owner => "owner",
    HouseholdRole::FosterParent => "foster_parent",
    HouseholdRole::Trapper => "trapper",
    HouseholdRole::Caretaker => "caretaker",
  }
}

pub fn decode_household_role(s: &str) -> Result<HouseholdRole> {
  match s {
    "resident" => Ok(HouseholdRole::Resident),
    "owner" => Ok(HouseholdRole::Owner),
    "foster_parent" => Ok(HouseholdRole::FosterParent),
    "trapper" => Ok(HouseholdRole::Trapper),
    "caretaker" => Ok(HouseholdRole::Caretaker),
    other => Err(Error::Decode(format!("unknown household role: {other:?}"))),
  }
}

pub fn encode_membership_source(s: MembershipSource) -> &'static str {
  match s {
    MembershipSource::Inferred => "inferred",
    MembershipSource::Manual => "manual",
  }
}

pub fn decode_membership_source(s: &str) -> Result<MembershipSource> {
  match s {
    "inferred" => Ok(MembershipSource::Inferred),
    "manual" => Ok(MembershipSource::Manual),
    other => {
      Err(Error::Decode(format!("unknown membership source: {other:?}")))
    }
  }
}

// ─── JSON payloads ───────────────────────────────────────────────────────────

pub fn encode_payload(p: &BTreeMap<String, String>) -> Result<String> {
  Ok(serde_json::to_string(p)?)
}

pub fn decode_payload(s: &str) -> Result<BTreeMap<String, String>> {
  Ok(serde_json::from_str(s)?)
}

pub fn encode_breakdown(b: &[FieldContribution]) -> Result<String> {
  Ok(serde_json::to_string(b)?)
}

pub fn decode_breakdown(s: &str) -> Result<Vec<FieldContribution>> {
  Ok(serde_json::from_str(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `raw_records` row.
pub struct RawRecordRow {
  pub record_id:        String,
  pub source_system:    String,
  pub source_record_id: String,
  pub payload:          String,
  pub content_hash:     String,
  pub received_at:      String,
}

impl RawRecordRow {
  pub fn into_record(self) -> Result<RawRecord> {
    Ok(RawRecord {
      record_id:        decode_uuid(&self.record_id)?,
      source_system:    decode_source_system(&self.source_system)?,
      source_record_id: self.source_record_id,
      payload:          decode_payload(&self.payload)?,
      content_hash:     self.content_hash,
      received_at:      decode_dt(&self.received_at)?,
    })
  }
}

/// Raw strings read directly from an `entities` row.
pub struct EntityRow {
  pub entity_id:    String,
  pub kind:         String,
  pub display_name: String,
  pub created_at:   String,
  pub merged_into:  Option<String>,
}

impl EntityRow {
  pub fn into_entity(self) -> Result<Entity> {
    Ok(Entity {
      entity_id:    decode_uuid(&self.entity_id)?,
      kind:         decode_entity_kind(&self.kind)?,
      display_name: self.display_name,
      created_at:   decode_dt(&self.created_at)?,
      merged_into:  decode_uuid_opt(self.merged_into.as_deref())?,
    })
  }
}

/// Raw strings read directly from an `identifiers` row.
pub struct IdentifierRow {
  pub entity_id:     String,
  pub id_type:       String,
  pub value_raw:     String,
  pub value_norm:    String,
  pub confidence:    f64,
  pub source_system: String,
}

impl IdentifierRow {
  pub fn into_identifier(self) -> Result<Identifier> {
    Ok(Identifier {
      entity_id:     decode_uuid(&self.entity_id)?,
      id_type:       decode_id_type(&self.id_type)?,
      value_raw:     self.value_raw,
      value_norm:    self.value_norm,
      confidence:    self.confidence,
      source_system: decode_source_system(&self.source_system)?,
    })
  }
}

/// Raw strings read directly from a `match_decisions` row.
pub struct DecisionRow {
  pub decision_id:          String,
  pub record_id:            String,
  pub source_system:        String,
  pub extracted_name:       Option<String>,
  pub extracted_email:      Option<String>,
  pub extracted_phone:      Option<String>,
  pub candidates_evaluated: i64,
  pub top_entity_id:        Option<String>,
  pub top_score:            Option<f64>,
  pub decision_type:        String,
  pub breakdown:            String,
  pub entity_id:            Option<String>,
  pub created_at:           String,
  pub reviewed_at:          Option<String>,
  pub reviewed_by:          Option<String>,
  pub review_action:        Option<String>,
  pub review_notes:         Option<String>,
}

impl DecisionRow {
  pub const COLUMNS: &'static str = "decision_id, record_id, source_system, \
     extracted_name, extracted_email, extracted_phone, candidates_evaluated, \
     top_entity_id, top_score, decision_type, breakdown, entity_id, \
     created_at, reviewed_at, reviewed_by, review_action, review_notes";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(DecisionRow {
      decision_id:          row.get(0)?,
      record_id:            row.get(1)?,
      source_system:        row.get(2)?,
      extracted_name:       row.get(3)?,
      extracted_email:      row.get(4)?,
      extracted_phone:      row.get(5)?,
      candidates_evaluated: row.get(6)?,
      top_entity_id:        row.get(7)?,
      top_score:            row.get(8)?,
      decision_type:        row.get(9)?,
      breakdown:            row.get(10)?,
      entity_id:            row.get(11)?,
      created_at:           row.get(12)?,
      reviewed_at:          row.get(13)?,
      reviewed_by:          row.get(14)?,
      review_action:        row.get(15)?,
      review_notes:         row.get(16)?,
    })
  }

  pub fn into_decision(self) -> Result<MatchDecision> {
    Ok(MatchDecision {
      decision_id:          decode_uuid(&self.decision_id)?,
      record_id:            decode_uuid(&self.record_id)?,
      source_system:        decode_source_system(&self.source_system)?,
      extracted_name:       self.extracted_name,
      extracted_email:      self.extracted_email,
      extracted_phone:      self.extracted_phone,
      candidates_evaluated: self.candidates_evaluated as u32,
      top_entity_id:        decode_uuid_opt(self.top_entity_id.as_deref())?,
      top_score:            self.top_score,
      decision_type:        decode_decision_type(&self.decision_type)?,
      breakdown:            decode_breakdown(&self.breakdown)?,
      entity_id:            decode_uuid_opt(self.entity_id.as_deref())?,
      created_at:           decode_dt(&self.created_at)?,
      reviewed_at:          self
        .reviewed_at
        .as_deref()
        .map(decode_dt)
        .transpose()?,
      reviewed_by:          self.reviewed_by,
      review_action:        self
        .review_action
        .as_deref()
        .map(decode_review_action)
        .transpose()?,
      review_notes:         self.review_notes,
    })
  }
}

/// Raw strings read directly from a `household_members` row.
pub struct MemberRow {
  pub person_id:  String,
  pub place_id:   String,
  pub role:       String,
  pub confidence: f64,
  pub source:     String,
}

impl MemberRow {
  pub fn into_member(self) -> Result<HouseholdMember> {
    Ok(HouseholdMember {
      person_id:  decode_uuid(&self.person_id)?,
      place_id:   decode_uuid(&self.place_id)?,
      role:       decode_household_role(&self.role)?,
      confidence: self.confidence,
      source:     decode_membership_source(&self.source)?,
    })
  }
}

/// Raw strings read directly from an `audit_log` row.
pub struct AuditRow {
  pub audit_id:    String,
  pub entity_kind: String,
  pub entity_id:   String,
  pub edit_type:   String,
  pub old_value:   Option<String>,
  pub new_value:   Option<String>,
  pub actor:       String,
  pub source:      Option<String>,
  pub recorded_at: String,
}

impl AuditRow {
  pub fn into_entry(self) -> Result<AuditEntry> {
    Ok(AuditEntry {
      audit_id:    decode_uuid(&self.audit_id)?,
      entity_kind: decode_entity_kind(&self.entity_kind)?,
      entity_id:   decode_uuid(&self.entity_id)?,
      edit_type:   decode_edit_type(&self.edit_type)?,
      old_value:   self.old_value,
      new_value:   self.new_value,
      actor:       self.actor,
      source:      self.source,
      recorded_at: decode_dt(&self.recorded_at)?,
    })
  }
}
