//! [`SqliteStore`] — the SQLite implementation of [`EntityStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use clowder_core::{
  audit::{AuditEntry, NewAuditEntry},
  config::{FsParameter, MatchConfig, ThresholdConfig},
  decision::{
    DecisionStatus, MatchDecision, NewMatchDecision, ReviewAction,
  },
  entity::{Entity, EntityKind},
  household::HouseholdMember,
  identifier::{IdType, Identifier},
  record::{NewRawRecord, RawRecord, SourceSystem},
  store::{DecisionQuery, EntityStore},
};

use crate::{
  Error, Result,
  encode::{
    AuditRow, DecisionRow, EntityRow, IdentifierRow, MemberRow, RawRecordRow,
    decode_match_field, decode_source_system, encode_breakdown,
    encode_decision_type, encode_dt, encode_edit_type, encode_entity_kind,
    encode_household_role, encode_id_type, encode_match_field,
    encode_membership_source, encode_payload, encode_review_action,
    encode_source_system, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Clowder entity store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn get_entity_row(&self, id: Uuid) -> Result<Option<Entity>> {
    let id_str = encode_uuid(id);
    let raw: Option<EntityRow> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT entity_id, kind, display_name, created_at, merged_into
               FROM entities WHERE entity_id = ?1",
              rusqlite::params![id_str],
              |row| {
                Ok(EntityRow {
                  entity_id:    row.get(0)?,
                  kind:         row.get(1)?,
                  display_name: row.get(2)?,
                  created_at:   row.get(3)?,
                  merged_into:  row.get(4)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(EntityRow::into_entity).transpose()
  }

  async fn get_decision_row(&self, id: Uuid) -> Result<Option<MatchDecision>> {
    let id_str = encode_uuid(id);
    let raw: Option<DecisionRow> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM match_decisions WHERE decision_id = ?1",
          DecisionRow::COLUMNS
        );
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id_str], DecisionRow::from_row)
            .optional()?,
        )
      })
      .await?;
    raw.map(DecisionRow::into_decision).transpose()
  }

  async fn decision_by_record(
    &self,
    record_id: Uuid,
  ) -> Result<Option<MatchDecision>> {
    let record_str = encode_uuid(record_id);
    let raw: Option<DecisionRow> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM match_decisions WHERE record_id = ?1",
          DecisionRow::COLUMNS
        );
        Ok(
          conn
            .query_row(&sql, rusqlite::params![record_str], DecisionRow::from_row)
            .optional()?,
        )
      })
      .await?;
    raw.map(DecisionRow::into_decision).transpose()
  }
}

// ─── EntityStore impl ────────────────────────────────────────────────────────

impl EntityStore for SqliteStore {
  type Error = Error;

  // ── Raw records ───────────────────────────────────────────────────────────

  async fn ingest_raw(&self, input: NewRawRecord) -> Result<Option<RawRecord>> {
    let record = RawRecord {
      record_id:        Uuid::new_v4(),
      source_system:    input.source_system,
      source_record_id: input.source_record_id.clone(),
      content_hash:     input.content_hash(),
      payload:          input.payload,
      received_at:      Utc::now(),
    };

    let id_str      = encode_uuid(record.record_id);
    let source_str  = encode_source_system(record.source_system).to_owned();
    let source_id   = record.source_record_id.clone();
    let payload_str = encode_payload(&record.payload)?;
    let hash_str    = record.content_hash.clone();
    let at_str      = encode_dt(record.received_at);

    let inserted: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT OR IGNORE INTO raw_records
             (record_id, source_system, source_record_id, payload,
              content_hash, received_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![
            id_str, source_str, source_id, payload_str, hash_str, at_str
          ],
        )?)
      })
      .await?;

    Ok(if inserted == 0 { None } else { Some(record) })
  }

  async fn fetch_unprocessed(
    &self,
    source: Option<SourceSystem>,
    limit: usize,
  ) -> Result<Vec<RawRecord>> {
    let source_str = source.map(encode_source_system).map(str::to_owned);
    let limit_val  = limit as i64;

    let raws: Vec<RawRecordRow> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT r.record_id, r.source_system, r.source_record_id,
                  r.payload, r.content_hash, r.received_at
           FROM raw_records r
           LEFT JOIN match_decisions d ON d.record_id = r.record_id
           WHERE d.decision_id IS NULL {}
           ORDER BY r.received_at
           LIMIT ?2",
          if source_str.is_some() { "AND r.source_system = ?1" } else { "AND ?1 IS NULL" }
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(
            rusqlite::params![source_str.as_deref(), limit_val],
            |row| {
              Ok(RawRecordRow {
                record_id:        row.get(0)?,
                source_system:    row.get(1)?,
                source_record_id: row.get(2)?,
                payload:          row.get(3)?,
                content_hash:     row.get(4)?,
                received_at:      row.get(5)?,
              })
            },
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRecordRow::into_record).collect()
  }

  // ── Entities ──────────────────────────────────────────────────────────────

  async fn add_entity(
    &self,
    kind: EntityKind,
    display_name: String,
  ) -> Result<Entity> {
    let entity = Entity {
      entity_id: Uuid::new_v4(),
      kind,
      display_name,
      created_at: Utc::now(),
      merged_into: None,
    };

    let id_str   = encode_uuid(entity.entity_id);
    let kind_str = encode_entity_kind(kind).to_owned();
    let name     = entity.display_name.clone();
    let at_str   = encode_dt(entity.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO entities (entity_id, kind, display_name, created_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, kind_str, name, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(entity)
  }

  async fn get_entity(&self, id: Uuid) -> Result<Option<Entity>> {
    self.get_entity_row(id).await
  }

  async fn resolve_terminal(&self, id: Uuid) -> Result<Option<Entity>> {
    let mut current = match self.get_entity_row(id).await? {
      Some(e) => e,
      None => return Ok(None),
    };

    // Chains are one hop by invariant, but walk defensively; a revisit means
    // the forest invariant is broken on disk.
    let mut visited = vec![current.entity_id];
    while let Some(next_id) = current.merged_into {
      if visited.contains(&next_id) {
        return Err(Error::MergeLoop(next_id));
      }
      visited.push(next_id);
      current = self
        .get_entity_row(next_id)
        .await?
        .ok_or(Error::EntityNotFound(next_id))?;
    }
    Ok(Some(current))
  }

  async fn find_by_display_name(
    &self,
    kind: EntityKind,
    name: &str,
  ) -> Result<Option<Entity>> {
    let kind_str = encode_entity_kind(kind).to_owned();
    let name_str = name.to_owned();

    let raw: Option<EntityRow> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT entity_id, kind, display_name, created_at, merged_into
               FROM entities
               WHERE kind = ?1 AND display_name = ?2 AND merged_into IS NULL
               ORDER BY created_at
               LIMIT 1",
              rusqlite::params![kind_str, name_str],
              |row| {
                Ok(EntityRow {
                  entity_id:    row.get(0)?,
                  kind:         row.get(1)?,
                  display_name: row.get(2)?,
                  created_at:   row.get(3)?,
                  merged_into:  row.get(4)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(EntityRow::into_entity).transpose()
  }

  async fn set_merged_into(&self, loser: Uuid, winner: Uuid) -> Result<()> {
    let loser_str  = encode_uuid(loser);
    let winner_str = encode_uuid(winner);

    let changed: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE entities SET merged_into = ?2
           WHERE entity_id = ?1 AND merged_into IS NULL",
          rusqlite::params![loser_str, winner_str],
        )?)
      })
      .await?;

    if changed == 0 {
      // Distinguish a vanished entity from a lost race.
      return match self.get_entity_row(loser).await? {
        None => Err(Error::EntityNotFound(loser)),
        Some(_) => Err(Error::AlreadyMerged(loser)),
      };
    }
    Ok(())
  }

  async fn repoint_merged(
    &self,
    old_target: Uuid,
    new_target: Uuid,
  ) -> Result<usize> {
    let old_str = encode_uuid(old_target);
    let new_str = encode_uuid(new_target);

    let changed: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE entities SET merged_into = ?2 WHERE merged_into = ?1",
          rusqlite::params![old_str, new_str],
        )?)
      })
      .await?;
    Ok(changed)
  }

  // ── Identifiers ───────────────────────────────────────────────────────────

  async fn attach_identifier(&self, ident: Identifier) -> Result<bool> {
    let entity_str = encode_uuid(ident.entity_id);
    let type_str   = encode_id_type(ident.id_type).to_owned();
    let raw        = ident.value_raw.clone();
    let norm       = ident.value_norm.clone();
    let confidence = ident.confidence;
    let source_str = encode_source_system(ident.source_system).to_owned();

    // tokio_rusqlite serialises calls on one connection, so the existence
    // check and the upsert are effectively atomic.
    let inserted: bool = self
      .conn
      .call(move |conn| {
        let exists: bool = conn
          .query_row(
            "SELECT 1 FROM identifiers
             WHERE entity_id = ?1 AND id_type = ?2 AND value_norm = ?3",
            rusqlite::params![entity_str, type_str, norm],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);

        conn.execute(
          "INSERT INTO identifiers
             (entity_id, id_type, value_raw, value_norm, confidence,
              source_system)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)
           ON CONFLICT (entity_id, id_type, value_norm) DO UPDATE SET
             confidence = MAX(confidence, excluded.confidence)",
          rusqlite::params![
            entity_str, type_str, raw, norm, confidence, source_str
          ],
        )?;

        Ok(!exists)
      })
      .await?;
    Ok(inserted)
  }

  async fn identifiers_for(&self, entity_id: Uuid) -> Result<Vec<Identifier>> {
    let id_str = encode_uuid(entity_id);

    let raws: Vec<IdentifierRow> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT entity_id, id_type, value_raw, value_norm, confidence,
                  source_system
           FROM identifiers WHERE entity_id = ?1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |row| {
            Ok(IdentifierRow {
              entity_id:     row.get(0)?,
              id_type:       row.get(1)?,
              value_raw:     row.get(2)?,
              value_norm:    row.get(3)?,
              confidence:    row.get(4)?,
              source_system: row.get(5)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(IdentifierRow::into_identifier).collect()
  }

  async fn find_entities_by_identifier(
    &self,
    id_type: IdType,
    value_norm: &str,
  ) -> Result<Vec<Uuid>> {
    let type_str = encode_id_type(id_type).to_owned();
    let norm     = value_norm.to_owned();

    let ids: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT entity_id FROM identifiers
           WHERE id_type = ?1 AND value_norm = ?2",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![type_str, norm], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    ids
      .iter()
      .map(|s| Uuid::parse_str(s).map_err(Error::Uuid))
      .collect()
  }

  // ── Decisions ─────────────────────────────────────────────────────────────

  async fn record_decision(
    &self,
    input: NewMatchDecision,
  ) -> Result<MatchDecision> {
    let decision_id = Uuid::new_v4();
    let created_at  = Utc::now();

    let id_str        = encode_uuid(decision_id);
    let record_str    = encode_uuid(input.record_id);
    let source_str    = encode_source_system(input.source_system).to_owned();
    let name          = input.extracted_name.clone();
    let email         = input.extracted_email.clone();
    let phone         = input.extracted_phone.clone();
    let evaluated     = input.candidates_evaluated as i64;
    let top_str       = input.top_entity_id.map(encode_uuid);
    let top_score     = input.top_score;
    let type_str      = encode_decision_type(input.decision_type).to_owned();
    let breakdown_str = encode_breakdown(&input.breakdown)?;
    let entity_str    = input.entity_id.map(encode_uuid);
    let at_str        = encode_dt(created_at);

    self
      .conn
      .call(move |conn| {
        // OR IGNORE on the UNIQUE record_id: a concurrent batch that already
        // decided this record wins, and we return its row below.
        conn.execute(
          "INSERT OR IGNORE INTO match_decisions
             (decision_id, record_id, source_system, extracted_name,
              extracted_email, extracted_phone, candidates_evaluated,
              top_entity_id, top_score, decision_type, breakdown, entity_id,
              created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
          rusqlite::params![
            id_str, record_str, source_str, name, email, phone, evaluated,
            top_str, top_score, type_str, breakdown_str, entity_str, at_str
          ],
        )?;
        Ok(())
      })
      .await?;

    self
      .decision_by_record(input.record_id)
      .await?
      .ok_or(Error::DecisionNotFound(decision_id))
  }

  async fn get_decision(&self, id: Uuid) -> Result<Option<MatchDecision>> {
    self.get_decision_row(id).await
  }

  async fn list_decisions(
    &self,
    query: &DecisionQuery,
  ) -> Result<Vec<MatchDecision>> {
    let source_str =
      query.source_system.map(encode_source_system).map(str::to_owned);
    let status     = query.status;
    let limit_val  = query.limit.unwrap_or(100) as i64;
    let offset_val = query.offset.unwrap_or(0) as i64;

    let raws: Vec<DecisionRow> = self
      .conn
      .call(move |conn| {
        let mut conds: Vec<&'static str> = vec![];
        match status {
          Some(DecisionStatus::Pending) => conds.push("reviewed_at IS NULL"),
          Some(DecisionStatus::Reviewed) => {
            conds.push("reviewed_at IS NOT NULL")
          }
          None => {}
        }
        if source_str.is_some() {
          conds.push("source_system = ?1");
        }

        let where_clause = if conds.is_empty() {
          String::new()
        } else {
          format!("WHERE {}", conds.join(" AND "))
        };

        let sql = format!(
          "SELECT {} FROM match_decisions
           {where_clause}
           ORDER BY created_at DESC
           LIMIT ?2 OFFSET ?3",
          DecisionRow::COLUMNS
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(
            rusqlite::params![source_str.as_deref(), limit_val, offset_val],
            DecisionRow::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(DecisionRow::into_decision).collect()
  }

  async fn mark_reviewed(
    &self,
    decision_id: Uuid,
    action: ReviewAction,
    actor: String,
    notes: Option<String>,
  ) -> Result<MatchDecision> {
    let id_str     = encode_uuid(decision_id);
    let action_str = encode_review_action(action).to_owned();
    let at_str     = encode_dt(Utc::now());
    let actor_arg  = actor.clone();

    let changed: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE match_decisions
           SET reviewed_at = ?2, reviewed_by = ?3, review_action = ?4,
               review_notes = ?5
           WHERE decision_id = ?1 AND reviewed_at IS NULL",
          rusqlite::params![id_str, at_str, actor_arg, action_str, notes],
        )?)
      })
      .await?;

    if changed == 0 {
      return match self.get_decision_row(decision_id).await? {
        None => Err(Error::DecisionNotFound(decision_id)),
        Some(d) => Err(Error::AlreadyResolved {
          decision_id,
          by: d.reviewed_by.unwrap_or_else(|| "unknown".into()),
          at: d.reviewed_at.unwrap_or_else(Utc::now),
        }),
      };
    }

    self
      .get_decision_row(decision_id)
      .await?
      .ok_or(Error::DecisionNotFound(decision_id))
  }

  // ── Pair suppression ──────────────────────────────────────────────────────

  async fn suppress_pair(&self, signal_key: &str, entity_id: Uuid) -> Result<()> {
    let key    = signal_key.to_owned();
    let id_str = encode_uuid(entity_id);
    let at_str = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR IGNORE INTO pair_suppressions
             (signal_key, entity_id, recorded_at)
           VALUES (?1, ?2, ?3)",
          rusqlite::params![key, id_str, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn is_pair_suppressed(
    &self,
    signal_key: &str,
    entity_id: Uuid,
  ) -> Result<bool> {
    let key    = signal_key.to_owned();
    let id_str = encode_uuid(entity_id);

    let found: bool = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM pair_suppressions
               WHERE signal_key = ?1 AND entity_id = ?2",
              rusqlite::params![key, id_str],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;
    Ok(found)
  }

  // ── Households ────────────────────────────────────────────────────────────

  async fn upsert_household_member(
    &self,
    member: HouseholdMember,
  ) -> Result<()> {
    let person_str = encode_uuid(member.person_id);
    let place_str  = encode_uuid(member.place_id);
    let role_str   = encode_household_role(member.role).to_owned();
    let confidence = member.confidence;
    let source_str = encode_membership_source(member.source).to_owned();

    self
      .conn
      .call(move |conn| {
        // A manual row is never downgraded by a later inference pass.
        conn.execute(
          "INSERT INTO household_members
             (person_id, place_id, role, confidence, source)
           VALUES (?1, ?2, ?3, ?4, ?5)
           ON CONFLICT (person_id, place_id) DO UPDATE SET
             role = excluded.role,
             confidence = excluded.confidence,
             source = excluded.source
           WHERE NOT (household_members.source = 'manual'
                      AND excluded.source = 'inferred')",
          rusqlite::params![
            person_str, place_str, role_str, confidence, source_str
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn household_for_person(
    &self,
    person_id: Uuid,
  ) -> Result<Vec<HouseholdMember>> {
    let id_str = encode_uuid(person_id);

    let raws: Vec<MemberRow> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT person_id, place_id, role, confidence, source
           FROM household_members WHERE person_id = ?1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |row| {
            Ok(MemberRow {
              person_id:  row.get(0)?,
              place_id:   row.get(1)?,
              role:       row.get(2)?,
              confidence: row.get(3)?,
              source:     row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(MemberRow::into_member).collect()
  }

  // ── Audit ─────────────────────────────────────────────────────────────────

  async fn append_audit(&self, input: NewAuditEntry) -> Result<AuditEntry> {
    let entry = AuditEntry {
      audit_id:    Uuid::new_v4(),
      entity_kind: input.entity_kind,
      entity_id:   input.entity_id,
      edit_type:   input.edit_type,
      old_value:   input.old_value,
      new_value:   input.new_value,
      actor:       input.actor,
      source:      input.source,
      recorded_at: Utc::now(),
    };

    let id_str     = encode_uuid(entry.audit_id);
    let kind_str   = encode_entity_kind(entry.entity_kind).to_owned();
    let entity_str = encode_uuid(entry.entity_id);
    let edit_str   = encode_edit_type(entry.edit_type).to_owned();
    let old_value  = entry.old_value.clone();
    let new_value  = entry.new_value.clone();
    let actor      = entry.actor.clone();
    let source     = entry.source.clone();
    let at_str     = encode_dt(entry.recorded_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO audit_log
             (audit_id, entity_kind, entity_id, edit_type, old_value,
              new_value, actor, source, recorded_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          rusqlite::params![
            id_str, kind_str, entity_str, edit_str, old_value, new_value,
            actor, source, at_str
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(entry)
  }

  async fn audit_for_entity(&self, entity_id: Uuid) -> Result<Vec<AuditEntry>> {
    let id_str = encode_uuid(entity_id);

    let raws: Vec<AuditRow> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT audit_id, entity_kind, entity_id, edit_type, old_value,
                  new_value, actor, source, recorded_at
           FROM audit_log WHERE entity_id = ?1
           ORDER BY recorded_at",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |row| {
            Ok(AuditRow {
              audit_id:    row.get(0)?,
              entity_kind: row.get(1)?,
              entity_id:   row.get(2)?,
              edit_type:   row.get(3)?,
              old_value:   row.get(4)?,
              new_value:   row.get(5)?,
              actor:       row.get(6)?,
              source:      row.get(7)?,
              recorded_at: row.get(8)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(AuditRow::into_entry).collect()
  }

  // ── Matching configuration ────────────────────────────────────────────────

  async fn save_match_config(&self, config: &MatchConfig) -> Result<()> {
    // Reject before any row is touched.
    config.validate().map_err(Error::Core)?;

    let thresholds: Vec<(String, f64, f64)> = config
      .thresholds
      .iter()
      .map(|t| {
        (
          t.source_system
            .map(encode_source_system)
            .unwrap_or("default")
            .to_owned(),
          t.upper_threshold,
          t.lower_threshold,
        )
      })
      .collect();
    let parameters: Vec<(String, f64, f64)> = config
      .parameters
      .iter()
      .map(|p| {
        (
          encode_match_field(p.field).to_owned(),
          p.m_probability,
          p.u_probability,
        )
      })
      .collect();
    let floor = config.name_similarity_floor;

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM match_thresholds", [])?;
        tx.execute("DELETE FROM fs_parameters", [])?;
        for (scope, upper, lower) in &thresholds {
          tx.execute(
            "INSERT INTO match_thresholds
               (scope, upper_threshold, lower_threshold)
             VALUES (?1, ?2, ?3)",
            rusqlite::params![scope, upper, lower],
          )?;
        }
        for (field, m, u) in &parameters {
          tx.execute(
            "INSERT INTO fs_parameters (field, m_probability, u_probability)
             VALUES (?1, ?2, ?3)",
            rusqlite::params![field, m, u],
          )?;
        }
        tx.execute(
          "INSERT INTO engine_settings (key, value) VALUES
             ('name_similarity_floor', ?1)
           ON CONFLICT (key) DO UPDATE SET value = excluded.value",
          rusqlite::params![floor.to_string()],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn load_match_config(&self) -> Result<MatchConfig> {
    let (threshold_rows, parameter_rows, floor_row): (
      Vec<(String, f64, f64)>,
      Vec<(String, f64, f64)>,
      Option<String>,
    ) = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT scope, upper_threshold, lower_threshold
           FROM match_thresholds",
        )?;
        let thresholds = stmt
          .query_map([], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = conn.prepare(
          "SELECT field, m_probability, u_probability FROM fs_parameters",
        )?;
        let parameters = stmt
          .query_map([], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let floor: Option<String> = conn
          .query_row(
            "SELECT value FROM engine_settings
             WHERE key = 'name_similarity_floor'",
            [],
            |row| row.get(0),
          )
          .optional()?;

        Ok((thresholds, parameters, floor))
      })
      .await?;

    if threshold_rows.is_empty() && parameter_rows.is_empty() {
      return Ok(MatchConfig::default());
    }

    let thresholds = threshold_rows
      .into_iter()
      .map(|(scope, upper, lower)| {
        let source_system = if scope == "default" {
          None
        } else {
          Some(decode_source_system(&scope)?)
        };
        Ok(ThresholdConfig {
          source_system,
          upper_threshold: upper,
          lower_threshold: lower,
        })
      })
      .collect::<Result<Vec<_>>>()?;

    let parameters = parameter_rows
      .into_iter()
      .map(|(field, m, u)| {
        Ok(FsParameter {
          field:         decode_match_field(&field)?,
          m_probability: m,
          u_probability: u,
        })
      })
      .collect::<Result<Vec<_>>>()?;

    let name_similarity_floor = floor_row
      .map(|s| {
        s.parse::<f64>()
          .map_err(|e| Error::Decode(format!("name_similarity_floor: {e}")))
      })
      .transpose()?
      .unwrap_or(0.88);

    Ok(MatchConfig { thresholds, parameters, name_similarity_floor })
  }
}
