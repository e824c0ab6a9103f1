//! Row types for the hosted tables and their mapping to records

use crate::error::{Result, StoreError};
use crate::hosted::chain;
use chrono::{DateTime, Utc};
use ridec_core::machine;
use ridec_core::{
    Deadline, Integrations, ProcessRecord, Relations, StageId, StageTimer, TimeMode, TimeUnit,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Stage type code used for custom stages
pub const STAGE_A_CODE: &str = "A";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaRow {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub company_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyRow {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserTypeRow {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub access_level: Option<i32>,
    #[serde(default)]
    pub can_edit_templates: Option<bool>,
    #[serde(default)]
    pub can_manage_users: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRow {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub company: Option<CompanyRow>,
    #[serde(default)]
    pub user_type: Option<UserTypeRow>,
}

fn default_true() -> bool {
    true
}

/// `process_template_stage`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRow {
    pub id: String,
    pub process_template_id: String,
    /// RI / D / E / C / A
    pub stage_type_code: String,
    #[serde(default)]
    pub uom_code: Option<String>,
    #[serde(default)]
    pub uom_value: Option<f64>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub previous_stage_id: Option<String>,
}

/// `process_template`, optionally with embedded area and stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateRow {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub area_id: Option<String>,
    #[serde(default)]
    pub company_id: Option<String>,
    #[serde(default)]
    pub relation_start_id: Option<String>,
    #[serde(default)]
    pub relation_end_id: Option<String>,
    #[serde(default)]
    pub time_mode: Option<String>,
    #[serde(default)]
    pub max_time_value: Option<f64>,
    #[serde(default)]
    pub max_time_uom: Option<String>,
    #[serde(default)]
    pub integrations: Option<serde_json::Value>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub current_stage: Option<String>,
    #[serde(default)]
    pub stage_timers: Option<serde_json::Value>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed: Option<bool>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub updated_by: Option<String>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deleted_by: Option<String>,
    #[serde(default, skip_serializing)]
    pub area: Option<AreaRow>,
    #[serde(default, skip_serializing)]
    pub process_template_stage: Vec<StageRow>,
}

/// `process_occurrence`, optionally with the embedded template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccurrenceRow {
    pub id: String,
    pub process_template_id: Option<String>,
    #[serde(default)]
    pub company_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub current_stage: Option<String>,
    #[serde(default)]
    pub stage_timers: Option<serde_json::Value>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing)]
    pub process_template: Option<Box<TemplateRow>>,
}

fn parse_timers(value: Option<&serde_json::Value>) -> BTreeMap<StageId, StageTimer> {
    value
        .and_then(|v| match serde_json::from_value(v.clone()) {
            Ok(timers) => Some(timers),
            Err(e) => {
                tracing::warn!("Ignoring unreadable stage_timers: {}", e);
                None
            }
        })
        .unwrap_or_default()
}

fn parse_integrations(value: Option<&serde_json::Value>) -> Integrations {
    value
        .filter(|v| !v.is_null())
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default()
}

fn parse_time_mode(value: Option<&str>) -> TimeMode {
    value.and_then(|v| v.parse().ok()).unwrap_or_default()
}

/// Point `current_stage` back into the sequence when the stored one is gone
fn ensure_known_stage(record: &mut ProcessRecord) {
    if record.stage_sequence().contains(&record.current_stage) {
        return;
    }
    let fallback = machine::first_open_stage(record);
    tracing::warn!(
        "Record {} points at unknown stage {}, using {}",
        record.id,
        record.current_stage,
        fallback
    );
    record.current_stage = fallback;
}

fn deadline_from(value: Option<f64>, uom: Option<&str>) -> Option<Deadline> {
    let value = value?;
    let unit = uom.and_then(TimeUnit::from_code).unwrap_or_default();
    Some(Deadline::new(value, unit))
}

impl TemplateRow {
    /// Build a template record. Stages come from the embedded chain
    pub fn into_record(self) -> Result<ProcessRecord> {
        let mut record = ProcessRecord::new_template(self.title.clone(), self.created_at);
        record.id = self.id.clone();
        record.description = self.description.clone().unwrap_or_default();
        record.area = self.area.as_ref().map(|a| a.name.clone()).unwrap_or_default();
        record.time_mode = parse_time_mode(self.time_mode.as_deref());
        record.max_time = deadline_from(self.max_time_value, self.max_time_uom.as_deref());
        record.relations = Relations {
            start: self.relation_start_id.clone(),
            end: self.relation_end_id.clone(),
        };
        record.integrations = parse_integrations(self.integrations.as_ref());
        record.updated_at = self.updated_at;

        let ordered = chain::order_chain(&self.id, &self.process_template_stage)?;
        chain::apply_stages(&mut record, &ordered)?;

        record.stage_timers = parse_timers(self.stage_timers.as_ref());
        if let Some(stage) = self.current_stage.as_deref() {
            record.current_stage = StageId::parse_loose(stage);
        }
        ensure_known_stage(&mut record);
        record.started_at = self.started_at;
        record.completed = self.completed.unwrap_or(false);
        record.completed_at = self.completed_at;
        Ok(record)
    }

    /// Row for insert/update. Area and audit columns are filled by the caller
    pub fn from_record(record: &ProcessRecord) -> Result<Self> {
        if record.is_occurrence {
            return Err(StoreError::Domain(ridec_core::RidecError::NotATemplate(
                record.id.clone(),
            )));
        }
        Ok(Self {
            id: record.id.clone(),
            title: record.title.clone(),
            description: Some(record.description.clone()),
            area_id: None,
            company_id: None,
            relation_start_id: record.relations.start.clone(),
            relation_end_id: record.relations.end.clone(),
            time_mode: Some(record.time_mode.as_str().to_string()),
            max_time_value: record.max_time.map(|d| d.value),
            max_time_uom: record.max_time.map(|d| d.unit.code().to_string()),
            integrations: Some(serde_json::to_value(&record.integrations)?),
            is_active: true,
            current_stage: Some(record.current_stage.to_string()),
            stage_timers: Some(serde_json::to_value(&record.stage_timers)?),
            started_at: record.started_at,
            completed: Some(record.completed),
            completed_at: record.completed_at,
            created_at: record.created_at,
            updated_at: record.updated_at,
            created_by: None,
            updated_by: None,
            deleted_at: None,
            deleted_by: None,
            area: None,
            process_template_stage: Vec::new(),
        })
    }
}

impl OccurrenceRow {
    /// Build an occurrence record from its own timer state plus the template's
    /// configuration. Missing or unreadable templates yield a record with
    /// standard stages only.
    pub fn into_record(self) -> Result<ProcessRecord> {
        let base = self.process_template.and_then(|template| {
            let template_id = template.id.clone();
            match (*template).into_record() {
                Ok(base) => Some(base),
                Err(e) => {
                    tracing::warn!(
                        "Using standard stages for occurrence {}: template {} is unreadable: {}",
                        self.id,
                        template_id,
                        e
                    );
                    None
                }
            }
        });
        let mut record = match base {
            Some(mut base) => {
                base.relations = Relations::default();
                base
            }
            None => ProcessRecord::new_template(String::new(), self.created_at),
        };
        record.id = self.id;
        record.is_occurrence = true;
        record.template_id = self.process_template_id;
        if let Some(title) = self.title {
            record.title = title;
        }
        record.current_stage = self
            .current_stage
            .as_deref()
            .map(StageId::parse_loose)
            .unwrap_or(StageId::Ri);
        record.stage_timers = parse_timers(self.stage_timers.as_ref());
        ensure_known_stage(&mut record);
        record.started_at = self.started_at;
        record.completed = self.completed;
        record.completed_at = self.completed_at;
        record.created_at = self.created_at;
        record.updated_at = self.updated_at;
        Ok(record)
    }

    pub fn from_record(record: &ProcessRecord) -> Result<Self> {
        Ok(Self {
            id: record.id.clone(),
            process_template_id: record.template_id.clone(),
            company_id: None,
            user_id: None,
            title: Some(record.title.clone()),
            current_stage: Some(record.current_stage.to_string()),
            stage_timers: Some(serde_json::to_value(&record.stage_timers)?),
            started_at: record.started_at,
            completed: record.completed,
            completed_at: record.completed_at,
            created_at: record.created_at,
            updated_at: record.updated_at,
            process_template: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_row_from_json() {
        let json = serde_json::json!({
            "id": "t1",
            "title": "Compras",
            "created_at": "2024-05-01T12:00:00Z",
            "time_mode": "simple",
            "area": {"id": "a1", "name": "Suprimentos"},
            "integrations": null,
            "process_template_stage": [
                {"id": "s2", "process_template_id": "t1", "stage_type_code": "D",
                 "uom_code": "HOUR", "uom_value": 4.0, "previous_stage_id": "s1"},
                {"id": "s1", "process_template_id": "t1", "stage_type_code": "RI",
                 "uom_code": "MIN", "uom_value": 30.0},
                {"id": "s3", "process_template_id": "t1", "stage_type_code": "E",
                 "uom_value": 3.0, "previous_stage_id": "s2"},
                {"id": "s4", "process_template_id": "t1", "stage_type_code": "C",
                 "uom_code": "DAY", "uom_value": 1.0, "previous_stage_id": "s3"}
            ]
        });
        let row: TemplateRow = serde_json::from_value(json).unwrap();
        let record = row.into_record().unwrap();
        assert_eq!(record.area, "Suprimentos");
        assert_eq!(record.deadline_secs(&StageId::Ri), Some(1800.0));
        assert_eq!(record.deadline_secs(&StageId::E), Some(3.0 * 3600.0));
        assert_eq!(record.deadline_secs(&StageId::C), Some(86_400.0));
        assert!(record.integrations.is_empty());
    }

    #[test]
    fn test_occurrence_row_uses_template_configuration() {
        let json = serde_json::json!({
            "id": "o1",
            "process_template_id": "t1",
            "title": "Compras #1",
            "current_stage": "D",
            "stage_timers": {"RI": {"elapsed": 60, "running": false, "completed": true}},
            "completed": false,
            "created_at": "2024-05-02T08:00:00Z",
            "process_template": {
                "id": "t1",
                "title": "Compras",
                "created_at": "2024-05-01T12:00:00Z",
                "relation_end_id": "t9",
                "process_template_stage": []
            }
        });
        let row: OccurrenceRow = serde_json::from_value(json).unwrap();
        let record = row.into_record().unwrap();
        assert!(record.is_occurrence);
        assert_eq!(record.title, "Compras #1");
        assert_eq!(record.current_stage, StageId::D);
        assert!(record.relations.is_empty());
        assert!(record.timer(&StageId::Ri).unwrap().completed);
    }

    /// 削除済みの Stage A を指すオカレンスは最初の未完了ステージに戻る
    #[test]
    fn test_occurrence_row_with_unknown_current_stage() {
        let json = serde_json::json!({
            "id": "o2",
            "process_template_id": "t1",
            "current_stage": "Review",
            "stage_timers": {
                "RI": {"elapsed": 60, "running": false, "completed": true},
                "D": {"elapsed": 120, "running": false, "completed": true}
            },
            "completed": false,
            "created_at": "2024-05-02T08:00:00Z",
            "process_template": {
                "id": "t1",
                "title": "Compras",
                "created_at": "2024-05-01T12:00:00Z",
                "process_template_stage": []
            }
        });
        let row: OccurrenceRow = serde_json::from_value(json).unwrap();
        let record = row.into_record().unwrap();
        assert_eq!(record.current_stage, StageId::E);
        assert!(record.has_stage(&record.current_stage));
    }

    #[test]
    fn test_occurrence_row_with_broken_template_chain() {
        let json = serde_json::json!({
            "id": "o3",
            "process_template_id": "t2",
            "title": "Expedição #1",
            "current_stage": "RI",
            "completed": false,
            "created_at": "2024-05-02T08:00:00Z",
            "process_template": {
                "id": "t2",
                "title": "Expedição",
                "created_at": "2024-05-01T12:00:00Z",
                "process_template_stage": [
                    {"id": "s1", "process_template_id": "t2", "stage_type_code": "RI"},
                    {"id": "s2", "process_template_id": "t2", "stage_type_code": "D"}
                ]
            }
        });
        let row: OccurrenceRow = serde_json::from_value(json).unwrap();
        let record = row.into_record().unwrap();
        assert_eq!(record.title, "Expedição #1");
        assert_eq!(record.template_id.as_deref(), Some("t2"));
        assert_eq!(record.stage_sequence(), StageId::STANDARD.to_vec());
    }

    #[test]
    fn test_template_row_serialization_skips_embeds() {
        let record = ProcessRecord::new_template("X", Utc::now());
        let row = TemplateRow::from_record(&record).unwrap();
        let value = serde_json::to_value(&row).unwrap();
        assert!(value.get("area").is_none());
        assert!(value.get("process_template_stage").is_none());
        assert_eq!(value["time_mode"], "simple");
    }
}
