//! Stage chain encoding
//!
//! Template stages are stored as a singly-linked list through
//! `previous_stage_id`. The head has no predecessor. Stage A positions are not
//! stored; they follow from the last standard stage before them in the chain.

use crate::error::{Result, StoreError};
use crate::hosted::rows::{STAGE_A_CODE, StageRow};
use ridec_core::{Deadline, ProcessRecord, StageA, StageId, StagePosition, TimeUnit};
use std::collections::{HashMap, HashSet};

fn broken(template: &str, reason: impl Into<String>) -> StoreError {
    StoreError::BrokenChain {
        template: template.to_string(),
        reason: reason.into(),
    }
}

/// Rebuild stage order from the chain.
///
/// Fails on a missing or duplicated head, forks, cycles, and rows that are
/// unreachable from the head.
pub fn order_chain<'a>(template: &str, rows: &'a [StageRow]) -> Result<Vec<&'a StageRow>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let heads: Vec<&StageRow> = rows.iter().filter(|r| r.previous_stage_id.is_none()).collect();
    let head = match heads.as_slice() {
        [head] => *head,
        [] => return Err(broken(template, "no head stage (cycle)")),
        _ => return Err(broken(template, format!("{} head stages", heads.len()))),
    };

    let mut next: HashMap<&str, &StageRow> = HashMap::new();
    for row in rows {
        if let Some(previous) = row.previous_stage_id.as_deref() {
            if next.insert(previous, row).is_some() {
                return Err(broken(template, format!("stage {} has two successors", previous)));
            }
        }
    }

    let mut ordered = Vec::with_capacity(rows.len());
    let mut seen: HashSet<&str> = HashSet::new();
    let mut current = Some(head);
    while let Some(row) = current {
        if !seen.insert(row.id.as_str()) {
            return Err(broken(template, format!("cycle at stage {}", row.id)));
        }
        ordered.push(row);
        current = next.get(row.id.as_str()).copied();
    }

    if ordered.len() != rows.len() {
        return Err(broken(
            template,
            format!("{} stages unreachable from head", rows.len() - ordered.len()),
        ));
    }
    Ok(ordered)
}

fn deadline_of(row: &StageRow) -> Option<Deadline> {
    let value = row.uom_value?;
    let unit = row
        .uom_code
        .as_deref()
        .and_then(TimeUnit::from_code)
        .unwrap_or_default();
    Some(Deadline::new(value, unit))
}

/// Apply ordered stage rows to a record (deadlines and Stage A list)
pub fn apply_stages(record: &mut ProcessRecord, ordered: &[&StageRow]) -> Result<()> {
    let mut last_standard: Option<StageId> = None;
    let mut stages_a = Vec::new();

    for row in ordered {
        if row.stage_type_code.eq_ignore_ascii_case(STAGE_A_CODE) {
            let anchor = last_standard
                .as_ref()
                .ok_or_else(|| broken(&record.id, "custom stage before RI"))?;
            let position = StagePosition::after(anchor)
                .ok_or_else(|| broken(&record.id, "custom stage without anchor"))?;
            let identifier = row
                .name
                .clone()
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| row.id.clone());
            let mut stage = StageA::new(identifier, position);
            stage.description = row.description.clone().unwrap_or_default();
            if let Some(deadline) = deadline_of(row) {
                stage = stage.with_deadline(deadline);
            }
            stages_a.push(stage);
            continue;
        }

        let stage = StageId::parse_loose(&row.stage_type_code);
        if !stage.is_standard() {
            return Err(broken(
                &record.id,
                format!("unknown stage type '{}'", row.stage_type_code),
            ));
        }
        let expected = match &last_standard {
            None => Some(StageId::Ri),
            Some(previous) => StageId::STANDARD
                .iter()
                .position(|s| s == previous)
                .and_then(|i| StageId::STANDARD.get(i + 1).cloned()),
        };
        if expected.as_ref() != Some(&stage) {
            return Err(broken(&record.id, format!("stage {} out of order", stage)));
        }
        record.set_deadline(stage.clone(), deadline_of(row));
        last_standard = Some(stage);
    }

    record.stages_a = stages_a;
    Ok(())
}

/// Encode a template's stage sequence as chained rows with fresh ids
pub fn build_stage_rows(record: &ProcessRecord) -> Vec<StageRow> {
    let mut rows: Vec<StageRow> = Vec::new();
    for stage in record.stage_sequence() {
        let previous_stage_id = rows.last().map(|r| r.id.clone());
        let (code, name, description, deadline) = match &stage {
            StageId::Custom(identifier) => {
                let a = record.stage_a(identifier);
                (
                    STAGE_A_CODE.to_string(),
                    Some(identifier.clone()),
                    a.map(|a| a.description.clone()).filter(|d| !d.is_empty()),
                    a.and_then(|a| a.deadline.map(|v| Deadline::new(v, a.deadline_unit))),
                )
            }
            standard => (
                standard.to_string(),
                None,
                None,
                record
                    .deadlines
                    .get(standard)
                    .copied()
                    .flatten()
                    .map(|v| {
                        Deadline::new(
                            v,
                            record.deadline_units.get(standard).copied().unwrap_or_default(),
                        )
                    }),
            ),
        };
        rows.push(StageRow {
            id: uuid::Uuid::new_v4().to_string(),
            process_template_id: record.id.clone(),
            stage_type_code: code,
            uom_code: deadline.map(|d| d.unit.code().to_string()),
            uom_value: deadline.map(|d| d.value),
            file_path: None,
            name,
            description,
            previous_stage_id,
        });
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn row(id: &str, code: &str, previous: Option<&str>) -> StageRow {
        StageRow {
            id: id.into(),
            process_template_id: "t".into(),
            stage_type_code: code.into(),
            uom_code: Some("HOUR".into()),
            uom_value: Some(1.0),
            file_path: None,
            name: None,
            description: None,
            previous_stage_id: previous.map(String::from),
        }
    }

    #[test]
    fn test_order_shuffled_chain() {
        let rows = vec![
            row("c", "C", Some("e")),
            row("d", "D", Some("ri")),
            row("ri", "RI", None),
            row("e", "E", Some("d")),
        ];
        let ordered = order_chain("t", &rows).unwrap();
        let ids: Vec<_> = ordered.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["ri", "d", "e", "c"]);
    }

    #[test]
    fn test_cycle_and_fork_are_rejected() {
        let cycle = vec![row("a", "RI", Some("b")), row("b", "D", Some("a"))];
        assert!(matches!(
            order_chain("t", &cycle).unwrap_err(),
            StoreError::BrokenChain { .. }
        ));

        let fork = vec![
            row("ri", "RI", None),
            row("d", "D", Some("ri")),
            row("x", "E", Some("ri")),
        ];
        assert!(order_chain("t", &fork).is_err());

        // Head plus a detached loop
        let detached = vec![
            row("ri", "RI", None),
            row("x", "D", Some("y")),
            row("y", "E", Some("x")),
        ];
        assert!(order_chain("t", &detached).is_err());
    }

    #[test]
    fn test_stage_a_positions_follow_from_chain() {
        let mut review = row("rv", "A", Some("d"));
        review.name = Some("Review".into());
        let mut qa = row("qa", "A", Some("c"));
        qa.name = Some("QA".into());
        qa.uom_code = Some("MIN".into());
        qa.uom_value = Some(45.0);
        let rows = vec![
            row("ri", "RI", None),
            row("d", "D", Some("ri")),
            review,
            row("e", "E", Some("rv")),
            row("c", "C", Some("e")),
            qa,
        ];
        let ordered = order_chain("t", &rows).unwrap();
        let mut record = ProcessRecord::new_template("T", Utc::now());
        apply_stages(&mut record, &ordered).unwrap();

        assert_eq!(record.stages_a.len(), 2);
        assert_eq!(record.stages_a[0].position, StagePosition::DE);
        assert_eq!(record.stages_a[1].position, StagePosition::AfterC);
        assert_eq!(record.stages_a[1].deadline_secs(), Some(2700.0));
        let names: Vec<_> = record.stage_sequence().iter().map(|s| s.to_string()).collect();
        assert_eq!(names, vec!["RI", "D", "Review", "E", "C", "QA"]);
    }

    #[test]
    fn test_out_of_order_standard_stage() {
        let rows = vec![row("ri", "RI", None), row("e", "E", Some("ri"))];
        let ordered = order_chain("t", &rows).unwrap();
        let mut record = ProcessRecord::new_template("T", Utc::now());
        assert!(apply_stages(&mut record, &ordered).is_err());
    }

    #[test]
    fn test_build_rows_round_trips_through_chain() {
        let mut record = ProcessRecord::new_template("T", Utc::now());
        for stage in StageId::STANDARD {
            record.set_deadline(stage, Some(Deadline::hours(2.0)));
        }
        record
            .stages_a
            .push(StageA::new("Review", StagePosition::RiD).with_deadline(Deadline::new(
                30.0,
                TimeUnit::Minutes,
            )));

        let rows = build_stage_rows(&record);
        assert_eq!(rows.len(), 5);
        assert!(rows[0].previous_stage_id.is_none());
        assert_eq!(rows[1].stage_type_code, "A");
        assert_eq!(rows[1].previous_stage_id.as_deref(), Some(rows[0].id.as_str()));

        let ordered = order_chain(&record.id, &rows).unwrap();
        let mut rebuilt = ProcessRecord::new_template("T", Utc::now());
        apply_stages(&mut rebuilt, &ordered).unwrap();
        assert_eq!(rebuilt.stages_a, record.stages_a);
        assert_eq!(rebuilt.deadline_secs(&StageId::C), Some(7200.0));
    }
}
