//! アプリケーション状態
//!
//! メモリ上のレコード一覧を所有し、変更操作はすべてここを経由する。
//! 各操作は永続化すべき差分を [`ChangeSet`] として返す。

use crate::error::{Result, RidecError};
use crate::form::{FormWizard, TemplateDraft};
use crate::machine::{self, StageTransition};
use crate::model::{ProcessRecord, RecordKind, Relations, StageId};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

/// 永続化が必要な差分
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub created: Vec<String>,
    pub updated: Vec<String>,
    /// 削除したレコード (ホスト型では種別でテーブルが変わる)
    pub deleted: Vec<(String, RecordKind)>,
}

impl ChangeSet {
    pub fn created(id: impl Into<String>) -> Self {
        Self {
            created: vec![id.into()],
            ..Default::default()
        }
    }

    pub fn updated(id: impl Into<String>) -> Self {
        Self {
            updated: vec![id.into()],
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    pub fn merge(&mut self, other: ChangeSet) {
        self.created.extend(other.created);
        self.updated.extend(other.updated);
        self.deleted.extend(other.deleted);
    }
}

/// 削除結果
#[derive(Debug, Clone)]
pub struct Deletion {
    pub removed: ProcessRecord,
    /// リレーションを外されたレコード
    pub detached: Vec<String>,
    pub changes: ChangeSet,
}

/// レコード一覧 (アプリケーション状態)
#[derive(Debug, Clone, Default)]
pub struct RecordBook {
    records: Vec<ProcessRecord>,
}

impl RecordBook {
    pub fn new(records: Vec<ProcessRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[ProcessRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<ProcessRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&ProcessRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn require(&self, id: &str) -> Result<&ProcessRecord> {
        self.get(id)
            .ok_or_else(|| RidecError::RecordNotFound(id.to_string()))
    }

    fn require_mut(&mut self, id: &str) -> Result<&mut ProcessRecord> {
        self.records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| RidecError::RecordNotFound(id.to_string()))
    }

    /// IDの前方一致でレコードを解決する (CLIでの短縮ID入力用)
    pub fn resolve(&self, id_or_prefix: &str) -> Result<&ProcessRecord> {
        if let Some(exact) = self.get(id_or_prefix) {
            return Ok(exact);
        }
        let matches: Vec<_> = self
            .records
            .iter()
            .filter(|r| r.id.starts_with(id_or_prefix))
            .collect();
        match matches.as_slice() {
            [single] => Ok(single),
            [] => Err(RidecError::RecordNotFound(id_or_prefix.to_string())),
            _ => Err(RidecError::InvalidValue(format!(
                "ID '{}' に一致するレコードが複数あります",
                id_or_prefix
            ))),
        }
    }

    pub fn templates(&self) -> impl Iterator<Item = &ProcessRecord> {
        self.records.iter().filter(|r| r.is_template())
    }

    pub fn occurrences(&self) -> impl Iterator<Item = &ProcessRecord> {
        self.records.iter().filter(|r| r.is_occurrence)
    }

    pub fn occurrences_of<'a>(
        &'a self,
        template_id: &'a str,
    ) -> impl Iterator<Item = &'a ProcessRecord> + 'a {
        self.occurrences()
            .filter(move |r| r.template_id.as_deref() == Some(template_id))
    }

    /// フォームの全ステップを検証してテンプレートを追加
    pub fn create_template(&mut self, draft: TemplateDraft, now: DateTime<Utc>) -> Result<String> {
        let mut wizard = FormWizard::new(draft);
        wizard
            .run_to_end(&self.records)
            .map_err(|(_, e)| RidecError::Validation(e))?;
        let record = wizard.draft.into_record(now);
        let id = record.id.clone();
        info!(id = %id, title = %record.title, "Template created");
        self.records.push(record);
        Ok(id)
    }

    /// テンプレートの設定を更新 (既存オカレンスには影響しない)
    pub fn update_template(
        &mut self,
        id: &str,
        draft: TemplateDraft,
        now: DateTime<Utc>,
    ) -> Result<ChangeSet> {
        let record = self.require(id)?;
        if record.is_occurrence {
            return Err(RidecError::NotATemplate(id.to_string()));
        }
        draft
            .validate_all(&self.records, Some(id))
            .map_err(RidecError::Validation)?;

        let record = self.require_mut(id)?;
        let sequence_before = record.stage_sequence();
        draft.apply_to(record);
        // 削除された Stage A のタイマーは残さない
        let sequence = record.stage_sequence();
        if sequence != sequence_before {
            record
                .stage_timers
                .retain(|stage, _| sequence.contains(stage));
            if !sequence.contains(&record.current_stage) {
                record.current_stage = machine::first_open_stage(record);
            }
        }
        record.touch(now);
        Ok(ChangeSet::updated(id))
    }

    /// リレーションだけを更新
    pub fn set_relations(
        &mut self,
        id: &str,
        relations: Relations,
        now: DateTime<Utc>,
    ) -> Result<ChangeSet> {
        let record = self.require(id)?;
        if record.is_occurrence {
            return Err(RidecError::NotATemplate(id.to_string()));
        }
        if relations.start.is_some() && relations.start == relations.end {
            return Err(RidecError::InvalidRelation(
                "先行と後続に同じテンプレートは指定できません".to_string(),
            ));
        }
        for target in [&relations.start, &relations.end].into_iter().flatten() {
            if target == id {
                return Err(RidecError::InvalidRelation(
                    "自分自身は指定できません".to_string(),
                ));
            }
            let target_record = self.require(target)?;
            if target_record.is_occurrence {
                return Err(RidecError::InvalidRelation(format!(
                    "'{}' はオカレンスです。テンプレートのみ指定できます",
                    target
                )));
            }
        }
        let record = self.require_mut(id)?;
        record.relations = relations;
        record.touch(now);
        Ok(ChangeSet::updated(id))
    }

    /// テンプレートからオカレンスを生成
    ///
    /// 生成時点のテンプレート設定を複製し、その後は独立して変化する。
    pub fn create_occurrence(&mut self, template_id: &str, now: DateTime<Utc>) -> Result<String> {
        let template = self.require(template_id)?;
        if template.is_occurrence {
            return Err(RidecError::NotATemplate(template_id.to_string()));
        }
        let number = self.occurrences_of(template_id).count() + 1;

        let mut occurrence = template.clone();
        occurrence.id = uuid::Uuid::new_v4().to_string();
        occurrence.title = format!("{} #{}", template.title, number);
        occurrence.is_occurrence = true;
        occurrence.template_id = Some(template_id.to_string());
        occurrence.relations = Relations::default();
        occurrence.created_at = now;
        occurrence.updated_at = None;
        machine::reset_timers(&mut occurrence);

        let id = occurrence.id.clone();
        info!(id = %id, template = %template_id, "Occurrence created");
        self.records.push(occurrence);
        Ok(id)
    }

    /// レコードを削除
    ///
    /// テンプレートを削除した場合、他レコードのリレーション参照は null にする
    /// (カスケード削除はしない)。
    pub fn delete(&mut self, id: &str) -> Result<Deletion> {
        let index = self
            .records
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| RidecError::RecordNotFound(id.to_string()))?;
        let removed = self.records.remove(index);

        let mut detached = Vec::new();
        if removed.is_template() {
            for record in &mut self.records {
                if record.relations.detach(id) {
                    debug!(record = %record.id, removed = %id, "Relation detached");
                    detached.push(record.id.clone());
                }
            }
        }
        info!(id = %id, detached = detached.len(), "Record deleted");

        let changes = ChangeSet {
            created: Vec::new(),
            updated: detached.clone(),
            deleted: vec![(id.to_string(), removed.kind())],
        };
        Ok(Deletion {
            removed,
            detached,
            changes,
        })
    }

    pub fn start_stage(
        &mut self,
        id: &str,
        stage: &StageId,
        now: DateTime<Utc>,
    ) -> Result<StageTransition> {
        let record = self.require_mut(id)?;
        machine::start_stage(record, stage, now)
    }

    pub fn finish_stage(
        &mut self,
        id: &str,
        stage: &StageId,
        now: DateTime<Utc>,
    ) -> Result<StageTransition> {
        let record = self.require_mut(id)?;
        machine::finish_stage(record, stage, now)
    }

    pub fn pause_stage(
        &mut self,
        id: &str,
        stage: &StageId,
        now: DateTime<Utc>,
    ) -> Result<StageTransition> {
        let record = self.require_mut(id)?;
        machine::pause_stage(record, stage, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Deadline, StageA, StagePosition};

    fn draft(title: &str) -> TemplateDraft {
        let mut draft = TemplateDraft {
            title: title.into(),
            area: "Operações".into(),
            ..Default::default()
        };
        for stage in StageId::STANDARD {
            draft.deadlines.insert(stage, Deadline::hours(1.0));
        }
        draft
    }

    #[test]
    fn test_create_template_rejects_invalid_draft() {
        let mut book = RecordBook::default();
        let err = book
            .create_template(TemplateDraft::default(), Utc::now())
            .unwrap_err();
        assert!(matches!(err, RidecError::Validation(_)));
        assert!(book.is_empty());
    }

    #[test]
    fn test_occurrence_clones_template_configuration() {
        let mut book = RecordBook::default();
        let mut d = draft("Compras");
        d.stages_a.push(StageA::new("Review", StagePosition::DE));
        let template_id = book.create_template(d, Utc::now()).unwrap();

        let occurrence_id = book.create_occurrence(&template_id, Utc::now()).unwrap();
        let occurrence = book.get(&occurrence_id).unwrap();
        assert!(occurrence.is_occurrence);
        assert_eq!(occurrence.title, "Compras #1");
        assert_eq!(occurrence.template_id.as_deref(), Some(template_id.as_str()));
        let names: Vec<_> = occurrence
            .stage_sequence()
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(names, vec!["RI", "D", "Review", "E", "C"]);
        assert_eq!(occurrence.stage_timers.len(), 5);

        let second = book.create_occurrence(&template_id, Utc::now()).unwrap();
        assert_eq!(book.get(&second).unwrap().title, "Compras #2");
    }

    #[test]
    fn test_occurrence_evolves_independently() {
        let mut book = RecordBook::default();
        let template_id = book.create_template(draft("A"), Utc::now()).unwrap();
        let occurrence_id = book.create_occurrence(&template_id, Utc::now()).unwrap();

        let mut edited = draft("A v2");
        edited.deadlines.insert(StageId::Ri, Deadline::hours(9.0));
        book.update_template(&template_id, edited, Utc::now()).unwrap();

        let occurrence = book.get(&occurrence_id).unwrap();
        assert_eq!(occurrence.deadline_secs(&StageId::Ri), Some(3600.0));
        assert_eq!(occurrence.title, "A #1");
    }

    #[test]
    fn test_cannot_create_occurrence_from_occurrence() {
        let mut book = RecordBook::default();
        let template_id = book.create_template(draft("A"), Utc::now()).unwrap();
        let occurrence_id = book.create_occurrence(&template_id, Utc::now()).unwrap();
        let err = book.create_occurrence(&occurrence_id, Utc::now()).unwrap_err();
        assert!(matches!(err, RidecError::NotATemplate(_)));
    }

    #[test]
    fn test_delete_template_detaches_relations() {
        let mut book = RecordBook::default();
        let a = book.create_template(draft("A"), Utc::now()).unwrap();
        let b = book.create_template(draft("B"), Utc::now()).unwrap();
        let c = book.create_template(draft("C"), Utc::now()).unwrap();
        book.set_relations(
            &b,
            Relations {
                start: Some(a.clone()),
                end: Some(c.clone()),
            },
            Utc::now(),
        )
        .unwrap();
        book.set_relations(
            &c,
            Relations {
                start: Some(a.clone()),
                end: None,
            },
            Utc::now(),
        )
        .unwrap();
        let occurrence = book.create_occurrence(&a, Utc::now()).unwrap();

        let deletion = book.delete(&a).unwrap();
        assert_eq!(
            deletion.changes.deleted,
            vec![(a.clone(), RecordKind::Template)]
        );
        assert_eq!(deletion.detached.len(), 2);
        assert!(book.records().iter().all(|r| !r.relations.references(&a)));
        assert_eq!(book.get(&b).unwrap().relations.end.as_deref(), Some(c.as_str()));
        // オカレンスはカスケード削除されない
        assert!(book.get(&occurrence).is_some());
    }

    #[test]
    fn test_relations_reject_occurrences_and_self() {
        let mut book = RecordBook::default();
        let a = book.create_template(draft("A"), Utc::now()).unwrap();
        let occurrence = book.create_occurrence(&a, Utc::now()).unwrap();

        let err = book
            .set_relations(
                &a,
                Relations {
                    start: Some(occurrence.clone()),
                    end: None,
                },
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, RidecError::InvalidRelation(_)));

        let err = book
            .set_relations(
                &a,
                Relations {
                    start: None,
                    end: Some(a.clone()),
                },
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, RidecError::InvalidRelation(_)));
    }

    #[test]
    fn test_relations_reject_same_start_and_end() {
        let mut book = RecordBook::default();
        let a = book.create_template(draft("A"), Utc::now()).unwrap();
        let b = book.create_template(draft("B"), Utc::now()).unwrap();

        let err = book
            .set_relations(
                &a,
                Relations {
                    start: Some(b.clone()),
                    end: Some(b.clone()),
                },
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, RidecError::InvalidRelation(_)));
        assert_eq!(book.get(&a).unwrap().relations, Relations::default());
    }

    #[test]
    fn test_update_removes_timers_of_dropped_stage_a() {
        let mut book = RecordBook::default();
        let mut d = draft("A");
        d.stages_a.push(StageA::new("QA", StagePosition::EC));
        let id = book.create_template(d, Utc::now()).unwrap();
        book.start_stage(&id, &StageId::Ri, Utc::now()).unwrap();
        book.finish_stage(&id, &StageId::Ri, Utc::now()).unwrap();

        let qa = StageId::Custom("QA".into());
        book.start_stage(&id, &StageId::D, Utc::now()).unwrap();
        book.finish_stage(&id, &StageId::D, Utc::now()).unwrap();
        book.start_stage(&id, &StageId::E, Utc::now()).unwrap();
        book.finish_stage(&id, &StageId::E, Utc::now()).unwrap();
        assert_eq!(book.get(&id).unwrap().current_stage, qa);

        book.update_template(&id, draft("A"), Utc::now()).unwrap();
        let record = book.get(&id).unwrap();
        assert!(!record.stage_timers.contains_key(&qa));
        assert_eq!(record.current_stage, StageId::C);
    }

    #[test]
    fn test_resolve_by_prefix() {
        let mut book = RecordBook::default();
        let id = book.create_template(draft("A"), Utc::now()).unwrap();
        assert_eq!(book.resolve(&id[..8]).unwrap().id, id);
        assert!(book.resolve("zzzz-not-an-id").is_err());
    }
}
