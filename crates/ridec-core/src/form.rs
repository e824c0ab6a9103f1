//! テンプレート作成フォーム (多段ステップ)
//!
//! 各ステップで必須項目と範囲のみを検証し、失敗したステップからは先に進めない。
//! ステップ: 基本情報 → 時間設定 → カスタムステージ → リレーション

use crate::model::{
    Deadline, Integrations, ProcessRecord, Relations, StageA, StageId, TimeMode,
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// タイトルの最大文字数
pub const MAX_TITLE_LEN: usize = 120;

/// 期限値の上限 (単位に関わらず)
pub const MAX_DEADLINE_VALUE: f64 = 10_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FormStep {
    Basics,
    Timing,
    CustomStages,
    Relations,
}

impl FormStep {
    pub const ALL: [FormStep; 4] = [
        FormStep::Basics,
        FormStep::Timing,
        FormStep::CustomStages,
        FormStep::Relations,
    ];

    pub fn next(self) -> Option<FormStep> {
        let index = FormStep::ALL.iter().position(|s| *s == self)?;
        FormStep::ALL.get(index + 1).copied()
    }

    pub fn previous(self) -> Option<FormStep> {
        let index = FormStep::ALL.iter().position(|s| *s == self)?;
        index.checked_sub(1).map(|i| FormStep::ALL[i])
    }

    pub fn label(self) -> &'static str {
        match self {
            FormStep::Basics => "基本情報",
            FormStep::Timing => "時間設定",
            FormStep::CustomStages => "カスタムステージ",
            FormStep::Relations => "リレーション",
        }
    }
}

/// フィールド単位の入力エラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    fn into_result(self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "  - {}: {}", error.field, error.message)?;
        }
        Ok(())
    }
}

/// テンプレートの入力内容
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateDraft {
    pub title: String,
    pub description: String,
    pub area: String,
    pub time_mode: TimeMode,
    pub max_time: Option<Deadline>,
    /// 標準ステージの期限
    pub deadlines: BTreeMap<StageId, Deadline>,
    pub stages_a: Vec<StageA>,
    pub relations: Relations,
    pub integrations: Integrations,
}

impl TemplateDraft {
    /// 既存テンプレートから編集用の下書きを作る
    pub fn from_record(record: &ProcessRecord) -> Self {
        let deadlines = StageId::STANDARD
            .into_iter()
            .filter_map(|stage| {
                let value = record.deadlines.get(&stage).copied().flatten()?;
                let unit = record.deadline_units.get(&stage).copied().unwrap_or_default();
                Some((stage, Deadline::new(value, unit)))
            })
            .collect();
        Self {
            title: record.title.clone(),
            description: record.description.clone(),
            area: record.area.clone(),
            time_mode: record.time_mode,
            max_time: record.max_time,
            deadlines,
            stages_a: record.stages_a.clone(),
            relations: record.relations.clone(),
            integrations: record.integrations.clone(),
        }
    }

    /// ステップ単位の検証
    ///
    /// `records` はリレーション先の存在確認に使う。`editing` は編集中レコードのID。
    pub fn validate_step(
        &self,
        step: FormStep,
        records: &[ProcessRecord],
        editing: Option<&str>,
    ) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        match step {
            FormStep::Basics => self.validate_basics(&mut errors),
            FormStep::Timing => self.validate_timing(&mut errors),
            FormStep::CustomStages => self.validate_stages_a(&mut errors),
            FormStep::Relations => self.validate_relations(records, editing, &mut errors),
        }
        errors.into_result()
    }

    /// 全ステップをまとめて検証
    pub fn validate_all(
        &self,
        records: &[ProcessRecord],
        editing: Option<&str>,
    ) -> Result<(), ValidationErrors> {
        let mut all = ValidationErrors::default();
        for step in FormStep::ALL {
            if let Err(e) = self.validate_step(step, records, editing) {
                all.errors.extend(e.errors);
            }
        }
        all.into_result()
    }

    fn validate_basics(&self, errors: &mut ValidationErrors) {
        let title = self.title.trim();
        if title.is_empty() {
            errors.push("title", "タイトルは必須です");
        } else if title.chars().count() > MAX_TITLE_LEN {
            errors.push(
                "title",
                format!("タイトルは{}文字以内で入力してください", MAX_TITLE_LEN),
            );
        }
        if self.area.trim().is_empty() {
            errors.push("area", "エリアは必須です");
        }
    }

    fn validate_timing(&self, errors: &mut ValidationErrors) {
        match self.time_mode {
            TimeMode::Simple => {
                for stage in StageId::STANDARD {
                    let field = format!("deadlines.{}", stage);
                    match self.deadlines.get(&stage) {
                        None => errors.push(field, "期限を入力してください"),
                        Some(d) => check_range(&field, d, errors),
                    }
                }
            }
            TimeMode::Total => match &self.max_time {
                None => errors.push("maxTime", "合計時間を入力してください"),
                Some(d) => check_range("maxTime", d, errors),
            },
        }
    }

    fn validate_stages_a(&self, errors: &mut ValidationErrors) {
        let mut seen = HashSet::new();
        for (i, stage) in self.stages_a.iter().enumerate() {
            let field = format!("stagesA[{}].identifier", i);
            let identifier = stage.identifier.trim();
            if identifier.is_empty() {
                errors.push(field, "識別子は必須です");
                continue;
            }
            if StageId::is_reserved(identifier) {
                errors.push(field, format!("'{}' は標準ステージ名のため使用できません", identifier));
                continue;
            }
            if !seen.insert(identifier.to_lowercase()) {
                errors.push(field, format!("識別子 '{}' が重複しています", identifier));
            }
            if let Some(value) = stage.deadline {
                let deadline = Deadline::new(value, stage.deadline_unit);
                check_range(&format!("stagesA[{}].deadline", i), &deadline, errors);
            }
        }
    }

    fn validate_relations(
        &self,
        records: &[ProcessRecord],
        editing: Option<&str>,
        errors: &mut ValidationErrors,
    ) {
        for (field, target) in [
            ("relations.start", &self.relations.start),
            ("relations.end", &self.relations.end),
        ] {
            let Some(target) = target else { continue };
            if Some(target.as_str()) == editing {
                errors.push(field, "自分自身は指定できません");
                continue;
            }
            match records.iter().find(|r| &r.id == target) {
                None => errors.push(field, format!("テンプレート '{}' が見つかりません", target)),
                Some(r) if r.is_occurrence => {
                    errors.push(field, "オカレンスはリレーション先に指定できません")
                }
                Some(_) => {}
            }
        }
        if self.relations.start.is_some() && self.relations.start == self.relations.end {
            errors.push("relations.end", "先行と後続に同じテンプレートは指定できません");
        }
    }

    /// 検証済みの下書きをレコードに反映する (timers は触らない)
    pub fn apply_to(&self, record: &mut ProcessRecord) {
        record.title = self.title.trim().to_string();
        record.description = self.description.trim().to_string();
        record.area = self.area.trim().to_string();
        record.time_mode = self.time_mode;
        record.max_time = match self.time_mode {
            TimeMode::Total => self.max_time,
            TimeMode::Simple => None,
        };
        record.deadlines.clear();
        record.deadline_units.clear();
        for stage in StageId::STANDARD {
            let deadline = match self.time_mode {
                TimeMode::Simple => self.deadlines.get(&stage).copied(),
                TimeMode::Total => None,
            };
            record.set_deadline(stage, deadline);
        }
        record.stages_a = self
            .stages_a
            .iter()
            .cloned()
            .map(|mut a| {
                a.identifier = a.identifier.trim().to_string();
                a
            })
            .collect();
        record.relations = self.relations.clone();
        record.integrations = self.integrations.clone();
    }

    /// 新しいテンプレートを生成
    pub fn into_record(&self, now: DateTime<Utc>) -> ProcessRecord {
        let mut record = ProcessRecord::new_template(self.title.trim(), now);
        self.apply_to(&mut record);
        record
    }
}

fn check_range(field: &str, deadline: &Deadline, errors: &mut ValidationErrors) {
    if !deadline.value.is_finite() || deadline.value <= 0.0 {
        errors.push(field, "0より大きい値を入力してください");
    } else if deadline.value > MAX_DEADLINE_VALUE {
        errors.push(
            field,
            format!("{}以下の値を入力してください", MAX_DEADLINE_VALUE),
        );
    }
}

/// 多段フォームの進行状態
#[derive(Debug, Clone)]
pub struct FormWizard {
    pub draft: TemplateDraft,
    step: FormStep,
    editing: Option<String>,
}

impl FormWizard {
    pub fn new(draft: TemplateDraft) -> Self {
        Self {
            draft,
            step: FormStep::Basics,
            editing: None,
        }
    }

    /// 既存テンプレートの編集
    pub fn edit(record: &ProcessRecord) -> Self {
        Self {
            draft: TemplateDraft::from_record(record),
            step: FormStep::Basics,
            editing: Some(record.id.clone()),
        }
    }

    pub fn step(&self) -> FormStep {
        self.step
    }

    pub fn editing(&self) -> Option<&str> {
        self.editing.as_deref()
    }

    /// 現在のステップを検証して次へ進む
    ///
    /// 最終ステップを通過したら `Ok(None)` を返す。
    pub fn advance(
        &mut self,
        records: &[ProcessRecord],
    ) -> Result<Option<FormStep>, ValidationErrors> {
        self.draft
            .validate_step(self.step, records, self.editing.as_deref())?;
        match self.step.next() {
            Some(next) => {
                self.step = next;
                Ok(Some(next))
            }
            None => Ok(None),
        }
    }

    pub fn back(&mut self) -> FormStep {
        if let Some(previous) = self.step.previous() {
            self.step = previous;
        }
        self.step
    }

    /// 全ステップを順に通過させる。失敗したステップで止まる
    pub fn run_to_end(
        &mut self,
        records: &[ProcessRecord],
    ) -> Result<(), (FormStep, ValidationErrors)> {
        loop {
            let step = self.step;
            match self.advance(records) {
                Ok(Some(_)) => continue,
                Ok(None) => return Ok(()),
                Err(e) => return Err((step, e)),
            }
        }
    }
}
