//! プロセスレコード (RIDEC) 定義

use super::deadline::{Deadline, TimeMode, TimeUnit};
use super::stage::{StageA, StageId, build_sequence};
use super::timer::StageTimer;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 連携トリガー → 有効フラグ
pub type TriggerMap = BTreeMap<String, bool>;

/// ステージ → 外部システム → トリガー → 有効フラグ
pub type Integrations = BTreeMap<StageId, BTreeMap<String, TriggerMap>>;

/// ProcessRecord - テンプレート (モデル) またはオカレンス (実行インスタンス)
///
/// 永続化フォーマットは camelCase の JSON。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRecord {
    /// 作成時に生成される一意なID (変更不可)
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub area: String,
    /// true ならオカレンス、false ならテンプレート
    #[serde(default)]
    pub is_occurrence: bool,
    /// オカレンスの生成元テンプレート
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    #[serde(default = "default_stage")]
    pub current_stage: StageId,
    #[serde(default)]
    pub time_mode: TimeMode,
    /// total モードでの合計期限
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_time: Option<Deadline>,
    /// 標準ステージの期限値 (null 可)
    #[serde(default)]
    pub deadlines: BTreeMap<StageId, Option<f64>>,
    #[serde(default)]
    pub deadline_units: BTreeMap<StageId, TimeUnit>,
    #[serde(default)]
    pub stage_timers: BTreeMap<StageId, StageTimer>,
    #[serde(default, rename = "stagesA")]
    pub stages_a: Vec<StageA>,
    #[serde(default)]
    pub relations: Relations,
    /// RI が最初に開始された時刻
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub integrations: Integrations,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_stage() -> StageId {
    StageId::Ri
}

impl ProcessRecord {
    /// 空のテンプレートを作成
    pub fn new_template(title: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            description: String::new(),
            area: String::new(),
            is_occurrence: false,
            template_id: None,
            current_stage: StageId::Ri,
            time_mode: TimeMode::Simple,
            max_time: None,
            deadlines: BTreeMap::new(),
            deadline_units: BTreeMap::new(),
            stage_timers: BTreeMap::new(),
            stages_a: Vec::new(),
            relations: Relations::default(),
            started_at: None,
            completed: false,
            completed_at: None,
            integrations: Integrations::new(),
            created_at: now,
            updated_at: None,
        }
    }

    pub fn is_template(&self) -> bool {
        !self.is_occurrence
    }

    pub fn kind(&self) -> RecordKind {
        if self.is_occurrence {
            RecordKind::Occurrence
        } else {
            RecordKind::Template
        }
    }

    /// 標準ステージ + Stage A の実効シーケンス
    pub fn stage_sequence(&self) -> Vec<StageId> {
        build_sequence(&self.stages_a)
    }

    pub fn has_stage(&self, stage: &StageId) -> bool {
        match stage {
            StageId::Custom(id) => self.stages_a.iter().any(|a| &a.identifier == id),
            _ => true,
        }
    }

    pub fn stage_a(&self, identifier: &str) -> Option<&StageA> {
        self.stages_a.iter().find(|a| a.identifier == identifier)
    }

    /// 標準ステージの期限を設定
    pub fn set_deadline(&mut self, stage: StageId, deadline: Option<Deadline>) {
        match deadline {
            Some(d) => {
                self.deadlines.insert(stage.clone(), Some(d.value));
                self.deadline_units.insert(stage, d.unit);
            }
            None => {
                self.deadlines.insert(stage.clone(), None);
                self.deadline_units.remove(&stage);
            }
        }
    }

    /// ステージの期限 (値 + 単位)
    ///
    /// total モードではステージ単位の期限は無視される。
    pub fn deadline(&self, stage: &StageId) -> Option<Deadline> {
        if self.time_mode == TimeMode::Total {
            return None;
        }
        match stage {
            StageId::Custom(id) => self
                .stage_a(id)
                .and_then(|a| a.deadline.map(|v| Deadline::new(v, a.deadline_unit))),
            standard => self.deadlines.get(standard).copied().flatten().map(|v| {
                let unit = self.deadline_units.get(standard).copied().unwrap_or_default();
                Deadline::new(v, unit)
            }),
        }
    }

    pub fn deadline_secs(&self, stage: &StageId) -> Option<f64> {
        self.deadline(stage).map(|d| d.in_seconds())
    }

    pub fn timer(&self, stage: &StageId) -> Option<&StageTimer> {
        self.stage_timers.get(stage)
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = Some(now);
    }
}

/// レコード種別
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Template,
    Occurrence,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Template => write!(f, "template"),
            RecordKind::Occurrence => write!(f, "occurrence"),
        }
    }
}

/// テンプレート間の前後関係
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relations {
    /// 先行テンプレートID
    #[serde(default)]
    pub start: Option<String>,
    /// 後続テンプレートID
    #[serde(default)]
    pub end: Option<String>,
}

impl Relations {
    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    pub fn references(&self, id: &str) -> bool {
        self.start.as_deref() == Some(id) || self.end.as_deref() == Some(id)
    }

    /// 指定IDへの参照を外す。変更があれば true
    pub fn detach(&mut self, id: &str) -> bool {
        let mut changed = false;
        if self.start.as_deref() == Some(id) {
            self.start = None;
            changed = true;
        }
        if self.end.as_deref() == Some(id) {
            self.end = None;
            changed = true;
        }
        changed
    }
}

/// 連携トリガー
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrationTrigger {
    Start,
    Finish,
}

impl IntegrationTrigger {
    pub fn as_str(self) -> &'static str {
        match self {
            IntegrationTrigger::Start => "start",
            IntegrationTrigger::Finish => "finish",
        }
    }
}

/// 指定ステージ・トリガーで有効になっている外部システム名
pub fn triggered_systems(
    integrations: &Integrations,
    stage: &StageId,
    trigger: IntegrationTrigger,
) -> Vec<String> {
    integrations
        .get(stage)
        .map(|systems| {
            systems
                .iter()
                .filter(|(_, triggers)| {
                    triggers.get(trigger.as_str()).copied().unwrap_or(false)
                })
                .map(|(system, _)| system.clone())
                .collect()
        })
        .unwrap_or_default()
}
