//! ダッシュボード・チャート用の集計
//!
//! 描画に必要な値だけを計算し、表示形式は呼び出し側に任せる。

use crate::machine::{self, StageState};
use crate::model::{ProcessRecord, RecordKind, StageId, TimeMode};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;

/// エリア未設定レコードのグループ名
pub const UNASSIGNED_AREA: &str = "(エリア未設定)";

/// レコード全体の状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RecordStatus {
    NotStarted,
    InProgress,
    Overdue,
    Completed,
}

impl RecordStatus {
    pub const ALL: [RecordStatus; 4] = [
        RecordStatus::NotStarted,
        RecordStatus::InProgress,
        RecordStatus::Overdue,
        RecordStatus::Completed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RecordStatus::NotStarted => "not-started",
            RecordStatus::InProgress => "in-progress",
            RecordStatus::Overdue => "overdue",
            RecordStatus::Completed => "completed",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RecordStatus::NotStarted => "未開始",
            RecordStatus::InProgress => "進行中",
            RecordStatus::Overdue => "期限切れ",
            RecordStatus::Completed => "完了",
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub fn record_status(record: &ProcessRecord, now: DateTime<Utc>) -> RecordStatus {
    if record.completed {
        return RecordStatus::Completed;
    }
    let overdue = match record.time_mode {
        TimeMode::Simple => machine::is_overdue(record, &record.current_stage, now),
        TimeMode::Total => machine::is_total_overdue(record, now),
    };
    if overdue {
        RecordStatus::Overdue
    } else if record.started_at.is_some()
        || record.stage_timers.values().any(|t| t.running || t.elapsed > 0)
    {
        RecordStatus::InProgress
    } else {
        RecordStatus::NotStarted
    }
}

/// カンバンの1ステージ分
#[derive(Debug, Clone, PartialEq)]
pub struct StageCell {
    pub stage: StageId,
    pub state: StageState,
    pub elapsed: u64,
    pub deadline_secs: Option<f64>,
    pub overdue: bool,
}

/// レコードのステージ列 (実効シーケンス順)
pub fn stage_strip(record: &ProcessRecord, now: DateTime<Utc>) -> Vec<StageCell> {
    record
        .stage_sequence()
        .into_iter()
        .map(|stage| StageCell {
            state: machine::stage_state(record, &stage),
            elapsed: machine::elapsed_secs(record, &stage, now),
            deadline_secs: record.deadline_secs(&stage),
            overdue: machine::is_overdue(record, &stage, now),
            stage,
        })
        .collect()
}

/// ダッシュボードのカード
#[derive(Debug, Clone, PartialEq)]
pub struct RecordCard {
    pub id: String,
    pub title: String,
    pub area: String,
    pub kind: RecordKind,
    pub status: RecordStatus,
    pub progress: u8,
    pub current_stage: StageId,
    pub elapsed: u64,
    pub running: bool,
    /// 生成元テンプレートのタイトル
    pub template_title: Option<String>,
    /// 生成元テンプレートが削除されたオカレンス
    pub orphaned: bool,
}

impl RecordCard {
    pub fn build(record: &ProcessRecord, records: &[ProcessRecord], now: DateTime<Utc>) -> Self {
        let template = record
            .template_id
            .as_deref()
            .and_then(|id| records.iter().find(|r| r.id == id));
        Self {
            id: record.id.clone(),
            title: record.title.clone(),
            area: area_name(record).to_string(),
            kind: record.kind(),
            status: record_status(record, now),
            progress: machine::progress(record),
            current_stage: record.current_stage.clone(),
            elapsed: machine::elapsed_secs(record, &record.current_stage, now),
            running: machine::running_stage(record).is_some(),
            template_title: template.map(|t| t.title.clone()),
            orphaned: record.is_occurrence && template.is_none(),
        }
    }
}

fn area_name(record: &ProcessRecord) -> &str {
    let area = record.area.trim();
    if area.is_empty() { UNASSIGNED_AREA } else { area }
}

/// エリアごとのグループ
#[derive(Debug, Clone, PartialEq)]
pub struct AreaGroup {
    pub area: String,
    pub collapsed: bool,
    /// 折りたたみ中でも件数表示に使う
    pub total: usize,
    /// 折りたたみ中は空
    pub cards: Vec<RecordCard>,
}

/// エリアごとにカードをまとめる。未設定エリアは末尾
pub fn group_by_area(
    records: &[ProcessRecord],
    collapsed: &BTreeMap<String, bool>,
    now: DateTime<Utc>,
) -> Vec<AreaGroup> {
    let mut grouped: BTreeMap<&str, Vec<&ProcessRecord>> = BTreeMap::new();
    for record in records {
        grouped.entry(area_name(record)).or_default().push(record);
    }

    let unassigned = grouped.remove(UNASSIGNED_AREA);
    grouped
        .into_iter()
        .chain(unassigned.map(|r| (UNASSIGNED_AREA, r)))
        .map(|(area, members)| {
            let is_collapsed = collapsed.get(area).copied().unwrap_or(false);
            let cards = if is_collapsed {
                Vec::new()
            } else {
                members
                    .iter()
                    .map(|r| RecordCard::build(r, records, now))
                    .collect()
            };
            AreaGroup {
                area: area.to_string(),
                collapsed: is_collapsed,
                total: members.len(),
                cards,
            }
        })
        .collect()
}

/// カンバンの列
#[derive(Debug, Clone, PartialEq)]
pub struct KanbanColumn {
    /// None は完了列
    pub stage: Option<StageId>,
    pub cards: Vec<RecordCard>,
}

/// 現在ステージごとにオカレンスを並べる
pub fn kanban(records: &[ProcessRecord], now: DateTime<Utc>) -> Vec<KanbanColumn> {
    let mut columns: Vec<KanbanColumn> = StageId::STANDARD
        .into_iter()
        .map(|stage| KanbanColumn {
            stage: Some(stage),
            cards: Vec::new(),
        })
        .collect();
    let mut done = KanbanColumn {
        stage: None,
        cards: Vec::new(),
    };

    for record in records.iter().filter(|r| r.is_occurrence) {
        let card = RecordCard::build(record, records, now);
        if record.completed {
            done.cards.push(card);
            continue;
        }
        match columns
            .iter_mut()
            .find(|c| c.stage.as_ref() == Some(&record.current_stage))
        {
            Some(column) => column.cards.push(card),
            None => {
                // Stage A は出現順に列を追加
                columns.push(KanbanColumn {
                    stage: Some(record.current_stage.clone()),
                    cards: vec![card],
                });
            }
        }
    }
    columns.push(done);
    columns
}

/// サマリーカウンタ
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub templates: usize,
    pub occurrences: usize,
    pub running: usize,
    pub overdue: usize,
    pub completed: usize,
}

pub fn summary(records: &[ProcessRecord], now: DateTime<Utc>) -> Summary {
    let mut summary = Summary::default();
    for record in records {
        match record.kind() {
            RecordKind::Template => summary.templates += 1,
            RecordKind::Occurrence => summary.occurrences += 1,
        }
        if machine::running_stage(record).is_some() {
            summary.running += 1;
        }
        match record_status(record, now) {
            RecordStatus::Overdue => summary.overdue += 1,
            RecordStatus::Completed => summary.completed += 1,
            _ => {}
        }
    }
    summary
}

/// チャートの1系列分
#[derive(Debug, Clone, PartialEq)]
pub struct ChartPoint {
    pub label: String,
    pub value: f64,
}

impl ChartPoint {
    fn new(label: impl Into<String>, value: f64) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }
}

/// エリアごとのレコード数
pub fn count_by_area(records: &[ProcessRecord]) -> Vec<ChartPoint> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for record in records {
        *counts.entry(area_name(record)).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|(area, n)| ChartPoint::new(area, n as f64))
        .collect()
}

/// 状態ごとのレコード数 (0件の状態も含む)
pub fn count_by_status(records: &[ProcessRecord], now: DateTime<Utc>) -> Vec<ChartPoint> {
    let mut counts: BTreeMap<RecordStatus, usize> = BTreeMap::new();
    for record in records {
        *counts.entry(record_status(record, now)).or_default() += 1;
    }
    RecordStatus::ALL
        .into_iter()
        .map(|s| ChartPoint::new(s.label(), counts.get(&s).copied().unwrap_or(0) as f64))
        .collect()
}

/// エリアごとの作業時間合計 (時間)
pub fn time_by_area(records: &[ProcessRecord], now: DateTime<Utc>) -> Vec<ChartPoint> {
    let mut totals: BTreeMap<&str, u64> = BTreeMap::new();
    for record in records {
        *totals.entry(area_name(record)).or_default() += machine::worked_secs(record, now);
    }
    totals
        .into_iter()
        .map(|(area, secs)| ChartPoint::new(area, secs as f64 / 3600.0))
        .collect()
}

/// ステージごとの平均所要時間 (時間)。完了済みタイマーのみ対象
pub fn average_stage_time(records: &[ProcessRecord]) -> Vec<ChartPoint> {
    let mut totals: BTreeMap<StageId, (u64, u64)> = BTreeMap::new();
    for record in records {
        for (stage, timer) in &record.stage_timers {
            if timer.completed {
                let entry = totals.entry(stage.clone()).or_default();
                entry.0 += timer.elapsed;
                entry.1 += 1;
            }
        }
    }
    // 標準ステージを先に、Stage A は名前順
    let mut ordered: Vec<(StageId, (u64, u64))> = StageId::STANDARD
        .iter()
        .filter_map(|s| totals.remove(s).map(|t| (s.clone(), t)))
        .collect();
    ordered.extend(totals);
    ordered
        .into_iter()
        .map(|(stage, (secs, n))| {
            ChartPoint::new(stage.to_string(), secs as f64 / n as f64 / 3600.0)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Deadline, StageTimer};

    fn record(title: &str, area: &str) -> ProcessRecord {
        let mut record = ProcessRecord::new_template(title, Utc::now());
        record.area = area.to_string();
        for stage in StageId::STANDARD {
            record.set_deadline(stage, Some(Deadline::hours(1.0)));
        }
        record
    }

    fn completed_timer(elapsed: u64) -> StageTimer {
        StageTimer {
            elapsed,
            completed: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_group_by_area_honours_collapsed() {
        let records = vec![record("a", "RH"), record("b", ""), record("c", "Compras")];
        let mut collapsed = BTreeMap::new();
        collapsed.insert("RH".to_string(), true);

        let groups = group_by_area(&records, &collapsed, Utc::now());
        let names: Vec<_> = groups.iter().map(|g| g.area.as_str()).collect();
        assert_eq!(names, vec!["Compras", "RH", UNASSIGNED_AREA]);
        assert!(groups[1].collapsed);
        assert!(groups[1].cards.is_empty());
        assert_eq!(groups[1].total, 1);
        assert_eq!(groups[0].cards.len(), 1);
    }

    #[test]
    fn test_orphaned_occurrence_is_flagged() {
        let mut occurrence = record("X #1", "RH");
        occurrence.is_occurrence = true;
        occurrence.template_id = Some("deleted".into());
        let card = RecordCard::build(&occurrence, &[], Utc::now());
        assert!(card.orphaned);
        assert_eq!(card.template_title, None);
    }

    #[test]
    fn test_status_and_summary() {
        let now = Utc::now();
        let idle = record("idle", "RH");
        let mut late = record("late", "RH");
        late.stage_timers.insert(StageId::Ri, StageTimer { elapsed: 4000, ..Default::default() });
        let mut done = record("done", "RH");
        done.completed = true;

        assert_eq!(record_status(&idle, now), RecordStatus::NotStarted);
        assert_eq!(record_status(&late, now), RecordStatus::Overdue);
        assert_eq!(record_status(&done, now), RecordStatus::Completed);

        let s = summary(&[idle, late, done], now);
        assert_eq!(s.templates, 3);
        assert_eq!(s.overdue, 1);
        assert_eq!(s.completed, 1);
        assert_eq!(s.running, 0);
    }

    #[test]
    fn test_stage_strip_states() {
        let now = Utc::now();
        let mut r = record("r", "RH");
        r.stage_timers.insert(StageId::Ri, completed_timer(100));
        r.stage_timers.insert(
            StageId::D,
            StageTimer {
                running: true,
                start_time: Some(now),
                ..Default::default()
            },
        );
        let strip = stage_strip(&r, now);
        let states: Vec<_> = strip.iter().map(|c| c.state).collect();
        assert_eq!(
            states,
            vec![
                StageState::Completed,
                StageState::Running,
                StageState::Pending,
                StageState::Pending
            ]
        );
    }

    #[test]
    fn test_kanban_places_occurrences_by_current_stage() {
        let now = Utc::now();
        let template = record("t", "RH");
        let mut at_d = record("t #1", "RH");
        at_d.is_occurrence = true;
        at_d.current_stage = StageId::D;
        let mut at_review = record("t #2", "RH");
        at_review.is_occurrence = true;
        at_review.current_stage = StageId::Custom("Review".into());
        let mut finished = record("t #3", "RH");
        finished.is_occurrence = true;
        finished.completed = true;

        let columns = kanban(&[template, at_d, at_review, finished], now);
        assert_eq!(columns.len(), 6);
        assert_eq!(columns[1].cards.len(), 1);
        assert_eq!(columns[4].stage, Some(StageId::Custom("Review".into())));
        assert_eq!(columns[5].stage, None);
        assert_eq!(columns[5].cards.len(), 1);
    }

    #[test]
    fn test_chart_aggregations() {
        let now = Utc::now();
        let mut a = record("a", "RH");
        a.stage_timers.insert(StageId::Ri, completed_timer(3600));
        let mut b = record("b", "RH");
        b.stage_timers.insert(StageId::Ri, completed_timer(7200));
        b.stage_timers.insert(StageId::Custom("QA".into()), completed_timer(1800));
        let c = record("c", "Compras");
        let records = vec![a, b, c];

        let by_area = count_by_area(&records);
        assert_eq!(by_area[0], ChartPoint::new("Compras", 1.0));
        assert_eq!(by_area[1], ChartPoint::new("RH", 2.0));

        let time = time_by_area(&records, now);
        assert_eq!(time[1].value, 3.5);

        let avg = average_stage_time(&records);
        assert_eq!(avg[0], ChartPoint::new("RI", 1.5));
        assert_eq!(avg[1], ChartPoint::new("QA", 0.5));

        let status = count_by_status(&records, now);
        assert_eq!(status.len(), 4);
        assert_eq!(status.iter().map(|p| p.value).sum::<f64>(), 3.0);
    }
}
