//! ステージタイマーの状態遷移
//!
//! ステージごとの状態は `pending → running → completed` の線形遷移。
//! 期限切れ (overdue) は独立した状態ではなく、いつでも計算できる判定として扱う。
//!
//! すべての操作は現在時刻 `now` を引数に取り、副作用はレコード内に閉じる。

use crate::error::{Result, RidecError};
use crate::model::{ProcessRecord, StageId, StageTimer};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

/// ステージの表示用状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    Pending,
    Running,
    /// 一度開始されたが一時停止中
    Paused,
    Completed,
}

impl StageState {
    pub fn as_str(self) -> &'static str {
        match self {
            StageState::Pending => "pending",
            StageState::Running => "running",
            StageState::Paused => "paused",
            StageState::Completed => "completed",
        }
    }
}

/// 状態遷移の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageTransition {
    /// ステージを開始した。`process_started` は RI の初回開始
    Started {
        stage: StageId,
        process_started: bool,
    },
    /// ステージを完了し、次のステージをアクティブにした (タイマーは未開始)
    Advanced { from: StageId, to: StageId },
    /// 最終ステージを完了し、プロセス全体が完了した
    ProcessCompleted { stage: StageId },
    /// 一時停止した
    Paused { stage: StageId, elapsed: u64 },
    /// 変化なし (完了済みステージへの finish など)
    Unchanged,
}

/// ステージの直前のステージ (先頭なら None)
pub fn predecessor(record: &ProcessRecord, stage: &StageId) -> Option<StageId> {
    let sequence = record.stage_sequence();
    let index = sequence.iter().position(|s| s == stage)?;
    index.checked_sub(1).map(|i| sequence[i].clone())
}

/// 最初の未完了ステージ。すべて完了済みなら最後のステージ
pub fn first_open_stage(record: &ProcessRecord) -> StageId {
    let sequence = record.stage_sequence();
    sequence
        .iter()
        .find(|s| !is_stage_completed(record, s))
        .or(sequence.last())
        .cloned()
        .unwrap_or(StageId::Ri)
}

/// ステージの直後のステージ (最終なら None)
pub fn next_stage(record: &ProcessRecord, stage: &StageId) -> Option<StageId> {
    let sequence = record.stage_sequence();
    let index = sequence.iter().position(|s| s == stage)?;
    sequence.get(index + 1).cloned()
}

/// 実行中のステージ
pub fn running_stage(record: &ProcessRecord) -> Option<&StageId> {
    record
        .stage_timers
        .iter()
        .find(|(_, timer)| timer.running)
        .map(|(stage, _)| stage)
}

pub fn is_stage_completed(record: &ProcessRecord, stage: &StageId) -> bool {
    record.timer(stage).is_some_and(|t| t.completed)
}

pub fn stage_state(record: &ProcessRecord, stage: &StageId) -> StageState {
    match record.timer(stage) {
        Some(t) if t.completed => StageState::Completed,
        Some(t) if t.running => StageState::Running,
        Some(t) if t.elapsed > 0 => StageState::Paused,
        _ => StageState::Pending,
    }
}

/// ステージを開始できるか検査し、できない理由をエラーで返す
pub fn check_start(record: &ProcessRecord, stage: &StageId) -> Result<()> {
    if !record.has_stage(stage) {
        return Err(RidecError::UnknownStage {
            stage: stage.clone(),
        });
    }
    if record.completed {
        return Err(RidecError::ProcessCompleted(record.id.clone()));
    }
    if let Some(timer) = record.timer(stage) {
        if timer.running {
            return Err(RidecError::AlreadyRunning(stage.clone()));
        }
        if timer.completed {
            return Err(RidecError::AlreadyCompleted(stage.clone()));
        }
    }
    if let Some(running) = running_stage(record) {
        return Err(RidecError::AnotherStageRunning {
            running: running.clone(),
        });
    }
    if let Some(previous) = predecessor(record, stage) {
        if !is_stage_completed(record, &previous) {
            return Err(RidecError::PredecessorIncomplete {
                predecessor: previous,
            });
        }
    }
    Ok(())
}

pub fn can_start_stage(record: &ProcessRecord, stage: &StageId) -> bool {
    check_start(record, stage).is_ok()
}

/// ステージのタイマーを開始
pub fn start_stage(
    record: &mut ProcessRecord,
    stage: &StageId,
    now: DateTime<Utc>,
) -> Result<StageTransition> {
    check_start(record, stage)?;

    let timer = record.stage_timers.entry(stage.clone()).or_default();
    timer.running = true;
    timer.start_time = Some(now);

    let process_started = *stage == StageId::Ri && record.started_at.is_none();
    if process_started {
        record.started_at = Some(now);
    }
    record.current_stage = stage.clone();
    record.touch(now);

    info!(record = %record.id, stage = %stage, "Stage started");
    Ok(StageTransition::Started {
        stage: stage.clone(),
        process_started,
    })
}

/// ステージを完了し、次のステージへ進める
///
/// 実行中なら経過時間を確定させる。完了済みステージに対しては何もしない。
/// 前のステージが未完了のもの、一度も開始していないものは完了できない。
pub fn finish_stage(
    record: &mut ProcessRecord,
    stage: &StageId,
    now: DateTime<Utc>,
) -> Result<StageTransition> {
    if !record.has_stage(stage) {
        return Err(RidecError::UnknownStage {
            stage: stage.clone(),
        });
    }
    if is_stage_completed(record, stage) {
        debug!(record = %record.id, stage = %stage, "Stage already completed, skipping");
        return Ok(StageTransition::Unchanged);
    }
    if let Some(previous) = predecessor(record, stage) {
        if !is_stage_completed(record, &previous) {
            return Err(RidecError::PredecessorIncomplete {
                predecessor: previous,
            });
        }
    }
    if let Some(running) = running_stage(record) {
        if running != stage {
            return Err(RidecError::AnotherStageRunning {
                running: running.clone(),
            });
        }
    }
    // 実行中か、一時停止で経過時間のあるステージのみ完了できる
    let timer = record
        .stage_timers
        .get_mut(stage)
        .filter(|t| t.running || t.elapsed > 0)
        .ok_or_else(|| RidecError::NotStarted(stage.clone()))?;
    if timer.running && timer.start_time.is_none() {
        return Err(RidecError::MalformedTimer(stage.clone()));
    }
    timer.settle(now);
    timer.completed = true;
    record.touch(now);

    match next_stage(record, stage) {
        Some(next) => {
            record.current_stage = next.clone();
            info!(record = %record.id, from = %stage, to = %next, "Stage finished");
            Ok(StageTransition::Advanced {
                from: stage.clone(),
                to: next,
            })
        }
        None => {
            record.completed = true;
            record.completed_at = Some(now);
            info!(record = %record.id, "Process completed");
            Ok(StageTransition::ProcessCompleted {
                stage: stage.clone(),
            })
        }
    }
}

/// 実行中のステージを完了させずに停止
pub fn pause_stage(
    record: &mut ProcessRecord,
    stage: &StageId,
    now: DateTime<Utc>,
) -> Result<StageTransition> {
    let timer = record
        .stage_timers
        .get_mut(stage)
        .filter(|t| t.running)
        .ok_or_else(|| RidecError::InvalidValue(format!("ステージ '{}' は実行中ではありません", stage)))?;
    if timer.start_time.is_none() {
        return Err(RidecError::MalformedTimer(stage.clone()));
    }
    timer.settle(now);
    let elapsed = timer.elapsed;
    record.touch(now);
    debug!(record = %record.id, stage = %stage, elapsed, "Stage paused");
    Ok(StageTransition::Paused {
        stage: stage.clone(),
        elapsed,
    })
}

/// 実行中の分を含む経過秒数
pub fn elapsed_secs(record: &ProcessRecord, stage: &StageId, now: DateTime<Utc>) -> u64 {
    record.timer(stage).map(|t| t.elapsed_at(now)).unwrap_or(0)
}

/// ステージが期限切れか (`elapsed > deadline`)。期限未設定なら常に false
pub fn is_overdue(record: &ProcessRecord, stage: &StageId, now: DateTime<Utc>) -> bool {
    match record.deadline_secs(stage) {
        Some(deadline) => elapsed_secs(record, stage, now) as f64 > deadline,
        None => false,
    }
}

/// プロセス全体の経過秒数 (RI 初回開始から完了または現在まで)
pub fn total_elapsed_secs(record: &ProcessRecord, now: DateTime<Utc>) -> Option<u64> {
    let started = record.started_at?;
    let end = record.completed_at.unwrap_or(now);
    Some(end.signed_duration_since(started).num_seconds().max(0) as u64)
}

/// 合計時間が maxTime を超えているか
pub fn is_total_overdue(record: &ProcessRecord, now: DateTime<Utc>) -> bool {
    match (record.max_time, total_elapsed_secs(record, now)) {
        (Some(max), Some(total)) => total as f64 > max.in_seconds(),
        _ => false,
    }
}

/// ステージごとの作業時間の合計
pub fn worked_secs(record: &ProcessRecord, now: DateTime<Utc>) -> u64 {
    record
        .stage_timers
        .values()
        .map(|t| t.elapsed_at(now))
        .sum()
}

/// 完了ステージの割合 (%)
pub fn progress(record: &ProcessRecord) -> u8 {
    let sequence = record.stage_sequence();
    if sequence.is_empty() {
        return 0;
    }
    let done = sequence
        .iter()
        .filter(|s| is_stage_completed(record, s))
        .count();
    ((done as f64 / sequence.len() as f64) * 100.0).round() as u8
}

/// 全ステージのタイマーを初期化
pub fn reset_timers(record: &mut ProcessRecord) {
    record.stage_timers = record
        .stage_sequence()
        .into_iter()
        .map(|s| (s, StageTimer::default()))
        .collect();
    record.current_stage = StageId::Ri;
    record.started_at = None;
    record.completed = false;
    record.completed_at = None;
}
