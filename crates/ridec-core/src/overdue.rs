//! 期限切れスキャン
//!
//! 各レコードの現在ステージ (total モードでは合計時間) を評価し、
//! 期限切れのものを警告として返す。通知への変換時は未読の重複を除く。

use crate::format::format_compact;
use crate::machine;
use crate::model::{Notification, NotificationKind, ProcessRecord, StageId, TimeMode};
use chrono::{DateTime, Utc};
use tracing::debug;

/// 期限切れの検出結果
#[derive(Debug, Clone, PartialEq)]
pub struct OverdueAlert {
    pub record_id: String,
    pub title: String,
    /// total モードの合計超過では None
    pub stage: Option<StageId>,
    pub elapsed: u64,
    pub limit_secs: f64,
}

impl OverdueAlert {
    pub fn message(&self) -> String {
        let over = (self.elapsed as f64 - self.limit_secs).max(0.0) as u64;
        match &self.stage {
            Some(stage) => format!(
                "{} のステージ {} が期限を {} 超過しています",
                self.title,
                stage,
                format_compact(over)
            ),
            None => format!(
                "{} の合計時間が期限を {} 超過しています",
                self.title,
                format_compact(over)
            ),
        }
    }
}

/// 全レコードを評価
pub fn scan_overdue(records: &[ProcessRecord], now: DateTime<Utc>) -> Vec<OverdueAlert> {
    let mut alerts = Vec::new();
    for record in records.iter().filter(|r| !r.completed) {
        match record.time_mode {
            TimeMode::Simple => {
                let stage = &record.current_stage;
                if machine::is_overdue(record, stage, now) {
                    if let Some(limit) = record.deadline_secs(stage) {
                        alerts.push(OverdueAlert {
                            record_id: record.id.clone(),
                            title: record.title.clone(),
                            stage: Some(stage.clone()),
                            elapsed: machine::elapsed_secs(record, stage, now),
                            limit_secs: limit,
                        });
                    }
                }
            }
            TimeMode::Total => {
                if machine::is_total_overdue(record, now) {
                    if let (Some(max), Some(total)) =
                        (record.max_time, machine::total_elapsed_secs(record, now))
                    {
                        alerts.push(OverdueAlert {
                            record_id: record.id.clone(),
                            title: record.title.clone(),
                            stage: None,
                            elapsed: total,
                            limit_secs: max.in_seconds(),
                        });
                    }
                }
            }
        }
    }
    debug!(scanned = records.len(), overdue = alerts.len(), "Overdue scan finished");
    alerts
}

/// 警告を通知に変換。既存の未読通知と重複するものは除く
pub fn alerts_to_notifications(
    alerts: &[OverdueAlert],
    existing: &[Notification],
    now: DateTime<Utc>,
) -> Vec<Notification> {
    let mut fresh: Vec<Notification> = Vec::new();
    for alert in alerts {
        let mut notification =
            Notification::new(NotificationKind::Warning, "期限切れ", alert.message(), now);
        notification.record_id = Some(alert.record_id.clone());
        notification.stage = alert.stage.clone();

        let duplicate = existing
            .iter()
            .chain(fresh.iter())
            .any(|n| n.duplicates(&notification));
        if !duplicate {
            fresh.push(notification);
        }
    }
    fresh
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Deadline, StageTimer};
    use chrono::Duration;

    fn running_record(elapsed: u64, deadline_hours: f64, now: DateTime<Utc>) -> ProcessRecord {
        let mut record = ProcessRecord::new_template("Compras", now);
        record.set_deadline(StageId::Ri, Some(Deadline::hours(deadline_hours)));
        record.stage_timers.insert(
            StageId::Ri,
            StageTimer {
                elapsed,
                running: false,
                start_time: None,
                completed: false,
            },
        );
        record
    }

    #[test]
    fn test_exact_deadline_is_not_overdue() {
        let now = Utc::now();
        let records = vec![running_record(7200, 2.0, now)];
        assert!(scan_overdue(&records, now).is_empty());
    }

    #[test]
    fn test_overdue_current_stage_is_reported() {
        let now = Utc::now();
        let records = vec![running_record(7201, 2.0, now)];
        let alerts = scan_overdue(&records, now);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].stage, Some(StageId::Ri));
        assert_eq!(alerts[0].limit_secs, 7200.0);
    }

    #[test]
    fn test_completed_records_are_skipped() {
        let now = Utc::now();
        let mut record = running_record(99_999, 1.0, now);
        record.completed = true;
        assert!(scan_overdue(&[record], now).is_empty());
    }

    #[test]
    fn test_total_mode_uses_max_time() {
        let now = Utc::now();
        let mut record = ProcessRecord::new_template("Total", now);
        record.time_mode = TimeMode::Total;
        record.max_time = Some(Deadline::hours(1.0));
        record.started_at = Some(now - Duration::hours(2));
        let alerts = scan_overdue(&[record], now);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].stage, None);
        assert!(alerts[0].message().contains("合計時間"));
    }

    #[test]
    fn test_notifications_are_deduplicated() {
        let now = Utc::now();
        let records = vec![running_record(9000, 2.0, now)];
        let alerts = scan_overdue(&records, now);

        let first = alerts_to_notifications(&alerts, &[], now);
        assert_eq!(first.len(), 1);
        let second = alerts_to_notifications(&alerts, &first, now);
        assert!(second.is_empty());

        let mut read = first.clone();
        read[0].read = true;
        assert_eq!(alerts_to_notifications(&alerts, &read, now).len(), 1);
    }
}
