//! モデル定義
//!
//! RIDECで使用されるデータモデルを定義します。
//! 各モデルは機能ごとにモジュールに分離されています。

mod deadline;
mod notification;
mod record;
mod stage;
mod timer;

// Re-exports
pub use deadline::*;
pub use notification::*;
pub use record::*;
pub use stage::*;
pub use timer::*;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_record_json_roundtrip_keeps_timers() {
        let now = Utc::now();
        let mut record = ProcessRecord::new_template("Onboarding", now);
        record.area = "RH".to_string();
        record.stage_timers.insert(
            StageId::Ri,
            StageTimer {
                elapsed: 42,
                running: true,
                start_time: Some(now),
                completed: false,
            },
        );
        record.stages_a.push(StageA::new("Review", StagePosition::DE));

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"stageTimers\""));
        assert!(json.contains("\"isOccurrence\":false"));

        let back: ProcessRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_notification_duplicate_detection() {
        let now = Utc::now();
        let a = Notification::new(NotificationKind::Warning, "t", "m", now)
            .for_stage("r1", StageId::D);
        let b = Notification::new(NotificationKind::Warning, "t2", "m2", now)
            .for_stage("r1", StageId::D);
        let c = Notification::new(NotificationKind::Warning, "t", "m", now)
            .for_stage("r1", StageId::E);
        assert!(a.duplicates(&b));
        assert!(!a.duplicates(&c));

        let mut read = a.clone();
        read.read = true;
        assert!(!read.duplicates(&b));
    }
}
