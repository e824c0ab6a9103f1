//! ステージタイマー

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// ステージごとのタイマー状態
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageTimer {
    /// 確定済みの経過秒数 (実行中の分は含まない)
    #[serde(default)]
    pub elapsed: u64,
    #[serde(default)]
    pub running: bool,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed: bool,
}

impl StageTimer {
    /// 実行中の分を含む経過秒数
    pub fn elapsed_at(&self, now: DateTime<Utc>) -> u64 {
        self.elapsed + self.in_flight(now)
    }

    /// 現在の実行区間の秒数
    pub fn in_flight(&self, now: DateTime<Utc>) -> u64 {
        match (self.running, self.start_time) {
            (true, Some(start)) => now.signed_duration_since(start).num_seconds().max(0) as u64,
            _ => 0,
        }
    }

    /// 実行区間を確定させて停止
    pub fn settle(&mut self, now: DateTime<Utc>) {
        self.elapsed += self.in_flight(now);
        self.running = false;
        self.start_time = None;
    }
}
