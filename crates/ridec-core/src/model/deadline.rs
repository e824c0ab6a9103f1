//! 期限と時間単位

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 時間単位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Seconds,
    Minutes,
    #[default]
    Hours,
    Days,
    Weeks,
}

impl TimeUnit {
    pub const ALL: [TimeUnit; 5] = [
        TimeUnit::Seconds,
        TimeUnit::Minutes,
        TimeUnit::Hours,
        TimeUnit::Days,
        TimeUnit::Weeks,
    ];

    /// 1単位あたりの秒数
    pub fn multiplier(self) -> u64 {
        match self {
            TimeUnit::Seconds => 1,
            TimeUnit::Minutes => 60,
            TimeUnit::Hours => 3_600,
            TimeUnit::Days => 86_400,
            TimeUnit::Weeks => 604_800,
        }
    }

    pub fn to_seconds(self, value: f64) -> f64 {
        value * self.multiplier() as f64
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TimeUnit::Seconds => "seconds",
            TimeUnit::Minutes => "minutes",
            TimeUnit::Hours => "hours",
            TimeUnit::Days => "days",
            TimeUnit::Weeks => "weeks",
        }
    }

    /// 短縮表記 (`2h` の `h`)
    pub fn suffix(self) -> &'static str {
        match self {
            TimeUnit::Seconds => "s",
            TimeUnit::Minutes => "m",
            TimeUnit::Hours => "h",
            TimeUnit::Days => "d",
            TimeUnit::Weeks => "w",
        }
    }

    /// ホスト側 unit_of_measure テーブルのコード
    pub fn code(self) -> &'static str {
        match self {
            TimeUnit::Seconds => "SEC",
            TimeUnit::Minutes => "MIN",
            TimeUnit::Hours => "HOUR",
            TimeUnit::Days => "DAY",
            TimeUnit::Weeks => "WEEK",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        TimeUnit::ALL
            .into_iter()
            .find(|u| u.code().eq_ignore_ascii_case(code))
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        TimeUnit::ALL
            .into_iter()
            .find(|u| u.as_str() == lower || u.suffix() == lower || u.code() == s.trim())
            .ok_or_else(|| format!("不明な時間単位: {}", s))
    }
}

/// 数値 + 単位で表される期限
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Deadline {
    pub value: f64,
    #[serde(default)]
    pub unit: TimeUnit,
}

impl Deadline {
    pub fn new(value: f64, unit: TimeUnit) -> Self {
        Self { value, unit }
    }

    pub fn hours(value: f64) -> Self {
        Self::new(value, TimeUnit::Hours)
    }

    pub fn in_seconds(&self) -> f64 {
        self.unit.to_seconds(self.value)
    }
}

impl fmt::Display for Deadline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit.suffix())
    }
}

/// `2h`, `30m`, `1.5d`, `90` (単位省略時は時間) 形式をパース
impl FromStr for Deadline {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let split = trimmed
            .find(|c: char| c.is_ascii_alphabetic())
            .unwrap_or(trimmed.len());
        let (number, unit) = trimmed.split_at(split);
        let value: f64 = number
            .trim()
            .parse()
            .map_err(|_| format!("期限の数値が不正です: {}", s))?;
        let unit = if unit.is_empty() {
            TimeUnit::default()
        } else {
            unit.parse()?
        };
        Ok(Deadline::new(value, unit))
    }
}

/// 時間管理モード
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeMode {
    /// ステージごとの期限
    #[default]
    Simple,
    /// プロセス全体の合計時間のみ
    Total,
}

impl TimeMode {
    pub fn as_str(self) -> &'static str {
        match self {
            TimeMode::Simple => "simple",
            TimeMode::Total => "total",
        }
    }
}

impl FromStr for TimeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simple" | "stage" | "stages" => Ok(TimeMode::Simple),
            "total" => Ok(TimeMode::Total),
            other => Err(format!("不明な時間管理モード: {}", other)),
        }
    }
}
