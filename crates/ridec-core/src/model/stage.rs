//! ステージ定義
//!
//! 標準ステージ RI → D → E → C と、その間に挿入されるカスタムステージ (Stage A)。

use super::deadline::{Deadline, TimeUnit};
use serde::{Deserialize, Serialize};
use std::fmt;

/// ステージ識別子
///
/// 永続化時は文字列 (`"RI"`, `"D"`, `"E"`, `"C"`, またはカスタム識別子) として扱う。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StageId {
    Ri,
    D,
    E,
    C,
    /// Stage A (カスタムステージ)
    Custom(String),
}

impl StageId {
    /// 標準ステージ (順序通り)
    pub const STANDARD: [StageId; 4] = [StageId::Ri, StageId::D, StageId::E, StageId::C];

    pub fn as_str(&self) -> &str {
        match self {
            StageId::Ri => "RI",
            StageId::D => "D",
            StageId::E => "E",
            StageId::C => "C",
            StageId::Custom(id) => id,
        }
    }

    pub fn is_standard(&self) -> bool {
        !matches!(self, StageId::Custom(_))
    }

    /// 標準ステージの識別子と衝突するか (大文字小文字を区別しない)
    pub fn is_reserved(identifier: &str) -> bool {
        let upper = identifier.trim().to_ascii_uppercase();
        StageId::STANDARD.iter().any(|s| s.as_str() == upper)
    }

    /// CLI入力からの変換。標準ステージは大文字小文字を区別しない
    pub fn parse_loose(input: &str) -> Self {
        let trimmed = input.trim();
        if StageId::is_reserved(trimmed) {
            StageId::from(trimmed.to_ascii_uppercase())
        } else {
            StageId::Custom(trimmed.to_string())
        }
    }
}

impl From<String> for StageId {
    fn from(value: String) -> Self {
        match value.as_str() {
            "RI" => StageId::Ri,
            "D" => StageId::D,
            "E" => StageId::E,
            "C" => StageId::C,
            _ => StageId::Custom(value),
        }
    }
}

impl From<&str> for StageId {
    fn from(value: &str) -> Self {
        StageId::from(value.to_string())
    }
}

impl From<StageId> for String {
    fn from(value: StageId) -> Self {
        match value {
            StageId::Custom(id) => id,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stage A の挿入位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StagePosition {
    #[serde(rename = "ri-d")]
    RiD,
    #[serde(rename = "d-e")]
    DE,
    #[serde(rename = "e-c")]
    EC,
    #[serde(rename = "after-c")]
    AfterC,
}

impl StagePosition {
    pub const ALL: [StagePosition; 4] = [
        StagePosition::RiD,
        StagePosition::DE,
        StagePosition::EC,
        StagePosition::AfterC,
    ];

    /// 直前に位置する標準ステージ
    pub fn anchor(self) -> StageId {
        match self {
            StagePosition::RiD => StageId::Ri,
            StagePosition::DE => StageId::D,
            StagePosition::EC => StageId::E,
            StagePosition::AfterC => StageId::C,
        }
    }

    /// 標準ステージの直後に入る位置
    pub fn after(stage: &StageId) -> Option<Self> {
        match stage {
            StageId::Ri => Some(StagePosition::RiD),
            StageId::D => Some(StagePosition::DE),
            StageId::E => Some(StagePosition::EC),
            StageId::C => Some(StagePosition::AfterC),
            StageId::Custom(_) => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StagePosition::RiD => "ri-d",
            StagePosition::DE => "d-e",
            StagePosition::EC => "e-c",
            StagePosition::AfterC => "after-c",
        }
    }
}

impl fmt::Display for StagePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StagePosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StagePosition::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("不明な挿入位置: {} (ri-d, d-e, e-c, after-c)", s))
    }
}

/// Stage A - 標準ステージ間に挿入されるカスタムステージ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageA {
    /// ステージ識別子 (シーケンス上のキー)
    pub identifier: String,
    /// 挿入位置
    pub position: StagePosition,
    #[serde(default)]
    pub description: String,
    /// 期限 (未設定なら期限切れにならない)
    #[serde(default)]
    pub deadline: Option<f64>,
    #[serde(default)]
    pub deadline_unit: TimeUnit,
}

impl StageA {
    pub fn new(identifier: impl Into<String>, position: StagePosition) -> Self {
        Self {
            identifier: identifier.into(),
            position,
            description: String::new(),
            deadline: None,
            deadline_unit: TimeUnit::default(),
        }
    }

    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = Some(deadline.value);
        self.deadline_unit = deadline.unit;
        self
    }

    pub fn stage_id(&self) -> StageId {
        StageId::Custom(self.identifier.clone())
    }

    pub fn deadline_secs(&self) -> Option<f64> {
        self.deadline.map(|v| self.deadline_unit.to_seconds(v))
    }
}

/// 標準ステージ + Stage A の実効シーケンスを組み立てる
pub fn build_sequence(stages_a: &[StageA]) -> Vec<StageId> {
    let mut sequence = Vec::with_capacity(StageId::STANDARD.len() + stages_a.len());
    for standard in StageId::STANDARD {
        let position = StagePosition::after(&standard);
        sequence.push(standard);
        sequence.extend(
            stages_a
                .iter()
                .filter(|a| Some(a.position) == position)
                .map(StageA::stage_id),
        );
    }
    sequence
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_id_string_roundtrip() {
        assert_eq!(StageId::from("RI"), StageId::Ri);
        assert_eq!(StageId::from("Review"), StageId::Custom("Review".into()));
        assert_eq!(String::from(StageId::C), "C");

        let json = serde_json::to_string(&StageId::Custom("QA".into())).unwrap();
        assert_eq!(json, "\"QA\"");
    }

    #[test]
    fn test_parse_loose_is_case_insensitive_for_standard() {
        assert_eq!(StageId::parse_loose("ri"), StageId::Ri);
        assert_eq!(StageId::parse_loose(" e "), StageId::E);
        assert_eq!(StageId::parse_loose("review"), StageId::Custom("review".into()));
    }

    #[test]
    fn test_sequence_with_stage_a_between_d_and_e() {
        let stages = vec![StageA::new("Review", StagePosition::DE)];
        let seq = build_sequence(&stages);
        let names: Vec<_> = seq.iter().map(|s| s.as_str()).collect();
        assert_eq!(names, vec!["RI", "D", "Review", "E", "C"]);
    }

    #[test]
    fn test_sequence_keeps_list_order_within_anchor() {
        let stages = vec![
            StageA::new("Close", StagePosition::AfterC),
            StageA::new("Triage", StagePosition::RiD),
            StageA::new("Audit", StagePosition::AfterC),
        ];
        let names: Vec<_> = build_sequence(&stages)
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(names, vec!["RI", "Triage", "D", "E", "C", "Close", "Audit"]);
    }

    #[test]
    fn test_position_parse() {
        assert_eq!("d-e".parse::<StagePosition>().unwrap(), StagePosition::DE);
        assert_eq!(
            "AFTER-C".parse::<StagePosition>().unwrap(),
            StagePosition::AfterC
        );
        assert!("x-y".parse::<StagePosition>().is_err());
    }
}
