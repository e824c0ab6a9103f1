//! ridec.yaml の設定項目

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 設定全体
///
/// 省略された項目はすべてデフォルト値になる。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub backend: BackendSettings,
    pub session: SessionSettings,
    pub watch: WatchSettings,
    pub notifications: NotificationSettings,
}

/// 使用するバックエンドの種類
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// 接続先とキーが揃っていればホスト型、なければローカル
    #[default]
    Auto,
    Local,
    Hosted,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Auto => write!(f, "auto"),
            BackendKind::Local => write!(f, "local"),
            BackendKind::Hosted => write!(f, "hosted"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(BackendKind::Auto),
            "local" => Ok(BackendKind::Local),
            "hosted" => Ok(BackendKind::Hosted),
            _ => Err(ConfigError::InvalidValue {
                key: "backend.kind".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    pub kind: BackendKind,
    /// ホスト型バックエンドの REST エンドポイント
    pub url: Option<String>,
    pub api_key: Option<String>,
    /// 書き込み時に使う会社ID
    pub company_id: Option<String>,
    /// 書き込み時に使うユーザーID (ログイン時に上書きされる)
    pub user_id: Option<String>,
    /// テンプレート削除を論理削除にする
    pub soft_delete: bool,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            kind: BackendKind::Auto,
            url: None,
            api_key: None,
            company_id: None,
            user_id: None,
            soft_delete: true,
        }
    }
}

impl BackendSettings {
    /// 接続先とキーが両方設定されているか
    pub fn hosted_configured(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        present(&self.url) && present(&self.api_key)
    }

    /// ホスト型を使うべきか
    pub fn use_hosted(&self) -> bool {
        match self.kind {
            BackendKind::Local => false,
            BackendKind::Hosted => true,
            BackendKind::Auto => self.hosted_configured(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// 通常セッションの有効期間
    pub lifetime_hours: u64,
    /// remember-me 指定時の有効期間
    pub remember_days: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            lifetime_hours: 24,
            remember_days: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchSettings {
    pub refresh_secs: u64,
    pub overdue_scan_secs: u64,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            refresh_secs: 1,
            overdue_scan_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    /// 保持する通知の最大件数 (古いものから削除)
    pub max_kept: usize,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self { max_kept: 100 }
    }
}

impl Settings {
    pub fn from_yaml(content: &str) -> std::result::Result<Self, serde_yaml::Error> {
        // 空ファイルは null としてパースされるためデフォルト扱い
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    /// 環境変数による上書き
    ///
    /// - `RIDEC_BACKEND`: auto / local / hosted
    /// - `RIDEC_BACKEND_URL`
    /// - `RIDEC_BACKEND_KEY`
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(kind) = std::env::var("RIDEC_BACKEND") {
            self.backend.kind = kind.parse()?;
        }
        if let Ok(url) = std::env::var("RIDEC_BACKEND_URL") {
            self.backend.url = Some(url);
        }
        if let Ok(key) = std::env::var("RIDEC_BACKEND_KEY") {
            self.backend.api_key = Some(key);
        }
        self.validate()
    }

    fn validate(&self) -> Result<()> {
        let positive = [
            ("session.lifetime_hours", self.session.lifetime_hours),
            ("session.remember_days", self.session.remember_days),
            ("watch.refresh_secs", self.watch.refresh_secs),
            ("watch.overdue_scan_secs", self.watch.overdue_scan_secs),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: value.to_string(),
                });
            }
        }
        Ok(())
    }
}
