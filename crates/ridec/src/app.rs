//! コマンド実行コンテキスト
//!
//! 設定・ローカルストア・バックエンド・セッションをまとめ、
//! 各コマンドはここからレコード一覧を読み込み、差分を永続化する。

use chrono::Utc;
use colored::Colorize;
use ridec_config::Settings;
use ridec_core::{ChangeSet, Notification, NotificationKind, RecordBook};
use ridec_store::{
    ClearReason, LocalStore, NotificationLog, Preferences, RecordBackend, Session, SessionCheck,
    SessionGate,
};

pub struct App {
    pub settings: Settings,
    pub store: LocalStore,
    pub backend: Box<dyn RecordBackend>,
    pub book: RecordBook,
    pub session: Option<Session>,
}

impl App {
    /// 設定とバックエンドを準備する。`require_session` ならログインを要求
    pub async fn open(require_session: bool) -> anyhow::Result<Self> {
        let settings = ridec_config::load_settings()?;
        let data_dir = ridec_config::get_data_dir()?;
        let store = LocalStore::new(&data_dir);
        let backend = ridec_store::open_backend(&settings, &store)?;
        tracing::debug!(backend = backend.name(), data_dir = %data_dir.display(), "App opened");

        let mut app = Self {
            settings,
            store,
            backend,
            book: RecordBook::default(),
            session: None,
        };

        let check = app.gate().check(Utc::now()).await?;
        match check {
            SessionCheck::Valid(session) => app.session = Some(session),
            SessionCheck::Cleared(reason) => {
                if require_session {
                    return Err(session_required(Some(reason)));
                }
                eprintln!(
                    "{} セッションを破棄しました: {}",
                    "⚠".yellow(),
                    reason
                );
            }
            SessionCheck::NoSession if require_session => {
                return Err(session_required(None));
            }
            SessionCheck::NoSession => {}
        }
        Ok(app)
    }

    /// バックエンドからレコード一覧を読み込む
    pub async fn load_records(&mut self) -> anyhow::Result<()> {
        let records = self.backend.list_records().await.map_err(|e| {
            tracing::error!("Failed to load records: {}", e);
            anyhow::anyhow!("レコードを読み込めませんでした ({}): {}", self.backend.name(), e)
        })?;
        tracing::debug!("Loaded {} records", records.len());
        self.book = RecordBook::new(records);
        Ok(())
    }

    /// 差分をバックエンドへ書き込む。失敗時はエラー通知を残す
    pub async fn persist(&self, changes: &ChangeSet) -> anyhow::Result<()> {
        if let Err(e) = ridec_store::apply_changes(self.backend.as_ref(), &self.book, changes).await
        {
            let notification = Notification::new(
                NotificationKind::Error,
                "保存エラー",
                e.to_string(),
                Utc::now(),
            );
            if let Err(log_error) = self.notifications().push(vec![notification]).await {
                tracing::warn!("Failed to record error notification: {}", log_error);
            }
            return Err(anyhow::anyhow!("保存に失敗しました: {}", e));
        }
        Ok(())
    }

    pub fn gate(&self) -> SessionGate<'_> {
        SessionGate::new(&self.store, self.settings.session.clone())
    }

    pub fn notifications(&self) -> NotificationLog<'_> {
        NotificationLog::new(&self.store, self.settings.notifications.max_kept)
    }

    pub fn preferences(&self) -> Preferences<'_> {
        Preferences::new(&self.store)
    }
}

fn session_required(reason: Option<ClearReason>) -> anyhow::Error {
    match reason {
        Some(reason) => anyhow::anyhow!(
            "セッションが無効です ({})。`ridec login --email <アドレス>` で再度ログインしてください",
            reason
        ),
        None => anyhow::anyhow!(
            "ログインしていません。`ridec login --email <アドレス>` を実行してください"
        ),
    }
}
