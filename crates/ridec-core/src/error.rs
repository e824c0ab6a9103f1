use crate::form::ValidationErrors;
use crate::model::StageId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RidecError {
    #[error("レコードが見つかりません: {0}")]
    RecordNotFound(String),

    #[error("テンプレートではありません: {0}")]
    NotATemplate(String),

    #[error("ステージ '{stage}' はこのプロセスに存在しません")]
    UnknownStage { stage: StageId },

    #[error("ステージ '{0}' は既に実行中です")]
    AlreadyRunning(StageId),

    #[error("ステージ '{0}' は既に完了しています")]
    AlreadyCompleted(StageId),

    #[error("ステージ '{running}' が実行中です。先に完了させてください")]
    AnotherStageRunning { running: StageId },

    #[error("前のステージ '{predecessor}' が完了していません")]
    PredecessorIncomplete { predecessor: StageId },

    #[error("ステージ '{0}' は開始されていません")]
    NotStarted(StageId),

    #[error("プロセスは既に完了しています: {0}")]
    ProcessCompleted(String),

    #[error("ステージ '{0}' のタイマーが不正です (running だが startTime がありません)")]
    MalformedTimer(StageId),

    #[error("無効なリレーション: {0}")]
    InvalidRelation(String),

    #[error("入力エラー:\n{0}")]
    Validation(ValidationErrors),

    #[error("無効な値: {0}")]
    InvalidValue(String),

    #[error("JSONエラー: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RidecError>;
