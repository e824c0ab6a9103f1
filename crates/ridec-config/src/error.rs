use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("データディレクトリが見つかりません。RIDEC_DATA_DIR 環境変数で指定できます")]
    DataDirNotFound,

    #[error("設定ファイルの読み込みに失敗しました: {path}\n{source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("無効な設定値: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
