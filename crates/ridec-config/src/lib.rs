pub mod error;
pub mod settings;

pub use error::*;
pub use settings::*;

use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// 設定ファイルの候補 (優先順)
const SETTINGS_CANDIDATES: [&str; 2] = ["ridec.local.yaml", "ridec.yaml"];

/// ローカルストアのデータディレクトリを取得
///
/// 環境変数 RIDEC_DATA_DIR が優先され、未設定なら `<data_dir>/ridec`。
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = match std::env::var("RIDEC_DATA_DIR") {
        Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
        _ => dirs::data_dir()
            .ok_or(ConfigError::DataDirNotFound)?
            .join("ridec"),
    };

    if !data_dir.exists() {
        std::fs::create_dir_all(&data_dir)?;
    }

    Ok(data_dir)
}

/// ridec.yaml を探す
///
/// 以下の優先順位で設定ファイルを検索:
/// 1. 環境変数 RIDEC_CONFIG_PATH (直接パス指定)
/// 2. カレントディレクトリ: ridec.local.yaml, ridec.yaml
/// 3. ./.ridec/ ディレクトリ内: 同様の順序
/// 4. ~/.config/ridec/ridec.yaml (グローバル設定)
///
/// 見つからなければ None (デフォルト設定で動作する)。
pub fn find_settings_file() -> Result<Option<PathBuf>> {
    // 1. 環境変数で直接指定
    if let Ok(config_path) = std::env::var("RIDEC_CONFIG_PATH") {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(Some(path));
        }
    }

    let current_dir = std::env::current_dir()?;

    // 2. カレントディレクトリで検索
    if let Some(path) = first_existing(&current_dir) {
        return Ok(Some(path));
    }

    // 3. ./.ridec/ ディレクトリで検索
    let ridec_dir = current_dir.join(".ridec");
    if ridec_dir.is_dir() {
        if let Some(path) = first_existing(&ridec_dir) {
            return Ok(Some(path));
        }
    }

    // 4. グローバル設定ファイル
    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join("ridec").join("ridec.yaml");
        if global_config.exists() {
            return Ok(Some(global_config));
        }
    }

    Ok(None)
}

fn first_existing(dir: &Path) -> Option<PathBuf> {
    SETTINGS_CANDIDATES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.exists())
}

/// 設定を読み込み、環境変数の上書きを適用する
#[instrument]
pub fn load_settings() -> Result<Settings> {
    match find_settings_file()? {
        Some(path) => load_settings_from(&path),
        None => {
            debug!("No settings file found, using defaults");
            let mut settings = Settings::default();
            settings.apply_env()?;
            Ok(settings)
        }
    }
}

/// 指定ファイルから設定を読み込む
#[instrument]
pub fn load_settings_from(path: &Path) -> Result<Settings> {
    let content = std::fs::read_to_string(path)?;
    let mut settings = Settings::from_yaml(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    settings.apply_env()?;
    debug!(path = %path.display(), "Settings loaded");
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    #[test]
    #[serial]
    fn test_get_data_dir_from_env() {
        let temp_dir = tempfile::tempdir().unwrap();
        let data_dir = temp_dir.path().join("nested").join("data");
        temp_env::with_var("RIDEC_DATA_DIR", Some(data_dir.as_os_str()), || {
            let result = get_data_dir().unwrap();
            assert_eq!(result, data_dir);
            assert!(result.exists());
        });
    }

    #[test]
    #[serial]
    fn test_find_settings_file_local_priority() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        fs::write(temp_dir.path().join("ridec.yaml"), "# shared").unwrap();
        fs::write(temp_dir.path().join("ridec.local.yaml"), "# local").unwrap();

        std::env::set_current_dir(&temp_dir).unwrap();
        let result = temp_env::with_var_unset("RIDEC_CONFIG_PATH", find_settings_file);

        // ridec.local.yaml が優先される
        assert!(result.unwrap().unwrap().ends_with("ridec.local.yaml"));

        std::env::set_current_dir(original_dir).unwrap();
    }

    #[test]
    #[serial]
    fn test_find_settings_file_in_ridec_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        let ridec_dir = temp_dir.path().join(".ridec");
        fs::create_dir(&ridec_dir).unwrap();
        fs::write(ridec_dir.join("ridec.yaml"), "# in dir").unwrap();

        std::env::set_current_dir(&temp_dir).unwrap();
        let result = temp_env::with_var_unset("RIDEC_CONFIG_PATH", find_settings_file);
        assert!(result.unwrap().unwrap().ends_with(".ridec/ridec.yaml"));

        std::env::set_current_dir(original_dir).unwrap();
    }

    #[test]
    #[serial]
    fn test_load_settings_from_env_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("custom.yaml");
        fs::write(&config_path, "watch:\n  overdue_scan_secs: 15\n").unwrap();

        temp_env::with_vars(
            [
                ("RIDEC_CONFIG_PATH", Some(config_path.to_str().unwrap())),
                ("RIDEC_BACKEND", Some("local")),
                ("RIDEC_BACKEND_URL", None),
                ("RIDEC_BACKEND_KEY", None),
            ],
            || {
                let settings = load_settings().unwrap();
                assert_eq!(settings.watch.overdue_scan_secs, 15);
                assert_eq!(settings.backend.kind, BackendKind::Local);
            },
        );
    }

    #[test]
    #[serial]
    fn test_load_settings_reports_parse_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("broken.yaml");
        fs::write(&config_path, "session: [not, a, map]\n").unwrap();

        let err = load_settings_from(&config_path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
