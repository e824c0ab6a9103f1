#![allow(deprecated)]

use assert_cmd::Command;
use std::path::Path;
use tempfile::TempDir;

/// 一時ディレクトリをデータ置き場にした実行環境
pub struct TestEnv {
    pub root: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        Self { root }
    }

    /// ログイン済みの環境
    pub fn logged_in() -> Self {
        let env = Self::new();
        env.cmd()
            .args(["login", "--email", "ana@empresa.com.br", "--name", "Ana"])
            .assert()
            .success();
        env
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("ridec").unwrap();
        cmd.current_dir(self.path())
            .env("RIDEC_DATA_DIR", self.path().join("data"))
            .env("RIDEC_BACKEND", "local")
            .env("XDG_CONFIG_HOME", self.path().join("config"))
            .env_remove("RIDEC_CONFIG_PATH")
            .env_remove("RIDEC_BACKEND_URL")
            .env_remove("RIDEC_BACKEND_KEY")
            .env("NO_COLOR", "1");
        cmd
    }

    /// ridec を実行し、成功した標準出力を返す
    pub fn run(&self, args: &[&str]) -> String {
        let output = self.cmd().args(args).assert().success();
        String::from_utf8(output.get_output().stdout.clone()).unwrap()
    }

    /// 4ステージの期限を付けてテンプレートを作成し、短縮IDを返す
    #[allow(dead_code)]
    pub fn create_template(&self, title: &str, area: &str) -> String {
        let stdout = self.run(&[
            "template", "create", "--title", title, "--area", area, "-d", "RI=2h", "-d", "D=4h",
            "-d", "E=8h", "-d", "C=1h",
        ]);
        last_parenthesized(&stdout)
    }

    /// テンプレートからオカレンスを生成し、短縮IDを返す
    #[allow(dead_code)]
    pub fn create_occurrence(&self, template: &str) -> String {
        let stdout = self.run(&["occurrence", "create", template]);
        last_parenthesized(&stdout)
    }
}

/// `... (0f8e2c4a)` の括弧内を取り出す
pub fn last_parenthesized(stdout: &str) -> String {
    let line = stdout
        .lines()
        .find(|l| l.contains('✓'))
        .unwrap_or_else(|| panic!("no success line in: {}", stdout));
    let start = line.rfind('(').unwrap() + 1;
    let end = line.rfind(')').unwrap();
    line[start..end].to_string()
}
