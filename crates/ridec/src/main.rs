mod app;
mod commands;
mod utils;

use app::App;
use clap::{Args, Parser, Subcommand, ValueEnum};
use ridec_core::{Deadline, IntegrationTrigger, StageA, StageId, TimeMode};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ridec")]
#[command(about = "RI → D → E → C。プロセスの進み具合を、時間で見る。", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// テンプレート (プロセス定義) を管理
    #[command(subcommand)]
    Template(TemplateCommands),
    /// オカレンス (テンプレートの実行) を管理
    #[command(subcommand)]
    Occurrence(OccurrenceCommands),
    /// ステージのタイマーを操作
    #[command(subcommand)]
    Stage(StageCommands),
    /// エリアごとのダッシュボードを表示
    Dashboard {
        /// 現在ステージごとのカンバン表示
        #[arg(short, long)]
        kanban: bool,
    },
    /// テンプレート間のフロー図を表示
    Flow,
    /// 集計チャートを表示
    Chart {
        /// 表示するチャート (省略時はすべて)
        #[arg(value_enum)]
        kind: Option<ChartKind>,
    },
    /// 期限切れのステージを検出して通知
    Scan,
    /// 実行中のタイマーを監視 (Ctrl-C で終了)
    Watch {
        /// 指定回数の更新で終了
        #[arg(long)]
        ticks: Option<u64>,
    },
    /// 通知を管理
    #[command(subcommand)]
    Notifications(NotificationCommands),
    /// ダッシュボードのエリア表示を切り替え
    #[command(subcommand)]
    Area(AreaCommands),
    /// 外部システム連携の設定
    #[command(subcommand)]
    Integration(IntegrationCommands),
    /// ログイン
    Login {
        /// メールアドレス
        #[arg(short, long)]
        email: String,
        /// 表示名 (ローカルバックエンドのみ)
        #[arg(short, long)]
        name: Option<String>,
        /// ログイン状態を長期間保持
        #[arg(short, long)]
        remember: bool,
    },
    /// ログアウト
    Logout,
    /// ログイン中のユーザーを表示
    Whoami,
    /// バックエンドを管理
    #[command(subcommand)]
    Backend(BackendCommands),
    /// RIDEC のローカルデータをすべて削除
    Reset {
        /// 確認なしで実行
        #[arg(short, long)]
        yes: bool,
    },
    /// バージョン情報を表示
    Version,
}

impl Commands {
    /// ログインなしで実行できるコマンド
    fn is_public(&self) -> bool {
        matches!(
            self,
            Commands::Login { .. }
                | Commands::Logout
                | Commands::Whoami
                | Commands::Backend(_)
                | Commands::Reset { .. }
                | Commands::Version
        )
    }
}

/// テンプレート作成・編集の入力項目
#[derive(Args, Debug, Default)]
pub struct TemplateArgs {
    /// タイトル
    #[arg(short, long)]
    pub title: Option<String>,
    /// 説明
    #[arg(long)]
    pub description: Option<String>,
    /// エリア
    #[arg(short, long)]
    pub area: Option<String>,
    /// 時間管理モード (simple: ステージごと / total: 合計時間)
    #[arg(short, long)]
    pub mode: Option<TimeMode>,
    /// 合計時間 (total モード、例: 8h)
    #[arg(long)]
    pub max_time: Option<Deadline>,
    /// 標準ステージの期限 (例: --deadline RI=2h --deadline D=4h)
    #[arg(short, long = "deadline", value_parser = utils::parse_stage_deadline)]
    pub deadlines: Vec<(StageId, Deadline)>,
    /// カスタムステージ 識別子@位置[=期限] (例: Review@d-e=30m)
    #[arg(long = "stage-a", value_parser = utils::parse_stage_a)]
    pub stages_a: Vec<StageA>,
    /// カスタムステージをすべて外す
    #[arg(long, conflicts_with = "stages_a")]
    pub no_stage_a: bool,
    /// 先行テンプレートのID
    #[arg(long)]
    pub start: Option<String>,
    /// 後続テンプレートのID
    #[arg(long)]
    pub end: Option<String>,
    /// 連携トリガー ステージ:システム:start|finish (例: D:slack:finish)
    #[arg(long = "integration", value_parser = utils::parse_integration)]
    pub integrations: Vec<(StageId, String, IntegrationTrigger)>,
}

/// テンプレートのサブコマンド
#[derive(Subcommand)]
pub enum TemplateCommands {
    /// テンプレートを作成
    Create {
        #[command(flatten)]
        args: TemplateArgs,
    },
    /// テンプレートを編集 (指定した項目のみ変更)
    Edit {
        /// テンプレートID (前方一致)
        id: String,
        #[command(flatten)]
        args: TemplateArgs,
    },
    /// テンプレートの一覧
    List,
    /// テンプレートの詳細
    Show {
        /// テンプレートID (前方一致)
        id: String,
    },
    /// テンプレートを削除 (オカレンスは残る)
    Delete {
        /// テンプレートID (前方一致)
        id: String,
        /// 確認なしで実行
        #[arg(short, long)]
        yes: bool,
    },
    /// 先行・後続テンプレートを設定
    Link {
        /// テンプレートID (前方一致)
        id: String,
        /// 先行テンプレートのID
        #[arg(long)]
        start: Option<String>,
        /// 後続テンプレートのID
        #[arg(long)]
        end: Option<String>,
        /// リレーションを外す
        #[arg(long, conflicts_with_all = ["start", "end"])]
        clear: bool,
    },
}

/// オカレンスのサブコマンド
#[derive(Subcommand)]
pub enum OccurrenceCommands {
    /// テンプレートからオカレンスを生成
    Create {
        /// テンプレートID (前方一致)
        template: String,
    },
    /// オカレンスの一覧
    List {
        /// テンプレートで絞り込み
        #[arg(short, long)]
        template: Option<String>,
    },
    /// オカレンスを削除
    Delete {
        /// オカレンスID (前方一致)
        id: String,
        /// 確認なしで実行
        #[arg(short, long)]
        yes: bool,
    },
}

/// ステージのサブコマンド
#[derive(Subcommand)]
pub enum StageCommands {
    /// ステージを開始 (一時停止中なら再開)
    Start {
        /// レコードID (前方一致)
        id: String,
        /// ステージ (省略時は現在のステージ)
        stage: Option<String>,
    },
    /// ステージを完了し、次のステージへ進める
    Finish {
        /// レコードID (前方一致)
        id: String,
        /// ステージ (省略時は現在のステージ)
        stage: Option<String>,
    },
    /// ステージを一時停止
    Pause {
        /// レコードID (前方一致)
        id: String,
        /// ステージ (省略時は現在のステージ)
        stage: Option<String>,
    },
    /// ステージごとの状態を表示
    Status {
        /// レコードID (前方一致)
        id: String,
    },
}

/// 通知のサブコマンド
#[derive(Subcommand)]
pub enum NotificationCommands {
    /// 通知の一覧
    List {
        /// 未読のみ
        #[arg(short, long)]
        unread: bool,
    },
    /// 通知を既読にする
    Read {
        /// 通知ID (前方一致)
        id: String,
    },
    /// すべて既読にする
    ReadAll,
    /// 通知をすべて削除
    Clear,
}

/// エリア表示のサブコマンド
#[derive(Subcommand)]
pub enum AreaCommands {
    /// エリアを折りたたむ
    Collapse {
        /// エリア名
        area: String,
    },
    /// エリアを展開
    Expand {
        /// エリア名
        area: String,
    },
}

/// 連携設定のサブコマンド
#[derive(Subcommand)]
pub enum IntegrationCommands {
    /// システムの設定を保存 (JSON)
    Set {
        /// システム名 (例: slack)
        system: String,
        /// 設定内容 (JSON)
        config: String,
    },
    /// システムの設定を表示
    Show {
        /// システム名
        system: String,
    },
}

/// バックエンドのサブコマンド
#[derive(Subcommand)]
pub enum BackendCommands {
    /// 接続状態を表示
    Status,
}

/// チャートの種類
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ChartKind {
    /// エリアごとのレコード数
    Area,
    /// 状態ごとのレコード数
    Status,
    /// エリアごとの経過時間
    Time,
    /// ステージごとの平均時間
    Stages,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("RIDEC_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    // Versionコマンドは設定不要
    if matches!(cli.command, Commands::Version) {
        println!("ridec {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let mut app = App::open(!cli.command.is_public()).await?;

    // コマンドディスパッチ
    match cli.command {
        Commands::Template(cmd) => commands::template::handle(&mut app, cmd).await?,
        Commands::Occurrence(cmd) => commands::occurrence::handle(&mut app, cmd).await?,
        Commands::Stage(cmd) => commands::stage::handle(&mut app, cmd).await?,
        Commands::Dashboard { kanban } => commands::dashboard::handle(&mut app, kanban).await?,
        Commands::Flow => commands::dashboard::handle_flow(&mut app).await?,
        Commands::Chart { kind } => commands::dashboard::handle_chart(&mut app, kind).await?,
        Commands::Scan => commands::scan::handle(&mut app).await?,
        Commands::Watch { ticks } => commands::watch::handle(&mut app, ticks).await?,
        Commands::Notifications(cmd) => commands::notifications::handle(&app, cmd).await?,
        Commands::Area(cmd) => commands::preferences::handle_area(&app, cmd).await?,
        Commands::Integration(cmd) => commands::preferences::handle_integration(&app, cmd).await?,
        Commands::Login {
            email,
            name,
            remember,
        } => commands::auth::handle_login(&app, &email, name.as_deref(), remember).await?,
        Commands::Logout => commands::auth::handle_logout(&app).await?,
        Commands::Whoami => commands::auth::handle_whoami(&app),
        Commands::Backend(BackendCommands::Status) => commands::backend::handle_status(&app).await?,
        Commands::Reset { yes } => commands::backend::handle_reset(&app, yes).await?,
        // 設定読み込み前に処理済み
        Commands::Version => {}
    }

    Ok(())
}
