use crate::app::App;
use colored::Colorize;

pub async fn handle_status(app: &App) -> anyhow::Result<()> {
    let status = app.backend.status().await?;
    println!("{}", "バックエンド".bold());
    println!("{}", "─".repeat(40).dimmed());
    println!("  種類: {}", status.backend.cyan());
    if status.reachable {
        println!("  状態: {}", "接続OK".green());
    } else {
        println!("  状態: {}", "接続できません".red());
    }
    if let Some(detail) = &status.detail {
        println!("  詳細: {}", detail);
    }
    if let Some(error) = &status.error {
        println!("  エラー: {}", error.red());
    }
    match &app.session {
        Some(session) => println!("  ユーザー: {}", session.user.email),
        None => println!("  ユーザー: {}", "未ログイン".dimmed()),
    }
    Ok(())
}

pub async fn handle_reset(app: &App, yes: bool) -> anyhow::Result<()> {
    if !yes {
        println!(
            "{}",
            "警告: ローカルのレコード・通知・セッション・設定をすべて削除します。".yellow()
        );
        if app.backend.name() != "local" {
            println!("  ホスト側のデータは削除されません");
        }
        println!("実行するには --yes オプションを指定してください");
        return Ok(());
    }

    let removed = ridec_store::reset(&app.store).await?;
    println!(
        "{} ローカルデータを削除しました ({}件)",
        "✓".green().bold(),
        removed.len()
    );
    Ok(())
}
