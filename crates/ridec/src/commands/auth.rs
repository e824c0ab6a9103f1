use crate::app::App;
use chrono::Utc;
use colored::Colorize;

pub async fn handle_login(
    app: &App,
    email: &str,
    name: Option<&str>,
    remember: bool,
) -> anyhow::Result<()> {
    let user = app.backend.lookup_user(email, name).await.map_err(|e| {
        tracing::warn!("Login rejected: {}", e);
        anyhow::anyhow!("ログインできませんでした: {}", e)
    })?;
    let session = app
        .gate()
        .login(user, remember, Utc::now())
        .await
        .map_err(|e| anyhow::anyhow!("ログインできませんでした: {}", e))?;

    println!(
        "{} ログインしました: {} <{}>",
        "✓".green().bold(),
        session.user.name.cyan(),
        session.user.email
    );
    if let Some(company) = &session.user.company {
        println!("  会社: {}", company);
    }
    let expires = session.expires_at(&app.settings.session);
    println!(
        "  有効期限: {}",
        expires.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M")
    );
    Ok(())
}

pub async fn handle_logout(app: &App) -> anyhow::Result<()> {
    if app.gate().logout().await? {
        println!("{} ログアウトしました", "✓".green().bold());
    } else {
        println!("{}", "ログインしていません".dimmed());
    }
    Ok(())
}

pub fn handle_whoami(app: &App) {
    match &app.session {
        Some(session) => {
            println!("{} <{}>", session.user.name.bold(), session.user.email);
            if let Some(company) = &session.user.company {
                println!("  会社: {}", company);
            }
            if let Some(role) = &session.user.role {
                println!("  権限: {}", role);
            }
            println!("  バックエンド: {}", app.backend.name());
        }
        None => println!("{}", "未ログイン".dimmed()),
    }
}
