use crate::app::App;
use crate::utils;
use chrono::Local;
use colored::Colorize;
use ridec_core::{Notification, NotificationKind};

use super::super::NotificationCommands;

pub async fn handle(app: &App, cmd: NotificationCommands) -> anyhow::Result<()> {
    let log = app.notifications();
    match cmd {
        NotificationCommands::List { unread } => {
            let notifications: Vec<Notification> = log
                .list()
                .await?
                .into_iter()
                .rev()
                .filter(|n| !unread || !n.read)
                .collect();
            if notifications.is_empty() {
                println!("{}", "通知はありません".dimmed());
                return Ok(());
            }
            for notification in &notifications {
                print_notification(notification);
            }
        }
        NotificationCommands::Read { id } => {
            if log.mark_read(&id).await? {
                println!("{} 既読にしました", "✓".green().bold());
            } else {
                anyhow::bail!("通知が見つかりません: {}", id);
            }
        }
        NotificationCommands::ReadAll => {
            let count = log.mark_all_read().await?;
            println!("{} {}件を既読にしました", "✓".green().bold(), count);
        }
        NotificationCommands::Clear => {
            let count = log.clear().await?;
            println!("{} {}件の通知を削除しました", "✓".green().bold(), count);
        }
    }
    Ok(())
}

fn print_notification(notification: &Notification) {
    let icon = match notification.kind {
        NotificationKind::Info => "ℹ".blue(),
        NotificationKind::Success => "✓".green(),
        NotificationKind::Warning => "⚠".yellow(),
        NotificationKind::Error => "✗".red(),
    };
    let title = if notification.read {
        notification.title.normal()
    } else {
        notification.title.bold()
    };
    println!(
        "{} {} {} {}",
        icon,
        utils::short_id(&notification.id).dimmed(),
        notification
            .created_at
            .with_timezone(&Local)
            .format("%m/%d %H:%M")
            .to_string()
            .dimmed(),
        title
    );
    println!("    {}", notification.message);
}
