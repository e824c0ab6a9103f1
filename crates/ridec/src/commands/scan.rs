use crate::app::App;
use crate::utils;
use chrono::{DateTime, Utc};
use colored::Colorize;
use ridec_core::overdue::{OverdueAlert, alerts_to_notifications, scan_overdue};

pub async fn handle(app: &mut App) -> anyhow::Result<()> {
    app.load_records().await?;
    let (alerts, added) = scan_and_notify(app, Utc::now()).await?;

    if alerts.is_empty() {
        println!("{} 期限切れのステージはありません", "✓".green().bold());
        return Ok(());
    }
    for alert in &alerts {
        println!(
            "{} {} {}",
            "⚠".red().bold(),
            utils::short_id(&alert.record_id).cyan(),
            alert.message()
        );
    }
    println!();
    println!(
        "{}件の期限切れ ({}件の新しい通知)",
        alerts.len(),
        added
    );
    Ok(())
}

/// 期限切れを検出し、未読の重複を除いて通知に残す
pub async fn scan_and_notify(
    app: &App,
    now: DateTime<Utc>,
) -> anyhow::Result<(Vec<OverdueAlert>, usize)> {
    let alerts = scan_overdue(app.book.records(), now);
    if alerts.is_empty() {
        return Ok((alerts, 0));
    }
    let log = app.notifications();
    let existing = log.list().await?;
    let fresh = alerts_to_notifications(&alerts, &existing, now);
    let added = log.push(fresh).await?;
    tracing::info!(alerts = alerts.len(), added, "Overdue scan finished");
    Ok((alerts, added))
}
