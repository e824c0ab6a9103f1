use crate::app::App;
use crate::commands::scan::scan_and_notify;
use crate::utils;
use chrono::{DateTime, Local, Utc};
use colored::Colorize;
use ridec_core::format::{format_against, format_clock};
use ridec_core::machine;
use ridec_core::{RecordBook, TimeMode};
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};

/// 実行中のタイマーを定期的に表示し、期限切れを定期的にスキャンする
pub async fn handle(app: &mut App, ticks: Option<u64>) -> anyhow::Result<()> {
    app.load_records().await?;
    let refresh_secs = app.settings.watch.refresh_secs.max(1);
    let scan_secs = app.settings.watch.overdue_scan_secs.max(1);

    println!(
        "{} (更新 {}秒 / 期限チェック {}秒、Ctrl-C で終了)",
        "監視中…".bold().cyan(),
        refresh_secs,
        scan_secs
    );

    let mut refresh = interval(Duration::from_secs(refresh_secs));
    refresh.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut scan = interval(Duration::from_secs(scan_secs));
    scan.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut rendered = 0u64;
    loop {
        tokio::select! {
            _ = refresh.tick() => {
                render(&app.book, Utc::now());
                rendered += 1;
                if ticks.is_some_and(|limit| rendered >= limit) {
                    break;
                }
            }
            _ = scan.tick() => {
                // 他のプロセスからの変更を拾う
                if let Err(e) = app.load_records().await {
                    tracing::warn!("Reload failed, keeping previous records: {}", e);
                }
                match scan_and_notify(app, Utc::now()).await {
                    Ok((_, added)) if added > 0 => {
                        println!("{} 新しい期限切れ通知: {}件", "⚠".red().bold(), added);
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!("Overdue scan failed: {}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        }
    }
    println!("{}", "監視を終了しました".dimmed());
    Ok(())
}

fn render(book: &RecordBook, now: DateTime<Utc>) {
    let stamp = now.with_timezone(&Local).format("%H:%M:%S").to_string();
    let running: Vec<_> = book
        .records()
        .iter()
        .filter_map(|r| machine::running_stage(r).map(|stage| (r, stage)))
        .collect();

    if running.is_empty() {
        println!("{} {}", stamp.dimmed(), "実行中のタイマーはありません".dimmed());
        return;
    }

    println!("{}", stamp.dimmed());
    for (record, stage) in running {
        let (line, overdue) = match record.time_mode {
            TimeMode::Simple => (
                format_against(
                    machine::elapsed_secs(record, stage, now),
                    record.deadline(stage).as_ref(),
                ),
                machine::is_overdue(record, stage, now),
            ),
            TimeMode::Total => {
                let total = machine::total_elapsed_secs(record, now).unwrap_or_default();
                let limit = record
                    .max_time
                    .map(|d| format!(" / {}", d))
                    .unwrap_or_default();
                (
                    format!("合計 {}{}", format_clock(total), limit),
                    machine::is_total_overdue(record, now),
                )
            }
        };
        let line = if overdue { line.red().bold() } else { line.normal() };
        println!(
            "  {:<10} {:<28} {:<8} {}",
            utils::short_id(&record.id).cyan(),
            record.title,
            stage.to_string(),
            line
        );
    }
}
