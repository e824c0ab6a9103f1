use crate::app::App;
use crate::utils;
use chrono::{DateTime, Utc};
use colored::Colorize;
use ridec_core::dashboard::stage_strip;
use ridec_core::format::{format_against, format_clock, format_compact};
use ridec_core::machine;
use ridec_core::{
    ChangeSet, IntegrationTrigger, Notification, NotificationKind, StageId, StageTransition,
    TimeMode, triggered_systems,
};

use super::super::StageCommands;

pub async fn handle(app: &mut App, cmd: StageCommands) -> anyhow::Result<()> {
    app.load_records().await?;
    match cmd {
        StageCommands::Start { id, stage } => start(app, &id, stage.as_deref()).await,
        StageCommands::Finish { id, stage } => finish(app, &id, stage.as_deref()).await,
        StageCommands::Pause { id, stage } => pause(app, &id, stage.as_deref()).await,
        StageCommands::Status { id } => status(app, &id),
    }
}

/// レコードIDと対象ステージを解決する (省略時は現在のステージ)
fn target(app: &App, id: &str, stage: Option<&str>) -> anyhow::Result<(String, StageId)> {
    let record = app.book.resolve(id)?;
    let stage = stage
        .map(StageId::parse_loose)
        .unwrap_or_else(|| record.current_stage.clone());
    Ok((record.id.clone(), stage))
}

async fn start(app: &mut App, id: &str, stage: Option<&str>) -> anyhow::Result<()> {
    let (id, stage) = target(app, id, stage)?;
    let now = Utc::now();
    let transition = app.book.start_stage(&id, &stage, now)?;
    app.persist(&ChangeSet::updated(&id)).await?;

    let record = app.book.require(&id)?;
    if let StageTransition::Started {
        process_started, ..
    } = &transition
    {
        println!(
            "{} {} のステージ {} を開始しました",
            "▶".green().bold(),
            record.title.cyan(),
            stage.to_string().bold()
        );
        if *process_started {
            println!("  プロセスの計測を開始しました");
        }
        if let Some(deadline) = record.deadline(&stage) {
            println!("  期限: {}", deadline);
        }
    }
    notify_integrations(app, &id, &stage, IntegrationTrigger::Start, now).await
}

async fn finish(app: &mut App, id: &str, stage: Option<&str>) -> anyhow::Result<()> {
    let (id, stage) = target(app, id, stage)?;
    let now = Utc::now();
    let transition = app.book.finish_stage(&id, &stage, now)?;
    if transition == StageTransition::Unchanged {
        println!(
            "{}",
            format!("ステージ {} は既に完了しています", stage).dimmed()
        );
        return Ok(());
    }
    app.persist(&ChangeSet::updated(&id)).await?;

    let record = app.book.require(&id)?;
    let elapsed = machine::elapsed_secs(record, &stage, now);
    println!(
        "{} {} のステージ {} を完了しました ({})",
        "✓".green().bold(),
        record.title.cyan(),
        stage.to_string().bold(),
        format_against(elapsed, record.deadline(&stage).as_ref())
    );
    match &transition {
        StageTransition::Advanced { to, .. } => {
            println!("  次のステージ: {}", to.to_string().cyan());
            println!("  開始: ridec stage start {}", utils::short_id(&id));
        }
        StageTransition::ProcessCompleted { .. } => {
            let total = machine::total_elapsed_secs(record, now).unwrap_or_default();
            println!(
                "{} プロセスが完了しました (合計 {})",
                "🎉".green(),
                format_compact(total)
            );
            let notification = Notification::new(
                NotificationKind::Success,
                "プロセス完了",
                format!("{} が完了しました", record.title),
                now,
            )
            .for_stage(&id, stage.clone());
            app.notifications().push(vec![notification]).await?;
        }
        _ => {}
    }
    notify_integrations(app, &id, &stage, IntegrationTrigger::Finish, now).await
}

async fn pause(app: &mut App, id: &str, stage: Option<&str>) -> anyhow::Result<()> {
    let (id, stage) = target(app, id, stage)?;
    let transition = app.book.pause_stage(&id, &stage, Utc::now())?;
    app.persist(&ChangeSet::updated(&id)).await?;

    if let StageTransition::Paused { elapsed, .. } = transition {
        println!(
            "{} ステージ {} を一時停止しました (経過 {})",
            "⏸".yellow().bold(),
            stage.to_string().bold(),
            format_clock(elapsed)
        );
        println!("  再開: ridec stage start {} {}", utils::short_id(&id), stage);
    }
    Ok(())
}

/// 連携が有効なシステムごとに通知を残す (外部への送信は行わない)
async fn notify_integrations(
    app: &App,
    id: &str,
    stage: &StageId,
    trigger: IntegrationTrigger,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let record = app.book.require(id)?;
    let systems = triggered_systems(&record.integrations, stage, trigger);
    if systems.is_empty() {
        return Ok(());
    }

    let action = match trigger {
        IntegrationTrigger::Start => "開始",
        IntegrationTrigger::Finish => "完了",
    };
    let preferences = app.preferences();
    let mut fresh = Vec::with_capacity(systems.len());
    for system in systems {
        let configured = preferences.integration(&system).await?.is_some();
        let message = if configured {
            format!("{} / {} の{}を {} に連携しました", record.title, stage, action, system)
        } else {
            format!(
                "{} / {} の{}: {} の連携設定がありません",
                record.title, stage, action, system
            )
        };
        println!("  {} {}", "↗".blue(), message);
        fresh.push(
            Notification::new(
                NotificationKind::Info,
                format!("連携: {}", system),
                message,
                now,
            )
            .for_stage(id, stage.clone()),
        );
    }
    app.notifications().push(fresh).await?;
    Ok(())
}

fn status(app: &App, id: &str) -> anyhow::Result<()> {
    let record = app.book.resolve(id)?;
    let now = Utc::now();

    println!(
        "{} ({}%)",
        record.title.bold(),
        machine::progress(record)
    );
    if record.completed {
        println!("  {}", "完了".green());
    }
    println!();
    for cell in stage_strip(record, now) {
        let current = if cell.stage == record.current_stage && !record.completed {
            "▶".cyan()
        } else {
            " ".normal()
        };
        let deadline = record.deadline(&cell.stage);
        println!(
            "  {} {:<12} {:<10} {}",
            current,
            cell.stage.to_string(),
            utils::state_colored(cell.state, cell.overdue),
            format_against(cell.elapsed, deadline.as_ref())
        );
    }

    if record.time_mode == TimeMode::Total {
        if let Some(total) = machine::total_elapsed_secs(record, now) {
            let limit = record
                .max_time
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string());
            let line = format!("合計: {} / {}", format_clock(total), limit);
            if machine::is_total_overdue(record, now) {
                println!("\n  {}", line.red().bold());
            } else {
                println!("\n  {}", line);
            }
        }
    }
    Ok(())
}
