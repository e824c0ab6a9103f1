use crate::app::App;
use crate::utils;
use chrono::Utc;
use colored::Colorize;
use ridec_core::dashboard::RecordCard;
use ridec_core::format::format_clock;
use ridec_core::{ChangeSet, RecordBook};

use super::super::OccurrenceCommands;

pub async fn handle(app: &mut App, cmd: OccurrenceCommands) -> anyhow::Result<()> {
    app.load_records().await?;
    match cmd {
        OccurrenceCommands::Create { template } => create(app, &template).await,
        OccurrenceCommands::List { template } => list(&app.book, template.as_deref()),
        OccurrenceCommands::Delete { id, yes } => delete(app, &id, yes).await,
    }
}

async fn create(app: &mut App, template: &str) -> anyhow::Result<()> {
    let template = app.book.resolve(template)?;
    if template.is_occurrence {
        anyhow::bail!("'{}' はテンプレートではありません", template.title);
    }
    let template_id = template.id.clone();

    let id = app.book.create_occurrence(&template_id, Utc::now())?;
    app.persist(&ChangeSet::created(&id)).await?;

    let record = app.book.require(&id)?;
    println!(
        "{} オカレンスを生成しました: {} ({})",
        "✓".green().bold(),
        record.title.cyan(),
        utils::short_id(&id)
    );
    println!("  開始: ridec stage start {}", utils::short_id(&id));
    Ok(())
}

fn list(book: &RecordBook, template: Option<&str>) -> anyhow::Result<()> {
    let template_id = match template {
        Some(t) => Some(book.resolve(t)?.id.clone()),
        None => None,
    };
    let now = Utc::now();
    let cards: Vec<RecordCard> = book
        .occurrences()
        .filter(|r| template_id.is_none() || r.template_id == template_id)
        .map(|r| RecordCard::build(r, book.records(), now))
        .collect();

    if cards.is_empty() {
        println!("{}", "オカレンスはありません".dimmed());
        return Ok(());
    }

    println!(
        "{}",
        format!(
            "{:<10} {:<28} {:<10} {:<10} {:<6} {:<10}",
            "ID", "TITLE", "STAGE", "STATUS", "PROG", "ELAPSED"
        )
        .bold()
    );
    println!("{}", "─".repeat(80).dimmed());
    for card in cards {
        let title = if card.orphaned {
            format!("{} {}", card.title, "(生成元なし)".dimmed())
        } else {
            card.title.clone()
        };
        let elapsed = if card.running {
            format!("{} ⏱", format_clock(card.elapsed))
        } else {
            format_clock(card.elapsed)
        };
        println!(
            "{:<10} {:<28} {:<10} {:<10} {:>4}%  {:<10}",
            utils::short_id(&card.id).cyan(),
            title,
            card.current_stage.to_string(),
            utils::status_colored(card.status),
            card.progress,
            elapsed
        );
    }
    Ok(())
}

async fn delete(app: &mut App, id: &str, yes: bool) -> anyhow::Result<()> {
    let record = app.book.resolve(id)?;
    if !record.is_occurrence {
        anyhow::bail!(
            "'{}' はテンプレートです。ridec template delete を使用してください",
            record.title
        );
    }
    let id = record.id.clone();

    if !yes {
        println!(
            "{}",
            format!("警告: オカレンス '{}' とそのタイマー記録を削除します。", record.title)
                .yellow()
        );
        println!("実行するには --yes オプションを指定してください");
        return Ok(());
    }

    let deletion = app.book.delete(&id)?;
    app.persist(&deletion.changes).await?;
    println!(
        "{} オカレンスを削除しました: {}",
        "✓".green().bold(),
        deletion.removed.title.cyan()
    );
    Ok(())
}
