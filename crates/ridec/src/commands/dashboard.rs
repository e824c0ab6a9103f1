use crate::app::App;
use crate::utils;
use chrono::Utc;
use colored::Colorize;
use ridec_core::dashboard::{
    self, RecordCard, average_stage_time, count_by_area, count_by_status, group_by_area,
    time_by_area,
};
use ridec_core::flow::build_flow;
use ridec_core::format::format_clock;

use super::super::ChartKind;

pub async fn handle(app: &mut App, kanban: bool) -> anyhow::Result<()> {
    app.load_records().await?;
    let now = Utc::now();
    let records = app.book.records();

    let summary = dashboard::summary(records, now);
    println!(
        "{}  テンプレート {}  オカレンス {}  実行中 {}  期限切れ {}  完了 {}",
        "RIDEC".bold().cyan(),
        summary.templates,
        summary.occurrences,
        summary.running.to_string().green(),
        summary.overdue.to_string().red(),
        summary.completed
    );
    let unread = app.notifications().unread_count().await?;
    if unread > 0 {
        println!("{}", format!("未読の通知が{}件あります", unread).yellow());
    }
    println!();

    if records.is_empty() {
        println!("{}", "レコードはありません".dimmed());
        println!("  ridec template create でテンプレートを作成してください");
        return Ok(());
    }

    if kanban {
        print_kanban(app, now);
        return Ok(());
    }

    let collapsed = app.preferences().collapsed_areas().await?;
    for group in group_by_area(records, &collapsed, now) {
        let marker = if group.collapsed { "▸" } else { "▾" };
        println!(
            "{} {} ({})",
            marker,
            group.area.bold(),
            group.total
        );
        if group.collapsed {
            continue;
        }
        println!("{}", "─".repeat(80).dimmed());
        for card in &group.cards {
            print_card(card);
        }
        println!();
    }
    Ok(())
}

fn print_card(card: &RecordCard) {
    let kind = if card.orphaned {
        "生成元なし".dimmed()
    } else {
        card.kind.to_string().normal()
    };
    let clock = if card.running {
        format!("{} ⏱", format_clock(card.elapsed)).green()
    } else {
        format_clock(card.elapsed).normal()
    };
    println!(
        "  {:<10} {:<28} {:<12} {:<6} {:<10} {:>4}%  {}",
        utils::short_id(&card.id).cyan(),
        card.title,
        kind,
        card.current_stage.to_string(),
        utils::status_colored(card.status),
        card.progress,
        clock
    );
}

fn print_kanban(app: &App, now: chrono::DateTime<Utc>) {
    for column in dashboard::kanban(app.book.records(), now) {
        let heading = match &column.stage {
            Some(stage) => stage.to_string(),
            None => "完了".to_string(),
        };
        println!("{} ({})", heading.bold(), column.cards.len());
        println!("{}", "─".repeat(40).dimmed());
        if column.cards.is_empty() {
            println!("  {}", "-".dimmed());
        }
        for card in &column.cards {
            let running = if card.running { " ⏱" } else { "" };
            println!(
                "  {} {} {}{}",
                utils::short_id(&card.id).cyan(),
                card.title,
                utils::status_colored(card.status),
                running
            );
        }
        println!();
    }
}

pub async fn handle_flow(app: &mut App) -> anyhow::Result<()> {
    app.load_records().await?;
    let graph = build_flow(app.book.records());
    if graph.nodes.is_empty() {
        println!("{}", "テンプレートはありません".dimmed());
        return Ok(());
    }

    println!("{}", "フロー:".bold());
    for (level, nodes) in graph.levels() {
        println!();
        println!("{}", format!("レベル {}", level).bold());
        for node in nodes {
            println!("  {} {}", utils::short_id(&node.id).cyan(), node.title);
            for next in graph.successors(&node.id) {
                let title = graph
                    .nodes
                    .iter()
                    .find(|n| n.id == next)
                    .map(|n| n.title.as_str())
                    .unwrap_or(next);
                println!("      {} {}", "→".dimmed(), title);
            }
        }
    }
    if graph.edges.is_empty() {
        println!();
        println!(
            "{}",
            "リレーションはありません (ridec template link で設定できます)".dimmed()
        );
    }
    Ok(())
}

pub async fn handle_chart(app: &mut App, kind: Option<ChartKind>) -> anyhow::Result<()> {
    app.load_records().await?;
    let now = Utc::now();
    let records = app.book.records();
    let kinds = match kind {
        Some(kind) => vec![kind],
        None => vec![
            ChartKind::Area,
            ChartKind::Status,
            ChartKind::Time,
            ChartKind::Stages,
        ],
    };

    for (i, kind) in kinds.into_iter().enumerate() {
        if i > 0 {
            println!();
        }
        match kind {
            ChartKind::Area => {
                utils::print_bar_chart("エリア別レコード数", &count_by_area(records), "件")
            }
            ChartKind::Status => utils::print_bar_chart(
                "状態別レコード数",
                &count_by_status(records, now),
                "件",
            ),
            ChartKind::Time => {
                utils::print_bar_chart("エリア別作業時間", &time_by_area(records, now), "h")
            }
            ChartKind::Stages => utils::print_bar_chart(
                "ステージ別平均時間",
                &average_stage_time(records),
                "h",
            ),
        }
    }
    Ok(())
}
