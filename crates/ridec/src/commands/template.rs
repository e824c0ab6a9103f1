use crate::app::App;
use crate::utils;
use chrono::Utc;
use colored::Colorize;
use ridec_core::format::format_compact;
use ridec_core::{ChangeSet, FormWizard, RecordBook, Relations, TemplateDraft, TimeMode};

use super::super::{TemplateArgs, TemplateCommands};

pub async fn handle(app: &mut App, cmd: TemplateCommands) -> anyhow::Result<()> {
    app.load_records().await?;
    match cmd {
        TemplateCommands::Create { args } => create(app, args).await,
        TemplateCommands::Edit { id, args } => edit(app, &id, args).await,
        TemplateCommands::List => {
            list(&app.book);
            Ok(())
        }
        TemplateCommands::Show { id } => show(&app.book, &id),
        TemplateCommands::Delete { id, yes } => delete(app, &id, yes).await,
        TemplateCommands::Link {
            id,
            start,
            end,
            clear,
        } => link(app, &id, start, end, clear).await,
    }
}

/// 入力項目を下書きに反映する。指定されなかった項目は変更しない
fn apply_args(args: TemplateArgs, draft: &mut TemplateDraft, book: &RecordBook) {
    if let Some(title) = args.title {
        draft.title = title;
    }
    if let Some(description) = args.description {
        draft.description = description;
    }
    if let Some(area) = args.area {
        draft.area = area;
    }
    if let Some(mode) = args.mode {
        draft.time_mode = mode;
    }
    if let Some(max_time) = args.max_time {
        draft.max_time = Some(max_time);
    }
    for (stage, deadline) in args.deadlines {
        draft.deadlines.insert(stage, deadline);
    }
    if args.no_stage_a {
        draft.stages_a.clear();
    } else if !args.stages_a.is_empty() {
        draft.stages_a = args.stages_a;
    }
    // 解決できないIDはそのまま渡し、フォーム検証で報告させる
    if let Some(start) = args.start {
        draft.relations.start = Some(resolve_id(book, &start));
    }
    if let Some(end) = args.end {
        draft.relations.end = Some(resolve_id(book, &end));
    }
    for (stage, system, trigger) in args.integrations {
        draft
            .integrations
            .entry(stage)
            .or_default()
            .entry(system)
            .or_default()
            .insert(trigger.as_str().to_string(), true);
    }
}

fn resolve_id(book: &RecordBook, id_or_prefix: &str) -> String {
    book.resolve(id_or_prefix)
        .map(|r| r.id.clone())
        .unwrap_or_else(|_| id_or_prefix.to_string())
}

/// 全ステップを検証し、失敗したステップのエラーを表示する
fn run_wizard(wizard: &mut FormWizard, book: &RecordBook) -> anyhow::Result<()> {
    if let Err((step, errors)) = wizard.run_to_end(book.records()) {
        utils::print_validation_errors(step, &errors);
        anyhow::bail!("{}件の入力エラーがあります", errors.errors.len());
    }
    Ok(())
}

async fn create(app: &mut App, args: TemplateArgs) -> anyhow::Result<()> {
    let mut draft = TemplateDraft::default();
    apply_args(args, &mut draft, &app.book);

    let mut wizard = FormWizard::new(draft);
    run_wizard(&mut wizard, &app.book)?;

    let id = app.book.create_template(wizard.draft, Utc::now())?;
    app.persist(&ChangeSet::created(&id)).await?;

    let record = app.book.require(&id)?;
    println!(
        "{} テンプレートを作成しました: {} ({})",
        "✓".green().bold(),
        record.title.cyan(),
        utils::short_id(&id)
    );
    Ok(())
}

async fn edit(app: &mut App, id: &str, args: TemplateArgs) -> anyhow::Result<()> {
    let record = app.book.resolve(id)?;
    if record.is_occurrence {
        anyhow::bail!("'{}' はオカレンスです。テンプレートのみ編集できます", record.title);
    }
    let id = record.id.clone();
    let mut wizard = FormWizard::edit(record);
    apply_args(args, &mut wizard.draft, &app.book);
    run_wizard(&mut wizard, &app.book)?;

    let changes = app.book.update_template(&id, wizard.draft, Utc::now())?;
    app.persist(&changes).await?;
    println!(
        "{} テンプレートを更新しました: {}",
        "✓".green().bold(),
        app.book.require(&id)?.title.cyan()
    );
    println!("  {}", "既存のオカレンスには反映されません".dimmed());
    Ok(())
}

fn list(book: &RecordBook) {
    let templates: Vec<_> = book.templates().collect();
    if templates.is_empty() {
        println!("{}", "テンプレートはありません".dimmed());
        println!("  ridec template create --title <タイトル> --area <エリア> ... で作成できます");
        return;
    }

    println!(
        "{}",
        format!(
            "{:<10} {:<28} {:<16} {:<8} {:<8} {:<6}",
            "ID", "TITLE", "AREA", "MODE", "STAGES", "RUNS"
        )
        .bold()
    );
    println!("{}", "─".repeat(80).dimmed());
    for template in templates {
        println!(
            "{:<10} {:<28} {:<16} {:<8} {:<8} {:<6}",
            utils::short_id(&template.id).cyan(),
            template.title,
            template.area,
            template.time_mode.as_str(),
            template.stage_sequence().len(),
            book.occurrences_of(&template.id).count()
        );
    }
}

fn title_of(book: &RecordBook, id: &str) -> String {
    book.get(id)
        .map(|r| r.title.clone())
        .unwrap_or_else(|| format!("{} (見つかりません)", utils::short_id(id)))
}

fn show(book: &RecordBook, id: &str) -> anyhow::Result<()> {
    let record = book.resolve(id)?;

    println!("{}", record.title.bold());
    println!("  ID:     {}", record.id.cyan());
    println!("  種別:   {}", record.kind());
    println!("  エリア: {}", record.area);
    if !record.description.is_empty() {
        println!("  説明:   {}", record.description);
    }
    if let Some(template_id) = &record.template_id {
        println!("  生成元: {}", title_of(book, template_id));
    }
    match record.time_mode {
        TimeMode::Simple => println!("  時間管理: ステージごと"),
        TimeMode::Total => println!(
            "  時間管理: 合計 ({})",
            record
                .max_time
                .map(|d| d.to_string())
                .unwrap_or_else(|| "未設定".to_string())
        ),
    }

    println!();
    println!("{}", "ステージ:".bold());
    for stage in record.stage_sequence() {
        let deadline = record
            .deadline(&stage)
            .map(|d| format!("{} ({})", d, format_compact(d.in_seconds() as u64)))
            .unwrap_or_else(|| "-".to_string());
        let marker = if stage.is_standard() { " " } else { "+" };
        println!("  {} {:<12} {}", marker, stage.to_string().cyan(), deadline);
    }

    if !record.relations.is_empty() {
        println!();
        println!("{}", "リレーション:".bold());
        if let Some(start) = &record.relations.start {
            println!("  先行: {}", title_of(book, start));
        }
        if let Some(end) = &record.relations.end {
            println!("  後続: {}", title_of(book, end));
        }
    }

    if !record.integrations.is_empty() {
        println!();
        println!("{}", "連携:".bold());
        for (stage, systems) in &record.integrations {
            for (system, triggers) in systems {
                let enabled: Vec<&str> = triggers
                    .iter()
                    .filter(|(_, on)| **on)
                    .map(|(trigger, _)| trigger.as_str())
                    .collect();
                if !enabled.is_empty() {
                    println!("  {} → {} ({})", stage, system, enabled.join(", "));
                }
            }
        }
    }

    if record.is_template() {
        let runs = book.occurrences_of(&record.id).count();
        println!();
        println!("オカレンス: {}件", runs);
    }
    Ok(())
}

async fn delete(app: &mut App, id: &str, yes: bool) -> anyhow::Result<()> {
    let record = app.book.resolve(id)?;
    if record.is_occurrence {
        anyhow::bail!(
            "'{}' はオカレンスです。ridec occurrence delete を使用してください",
            record.title
        );
    }
    let id = record.id.clone();
    let runs = app.book.occurrences_of(&id).count();

    if !yes {
        println!(
            "{}",
            format!("警告: テンプレート '{}' を削除します。", record.title).yellow()
        );
        if runs > 0 {
            println!("  {}件のオカレンスは残りますが、生成元なしとして表示されます", runs);
        }
        println!("実行するには --yes オプションを指定してください");
        return Ok(());
    }

    let deletion = app.book.delete(&id)?;
    app.persist(&deletion.changes).await?;
    println!(
        "{} テンプレートを削除しました: {}",
        "✓".green().bold(),
        deletion.removed.title.cyan()
    );
    if !deletion.detached.is_empty() {
        println!(
            "  {}件のレコードからリレーションを外しました",
            deletion.detached.len()
        );
    }
    Ok(())
}

async fn link(
    app: &mut App,
    id: &str,
    start: Option<String>,
    end: Option<String>,
    clear: bool,
) -> anyhow::Result<()> {
    let record = app.book.resolve(id)?;
    let id = record.id.clone();
    let relations = if clear {
        Relations::default()
    } else {
        let mut relations = record.relations.clone();
        if let Some(start) = start {
            relations.start = Some(app.book.resolve(&start)?.id.clone());
        }
        if let Some(end) = end {
            relations.end = Some(app.book.resolve(&end)?.id.clone());
        }
        relations
    };
    if relations.start.is_some() && relations.start == relations.end {
        anyhow::bail!("先行と後続に同じテンプレートは指定できません");
    }

    let changes = app.book.set_relations(&id, relations, Utc::now())?;
    app.persist(&changes).await?;

    let record = app.book.require(&id)?;
    println!("{} リレーションを更新しました: {}", "✓".green().bold(), record.title.cyan());
    let describe = |target: &Option<String>| {
        target
            .as_deref()
            .map(|t| title_of(&app.book, t))
            .unwrap_or_else(|| "なし".to_string())
    };
    println!("  先行: {}", describe(&record.relations.start));
    println!("  後続: {}", describe(&record.relations.end));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ridec_core::{
        Deadline, IntegrationTrigger, ProcessRecord, StageA, StageId, StagePosition,
    };

    #[test]
    fn test_apply_args_only_touches_given_fields() {
        let mut draft = TemplateDraft {
            title: "Compras".into(),
            area: "Suprimentos".into(),
            stages_a: vec![StageA::new("Review", StagePosition::DE)],
            ..Default::default()
        };
        let args = TemplateArgs {
            area: Some("Logística".into()),
            deadlines: vec![(StageId::Ri, Deadline::hours(2.0))],
            integrations: vec![(StageId::D, "slack".into(), IntegrationTrigger::Finish)],
            ..Default::default()
        };
        apply_args(args, &mut draft, &RecordBook::default());

        assert_eq!(draft.title, "Compras");
        assert_eq!(draft.area, "Logística");
        assert_eq!(draft.deadlines[&StageId::Ri], Deadline::hours(2.0));
        assert_eq!(draft.stages_a.len(), 1);
        assert!(draft.integrations[&StageId::D]["slack"]["finish"]);
    }

    #[test]
    fn test_apply_args_resolves_relation_prefix() {
        let now = Utc::now();
        let mut target = ProcessRecord::new_template("Target", now);
        target.id = "abcdef12-0000".into();
        let book = RecordBook::new(vec![target]);

        let mut draft = TemplateDraft::default();
        let args = TemplateArgs {
            start: Some("abcdef".into()),
            end: Some("missing".into()),
            no_stage_a: true,
            ..Default::default()
        };
        apply_args(args, &mut draft, &book);
        assert_eq!(draft.relations.start.as_deref(), Some("abcdef12-0000"));
        assert_eq!(draft.relations.end.as_deref(), Some("missing"));
        assert!(draft.stages_a.is_empty());
    }
}
