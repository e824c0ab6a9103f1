use colored::{ColoredString, Colorize};
use ridec_core::dashboard::{ChartPoint, RecordStatus};
use ridec_core::{
    Deadline, FormStep, IntegrationTrigger, StageA, StageId, StagePosition, StageState,
    ValidationErrors,
};

/// 一覧表示用の短縮ID
pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(8) {
        Some((index, _)) => &id[..index],
        None => id,
    }
}

/// `RI=2h` 形式 (標準ステージの期限)
pub fn parse_stage_deadline(input: &str) -> Result<(StageId, Deadline), String> {
    let (stage, deadline) = input
        .split_once('=')
        .ok_or_else(|| format!("'{}' は STAGE=期限 の形式で指定してください (例: RI=2h)", input))?;
    let stage = StageId::parse_loose(stage);
    if !stage.is_standard() {
        return Err(format!(
            "'{}' は標準ステージではありません (RI, D, E, C)",
            stage
        ));
    }
    Ok((stage, deadline.parse()?))
}

/// `Review@d-e=30m` 形式 (期限は省略可)
pub fn parse_stage_a(input: &str) -> Result<StageA, String> {
    let (identifier, rest) = input.split_once('@').ok_or_else(|| {
        format!(
            "'{}' は 識別子@位置[=期限] の形式で指定してください (例: Review@d-e=30m)",
            input
        )
    })?;
    let (position, deadline) = match rest.split_once('=') {
        Some((position, deadline)) => (position, Some(deadline.parse::<Deadline>()?)),
        None => (rest, None),
    };
    let position: StagePosition = position.parse()?;
    let stage = StageA::new(identifier.trim(), position);
    Ok(match deadline {
        Some(deadline) => stage.with_deadline(deadline),
        None => stage,
    })
}

/// `D:slack:start` 形式の連携トリガー
pub fn parse_integration(input: &str) -> Result<(StageId, String, IntegrationTrigger), String> {
    let parts: Vec<&str> = input.split(':').map(str::trim).collect();
    let [stage, system, trigger] = parts.as_slice() else {
        return Err(format!(
            "'{}' は ステージ:システム:start|finish の形式で指定してください",
            input
        ));
    };
    if system.is_empty() {
        return Err("システム名が空です".to_string());
    }
    let trigger = match trigger.to_ascii_lowercase().as_str() {
        "start" => IntegrationTrigger::Start,
        "finish" => IntegrationTrigger::Finish,
        other => return Err(format!("不明なトリガー: {} (start または finish)", other)),
    };
    Ok((StageId::parse_loose(stage), system.to_string(), trigger))
}

/// フォームの検証エラーを表示
pub fn print_validation_errors(step: FormStep, errors: &ValidationErrors) {
    eprintln!(
        "{} ステップ「{}」で入力エラーがあります:",
        "✗".red().bold(),
        step.label()
    );
    for error in &errors.errors {
        eprintln!("  • {}: {}", error.field.yellow(), error.message);
    }
}

pub fn status_colored(status: RecordStatus) -> ColoredString {
    match status {
        RecordStatus::NotStarted => status.label().dimmed(),
        RecordStatus::InProgress => status.label().cyan(),
        RecordStatus::Overdue => status.label().red().bold(),
        RecordStatus::Completed => status.label().green(),
    }
}

pub fn state_colored(state: StageState, overdue: bool) -> ColoredString {
    if overdue && state != StageState::Completed {
        return "期限切れ".red().bold();
    }
    match state {
        StageState::Pending => "未開始".dimmed(),
        StageState::Running => "実行中".cyan().bold(),
        StageState::Paused => "一時停止".yellow(),
        StageState::Completed => "完了".green(),
    }
}

const BAR_WIDTH: usize = 30;

/// 横棒グラフを表示
pub fn print_bar_chart(title: &str, points: &[ChartPoint], unit: &str) {
    println!("{}", title.bold());
    if points.is_empty() {
        println!("  {}", "データがありません".dimmed());
        return;
    }
    let max = points.iter().map(|p| p.value).fold(0.0_f64, f64::max);
    let label_width = points
        .iter()
        .map(|p| p.label.chars().count())
        .max()
        .unwrap_or(0);
    for point in points {
        let filled = if max > 0.0 {
            ((point.value / max) * BAR_WIDTH as f64).round() as usize
        } else {
            0
        };
        let padding = label_width.saturating_sub(point.label.chars().count());
        println!(
            "  {}{} {} {}",
            point.label,
            " ".repeat(padding),
            "█".repeat(filled).cyan(),
            format_value(point.value, unit)
        );
    }
}

fn format_value(value: f64, unit: &str) -> String {
    if value.fract() == 0.0 {
        format!("{}{}", value, unit)
    } else {
        format!("{:.1}{}", value, unit)
    }
}
