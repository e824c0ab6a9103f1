use crate::app::App;
use colored::Colorize;

use super::super::{AreaCommands, IntegrationCommands};

pub async fn handle_area(app: &App, cmd: AreaCommands) -> anyhow::Result<()> {
    let preferences = app.preferences();
    match cmd {
        AreaCommands::Collapse { area } => {
            preferences.set_area_collapsed(&area, true).await?;
            println!("{} エリア '{}' を折りたたみました", "✓".green().bold(), area);
        }
        AreaCommands::Expand { area } => {
            preferences.set_area_collapsed(&area, false).await?;
            println!("{} エリア '{}' を展開しました", "✓".green().bold(), area);
        }
    }
    Ok(())
}

pub async fn handle_integration(app: &App, cmd: IntegrationCommands) -> anyhow::Result<()> {
    let preferences = app.preferences();
    match cmd {
        IntegrationCommands::Set { system, config } => {
            let value: serde_json::Value = serde_json::from_str(&config)
                .map_err(|e| anyhow::anyhow!("設定のJSONが不正です: {}", e))?;
            preferences.set_integration(&system, &value).await?;
            println!("{} 連携設定を保存しました: {}", "✓".green().bold(), system.cyan());
        }
        IntegrationCommands::Show { system } => match preferences.integration(&system).await? {
            Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
            None => println!("{}", format!("{} の連携設定はありません", system).dimmed()),
        },
    }
    Ok(())
}
