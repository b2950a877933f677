//! Config 命令处理

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;

use mtp_executor::TestConfig;

use super::output::OutputFormat;
use super::scenario::load_test_config;
use crate::config::{expand_path, CliConfig};

pub fn handle(action: crate::ConfigAction) -> Result<()> {
    match action {
        crate::ConfigAction::Show { config, format } => show_config(config.as_deref(), &format),
        crate::ConfigAction::Init { path, force } => init_config(&expand_path(&path), force),
        crate::ConfigAction::Set {
            scenario_dir,
            test_config,
            format,
        } => set_config(scenario_dir, test_config, format),
    }
}

/// 序列化配置，密码和密钥替换为掩码
fn render_config(config: &TestConfig, format: &str) -> Result<String> {
    let mut masked = config.clone();
    masked.fixtures = config.fixtures.masked();

    let content = match format.to_lowercase().as_str() {
        "toml" => toml::to_string_pretty(&masked).context("序列化 TOML 失败")?,
        "json" => serde_json::to_string_pretty(&masked).context("序列化 JSON 失败")?,
        "yaml" | "yml" => serde_yaml::to_string(&masked).context("序列化 YAML 失败")?,
        other => anyhow::bail!("不支持的输出格式: {} (可选 toml/json/yaml)", other),
    };

    Ok(content)
}

fn show_config(path: Option<&str>, format: &str) -> Result<()> {
    let config = load_test_config(path)?;
    config.validate()?;
    println!("{}", render_config(&config, format)?.trim_end());
    Ok(())
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!("配置文件已存在: {:?} (使用 --force 覆盖)", path);
    }

    TestConfig::default().save_to_file(path)?;

    println!(
        "{} 已生成测试配置: {}",
        "✓".green().bold(),
        path.display().to_string().cyan()
    );
    println!("\n请填写 [driver] 和 [fixtures] 中的连接地址和测试账号");

    Ok(())
}

/// 合并命令行给出的修改，返回是否有变化
fn apply_settings(
    config: &mut CliConfig,
    scenario_dir: Option<String>,
    test_config: Option<String>,
    format: Option<String>,
) -> Result<bool> {
    let mut changed = false;

    if let Some(dir) = scenario_dir {
        config.scenario_dir = Some(dir);
        changed = true;
    }
    if let Some(path) = test_config {
        config.test_config = Some(path);
        changed = true;
    }
    if let Some(format) = format {
        format.parse::<OutputFormat>()?;
        config.default_format = format.to_lowercase();
        changed = true;
    }

    Ok(changed)
}

fn set_config(
    scenario_dir: Option<String>,
    test_config: Option<String>,
    format: Option<String>,
) -> Result<()> {
    let mut config = CliConfig::load()?;

    if !apply_settings(&mut config, scenario_dir, test_config, format)? {
        println!("{}", "没有需要修改的配置项".yellow());
        return Ok(());
    }

    config.save()?;

    println!("{} 配置已更新: {:?}", "✓".green().bold(), CliConfig::config_path()?);
    if let Some(dir) = &config.scenario_dir {
        println!("  场景目录:     {}", dir.yellow());
    }
    if let Some(path) = &config.test_config {
        println!("  测试配置文件: {}", path.yellow());
    }
    println!("  输出格式:     {}", config.default_format.yellow());

    Ok(())
}
