//! Scenario 命令处理

use anyhow::{Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use mtp_driver::{Platform, WebDriverClient};
use mtp_executor::{ExecutionReport, Scenario, ScenarioRunner, TestConfig};

use super::output::{self, OutputFormat, TableRow};
use crate::config::{expand_path, CliConfig};
use crate::observers::{ProgressObserver, ScreenshotObserver};

pub async fn handle(action: crate::ScenarioAction) -> Result<()> {
    match action {
        crate::ScenarioAction::Run {
            file,
            config,
            platform,
            format,
            output,
            screenshots,
        } => {
            let options = RunOptions {
                config,
                platform,
                format,
                output,
                screenshots,
            };
            run_scenario(&file, options).await
        }
        crate::ScenarioAction::Validate { file } => validate_scenario(&file),
        crate::ScenarioAction::List { format } => list_scenarios(format.as_deref()),
    }
}

struct RunOptions {
    config: Option<String>,
    platform: Option<String>,
    format: Option<String>,
    output: Option<String>,
    screenshots: bool,
}

fn spinner(message: String) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// 加载测试配置: 命令行参数 > CLI 配置 > 默认搜索路径
pub fn load_test_config(path: Option<&str>) -> Result<TestConfig> {
    let explicit = match path {
        Some(path) => Some(expand_path(path)),
        None => CliConfig::load()?.get_test_config(),
    };

    let mut config = match explicit {
        Some(path) => TestConfig::load_from_file(&path)?,
        None => return TestConfig::load(),
    };
    config.apply_env_vars()?;
    Ok(config)
}

async fn run_scenario(file: &str, options: RunOptions) -> Result<()> {
    let cli_config = CliConfig::load()?;
    let format = cli_config.output_format(options.format.as_deref())?;

    // 加载场景
    let spinner_bar = spinner(format!("加载场景: {}", file));
    let scenario = Scenario::from_file(expand_path(file))?;
    scenario.validate()?;
    let steps = scenario.expand_steps()?;
    spinner_bar.finish_with_message(format!(
        "{} 场景加载成功: {}",
        "✓".green().bold(),
        scenario.name.cyan()
    ));

    println!();
    if let Some(desc) = &scenario.description {
        println!("描述: {}", desc.bright_black());
    }
    println!("步骤数: {}", steps.len().to_string().yellow());
    if !scenario.tags.is_empty() {
        println!("标签: {}", scenario.tags.join(", ").bright_black());
    }

    // 加载测试配置
    let mut config = load_test_config(options.config.as_deref())?;
    if let Some(platform) = &options.platform {
        config.driver.platform = platform
            .parse::<Platform>()
            .with_context(|| format!("无效的平台: {}", platform))?;
    }
    config.validate()?;

    let mut fixtures = config.fixtures.clone();
    fixtures.ensure_random();
    println!("随机标记: {}", fixtures.random.bright_black());
    println!();

    // 创建 WebDriver 会话
    let spinner_bar = spinner(format!("连接 WebDriver: {}", config.driver.url));
    let client = Arc::new(WebDriverClient::new(
        &config.driver.url,
        config.webdriver_config(),
    )?);
    client
        .create_session()
        .await
        .with_context(|| format!("创建 WebDriver 会话失败: {}", config.driver.url))?;
    spinner_bar.finish_with_message(format!("{} WebDriver 会话已创建", "✓".green().bold()));

    // 创建场景执行器
    let progress = ProgressBar::new(steps.len() as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        progress.set_style(style.progress_chars("=>-"));
    }

    let mut runner = ScenarioRunner::new(client.clone())
        .with_wait_policy(config.wait_policy())
        .with_platform(config.driver.platform)
        .with_observer(Arc::new(ProgressObserver::new(progress.clone())));

    if let Some(timeout) = config.timing.scenario_timeout() {
        runner = runner.with_scenario_timeout(timeout);
    }
    if options.screenshots || config.diagnostics.screenshots {
        runner = runner.with_observer(Arc::new(ScreenshotObserver::new(client.clone())));
    }

    // Ctrl-C 中止执行
    let token = runner.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("收到中断信号, 中止场景执行");
            token.cancel();
        }
    });

    println!("\n{}\n", "开始执行场景...".bold());
    let result = runner.run(&scenario, &fixtures).await;
    progress.finish_and_clear();

    if let Err(e) = client.delete_session().await {
        warn!("关闭 WebDriver 会话失败: {}", e);
    }

    let report = result?;
    output::print_report(&report, format)?;

    let report_path = options.output.map(|p| expand_path(&p)).or_else(|| {
        config
            .diagnostics
            .report_dir
            .as_ref()
            .map(|dir| default_report_path(dir, &report))
    });
    if let Some(path) = report_path {
        save_report(&report, &path)?;
        println!("报告已保存: {}", path.display().to_string().cyan());
    }

    if !report.passed() {
        anyhow::bail!("场景执行失败");
    }

    Ok(())
}

fn default_report_path(dir: &Path, report: &ExecutionReport) -> PathBuf {
    dir.join(format!(
        "{}_{}.json",
        report.scenario_name,
        report.started_at.format("%Y%m%d-%H%M%S")
    ))
}

/// 保存执行报告，格式由扩展名决定
pub fn save_report(report: &ExecutionReport, path: &Path) -> Result<()> {
    let content = match path.extension().and_then(|s| s.to_str()) {
        Some("yaml") | Some("yml") => report.to_yaml()?,
        Some("json") => report.to_json()?,
        _ => anyhow::bail!("不支持的报告格式: {:?} (仅支持 .json/.yaml)", path),
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("创建报告目录失败: {:?}", parent))?;
    }
    std::fs::write(path, content).with_context(|| format!("写入报告失败: {:?}", path))?;
    Ok(())
}

fn validate_scenario(file: &str) -> Result<()> {
    let scenario = Scenario::from_file(expand_path(file))
        .with_context(|| format!("加载场景失败: {}", file))?;
    scenario.validate()?;

    let steps = scenario.expand_steps()?;
    let teardown = scenario.expand_teardown()?;

    println!("{} 场景有效: {}", "✓".green().bold(), scenario.name.cyan());
    println!("  流程:     {}", scenario.flows.len().to_string().yellow());
    println!("  步骤:     {}", steps.len().to_string().yellow());
    println!("  收尾步骤: {}", teardown.len().to_string().yellow());
    if let Some(platform) = scenario.platform {
        println!("  平台:     {}", platform);
    }

    Ok(())
}

/// 场景列表项
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioSummary {
    pub file: String,
    pub name: String,
    pub platform: Option<Platform>,
    pub steps: usize,
    pub tags: Vec<String>,
}

impl ScenarioSummary {
    fn from_scenario(path: &Path, scenario: &Scenario) -> Self {
        let file = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Self {
            file,
            name: scenario.name.clone(),
            platform: scenario.platform,
            steps: scenario
                .expand_steps()
                .map(|s| s.len())
                .unwrap_or(scenario.steps.len()),
            tags: scenario.tags.clone(),
        }
    }
}

impl TableRow for ScenarioSummary {
    fn headers() -> Vec<&'static str> {
        vec!["文件", "名称", "平台", "步骤", "标签"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.file.clone(),
            self.name.clone(),
            self.platform
                .map(|p| p.to_string())
                .unwrap_or_else(|| "all".to_string()),
            self.steps.to_string(),
            self.tags.join(","),
        ]
    }
}

/// 扫描目录中的场景文件，无法解析的文件记录警告后跳过
pub fn collect_scenarios(dir: &Path) -> Result<Vec<ScenarioSummary>> {
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("读取场景目录失败: {:?}", dir))?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .filter(|path| {
            matches!(
                path.extension().and_then(|s| s.to_str()),
                Some("yaml") | Some("yml") | Some("json")
            )
        })
        .collect();
    paths.sort();

    let mut scenarios = Vec::new();
    for path in paths {
        match Scenario::from_file(&path) {
            Ok(scenario) => scenarios.push(ScenarioSummary::from_scenario(&path, &scenario)),
            Err(e) => warn!("跳过无法解析的场景文件 {:?}: {}", path, e),
        }
    }

    Ok(scenarios)
}

fn list_scenarios(format: Option<&str>) -> Result<()> {
    let config = CliConfig::load()?;
    let format = config.output_format(format)?;
    let scenario_dir = config.get_scenario_dir();

    if !scenario_dir.exists() {
        println!("{}", format!("场景目录不存在: {:?}", scenario_dir).yellow());
        println!("\n可以通过 `mtp config set --scenario-dir <目录>` 指定场景目录");
        return Ok(());
    }

    let scenarios = collect_scenarios(&scenario_dir)?;

    if format == OutputFormat::Table {
        if scenarios.is_empty() {
            println!("{}", "没有找到任何场景文件".yellow());
            return Ok(());
        }
        println!("{}\n", format!("场景目录: {:?}", scenario_dir).bold());
    }

    output::output_formatted(&scenarios, format)
}
