//! CLI 通用输出格式化模块
//!
//! 提供 table/json/yaml 三种输出格式的通用实现

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use std::fmt::Write as _;
use std::str::FromStr;

use mtp_executor::{ExecutionReport, ScenarioOutcome, StepReport, StepState};

/// 输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    Yaml,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            other => anyhow::bail!("不支持的输出格式: {} (可选 table/json/yaml)", other),
        }
    }
}

/// 可输出为表格行的数据 trait
pub trait TableRow {
    /// 返回表格列标题
    fn headers() -> Vec<&'static str>;

    /// 返回该项的表格行数据
    fn row(&self) -> Vec<String>;
}

/// 表格格式输出
pub fn render_table<T: TableRow>(items: &[T]) -> String {
    let headers = T::headers();
    let mut out = String::new();

    let header_line: String = headers
        .iter()
        .map(|h| format!("{:<24}", h))
        .collect::<Vec<_>>()
        .join(" ");
    let _ = writeln!(out, "{}", header_line.trim_end());
    let _ = writeln!(out, "{}", "-".repeat(header_line.trim_end().len()));

    for item in items {
        let row_line: String = item
            .row()
            .iter()
            .map(|c| format!("{:<24}", c))
            .collect::<Vec<_>>()
            .join(" ");
        let _ = writeln!(out, "{}", row_line.trim_end());
    }

    out
}

/// 根据格式参数选择输出方式
pub fn output_formatted<T: TableRow + Serialize>(items: &[T], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(items)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(items)?),
        OutputFormat::Table => print!("{}", render_table(items)),
    }
    Ok(())
}

fn state_icon(state: StepState) -> colored::ColoredString {
    match state {
        StepState::Passed => "✓".green(),
        StepState::Failed => "✗".red(),
        StepState::Skipped => "⊘".yellow(),
        StepState::Pending | StepState::Running => "·".bright_black(),
    }
}

fn render_step(out: &mut String, step: &StepReport) {
    let _ = writeln!(
        out,
        "{} 步骤 {}: {}",
        state_icon(step.state).bold(),
        (step.step_index + 1).to_string().bright_black(),
        step.description
    );

    if let Some(output) = &step.output {
        let _ = writeln!(out, "   输出: {}", output.bright_black());
    }

    if let Some(error) = &step.error {
        let _ = writeln!(out, "   错误: {}", error.to_string().red());
    }

    if step.state.is_terminal() && step.state != StepState::Skipped {
        let _ = writeln!(out, "   耗时: {} ms", step.duration_ms.to_string().bright_black());
    }
}

/// 渲染执行报告
pub fn render_report(report: &ExecutionReport) -> String {
    let mut out = String::new();
    let rule = "=".repeat(60);

    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "{}", "执行报告".bold());
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out);

    let _ = writeln!(out, "场景名称: {}", report.scenario_name.cyan().bold());
    if let Some(desc) = &report.description {
        let _ = writeln!(out, "场景描述: {}", desc.bright_black());
    }
    let _ = writeln!(out, "执行平台: {}", report.platform);
    let _ = writeln!(
        out,
        "开始时间: {}",
        report.started_at.format("%Y-%m-%d %H:%M:%S")
    );
    let _ = writeln!(out, "执行时间: {} ms", report.duration_ms.to_string().yellow());
    let _ = writeln!(out);

    let _ = writeln!(out, "步骤统计:");
    let _ = writeln!(out, "  总步骤: {}", report.steps.len().to_string().bright_blue());
    let _ = writeln!(out, "  成功:   {}", report.passed_count.to_string().green());
    let _ = writeln!(out, "  失败:   {}", report.failed_count.to_string().red());
    let _ = writeln!(out, "  跳过:   {}", report.skipped_count.to_string().yellow());
    let _ = writeln!(out, "  未执行: {}", report.pending_count().to_string().bright_black());
    let _ = writeln!(out);

    if !report.steps.is_empty() {
        let _ = writeln!(out, "步骤详情:");
        let _ = writeln!(out);
        for step in &report.steps {
            render_step(&mut out, step);
        }
        let _ = writeln!(out);
    }

    if !report.teardown.is_empty() {
        let _ = writeln!(out, "收尾步骤:");
        let _ = writeln!(out);
        for step in &report.teardown {
            render_step(&mut out, step);
        }
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "{}", rule);
    match &report.outcome {
        ScenarioOutcome::Success => {
            let _ = writeln!(out, "{} 场景执行成功", "✓".green().bold());
        }
        ScenarioOutcome::Failure {
            failed_step_index,
            reason,
        } => {
            let _ = writeln!(
                out,
                "{} 场景执行失败 (步骤 {}: {})",
                "✗".red().bold(),
                failed_step_index + 1,
                reason.kind()
            );
        }
    }
    let _ = writeln!(out, "{}", rule);

    out
}

/// 输出执行报告
pub fn print_report(report: &ExecutionReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => print!("{}", render_report(report)),
        OutputFormat::Json => println!("{}", report.to_json()?),
        OutputFormat::Yaml => print!("{}", report.to_yaml()?),
    }
    Ok(())
}
