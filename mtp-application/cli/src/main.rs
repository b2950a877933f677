//! MTP CLI 应用

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{debug, Level};

mod commands;
mod config;
mod observers;

#[derive(Parser)]
#[command(name = "mtp")]
#[command(about = "MTP - 移动端 UI 自动化测试工具", long_about = None)]
#[command(version)]
struct Cli {
    /// 日志级别 (默认使用测试配置中的 environment.log_level)
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 场景管理
    Scenario {
        #[command(subcommand)]
        action: ScenarioAction,
    },

    /// TOTP 验证码工具
    Totp {
        #[command(subcommand)]
        action: TotpAction,
    },

    /// 配置管理
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ScenarioAction {
    /// 运行场景
    Run {
        /// 场景文件路径
        file: String,

        /// 测试配置文件路径 (默认按搜索路径查找)
        #[arg(short, long)]
        config: Option<String>,

        /// 指定平台 (ios/android)，覆盖配置
        #[arg(short, long)]
        platform: Option<String>,

        /// 输出格式 (table/json/yaml)
        #[arg(short = 'f', long)]
        format: Option<String>,

        /// 保存执行报告 (.json/.yaml)
        #[arg(short, long)]
        output: Option<String>,

        /// 每个步骤结束后截图
        #[arg(long)]
        screenshots: bool,
    },

    /// 检查场景文件 (格式、流程引用)
    Validate {
        /// 场景文件路径
        file: String,
    },

    /// 列出场景
    List {
        /// 输出格式 (table/json/yaml)
        #[arg(short = 'f', long)]
        format: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum TotpAction {
    /// 生成验证码
    Gen {
        /// base32 密钥 (默认使用测试配置中的备用用户密钥)
        #[arg(short, long)]
        secret: Option<String>,

        /// 验证码位数
        #[arg(short, long, default_value = "6")]
        digits: usize,

        /// Unix 时间戳 (秒)，默认当前时间
        #[arg(short, long)]
        time: Option<u64>,
    },

    /// 校验验证码
    Verify {
        /// 验证码
        code: String,

        /// base32 密钥 (默认使用测试配置中的备用用户密钥)
        #[arg(short, long)]
        secret: Option<String>,

        /// Unix 时间戳 (秒)，默认当前时间
        #[arg(short, long)]
        time: Option<u64>,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// 显示生效的测试配置 (密码和密钥已隐藏)
    Show {
        /// 测试配置文件路径
        #[arg(short, long)]
        config: Option<String>,

        /// 输出格式 (toml/json/yaml)
        #[arg(short = 'f', long, default_value = "toml")]
        format: String,
    },

    /// 生成默认测试配置文件
    Init {
        /// 输出路径
        #[arg(default_value = "mtp.toml")]
        path: String,

        /// 覆盖已存在的文件
        #[arg(long)]
        force: bool,
    },

    /// 修改 CLI 配置 (~/.config/mtp/config.toml)
    Set {
        /// 场景目录
        #[arg(long)]
        scenario_dir: Option<String>,

        /// 默认测试配置文件
        #[arg(long)]
        test_config: Option<String>,

        /// 默认输出格式
        #[arg(long)]
        format: Option<String>,
    },
}

impl Commands {
    /// 命令行指定的测试配置文件
    fn test_config_path(&self) -> Option<&str> {
        match self {
            Commands::Scenario {
                action: ScenarioAction::Run { config, .. },
            }
            | Commands::Config {
                action: ConfigAction::Show { config, .. },
            } => config.as_deref(),
            _ => None,
        }
    }
}

fn parse_level(level: &str) -> Option<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// 日志级别: 命令行 > 测试配置 > info
fn resolve_log_level(flag: Option<&str>, config_level: impl FnOnce() -> Option<String>) -> Level {
    let level = match flag {
        Some(flag) => parse_level(flag),
        None => config_level().as_deref().and_then(parse_level),
    };
    level.unwrap_or(Level::INFO)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 初始化日志
    let config_path = cli.command.test_config_path().map(str::to_string);
    let log_level = resolve_log_level(cli.log_level.as_deref(), || {
        commands::scenario::load_test_config(config_path.as_deref())
            .ok()
            .map(|config| config.environment.log_level)
    });

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.as_str().to_lowercase().into()),
        )
        .with_writer(std::io::stderr)
        .init();

    debug!("MTP CLI 启动");

    match cli.command {
        Commands::Scenario { action } => commands::scenario::handle(action).await?,
        Commands::Totp { action } => commands::totp::handle(action)?,
        Commands::Config { action } => commands::config::handle(action)?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_flag_wins() {
        let level = resolve_log_level(Some("debug"), || Some("error".to_string()));
        assert_eq!(level, Level::DEBUG);
    }

    #[test]
    fn test_log_level_from_test_config() {
        assert_eq!(resolve_log_level(None, || Some("WARN".to_string())), Level::WARN);
        assert_eq!(resolve_log_level(None, || None), Level::INFO);
        assert_eq!(resolve_log_level(None, || Some("loud".to_string())), Level::INFO);
    }

    #[test]
    fn test_test_config_path() {
        let cli = Cli::parse_from(["mtp", "scenario", "run", "a.yaml", "--config", "mtp.yaml"]);
        assert_eq!(cli.command.test_config_path(), Some("mtp.yaml"));
        assert!(cli.log_level.is_none());

        let cli = Cli::parse_from(["mtp", "-l", "trace", "totp", "gen"]);
        assert_eq!(cli.command.test_config_path(), None);
        assert_eq!(cli.log_level.as_deref(), Some("trace"));
    }
}
