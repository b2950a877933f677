//! CLI 配置管理
//!
//! **数据存储方式**: TOML 文件 (~/.config/mtp/config.toml)
//!
//! 测试运行所需的驱动、账号等配置见 `mtp_executor::TestConfig`，
//! 这里只保存命令行工具自身的偏好设置。

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::commands::output::OutputFormat;

/// CLI 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// 场景目录
    pub scenario_dir: Option<String>,

    /// 默认测试配置文件
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_config: Option<String>,

    /// 默认输出格式 (table/json/yaml)
    #[serde(default = "default_format")]
    pub default_format: String,

    /// 配置版本
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_format() -> String {
    "table".to_string()
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            scenario_dir: Some("./scenarios".to_string()),
            test_config: None,
            default_format: default_format(),
            version: default_version(),
        }
    }
}

/// 展开路径中的 `~` 和环境变量
pub fn expand_path(path: &str) -> PathBuf {
    match shellexpand::full(path) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(shellexpand::tilde(path).as_ref()),
    }
}

impl CliConfig {
    /// 获取配置文件路径
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("无法获取用户主目录")?;
        Ok(home.join(".config").join("mtp").join("config.toml"))
    }

    /// 加载配置
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("读取配置文件失败: {:?}", path))?;

        toml::from_str(&content).with_context(|| format!("解析配置文件失败: {:?}", path))
    }

    /// 保存配置
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("创建配置目录失败: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("序列化配置失败")?;

        fs::write(&path, content).with_context(|| format!("写入配置文件失败: {:?}", path))?;

        Ok(())
    }

    /// 获取场景目录
    pub fn get_scenario_dir(&self) -> PathBuf {
        expand_path(self.scenario_dir.as_deref().unwrap_or("./scenarios"))
    }

    /// 默认测试配置文件
    pub fn get_test_config(&self) -> Option<PathBuf> {
        self.test_config.as_deref().map(expand_path)
    }

    /// 解析输出格式，未指定时使用默认格式
    pub fn output_format(&self, requested: Option<&str>) -> Result<OutputFormat> {
        requested.unwrap_or(&self.default_format).parse()
    }
}
