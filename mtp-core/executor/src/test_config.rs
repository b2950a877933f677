//! 测试配置管理
//!
//! 支持从多个源加载测试配置:
//! - 环境变量 (优先级最高)
//! - 配置文件 (TOML/YAML/JSON)
//! - 默认值 (优先级最低)
//!
//! 配置文件搜索路径 (按优先级):
//! 1. `MTP_TEST_CONFIG` 环境变量指定的路径
//! 2. `./mtp.toml` (当前目录)
//! 3. `./tests/config.toml` (tests 目录)
//! 4. `~/.config/mtp/test.toml` (用户配置目录)
//! 5. `/etc/mtp/test.toml` (系统配置目录)

use anyhow::{Context, Result};
use mtp_driver::{Platform, WebDriverConfig};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{Fixtures, WaitPolicy};

/// 场景超时上限 (秒)
pub const MAX_SCENARIO_TIMEOUT_SECS: u64 = 7 * 24 * 3600;

// ============================================
// 核心配置结构
// ============================================

/// 测试配置 (顶层)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestConfig {
    /// 环境配置
    #[serde(default)]
    pub environment: EnvironmentConfig,

    /// 驱动配置
    #[serde(default)]
    pub driver: DriverConfig,

    /// 等待与超时配置
    #[serde(default)]
    pub timing: TimingConfig,

    /// 测试夹具 (账号、密钥等)
    #[serde(default)]
    pub fixtures: Fixtures,

    /// 诊断输出配置
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
}

/// 环境配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// 日志级别 (debug/info/warn/error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// WebDriver / Appium 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    /// 服务端地址
    #[serde(default = "default_driver_url")]
    pub url: String,

    /// 设备平台
    #[serde(default = "default_platform")]
    pub platform: Platform,

    /// 被测应用标识
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,

    /// 连接超时 (秒)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,

    /// 请求超时 (秒)
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,

    /// 额外的会话能力
    #[serde(default)]
    pub capabilities: Map<String, Value>,
}

/// 等待与超时配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// 默认等待时间 (毫秒)
    #[serde(default = "default_wait_ms")]
    pub default_wait_ms: u64,

    /// 轮询间隔 (毫秒)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// 全局超时倍率
    #[serde(default = "default_scale")]
    pub timeout_scale: f64,

    /// Android 超时倍率 (Android 上等待普遍更慢)
    #[serde(default = "default_scale")]
    pub android_timeout_scale: f64,

    /// 场景整体超时 (秒)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario_timeout_secs: Option<u64>,
}

/// 诊断输出配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    /// 每个步骤结束后截图
    #[serde(default)]
    pub screenshots: bool,

    /// 截图目录
    #[serde(default = "default_screenshot_dir")]
    pub screenshot_dir: PathBuf,

    /// 报告输出目录
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_dir: Option<PathBuf>,
}

// ============================================
// 默认值函数
// ============================================

fn default_log_level() -> String {
    "info".to_string()
}
fn default_driver_url() -> String {
    "http://127.0.0.1:4723".to_string()
}
fn default_platform() -> Platform {
    Platform::Ios
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_request_timeout() -> u64 {
    120
}
fn default_wait_ms() -> u64 {
    5000
}
fn default_poll_interval_ms() -> u64 {
    100
}
fn default_scale() -> f64 {
    1.0
}
fn default_screenshot_dir() -> PathBuf {
    PathBuf::from("./artifacts/screenshots")
}

// ============================================
// Default 实现
// ============================================

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            url: default_driver_url(),
            platform: default_platform(),
            app_id: None,
            capabilities: Map::new(),
            connect_timeout: default_connect_timeout(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            default_wait_ms: default_wait_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            timeout_scale: default_scale(),
            android_timeout_scale: default_scale(),
            scenario_timeout_secs: None,
        }
    }
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            screenshots: false,
            screenshot_dir: default_screenshot_dir(),
            report_dir: None,
        }
    }
}

impl TimingConfig {
    /// 转换为执行器的等待策略
    pub fn wait_policy(&self) -> WaitPolicy {
        WaitPolicy {
            default_wait: Duration::from_millis(self.default_wait_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            timeout_scale: self.timeout_scale,
            android_timeout_scale: self.android_timeout_scale,
        }
    }

    pub fn scenario_timeout(&self) -> Option<Duration> {
        self.scenario_timeout_secs.map(Duration::from_secs)
    }
}

// ============================================
// 配置加载实现
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Toml,
    Yaml,
    Json,
}

fn detect_format(path: &Path) -> Result<Format> {
    match path.extension().and_then(|s| s.to_str()) {
        Some("toml") => Ok(Format::Toml),
        Some("yaml") | Some("yml") => Ok(Format::Yaml),
        Some("json") => Ok(Format::Json),
        _ => anyhow::bail!("不支持的配置文件格式: {:?}", path),
    }
}

impl TestConfig {
    /// 从多个源加载配置 (优先级: 环境变量 > 配置文件 > 默认值)
    pub fn load() -> Result<Self> {
        let mut config = match Self::find_config_file() {
            Some(path) => {
                tracing::debug!("加载测试配置: {:?}", path);
                Self::load_from_file(&path)?
            }
            None => {
                tracing::debug!("未找到配置文件, 使用默认配置");
                Self::default()
            }
        };

        config.apply_env_vars()?;

        Ok(config)
    }

    /// 从指定文件加载配置
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败: {:?}", path))?;

        let config = match detect_format(path)? {
            Format::Toml => toml::from_str(&content)
                .with_context(|| format!("解析 TOML 配置失败: {:?}", path))?,
            Format::Yaml => serde_yaml::from_str(&content)
                .with_context(|| format!("解析 YAML 配置失败: {:?}", path))?,
            Format::Json => serde_json::from_str(&content)
                .with_context(|| format!("解析 JSON 配置失败: {:?}", path))?,
        };

        Ok(config)
    }

    /// 从指定路径字符串加载配置
    pub fn load_from_path(path: &str) -> Result<Self> {
        Self::load_from_file(Path::new(path))
    }

    /// 查找配置文件 (按优先级搜索)
    pub fn find_config_file() -> Option<PathBuf> {
        if let Ok(path) = env::var("MTP_TEST_CONFIG") {
            let p = PathBuf::from(path);
            if p.exists() {
                return Some(p);
            }
        }

        let mut paths = vec![
            PathBuf::from("./mtp.toml"),
            PathBuf::from("./mtp.yaml"),
            PathBuf::from("./mtp.json"),
            PathBuf::from("./tests/config.toml"),
            PathBuf::from("./tests/config.yaml"),
        ];

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".config/mtp/test.toml"));
            paths.push(home.join(".config/mtp/test.yaml"));
        }

        #[cfg(target_os = "linux")]
        {
            paths.push(PathBuf::from("/etc/mtp/test.toml"));
            paths.push(PathBuf::from("/etc/mtp/test.yaml"));
        }

        paths.into_iter().find(|p| p.exists())
    }

    /// 从环境变量覆盖配置
    pub fn apply_env_vars(&mut self) -> Result<()> {
        self.apply_vars(|key| env::var(key).ok())
    }

    fn apply_vars<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Environment
        if let Some(level) = lookup("MTP_LOG_LEVEL") {
            self.environment.log_level = level;
        }

        // Driver
        if let Some(url) = lookup("MTP_DRIVER_URL") {
            self.driver.url = url;
        }
        if let Some(platform) = lookup("MTP_PLATFORM") {
            self.driver.platform = platform
                .parse()
                .with_context(|| format!("无效的 MTP_PLATFORM: {}", platform))?;
        }
        if let Some(app_id) = lookup("MTP_APP_ID") {
            self.driver.app_id = Some(app_id);
        }

        // Timing
        if let Some(wait) = lookup("MTP_DEFAULT_WAIT_MS") {
            self.timing.default_wait_ms = wait.parse().context("无效的 MTP_DEFAULT_WAIT_MS")?;
        }
        if let Some(poll) = lookup("MTP_POLL_INTERVAL_MS") {
            self.timing.poll_interval_ms = poll.parse().context("无效的 MTP_POLL_INTERVAL_MS")?;
        }
        if let Some(scale) = lookup("MTP_TIMEOUT_SCALE") {
            self.timing.timeout_scale = scale.parse().context("无效的 MTP_TIMEOUT_SCALE")?;
        }
        if let Some(scale) = lookup("MTP_ANDROID_TIMEOUT_SCALE") {
            self.timing.android_timeout_scale =
                scale.parse().context("无效的 MTP_ANDROID_TIMEOUT_SCALE")?;
        }
        if let Some(secs) = lookup("MTP_SCENARIO_TIMEOUT") {
            self.timing.scenario_timeout_secs =
                Some(secs.parse().context("无效的 MTP_SCENARIO_TIMEOUT")?);
        }

        // Fixtures
        if let Some(user) = lookup("MTP_USER") {
            self.fixtures.user = user;
        }
        if let Some(password) = lookup("MTP_PASSWORD") {
            self.fixtures.password = password;
        }
        if let Some(user) = lookup("MTP_ALTERNATE_USER") {
            self.fixtures.alternate_user = user;
        }
        if let Some(password) = lookup("MTP_ALTERNATE_USER_PASSWORD") {
            self.fixtures.alternate_user_password = password;
        }
        if let Some(secret) = lookup("MTP_ALTERNATE_USER_TOTP_SECRET") {
            self.fixtures.alternate_user_totp_secret = secret;
        }
        if let Some(random) = lookup("MTP_RANDOM") {
            self.fixtures.random = random;
        }

        // Diagnostics
        if let Some(dir) = lookup("MTP_SCREENSHOT_DIR") {
            self.diagnostics.screenshot_dir = PathBuf::from(dir);
        }

        Ok(())
    }

    /// 验证配置
    pub fn validate(&self) -> Result<()> {
        if self.driver.url.is_empty() {
            anyhow::bail!("driver.url 不能为空");
        }
        if !self.driver.url.starts_with("http://") && !self.driver.url.starts_with("https://") {
            anyhow::bail!("driver.url 必须以 http:// 或 https:// 开头: {}", self.driver.url);
        }

        if self.timing.poll_interval_ms == 0 {
            anyhow::bail!("timing.poll_interval_ms 必须大于 0");
        }
        for (name, scale) in [
            ("timing.timeout_scale", self.timing.timeout_scale),
            ("timing.android_timeout_scale", self.timing.android_timeout_scale),
        ] {
            if !scale.is_finite() || scale <= 0.0 {
                anyhow::bail!("{} 必须是正数: {}", name, scale);
            }
        }

        if let Some(secs) = self.timing.scenario_timeout_secs {
            if secs == 0 || secs > MAX_SCENARIO_TIMEOUT_SECS {
                anyhow::bail!(
                    "timing.scenario_timeout_secs 必须在 1..={} 之间: {}",
                    MAX_SCENARIO_TIMEOUT_SECS,
                    secs
                );
            }
        }

        let secret = &self.fixtures.alternate_user_totp_secret;
        if !secret.is_empty() {
            mtp_totp::decode_secret(secret)
                .context("fixtures.alternate_user_totp_secret 不是有效的 base32 密钥")?;
        }

        Ok(())
    }

    /// 保存配置到文件
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("创建目录失败: {:?}", parent))?;
        }

        let content = match detect_format(path)? {
            Format::Toml => toml::to_string_pretty(self).context("序列化 TOML 失败")?,
            Format::Yaml => serde_yaml::to_string(self).context("序列化 YAML 失败")?,
            Format::Json => serde_json::to_string_pretty(self).context("序列化 JSON 失败")?,
        };

        fs::write(path, content).with_context(|| format!("写入配置文件失败: {:?}", path))?;

        Ok(())
    }

    /// 执行器等待策略
    pub fn wait_policy(&self) -> WaitPolicy {
        self.timing.wait_policy()
    }

    /// WebDriver 客户端配置
    pub fn webdriver_config(&self) -> WebDriverConfig {
        WebDriverConfig {
            platform: self.driver.platform,
            app_id: self.driver.app_id.clone(),
            capabilities: Value::Object(self.driver.capabilities.clone()),
            connect_timeout: self.driver.connect_timeout,
            request_timeout: self.driver.request_timeout,
            screenshot_dir: self.diagnostics.screenshot_dir.clone(),
        }
    }
}
