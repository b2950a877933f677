//! MTP 驱动层
//!
//! 定义场景执行器依赖的 UI 自动化协作接口，以及基于
//! W3C WebDriver / Appium HTTP 协议的实现。

pub mod traits;
pub mod types;
pub mod webdriver;

pub use traits::{DiagnosticCapture, UiDriver};
pub use types::{ElementHandle, Locator, Platform, Target};
pub use webdriver::{WebDriverClient, WebDriverConfig};

use thiserror::Error;

/// 驱动错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("HTTP 错误: {0}")]
    HttpError(String),

    #[error("WebDriver 错误 [{0}]: {1}")]
    ApiError(u16, String),

    #[error("解析错误: {0}")]
    ParseError(String),

    /// 元素不存在或已失效 (`no such element` / `stale element reference`)
    #[error("元素已失效: {0}")]
    ElementGone(String),

    #[error("会话错误: {0}")]
    SessionError(String),

    #[error("配置错误: {0}")]
    ConfigError(String),

    #[error("不支持的操作: {0}")]
    Unsupported(String),

    #[error("IO 错误: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DriverError>;
