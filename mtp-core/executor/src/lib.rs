//! MTP 执行器
//!
//! UI 测试场景执行引擎

pub mod fixtures;
pub mod report;
pub mod runner;
pub mod scenario;
pub mod test_config;

pub use fixtures::Fixtures;
pub use report::{ExecutionReport, ScenarioOutcome, StepReport, StepState};
pub use runner::{ScenarioRunner, StepObserver, WaitPolicy};
pub use scenario::{Action, Scenario, ScenarioStep};
pub use test_config::{TestConfig, TimingConfig};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("场景加载失败: {0}")]
    ScenarioLoadFailed(String),

    #[error("未定义的流程: {0}")]
    UnknownFlow(String),

    #[error("流程循环引用: {0}")]
    FlowCycle(String),

    #[error("驱动错误: {0}")]
    DriverError(String),

    #[error("配置错误: {0}")]
    ConfigError(String),

    #[error("IO 错误: {0}")]
    IoError(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    SerdeError(String),
}

pub type Result<T> = std::result::Result<T, ExecutorError>;

/// 步骤失败原因
///
/// 写入执行报告，第一个失败的步骤会终止整个场景。
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepError {
    #[error("步骤 {step_index}: TOTP 密钥无效: {message}")]
    InvalidSecret { step_index: usize, message: String },

    #[error("步骤 {step_index}: 等待 {target} 超时 ({timeout_ms}ms)")]
    Timeout {
        step_index: usize,
        target: String,
        timeout_ms: u64,
    },

    #[error("步骤 {step_index}: 未找到目标 {target}")]
    Locate { step_index: usize, target: String },

    #[error("步骤 {step_index}: 断言失败, {target} 应{expected}")]
    Assertion {
        step_index: usize,
        target: String,
        expected: String,
    },

    #[error("步骤 {step_index}: 执行已中止: {reason}")]
    Aborted { step_index: usize, reason: String },

    #[error("步骤 {step_index}: 驱动错误: {message}")]
    Driver { step_index: usize, message: String },

    #[error("步骤 {step_index}: 模板错误: {message}")]
    Template { step_index: usize, message: String },
}

impl StepError {
    /// 失败步骤索引
    pub fn step_index(&self) -> usize {
        match self {
            StepError::InvalidSecret { step_index, .. }
            | StepError::Timeout { step_index, .. }
            | StepError::Locate { step_index, .. }
            | StepError::Assertion { step_index, .. }
            | StepError::Aborted { step_index, .. }
            | StepError::Driver { step_index, .. }
            | StepError::Template { step_index, .. } => *step_index,
        }
    }

    /// 错误类别名称
    pub fn kind(&self) -> &'static str {
        match self {
            StepError::InvalidSecret { .. } => "invalid_secret",
            StepError::Timeout { .. } => "timeout",
            StepError::Locate { .. } => "locate",
            StepError::Assertion { .. } => "assertion",
            StepError::Aborted { .. } => "aborted",
            StepError::Driver { .. } => "driver",
            StepError::Template { .. } => "template",
        }
    }
}
