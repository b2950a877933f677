//! 步骤观察者: 进度条和诊断截图

use async_trait::async_trait;
use indicatif::ProgressBar;
use std::sync::Arc;
use tracing::{debug, warn};

use mtp_driver::DiagnosticCapture;
use mtp_executor::{ScenarioStep, StepObserver, StepReport, StepState};

/// 更新进度条
pub struct ProgressObserver {
    bar: ProgressBar,
}

impl ProgressObserver {
    pub fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }
}

#[async_trait]
impl StepObserver for ProgressObserver {
    async fn after_step(&self, _step: &ScenarioStep, report: &StepReport) {
        self.bar.set_message(report.description.clone());
        self.bar.inc(1);
    }
}

/// 每个执行过的步骤结束后截图，跳过的步骤不截图
pub struct ScreenshotObserver {
    capture: Arc<dyn DiagnosticCapture>,
}

impl ScreenshotObserver {
    pub fn new(capture: Arc<dyn DiagnosticCapture>) -> Self {
        Self { capture }
    }

    pub fn label(report: &StepReport) -> String {
        format!("{:02}_{}", report.step_index + 1, report.description)
    }
}

#[async_trait]
impl StepObserver for ScreenshotObserver {
    async fn after_step(&self, _step: &ScenarioStep, report: &StepReport) {
        if !matches!(report.state, StepState::Passed | StepState::Failed) {
            return;
        }

        match self.capture.capture_screenshot(&Self::label(report)).await {
            Ok(path) => debug!("步骤 {} 截图: {:?}", report.step_index + 1, path),
            // 截图失败不影响场景结果
            Err(e) => warn!("步骤 {} 截图失败: {}", report.step_index + 1, e),
        }
    }
}
