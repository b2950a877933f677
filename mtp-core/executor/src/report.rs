//! 执行报告

use chrono::{DateTime, Utc};
use mtp_driver::Platform;
use serde::{Deserialize, Serialize};

use crate::{Scenario, ScenarioStep, StepError};

/// 步骤状态
///
/// `Pending -> Running -> {Passed, Failed, Skipped}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    Pending,
    Running,
    Passed,
    Failed,
    Skipped,
}

impl StepState {
    /// 是否已结束
    pub fn is_terminal(&self) -> bool {
        matches!(self, StepState::Passed | StepState::Failed | StepState::Skipped)
    }
}

/// 场景执行结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScenarioOutcome {
    Success,
    Failure {
        failed_step_index: usize,
        reason: StepError,
    },
}

impl ScenarioOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ScenarioOutcome::Success)
    }
}

/// 步骤报告
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReport {
    /// 步骤索引
    pub step_index: usize,

    /// 步骤描述
    pub description: String,

    /// 平台限定
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,

    /// 步骤状态
    pub state: StepState,

    /// 失败原因
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StepError>,

    /// 耗时（毫秒）
    pub duration_ms: u64,

    /// 输出内容
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl StepReport {
    pub fn pending(index: usize, step: &ScenarioStep) -> Self {
        Self {
            step_index: index,
            description: step.description(),
            platform: step.platform,
            state: StepState::Pending,
            error: None,
            duration_ms: 0,
            output: None,
        }
    }

    pub(crate) fn start(&mut self) {
        self.state = StepState::Running;
    }

    pub(crate) fn pass(&mut self, duration_ms: u64, output: Option<String>) {
        self.state = StepState::Passed;
        self.duration_ms = duration_ms;
        self.output = output;
    }

    pub(crate) fn fail(&mut self, duration_ms: u64, error: StepError) {
        self.state = StepState::Failed;
        self.duration_ms = duration_ms;
        self.error = Some(error);
    }

    pub(crate) fn skip(&mut self) {
        self.state = StepState::Skipped;
    }
}

/// 执行报告
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// 场景名称
    pub scenario_name: String,

    /// 场景描述
    pub description: Option<String>,

    /// 标签
    pub tags: Vec<String>,

    /// 执行平台
    pub platform: Platform,

    /// 开始时间
    pub started_at: DateTime<Utc>,

    /// 执行结果
    pub outcome: ScenarioOutcome,

    /// 实际执行的步骤数 (不含跳过)
    pub steps_executed: usize,

    /// 通过的步骤数
    pub passed_count: usize,

    /// 失败的步骤数
    pub failed_count: usize,

    /// 跳过的步骤数
    pub skipped_count: usize,

    /// 总耗时（毫秒）
    pub duration_ms: u64,

    /// 步骤报告列表
    pub steps: Vec<StepReport>,

    /// 收尾步骤报告
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub teardown: Vec<StepReport>,
}

impl ExecutionReport {
    pub fn new(scenario: &Scenario, platform: Platform, steps: &[ScenarioStep]) -> Self {
        Self {
            scenario_name: scenario.name.clone(),
            description: scenario.description.clone(),
            tags: scenario.tags.clone(),
            platform,
            started_at: Utc::now(),
            outcome: ScenarioOutcome::Success,
            steps_executed: 0,
            passed_count: 0,
            failed_count: 0,
            skipped_count: 0,
            duration_ms: 0,
            steps: steps
                .iter()
                .enumerate()
                .map(|(i, step)| StepReport::pending(i, step))
                .collect(),
            teardown: Vec::new(),
        }
    }

    /// 汇总统计
    pub(crate) fn finish(&mut self, outcome: ScenarioOutcome, duration_ms: u64) {
        self.outcome = outcome;
        self.duration_ms = duration_ms;
        self.passed_count = self.count(StepState::Passed);
        self.failed_count = self.count(StepState::Failed);
        self.skipped_count = self.count(StepState::Skipped);
        self.steps_executed = self.passed_count + self.failed_count;
    }

    fn count(&self, state: StepState) -> usize {
        self.steps.iter().filter(|s| s.state == state).count()
    }

    /// 是否通过
    pub fn passed(&self) -> bool {
        self.outcome.is_success()
    }

    /// 未执行到的步骤数
    pub fn pending_count(&self) -> usize {
        self.count(StepState::Pending)
    }

    /// 导出为 JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// 导出为 YAML
    pub fn to_yaml(&self) -> serde_yaml::Result<String> {
        serde_yaml::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Action;
    use mtp_driver::Target;

    fn scenario() -> (Scenario, Vec<ScenarioStep>) {
        let steps = vec![
            ScenarioStep::new(Action::Tap {
                target: Target::id("a"),
            }),
            ScenarioStep::new(Action::AssertVisible {
                target: Target::id("b"),
            })
            .only_on(Platform::Android),
            ScenarioStep::new(Action::ReloadApp).named("重启"),
        ];
        let scenario = Scenario {
            name: "report".to_string(),
            description: None,
            tags: vec!["t".to_string()],
            platform: None,
            flows: Default::default(),
            steps: steps.clone(),
            teardown: vec![],
        };
        (scenario, steps)
    }

    #[test]
    fn test_execution_report_new() {
        let (scenario, steps) = scenario();
        let report = ExecutionReport::new(&scenario, Platform::Ios, &steps);
        assert_eq!(report.scenario_name, "report");
        assert_eq!(report.steps.len(), 3);
        assert!(report.steps.iter().all(|s| s.state == StepState::Pending));
        assert_eq!(report.steps[0].description, "点击 id=a");
        assert_eq!(report.steps[2].description, "重启");
        assert_eq!(report.steps[1].platform, Some(Platform::Android));
    }

    #[test]
    fn test_execution_report_finish() {
        let (scenario, steps) = scenario();
        let mut report = ExecutionReport::new(&scenario, Platform::Ios, &steps);
        report.steps[0].pass(5, None);
        report.steps[1].skip();
        let error = StepError::Locate {
            step_index: 2,
            target: "id=c".to_string(),
        };
        report.steps[2].fail(1, error.clone());
        report.finish(
            ScenarioOutcome::Failure {
                failed_step_index: 2,
                reason: error,
            },
            10,
        );

        assert!(!report.passed());
        assert_eq!(report.passed_count, 1);
        assert_eq!(report.failed_count, 1);
        assert_eq!(report.skipped_count, 1);
        assert_eq!(report.steps_executed, 2);
        assert_eq!(report.pending_count(), 0);
    }

    #[test]
    fn test_report_serialization() {
        let (scenario, steps) = scenario();
        let mut report = ExecutionReport::new(&scenario, Platform::Ios, &steps);
        let error = StepError::Timeout {
            step_index: 0,
            target: "id=a".to_string(),
            timeout_ms: 100,
        };
        report.steps[0].fail(100, error.clone());
        report.finish(
            ScenarioOutcome::Failure {
                failed_step_index: 0,
                reason: error,
            },
            100,
        );

        let json = report.to_json().unwrap();
        assert!(json.contains("\"status\": \"failure\""));
        assert!(json.contains("\"kind\": \"timeout\""));
        assert!(json.contains("\"state\": \"pending\""));

        let yaml = report.to_yaml().unwrap();
        assert!(yaml.contains("timeout_ms: 100"));
    }

    #[test]
    fn test_step_state_terminal() {
        assert!(!StepState::Pending.is_terminal());
        assert!(!StepState::Running.is_terminal());
        assert!(StepState::Passed.is_terminal());
        assert!(StepState::Skipped.is_terminal());
    }
}
