//! 场景执行器

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use mtp_driver::{DriverError, ElementHandle, Platform, Target, UiDriver};
use mtp_totp::TotpGenerator;

use crate::{
    Action, ExecutionReport, ExecutorError, Fixtures, Result, Scenario, ScenarioOutcome,
    ScenarioStep, StepError, StepReport,
};

type StepResult<T> = std::result::Result<T, StepError>;

/// 等待策略
#[derive(Debug, Clone, PartialEq)]
pub struct WaitPolicy {
    /// 步骤未指定超时时使用的默认等待时间
    pub default_wait: Duration,

    /// 轮询间隔
    pub poll_interval: Duration,

    /// 全局超时倍率
    pub timeout_scale: f64,

    /// Android 额外超时倍率
    pub android_timeout_scale: f64,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            default_wait: Duration::from_secs(5),
            poll_interval: Duration::from_millis(100),
            timeout_scale: 1.0,
            android_timeout_scale: 1.0,
        }
    }
}

impl WaitPolicy {
    /// 计算实际等待时间
    pub fn effective(&self, requested_ms: Option<u64>, platform: Platform) -> Duration {
        let base = requested_ms
            .map(Duration::from_millis)
            .unwrap_or(self.default_wait);

        let mut scale = sanitize_scale(self.timeout_scale);
        if platform == Platform::Android {
            scale *= sanitize_scale(self.android_timeout_scale);
        }

        Duration::try_from_secs_f64(base.as_secs_f64() * scale).unwrap_or(base)
    }
}

fn sanitize_scale(scale: f64) -> f64 {
    if scale.is_finite() && scale > 0.0 {
        scale
    } else {
        1.0
    }
}

/// 步骤观察者
///
/// 每个步骤进入终止状态 (通过、失败、跳过) 后调用。
#[async_trait]
pub trait StepObserver: Send + Sync {
    async fn after_step(&self, step: &ScenarioStep, report: &StepReport);
}

#[derive(Debug, Clone, Copy)]
enum Condition {
    Visible,
    Exists,
}

/// 场景执行器
pub struct ScenarioRunner {
    /// UI 驱动
    driver: Arc<dyn UiDriver>,

    /// 等待策略
    wait_policy: WaitPolicy,

    /// 指定平台 (未指定时从驱动查询)
    platform: Option<Platform>,

    /// 整个场景的超时时间
    scenario_timeout: Option<Duration>,

    /// 取消令牌
    cancel: CancellationToken,

    /// 步骤观察者
    observers: Vec<Arc<dyn StepObserver>>,
}

impl ScenarioRunner {
    /// 创建新的场景执行器
    pub fn new(driver: Arc<dyn UiDriver>) -> Self {
        Self {
            driver,
            wait_policy: WaitPolicy::default(),
            platform: None,
            scenario_timeout: None,
            cancel: CancellationToken::new(),
            observers: Vec::new(),
        }
    }

    pub fn with_wait_policy(mut self, policy: WaitPolicy) -> Self {
        self.wait_policy = policy;
        self
    }

    /// 指定执行平台
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    /// 设置场景整体超时
    pub fn with_scenario_timeout(mut self, timeout: Duration) -> Self {
        self.scenario_timeout = Some(timeout);
        self
    }

    /// 使用外部取消令牌
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// 添加步骤观察者
    pub fn with_observer(mut self, observer: Arc<dyn StepObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// 取消令牌 (调用 `cancel()` 中止执行)
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn wait_policy(&self) -> &WaitPolicy {
        &self.wait_policy
    }

    /// 执行场景
    ///
    /// 场景加载、流程展开和平台查询失败时返回 `Err`；
    /// 步骤失败记录在报告的 `outcome` 中。
    pub async fn run(&self, scenario: &Scenario, fixtures: &Fixtures) -> Result<ExecutionReport> {
        let steps = scenario.expand_steps()?;
        let teardown = scenario.expand_teardown()?;

        let platform = match self.platform {
            Some(platform) => platform,
            None => self
                .driver
                .current_platform()
                .await
                .map_err(|e| ExecutorError::DriverError(e.to_string()))?,
        };

        info!(
            "开始执行场景: {} ({}, {} 个步骤, 驱动: {})",
            scenario.name,
            platform,
            steps.len(),
            self.driver.name()
        );

        let start_time = Instant::now();
        // 超出时钟范围的超时视为不限时
        let deadline = self
            .scenario_timeout
            .and_then(|t| start_time.checked_add(t));
        let mut report = ExecutionReport::new(scenario, platform, &steps);
        let mut outcome = ScenarioOutcome::Success;
        let mut aborted = false;

        for (index, step) in steps.iter().enumerate() {
            if let Some(reason) = self.abort_reason(deadline) {
                warn!("步骤 {} 未执行, 场景已中止: {}", index + 1, reason);
                let err = StepError::Aborted {
                    step_index: index,
                    reason,
                };
                report.steps[index].fail(0, err.clone());
                self.notify(step, &report.steps[index]).await;
                outcome = ScenarioOutcome::Failure {
                    failed_step_index: index,
                    reason: err,
                };
                aborted = true;
                break;
            }

            if step.platform.is_some_and(|guard| guard != platform) {
                debug!("跳过步骤 {}: 仅限 {:?}", index + 1, step.platform);
                report.steps[index].skip();
                self.notify(step, &report.steps[index]).await;
                continue;
            }

            info!(
                "执行步骤 {}/{}: {}",
                index + 1,
                steps.len(),
                report.steps[index].description
            );
            report.steps[index].start();

            let step_start = Instant::now();
            let result = self
                .execute_guarded(step, index, platform, fixtures, deadline)
                .await;
            let elapsed = step_start.elapsed().as_millis() as u64;

            match result {
                Ok(output) => {
                    report.steps[index].pass(elapsed, output);
                    self.notify(step, &report.steps[index]).await;
                }
                Err(e) => {
                    error!("步骤 {} 失败: {}", index + 1, e);
                    aborted = matches!(e, StepError::Aborted { .. });
                    report.steps[index].fail(elapsed, e.clone());
                    self.notify(step, &report.steps[index]).await;
                    outcome = ScenarioOutcome::Failure {
                        failed_step_index: index,
                        reason: e,
                    };
                    break;
                }
            }
        }

        if aborted {
            warn!("场景已中止, 跳过收尾步骤");
        } else if !teardown.is_empty() {
            report.teardown = self.run_teardown(&teardown, platform, fixtures).await;
        }

        report.finish(outcome, start_time.elapsed().as_millis() as u64);

        info!(
            "场景执行完成: {} - {}/{} 步骤成功, {} 个跳过",
            scenario.name, report.passed_count, report.steps_executed, report.skipped_count
        );

        Ok(report)
    }

    /// 执行收尾步骤，失败时停止，不影响场景结果
    async fn run_teardown(
        &self,
        steps: &[ScenarioStep],
        platform: Platform,
        fixtures: &Fixtures,
    ) -> Vec<StepReport> {
        info!("执行收尾步骤: {} 个", steps.len());

        let mut reports: Vec<StepReport> = steps
            .iter()
            .enumerate()
            .map(|(i, step)| StepReport::pending(i, step))
            .collect();

        for (index, step) in steps.iter().enumerate() {
            if step.platform.is_some_and(|guard| guard != platform) {
                reports[index].skip();
                continue;
            }

            reports[index].start();
            let step_start = Instant::now();
            let result = self
                .execute_guarded(step, index, platform, fixtures, None)
                .await;
            let elapsed = step_start.elapsed().as_millis() as u64;

            match result {
                Ok(output) => reports[index].pass(elapsed, output),
                Err(e) => {
                    warn!("收尾步骤 {} 失败: {}", index + 1, e);
                    reports[index].fail(elapsed, e);
                    break;
                }
            }
        }

        reports
    }

    fn abort_reason(&self, deadline: Option<Instant>) -> Option<String> {
        if self.cancel.is_cancelled() {
            return Some("执行已取消".to_string());
        }
        match deadline {
            Some(deadline) if Instant::now() >= deadline => Some(self.timeout_reason()),
            _ => None,
        }
    }

    fn timeout_reason(&self) -> String {
        format!(
            "场景执行超时 ({}ms)",
            self.scenario_timeout.unwrap_or_default().as_millis()
        )
    }

    async fn notify(&self, step: &ScenarioStep, report: &StepReport) {
        for observer in &self.observers {
            observer.after_step(step, report).await;
        }
    }

    /// 执行步骤，同时响应取消和场景超时
    async fn execute_guarded(
        &self,
        step: &ScenarioStep,
        index: usize,
        platform: Platform,
        fixtures: &Fixtures,
        deadline: Option<Instant>,
    ) -> StepResult<Option<String>> {
        let expired = async {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(StepError::Aborted {
                step_index: index,
                reason: "执行已取消".to_string(),
            }),
            _ = expired => Err(StepError::Aborted {
                step_index: index,
                reason: self.timeout_reason(),
            }),
            result = self.execute_action(&step.action, index, platform, fixtures) => result,
        }
    }

    /// 执行单个动作
    async fn execute_action(
        &self,
        action: &Action,
        index: usize,
        platform: Platform,
        fixtures: &Fixtures,
    ) -> StepResult<Option<String>> {
        match action {
            Action::Tap { target } => {
                let target = resolve_target(index, target, fixtures)?;
                let handle = self.require(index, &target).await?;
                self.driver
                    .tap(&handle)
                    .await
                    .map_err(|e| driver_error(index, e))?;
                Ok(None)
            }

            Action::Type {
                target,
                text,
                replace,
            } => {
                let target = resolve_target(index, target, fixtures)?;
                let text = interpolate(index, text, fixtures)?;
                let handle = self.require(index, &target).await?;
                if *replace {
                    self.driver
                        .clear_text(&handle)
                        .await
                        .map_err(|e| driver_error(index, e))?;
                }
                self.driver
                    .type_text(&handle, &text)
                    .await
                    .map_err(|e| driver_error(index, e))?;
                Ok(Some(format!("已输入 {} 个字符", text.chars().count())))
            }

            Action::TypeTotp {
                target,
                secret,
                digits,
            } => {
                let target = resolve_target(index, target, fixtures)?;
                let secret = interpolate(index, secret, fixtures)?;
                // 定位前校验密钥
                generate_totp(index, &secret, *digits)?;

                let handle = self.require(index, &target).await?;
                self.driver
                    .clear_text(&handle)
                    .await
                    .map_err(|e| driver_error(index, e))?;

                // 验证码在输入前生成
                let code = generate_totp(index, &secret, *digits)?;
                self.driver
                    .type_text(&handle, &code)
                    .await
                    .map_err(|e| driver_error(index, e))?;

                // 验证码不写入报告
                Ok(Some(format!("已输入 {} 位验证码", code.len())))
            }

            Action::WaitForVisible { target, timeout_ms } => {
                let target = resolve_target(index, target, fixtures)?;
                self.wait_for(index, &target, Condition::Visible, *timeout_ms, platform)
                    .await
            }

            Action::WaitForExist { target, timeout_ms } => {
                let target = resolve_target(index, target, fixtures)?;
                self.wait_for(index, &target, Condition::Exists, *timeout_ms, platform)
                    .await
            }

            Action::AssertVisible { target } => {
                let target = resolve_target(index, target, fixtures)?;
                if self.check(index, &target, Condition::Visible).await? {
                    Ok(None)
                } else {
                    Err(assertion_failed(index, &target, "可见"))
                }
            }

            Action::AssertNotVisible { target } => {
                let target = resolve_target(index, target, fixtures)?;
                if self.check(index, &target, Condition::Visible).await? {
                    Err(assertion_failed(index, &target, "不可见"))
                } else {
                    Ok(None)
                }
            }

            Action::AssertExists { target } => {
                let target = resolve_target(index, target, fixtures)?;
                if self.check(index, &target, Condition::Exists).await? {
                    Ok(None)
                } else {
                    Err(assertion_failed(index, &target, "存在"))
                }
            }

            Action::Sleep { duration_ms } => {
                tokio::time::sleep(Duration::from_millis(*duration_ms)).await;
                Ok(None)
            }

            Action::ReloadApp => {
                self.driver
                    .reload_app()
                    .await
                    .map_err(|e| driver_error(index, e))?;
                Ok(None)
            }

            Action::Flow { name } => Err(StepError::Template {
                step_index: index,
                message: format!("流程未展开: {}", name),
            }),
        }
    }

    /// 轮询直到条件满足或超时
    async fn wait_for(
        &self,
        index: usize,
        target: &Target,
        condition: Condition,
        timeout_ms: Option<u64>,
        platform: Platform,
    ) -> StepResult<Option<String>> {
        let limit = self.wait_policy.effective(timeout_ms, platform);
        let started = Instant::now();

        let poll = async {
            loop {
                if self.check(index, target, condition).await? {
                    return Ok::<(), StepError>(());
                }
                tokio::time::sleep(self.wait_policy.poll_interval).await;
            }
        };

        match timeout(limit, poll).await {
            Ok(Ok(())) => {
                let waited = started.elapsed().as_millis();
                debug!("{} 条件满足, 等待 {}ms", target, waited);
                Ok(Some(format!("等待 {}ms", waited)))
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(StepError::Timeout {
                step_index: index,
                target: target.to_string(),
                timeout_ms: limit.as_millis() as u64,
            }),
        }
    }

    /// 单次检查条件
    async fn check(&self, index: usize, target: &Target, condition: Condition) -> StepResult<bool> {
        let handle = self
            .driver
            .locate(target)
            .await
            .map_err(|e| driver_error(index, e))?;

        match (handle, condition) {
            (None, _) => Ok(false),
            (Some(_), Condition::Exists) => Ok(true),
            (Some(handle), Condition::Visible) => self
                .driver
                .is_visible(&handle)
                .await
                .map_err(|e| driver_error(index, e)),
        }
    }

    /// 定位元素，未找到时失败
    async fn require(&self, index: usize, target: &Target) -> StepResult<ElementHandle> {
        self.driver
            .locate(target)
            .await
            .map_err(|e| driver_error(index, e))?
            .ok_or_else(|| StepError::Locate {
                step_index: index,
                target: target.to_string(),
            })
    }
}

fn driver_error(index: usize, error: DriverError) -> StepError {
    StepError::Driver {
        step_index: index,
        message: error.to_string(),
    }
}

fn assertion_failed(index: usize, target: &Target, expected: &str) -> StepError {
    StepError::Assertion {
        step_index: index,
        target: target.to_string(),
        expected: expected.to_string(),
    }
}

fn interpolate(index: usize, template: &str, fixtures: &Fixtures) -> StepResult<String> {
    fixtures
        .interpolate(template)
        .map_err(|name| StepError::Template {
            step_index: index,
            message: format!("未定义的变量: {}", name),
        })
}

fn resolve_target(index: usize, target: &Target, fixtures: &Fixtures) -> StepResult<Target> {
    let value = interpolate(index, target.value(), fixtures)?;
    Ok(target.with_value(value))
}

fn generate_totp(index: usize, secret: &str, digits: Option<usize>) -> StepResult<String> {
    let invalid = |e: mtp_totp::TotpError| StepError::InvalidSecret {
        step_index: index,
        message: e.to_string(),
    };

    let generator = match digits {
        Some(digits) => TotpGenerator::default().with_digits(digits).map_err(invalid)?,
        None => TotpGenerator::default(),
    };
    generator.generate(secret).map_err(invalid)
}
