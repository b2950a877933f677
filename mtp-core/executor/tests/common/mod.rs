//! 测试用的内存 UI 驱动

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use mtp_driver::{DriverError, ElementHandle, Platform, Target, UiDriver};
use mtp_executor::{ScenarioStep, StepObserver, StepReport, StepState};

#[derive(Debug, Clone)]
struct MockElement {
    visible: bool,
    /// 第几次可见性检查开始返回可见
    visible_after: u32,
    checks: u32,
    text: String,
}

#[derive(Default)]
struct MockState {
    elements: HashMap<String, MockElement>,
    calls: Vec<String>,
    /// 每次输入时的 Unix 时间 (秒)
    typed_at: Vec<u64>,
}

/// 内存 UI 驱动，按定位值 (id 或文本) 管理元素
pub struct MockDriver {
    platform: Platform,
    fail_platform: bool,
    hang_on: Option<String>,
    state: Mutex<MockState>,
}

impl MockDriver {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            fail_platform: false,
            hang_on: None,
            state: Mutex::new(MockState::default()),
        }
    }

    fn insert(self, value: &str, visible: bool, visible_after: u32) -> Self {
        self.state.lock().unwrap().elements.insert(
            value.to_string(),
            MockElement {
                visible,
                visible_after,
                checks: 0,
                text: String::new(),
            },
        );
        self
    }

    /// 可见元素
    pub fn with_element(self, value: &str) -> Self {
        self.insert(value, true, 0)
    }

    /// 存在但不可见的元素
    pub fn with_hidden(self, value: &str) -> Self {
        self.insert(value, false, 0)
    }

    /// 第 `checks` 次可见性检查后变为可见
    pub fn with_delayed(self, value: &str, checks: u32) -> Self {
        self.insert(value, true, checks)
    }

    /// 定位该值时永不返回
    pub fn hanging_on(mut self, value: &str) -> Self {
        self.hang_on = Some(value.to_string());
        self
    }

    pub fn failing_platform(mut self) -> Self {
        self.fail_platform = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn typed_at(&self) -> Vec<u64> {
        self.state.lock().unwrap().typed_at.clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn text_of(&self, value: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .elements
            .get(value)
            .map(|e| e.text.clone())
    }

    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl UiDriver for MockDriver {
    async fn locate(&self, target: &Target) -> mtp_driver::Result<Option<ElementHandle>> {
        let value = target.value().to_string();
        self.record(format!("locate:{}", value));

        if self.hang_on.as_deref() == Some(value.as_str()) {
            std::future::pending::<()>().await;
        }

        let exists = self.state.lock().unwrap().elements.contains_key(&value);
        Ok(exists.then(|| ElementHandle::new(value)))
    }

    async fn tap(&self, handle: &ElementHandle) -> mtp_driver::Result<()> {
        self.record(format!("tap:{}", handle));
        Ok(())
    }

    async fn type_text(&self, handle: &ElementHandle, text: &str) -> mtp_driver::Result<()> {
        self.record(format!("type:{}:{}", handle, text));
        let mut state = self.state.lock().unwrap();
        state.typed_at.push(chrono::Utc::now().timestamp() as u64);
        if let Some(element) = state.elements.get_mut(handle.as_str()) {
            element.text.push_str(text);
        }
        Ok(())
    }

    async fn clear_text(&self, handle: &ElementHandle) -> mtp_driver::Result<()> {
        self.record(format!("clear:{}", handle));
        if let Some(element) = self.state.lock().unwrap().elements.get_mut(handle.as_str()) {
            element.text.clear();
        }
        Ok(())
    }

    async fn is_visible(&self, handle: &ElementHandle) -> mtp_driver::Result<bool> {
        self.record(format!("visible:{}", handle));
        let mut state = self.state.lock().unwrap();
        let element = state
            .elements
            .get_mut(handle.as_str())
            .ok_or_else(|| DriverError::ElementGone(format!("no such element: {}", handle)))?;
        element.checks += 1;
        Ok(element.visible && element.checks > element.visible_after)
    }

    async fn reload_app(&self) -> mtp_driver::Result<()> {
        self.record("reload".to_string());
        Ok(())
    }

    async fn current_platform(&self) -> mtp_driver::Result<Platform> {
        self.record("platform".to_string());
        if self.fail_platform {
            return Err(DriverError::SessionError("设备未连接".to_string()));
        }
        Ok(self.platform)
    }

    fn name(&self) -> String {
        "mock".to_string()
    }
}

/// 记录步骤终止状态的观察者
#[derive(Default)]
pub struct RecordingObserver {
    seen: Mutex<Vec<(usize, StepState)>>,
}

impl RecordingObserver {
    pub fn seen(&self) -> Vec<(usize, StepState)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl StepObserver for RecordingObserver {
    async fn after_step(&self, _step: &ScenarioStep, report: &StepReport) {
        self.seen
            .lock()
            .unwrap()
            .push((report.step_index, report.state));
    }
}

/// 初始化测试日志 (可重复调用)
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("mtp_executor=debug")
        .with_test_writer()
        .try_init();
}
