//! UI 自动化协作接口

use async_trait::async_trait;
use std::path::PathBuf;

use crate::{ElementHandle, Platform, Result, Target};

/// UI 自动化驱动 trait
///
/// 所有调用都可能挂起，直到设备/模拟器返回结果。
/// 执行器只依赖这一组窄接口，不关心驱动自身的选择器语法。
#[async_trait]
pub trait UiDriver: Send + Sync {
    /// 定位元素，未找到时返回 `Ok(None)`
    async fn locate(&self, target: &Target) -> Result<Option<ElementHandle>>;

    /// 点击元素
    async fn tap(&self, handle: &ElementHandle) -> Result<()>;

    /// 输入文本
    async fn type_text(&self, handle: &ElementHandle, text: &str) -> Result<()>;

    /// 清空输入框
    async fn clear_text(&self, handle: &ElementHandle) -> Result<()>;

    /// 元素是否可见
    async fn is_visible(&self, handle: &ElementHandle) -> Result<bool>;

    /// 重新加载被测应用
    async fn reload_app(&self) -> Result<()>;

    /// 当前设备平台
    async fn current_platform(&self) -> Result<Platform>;

    /// 驱动名称
    fn name(&self) -> String {
        "ui-driver".to_string()
    }
}

/// 诊断截图接口
///
/// 由外层测试框架在每个步骤结束后调用，执行器本身不会调用。
#[async_trait]
pub trait DiagnosticCapture: Send + Sync {
    /// 截图并返回保存路径
    async fn capture_screenshot(&self, label: &str) -> Result<PathBuf>;
}
