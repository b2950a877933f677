//! WebDriver / Appium 客户端核心实现

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use reqwest::{Client, Method};
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::protocol::{self, FindRequest};
use crate::{
    DiagnosticCapture, DriverError, ElementHandle, Platform, Result, Target, UiDriver,
};

/// WebDriver 客户端配置
#[derive(Debug, Clone)]
pub struct WebDriverConfig {
    /// 设备平台
    pub platform: Platform,

    /// 被测应用标识 (iOS bundleId / Android appId)，用于重新加载应用
    pub app_id: Option<String>,

    /// 额外的会话能力 (JSON 对象)
    pub capabilities: Value,

    /// 连接超时（秒）
    pub connect_timeout: u64,

    /// 请求超时（秒）
    pub request_timeout: u64,

    /// 截图保存目录
    pub screenshot_dir: PathBuf,
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self {
            platform: Platform::Ios,
            app_id: None,
            capabilities: Value::Object(serde_json::Map::new()),
            connect_timeout: 10,
            request_timeout: 120,
            screenshot_dir: PathBuf::from("./artifacts/screenshots"),
        }
    }
}

/// WebDriver 客户端
pub struct WebDriverClient {
    /// 服务端基础 URL
    base_url: String,

    /// HTTP 客户端
    http_client: Client,

    /// 当前会话 ID
    session_id: Arc<RwLock<Option<String>>>,

    /// 配置
    config: WebDriverConfig,
}

impl WebDriverClient {
    /// 创建新的客户端
    pub fn new(base_url: &str, config: WebDriverConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout))
            .connect_timeout(Duration::from_secs(config.connect_timeout))
            .build()
            .map_err(|e| DriverError::HttpError(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
            session_id: Arc::new(RwLock::new(None)),
            config,
        })
    }

    /// 配置
    pub fn config(&self) -> &WebDriverConfig {
        &self.config
    }

    /// 创建会话
    pub async fn create_session(&self) -> Result<String> {
        info!("创建 WebDriver 会话: {} ({})", self.base_url, self.config.platform);

        let body = protocol::new_session_body(self.config.platform, &self.config.capabilities);
        let value = self.send(Method::POST, "/session", Some(&body)).await?;
        let session_id = protocol::session_id(&value)?;

        *self.session_id.write().await = Some(session_id.clone());

        info!("WebDriver 会话已创建: {}", session_id);
        Ok(session_id)
    }

    /// 关闭会话
    pub async fn delete_session(&self) -> Result<()> {
        let session_id = self.session_id.write().await.take();
        if let Some(id) = session_id {
            info!("关闭 WebDriver 会话: {}", id);
            self.send::<Value>(Method::DELETE, &format!("/session/{}", id), None)
                .await?;
        }
        Ok(())
    }

    /// 当前会话 ID
    pub async fn session(&self) -> Result<String> {
        self.session_id
            .read()
            .await
            .clone()
            .ok_or_else(|| DriverError::SessionError("会话未创建".to_string()))
    }

    /// 会话内请求
    async fn session_request<T: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&T>,
    ) -> Result<Value> {
        let session_id = self.session().await?;
        self.send(method, &format!("/session/{}{}", session_id, path), body)
            .await
    }

    /// 发送 HTTP 请求并取出 `value` 字段
    async fn send<T: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&T>,
    ) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        debug!("WebDriver 请求: {} {}", method, url);

        let mut request = self.http_client.request(method.clone(), &url);
        if let Some(body) = body {
            request = request.json(body);
        } else if method == Method::POST {
            request = request.json(&serde_json::json!({}));
        }

        let response = request
            .send()
            .await
            .map_err(|e| DriverError::HttpError(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| DriverError::HttpError(e.to_string()))?;

        if !status.is_success() {
            debug!("WebDriver 请求失败: {} - {}", status, text);
            return Err(protocol::to_driver_error(status.as_u16(), &text));
        }

        let json: Value = serde_json::from_str(&text)
            .map_err(|e| DriverError::ParseError(format!("{}: {}", e, text)))?;

        Ok(json.get("value").cloned().unwrap_or(Value::Null))
    }

    /// 调用 Appium `mobile:` 扩展命令
    async fn mobile_command(&self, script: &str, args: Value) -> Result<Value> {
        let body = serde_json::json!({ "script": script, "args": [args] });
        self.session_request(Method::POST, "/execute/sync", Some(&body))
            .await
    }

    fn app_args(&self) -> Result<Value> {
        let app_id = self
            .config
            .app_id
            .as_ref()
            .ok_or_else(|| DriverError::ConfigError("未配置 app_id，无法重新加载应用".to_string()))?;

        Ok(match self.config.platform {
            Platform::Ios => serde_json::json!({ "bundleId": app_id }),
            Platform::Android => serde_json::json!({ "appId": app_id }),
        })
    }
}

#[async_trait]
impl UiDriver for WebDriverClient {
    async fn locate(&self, target: &Target) -> Result<Option<ElementHandle>> {
        let request: FindRequest = protocol::find_request(self.config.platform, target);
        let value = self
            .session_request(Method::POST, "/elements", Some(&request))
            .await?;
        let mut elements = protocol::parse_elements(&value)?;

        let index = target.index.unwrap_or(0);
        debug!("定位 {}: 找到 {} 个元素", target, elements.len());

        if index < elements.len() {
            Ok(Some(elements.swap_remove(index)))
        } else {
            Ok(None)
        }
    }

    async fn tap(&self, handle: &ElementHandle) -> Result<()> {
        self.session_request::<Value>(Method::POST, &format!("/element/{}/click", handle), None)
            .await?;
        Ok(())
    }

    async fn type_text(&self, handle: &ElementHandle, text: &str) -> Result<()> {
        let body = serde_json::json!({
            "text": text,
            "value": text.chars().map(|c| c.to_string()).collect::<Vec<_>>(),
        });
        self.session_request(Method::POST, &format!("/element/{}/value", handle), Some(&body))
            .await?;
        Ok(())
    }

    async fn clear_text(&self, handle: &ElementHandle) -> Result<()> {
        self.session_request::<Value>(Method::POST, &format!("/element/{}/clear", handle), None)
            .await?;
        Ok(())
    }

    async fn is_visible(&self, handle: &ElementHandle) -> Result<bool> {
        let result = self
            .session_request::<Value>(Method::GET, &format!("/element/{}/displayed", handle), None)
            .await;

        match result {
            Ok(value) => value
                .as_bool()
                .ok_or_else(|| DriverError::ParseError(format!("期望布尔值, 实际: {}", value))),
            // 元素在两次调用之间消失，视为不可见
            Err(DriverError::ElementGone(msg)) => {
                debug!("元素 {} 已失效: {}", handle, msg);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn reload_app(&self) -> Result<()> {
        let args = self.app_args()?;
        info!("重新加载应用: {}", args);

        self.mobile_command("mobile: terminateApp", args.clone())
            .await?;
        self.mobile_command("mobile: activateApp", args).await?;
        Ok(())
    }

    async fn current_platform(&self) -> Result<Platform> {
        Ok(self.config.platform)
    }

    fn name(&self) -> String {
        format!("webdriver({})", self.base_url)
    }
}

#[async_trait]
impl DiagnosticCapture for WebDriverClient {
    async fn capture_screenshot(&self, label: &str) -> Result<PathBuf> {
        let value = self
            .session_request::<Value>(Method::GET, "/screenshot", None)
            .await?;
        let encoded = value
            .as_str()
            .ok_or_else(|| DriverError::ParseError("截图响应不是字符串".to_string()))?;
        let png = STANDARD
            .decode(encoded)
            .map_err(|e| DriverError::ParseError(format!("截图 base64 解码失败: {}", e)))?;

        tokio::fs::create_dir_all(&self.config.screenshot_dir).await?;

        let file_name = format!(
            "{}_{}.png",
            Utc::now().format("%Y%m%d-%H%M%S%.3f"),
            sanitize_label(label)
        );
        let path = self.config.screenshot_dir.join(file_name);
        tokio::fs::write(&path, png).await?;

        debug!("截图已保存: {:?}", path);
        Ok(path)
    }
}

/// 将步骤描述转换为安全的文件名
pub fn sanitize_label(label: &str) -> String {
    let sanitized: String = label
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let trimmed = sanitized.trim_matches('_');
    if trimmed.is_empty() {
        "step".to_string()
    } else {
        trimmed.chars().take(64).collect()
    }
}
