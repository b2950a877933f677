//! W3C WebDriver 协议报文处理

use serde::Serialize;
use serde_json::Value;

use crate::{DriverError, ElementHandle, Locator, Platform, Result, Target};

/// W3C 规定的元素引用键
pub const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// 旧版 JSON Wire 协议的元素引用键 (部分 Appium 驱动仍返回)
pub const LEGACY_ELEMENT_KEY: &str = "ELEMENT";

/// 查找元素请求体
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FindRequest {
    pub using: String,
    pub value: String,
}

/// 根据平台构造查找请求
///
/// - id: `accessibility id`
/// - 文本 (iOS): `-ios predicate string`，匹配 label/name/value
/// - 文本 (Android): `-android uiautomator`，匹配 text
pub fn find_request(platform: Platform, target: &Target) -> FindRequest {
    match &target.locator {
        Locator::Id(id) => FindRequest {
            using: "accessibility id".to_string(),
            value: id.clone(),
        },
        Locator::Text(text) => {
            let quoted = escape_quotes(text);
            match platform {
                Platform::Ios => FindRequest {
                    using: "-ios predicate string".to_string(),
                    value: format!(
                        "label == \"{0}\" OR name == \"{0}\" OR value == \"{0}\"",
                        quoted
                    ),
                },
                Platform::Android => FindRequest {
                    using: "-android uiautomator".to_string(),
                    value: format!("new UiSelector().text(\"{}\")", quoted),
                },
            }
        }
    }
}

fn escape_quotes(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// 从单个元素引用中取出元素 ID
pub fn element_id(value: &Value) -> Option<ElementHandle> {
    value
        .get(ELEMENT_KEY)
        .or_else(|| value.get(LEGACY_ELEMENT_KEY))
        .and_then(Value::as_str)
        .map(ElementHandle::new)
}

/// 解析 `POST /elements` 的返回值
pub fn parse_elements(value: &Value) -> Result<Vec<ElementHandle>> {
    let items = value
        .as_array()
        .ok_or_else(|| DriverError::ParseError(format!("期望元素数组, 实际: {}", value)))?;

    items
        .iter()
        .map(|item| {
            element_id(item)
                .ok_or_else(|| DriverError::ParseError(format!("无法识别的元素引用: {}", item)))
        })
        .collect()
}

/// WebDriver 错误码
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireError {
    pub error: String,
    pub message: String,
}

impl WireError {
    /// 元素已失效或不存在
    pub fn is_element_gone(&self) -> bool {
        matches!(
            self.error.as_str(),
            "no such element" | "stale element reference"
        )
    }

    pub fn is_invalid_session(&self) -> bool {
        self.error == "invalid session id"
    }
}

/// 解析错误响应体 `{"value": {"error": ..., "message": ...}}`
pub fn parse_wire_error(body: &str) -> Option<WireError> {
    let json: Value = serde_json::from_str(body).ok()?;
    let value = json.get("value")?;
    let error = value.get("error")?.as_str()?.to_string();
    let message = value
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Some(WireError { error, message })
}

/// 将 HTTP 错误状态和响应体转换为驱动错误
pub fn to_driver_error(status: u16, body: &str) -> DriverError {
    match parse_wire_error(body) {
        Some(wire) if wire.is_invalid_session() => {
            DriverError::SessionError(format!("{}: {}", wire.error, wire.message))
        }
        Some(wire) if wire.is_element_gone() => {
            DriverError::ElementGone(format!("{}: {}", wire.error, wire.message))
        }
        Some(wire) => DriverError::ApiError(status, format!("{}: {}", wire.error, wire.message)),
        None => DriverError::ApiError(status, body.to_string()),
    }
}

/// 从新建会话响应中取出会话 ID
pub fn session_id(value: &Value) -> Result<String> {
    value
        .get("sessionId")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| DriverError::ParseError(format!("响应中缺少 sessionId: {}", value)))
}

/// 构造新建会话请求体
pub fn new_session_body(platform: Platform, capabilities: &Value) -> Value {
    let mut always_match = match capabilities {
        Value::Object(map) => map.clone(),
        _ => serde_json::Map::new(),
    };
    always_match
        .entry("platformName")
        .or_insert_with(|| Value::String(platform.as_str().to_string()));

    serde_json::json!({
        "capabilities": {
            "alwaysMatch": always_match,
            "firstMatch": [{}]
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_find_request_by_id() {
        let req = find_request(Platform::Ios, &Target::id("room-view"));
        assert_eq!(req.using, "accessibility id");
        assert_eq!(req.value, "room-view");
    }

    #[test]
    fn test_find_request_by_text_ios() {
        let req = find_request(Platform::Ios, &Target::text("Reply"));
        assert_eq!(req.using, "-ios predicate string");
        assert_eq!(
            req.value,
            "label == \"Reply\" OR name == \"Reply\" OR value == \"Reply\""
        );
    }

    #[test]
    fn test_find_request_by_text_android_escapes() {
        let req = find_request(Platform::Android, &Target::text("say \"hi\""));
        assert_eq!(req.using, "-android uiautomator");
        assert_eq!(req.value, "new UiSelector().text(\"say \\\"hi\\\"\")");
    }

    #[test]
    fn test_parse_elements() {
        let value = json!([
            { ELEMENT_KEY: "e1" },
            { "ELEMENT": "e2" }
        ]);
        let elements = parse_elements(&value).unwrap();
        assert_eq!(elements, vec![ElementHandle::new("e1"), ElementHandle::new("e2")]);

        assert!(parse_elements(&json!([])).unwrap().is_empty());
        assert!(parse_elements(&json!({})).is_err());
        assert!(parse_elements(&json!([{ "foo": "bar" }])).is_err());
    }

    #[test]
    fn test_parse_wire_error() {
        let body = r#"{"value":{"error":"stale element reference","message":"gone","stacktrace":""}}"#;
        let err = parse_wire_error(body).unwrap();
        assert!(err.is_element_gone());
        assert_eq!(err.message, "gone");

        assert!(parse_wire_error("not json").is_none());
    }

    #[test]
    fn test_to_driver_error() {
        let body = r#"{"value":{"error":"invalid session id","message":"expired"}}"#;
        assert!(matches!(to_driver_error(404, body), DriverError::SessionError(_)));

        let body = r#"{"value":{"error":"stale element reference","message":"detached"}}"#;
        match to_driver_error(404, body) {
            DriverError::ElementGone(msg) => assert_eq!(msg, "stale element reference: detached"),
            other => panic!("unexpected error: {:?}", other),
        }

        let body = r#"{"value":{"error":"unknown error","message":"boom"}}"#;
        match to_driver_error(500, body) {
            DriverError::ApiError(status, msg) => {
                assert_eq!(status, 500);
                assert_eq!(msg, "unknown error: boom");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_new_session_body() {
        let caps = json!({ "appium:bundleId": "chat.app" });
        let body = new_session_body(Platform::Ios, &caps);
        let always = &body["capabilities"]["alwaysMatch"];
        assert_eq!(always["platformName"], "ios");
        assert_eq!(always["appium:bundleId"], "chat.app");

        // 已配置的 platformName 不被覆盖
        let caps = json!({ "platformName": "iOS" });
        let body = new_session_body(Platform::Ios, &caps);
        assert_eq!(body["capabilities"]["alwaysMatch"]["platformName"], "iOS");
    }

    #[test]
    fn test_session_id() {
        let value = json!({ "sessionId": "abc", "capabilities": {} });
        assert_eq!(session_id(&value).unwrap(), "abc");
        assert!(session_id(&json!({})).is_err());
    }
}
