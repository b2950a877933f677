//! 驱动层测试

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

use mtp_driver::webdriver::protocol;
use mtp_driver::*;

#[test]
fn test_target_from_yaml() {
    let target: Target = serde_yaml::from_str("{ id: room-view }").unwrap();
    assert_eq!(target, Target::id("room-view"));

    let target: Target = serde_yaml::from_str("{ text: \"Reply\", index: 0 }").unwrap();
    assert_eq!(target, Target::text("Reply").at_index(0));
    assert_eq!(target.value(), "Reply");
}

#[test]
fn test_target_rejects_invalid() {
    assert!(serde_yaml::from_str::<Target>("{ id: a, text: b }").is_err());
    assert!(serde_yaml::from_str::<Target>("{ index: 1 }").is_err());
    assert!(serde_yaml::from_str::<Target>("{ xpath: \"//a\" }").is_err());
}

#[test]
fn test_target_serialization() {
    let yaml = serde_yaml::to_string(&Target::text("Reply").at_index(2)).unwrap();
    assert!(yaml.contains("text: Reply"));
    assert!(yaml.contains("index: 2"));
    assert!(!yaml.contains("id:"));

    let json = serde_json::to_string(&Target::id("messagebox")).unwrap();
    assert_eq!(json, r#"{"id":"messagebox"}"#);
}

#[test]
fn test_platform_serialization() {
    assert_eq!(serde_json::to_string(&Platform::Ios).unwrap(), "\"ios\"");
    let platform: Platform = serde_yaml::from_str("android").unwrap();
    assert_eq!(platform, Platform::Android);
}

#[test]
fn test_text_locator_per_platform() {
    let target = Target::text("This room is read only");

    let ios = protocol::find_request(Platform::Ios, &target);
    assert_eq!(ios.using, "-ios predicate string");
    assert!(ios.value.contains("label == \"This room is read only\""));

    let android = protocol::find_request(Platform::Android, &target);
    assert_eq!(android.using, "-android uiautomator");
    assert_eq!(
        android.value,
        "new UiSelector().text(\"This room is read only\")"
    );
}

#[test]
fn test_error_envelope() {
    let body = r#"{"value":{"error":"no such element","message":"An element could not be located","stacktrace":""}}"#;
    let wire = protocol::parse_wire_error(body).unwrap();
    assert!(wire.is_element_gone());

    match protocol::to_driver_error(404, body) {
        DriverError::ElementGone(msg) => assert!(msg.starts_with("no such element")),
        other => panic!("unexpected error: {:?}", other),
    }

    let body = r#"{"value":{"error":"invalid session id","message":"gone"}}"#;
    assert!(matches!(
        protocol::to_driver_error(404, body),
        DriverError::SessionError(_)
    ));
}

/// 只有一个按钮的假驱动
struct SingleButton;

#[async_trait]
impl UiDriver for SingleButton {
    async fn locate(&self, target: &Target) -> Result<Option<ElementHandle>> {
        Ok((target.value() == "submit").then(|| ElementHandle::new("el-1")))
    }

    async fn tap(&self, _handle: &ElementHandle) -> Result<()> {
        Ok(())
    }

    async fn type_text(&self, _handle: &ElementHandle, _text: &str) -> Result<()> {
        Err(DriverError::Unsupported("按钮不能输入文本".to_string()))
    }

    async fn clear_text(&self, _handle: &ElementHandle) -> Result<()> {
        Ok(())
    }

    async fn is_visible(&self, _handle: &ElementHandle) -> Result<bool> {
        Ok(true)
    }

    async fn reload_app(&self) -> Result<()> {
        Ok(())
    }

    async fn current_platform(&self) -> Result<Platform> {
        Ok(Platform::Android)
    }
}

#[async_trait]
impl DiagnosticCapture for SingleButton {
    async fn capture_screenshot(&self, label: &str) -> Result<PathBuf> {
        Ok(PathBuf::from(format!("{}.png", webdriver::sanitize_label(label))))
    }
}

#[tokio::test]
async fn test_driver_trait_object() {
    let driver: Arc<dyn UiDriver> = Arc::new(SingleButton);

    assert_eq!(driver.name(), "ui-driver");
    assert_eq!(driver.current_platform().await.unwrap(), Platform::Android);

    let handle = driver.locate(&Target::id("submit")).await.unwrap().unwrap();
    assert_eq!(handle.as_str(), "el-1");
    assert!(driver.is_visible(&handle).await.unwrap());
    assert!(driver.locate(&Target::id("other")).await.unwrap().is_none());
    assert!(matches!(
        driver.type_text(&handle, "x").await,
        Err(DriverError::Unsupported(_))
    ));

    let capture: Arc<dyn DiagnosticCapture> = Arc::new(SingleButton);
    let path = capture.capture_screenshot("01 点击 id=submit").await.unwrap();
    assert_eq!(path, PathBuf::from("01_点击_id_submit.png"));
}
