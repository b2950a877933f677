//! W3C WebDriver / Appium 驱动实现

pub mod client;
pub mod protocol;

pub use client::{sanitize_label, WebDriverClient, WebDriverConfig};
