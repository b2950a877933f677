//! 驱动层公共类型

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::DriverError;

/// 设备平台
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Android,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Ios => "ios",
            Platform::Android => "android",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = DriverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ios" => Ok(Platform::Ios),
            "android" => Ok(Platform::Android),
            other => Err(DriverError::ConfigError(format!("未知平台: {}", other))),
        }
    }
}

/// 元素定位方式
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    /// 无障碍标识 (testID / accessibility id)
    Id(String),
    /// 可见文本
    Text(String),
}

/// 目标元素
///
/// 场景文件中写作 `{ id: "room-view" }` 或 `{ text: "Reply", index: 0 }`。
/// 执行器不解析其内容，只交给驱动解释。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "TargetRepr", into = "TargetRepr")]
pub struct Target {
    pub locator: Locator,

    /// 多个匹配时选择第几个
    pub index: Option<usize>,
}

impl Target {
    pub fn id(id: impl Into<String>) -> Self {
        Self {
            locator: Locator::Id(id.into()),
            index: None,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            locator: Locator::Text(text.into()),
            index: None,
        }
    }

    pub fn at_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    /// 定位值 (id 或文本)
    pub fn value(&self) -> &str {
        match &self.locator {
            Locator::Id(v) | Locator::Text(v) => v,
        }
    }

    /// 替换定位值，保留定位方式和索引
    pub fn with_value(&self, value: String) -> Self {
        let locator = match self.locator {
            Locator::Id(_) => Locator::Id(value),
            Locator::Text(_) => Locator::Text(value),
        };
        Self {
            locator,
            index: self.index,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.locator {
            Locator::Id(id) => write!(f, "id={}", id)?,
            Locator::Text(text) => write!(f, "text=\"{}\"", text)?,
        }
        if let Some(index) = self.index {
            write!(f, "[{}]", index)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct TargetRepr {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    index: Option<usize>,
}

impl TryFrom<TargetRepr> for Target {
    type Error = String;

    fn try_from(repr: TargetRepr) -> Result<Self, Self::Error> {
        let locator = match (repr.id, repr.text) {
            (Some(id), None) => Locator::Id(id),
            (None, Some(text)) => Locator::Text(text),
            (Some(_), Some(_)) => return Err("目标只能指定 id 或 text 之一".to_string()),
            (None, None) => return Err("目标必须指定 id 或 text".to_string()),
        };
        Ok(Target {
            locator,
            index: repr.index,
        })
    }
}

impl From<Target> for TargetRepr {
    fn from(target: Target) -> Self {
        let (id, text) = match target.locator {
            Locator::Id(id) => (Some(id), None),
            Locator::Text(text) => (None, Some(text)),
        };
        TargetRepr {
            id,
            text,
            index: target.index,
        }
    }
}

/// 驱动返回的元素句柄
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHandle(pub String);

impl ElementHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
