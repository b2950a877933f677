//! 测试场景定义

use mtp_driver::{Platform, Target};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::ExecutorError;

/// 测试场景
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// 场景名称
    pub name: String,

    /// 场景描述
    #[serde(default)]
    pub description: Option<String>,

    /// 标签
    #[serde(default)]
    pub tags: Vec<String>,

    /// 场景级平台限定，未单独声明平台的步骤继承此值
    #[serde(default)]
    pub platform: Option<Platform>,

    /// 可复用的步骤序列 (登录、登出、返回等)
    #[serde(default)]
    pub flows: BTreeMap<String, Vec<ScenarioStep>>,

    /// 测试步骤
    pub steps: Vec<ScenarioStep>,

    /// 收尾步骤 (主步骤结束后执行，不影响场景结果)
    #[serde(default)]
    pub teardown: Vec<ScenarioStep>,
}

/// 测试步骤
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioStep {
    /// 步骤名称
    #[serde(default)]
    pub name: Option<String>,

    /// 平台限定，不匹配时跳过
    #[serde(default)]
    pub platform: Option<Platform>,

    /// 动作类型
    pub action: Action,
}

impl ScenarioStep {
    pub fn new(action: Action) -> Self {
        Self {
            name: None,
            platform: None,
            action,
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn only_on(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    /// 报告中展示的描述
    pub fn description(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.action.description())
    }
}

/// 动作类型
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// 点击
    Tap { target: Target },

    /// 输入文本
    Type {
        target: Target,
        text: String,
        /// 先清空再输入
        #[serde(default)]
        replace: bool,
    },

    /// 生成当前 TOTP 验证码并输入 (总是先清空)
    TypeTotp {
        target: Target,
        secret: String,
        #[serde(default)]
        digits: Option<usize>,
    },

    /// 等待元素可见
    WaitForVisible {
        target: Target,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// 等待元素存在
    WaitForExist {
        target: Target,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// 断言可见 (立即检查，不重试)
    AssertVisible { target: Target },

    /// 断言不可见
    AssertNotVisible { target: Target },

    /// 断言存在
    AssertExists { target: Target },

    /// 固定等待
    Sleep { duration_ms: u64 },

    /// 重新加载应用
    ReloadApp,

    /// 引用 `flows` 中定义的步骤序列
    Flow { name: String },
}

impl Action {
    /// 动作的目标元素
    pub fn target(&self) -> Option<&Target> {
        match self {
            Action::Tap { target }
            | Action::Type { target, .. }
            | Action::TypeTotp { target, .. }
            | Action::WaitForVisible { target, .. }
            | Action::WaitForExist { target, .. }
            | Action::AssertVisible { target }
            | Action::AssertNotVisible { target }
            | Action::AssertExists { target } => Some(target),
            Action::Sleep { .. } | Action::ReloadApp | Action::Flow { .. } => None,
        }
    }

    pub fn description(&self) -> String {
        match self {
            Action::Tap { target } => format!("点击 {}", target),
            Action::Type { target, text, replace } => {
                if *replace {
                    format!("替换 {} 文本为 \"{}\"", target, text)
                } else {
                    format!("在 {} 输入 \"{}\"", target, text)
                }
            }
            Action::TypeTotp { target, .. } => format!("在 {} 输入 TOTP 验证码", target),
            Action::WaitForVisible { target, .. } => format!("等待 {} 可见", target),
            Action::WaitForExist { target, .. } => format!("等待 {} 存在", target),
            Action::AssertVisible { target } => format!("断言 {} 可见", target),
            Action::AssertNotVisible { target } => format!("断言 {} 不可见", target),
            Action::AssertExists { target } => format!("断言 {} 存在", target),
            Action::Sleep { duration_ms } => format!("等待 {}ms", duration_ms),
            Action::ReloadApp => "重新加载应用".to_string(),
            Action::Flow { name } => format!("执行流程 {}", name),
        }
    }
}

impl Scenario {
    /// 从文件加载场景，根据扩展名选择格式
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|s| s.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_file(path),
            Some("json") => Self::from_json_file(path),
            _ => Err(ExecutorError::ScenarioLoadFailed(format!(
                "不支持的场景文件格式: {:?}",
                path
            ))),
        }
    }

    /// 从 YAML 文件加载场景
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// 从 YAML 字符串加载场景
    pub fn from_yaml_str(yaml: &str) -> crate::Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| ExecutorError::SerdeError(e.to_string()))
    }

    /// 从 JSON 文件加载场景
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// 从 JSON 字符串加载场景
    pub fn from_json_str(json: &str) -> crate::Result<Self> {
        serde_json::from_str(json).map_err(|e| ExecutorError::SerdeError(e.to_string()))
    }

    /// 导出为 YAML
    pub fn to_yaml(&self) -> crate::Result<String> {
        serde_yaml::to_string(self).map_err(|e| ExecutorError::SerdeError(e.to_string()))
    }

    /// 导出为 JSON
    pub fn to_json(&self) -> crate::Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| ExecutorError::SerdeError(e.to_string()))
    }

    /// 展开主步骤
    ///
    /// 内联所有 `flow` 引用，并把场景级平台限定下放到未声明平台的步骤。
    pub fn expand_steps(&self) -> crate::Result<Vec<ScenarioStep>> {
        self.expand(&self.steps)
    }

    /// 展开收尾步骤
    pub fn expand_teardown(&self) -> crate::Result<Vec<ScenarioStep>> {
        self.expand(&self.teardown)
    }

    /// 检查场景结构 (流程引用、循环)
    pub fn validate(&self) -> crate::Result<()> {
        if self.name.trim().is_empty() {
            return Err(ExecutorError::ScenarioLoadFailed("场景名称不能为空".to_string()));
        }
        self.expand_steps()?;
        self.expand_teardown()?;
        for name in self.flows.keys() {
            self.expand(&[ScenarioStep::new(Action::Flow { name: name.clone() })])?;
        }
        Ok(())
    }

    fn expand(&self, steps: &[ScenarioStep]) -> crate::Result<Vec<ScenarioStep>> {
        let mut out = Vec::new();
        let mut stack = Vec::new();
        self.expand_into(steps, self.platform, None, &mut stack, &mut out)?;
        Ok(out)
    }

    fn expand_into(
        &self,
        steps: &[ScenarioStep],
        inherited: Option<Platform>,
        prefix: Option<&str>,
        stack: &mut Vec<String>,
        out: &mut Vec<ScenarioStep>,
    ) -> crate::Result<()> {
        for step in steps {
            let platform = step.platform.or(inherited);

            if let Action::Flow { name } = &step.action {
                if stack.contains(name) {
                    stack.push(name.clone());
                    return Err(ExecutorError::FlowCycle(stack.join(" -> ")));
                }
                let flow = self
                    .flows
                    .get(name)
                    .ok_or_else(|| ExecutorError::UnknownFlow(name.clone()))?;

                stack.push(name.clone());
                self.expand_into(flow, platform, Some(name), stack, out)?;
                stack.pop();
                continue;
            }

            let description = step.description();
            out.push(ScenarioStep {
                name: Some(match prefix {
                    Some(flow) => format!("[{}] {}", flow, description),
                    None => description,
                }),
                platform,
                action: step.action.clone(),
            });
        }
        Ok(())
    }
}
