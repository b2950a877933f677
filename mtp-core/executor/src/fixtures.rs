//! 测试夹具数据
//!
//! 每次测试运行构造一次，以引用方式传入执行器。
//! 场景中的文本、目标和 TOTP 密钥可以通过 `${name}` 引用这些值。

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;
use uuid::Uuid;

/// 测试夹具
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fixtures {
    /// 随机标记 (用于生成唯一的房间名、消息内容)
    #[serde(default)]
    pub random: String,

    /// 主测试用户
    #[serde(default)]
    pub user: String,

    #[serde(default)]
    pub password: String,

    /// 备用用户 (无发言权限，开启了双因素认证)
    #[serde(default)]
    pub alternate_user: String,

    #[serde(default)]
    pub alternate_user_password: String,

    /// 备用用户的 TOTP 密钥 (base32)
    #[serde(default)]
    pub alternate_user_totp_secret: String,

    /// 自定义变量
    #[serde(default)]
    pub vars: BTreeMap<String, String>,
}

fn var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("变量模式是合法的正则表达式")
    })
}

impl Fixtures {
    /// 生成随机标记
    pub fn random_token() -> String {
        Uuid::new_v4().simple().to_string()[..8].to_string()
    }

    /// 如果未配置随机标记则生成一个
    pub fn ensure_random(&mut self) {
        if self.random.is_empty() {
            self.random = Self::random_token();
        }
    }

    pub fn with_var(mut self, name: &str, value: &str) -> Self {
        self.vars.insert(name.to_string(), value.to_string());
        self
    }

    /// 查找变量值，自定义变量不能覆盖内置字段
    pub fn get(&self, name: &str) -> Option<&str> {
        let builtin = match name {
            "random" => Some(&self.random),
            "user" => Some(&self.user),
            "password" => Some(&self.password),
            "alternate_user" => Some(&self.alternate_user),
            "alternate_user_password" => Some(&self.alternate_user_password),
            "alternate_user_totp_secret" => Some(&self.alternate_user_totp_secret),
            _ => None,
        };
        builtin.or_else(|| self.vars.get(name)).map(String::as_str)
    }

    /// 替换模板中的 `${name}`
    ///
    /// 遇到未定义的变量时返回该变量名。
    pub fn interpolate(&self, template: &str) -> std::result::Result<String, String> {
        let pattern = var_pattern();
        let mut output = String::with_capacity(template.len());
        let mut last = 0;

        for caps in pattern.captures_iter(template) {
            let whole = caps.get(0).ok_or_else(|| template.to_string())?;
            let name = &caps[1];
            let value = self.get(name).ok_or_else(|| name.to_string())?;

            output.push_str(&template[last..whole.start()]);
            output.push_str(value);
            last = whole.end();
        }

        output.push_str(&template[last..]);
        Ok(output)
    }

    /// 隐藏密码和密钥后的副本，用于展示
    pub fn masked(&self) -> Self {
        let mask = |s: &str| {
            if s.is_empty() {
                String::new()
            } else {
                "******".to_string()
            }
        };
        Self {
            password: mask(&self.password),
            alternate_user_password: mask(&self.alternate_user_password),
            alternate_user_totp_secret: mask(&self.alternate_user_totp_secret),
            ..self.clone()
        }
    }
}
