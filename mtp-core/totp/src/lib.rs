//! MTP 一次性密码
//!
//! 基于时间的一次性密码 (TOTP, RFC 6238) 生成器，用于双因素认证登录步骤。
//!
//! 计数器为 `floor(unix_time / step)`，对计数器做 HMAC-SHA1，
//! 经动态截断后对 `10^digits` 取模并左侧补零。

use chrono::Utc;
use thiserror::Error;
use totp_rs::{Algorithm, Secret, TOTP};
use tracing::debug;

/// 默认验证码位数
pub const DEFAULT_DIGITS: usize = 6;

/// 默认时间步长（秒）
pub const DEFAULT_STEP: u64 = 30;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TotpError {
    #[error("无效的 TOTP 密钥: {0}")]
    InvalidSecret(String),

    #[error("无效的验证码位数: {0} (仅支持 6-8 位)")]
    InvalidDigits(usize),

    #[error("无效的时间步长: {0}")]
    InvalidStep(u64),
}

pub type Result<T> = std::result::Result<T, TotpError>;

/// TOTP 生成器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TotpGenerator {
    digits: usize,
    step: u64,
}

impl Default for TotpGenerator {
    fn default() -> Self {
        Self {
            digits: DEFAULT_DIGITS,
            step: DEFAULT_STEP,
        }
    }
}

impl TotpGenerator {
    /// 创建生成器
    pub fn new(digits: usize, step: u64) -> Result<Self> {
        if !(6..=8).contains(&digits) {
            return Err(TotpError::InvalidDigits(digits));
        }
        if step == 0 {
            return Err(TotpError::InvalidStep(step));
        }
        Ok(Self { digits, step })
    }

    /// 设置验证码位数
    pub fn with_digits(self, digits: usize) -> Result<Self> {
        Self::new(digits, self.step)
    }

    pub fn digits(&self) -> usize {
        self.digits
    }

    pub fn step(&self) -> u64 {
        self.step
    }

    /// 生成指定时间点（Unix 秒）的验证码
    pub fn generate_at(&self, secret: &str, unix_secs: u64) -> Result<String> {
        let totp = self.build(secret)?;
        Ok(totp.generate(unix_secs))
    }

    /// 生成当前时间的验证码
    pub fn generate(&self, secret: &str) -> Result<String> {
        self.generate_at(secret, now_unix())
    }

    /// 校验验证码 (仅当前时间窗口，不允许偏移)
    pub fn verify(&self, secret: &str, code: &str, unix_secs: u64) -> Result<bool> {
        Ok(self.generate_at(secret, unix_secs)? == code)
    }

    /// 当前时间窗口剩余秒数
    pub fn seconds_remaining(&self, unix_secs: u64) -> u64 {
        self.step - unix_secs % self.step
    }

    fn build(&self, secret: &str) -> Result<TOTP> {
        let bytes = decode_secret(secret)?;
        // 密钥长度由配置方决定，短于 128 位的历史密钥也需要支持
        Ok(TOTP::new_unchecked(
            Algorithm::SHA1,
            self.digits,
            0,
            self.step,
            bytes,
        ))
    }
}

/// 解码 base32 密钥
///
/// 忽略空白和 `=` 填充，不区分大小写。
pub fn decode_secret(secret: &str) -> Result<Vec<u8>> {
    let normalized: String = secret
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '=')
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if normalized.is_empty() {
        return Err(TotpError::InvalidSecret("密钥为空".to_string()));
    }

    let bytes = Secret::Encoded(normalized)
        .to_bytes()
        .map_err(|e| TotpError::InvalidSecret(format!("base32 解码失败: {:?}", e)))?;

    if bytes.is_empty() {
        return Err(TotpError::InvalidSecret("解码后密钥为空".to_string()));
    }

    debug!("TOTP 密钥解码成功: {} 字节", bytes.len());
    Ok(bytes)
}

/// 使用默认参数 (6 位, 30 秒) 生成指定时间点的验证码
pub fn generate_at(secret: &str, unix_secs: u64) -> Result<String> {
    TotpGenerator::default().generate_at(secret, unix_secs)
}

/// 使用默认参数生成当前验证码
pub fn generate(secret: &str) -> Result<String> {
    TotpGenerator::default().generate(secret)
}

fn now_unix() -> u64 {
    u64::try_from(Utc::now().timestamp()).unwrap_or(0)
}
