//! TOTP 命令处理

use anyhow::{Context, Result};
use chrono::Utc;
use colored::Colorize;

use mtp_executor::TestConfig;
use mtp_totp::TotpGenerator;

pub fn handle(action: crate::TotpAction) -> Result<()> {
    match action {
        crate::TotpAction::Gen {
            secret,
            digits,
            time,
        } => generate_code(secret, digits, time),
        crate::TotpAction::Verify { code, secret, time } => verify_code(&code, secret, time),
    }
}

/// 未指定密钥时使用测试配置中备用用户的密钥
fn resolve_secret(
    secret: Option<String>,
    config: impl FnOnce() -> Result<TestConfig>,
) -> Result<String> {
    if let Some(secret) = secret {
        return Ok(secret);
    }

    let secret = config()?.fixtures.alternate_user_totp_secret;
    if secret.is_empty() {
        anyhow::bail!("未指定密钥, 测试配置中也没有 fixtures.alternate_user_totp_secret");
    }
    Ok(secret)
}

fn resolve_time(time: Option<u64>) -> Result<u64> {
    match time {
        Some(time) => Ok(time),
        None => u64::try_from(Utc::now().timestamp()).context("系统时间早于 Unix 纪元"),
    }
}

fn generate_code(secret: Option<String>, digits: usize, time: Option<u64>) -> Result<()> {
    let secret = resolve_secret(secret, TestConfig::load)?;
    let now = resolve_time(time)?;

    let generator = TotpGenerator::default().with_digits(digits)?;
    let code = generator.generate_at(&secret, now)?;

    println!("{}", code.green().bold());
    println!(
        "剩余有效时间: {} 秒",
        generator.seconds_remaining(now).to_string().yellow()
    );

    Ok(())
}

fn verify_code(code: &str, secret: Option<String>, time: Option<u64>) -> Result<()> {
    let secret = resolve_secret(secret, TestConfig::load)?;
    let now = resolve_time(time)?;

    let generator = TotpGenerator::default().with_digits(code.len())?;
    if !generator.verify(&secret, code, now)? {
        println!("{} 验证码无效", "✗".red().bold());
        anyhow::bail!("验证码校验失败");
    }

    println!("{} 验证码有效", "✓".green().bold());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

    #[test]
    fn test_resolve_secret_from_argument() {
        let secret = resolve_secret(Some(SECRET.to_string()), || {
            panic!("指定密钥时不应加载配置")
        })
        .unwrap();
        assert_eq!(secret, SECRET);
    }

    #[test]
    fn test_resolve_secret_from_config() {
        let secret = resolve_secret(None, || {
            let mut config = TestConfig::default();
            config.fixtures.alternate_user_totp_secret = SECRET.to_string();
            Ok(config)
        })
        .unwrap();
        assert_eq!(secret, SECRET);
    }

    #[test]
    fn test_resolve_secret_missing() {
        let err = resolve_secret(None, || Ok(TestConfig::default())).unwrap_err();
        assert!(err.to_string().contains("alternate_user_totp_secret"));
    }

    #[test]
    fn test_resolve_time() {
        assert_eq!(resolve_time(Some(59)).unwrap(), 59);
        assert!(resolve_time(None).unwrap() > 1_600_000_000);
    }

    #[test]
    fn test_generate_and_verify() {
        generate_code(Some(SECRET.to_string()), 8, Some(59)).unwrap();
        verify_code("94287082", Some(SECRET.to_string()), Some(59)).unwrap();
        assert!(generate_code(Some("not base32!".to_string()), 6, Some(59)).is_err());
        assert!(generate_code(Some(SECRET.to_string()), 12, Some(59)).is_err());
    }

    #[test]
    fn test_verify_mismatch_fails() {
        let err = verify_code("94287082", Some(SECRET.to_string()), Some(90)).unwrap_err();
        assert!(err.to_string().contains("校验失败"));
        assert!(verify_code("12345678", Some(SECRET.to_string()), Some(59)).is_err());
    }
}
