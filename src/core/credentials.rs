//! API 凭据：主 Key 必填，备用 Key 可选

use crate::core::TantrikError;

pub const PRIMARY_KEY_ENV: &str = "OPENAI_API_KEY_PRIMARY";
pub const FALLBACK_KEY_ENV: &str = "OPENAI_API_KEY_FALLBACK";

#[derive(Clone)]
pub struct Credentials {
    pub primary: String,
    pub fallback: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("primary", &"***")
            .field("fallback", &self.fallback.as_ref().map(|_| "***"))
            .finish()
    }
}

impl Credentials {
    /// 从环境变量读取；空字符串视为未设置
    pub fn from_env() -> Result<Self, TantrikError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, TantrikError> {
        let non_empty = |k: &str| lookup(k).filter(|v| !v.trim().is_empty());
        let primary =
            non_empty(PRIMARY_KEY_ENV).ok_or(TantrikError::MissingCredential(PRIMARY_KEY_ENV))?;
        Ok(Self {
            primary,
            fallback: non_empty(FALLBACK_KEY_ENV),
        })
    }
}
