//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `TANTRIK__*` 覆盖（双下划线表示嵌套，如 `TANTRIK__SERVER__PORT=9000`）。
//! 为兼容旧部署，`PORT`、`GEMINI_MODEL`、`PREDICTION_SERVICE_URL`、`IMAGE_SERVICE_URL` 在最后单独覆盖。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::core::TantrikError;
use crate::llm::OpenAiClientOptions;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSection,
    pub llm: LlmSection,
    pub farm: FarmSection,
}

/// [server] 段：监听地址
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// [llm] 段：OpenAI 兼容端点、单次超时与传输层重试次数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub base_url: Option<String>,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            base_url: None,
            request_timeout_secs: 30,
            max_retries: 2,
        }
    }
}

impl LlmSection {
    pub fn client_options(&self) -> OpenAiClientOptions {
        OpenAiClientOptions {
            base_url: self.base_url.clone(),
            timeout: Duration::from_secs(self.request_timeout_secs),
            max_retries: self.max_retries,
        }
    }
}

/// [farm] 段：Pungde Agent 模型与外部服务地址
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FarmSection {
    pub model: String,
    pub prediction_url: String,
    pub prediction_timeout_secs: u64,
    pub climate_url: String,
    pub climate_timeout_secs: u64,
    /// 图片生成服务；未配置时 generate_image 返回 error 状态
    pub image_service_url: Option<String>,
    pub image_timeout_secs: u64,
}

impl Default for FarmSection {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            prediction_url: "http://127.0.0.1:8001/predict".to_string(),
            prediction_timeout_secs: 30,
            climate_url: "https://power.larc.nasa.gov/api/temporal/climatology/point".to_string(),
            climate_timeout_secs: 30,
            image_service_url: None,
            image_timeout_secs: 60,
        }
    }
}

/// 从 config 目录加载配置，环境变量 TANTRIK__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 叠加环境变量 TANTRIK__*（双下划线表示嵌套键）
/// 4. 最后应用旧式环境变量（PORT 等）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, TantrikError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("TANTRIK")
            .separator("__")
            .try_parsing(true),
    );

    let mut cfg: AppConfig = builder.build()?.try_deserialize()?;
    apply_legacy_env(&mut cfg, |k| std::env::var(k).ok());
    Ok(cfg)
}

fn apply_legacy_env(cfg: &mut AppConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(port) = lookup("PORT").and_then(|p| p.parse::<u16>().ok()) {
        cfg.server.port = port;
    }
    if let Some(model) = lookup("GEMINI_MODEL").filter(|s| !s.is_empty()) {
        cfg.farm.model = model;
    }
    if let Some(url) = lookup("PREDICTION_SERVICE_URL").filter(|s| !s.is_empty()) {
        cfg.farm.prediction_url = url;
    }
    if let Some(url) = lookup("IMAGE_SERVICE_URL").filter(|s| !s.is_empty()) {
        cfg.farm.image_service_url = Some(url);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.llm.request_timeout_secs, 30);
        assert_eq!(cfg.llm.max_retries, 2);
        assert_eq!(cfg.farm.model, "gemini-2.5-flash");
        assert!(cfg.farm.image_service_url.is_none());
    }

    #[test]
    fn test_explicit_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[server]\nport = 9100\n\n[llm]\nbase_url = \"http://localhost:4000/v1\"\nmax_retries = 0\n"
        )
        .unwrap();

        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.llm.base_url.as_deref(), Some("http://localhost:4000/v1"));
        assert_eq!(cfg.llm.max_retries, 0);
        assert_eq!(cfg.llm.request_timeout_secs, 30);
        assert_eq!(cfg.farm.climate_timeout_secs, 30);
    }

    #[test]
    fn test_legacy_env_overrides() {
        let mut cfg = AppConfig::default();
        apply_legacy_env(&mut cfg, |k| match k {
            "PORT" => Some("5050".into()),
            "GEMINI_MODEL" => Some("gemini-2.0-pro".into()),
            "IMAGE_SERVICE_URL" => Some("http://images.local/generate".into()),
            _ => None,
        });
        assert_eq!(cfg.server.port, 5050);
        assert_eq!(cfg.farm.model, "gemini-2.0-pro");
        assert_eq!(cfg.farm.prediction_url, "http://127.0.0.1:8001/predict");
        assert_eq!(
            cfg.farm.image_service_url.as_deref(),
            Some("http://images.local/generate")
        );
    }

    #[test]
    fn test_bad_port_is_ignored() {
        let mut cfg = AppConfig::default();
        apply_legacy_env(&mut cfg, |k| (k == "PORT").then(|| "eighty".to_string()));
        assert_eq!(cfg.server.port, 8080);
    }
}
