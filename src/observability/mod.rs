//! 可观测性：tracing 日志（默认 info，RUST_LOG 可覆盖）
//!
//! 日志写到 stderr，stdout 留给 pungde 命令的 JSON 输出。

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
