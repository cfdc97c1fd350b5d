//! Pungde - 农业助手 Agent 定义的命令行入口
//!
//! ```text
//! pungde manifest                 输出整棵 Agent 树的 JSON 清单
//! pungde tools                    列出本地函数工具
//! pungde tool <name> '<json>'     执行一个本地函数工具并输出其 JSON 结果
//! pungde transform '<text>'       把文本中的 [IMAGE_REQUEST: ...] 替换为生成的图片
//! ```

use anyhow::{bail, Context};
use serde_json::Value;
use tantrik::config::load_config;
use tantrik::farm::{build_pungde, image_generator};
use tantrik::observability;
use tantrik::transform::{ImageMarkerTransform, TextTransform};

const USAGE: &str =
    "usage: pungde manifest | pungde tools | pungde tool <name> '<json args>' | pungde transform '<text>'";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    observability::init();

    let cfg = load_config(None).context("Failed to load config")?;
    let root = build_pungde(&cfg.farm);

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("manifest") => {
            println!("{}", serde_json::to_string_pretty(&root.manifest())?);
        }
        Some("tools") => {
            for (name, description) in root.function_tools().tool_descriptions() {
                println!("{name}\t{description}");
            }
        }
        Some("tool") => {
            let Some(name) = args.get(1) else {
                bail!(USAGE);
            };
            let tool_args: Value = match args.get(2) {
                Some(raw) => serde_json::from_str(raw).context("tool arguments must be JSON")?,
                None => Value::Object(Default::default()),
            };
            let output = root
                .function_tools()
                .execute(name, tool_args)
                .await
                .map_err(anyhow::Error::msg)?;
            println!("{output}");
        }
        Some("transform") => {
            let Some(text) = args.get(1) else {
                bail!(USAGE);
            };
            let transform = ImageMarkerTransform::new(image_generator(&cfg.farm));
            println!("{}", transform.transform(text).await);
        }
        _ => bail!(USAGE),
    }

    Ok(())
}
