//! 回复文本的后处理
//!
//! `[IMAGE_REQUEST: 描述]` 标记表示一次延迟的图像生成请求。编排 Agent 可以在提示词层面自行替换，
//! 这里提供确定性的实现：扫描全部标记，并发调用 ImageGenerator，成功替换为 Markdown 图片，
//! 失败替换为 `*Image unavailable: 描述*`。

use std::ops::Range;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use futures_util::future::join_all;
use regex::Regex;

use crate::tools::{ImageGenerator, ImageOutcome};

#[async_trait]
pub trait TextTransform: Send + Sync {
    async fn transform(&self, text: &str) -> String;
}

/// 文本中的一个图像标记
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageMarker {
    pub span: Range<usize>,
    pub description: String,
}

static IMAGE_MARKER_RE: OnceLock<Regex> = OnceLock::new();

/// 按出现顺序返回所有标记；描述内允许一层方括号
pub fn find_image_markers(text: &str) -> Vec<ImageMarker> {
    let re = IMAGE_MARKER_RE.get_or_init(|| {
        Regex::new(r"\[IMAGE_REQUEST:\s*((?:[^\[\]]|\[[^\[\]]*\])+?)\s*\]").unwrap()
    });
    re.captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let description = caps.get(1)?.as_str().trim();
            if description.is_empty() {
                return None;
            }
            Some(ImageMarker {
                span: whole.range(),
                description: description.to_string(),
            })
        })
        .collect()
}

pub struct ImageMarkerTransform {
    generator: Arc<dyn ImageGenerator>,
}

impl ImageMarkerTransform {
    pub fn new(generator: Arc<dyn ImageGenerator>) -> Self {
        Self { generator }
    }

    fn render(description: &str, outcome: &ImageOutcome) -> String {
        match outcome {
            ImageOutcome::Success { image_url } => format!("![{description}]({image_url})"),
            ImageOutcome::Error { .. } => format!("*Image unavailable: {description}*"),
        }
    }
}

#[async_trait]
impl TextTransform for ImageMarkerTransform {
    async fn transform(&self, text: &str) -> String {
        let markers = find_image_markers(text);
        if markers.is_empty() {
            return text.to_string();
        }

        let outcomes = join_all(
            markers
                .iter()
                .map(|m| self.generator.generate(&m.description)),
        )
        .await;

        let mut out = String::with_capacity(text.len());
        let mut cursor = 0;
        for (marker, outcome) in markers.iter().zip(&outcomes) {
            if let ImageOutcome::Error { error_message } = outcome {
                tracing::warn!(description = %marker.description, "image unavailable: {}", error_message);
            }
            out.push_str(&text[cursor..marker.span.start]);
            out.push_str(&Self::render(&marker.description, outcome));
            cursor = marker.span.end;
        }
        out.push_str(&text[cursor..]);
        out
    }
}
