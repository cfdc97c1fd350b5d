//! Pungde 根 Agent 与六个子 Agent

use std::sync::Arc;
use std::time::Duration;

use crate::config::FarmSection;
use crate::tools::{
    AgroClimateClient, AgroClimateTool, CropYieldClient, CropYieldTool, HttpImageGenerator,
    ImageGenerator, ImageTool, Tool, UnconfiguredImageGenerator,
};

use super::{AgentDescriptor, ToolRef};

pub const ROOT_AGENT_NAME: &str = "Pungde";

const GOOGLE_SEARCH: &str = "google_search";
const ANALYSIS_KEY: &str = "agrianalysis";

/// 本地函数工具集合，按 [farm] 配置构建
#[derive(Clone)]
pub struct FarmToolkit {
    pub crop_yield: Arc<dyn Tool>,
    pub agroclimate: Arc<dyn Tool>,
    pub image: Arc<dyn Tool>,
}

/// 按 image_service_url 选择图像生成器；未配置时所有请求都返回 error
pub fn image_generator(farm: &FarmSection) -> Arc<dyn ImageGenerator> {
    match &farm.image_service_url {
        Some(url) => Arc::new(HttpImageGenerator::new(
            url.clone(),
            Duration::from_secs(farm.image_timeout_secs),
        )),
        None => {
            tracing::warn!("image_service_url not configured, image generation will report errors");
            Arc::new(UnconfiguredImageGenerator)
        }
    }
}

impl FarmToolkit {
    pub fn from_config(farm: &FarmSection) -> Self {
        let generator = image_generator(farm);
        Self {
            crop_yield: Arc::new(CropYieldTool::new(CropYieldClient::new(
                farm.prediction_url.clone(),
                Duration::from_secs(farm.prediction_timeout_secs),
            ))),
            agroclimate: Arc::new(AgroClimateTool::new(AgroClimateClient::new(
                farm.climate_url.clone(),
                Duration::from_secs(farm.climate_timeout_secs),
            ))),
            image: Arc::new(ImageTool::new(generator)),
        }
    }
}

/// 按配置构建完整 Agent 树
pub fn build_pungde(farm: &FarmSection) -> AgentDescriptor {
    build_tree(&farm.model, &FarmToolkit::from_config(farm))
}

pub(crate) fn build_tree(model: &str, toolkit: &FarmToolkit) -> AgentDescriptor {
    let sub = |agent: AgentDescriptor| ToolRef::Agent(Arc::new(agent));

    let agri_analyzer = AgentDescriptor::new(
        "agri_analyzer_agent",
        model,
        include_str!("prompts/agri_analyzer.md"),
    )
    .with_description(
        "Agricultural analysis tool that retrieves crop yield predictions, location coordinates, \
         and crop requirements for a given crop and location",
    )
    .with_output_key(ANALYSIS_KEY)
    .with_tool(ToolRef::Function(Arc::clone(&toolkit.crop_yield)));

    let crop_suitability = AgentDescriptor::new(
        "crop_suitability_agent",
        model,
        include_str!("prompts/crop_suitability.md"),
    )
    .with_description(
        "Crop suitability expert that analyzes and explains whether a crop can grow successfully \
         in a specific location based on climate data (temperature, rainfall, humidity)",
    )
    .with_output_key(ANALYSIS_KEY)
    .with_tool(ToolRef::Function(Arc::clone(&toolkit.agroclimate)));

    let grow_anyways = AgentDescriptor::new(
        "grow_anyways_agent",
        model,
        include_str!("prompts/grow_anyways.md"),
    )
    .with_description(
        "Grow anyway strategist that provides practical techniques and methods (polyhouse, \
         irrigation, soil amendments, protective structures) to help farmers grow crops in \
         unsuitable or challenging conditions",
    )
    .with_output_key(ANALYSIS_KEY)
    .with_tool(ToolRef::Builtin(GOOGLE_SEARCH));

    let yield_improvement = AgentDescriptor::new(
        "yield_improvement_agent",
        model,
        include_str!("prompts/yield_improvement.md"),
    )
    .with_description(
        "Yield improvement expert that provides comprehensive strategies to maximize crop \
         production including seed selection, spacing, fertilizer schedules, irrigation, and \
         pest management",
    )
    .with_output_key(ANALYSIS_KEY)
    .with_tool(ToolRef::Builtin(GOOGLE_SEARCH));

    let image_generator = AgentDescriptor::new(
        "image_generator_agent",
        model,
        include_str!("prompts/image_generator.md"),
    )
    .with_description("Generates images based on prompts and returns image URL")
    .with_output_key("image_url")
    .with_tool(ToolRef::Function(Arc::clone(&toolkit.image)));

    let seed_identifier = AgentDescriptor::new(
        "seed_identifier_agent",
        model,
        include_str!("prompts/seed_identifier.md"),
    )
    .with_description(
        "Seed selection expert that identifies ideal seed properties for specific locations and \
         provides trusted buying recommendations with quality assurance guidance",
    )
    .with_output_key(ANALYSIS_KEY)
    .with_tool(ToolRef::Builtin(GOOGLE_SEARCH));

    let root = AgentDescriptor::new(ROOT_AGENT_NAME, model, include_str!("prompts/pungde.md"))
        .with_description(
            "Friendly farming assistant that helps farmers with crop cultivation decisions by \
             collecting crop and location information, validating supported crops, and \
             delegating to agricultural analysis tools",
        )
        .with_tool(sub(agri_analyzer))
        .with_tool(sub(crop_suitability))
        .with_tool(sub(grow_anyways))
        .with_tool(sub(yield_improvement))
        .with_tool(sub(image_generator))
        .with_tool(sub(seed_identifier));

    tracing::info!(agent = %root.name, model = %root.model, "agent tree built");
    root
}
