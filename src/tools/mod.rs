pub mod agroclimate;
pub mod crop_yield;
pub mod error;
pub mod image;
pub mod registry;

pub use agroclimate::{AgroClimate, AgroClimateClient, AgroClimateTool};
pub use crop_yield::{CropYieldClient, CropYieldTool};
pub use error::ToolError;
pub use image::{
    HttpImageGenerator, ImageGenerator, ImageOutcome, ImageTool, UnconfiguredImageGenerator,
};
pub use registry::{Tool, ToolRegistry};

