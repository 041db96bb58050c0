use serde::{Deserialize, Serialize};

/// Static capabilities and pricing of the served model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub context_window: u32,
    pub max_tokens: u32,
    pub supports_images: bool,
    pub supports_prompt_cache: bool,
    pub input_price: f64,
    pub output_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub id: String,
    pub info: ModelInfo,
}
