pub mod mesh;
pub mod openai;
pub mod unified;
