// HTTP clients for the external classification services.

pub mod gemini_vision_client;
pub mod perspective_client;

pub use gemini_vision_client::GeminiVisionClient;
pub use perspective_client::PerspectiveClient;
