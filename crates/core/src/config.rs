use std::env;
use crate::error::{AppError, Result};
use dotenvy::dotenv;

#[derive(Clone, Debug)]
pub struct Config {
    pub gemini_api_key: String,
    /// Model used for diagnosis and product search (text output).
    pub text_model: String,
    /// Model used for makeup synthesis (inline image output).
    pub image_model: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load .env file if it exists, ignore if it doesn't
        let _ = dotenv();

        let api_key = env::var("GEMINI_API_KEY")
            .map_err(|_| AppError::Config("GEMINI_API_KEY must be set in environment or .env file".to_string()))?;

        let text_model = env::var("GEMINI_TEXT_MODEL")
            .unwrap_or_else(|_| "gemini-flash-latest".to_string());

        let image_model = env::var("GEMINI_IMAGE_MODEL")
            .unwrap_or_else(|_| "gemini-2.5-flash-image".to_string());

        Ok(Self {
            gemini_api_key: api_key,
            text_model,
            image_model,
        })
    }
}
