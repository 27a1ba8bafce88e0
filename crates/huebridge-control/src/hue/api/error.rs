use thiserror::Error;

#[derive(Error, Debug)]
pub enum HueError {
    #[error("Bridge discovery failed")]
    DiscoveryFailed,
    #[error("Link button not pressed. Please press the link button on the Hue Bridge.")]
    LinkButtonNotPressed,
    #[error("Unauthorized user. Please pair with the Hue Bridge again.")]
    Unauthorized,
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("API error: {0}")]
    ApiError(String),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Hue v1 error type for unauthorized users
pub const ERROR_UNAUTHORIZED_USER: i32 = 1;
/// Hue v1 error type when registering without pressing the link button
pub const ERROR_LINK_BUTTON_NOT_PRESSED: i32 = 101;

impl HueError {
    /// Map a v1 API error object to a typed error.
    pub fn from_api(error_type: i32, description: &str) -> Self {
        match error_type {
            ERROR_UNAUTHORIZED_USER => HueError::Unauthorized,
            ERROR_LINK_BUTTON_NOT_PRESSED => HueError::LinkButtonNotPressed,
            _ => HueError::ApiError(description.to_string()),
        }
    }
}
