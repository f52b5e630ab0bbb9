use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider '{provider}' is missing required config key '{key}'")]
    MissingConfig {
        provider: &'static str,
        key: &'static str,
    },

    #[error("Invalid config for provider '{provider}': {message}")]
    InvalidConfig {
        provider: &'static str,
        message: String,
    },

    #[error("Unknown mail provider: {0}")]
    UnknownProvider(String),

    #[error("{provider} send failed: {message}")]
    Send {
        provider: &'static str,
        message: String,
        /// HTTP status for API providers, `None` for SMTP.
        status: Option<u16>,
    },

    #[error("{provider} transport error: {message}")]
    Transport {
        provider: &'static str,
        message: String,
    },

    #[error("No configured mail provider is available")]
    NoProviderAvailable,
}

impl ProviderError {
    pub fn send(provider: &'static str, message: impl Into<String>) -> Self {
        Self::Send {
            provider,
            message: message.into(),
            status: None,
        }
    }

    pub fn transport(provider: &'static str, message: impl Into<String>) -> Self {
        Self::Transport {
            provider,
            message: message.into(),
        }
    }
}
