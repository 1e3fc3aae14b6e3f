use thiserror::Error;

/// Failures talking to the upstream provider.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    #[error("network error: {0}")]
    Network(String),

    #[error("provider returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("failed to decode provider response: {0}")]
    Decode(String),
}

impl ProviderError {
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::Decode(err.to_string());
        }
        if err.is_timeout() {
            return Self::Network(format!("request timed out: {err}"));
        }
        Self::Network(err.to_string())
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            Self::Decode(_) => false,
        }
    }
}

/// Failures mapping a provider payload into a `WeatherSnapshot`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NormalizationError {
    #[error("provider payload is missing the {0} section")]
    MissingSection(&'static str),

    #[error("provider field {field} is malformed: {detail}")]
    MalformedField { field: String, detail: String },
}

impl NormalizationError {
    pub(crate) fn malformed(field: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::MalformedField {
            field: field.into(),
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WeatherError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Normalization(#[from] NormalizationError),
}

impl WeatherError {
    /// Stable machine-readable discriminator for API payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Provider(ProviderError::Network(_)) => "network",
            Self::Provider(ProviderError::HttpStatus { .. }) => "http_status",
            Self::Provider(ProviderError::Decode(_)) => "decode",
            Self::Normalization(NormalizationError::MissingSection(_)) => "missing_section",
            Self::Normalization(NormalizationError::MalformedField { .. }) => "malformed_field",
        }
    }

    /// Message safe to hand to API clients; never includes upstream bodies.
    pub fn user_message(&self) -> String {
        match self {
            Self::Provider(ProviderError::Network(_)) => {
                "Weather provider is unreachable. Try again shortly.".to_string()
            }
            Self::Provider(ProviderError::HttpStatus { status, .. }) => {
                format!("Weather provider responded with HTTP {status}")
            }
            Self::Provider(ProviderError::Decode(_)) => {
                "Weather provider sent an unreadable response".to_string()
            }
            Self::Normalization(NormalizationError::MissingSection(section)) => {
                format!("Weather data is incomplete: no {section} data available")
            }
            Self::Normalization(NormalizationError::MalformedField { field, .. }) => {
                format!("Weather data is invalid: field {field} could not be read")
            }
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Provider(err) => err.is_retryable(),
            Self::Normalization(_) => false,
        }
    }
}
