//! Error types for the DigitalOcean provider

use thiserror::Error;

use tentacle_core::FleetError;

/// Errors that can occur talking to the DigitalOcean API
#[derive(Error, Debug)]
pub enum CloudError {
    /// Transport-level failure
    #[error("HTTP error: {0}")]
    Http(String),

    /// Non-success status returned by the API
    #[error("DigitalOcean API returned {status}: {message}")]
    Api { status: u16, message: String },

    /// Response body did not match the expected shape
    #[error("unexpected API response: {0}")]
    Decode(String),

    /// No API token configured
    #[error("DigitalOcean API token is empty")]
    MissingToken,
}

impl From<reqwest::Error> for CloudError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            CloudError::Decode(err.to_string())
        } else {
            CloudError::Http(err.to_string())
        }
    }
}

impl From<serde_json::Error> for CloudError {
    fn from(err: serde_json::Error) -> Self {
        CloudError::Decode(err.to_string())
    }
}

impl From<CloudError> for FleetError {
    fn from(err: CloudError) -> Self {
        FleetError::Provider(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_maps_to_provider_error() {
        let err: FleetError = CloudError::Api {
            status: 401,
            message: "Unable to authenticate you".to_string(),
        }
        .into();
        match err {
            FleetError::Provider(msg) => {
                assert!(msg.contains("401"));
                assert!(msg.contains("Unable to authenticate you"));
            }
            other => panic!("expected Provider, got {other:?}"),
        }
    }
}
