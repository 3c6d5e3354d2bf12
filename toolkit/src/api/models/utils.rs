use serde::{Deserialize, Serialize};

/// Upper bound on `GET /random` lengths
pub const MAX_RANDOM_LENGTH: usize = 1024;

#[derive(Debug, Deserialize)]
pub struct SlugRequest {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SlugResponse {
    pub slug: String,
}

#[derive(Debug, Deserialize)]
pub struct RandomQuery {
    #[serde(default = "RandomQuery::default_length")]
    pub length: usize,
}

impl RandomQuery {
    fn default_length() -> usize {
        32
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RandomResponse {
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EchoRequest {
    pub message: String,
}

/// Outcome of forwarding a payload to the configured remote endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct PushResponse {
    pub status: u16,
}
