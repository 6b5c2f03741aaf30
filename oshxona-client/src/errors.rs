pub type KitchenResult<T> = std::result::Result<T, KitchenError>;

/// Failure talking to the generative model. Malformed model output is not an
/// error; it decodes to an empty list instead.
#[derive(thiserror::Error, Debug)]
pub enum ModelError {
    #[error("Model request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Model API returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("Unreadable model response envelope: {0}")]
    Envelope(#[from] serde_json::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum KitchenError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("Cookbook storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
    #[error("Recipe {0} is not in the current results")]
    UnknownRecipe(String),
}
