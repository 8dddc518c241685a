#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing checkpoint metadata \"{0}\"")]
    MissingCheckpointMetadata(String),

    #[error("Found non-finite loss {loss} at iteration {iteration}")]
    NonFiniteLoss { iteration: u64, loss: f64 },

    #[error("Renderer error: {0}")]
    Renderer(String),

    #[error("Safetensors error: {0}")]
    Safetensors(#[from] safetensors::SafeTensorError),

    #[error("Tensor data error: {0:?}")]
    TensorData(burn::tensor::DataError),

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Validation error: {0} should be {1}")]
    Validation(String, String),
}
