use std::path::PathBuf;

use thiserror::Error;

/// The error type for `u2net-burn` operations.
///
/// Covers model selection, weight provisioning, and the image boundary of
/// the inference pipeline. Forward-pass failures inside Burn panic rather
/// than surface here, matching the framework's own contract.
#[derive(Error, Debug)]
pub enum U2NetError {
    /// The requested model identifier is not part of the pretrained set.
    #[error("unknown model '{name}' - available models: {available}")]
    UnknownModel {
        /// The identifier that failed to resolve.
        name: String,
        /// Comma-separated list of recognized identifiers.
        available: String,
    },

    /// The weight file is still absent after the provisioning step.
    #[error("weight file for model '{model}' not found at {path}")]
    WeightFileMissing {
        /// The model whose weights are missing.
        model: String,
        /// The cache path that was checked.
        path: PathBuf,
    },

    /// The weight transfer failed; the underlying error is propagated as-is.
    #[error("failed to download weights from {url}")]
    Download {
        /// The remote URL of the weight file.
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Deserializing the weight file into the network record failed.
    #[error("failed to load weights: {reason}")]
    WeightLoading {
        /// The reason for the deserialization failure.
        reason: String,
    },

    /// The per-user cache directory could not be resolved or created.
    #[error("failed to prepare weight cache directory: {reason}")]
    CacheDir {
        /// The reason the cache directory is unusable.
        reason: String,
    },

    /// An image decode or encode operation failed.
    #[error(transparent)]
    Image(#[from] image::ImageError),

    /// Moving tensor data between host memory and image buffers failed.
    #[error("failed to convert tensor data: {reason}")]
    TensorConversion {
        /// A description of the failed conversion.
        reason: String,
    },

    /// A filesystem operation on the weight cache failed.
    #[error("file system error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized `Result` type for `u2net-burn` operations.
pub type U2NetResult<T> = Result<T, U2NetError>;
