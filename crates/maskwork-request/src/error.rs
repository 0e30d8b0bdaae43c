//! Error type for request assembly.

use maskwork_pipeline::Dimensions;

use crate::route::{Param, Route};

/// Errors from building, routing, or reading back a request.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// The string is not a `data:<mime>;base64,<payload>` URI.
    #[error("invalid data URI: {0}")]
    InvalidDataUri(String),

    /// The data URI payload is not valid base64.
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    /// A mask was attached to a payload that carries no image.
    #[error("mask supplied without an image")]
    MaskWithoutImage,

    /// A mask does not have the image's dimensions.
    #[error("mask is {mask} but image is {image}")]
    MaskDimensionMismatch {
        /// Dimensions of the image already in the payload.
        image: Dimensions,
        /// Dimensions of the rejected mask.
        mask: Dimensions,
    },

    /// The selected route needs parameters the payload lacks.
    #[error("missing required parameters for {route}: {}", join_params(.missing))]
    MissingParams {
        /// Route that was selected.
        route: Route,
        /// Parameters absent from the payload, in route order.
        missing: Vec<Param>,
    },

    /// A prepared result belongs to an image that is no longer selected.
    #[error("prepared result is stale (ticket generation {ticket}, current {current})")]
    StaleResult {
        /// Generation the result was prepared for.
        ticket: u64,
        /// Generation currently selected.
        current: u64,
    },

    /// Preparation was requested with no image selected.
    #[error("no image selected")]
    NothingSelected,

    /// An image is selected but its prepared result has not been applied.
    #[error("selected image {key} has not been prepared")]
    NotPrepared {
        /// Key of the selected original.
        key: crate::selection::ImageKey,
    },

    /// The generation job failed.
    #[error("prediction {id} failed: {message}")]
    PredictionFailed {
        /// Prediction id.
        id: String,
        /// Provider's error message, or a placeholder.
        message: String,
    },

    /// The generation job was canceled.
    #[error("prediction {id} was canceled")]
    PredictionCanceled {
        /// Prediction id.
        id: String,
    },

    /// The job succeeded without producing any output.
    #[error("prediction {id} succeeded with no output")]
    EmptyOutput {
        /// Prediction id.
        id: String,
    },

    /// The job has not finished yet.
    #[error("prediction {id} is still {status}")]
    Pending {
        /// Prediction id.
        id: String,
        /// Last reported status.
        status: crate::prediction::PredictionStatus,
    },

    /// Polling gave up before the job finished.
    #[error("prediction {id} did not finish after {attempts} polls")]
    TimedOut {
        /// Prediction id.
        id: String,
        /// Polls made.
        attempts: u32,
    },

    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn join_params(params: &[Param]) -> String {
    params
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
