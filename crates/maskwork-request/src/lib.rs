//! maskwork-request: Pure request assembly for the generation proxy (sans-IO).
//!
//! Turns a prepared image and mask into the JSON body the proxy expects,
//! picks the endpoint, tracks which image a chat turn is editing, and
//! reads back the job handle the proxy returns. Nothing here performs
//! network or filesystem access.

pub mod data_uri;
mod error;
pub mod payload;
pub mod prediction;
pub mod route;
pub mod selection;

pub use error::RequestError;
pub use payload::RequestPayload;
pub use prediction::{PollDecision, PollPolicy, Prediction, PredictionStatus};
pub use route::{Param, Route, Task, select_route};
pub use selection::{EditSession, ImageKey, PrepareTicket, SelectedImage};
