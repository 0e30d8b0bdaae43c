//! The image a chat turn is working on, and the guard that keeps a
//! prepared result from landing on the wrong image.
//!
//! Preparation (normalize + rasterize) may finish after the user has
//! already picked another image or started a new chat. [`EditSession`]
//! hands out a [`PrepareTicket`] when preparation starts and only
//! accepts the result if the ticket still matches the current
//! selection, the same generation check a worker round-trip uses to
//! drop late responses.

use std::hash::Hasher;

use maskwork_pipeline::{Dimensions, Prepared};
use serde::{Deserialize, Serialize};
use siphasher::sip::SipHasher13;

use crate::{RequestError, RequestPayload, data_uri};

/// Stable identity of an original image, derived from its URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageKey(pub u64);

impl ImageKey {
    /// Hash an image URI with fixed keys.
    #[must_use]
    pub fn of(uri: &str) -> Self {
        let mut hasher = SipHasher13::new();
        hasher.write(uri.as_bytes());
        Self(hasher.finish())
    }
}

impl std::fmt::Display for ImageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Working set for one chat turn.
///
/// `optimized` and `mask` are derived from `original` and are cleared
/// whenever a different original is selected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedImage {
    /// Uploaded image or prior result, as selected.
    pub original: Option<String>,
    /// Normalized image at the planned size.
    pub optimized: Option<String>,
    /// Binary mask aligned to `optimized`.
    pub mask: Option<String>,
}

impl SelectedImage {
    /// Returns `true` when no image is selected.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.original.is_none()
    }

    /// Key of the selected original, if any.
    #[must_use]
    pub fn key(&self) -> Option<ImageKey> {
        self.original.as_deref().map(ImageKey::of)
    }

    /// Select an original. Returns `true` if the selection changed, in
    /// which case derived images are cleared.
    pub fn select(&mut self, original: impl Into<String>) -> bool {
        let original = original.into();
        if self.original.as_ref() == Some(&original) {
            return false;
        }
        self.original = Some(original);
        self.optimized = None;
        self.mask = None;
        true
    }

    /// Return to the empty state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Handed out when preparation starts; presented when it finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepareTicket {
    /// Image the preparation is for.
    pub key: ImageKey,
    /// Selection generation at the time preparation started.
    pub generation: u64,
}

/// Selection state for one chat, with stale-result protection.
#[derive(Debug, Clone, Default)]
pub struct EditSession {
    selected: SelectedImage,
    dimensions: Option<Dimensions>,
    generation: u64,
}

impl EditSession {
    /// An empty session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current selection.
    #[must_use]
    pub const fn selected(&self) -> &SelectedImage {
        &self.selected
    }

    /// Current generation. Bumped on every selection change and reset.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Planned dimensions of the applied result, if any.
    #[must_use]
    pub const fn dimensions(&self) -> Option<Dimensions> {
        self.dimensions
    }

    /// Select an original image (upload or prior result).
    ///
    /// Re-selecting the current image keeps its prepared result.
    pub fn select_image(&mut self, original: impl Into<String>) {
        if self.selected.select(original) {
            self.dimensions = None;
            self.generation += 1;
        }
    }

    /// Start over (new chat or new task).
    pub fn reset(&mut self) {
        self.selected.reset();
        self.dimensions = None;
        self.generation += 1;
    }

    /// Begin preparing the selected image.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::NothingSelected`] if no image is selected.
    pub fn begin_prepare(&self) -> Result<PrepareTicket, RequestError> {
        let key = self.selected.key().ok_or(RequestError::NothingSelected)?;
        Ok(PrepareTicket {
            key,
            generation: self.generation,
        })
    }

    /// Returns `true` if a result for `ticket` would be accepted.
    #[must_use]
    pub fn is_current(&self, ticket: PrepareTicket) -> bool {
        ticket.generation == self.generation && self.selected.key() == Some(ticket.key)
    }

    /// Store a prepared result as the selection's optimized image and mask.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::StaleResult`] if the selection changed
    /// since `ticket` was issued; the session is left untouched.
    pub fn apply_prepared(
        &mut self,
        ticket: PrepareTicket,
        prepared: &Prepared,
    ) -> Result<(), RequestError> {
        if !self.is_current(ticket) {
            return Err(RequestError::StaleResult {
                ticket: ticket.generation,
                current: self.generation,
            });
        }
        self.selected.optimized = Some(data_uri::encode_png(&prepared.image.image.png));
        self.selected.mask = prepared
            .mask
            .as_ref()
            .map(|mask| data_uri::encode_png(&mask.png));
        self.dimensions = Some(prepared.dimensions());
        Ok(())
    }

    /// Build the request payload for `prompt` from the current selection.
    ///
    /// With nothing selected the payload is prompt-only.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::NotPrepared`] if an image is selected but
    /// no prepared result has been applied, and propagates
    /// [`RequestPayload::with_mask_uri`] errors.
    pub fn payload(&self, prompt: impl Into<String>) -> Result<RequestPayload, RequestError> {
        let payload = RequestPayload::new(prompt);
        let Some(key) = self.selected.key() else {
            return Ok(payload);
        };
        let (Some(image), Some(dimensions)) = (&self.selected.optimized, self.dimensions) else {
            return Err(RequestError::NotPrepared { key });
        };
        let payload = payload.with_image_uri(image.clone(), dimensions);
        match &self.selected.mask {
            Some(mask) => payload.with_mask_uri(mask.clone(), dimensions),
            None => Ok(payload),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use maskwork_pipeline::{EncodedImage, NormalizedImage};

    fn prepared(masked: bool) -> Prepared {
        let image = EncodedImage {
            png: vec![7; 8],
            dimensions: Dimensions::new(1024, 768),
        };
        Prepared {
            mask: masked.then(|| image.clone()),
            image: NormalizedImage {
                image,
                source_dimensions: Dimensions::new(640, 480),
            },
        }
    }

    #[test]
    fn image_key_is_stable_and_distinct() {
        assert_eq!(ImageKey::of("a.png"), ImageKey::of("a.png"));
        assert_ne!(ImageKey::of("a.png"), ImageKey::of("b.png"));
        assert_eq!(ImageKey::of("a.png").to_string().len(), 16);
    }

    #[test]
    fn selecting_new_original_clears_derived_images() {
        let mut sel = SelectedImage::default();
        assert!(sel.select("one"));
        sel.optimized = Some("opt".into());
        sel.mask = Some("mask".into());
        assert!(!sel.select("one"));
        assert!(sel.optimized.is_some());
        assert!(sel.select("two"));
        assert!(sel.optimized.is_none());
        assert!(sel.mask.is_none());
    }

    #[test]
    fn reset_empties_selection() {
        let mut sel = SelectedImage::default();
        sel.select("x");
        sel.reset();
        assert!(sel.is_empty());
        assert_eq!(sel, SelectedImage::default());
    }

    #[test]
    fn begin_prepare_requires_selection() {
        let session = EditSession::new();
        assert!(matches!(
            session.begin_prepare(),
            Err(RequestError::NothingSelected)
        ));
    }

    #[test]
    fn current_ticket_is_applied() {
        let mut session = EditSession::new();
        session.select_image("data:image/png;base64,AA==");
        let ticket = session.begin_prepare().unwrap();
        session.apply_prepared(ticket, &prepared(true)).unwrap();
        assert!(session.selected().optimized.is_some());
        assert!(session.selected().mask.is_some());
        assert_eq!(session.dimensions(), Some(Dimensions::new(1024, 768)));
    }

    #[test]
    fn result_for_previous_image_is_refused() {
        let mut session = EditSession::new();
        session.select_image("first");
        let ticket = session.begin_prepare().unwrap();
        session.select_image("second");

        let err = session.apply_prepared(ticket, &prepared(true)).unwrap_err();
        assert!(matches!(
            err,
            RequestError::StaleResult {
                ticket: 1,
                current: 2
            }
        ));
        assert!(session.selected().mask.is_none());
    }

    #[test]
    fn result_after_reset_is_refused_even_for_same_image() {
        let mut session = EditSession::new();
        session.select_image("same");
        let ticket = session.begin_prepare().unwrap();
        session.reset();
        session.select_image("same");
        assert!(!session.is_current(ticket));
        assert!(session.apply_prepared(ticket, &prepared(false)).is_err());
    }

    #[test]
    fn reselecting_same_image_keeps_ticket_valid() {
        let mut session = EditSession::new();
        session.select_image("same");
        let ticket = session.begin_prepare().unwrap();
        session.select_image("same");
        assert!(session.is_current(ticket));
    }

    #[test]
    fn selected_but_unprepared_image_is_not_dropped() {
        let mut session = EditSession::new();
        let uri = "data:image/png;base64,AA==";
        session.select_image(uri);
        let err = session.payload("make it blue").unwrap_err();
        assert!(matches!(err, RequestError::NotPrepared { key } if key == ImageKey::of(uri)));
    }

    #[test]
    fn payload_follows_applied_result() {
        let mut session = EditSession::new();
        assert_eq!(session.payload("p").unwrap(), RequestPayload::new("p"));

        session.select_image("img");
        assert!(session.payload("p").is_err());
        let ticket = session.begin_prepare().unwrap();
        session.apply_prepared(ticket, &prepared(true)).unwrap();
        let payload = session.payload("p").unwrap();
        assert_eq!(payload.dimensions(), Some(Dimensions::new(1024, 768)));
        assert!(payload.mask.is_some());
    }
}
