//! The JSON body sent to the generation proxy.

use maskwork_pipeline::{Dimensions, EncodedImage, Prepared};
use serde::{Deserialize, Serialize};

use crate::RequestError;

/// Prompt plus optional image, mask, and target size.
///
/// `image`, `width`, and `height` travel together; a `mask` is only
/// accepted once an image is present and must match its size. Absent
/// fields are omitted from the JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestPayload {
    /// Text prompt.
    pub prompt: String,
    /// Normalized image as a data URI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Binary mask as a data URI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<String>,
    /// Image width in pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// Image height in pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl RequestPayload {
    /// A prompt-only payload.
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    /// Attach the normalized image, replacing any previous image and
    /// dropping a mask that no longer applies.
    #[must_use]
    pub fn with_image(self, image: &EncodedImage) -> Self {
        self.with_image_uri(crate::data_uri::encode_png(&image.png), image.dimensions)
    }

    /// Attach an image that is already a data URI.
    #[must_use]
    pub fn with_image_uri(mut self, uri: String, dimensions: Dimensions) -> Self {
        if self.dimensions() != Some(dimensions) {
            self.mask = None;
        }
        self.image = Some(uri);
        self.width = Some(dimensions.width);
        self.height = Some(dimensions.height);
        self
    }

    /// Attach a binary mask.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::MaskWithoutImage`] if no image is attached
    /// and [`RequestError::MaskDimensionMismatch`] if the mask size
    /// differs from the image size.
    pub fn with_mask(self, mask: &EncodedImage) -> Result<Self, RequestError> {
        self.with_mask_uri(crate::data_uri::encode_png(&mask.png), mask.dimensions)
    }

    /// Attach a mask that is already a data URI.
    ///
    /// # Errors
    ///
    /// Same as [`with_mask`](Self::with_mask).
    pub fn with_mask_uri(
        mut self,
        uri: String,
        dimensions: Dimensions,
    ) -> Result<Self, RequestError> {
        let image = self.dimensions().ok_or(RequestError::MaskWithoutImage)?;
        if image != dimensions {
            return Err(RequestError::MaskDimensionMismatch {
                image,
                mask: dimensions,
            });
        }
        self.mask = Some(uri);
        Ok(self)
    }

    /// Build a payload from a prepared submission.
    ///
    /// # Errors
    ///
    /// Cannot fail for a [`Prepared`] produced by the pipeline; returns
    /// [`RequestError::MaskDimensionMismatch`] for a hand-built one whose
    /// mask size differs.
    pub fn from_prepared(
        prompt: impl Into<String>,
        prepared: &Prepared,
    ) -> Result<Self, RequestError> {
        let payload = Self::new(prompt).with_image(&prepared.image.image);
        match &prepared.mask {
            Some(mask) => payload.with_mask(mask),
            None => Ok(payload),
        }
    }

    /// Image dimensions, when an image with both sides is attached.
    #[must_use]
    pub fn dimensions(&self) -> Option<Dimensions> {
        self.image.as_ref()?;
        Some(Dimensions::new(self.width?, self.height?))
    }

    /// Check the payload's structural invariants.
    ///
    /// Payloads built with the `with_*` methods always pass; this guards
    /// payloads deserialized from elsewhere.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::MaskWithoutImage`] if a mask is present
    /// without an image and its width and height.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.mask.is_some() && self.dimensions().is_none() {
            return Err(RequestError::MaskWithoutImage);
        }
        Ok(())
    }

    /// Serialize to the JSON body sent to the proxy.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String, RequestError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use maskwork_pipeline::NormalizedImage;

    fn encoded(w: u32, h: u32) -> EncodedImage {
        EncodedImage {
            png: vec![1, 2, 3],
            dimensions: Dimensions::new(w, h),
        }
    }

    #[test]
    fn prompt_only_payload_omits_image_fields() {
        let json = RequestPayload::new("a cat").to_json().unwrap();
        assert_eq!(json, r#"{"prompt":"a cat"}"#);
    }

    #[test]
    fn image_sets_size() {
        let payload = RequestPayload::new("p").with_image(&encoded(1024, 768));
        assert_eq!(payload.width, Some(1024));
        assert_eq!(payload.height, Some(768));
        assert!(payload.image.unwrap().starts_with("data:image/png;base64,"));
    }

    #[test]
    fn mask_requires_image() {
        let result = RequestPayload::new("p").with_mask(&encoded(1024, 768));
        assert!(matches!(result, Err(RequestError::MaskWithoutImage)));
    }

    #[test]
    fn mask_must_match_image_size() {
        let result = RequestPayload::new("p")
            .with_image(&encoded(1024, 768))
            .with_mask(&encoded(1024, 1024));
        assert!(matches!(
            result,
            Err(RequestError::MaskDimensionMismatch { .. })
        ));
    }

    #[test]
    fn replacing_image_with_new_size_drops_mask() {
        let payload = RequestPayload::new("p")
            .with_image(&encoded(1024, 768))
            .with_mask(&encoded(1024, 768))
            .unwrap()
            .with_image(&encoded(512, 512));
        assert!(payload.mask.is_none());
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn masked_payload_always_has_image_and_size() {
        let payload = RequestPayload::new("p")
            .with_image(&encoded(640, 480))
            .with_mask(&encoded(640, 480))
            .unwrap();
        let json: serde_json::Value = serde_json::from_str(&payload.to_json().unwrap()).unwrap();
        for key in ["prompt", "image", "mask", "width", "height"] {
            assert!(json.get(key).is_some(), "{key}");
        }
    }

    #[test]
    fn validate_rejects_foreign_mask_only_payload() {
        let payload: RequestPayload =
            serde_json::from_str(r#"{"prompt":"p","mask":"data:image/png;base64,AA=="}"#).unwrap();
        assert!(matches!(
            payload.validate(),
            Err(RequestError::MaskWithoutImage)
        ));
    }

    #[test]
    fn from_prepared_carries_mask() {
        let prepared = Prepared {
            image: NormalizedImage {
                image: encoded(1024, 512),
                source_dimensions: Dimensions::new(2000, 1000),
            },
            mask: Some(encoded(1024, 512)),
        };
        let payload = RequestPayload::from_prepared("sofa", &prepared).unwrap();
        assert_eq!(payload.dimensions(), Some(Dimensions::new(1024, 512)));
        assert!(payload.mask.is_some());
    }
}
