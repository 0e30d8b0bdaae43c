//! Choose the proxy endpoint for a payload.
//!
//! What the payload carries decides the route before the task does:
//!
//! | payload            | route      | endpoint              |
//! |--------------------|------------|-----------------------|
//! | has a mask         | inpaint    | `/api/edit/inpaint`   |
//! | image, no mask     | stage-home | `/api/edit/inpaint`   |
//! | prompt only        | task's own route, else generate | `/api/generate/image` |
//!
//! Remove-background has no route of its own and falls back to generate.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{RequestError, RequestPayload};

/// Editing task chosen by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Task {
    /// Generate an image from a prompt.
    #[default]
    Generate,
    /// Edit a masked region of an image.
    Inpaint,
    /// Stage a room photo, optionally within a mask.
    StageHome,
    /// Remove an image's background.
    RemoveBackground,
}

impl Task {
    /// Every task, in display order.
    pub const ALL: [Self; 4] = [
        Self::Generate,
        Self::Inpaint,
        Self::RemoveBackground,
        Self::StageHome,
    ];

    /// The task's own route, if it has one.
    #[must_use]
    pub const fn route(self) -> Option<Route> {
        match self {
            Self::Generate => Some(Route::Generate),
            Self::Inpaint => Some(Route::Inpaint),
            Self::StageHome => Some(Route::StageHome),
            Self::RemoveBackground => None,
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generate => f.write_str("generate"),
            Self::Inpaint => f.write_str("inpaint"),
            Self::StageHome => f.write_str("stageHome"),
            Self::RemoveBackground => f.write_str("removeBackground"),
        }
    }
}

/// A payload field a route may require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Param {
    /// Edit or generation prompt.
    Prompt,
    /// Normalized image data URI.
    Image,
    /// Binary mask data URI.
    Mask,
    /// Planned width in pixels.
    Width,
    /// Planned height in pixels.
    Height,
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prompt => f.write_str("prompt"),
            Self::Image => f.write_str("image"),
            Self::Mask => f.write_str("mask"),
            Self::Width => f.write_str("width"),
            Self::Height => f.write_str("height"),
        }
    }
}

/// A proxy endpoint and the parameters it needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Route {
    /// Text-to-image.
    Generate,
    /// Masked edit.
    Inpaint,
    /// Whole-image staging edit.
    StageHome,
}

impl Route {
    /// Proxy path for this route.
    #[must_use]
    pub const fn endpoint(self) -> &'static str {
        match self {
            Self::Generate => "/api/generate/image",
            Self::Inpaint | Self::StageHome => "/api/edit/inpaint",
        }
    }

    /// Parameters the payload must carry.
    #[must_use]
    pub const fn required_params(self) -> &'static [Param] {
        match self {
            Self::Generate => &[Param::Prompt],
            Self::Inpaint => &[
                Param::Prompt,
                Param::Image,
                Param::Mask,
                Param::Width,
                Param::Height,
            ],
            Self::StageHome => &[Param::Prompt, Param::Image, Param::Width, Param::Height],
        }
    }

    /// One-line description of the route.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Generate => "Generates an image based on a text prompt",
            Self::Inpaint => "Edits an existing image based on a text prompt and mask",
            Self::StageHome => {
                "Stages a home image based on a text prompt, with optional inpainting"
            }
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.endpoint())
    }
}

/// Select the route for `payload` and check its required parameters.
///
/// An empty prompt counts as missing.
///
/// # Errors
///
/// Returns [`RequestError::MissingParams`] listing every required
/// parameter the payload lacks.
pub fn select_route(task: Task, payload: &RequestPayload) -> Result<Route, RequestError> {
    let route = if payload.mask.is_some() {
        Route::Inpaint
    } else if payload.image.is_some() {
        Route::StageHome
    } else {
        task.route().unwrap_or(Route::Generate)
    };

    let missing: Vec<Param> = route
        .required_params()
        .iter()
        .copied()
        .filter(|&param| !has_param(payload, param))
        .collect();
    if missing.is_empty() {
        Ok(route)
    } else {
        Err(RequestError::MissingParams { route, missing })
    }
}

fn has_param(payload: &RequestPayload, param: Param) -> bool {
    match param {
        Param::Prompt => !payload.prompt.trim().is_empty(),
        Param::Image => payload.image.is_some(),
        Param::Mask => payload.mask.is_some(),
        Param::Width => payload.width.is_some(),
        Param::Height => payload.height.is_some(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    fn with_image(prompt: &str) -> RequestPayload {
        RequestPayload {
            prompt: prompt.into(),
            image: Some("data:image/png;base64,AA==".into()),
            width: Some(1024),
            height: Some(768),
            ..RequestPayload::default()
        }
    }

    #[test]
    fn mask_selects_inpaint_regardless_of_task() {
        let payload = RequestPayload {
            mask: Some("data:image/png;base64,AA==".into()),
            ..with_image("sofa")
        };
        for task in Task::ALL {
            assert_eq!(select_route(task, &payload).unwrap(), Route::Inpaint);
        }
    }

    #[test]
    fn image_without_mask_selects_stage_home() {
        let route = select_route(Task::Generate, &with_image("sofa")).unwrap();
        assert_eq!(route, Route::StageHome);
        assert_eq!(route.endpoint(), "/api/edit/inpaint");
    }

    #[test]
    fn prompt_only_uses_task_route() {
        let payload = RequestPayload::new("a red barn");
        assert_eq!(select_route(Task::Generate, &payload).unwrap(), Route::Generate);
        assert_eq!(
            select_route(Task::RemoveBackground, &payload).unwrap(),
            Route::Generate
        );
    }

    #[test]
    fn prompt_only_inpaint_task_reports_missing_params() {
        let err = select_route(Task::Inpaint, &RequestPayload::new("x")).unwrap_err();
        match err {
            RequestError::MissingParams { route, missing } => {
                assert_eq!(route, Route::Inpaint);
                assert_eq!(
                    missing,
                    vec![Param::Image, Param::Mask, Param::Width, Param::Height]
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_prompt_is_missing() {
        let err = select_route(Task::Generate, &RequestPayload::new("  ")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "missing required parameters for /api/generate/image: prompt"
        );
    }

    #[test]
    fn image_without_size_is_rejected() {
        let payload = RequestPayload {
            width: None,
            ..with_image("sofa")
        };
        assert!(matches!(
            select_route(Task::StageHome, &payload),
            Err(RequestError::MissingParams { route: Route::StageHome, .. })
        ));
    }

    #[test]
    fn task_serializes_camel_case() {
        assert_eq!(
            serde_json::to_string(&Task::RemoveBackground).unwrap(),
            r#""removeBackground""#
        );
        assert_eq!(Task::StageHome.to_string(), "stageHome");
    }
}
