//! Apply plumbing for the backend's grid suggestions.
//!
//! The grid advisor is a pass-through: the backend computes how many
//! images to add or remove to reach a perfect rectangular grid, and the
//! client renders those numbers verbatim. The only logic that lives here
//! is the one-click apply actions and their guardrails.

use crate::config::CanvasSize;
use crate::types::{GridAction, GridOption};
use crate::upload::UploadSet;

/// Request body for `POST /api/collage/optimize-grid`: the image count
/// plus the canvas parameters the layout would use.
#[derive(Debug, Clone)]
pub struct GridRequest {
    pub image_count: u32,
    pub canvas: CanvasSize,
    /// Inter-image spacing in pixels.
    pub spacing: u32,
}

impl GridRequest {
    pub fn new(image_count: u32, canvas: CanvasSize) -> Self {
        Self {
            image_count,
            canvas,
            spacing: 4,
        }
    }

    /// Set the inter-image spacing in pixels.
    pub fn spacing(mut self, spacing: u32) -> Self {
        self.spacing = spacing;
        self
    }

    /// Flatten into the wire form body. Field-by-field on purpose, like
    /// [`crate::CollageConfig::to_form_fields`].
    pub fn to_form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![("image_count", self.image_count.to_string())];
        fields.extend(self.canvas.to_form_fields());
        fields.push(("spacing", self.spacing.to_string()));
        fields
    }
}

/// Refusals from the one-click apply actions.
#[derive(Debug, thiserror::Error)]
pub enum AdvisorError {
    #[error("Option is a {actual:?} suggestion, expected {expected:?}")]
    WrongAction {
        expected: GridAction,
        actual: GridAction,
    },

    #[error("Suggestion assumed {expected} staged images, have {have}")]
    StaleAdvice { expected: usize, have: usize },

    #[error(
        "Adding {needed} images would bring the total to {would_be}, over the {max} image limit"
    )]
    WouldExceedCeiling {
        needed: u32,
        would_be: usize,
        max: usize,
    },
}

/// Apply a remove-images suggestion: drop exactly the suggested count from
/// the end of the set, leaving the remaining prefix order untouched.
///
/// Refuses an add-type option, and refuses stale advice whose assumed
/// image count no longer matches the staged set. Returns the number of
/// files removed.
pub fn apply_remove_option(
    uploads: &mut UploadSet,
    option: &GridOption,
) -> Result<usize, AdvisorError> {
    if option.action != GridAction::RemoveImages {
        return Err(AdvisorError::WrongAction {
            expected: GridAction::RemoveImages,
            actual: option.action,
        });
    }

    let target = option.total_images as usize;
    let expected = target + option.delta() as usize;
    if uploads.len() != expected {
        return Err(AdvisorError::StaleAdvice {
            expected,
            have: uploads.len(),
        });
    }

    let removed = uploads.len() - target;
    uploads.truncate(target);
    Ok(removed)
}

/// Vet an add-images suggestion against the upload ceiling.
///
/// The client never fabricates images, so this is advisory only: it
/// returns how many files the user must stage to reach the suggested
/// grid, or refuses when doing so would pass the hard file-count limit.
pub fn check_add_option(
    uploads: &UploadSet,
    option: &GridOption,
) -> Result<u32, AdvisorError> {
    if option.action != GridAction::AddImages {
        return Err(AdvisorError::WrongAction {
            expected: GridAction::AddImages,
            actual: option.action,
        });
    }

    let needed = option.delta();
    let would_be = uploads.len() + needed as usize;
    let max = uploads.limits().max_files;
    if would_be > max {
        return Err(AdvisorError::WouldExceedCeiling {
            needed,
            would_be,
            max,
        });
    }
    Ok(needed)
}
