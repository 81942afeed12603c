//! Remote restoration: one image in, one restored image (or a failure) out.

mod gemini;

use std::cell::RefCell;
use std::collections::VecDeque;

pub use gemini::{GeminiRestorer, RestorerConfig};

use crate::foundation::core::EncodedImage;

/// Instruction sent with every image.
pub const RESTORATION_PROMPT: &str = "\
This is an old, vintage, possibly damaged photograph.
Please restore it professionally:
1. Fix scratches, dust, and physical damage.
2. Enhance the resolution and sharpen blurry details.
3. Colorize the image naturally if it is black and white, or improve existing color balance.
4. Maintain the historical integrity and facial likeness perfectly.
5. Output the final restored high-quality image.";

/// Why a restoration produced no image.
///
/// Callers treat every variant the same way; the distinction exists for logs.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RestoreFailure {
    #[error("restorer is not configured: {0}")]
    Configuration(String),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("model API returned status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("model response could not be parsed: {0}")]
    MalformedResponse(String),

    #[error("model response contained no image")]
    NoImage,
}

/// A single-attempt restoration backend.
///
/// Implementations never panic on remote errors: every failure is normalized into
/// [`RestoreFailure`].
pub trait Restorer {
    fn restore(&self, image: &EncodedImage) -> Result<EncodedImage, RestoreFailure>;

    /// Backend name for logging.
    fn name(&self) -> &'static str;
}

impl<R: Restorer + ?Sized> Restorer for Box<R> {
    fn restore(&self, image: &EncodedImage) -> Result<EncodedImage, RestoreFailure> {
        (**self).restore(image)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Returns the input unchanged. Used for offline runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoRestorer;

impl Restorer for EchoRestorer {
    fn restore(&self, image: &EncodedImage) -> Result<EncodedImage, RestoreFailure> {
        Ok(image.clone())
    }

    fn name(&self) -> &'static str {
        "echo"
    }
}

/// Replays queued outcomes in order, for tests and debugging.
///
/// An exhausted queue yields [`RestoreFailure::NoImage`].
#[derive(Debug, Default)]
pub struct ScriptedRestorer {
    outcomes: RefCell<VecDeque<Result<EncodedImage, RestoreFailure>>>,
    calls: RefCell<Vec<EncodedImage>>,
}

impl ScriptedRestorer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful outcome.
    pub fn then_image(self, image: EncodedImage) -> Self {
        self.outcomes.borrow_mut().push_back(Ok(image));
        self
    }

    /// Queue a failed outcome.
    pub fn then_fail(self, failure: RestoreFailure) -> Self {
        self.outcomes.borrow_mut().push_back(Err(failure));
        self
    }

    /// Images submitted so far, in call order.
    pub fn calls(&self) -> Vec<EncodedImage> {
        self.calls.borrow().clone()
    }
}

impl Restorer for ScriptedRestorer {
    fn restore(&self, image: &EncodedImage) -> Result<EncodedImage, RestoreFailure> {
        self.calls.borrow_mut().push(image.clone());
        self.outcomes
            .borrow_mut()
            .pop_front()
            .unwrap_or(Err(RestoreFailure::NoImage))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
