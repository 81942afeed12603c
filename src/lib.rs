//! Memora restores old photographs through a generative image model.
//!
//! A session uploads a photo, sends it to a [`Restorer`], and keeps every before/after pair
//! in a newest-first [`History`] persisted by a [`SessionStore`]. The restored image can be
//! exported free with a tiled caption drawn by the [`Watermarker`], or unwatermarked when the
//! signed-in [`User`] is subscribed.
//!
//! [`App`] is the single owner of session state and exposes every user action as a named
//! transition of its [`Screen`] state machine.
#![forbid(unsafe_code)]

mod foundation;

pub mod app;
pub mod config;
pub mod model;
pub mod restore;
pub mod session;
pub mod watermark;

pub use crate::foundation::core::{ACCEPTED_UPLOAD_FORMATS, EncodedImage, ItemId, now_millis};
pub use crate::foundation::error::{MemoraError, MemoraResult};

pub use crate::app::{
    App, AppOptions, AuthFlow, AuthProgress, AuthStep, DirDownloadSink, DownloadSink,
    InMemoryDownloads, Notice, ProDownload, Screen, Tier, UploadOutcome,
};
pub use crate::config::MemoraConfig;
pub use crate::model::{History, RestorationItem, User};
pub use crate::restore::{
    EchoRestorer, GeminiRestorer, RestoreFailure, Restorer, RestorerConfig, ScriptedRestorer,
};
pub use crate::session::{FileSessionStore, InMemorySessionStore, SessionSnapshot, SessionStore};
pub use crate::watermark::{WatermarkStyle, Watermarker};
