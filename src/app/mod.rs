//! Application context and screen state machine.
//!
//! [`App`] owns the session (user, history, active screen, sign-in modal) and is the only
//! writer of it. Every mutation of the user or history is persisted through the
//! [`SessionStore`] before the in-memory state changes, so the stored snapshot always matches
//! memory.
//!
//! Screen transitions:
//!
//! - Landing --`begin_upload`--> Restoring
//! - Restoring --success--> Result (item prepended to history and persisted)
//! - Restoring --failure--> Landing (with [`Notice::RestorationFailed`])
//! - Result --`upload_another`--> Landing
//! - Landing/Result/Dashboard --`view_history`--> Dashboard
//! - Dashboard --`select_history_item`--> Result
//! - Dashboard --`start_first_restoration`--> Landing
//!
//! Triggers that do not apply to the current screen fail with
//! [`MemoraError::InvalidTransition`] and leave the state untouched.

mod auth;
mod download;
mod screen;

use std::path::Path;
use std::time::Duration;

pub use auth::{AuthFlow, AuthProgress, AuthStep, CODE_LEN};
pub use download::{
    DirDownloadSink, DownloadSink, InMemoryDownloads, Tier, history_filename, tier_filename,
};
pub use screen::Screen;

use crate::foundation::core::{ACCEPTED_UPLOAD_FORMATS, EncodedImage, ItemId, now_millis};
use crate::foundation::error::{MemoraError, MemoraResult};
use crate::model::{History, RestorationItem, User};
use crate::restore::{RestoreFailure, Restorer};
use crate::session::SessionStore;
use crate::watermark::Watermarker;

/// Default upload size limit (20 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Default pause between the last code digit and sign-in success.
pub const DEFAULT_AUTH_DELAY: Duration = Duration::from_millis(500);

/// Tunables for [`App`].
#[derive(Clone, Debug)]
pub struct AppOptions {
    /// Uploads larger than this are rejected.
    pub max_upload_bytes: usize,
    /// Delay before a completed code signs the user in.
    pub auth_delay: Duration,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            auth_delay: DEFAULT_AUTH_DELAY,
        }
    }
}

/// Modal messages the UI must show and the user must acknowledge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notice {
    RestorationFailed,
    UpgradeRequired,
    SubscriptionActivated,
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            Self::RestorationFailed => {
                "Restoration failed. Please try again with a clearer image."
            }
            Self::UpgradeRequired => "Please subscribe to unlock watermark-free downloads.",
            Self::SubscriptionActivated => {
                "Subscription activated! Enjoy unlimited restorations."
            }
        };
        f.write_str(msg)
    }
}

/// What an upload ended in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UploadOutcome {
    /// New history entry; the result screen shows it.
    Restored(ItemId),
    /// The model produced nothing usable; back on the landing screen.
    Failed(RestoreFailure),
}

/// What a pro download attempt did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProDownload {
    /// Exported under this file name.
    Saved(String),
    /// No user; the sign-in modal was opened.
    SignInRequired,
    /// User is not subscribed; [`Notice::UpgradeRequired`] was queued.
    UpgradeRequired,
}

/// Session context: the single owner of user, history, and screen state.
pub struct App<R, S, D> {
    options: AppOptions,
    restorer: R,
    store: S,
    downloads: D,
    watermarker: Watermarker,

    screen: Screen,
    user: Option<User>,
    history: History,
    auth: Option<AuthFlow>,
    pending: Option<EncodedImage>,
    notices: Vec<Notice>,
}

impl<R: Restorer, S: SessionStore, D: DownloadSink> App<R, S, D> {
    /// Load the saved session and start on the landing screen.
    pub fn start(
        options: AppOptions,
        restorer: R,
        store: S,
        downloads: D,
        watermarker: Watermarker,
    ) -> MemoraResult<Self> {
        let snapshot = store.load()?;
        tracing::info!(
            restorer = restorer.name(),
            signed_in = snapshot.user.is_some(),
            history = snapshot.history.len(),
            "session started"
        );
        Ok(Self {
            options,
            restorer,
            store,
            downloads,
            watermarker,
            screen: Screen::Landing,
            user: snapshot.user,
            history: snapshot.history,
            auth: None,
            pending: None,
            notices: Vec::new(),
        })
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Item shown on the result screen.
    pub fn active_item(&self) -> Option<&RestorationItem> {
        self.screen.active().and_then(|id| self.history.get(id))
    }

    /// Sign-in modal state, if open.
    pub fn auth(&self) -> Option<&AuthFlow> {
        self.auth.as_ref()
    }

    pub fn is_auth_open(&self) -> bool {
        self.auth.is_some()
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    /// Drain queued notices once the UI has shown them.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn restorer(&self) -> &R {
        &self.restorer
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn downloads(&self) -> &D {
        &self.downloads
    }

    pub fn watermarker(&self) -> &Watermarker {
        &self.watermarker
    }

    // ---------------------------------------------------------------------
    // Restoration
    // ---------------------------------------------------------------------

    /// Read `path` and run a full upload.
    pub fn upload_file(&mut self, path: &Path) -> MemoraResult<UploadOutcome> {
        let unreadable = |e: std::io::Error| {
            MemoraError::validation(format!("cannot read '{}': {e}", path.display()))
        };
        let meta = std::fs::metadata(path).map_err(unreadable)?;
        if meta.len() > self.options.max_upload_bytes as u64 {
            return Err(self.too_large(meta.len()));
        }
        let bytes = std::fs::read(path).map_err(unreadable)?;
        self.upload(bytes)
    }

    /// Validate, restore, and record one image.
    #[tracing::instrument(skip_all, fields(len = bytes.len()))]
    pub fn upload(&mut self, bytes: Vec<u8>) -> MemoraResult<UploadOutcome> {
        let original = self.begin_upload(bytes)?;
        let outcome = self.restorer.restore(&original);
        self.complete_restoration(outcome)
    }

    /// Landing -> Restoring. Returns the validated image to hand to the restorer.
    pub fn begin_upload(&mut self, bytes: Vec<u8>) -> MemoraResult<EncodedImage> {
        match self.screen {
            Screen::Landing => {}
            Screen::Restoring => return Err(MemoraError::Busy),
            _ => return Err(self.invalid("begin_upload")),
        }

        if bytes.len() > self.options.max_upload_bytes {
            return Err(self.too_large(bytes.len() as u64));
        }
        let original = EncodedImage::sniff(bytes)
            .map_err(|e| MemoraError::validation(format!("unsupported upload: {e}")))?;
        match original.format() {
            Some(f) if ACCEPTED_UPLOAD_FORMATS.contains(&f) => {}
            _ => {
                return Err(MemoraError::validation(format!(
                    "unsupported upload type '{}'",
                    original.mime()
                )));
            }
        }

        self.pending = Some(original.clone());
        self.set_screen(Screen::Restoring, "begin_upload");
        Ok(original)
    }

    /// Restoring -> Result on success, Restoring -> Landing on failure.
    pub fn complete_restoration(
        &mut self,
        outcome: Result<EncodedImage, RestoreFailure>,
    ) -> MemoraResult<UploadOutcome> {
        if !self.screen.is_restoring() {
            return Err(self.invalid("complete_restoration"));
        }
        let Some(original) = self.pending.take() else {
            self.set_screen(Screen::Landing, "complete_restoration");
            return Err(MemoraError::validation("no upload in progress"));
        };

        let restored = match outcome {
            Ok(img) => img,
            Err(failure) => {
                tracing::warn!(error = %failure, "restoration failed");
                self.notices.push(Notice::RestorationFailed);
                self.set_screen(Screen::Landing, "restoration_failed");
                return Ok(UploadOutcome::Failed(failure));
            }
        };

        let timestamp = now_millis();
        let id = self.mint_id(timestamp);
        let item = RestorationItem {
            id: id.clone(),
            original,
            restored,
            timestamp,
        };

        let mut next = self.history.clone();
        next.prepend(item);
        if let Err(e) = self.store.save_history(&next) {
            self.set_screen(Screen::Landing, "restoration_unsaved");
            return Err(e);
        }
        self.history = next;

        self.set_screen(Screen::Result { active: id.clone() }, "restoration_succeeded");
        Ok(UploadOutcome::Restored(id))
    }

    // ---------------------------------------------------------------------
    // Navigation
    // ---------------------------------------------------------------------

    /// Result -> Landing, dropping the active item.
    pub fn upload_another(&mut self) -> MemoraResult<()> {
        match self.screen {
            Screen::Result { .. } => {
                self.set_screen(Screen::Landing, "upload_another");
                Ok(())
            }
            _ => Err(self.invalid("upload_another")),
        }
    }

    /// Header navigation to the history dashboard.
    pub fn view_history(&mut self) -> MemoraResult<()> {
        if self.screen.is_restoring() {
            return Err(self.invalid("view_history"));
        }
        self.set_screen(Screen::Dashboard, "view_history");
        Ok(())
    }

    /// Header navigation to the landing screen.
    pub fn go_to_landing(&mut self) -> MemoraResult<()> {
        if self.screen.is_restoring() {
            return Err(self.invalid("go_to_landing"));
        }
        self.set_screen(Screen::Landing, "go_to_landing");
        Ok(())
    }

    /// Header account button: dashboard when signed in, sign-in modal otherwise.
    pub fn account(&mut self) -> MemoraResult<()> {
        if self.user.is_some() {
            self.view_history()
        } else {
            self.open_auth();
            Ok(())
        }
    }

    /// Dashboard -> Result for a stored item.
    pub fn select_history_item(&mut self, id: &ItemId) -> MemoraResult<()> {
        if self.screen != Screen::Dashboard {
            return Err(self.invalid("select_history_item"));
        }
        if !self.history.contains_id(id) {
            return Err(MemoraError::validation(format!(
                "no restoration with id '{id}'"
            )));
        }
        self.set_screen(Screen::Result { active: id.clone() }, "select_history_item");
        Ok(())
    }

    /// Dashboard -> Landing.
    pub fn start_first_restoration(&mut self) -> MemoraResult<()> {
        if self.screen != Screen::Dashboard {
            return Err(self.invalid("start_first_restoration"));
        }
        self.set_screen(Screen::Landing, "start_first_restoration");
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Account
    // ---------------------------------------------------------------------

    /// Open the sign-in modal over the current screen. Reopening restarts the flow.
    pub fn open_auth(&mut self) {
        tracing::debug!(screen = self.screen.name(), "auth modal opened");
        self.auth = Some(AuthFlow::new());
    }

    pub fn close_auth(&mut self) {
        self.auth = None;
    }

    pub fn auth_submit_email(&mut self, email: &str) -> MemoraResult<()> {
        self.auth_flow_mut("auth_submit_email")?.submit_email(email)
    }

    /// Fill one code slot; completing the code signs the user in after the configured delay.
    pub fn auth_enter_digit(
        &mut self,
        index: usize,
        value: Option<char>,
    ) -> MemoraResult<AuthProgress> {
        let progress = self
            .auth_flow_mut("auth_enter_digit")?
            .enter_digit(index, value)?;
        self.settle_auth(progress)
    }

    /// Fill the code slots from a string.
    pub fn auth_enter_code(&mut self, code: &str) -> MemoraResult<AuthProgress> {
        let progress = self.auth_flow_mut("auth_enter_code")?.enter_code(code)?;
        self.settle_auth(progress)
    }

    /// Create or replace the user as unsubscribed and close the modal.
    fn settle_auth(&mut self, progress: AuthProgress) -> MemoraResult<AuthProgress> {
        let email = match progress {
            AuthProgress::Pending => return Ok(AuthProgress::Pending),
            AuthProgress::Complete { email } => email,
        };
        if !self.options.auth_delay.is_zero() {
            std::thread::sleep(self.options.auth_delay);
        }
        let user = User::new(email.clone());
        self.store.save_user(Some(&user))?;
        tracing::info!(email = %user.email, "signed in");
        self.user = Some(user);
        self.auth = None;
        Ok(AuthProgress::Complete { email })
    }

    pub fn logout(&mut self) -> MemoraResult<()> {
        self.store.save_user(None)?;
        self.user = None;
        Ok(())
    }

    /// Mark the signed-in user as subscribed; without a user the sign-in modal opens instead.
    pub fn upgrade(&mut self) -> MemoraResult<()> {
        let Some(user) = self.user.clone() else {
            self.open_auth();
            return Ok(());
        };
        let upgraded = User {
            is_subscribed: true,
            ..user
        };
        self.store.save_user(Some(&upgraded))?;
        tracing::info!(email = %upgraded.email, "subscription activated");
        self.user = Some(upgraded);
        self.notices.push(Notice::SubscriptionActivated);
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Downloads
    // ---------------------------------------------------------------------

    /// Export the active item with the watermark. Returns the file name.
    pub fn free_download(&mut self) -> MemoraResult<String> {
        let item = self.require_active("free_download")?;
        let filename = tier_filename(Tier::Free, &item.id);
        let watermarked = self.watermarker.apply(&item.restored)?;
        self.downloads.save(&filename, &watermarked)?;
        Ok(filename)
    }

    /// Export the active item without the watermark, if the user may.
    pub fn pro_download(&mut self) -> MemoraResult<ProDownload> {
        let item = self.require_active("pro_download")?;
        let Some(is_subscribed) = self.user.as_ref().map(|u| u.is_subscribed) else {
            self.open_auth();
            return Ok(ProDownload::SignInRequired);
        };
        if !is_subscribed {
            self.notices.push(Notice::UpgradeRequired);
            return Ok(ProDownload::UpgradeRequired);
        }
        let filename = tier_filename(Tier::Pro, &item.id);
        self.downloads.save(&filename, &item.restored)?;
        Ok(ProDownload::Saved(filename))
    }

    /// Dashboard "download again": the stored restored image as-is.
    pub fn redownload(&mut self, id: &ItemId) -> MemoraResult<String> {
        if self.screen != Screen::Dashboard {
            return Err(self.invalid("redownload"));
        }
        let item = self
            .history
            .get(id)
            .ok_or_else(|| MemoraError::validation(format!("no restoration with id '{id}'")))?;
        let filename = history_filename(&item.id);
        self.downloads.save(&filename, &item.restored)?;
        Ok(filename)
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    fn require_active(&self, trigger: &'static str) -> MemoraResult<RestorationItem> {
        self.active_item()
            .cloned()
            .ok_or_else(|| self.invalid(trigger))
    }

    fn auth_flow_mut(&mut self, trigger: &'static str) -> MemoraResult<&mut AuthFlow> {
        self.auth.as_mut().ok_or(MemoraError::InvalidTransition {
            from: "auth closed",
            trigger,
        })
    }

    fn set_screen(&mut self, next: Screen, trigger: &'static str) {
        tracing::debug!(from = %self.screen, to = %next, trigger, "screen transition");
        if !matches!(next, Screen::Restoring) {
            self.pending = None;
        }
        self.screen = next;
    }

    fn invalid(&self, trigger: &'static str) -> MemoraError {
        MemoraError::InvalidTransition {
            from: self.screen.name(),
            trigger,
        }
    }

    fn too_large(&self, len: u64) -> MemoraError {
        MemoraError::validation(format!(
            "upload is {len} bytes, limit is {}",
            self.options.max_upload_bytes
        ))
    }

    fn mint_id(&self, timestamp: i64) -> ItemId {
        let mut seq = 0;
        loop {
            let id = ItemId::from_millis(timestamp, seq);
            if !self.history.contains_id(&id) {
                return id;
            }
            seq += 1;
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/app/machine.rs"]
mod tests;
