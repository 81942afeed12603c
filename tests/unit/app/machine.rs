use std::io::Cursor;
use std::sync::Arc;

use super::*;
use crate::restore::ScriptedRestorer;
use crate::session::{InMemorySessionStore, SessionSnapshot};
use crate::watermark::WatermarkStyle;

type TestApp = App<ScriptedRestorer, InMemorySessionStore, InMemoryDownloads>;

fn png(w: u32, h: u32, rgb: [u8; 3]) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(w, h, image::Rgb(rgb));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn options() -> AppOptions {
    AppOptions {
        auth_delay: Duration::ZERO,
        ..AppOptions::default()
    }
}

fn no_font_watermarker() -> Watermarker {
    Watermarker::with_fontdb(
        WatermarkStyle::default(),
        Arc::new(usvg::fontdb::Database::new()),
    )
}

fn app_with(restorer: ScriptedRestorer, snapshot: SessionSnapshot) -> TestApp {
    App::start(
        options(),
        restorer,
        InMemorySessionStore::with_snapshot(snapshot),
        InMemoryDownloads::new(),
        no_font_watermarker(),
    )
    .unwrap()
}

fn app(restorer: ScriptedRestorer) -> TestApp {
    app_with(restorer, SessionSnapshot::default())
}

fn restored_image() -> EncodedImage {
    EncodedImage::png(png(4, 4, [200, 180, 160]))
}

fn restored_app() -> (TestApp, ItemId) {
    let mut app = app(ScriptedRestorer::new().then_image(restored_image()));
    let UploadOutcome::Restored(id) = app.upload(png(4, 4, [10, 10, 10])).unwrap() else {
        panic!("expected restoration");
    };
    (app, id)
}

#[test]
fn successful_upload_records_item_and_shows_result() {
    let original = png(4, 4, [10, 10, 10]);
    let b = restored_image();
    let mut app = app(ScriptedRestorer::new().then_image(b.clone()));

    let outcome = app.upload(original.clone()).unwrap();
    let UploadOutcome::Restored(id) = outcome else {
        panic!("expected restoration");
    };

    assert_eq!(app.screen(), &Screen::Result { active: id.clone() });
    assert_eq!(app.history().len(), 1);
    let item = app.active_item().unwrap();
    assert_eq!(item.original.bytes(), original.as_slice());
    assert_eq!(item.original.mime(), "image/png");
    assert_eq!(item.restored, b);
    assert_eq!(app.store().history(), app.history());
    assert!(app.notices().is_empty());
}

#[test]
fn failed_upload_returns_to_landing_with_notice() {
    let mut app = app(ScriptedRestorer::new().then_fail(RestoreFailure::NoImage));
    let outcome = app.upload(png(2, 2, [1, 2, 3])).unwrap();

    assert_eq!(outcome, UploadOutcome::Failed(RestoreFailure::NoImage));
    assert_eq!(app.screen(), &Screen::Landing);
    assert!(app.history().is_empty());
    assert_eq!(app.store().save_count(), 0);
    assert_eq!(app.take_notices(), vec![Notice::RestorationFailed]);
    assert!(app.notices().is_empty());
}

#[test]
fn history_grows_newest_first() {
    let restorer = ScriptedRestorer::new()
        .then_image(EncodedImage::png(png(1, 1, [1, 1, 1])))
        .then_image(EncodedImage::png(png(1, 1, [2, 2, 2])))
        .then_image(EncodedImage::png(png(1, 1, [3, 3, 3])));
    let mut app = app(restorer);

    for n in 1..=3usize {
        let before = app.history().len();
        let UploadOutcome::Restored(id) = app.upload(png(2, 2, [9, 9, 9])).unwrap() else {
            panic!("expected restoration");
        };
        assert_eq!(app.history().len(), before + 1);
        assert_eq!(&app.history().items()[0].id, &id);
        assert_eq!(app.store().history().len(), n);
        app.upload_another().unwrap();
    }

    let ids: std::collections::BTreeSet<_> =
        app.history().items().iter().map(|i| i.id.clone()).collect();
    assert_eq!(ids.len(), 3, "ids must be distinct");
}

#[test]
fn upload_is_rejected_off_landing_and_while_restoring() {
    let (mut app, _) = restored_app();
    assert!(matches!(
        app.upload(png(2, 2, [0, 0, 0])),
        Err(MemoraError::InvalidTransition { from: "Result", .. })
    ));

    app.upload_another().unwrap();
    app.begin_upload(png(2, 2, [0, 0, 0])).unwrap();
    assert!(app.screen().is_restoring());
    assert!(matches!(
        app.begin_upload(png(2, 2, [0, 0, 0])),
        Err(MemoraError::Busy)
    ));
    assert!(app.view_history().is_err());
    assert!(app.go_to_landing().is_err());

    app.complete_restoration(Err(RestoreFailure::Transport("x".into())))
        .unwrap();
    assert_eq!(app.screen(), &Screen::Landing);
}

#[test]
fn invalid_uploads_keep_landing() {
    let mut app = app(ScriptedRestorer::new());
    assert!(matches!(
        app.upload(b"hello".to_vec()),
        Err(MemoraError::Validation(_))
    ));
    assert_eq!(app.screen(), &Screen::Landing);

    let mut small = App::start(
        AppOptions {
            max_upload_bytes: 8,
            auth_delay: Duration::ZERO,
        },
        ScriptedRestorer::new(),
        InMemorySessionStore::new(),
        InMemoryDownloads::new(),
        no_font_watermarker(),
    )
    .unwrap();
    assert!(matches!(
        small.upload(png(2, 2, [0, 0, 0])),
        Err(MemoraError::Validation(_))
    ));
    assert_eq!(small.screen(), &Screen::Landing);
    assert!(small.restorer().calls().is_empty());
}

#[test]
fn complete_without_restoring_is_rejected() {
    let mut app = app(ScriptedRestorer::new());
    assert!(matches!(
        app.complete_restoration(Ok(restored_image())),
        Err(MemoraError::InvalidTransition { .. })
    ));
    assert!(app.history().is_empty());
}

#[test]
fn result_requires_known_item() {
    let (mut app, id) = restored_app();
    app.view_history().unwrap();
    assert_eq!(app.screen(), &Screen::Dashboard);

    assert!(app.select_history_item(&ItemId::from("nope")).is_err());
    assert_eq!(app.screen(), &Screen::Dashboard);
    assert!(app.active_item().is_none());

    app.select_history_item(&id).unwrap();
    assert_eq!(app.active_item().unwrap().id, id);
}

#[test]
fn navigation_table() {
    let (mut app, _) = restored_app();

    app.upload_another().unwrap();
    assert_eq!(app.screen(), &Screen::Landing);
    assert!(app.active_item().is_none());
    assert!(app.upload_another().is_err());

    app.view_history().unwrap();
    assert!(app.select_history_item(&ItemId::from("x")).is_err());
    app.start_first_restoration().unwrap();
    assert_eq!(app.screen(), &Screen::Landing);
    assert!(app.start_first_restoration().is_err());

    app.view_history().unwrap();
    app.go_to_landing().unwrap();
    assert_eq!(app.screen(), &Screen::Landing);
}

#[test]
fn open_auth_keeps_screen() {
    let (mut app, id) = restored_app();
    app.open_auth();
    assert!(app.is_auth_open());
    assert_eq!(app.screen(), &Screen::Result { active: id });
    app.close_auth();
    assert!(!app.is_auth_open());
}

#[test]
fn account_button_depends_on_sign_in() {
    let mut app = app(ScriptedRestorer::new());
    app.account().unwrap();
    assert!(app.is_auth_open());
    assert_eq!(app.screen(), &Screen::Landing);

    app.auth_submit_email("a@b.com").unwrap();
    app.auth_enter_code("123456").unwrap();
    app.account().unwrap();
    assert_eq!(app.screen(), &Screen::Dashboard);
}

#[test]
fn sign_in_creates_unsubscribed_user_and_closes_modal() {
    let mut app = app(ScriptedRestorer::new());
    app.open_auth();
    app.auth_submit_email("a@b.com").unwrap();
    for i in 0..CODE_LEN - 1 {
        assert_eq!(
            app.auth_enter_digit(i, Some('0')).unwrap(),
            AuthProgress::Pending
        );
        assert!(app.user().is_none());
    }
    app.auth_enter_digit(CODE_LEN - 1, Some('7')).unwrap();

    let expected = User::new("a@b.com");
    assert_eq!(app.user(), Some(&expected));
    assert_eq!(app.store().user(), Some(&expected));
    assert!(!app.is_auth_open());
}

#[test]
fn sign_in_waits_for_the_configured_delay() {
    let delay = Duration::from_millis(30);
    let mut app = App::start(
        AppOptions {
            auth_delay: delay,
            ..AppOptions::default()
        },
        ScriptedRestorer::new(),
        InMemorySessionStore::new(),
        InMemoryDownloads::new(),
        no_font_watermarker(),
    )
    .unwrap();
    app.open_auth();
    app.auth_submit_email("a@b.com").unwrap();

    let started = std::time::Instant::now();
    let progress = app.auth_enter_code("123456").unwrap();
    assert!(started.elapsed() >= delay);

    assert_eq!(
        progress,
        AuthProgress::Complete {
            email: "a@b.com".to_string()
        }
    );
    assert_eq!(app.user(), Some(&User::new("a@b.com")));
    assert!(!app.user().unwrap().is_subscribed);
    assert!(!app.is_auth_open());
}

#[test]
fn sign_in_overwrites_existing_user() {
    let snapshot = SessionSnapshot {
        user: Some(User {
            email: "old@x.y".into(),
            is_subscribed: true,
        }),
        history: History::new(),
    };
    let mut app = app_with(ScriptedRestorer::new(), snapshot);
    app.open_auth();
    app.auth_submit_email("new@x.y").unwrap();
    app.auth_enter_code("000000").unwrap();
    assert_eq!(app.user(), Some(&User::new("new@x.y")));
}

#[test]
fn auth_triggers_require_open_modal() {
    let mut app = app(ScriptedRestorer::new());
    assert!(matches!(
        app.auth_submit_email("a@b.com"),
        Err(MemoraError::InvalidTransition { .. })
    ));
}

#[test]
fn upgrade_flips_flag_and_keeps_email() {
    let snapshot = SessionSnapshot {
        user: Some(User::new("a@b.com")),
        history: History::new(),
    };
    let mut app = app_with(ScriptedRestorer::new(), snapshot);
    app.upgrade().unwrap();
    let user = app.user().unwrap();
    assert!(user.is_subscribed);
    assert_eq!(user.email, "a@b.com");
    assert_eq!(app.store().user(), Some(user));
    assert_eq!(app.take_notices(), vec![Notice::SubscriptionActivated]);
}

#[test]
fn upgrade_without_user_opens_auth() {
    let mut app = app(ScriptedRestorer::new());
    app.upgrade().unwrap();
    assert!(app.is_auth_open());
    assert!(app.user().is_none());
    assert!(app.notices().is_empty());
}

#[test]
fn logout_clears_persisted_user() {
    let snapshot = SessionSnapshot {
        user: Some(User::new("a@b.com")),
        history: History::new(),
    };
    let mut app = app_with(ScriptedRestorer::new(), snapshot);
    app.logout().unwrap();
    assert!(app.user().is_none());
    assert!(app.store().user().is_none());
}

#[test]
fn free_download_is_watermarked_png_with_tier_name() {
    let (mut app, id) = restored_app();
    let name = app.free_download().unwrap();
    assert_eq!(name, format!("memora-restoration-free-{id}.png"));

    let (saved_name, saved) = &app.downloads().files()[0];
    assert_eq!(saved_name, &name);
    assert_eq!(saved.mime(), "image/png");
    assert_eq!(saved.dimensions().unwrap(), (4, 4));
}

#[test]
fn pro_download_without_user_opens_auth_and_saves_nothing() {
    let (mut app, _) = restored_app();
    assert_eq!(app.pro_download().unwrap(), ProDownload::SignInRequired);
    assert!(app.is_auth_open());
    assert!(app.downloads().files().is_empty());
}

#[test]
fn pro_download_unsubscribed_blocks_with_notice() {
    let (mut app, _) = restored_app();
    app.open_auth();
    app.auth_submit_email("a@b.com").unwrap();
    app.auth_enter_code("111111").unwrap();

    assert_eq!(app.pro_download().unwrap(), ProDownload::UpgradeRequired);
    assert_eq!(app.take_notices(), vec![Notice::UpgradeRequired]);
    assert!(app.downloads().files().is_empty());
}

#[test]
fn pro_download_subscribed_exports_unwatermarked() {
    let (mut app, id) = restored_app();
    app.open_auth();
    app.auth_submit_email("a@b.com").unwrap();
    app.auth_enter_code("111111").unwrap();
    app.upgrade().unwrap();

    let ProDownload::Saved(name) = app.pro_download().unwrap() else {
        panic!("expected pro download");
    };
    assert_eq!(name, format!("memora-restoration-pro-{id}.png"));
    assert_eq!(app.downloads().files()[0].1, restored_image());
}

#[test]
fn downloads_require_result_screen() {
    let (mut app, id) = restored_app();
    app.upload_another().unwrap();
    assert!(app.free_download().is_err());
    assert!(app.pro_download().is_err());
    assert!(app.redownload(&id).is_err());

    app.view_history().unwrap();
    assert_eq!(app.redownload(&id).unwrap(), format!("restoration-{id}.png"));
    assert_eq!(app.downloads().files()[0].1, restored_image());
}

#[test]
fn session_is_restored_at_start() {
    let (app, id) = restored_app();
    let snapshot = app.store().load().unwrap();
    let reopened = app_with(ScriptedRestorer::new(), snapshot);
    assert_eq!(reopened.screen(), &Screen::Landing);
    assert_eq!(reopened.history().newest().unwrap().id, id);
}
