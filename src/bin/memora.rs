use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use memora::{
    App, DirDownloadSink, EchoRestorer, FileSessionStore, GeminiRestorer, ItemId, MemoraConfig,
    ProDownload, RestorationItem, Restorer, UploadOutcome, Watermarker,
};

#[derive(Parser, Debug)]
#[command(name = "memora", version, about = "Restore old photographs")]
struct Cli {
    /// Session and config directory (default: $MEMORA_HOME or ./.memora).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Directory downloads are written to (overrides config).
    #[arg(long, global = true)]
    out_dir: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a photo and restore it.
    Restore(RestoreArgs),
    /// List past restorations, newest first.
    History,
    /// Show one past restoration.
    Show {
        /// Restoration id.
        id: String,
    },
    /// Download a past restoration.
    Download(DownloadArgs),
    /// Sign in with an email and a one-time code.
    Login(LoginArgs),
    /// Sign out.
    Logout,
    /// Activate the subscription for the signed-in user.
    Upgrade,
    /// Watermark an image file without touching the session.
    Watermark(WatermarkArgs),
}

#[derive(Parser, Debug)]
struct RestoreArgs {
    /// Photo to restore.
    path: PathBuf,

    /// Download the result right away.
    #[arg(long, value_enum)]
    download: Option<TierChoice>,

    /// Skip the remote model and use the upload as the restored image.
    #[arg(long)]
    offline: bool,
}

#[derive(Parser, Debug)]
struct DownloadArgs {
    /// Restoration id.
    id: String,

    /// `free` (watermarked), `pro` (subscribers), or `again` (history re-download).
    #[arg(long, value_enum, default_value_t = DownloadChoice::Free)]
    tier: DownloadChoice,
}

#[derive(Parser, Debug)]
struct LoginArgs {
    #[arg(long)]
    email: String,

    /// Six-digit code (any digits are accepted).
    #[arg(long)]
    code: String,
}

#[derive(Parser, Debug)]
struct WatermarkArgs {
    /// Input image.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Caption text (default from config).
    #[arg(long)]
    caption: Option<String>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TierChoice {
    Free,
    Pro,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DownloadChoice {
    Free,
    Pro,
    Again,
}

type CliApp = App<Box<dyn Restorer>, FileSessionStore, DirDownloadSink>;

struct Ctx {
    data_dir: PathBuf,
    out_dir: PathBuf,
    config: MemoraConfig,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let data_dir = cli.data_dir.unwrap_or_else(memora::config::default_data_dir);
    let config = MemoraConfig::load(&data_dir)
        .with_context(|| format!("load config from '{}'", data_dir.display()))?;
    let out_dir = cli
        .out_dir
        .unwrap_or_else(|| config.downloads_dir.clone());
    let ctx = Ctx {
        data_dir,
        out_dir,
        config,
    };

    match cli.cmd {
        Command::Restore(args) => cmd_restore(&ctx, args),
        Command::History => cmd_history(&ctx),
        Command::Show { id } => cmd_show(&ctx, &id),
        Command::Download(args) => cmd_download(&ctx, args),
        Command::Login(args) => cmd_login(&ctx, args),
        Command::Logout => cmd_logout(&ctx),
        Command::Upgrade => cmd_upgrade(&ctx),
        Command::Watermark(args) => cmd_watermark(&ctx, args),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn watermarker(ctx: &Ctx) -> Watermarker {
    let fonts = ctx.data_dir.join("fonts");
    Watermarker::with_font_dirs(ctx.config.watermark.clone(), &[fonts.as_path()])
}

fn open_app(ctx: &Ctx, restorer: Box<dyn Restorer>) -> anyhow::Result<CliApp> {
    let app = App::start(
        ctx.config.app_options(),
        restorer,
        FileSessionStore::new(&ctx.data_dir),
        DirDownloadSink::new(&ctx.out_dir),
        watermarker(ctx),
    )
    .with_context(|| format!("open session in '{}'", ctx.data_dir.display()))?;
    tracing::debug!(
        data_dir = %app.store().root().display(),
        out_dir = %app.downloads().dir().display(),
        "session opened"
    );
    Ok(app)
}

/// Session for commands that never call the model.
fn open_local_app(ctx: &Ctx) -> anyhow::Result<CliApp> {
    open_app(ctx, Box::new(EchoRestorer))
}

fn flush_notices(app: &mut CliApp) {
    for notice in app.take_notices() {
        eprintln!("notice: {notice}");
    }
}

fn cmd_restore(ctx: &Ctx, args: RestoreArgs) -> anyhow::Result<()> {
    let restorer: Box<dyn Restorer> = if args.offline {
        Box::new(EchoRestorer)
    } else {
        let key = memora::config::api_key_from_env().with_context(|| {
            format!(
                "no API key: set {} (or pass --offline)",
                memora::config::API_KEY_VARS.join(" or ")
            )
        })?;
        Box::new(GeminiRestorer::new(ctx.config.restorer_config(key))?)
    };
    let mut app = open_app(ctx, restorer)?;

    eprintln!("restoring {} ...", args.path.display());
    let outcome = app.upload_file(&args.path)?;
    flush_notices(&mut app);
    let id = match outcome {
        UploadOutcome::Restored(id) => id,
        UploadOutcome::Failed(failure) => anyhow::bail!("restoration failed: {failure}"),
    };

    if let Some(item) = app.active_item() {
        print_item(item);
    }

    match args.download {
        Some(TierChoice::Free) => {
            let name = app.free_download()?;
            eprintln!("wrote {}", app.downloads().dir().join(name).display());
        }
        Some(TierChoice::Pro) => pro_download(&mut app)?,
        None => eprintln!("restored as {id}"),
    }
    Ok(())
}

fn cmd_history(ctx: &Ctx) -> anyhow::Result<()> {
    let mut app = open_local_app(ctx)?;
    app.view_history()?;
    if app.history().is_empty() {
        println!("no restorations yet");
        return Ok(());
    }
    println!("{} restoration(s)", app.history().len());
    for item in app.history().items() {
        print_item(item);
    }
    Ok(())
}

fn cmd_show(ctx: &Ctx, id: &str) -> anyhow::Result<()> {
    let mut app = open_local_app(ctx)?;
    app.view_history()?;
    app.select_history_item(&ItemId::from(id))?;
    if let Some(item) = app.active_item() {
        print_item(item);
    }
    Ok(())
}

fn cmd_download(ctx: &Ctx, args: DownloadArgs) -> anyhow::Result<()> {
    let mut app = open_local_app(ctx)?;
    let id = ItemId::from(args.id.as_str());
    app.view_history()?;

    match args.tier {
        DownloadChoice::Again => {
            let name = app.redownload(&id)?;
            eprintln!("wrote {}", app.downloads().dir().join(name).display());
        }
        DownloadChoice::Free => {
            app.select_history_item(&id)?;
            let name = app.free_download()?;
            eprintln!("wrote {}", app.downloads().dir().join(name).display());
        }
        DownloadChoice::Pro => {
            app.select_history_item(&id)?;
            pro_download(&mut app)?;
        }
    }
    Ok(())
}

fn pro_download(app: &mut CliApp) -> anyhow::Result<()> {
    let outcome = app.pro_download()?;
    flush_notices(app);
    match outcome {
        ProDownload::Saved(name) => {
            eprintln!("wrote {}", app.downloads().dir().join(name).display());
            Ok(())
        }
        ProDownload::SignInRequired => {
            anyhow::bail!("sign in first: memora login --email <EMAIL> --code <DIGITS>")
        }
        ProDownload::UpgradeRequired => anyhow::bail!("subscribe first: memora upgrade"),
    }
}

fn cmd_login(ctx: &Ctx, args: LoginArgs) -> anyhow::Result<()> {
    let mut app = open_local_app(ctx)?;
    app.open_auth();
    app.auth_submit_email(&args.email)?;
    eprintln!("code sent to {} (any digits are accepted)", args.email.trim());
    match app.auth_enter_code(&args.code)? {
        memora::AuthProgress::Complete { email } => {
            println!("signed in as {email}");
            Ok(())
        }
        memora::AuthProgress::Pending => {
            anyhow::bail!("code must have {} digits", memora::app::CODE_LEN)
        }
    }
}

fn cmd_logout(ctx: &Ctx) -> anyhow::Result<()> {
    let mut app = open_local_app(ctx)?;
    app.logout()?;
    println!("signed out");
    Ok(())
}

fn cmd_upgrade(ctx: &Ctx) -> anyhow::Result<()> {
    let mut app = open_local_app(ctx)?;
    app.upgrade()?;
    flush_notices(&mut app);
    if app.is_auth_open() {
        anyhow::bail!("sign in first: memora login --email <EMAIL> --code <DIGITS>");
    }
    Ok(())
}

fn cmd_watermark(ctx: &Ctx, args: WatermarkArgs) -> anyhow::Result<()> {
    let bytes = std::fs::read(&args.in_path)
        .with_context(|| format!("read image '{}'", args.in_path.display()))?;
    let src = memora::EncodedImage::sniff(bytes)?;

    let mut style = ctx.config.watermark.clone();
    if let Some(caption) = args.caption {
        style.caption = caption;
    }
    let fonts = ctx.data_dir.join("fonts");
    let marker = Watermarker::with_font_dirs(style, &[fonts.as_path()]);
    if marker.font_face_count() == 0 {
        tracing::warn!("no fonts found; the caption will not be visible");
    }
    tracing::info!(caption = %marker.style().caption, "watermarking");
    let out = marker.render(&src)?;

    write_file(&args.out, out.bytes())?;
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn write_file(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    std::fs::write(path, bytes).with_context(|| format!("write '{}'", path.display()))
}

fn print_item(item: &RestorationItem) {
    let dims = |img: &memora::EncodedImage| match img.dimensions() {
        Ok((w, h)) => format!("{w}x{h}"),
        Err(_) => "?".to_string(),
    };
    println!(
        "{}  at {}  before {} ({})  after {} ({})",
        item.id,
        item.timestamp,
        dims(&item.original),
        item.original.mime(),
        dims(&item.restored),
        item.restored.mime(),
    );
}
