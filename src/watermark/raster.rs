use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use crate::foundation::core::EncodedImage;
use crate::foundation::error::{MemoraError, MemoraResult};
use crate::watermark::{WatermarkStyle, overlay_svg, tile_layout};

/// Largest edge, in pixels, for which a drawing surface is allocated.
pub(crate) const MAX_SURFACE_DIM: u32 = 16_384;

/// Largest surface area, in pixels (256 MiB of RGBA8).
pub(crate) const MAX_SURFACE_PIXELS: u64 = 64 * 1024 * 1024;

/// Renders the tiled caption over encoded images.
#[derive(Clone)]
pub struct Watermarker {
    style: WatermarkStyle,
    fontdb: Arc<usvg::fontdb::Database>,
}

impl std::fmt::Debug for Watermarker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watermarker")
            .field("style", &self.style)
            .field("font_faces", &self.fontdb.len())
            .finish()
    }
}

impl Watermarker {
    /// Watermarker backed by the system font database.
    pub fn new(style: WatermarkStyle) -> Self {
        Self::with_font_dirs(style, &[])
    }

    /// System fonts plus every `.ttf`/`.otf`/`.ttc` file found directly in `dirs`.
    pub fn with_font_dirs(style: WatermarkStyle, dirs: &[&Path]) -> Self {
        let mut db = usvg::fontdb::Database::new();
        db.load_system_fonts();
        for dir in dirs {
            load_fonts_from_dir(&mut db, dir);
        }
        tracing::debug!(faces = db.len(), "watermark font database loaded");
        Self::with_fontdb(style, Arc::new(db))
    }

    pub fn with_fontdb(style: WatermarkStyle, fontdb: Arc<usvg::fontdb::Database>) -> Self {
        Self { style, fontdb }
    }

    pub fn style(&self) -> &WatermarkStyle {
        &self.style
    }

    /// Number of font faces available for the caption.
    ///
    /// With zero faces the caption cannot be drawn and output pixels equal the input's.
    pub fn font_face_count(&self) -> usize {
        self.fontdb.len()
    }

    /// Watermark `src`, falling back to the unmodified input when no drawing surface can be
    /// acquired.
    ///
    /// Decode and encode failures are still errors.
    pub fn apply(&self, src: &EncodedImage) -> MemoraResult<EncodedImage> {
        match self.render(src) {
            Err(MemoraError::Surface(reason)) => {
                tracing::warn!(%reason, "watermark skipped, returning original image");
                Ok(src.clone())
            }
            other => other,
        }
    }

    /// Watermark `src` and return PNG bytes with the same pixel dimensions.
    #[tracing::instrument(skip(self, src), fields(mime = src.mime(), len = src.len()))]
    pub fn render(&self, src: &EncodedImage) -> MemoraResult<EncodedImage> {
        // Header check first so oversized images are never decoded.
        if let Ok((width, height)) = src.dimensions() {
            check_surface(width, height)?;
        }
        let rgba = decode_for_surface(src)?.to_rgba8();
        let (width, height) = rgba.dimensions();
        check_surface(width, height)?;

        let mut data = rgba.into_raw();
        premultiply_rgba8_in_place(&mut data);
        let size = resvg::tiny_skia::IntSize::from_wh(width, height)
            .ok_or_else(|| MemoraError::surface(format!("invalid size {width}x{height}")))?;
        let mut pixmap = resvg::tiny_skia::Pixmap::from_vec(data, size)
            .ok_or_else(|| MemoraError::surface(format!("cannot allocate {width}x{height}")))?;

        let layout = tile_layout(width, height, &self.style);
        let svg = overlay_svg(&layout, &self.style);
        let opts = usvg::Options {
            fontdb: Arc::clone(&self.fontdb),
            font_resolver: make_font_resolver(),
            ..Default::default()
        };
        let tree = usvg::Tree::from_str(&svg, &opts)
            .map_err(|e| MemoraError::image(format!("parse watermark overlay: {e}")))?;

        resvg::render(
            &tree,
            resvg::tiny_skia::Transform::identity(),
            &mut pixmap.as_mut(),
        );

        let mut out = pixmap.take();
        unpremultiply_rgba8_in_place(&mut out);
        let img = image::RgbaImage::from_raw(width, height, out)
            .ok_or_else(|| MemoraError::image("watermarked buffer has unexpected length"))?;

        let mut png = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)?;
        tracing::debug!(width, height, tiles = layout.anchors.len(), "watermark rendered");
        Ok(EncodedImage::png(png))
    }
}

fn check_surface(width: u32, height: u32) -> MemoraResult<()> {
    if width > MAX_SURFACE_DIM || height > MAX_SURFACE_DIM {
        return Err(MemoraError::surface(format!(
            "{width}x{height} exceeds {MAX_SURFACE_DIM}x{MAX_SURFACE_DIM}"
        )));
    }
    if u64::from(width) * u64::from(height) > MAX_SURFACE_PIXELS {
        return Err(MemoraError::surface(format!(
            "{width}x{height} exceeds {MAX_SURFACE_PIXELS} pixels"
        )));
    }
    Ok(())
}

/// Decoder allocation limits mean no surface can be had, not a broken image.
fn decode_for_surface(src: &EncodedImage) -> MemoraResult<image::DynamicImage> {
    image::load_from_memory(src.bytes()).map_err(|e| match e {
        image::ImageError::Limits(limit) => {
            MemoraError::surface(format!("decoder limit: {limit}"))
        }
        other => other.into(),
    })
}

fn load_fonts_from_dir(db: &mut usvg::fontdb::Database, dir: &Path) {
    let Ok(rd) = std::fs::read_dir(dir) else {
        return;
    };

    for entry in rd.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(ext) = path.extension().and_then(|s| s.to_str()) else {
            continue;
        };
        let ext = ext.to_ascii_lowercase();
        if ext != "ttf" && ext != "otf" && ext != "ttc" {
            continue;
        }
        if let Err(e) = db.load_font_file(&path) {
            tracing::warn!(path = %path.display(), error = %e, "skipping unreadable font");
        }
    }
}

/// Requested family, then generic families, then whatever face is installed.
fn make_font_resolver() -> usvg::FontResolver<'static> {
    usvg::FontResolver {
        select_font: Box::new(|font, fontdb| {
            let mut families = Vec::<usvg::fontdb::Family<'_>>::new();
            for family in font.families() {
                families.push(match family {
                    usvg::FontFamily::Serif => usvg::fontdb::Family::Serif,
                    usvg::FontFamily::SansSerif => usvg::fontdb::Family::SansSerif,
                    usvg::FontFamily::Cursive => usvg::fontdb::Family::Cursive,
                    usvg::FontFamily::Fantasy => usvg::fontdb::Family::Fantasy,
                    usvg::FontFamily::Monospace => usvg::fontdb::Family::Monospace,
                    usvg::FontFamily::Named(s) => usvg::fontdb::Family::Name(s),
                });
            }
            families.push(usvg::fontdb::Family::SansSerif);
            families.push(usvg::fontdb::Family::Serif);

            let query = usvg::fontdb::Query {
                families: &families,
                weight: usvg::fontdb::Weight(font.weight()),
                stretch: usvg::fontdb::Stretch::Normal,
                style: usvg::fontdb::Style::Normal,
            };

            if let Some(id) = fontdb.query(&query) {
                return Some(id);
            }
            fontdb.faces().next().map(|f| f.id)
        }),
        select_fallback: usvg::FontResolver::default_fallback_selector(),
    }
}

fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 255 {
            continue;
        }
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = ((px[0] as u16 * a + 127) / 255) as u8;
        px[1] = ((px[1] as u16 * a + 127) / 255) as u8;
        px[2] = ((px[2] as u16 * a + 127) / 255) as u8;
    }
}

fn unpremultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 255 || a == 0 {
            continue;
        }
        px[0] = ((px[0] as u16 * 255 + a / 2) / a).min(255) as u8;
        px[1] = ((px[1] as u16 * 255 + a / 2) / a).min(255) as u8;
        px[2] = ((px[2] as u16 * 255 + a / 2) / a).min(255) as u8;
    }
}
