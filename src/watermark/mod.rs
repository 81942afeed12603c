//! Diagonal tiled caption overlay for free-tier downloads.
//!
//! The overlay is expressed as an SVG document and rasterized with `resvg` directly onto a
//! pixmap holding the source image, so the output always has the source's pixel dimensions.

mod layout;
mod raster;

pub use layout::{TileLayout, tile_layout};
pub use raster::Watermarker;

/// Caption used when none is configured.
pub const DEFAULT_CAPTION: &str = "MEMORA FREE PREVIEW";

/// Visual parameters of the watermark.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct WatermarkStyle {
    /// Text tiled across the image.
    pub caption: String,
    /// Fill opacity in `[0, 1]`.
    pub opacity: f32,
    /// Rotation about the canvas center, in degrees (negative is counter-clockwise on screen).
    pub angle_deg: f64,
    /// Font size is `width / font_divisor` pixels.
    pub font_divisor: u32,
    /// Preferred font family; sans-serif and then any installed face are used as fallbacks.
    pub font_family: String,
    /// Fill color.
    pub fill_rgb: [u8; 3],
}

impl Default for WatermarkStyle {
    fn default() -> Self {
        Self {
            caption: DEFAULT_CAPTION.to_string(),
            opacity: 0.4,
            angle_deg: -45.0,
            font_divisor: 15,
            font_family: "Inter".to_string(),
            fill_rgb: [255, 255, 255],
        }
    }
}

impl WatermarkStyle {
    /// Default style with a custom caption.
    pub fn with_caption(caption: impl Into<String>) -> Self {
        Self {
            caption: caption.into(),
            ..Self::default()
        }
    }
}

/// Build the transparent overlay SVG for a tile layout.
pub fn overlay_svg(layout: &TileLayout, style: &WatermarkStyle) -> String {
    let [a, b, c, d, e, f] = layout.transform.as_coeffs();
    let [r, g, bl] = style.fill_rgb;
    let opacity = style.opacity.clamp(0.0, 1.0);
    let caption = escape_xml(&style.caption);
    let family = escape_xml(&style.font_family);

    let mut svg = String::with_capacity(256 + layout.anchors.len() * (caption.len() + 48));
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = layout.width,
        h = layout.height,
    ));
    svg.push_str(&format!(
        r#"<g transform="matrix({a} {b} {c} {d} {e} {f})" fill="rgb({r},{g},{bl})" fill-opacity="{opacity}" font-family="{family}, sans-serif" font-size="{size}" text-anchor="middle">"#,
        size = layout.font_size_px,
    ));
    for p in &layout.anchors {
        svg.push_str(&format!(r#"<text x="{}" y="{}">{caption}</text>"#, p.x, p.y));
    }
    svg.push_str("</g></svg>");
    svg
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}
