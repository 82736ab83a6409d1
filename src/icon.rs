//! Branded placeholder icons: white text on the NRD red, with a small glyph.

use std::{
    fmt::Write as _,
    fs, io,
    path::{Path, PathBuf},
};

use clap::ValueEnum;
use resvg::{tiny_skia, usvg};
use tracing::info;

use crate::markup::escape;

pub const ICON_SIZES: [u32; 2] = [192, 512];

const RED: &str = "#dc2626";
const WHITE: &str = "#ffffff";
const YELLOW: &str = "#fef08a";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum IconKind {
    /// Gradient background with a grid glyph
    #[default]
    Catalog,
    /// Flat background with a bowl of bread
    Bakery,
}

#[derive(Debug, thiserror::Error)]
pub enum IconError {
    #[error("cannot write icon {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot render {size}px icon")]
    Render {
        size: u32,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Splits icon text into a title and a subtitle.
///
/// `|` forces the split; otherwise words are halved, and a long single word is
/// cut after a vowel near its middle.
pub fn split_text(text: &str) -> (String, String) {
    if let Some((first, second)) = text.split_once('|') {
        return (first.trim().to_string(), second.trim().to_string());
    }

    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() >= 2 {
        let mid = words.len() / 2;
        return (words[..mid].join(" "), words[mid..].join(" "));
    }

    let chars: Vec<char> = text.chars().collect();
    if chars.len() > 10 {
        let mut mid = chars.len() / 2;
        if let Some(i) = (mid - 2..mid + 3)
            .find(|&i| i < chars.len() && "aeiou".contains(chars[i].to_ascii_lowercase()))
        {
            mid = i + 1;
        }
        return (chars[..mid].iter().collect(), chars[mid..].iter().collect());
    }

    (text.to_string(), String::new())
}

/// Estimated font size for `text` to fit in `max_width`.
pub fn font_size(text: &str, max_width: f64, base: u32) -> u32 {
    let width_factor = if text.chars().any(char::is_uppercase) {
        0.65
    } else {
        0.55
    };
    let estimated = text.chars().count() as f64 * f64::from(base) * width_factor;

    if estimated > max_width {
        let shrunk = f64::from(base) * (max_width / estimated) * 0.95;
        (shrunk as u32).max(base / 2)
    } else if estimated < max_width * 0.7 {
        (f64::from(base) * 1.1) as u32
    } else {
        base
    }
}

/// Positions that depend on the icon size and kind.
struct Layout {
    base_font: u32,
    base_sub_font: u32,
    y_main: u32,
    y_sub: u32,
    glyph_size: u32,
    glyph_offset: u32,
    glyph_spacing: u32,
}

impl Layout {
    fn new(size: u32, kind: IconKind, has_subtitle: bool) -> Self {
        let small = size == 192;
        let (y_main, y_sub) = match (kind, small, has_subtitle) {
            (IconKind::Bakery, true, true) => (98, 138),
            (IconKind::Bakery, true, false) => (115, 0),
            (IconKind::Catalog, true, true) => (88, 128),
            (IconKind::Catalog, true, false) => (108, 0),
            (IconKind::Bakery, false, true) => (260, 365),
            (IconKind::Bakery, false, false) => (305, 0),
            (IconKind::Catalog, false, true) => (225, 315),
            (IconKind::Catalog, false, false) => (275, 0),
        };
        if small {
            Self {
                base_font: 50,
                base_sub_font: 38,
                y_main,
                y_sub,
                glyph_size: 28,
                glyph_offset: 20,
                glyph_spacing: 56,
            }
        } else {
            Self {
                base_font: 130,
                base_sub_font: 100,
                y_main,
                y_sub,
                glyph_size: 75,
                glyph_offset: 50,
                glyph_spacing: 150,
            }
        }
    }
}

pub fn render_svg(text: &str, size: u32, kind: IconKind) -> String {
    let (title, subtitle) = split_text(text);
    let layout = Layout::new(size, kind, !subtitle.is_empty());
    let text_width = f64::from(size) * 0.90;
    let main_font = font_size(&title, text_width, layout.base_font);
    let sub_font = if subtitle.is_empty() {
        0
    } else {
        font_size(&subtitle, text_width, layout.base_sub_font)
    };

    let corner = size / 8;
    let (background, sub_color, glyph) = match kind {
        IconKind::Bakery => (RED.to_string(), WHITE, bakery_glyph(size)),
        IconKind::Catalog => (
            "url(#bgGradient)".to_string(),
            YELLOW,
            catalog_glyph(size, &layout),
        ),
    };

    let mut svg = format!("<svg width=\"{size}\" height=\"{size}\" xmlns=\"http://www.w3.org/2000/svg\">\n");
    svg.push_str(&defs(size, kind));
    let _ = write!(
        svg,
        "\n  <rect width=\"{size}\" height=\"{size}\" fill=\"{background}\" rx=\"{corner}\" ry=\"{corner}\"/>\n\n{glyph}\n\n"
    );
    svg.push_str(&text_element(size, layout.y_main, main_font, WHITE, &title));
    if !subtitle.is_empty() && sub_font > 0 {
        svg.push('\n');
        let sub_font = (f64::from(sub_font) * 1.05) as u32;
        svg.push_str(&text_element(size, layout.y_sub, sub_font, sub_color, &subtitle));
    }
    svg.push_str("\n</svg>");
    svg
}

fn defs(size: u32, kind: IconKind) -> String {
    let shadow = format!(
        "    <filter id=\"shadow\">\n      <feDropShadow dx=\"0\" dy=\"{}\" stdDeviation=\"{}\" flood-opacity=\"0.3\"/>\n    </filter>\n",
        size / 64,
        size / 128
    );
    let gradient = match kind {
        IconKind::Bakery => String::new(),
        IconKind::Catalog => "    <linearGradient id=\"bgGradient\" x1=\"0%\" y1=\"0%\" x2=\"100%\" y2=\"100%\">\n      \
             <stop offset=\"0%\" style=\"stop-color:#dc2626;stop-opacity:1\" />\n      \
             <stop offset=\"50%\" style=\"stop-color:#ef4444;stop-opacity:1\" />\n      \
             <stop offset=\"100%\" style=\"stop-color:#b91c1c;stop-opacity:1\" />\n    \
             </linearGradient>\n"
            .to_string(),
    };
    format!("  <defs>\n{gradient}{shadow}  </defs>\n")
}

fn text_element(size: u32, y: u32, font_size: u32, fill: &str, text: &str) -> String {
    format!(
        "  <text x=\"{}\" y=\"{y}\" font-family=\"Georgia, serif\" font-size=\"{font_size}\" font-weight=\"bold\" fill=\"{fill}\" text-anchor=\"middle\" dominant-baseline=\"middle\" filter=\"url(#shadow)\" letter-spacing=\"{}\">{}</text>",
        size / 2,
        size / 384,
        escape(text)
    )
}

fn catalog_glyph(size: u32, layout: &Layout) -> String {
    let (o, s, sp) = (layout.glyph_offset, layout.glyph_size, layout.glyph_spacing);
    let rx = size / 48;
    let stroke = (size / 192).max(1);
    let line_width = size / 96;

    let mut glyph = String::from("  <g opacity=\"0.25\">\n");
    for (x, y) in [(o, o), (o + sp, o), (o, o + sp), (o + sp, o + sp)] {
        let _ = writeln!(
            glyph,
            "    <rect x=\"{x}\" y=\"{y}\" width=\"{s}\" height=\"{s}\" fill=\"{WHITE}\" rx=\"{rx}\" stroke=\"{WHITE}\" stroke-width=\"{stroke}\" stroke-opacity=\"0.5\"/>"
        );
    }
    glyph.push('\n');
    let lines = [
        (o + s / 2, o + s / 4, o + sp, o + s / 4),
        (o + s / 2, o + s / 2, o + sp, o + s / 2),
        (o + s / 4, o + s / 2, o + s / 4, o + sp),
        (o + s / 2, o + s / 2, o + s / 2, o + sp),
        (o + sp, o + s / 2, o + sp, o + sp),
        (o + sp + s / 4, o + s / 2, o + sp + s / 4, o + sp),
    ];
    for (x1, y1, x2, y2) in lines {
        let _ = writeln!(
            glyph,
            "    <line x1=\"{x1}\" y1=\"{y1}\" x2=\"{x2}\" y2=\"{y2}\" stroke=\"{WHITE}\" stroke-width=\"{line_width}\" stroke-linecap=\"round\"/>"
        );
    }
    glyph.push_str("  </g>");
    glyph
}

fn bakery_glyph(size: u32) -> String {
    let s = f64::from(size) / 192.0;
    let px = |v: f64| (v * s) as i64;
    let cx = i64::from(size / 2);
    let stroke_width = f64::max(1.5, (3.0 * s).trunc());
    let stroke = format!("fill=\"none\" stroke=\"{WHITE}\" stroke-width=\"{stroke_width}\"");

    let top = px(24.0);
    let bowl_y = top + px(40.0);
    let rim_y = bowl_y - px(10.0);
    let steam_y = bowl_y - px(35.0);

    let ellipse = |x: i64, y: i64, rx: i64, ry: i64| {
        format!("<ellipse cx=\"{x}\" cy=\"{y}\" rx=\"{rx}\" ry=\"{ry}\" {stroke}/>")
    };
    let curve = |x0: i64, y0: i64, qx: i64, qy: i64, x1: i64, y1: i64| {
        format!("<path d=\"M {x0} {y0} Q {qx} {qy} {x1} {y1}\" {stroke} stroke-linecap=\"round\"/>")
    };

    let parts = [
        ellipse(cx, bowl_y, px(70.0), px(28.0)),
        curve(cx - px(50.0), rim_y, cx, rim_y - px(6.0), cx + px(50.0), rim_y),
        ellipse(cx - px(22.0), bowl_y - px(4.0), px(14.0), px(12.0)),
        ellipse(cx, bowl_y - px(8.0), px(16.0), px(14.0)),
        ellipse(cx + px(20.0), bowl_y - px(5.0), px(12.0), px(11.0)),
        {
            let x = cx - px(25.0);
            curve(x, steam_y + px(20.0), x - px(8.0), steam_y, x, steam_y - px(15.0))
        },
        curve(cx, steam_y + px(22.0), cx + px(6.0), steam_y, cx, steam_y - px(18.0)),
        {
            let x = cx + px(25.0);
            curve(x, steam_y + px(18.0), x + px(10.0), steam_y, x, steam_y - px(14.0))
        },
    ];

    let mut glyph = String::from("  <g id=\"bakery-icon\">");
    for part in &parts {
        glyph.push_str("\n    ");
        glyph.push_str(part);
    }
    glyph.push_str("\n  </g>");
    glyph
}

/// Writes `icon-<size>.svg` and its rasterized `icon-<size>.png` for every
/// size in [`ICON_SIZES`] into `out_dir`. Returns the PNG paths.
pub fn write_icons(text: &str, out_dir: &Path, kind: IconKind) -> Result<Vec<PathBuf>, IconError> {
    fs::create_dir_all(out_dir).map_err(|source| IconError::Write {
        path: out_dir.to_path_buf(),
        source,
    })?;

    let mut options = usvg::Options::default();
    options.fontdb_mut().load_system_fonts();

    ICON_SIZES
        .iter()
        .map(|&size| {
            let svg = render_svg(text, size, kind);
            let svg_path = out_dir.join(format!("icon-{size}.svg"));
            write_file(&svg_path, svg.as_bytes())?;

            let png_path = out_dir.join(format!("icon-{size}.png"));
            write_file(&png_path, &rasterize(&svg, size, &options)?)?;
            info!(path = %png_path.display(), size, "icon written");
            Ok(png_path)
        })
        .collect()
}

/// Renders `svg` onto a transparent `size`x`size` canvas and encodes it as PNG.
pub fn rasterize(svg: &str, size: u32, options: &usvg::Options) -> Result<Vec<u8>, IconError> {
    let render_error = |source: Box<dyn std::error::Error + Send + Sync>| IconError::Render { size, source };

    let tree = usvg::Tree::from_str(svg, options).map_err(|error| render_error(error.into()))?;
    let mut pixmap = tiny_skia::Pixmap::new(size, size)
        .ok_or_else(|| render_error(format!("invalid canvas size {size}").into()))?;
    let scale = size as f32 / tree.size().width();
    resvg::render(
        &tree,
        tiny_skia::Transform::from_scale(scale, scale),
        &mut pixmap.as_mut(),
    );
    pixmap.encode_png().map_err(|error| render_error(error.into()))
}

fn write_file(path: &Path, contents: &[u8]) -> Result<(), IconError> {
    fs::write(path, contents).map_err(|source| IconError::Write {
        path: path.to_path_buf(),
        source,
    })
}
