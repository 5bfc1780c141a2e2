//! SVG emission and PNG rasterization of laid out diagrams.
//!
//! The plot area is `width_in x height_in` inches at 72 points per inch with
//! the data y axis pointing up. The emitted SVG uses points as user units and
//! is cropped to the union of drawn elements plus a pad, so the PNG carries
//! no empty margins.

use std::fmt::Write as _;
use std::sync::Arc;

use polars::prelude::DataFrame;
use resvg::tiny_skia::{Color, Pixmap, Transform};
use resvg::usvg::{self, fontdb};

use crate::conf::{C_COLOR_BACKGROUND, C_FONT_FAMILY, N_POINTS_PER_INCH, N_RASTER_SIDE_PX_MAX};
use crate::error::{Result, SwimlaneError};
use crate::layout::layout_filtered_table;
use crate::spec::{
    EnumDrawOp, EnumTextAnchor, EnumTextBaseline, SpecColumnRoles, SpecDiagram,
    SpecLayoutOptions, SpecRasterOptions, SpecRect, SpecRenderedImage, SpecTextRun,
};
use crate::util::{escape_xml, estimate_text_width_pt};

/// Upper bound accepted for `dpi`.
const N_DPI_MAX: f64 = 2400.0;

////////////////////////////////////////////////////////////////////////////////
// #region Geometry

/// Axis-aligned box in SVG points (y down).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpecBounds {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl SpecBounds {
    fn from_points(l_points: &[(f64, f64)]) -> Option<Self> {
        let (x_first, y_first) = *l_points.first()?;
        let mut bounds = Self {
            x0: x_first,
            y0: y_first,
            x1: x_first,
            y1: y_first,
        };
        for &(x, y) in &l_points[1..] {
            bounds.x0 = bounds.x0.min(x);
            bounds.y0 = bounds.y0.min(y);
            bounds.x1 = bounds.x1.max(x);
            bounds.y1 = bounds.y1.max(y);
        }
        Some(bounds)
    }

    fn union(self, other: Self) -> Self {
        Self {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    fn pad(self, n_pad: f64) -> Self {
        Self {
            x0: self.x0 - n_pad,
            y0: self.y0 - n_pad,
            x1: self.x1 + n_pad,
            y1: self.y1 + n_pad,
        }
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }
}

/// Data-to-point mapping of one diagram's plot area.
struct SpecPlotTransform {
    x_lim: (f64, f64),
    y_lim: (f64, f64),
    width_pt: f64,
    height_pt: f64,
}

impl SpecPlotTransform {
    fn new(diagram: &SpecDiagram) -> Self {
        Self {
            x_lim: diagram.x_lim,
            y_lim: diagram.y_lim,
            width_pt: diagram.width_in * N_POINTS_PER_INCH,
            height_pt: diagram.height_in * N_POINTS_PER_INCH,
        }
    }

    fn scale_x(&self) -> f64 {
        self.width_pt / calculate_span(self.x_lim)
    }

    fn scale_y(&self) -> f64 {
        self.height_pt / calculate_span(self.y_lim)
    }

    fn map(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.x_lim.0) * self.scale_x(),
            (self.y_lim.1 - y) * self.scale_y(),
        )
    }
}

fn calculate_span(lim: (f64, f64)) -> f64 {
    let n_span = lim.1 - lim.0;
    if n_span.abs() < f64::EPSILON { 1.0 } else { n_span }
}

/// Rect in points: (left, top, width, height).
fn derive_rect_pt(transform: &SpecPlotTransform, rect: &SpecRect) -> (f64, f64, f64, f64) {
    let (x_left, y_top) = transform.map(rect.x, rect.y + rect.height);
    (
        x_left,
        y_top,
        rect.width * transform.scale_x(),
        rect.height * transform.scale_y(),
    )
}

/// Anchor of a text run in points, offset applied.
fn derive_text_anchor_pt(transform: &SpecPlotTransform, text: &SpecTextRun) -> (f64, f64) {
    let (x, y) = transform.map(text.x, text.y);
    (x + text.offset_pt.0, y + text.offset_pt.1)
}

fn derive_text_bounds(transform: &SpecPlotTransform, text: &SpecTextRun) -> SpecBounds {
    let (ax, ay) = derive_text_anchor_pt(transform, text);
    let n_width = estimate_text_width_pt(&text.text, text.font_size, text.bold);
    let n_height = text.font_size;
    let (dx0, dx1) = match text.anchor {
        EnumTextAnchor::Start => (0.0, n_width),
        EnumTextAnchor::Middle => (-n_width / 2.0, n_width / 2.0),
        EnumTextAnchor::End => (-n_width, 0.0),
    };
    let (dy0, dy1) = match text.baseline {
        EnumTextBaseline::Top => (0.0, n_height),
        EnumTextBaseline::Center => (-n_height / 2.0, n_height / 2.0),
        EnumTextBaseline::Bottom => (-n_height, 0.0),
    };

    let n_theta = text.rotation_deg.to_radians();
    let (n_sin, n_cos) = n_theta.sin_cos();
    let l_corners: Vec<(f64, f64)> = [(dx0, dy0), (dx1, dy0), (dx0, dy1), (dx1, dy1)]
        .into_iter()
        .map(|(dx, dy)| {
            (
                ax + dx * n_cos + dy * n_sin,
                ay - dx * n_sin + dy * n_cos,
            )
        })
        .collect();
    SpecBounds::from_points(&l_corners).unwrap_or(SpecBounds {
        x0: ax,
        y0: ay,
        x1: ax,
        y1: ay,
    })
}

/// Union of every drawn element's extent, in points.
///
/// Text extents are estimated from character counts.
pub fn calculate_content_bounds(diagram: &SpecDiagram) -> SpecBounds {
    let transform = SpecPlotTransform::new(diagram);
    let mut bounds: Option<SpecBounds> = None;

    for op in &diagram.ops {
        let bounds_op = match op {
            EnumDrawOp::Rect(rect) => {
                let (x, y, w, h) = derive_rect_pt(&transform, rect);
                SpecBounds {
                    x0: x,
                    y0: y,
                    x1: x + w,
                    y1: y + h,
                }
                .pad(rect.edge_width / 2.0)
            }
            EnumDrawOp::Text(text) => derive_text_bounds(&transform, text),
        };
        bounds = Some(match bounds {
            Some(bounds) => bounds.union(bounds_op),
            None => bounds_op,
        });
    }

    bounds.unwrap_or(SpecBounds {
        x0: 0.0,
        y0: 0.0,
        x1: transform.width_pt,
        y1: transform.height_pt,
    })
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Svg

/// Split `#RRGGBB[AA]` into an SVG color and an optional opacity.
fn derive_svg_paint(color: &str) -> (String, Option<f64>) {
    let n_alpha = color
        .strip_prefix('#')
        .filter(|c_hex| c_hex.len() == 8)
        .and_then(|c_hex| c_hex.get(6..8))
        .and_then(|c_alpha| u8::from_str_radix(c_alpha, 16).ok());
    match n_alpha {
        Some(n_alpha) => (color[..7].to_string(), Some(f64::from(n_alpha) / 255.0)),
        None => (color.to_string(), None),
    }
}

fn write_svg_rect(c_svg: &mut String, transform: &SpecPlotTransform, rect: &SpecRect) {
    let (x, y, w, h) = derive_rect_pt(transform, rect);
    let (fill, fill_opacity) = derive_svg_paint(&rect.fill);
    let (stroke, stroke_opacity) = derive_svg_paint(rect.edge.as_deref().unwrap_or(&rect.fill));
    let _ = write!(
        c_svg,
        r#"<rect x="{x:.3}" y="{y:.3}" width="{w:.3}" height="{h:.3}" fill="{fill}" stroke="{stroke}" stroke-width="{:.3}""#,
        rect.edge_width
    );
    if let Some(n_opacity) = fill_opacity {
        let _ = write!(c_svg, r#" fill-opacity="{n_opacity:.3}""#);
    }
    if let Some(n_opacity) = stroke_opacity {
        let _ = write!(c_svg, r#" stroke-opacity="{n_opacity:.3}""#);
    }
    c_svg.push_str("/>\n");
}

fn write_svg_text(c_svg: &mut String, transform: &SpecPlotTransform, text: &SpecTextRun) {
    let (ax, ay) = derive_text_anchor_pt(transform, text);
    let n_baseline_y = match text.baseline {
        EnumTextBaseline::Top => ay + 0.8 * text.font_size,
        EnumTextBaseline::Center => ay + 0.35 * text.font_size,
        EnumTextBaseline::Bottom => ay - 0.2 * text.font_size,
    };
    let c_anchor = match text.anchor {
        EnumTextAnchor::Start => "start",
        EnumTextAnchor::Middle => "middle",
        EnumTextAnchor::End => "end",
    };
    let c_weight = if text.bold { "bold" } else { "normal" };
    let (fill, fill_opacity) = derive_svg_paint(&text.color);

    let _ = write!(
        c_svg,
        r#"<text x="{ax:.3}" y="{n_baseline_y:.3}" font-family="{}" font-size="{:.3}" font-weight="{c_weight}" fill="{fill}" text-anchor="{c_anchor}" xml:space="preserve""#,
        escape_xml(C_FONT_FAMILY),
        text.font_size
    );
    if let Some(n_opacity) = fill_opacity {
        let _ = write!(c_svg, r#" fill-opacity="{n_opacity:.3}""#);
    }
    if text.rotation_deg != 0.0 {
        let _ = write!(
            c_svg,
            r#" transform="rotate({:.3} {ax:.3} {ay:.3})""#,
            -text.rotation_deg
        );
    }
    let _ = writeln!(c_svg, ">{}</text>", escape_xml(&text.text));
}

/// Emit `diagram` as a standalone SVG document cropped to its content.
pub fn render_svg(diagram: &SpecDiagram, options: &SpecRasterOptions) -> String {
    let transform = SpecPlotTransform::new(diagram);
    let bounds =
        calculate_content_bounds(diagram).pad(options.tight_pad_inches * N_POINTS_PER_INCH);

    let mut c_svg = String::new();
    let _ = writeln!(
        c_svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w:.3}" height="{h:.3}" viewBox="{x:.3} {y:.3} {w:.3} {h:.3}">"#,
        x = bounds.x0,
        y = bounds.y0,
        w = bounds.width(),
        h = bounds.height(),
    );
    let _ = writeln!(
        c_svg,
        r#"<rect x="{x:.3}" y="{y:.3}" width="{w:.3}" height="{h:.3}" fill="{C_COLOR_BACKGROUND}"/>"#,
        x = bounds.x0,
        y = bounds.y0,
        w = bounds.width(),
        h = bounds.height(),
    );
    let _ = writeln!(c_svg, "<title>{}</title>", escape_xml(&diagram.title));

    for op in &diagram.ops {
        match op {
            EnumDrawOp::Rect(rect) => write_svg_rect(&mut c_svg, &transform, rect),
            EnumDrawOp::Text(text) => write_svg_text(&mut c_svg, &transform, text),
        }
    }
    c_svg.push_str("</svg>\n");
    c_svg
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Raster

/// Validate raster options before any rendering happens.
pub fn validate_raster_options(options: &SpecRasterOptions) -> Result<()> {
    if !options.dpi.is_finite() || options.dpi <= 0.0 || options.dpi > N_DPI_MAX {
        return Err(SwimlaneError::InvalidOptions(format!(
            "dpi must be in (0, {N_DPI_MAX}], got {}",
            options.dpi
        )));
    }
    if !options.tight_pad_inches.is_finite() || options.tight_pad_inches < 0.0 {
        return Err(SwimlaneError::InvalidOptions(format!(
            "tight_pad_inches must be >= 0, got {}",
            options.tight_pad_inches
        )));
    }
    Ok(())
}

/// Points-to-pixel scale and pixel size for a `width_pt x height_pt` image.
///
/// The scale is reduced so neither side exceeds the raster side limit.
pub fn calculate_raster_size(width_pt: f64, height_pt: f64, dpi: f64) -> (f64, u32, u32) {
    let n_side_max = f64::from(N_RASTER_SIDE_PX_MAX);
    let mut n_scale = dpi / N_POINTS_PER_INCH;
    let n_side_pt = width_pt.max(height_pt);
    if n_side_pt * n_scale > n_side_max {
        let n_scale_clamped = n_side_max / n_side_pt;
        tracing::warn!(
            dpi,
            width_pt,
            height_pt,
            n_scale_clamped,
            "diagram exceeds raster size limit; reducing resolution"
        );
        n_scale = n_scale_clamped;
    }
    let n_width_px = (width_pt * n_scale).ceil().clamp(1.0, n_side_max) as u32;
    let n_height_px = (height_pt * n_scale).ceil().clamp(1.0, n_side_max) as u32;
    (n_scale, n_width_px, n_height_px)
}

/// Reusable rasterizer holding the loaded font database.
pub struct DiagramRenderer {
    options: SpecRasterOptions,
    fontdb: Arc<fontdb::Database>,
}

impl DiagramRenderer {
    /// Validate options and load fonts.
    pub fn new(options: SpecRasterOptions) -> Result<Self> {
        validate_raster_options(&options)?;
        let mut db = fontdb::Database::new();
        if options.if_load_system_fonts {
            db.load_system_fonts();
        }
        tracing::debug!(n_faces = db.len(), "font database ready");
        Ok(Self {
            options,
            fontdb: Arc::new(db),
        })
    }

    pub fn options(&self) -> &SpecRasterOptions {
        &self.options
    }

    /// Rasterize an SVG document onto a white background.
    pub fn rasterize_svg(&self, c_svg: &str) -> Result<SpecRenderedImage> {
        let mut usvg_options = usvg::Options::default();
        usvg_options.fontdb = Arc::clone(&self.fontdb);
        let tree = usvg::Tree::from_str(c_svg, &usvg_options)?;

        let size = tree.size();
        let (n_scale, width_px, height_px) = calculate_raster_size(
            f64::from(size.width()),
            f64::from(size.height()),
            self.options.dpi,
        );
        let mut pixmap = Pixmap::new(width_px, height_px).ok_or_else(|| {
            SwimlaneError::Raster(format!("cannot allocate {width_px}x{height_px} pixmap"))
        })?;
        pixmap.fill(Color::WHITE);
        resvg::render(
            &tree,
            Transform::from_scale(n_scale as f32, n_scale as f32),
            &mut pixmap.as_mut(),
        );
        let png = pixmap
            .encode_png()
            .map_err(|err| SwimlaneError::Raster(err.to_string()))?;

        Ok(SpecRenderedImage {
            png,
            width_px,
            height_px,
        })
    }

    /// Render a laid out diagram to PNG.
    pub fn render_diagram(&self, diagram: &SpecDiagram) -> Result<SpecRenderedImage> {
        let c_svg = render_svg(diagram, &self.options);
        let image = self.rasterize_svg(&c_svg)?;
        tracing::debug!(
            title = %diagram.title,
            width_px = image.width_px,
            height_px = image.height_px,
            n_bytes = image.png.len(),
            "diagram rendered"
        );
        Ok(image)
    }

    /// Lay out and render the rows of an already filtered table.
    ///
    /// An empty table still yields a valid (title-only) image.
    pub fn render_table(
        &self,
        df_filtered: &DataFrame,
        roles: &SpecColumnRoles,
        filter_value: &str,
        layout_options: &SpecLayoutOptions,
    ) -> Result<(SpecRenderedImage, SpecDiagram)> {
        let diagram = layout_filtered_table(df_filtered, roles, filter_value, layout_options)?;
        let image = self.render_diagram(&diagram)?;
        Ok((image, diagram))
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::layout_diagram;
    use crate::spec::SpecActivityRecord;

    const V_PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    fn create_raster_options(dpi: f64) -> SpecRasterOptions {
        SpecRasterOptions {
            dpi,
            tight_pad_inches: 0.1,
            if_load_system_fonts: false,
        }
    }

    fn create_diagram() -> SpecDiagram {
        let l_records = vec![
            SpecActivityRecord {
                lane: "Clerk".to_string(),
                label: "Receive <order> & check".to_string(),
                order: "1".to_string(),
                color_hex: Some("#11223380".to_string()),
            },
            SpecActivityRecord {
                lane: "Manager".to_string(),
                label: "Approve".to_string(),
                order: "2".to_string(),
                color_hex: None,
            },
        ];
        layout_diagram(&l_records, "Flow", "Buy", &SpecLayoutOptions::default())
    }

    #[test]
    fn test_render_svg_escapes_text_and_splits_alpha() {
        let c_svg = render_svg(&create_diagram(), &create_raster_options(72.0));
        assert!(c_svg.starts_with("<svg "));
        assert!(c_svg.contains("Receive &lt;order&gt; &amp; check"));
        assert!(c_svg.contains(r##"fill="#112233" stroke="#112233""##));
        assert!(c_svg.contains(r#"fill-opacity="0.502""#));
        assert!(c_svg.contains("rotate(-45.000"));
        assert!(c_svg.trim_end().ends_with("</svg>"));
    }

    #[test]
    fn test_content_bounds_cover_plot_and_lane_labels() {
        let diagram = create_diagram();
        let bounds = calculate_content_bounds(&diagram);
        let n_unit_x = diagram.width_in * N_POINTS_PER_INCH / 3.0;

        // Lane labels end 0.3 units left of the bands, which start one unit in.
        assert!(bounds.x0 < 0.7 * n_unit_x);
        assert!(bounds.x1 >= diagram.width_in * N_POINTS_PER_INCH - 1e-9);
        // Title sits above the plot, ticks below it.
        assert!(bounds.y0 < 0.0);
        assert!(bounds.y1 > diagram.height_in * N_POINTS_PER_INCH);
    }

    #[test]
    fn test_calculate_raster_size_scales_and_clamps() {
        let (n_scale, n_w, n_h) = calculate_raster_size(144.0, 72.0, 300.0);
        assert!((n_scale - 300.0 / 72.0).abs() < 1e-12);
        assert_eq!((n_w, n_h), (600, 300));

        let (n_scale, n_w, n_h) = calculate_raster_size(100_000.0, 10.0, 72.0);
        assert!(n_scale < 1.0);
        assert_eq!(n_w, N_RASTER_SIDE_PX_MAX);
        assert!(n_h >= 1);
    }

    #[test]
    fn test_validate_raster_options_rejects_bad_values() {
        assert!(validate_raster_options(&create_raster_options(300.0)).is_ok());
        assert!(validate_raster_options(&create_raster_options(0.0)).is_err());
        assert!(validate_raster_options(&create_raster_options(f64::NAN)).is_err());
        let options = SpecRasterOptions {
            tight_pad_inches: -1.0,
            ..create_raster_options(72.0)
        };
        assert!(matches!(
            DiagramRenderer::new(options),
            Err(SwimlaneError::InvalidOptions(_))
        ));
    }

    #[test]
    fn test_render_diagram_yields_png_with_expected_size() {
        let diagram = create_diagram();
        let options = create_raster_options(36.0);
        let bounds = calculate_content_bounds(&diagram).pad(0.1 * N_POINTS_PER_INCH);
        let renderer = DiagramRenderer::new(options).expect("renderer");
        let image = renderer.render_diagram(&diagram).expect("render");

        assert_eq!(&image.png[..8], &V_PNG_SIGNATURE);
        let n_width_expected = (bounds.width() * 0.5).ceil() as u32;
        let n_height_expected = (bounds.height() * 0.5).ceil() as u32;
        assert!(image.width_px.abs_diff(n_width_expected) <= 1);
        assert!(image.height_px.abs_diff(n_height_expected) <= 1);
        assert!(image.width_px > image.height_px);
    }

    #[test]
    fn test_render_empty_diagram_is_valid_png() {
        let diagram = layout_diagram(&[], "Flow", "None", &SpecLayoutOptions::default());
        let renderer = DiagramRenderer::new(create_raster_options(24.0)).expect("renderer");
        let image = renderer.render_diagram(&diagram).expect("render");
        assert_eq!(&image.png[..8], &V_PNG_SIGNATURE);
        assert!(image.width_px > 0 && image.height_px > 0);
    }
}
