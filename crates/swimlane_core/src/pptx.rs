//! Minimal PresentationML writer: one blank-layout slide per diagram.
//!
//! Each slide carries a filled title rectangle and the diagram picture scaled
//! to a fixed width. Package parts are written straight into a zip buffer.

use std::fmt::Write as _;
use std::io::{Cursor, Write};

use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::conf::N_EMU_PER_INCH;
use crate::error::{Result, SwimlaneError};
use crate::spec::{SpecDeckOptions, SpecRenderedImage};
use crate::util::{derive_zip_entry_options, escape_xml};

const C_XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;
const C_NS_PML: &str = r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#;
const C_REL_BASE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const C_CT_BASE: &str = "application/vnd.openxmlformats-officedocument";

/// First relationship id used for slides in `presentation.xml.rels`.
const N_SLIDE_REL_ID_START: usize = 6;
const N_SLIDE_ID_START: usize = 256;
const N_SLIDE_MASTER_ID: u32 = 2_147_483_648;
const N_SLIDE_LAYOUT_ID: u32 = 2_147_483_649;

const C_GROUP_PROPS: &str = r#"<p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr>"#;

////////////////////////////////////////////////////////////////////////////////
// #region Geometry

fn convert_inches_to_emu(n_inches: f64) -> i64 {
    (n_inches * N_EMU_PER_INCH as f64).round() as i64
}

/// Picture height in EMU for a fixed width, keeping the image aspect ratio.
pub fn calculate_picture_height_emu(n_width_emu: i64, image: &SpecRenderedImage) -> i64 {
    if image.width_px == 0 {
        return 0;
    }
    (n_width_emu as f64 * f64::from(image.height_px) / f64::from(image.width_px)).round() as i64
}

/// Validate deck geometry: every size positive and finite.
pub fn validate_deck_options(options: &SpecDeckOptions) -> Result<()> {
    let l_checks = [
        ("slide_width_in", options.slide_width_in),
        ("slide_height_in", options.slide_height_in),
        ("title_width_in", options.title_width_in),
        ("title_height_in", options.title_height_in),
        ("title_font_size_pt", options.title_font_size_pt),
        ("image_width_in", options.image_width_in),
    ];
    for (name, n_value) in l_checks {
        if !n_value.is_finite() || n_value <= 0.0 {
            return Err(SwimlaneError::InvalidOptions(format!(
                "{name} must be > 0, got {n_value}"
            )));
        }
    }
    if let Some(rgb) = options.title_fill.as_deref() {
        let c_hex = rgb.trim_start_matches('#');
        if c_hex.len() != 6 || !c_hex.chars().all(|chr| chr.is_ascii_hexdigit()) {
            return Err(SwimlaneError::InvalidOptions(format!(
                "title_fill must be RRGGBB, got {rgb:?}"
            )));
        }
    }
    Ok(())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region DeckBuilder

struct SpecDeckSlide {
    title: String,
    image: SpecRenderedImage,
}

/// Collects titled diagram images and assembles them into a `.pptx` package.
pub struct DeckBuilder {
    options: SpecDeckOptions,
    l_slides: Vec<SpecDeckSlide>,
}

impl DeckBuilder {
    pub fn new(options: SpecDeckOptions) -> Self {
        Self {
            options,
            l_slides: Vec::new(),
        }
    }

    /// Append a slide showing `image` under `title`.
    pub fn add_slide(&mut self, title: impl Into<String>, image: SpecRenderedImage) {
        self.l_slides.push(SpecDeckSlide {
            title: title.into(),
            image,
        });
    }

    pub fn slide_count(&self) -> usize {
        self.l_slides.len()
    }

    /// Write the package and return its bytes.
    pub fn finish(self) -> Result<Vec<u8>> {
        let n_slides = self.l_slides.len();
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let opts_xml = derive_zip_entry_options(true);
        let opts_media = derive_zip_entry_options(false);

        write_part(&mut writer, "[Content_Types].xml", &derive_content_types(n_slides), opts_xml)?;
        write_part(&mut writer, "_rels/.rels", &derive_package_rels(), opts_xml)?;
        write_part(&mut writer, "docProps/core.xml", &derive_core_props(), opts_xml)?;
        write_part(&mut writer, "docProps/app.xml", &derive_app_props(n_slides), opts_xml)?;
        write_part(
            &mut writer,
            "ppt/presentation.xml",
            &derive_presentation(n_slides, &self.options),
            opts_xml,
        )?;
        write_part(
            &mut writer,
            "ppt/_rels/presentation.xml.rels",
            &derive_presentation_rels(n_slides),
            opts_xml,
        )?;
        write_part(&mut writer, "ppt/presProps.xml", &derive_pres_props(), opts_xml)?;
        write_part(&mut writer, "ppt/viewProps.xml", &derive_view_props(), opts_xml)?;
        write_part(&mut writer, "ppt/tableStyles.xml", &derive_table_styles(), opts_xml)?;
        write_part(
            &mut writer,
            "ppt/slideMasters/slideMaster1.xml",
            &derive_slide_master(),
            opts_xml,
        )?;
        write_part(
            &mut writer,
            "ppt/slideMasters/_rels/slideMaster1.xml.rels",
            &derive_slide_master_rels(),
            opts_xml,
        )?;
        write_part(
            &mut writer,
            "ppt/slideLayouts/slideLayout1.xml",
            &derive_slide_layout(),
            opts_xml,
        )?;
        write_part(
            &mut writer,
            "ppt/slideLayouts/_rels/slideLayout1.xml.rels",
            &derive_slide_layout_rels(),
            opts_xml,
        )?;
        write_part(&mut writer, "ppt/theme/theme1.xml", &derive_theme(), opts_xml)?;

        for (n_idx, slide) in self.l_slides.iter().enumerate() {
            let n_slide = n_idx + 1;
            write_part(
                &mut writer,
                &format!("ppt/slides/slide{n_slide}.xml"),
                &derive_slide(slide, &self.options),
                opts_xml,
            )?;
            write_part(
                &mut writer,
                &format!("ppt/slides/_rels/slide{n_slide}.xml.rels"),
                &derive_slide_rels(n_slide),
                opts_xml,
            )?;
            writer.start_file(format!("ppt/media/image{n_slide}.png"), opts_media)?;
            writer.write_all(&slide.image.png)?;
        }

        let cursor = writer.finish()?;
        let v_bytes = cursor.into_inner();
        tracing::debug!(n_slides, n_bytes = v_bytes.len(), "slide deck written");
        Ok(v_bytes)
    }
}

fn write_part(
    writer: &mut ZipWriter<Cursor<Vec<u8>>>,
    c_name: &str,
    c_xml: &str,
    options: SimpleFileOptions,
) -> Result<()> {
    writer.start_file(c_name, options)?;
    writer.write_all(c_xml.as_bytes()).map_err(SwimlaneError::from)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region PackageParts

fn derive_content_types(n_slides: usize) -> String {
    let mut c_xml = format!(
        r#"{C_XML_DECL}<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Default Extension="png" ContentType="image/png"/><Override PartName="/ppt/presentation.xml" ContentType="{C_CT_BASE}.presentationml.presentation.main+xml"/><Override PartName="/ppt/presProps.xml" ContentType="{C_CT_BASE}.presentationml.presProps+xml"/><Override PartName="/ppt/viewProps.xml" ContentType="{C_CT_BASE}.presentationml.viewProps+xml"/><Override PartName="/ppt/tableStyles.xml" ContentType="{C_CT_BASE}.presentationml.tableStyles+xml"/><Override PartName="/ppt/slideMasters/slideMaster1.xml" ContentType="{C_CT_BASE}.presentationml.slideMaster+xml"/><Override PartName="/ppt/slideLayouts/slideLayout1.xml" ContentType="{C_CT_BASE}.presentationml.slideLayout+xml"/><Override PartName="/ppt/theme/theme1.xml" ContentType="{C_CT_BASE}.theme+xml"/><Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/><Override PartName="/docProps/app.xml" ContentType="{C_CT_BASE}.extended-properties+xml"/>"#
    );
    for n_slide in 1..=n_slides {
        let _ = write!(
            c_xml,
            r#"<Override PartName="/ppt/slides/slide{n_slide}.xml" ContentType="{C_CT_BASE}.presentationml.slide+xml"/>"#
        );
    }
    c_xml.push_str("</Types>");
    c_xml
}

fn derive_package_rels() -> String {
    format!(
        r#"{C_XML_DECL}<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="{C_REL_BASE}/officeDocument" Target="ppt/presentation.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/><Relationship Id="rId3" Type="{C_REL_BASE}/extended-properties" Target="docProps/app.xml"/></Relationships>"#
    )
}

fn derive_core_props() -> String {
    format!(
        r#"{C_XML_DECL}<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"><dc:title>Swimlane Diagrams</dc:title><dc:creator>swimlane</dc:creator></cp:coreProperties>"#
    )
}

fn derive_app_props(n_slides: usize) -> String {
    format!(
        r#"{C_XML_DECL}<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties"><Application>swimlane</Application><Slides>{n_slides}</Slides></Properties>"#
    )
}

fn derive_presentation(n_slides: usize, options: &SpecDeckOptions) -> String {
    let mut c_xml = format!(
        r#"{C_XML_DECL}<p:presentation {C_NS_PML} saveSubsetFonts="1"><p:sldMasterIdLst><p:sldMasterId id="{N_SLIDE_MASTER_ID}" r:id="rId1"/></p:sldMasterIdLst>"#
    );
    if n_slides > 0 {
        c_xml.push_str("<p:sldIdLst>");
        for n_idx in 0..n_slides {
            let _ = write!(
                c_xml,
                r#"<p:sldId id="{}" r:id="rId{}"/>"#,
                N_SLIDE_ID_START + n_idx,
                N_SLIDE_REL_ID_START + n_idx
            );
        }
        c_xml.push_str("</p:sldIdLst>");
    }
    let _ = write!(
        c_xml,
        r#"<p:sldSz cx="{}" cy="{}"/><p:notesSz cx="6858000" cy="9144000"/></p:presentation>"#,
        convert_inches_to_emu(options.slide_width_in),
        convert_inches_to_emu(options.slide_height_in)
    );
    c_xml
}

fn derive_presentation_rels(n_slides: usize) -> String {
    let mut c_xml = format!(
        r#"{C_XML_DECL}<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="{C_REL_BASE}/slideMaster" Target="slideMasters/slideMaster1.xml"/><Relationship Id="rId2" Type="{C_REL_BASE}/theme" Target="theme/theme1.xml"/><Relationship Id="rId3" Type="{C_REL_BASE}/presProps" Target="presProps.xml"/><Relationship Id="rId4" Type="{C_REL_BASE}/viewProps" Target="viewProps.xml"/><Relationship Id="rId5" Type="{C_REL_BASE}/tableStyles" Target="tableStyles.xml"/>"#
    );
    for n_idx in 0..n_slides {
        let _ = write!(
            c_xml,
            r#"<Relationship Id="rId{}" Type="{C_REL_BASE}/slide" Target="slides/slide{}.xml"/>"#,
            N_SLIDE_REL_ID_START + n_idx,
            n_idx + 1
        );
    }
    c_xml.push_str("</Relationships>");
    c_xml
}

fn derive_pres_props() -> String {
    format!(r#"{C_XML_DECL}<p:presentationPr {C_NS_PML}/>"#)
}

fn derive_view_props() -> String {
    format!(r#"{C_XML_DECL}<p:viewPr {C_NS_PML}/>"#)
}

fn derive_table_styles() -> String {
    format!(
        r#"{C_XML_DECL}<a:tblStyleLst xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" def="{{5C22544A-7EE6-4342-B048-85BDC9FD1C3A}}"/>"#
    )
}

fn derive_slide_master() -> String {
    format!(
        r#"{C_XML_DECL}<p:sldMaster {C_NS_PML}><p:cSld><p:bg><p:bgPr><a:solidFill><a:srgbClr val="FFFFFF"/></a:solidFill><a:effectLst/></p:bgPr></p:bg><p:spTree>{C_GROUP_PROPS}</p:spTree></p:cSld><p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/><p:sldLayoutIdLst><p:sldLayoutId id="{N_SLIDE_LAYOUT_ID}" r:id="rId1"/></p:sldLayoutIdLst><p:txStyles><p:titleStyle/><p:bodyStyle/><p:otherStyle/></p:txStyles></p:sldMaster>"#
    )
}

fn derive_slide_master_rels() -> String {
    format!(
        r#"{C_XML_DECL}<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="{C_REL_BASE}/slideLayout" Target="../slideLayouts/slideLayout1.xml"/><Relationship Id="rId2" Type="{C_REL_BASE}/theme" Target="../theme/theme1.xml"/></Relationships>"#
    )
}

fn derive_slide_layout() -> String {
    format!(
        r#"{C_XML_DECL}<p:sldLayout {C_NS_PML} type="blank" preserve="1"><p:cSld name="Blank"><p:spTree>{C_GROUP_PROPS}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sldLayout>"#
    )
}

fn derive_slide_layout_rels() -> String {
    format!(
        r#"{C_XML_DECL}<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="{C_REL_BASE}/slideMaster" Target="../slideMasters/slideMaster1.xml"/></Relationships>"#
    )
}

fn derive_theme() -> String {
    let c_colors = [
        ("dk1", "000000"),
        ("lt1", "FFFFFF"),
        ("dk2", "44546A"),
        ("lt2", "E7E6E6"),
        ("accent1", "4472C4"),
        ("accent2", "ED7D31"),
        ("accent3", "A5A5A5"),
        ("accent4", "FFC000"),
        ("accent5", "5B9BD5"),
        ("accent6", "70AD47"),
        ("hlink", "0563C1"),
        ("folHlink", "954F72"),
    ]
    .iter()
    .map(|(name, rgb)| format!(r#"<a:{name}><a:srgbClr val="{rgb}"/></a:{name}>"#))
    .collect::<String>();
    let c_fill = r#"<a:solidFill><a:schemeClr val="phClr"/></a:solidFill>"#;
    let c_fills = c_fill.repeat(3);
    let c_lines = r#"<a:ln w="6350"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln>"#
        .repeat(3);
    let c_effects = "<a:effectStyle><a:effectLst/></a:effectStyle>".repeat(3);
    let c_font = r#"<a:latin typeface="Calibri"/><a:ea typeface=""/><a:cs typeface=""/>"#;

    format!(
        r#"{C_XML_DECL}<a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" name="Swimlane"><a:themeElements><a:clrScheme name="Swimlane">{c_colors}</a:clrScheme><a:fontScheme name="Swimlane"><a:majorFont>{c_font}</a:majorFont><a:minorFont>{c_font}</a:minorFont></a:fontScheme><a:fmtScheme name="Swimlane"><a:fillStyleLst>{c_fills}</a:fillStyleLst><a:lnStyleLst>{c_lines}</a:lnStyleLst><a:effectStyleLst>{c_effects}</a:effectStyleLst><a:bgFillStyleLst>{c_fills}</a:bgFillStyleLst></a:fmtScheme></a:themeElements></a:theme>"#
    )
}

fn derive_slide(slide: &SpecDeckSlide, options: &SpecDeckOptions) -> String {
    let c_title_fill = match options.title_fill.as_deref() {
        Some(rgb) => format!(
            r#"<a:solidFill><a:srgbClr val="{}"/></a:solidFill>"#,
            escape_xml(rgb.trim_start_matches('#'))
        ),
        None => "<a:noFill/>".to_string(),
    };
    let n_font_size = (options.title_font_size_pt * 100.0).round() as i64;
    let n_pic_width = convert_inches_to_emu(options.image_width_in);
    let n_pic_height = calculate_picture_height_emu(n_pic_width, &slide.image);

    format!(
        r#"{C_XML_DECL}<p:sld {C_NS_PML}><p:cSld><p:spTree>{C_GROUP_PROPS}<p:sp><p:nvSpPr><p:cNvPr id="2" name="Title"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr><p:spPr><a:xfrm><a:off x="{}" y="{}"/><a:ext cx="{}" cy="{}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom>{c_title_fill}</p:spPr><p:txBody><a:bodyPr wrap="square" anchor="ctr"/><a:lstStyle/><a:p><a:pPr algn="ctr"/><a:r><a:rPr lang="en-US" sz="{n_font_size}" b="1"><a:solidFill><a:srgbClr val="000000"/></a:solidFill></a:rPr><a:t>{}</a:t></a:r></a:p></p:txBody></p:sp><p:pic><p:nvPicPr><p:cNvPr id="3" name="Diagram"/><p:cNvPicPr><a:picLocks noChangeAspect="1"/></p:cNvPicPr><p:nvPr/></p:nvPicPr><p:blipFill><a:blip r:embed="rId2"/><a:stretch><a:fillRect/></a:stretch></p:blipFill><p:spPr><a:xfrm><a:off x="{}" y="{}"/><a:ext cx="{n_pic_width}" cy="{n_pic_height}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr></p:pic></p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>"#,
        convert_inches_to_emu(options.title_left_in),
        convert_inches_to_emu(options.title_top_in),
        convert_inches_to_emu(options.title_width_in),
        convert_inches_to_emu(options.title_height_in),
        escape_xml(&slide.title),
        convert_inches_to_emu(options.image_left_in),
        convert_inches_to_emu(options.image_top_in),
    )
}

fn derive_slide_rels(n_slide: usize) -> String {
    format!(
        r#"{C_XML_DECL}<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="{C_REL_BASE}/slideLayout" Target="../slideLayouts/slideLayout1.xml"/><Relationship Id="rId2" Type="{C_REL_BASE}/image" Target="../media/image{n_slide}.png"/></Relationships>"#
    )
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
