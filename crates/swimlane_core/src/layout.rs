//! Layout engine: places lanes, sequence columns and activity boxes on a grid.
//!
//! Grid cells are 1x1 data units. Lane `i` of `n` (first-seen order) occupies
//! the band `y in [n-1-i, n-i]`, so the first lane seen ends up on top once
//! the y axis points up. Sequence keys are compared as text and placed left
//! to right by sorted rank.

use std::collections::{BTreeSet, HashMap};

use polars::prelude::DataFrame;

use crate::conf::{
    C_COLOR_LANE_BAND, C_COLOR_LANE_EDGE, C_COLOR_TEXT_BOX, C_COLOR_TEXT_DARK, N_BOX_INSET_X,
    N_BOX_INSET_Y, N_CANVAS_HEIGHT_MIN, N_CANVAS_HEIGHT_PER_LANE, N_CANVAS_WIDTH_MIN,
    N_CANVAS_WIDTH_PER_SEQUENCE, N_FONT_SIZE_LANE, N_FONT_SIZE_TICK, N_FONT_SIZE_TITLE,
    N_LANE_EDGE_WIDTH, N_LANE_LABEL_OFFSET_X, N_TICK_ROTATION_DEG,
};
use crate::error::{Result, SwimlaneError};
use crate::spec::{
    EnumDrawOp, EnumTextAnchor, EnumTextBaseline, SpecActivityRecord, SpecAxisPlan,
    SpecColumnRoles, SpecDiagram, SpecLayoutOptions, SpecRect, SpecTextRun,
};
use crate::table::extract_activity_records;
use crate::util::{fit_text_with_options, normalize_color_hex};

/// Gap between the lane bottom edge and sequence labels (points).
const N_TICK_PAD_PT: f64 = 7.0;
/// Gap between the lane top edge and the title (points).
const N_TITLE_PAD_PT: f64 = 6.0;
/// Edge width of activity boxes (points); the edge takes the fill color.
const N_BOX_EDGE_WIDTH: f64 = 1.0;

////////////////////////////////////////////////////////////////////////////////
// #region AxisPlanning

/// Distinct lanes in first-seen order; position of lane `i` is `n - 1 - i`.
pub fn plan_lanes(records: &[SpecActivityRecord]) -> SpecAxisPlan {
    let mut keys: Vec<String> = Vec::new();
    for record in records {
        if !keys.contains(&record.lane) {
            keys.push(record.lane.clone());
        }
    }

    let n_lanes = keys.len();
    let positions: HashMap<String, usize> = keys
        .iter()
        .enumerate()
        .map(|(n_idx, lane)| (lane.clone(), n_lanes - 1 - n_idx))
        .collect();

    SpecAxisPlan { keys, positions }
}

/// Distinct sequence keys sorted as text; position is the sorted rank.
pub fn plan_sequences(records: &[SpecActivityRecord]) -> SpecAxisPlan {
    let set_orders: BTreeSet<&str> = records.iter().map(|record| record.order.as_str()).collect();
    let keys: Vec<String> = set_orders.into_iter().map(ToString::to_string).collect();
    let positions: HashMap<String, usize> = keys
        .iter()
        .enumerate()
        .map(|(n_idx, order)| (order.clone(), n_idx))
        .collect();

    SpecAxisPlan { keys, positions }
}

/// Plot area size in inches for `n_sequences` columns and `n_lanes` lanes.
pub fn calculate_canvas_size(n_sequences: usize, n_lanes: usize) -> (f64, f64) {
    let width_in = f64::max(
        N_CANVAS_WIDTH_MIN,
        n_sequences as f64 * N_CANVAS_WIDTH_PER_SEQUENCE,
    );
    let height_in = f64::max(N_CANVAS_HEIGHT_MIN, n_lanes as f64 * N_CANVAS_HEIGHT_PER_LANE);
    (width_in, height_in)
}

/// Validate layout options before any layout happens.
pub fn validate_layout_options(options: &SpecLayoutOptions) -> Result<()> {
    if options.wrap_chars_max == 0 {
        return Err(SwimlaneError::InvalidOptions(
            "wrap_chars_max must be >= 1".to_string(),
        ));
    }
    for (name, n_value) in [
        ("box_width", options.box_width),
        ("box_height", options.box_height),
    ] {
        if !(n_value > 0.0 && n_value <= 1.0) {
            return Err(SwimlaneError::InvalidOptions(format!(
                "{name} must be in (0, 1], got {n_value}"
            )));
        }
    }
    if !(options.font_size_min > 0.0 && options.font_size_min <= options.font_size_max) {
        return Err(SwimlaneError::InvalidOptions(format!(
            "font size bounds must satisfy 0 < min <= max, got [{}, {}]",
            options.font_size_min, options.font_size_max
        )));
    }
    if normalize_color_hex(&options.color_box_default).is_none() {
        return Err(SwimlaneError::InvalidOptions(format!(
            "color_box_default is not a hex color: {:?}",
            options.color_box_default
        )));
    }
    Ok(())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region DiagramLayout

/// Title line naming the filter column and value behind a diagram.
pub fn derive_diagram_title(prefix: &str, filter_column: &str, filter_value: &str) -> String {
    format!("{prefix} \u{2013} {filter_column} = {filter_value}")
}

/// Lay out complete activity records into drawing instructions.
///
/// Empty input yields a valid diagram with a title and no lanes.
pub fn layout_diagram(
    records: &[SpecActivityRecord],
    filter_column: &str,
    filter_value: &str,
    options: &SpecLayoutOptions,
) -> SpecDiagram {
    let plan_lanes = plan_lanes(records);
    let plan_sequences = plan_sequences(records);
    let n_lanes = plan_lanes.len();
    let n_sequences = plan_sequences.len();
    let (width_in, height_in) = calculate_canvas_size(n_sequences, n_lanes);

    let x_lim = (-1.0, n_sequences as f64);
    let y_lim = (0.0, n_lanes as f64);
    let title = derive_diagram_title(&options.title_prefix, filter_column, filter_value);

    let mut l_ops_shape: Vec<EnumDrawOp> = Vec::with_capacity(n_lanes + records.len());
    let mut l_ops_text: Vec<EnumDrawOp> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();

    for lane in &plan_lanes.keys {
        let Some(n_pos_lane) = plan_lanes.position(lane) else {
            continue;
        };
        let y = n_pos_lane as f64;
        l_ops_shape.push(EnumDrawOp::Rect(SpecRect {
            x: 0.0,
            y,
            width: n_sequences as f64,
            height: 1.0,
            fill: C_COLOR_LANE_BAND.to_string(),
            edge: Some(C_COLOR_LANE_EDGE.to_string()),
            edge_width: N_LANE_EDGE_WIDTH,
        }));
        l_ops_text.push(EnumDrawOp::Text(SpecTextRun {
            x: N_LANE_LABEL_OFFSET_X,
            y: y + 0.5,
            offset_pt: (0.0, 0.0),
            text: lane.clone(),
            font_size: N_FONT_SIZE_LANE,
            color: C_COLOR_TEXT_DARK.to_string(),
            bold: true,
            anchor: EnumTextAnchor::End,
            baseline: EnumTextBaseline::Center,
            rotation_deg: 0.0,
        }));
    }

    for record in records {
        let (Some(n_pos_seq), Some(n_pos_lane)) = (
            plan_sequences.position(&record.order),
            plan_lanes.position(&record.lane),
        ) else {
            continue;
        };
        let x = n_pos_seq as f64;
        let y = n_pos_lane as f64;
        let fill = derive_box_fill(record, options, &mut warnings);
        let fit = fit_text_with_options(&record.label, options);

        l_ops_shape.push(EnumDrawOp::Rect(SpecRect {
            x: x + N_BOX_INSET_X,
            y: y + N_BOX_INSET_Y,
            width: options.box_width,
            height: options.box_height,
            fill,
            edge: None,
            edge_width: N_BOX_EDGE_WIDTH,
        }));

        let x_center = x + N_BOX_INSET_X + options.box_width / 2.0;
        let y_top = y + N_BOX_INSET_Y + options.box_height;
        for (n_idx_line, line) in fit.lines.iter().enumerate() {
            l_ops_text.push(EnumDrawOp::Text(SpecTextRun {
                x: x_center,
                y: y_top - (n_idx_line as f64 + 1.0) * fit.line_spacing,
                offset_pt: (0.0, 0.0),
                text: line.clone(),
                font_size: fit.font_size,
                color: C_COLOR_TEXT_BOX.to_string(),
                bold: false,
                anchor: EnumTextAnchor::Middle,
                baseline: EnumTextBaseline::Center,
                rotation_deg: 0.0,
            }));
        }
    }

    if options.if_show_sequence_ticks {
        for (n_idx, order) in plan_sequences.keys.iter().enumerate() {
            l_ops_text.push(EnumDrawOp::Text(SpecTextRun {
                x: n_idx as f64,
                y: y_lim.0,
                offset_pt: (0.0, N_TICK_PAD_PT),
                text: order.clone(),
                font_size: N_FONT_SIZE_TICK,
                color: C_COLOR_TEXT_DARK.to_string(),
                bold: false,
                anchor: EnumTextAnchor::End,
                baseline: EnumTextBaseline::Top,
                rotation_deg: N_TICK_ROTATION_DEG,
            }));
        }
    }

    l_ops_text.push(EnumDrawOp::Text(SpecTextRun {
        x: (x_lim.0 + x_lim.1) / 2.0,
        y: y_lim.1,
        offset_pt: (0.0, -N_TITLE_PAD_PT),
        text: title.clone(),
        font_size: N_FONT_SIZE_TITLE,
        color: C_COLOR_TEXT_DARK.to_string(),
        bold: false,
        anchor: EnumTextAnchor::Middle,
        baseline: EnumTextBaseline::Bottom,
        rotation_deg: 0.0,
    }));

    tracing::debug!(
        n_lanes,
        n_sequences,
        n_records = records.len(),
        width_in,
        height_in,
        "diagram laid out"
    );

    l_ops_shape.extend(l_ops_text);
    SpecDiagram {
        title,
        width_in,
        height_in,
        x_lim,
        y_lim,
        lanes: plan_lanes.keys,
        sequences: plan_sequences.keys,
        ops: l_ops_shape,
        warnings,
    }
}

/// Lay out the rows of an already filtered table.
///
/// Rows missing lane, label or order are dropped silently.
pub fn layout_filtered_table(
    df_filtered: &DataFrame,
    roles: &SpecColumnRoles,
    filter_value: &str,
    options: &SpecLayoutOptions,
) -> Result<SpecDiagram> {
    let l_records = extract_activity_records(df_filtered, roles)?;
    Ok(layout_diagram(
        &l_records,
        &roles.col_filter,
        filter_value,
        options,
    ))
}

fn derive_box_fill(
    record: &SpecActivityRecord,
    options: &SpecLayoutOptions,
    warnings: &mut Vec<String>,
) -> String {
    let color_default = normalize_color_hex(&options.color_box_default)
        .unwrap_or_else(|| options.color_box_default.clone());
    let Some(color_raw) = record.color_hex.as_deref() else {
        return color_default;
    };
    match normalize_color_hex(color_raw) {
        Some(color) => color,
        None => {
            let msg = format!(
                "Unusable color {color_raw:?} for activity {:?}; using {color_default}.",
                record.label
            );
            tracing::warn!("{msg}");
            warnings.push(msg);
            color_default
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
