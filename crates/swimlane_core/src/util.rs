//! Stateless helper utilities used by the layout engine and exporters.

use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

use crate::conf::{N_FONT_SIZE_MAX, N_FONT_SIZE_MIN, N_FONT_SIZE_PER_SPACING};
use crate::spec::{EnumFontSizeRounding, SpecLayoutOptions, SpecTextFit};

////////////////////////////////////////////////////////////////////////////////
// #region TextWrapping

const N_TAB_SIZE: usize = 8;

/// Greedily wrap `text` into lines of at most `width` characters.
///
/// Whitespace is collapsed to single spaces per character, words break after
/// a hyphen that follows two letters (or `letter-letter-`) and precedes two
/// letters (optionally dash-joined), runs of two or more dashes between words
/// stand alone, and words longer than `width` are split. Digits never count as
/// letters, so `1-2` stays whole. Leading whitespace of the first line is
/// kept; whitespace at line boundaries is dropped.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let n_width = usize::max(1, width);
    let mut l_chunks = split_wrap_chunks(&munge_whitespace(text));
    l_chunks.reverse();

    let mut l_lines: Vec<String> = Vec::new();
    while !l_chunks.is_empty() {
        let mut l_line: Vec<Vec<char>> = Vec::new();
        let mut n_len_line = 0usize;

        if !l_lines.is_empty() && l_chunks.last().is_some_and(|chunk| is_blank(chunk)) {
            l_chunks.pop();
        }

        while let Some(chunk) = l_chunks.last() {
            if n_len_line + chunk.len() > n_width {
                break;
            }
            n_len_line += chunk.len();
            if let Some(chunk) = l_chunks.pop() {
                l_line.push(chunk);
            }
        }

        if l_chunks.last().is_some_and(|chunk| chunk.len() > n_width) {
            split_long_chunk(&mut l_chunks, &mut l_line, n_len_line, n_width);
        }

        if l_line.last().is_some_and(|chunk| is_blank(chunk)) {
            l_line.pop();
        }
        if !l_line.is_empty() {
            l_lines.push(l_line.iter().flatten().collect());
        }
    }

    l_lines
}

fn munge_whitespace(text: &str) -> Vec<char> {
    let mut l_chars = Vec::with_capacity(text.len());
    let mut n_col = 0usize;
    for chr in text.chars() {
        match chr {
            '\t' => {
                let n_pad = N_TAB_SIZE - (n_col % N_TAB_SIZE);
                l_chars.extend(std::iter::repeat_n(' ', n_pad));
                n_col += n_pad;
            }
            '\n' | '\r' => {
                l_chars.push(' ');
                n_col = 0;
            }
            '\x0b' | '\x0c' => {
                l_chars.push(' ');
                n_col += 1;
            }
            _ => {
                l_chars.push(chr);
                n_col += 1;
            }
        }
    }
    l_chars
}

fn split_wrap_chunks(l_chars: &[char]) -> Vec<Vec<char>> {
    let mut l_chunks: Vec<Vec<char>> = Vec::new();
    let mut n_pos = 0usize;
    while n_pos < l_chars.len() {
        let n_end = if l_chars[n_pos] == ' ' {
            n_pos + l_chars[n_pos..].iter().take_while(|chr| **chr == ' ').count()
        } else if let Some(n_len_dash) = match_em_dash(l_chars, n_pos) {
            n_pos + n_len_dash
        } else {
            find_word_end(l_chars, n_pos)
        };
        l_chunks.push(l_chars[n_pos..n_end].to_vec());
        n_pos = n_end;
    }
    l_chunks
}

fn is_word_char(chr: char) -> bool {
    chr.is_alphanumeric() || chr == '_'
}

fn is_wrap_letter(chr: char) -> bool {
    is_word_char(chr) && !chr.is_numeric()
}

fn is_word_punct(chr: char) -> bool {
    is_word_char(chr) || matches!(chr, '!' | '"' | '\'' | '&' | '.' | ',' | '?')
}

/// Length of a `--`+ run at `n_pos` between a word and a word character.
fn match_em_dash(l_chars: &[char], n_pos: usize) -> Option<usize> {
    if n_pos == 0 || !is_word_punct(l_chars[n_pos - 1]) {
        return None;
    }
    let n_len_dash = l_chars[n_pos..].iter().take_while(|chr| **chr == '-').count();
    let if_word_after = l_chars
        .get(n_pos + n_len_dash)
        .is_some_and(|chr| is_word_char(*chr));
    (n_len_dash >= 2 && if_word_after).then_some(n_len_dash)
}

/// End of the word chunk starting at `n_pos`: before whitespace, after a
/// breakable hyphen, or before an em-dash run.
fn find_word_end(l_chars: &[char], n_pos: usize) -> usize {
    let mut n_idx = n_pos + 1;
    loop {
        match l_chars.get(n_idx) {
            None | Some(' ') => return n_idx,
            Some('-') if is_hyphen_break(l_chars, n_idx) => return n_idx + 1,
            _ => {}
        }
        if match_em_dash(l_chars, n_idx).is_some() {
            return n_idx;
        }
        n_idx += 1;
    }
}

fn is_hyphen_break(l_chars: &[char], n_idx: usize) -> bool {
    let is_letter_at = |n_pos: usize| l_chars.get(n_pos).copied().is_some_and(is_wrap_letter);

    let if_after_word = n_idx >= 2
        && (is_letter_at(n_idx - 2) && is_letter_at(n_idx - 1)
            || n_idx >= 3
                && is_letter_at(n_idx - 3)
                && l_chars[n_idx - 2] == '-'
                && is_letter_at(n_idx - 1));
    let if_before_word = is_letter_at(n_idx + 1)
        && (is_letter_at(n_idx + 2)
            || l_chars.get(n_idx + 2) == Some(&'-') && is_letter_at(n_idx + 3));

    if_after_word && if_before_word
}

fn split_long_chunk(
    l_chunks_rev: &mut [Vec<char>],
    l_line: &mut Vec<Vec<char>>,
    n_len_line: usize,
    n_width: usize,
) {
    let n_space_left = usize::max(n_width.saturating_sub(n_len_line), 1);
    let Some(chunk) = l_chunks_rev.last_mut() else {
        return;
    };

    let mut n_end = n_space_left;
    if chunk.len() > n_space_left
        && let Some(n_hyphen) = chunk[..n_space_left].iter().rposition(|chr| *chr == '-')
        && n_hyphen > 0
        && chunk[..n_hyphen].iter().any(|chr| *chr != '-')
    {
        n_end = n_hyphen + 1;
    }

    let l_tail = chunk.split_off(usize::min(n_end, chunk.len()));
    l_line.push(std::mem::replace(chunk, l_tail));
}

fn is_blank(chunk: &[char]) -> bool {
    chunk.iter().all(|chr| *chr == ' ')
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region TextFitting

/// Derive a clamped font size from the spacing between wrapped lines.
pub fn calculate_font_size(
    line_spacing: f64,
    font_size_min: f64,
    font_size_max: f64,
    rule: EnumFontSizeRounding,
) -> f64 {
    let n_raw = line_spacing * N_FONT_SIZE_PER_SPACING;
    let n_rounded = match rule {
        EnumFontSizeRounding::Truncate => n_raw.trunc(),
        EnumFontSizeRounding::Round => n_raw.round(),
    };
    n_rounded.max(font_size_min).min(font_size_max)
}

/// Wrap `text` and size it to fit a box of height `box_height`.
///
/// Line spacing is `box_height / (lines + 1)`; font size follows the spacing
/// and is clamped to the default [4, 10] point bounds.
pub fn fit_text(text: &str, n_chars_max: usize, box_height: f64) -> SpecTextFit {
    fit_text_bounded(
        text,
        n_chars_max,
        box_height,
        N_FONT_SIZE_MIN,
        N_FONT_SIZE_MAX,
        EnumFontSizeRounding::default(),
    )
}

/// [`fit_text`] with font bounds and rounding taken from layout options.
pub fn fit_text_with_options(text: &str, options: &SpecLayoutOptions) -> SpecTextFit {
    fit_text_bounded(
        text,
        options.wrap_chars_max,
        options.box_height,
        options.font_size_min,
        options.font_size_max,
        options.rule_font_rounding,
    )
}

fn fit_text_bounded(
    text: &str,
    n_chars_max: usize,
    box_height: f64,
    font_size_min: f64,
    font_size_max: f64,
    rule: EnumFontSizeRounding,
) -> SpecTextFit {
    let lines = wrap_text(text, n_chars_max);
    let line_spacing = box_height / (lines.len() as f64 + 1.0);
    let font_size = calculate_font_size(line_spacing, font_size_min, font_size_max, rule);
    SpecTextFit {
        lines,
        font_size,
        line_spacing,
    }
}

/// Estimate the rendered width of `text` in points.
///
/// Wide (CJK and above) characters count 1.6 units, everything else 1 unit.
pub fn estimate_text_width_pt(text: &str, font_size: f64, if_bold: bool) -> f64 {
    let n_units: f64 = text
        .chars()
        .map(|chr| if (chr as u32) >= 0x2E80 { 1.6 } else { 1.0 })
        .sum();
    let n_em_per_unit = if if_bold { 0.65 } else { 0.6 };
    n_units * n_em_per_unit * font_size
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region NameAndColorNormalization

/// Replace every char outside `[alnum, space, _, -]` by `replace_to`.
pub fn sanitize_file_stem(value: &str, replace_to: char) -> String {
    value
        .chars()
        .map(|chr| {
            if chr.is_alphanumeric() || matches!(chr, ' ' | '_' | '-') {
                chr
            } else {
                replace_to
            }
        })
        .collect()
}

/// Normalize a hex color (`#RGB`, `#RRGGBB`, `#RRGGBBAA`) to upper-case long form.
///
/// Returns `None` when `raw` is not a hex color.
pub fn normalize_color_hex(raw: &str) -> Option<String> {
    let c_hex = raw.trim().strip_prefix('#')?;
    if !c_hex.chars().all(|chr| chr.is_ascii_hexdigit()) {
        return None;
    }
    let c_long = match c_hex.len() {
        3 => c_hex.chars().flat_map(|chr| [chr, chr]).collect::<String>(),
        6 | 8 => c_hex.to_string(),
        _ => return None,
    };
    Some(format!("#{}", c_long.to_ascii_uppercase()))
}

/// Escape text for XML attribute and element content.
pub fn escape_xml(input: &str) -> String {
    let mut c_out = String::with_capacity(input.len());
    for chr in input.chars() {
        match chr {
            '&' => c_out.push_str("&amp;"),
            '<' => c_out.push_str("&lt;"),
            '>' => c_out.push_str("&gt;"),
            '"' => c_out.push_str("&quot;"),
            '\'' => c_out.push_str("&apos;"),
            chr if (chr as u32) < 0x20 && !matches!(chr, '\t' | '\n' | '\r') => {}
            chr => c_out.push(chr),
        }
    }
    c_out
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ZipEntries

/// Entry options for generated packages, with a fixed timestamp so identical
/// inputs produce identical bytes.
pub fn derive_zip_entry_options(if_compress: bool) -> SimpleFileOptions {
    let method = if if_compress {
        CompressionMethod::Deflated
    } else {
        CompressionMethod::Stored
    };
    SimpleFileOptions::default()
        .compression_method(method)
        .last_modified_time(zip::DateTime::default())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
