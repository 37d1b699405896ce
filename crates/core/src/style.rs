use std::path::Path;

use crate::types::FontOverride;

pub const DEFAULT_FONT_NAME: &str = "Arial";

/// ASS style overrides passed to the `subtitles` filter as `force_style`.
#[derive(Clone, Debug, PartialEq)]
pub struct SubtitleStyle {
    pub font_name: String,
    pub font_size: u32,
    /// `&HAABBGGRR`; alpha 0x80 is half transparent.
    pub back_colour: String,
    pub spacing: f64,
    pub outline: f64,
    pub shadow: f64,
    pub margin_v: u32,
}

impl Default for SubtitleStyle {
    fn default() -> Self {
        Self {
            font_name: DEFAULT_FONT_NAME.to_string(),
            font_size: 16,
            back_colour: "&H80000000".to_string(),
            spacing: 0.2,
            outline: 0.0,
            shadow: 0.75,
            margin_v: 70,
        }
    }
}

impl SubtitleStyle {
    /// Same style with the family swapped for a custom font, if any.
    pub fn with_font(&self, font: Option<&FontOverride>) -> Self {
        match font {
            Some(font) => Self {
                font_name: font.name.clone(),
                ..self.clone()
            },
            None => self.clone(),
        }
    }

    pub fn force_style(&self) -> String {
        format!(
            "FontName={},FontSize={},BackColour={},Spacing={},Outline={},Shadow={},MarginV={}",
            self.font_name,
            self.font_size,
            self.back_colour,
            self.spacing,
            self.outline,
            self.shadow,
            self.margin_v
        )
    }
}

/// Escape a value for ffmpeg's option parser (`key=value:key=value`).
fn escape_option_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '\'' | ':') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Escape a filter's argument string for the filtergraph parser.
fn escape_filtergraph(args: &str) -> String {
    let mut out = String::with_capacity(args.len());
    for c in args.chars() {
        if matches!(c, '\\' | '\'' | '[' | ']' | ',' | ';') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Build the `subtitles=...` video filter description for ffmpeg's `-vf`.
pub fn subtitles_filter(
    subtitle_path: &Path,
    fonts_dir: Option<&Path>,
    style: &SubtitleStyle,
) -> String {
    let mut options = vec![format!(
        "filename={}",
        escape_option_value(&subtitle_path.to_string_lossy())
    )];
    if let Some(dir) = fonts_dir {
        options.push(format!(
            "fontsdir={}",
            escape_option_value(&dir.to_string_lossy())
        ));
    }
    options.push(format!(
        "force_style={}",
        escape_option_value(&style.force_style())
    ));

    format!("subtitles={}", escape_filtergraph(&options.join(":")))
}
