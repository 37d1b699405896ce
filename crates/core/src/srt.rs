//! SRT (SubRip) serialization of aligned transcript segments.

use std::{io::Write, path::Path};

use tokio::fs;

use crate::{
    error::Result,
    format::format_timestamp,
    types::{SubtitleRecord, TranscriptSegment},
};

/// `-->` separates the time range, so it may never appear in a text line.
fn sanitize_text(text: &str) -> String {
    text.trim().replace("-->", "->")
}

/// Expand segments into numbered records, one per segment or one per aligned word.
pub fn subtitle_records(segments: &[TranscriptSegment], word_mode: bool) -> Vec<SubtitleRecord> {
    let timed_texts: Vec<(&str, f64, f64)> = if word_mode {
        segments
            .iter()
            .flat_map(|seg| seg.words.iter())
            .map(|w| (w.word.as_str(), w.start, w.end))
            .collect()
    } else {
        segments
            .iter()
            .map(|seg| (seg.text.as_str(), seg.start, seg.end))
            .collect()
    };

    timed_texts
        .into_iter()
        .enumerate()
        .map(|(i, (text, start, end))| SubtitleRecord {
            index: i + 1,
            start,
            end,
            text: sanitize_text(text),
        })
        .collect()
}

pub fn write_record<W: Write>(record: &SubtitleRecord, sink: &mut W) -> Result<()> {
    writeln!(sink, "{}", record.index)?;
    writeln!(
        sink,
        "{} --> {}",
        format_timestamp(record.start, true)?,
        format_timestamp(record.end, true)?
    )?;
    writeln!(sink, "{}", record.text)?;
    writeln!(sink)?;
    Ok(())
}

pub fn write_subtitles<W: Write>(
    segments: &[TranscriptSegment],
    word_mode: bool,
    sink: &mut W,
) -> Result<()> {
    for record in subtitle_records(segments, word_mode) {
        write_record(&record, sink)?;
    }
    Ok(())
}

/// Render the whole file in memory first so a timestamp error leaves nothing behind.
pub async fn write_subtitle_file(
    path: &Path,
    segments: &[TranscriptSegment],
    word_mode: bool,
) -> Result<()> {
    let mut buf = Vec::new();
    write_subtitles(segments, word_mode, &mut buf)?;
    fs::write(path, buf).await?;
    Ok(())
}
