//! 逐字歌词的公共部分：方言分派、音节文本规整、按行展平。

use crate::error::{ConvertError, ConvertResult};
use crate::format_sniffer::sniff_word_timed_dialect;
use crate::qrc_parser::load_qrc_from_string;
use crate::types::{LrcLine, LyricMetadata, LyricWord, ParsedLine, WordTimedDialect};
use crate::yrc_parser::load_yrc_from_string;

/// 先判断方言，再交给对应的解析器。
pub fn load_word_timed_from_string(
    content: &str,
) -> ConvertResult<(WordTimedDialect, Vec<ParsedLine>, Vec<LyricMetadata>)> {
    let dialect = sniff_word_timed_dialect(content);
    let (lines, metadata) = match dialect {
        WordTimedDialect::Yrc => load_yrc_from_string(content)?,
        WordTimedDialect::Qrc => load_qrc_from_string(content)?,
    };
    Ok((dialect, lines, metadata))
}

/// 规整一个音节的文本。
///
/// 去掉首尾空白，原文在首部或尾部带空白时各保留一个空格。
/// 纯空白的音节返回 `None`。
pub fn normalize_syllable_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let mut text = String::with_capacity(trimmed.len() + 2);
    if raw.starts_with(char::is_whitespace) {
        text.push(' ');
    }
    text.push_str(trimmed);
    if raw.ends_with(char::is_whitespace) {
        text.push(' ');
    }
    Some(text)
}

/// 时间相加，溢出时作为该行的格式错误返回。
pub(crate) fn checked_add_ms(
    base_ms: u64,
    delta_ms: u64,
    line_num: usize,
) -> ConvertResult<u64> {
    base_ms
        .checked_add(delta_ms)
        .ok_or_else(|| ConvertError::InvalidWordTimedFormat {
            line_num,
            message: format!("时间戳 {base_ms} + {delta_ms} 超出范围"),
        })
}

/// 把一个音节追加到词列表。
///
/// 纯空白的音节不单独成词，而是在前一个词末尾补一个空格。
pub(crate) fn push_syllable(words: &mut Vec<LyricWord>, raw: &str, start_ms: u64, end_ms: u64) {
    match normalize_syllable_text(raw) {
        Some(text) => words.push(LyricWord::new(text, start_ms, end_ms)),
        None => {
            if raw.is_empty() {
                return;
            }
            if let Some(prev) = words.last_mut() {
                if !prev.text.ends_with(' ') {
                    prev.text.push(' ');
                }
            }
        }
    }
}

/// 把逐字歌词行展平为 (行开始时间, 整行文本)，用作辅助轨道。
pub fn flatten_to_lrc_lines(lines: &[ParsedLine]) -> Vec<LrcLine> {
    lines
        .iter()
        .filter_map(|line| {
            let text = line.text();
            let text = text.trim();
            (!text.is_empty()).then(|| LrcLine {
                timestamp_ms: line.anchor_ms(),
                text: text.to_string(),
            })
        })
        .collect()
}
