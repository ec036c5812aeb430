use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{ConvertError, ConvertResult};
use crate::types::{LyricMetadata, LyricWord, ParsedLine};
use crate::word_timed::{checked_add_ms, push_syllable};

// 行级时间戳，例如 "[12345,5000]"
static QRC_LINE_TIMESTAMP_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[(?P<start>\d+),(?P<duration>\d+)\]").expect("未能编译 QRC_LINE_TIMESTAMP_REGEX")
});

// 音节在前、绝对时间在后，例如 "歌(12345,500)"
static WORD_TIMESTAMP_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\((?P<start>\d+),(?P<duration>\d+)\)").expect("未能编译 WORD_TIMESTAMP_REGEX")
});

// 相对行首的偏移在前、音节在后，例如 "<100,200,0>歌"
static RELATIVE_SYLLABLE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<(?P<offset>\d+),(?P<duration>\d+),\d+>(?P<text>[^<]*)")
        .expect("未能编译 RELATIVE_SYLLABLE_REGEX")
});

static METADATA_TAG_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[(?P<key>[a-zA-Z0-9_-]+):(?P<value>.*?)\]$").expect("未能编译 METADATA_TAG_REGEX")
});

/// 解析单行 QRC 歌词。
///
/// 同时接受两种音节写法：`文本(start,duration)`（绝对时间）与
/// `<offset,duration,flag>文本`（相对行开始时间）。
pub fn parse_qrc_line(line_str: &str, line_num: usize) -> ConvertResult<ParsedLine> {
    let line_ts_cap = QRC_LINE_TIMESTAMP_REGEX.captures(line_str).ok_or_else(|| {
        ConvertError::InvalidWordTimedFormat {
            line_num,
            message: "行首缺少行时间戳标记 [start,duration]".to_string(),
        }
    })?;

    let line_start_ms: u64 = line_ts_cap["start"].parse()?;
    let line_duration_ms: u64 = line_ts_cap["duration"].parse()?;
    let header_end = line_ts_cap.get(0).map_or(0, |m| m.end());
    let content_after_line_ts = &line_str[header_end..];

    let words = if RELATIVE_SYLLABLE_REGEX.is_match(content_after_line_ts) {
        parse_relative_syllables(content_after_line_ts, line_start_ms, line_num)?
    } else {
        parse_absolute_syllables(content_after_line_ts, line_num)?
    };

    if words.is_empty() && !content_after_line_ts.trim().is_empty() {
        return Err(ConvertError::InvalidWordTimedFormat {
            line_num,
            message: format!("无法从内容 '{content_after_line_ts}' 中解析出任何有效音节时间戳"),
        });
    }

    Ok(ParsedLine {
        start_ms: Some(line_start_ms),
        end_ms: Some(checked_add_ms(line_start_ms, line_duration_ms, line_num)?),
        words,
        ..Default::default()
    })
}

fn parse_absolute_syllables(content: &str, line_num: usize) -> ConvertResult<Vec<LyricWord>> {
    let mut words: Vec<LyricWord> = Vec::new();
    let mut last_text_segment_end = 0;

    for captures in WORD_TIMESTAMP_REGEX.captures_iter(content) {
        let Some(ts_match) = captures.get(0) else {
            continue;
        };
        let text_slice = &content[last_text_segment_end..ts_match.start()];
        let syl_start_ms: u64 = captures["start"].parse()?;
        let syl_duration_ms: u64 = captures["duration"].parse()?;
        let syl_end_ms = checked_add_ms(syl_start_ms, syl_duration_ms, line_num)?;
        push_syllable(&mut words, text_slice, syl_start_ms, syl_end_ms);
        last_text_segment_end = ts_match.end();
    }

    let remaining_text = &content[last_text_segment_end..];
    if !remaining_text.trim().is_empty() && last_text_segment_end > 0 {
        log::warn!(
            "[QRC 解析] 行 {line_num}: 最后一个音节时间戳之后还有文本 '{remaining_text}'，已忽略"
        );
    }

    Ok(words)
}

fn parse_relative_syllables(
    content: &str,
    line_start_ms: u64,
    line_num: usize,
) -> ConvertResult<Vec<LyricWord>> {
    let mut words: Vec<LyricWord> = Vec::new();
    for captures in RELATIVE_SYLLABLE_REGEX.captures_iter(content) {
        let offset_ms: u64 = captures["offset"].parse()?;
        let duration_ms: u64 = captures["duration"].parse()?;
        let start_ms = checked_add_ms(line_start_ms, offset_ms, line_num)?;
        let end_ms = checked_add_ms(start_ms, duration_ms, line_num)?;
        push_syllable(&mut words, &captures["text"], start_ms, end_ms);
    }
    Ok(words)
}

/// 解析 QRC / KRC 风格的逐字歌词文本。
///
/// `[ti:]`、`[ar:]`、`[al:]`、`[by:]` 记为元数据，其余标签忽略。
pub fn load_qrc_from_string(
    content: &str,
) -> ConvertResult<(Vec<ParsedLine>, Vec<LyricMetadata>)> {
    let mut qrc_lines: Vec<ParsedLine> = Vec::new();
    let mut metadata: Vec<LyricMetadata> = Vec::new();

    for (i, line_str) in content.lines().enumerate() {
        let line_num = i + 1;
        let trimmed_line = line_str.trim();
        if trimmed_line.is_empty() {
            continue;
        }

        if QRC_LINE_TIMESTAMP_REGEX.is_match(trimmed_line) {
            match parse_qrc_line(trimmed_line, line_num) {
                Ok(line) if !line.words.is_empty() => qrc_lines.push(line),
                Ok(_) => log::trace!("[QRC 解析] 行 {line_num}: 没有音节，已跳过"),
                Err(e) => log::error!("[QRC 解析] 解析行 {line_num} 失败: {e}"),
            }
        } else if let Some(meta_caps) = METADATA_TAG_REGEX.captures(trimmed_line) {
            let key = meta_caps["key"].to_lowercase();
            match key.as_str() {
                "ti" | "ar" | "al" | "by" => {
                    metadata.push(LyricMetadata::new(key, meta_caps["value"].trim()));
                }
                _ => log::trace!("[QRC 解析] 行 {line_num}: 忽略标签 '{trimmed_line}'"),
            }
        } else {
            log::warn!("[QRC 解析] 行 {line_num}: 无法识别的行: '{trimmed_line}'");
        }
    }

    qrc_lines.sort_by_key(|line| line.anchor_ms());
    Ok((qrc_lines, metadata))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_syllables() {
        let line = parse_qrc_line("[1000,1500]Hel(1000,500)lo (1500,500)there(2000,500)", 1)
            .unwrap();
        assert_eq!(line.start_ms, Some(1000));
        assert_eq!(line.end_ms, Some(2500));
        let texts: Vec<&str> = line.words.iter().map(|w| w.text.as_str()).collect();
        assert_eq!(texts, vec!["Hel", "lo ", "there"]);
        assert_eq!(line.words[2].end_ms, 2500);
    }

    #[test]
    fn test_relative_syllables() {
        let line = parse_qrc_line("[10000,800]<0,300,0>你<300,500,0>好", 1).unwrap();
        assert_eq!(line.words[0], LyricWord::new("你", 10_000, 10_300));
        assert_eq!(line.words[1], LyricWord::new("好", 10_300, 10_800));
    }

    #[test]
    fn test_line_without_syllables_is_error() {
        assert!(parse_qrc_line("[1000,500]no markers", 7).is_err());
        assert!(parse_qrc_line("no header", 7).is_err());
    }

    #[test]
    fn test_out_of_range_offsets_are_errors() {
        assert!(parse_qrc_line("[18446744073709551615,0]<1,1,0>x", 1).is_err());
        assert!(parse_qrc_line("[0,0]x(18446744073709551615,1)", 1).is_err());

        let content = "[1000,500]a(1000,500)\n[18446744073709551615,5]<0,1,0>b";
        let (lines, _) = load_qrc_from_string(content).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text(), "a");
    }

    #[test]
    fn test_load_qrc_metadata_and_order() {
        let content = "[ti:Song]\n[offset:0]\n[2000,500]b(2000,500)\n[1000,500]a(1000,500)\n[3000,100]bad";
        let (lines, metadata) = load_qrc_from_string(content).unwrap();
        assert_eq!(metadata, vec![LyricMetadata::new("ti", "Song")]);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text(), "a");
        assert_eq!(lines[1].text(), "b");
    }
}
