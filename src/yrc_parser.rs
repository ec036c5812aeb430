use crate::error::{ConvertError, ConvertResult};
use crate::types::{LyricMetadata, LyricWord, ParsedLine};
use crate::word_timed::{checked_add_ms, push_syllable};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

static YRC_LINE_TIMESTAMP_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[(?P<start>\d+),(?P<duration>\d+)\]").expect("未能编译 YRC_LINE_TIMESTAMP_REGEX")
});

static YRC_SYLLABLE_TIMESTAMP_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\((?P<start>\d+),(?P<duration>\d+),(?P<flag>\d+)\)")
        .expect("未能编译 YRC_SYLLABLE_TIMESTAMP_REGEX")
});

/// `[x-trans:..]`、`[merge]`、`[ti:..]` 一类不含歌词的标记行。
static YRC_TAG_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[[a-zA-Z][\w-]*(?::.*)?\]$").expect("未能编译 YRC_TAG_REGEX"));

/// 歌词开头的制作人员信息行，例如 `{"t":0,"c":[{"tx":"作词: "},{"tx":"某人"}]}`。
#[derive(Debug, Deserialize)]
struct YrcCreditLine {
    #[serde(default)]
    c: Vec<YrcCreditChunk>,
}

#[derive(Debug, Deserialize)]
struct YrcCreditChunk {
    #[serde(default)]
    tx: String,
}

pub fn parse_yrc_line(line_str: &str, line_num: usize) -> ConvertResult<ParsedLine> {
    let line_ts_cap = YRC_LINE_TIMESTAMP_REGEX.captures(line_str).ok_or_else(|| {
        ConvertError::InvalidWordTimedFormat {
            line_num,
            message: "行首缺少行时间戳标记 [start,duration]".to_string(),
        }
    })?;

    let line_start_ms: u64 = line_ts_cap["start"].parse()?;
    let line_duration_ms: u64 = line_ts_cap["duration"].parse()?;
    let header_end = line_ts_cap.get(0).map_or(0, |m| m.end());
    let content_after_line_ts = &line_str[header_end..];

    let mut timestamps_info = Vec::new();
    for ts_cap in YRC_SYLLABLE_TIMESTAMP_REGEX.captures_iter(content_after_line_ts) {
        let Some(ts_match) = ts_cap.get(0) else {
            continue;
        };
        let start_ms: u64 = ts_cap["start"].parse()?;
        let duration_ms: u64 = ts_cap["duration"].parse()?;
        timestamps_info.push((ts_match.start(), ts_match.end(), start_ms, duration_ms));
    }

    if timestamps_info.is_empty() && !content_after_line_ts.trim().is_empty() {
        return Err(ConvertError::InvalidWordTimedFormat {
            line_num,
            message: format!("内容 '{content_after_line_ts}' 中未找到有效的音节时间戳"),
        });
    }

    let mut words: Vec<LyricWord> = Vec::new();
    for (i, &(_, text_start_pos, syl_start_ms, syl_duration_ms)) in
        timestamps_info.iter().enumerate()
    {
        let text_end_pos = timestamps_info
            .get(i + 1)
            .map_or(content_after_line_ts.len(), |next| next.0);
        let text_slice = &content_after_line_ts[text_start_pos..text_end_pos];
        let syl_end_ms = checked_add_ms(syl_start_ms, syl_duration_ms, line_num)?;
        push_syllable(&mut words, text_slice, syl_start_ms, syl_end_ms);
    }

    Ok(ParsedLine {
        start_ms: Some(line_start_ms),
        end_ms: Some(checked_add_ms(line_start_ms, line_duration_ms, line_num)?),
        words,
        ..Default::default()
    })
}

fn parse_credit_line(line_str: &str) -> Option<LyricMetadata> {
    let credit: YrcCreditLine = match serde_json::from_str(line_str) {
        Ok(credit) => credit,
        Err(e) => {
            log::warn!("[YRC 解析] 无法解析制作人员信息行 '{line_str}': {e}");
            return None;
        }
    };
    let joined: String = credit.c.iter().map(|chunk| chunk.tx.as_str()).collect();
    let joined = joined.trim();
    if joined.is_empty() {
        return None;
    }
    match joined.split_once([':', '：']) {
        Some((key, value)) if !key.trim().is_empty() => {
            Some(LyricMetadata::new(key.trim(), value.trim()))
        }
        _ => Some(LyricMetadata::new("credit", joined)),
    }
}

/// 解析 YRC 文本。无法解析的行记录日志后跳过，没有任何词的行不会出现在结果中。
pub fn load_yrc_from_string(
    yrc_content: &str,
) -> ConvertResult<(Vec<ParsedLine>, Vec<LyricMetadata>)> {
    let mut yrc_lines_vec: Vec<ParsedLine> = Vec::new();
    let mut metadata_vec: Vec<LyricMetadata> = Vec::new();

    for (i, line_str_raw) in yrc_content.lines().enumerate() {
        let line_num = i + 1;
        let trimmed_line = line_str_raw.trim();

        if trimmed_line.is_empty() {
            continue;
        }

        if trimmed_line.starts_with('{') && trimmed_line.ends_with('}') {
            metadata_vec.extend(parse_credit_line(trimmed_line));
            continue;
        }

        if YRC_LINE_TIMESTAMP_REGEX.is_match(trimmed_line) {
            match parse_yrc_line(trimmed_line, line_num) {
                Ok(parsed_line) if !parsed_line.words.is_empty() => {
                    yrc_lines_vec.push(parsed_line);
                }
                Ok(_) => log::trace!("[YRC 解析] 行 {line_num}: 没有音节，已跳过"),
                Err(e) => {
                    log::error!("[YRC 解析] 解析行 {line_num} ('{trimmed_line}') 失败: {e}");
                }
            }
        } else if YRC_TAG_REGEX.is_match(trimmed_line) {
            log::trace!("[YRC 解析] 行 {line_num}: 跳过标记行 '{trimmed_line}'");
        } else {
            log::warn!("[YRC 解析] 行 {line_num}: 无法识别的 YRC 行格式: '{trimmed_line}'");
        }
    }

    yrc_lines_vec.sort_by_key(|line| line.anchor_ms());
    Ok((yrc_lines_vec, metadata_vec))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_yrc_line_basic() {
        let line = parse_yrc_line("[1000,2000](1000,500,0)Hel(1500,500,0)lo ", 1).unwrap();
        assert_eq!(line.start_ms, Some(1000));
        assert_eq!(line.end_ms, Some(3000));
        assert_eq!(line.words.len(), 2);
        assert_eq!(line.words[0], LyricWord::new("Hel", 1000, 1500));
        assert_eq!(line.words[1], LyricWord::new("lo ", 1500, 2000));
    }

    #[test]
    fn test_parse_yrc_line_without_syllables_is_error() {
        let err = parse_yrc_line("[1000,2000]plain text", 3).unwrap_err();
        assert!(matches!(
            err,
            ConvertError::InvalidWordTimedFormat { line_num: 3, .. }
        ));
    }

    #[test]
    fn test_load_yrc_skips_markers_and_reads_credits() {
        let content = r#"{"t":0,"c":[{"tx":"作词: "},{"tx":"某人"}]}
[x-trans:zh]
[merge]
[5000,1000](5000,500,0)B(5500,500,0)
[1000,1000](1000,1000,0)A
[2000,1000]broken"#;
        let (lines, metadata) = load_yrc_from_string(content).unwrap();
        assert_eq!(metadata, vec![LyricMetadata::new("作词", "某人")]);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text(), "A");
        assert_eq!(lines[1].text(), "B");
    }

    #[test]
    fn test_out_of_range_timestamps_skip_only_that_line() {
        let err = parse_yrc_line("[18446744073709551615,1](1000,1,0)x", 2).unwrap_err();
        assert!(matches!(
            err,
            ConvertError::InvalidWordTimedFormat { line_num: 2, .. }
        ));

        let content = "[1000,500](1000,500,0)ok\n\
                       [18446744073709551615,1](18446744073709551615,1,0)x\n\
                       [99999999999999999999999,1](1,1,0)y";
        let (lines, _) = load_yrc_from_string(content).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text(), "ok");
    }

    #[test]
    fn test_credit_line_without_colon() {
        let meta = parse_credit_line(r#"{"t":100,"c":[{"tx":"纯音乐"}]}"#).unwrap();
        assert_eq!(meta, LyricMetadata::new("credit", "纯音乐"));
        assert!(parse_credit_line(r#"{"t":100,"c":[]}"#).is_none());
        assert!(parse_credit_line("{not json}").is_none());
    }
}
