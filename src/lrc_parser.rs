use crate::error::{ConvertError, ConvertResult};
use crate::types::{LrcLine, LyricMetadata, ParsedLine, TimeMap};
use once_cell::sync::Lazy;
use regex::Regex;

/// 严格的 `[MM:SS.CC]文本` 行，用于把辅助歌词转换成时间映射。
static TIME_MAP_LINE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[(\d{2}):(\d{2})\.(\d{2})\](.*)$").expect("未能编译 TIME_MAP_LINE_REGEX")
});

/// 一行开头的一个或多个时间戳，以及其后的文本。
static LRC_LINE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^((?:\[\d{2,}:\d{2}[.:]\d{2,3}\])+)(.*)$").expect("未能编译 LRC_LINE_REGEX")
});

static LRC_TIMESTAMP_EXTRACT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[(\d{2,}):(\d{2})[.:](\d{2,3})\]").expect("未能编译 LRC_TIMESTAMP_EXTRACT_REGEX")
});

static LRC_METADATA_TAG_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[(ti|ar|al|by|offset|length|re|ve):(.*?)\]$")
        .expect("未能编译 LRC_METADATA_TAG_REGEX")
});

/// 兜底解析用的宽松时间戳：`[m:s]`、`[m:s.f]`、`[m:s:f]`，小数部分 1~3 位。
static LENIENT_LRC_LINE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^((?:\[\d{1,3}:\d{1,2}(?:[.:]\d{1,3})?\])+)(.*)$")
        .expect("未能编译 LENIENT_LRC_LINE_REGEX")
});

static LENIENT_TIMESTAMP_EXTRACT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[(\d{1,3}):(\d{1,2})(?:[.:](\d{1,3}))?\]")
        .expect("未能编译 LENIENT_TIMESTAMP_EXTRACT_REGEX")
});

/// 逐字歌词的行头 `[start,duration]`。
static WORD_TIMED_HEADER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[(\d+),(\d+)\](.*)$").expect("未能编译 WORD_TIMED_HEADER_REGEX")
});

/// 逐字歌词中的音节时间标记：`(a,b)`、`(a,b,c)`、`<a,b,c>`。
static SYLLABLE_MARKER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\(\d+,\d+(?:,\d+)?\)|<\d+,\d+,\d+>").expect("未能编译 SYLLABLE_MARKER_REGEX")
});

/// 把逐行歌词文本转换为 毫秒时间 -> 行文本 的映射。
///
/// 只接受 `[MM:SS.CC]` 形式的时间戳，时间为 `分*60000 + 秒*1000 + 厘秒*10`。
/// 不匹配的行直接跳过，去掉时间戳后内容为空的行不会进入映射。
/// 同一时间戳出现多次时保留最后一次出现的文本。
pub fn parse_time_map(text: &str) -> TimeMap {
    let mut time_map = TimeMap::new();

    for line in text.lines() {
        let Some(caps) = TIME_MAP_LINE_REGEX.captures(line.trim()) else {
            continue;
        };
        let (Ok(minutes), Ok(seconds), Ok(centiseconds)) = (
            caps[1].parse::<u64>(),
            caps[2].parse::<u64>(),
            caps[3].parse::<u64>(),
        ) else {
            continue;
        };
        let content = caps[4].trim();
        if content.is_empty() {
            continue;
        }
        let time_ms = minutes * 60_000 + seconds * 1000 + centiseconds * 10;
        time_map.insert(time_ms, content.to_string());
    }

    time_map
}

/// 把时间映射展开为按时间升序排列的行。
pub fn time_map_to_lines(time_map: &TimeMap) -> Vec<LrcLine> {
    time_map
        .iter()
        .map(|(&timestamp_ms, text)| LrcLine {
            timestamp_ms,
            text: text.clone(),
        })
        .collect()
}

/// 解析 LRC 主歌词。
///
/// 每行可以带多个时间戳，小数部分可以是两位（厘秒）或三位（毫秒）。
/// 文本为空的行被丢弃。输出的每一行只有一个词，时间覆盖到下一行开始。
pub fn load_lrc_from_string(
    content: &str,
) -> ConvertResult<(Vec<ParsedLine>, Vec<LyricMetadata>)> {
    let mut entries: Vec<LrcLine> = Vec::new();
    let mut metadata: Vec<LyricMetadata> = Vec::new();

    for (line_num, line_str_raw) in content.lines().enumerate() {
        let line_str = line_str_raw.trim();
        if line_str.is_empty() {
            continue;
        }

        if let Some(caps) = LRC_LINE_REGEX.captures(line_str) {
            let text = caps[2].trim();
            if text.is_empty() {
                log::trace!("[LRC 处理] 行 {}: 空白歌词行，已跳过", line_num + 1);
                continue;
            }
            let timestamps: ConvertResult<Vec<u64>> = LRC_TIMESTAMP_EXTRACT_REGEX
                .captures_iter(&caps[1])
                .map(|ts_caps| lrc_timestamp_ms(&ts_caps[1], &ts_caps[2], Some(&ts_caps[3])))
                .collect();
            match timestamps {
                Ok(timestamps) => entries.extend(timestamps.into_iter().map(|timestamp_ms| {
                    LrcLine {
                        timestamp_ms,
                        text: text.to_string(),
                    }
                })),
                Err(e) => {
                    log::warn!("[LRC 处理] 行 {}: {e}，已跳过", line_num + 1);
                }
            }
        } else if let Some(meta_caps) = LRC_METADATA_TAG_REGEX.captures(line_str) {
            metadata.push(LyricMetadata::new(&meta_caps[1], meta_caps[2].trim()));
        } else {
            log::debug!(
                "[LRC 处理] 行 {}: 跳过未识别的行: '{}'",
                line_num + 1,
                line_str
            );
        }
    }

    Ok((lrc_entries_to_lines(entries), metadata))
}

/// 在所有主轨道都不可用时，对看起来像逐行歌词的原文做尽力解读。
///
/// 除宽松的 LRC 时间戳外，也接受逐字歌词的行头 `[start,duration]`，
/// 这时会去掉其中的音节时间标记，只保留整行文本。
pub fn best_effort_line_timed(raw: &str) -> Vec<ParsedLine> {
    let mut entries: Vec<LrcLine> = Vec::new();

    for line_str in raw.lines().map(str::trim) {
        if let Some(caps) = LENIENT_LRC_LINE_REGEX.captures(line_str) {
            let text = caps[2].trim();
            if text.is_empty() {
                continue;
            }
            for ts_caps in LENIENT_TIMESTAMP_EXTRACT_REGEX.captures_iter(&caps[1]) {
                let fraction = ts_caps.get(3).map(|m| m.as_str());
                let Ok(timestamp_ms) = lrc_timestamp_ms(&ts_caps[1], &ts_caps[2], fraction) else {
                    continue;
                };
                entries.push(LrcLine {
                    timestamp_ms,
                    text: text.to_string(),
                });
            }
        } else if let Some(caps) = WORD_TIMED_HEADER_REGEX.captures(line_str) {
            let Ok(start_ms) = caps[1].parse::<u64>() else {
                continue;
            };
            let text = SYLLABLE_MARKER_REGEX.replace_all(&caps[3], "");
            let text = text.trim();
            if !text.is_empty() {
                entries.push(LrcLine {
                    timestamp_ms: start_ms,
                    text: text.to_string(),
                });
            }
        }
    }

    if !entries.is_empty() {
        log::info!("[LRC 处理] 尽力解读得到 {} 行歌词", entries.len());
    }
    lrc_entries_to_lines(entries)
}

/// `5` -> 500ms，`50` -> 500ms，`500` -> 500ms。
fn scale_fraction(fraction: &str) -> ConvertResult<u64> {
    let value: u64 = fraction.parse()?;
    Ok(match fraction.len() {
        1 => value * 100,
        2 => value * 10,
        _ => value,
    })
}

/// 由 分、秒、小数部分 计算毫秒时间，数值溢出时返回错误。
fn lrc_timestamp_ms(
    minutes: &str,
    seconds: &str,
    fraction: Option<&str>,
) -> ConvertResult<u64> {
    let minutes: u64 = minutes.parse()?;
    let seconds: u64 = seconds.parse()?;
    let milliseconds = fraction.map(scale_fraction).transpose()?.unwrap_or(0);
    minutes
        .checked_mul(60)
        .and_then(|total| total.checked_add(seconds))
        .and_then(|total| total.checked_mul(1000))
        .and_then(|total| total.checked_add(milliseconds))
        .ok_or_else(|| {
            ConvertError::InvalidTime(format!("时间戳 [{minutes}:{seconds}] 超出范围"))
        })
}

fn lrc_entries_to_lines(mut entries: Vec<LrcLine>) -> Vec<ParsedLine> {
    entries.sort_by_key(|entry| entry.timestamp_ms);

    let next_starts: Vec<u64> = entries
        .iter()
        .skip(1)
        .map(|entry| entry.timestamp_ms)
        .collect();

    entries
        .into_iter()
        .enumerate()
        .map(|(i, entry)| {
            let end_ms = next_starts
                .get(i)
                .copied()
                .unwrap_or(entry.timestamp_ms);
            ParsedLine::single(entry.text, entry.timestamp_ms, end_ms)
        })
        .collect()
}
