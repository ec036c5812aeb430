use std::collections::HashMap;

use quick_xml::Reader;
use quick_xml::encoding::Decoder;
use quick_xml::events::{BytesStart, Event};

use crate::error::{ConvertError, ConvertResult};
use crate::types::{LyricMetadata, LyricWord, ParsedLine};
use crate::word_timed::{normalize_syllable_text, push_syllable};

/// 获取层把已经解析好的歌词行序列化为 JSON 时使用的前缀。
pub const PARSED_LYRIC_LINES_PREFIX: &str = "___PARSED_LYRIC_LINES___";

type ParseMarkupResult = ConvertResult<(Vec<ParsedLine>, Vec<LyricMetadata>)>;

/// 解析 TTML 中各种格式的时间字符串，并统一转换为毫秒。
///
/// 支持 `HH:MM:SS.mmm`、`MM:SS.mmm`、`SS.mmm` 以及带 `s` 后缀的秒数（`12.5s`），
/// 小数部分可以是 1 到 3 位。
pub fn parse_ttml_time_ms(time_str: &str) -> ConvertResult<u64> {
    let trimmed = time_str.trim();
    let body = trimmed.strip_suffix('s').unwrap_or(trimmed);
    let invalid = || ConvertError::InvalidTime(format!("无法解析时间戳 '{time_str}'"));

    let colon_parts: Vec<&str> = body.split(':').collect();
    if colon_parts.is_empty() || colon_parts.len() > 3 {
        return Err(invalid());
    }

    let (sec_part, prefix) = colon_parts.split_last().ok_or_else(invalid)?;
    let (seconds_str, fraction_str) = match sec_part.split_once('.') {
        Some((s, f)) => (s, Some(f)),
        None => (*sec_part, None),
    };

    let mut total_seconds: u64 = 0;
    for part in prefix.iter().chain(std::iter::once(&seconds_str)) {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        total_seconds = total_seconds
            .checked_mul(60)
            .and_then(|total| total.checked_add(part.parse().ok()?))
            .ok_or_else(invalid)?;
    }

    let milliseconds = match fraction_str {
        None => 0,
        Some(f) if !f.is_empty() && f.len() <= 3 && f.bytes().all(|b| b.is_ascii_digit()) => {
            let value: u64 = f.parse()?;
            match f.len() {
                1 => value * 100,
                2 => value * 10,
                _ => value,
            }
        }
        Some(_) => return Err(invalid()),
    };

    total_seconds
        .checked_mul(1000)
        .and_then(|total| total.checked_add(milliseconds))
        .ok_or_else(invalid)
}

/// 解析标记格式的歌词载荷。
///
/// 以 [`PARSED_LYRIC_LINES_PREFIX`] 开头时按预解析的 JSON 行处理，否则按 TTML 解析。
pub fn parse_markup_payload(payload: &str) -> ParseMarkupResult {
    let trimmed = payload.trim_start();
    if let Some(json) = trimmed.strip_prefix(PARSED_LYRIC_LINES_PREFIX) {
        let parsed: Vec<ParsedLine> = serde_json::from_str(json)?;
        let lines: Vec<ParsedLine> = parsed.into_iter().filter_map(normalize_parsed_line).collect();
        log::debug!("[TTML 解析] 读取到 {} 行预解析歌词", lines.len());
        return Ok((lines, Vec::new()));
    }
    parse_ttml_from_string(payload)
}

fn normalize_parsed_line(mut line: ParsedLine) -> Option<ParsedLine> {
    let mut words = Vec::with_capacity(line.words.len());
    for word in std::mem::take(&mut line.words) {
        push_syllable(&mut words, &word.text, word.start_ms, word.end_ms);
    }
    line.words = words;
    (!line.words.is_empty()).then_some(line)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpanRole {
    Word,
    Translation,
    Romanization,
    Background,
}

#[derive(Debug)]
struct SpanContext {
    role: SpanRole,
    begin_ms: Option<u64>,
    end_ms: Option<u64>,
    text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WordTarget {
    Main,
    Background,
}

#[derive(Debug, Default)]
struct ParagraphState {
    main: ParsedLine,
    background: Option<ParsedLine>,
}

impl ParagraphState {
    fn target_mut(&mut self, target: WordTarget) -> &mut ParsedLine {
        match target {
            WordTarget::Main => &mut self.main,
            WordTarget::Background => self.background.get_or_insert_with(ParsedLine::default),
        }
    }
}

fn read_attributes(e: &BytesStart, decoder: Decoder) -> ConvertResult<HashMap<String, String>> {
    let mut attrs = HashMap::new();
    for attr_res in e.attributes() {
        let attr = attr_res?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr.decode_and_unescape_value(decoder)?.into_owned();
        attrs.insert(key, value);
    }
    Ok(attrs)
}

fn optional_time(attrs: &HashMap<String, String>, key: &str) -> ConvertResult<Option<u64>> {
    attrs
        .get(key)
        .map(|value| parse_ttml_time_ms(value))
        .transpose()
}

fn append_aux(slot: &mut Option<String>, text: &str) {
    let text = text.trim();
    if text.is_empty() {
        return;
    }
    match slot {
        Some(existing) if !existing.is_empty() => {
            existing.push(' ');
            existing.push_str(text);
        }
        _ => *slot = Some(text.to_string()),
    }
}

/// 解析 TTML 歌词。
///
/// 每个 `<p>` 产出一行，`x-bg` 背景人声作为紧随其后的独立行。
/// 与第一个出现的演唱者不同的 `ttm:agent` 行标记为对唱。
/// XML 结构或时间戳错误会作为 `ConvertError` 返回。
pub fn parse_ttml_from_string(ttml_content: &str) -> ParseMarkupResult {
    let mut reader = Reader::from_str(ttml_content);
    reader.config_mut().trim_text(false);

    let mut lines: Vec<ParsedLine> = Vec::new();
    let mut metadata: Vec<LyricMetadata> = Vec::new();
    let mut first_agent: Option<String> = None;
    let mut paragraph: Option<ParagraphState> = None;
    let mut span_stack: Vec<SpanContext> = Vec::new();
    let mut last_word_target: Option<WordTarget> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let local_name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                let attrs = read_attributes(&e, reader.decoder())?;
                match local_name.as_str() {
                    "p" => {
                        let agent = attrs.get("agent").cloned();
                        let is_duet = match (&agent, &first_agent) {
                            (Some(agent), Some(first)) => agent != first,
                            (Some(agent), None) => {
                                first_agent = Some(agent.clone());
                                false
                            }
                            (None, _) => false,
                        };
                        paragraph = Some(ParagraphState {
                            main: ParsedLine {
                                start_ms: optional_time(&attrs, "begin")?,
                                end_ms: optional_time(&attrs, "end")?,
                                is_duet: Some(is_duet),
                                ..Default::default()
                            },
                            background: None,
                        });
                        span_stack.clear();
                        last_word_target = None;
                    }
                    "span" if paragraph.is_some() => {
                        let role = match attrs.get("role").map(String::as_str) {
                            Some("x-translation") => SpanRole::Translation,
                            Some("x-roman") => SpanRole::Romanization,
                            Some("x-bg") => SpanRole::Background,
                            _ => SpanRole::Word,
                        };
                        let begin_ms = optional_time(&attrs, "begin")?;
                        let end_ms = optional_time(&attrs, "end")?;
                        if role == SpanRole::Background {
                            if let Some(state) = paragraph.as_mut() {
                                let is_duet = state.main.is_duet;
                                let bg = state.target_mut(WordTarget::Background);
                                bg.start_ms = bg.start_ms.or(begin_ms);
                                bg.end_ms = bg.end_ms.or(end_ms);
                                bg.is_background = Some(true);
                                bg.is_duet = is_duet;
                            }
                            last_word_target = None;
                        }
                        span_stack.push(SpanContext {
                            role,
                            begin_ms,
                            end_ms,
                            text: String::new(),
                        });
                    }
                    "agent" => {
                        if let Some(id) = attrs.get("id") {
                            metadata.push(LyricMetadata::new("agent", id.as_str()));
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Empty(e)) => {
                let local_name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                match local_name.as_str() {
                    "meta" => {
                        let attrs = read_attributes(&e, reader.decoder())?;
                        if let (Some(key), Some(value)) = (attrs.get("key"), attrs.get("value")) {
                            metadata.push(LyricMetadata::new(key.as_str(), value.as_str()));
                        }
                    }
                    "agent" => {
                        let attrs = read_attributes(&e, reader.decoder())?;
                        if let Some(id) = attrs.get("id") {
                            metadata.push(LyricMetadata::new("agent", id.as_str()));
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(e_text)) => {
                let text_cow = e_text.unescape()?;
                let text_str = text_cow.as_ref();
                let Some(state) = paragraph.as_mut() else {
                    continue;
                };

                let inside_text_span = span_stack
                    .last()
                    .is_some_and(|ctx| ctx.role != SpanRole::Background);
                if inside_text_span {
                    if let Some(ctx) = span_stack.last_mut() {
                        ctx.text.push_str(text_str);
                    }
                } else if text_str.trim().is_empty() {
                    // 音节之间的空白记为前一个词末尾的空格
                    if let Some(target) = last_word_target {
                        if let Some(last) = state.target_mut(target).words.last_mut() {
                            if !last.text.ends_with(' ') {
                                last.text.push(' ');
                            }
                        }
                    }
                } else if span_stack.is_empty() {
                    // 文本直接写在 <p> 里，视为覆盖整行的一个词
                    let start = state.main.start_ms.unwrap_or(0);
                    let end = state.main.end_ms.unwrap_or(start);
                    if let Some(text) = normalize_syllable_text(text_str) {
                        state.main.words.push(LyricWord::new(text, start, end));
                        last_word_target = Some(WordTarget::Main);
                    }
                }
            }
            Ok(Event::End(e)) => {
                let local_name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                match local_name.as_str() {
                    "span" => {
                        let Some(ctx) = span_stack.pop() else {
                            continue;
                        };
                        let Some(state) = paragraph.as_mut() else {
                            continue;
                        };
                        let target = if span_stack.iter().any(|c| c.role == SpanRole::Background) {
                            WordTarget::Background
                        } else {
                            WordTarget::Main
                        };
                        match ctx.role {
                            SpanRole::Word => {
                                let line = state.target_mut(target);
                                let start = ctx.begin_ms.or(line.start_ms).unwrap_or(0);
                                let end = ctx.end_ms.or(line.end_ms).unwrap_or(start);
                                if let Some(text) = normalize_syllable_text(&ctx.text) {
                                    line.words.push(LyricWord::new(text, start, end));
                                    last_word_target = Some(target);
                                }
                            }
                            SpanRole::Translation => {
                                append_aux(&mut state.target_mut(target).translation, &ctx.text);
                                last_word_target = None;
                            }
                            SpanRole::Romanization => {
                                append_aux(
                                    &mut state.target_mut(target).transliteration,
                                    &ctx.text,
                                );
                                last_word_target = None;
                            }
                            SpanRole::Background => last_word_target = None,
                        }
                    }
                    "p" => {
                        if let Some(state) = paragraph.take() {
                            if !state.main.words.is_empty() {
                                lines.push(state.main);
                            }
                            if let Some(bg) = state.background {
                                if !bg.words.is_empty() {
                                    lines.push(bg);
                                }
                            }
                        }
                        span_stack.clear();
                        last_word_target = None;
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                log::error!(
                    "[TTML 解析] XML 读取错误，位置 {}: {e}",
                    reader.buffer_position()
                );
                return Err(ConvertError::Xml(e));
            }
            _ => {}
        }
    }

    log::debug!("[TTML 解析] 解析得到 {} 行歌词", lines.len());
    Ok((lines, metadata))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time_formats() {
        assert_eq!(parse_ttml_time_ms("00:01.5").unwrap(), 1500);
        assert_eq!(parse_ttml_time_ms("1:02.345").unwrap(), 62_345);
        assert_eq!(parse_ttml_time_ms("01:00:00.00").unwrap(), 3_600_000);
        assert_eq!(parse_ttml_time_ms("12.5s").unwrap(), 12_500);
        assert_eq!(parse_ttml_time_ms("7").unwrap(), 7000);
        assert!(parse_ttml_time_ms("a:b").is_err());
        assert!(parse_ttml_time_ms("1.2345").is_err());
        assert!(parse_ttml_time_ms("").is_err());
    }

    #[test]
    fn test_out_of_range_clock_is_invalid_time() {
        for value in [
            "18446744073709551615",
            "99999999999999999999999.5",
            "307445734561825861:00.000",
            "5124095576030431:00:00",
        ] {
            assert!(
                matches!(parse_ttml_time_ms(value), Err(ConvertError::InvalidTime(_))),
                "{value}"
            );
        }
    }

    const SAMPLE_TTML: &str = r#"<tt xmlns="http://www.w3.org/ns/ttml" xmlns:ttm="http://www.w3.org/ns/ttml#metadata" xmlns:amll="http://www.example.com/ns/amll">
<head><metadata><ttm:agent type="person" xml:id="v1"/><ttm:agent type="other" xml:id="v2"/><amll:meta key="musicName" value="Song"/></metadata></head>
<body><div>
<p begin="00:01.000" end="00:03.000" ttm:agent="v1"><span begin="00:01.000" end="00:01.500">Hello</span> <span begin="00:01.500" end="00:02.000">world</span><span ttm:role="x-translation" xml:lang="zh">你好 世界</span><span ttm:role="x-roman">ni hao</span><span ttm:role="x-bg"><span begin="00:02.000" end="00:02.500">(oh)</span><span ttm:role="x-translation">哦</span></span></p>
<p begin="00:04.000" end="00:05.000" ttm:agent="v2"><span begin="00:04.000" end="00:05.000">Reply</span></p>
<p begin="00:06.000" end="00:07.000"></p>
</div></body></tt>"#;

    #[test]
    fn test_parse_ttml_lines_aux_and_background() {
        let (lines, metadata) = parse_ttml_from_string(SAMPLE_TTML).unwrap();
        assert_eq!(lines.len(), 3);

        let first = &lines[0];
        assert_eq!(first.start_ms, Some(1000));
        assert_eq!(first.words.len(), 2);
        assert_eq!(first.words[0].text, "Hello ");
        assert_eq!(first.words[1], LyricWord::new("world", 1500, 2000));
        assert_eq!(first.translation.as_deref(), Some("你好 世界"));
        assert_eq!(first.transliteration.as_deref(), Some("ni hao"));
        assert_eq!(first.is_duet, Some(false));

        let bg = &lines[1];
        assert_eq!(bg.is_background, Some(true));
        assert_eq!(bg.text(), "(oh)");
        assert_eq!(bg.translation.as_deref(), Some("哦"));

        assert_eq!(lines[2].is_duet, Some(true));
        assert!(metadata.contains(&LyricMetadata::new("musicName", "Song")));
        assert!(metadata.contains(&LyricMetadata::new("agent", "v2")));
    }

    #[test]
    fn test_bad_time_is_typed_error() {
        let ttml = r#"<tt><body><div><p begin="oops" end="1"><span>x</span></p></div></body></tt>"#;
        assert!(matches!(
            parse_ttml_from_string(ttml),
            Err(ConvertError::InvalidTime(_))
        ));
    }

    #[test]
    fn test_prefetched_json_payload() {
        let payload = format!(
            "{PARSED_LYRIC_LINES_PREFIX}{}",
            r#"[{"startTime":1000,"words":[{"word":" a ","startTime":1000,"endTime":1200}],"translatedLyric":"一"},{"words":[{"word":"  ","startTime":0,"endTime":0}]}]"#
        );
        let (lines, metadata) = parse_markup_payload(&payload).unwrap();
        assert!(metadata.is_empty());
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].words[0].text, " a ");
        assert_eq!(lines[0].translation.as_deref(), Some("一"));
    }

    #[test]
    fn test_prefetched_whitespace_word_joins_previous() {
        let payload = format!(
            "{PARSED_LYRIC_LINES_PREFIX}{}",
            r#"[{"words":[{"word":"Hel","startTime":0,"endTime":100},{"word":"lo","startTime":100,"endTime":200},{"word":" ","startTime":200,"endTime":200},{"word":"world","startTime":200,"endTime":300}]}]"#
        );
        let (lines, _) = parse_markup_payload(&payload).unwrap();
        let texts: Vec<&str> = lines[0].words.iter().map(|w| w.text.as_str()).collect();
        assert_eq!(texts, vec!["Hel", "lo ", "world"]);
    }

    #[test]
    fn test_broken_json_payload_is_error() {
        let payload = format!("{PARSED_LYRIC_LINES_PREFIX}[{{");
        assert!(matches!(
            parse_markup_payload(&payload),
            Err(ConvertError::Json(_))
        ));
    }
}
