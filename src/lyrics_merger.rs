use log::{debug, error, info, trace, warn};
use strum_macros::Display;

use crate::aligner::{AlignTarget, align};
use crate::lrc_parser::{
    best_effort_line_timed, load_lrc_from_string, parse_time_map, time_map_to_lines,
};
use crate::settings::EngineSettings;
use crate::ttml_parser::parse_markup_payload;
use crate::types::{
    DisplaySettings, LrcContentType, LrcLine, LyricBundle, LyricLine, LyricWord, ParsedLine,
    PrimarySource,
};
use crate::word_timed::{flatten_to_lrc_lines, load_word_timed_from_string};

/// 辅助轨道最终采用的原始文本来自哪一组。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum AuxSource {
    WordTimed,
    LineTimed,
}

/// 一次合并的结果以及各轨道的来源。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub lines: Vec<LyricLine>,
    pub primary: PrimarySource,
    pub translation_source: Option<AuxSource>,
    pub transliteration_source: Option<AuxSource>,
}

/// 选择主轨道、对齐辅助轨道，组装最终的歌词行。
#[derive(Debug, Clone, Default)]
pub struct TimelineBuilder {
    settings: EngineSettings,
}

impl TimelineBuilder {
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn build(&self, bundle: &LyricBundle, display: &DisplaySettings) -> Vec<LyricLine> {
        self.build_detailed(bundle, display).lines
    }

    /// 与 [`TimelineBuilder::build`] 相同，同时报告每个轨道的来源。
    ///
    /// 没有任何可用的主轨道时返回两行占位歌词，永远不会返回空结果。
    pub fn build_detailed(&self, bundle: &LyricBundle, display: &DisplaySettings) -> MergeOutcome {
        let Some((primary, parsed_lines)) = select_primary(bundle, display) else {
            warn!("[LyricsMerger] 没有可用的主歌词轨道，使用占位歌词");
            return MergeOutcome {
                lines: placeholder_timeline(&self.settings),
                primary: PrimarySource::Placeholder,
                translation_source: None,
                transliteration_source: None,
            };
        };

        let (translations, translation_source) =
            self.resolve_aux(bundle, display, primary, &parsed_lines, LrcContentType::Translation);
        let (transliterations, transliteration_source) = self.resolve_aux(
            bundle,
            display,
            primary,
            &parsed_lines,
            LrcContentType::Romanization,
        );

        let next_starts: Vec<Option<u64>> = parsed_lines
            .iter()
            .skip(1)
            .map(|line| Some(line.anchor_ms()))
            .chain(std::iter::once(None))
            .collect();

        let lines: Vec<LyricLine> = parsed_lines
            .into_iter()
            .zip(next_starts)
            .zip(translations.into_iter().zip(transliterations))
            .map(|((parsed, next_start), (translation, transliteration))| {
                let start_ms = parsed.anchor_ms();
                let end_ms = self.line_end_ms(start_ms, next_start, &parsed.words);
                LyricLine {
                    start_ms,
                    end_ms,
                    words: parsed.words,
                    translation,
                    transliteration,
                    is_background: parsed.is_background.unwrap_or(false),
                    is_duet: parsed.is_duet.unwrap_or(false),
                }
            })
            .collect();

        info!(
            "[LyricsMerger] 合并完成。主轨道: {primary}, 行数: {}, 翻译来源: {translation_source:?}, 音译来源: {transliteration_source:?}",
            lines.len()
        );

        MergeOutcome {
            lines,
            primary,
            translation_source,
            transliteration_source,
        }
    }

    /// 结束时间取下一行的开始时间，没有下一行时取最后一个词的结束时间，再没有则取开始时间。
    fn line_end_ms(&self, start_ms: u64, next_start: Option<u64>, words: &[LyricWord]) -> u64 {
        let last_word_end = words.last().map(|w| w.end_ms);
        let mut end_ms = next_start.or(last_word_end).unwrap_or(start_ms);

        if end_ms < start_ms {
            trace!("[LyricsMerger] 行结束时间 {end_ms} 早于开始时间 {start_ms}，已修正");
            end_ms = last_word_end.map_or(start_ms, |w| w.max(start_ms));
        }
        if self.settings.min_line_span_ms > 0 && end_ms <= start_ms {
            end_ms = start_ms.saturating_add(self.settings.min_line_span_ms);
        }
        end_ms
    }

    /// 为每一行求出某种辅助文本。开关关闭时全部为空字符串。
    fn resolve_aux(
        &self,
        bundle: &LyricBundle,
        display: &DisplaySettings,
        primary: PrimarySource,
        lines: &[ParsedLine],
        kind: LrcContentType,
    ) -> (Vec<String>, Option<AuxSource>) {
        if !display.shows(kind) {
            return (vec![String::new(); lines.len()], None);
        }

        let candidates: &[AuxSource] = match primary {
            PrimarySource::LineTimed => &[AuxSource::LineTimed],
            _ => &[AuxSource::WordTimed, AuxSource::LineTimed],
        };

        let mut source = None;
        let mut aux_lines: Vec<LrcLine> = Vec::new();
        for &candidate in candidates {
            let raw = match candidate {
                AuxSource::WordTimed => bundle.word_timed.aux(kind),
                AuxSource::LineTimed => bundle.line_timed.aux(kind),
            };
            let Some(raw) = raw else {
                continue;
            };
            let parsed = parse_aux_payload(raw, kind);
            if parsed.is_empty() {
                warn!("[LyricsMerger] {candidate} 的 {kind} 轨道没有可用的行，尝试下一个来源");
                continue;
            }
            source = Some(candidate);
            aux_lines = parsed;
            break;
        }

        let targets: Vec<AlignTarget<'_>> = lines
            .iter()
            .map(|line| AlignTarget::new(line.anchor_ms()).with_inline(line.inline_aux(kind)))
            .collect();

        if source.is_some() && aux_lines.len() != lines.len() {
            debug!(
                "[LyricsMerger] {kind} 行数 ({}) 与主歌词 ({}) 不一致，按时间匹配",
                aux_lines.len(),
                lines.len()
            );
        }

        (
            align(&targets, &aux_lines, self.settings.alignment_tolerance_ms),
            source,
        )
    }
}

/// 依次尝试 标记格式 > 逐字歌词（开关开启时） > 逐行歌词 > 尽力解读。
fn select_primary(
    bundle: &LyricBundle,
    display: &DisplaySettings,
) -> Option<(PrimarySource, Vec<ParsedLine>)> {
    if bundle.has_markup() {
        let raw = bundle.markup_timed.as_deref().unwrap_or_default();
        match parse_markup_payload(raw) {
            Ok((lines, _)) if !lines.is_empty() => return Some((PrimarySource::Markup, lines)),
            Ok(_) => warn!("[LyricsMerger] 标记格式歌词没有可用的行"),
            Err(e) => error!("[LyricsMerger] 解析标记格式歌词失败: {e}"),
        }
    }

    if display.show_word_timed {
        if let Some(raw) = bundle.word_timed.primary() {
            match load_word_timed_from_string(raw) {
                Ok((dialect, lines, _)) if !lines.is_empty() => {
                    return Some((PrimarySource::WordTimed(dialect), lines));
                }
                Ok((dialect, _, _)) => warn!("[LyricsMerger] {dialect} 逐字歌词没有可用的行"),
                Err(e) => error!("[LyricsMerger] 解析逐字歌词失败: {e}"),
            }
        }
    }

    if let Some(raw) = bundle.line_timed.primary() {
        match load_lrc_from_string(raw) {
            Ok((lines, _)) if !lines.is_empty() => return Some((PrimarySource::LineTimed, lines)),
            Ok(_) => warn!("[LyricsMerger] 逐行歌词没有可用的行"),
            Err(e) => error!("[LyricsMerger] 解析逐行歌词失败: {e}"),
        }
    }

    bundle
        .raw_texts()
        .filter(|raw| raw.contains('[') && raw.contains(']'))
        .map(best_effort_line_timed)
        .find(|lines| !lines.is_empty())
        .map(|lines| {
            info!("[LyricsMerger] 使用尽力解读得到的逐行歌词");
            (PrimarySource::BestEffort, lines)
        })
}

/// 把辅助歌词文本解析为 (时间, 文本) 序列。
///
/// 先按严格的 `[MM:SS.CC]` 时间映射读取，失败后按普通 LRC 读取，
/// 仍然没有结果时判断逐字歌词方言并按行展平。
pub(crate) fn parse_aux_payload(raw: &str, kind: LrcContentType) -> Vec<LrcLine> {
    let time_map = parse_time_map(raw);
    if !time_map.is_empty() {
        return time_map_to_lines(&time_map);
    }

    match load_lrc_from_string(raw) {
        Ok((lines, _)) if !lines.is_empty() => return flatten_to_lrc_lines(&lines),
        Ok(_) => {}
        Err(e) => debug!("[LyricsMerger] {kind} 轨道不是 LRC: {e}"),
    }

    match load_word_timed_from_string(raw) {
        Ok((_, lines, _)) => flatten_to_lrc_lines(&lines),
        Err(e) => {
            error!("[LyricsMerger] 解析 {kind} 轨道失败: {e}");
            Vec::new()
        }
    }
}

/// 两行占位歌词：一行在 0ms，一行在远超歌曲长度的时间点。
pub fn placeholder_timeline(settings: &EngineSettings) -> Vec<LyricLine> {
    let sentinel = settings.placeholder_sentinel_ms;
    let [title, subtitle] = &settings.placeholder_texts;
    vec![
        LyricLine {
            start_ms: 0,
            end_ms: sentinel,
            words: vec![LyricWord::new(title.as_str(), 0, sentinel)],
            ..Default::default()
        },
        LyricLine {
            start_ms: sentinel,
            end_ms: sentinel,
            words: vec![LyricWord::new(subtitle.as_str(), sentinel, sentinel)],
            ..Default::default()
        },
    ]
}
