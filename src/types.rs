use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum_macros::Display;

/// 一个带时间的最小单位（词或音节）。
///
/// 上游提供的数据并不保证 `end_ms >= start_ms`，这里不做校验，由合并器在行级别修正。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LyricWord {
    #[serde(alias = "word")]
    pub text: String,
    #[serde(rename = "startTime")]
    pub start_ms: u64,
    #[serde(rename = "endTime")]
    pub end_ms: u64,
}

impl LyricWord {
    pub fn new(text: impl Into<String>, start_ms: u64, end_ms: u64) -> Self {
        Self {
            text: text.into(),
            start_ms,
            end_ms,
        }
    }
}

/// 各轨道解析器输出的中间行。
///
/// 行级时间和附加信息都是可选的：逐行歌词只有一个词，逐字歌词可能没有行级时间，
/// 标记格式（TTML）则可能自带每行的翻译和音译。
/// 字段名兼容获取层预解析后以 JSON 传入的行结构。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedLine {
    #[serde(default, rename = "startTime")]
    pub start_ms: Option<u64>,
    #[serde(default, rename = "endTime")]
    pub end_ms: Option<u64>,
    #[serde(default)]
    pub words: Vec<LyricWord>,
    #[serde(default, rename = "translatedLyric")]
    pub translation: Option<String>,
    #[serde(default, rename = "romanLyric")]
    pub transliteration: Option<String>,
    #[serde(default, rename = "isBG")]
    pub is_background: Option<bool>,
    #[serde(default, rename = "isDuet")]
    pub is_duet: Option<bool>,
}

impl ParsedLine {
    /// 由单个词构成的逐行歌词行。
    pub fn single(text: impl Into<String>, start_ms: u64, end_ms: u64) -> Self {
        Self {
            start_ms: Some(start_ms),
            end_ms: Some(end_ms),
            words: vec![LyricWord::new(text, start_ms, end_ms)],
            ..Default::default()
        }
    }

    /// 对齐时使用的锚点时间：优先行级开始时间，其次第一个词的开始时间。
    pub fn anchor_ms(&self) -> u64 {
        self.start_ms
            .or_else(|| self.words.first().map(|w| w.start_ms))
            .unwrap_or(0)
    }

    pub fn text(&self) -> String {
        self.words.iter().map(|w| w.text.as_str()).collect()
    }

    pub fn has_text(&self) -> bool {
        self.words.iter().any(|w| !w.text.trim().is_empty())
    }

    /// 行内预填充的辅助文本，空字符串视为不存在。
    pub fn inline_aux(&self, kind: LrcContentType) -> Option<&str> {
        let value = match kind {
            LrcContentType::Translation => self.translation.as_deref(),
            LrcContentType::Romanization => self.transliteration.as_deref(),
        };
        value.map(str::trim).filter(|s| !s.is_empty())
    }
}

/// 交给渲染层的最终歌词行。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LyricLine {
    #[serde(rename = "startTime")]
    pub start_ms: u64,
    #[serde(rename = "endTime")]
    pub end_ms: u64,
    pub words: Vec<LyricWord>,
    #[serde(rename = "translatedLyric")]
    pub translation: String,
    #[serde(rename = "romanLyric")]
    pub transliteration: String,
    #[serde(rename = "isBG")]
    pub is_background: bool,
    #[serde(rename = "isDuet")]
    pub is_duet: bool,
}

impl LyricLine {
    pub fn text(&self) -> String {
        self.words.iter().map(|w| w.text.as_str()).collect()
    }
}

/// LRC 中的一行：时间戳及其文本。辅助轨道（翻译、音译）对齐时也使用这个结构。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LrcLine {
    pub timestamp_ms: u64,
    pub text: String,
}

/// 毫秒时间戳到行文本的有序映射。
pub type TimeMap = BTreeMap<u64, String>;

/// 解析器附带产出的元数据键值对，核心流程不使用它们。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LyricMetadata {
    pub key: String,
    pub value: String,
}

impl LyricMetadata {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// 辅助歌词的种类。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum LrcContentType {
    Translation,
    Romanization,
}

/// 逐字歌词的两种方言。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum WordTimedDialect {
    /// `[start,duration](start,duration,0)字` 形式，带 `[x-trans]`/`[merge]` 等标记。
    Yrc,
    /// `[start,duration]字(start,duration)` 或 `<offset,duration,0>字` 形式。
    Qrc,
}

/// 最终时间轴所采用的主轨道来源。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum PrimarySource {
    Markup,
    WordTimed(WordTimedDialect),
    LineTimed,
    /// 所有主轨道都失败后，从看起来像逐行歌词的原文中尽力恢复。
    BestEffort,
    Placeholder,
}

/// 同一种格式下的一组原始文本：主歌词、翻译、音译，任意一项都可能缺失。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTrackSet {
    pub primary: Option<String>,
    pub translation: Option<String>,
    pub transliteration: Option<String>,
}

impl RawTrackSet {
    pub fn aux(&self, kind: LrcContentType) -> Option<&str> {
        let value = match kind {
            LrcContentType::Translation => self.translation.as_deref(),
            LrcContentType::Romanization => self.transliteration.as_deref(),
        };
        non_blank(value)
    }

    pub fn primary(&self) -> Option<&str> {
        non_blank(self.primary.as_deref())
    }

    pub fn is_empty(&self) -> bool {
        self.primary().is_none()
            && self.aux(LrcContentType::Translation).is_none()
            && self.aux(LrcContentType::Romanization).is_none()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.trim().is_empty())
}

/// 歌词元数据，仅供获取层判断是否需要向备用来源查询，核心流程不依赖它。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LyricMeta {
    #[serde(default)]
    pub found: bool,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub available_formats: Vec<String>,
    #[serde(default)]
    pub has_translation: bool,
    #[serde(default)]
    pub has_romaji: bool,
    #[serde(default)]
    pub source: Option<String>,
}

impl LyricMeta {
    pub fn needs_secondary_lookup(&self) -> bool {
        !self.found
    }
}

/// 一首歌的全部歌词数据，在各处理阶段之间传递。
///
/// 每次获取歌曲时创建一次，切歌时整体丢弃而不是原地复用。
/// 处理结果缓存在 bundle 自己身上（`processed_lines` 与 `settings_fingerprint`），
/// 对同一个 bundle 的重新计算需要调用方串行化，`&mut` 借用保证了这一点。
#[derive(Debug, Clone, Default)]
pub struct LyricBundle {
    pub line_timed: RawTrackSet,
    pub word_timed: RawTrackSet,
    pub markup_timed: Option<String>,
    pub meta: Option<LyricMeta>,
    pub(crate) processed_lines: Vec<LyricLine>,
    pub(crate) settings_fingerprint: Option<String>,
}

impl LyricBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_line_timed(
        mut self,
        primary: Option<&str>,
        translation: Option<&str>,
        transliteration: Option<&str>,
    ) -> Self {
        self.line_timed = RawTrackSet {
            primary: primary.map(str::to_string),
            translation: translation.map(str::to_string),
            transliteration: transliteration.map(str::to_string),
        };
        self
    }

    pub fn with_word_timed(
        mut self,
        primary: Option<&str>,
        translation: Option<&str>,
        transliteration: Option<&str>,
    ) -> Self {
        self.word_timed = RawTrackSet {
            primary: primary.map(str::to_string),
            translation: translation.map(str::to_string),
            transliteration: transliteration.map(str::to_string),
        };
        self
    }

    pub fn with_markup(mut self, markup: &str) -> Self {
        self.markup_timed = Some(markup.to_string());
        self
    }

    pub fn has_markup(&self) -> bool {
        non_blank(self.markup_timed.as_deref()).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.line_timed.is_empty() && self.word_timed.is_empty() && !self.has_markup()
    }

    /// 所有原始文本，用于兜底时的逐行重新解读。顺序即尝试顺序。
    pub(crate) fn raw_texts(&self) -> impl Iterator<Item = &str> {
        [
            self.line_timed.primary(),
            self.word_timed.primary(),
            non_blank(self.markup_timed.as_deref()),
        ]
        .into_iter()
        .flatten()
    }

    pub fn processed_lines(&self) -> &[LyricLine] {
        &self.processed_lines
    }

    pub fn settings_fingerprint(&self) -> Option<&str> {
        self.settings_fingerprint.as_deref()
    }

    /// 丢弃缓存的处理结果，下一次取用时会重新计算。
    pub fn invalidate(&mut self) {
        self.processed_lines.clear();
        self.settings_fingerprint = None;
    }
}

/// 影响最终显示内容的用户设置。每次计算时不可变，变化通过指纹比较使缓存失效。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplaySettings {
    pub show_word_timed: bool,
    pub show_transliteration: bool,
    pub show_translation: bool,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            show_word_timed: true,
            show_transliteration: false,
            show_translation: true,
        }
    }
}

impl DisplaySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_word_timed(mut self, show: bool) -> Self {
        self.show_word_timed = show;
        self
    }

    pub fn with_transliteration(mut self, show: bool) -> Self {
        self.show_transliteration = show;
        self
    }

    pub fn with_translation(mut self, show: bool) -> Self {
        self.show_translation = show;
        self
    }

    pub fn shows(&self, kind: LrcContentType) -> bool {
        match kind {
            LrcContentType::Translation => self.show_translation,
            LrcContentType::Romanization => self.show_transliteration,
        }
    }

    /// 按固定顺序拼接三个开关。顺序敏感，不是语义哈希。
    pub fn fingerprint(&self) -> String {
        format!(
            "{}-{}-{}",
            self.show_word_timed, self.show_transliteration, self.show_translation
        )
    }
}
