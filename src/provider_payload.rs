//! 歌词提供方返回的 JSON 结构，以及到 [`LyricBundle`] 的转换。

use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::types::{LyricBundle, LyricMeta, RawTrackSet};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LyricText {
    #[serde(default)]
    pub lyric: String,
}

/// 经典接口的歌词响应：逐行与逐字歌词各带一组翻译、音译。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeteaseLyricResponse {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub lrc: Option<LyricText>,
    #[serde(default)]
    pub tlyric: Option<LyricText>,
    #[serde(default)]
    pub romalrc: Option<LyricText>,
    #[serde(default)]
    pub yrc: Option<LyricText>,
    #[serde(default)]
    pub ytlrc: Option<LyricText>,
    #[serde(default)]
    pub yromalrc: Option<LyricText>,
}

impl NeteaseLyricResponse {
    fn has_lyrics(&self) -> bool {
        [&self.lrc, &self.tlyric, &self.yrc]
            .into_iter()
            .flatten()
            .any(|text| !text.lyric.trim().is_empty())
    }

    /// 带有歌词数据时即视为成功，否则要求 `code == 200`。
    pub fn is_success(&self) -> bool {
        self.has_lyrics() || self.code == Some(200)
    }
}

fn lyric_of(text: &Option<LyricText>) -> Option<String> {
    text.as_ref()
        .map(|t| t.lyric.clone())
        .filter(|lyric| !lyric.trim().is_empty())
}

impl From<NeteaseLyricResponse> for LyricBundle {
    fn from(response: NeteaseLyricResponse) -> Self {
        if !response.is_success() {
            log::warn!(
                "[ProviderPayload] 歌词响应失败或没有数据 (code: {:?})",
                response.code
            );
            return LyricBundle::new();
        }
        LyricBundle {
            line_timed: RawTrackSet {
                primary: lyric_of(&response.lrc),
                translation: lyric_of(&response.tlyric),
                transliteration: lyric_of(&response.romalrc),
            },
            word_timed: RawTrackSet {
                primary: lyric_of(&response.yrc),
                translation: lyric_of(&response.ytlrc),
                transliteration: lyric_of(&response.yromalrc),
            },
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum AtlasFormat {
    Lrc,
    Qrc,
    Yrc,
    Ttml,
    #[default]
    #[serde(other)]
    Other,
}

/// 聚合接口的歌词响应：一份主歌词，格式由 `format` 指明，翻译与音译均为逐行歌词。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LyricAtlasResponse {
    #[serde(default)]
    pub found: bool,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub format: AtlasFormat,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub translation: Option<String>,
    #[serde(default)]
    pub romaji: Option<String>,
}

impl LyricAtlasResponse {
    /// 转换为 bundle 并附上元数据。
    pub fn into_bundle_with_meta(self, meta: Option<LyricMeta>) -> LyricBundle {
        let mut bundle = LyricBundle::from(self);
        bundle.meta = meta;
        bundle
    }
}

impl From<LyricAtlasResponse> for LyricBundle {
    fn from(response: LyricAtlasResponse) -> Self {
        let content = response
            .content
            .filter(|content| !content.trim().is_empty());
        let Some(content) = content.filter(|_| response.found) else {
            log::warn!("[ProviderPayload] 聚合接口没有找到歌词 (id: {})", response.id);
            return LyricBundle::new();
        };

        log::debug!(
            "[ProviderPayload] 聚合接口返回 {} 格式歌词，来源: {:?}",
            response.format,
            response.source
        );

        let mut bundle = LyricBundle {
            line_timed: RawTrackSet {
                primary: None,
                translation: response.translation,
                transliteration: response.romaji,
            },
            ..Default::default()
        };
        match response.format {
            AtlasFormat::Qrc | AtlasFormat::Yrc => bundle.word_timed.primary = Some(content),
            AtlasFormat::Ttml => bundle.markup_timed = Some(content),
            AtlasFormat::Lrc | AtlasFormat::Other => bundle.line_timed.primary = Some(content),
        }
        bundle
    }
}
