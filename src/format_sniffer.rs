use crate::types::WordTimedDialect;
use once_cell::sync::Lazy;
use regex::Regex;

/// YRC 独有的标记行：翻译块与合并标记。
const YRC_MARKERS: [&str; 3] = ["[x-trans", "[merge]", "{\"t\":"];

/// YRC 音节时间标记 `(start,duration,0)`。QRC 的音节标记只有两个数字。
static YRC_SYLLABLE_SHAPE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\]\(\d+,\d+,\d+\)").expect("未能编译 YRC_SYLLABLE_SHAPE_REGEX")
});

/// 尖括号三元组 `<offset,duration,flag>`。
static ANGLE_TRIPLET_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<\d+,\d+,\d+>").expect("未能编译 ANGLE_TRIPLET_REGEX"));

/// 判断逐字歌词文本属于哪种方言。
///
/// 先找 YRC 的标记，再找尖括号三元组；都没有时按 QRC 处理并记录一条警告。
/// 永远不会失败。
pub fn sniff_word_timed_dialect(text: &str) -> WordTimedDialect {
    if YRC_MARKERS.iter().any(|marker| text.contains(marker))
        || YRC_SYLLABLE_SHAPE_REGEX.is_match(text)
    {
        log::trace!("[FormatSniffer] 发现 YRC 标记");
        return WordTimedDialect::Yrc;
    }

    if ANGLE_TRIPLET_REGEX.is_match(text) {
        log::trace!("[FormatSniffer] 发现尖括号音节标记");
        return WordTimedDialect::Qrc;
    }

    log::warn!("[FormatSniffer] 无法确定逐字歌词格式，按 QRC 处理");
    WordTimedDialect::Qrc
}
