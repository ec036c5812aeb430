use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::LyricWord;

/// 插入在词之间的分隔符：一个不换行空格。
pub const SPACER_TEXT: &str = "\u{00A0}";

/// 中日文字（汉字、平假名、片假名），不含韩文。
static CJK_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\p{Han}\p{Hiragana}\p{Katakana}]").expect("未能编译 CJK_REGEX")
});

const PUNCTUATION_CHARS: &[char] = &[
    ',', '.', '!', '?', ';', ':', '"', '\'', '(', ')', '[', ']', '{', '}', '-', '…', '，', '。',
    '！', '？', '；', '：', '、', '“', '”', '‘', '’', '「', '」', '『', '』', '（', '）', '《', '》',
    '【', '】', '—', '～', '~', '·',
];

const PUNCTUATION_TOKENS: &[&str] = &["...", "……", "——", "--"];

pub fn contains_cjk(text: &str) -> bool {
    CJK_REGEX.is_match(text)
}

pub fn is_spacer(word: &LyricWord) -> bool {
    word.text == SPACER_TEXT && word.start_ms == 0 && word.end_ms == 0
}

fn is_punctuation_boundary(text: &str) -> bool {
    PUNCTUATION_TOKENS.contains(&text)
        || text.starts_with(PUNCTUATION_CHARS)
        || text.ends_with(PUNCTUATION_CHARS)
}

fn blocks_spacer(text: &str) -> bool {
    is_punctuation_boundary(text) || contains_cjk(text)
}

fn has_edge_space(text: &str) -> bool {
    text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace)
}

/// 去掉词两端的空白，丢弃空词，并在相邻的两个词之间按需插入分隔符。
///
/// 行内有任何词带首尾空白（或本身就是空白、分隔符）时，只在有空白的位置插入，
/// 这样同一个单词拆开的音节不会被分开；否则每两个相邻的词之间都插入。
/// 任一侧是标点（或以标点开头、结尾），或含有中日文字时不插入。
pub fn space_words(words: Vec<LyricWord>) -> Vec<LyricWord> {
    let marked = words.iter().any(|word| has_edge_space(&word.text));

    // (词, 与前一个词之间是否有空白)
    let mut trimmed: Vec<(LyricWord, bool)> = Vec::with_capacity(words.len());
    let mut pending_space = false;
    for word in words {
        let text = word.text.trim().to_string();
        if text.is_empty() {
            pending_space |= !word.text.is_empty();
            continue;
        }
        let space_before = pending_space || word.text.starts_with(char::is_whitespace);
        pending_space = word.text.ends_with(char::is_whitespace);
        trimmed.push((LyricWord { text, ..word }, space_before));
    }

    let mut spaced = Vec::with_capacity(trimmed.len() * 2);
    let mut iter = trimmed.into_iter().peekable();
    while let Some((word, _)) = iter.next() {
        let needs_spacer = iter.peek().is_some_and(|(next, space_before)| {
            (!marked || *space_before) && !blocks_spacer(&word.text) && !blocks_spacer(&next.text)
        });
        spaced.push(word);
        if needs_spacer {
            spaced.push(LyricWord::new(SPACER_TEXT, 0, 0));
        }
    }
    spaced
}
