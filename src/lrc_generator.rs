use std::fmt::Write as FmtWrite;

use crate::error::ConvertResult;
use crate::types::LyricLine;
use crate::word_spacer::is_spacer;

/// 毫秒转为 `[MM:SS.CC]`，精度截断到厘秒。
pub fn format_lrc_time_cs(ms: u64) -> String {
    let minutes = ms / 60_000;
    let seconds = (ms % 60_000) / 1000;
    let centiseconds = (ms % 1000) / 10;
    format!("[{minutes:02}:{seconds:02}.{centiseconds:02}]")
}

fn plain_text(line: &LyricLine) -> String {
    let text: String = line
        .words
        .iter()
        .map(|word| if is_spacer(word) { " " } else { word.text.as_str() })
        .collect();
    text.trim().to_string()
}

/// 把处理好的歌词行导出为 LRC 文本。
///
/// 需要时翻译和音译各占一行，与主歌词使用相同的时间戳，
/// 顺序为 主歌词、翻译、音译。空行不输出。
pub fn generate_lrc_from_lines(
    lines: &[LyricLine],
    include_translation: bool,
    include_transliteration: bool,
) -> ConvertResult<String> {
    let mut lrc_output = String::new();

    for line in lines {
        let text = plain_text(line);
        if text.is_empty() {
            continue;
        }
        let time_str = format_lrc_time_cs(line.start_ms);
        writeln!(lrc_output, "{time_str}{text}")?;

        if include_translation && !line.translation.trim().is_empty() {
            writeln!(lrc_output, "{time_str}{}", line.translation.trim())?;
        }
        if include_transliteration && !line.transliteration.trim().is_empty() {
            writeln!(lrc_output, "{time_str}{}", line.transliteration.trim())?;
        }
    }

    while lrc_output.ends_with('\n') {
        lrc_output.pop();
    }
    Ok(lrc_output)
}
