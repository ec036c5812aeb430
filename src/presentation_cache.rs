//! 按显示设置缓存处理好的歌词行。
//!
//! 缓存放在 [`LyricBundle`] 自身上，而不是模块级的全局状态。

use std::time::Instant;

use crate::lyrics_merger::TimelineBuilder;
use crate::types::{DisplaySettings, LyricBundle, LyricLine};
use crate::word_spacer::space_words;

/// 把一个 bundle 在给定设置下处理成最终的歌词行。
pub trait LineProcessor {
    fn process(&self, bundle: &LyricBundle, settings: &DisplaySettings) -> Vec<LyricLine>;
}

impl LineProcessor for TimelineBuilder {
    /// 合并后对每一行的词插入分隔符。
    fn process(&self, bundle: &LyricBundle, settings: &DisplaySettings) -> Vec<LyricLine> {
        self.build(bundle, settings)
            .into_iter()
            .map(|line| LyricLine {
                words: space_words(line.words),
                ..line
            })
            .collect()
    }
}

pub fn settings_fingerprint(settings: &DisplaySettings) -> String {
    settings.fingerprint()
}

/// 使用默认参数的 [`TimelineBuilder`] 取得处理结果。
pub fn get_processed<'a>(bundle: &'a mut LyricBundle, settings: &DisplaySettings) -> &'a [LyricLine] {
    get_processed_with(bundle, settings, &TimelineBuilder::default())
}

/// 缓存命中（已有结果且指纹相同）时直接返回缓存，否则重新计算并整体替换缓存。
pub fn get_processed_with<'a, P: LineProcessor + ?Sized>(
    bundle: &'a mut LyricBundle,
    settings: &DisplaySettings,
    processor: &P,
) -> &'a [LyricLine] {
    let fingerprint = settings_fingerprint(settings);
    let cache_hit = !bundle.processed_lines.is_empty()
        && bundle.settings_fingerprint.as_deref() == Some(fingerprint.as_str());

    if cache_hit {
        log::trace!("[PresentationCache] 使用缓存的歌词 ({fingerprint})");
        return &bundle.processed_lines;
    }

    log::debug!("[PresentationCache] 缓存未命中，重新处理歌词 ({fingerprint})");
    let started = Instant::now();
    let lines = processor.process(bundle, settings);
    log::debug!(
        "[PresentationCache] 处理完成，耗时 {:?}，行数 {}",
        started.elapsed(),
        lines.len()
    );
    bundle.processed_lines = lines;
    bundle.settings_fingerprint = Some(fingerprint);
    &bundle.processed_lines
}

/// 获取歌词后立即预热缓存，之后的首次渲染可以直接命中。
pub fn preprocess<P: LineProcessor + ?Sized>(
    bundle: &mut LyricBundle,
    settings: &DisplaySettings,
    processor: &P,
) {
    get_processed_with(bundle, settings, processor);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct CountingProcessor {
        inner: TimelineBuilder,
        calls: Cell<usize>,
    }

    impl CountingProcessor {
        fn new() -> Self {
            Self {
                inner: TimelineBuilder::default(),
                calls: Cell::new(0),
            }
        }
    }

    impl LineProcessor for CountingProcessor {
        fn process(&self, bundle: &LyricBundle, settings: &DisplaySettings) -> Vec<LyricLine> {
            self.calls.set(self.calls.get() + 1);
            self.inner.process(bundle, settings)
        }
    }

    fn bundle() -> LyricBundle {
        LyricBundle::new().with_line_timed(
            Some("[00:01.00]hello world\n[00:02.00]again"),
            Some("[00:01.00]你好世界\n[00:02.00]再来"),
            None,
        )
    }

    #[test]
    fn test_cache_hit_skips_processing() {
        let mut bundle = bundle();
        let settings = DisplaySettings::new();
        let processor = CountingProcessor::new();

        let first = get_processed_with(&mut bundle, &settings, &processor).to_vec();
        let second = get_processed_with(&mut bundle, &settings, &processor).to_vec();
        assert_eq!(processor.calls.get(), 1);
        assert_eq!(first, second);
        assert_eq!(bundle.settings_fingerprint(), Some("true-false-true"));
    }

    #[test]
    fn test_toggling_translation_recomputes() {
        let mut bundle = bundle();
        let processor = CountingProcessor::new();
        let on = DisplaySettings::new().with_translation(true);
        let off = on.with_translation(false);

        let lines = get_processed_with(&mut bundle, &on, &processor);
        assert_eq!(lines[0].translation, "你好世界");

        let lines = get_processed_with(&mut bundle, &off, &processor);
        assert!(lines.iter().all(|l| l.translation.is_empty()));
        assert_eq!(lines.len(), 2);
        assert_eq!(processor.calls.get(), 2);

        let lines = get_processed_with(&mut bundle, &on, &processor);
        assert_eq!(lines[1].translation, "再来");
        assert_eq!(processor.calls.get(), 3);
    }

    #[test]
    fn test_preprocess_warms_cache() {
        let mut bundle = bundle();
        let settings = DisplaySettings::new();
        let processor = CountingProcessor::new();
        preprocess(&mut bundle, &settings, &processor);
        assert_eq!(bundle.processed_lines().len(), 2);
        get_processed_with(&mut bundle, &settings, &processor);
        assert_eq!(processor.calls.get(), 1);
    }

    #[test]
    fn test_invalidate_forces_recompute() {
        let mut bundle = bundle();
        let settings = DisplaySettings::new();
        let processor = CountingProcessor::new();
        get_processed_with(&mut bundle, &settings, &processor);
        bundle.invalidate();
        get_processed_with(&mut bundle, &settings, &processor);
        assert_eq!(processor.calls.get(), 2);
    }

    #[test]
    fn test_default_processor_spaces_words() {
        let mut bundle = LyricBundle::new().with_word_timed(
            Some("[1000,1000](1000,500,0)hello (1500,500,0)world"),
            None,
            None,
        );
        let lines = get_processed(&mut bundle, &DisplaySettings::new());
        let texts: Vec<&str> = lines[0].words.iter().map(|w| w.text.as_str()).collect();
        assert_eq!(texts, vec!["hello", "\u{00A0}", "world"]);
    }
}
