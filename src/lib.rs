//! 把多个来源、多种格式的歌词整理成一条统一的时间轴，供播放时逐字高亮。
//!
//! 处理流程：原始文本经各格式解析器得到中间行，合并器选出主轨道并对齐翻译与音译，
//! 再由分词器插入词间分隔符，最后按显示设置缓存在 [`LyricBundle`] 上。
//!
//! ```
//! use lyrics_timeline::{DisplaySettings, LyricBundle, get_processed};
//!
//! let mut bundle = LyricBundle::new().with_line_timed(
//!     Some("[00:01.00]hello\n[00:02.00]world"),
//!     None,
//!     None,
//! );
//! let lines = get_processed(&mut bundle, &DisplaySettings::new());
//! assert_eq!(lines.len(), 2);
//! assert_eq!(lines[1].start_ms, 2000);
//! ```

pub mod aligner;
pub mod error;
pub mod format_sniffer;
pub mod logger;
pub mod lrc_generator;
pub mod lrc_parser;
pub mod lyrics_merger;
pub mod presentation_cache;
pub mod provider_payload;
pub mod qrc_parser;
pub mod settings;
pub mod ttml_parser;
pub mod types;
pub mod word_spacer;
pub mod word_timed;
pub mod yrc_parser;

pub use aligner::{AlignTarget, align};
pub use error::{ConvertError, ConvertResult};
pub use format_sniffer::sniff_word_timed_dialect;
pub use lrc_parser::parse_time_map;
pub use lyrics_merger::{AuxSource, MergeOutcome, TimelineBuilder, placeholder_timeline};
pub use presentation_cache::{LineProcessor, get_processed, get_processed_with, preprocess};
pub use settings::EngineSettings;
pub use types::{
    DisplaySettings, LrcContentType, LyricBundle, LyricLine, LyricMeta, LyricWord, PrimarySource,
    WordTimedDialect,
};
pub use word_spacer::space_words;
