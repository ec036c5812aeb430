use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use directories::ProjectDirs;
use ini::Ini;
use log::LevelFilter;

use crate::error::{ConvertError, ConvertResult};

const ALIGNMENT_SECTION: &str = "Alignment";
const TIMELINE_SECTION: &str = "Timeline";
const LOGGING_SECTION: &str = "Logging";

/// 处理流程中可调整的参数。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// 最近时间戳匹配时允许的最大时间差（含边界）。
    pub alignment_tolerance_ms: u64,
    /// 占位时间轴第二行的时间，远超任何真实歌曲长度。
    pub placeholder_sentinel_ms: u64,
    pub placeholder_texts: [String; 2],
    /// 大于 0 时，结束时间不晚于开始时间的行会被拉长到这个跨度。
    pub min_line_span_ms: u64,
    pub log_level: LevelFilter,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            alignment_tolerance_ms: 5000,
            placeholder_sentinel_ms: 999_000,
            placeholder_texts: ["暂无歌词".to_string(), "No Lyrics Available".to_string()],
            min_line_span_ms: 0,
            log_level: LevelFilter::Info,
        }
    }
}

impl EngineSettings {
    pub fn default_config_path() -> Option<PathBuf> {
        match ProjectDirs::from("com", "LyricsTimeline", "lyrics_timeline") {
            Some(proj_dirs) => Some(proj_dirs.config_dir().join("lyrics_timeline.ini")),
            None => {
                log::error!("[Settings] 无法获取项目配置目录路径");
                None
            }
        }
    }

    /// 读取默认路径下的配置，文件不存在或读取失败时使用默认值。
    pub fn load_or_default() -> Self {
        let Some(path) = Self::default_config_path() else {
            log::warn!("[Settings] 无法确定配置文件路径，使用默认配置");
            return Self::default();
        };
        if !path.exists() {
            log::info!("[Settings] 配置文件 {path:?} 未找到，使用默认配置");
            return Self::default();
        }
        match Self::load_from_file(&path) {
            Ok(settings) => settings,
            Err(e) => {
                log::error!("[Settings] 加载配置文件 {path:?} 失败: {e}，使用默认配置");
                Self::default()
            }
        }
    }

    pub fn load_from_file(path: &Path) -> ConvertResult<Self> {
        let conf = Ini::load_from_file(path)?;
        log::info!("[Settings] 从 {path:?} 加载配置");
        Ok(Self::from_ini(&conf))
    }

    pub fn from_ini_str(content: &str) -> ConvertResult<Self> {
        let conf = Ini::load_from_str(content).map_err(ini::Error::Parse)?;
        Ok(Self::from_ini(&conf))
    }

    /// 缺失或无法解析的键各自回退到默认值。
    fn from_ini(conf: &Ini) -> Self {
        let defaults = Self::default();
        let alignment = conf.section(Some(ALIGNMENT_SECTION));
        let timeline = conf.section(Some(TIMELINE_SECTION));
        let logging = conf.section(Some(LOGGING_SECTION));

        let read_u64 = |section: Option<&ini::Properties>, key: &str, default: u64| {
            match section.and_then(|s| s.get(key)) {
                Some(raw) => raw.trim().parse::<u64>().unwrap_or_else(|e| {
                    log::warn!("[Settings] 配置项 {key} 的值 '{raw}' 无效 ({e})，使用默认值 {default}");
                    default
                }),
                None => default,
            }
        };
        let read_text = |section: Option<&ini::Properties>, key: &str, default: &str| {
            section
                .and_then(|s| s.get(key))
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or(default)
                .to_string()
        };

        let [default_title, default_subtitle] = &defaults.placeholder_texts;

        Self {
            alignment_tolerance_ms: read_u64(
                alignment,
                "ToleranceMs",
                defaults.alignment_tolerance_ms,
            ),
            placeholder_sentinel_ms: read_u64(
                timeline,
                "PlaceholderSentinelMs",
                defaults.placeholder_sentinel_ms,
            ),
            placeholder_texts: [
                read_text(timeline, "PlaceholderTitle", default_title),
                read_text(timeline, "PlaceholderSubtitle", default_subtitle),
            ],
            min_line_span_ms: read_u64(timeline, "MinLineSpanMs", defaults.min_line_span_ms),
            log_level: logging
                .and_then(|s| s.get("Level"))
                .and_then(|s| LevelFilter::from_str(s.trim()).ok())
                .unwrap_or(defaults.log_level),
        }
    }

    fn to_ini(&self) -> Ini {
        let mut conf = Ini::new();
        conf.with_section(Some(ALIGNMENT_SECTION))
            .set("ToleranceMs", self.alignment_tolerance_ms.to_string());
        conf.with_section(Some(TIMELINE_SECTION))
            .set(
                "PlaceholderSentinelMs",
                self.placeholder_sentinel_ms.to_string(),
            )
            .set("PlaceholderTitle", self.placeholder_texts[0].as_str())
            .set("PlaceholderSubtitle", self.placeholder_texts[1].as_str())
            .set("MinLineSpanMs", self.min_line_span_ms.to_string());
        conf.with_section(Some(LOGGING_SECTION))
            .set("Level", self.log_level.to_string());
        conf
    }

    pub fn to_ini_string(&self) -> ConvertResult<String> {
        let mut buffer: Vec<u8> = Vec::new();
        self.to_ini().write_to(&mut buffer)?;
        String::from_utf8(buffer).map_err(|e| ConvertError::Config(e.to_string()))
    }

    pub fn save_to_file(&self, path: &Path) -> ConvertResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        self.to_ini().write_to_file(path)?;
        log::info!("[Settings] 配置已保存到 {path:?}");
        Ok(())
    }
}
