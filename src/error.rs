use quick_xml::Error as QuickXmlErrorMain;
use quick_xml::events::attributes::AttrError as QuickXmlAttrError;
use std::io;
use thiserror::Error;

/// 解析、对齐与配置加载过程中可能出现的错误。
///
/// 这些错误只在模块内部流动：合并器在每个轨道、每个辅助来源的边界上捕获它们，
/// 记录日志后把对应轨道视为缺失，对外的入口永远返回完整的结果。
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("XML 解析错误: {0}")]
    Xml(#[from] QuickXmlErrorMain),
    #[error("XML 属性错误: {0}")]
    Attribute(#[from] QuickXmlAttrError),
    #[error("JSON 解析错误: {0}")]
    Json(#[from] serde_json::Error),
    #[error("解析错误: {0}")]
    ParseInt(#[from] std::num::ParseIntError),
    #[error("无效的时间格式: {0}")]
    InvalidTime(String),
    #[error("无效的逐字歌词行 (行 {line_num}): {message}")]
    InvalidWordTimedFormat { line_num: usize, message: String },
    #[error("文本格式化错误: {0}")]
    Format(#[from] std::fmt::Error),
    #[error("IO 错误: {0}")]
    Io(#[from] io::Error),
    #[error("配置文件错误: {0}")]
    Ini(#[from] ini::Error),
    #[error("配置错误: {0}")]
    Config(String),
}

pub type ConvertResult<T> = std::result::Result<T, ConvertError>;
