//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `WEAVE__*` 覆盖（双下划线表示嵌套，如 `WEAVE__LAYOUT__MAX_COLUMNS=3`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub layout: LayoutSection,
    pub orchestrator: OrchestratorSection,
}

/// [app] 段
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
}

/// [llm] 段：后端选择与超时
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：openai / mock；未设置 OPENAI_API_KEY 时退回 mock
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmTimeoutsSection {
    #[serde(default = "default_request_timeout")]
    pub request: u64,
    /// 流式回复中相邻两块之间的最长等待（秒）
    #[serde(default = "default_stream_timeout")]
    pub stream: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: default_request_timeout(),
            stream: default_stream_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    60
}

fn default_stream_timeout() -> u64 {
    120
}

/// [layout] 段：各类画布元素的固定尺寸与间距（单位：画布像素）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LayoutSection {
    pub card_width: f64,
    pub card_height: f64,
    /// 带配图卡片的加高尺寸
    pub image_card_height: f64,
    pub gap: f64,
    /// 网格模式列数上限
    pub max_columns: usize,
    /// 分层模式层间距
    pub layer_gap: f64,
    /// 网格顶部相对视口焦点的下移距离
    pub anchor_offset: f64,
    /// 表格 / 幻灯片与上方内容的间距
    pub section_gap: f64,
    pub group_padding: f64,
    pub table_width: f64,
    pub table_title_height: f64,
    pub table_header_height: f64,
    pub table_row_height: f64,
    pub tab_bar_height: f64,
    pub table_padding: f64,
    pub slide_width: f64,
    pub slide_height: f64,
    pub slide_title_height: f64,
    /// 纯文本兜底便签尺寸
    pub note_width: f64,
    pub note_height: f64,
}

impl Default for LayoutSection {
    fn default() -> Self {
        Self {
            card_width: 320.0,
            card_height: 200.0,
            image_card_height: 360.0,
            gap: 40.0,
            max_columns: 4,
            layer_gap: 80.0,
            anchor_offset: 80.0,
            section_gap: 120.0,
            group_padding: 24.0,
            table_width: 640.0,
            table_title_height: 48.0,
            table_header_height: 40.0,
            table_row_height: 36.0,
            tab_bar_height: 36.0,
            table_padding: 32.0,
            slide_width: 960.0,
            slide_height: 540.0,
            slide_title_height: 48.0,
            note_width: 480.0,
            note_height: 320.0,
        }
    }
}

/// [orchestrator] 段：探活、后台摘要超时、澄清与后续建议开关
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrchestratorSection {
    /// 探活超时（毫秒）
    pub probe_timeout_ms: u64,
    /// 后台摘要安全超时（秒），超时后强制标记为错误
    pub summarize_timeout_secs: u64,
    /// 开放式请求是否先走澄清轮
    pub clarification: bool,
    /// 执行完成后是否生成后续建议
    pub suggestions: bool,
    pub max_suggestions: usize,
    /// 事件广播通道容量
    pub event_capacity: usize,
}

impl Default for OrchestratorSection {
    fn default() -> Self {
        Self {
            probe_timeout_ms: 1000,
            summarize_timeout_secs: 60,
            clarification: true,
            suggestions: true,
            max_suggestions: 3,
            event_capacity: 64,
        }
    }
}

/// 从 config 目录加载配置，环境变量 WEAVE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 WEAVE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("WEAVE")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
