//! Tool Call 层：恢复式解析器、修复通道、操作注册表

pub mod parser;
pub mod registry;
pub mod repair;
pub mod scan;
pub mod types;

pub use parser::{parse, parse_detailed, run_strategy};
pub use registry::{classify, OperationBuckets, OperationKind};
pub use types::{
    CardParams, ConnectionParams, GroupParams, ParseDiagnostic, ParseResult, QuestionParams,
    SheetParams, SlidePage, SlideParams, Strategy, TableParams, ToolCall,
};
