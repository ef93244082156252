//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量处理和流程调度，是整个系统的"指挥中心"。
//!
//! ### `batch_processor` - 批量文件处理器
//! - 管理应用生命周期（初始化、运行）
//! - 批量加载题目文件（Vec<JsonSource>）
//! - 控制并发数量（Semaphore）
//! - 输出全局统计信息
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<JsonSource>)
//!     ↓
//! workflow::FileFlow (处理单个文件)
//!     ↓
//! workflow::SyncReconciler (Absorb / Project)
//!     ↓
//! services (能力层：serializer / validator / repository / exporter / warn)
//! ```
//!
//! 编排层只做调度和统计，不做具体业务判断。

pub mod batch_processor;

// 重新导出主要类型
pub use batch_processor::{App, ProcessingStats};
