//! # Examify Core
//!
//! 考试题目编辑器的核心：题目仓库、校验、文本序列化与双向同步
//!
//! ## 架构设计
//!
//! 本系统采用严格的分层架构：
//!
//! ### ① 数据层（Models）
//! - `models/` - 题目、选项、原始记录，以及 JSON 文件加载
//! - `Question` / `QuestionDraft` - 结构化题目与部分输入
//! - `RawRecord` - 保留字段顺序与重复键的原始记录
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `validator` - 结构校验，产出 `Finding`
//! - `repository` - 有序题目集合与结构约束
//! - `serializer` - 题目 ↔ JSON 文本
//! - `exporter` / `snapshot` / `WarnWriter` - 文件读写能力
//!
//! ### ③ 流程层（Workflow）
//! - `SyncReconciler` - Project（题目 → 文本）与 Absorb（文本 → 题目）
//! - `FileFlow` - 单个文件的 Absorb → 导出 / warn.txt 流程
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 批量文件处理器，管理并发与统计
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod logger;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::{OptionMap, Question, QuestionDraft, QuestionId};
pub use orchestrator::App;
pub use services::{Finding, QuestionRepository, QuestionUpdate, TextFormat};
pub use workflow::{AbsorbOutcome, SyncReconciler};
