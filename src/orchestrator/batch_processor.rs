//! 批量文件处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责批量题目文件的处理。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：启动日志文件、准备输出目录
//! 2. **批量加载**：扫描并加载所有待处理的 JSON 文件（`Vec<JsonSource>`）
//! 3. **并发控制**：使用 Semaphore 限制并发数量
//! 4. **分批处理**：将文件分批次处理，每批完成后再开始下一批
//! 5. **全局统计**：汇总所有文件的处理结果
//!
//! ## 设计特点
//!
//! - **顶层编排**：不处理单个文件的细节，委托给 `FileFlow`
//! - **文件隔离**：每个文件拥有自己的仓库，任务之间没有共享可变状态

use crate::config::Config;
use crate::models::JsonSource;
use crate::utils::logging::{init_log_file, log_files_loaded, log_startup, print_final_stats};
use crate::workflow::{FileFlow, FileResult};
use anyhow::{Context, Result};
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

/// 应用主结构
pub struct App {
    config: Config,
    flow: Arc<FileFlow>,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        // 初始化日志文件
        init_log_file(&config.output_log_file)?;

        log_startup(config.max_concurrent_files);

        tokio::fs::create_dir_all(&config.output_folder)
            .await
            .with_context(|| format!("无法创建输出目录: {}", config.output_folder))?;

        let flow = Arc::new(FileFlow::new(&config));
        Ok(Self { config, flow })
    }

    /// 运行应用主逻辑，返回最终统计
    pub async fn run(&self) -> Result<ProcessingStats> {
        // 加载所有待处理的文件
        let all_files = self.load_files().await?;

        if all_files.is_empty() {
            warn!("⚠️ 没有找到待处理的JSON文件，程序结束");
            return Ok(ProcessingStats::default());
        }

        log_files_loaded(all_files.len(), self.batch_size());

        // 处理所有文件
        let stats = self.process_all_files(all_files).await?;

        // 输出最终统计
        print_final_stats(
            stats.accepted,
            stats.rejected,
            stats.total,
            &self.config.output_log_file,
        );

        Ok(stats)
    }

    /// 加载文件
    async fn load_files(&self) -> Result<Vec<JsonSource>> {
        info!("\n📁 正在扫描待处理的题目文件...");
        crate::models::load_all_json_files(&self.config.input_folder).await
    }

    // 并发数为 0 时按 1 处理
    fn batch_size(&self) -> usize {
        self.config.max_concurrent_files.max(1)
    }

    /// 处理所有文件
    async fn process_all_files(&self, all_files: Vec<JsonSource>) -> Result<ProcessingStats> {
        let batch_size = self.batch_size();
        let semaphore = Arc::new(Semaphore::new(batch_size));
        let total_files = all_files.len();
        let total_batches = total_files.div_ceil(batch_size);
        let mut stats = ProcessingStats {
            total: total_files,
            ..Default::default()
        };

        // 分批处理
        for (batch_idx, batch_files) in all_files.chunks(batch_size).enumerate() {
            let batch_start = batch_idx * batch_size;
            let batch_num = batch_idx + 1;

            log_batch_start(
                batch_num,
                total_batches,
                batch_start + 1,
                batch_start + batch_files.len(),
                total_files,
            );

            // 处理本批
            let batch_result = self
                .process_batch(batch_files, batch_start, semaphore.clone())
                .await?;

            stats.accepted += batch_result.accepted;
            stats.rejected += batch_result.rejected;
            stats.failed += batch_result.failed;

            log_batch_complete(batch_num, &batch_result);
        }

        Ok(stats)
    }

    /// 处理单个批次
    async fn process_batch(
        &self,
        batch_files: &[JsonSource],
        batch_start: usize,
        semaphore: Arc<Semaphore>,
    ) -> Result<BatchResult> {
        let mut batch_handles = Vec::with_capacity(batch_files.len());

        // 为本批创建并发任务
        for (idx, source) in batch_files.iter().enumerate() {
            let file_index = batch_start + idx + 1;
            let permit = semaphore.clone().acquire_owned().await?;
            let flow = Arc::clone(&self.flow);
            let source = source.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                flow.run(&source, file_index).await.map_err(|e| {
                    error!("[文件 {}] ❌ 处理过程中发生错误: {}", file_index, e);
                    e
                })
            });
            batch_handles.push(handle);
        }

        // 等待本批所有任务完成
        let mut result = BatchResult::default();
        for joined in join_all(batch_handles).await {
            match joined {
                Ok(Ok(FileResult::Accepted { .. })) => result.accepted += 1,
                Ok(Ok(FileResult::Rejected { .. })) => result.rejected += 1,
                Ok(Err(_)) => result.failed += 1,
                Err(e) => {
                    error!("任务执行失败: {}", e);
                    result.failed += 1;
                }
            }
        }

        Ok(result)
    }
}

/// 处理统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProcessingStats {
    pub accepted: usize,
    pub rejected: usize,
    /// 读写失败等运行错误
    pub failed: usize,
    pub total: usize,
}

/// 批次处理结果
#[derive(Debug, Default)]
struct BatchResult {
    accepted: usize,
    rejected: usize,
    failed: usize,
}

// ========== 日志辅助函数 ==========

fn log_batch_start(batch_num: usize, total_batches: usize, start: usize, end: usize, total: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📦 开始处理第 {}/{} 批", batch_num, total_batches);
    info!("📄 本批文件: {}-{} / 共 {} 个", start, end, total);
    info!("{}", "=".repeat(60));
}

fn log_batch_complete(batch_num: usize, result: &BatchResult) {
    info!("\n{}", "─".repeat(60));
    info!(
        "✓ 第 {} 批完成: 通过 {}/{}",
        batch_num,
        result.accepted,
        result.accepted + result.rejected + result.failed
    );
    info!("{}", "─".repeat(60));
}
