//! 导入/导出服务 - 业务能力层
//!
//! 文件读写的薄封装：导入走 Absorb，导出走 Project。

use crate::error::{AppError, AppResult};
use crate::models::question::Question;
use crate::services::serializer::{to_text, TextFormat};
use crate::workflow::reconciler::{AbsorbOutcome, SyncReconciler};
use regex::Regex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

/// 默认导出文件名
pub const DEFAULT_EXPORT_FILE_NAME: &str = "examify_questions.json";

fn sanitize_file_stem(subject: &str) -> String {
    match Regex::new(r"(?i)[^a-z0-9_]") {
        Ok(re) => re.replace_all(subject, "_").to_lowercase(),
        Err(_) => subject.to_lowercase(),
    }
}

/// 推荐导出文件名
///
/// 只有一个科目时用科目名（非字母数字下划线替换为 `_`，转小写），
/// 否则使用 `fallback`。
pub fn suggest_export_file_name(questions: &[Question], fallback: &str) -> String {
    let subjects: BTreeSet<&str> = questions
        .iter()
        .filter_map(|q| q.subject.as_deref())
        .filter(|s| !s.is_empty())
        .collect();

    match subjects.iter().next() {
        Some(subject) if subjects.len() == 1 => {
            format!("{}_questions.json", sanitize_file_stem(subject))
        }
        _ => fallback.to_string(),
    }
}

/// 补全 `.json` 扩展名
pub fn with_json_extension(path: &Path) -> PathBuf {
    if path.extension().and_then(|e| e.to_str()) == Some("json") {
        path.to_path_buf()
    } else {
        let mut name = path.as_os_str().to_os_string();
        name.push(".json");
        PathBuf::from(name)
    }
}

/// 导出题目到文件，返回实际写入的路径
///
/// 没有题目时拒绝导出，不创建文件。
pub async fn export_to_path(
    questions: &[Question],
    path: &Path,
    format: TextFormat,
) -> AppResult<PathBuf> {
    if questions.is_empty() {
        return Err(AppError::NothingToExport);
    }
    let target = with_json_extension(path);
    let text = to_text(questions, format);
    fs::write(&target, text)
        .await
        .map_err(|e| AppError::file_write_failed(target.display().to_string(), e))?;
    info!("📤 已导出 {} 道题目: {}", questions.len(), target.display());
    Ok(target)
}

/// 从文件导入：读取文本后执行 Absorb
///
/// 被拒绝时协调器中的题目和文本都不变。
pub async fn import_from_path(
    reconciler: &mut SyncReconciler,
    path: &Path,
) -> AppResult<AbsorbOutcome> {
    let text = fs::read_to_string(path)
        .await
        .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?;
    info!("📥 正在导入: {}", path.display());
    Ok(reconciler.absorb_text(text).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::QuestionDraft;
    use crate::services::repository::QuestionRepository;

    fn with_subjects(subjects: &[Option<&str>]) -> Vec<Question> {
        let mut repo = QuestionRepository::new();
        for s in subjects {
            repo.add(QuestionDraft {
                subject: s.map(str::to_string),
                ..Default::default()
            });
        }
        repo.questions().to_vec()
    }

    #[test]
    fn single_subject_names_the_file() {
        let qs = with_subjects(&[Some("General Knowledge"), None, Some("General Knowledge")]);
        assert_eq!(
            suggest_export_file_name(&qs, DEFAULT_EXPORT_FILE_NAME),
            "general_knowledge_questions.json"
        );
    }

    #[test]
    fn mixed_subjects_use_fallback() {
        let qs = with_subjects(&[Some("Physics"), Some("Chemistry")]);
        assert_eq!(
            suggest_export_file_name(&qs, DEFAULT_EXPORT_FILE_NAME),
            DEFAULT_EXPORT_FILE_NAME
        );
        assert_eq!(suggest_export_file_name(&[], "last.json"), "last.json");
    }

    #[test]
    fn json_extension_is_appended_once() {
        assert_eq!(with_json_extension(Path::new("out")), PathBuf::from("out.json"));
        assert_eq!(with_json_extension(Path::new("out.json")), PathBuf::from("out.json"));
    }

    #[tokio::test]
    async fn export_then_import_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut repo = QuestionRepository::new();
        repo.add(QuestionDraft {
            question_text: Some("What is 2+2?".into()),
            options: Some(crate::models::OptionMap::from_pairs([("a", "3"), ("b", "4")])),
            correct_answer: Some("b".into()),
            ..Default::default()
        });
        let source = SyncReconciler::new(repo, TextFormat::Pretty);
        let written = export_to_path(source.questions(), &dir.path().join("math"), TextFormat::Pretty)
            .await
            .unwrap();
        assert!(written.ends_with("math.json"));

        let mut target = SyncReconciler::new(QuestionRepository::new(), TextFormat::Pretty);
        let outcome = import_from_path(&mut target, &written).await.unwrap();
        assert!(outcome.is_accepted());
        assert!(target.questions()[0].same_content(&source.questions()[0]));
        assert_eq!(target.text(), source.text());
    }

    #[tokio::test]
    async fn empty_set_is_not_exported() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("empty.json");
        let err = export_to_path(&[], &target, TextFormat::Pretty).await.unwrap_err();
        assert!(matches!(err, AppError::NothingToExport));
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn missing_import_file_is_an_error() {
        let mut target = SyncReconciler::new(QuestionRepository::new(), TextFormat::Pretty);
        let err = import_from_path(&mut target, Path::new("/no/such/file.json")).await;
        assert!(matches!(err, Err(AppError::File(_))));
    }
}
