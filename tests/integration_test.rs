use examify_core::config::Config;
use examify_core::logger;
use examify_core::models::{OptionMap, QuestionDraft};
use examify_core::orchestrator::{App, ProcessingStats};
use examify_core::services::{
    from_text, has_blocking, to_text, validate_record_set, LoadMode, QuestionRepository,
    QuestionUpdate, RepositoryWarning, Severity, TextFormat,
};
use examify_core::workflow::{AbsorbOutcome, SyncReconciler, SyncState};
use tokio_test::assert_ok;

fn draft(text: &str, options: &[(&str, &str)], answer: &str) -> QuestionDraft {
    QuestionDraft {
        question_text: Some(text.to_string()),
        options: Some(OptionMap::from_pairs(options.iter().copied())),
        correct_answer: Some(answer.to_string()),
        ..Default::default()
    }
}

fn sample_reconciler() -> SyncReconciler {
    let mut repo = QuestionRepository::new();
    repo.add(QuestionDraft {
        subject: Some("Geography".into()),
        topic: Some("Capitals".into()),
        ..draft("Capital of France?", &[("a", "Paris"), ("b", "Rome")], "a")
    });
    repo.add(draft("2 + 2 = ?", &[("a", "3"), ("b", "4"), ("c", "5")], "b"));
    SyncReconciler::new(repo, TextFormat::Pretty)
}

#[tokio::test]
async fn text_round_trip_keeps_every_field() {
    let source = sample_reconciler();
    let mut target = SyncReconciler::new(QuestionRepository::new(), TextFormat::Pretty);

    let outcome = target.absorb_text(source.text()).await;
    assert!(outcome.is_accepted(), "{:?}", outcome);

    assert_eq!(target.questions().len(), 2);
    for (a, b) in source.questions().iter().zip(target.questions()) {
        assert!(a.same_content(b));
        assert_ne!(a.id, b.id);
    }
    assert_eq!(target.text(), source.text());
}

#[tokio::test]
async fn duplicate_number_rejects_absorb_without_touching_state() {
    let mut reconciler = sample_reconciler();
    let before_questions = reconciler.questions().to_vec();

    let edited = r#"[
        {"question_number": 1, "question_text": "A", "options": {"a": "x", "b": "y"}, "correct_answer": "a"},
        {"question_number": 1, "question_text": "B", "options": {"a": "x", "b": "y"}, "correct_answer": "a"}
    ]"#;
    reconciler.set_text(edited);
    let outcome = reconciler.absorb().await;

    let AbsorbOutcome::Rejected { findings } = outcome else {
        panic!("duplicate numbers must be rejected");
    };
    assert!(findings
        .iter()
        .any(|f| f.severity == Severity::Error && f.to_string().contains("Q#1")));
    assert_eq!(reconciler.questions(), before_questions.as_slice());
    assert_eq!(reconciler.text(), edited);
    assert_eq!(reconciler.state(), SyncState::Idle);
}

#[test]
fn twenty_seventh_option_uses_numbered_key() {
    let mut repo = QuestionRepository::new();
    let letters: Vec<(String, String)> = ('a'..='z').map(|c| (c.to_string(), String::new())).collect();
    let id = repo.add(QuestionDraft {
        options: Some(OptionMap::from_pairs(letters)),
        ..Default::default()
    });

    assert_eq!(repo.add_option(id).unwrap(), "opt27");
}

#[test]
fn structural_refusals_leave_record_unchanged() {
    let mut repo = QuestionRepository::new();
    let id = repo.add(draft("Q", &[("a", "X"), ("b", "Y")], "a"));
    let before = repo.get(id).unwrap().clone();

    assert_eq!(
        repo.remove_option(id, "a"),
        Err(RepositoryWarning::MinimumOptions { min: 2 })
    );
    assert_eq!(
        repo.update(
            id,
            QuestionUpdate::RenameOptionKey {
                old: "a".into(),
                new: "b".into()
            }
        ),
        Err(RepositoryWarning::DuplicateOptionKey { key: "b".into() })
    );
    assert_eq!(repo.get(id), Some(&before));
}

#[test]
fn removing_the_answer_option_reassigns_it() {
    let mut repo = QuestionRepository::new();
    let id = repo.add(draft("Q", &[("a", "X"), ("b", "Y"), ("c", "Z")], "b"));

    assert_ok!(repo.remove_option(id, "b"));
    let question = repo.get(id).unwrap();
    assert_eq!(question.correct_answer, "a");
    assert!(question.options.contains_key(&question.correct_answer));
}

#[tokio::test]
async fn uppercase_answer_matches_lowercase_key() {
    let text = r#"[{"question_number": 1, "options": {"a": "X", "b": "Y"}, "correct_answer": "B", "question_text": "Q"}]"#;
    let items = from_text(text).unwrap();
    assert!(validate_record_set(&items).is_empty());

    let mut reconciler = SyncReconciler::new(QuestionRepository::new(), TextFormat::Compact);
    assert!(reconciler.absorb_text(text).await.is_accepted());
    assert_eq!(reconciler.questions()[0].resolved_answer(), Some("b"));
}

#[tokio::test]
async fn non_array_text_is_a_shape_error() {
    let mut reconciler = sample_reconciler();
    let before_text = reconciler.text().to_string();
    let before_questions = reconciler.questions().to_vec();

    let outcome = reconciler.absorb_text("{}").await;
    assert_eq!(outcome.findings().len(), 1);
    assert!(outcome.findings()[0]
        .to_string()
        .contains("Top level of JSON must be an array"));
    assert_eq!(reconciler.questions(), before_questions.as_slice());
    assert_eq!(reconciler.text(), before_text);
}

#[test]
fn append_continues_after_highest_number() {
    let mut repo = QuestionRepository::new();
    repo.load_bulk(
        vec![QuestionDraft {
            question_number: Some(5),
            ..Default::default()
        }],
        LoadMode::Replace,
    );

    let ids = repo.load_bulk(
        vec![
            draft("first", &[], ""),
            draft("second", &[], ""),
            draft("third", &[], ""),
        ],
        LoadMode::Append,
    );

    let numbers: Vec<u32> = ids
        .iter()
        .map(|id| repo.get(*id).unwrap().question_number)
        .collect();
    assert_eq!(numbers, vec![6, 7, 8]);
    assert_eq!(repo.get(ids[1]).unwrap().question_text, "second");
}

#[tokio::test]
async fn gap_in_numbers_warns_without_blocking() {
    let text = r#"[
        {"question_number": 1, "question_text": "A", "options": {"a": "x", "b": "y"}, "correct_answer": "a"},
        {"question_number": 3, "question_text": "B", "options": {"a": "x", "b": "y"}, "correct_answer": "b"}
    ]"#;
    let findings = validate_record_set(&from_text(text).unwrap());
    assert!(!has_blocking(&findings));
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].severity, Severity::Warning);

    let mut reconciler = SyncReconciler::new(QuestionRepository::new(), TextFormat::Pretty);
    match reconciler.absorb_text(text).await {
        AbsorbOutcome::Accepted { count, warnings } => {
            assert_eq!(count, 2);
            assert_eq!(warnings, findings);
        }
        other => panic!("gap must not block: {:?}", other),
    }
}

#[test]
fn mutations_are_projected_immediately() {
    let mut reconciler = sample_reconciler();
    let id = reconciler.questions()[1].id;

    assert_ok!(reconciler.mutate(|repo| repo.duplicate(id)));

    assert_eq!(reconciler.questions().len(), 3);
    assert_eq!(
        reconciler.text(),
        to_text(reconciler.questions(), TextFormat::Pretty)
    );
    assert!(reconciler.text().contains("(Copy of Q#2) 2 + 2 = ?"));
}

#[tokio::test]
async fn batch_run_sorts_files_into_output_and_warn_report() {
    logger::init();
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input");
    std::fs::create_dir_all(&input).unwrap();

    std::fs::write(
        input.join("good.json"),
        r#"[{"question_number": 1, "question_text": "Q", "options": {"a": "x", "b": "y"}, "correct_answer": "a"}]"#,
    )
    .unwrap();
    std::fs::write(input.join("bad.json"), r#"[{"question_number": 1}]"#).unwrap();
    std::fs::write(input.join("notes.txt"), "ignored").unwrap();

    let path = |name: &str| dir.path().join(name).to_string_lossy().to_string();
    let config = Config {
        input_folder: path("input"),
        output_folder: path("output"),
        output_log_file: path("output.txt"),
        warn_file: path("warn.txt"),
        max_concurrent_files: 1,
        ..Config::default()
    };

    let app = assert_ok!(App::initialize(config).await);
    let stats = assert_ok!(app.run().await);
    assert_eq!(
        stats,
        ProcessingStats {
            accepted: 1,
            rejected: 1,
            failed: 0,
            total: 2
        }
    );

    assert!(dir.path().join("output").join("good.json").exists());
    assert!(!dir.path().join("output").join("bad.json").exists());
    let report = std::fs::read_to_string(dir.path().join("warn.txt")).unwrap();
    assert!(report.starts_with("文件 bad.json"));
}
