//! E2E tests for the progression engine.
//!
//! A course document is written to disk, loaded through the catalog, and
//! driven through study sessions, the write queue and the service against a
//! SQLite store.
//!
//! | Flow                         | Checks                                        |
//! |------------------------------|-----------------------------------------------|
//! | focused/unfocused study      | stored seconds, completion fired once          |
//! | out-of-order reports         | merge keeps the maximum                        |
//! | failed then passed quiz      | completion written only on the pass            |
//! | full course                  | percentage 100, completion timestamp set once  |

use std::sync::{Arc, Mutex};

use learnpath_core::storage::{progress_queue, run_writer};
use learnpath_core::{
    Answers, CourseCatalog, Database, Event, ProgressStore, ProgressWrite, ProgressionService,
    QuizMode, SessionContext, StudySession,
};
use rand::SeedableRng;
use rand_pcg::Mcg128Xsl64;

// ============================================================================
// Test Helpers
// ============================================================================

const COURSE_JSON: &str = r#"{
  "id": "rust-101",
  "title": "Rust 101",
  "version": 3,
  "chapters": [
    {
      "id": "ch1",
      "title": "Basics",
      "modules": [
        {
          "id": "ownership",
          "title": "Ownership",
          "contents": [
            { "id": "ownership-video", "type": "video", "url": "https://example.invalid/v", "min_engagement_seconds": 120 },
            { "id": "ownership-notes", "type": "text" }
          ],
          "question_bank": [
            { "id": "o1", "text": "q", "options": ["a","b","c","d"], "correct_option_index": 0, "difficulty": "easy" },
            { "id": "o2", "text": "q", "options": ["a","b","c","d"], "correct_option_index": 1, "difficulty": "easy" },
            { "id": "o3", "text": "q", "options": ["a","b","c","d"], "correct_option_index": 2, "difficulty": "medium" },
            { "id": "o4", "text": "q", "options": ["a","b","c","d"], "correct_option_index": 3, "difficulty": "medium" },
            { "id": "o5", "text": "q", "options": ["a","b","c","d"], "correct_option_index": 0, "difficulty": "medium" },
            { "id": "o6", "text": "q", "options": ["a","b","c","d"], "correct_option_index": 1, "difficulty": "hard" },
            { "id": "o7", "text": "q", "options": ["a","b","c","d"], "correct_option_index": 2, "difficulty": "hard" }
          ],
          "standard_sample_size": 5,
          "fast_track_sample_size": 3
        }
      ]
    },
    {
      "id": "ch2",
      "title": "Traits",
      "modules": [
        {
          "id": "traits",
          "contents": [
            { "id": "traits-pdf", "type": "pdf", "min_engagement_seconds": 30 }
          ]
        }
      ]
    }
  ]
}"#;

fn catalog() -> (tempfile::TempDir, CourseCatalog) {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("rust-101.json"), COURSE_JSON).unwrap();
    let mut catalog = CourseCatalog::new();
    assert_eq!(catalog.load_dir(dir.path()).unwrap(), 1);
    (dir, catalog)
}

fn service() -> ProgressionService<Database> {
    let (_dir, catalog) = catalog();
    ProgressionService::new(Database::open_memory().unwrap(), catalog)
}

fn answer_key(svc: &ProgressionService<Database>, module_id: &str) -> Answers {
    let (_, module) = svc.catalog().find_module(module_id).unwrap();
    module
        .question_bank
        .iter()
        .map(|q| (q.id.clone(), q.correct_option_index))
        .collect()
}

// ============================================================================
// Engagement E2E Tests
// ============================================================================

#[test]
fn test_focus_interrupted_study_stores_total_and_completes_once() {
    let svc = Arc::new(Mutex::new(service()));
    let video = {
        let guard = svc.lock().unwrap();
        let (_, _, content) = guard.catalog().find_content("ownership-video").unwrap();
        content.clone()
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let (sink, rx) = progress_queue();
    let writer_svc = Arc::clone(&svc);
    let writer = runtime.spawn(run_writer(rx, move |w: &ProgressWrite| {
        let mut guard = writer_svc.lock().unwrap_or_else(|p| p.into_inner());
        guard.apply_write(w).map(|ack| ack.outcome)
    }));

    let events = {
        let mut session = StudySession::new("s1", sink, 10).unwrap();
        session.select(&video, None).unwrap();
        session.advance(70);
        session.set_focus(false);
        session.advance(20);
        session.set_focus(true);
        session.advance(60);
        session.end();
        session.drain_events()
    };
    let stats = runtime.block_on(writer).unwrap();
    assert_eq!(stats.failed, 0);

    let completions: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, Event::ContentCompleted { .. }))
        .collect();
    assert_eq!(completions.len(), 1);
    assert!(matches!(
        completions[0],
        Event::ContentCompleted { engaged_seconds: 120, .. }
    ));

    let mut guard = svc.lock().unwrap();
    let progress = guard.get_student_progress("s1", "rust-101").unwrap();
    let stored = progress.content("ownership-video").unwrap();
    assert_eq!(stored.engaged_seconds, 130);
    assert!(stored.is_completed);
}

#[test]
fn test_untimed_content_completes_on_selection() {
    let mut svc = service();
    let (_, _, notes) = svc.catalog().find_content("ownership-notes").unwrap();
    let notes = notes.clone();

    let writes = {
        let mut session = StudySession::new("s1", Vec::<ProgressWrite>::new(), 10).unwrap();
        session.select(&notes, None).unwrap();
        assert!(!session.is_counting());
        session.end();
        session.sink().clone()
    };
    assert!(writes.iter().all(|w| w.is_completed && w.forced));
    for w in &writes {
        svc.apply_write(w).unwrap();
    }
    let progress = svc.get_student_progress("s1", "rust-101").unwrap();
    assert!(progress.content("ownership-notes").unwrap().is_completed);
}

#[test]
fn test_reports_out_of_order_keep_maximum() {
    let mut svc = service();
    let ctx = SessionContext::student("s1");
    svc.report_content_progress(&ctx, "traits-pdf", 50, false).unwrap();
    svc.report_content_progress(&ctx, "traits-pdf", 30, false).unwrap();
    let stored = svc.store().content_progress("s1", "traits-pdf").unwrap().unwrap();
    assert_eq!(stored.engaged_seconds, 50);

    // Another student is untouched.
    assert!(svc.store().content_progress("s2", "traits-pdf").unwrap().is_none());
}

// ============================================================================
// Quiz E2E Tests
// ============================================================================

#[test]
fn test_failed_then_passed_quiz() {
    let mut svc = service();
    let ctx = SessionContext::student("s1");
    let key = answer_key(&svc, "ownership");
    let mut rng = Mcg128Xsl64::seed_from_u64(2024);

    let draw = svc
        .draw_quiz(&ctx, "ownership", QuizMode::Standard, &mut rng)
        .unwrap();
    assert_eq!(draw.questions.len(), 5);
    let ids = draw.question_ids();
    let wrong: Answers = ids
        .iter()
        .map(|id| (id.clone(), (key[id] + 1) % 4))
        .collect();
    let result = svc
        .submit_quiz_attempt(&ctx, "ownership", QuizMode::Standard, &ids, &wrong)
        .unwrap();
    assert!(!result.outcome.is_passed);
    assert_eq!(result.outcome.score, 0);
    assert!(svc.get_student_progress("s1", "rust-101").unwrap().completed_modules.is_empty());

    let draw = svc
        .draw_quiz(&ctx, "ownership", QuizMode::FastTrack, &mut rng)
        .unwrap();
    let ids = draw.question_ids();
    assert_eq!(ids.len(), 3);
    let right: Answers = ids.iter().map(|id| (id.clone(), key[id])).collect();
    let result = svc
        .submit_quiz_attempt(&ctx, "ownership", QuizMode::FastTrack, &ids, &right)
        .unwrap();
    assert!(result.outcome.is_passed);
    assert_eq!(result.outcome.required_score, None);

    let progress = svc.get_student_progress("s1", "rust-101").unwrap();
    assert_eq!(progress.completed_modules.len(), 1);
    assert!(progress.completed_modules[0].is_fast_tracked);
    assert_eq!(progress.completed_modules[0].score, 100);
}

// ============================================================================
// Course E2E Tests
// ============================================================================

#[test]
fn test_full_course_reaches_one_hundred_percent() {
    let mut svc = service();
    let ctx = SessionContext::student("s1");
    let key = answer_key(&svc, "ownership");

    assert_eq!(svc.get_student_progress("s1", "rust-101").unwrap().completion_pct, 0.0);

    svc.report_content_progress(&ctx, "ownership-video", 60, false).unwrap();
    let half = svc.get_student_progress("s1", "rust-101").unwrap().completion_pct;
    // 0.5 of one item out of four (three contents + one quiz).
    assert!((half - 12.5).abs() < 1e-9);

    svc.report_content_progress(&ctx, "ownership-video", 120, true).unwrap();
    svc.report_content_progress(&ctx, "ownership-notes", 0, true).unwrap();
    let ids: Vec<String> = ["o1", "o3", "o6"].iter().map(|s| s.to_string()).collect();
    let answers: Answers = ids.iter().map(|id| (id.clone(), key[id])).collect();
    svc.submit_quiz_attempt(&ctx, "ownership", QuizMode::Standard, &ids, &answers)
        .unwrap();

    let states = svc.module_states(&ctx, "rust-101").unwrap();
    assert!(states.iter().all(|s| !s.locked));

    let ack = svc.report_content_progress(&ctx, "traits-pdf", 31, true).unwrap();
    assert!(ack
        .events
        .iter()
        .any(|e| matches!(e, Event::CourseCompleted { course_id, .. } if course_id == "rust-101")));

    let progress = svc.get_student_progress("s1", "rust-101").unwrap();
    assert!((progress.completion_pct - 100.0).abs() < 1e-9);
    let first = progress.course_completed_at.unwrap();

    svc.report_content_progress(&ctx, "traits-pdf", 40, true).unwrap();
    let again = svc.get_student_progress("s1", "rust-101").unwrap();
    assert_eq!(again.course_completed_at, Some(first));

    let grades = svc.grade_summary("s1", "rust-101").unwrap();
    assert_eq!(grades.grades.len(), 1);
    assert!((grades.average_score - 100.0).abs() < 1e-9);
}
