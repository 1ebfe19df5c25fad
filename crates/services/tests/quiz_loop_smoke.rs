use std::sync::Arc;

use chrono::Duration;
use gateway::{Eligibility, ExpectedAnswer, InMemoryBackend, LearnerContext, Operation, QuizGateway};
use learn_core::model::{
    LearnerId, OptionId, Question, QuestionId, QuestionType, Quiz, QuizId, QuizSettings,
};
use learn_core::time::{fixed_clock, fixed_now};
use services::{Clock, Phase, QuizLoopService};

fn quiz(settings: QuizSettings) -> Quiz {
    Quiz::new(
        QuizId::new(1),
        "Borrowing",
        vec![
            Question::new(QuestionId::new(1), QuestionType::TrueFalse, "&mut is exclusive")
                .with_option(OptionId::new(1), "true")
                .with_option(OptionId::new(2), "false")
                .required(),
            Question::new(QuestionId::new(2), QuestionType::MultipleChoice, "Copy types")
                .with_option(OptionId::new(3), "u32")
                .with_option(OptionId::new(4), "String")
                .with_option(OptionId::new(5), "bool"),
            Question::new(QuestionId::new(3), QuestionType::FreeText, "keyword for traits"),
        ],
        settings,
    )
    .unwrap()
}

fn setup(settings: QuizSettings) -> (InMemoryBackend, QuizLoopService) {
    let clock = fixed_clock();
    let backend = InMemoryBackend::new().with_clock(clock);
    backend
        .insert_quiz(
            quiz(settings),
            [
                (QuestionId::new(1), ExpectedAnswer::option(OptionId::new(1))),
                (
                    QuestionId::new(2),
                    ExpectedAnswer::Options([OptionId::new(3), OptionId::new(5)].into()),
                ),
                (QuestionId::new(3), ExpectedAnswer::Text(vec!["impl".into()])),
            ],
        )
        .unwrap();
    let quizzes: Arc<dyn QuizGateway> = Arc::new(backend.clone());
    let service = QuizLoopService::new(clock, LearnerContext::new(LearnerId::new(1)), quizzes);
    (backend, service)
}

#[tokio::test]
async fn full_attempt_is_graded() {
    let (backend, service) = setup(QuizSettings::default());
    let mut session = service.open(QuizId::new(1)).await.unwrap();
    assert_eq!(session.phase(), Phase::Intro);

    service.start(&mut session).await.unwrap();
    assert_eq!(session.phase(), Phase::Active);

    session.select_option(QuestionId::new(1), OptionId::new(1)).unwrap();
    session.next().unwrap();
    session.select_option(QuestionId::new(2), OptionId::new(3)).unwrap();
    session.select_option(QuestionId::new(2), OptionId::new(5)).unwrap();
    session.next().unwrap();
    session.set_text(QuestionId::new(3), "IMPL ").unwrap();

    service.submit(&mut session).await.unwrap();
    assert_eq!(session.phase(), Phase::Results);
    let outcome = session.outcome().unwrap();
    assert!(outcome.passed);
    assert_eq!(outcome.counts.correct, 3);
    assert_eq!(backend.calls(Operation::SubmitAttempt), 1);

    assert_eq!(service.close(&mut session).await, Some(true));
}

#[tokio::test]
async fn unanswered_timed_quiz_auto_submits_after_a_minute() {
    let (backend, service) = setup(QuizSettings {
        time_limit_minutes: Some(1),
        allow_skip: false,
        ..QuizSettings::default()
    });
    let mut session = service.open(QuizId::new(1)).await.unwrap();
    service.start(&mut session).await.unwrap();

    for _ in 0..59 {
        service.tick(&mut session).await;
    }
    assert_eq!(session.phase(), Phase::Active);
    assert_eq!(session.remaining_seconds(), Some(1));

    service.tick(&mut session).await;
    assert_eq!(session.phase(), Phase::Results);
    assert!(session.timed_out());
    let outcome = session.outcome().unwrap();
    assert_eq!(outcome.counts.unanswered, 3);
    assert!(!outcome.passed);

    for _ in 0..10 {
        service.tick(&mut session).await;
    }
    assert_eq!(backend.calls(Operation::SubmitAttempt), 1);
}

#[tokio::test]
async fn exhausted_attempts_land_in_error_with_reason() {
    let (_backend, service) = setup(QuizSettings {
        max_attempts: Some(1),
        ..QuizSettings::default()
    });
    let mut session = service.open(QuizId::new(1)).await.unwrap();
    service.start(&mut session).await.unwrap();
    service.submit(&mut session).await.unwrap();
    assert!(!session.outcome().unwrap().retry_available());
    service.close(&mut session).await;

    let session = service.open(QuizId::new(1)).await.unwrap();
    assert_eq!(session.phase(), Phase::Error);
    let failure = session.failure().unwrap();
    assert_eq!(failure.message, "no attempts left for this quiz");
    assert_eq!(
        failure.eligibility.as_ref().map(|e: &Eligibility| e.attempts_used),
        Some(1)
    );
}

#[tokio::test]
async fn retry_starts_a_fresh_attempt() {
    let (backend, service) = setup(QuizSettings {
        max_attempts: Some(3),
        ..QuizSettings::default()
    });
    let mut session = service.open(QuizId::new(1)).await.unwrap();
    service.start(&mut session).await.unwrap();
    let first = session.attempt().unwrap().id();
    service.submit(&mut session).await.unwrap();
    assert_eq!(session.outcome().unwrap().attempts_remaining, Some(2));

    service.retry(&mut session).await.unwrap();
    assert_eq!(session.phase(), Phase::Active);
    assert_ne!(session.attempt().unwrap().id(), first);
    assert_eq!(backend.calls(Operation::GetQuiz), 1);
}

#[tokio::test]
async fn closing_mid_attempt_abandons_it() {
    let (backend, service) = setup(QuizSettings::default());
    let mut session = service.open(QuizId::new(1)).await.unwrap();
    service.start(&mut session).await.unwrap();
    assert_eq!(backend.open_attempts(), 1);

    assert_eq!(service.close(&mut session).await, None);
    assert_eq!(backend.calls(Operation::AbandonAttempt), 1);
    assert_eq!(backend.open_attempts(), 0);
}

#[tokio::test]
async fn transient_submit_failure_can_be_retried() {
    let (backend, service) = setup(QuizSettings::default());
    let mut session = service.open(QuizId::new(1)).await.unwrap();
    service.start(&mut session).await.unwrap();
    backend
        .fail_next(
            Operation::SubmitAttempt,
            gateway::GatewayError::Unavailable("connection reset".into()),
        )
        .unwrap();

    service.submit(&mut session).await.unwrap();
    assert_eq!(session.phase(), Phase::Error);
    assert!(session.failure().unwrap().retryable());

    service.retry(&mut session).await.unwrap();
    assert_eq!(session.phase(), Phase::Active);
}

#[tokio::test]
async fn cooldown_after_failure_is_presented() {
    let (backend, service) = setup(QuizSettings::default());
    backend
        .set_cooldown(QuizId::new(1), Duration::minutes(30))
        .unwrap();
    let mut session = service.open(QuizId::new(1)).await.unwrap();
    service.start(&mut session).await.unwrap();
    service.submit(&mut session).await.unwrap();
    assert!(!session.outcome().unwrap().passed);

    service.retry(&mut session).await.unwrap();
    assert_eq!(session.phase(), Phase::Error);
    assert_eq!(
        session.failure().unwrap().cooldown_ends_at(),
        Some(fixed_now() + Duration::minutes(30))
    );
}

#[tokio::test]
async fn system_clock_sessions_run_untimed() {
    let backend = InMemoryBackend::new();
    backend
        .insert_quiz(quiz(QuizSettings::default()), Vec::<(QuestionId, ExpectedAnswer)>::new())
        .unwrap();
    let service = QuizLoopService::new(
        Clock::system(),
        LearnerContext::new(LearnerId::new(2)),
        Arc::new(backend),
    );
    let mut session = service.open(QuizId::new(1)).await.unwrap();
    service.start(&mut session).await.unwrap();
    assert_eq!(session.remaining_seconds(), None);
}
