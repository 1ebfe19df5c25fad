use chrono::Duration;

use gateway::{ExpectedAnswer, GatewayError, InMemoryBackend};
use learn_core::Clock;
use learn_core::model::{
    Course, CourseId, Lesson, LessonId, OptionId, Question, QuestionId, QuestionType, Quiz,
    QuizId, QuizSettings, Rewards, Theme, ThemeId,
};

pub const DEMO_COURSE: CourseId = CourseId::new(1);
pub const DEMO_QUIZ: QuizId = QuizId::new(1);

/// In-memory backend seeded with a small course and its checkpoint quiz.
pub fn seed(clock: Clock) -> Result<InMemoryBackend, GatewayError> {
    let backend = InMemoryBackend::new().with_clock(clock);

    let course = Course::new(
        DEMO_COURSE,
        "Rust Foundations",
        vec![
            Theme::new(ThemeId::new(1), "Ownership")
                .with_lesson(Lesson::new(LessonId::new(1), "Moves and copies"))
                .with_lesson(Lesson::new(LessonId::new(2), "Borrowing").gated())
                .with_lesson(
                    Lesson::new(LessonId::new(3), "Checkpoint")
                        .gated()
                        .with_quiz(DEMO_QUIZ),
                ),
            Theme::new(ThemeId::new(2), "Traits")
                .gated(60)
                .with_lesson(Lesson::new(LessonId::new(4), "Trait objects"))
                .with_lesson(Lesson::new(LessonId::new(5), "Generics")),
            Theme::new(ThemeId::new(3), "Tooling")
                .with_lesson(Lesson::new(LessonId::new(6), "Cargo workspaces")),
        ],
    )
    .map_err(learn_core::Error::from)?;
    backend.insert_course(course)?;

    let mut quiz = Quiz::new(
        DEMO_QUIZ,
        "Ownership checkpoint",
        vec![
            Question::new(
                QuestionId::new(1),
                QuestionType::SingleChoice,
                "What happens to a String after `let b = a;`?",
            )
            .with_option(OptionId::new(1), "It is copied")
            .with_option(OptionId::new(2), "It is moved into b")
            .with_option(OptionId::new(3), "It is dropped")
            .required(),
            Question::new(
                QuestionId::new(2),
                QuestionType::MultipleChoice,
                "Which of these types are Copy?",
            )
            .with_option(OptionId::new(4), "u64")
            .with_option(OptionId::new(5), "Vec<u8>")
            .with_option(OptionId::new(6), "char")
            .with_option(OptionId::new(7), "&str")
            .with_points(2),
            Question::new(
                QuestionId::new(3),
                QuestionType::TrueFalse,
                "Two &mut borrows of the same value may coexist.",
            )
            .with_option(OptionId::new(8), "True")
            .with_option(OptionId::new(9), "False")
            .required(),
            Question::new(
                QuestionId::new(4),
                QuestionType::FreeText,
                "Which trait runs code when a value goes out of scope?",
            ),
        ],
        QuizSettings {
            time_limit_minutes: Some(2),
            passing_score: 60,
            max_attempts: Some(3),
            shuffle_options: true,
            ..QuizSettings::default()
        },
    )
    .map_err(learn_core::Error::from)?;
    quiz.description = Some("Four questions on moves, borrows and Copy.".into());

    backend.insert_quiz(
        quiz,
        [
            (QuestionId::new(1), ExpectedAnswer::option(OptionId::new(2))),
            (
                QuestionId::new(2),
                ExpectedAnswer::Options([OptionId::new(4), OptionId::new(6), OptionId::new(7)].into()),
            ),
            (QuestionId::new(3), ExpectedAnswer::option(OptionId::new(9))),
            (QuestionId::new(4), ExpectedAnswer::Text(vec!["Drop".into()])),
        ],
    )?;
    backend.set_cooldown(DEMO_QUIZ, Duration::minutes(1))?;
    backend.set_rewards(
        DEMO_QUIZ,
        Rewards {
            xp: 50,
            coins: 5,
            badges: vec!["Borrow Checker Whisperer".into()],
        },
    )?;

    Ok(backend)
}
