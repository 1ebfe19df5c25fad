//! Plain-text rendering and line commands for the terminal front-end.

use learn_core::ThemeStatus;
use learn_core::model::{OptionId, QuestionType, Response};
use services::{CourseView, Phase, QuizSession};

/// One line typed by the learner during a quiz.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Start,
    /// 1-based position in the displayed option list.
    Choose(usize),
    Text(String),
    Next,
    Previous,
    /// 1-based question number.
    Goto(usize),
    Submit,
    Retry,
    Quit,
    Help,
}

impl Input {
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let (head, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(head, rest)| (head, rest.trim()));

        match head {
            "start" => Some(Input::Start),
            "n" | "next" => Some(Input::Next),
            "p" | "prev" => Some(Input::Previous),
            "g" | "go" => rest.parse().ok().filter(|n| *n > 0).map(Input::Goto),
            "t" | "text" if !rest.is_empty() => Some(Input::Text(rest.to_string())),
            "submit" => Some(Input::Submit),
            "retry" => Some(Input::Retry),
            "q" | "quit" => Some(Input::Quit),
            "?" | "help" => Some(Input::Help),
            digits => digits.parse().ok().filter(|n| *n > 0).map(Input::Choose),
        }
    }
}

pub fn print_quiz_help() {
    println!("  start        begin the attempt");
    println!("  <n>          toggle/select option n");
    println!("  t <text>     answer a free-text question");
    println!("  n / p        next / previous question");
    println!("  g <n>        go to question n");
    println!("  submit       hand in the attempt");
    println!("  retry        try again when allowed");
    println!("  q            close the quiz");
}

fn clock(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Print whatever the current phase shows.
pub fn render(session: &QuizSession) {
    match session.phase() {
        Phase::Idle | Phase::Closed => {}
        Phase::Loading => println!("loading..."),
        Phase::Submitting => println!("submitting..."),
        Phase::Intro => render_intro(session),
        Phase::Active => render_question(session),
        Phase::Results => render_results(session),
        Phase::Error => {
            if let Some(failure) = session.failure() {
                println!("\n! {}", failure.message);
                if failure.retryable() {
                    println!("type `retry` to try again or `q` to close");
                } else {
                    println!("type `q` to close");
                }
            }
        }
    }
}

fn render_intro(session: &QuizSession) {
    let Some(quiz) = session.quiz() else {
        return;
    };
    println!("\n== {} ==", quiz.title);
    if let Some(description) = &quiz.description {
        println!("{description}");
    }
    println!(
        "{} questions, {} points, pass at {}%",
        quiz.questions.len(),
        quiz.total_points(),
        quiz.settings.passing_score
    );
    if let Some(secs) = quiz.settings.time_limit_secs() {
        println!("time limit: {}", clock(secs));
    }
    if let Some(max) = quiz.settings.max_attempts {
        println!("attempts allowed: {max}");
    }
    println!("type `start` to begin, `?` for commands");
}

fn render_question(session: &QuizSession) {
    let (Some(progress), Some(question)) = (session.progress(), session.current_question()) else {
        return;
    };

    let timer = progress
        .remaining_seconds
        .map(|secs| format!("  [{} left]", clock(secs)))
        .unwrap_or_default();
    println!(
        "\nQuestion {}/{}  ({} answered){timer}",
        progress.current_index + 1,
        progress.total,
        progress.answered
    );
    let marker = if question.required { " *" } else { "" };
    println!("{}{marker}", question.prompt);

    let response = session.response(question.id);
    match question.kind {
        QuestionType::FreeText => {
            let text = match response {
                Some(Response::Text(text)) => text.as_str(),
                _ => "",
            };
            println!("  answer: {text}");
            println!("  (t <text> to answer)");
        }
        QuestionType::SingleChoice | QuestionType::TrueFalse | QuestionType::MultipleChoice => {
            let selected = |id: OptionId| matches!(response, Some(Response::Choice(set)) if set.contains(&id));
            for (index, option) in session.options(question.id).into_iter().enumerate() {
                let mark = if selected(option.id) { "x" } else { " " };
                println!("  [{mark}] {}. {}", index + 1, option.label);
            }
            if question.kind == QuestionType::MultipleChoice {
                println!("  (select all that apply)");
            }
        }
    }
    if progress.is_last() {
        println!("last question, type `submit` when ready");
    }
}

fn render_results(session: &QuizSession) {
    let Some(outcome) = session.outcome() else {
        return;
    };
    if session.timed_out() {
        println!("\ntime ran out, your answers were submitted");
    }
    println!(
        "\nscore {:.0}% ({}/{} points): {}",
        outcome.score,
        outcome.points_earned,
        outcome.points_possible,
        if outcome.passed { "passed" } else { "not passed" }
    );
    println!(
        "correct {}, incorrect {}, unanswered {}",
        outcome.counts.correct, outcome.counts.incorrect, outcome.counts.unanswered
    );
    if let Some(rewards) = &outcome.rewards {
        println!("+{} xp, +{} coins", rewards.xp, rewards.coins);
        for badge in &rewards.badges {
            println!("badge earned: {badge}");
        }
    }
    if outcome.retry_available() {
        let left = outcome
            .attempts_remaining
            .map(|n| format!(" ({n} left)"))
            .unwrap_or_default();
        println!("type `retry` to go again{left} or `q` to close");
    } else {
        println!("type `q` to close");
    }
}

/// Print the resolved course outline.
pub fn render_course(view: &CourseView) {
    println!("\n== {} ==", view.course.title);
    if view.is_enrolled() {
        println!(
            "progress {:.0}%, {} of {} visible lessons done",
            view.progress_percentage(),
            view.resolved.completed_lessons(),
            view.resolved.total_lessons()
        );
    } else {
        println!("not enrolled (use --enroll)");
    }

    for (theme, resolved) in view.course.themes.iter().zip(&view.resolved.themes) {
        let status = match resolved.status {
            ThemeStatus::Locked => "locked",
            ThemeStatus::InProgress => "in progress",
            ThemeStatus::Completed => "completed",
        };
        println!(
            "\n{} [{status}, {:.0}%]",
            theme.title, resolved.progress_percentage
        );
        for lesson in &resolved.lessons {
            let title = theme
                .lessons
                .iter()
                .find(|l| l.id == lesson.lesson_id)
                .map_or("?", |l| l.title.as_str());
            let mark = match (lesson.completed, lesson.locked) {
                (true, _) => "x",
                (false, true) => "#",
                (false, false) => " ",
            };
            let quiz = lesson
                .quiz_id
                .map(|id| format!("  (quiz {id})"))
                .unwrap_or_default();
            println!("  [{mark}] {} {title}{quiz}", lesson.lesson_id);
        }
    }

    if let Some(next) = view.resolved.next_lesson() {
        println!("\ncontinue with lesson {}", next.lesson_id);
    }
}
