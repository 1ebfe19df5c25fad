mod demo;
mod terminal;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use gateway::{Gateways, HttpConfig, LearnerContext};
use learn_core::Clock;
use learn_core::model::{CourseId, LearnerId, LessonId, QuizId};
use services::{
    CourseProgressService, CourseView, Effect, Phase, QuizLoopService, QuizSession, Reply,
    SessionError,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing_subscriber::EnvFilter;

use crate::terminal::Input;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidId { flag: &'static str, raw: String },
    MissingTarget { flag: &'static str },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidId { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::MissingTarget { flag } => write!(f, "{flag} is required"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn require_id<T: FromStr>(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<T, ArgsError> {
    let value = require_value(args, flag)?;
    value
        .parse()
        .map_err(|_| ArgsError::InvalidId { flag, raw: value })
}

fn env_id<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|value| value.parse().ok())
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- progress --course <id> [--learner <id>] [--enroll] [--complete <lesson>]...");
    eprintln!("  cargo run -p app -- quiz --quiz <id> [--course <id>] [--learner <id>] [--enroll] [--complete <lesson>]...");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --demo       use the built-in sample course and quiz instead of the API");
    eprintln!("  --course     with `quiz`, refuse quizzes whose lesson is still locked");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  LEARN_LEARNER_ID, LEARN_COURSE_ID, LEARN_QUIZ_ID");
    eprintln!("  LEARN_API_BASE_URL, LEARN_API_TOKEN, LEARN_API_TIMEOUT_SECS");
    eprintln!("  RUST_LOG (default: info, written to stderr)");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Progress,
    Quiz,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "progress" => Some(Self::Progress),
            "quiz" => Some(Self::Quiz),
            _ => None,
        }
    }
}

struct Args {
    learner_id: LearnerId,
    course_id: Option<CourseId>,
    quiz_id: Option<QuizId>,
    enroll: bool,
    complete: Vec<LessonId>,
    demo: bool,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut parsed = Self {
            learner_id: env_id("LEARN_LEARNER_ID").unwrap_or_else(|| LearnerId::new(1)),
            course_id: env_id("LEARN_COURSE_ID"),
            quiz_id: env_id("LEARN_QUIZ_ID"),
            enroll: false,
            complete: Vec::new(),
            demo: false,
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--learner" => parsed.learner_id = require_id(args, "--learner")?,
                "--course" => parsed.course_id = Some(require_id(args, "--course")?),
                "--quiz" => parsed.quiz_id = Some(require_id(args, "--quiz")?),
                "--complete" => parsed.complete.push(require_id(args, "--complete")?),
                "--enroll" => parsed.enroll = true,
                "--demo" => parsed.demo = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(parsed)
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);
    let cmd = match argv.next().as_deref() {
        None | Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            ArgsError::UnknownArg(first.to_string())
        })?,
    };

    let args = Args::parse(&mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    // Collaborators are chosen here so services stay transport-agnostic.
    let clock = Clock::system();
    let gateways = if args.demo {
        Gateways::in_memory(demo::seed(clock)?)
    } else {
        Gateways::http(HttpConfig::from_env())?
    };
    let learner = LearnerContext::new(args.learner_id);
    let progress = CourseProgressService::new(learner.clone(), gateways.progress.clone());

    match cmd {
        Command::Progress => {
            let course_id = args
                .course_id
                .or(args.demo.then_some(demo::DEMO_COURSE))
                .ok_or(ArgsError::MissingTarget { flag: "--course" })?;
            let view = prepare_course(&progress, &args, course_id).await?;
            terminal::render_course(&view);
            Ok(())
        }
        Command::Quiz => {
            let quiz_id = args
                .quiz_id
                .or(args.demo.then_some(demo::DEMO_QUIZ))
                .ok_or(ArgsError::MissingTarget { flag: "--quiz" })?;
            if let Some(course_id) = args.course_id {
                let view = prepare_course(&progress, &args, course_id).await?;
                let lesson = view.ensure_quiz_unlocked(quiz_id)?;
                tracing::info!(lesson_id = %lesson.lesson_id, %quiz_id, "quiz unlocked");
            }
            let service = QuizLoopService::new(clock, learner, gateways.quizzes);
            run_quiz(service, quiz_id).await
        }
    }
}

async fn prepare_course(
    progress: &CourseProgressService,
    args: &Args,
    course_id: CourseId,
) -> Result<CourseView, Box<dyn std::error::Error>> {
    let mut view = if args.enroll {
        progress.enroll(course_id).await?
    } else {
        progress.load(course_id).await?
    };
    for lesson_id in &args.complete {
        let (done, refreshed) = progress.complete_lesson(&view, *lesson_id, &[]).await?;
        println!(
            "lesson {lesson_id} done: theme {:.0}%, course {:.0}%",
            done.theme_progress_percentage, done.course_progress_percentage
        );
        view = refreshed;
    }
    Ok(view)
}

/// Hand an effect to a background task; its reply comes back over `replies`.
fn dispatch(service: &QuizLoopService, replies: &mpsc::Sender<Reply>, effect: Effect) {
    if effect.is_none() {
        return;
    }
    let service = service.clone();
    let replies = replies.clone();
    tokio::spawn(async move {
        if let Some(reply) = service.execute(effect).await {
            // the loop may already be gone
            let _ = replies.send(reply).await;
        }
    });
}

async fn run_quiz(
    service: QuizLoopService,
    quiz_id: QuizId,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = service.session(quiz_id);
    let (replies_tx, mut replies) = mpsc::channel::<Reply>(4);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    dispatch(&service, &replies_tx, session.open()?);
    terminal::render(&session);

    while !session.is_terminal() {
        tokio::select! {
            _ = ticker.tick() => {
                let effect = session.tick();
                if effect.is_none() {
                    announce_remaining(&session);
                } else {
                    println!("\ntime is up");
                    dispatch(&service, &replies_tx, effect);
                    terminal::render(&session);
                }
            }
            Some(reply) = replies.recv() => {
                let effect = session.apply(reply);
                dispatch(&service, &replies_tx, effect);
                terminal::render(&session);
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                handle_line(&service, &replies_tx, &mut session, &line).await;
            }
        }
    }

    if !session.is_terminal() {
        close_session(&service, &mut session).await;
    }
    Ok(())
}

fn announce_remaining(session: &QuizSession) {
    if session.phase() != Phase::Active {
        return;
    }
    if let Some(secs) = session
        .remaining_seconds()
        .filter(|secs| *secs > 0 && (*secs <= 10 || secs % 30 == 0))
    {
        println!("  {secs}s left");
    }
}

async fn handle_line(
    service: &QuizLoopService,
    replies: &mpsc::Sender<Reply>,
    session: &mut QuizSession,
    line: &str,
) {
    let Some(input) = Input::parse(line) else {
        println!("unknown command, `?` for help");
        return;
    };

    let result = match input {
        Input::Help => {
            terminal::print_quiz_help();
            return;
        }
        Input::Quit => {
            close_session(service, session).await;
            return;
        }
        Input::Start => session.start().map(|e| dispatch(service, replies, e)),
        Input::Submit => session.submit().map(|e| dispatch(service, replies, e)),
        Input::Retry => session.retry().map(|e| dispatch(service, replies, e)),
        Input::Choose(position) => choose(session, position),
        Input::Text(text) => match session.current_question().map(|q| q.id) {
            Some(question_id) => session.set_text(question_id, text).map(|_| ()),
            None => Ok(()),
        },
        Input::Next => session.next().map(|_| ()),
        Input::Previous => session.previous().map(|_| ()),
        Input::Goto(number) => session.navigate(number - 1).map(|_| ()),
    };

    match result {
        Ok(()) => terminal::render(session),
        Err(SessionError::RequiredUnanswered { missing }) => {
            let numbers: Vec<String> = missing
                .iter()
                .filter_map(|id| {
                    session
                        .attempt()
                        .and_then(|a| a.question_order().iter().position(|q| q == id))
                })
                .map(|index| (index + 1).to_string())
                .collect();
            println!("answer the required questions first: {}", numbers.join(", "));
        }
        Err(err) => println!("{err}"),
    }
}

fn choose(session: &mut QuizSession, position: usize) -> Result<(), SessionError> {
    let Some(question_id) = session.current_question().map(|q| q.id) else {
        return Ok(());
    };
    let option_id = session
        .options(question_id)
        .get(position - 1)
        .map(|option| option.id);
    match option_id {
        Some(option_id) => session.select_option(question_id, option_id).map(|_| ()),
        None => {
            println!("no option {position}");
            Ok(())
        }
    }
}

async fn close_session(service: &QuizLoopService, session: &mut QuizSession) {
    match service.close(session).await {
        Some(true) => println!("quiz passed, well done"),
        Some(false) => println!("quiz closed, not passed this time"),
        None => println!("quiz closed"),
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
