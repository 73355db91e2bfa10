use std::fmt;

use lesson_core::model::{
    Challenge, ChallengeId, ChallengeKind, ChallengeOption, LessonId, OptionId, UserId,
};
use lesson_core::time::Clock;
use storage::repository::{LessonRecord, Storage};

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    lesson_id: LessonId,
    title: String,
    user: Option<UserId>,
    completed: u32,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidLessonId { raw: String },
    InvalidDbUrl { raw: String },
    InvalidUser { raw: String },
    InvalidCompleted { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidLessonId { raw } => write!(f, "invalid --lesson-id value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidUser { raw } => write!(f, "invalid --user value: {raw:?}"),
            ArgsError::InvalidCompleted { raw } => write!(f, "invalid --completed value: {raw}"),
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

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("LESSON_DB_URL").unwrap_or_else(|_| "sqlite:lessons.sqlite3?mode=rwc".into());
        let mut lesson_id = std::env::var("LESSON_SEED_LESSON_ID")
            .ok()
            .and_then(|value| value.parse::<LessonId>().ok())
            .unwrap_or_else(|| LessonId::new(1));
        let mut title = "Greetings".to_string();
        let mut user = None;
        let mut completed = 0;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--lesson-id" => {
                    let value = require_value(&mut args, "--lesson-id")?;
                    lesson_id = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidLessonId { raw: value.clone() })?;
                }
                "--title" => {
                    title = require_value(&mut args, "--title")?;
                }
                "--user" => {
                    let value = require_value(&mut args, "--user")?;
                    user = Some(
                        value
                            .parse::<UserId>()
                            .map_err(|_| ArgsError::InvalidUser { raw: value.clone() })?,
                    );
                }
                "--completed" => {
                    let value = require_value(&mut args, "--completed")?;
                    completed = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidCompleted { raw: value.clone() })?;
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            lesson_id,
            title,
            user,
            completed,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:lessons.sqlite3?mode=rwc)");
    eprintln!("  --lesson-id <id>          Lesson id to upsert (default: 1)");
    eprintln!("  --title <text>            Lesson title (default: Greetings)");
    eprintln!("  --user <id>               Record progress for this user");
    eprintln!("  --completed <n>           Mark the first n challenges completed for --user");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  LESSON_DB_URL, LESSON_SEED_LESSON_ID");
}

/// Five challenges covering every variant, ids derived from the lesson id.
fn demo_challenges(lesson_id: LessonId) -> Result<Vec<Challenge>, Box<dyn std::error::Error>> {
    let base = lesson_id.value().saturating_mul(100);
    let cid = |n: u64| ChallengeId::new(base + n);
    let oid = |n: u64| OptionId::new(base.saturating_mul(10) + n);

    Ok(vec![
        Challenge::new(
            cid(1),
            ChallengeKind::VideoLearn,
            1,
            "hello",
            Some("https://www.youtube.com/embed/SsLvqfTXo78".into()),
            Vec::new(),
        )?,
        Challenge::new(
            cid(2),
            ChallengeKind::StandardChoice,
            2,
            "Which sign means \"hello\"?",
            None,
            vec![
                ChallengeOption::new(oid(1), "hello", true).with_media("/signs/hello.gif"),
                ChallengeOption::new(oid(2), "goodbye", false).with_media("/signs/goodbye.gif"),
                ChallengeOption::new(oid(3), "thank you", false).with_media("/signs/thanks.gif"),
            ],
        )?,
        Challenge::new(
            cid(3),
            ChallengeKind::Assist,
            3,
            "thank you",
            None,
            vec![
                ChallengeOption::new(oid(4), "please", false),
                ChallengeOption::new(oid(5), "thank you", true),
            ],
        )?,
        Challenge::new(
            cid(4),
            ChallengeKind::VideoSelect,
            4,
            "What is being signed?",
            Some("https://www.youtube.com/embed/EHgiGwl3B3M".into()),
            vec![
                ChallengeOption::new(oid(6), "yes", false),
                ChallengeOption::new(oid(7), "goodbye", true),
                ChallengeOption::new(oid(8), "no", false),
            ],
        )?,
        Challenge::new(
            cid(5),
            ChallengeKind::SignDetect,
            5,
            "Perform the sign: \"hello\"",
            None,
            Vec::new(),
        )?,
    ])
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;
    let challenges = demo_challenges(args.lesson_id)?;
    let lesson = LessonRecord {
        id: args.lesson_id,
        title: args.title.clone(),
        challenges,
    };
    storage.lessons.insert_lesson(&lesson).await?;

    let mut marked = 0;
    if let Some(user) = &args.user {
        let clock = Clock::default();
        let take = usize::try_from(args.completed).unwrap_or(usize::MAX);
        for challenge in lesson.challenges.iter().take(take) {
            storage
                .progress
                .upsert_challenge_progress(user, challenge.id(), clock.now())
                .await?;
            marked += 1;
        }
    }

    println!(
        "Seeded lesson {} ({}) with {} challenges into {}; {} marked completed",
        args.lesson_id,
        args.title,
        lesson.challenges.len(),
        args.db_url,
        marked
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
