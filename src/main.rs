use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tokio_stream::StreamExt;

use reporover_core::artifacts::lesson::LessonPlan;
use reporover_core::artifacts::quiz::Quiz;
use reporover_core::bootstrap::{AppTutor, build_tutor, create_host, resolve_config_path};
use reporover_core::config::Config;
use reporover_core::grading::grade_quiz;
use reporover_core::replay::replay;
use reporover_index::graph::to_mermaid;
use reporover_index::host::{LocalDirHost, parse_repo_ref};

/// Turn a repository into grounded explanations, lessons and quizzes.
#[derive(Debug, Parser)]
#[command(name = "reporover")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Grounded learning artifacts for any repository")]
struct Cli {
    /// Config file (default: $REPOROVER_CONFIG, then config/default.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch, extract and embed a repository
    Ingest(IngestArgs),
    /// Explain one file, or one symbol in it
    Explain(ExplainArgs),
    /// Plan a sequence of lessons for a learning goal
    Lessons(LessonsArgs),
    /// Generate a quiz for one lesson of a saved plan
    Quiz(QuizArgs),
    /// Score answers against a saved quiz
    Grade(GradeArgs),
    /// Export the file graph
    Graph(GraphArgs),
    /// Summarize a recorded generation transaction
    Replay(ReplayArgs),
    /// Ask a free-text question, streaming the answer
    Ask(AskArgs),
    /// Drop cached artifacts
    CacheClear(CacheClearArgs),
}

#[derive(Debug, Args)]
struct IngestArgs {
    /// `owner/repo` or a GitHub URL
    repo: String,
    /// Read files from this directory instead of the code host
    #[arg(long)]
    local: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ExplainArgs {
    repo: String,
    path: String,
    /// Symbol to focus on (default: the whole file)
    #[arg(short, long)]
    target: Option<String>,
}

#[derive(Debug, Args)]
struct LessonsArgs {
    repo: String,
    #[arg(short, long)]
    goal: String,
    /// Also write the plan to this file
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct QuizArgs {
    repo: String,
    /// Lesson plan JSON written by `lessons --out`
    #[arg(long)]
    lessons: PathBuf,
    #[arg(long)]
    lesson: String,
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct GradeArgs {
    /// Quiz JSON written by `quiz --out`
    #[arg(long)]
    quiz: PathBuf,
    /// One answer per question, e.g. `Q1=B`
    #[arg(short, long = "answer", value_parser = parse_answer)]
    answers: Vec<(String, String)>,
    /// Generate hints for missed questions from this repository
    #[arg(long)]
    hints: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum GraphFormat {
    #[default]
    Json,
    Mermaid,
}

#[derive(Debug, Args)]
struct GraphArgs {
    repo: String,
    /// Overlay this lesson plan
    #[arg(long)]
    lessons: Option<PathBuf>,
    #[arg(short, long, value_enum, default_value_t = GraphFormat::Json)]
    format: GraphFormat,
}

#[derive(Debug, Args)]
struct ReplayArgs {
    /// Transaction log file (`<data_dir>/transactions/<id>.jsonl`)
    path: PathBuf,
}

#[derive(Debug, Args)]
struct AskArgs {
    repo: String,
    question: String,
}

#[derive(Debug, Args)]
struct CacheClearArgs {
    /// Only this repository (default: everything)
    repo: Option<String>,
}

fn parse_answer(raw: &str) -> Result<(String, String), String> {
    let (qid, answer) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected QID=ANSWER, got '{raw}'"))?;
    let qid = qid.trim();
    if qid.is_empty() {
        return Err(format!("missing question id in '{raw}'"));
    }
    Ok((qid.to_owned(), answer.trim().to_owned()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_subscriber();
    let cli = Cli::parse();

    let config_path = resolve_config_path(cli.config.as_deref());
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    let tutor = build_tutor(config)?;
    run(&tutor, cli.command).await
}

fn init_subscriber() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[allow(clippy::too_many_lines)]
async fn run(tutor: &AppTutor, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Ingest(args) => {
            let repo = parse_repo_ref(&args.repo)?;
            let outcome = match args.local {
                Some(dir) => tutor.ingest(&LocalDirHost::new(dir), &repo).await?,
                None => tutor.ingest(&create_host(tutor.config()), &repo).await?,
            };
            print_json(&outcome)
        }
        Command::Explain(args) => {
            let repo_id = parse_repo_ref(&args.repo)?.id();
            let explanation = tutor
                .explain_file(&repo_id, &args.path, args.target.as_deref())
                .await?;
            print_json(&explanation)
        }
        Command::Lessons(args) => {
            let repo_id = parse_repo_ref(&args.repo)?.id();
            let plan = tutor.generate_lessons(&repo_id, &args.goal).await?;
            if let Some(out) = &args.out {
                write_json(out, &plan)?;
            }
            print_json(&plan)
        }
        Command::Quiz(args) => {
            let repo_id = parse_repo_ref(&args.repo)?.id();
            let plan: LessonPlan = read_json(&args.lessons)?;
            let Some(lesson) = plan.lesson(&args.lesson) else {
                bail!("lesson '{}' not found in {}", args.lesson, args.lessons.display());
            };
            let quiz = tutor.generate_quiz(&repo_id, lesson).await?;
            if let Some(out) = &args.out {
                write_json(out, &quiz)?;
            }
            print_json(&quiz)
        }
        Command::Grade(args) => {
            let quiz: Quiz = read_json(&args.quiz)?;
            let responses: HashMap<String, String> = args.answers.into_iter().collect();
            let report = grade_quiz(&quiz, &responses);
            print_json(&report)?;
            if let Some(repo) = args.hints {
                let repo_id = parse_repo_ref(&repo)?.id();
                for result in report.results.iter().filter(|r| !r.correct) {
                    let Some(question) = quiz.question(&result.qid) else {
                        continue;
                    };
                    match tutor.hint(&repo_id, question).await {
                        Ok(hint) => print_json(&hint)?,
                        Err(e) => tracing::warn!(qid = %result.qid, "hint unavailable: {e}"),
                    }
                }
            }
            Ok(())
        }
        Command::Graph(args) => {
            let repo_id = parse_repo_ref(&args.repo)?.id();
            let plan: Option<LessonPlan> = args
                .lessons
                .as_deref()
                .map(read_json::<LessonPlan>)
                .transpose()?;
            let graph = tutor.graph(&repo_id, plan.as_ref()).await?;
            match args.format {
                GraphFormat::Json => print_json(&graph),
                GraphFormat::Mermaid => {
                    println!("{}", to_mermaid(&graph));
                    Ok(())
                }
            }
        }
        Command::Ask(args) => {
            let repo_id = parse_repo_ref(&args.repo)?.id();
            let mut answer = tutor.ask(&repo_id, &args.question).await?;
            tracing::debug!(contexts = ?answer.context_ids, "streaming answer");
            let mut stdout = std::io::stdout().lock();
            while let Some(chunk) = answer.stream.next().await {
                stdout.write_all(chunk?.as_bytes())?;
                stdout.flush()?;
            }
            writeln!(stdout)?;
            Ok(())
        }
        Command::CacheClear(args) => {
            let repo_id = args
                .repo
                .as_deref()
                .map(|r| parse_repo_ref(r).map(|r| r.id()))
                .transpose()?;
            let removed = tutor.clear_cache(repo_id.as_deref()).await?;
            tracing::info!(removed, "cache cleared");
            Ok(())
        }
        Command::Replay(args) => {
            let summary = replay(&args.path)
                .await
                .with_context(|| format!("failed to replay {}", args.path.display()))?;
            print_json(&summary)
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
