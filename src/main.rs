// Credpoints CLI - thin shell over the query resolver
// The conversational/agent layer is out of scope; this binary only parses
// raw badge JSON into the store and forwards query text to answer().

use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use credpoints::{
    fmt_points, NoFetcher, ProfileSummary, RawBadge, Resolver, ScoringTable, SqliteStore,
};

fn main() -> Result<()> {
    init_logging();

    let args: Vec<String> = env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("import") => {
            let path = args
                .get(2)
                .context("usage: credpoints import <badges.json>")?;
            run_import(path)
        }
        Some("sync") => {
            let url = args
                .get(2)
                .context("usage: credpoints sync <profile-url>")?;
            run_sync(url)
        }
        Some("ask") => {
            let json = args.iter().any(|a| a == "--json");
            let query: Vec<&str> = args[2..]
                .iter()
                .map(String::as_str)
                .filter(|a| *a != "--json")
                .collect();
            let query = query.join(" ");
            if query.trim().is_empty() {
                anyhow::bail!("usage: credpoints ask \"<query>\" [--json]");
            }
            run_ask(&query, json)
        }
        Some("--version") => {
            println!("credpoints {}", credpoints::VERSION);
            Ok(())
        }
        None => run_repl(),
        Some(other) => {
            eprintln!("unknown command: {other}");
            eprintln!("usage: credpoints [import <badges.json> | sync <profile-url> | ask \"<query>\"]");
            std::process::exit(2);
        }
    }
}

fn init_logging() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();
}

fn db_path() -> PathBuf {
    env::var_os("CREDPOINTS_DB")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("credly_badges.db"))
}

fn scoring_table() -> Result<ScoringTable> {
    match env::var_os("CREDPOINTS_SCORING") {
        Some(path) => ScoringTable::from_file(path),
        None => Ok(ScoringTable::builtin()),
    }
}

fn open_resolver() -> Result<Resolver<SqliteStore, NoFetcher>> {
    let store = SqliteStore::open(db_path())?;
    Resolver::new(store, NoFetcher, scoring_table()?)
}

fn run_import(path: &str) -> Result<()> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read badge file: {path}"))?;
    let raws: Vec<RawBadge> =
        serde_json::from_str(&content).context("Failed to parse badge JSON")?;

    let mut resolver = open_resolver()?;
    let summary = resolver.import_raw(&raws)?;
    print_summary(&summary);
    Ok(())
}

fn run_sync(url: &str) -> Result<()> {
    let mut resolver = open_resolver()?;
    let summary = resolver
        .sync_profile(url)
        .context("Profile sync failed (is a fetch collaborator configured?)")?;
    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &ProfileSummary) {
    println!(
        "Imported {} badges ({} skipped), {} valid points",
        summary.imported,
        summary.skipped,
        fmt_points(summary.totals.total),
    );
    for line in &summary.totals.lines {
        println!(
            "  {}: {} badges, {} points",
            line.category,
            line.count,
            fmt_points(line.effective_points),
        );
    }
}

fn run_ask(query: &str, json: bool) -> Result<()> {
    let mut resolver = open_resolver()?;
    let answer = resolver.answer(query)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
    } else {
        println!("{}", answer.message);
    }
    Ok(())
}

fn run_repl() -> Result<()> {
    println!("Credly certification tracker ({})", credpoints::VERSION);
    println!("Ask for your total points, a badge URL, or a certification name.");
    println!("Type 'quit' or 'exit' to end the session.\n");

    let mut resolver = open_resolver()?;
    let stdin = io::stdin();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // EOF
        }
        let query = line.trim();

        if query.is_empty() {
            continue;
        }
        if matches!(query.to_lowercase().as_str(), "quit" | "exit" | "bye") {
            break;
        }

        match resolver.answer(query) {
            Ok(answer) => println!("{}\n", answer.message),
            Err(err) => eprintln!("error: {err:#}\n"),
        }
    }

    Ok(())
}
