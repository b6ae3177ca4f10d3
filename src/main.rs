use std::error::Error;
use std::io::{self, BufRead, Write};
use std::time::Instant;

use chrono::Utc;
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::warn;

use lexis::config::{self, PracticeSettings};
use lexis::db::{Database, NewWord};
use lexis::engine::{due_for_review, AnswerOutcome, Session, Strategy};
use lexis::logging;
use lexis::models::{JsonOutput, PracticeMode, Translation, WordList};

const DEFAULT_LANGUAGE: &str = "und";

#[derive(Parser)]
#[command(name = "lexis")]
#[command(about = "Adaptive vocabulary practice with spaced repetition")]
#[command(version)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Manage word lists
    #[command(subcommand)]
    List(ListCommands),

    /// Manage words
    #[command(subcommand)]
    Word(WordCommands),

    /// Show the words of a list that are due, most overdue first
    Due {
        /// List id or name
        list: String,
    },

    /// Run an interactive practice session
    Practice {
        /// List id or name
        list: String,

        /// interleaved, retrieval_practice or adaptive_difficulty
        #[arg(long, short)]
        strategy: Option<String>,

        /// flashcards, writing, multiple_choice or listening
        #[arg(long, short)]
        mode: Option<String>,

        /// Seed for reproducible word selection
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Show past session results, newest first
    History {
        /// Only results for this list (id or name)
        #[arg(long, short)]
        list: Option<String>,

        /// Maximum number of results
        #[arg(long, short = 'n', default_value_t = 10)]
        limit: usize,
    },

    /// Show learning statistics
    Stats,

    /// Show or change practice settings
    #[command(subcommand)]
    Settings(SettingsCommands),
}

#[derive(Subcommand)]
enum ListCommands {
    /// Create a word list
    Add {
        /// List name
        name: String,

        /// List description
        #[arg(long, short)]
        description: Option<String>,

        /// Language of the prompts
        #[arg(long)]
        from: Option<String>,

        /// Language of the answers
        #[arg(long)]
        to: Option<String>,
    },

    /// List all word lists
    Ls,

    /// Show list details
    Show {
        /// List id or name
        list: String,
    },

    /// Rename a list
    Rename {
        /// List id or name
        list: String,

        /// New name
        name: String,
    },

    /// Delete a list and its words
    Delete {
        /// List id or name
        list: String,
    },

    /// Copy a list with its words and review state
    Fork {
        /// List id or name
        list: String,

        /// Name of the copy
        #[arg(long, short)]
        name: Option<String>,
    },
}

#[derive(Subcommand)]
enum WordCommands {
    /// Add a word with one or more accepted translations
    Add {
        /// List id or name
        list: String,

        /// The prompt shown during practice
        text: String,

        /// Accepted answers; the first one is primary
        #[arg(required = true)]
        translations: Vec<String>,

        /// Word category, e.g. noun or verb
        #[arg(long, short, default_value = "general")]
        category: String,

        /// Relative difficulty, greater than zero
        #[arg(long, default_value_t = 1.0)]
        complexity: f64,

        /// Language code of the translations (defaults to the list's)
        #[arg(long)]
        lang: Option<String>,
    },

    /// List the words of a list
    Ls {
        /// List id or name
        list: String,
    },

    /// Show word details
    Show {
        /// Word ID
        id: String,
    },

    /// Delete a word
    Delete {
        /// Word ID
        id: String,
    },
}

#[derive(Subcommand)]
enum SettingsCommands {
    /// Print the current settings
    Show,

    /// Change one setting, e.g. `general.error_tolerance 90`
    Set {
        /// Dotted setting key
        key: String,

        /// New value
        value: String,
    },

    /// Restore the defaults
    Reset,
}

fn main() {
    logging::init_tracing();
    let cli = Cli::parse();
    let json = cli.json;

    if let Err(e) = run(cli) {
        if json {
            if let Ok(out) = serde_json::to_string(&JsonOutput::<()>::err(e.to_string())) {
                println!("{}", out);
            }
        } else {
            eprintln!("Error: {}", e);
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let db_path = config::db_path();
    let db = Database::open(&db_path)?;
    db.init()?;

    match cli.command {
        Commands::Init => {
            if cli.json {
                print_json(())?;
            } else {
                println!("Database initialized at: {}", db_path.display());
            }
        }

        Commands::List(list_cmd) => match list_cmd {
            ListCommands::Add {
                name,
                description,
                from,
                to,
            } => {
                let id = db.create_list(&name, description.as_deref(), from.as_deref(), to.as_deref())?;
                if cli.json {
                    print_json(serde_json::json!({ "id": id, "name": name }))?;
                } else {
                    println!("Added list '{}' with ID: {}", name, id);
                }
            }

            ListCommands::Ls => {
                let lists = db.list_lists()?;
                if cli.json {
                    print_json(&lists)?;
                } else if lists.is_empty() {
                    println!("No lists found.");
                } else {
                    println!("{:<38} {:<30} {:>6} LANGS", "ID", "NAME", "WORDS");
                    println!("{}", "-".repeat(90));
                    for list in lists {
                        println!(
                            "{:<38} {:<30} {:>6} {}",
                            list.id,
                            truncate(&list.name, 28),
                            list.word_count,
                            languages(&list)
                        );
                    }
                }
            }

            ListCommands::Show { list } => {
                let list = resolve_list(&db, &list)?;
                let words = db.list_words(&list.id)?;
                let due = due_for_review(&words, Utc::now()).len();

                if cli.json {
                    print_json(serde_json::json!({ "list": list, "due": due }))?;
                } else {
                    println!("List: {}", list.name);
                    println!("ID: {}", list.id);
                    if let Some(desc) = &list.description {
                        println!("Description: {}", desc);
                    }
                    println!("Languages: {}", languages(&list));
                    if let Some(source) = &list.forked_from {
                        println!("Forked from: {}", source);
                    }
                    println!("Words: {} ({} due)", list.word_count, due);
                    println!("Created: {}", list.created_at);
                    println!("Updated: {}", list.updated_at);
                }
            }

            ListCommands::Rename { list, name } => {
                let list = resolve_list(&db, &list)?;
                db.update_list(&list.id, Some(&name), None)?;
                if cli.json {
                    print_json(())?;
                } else {
                    println!("Renamed '{}' to '{}'.", list.name, name);
                }
            }

            ListCommands::Delete { list } => {
                let list = resolve_list(&db, &list)?;
                db.delete_list(&list.id)?;
                if cli.json {
                    print_json(())?;
                } else {
                    println!("List '{}' deleted.", list.name);
                }
            }

            ListCommands::Fork { list, name } => {
                let list = resolve_list(&db, &list)?;
                let fork_id = db
                    .fork_list(&list.id, name.as_deref())?
                    .ok_or_else(|| format!("List '{}' not found", list.id))?;
                if cli.json {
                    print_json(serde_json::json!({ "id": fork_id, "forked_from": list.id }))?;
                } else {
                    println!("Forked '{}' into list {}", list.name, fork_id);
                }
            }
        },

        Commands::Word(word_cmd) => match word_cmd {
            WordCommands::Add {
                list,
                text,
                translations,
                category,
                complexity,
                lang,
            } => {
                if complexity <= 0.0 || !complexity.is_finite() {
                    return Err(format!("Complexity must be greater than zero, got {}", complexity).into());
                }
                let list = resolve_list(&db, &list)?;
                let language = lang
                    .or_else(|| list.to_language.clone())
                    .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());

                let word = NewWord {
                    text: text.clone(),
                    category,
                    complexity,
                    translations: translations
                        .iter()
                        .map(|t| Translation::new(t.trim(), language.as_str()))
                        .collect(),
                };
                let id = db.add_word(&list.id, &word)?;

                if cli.json {
                    print_json(serde_json::json!({ "id": id, "text": text }))?;
                } else {
                    println!("Added '{}' to '{}' with ID: {}", text, list.name, id);
                }
            }

            WordCommands::Ls { list } => {
                let list = resolve_list(&db, &list)?;
                let words = db.list_words(&list.id)?;
                if cli.json {
                    print_json(&words)?;
                } else if words.is_empty() {
                    println!("No words in '{}'.", list.name);
                } else {
                    println!("{:<38} {:<24} {:<24} NEXT REVIEW", "ID", "WORD", "ANSWER");
                    println!("{}", "-".repeat(100));
                    for word in words {
                        let next = word
                            .spaced_repetition
                            .as_ref()
                            .map(|sr| sr.next_review.format("%Y-%m-%d").to_string())
                            .unwrap_or_else(|| "new".to_string());
                        println!(
                            "{:<38} {:<24} {:<24} {}",
                            word.id,
                            truncate(&word.text, 22),
                            truncate(word.correct_answer(), 22),
                            next
                        );
                    }
                }
            }

            WordCommands::Show { id } => {
                let word = db.get_word(&id)?.ok_or_else(|| format!("Word '{}' not found", id))?;
                if cli.json {
                    print_json(&word)?;
                } else {
                    println!("Word: {}", word.text);
                    println!("ID: {}", word.id);
                    println!("Category: {}", word.category);
                    println!("Complexity: {}", word.complexity);
                    let answers: Vec<String> = word
                        .translations
                        .iter()
                        .map(|t| format!("{} ({})", t.value, t.language_code))
                        .collect();
                    println!("Translations: {}", answers.join(", "));

                    if let Some(sr) = &word.spaced_repetition {
                        let now = Utc::now();
                        println!();
                        println!("--- Review ---");
                        println!("Repetitions: {}", sr.repetitions);
                        println!("Easiness: {:.2}", sr.easiness);
                        println!("Interval: {} day(s)", sr.interval);
                        if let Some(last) = &sr.last_review {
                            println!("Last reviewed: {}", last.to_rfc3339());
                        }
                        println!(
                            "Next review: {}{}",
                            sr.next_review.to_rfc3339(),
                            if sr.is_overdue(now) { " (overdue)" } else { "" }
                        );
                    } else {
                        println!("Not reviewed yet.");
                    }
                }
            }

            WordCommands::Delete { id } => {
                if !db.delete_word(&id)? {
                    return Err(format!("Word '{}' not found", id).into());
                }
                if cli.json {
                    print_json(())?;
                } else {
                    println!("Word {} deleted.", id);
                }
            }
        },

        Commands::Due { list } => {
            let list = resolve_list(&db, &list)?;
            let words = db.list_words(&list.id)?;
            let now = Utc::now();
            let due = due_for_review(&words, now);

            if cli.json {
                print_json(&due)?;
            } else if due.is_empty() {
                println!("Nothing due in '{}'.", list.name);
            } else {
                println!("=== Due in '{}' ({}) ===", list.name, due.len());
                for word in due {
                    let when = match &word.spaced_repetition {
                        Some(sr) if sr.is_overdue(now) => {
                            format!("overdue by {} day(s)", -sr.days_until_review(now))
                        }
                        Some(_) => "due now".to_string(),
                        None => "new".to_string(),
                    };
                    println!("  {:<24} {}", truncate(&word.text, 22), when);
                }
            }
        }

        Commands::Practice {
            list,
            strategy,
            mode,
            seed,
        } => {
            let strategy = strategy
                .map(|s| {
                    Strategy::from_str(&s).ok_or_else(|| {
                        format!(
                            "Invalid strategy '{}'. Use: interleaved, retrieval_practice, or adaptive_difficulty",
                            s
                        )
                    })
                })
                .transpose()?;
            let mode = mode
                .map(|m| {
                    PracticeMode::from_str(&m).ok_or_else(|| {
                        format!(
                            "Invalid mode '{}'. Use: flashcards, writing, multiple_choice, or listening",
                            m
                        )
                    })
                })
                .transpose()?;

            let list = resolve_list(&db, &list)?;
            let settings = db.load_settings()?;
            practice(&db, &list, &settings, strategy, mode, seed, cli.json)?;
        }

        Commands::History { list, limit } => {
            let list_id = match list {
                Some(key) => Some(resolve_list(&db, &key)?.id),
                None => None,
            };
            let results = db.list_results(list_id.as_deref(), limit)?;

            if cli.json {
                print_json(&results)?;
            } else if results.is_empty() {
                println!("No sessions recorded yet.");
            } else {
                println!(
                    "{:<17} {:<16} {:<20} {:>7} {:>6}",
                    "COMPLETED", "MODE", "STRATEGY", "RIGHT", "SCORE"
                );
                println!("{}", "-".repeat(70));
                for r in results {
                    println!(
                        "{:<17} {:<16} {:<20} {:>7} {:>5.0}%",
                        r.completed_at.format("%Y-%m-%d %H:%M"),
                        r.mode.label(),
                        r.strategy.label(),
                        format!("{}/{}", r.correct_count, r.total_count),
                        r.score
                    );
                }
            }
        }

        Commands::Stats => {
            let stats = db.get_stats()?;
            if cli.json {
                print_json(&stats)?;
            } else {
                println!("=== Learning Statistics ===");
                println!("Lists: {}", stats.total_lists);
                println!("Words: {}", stats.total_words);
                println!("Reviewed at least once: {}", stats.reviewed_words);
                println!("Due for review: {}", stats.due_now);
                println!("Sessions: {}", stats.total_sessions);
                println!("Average score: {:.1}%", stats.avg_score);
            }
        }

        Commands::Settings(settings_cmd) => match settings_cmd {
            SettingsCommands::Show => {
                let settings = db.load_settings()?;
                if cli.json {
                    print_json(&settings)?;
                } else {
                    println!("{}", serde_json::to_string_pretty(&settings)?);
                }
            }

            SettingsCommands::Set { key, value } => {
                let mut settings = db.load_settings()?;
                settings.set(&key, &value)?;
                db.save_settings(&settings)?;
                if cli.json {
                    print_json(&settings)?;
                } else {
                    println!("Set {} = {}", key, value);
                }
            }

            SettingsCommands::Reset => {
                db.reset_settings()?;
                if cli.json {
                    print_json(PracticeSettings::default())?;
                } else {
                    println!("Settings restored to defaults.");
                }
            }
        },
    }

    Ok(())
}

fn practice(
    db: &Database,
    list: &WordList,
    settings: &PracticeSettings,
    strategy: Option<Strategy>,
    mode: Option<PracticeMode>,
    seed: Option<u64>,
    json: bool,
) -> Result<(), Box<dyn Error>> {
    let words = db.list_words(&list.id)?;
    if words.is_empty() {
        return Err(format!("List '{}' has no words to practise", list.name).into());
    }

    let config = settings.session_config(strategy, mode);
    let rng = match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    };
    let mut session = Session::start(list.id.clone(), words, config, rng)?;
    let mode = session.config().mode;

    // With --json only the final document goes to stdout.
    let mut ui: Box<dyn Write> = if json {
        Box::new(io::stderr())
    } else {
        Box::new(io::stdout())
    };

    writeln!(
        ui,
        "Practising '{}': {}, {}. Type ? for a hint, :q to stop.",
        list.name,
        mode.label(),
        session.config().strategy.label()
    )?;

    let stdin = io::stdin();
    let mut input = stdin.lock();

    while let Some(word) = session.current_word().cloned() {
        let progress = session.progress();
        writeln!(ui)?;
        writeln!(ui, "[{} left] {}", progress.remaining, word.text)?;

        let choices = if mode == PracticeMode::MultipleChoice {
            session.choices(settings.quiz.option_count)
        } else {
            Vec::new()
        };
        for (i, choice) in choices.iter().enumerate() {
            writeln!(ui, "  {}) {}", i + 1, choice)?;
        }

        let started = Instant::now();
        let label = if mode.is_self_graded() { "(enter to reveal) " } else { "> " };
        let Some(answer) = read_answer(&mut input, &mut ui, &session, label)? else {
            return abandon(&session, &mut ui, json);
        };
        let elapsed = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let outcome = if mode.is_self_graded() {
            let answers: Vec<&str> = word.translations.iter().map(|t| t.value.as_str()).collect();
            writeln!(ui, "Answer: {}", answers.join(", "))?;
            let Some(reply) = prompt(&mut input, &mut ui, "Did you know it? [y/n] ")? else {
                return abandon(&session, &mut ui, json);
            };
            let recalled = reply.trim().to_lowercase().starts_with('y');
            session.submit_recall(recalled, elapsed, db)?
        } else {
            let given = choice_answer(&answer, &choices);
            session.submit_answer(&given, elapsed, db)?
        };

        report(&mut ui, &outcome)?;

        if let Some(e) = &outcome.persistence_error {
            eprintln!("Warning: {}", e);
            if outcome.finished {
                warn!(session_id = %session.id(), "retrying result write");
                session.retry_persist(db)?;
            }
        }
    }

    let result = session
        .result()
        .ok_or("Session ended without a result")?;

    if json {
        print_json(result)?;
    } else {
        writeln!(ui)?;
        writeln!(ui, "=== Session complete ===")?;
        writeln!(
            ui,
            "Correct: {}/{} ({:.0}%)",
            result.correct_count, result.total_count, result.score
        )?;
        writeln!(ui, "Time: {:.1}s", result.total_time_ms as f64 / 1000.0)?;
        if !result.state.mistake_words.is_empty() {
            writeln!(ui, "Words to revisit: {}", result.state.mistake_words.len())?;
        }
    }

    Ok(())
}

/// Reads one answer, serving hint requests until something else is typed.
/// `None` means the learner quit.
fn read_answer<R: rand::Rng>(
    input: &mut impl BufRead,
    ui: &mut dyn Write,
    session: &Session<R>,
    label: &str,
) -> io::Result<Option<String>> {
    loop {
        let Some(line) = prompt(input, ui, label)? else {
            return Ok(None);
        };
        match line.trim() {
            ":q" => return Ok(None),
            "?" => {
                let hint = session.hint();
                if !session.config().show_hints {
                    writeln!(ui, "Hints are turned off.")?;
                } else if hint.is_empty() {
                    writeln!(ui, "No hint yet, give it a try first.")?;
                } else {
                    writeln!(ui, "Hint: {}", hint)?;
                }
            }
            _ => return Ok(Some(line)),
        }
    }
}

fn prompt(input: &mut impl BufRead, ui: &mut dyn Write, label: &str) -> io::Result<Option<String>> {
    write!(ui, "{}", label)?;
    ui.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(&['\n', '\r'][..]).to_string()))
}

fn report(ui: &mut dyn Write, outcome: &AnswerOutcome) -> io::Result<()> {
    let attempt = &outcome.attempt;
    if attempt.is_correct {
        writeln!(ui, "Correct! ({}% match)", attempt.match_score)?;
    } else {
        writeln!(ui, "Incorrect. Answer: {}", attempt.correct_answer)?;
    }
    writeln!(
        ui,
        "Next review in {} day(s){}",
        outcome.schedule.interval,
        if outcome.repeated { ", and again later this session" } else { "" }
    )
}

fn abandon<R: rand::Rng>(
    session: &Session<R>,
    ui: &mut dyn Write,
    json: bool,
) -> Result<(), Box<dyn Error>> {
    let progress = session.progress();
    if json {
        print_json(serde_json::json!({ "abandoned": true, "progress": progress }))?;
    } else {
        writeln!(ui)?;
        writeln!(
            ui,
            "Session stopped after {} answer(s), {} correct.",
            progress.answered, progress.correct
        )?;
    }
    Ok(())
}

/// Maps a numeric pick onto the displayed option; anything else is graded as typed.
fn choice_answer(input: &str, choices: &[String]) -> String {
    match input.trim().parse::<usize>() {
        Ok(n) if n >= 1 && n <= choices.len() => choices[n - 1].clone(),
        _ => input.to_string(),
    }
}

/// Looks a list up by id, then by case-insensitive name.
fn resolve_list(db: &Database, key: &str) -> Result<WordList, Box<dyn Error>> {
    if let Some(list) = db.get_list(key)? {
        return Ok(list);
    }

    let mut matches: Vec<WordList> = db
        .list_lists()?
        .into_iter()
        .filter(|l| l.name.to_lowercase() == key.to_lowercase())
        .collect();

    match matches.len() {
        0 => Err(format!("List '{}' not found", key).into()),
        1 => Ok(matches.remove(0)),
        n => Err(format!("{} lists are named '{}'; use the list ID", n, key).into()),
    }
}

fn languages(list: &WordList) -> String {
    format!(
        "{} -> {}",
        list.from_language.as_deref().unwrap_or("?"),
        list.to_language.as_deref().unwrap_or("?")
    )
}

fn print_json<T: Serialize>(data: T) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string(&JsonOutput::ok(data))?);
    Ok(())
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
