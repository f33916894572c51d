use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
    process::ExitCode,
    sync::Arc,
};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{Local, Utc};
use clap::{Args, Parser, Subcommand};
use client_core::{
    datetime::{draft_from_todo, format_local_date, format_local_input},
    load_settings, resolve_settings_path,
    view::{is_overdue, visible_todos},
    ClientError, Confirmation, Filter, MutationOutcome, SignUpRequest, SyncEvent, TodoClient,
    TodoListSession, TodoStats,
};
use shared::domain::{Priority, Todo, TodoDraft};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "todo", about = "Personal to-do list from the terminal")]
struct Cli {
    /// Backend settings file produced by the deployment.
    #[arg(long, global = true)]
    settings: Option<PathBuf>,
    #[command(flatten)]
    credentials: Credentials,
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct Credentials {
    #[arg(long, global = true, env = "TODO_USERNAME")]
    username: Option<String>,
    #[arg(long, global = true, env = "TODO_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a new account.
    SignUp {
        #[arg(long)]
        email: String,
    },
    /// Confirm a registration with the emailed code.
    Confirm { code: String },
    /// Print the list, incomplete items first.
    List {
        #[arg(long, default_value = "all", value_parser = parse_filter)]
        filter: Filter,
    },
    Add {
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, value_parser = parse_priority)]
        priority: Option<Priority>,
        /// Local due date, `YYYY-MM-DDTHH:MM` or `YYYY-MM-DD`.
        #[arg(long)]
        due: Option<String>,
    },
    /// Change fields of an existing item; omitted fields keep their value.
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, value_parser = parse_priority)]
        priority: Option<Priority>,
        /// Pass an empty string to clear the due date.
        #[arg(long)]
        due: Option<String>,
    },
    Toggle { id: String },
    Delete {
        id: String,
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
    Stats,
    /// Follow live changes until interrupted.
    Watch,
}

impl Command {
    fn needs_list(&self) -> bool {
        !matches!(self, Command::SignUp { .. } | Command::Confirm { .. })
    }
}

fn parse_filter(value: &str) -> Result<Filter, String> {
    Filter::parse(value).ok_or_else(|| format!("unknown filter `{value}` (all, active, completed)"))
}

fn parse_priority(value: &str) -> Result<Priority, String> {
    Priority::parse(value)
        .ok_or_else(|| format!("unknown priority `{value}` (low, medium, high, urgent)"))
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(io::stderr)
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let client = connect(cli.settings.as_deref())?;
    let Cli {
        credentials,
        command,
        ..
    } = cli;
    let username = credentials
        .username
        .context("a username is required (--username or TODO_USERNAME)")?;

    if !command.needs_list() {
        return run_account_command(&client, username, credentials.password, command).await;
    }

    let password = credentials
        .password
        .context("a password is required (--password or TODO_PASSWORD)")?;
    let principal = client
        .identity()
        .sign_in(&username, &password)
        .await
        .map_err(|err| anyhow!("sign-in failed: {err}"))?;
    tracing::info!(user_id = %principal.user_id, "signed in");

    let (mut session, mut events) = TodoListSession::new();
    if let Some(notice) = session
        .initialize(client.transport().as_ref(), principal)
        .await
    {
        bail!("{}", notice.text);
    }

    match command {
        Command::List { filter } => print_list(session.store().records(), filter),
        Command::Stats => print_stats(session.store().records()),
        Command::Add {
            title,
            description,
            priority,
            due,
        } => {
            let draft = TodoDraft {
                title,
                description: description.unwrap_or_default(),
                priority,
                due_date_input: due.unwrap_or_default(),
            };
            report(client.mutations().create(&draft).await)?;
        }
        Command::Edit {
            id,
            title,
            description,
            priority,
            due,
        } => {
            let record = find_record(session.store().records(), &id)?;
            let mut draft = draft_from_todo(&record, &Local);
            if let Some(title) = title {
                draft.title = title;
            }
            if let Some(description) = description {
                draft.description = description;
            }
            if priority.is_some() {
                draft.priority = priority;
            }
            if let Some(due) = due {
                draft.due_date_input = due;
            }
            report(client.mutations().update(&record, &draft).await)?;
        }
        Command::Toggle { id } => {
            let record = find_record(session.store().records(), &id)?;
            report(client.mutations().toggle_complete(&record).await)?;
        }
        Command::Delete { id, yes } => {
            let record = find_record(session.store().records(), &id)?;
            let confirmation = if yes {
                Confirmation::Confirmed
            } else {
                confirm_delete(&record)?
            };
            report(client.mutations().delete(&record, confirmation).await)?;
        }
        Command::Watch => {
            print_list(session.store().records(), Filter::All);
            println!("-- watching for changes (ctrl-c to stop)");
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    event = events.recv() => {
                        let Some(event) = event else { break };
                        let change = event.event.clone();
                        if session.apply(event) {
                            print_change(&change);
                        }
                    }
                }
            }
        }
        Command::SignUp { .. } | Command::Confirm { .. } => {}
    }

    session.teardown();
    Ok(())
}

fn connect(explicit: Option<&std::path::Path>) -> Result<Arc<TodoClient>> {
    let config_dir = dirs::config_dir();
    let path = resolve_settings_path(explicit, config_dir.as_deref());
    let client = load_settings(&path)
        .map_err(ClientError::from)
        .and_then(|settings| TodoClient::from_settings(&settings));
    match client {
        Ok(client) => Ok(client),
        Err(ClientError::Config(err)) => Err(anyhow!("{err}\n{}", err.remediation())),
        Err(err) => Err(anyhow!("backend configuration unusable: {err}")),
    }
}

async fn run_account_command(
    client: &TodoClient,
    username: String,
    password: Option<String>,
    command: Command,
) -> Result<()> {
    match command {
        Command::SignUp { email } => {
            let password =
                password.context("a password is required (--password or TODO_PASSWORD)")?;
            let outcome = client
                .identity()
                .sign_up(SignUpRequest {
                    username,
                    email,
                    password,
                })
                .await
                .map_err(|err| anyhow!("sign-up failed: {err}"))?;
            if outcome.confirmed {
                println!("Account created. You can sign in now.");
            } else {
                println!("Account created. Confirm it with the code sent to your email.");
            }
        }
        Command::Confirm { code } => {
            client
                .identity()
                .confirm_sign_up(&username, code.trim())
                .await
                .map_err(|err| anyhow!("confirmation failed: {err}"))?;
            println!("Account confirmed. You can sign in now.");
        }
        _ => {}
    }
    Ok(())
}

/// Accepts a full id or an unambiguous prefix of one.
fn find_record(records: &[Todo], id: &str) -> Result<Todo> {
    if let Some(exact) = records.iter().find(|todo| todo.id.as_str() == id) {
        return Ok(exact.clone());
    }
    let mut matches = records.iter().filter(|todo| todo.id.as_str().starts_with(id));
    match (matches.next(), matches.next()) {
        (Some(todo), None) => Ok(todo.clone()),
        (None, _) => bail!("no to-do with id `{id}`"),
        (Some(_), Some(_)) => bail!("id prefix `{id}` matches more than one to-do"),
    }
}

fn confirm_delete(record: &Todo) -> Result<Confirmation> {
    print!("Delete \"{}\"? [y/N] ", record.title);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(match answer.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Confirmation::Confirmed,
        _ => Confirmation::Declined,
    })
}

fn report(outcome: MutationOutcome) -> Result<()> {
    match outcome {
        MutationOutcome::Rejected(err) => bail!("{err}"),
        MutationOutcome::Declined => {
            println!("Nothing deleted.");
            Ok(())
        }
        MutationOutcome::Succeeded { notice, .. } => {
            println!("{}", notice.text);
            Ok(())
        }
        MutationOutcome::Failed { notice } => bail!("{}", notice.text),
    }
}

fn print_list(records: &[Todo], filter: Filter) {
    let visible = visible_todos(records, filter);
    if visible.is_empty() {
        println!("{}", filter.empty_state_text());
        return;
    }
    let now = Utc::now();
    for todo in visible {
        println!("{}", render_row(todo, is_overdue(todo, now)));
    }
}

fn render_row(todo: &Todo, overdue: bool) -> String {
    let mark = if todo.completed { "x" } else { " " };
    let short_id: String = todo.id.as_str().chars().take(8).collect();
    let mut line = format!(
        "[{mark}] {short_id}  {:<6}  {}",
        todo.priority.label(),
        todo.title
    );
    if let Some(due) = todo.due_date {
        line.push_str(&format!("  due {}", format_local_input(due, &Local).replace('T', " ")));
        if overdue {
            line.push_str("  OVERDUE");
        }
    }
    line.push_str(&format!("  (created {})", format_local_date(todo.created_at, &Local)));
    line
}

fn print_stats(records: &[Todo]) {
    let stats = TodoStats::compute(records, Utc::now());
    println!("total:     {}", stats.total);
    println!("active:    {}", stats.active);
    println!("completed: {}", stats.completed);
    println!("overdue:   {}", stats.overdue);
}

fn print_change(change: &SyncEvent) {
    match change {
        SyncEvent::Created(todo) => println!("+ {}", todo.title),
        SyncEvent::Updated(todo) => println!(
            "~ {}{}",
            todo.title,
            if todo.completed { " (done)" } else { "" }
        ),
        SyncEvent::Deleted(id) => println!("- {id}"),
    }
}
