use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
    process::ExitCode,
    time::Duration,
};

use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use reqwest::{Client, StatusCode};
use tracing_subscriber::EnvFilter;

use libs::{
    edit::{EditError, EditSession},
    filter::PriorityFilter,
    payload::{LoginPayload, SignupPayload},
    record::{normalize_email, Priority, TaskFields, TaskRecord},
    session::Session,
    state::TaskList,
    StoreError, TaskError, ValidationFailure,
};

mod remote;
mod slot;
mod util;

use remote::HttpTaskStore;
use slot::{SessionSlot, SlotError};
use util::{Endpoints, RequestError};

const DEFAULT_SERVICE_URL: &str = "http://localhost:8000";
const REQUEST_TIMEOUT_SECS: u64 = 15;

#[derive(Parser)]
#[command(name = "td", version, about = "A personal to-do list", long_about = None)]
struct Cli {
    /// Base url of the to-do service.
    #[arg(long, env = "TD_SERVICE_URL", default_value = DEFAULT_SERVICE_URL, global = true)]
    service_url: String,

    /// Where the signed-in session is kept.
    #[arg(long, env = "TD_SESSION_FILE", global = true)]
    session_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account.
    Signup {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        /// Prompted for when omitted.
        #[arg(long, env = "TD_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Sign in and keep the session for the following commands.
    Login {
        #[arg(long)]
        email: String,
        /// Prompted for when omitted.
        #[arg(long, env = "TD_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Forget the stored session.
    Logout,
    /// Who is signed in?
    Whoami,
    /// List your tasks.
    List {
        #[arg(long, short, default_value_t = PriorityFilter::All)]
        priority: PriorityFilter,
    },
    /// Add a task.
    Add {
        task: String,
        description: String,
        #[arg(long, short, default_value_t = Priority::Low)]
        priority: Priority,
        /// YYYY-MM-DD
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Show one task.
    Show { id: String },
    /// Change some fields of a task.
    Edit {
        id: String,
        #[arg(long)]
        task: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, short)]
        priority: Option<Priority>,
        #[arg(long, conflicts_with = "clear_date")]
        date: Option<NaiveDate>,
        #[arg(long)]
        clear_date: bool,
    },
    /// Delete a task.
    Delete {
        id: String,
        /// Skip the confirmation prompt.
        #[arg(long, short)]
        yes: bool,
    },
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error("You are not signed in. Run `td login` first.")]
    SignedOut,

    #[error("No data directory found; pass --session-file.")]
    NoSessionDir,

    #[error("You have no task `{0}`.")]
    UnknownTask(String),

    #[error("{0}")]
    Auth(String),

    #[error(transparent)]
    Validation(#[from] ValidationFailure),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error(transparent)]
    Edit(#[from] EditError),

    #[error(transparent)]
    Slot(#[from] SlotError),

    #[error("Could not set up the HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Could not read your answer: {0}")]
    Prompt(#[from] io::Error),
}

impl From<StoreError> for CliError {
    fn from(err: StoreError) -> Self {
        CliError::Task(err.into())
    }
}

/// Sign-up and login refusals carry the service's own wording. An outage
/// stays a store failure.
fn auth_failure(err: RequestError) -> CliError {
    match err {
        RequestError::Status { status, message }
            if status == StatusCode::UNAUTHORIZED
                || matches!(
                    util::status_error(status, None),
                    StoreError::NotFound(_) | StoreError::Rejected(_)
                ) =>
        {
            CliError::Auth(message)
        }
        err => StoreError::from(err).into(),
    }
}

struct Context {
    slot: SessionSlot,
    request_client: Client,
    endpoints: Endpoints,
}

impl Context {
    fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let slot = match &cli.session_file {
            Some(path) => SessionSlot::new(path),
            None => SessionSlot::default_location().ok_or(CliError::NoSessionDir)?,
        };
        let request_client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Context {
            slot,
            request_client,
            endpoints: Endpoints::new(&cli.service_url),
        })
    }

    fn session(&self) -> Result<Session, CliError> {
        self.slot.load(Utc::now())?.ok_or(CliError::SignedOut)
    }

    /// Loads the signed-in user's list; each command works on a fresh copy.
    async fn mount(&self) -> Result<TaskList<HttpTaskStore>, CliError> {
        let session = self.session()?;
        let store = HttpTaskStore::new(
            self.request_client.clone(),
            self.endpoints.clone(),
            Some(&session),
        );
        let mut list = TaskList::new(store, Some(session));
        list.load().await?;
        Ok(list)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::debug!("{:?}", err);
            eprintln!("{}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let ctx = Context::from_cli(&cli)?;

    match cli.command {
        Commands::Signup {
            username,
            email,
            password,
        } => {
            let (password, confirm_password) = match password {
                Some(password) => (password.clone(), password),
                None => (
                    rpassword::prompt_password("Password: ")?,
                    rpassword::prompt_password("Confirm password: ")?,
                ),
            };
            let payload = SignupPayload {
                username,
                email,
                password,
                confirm_password,
            }
            .validated()?;

            let user = remote::sign_up(&ctx.request_client, &ctx.endpoints, &payload)
                .await
                .map_err(auth_failure)?;
            println!(
                "Signed up as {} <{}>. Run `td login --email {}` to start.",
                user.username, user.email, user.email
            );
        }
        Commands::Login { email, password } => {
            let email = normalize_email(&email)?;
            let password = match password {
                Some(password) => password,
                None => rpassword::prompt_password("Password: ")?,
            };
            if password.is_empty() {
                return Err(ValidationFailure::EmptyField("password").into());
            }

            let session = remote::log_in(
                &ctx.request_client,
                &ctx.endpoints,
                &LoginPayload { email, password },
            )
            .await
            .map_err(auth_failure)?;
            ctx.slot.save(&session)?;
            println!(
                "Signed in as {} <{}> until {}.",
                session.user.username,
                session.email(),
                session.expires_at.format("%Y-%m-%d %H:%M UTC")
            );
        }
        Commands::Logout => {
            if ctx.slot.clear()? {
                println!("Signed out.");
            } else {
                println!("You were not signed in.");
            }
        }
        Commands::Whoami => {
            let session = ctx.session()?;
            println!("{} <{}>", session.user.username, session.email());
        }
        Commands::List { priority } => {
            let list = ctx.mount().await?;
            let shown = list.filtered(priority);
            if shown.is_empty() {
                println!("No tasks.");
            }
            for record in shown {
                println!("{}", summary_line(record));
            }
        }
        Commands::Add {
            task,
            description,
            priority,
            date,
        } => {
            let mut list = ctx.mount().await?;
            let fields = TaskFields::new(task, description)
                .with_priority(priority)
                .with_date(date);
            let record = list.add(fields).await?;
            println!("Added {}", summary_line(record));
        }
        Commands::Show { id } => {
            let list = ctx.mount().await?;
            let record = list.get(&id).ok_or_else(|| CliError::UnknownTask(id.clone()))?;

            let mut detail = EditSession::new();
            detail.select(record);
            if let Some(selected) = detail.selected() {
                print!("{}", detail_block(selected));
            }
            detail.close();
        }
        Commands::Edit {
            id,
            task,
            description,
            priority,
            date,
            clear_date,
        } => {
            let mut list = ctx.mount().await?;
            let record = list
                .get(&id)
                .cloned()
                .ok_or_else(|| CliError::UnknownTask(id.clone()))?;

            let mut edit = EditSession::new();
            edit.select(&record);
            let buffer = edit.begin_edit()?;
            if let Some(task) = task {
                buffer.task = task;
            }
            if let Some(description) = description {
                buffer.description = description;
            }
            if let Some(priority) = priority {
                buffer.priority = priority;
            }
            if date.is_some() {
                buffer.date = date;
            }
            if clear_date {
                buffer.date = None;
            }
            edit.save(&mut list).await?;

            match list.get(&id) {
                Some(updated) => println!("Saved {}", summary_line(updated)),
                None => println!("Saved {}", id),
            }
        }
        Commands::Delete { id, yes } => {
            let mut list = ctx.mount().await?;
            let record = list
                .get(&id)
                .cloned()
                .ok_or_else(|| CliError::UnknownTask(id.clone()))?;

            if !yes {
                let question = format!("Delete \"{}\"?", record.task);
                if !confirm(&question, io::stdin().lock(), io::stdout())? {
                    println!("Kept {}.", record.id);
                    return Ok(());
                }
            }
            list.remove(&record.id).await?;
            println!("Deleted {}.", record.id);
        }
    }

    Ok(())
}

fn summary_line(record: &TaskRecord) -> String {
    let priority = record.priority.to_string();
    match record.date {
        Some(date) => format!(
            "{}  [{:<6}]  {}  (due {})",
            record.id, priority, record.task, date
        ),
        None => format!("{}  [{:<6}]  {}", record.id, priority, record.task),
    }
}

fn detail_block(record: &TaskRecord) -> String {
    let date = record
        .date
        .map(|date| date.to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "id:          {}\ntask:        {}\ndescription: {}\npriority:    {}\ndate:        {}\ncreated:     {} by {}\n",
        record.id,
        record.task,
        record.description,
        record.priority,
        date,
        record.created_at.format("%Y-%m-%d %H:%M UTC"),
        record.created_by,
    )
}

/// Asks a yes/no question; anything but `y`/`yes` is a no.
fn confirm<R: BufRead, W: Write>(question: &str, mut input: R, mut output: W) -> io::Result<bool> {
    write!(output, "{} [y/N] ", question)?;
    output.flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(matches!(
        answer.trim().to_lowercase().as_str(),
        "y" | "yes"
    ))
}
