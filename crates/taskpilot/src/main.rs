//! Run one chat turn against the task assistant and print the reply.
//!
//! Reads the API key from the `GEMINI_API_KEY` environment variable. The
//! task store is in-memory and per-invocation, so this binary is a demo and
//! debugging surface for the agent loop rather than a persistent assistant.
//!
//! # Examples
//!
//! ```sh
//! # Basic request
//! taskpilot --message "add a task to buy milk tomorrow"
//!
//! # Seed demo tasks first so list/summary tools have data
//! taskpilot --seed-demo-tasks --message "what should I work on first?"
//!
//! # Print the tool-call audit trail as JSON on stderr
//! taskpilot --message "create three grocery tasks" --audit
//!
//! # Custom endpoint and model
//! taskpilot --base-url https://api.example.com/v1/chat/completions \
//!   --model some-model --message "summarize my tasks"
//! ```

use std::process;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use taskpilot::agent::config::AgentConfig;
use taskpilot::agent::orchestrator::{Orchestrator, RunOutcome, TerminationReason};
use taskpilot::api::client::{GEMINI_OPENAI_URL, OpenAiCompatClient};
use taskpilot::auth::{CredentialMinter, CredentialVerifier};
use taskpilot::tools::tasks::{InMemoryTaskStore, NewTask, Priority, TaskStore, task_toolset};

/// Run one chat turn against the task assistant and print the reply.
///
/// Reads the API key from the GEMINI_API_KEY environment variable.
#[derive(Parser)]
#[command(name = "taskpilot")]
struct Cli {
    /// User message to send
    #[arg(long)]
    message: String,

    /// User id to run as (random if omitted)
    #[arg(long)]
    user: Option<Uuid>,

    /// Model to use
    #[arg(long, default_value = taskpilot::DEFAULT_MODEL)]
    model: String,

    /// Chat-completions endpoint URL
    #[arg(long, default_value = GEMINI_OPENAI_URL)]
    base_url: String,

    /// Maximum executed tool calls per run
    #[arg(long, default_value_t = 10)]
    max_tool_calls: u32,

    /// Maximum tokens in each completion
    #[arg(long, default_value_t = 2000)]
    max_tokens: u32,

    /// Sampling temperature
    #[arg(long, default_value_t = 0.7)]
    temperature: f32,

    /// Secret for signing tool-execution credentials (falls back to the
    /// TASKPILOT_SECRET environment variable, then a dev-only default)
    #[arg(long)]
    secret: Option<String>,

    /// Insert a handful of demo tasks before running
    #[arg(long)]
    seed_demo_tasks: bool,

    /// Print the audit trail as JSON on stderr after the reply
    #[arg(long)]
    audit: bool,

    /// Verbose logging (debug level; repeat for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "taskpilot=info",
        1 => "taskpilot=debug",
        _ => "taskpilot=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn seed_demo_tasks(store: &dyn TaskStore, user: Uuid) {
    let today = chrono::Utc::now().date_naive();
    let demo = [
        ("Pay electricity bill", Priority::High, today.pred_opt()),
        ("Prepare sprint review", Priority::Normal, Some(today)),
        (
            "Book dentist appointment",
            Priority::Normal,
            today.checked_add_days(chrono::Days::new(4)),
        ),
        ("Sort old photos", Priority::Low, None),
    ];
    for (title, priority, due_date) in demo {
        store.insert(
            user,
            NewTask {
                title: title.to_string(),
                description: None,
                priority,
                due_date,
            },
        );
    }
    eprintln!("  Seeded {} demo task(s)", demo.len());
}

async fn run_turn(cli: &Cli) -> Result<RunOutcome, String> {
    let api_key = std::env::var("GEMINI_API_KEY")
        .map_err(|_| "GEMINI_API_KEY environment variable is not set".to_string())?;

    let client = OpenAiCompatClient::with_url(api_key, &cli.base_url).map_err(|e| e.to_string())?;

    let store = Arc::new(InMemoryTaskStore::new());
    let user = cli.user.unwrap_or_else(Uuid::new_v4);
    if cli.seed_demo_tasks {
        seed_demo_tasks(store.as_ref(), user);
    }

    let secret = cli
        .secret
        .clone()
        .or_else(|| std::env::var("TASKPILOT_SECRET").ok())
        .unwrap_or_else(|| "dev-only-secret".to_string());
    let registry = task_toolset(store, CredentialVerifier::new(&secret));
    let minter = CredentialMinter::new(&secret);

    let config = AgentConfig::new(&cli.model)
        .with_max_tool_calls(cli.max_tool_calls)
        .with_max_tokens(cli.max_tokens)
        .with_temperature(cli.temperature);

    Orchestrator::new(&client, &registry, &minter, config)
        .run(user, &cli.message, &[])
        .await
        .map_err(|e| format!("run ended with {}: {e}", TerminationReason::FatalError))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run_turn(&cli).await {
        Ok(outcome) => {
            println!("{}", outcome.final_text);
            if cli.audit {
                match serde_json::to_string_pretty(&outcome.audit_trail) {
                    Ok(json) => eprintln!("{json}"),
                    Err(e) => eprintln!("failed to render audit trail: {e}"),
                }
                eprintln!(
                    "  {} tool call(s), termination: {}",
                    outcome.iterations_used, outcome.termination_reason
                );
            }
        }
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}
