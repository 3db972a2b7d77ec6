use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use relay_core::{
    AgentLoop, ContextBuilder, ConversationHistory, EventSink, SessionStore, ToolRegistry,
    TurnStatus, config, providers, session, tools,
};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

mod onboard;
mod render;

use render::Renderer;

const DEFAULT_SESSION: &str = "default";

#[derive(Parser)]
#[command(name = "relay")]
#[command(about = "relay - streaming tool-calling agent for OpenAI-compatible backends", long_about = None)]
struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the backend endpoint, key and model
    Onboard,
    /// Talk to the agent, one message or interactively
    Chat {
        #[arg(short, long)]
        message: Option<String>,
        #[arg(short, long, default_value = DEFAULT_SESSION)]
        session: String,
    },
    /// Print a session's stored history as JSON
    History {
        #[arg(short, long, default_value = DEFAULT_SESSION)]
        session: String,
    },
    /// Forget a session's history
    Clear {
        #[arg(short, long, default_value = DEFAULT_SESSION)]
        session: String,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let command = cli.command.unwrap_or_else(|| {
        if !config::config_exists() {
            Commands::Onboard
        } else {
            Commands::Chat {
                message: None,
                session: DEFAULT_SESSION.to_string(),
            }
        }
    });

    match command {
        Commands::Onboard => {
            let onboard_config = onboard::run_onboard().map_err(|e| {
                eprintln!("❌ Onboarding failed: {}", e);
                anyhow::anyhow!("Onboarding failed: {}", e)
            })?;
            config::save_config(&onboard_config)?;
        }
        Commands::Chat { message, session } => {
            let config = config::load_config()?;
            let store = session::create_session_store(&config);
            let (events, rx) = EventSink::channel();
            let agent_loop = build_agent(&config, events);
            let mut chat = Chat {
                agent_loop,
                store,
                session,
                events: rx,
                renderer: Renderer::default(),
            };

            match message {
                Some(msg) => chat.send(&msg).await?,
                None => chat.repl().await?,
            }
        }
        Commands::History { session } => {
            let config = config::load_config()?;
            let store = session::create_session_store(&config);
            let history = store.load(&session).await?;
            println!("{}", serde_json::to_string_pretty(&history)?);
        }
        Commands::Clear { session } => {
            let config = config::load_config()?;
            let store = session::create_session_store(&config);
            store.clear(&session).await?;
            println!("{} Cleared session '{}'", style("✓").green(), session);
        }
    }

    Ok(())
}

fn build_agent(config: &config::Config, events: EventSink) -> AgentLoop {
    let provider = providers::create_provider(config);

    let tool_registry = Arc::new(ToolRegistry::new());
    tools::register_builtin_tools(&tool_registry);

    let context_builder = ContextBuilder::new()
        .with_system_prompt(config.system_prompt.clone())
        .with_bootstrap_dir(&config.relay_dir)
        .with_runtime_context(true);

    AgentLoop::new(provider, tool_registry)
        .with_context_builder(context_builder)
        .with_max_steps(config.max_steps)
        .with_events(events)
}

struct Chat {
    agent_loop: AgentLoop,
    store: Arc<dyn SessionStore>,
    session: String,
    events: UnboundedReceiver<relay_core::AgentEvent>,
    renderer: Renderer,
}

impl Chat {
    /// Runs one turn against the stored session and saves the result.
    async fn send(&mut self, message: &str) -> Result<()> {
        let history = self.store.load(&self.session).await?;
        let history = self.run_turn(history, message).await?;
        self.store.save(&self.session, &history).await
    }

    async fn run_turn(
        &mut self,
        history: ConversationHistory,
        message: &str,
    ) -> Result<ConversationHistory> {
        self.renderer.reset();

        let turn = {
            let turn = self.agent_loop.process_with_history(history, message);
            tokio::pin!(turn);

            loop {
                tokio::select! {
                    Some(event) = self.events.recv() => self.renderer.render(event),
                    result = &mut turn => break result?,
                }
            }
        };
        while let Ok(event) = self.events.try_recv() {
            self.renderer.render(event);
        }
        self.renderer.finish();

        if !self.renderer.streamed()
            && let Some(answer) = turn.final_answer()
        {
            print!("{}", answer);
        }
        println!();

        if turn.status == TurnStatus::StepBudgetExhausted {
            eprintln!(
                "{} Stopped after {} steps without a final answer",
                style("!").yellow().bold(),
                turn.steps
            );
        }

        Ok(turn.history)
    }

    async fn repl(&mut self) -> Result<()> {
        println!("{}", style("relay").cyan().bold());
        println!(
            "{}",
            style(format!("Session '{}'. Ctrl+D to exit.", self.session)).dim()
        );
        println!();

        let mut history = self.store.load(&self.session).await?;
        let mut editor = DefaultEditor::new()?;

        loop {
            let line = match editor.readline("> ") {
                Ok(line) => line,
                Err(ReadlineError::Interrupted | ReadlineError::Eof) => {
                    println!("👋 Goodbye!");
                    break;
                }
                Err(e) => return Err(e.into()),
            };

            let input = line.trim();
            if input.is_empty() {
                continue;
            }
            let _ = editor.add_history_entry(input);

            match self.run_turn(history.clone(), input).await {
                Ok(updated) => {
                    history = updated;
                    if let Err(e) = self.store.save(&self.session, &history).await {
                        eprintln!("❌ Could not save session: {}", e);
                    }
                }
                Err(e) => eprintln!("❌ Error: {}", e),
            }
            println!();
        }

        Ok(())
    }
}
