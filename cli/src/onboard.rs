use anyhow::{Context, Result};
use console::style;
use dialoguer::{Input, Select};
use relay_core::config::{Config, SessionBackend};

const BANNER: &str = r"
    -------------------------------------

     r e l a y

     streaming agent loop for
     OpenAI-compatible backends

    -------------------------------------
";

fn print_step(step: usize, total: usize, title: &str) {
    println!();
    println!(
        "{}",
        style(format!("[{}/{}] {}", step, total, title))
            .cyan()
            .bold()
    );
    println!();
}

fn setup_api_url(default: &str) -> Result<String> {
    let api_url: String = Input::new()
        .with_prompt("Chat-completions endpoint")
        .default(default.to_string())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.starts_with("http://") || input.starts_with("https://") {
                Ok(())
            } else {
                Err("Endpoint must be an http(s) URL")
            }
        })
        .interact_text()
        .context("Failed to read endpoint")?;

    Ok(api_url.trim().to_string())
}

fn setup_api_key() -> Result<String> {
    let api_key: String = Input::new()
        .with_prompt("API key (leave empty for local backends)")
        .allow_empty(true)
        .interact_text()
        .context("Failed to read API key")?;

    Ok(api_key.trim().to_string())
}

fn setup_model(default: &str) -> Result<String> {
    let model: String = Input::new()
        .with_prompt("Model")
        .default(default.to_string())
        .interact_text()
        .context("Failed to read model")?;

    if model.trim().is_empty() {
        return Err(anyhow::anyhow!("Model cannot be empty"));
    }

    Ok(model.trim().to_string())
}

fn setup_session_store() -> Result<SessionBackend> {
    let backends = ["file (kept between runs)", "memory (forgotten on exit)"];

    let selection = Select::new()
        .with_prompt("Where should conversations be kept?")
        .items(&backends)
        .default(0)
        .interact()
        .context("Failed to select session store")?;

    Ok(match selection {
        0 => SessionBackend::File,
        _ => SessionBackend::Memory,
    })
}

pub fn run_onboard() -> Result<Config> {
    println!("{}", style(BANNER).cyan().bold());

    println!("  {}", style("Welcome to relay!").white().bold());
    println!(
        "  {}",
        style("This wizard points the agent at your chat-completions backend.").dim()
    );

    let defaults = Config::load_or_init()?;

    print_step(1, 4, "Endpoint");
    let api_url = setup_api_url(&defaults.api_url)?;

    print_step(2, 4, "API Key");
    let api_key = setup_api_key()?;

    print_step(3, 4, "Model");
    let model = setup_model(&defaults.model)?;

    print_step(4, 4, "Sessions");
    let session_store = setup_session_store()?;

    let config = Config {
        api_url,
        api_key,
        model,
        session_store,
        ..defaults
    };

    println!();
    println!("  {} Configuration complete!", style("✓").green().bold());
    println!(
        "  {} Config saved to {}",
        style("→").green(),
        style(relay_core::config::get_config_path().display()).cyan()
    );
    println!(
        "  {} Put extra instructions in {}",
        style("→").green(),
        style(config.relay_dir.join("SYSTEM.md").display()).cyan()
    );
    println!();
    println!(
        "  {} You can now run: {}",
        style("→").green(),
        style("relay chat").cyan().bold()
    );
    println!();

    Ok(config)
}
