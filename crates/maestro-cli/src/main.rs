//! Maestro CLI - Main entry point

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use maestro_engine::{ProgressListener, TaskEngine, TaskSpec};
use maestro_foundation::{
    config::{MaestroConfig, MAESTRO_CONFIG_FILE},
    ProgressUpdate, Result, TaskOutcome,
};
use maestro_gateway::OllamaGateway;
use maestro_runtime::{DockerDriver, HttpWorkerTransport, ToolRegistry, ToolRuntime};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Maestro - task orchestration over reasoning models and tool workers
#[derive(Parser, Debug)]
#[command(name = "maestro")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path to the configuration file
    #[arg(long, default_value = MAESTRO_CONFIG_FILE)]
    config: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a task and run it to completion
    Run {
        /// Short task title
        title: String,

        /// Longer task description (defaults to the title)
        #[arg(short, long)]
        description: Option<String>,

        /// Agent identity the task runs under
        #[arg(long, default_value = "cli-agent")]
        agent: String,

        /// User the task belongs to
        #[arg(long, default_value = "cli-user")]
        user: String,
    },
    /// Manage tool workers
    Tools {
        #[command(subcommand)]
        command: ToolCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ToolCommand {
    /// List known tools and their state
    List,
    /// Pull a tool's backing image
    Install { tool_id: String },
    /// Start a tool's worker container
    Start {
        tool_id: String,

        /// Configuration values as key=value pairs
        #[arg(short, long)]
        config: Vec<String>,
    },
    /// Stop a tool's worker container
    Stop { tool_id: String },
    /// Show one tool's detailed status
    Status { tool_id: String },
    /// Show the tail of a running tool's log
    Logs {
        tool_id: String,

        #[arg(short, long, default_value = "50")]
        tail: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = MaestroConfig::load_or_default(&args.config);

    let runtime = Arc::new(ToolRuntime::new(
        ToolRegistry::builtin(),
        Arc::new(DockerDriver::connect()?),
        Arc::new(HttpWorkerTransport::new()),
        config.runtime.clone(),
    ));

    match args.command {
        Command::Run {
            title,
            description,
            agent,
            user,
        } => {
            let gateway = Arc::new(
                OllamaGateway::new(&config.gateway.base_url, &config.gateway.model)
                    .with_timeout(Duration::from_secs(config.gateway.timeout_secs)),
            );
            let engine = Arc::new(TaskEngine::new(gateway, runtime.clone(), config.engine));

            let description = description.unwrap_or_else(|| title.clone());
            let task_id = engine
                .create(TaskSpec {
                    title,
                    description,
                    agent_id: agent,
                    conversation_id: "cli".to_string(),
                    user_id: user,
                    initial_steps: vec![],
                })
                .await;

            engine.subscribe(task_id, Arc::new(ConsoleListener)).await?;

            let task = engine.execute(task_id).await?;
            runtime.shutdown().await;

            println!();
            println!("Task {} finished: {}", task_id, task.status);
            for step in &task.steps {
                println!("  [{:?}] {}", step.status, step.name);
            }
            if let Some(result) = &task.result {
                println!("{}", serde_json::to_string_pretty(result)?);
            }
            if let Some(error) = &task.error_message {
                println!("Error: {}", error);
            }

            let stats = engine.stats().await;
            println!(
                "{} task(s) seen, {} completed, success rate {:.0}%",
                stats.total,
                stats.completed,
                stats.success_rate * 100.0
            );
        }

        Command::Tools { command } => match command {
            ToolCommand::List => {
                for instance in runtime.list().await {
                    println!("{:<12} {}", instance.tool_id, instance.state);
                }
            }
            ToolCommand::Install { tool_id } => {
                runtime.install(&tool_id).await?;
                println!("Installed {}", tool_id);
            }
            ToolCommand::Start { tool_id, config } => {
                let tool_config = parse_key_values(&config)?;
                let port = runtime.start(&tool_id, tool_config).await?;
                println!("Started {} on port {}", tool_id, port);
            }
            ToolCommand::Stop { tool_id } => {
                runtime.stop(&tool_id).await?;
                println!("Stopped {}", tool_id);
            }
            ToolCommand::Status { tool_id } => {
                let status = runtime.status(&tool_id).await?;
                println!("{} ({})", status.name, status.tool_id);
                println!("  state:     {}", status.state);
                println!("  container: {}", status.container_state);
                if let Some(port) = status.port {
                    println!("  port:      {}", port);
                }
                if let Some(error) = &status.last_error {
                    println!("  error:     {}", error);
                }
                if let Some(logs) = &status.recent_logs {
                    println!("  recent logs:\n{}", logs);
                }
            }
            ToolCommand::Logs { tool_id, tail } => {
                print!("{}", runtime.logs(&tool_id, tail).await?);
            }
        },
    }

    Ok(())
}

/// Prints progress events as they arrive
struct ConsoleListener;

#[async_trait]
impl ProgressListener for ConsoleListener {
    async fn on_progress(&self, update: &ProgressUpdate) -> Result<()> {
        match &update.current_step {
            Some(step) => println!("[{:>3.0}%] {}", update.progress, step),
            None => println!("[{:>3.0}%] started", update.progress),
        }
        Ok(())
    }

    async fn on_terminal(&self, outcome: &TaskOutcome) -> Result<()> {
        println!("[done] {}", outcome.status);
        Ok(())
    }
}

fn parse_key_values(pairs: &[String]) -> anyhow::Result<HashMap<String, String>> {
    let mut map = HashMap::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("expected key=value, got '{}'", pair))?;
        map.insert(key.to_string(), value.to_string());
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_values() {
        let parsed =
            parse_key_values(&["github_token=abc".to_string(), "org=maestro".to_string()])
                .unwrap();
        assert_eq!(parsed["github_token"], "abc");
        assert_eq!(parsed["org"], "maestro");

        assert!(parse_key_values(&["no-equals".to_string()]).is_err());
    }
}
