use anyhow::{bail, Result};
use clap::Parser;
use cliclack::{input, select, spinner};
use console::style;
use serde_json::json;

use chataigne::errors::ToolError;
use chataigne::models::message::MessagePart;
use chataigne::models::tool::{Tool, ToolParam};
use chataigne::providers::factory::{get_provider, ProviderType};
use chataigne::providers::utils::{messages_to_anthropic_spec, messages_to_openai_spec};
use chataigne::session::{Action, Session};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Provider to chat with
    #[arg(short, long, default_value = "open-ai")]
    #[arg(value_enum)]
    provider: ProviderVariant,

    /// System prompt for the conversation
    #[arg(short, long)]
    system: Option<String>,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum ProviderVariant {
    OpenAi,
    Anthropic,
    Echo,
}

impl From<ProviderVariant> for ProviderType {
    fn from(variant: ProviderVariant) -> Self {
        match variant {
            ProviderVariant::OpenAi => ProviderType::OpenAi,
            ProviderVariant::Anthropic => ProviderType::Anthropic,
            ProviderVariant::Echo => ProviderType::Echo,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let provider = get_provider(cli.provider.into())?;

    let mut session = Session::new(provider);
    if let Some(system) = cli.system {
        session = session.with_system_prompt(system);
    }
    register_demo_tools(&mut session)?;

    println!(
        "Chataigne 🌰 {}",
        style("- type \"/exit\" to end the session, \"/help\" for commands").dim()
    );
    println!();

    loop {
        while let Some((index, name, arguments)) = next_pending_request(&session) {
            println!(
                "{} {} {}",
                style("Request to use").bold(),
                style(&name).cyan().bold(),
                style(&arguments).dim()
            );

            let action: Action = select("What should happen with this tool call?")
                .item(Action::ApproveAndRun, "Allow and run", "")
                .item(Action::Deny, "Deny", "")
                .item(Action::Delete, "Delete", "")
                .interact()?;

            session.apply_action(action, index)?;
            // Delete removes the request without appending anything, so there
            // is no fresh output to show for it.
            if matches!(action, Action::ApproveAndRun | Action::Deny) {
                if let Some(output) = session.messages().last().and_then(|p| p.as_tool_output()) {
                    println!("  ➡ {}", output.content);
                }
            }
        }

        let line: String = input("Message:").placeholder("").interact()?;
        let line = line.trim().to_string();

        if line.starts_with('/') {
            if !handle_command(&mut session, &line)? {
                break;
            }
        } else if !line.is_empty() {
            session.add_user_input(line)?;
        }

        while session.needs_generation() {
            let spin = spinner();
            spin.start("awaiting reply");
            let new_parts = match session.generate().await {
                Ok(parts) => {
                    spin.stop("");
                    parts
                }
                Err(e) => {
                    spin.stop("");
                    eprintln!("{} {}", style("Error:").red().bold(), e);
                    break;
                }
            };
            // An empty reply leaves the trailing user text in place; asking
            // again would just repeat the same call.
            if new_parts.is_empty() {
                break;
            }
            for part in &new_parts {
                render_part(part);
            }
        }
    }

    Ok(())
}

/// Handle a slash command; returns false when the session should end.
fn handle_command(session: &mut Session, line: &str) -> Result<bool> {
    let mut words = line.split_whitespace();
    let command = words.next().unwrap_or_default();

    match command {
        "/exit" | "/quit" => return Ok(false),
        "/help" => {
            println!("/exit                      end the session");
            println!("/tools                     list registered tools");
            println!("/toggle <tool>             enable or disable a tool");
            println!("/image <path>              attach a PNG image");
            println!("/history [raw|openai|anthropic]  dump the conversation");
        }
        "/tools" => {
            for tool in session.tools().all() {
                let marker = if tool.enabled { "on " } else { "off" };
                println!(
                    "[{}] {} {}",
                    marker,
                    style(&tool.name).cyan(),
                    style(&tool.description).dim()
                );
            }
        }
        "/toggle" => match words.next() {
            Some(name) => {
                let tool_enabled = session
                    .tools()
                    .get(name)
                    .map(|tool| tool.enabled)
                    .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
                session.set_tool_enabled(name, !tool_enabled)?;
                println!("{} is now {}", name, if tool_enabled { "off" } else { "on" });
            }
            None => println!("Usage: /toggle <tool>"),
        },
        "/image" => match words.next() {
            Some(path) => {
                let image = MessagePart::image_from_path(path)?;
                session.attach_image(image)?;
            }
            None => println!("Usage: /image <path>"),
        },
        "/history" => {
            let kind = words.next().unwrap_or("raw");
            let dump = match kind {
                "raw" => serde_json::to_value(session.messages())?,
                "openai" => json!(messages_to_openai_spec(session.messages())?),
                "anthropic" => json!(messages_to_anthropic_spec(session.messages())?),
                other => bail!("Unknown history kind: {}", other),
            };
            println!("{}", serde_json::to_string_pretty(&dump)?);
        }
        other => println!("Unknown command: {}", other),
    }

    Ok(true)
}

fn next_pending_request(session: &Session) -> Option<(usize, String, String)> {
    session.pending_tool_requests().first().map(|(index, request)| {
        let arguments = serde_json::to_string(&request.parameters).unwrap_or_default();
        (*index, request.name.clone(), arguments)
    })
}

fn render_part(part: &MessagePart) {
    match part {
        MessagePart::Text(text) => {
            let who = if text.is_user { "you" } else { "assistant" };
            println!("{} {}", style(format!("{}:", who)).bold(), text.text);
        }
        MessagePart::Image(_) => {
            println!("{}", style("[image attached]").dim());
        }
        MessagePart::ToolRequest(request) => {
            println!(
                "{} {}",
                style("tool request:").bold().yellow(),
                style(&request.name).cyan()
            );
            for (key, value) in &request.parameters {
                println!("  {}: {}", key, value);
            }
        }
        MessagePart::ToolOutput(output) => {
            println!("  ➡ {}", output.content);
        }
    }
}

fn register_demo_tools(session: &mut Session) -> Result<()> {
    let add = Tool::new(
        "custom_add",
        "Add two numbers",
        vec![
            ToolParam::required("x", json!({"type": "number"})),
            ToolParam::optional("y", json!({"type": "number"}), json!(2)),
        ],
    )?;
    session.register_tool(add, |args| {
        let x = args["x"].as_f64().unwrap_or_default();
        let y = args["y"].as_f64().unwrap_or_default();
        Ok(format!("{}", x + y))
    })?;

    let count_words = Tool::new(
        "count_words",
        "Count the number of words in text",
        vec![ToolParam::required(
            "text",
            json!({"type": "string", "description": "The text to count words in"}),
        )],
    )?;
    session.register_tool(count_words, |args| {
        let text = args["text"].as_str().unwrap_or_default();
        Ok(format!("{}", text.split_whitespace().count()))
    })?;

    Ok(())
}
