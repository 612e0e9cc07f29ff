// src/bin/cmdtree.rs

use anyhow::{Context, Result};
use clap::Parser;
use cmdtree::{
    Adapter, CommandDefinition, CommandNode, CommandSet, EnumParameter, ExecutionCode, Registry,
    Source, TabProvider,
};
use colored::*;
use dialoguer::{Input, theme::ColorfulTheme};
use serde::Deserialize;
use std::any::TypeId;
use std::path::PathBuf;
use std::sync::Arc;

/// Interactive playground for the command dispatch engine: a handful of
/// built-in commands plus any declared in a TOML manifest, served through
/// a REPL with tab completion.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Player name to dispatch as. The player `admin` holds every
    /// permission, everyone else only the unprivileged ones.
    #[arg(long, default_value = "steve")]
    user: String,

    /// Dispatch as the console instead of a player.
    #[arg(long)]
    console: bool,

    /// TOML manifest of additional echo commands to register.
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// One command line to dispatch instead of starting the REPL.
    command: Vec<String>,
}

// --- Sources and Adapter ---

struct Player {
    name: String,
}

struct Console;

/// Terminal adapter: `admin` may do anything, other players only commands
/// whose permission does not start with `admin.`; the console passes every
/// check. Async handlers get their own thread.
struct TerminalAdapter;

impl Adapter for TerminalAdapter {
    fn handle_register(&self, node: &Arc<CommandNode>) {
        log::info!(
            "registered /{} ({} subcommands)",
            node.label(),
            node.children_recursively().len()
        );
    }

    fn check_permission(&self, source: Option<&Source>, node: &CommandNode) -> bool {
        let permission = node.definition().permission_node();
        if permission.is_empty() {
            return true;
        }
        match source {
            None => true,
            Some(source) => match source.downcast_ref::<Player>() {
                Some(player) => player.name == "admin" || !permission.starts_with("admin."),
                None => source.is::<Console>(),
            },
        }
    }

    fn run_async(&self, task: Box<dyn FnOnce() + Send>) {
        std::thread::spawn(task);
    }

    fn source_type(&self) -> TypeId {
        TypeId::of::<Player>()
    }
}

// --- Built-in Commands ---

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Gamemode {
    Survival,
    Creative,
    Spectator,
}

impl EnumParameter for Gamemode {
    const VARIANTS: &'static [Self] = &[Self::Survival, Self::Creative, Self::Spectator];

    fn name(&self) -> &'static str {
        match self {
            Self::Survival => "survival",
            Self::Creative => "creative",
            Self::Spectator => "spectator",
        }
    }
}

fn builtin_commands() -> CommandSet {
    CommandSet::new()
        .command(
            CommandDefinition::new("sum")
                .description("Adds two integers.")
                .usage("<num1> <num2>"),
            |_, _, params| {
                let a = params.get_int(0).context("num1 is not an integer")?;
                let b = params.get_int(1).context("num2 is not an integer")?;
                println!("{} + {} = {}", a, b, (a + b).to_string().green());
                Ok(())
            },
        )
        .command(
            CommandDefinition::new("gamemode")
                .alias("gm")
                .description("Switches the game mode.")
                .usage("<mode>"),
            |source, _, params| {
                let mode: Gamemode = params.get_enum(0).context("unknown mode")?;
                let who = source
                    .as_ref()
                    .and_then(|s| s.downcast_ref::<Player>())
                    .map_or("console", |p| p.name.as_str());
                println!("{who} is now in {} mode", mode.name().cyan());
                Ok(())
            },
        )
        .command(
            CommandDefinition::new("ban")
                .alias("banhammer")
                .description("Bans a player.")
                .permission("admin.ban")
                .usage("<player> <reason> [duration]"),
            |_, _, params| {
                println!(
                    "banned {} for {} ({})",
                    params.get(0).unwrap_or_default().red(),
                    params.get(1).unwrap_or_default(),
                    params.get(2).unwrap_or("forever")
                );
                Ok(())
            },
        )
        .command(
            CommandDefinition::new("list")
                .parent("ban")
                .description("Lists banned players.")
                .permission("admin.ban.list"),
            |_, _, _| {
                println!("banned players: {}", "none".dimmed());
                Ok(())
            },
        )
        .command(
            CommandDefinition::new("ping")
                .description("Measures dispatch latency off-thread.")
                .run_async(true),
            |_, _, _| {
                std::thread::sleep(std::time::Duration::from_millis(200));
                println!("{}", "pong".green());
                Ok(())
            },
        )
        .tab_provider(TabProvider::new("ban", |_, index| {
            Ok(match index {
                1 => vec!["Alice".into(), "Albert".into(), "Bob".into(), "list".into()],
                2 => vec!["spam".into(), "griefing".into()],
                _ => Vec::new(),
            })
        }))
        .tab_provider(TabProvider::new("gamemode", |_, index| {
            Ok(if index == 1 {
                Gamemode::VARIANTS.iter().map(|m| m.name().to_string()).collect()
            } else {
                Vec::new()
            })
        }))
}

// --- Manifest Commands ---

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default, rename = "command")]
    commands: Vec<ManifestCommand>,
}

#[derive(Debug, Deserialize)]
struct ManifestCommand {
    label: String,
    #[serde(default)]
    aliases: Vec<String>,
    #[serde(default)]
    parent: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    permission: String,
    #[serde(default)]
    usage: String,
    /// Line printed on dispatch; the collected arguments are appended.
    message: String,
}

fn manifest_commands(path: &PathBuf) -> Result<CommandSet> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read manifest '{}'", path.display()))?;
    let manifest: Manifest = toml::from_str(&raw)
        .with_context(|| format!("failed to parse manifest '{}'", path.display()))?;

    let mut set = CommandSet::new();
    for entry in manifest.commands {
        let mut definition = CommandDefinition::new(entry.label)
            .parent(entry.parent)
            .description(entry.description)
            .permission(entry.permission)
            .usage(entry.usage);
        for alias in entry.aliases {
            definition = definition.alias(alias);
        }
        let message = entry.message;
        set = set.command(definition, move |_, _, params| {
            println!("{} {}", message, params.command_line());
            Ok(())
        });
    }
    Ok(set)
}

// --- REPL ---

struct RegistryCompletion {
    registry: Arc<Registry>,
    source: Option<Source>,
}

impl dialoguer::Completion for RegistryCompletion {
    fn get(&self, input: &str) -> Option<String> {
        let suggestions = self
            .registry
            .execute_tab_completion(self.source.clone(), input);
        let replacement = suggestions.first()?;
        let kept = input.rfind(' ').map_or("", |at| &input[..=at]);
        Some(format!("{kept}{replacement}"))
    }
}

fn report(result: &cmdtree::ExecutionResult) {
    match result.code() {
        ExecutionCode::Passed => {}
        ExecutionCode::CommandNotFound => {
            eprintln!("{}", "Unknown command.".red());
        }
        ExecutionCode::NoPermission => {
            eprintln!("{}", "You may not do that.".red());
        }
        ExecutionCode::WrongSource => {
            eprintln!("{}", "This command is not available to this source.".red());
        }
        ExecutionCode::TooFewArguments => match result.command() {
            Some(command) => eprintln!("{} {}", "Usage:".yellow(), command.usage()),
            None => eprintln!("{}", "Too few arguments.".yellow()),
        },
    }
}

fn run(cli: Cli) -> Result<()> {
    let registry = Arc::new(Registry::new());
    registry.set_adapter(Arc::new(TerminalAdapter))?;

    let mut sets = vec![builtin_commands()];
    if let Some(path) = &cli.manifest {
        sets.push(manifest_commands(path)?);
    }
    registry.register(sets)?.execute()?;

    let source: Option<Source> = if cli.console {
        Some(Arc::new(Console))
    } else {
        Some(Arc::new(Player {
            name: cli.user.clone(),
        }))
    };

    if !cli.command.is_empty() {
        let line = cli.command.join(" ");
        let result = registry.execute_line(source, &line);
        report(&result);
        // Let asynchronous handlers finish before the process exits.
        if let Some(handle) = result.handle() {
            handle.wait();
        }
        return Ok(());
    }

    println!(
        "Type commands ({} to leave). Registered roots: {}",
        "exit".bold(),
        registry
            .get_commands_unwound()
            .iter()
            .filter(|node| node.parent().is_none())
            .map(|node| node.label().to_string())
            .collect::<Vec<_>>()
            .join(", ")
            .cyan()
    );

    let completion = RegistryCompletion {
        registry: Arc::clone(&registry),
        source: source.clone(),
    };
    loop {
        let line: String = Input::with_theme(&ColorfulTheme::default())
            .with_prompt(if cli.console {
                "console".to_string()
            } else {
                cli.user.clone()
            })
            .completion_with(&completion)
            .allow_empty(true)
            .interact_text()?;

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed == "exit" || trimmed == "quit" {
            break;
        }

        let result = registry.execute_line(source.clone(), trimmed);
        report(&result);
        if let Some(handle) = result.handle() {
            handle.wait();
        }
    }
    Ok(())
}

fn main() {
    env_logger::init();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("\n{}: {:#}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}
