mod config;
mod gateway;
mod logging;
mod orchestrator;
mod picker;
mod policy;
mod tui;

use std::sync::Arc;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use config::{ConfigFile, PickerBackend, ResolvedConfig};
use gateway::{Gateway, HttpGateway};
use logging::LogTarget;
use orchestrator::{Lane, Orchestrator, Settlement};
use picker::{CommandPicker, FilePicker, NativePicker, PresetPicker};
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(
    name = "embedsearch",
    about = "Embed local files through a backend and find them again by meaning",
    long_about = None,
)]
struct Args {
    /// Run one action and print the result (omit to enter interactive TUI mode)
    #[command(subcommand)]
    action: Option<OneShot>,

    /// Profile to use from config file
    #[arg(short, long, env = "EMBEDSEARCH_PROFILE")]
    profile: Option<String>,

    /// Override backend endpoint URL
    #[arg(long, env = "EMBEDSEARCH_ENDPOINT")]
    endpoint: Option<String>,

    /// Override API key
    #[arg(long, env = "EMBEDSEARCH_API_KEY")]
    api_key: Option<String>,

    /// File dialog to use
    #[arg(long, value_enum)]
    picker: Option<PickerBackend>,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,

    /// Write a default config file to ~/.config/embedsearch/config.toml and exit
    #[arg(long)]
    init: bool,

    /// List available profiles and exit
    #[arg(long)]
    profiles: bool,

    /// Generate shell completions and print to stdout (bash, zsh, fish, elvish)
    #[arg(long, value_name = "SHELL")]
    completions: Option<String>,
}

#[derive(Subcommand, Debug)]
enum OneShot {
    /// Embed a file (opens the file dialog when PATH is omitted)
    Embed { path: Option<String> },
    /// Find files matching a natural-language query
    Find { query: String },
    /// Probe the backend's storage layer
    Probe,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // ── --init ────────────────────────────────────────────────────────────────
    if args.init {
        let path = ConfigFile::write_default_if_missing()?;
        println!("Config written to: {}", path.display());
        println!("Edit it, then run: embedsearch");
        return Ok(());
    }

    // ── --completions ─────────────────────────────────────────────────────────
    if let Some(shell_name) = &args.completions {
        return generate_completions(shell_name);
    }

    let file = ConfigFile::load()?;

    // ── --profiles ────────────────────────────────────────────────────────────
    if args.profiles {
        print_profiles(&file);
        return Ok(());
    }

    let resolved = ResolvedConfig::resolve(
        &file,
        args.profile.as_deref(),
        args.endpoint.as_deref(),
        args.api_key.as_deref(),
        args.picker,
    );

    let gateway = build_gateway(&resolved);

    // ── Single-shot mode (non-TUI) ────────────────────────────────────────────
    if let Some(action) = args.action {
        logging::init(LogTarget::Stderr, args.verbose)?;
        return run_single_shot(action, gateway, &resolved).await;
    }

    // ── Interactive TUI mode ──────────────────────────────────────────────────
    logging::init(LogTarget::File(logging::log_file_path()), args.verbose)?;
    let (orch, settle_rx) = Orchestrator::new(gateway, build_picker(&resolved));
    tui::run(orch, settle_rx, &resolved).await
}

// ── Wiring ────────────────────────────────────────────────────────────────────

fn build_gateway(resolved: &ResolvedConfig) -> Arc<dyn Gateway> {
    let mut gateway = HttpGateway::new(resolved.endpoint.clone());
    if let Some(key) = &resolved.api_key {
        gateway.set_api_key(key.clone());
    }
    Arc::new(gateway)
}

fn build_picker(resolved: &ResolvedConfig) -> Arc<dyn FilePicker> {
    match resolved.picker.backend {
        PickerBackend::Native => Arc::new(NativePicker::new("Choose a file to embed")),
        PickerBackend::Command => Arc::new(CommandPicker::new(resolved.picker.command.clone())),
    }
}

// ── Single-shot mode (plain stdout, no TUI) ───────────────────────────────────

async fn run_single_shot(
    action: OneShot,
    gateway: Arc<dyn Gateway>,
    resolved: &ResolvedConfig,
) -> Result<()> {
    let picker: Arc<dyn FilePicker> = match &action {
        OneShot::Embed { path: Some(path) } => Arc::new(PresetPicker::new(path.clone())),
        _ => build_picker(resolved),
    };
    let (mut orch, mut settle_rx) = Orchestrator::new(gateway, picker);

    match action {
        OneShot::Embed { .. } => {
            orch.pick_file();
            settle_lane(&mut orch, &mut settle_rx, Lane::Picking).await;
            if orch.state().selected_path.is_none() {
                eprintln!("  no file selected");
            }
            orch.embed();
            settle_lane(&mut orch, &mut settle_rx, Lane::Embedding).await;
        }
        OneShot::Find { query } => {
            orch.set_query(query);
            orch.find();
            settle_lane(&mut orch, &mut settle_rx, Lane::Searching).await;
        }
        OneShot::Probe => {
            orch.test_sql();
            settle_lane(&mut orch, &mut settle_rx, Lane::Probing).await;
        }
    }

    let text = &orch.state().result_text;
    if orch.shown().is_some_and(|s| s.failed) {
        eprintln!("{text}");
        std::process::exit(1);
    }
    println!("{text}");
    Ok(())
}

/// Drain settlements until `lane` goes idle.
async fn settle_lane(
    orch: &mut Orchestrator,
    settle_rx: &mut mpsc::UnboundedReceiver<Settlement>,
    lane: Lane,
) {
    while orch.is_busy(lane) {
        let Some(settlement) = settle_rx.recv().await else { break };
        orch.apply(settlement);
    }
}

// ── Profiles listing (non-TUI) ────────────────────────────────────────────────

fn print_profiles(file: &ConfigFile) {
    let mut entries: Vec<(&String, &config::Profile)> = file.profiles.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    println!();
    println!("  Profiles");
    for (name, p) in &entries {
        let marker = if **name == file.default_profile { " ←" } else { "" };
        println!("  {name}{marker}");
        println!("    endpoint  {}", p.endpoint);
        println!("    api key   {}", if p.api_key.is_some() { "set" } else { "none" });
        println!();
    }
    println!("  File dialog: {:?}", file.picker.backend);
}

// ── Shell completions ─────────────────────────────────────────────────────────

fn generate_completions(shell_name: &str) -> Result<()> {
    use clap_complete::{Shell, generate};

    let shell: Shell = match shell_name.to_lowercase().as_str() {
        "bash"    => Shell::Bash,
        "zsh"     => Shell::Zsh,
        "fish"    => Shell::Fish,
        "elvish"  => Shell::Elvish,
        _ => {
            eprintln!("Unknown shell: {shell_name}");
            eprintln!("Supported: bash, zsh, fish, elvish");
            std::process::exit(1);
        }
    };

    let mut cmd = Args::command();
    generate(shell, &mut cmd, "embedsearch", &mut std::io::stdout());
    Ok(())
}
