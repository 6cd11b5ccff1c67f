use clap::{Parser, Subcommand};
use std::path::PathBuf;

use wirebot::application::errors::BotError;
use wirebot::application::services::{LoadReport, PluginCandidate, PluginService};
use wirebot::infrastructure::config::Config;
use wirebot::infrastructure::lua::LuaRuntime;

#[derive(Parser)]
#[command(name = "wirebot")]
#[command(about = "Plugin host for an extensible chat bot", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Plugin directory (overrides config)
    #[arg(short, long)]
    plugins_dir: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List discovered plugins
    List,
    /// Load all enabled plugins and show what they register
    Load,
    /// Show version
    Version,
    /// Generate default config
    InitConfig,
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::List => list_plugins(&load_config(&cli), cli.json),
        Commands::Load => load_plugins(&load_config(&cli), cli.json),
        Commands::Version => {
            println!("wirebot v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::InitConfig => init_config(),
    };

    if let Err(e) = result {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn load_config(cli: &Cli) -> Config {
    let mut config = if std::path::Path::new(&cli.config).exists() {
        Config::load(&cli.config).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config: {}, using defaults", e);
            Config::load_env()
        })
    } else {
        Config::load_env()
    };

    if let Some(dir) = &cli.plugins_dir {
        config.plugins.directory = dir.clone();
    }
    config
}

fn list_plugins(config: &Config, json: bool) -> Result<(), BotError> {
    let candidates = PluginService::usable(PluginService::enumerate(&config.plugins));

    if json {
        let entries: Vec<serde_json::Value> = candidates.iter().map(candidate_json).collect();
        return print_json(&serde_json::Value::Array(entries));
    }

    if candidates.is_empty() {
        println!("No plugins found in {}", config.plugins.directory.display());
        return Ok(());
    }
    for candidate in &candidates {
        let handle = &candidate.handle;
        println!(
            "{:<20} {:<12} {:<9} {}",
            handle.name(),
            handle.kind().as_str(),
            if candidate.enabled { "enabled" } else { "disabled" },
            handle.source()
        );
    }
    Ok(())
}

fn load_plugins(config: &Config, json: bool) -> Result<(), BotError> {
    let runtime = LuaRuntime::new()?;
    let mut service = PluginService::new(config.bot_info());

    tracing::info!("Starting {} plugin host", config.bot.name);
    let candidates = PluginService::usable(PluginService::enumerate(&config.plugins));
    let report = if config.plugins.auto_load {
        service.load_all(&runtime, candidates)
    } else {
        tracing::info!("Plugin auto-load is disabled");
        LoadReport::default()
    };

    if json {
        print_json(&report_json(&service, &report))?;
    } else {
        print_report(&service, &report);
    }

    let hooks = service.shutdown_all(&runtime);
    tracing::info!("Ran {} shutdown hooks", hooks);
    Ok(())
}

fn print_report(service: &PluginService, report: &LoadReport) {
    for plugin in service.registry().all() {
        let meta = plugin.meta_description();
        println!(
            "{} - {}{}",
            meta.name,
            meta.label,
            meta.version.map(|v| format!(" (v{})", v)).unwrap_or_default()
        );
        let callables = plugin.callables();
        for (command, function) in callables.commands() {
            println!("  {}{:<16} -> {}", service.bot().prefix, command, function);
        }
        for (secs, function) in callables.intervals() {
            println!("  every {}s{:<9} -> {}", secs, "", function);
        }
        for (pattern, function) in callables.url_patterns() {
            println!("  url {:<16} -> {}", pattern, function);
        }
        for (event, function) in callables.events() {
            println!("  event {:<14} -> {}", event, function);
        }
    }
    for name in &report.disabled {
        println!("{} - disabled", name);
    }
    for (name, error) in &report.failed {
        println!("{} - FAILED: {}", name, error);
    }
}

fn candidate_json(candidate: &PluginCandidate) -> serde_json::Value {
    serde_json::json!({
        "name": candidate.handle.name(),
        "kind": candidate.handle.kind(),
        "source": candidate.handle.source().to_string(),
        "enabled": candidate.enabled,
    })
}

fn report_json(service: &PluginService, report: &LoadReport) -> serde_json::Value {
    let loaded: Vec<serde_json::Value> = service
        .registry()
        .all()
        .map(|plugin| {
            serde_json::json!({
                "meta": plugin.meta_description(),
                "callables": plugin.callables(),
            })
        })
        .collect();
    let failed: Vec<serde_json::Value> = report
        .failed
        .iter()
        .map(|(name, error)| serde_json::json!({ "name": name, "error": error.to_string() }))
        .collect();

    serde_json::json!({
        "loaded": loaded,
        "disabled": report.disabled,
        "failed": failed,
    })
}

fn print_json(value: &serde_json::Value) -> Result<(), BotError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| BotError::Serialization(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

fn init_config() -> Result<(), BotError> {
    let config = Config::default();
    let yaml = serde_yaml::to_string(&config)
        .map_err(|e| BotError::Serialization(e.to_string()))?;
    println!("{}", yaml);
    println!("\nSave this to config.yaml and adjust as needed.");
    Ok(())
}
