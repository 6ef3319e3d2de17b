use clap::Parser;
use colored::*;
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};
use jar_core::parse_tags;
use memory_jar::{form, view};
use memory_jar::{
    ClientConfig, DeleteOutcome, HttpRemote, JarClient, JarEvent, JarMode, Memory, MemoryDraft,
    SqliteStore,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "memory-jar")]
#[command(about = "Shared journaling jars", long_about = None)]
struct Cli {
    /// Jar server base URL (defaults to MEMORY_JAR_SERVER_URL or http://localhost:8080)
    #[arg(short, long)]
    server: Option<String>,

    /// Local sqlite database URL (defaults to MEMORY_JAR_DATABASE)
    #[arg(short, long)]
    database: Option<String>,
}

enum Flow {
    Continue,
    Quit,
}

#[tokio::main]
async fn main() -> CliResult<()> {
    // Only warnings and errors unless RUST_LOG says otherwise
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    let config = ClientConfig::from_env()
        .with_server_url(cli.server)
        .with_database_url(cli.database);
    tracing::debug!(?config, "Starting memory jar");

    println!("{}", "🫙 Memory Jar".bold().cyan());
    println!("{}", "=============".cyan());
    println!("🌐 Server: {}", config.server_url.blue());
    println!("📁 Database: {}", config.database_url.green());
    println!();

    let store = SqliteStore::open(&config.database_url).await?;
    let remote = HttpRemote::new(&config.server_url)?;
    let client = JarClient::new(Arc::new(remote), Arc::new(store));

    client.event_dispatcher().register_callback(|event| match event {
        JarEvent::SyncError { message } => println!("⚠️  {}", message.yellow()),
        JarEvent::RemoteChange { jar_id } => {
            println!("{}", format!("🔄 Jar {} changed on another device", jar_id).dimmed())
        }
        _ => {}
    })?;

    if let Err(e) = client.restore().await {
        report(&e);
    }

    loop {
        client.event_dispatcher().process_events()?;
        let flow = match client.mode() {
            JarMode::NoJar => welcome_screen(&client).await?,
            _ => jar_screen(&client).await?,
        };
        if let Flow::Quit = flow {
            println!("👋 Goodbye!");
            break;
        }
        println!();
    }

    Ok(())
}

fn report(error: &jar_core::JarError) {
    println!("❌ {}", view::error_message(error).red());
}

fn theme() -> ColorfulTheme {
    ColorfulTheme::default()
}

async fn welcome_screen(client: &JarClient) -> CliResult<Flow> {
    let history = client.history();
    let choices = vec![
        "🆕 Create a new jar",
        "🔑 Join a jar with a code",
        "🕘 Open a recent jar",
        "🧹 Forget a recent jar",
        "📓 Offline journal",
        "❌ Exit",
    ];

    let selection = Select::with_theme(&theme())
        .with_prompt("Welcome! What would you like to do?")
        .items(&choices)
        .default(0)
        .interact()?;

    match selection {
        0 => match client.create_jar().await {
            Ok(jar_id) => println!("✅ Created jar {}. Share this code to journal together.", jar_id.to_string().green()),
            Err(e) => report(&e),
        },
        1 => {
            let code: String = Input::with_theme(&theme())
                .with_prompt("Jar code")
                .interact_text()?;
            if let Err(e) = client.join_jar(&code).await {
                report(&e);
            }
        }
        2 | 3 if history.is_empty() => println!("📭 No recent jars yet."),
        2 => {
            let codes: Vec<String> = history.entries().iter().map(|j| j.to_string()).collect();
            let pick = Select::with_theme(&theme())
                .with_prompt("Recent jars")
                .items(&codes)
                .default(0)
                .interact()?;
            if let Err(e) = client.rejoin_jar(&history.entries()[pick]).await {
                report(&e);
            }
        }
        3 => {
            let codes: Vec<String> = history.entries().iter().map(|j| j.to_string()).collect();
            let pick = Select::with_theme(&theme())
                .with_prompt("Forget which jar? Its memories stay on the server.")
                .items(&codes)
                .default(0)
                .interact()?;
            client.forget_jar(&history.entries()[pick]).await;
            println!("🧹 Removed {} from recent jars", codes[pick]);
        }
        4 => client.open_offline().await,
        _ => return Ok(Flow::Quit),
    }

    Ok(Flow::Continue)
}

async fn jar_screen(client: &JarClient) -> CliResult<Flow> {
    render_list(client);

    let choices = vec![
        "➕ Add memory",
        "🔍 View memory",
        "✏️  Edit memory",
        "🗑️  Delete memory",
        "🔎 Search",
        "🏷️  Filter by tag",
        "🧽 Clear filters",
        "🔄 Refresh",
        "💾 Export backup",
        "📥 Import backup",
        "🚪 Leave",
        "❌ Exit",
    ];

    let selection = Select::with_theme(&theme())
        .with_prompt("What would you like to do?")
        .items(&choices)
        .default(0)
        .interact()?;

    match selection {
        0 => add_memory(client).await?,
        1 => {
            if let Some(memory) = pick_memory(client, "View which memory?")? {
                println!("{}", "─".repeat(60).dimmed());
                println!("{}", view::memory_details(&memory));
                println!("{}", "─".repeat(60).dimmed());
            }
        }
        2 => edit_memory(client).await?,
        3 => delete_memory(client).await?,
        4 => {
            let query: String = Input::with_theme(&theme())
                .with_prompt("Search (empty to clear)")
                .allow_empty(true)
                .interact_text()?;
            client.set_search(query);
        }
        5 => {
            let tags = client.available_tags();
            if tags.is_empty() {
                println!("🏷️  No tags yet.");
            } else {
                let pick = Select::with_theme(&theme())
                    .with_prompt("Show memories tagged")
                    .items(&tags)
                    .default(0)
                    .interact()?;
                client.toggle_tag(&tags[pick]);
            }
        }
        6 => client.clear_filters(),
        7 => {
            if let Err(e) = client.refresh().await {
                report(&e);
            }
        }
        8 => export_backup(client).await?,
        9 => import_backup(client).await?,
        10 => client.logout().await,
        _ => return Ok(Flow::Quit),
    }

    Ok(Flow::Continue)
}

fn render_list(client: &JarClient) {
    println!("{}", view::mode_banner(&client.mode()).bold());
    if let Some(summary) = view::filter_summary(&client.filter()) {
        println!("{}", summary.italic());
    }
    println!("{}", "─".repeat(60).dimmed());

    let total = client.memories().len();
    let visible = client.visible_memories();
    match view::empty_state(total, visible.len()) {
        Some(message) => println!("📭 {}", message),
        None => {
            for memory in &visible {
                println!("  {}", view::memory_label(memory));
            }
        }
    }
    println!("{}", "─".repeat(60).dimmed());
}

fn pick_memory(client: &JarClient, prompt: &str) -> CliResult<Option<Memory>> {
    let visible = client.visible_memories();
    if visible.is_empty() {
        println!("📭 Nothing to pick.");
        return Ok(None);
    }

    let labels: Vec<String> = visible.iter().map(view::memory_label).collect();
    let pick = Select::with_theme(&theme())
        .with_prompt(prompt)
        .items(&labels)
        .default(0)
        .interact()?;
    Ok(visible.into_iter().nth(pick))
}

/// Asks for an optional file and turns it into a media reference. `None`
/// means attaching failed and the form is abandoned.
async fn attach(client: &JarClient, kind: &str, current: Option<String>) -> CliResult<Option<Option<String>>> {
    let path: String = Input::with_theme(&theme())
        .with_prompt(format!("{} file path (empty to keep)", kind))
        .allow_empty(true)
        .interact_text()?;

    let changed = !path.trim().is_empty();
    match form::resolve_attachment(client, &path, current).await {
        Ok(reference) => {
            if changed {
                println!("📎 Attached {}", kind.to_lowercase());
            }
            Ok(Some(reference))
        }
        Err(e) => {
            report(&e);
            println!("{}", "Nothing was saved.".yellow());
            Ok(None)
        }
    }
}

async fn add_memory(client: &JarClient) -> CliResult<()> {
    let title: String = Input::with_theme(&theme())
        .with_prompt("Title")
        .allow_empty(true)
        .interact_text()?;
    let text: String = Input::with_theme(&theme())
        .with_prompt("What happened?")
        .allow_empty(true)
        .interact_text()?;
    let tags: String = Input::with_theme(&theme())
        .with_prompt("Tags (comma separated)")
        .allow_empty(true)
        .interact_text()?;

    let mut draft = MemoryDraft::new(title, text).with_tags(parse_tags(&tags));
    let Some(image) = attach(client, "Image", None).await? else {
        return Ok(());
    };
    let Some(audio) = attach(client, "Audio", None).await? else {
        return Ok(());
    };
    draft.image = image;
    draft.audio = audio;

    match client.create_memory(draft).await {
        Ok(memory) => println!("✅ Added {}", memory.title.green()),
        Err(e) => report(&e),
    }
    Ok(())
}

async fn edit_memory(client: &JarClient) -> CliResult<()> {
    let Some(mut memory) = pick_memory(client, "Edit which memory?")? else {
        return Ok(());
    };

    memory.title = Input::with_theme(&theme())
        .with_prompt("Title")
        .with_initial_text(memory.title.clone())
        .allow_empty(true)
        .interact_text()?;
    memory.text = Input::with_theme(&theme())
        .with_prompt("Text")
        .with_initial_text(memory.text.clone())
        .allow_empty(true)
        .interact_text()?;
    let tags: String = Input::with_theme(&theme())
        .with_prompt("Tags (comma separated)")
        .with_initial_text(memory.tags.join(", "))
        .allow_empty(true)
        .interact_text()?;
    memory.tags = parse_tags(&tags);
    let Some(image) = attach(client, "Image", memory.image.take()).await? else {
        return Ok(());
    };
    let Some(audio) = attach(client, "Audio", memory.audio.take()).await? else {
        return Ok(());
    };
    memory.image = image;
    memory.audio = audio;

    match client.update_memory(memory).await {
        Ok(saved) => println!("✅ Saved {}", saved.title.green()),
        Err(e) => report(&e),
    }
    Ok(())
}

async fn delete_memory(client: &JarClient) -> CliResult<()> {
    let Some(memory) = pick_memory(client, "Delete which memory?")? else {
        return Ok(());
    };

    println!("🗑️  {}", memory.title.bold());
    let confirm = |prompt: &str| {
        Confirm::with_theme(&theme())
            .with_prompt(prompt)
            .default(false)
            .interact()
            .unwrap_or(false)
    };

    match client.delete_memory(memory.id, &confirm).await {
        Ok(DeleteOutcome::Deleted) => println!("✅ Deleted"),
        Ok(DeleteOutcome::Cancelled) => println!("↩️  Kept"),
        Err(e) => report(&e),
    }
    Ok(())
}

async fn export_backup(client: &JarClient) -> CliResult<()> {
    let backup = match client.export() {
        Ok(backup) => backup,
        Err(e) => {
            report(&e);
            return Ok(());
        }
    };

    tokio::fs::write(&backup.file_name, backup.json.as_bytes()).await?;
    println!(
        "💾 Saved {} memories to {}",
        client.memories().len(),
        backup.file_name.green()
    );
    Ok(())
}

async fn import_backup(client: &JarClient) -> CliResult<()> {
    let path: String = Input::with_theme(&theme())
        .with_prompt("Backup file")
        .interact_text()?;

    let text = match tokio::fs::read_to_string(path.trim()).await {
        Ok(text) => text,
        Err(e) => {
            report(&e.into());
            return Ok(());
        }
    };

    if matches!(client.mode(), JarMode::Active(_)) {
        println!(
            "{}",
            "Imported memories are shown locally until the jar refreshes.".yellow()
        );
    }
    match client.import(&text).await {
        Ok(count) => println!("📥 Imported {} memories", count),
        Err(e) => report(&e),
    }
    Ok(())
}
