use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use time::OffsetDateTime;
use tracing_subscriber::EnvFilter;
use vaulta::doctor;
use vaulta::export::{self, ExportFormat};
use vaulta::filter::{self, DateFilter, EntryFilter, KindFilter};
use vaulta::graph::{GraphConfig, MAX_LINKS_PER_NODE, build_graph_with};
use vaulta::reminder::gentle_reminder;
use vaulta::service::DEFAULT_LIST_LIMIT;
use vaulta::themes::{self, DEFAULT_TOP_THEMES, ThemeCount};
use vaulta::utils::{ensure_database_directory, get_database_path, resolve_model};
use vaulta::{
    Database, Entry, EntryAnalyzer, EntryId, ListEntriesOptions, OllamaClient,
    OllamaClientBuilder, ReflectError, Reflector, VaultService,
};

/// vaulta - a quiet vault for half-formed ideas
#[derive(Parser)]
#[command(name = "vaulta")]
#[command(about = "Capture fragments, let a local model file them, and see how they connect")]
#[command(version)]
struct Cli {
    /// Ollama model to use for this run
    #[arg(long, global = true, value_name = "MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Capture a new fragment
    Add(AddCommand),
    /// List fragments, newest first
    List(ListCommand),
    /// Analyze a fragment with the model
    Analyze(AnalyzeCommand),
    /// Print the connection graph as JSON
    Graph(GraphCommand),
    /// Show how often each theme appears
    Themes(ThemesCommand),
    /// Write a reflection over the last 7 days
    Reflect,
    /// Show a gentle reminder, if any applies
    Remind,
    /// Delete a fragment
    Delete(DeleteCommand),
    /// Export the vault as JSON or Markdown
    Export(ExportCommand),
    /// Show, set or clear the saved model
    Model(ModelCommand),
    /// Check system health and backfill missing metadata
    Doctor(DoctorCommand),
}

#[derive(Parser)]
struct AddCommand {
    /// The text of the fragment
    #[arg(value_name = "TEXT")]
    text: String,

    /// Analyze the fragment right away
    #[arg(short, long)]
    analyze: bool,
}

/// Filters shared by `list`, `graph` and `themes`.
#[derive(Args, Default)]
struct FilterArgs {
    /// Match text, themes or summary (case-insensitive)
    #[arg(short, long, value_name = "QUERY")]
    search: Option<String>,

    /// Only these types; `unfiled` selects unanalyzed fragments
    #[arg(long = "type", value_name = "TYPE", value_delimiter = ',')]
    kinds: Vec<KindFilter>,

    /// Only fragments carrying any of these themes
    #[arg(long = "theme", value_name = "THEME", value_delimiter = ',')]
    themes: Vec<String>,

    /// Only fragments from this period: any, 7d, 30d or year
    #[arg(long, value_name = "PERIOD", default_value = "any")]
    since: DateFilter,
}

impl FilterArgs {
    fn to_filter(&self) -> EntryFilter {
        EntryFilter {
            query: self.search.clone(),
            kinds: self.kinds.clone(),
            themes: self.themes.clone(),
            date: self.since,
        }
    }
}

#[derive(Parser)]
struct ListCommand {
    /// Maximum number of fragments to show
    #[arg(short, long, default_value_t = DEFAULT_LIST_LIMIT)]
    limit: usize,

    /// Hide fragments without themes
    #[arg(long)]
    clustered: bool,

    #[command(flatten)]
    filters: FilterArgs,
}

#[derive(Parser)]
struct AnalyzeCommand {
    /// Id of the fragment to analyze
    #[arg(value_name = "ID")]
    id: String,
}

#[derive(Parser)]
struct GraphCommand {
    /// Links each fragment may keep from its own strongest candidates
    #[arg(long, value_name = "N", default_value_t = MAX_LINKS_PER_NODE)]
    max_links: usize,

    #[command(flatten)]
    filters: FilterArgs,
}

#[derive(Parser)]
struct ThemesCommand {
    /// Number of top themes to show
    #[arg(
        long,
        value_name = "N",
        default_value_t = DEFAULT_TOP_THEMES,
        conflicts_with_all = ["find", "all"]
    )]
    top: usize,

    /// Show themes whose name contains this text
    #[arg(long, value_name = "TEXT", conflicts_with = "all")]
    find: Option<String>,

    /// Show every theme
    #[arg(long)]
    all: bool,

    #[command(flatten)]
    filters: FilterArgs,
}

#[derive(Parser)]
struct DeleteCommand {
    /// Id of the fragment to delete
    #[arg(value_name = "ID")]
    id: String,
}

#[derive(Parser)]
struct ExportCommand {
    /// Output format: json or markdown
    #[arg(short, long, value_name = "FORMAT", default_value = "json")]
    format: ExportFormat,

    /// Output file (defaults to vaulta-export-<date> in the current directory)
    #[arg(short, long, value_name = "PATH")]
    out: Option<PathBuf>,
}

#[derive(Parser)]
struct ModelCommand {
    /// Model to save as the default
    #[arg(value_name = "NAME", conflicts_with = "clear")]
    name: Option<String>,

    /// Forget the saved model
    #[arg(long)]
    clear: bool,
}

#[derive(Parser)]
struct DoctorCommand {
    /// Analyze every unfiled fragment
    #[arg(long)]
    backfill: bool,

    /// Skip the backfill confirmation prompt
    #[arg(short, long, requires = "backfill")]
    yes: bool,
}

fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        // Determine exit code based on error type
        let exit_code = if is_user_error(&e) { 1 } else { 2 };
        eprintln!("Error: {e:#}");
        std::process::exit(exit_code);
    }
}

fn run(cli: &Cli) -> Result<()> {
    if let Commands::Add(cmd) = &cli.command
        && cmd.text.trim().is_empty()
    {
        anyhow::bail!("Entry text cannot be empty");
    }

    let db_path = get_database_path()?;
    ensure_database_directory(&db_path)?;
    let db = Database::open(&db_path).context("Failed to open database")?;
    let service = VaultService::new(db);
    let model = resolve_model(cli.model.as_deref(), service.selected_model()?.as_deref());
    let now = OffsetDateTime::now_utc();

    match &cli.command {
        Commands::Add(cmd) => execute_add(&service, &cmd.text, cmd.analyze.then_some(&model)),
        Commands::List(cmd) => execute_list(&service, cmd, now),
        Commands::Analyze(cmd) => execute_analyze(&service, &cmd.id, &model),
        Commands::Graph(cmd) => execute_graph(&service, cmd, now),
        Commands::Themes(cmd) => execute_themes(&service, cmd, now),
        Commands::Reflect => execute_reflect(&service, &model, now),
        Commands::Remind => execute_remind(&service, now),
        Commands::Delete(cmd) => execute_delete(&service, &cmd.id),
        Commands::Export(cmd) => execute_export(&service, cmd, now),
        Commands::Model(cmd) => execute_model(&service, cmd, cli.model.as_deref()),
        Commands::Doctor(cmd) => execute_doctor(&service, &db_path.to_string_lossy(), cmd, &model),
    }
}

/// Determines if an error is a user error (vs internal error).
///
/// User errors include validation failures like empty text or an unknown
/// id. Internal errors include database failures, I/O errors and model
/// failures.
fn is_user_error(error: &anyhow::Error) -> bool {
    if let Some(ReflectError::NothingToReflectOn) = error.downcast_ref::<ReflectError>() {
        return true;
    }
    let error_msg = error.to_string();
    error_msg.contains("cannot be empty") || error_msg.contains("not found")
}

fn ollama_client(model: &str) -> Result<OllamaClient> {
    OllamaClientBuilder::new()
        .model(model)
        .build()
        .context("Failed to build Ollama client")
}

fn analyzer(model: &str) -> Result<EntryAnalyzer> {
    Ok(EntryAnalyzer::new(Arc::new(ollama_client(model)?)))
}

/// Loads every entry, newest first.
fn all_entries(service: &VaultService) -> Result<Vec<Entry>> {
    service.list_entries(ListEntriesOptions::default())
}

fn execute_add(service: &VaultService, text: &str, analyze_with: Option<&String>) -> Result<()> {
    let entry = service.capture(text).context("Failed to capture entry")?;
    println!("Captured {}", entry.id);

    if let Some(model) = analyze_with {
        // The fragment stays saved even when analysis fails.
        match analyzer(model)?.analyze(model, &entry.text) {
            Ok(meta) => {
                service.set_meta(&entry.id, Some(&meta), Some(model))?;
                println!("{}", describe_meta(&meta));
            }
            Err(e) => eprintln!("Warning: analysis failed, fragment left unfiled: {e}"),
        }
    }

    Ok(())
}

fn execute_list(service: &VaultService, cmd: &ListCommand, now: OffsetDateTime) -> Result<()> {
    let mut entries = cmd.filters.to_filter().apply(&all_entries(service)?, now);
    if cmd.clustered {
        entries = filter::only_clustered(entries);
    }

    if entries.is_empty() {
        println!("No fragments found.");
        return Ok(());
    }

    for entry in entries.iter().take(cmd.limit) {
        println!("{}", format_entry_line(entry));
    }
    if entries.len() > cmd.limit {
        println!("... and {} more", entries.len() - cmd.limit);
    }
    Ok(())
}

fn execute_analyze(service: &VaultService, id: &str, model: &str) -> Result<()> {
    let id = EntryId::new(id);
    let entry = service
        .get_entry(&id)?
        .ok_or_else(|| anyhow::anyhow!("Entry not found: {id}"))?;

    let meta = analyzer(model)?
        .analyze(model, &entry.text)
        .context("Failed to analyze entry")?;
    service.set_meta(&id, Some(&meta), Some(model))?;

    println!("{}", describe_meta(&meta));
    Ok(())
}

fn execute_graph(service: &VaultService, cmd: &GraphCommand, now: OffsetDateTime) -> Result<()> {
    let entries = cmd.filters.to_filter().apply(&all_entries(service)?, now);
    let config = GraphConfig {
        max_links_per_node: cmd.max_links,
    };
    let graph = build_graph_with(&entries, &config);

    if graph.is_sparse() {
        eprintln!("Not enough shared themes yet to draw connections.");
    }
    println!("{}", serde_json::to_string_pretty(&graph)?);
    Ok(())
}

/// Theme counts over the entries the view filters let through.
fn filtered_theme_counts(
    service: &VaultService,
    filters: &FilterArgs,
    now: OffsetDateTime,
) -> Result<Vec<ThemeCount>> {
    let entries = filters.to_filter().apply(&all_entries(service)?, now);
    Ok(themes::theme_counts(&entries))
}

fn execute_themes(service: &VaultService, cmd: &ThemesCommand, now: OffsetDateTime) -> Result<()> {
    let counts = filtered_theme_counts(service, &cmd.filters, now)?;
    if counts.is_empty() {
        println!("No themes yet. Analyze some fragments first.");
        return Ok(());
    }

    let shown: Vec<&ThemeCount> = if let Some(query) = &cmd.find {
        themes::search_themes(&counts, query)
    } else if cmd.all {
        counts.iter().collect()
    } else {
        themes::top_themes(&counts, cmd.top).iter().collect()
    };

    let width = shown.iter().map(|c| c.theme.chars().count()).max().unwrap_or(0);
    for count in shown {
        println!("{:<width$}  {:>4}", count.theme, count.count);
    }
    Ok(())
}

fn execute_reflect(service: &VaultService, model: &str, now: OffsetDateTime) -> Result<()> {
    let reflector = Reflector::new(Arc::new(ollama_client(model)?));
    let reflection = reflector.reflect(model, &all_entries(service)?, now)?;
    service.save_reflection(&reflection)?;

    if !reflection.highlights.is_empty() {
        println!("Highlights:");
        for highlight in &reflection.highlights {
            println!("  - {highlight}");
        }
    }
    if !reflection.themes.is_empty() {
        println!("Themes: {}", reflection.themes.join(", "));
    }
    if !reflection.note.is_empty() {
        println!();
        println!("{}", reflection.note);
    }
    Ok(())
}

fn execute_remind(service: &VaultService, now: OffsetDateTime) -> Result<()> {
    let entries = all_entries(service)?;
    let latest = service.latest_reflection()?;

    if let Some(reminder) = gentle_reminder(&entries, latest.as_ref(), now) {
        println!("{reminder}");
    }
    Ok(())
}

fn execute_delete(service: &VaultService, id: &str) -> Result<()> {
    let id = EntryId::new(id);
    if !service.delete_entry(&id)? {
        anyhow::bail!("Entry not found: {id}");
    }
    println!("Deleted {id}");
    Ok(())
}

fn execute_export(service: &VaultService, cmd: &ExportCommand, now: OffsetDateTime) -> Result<()> {
    let entries = all_entries(service)?;
    let reflections = service.list_reflections()?;

    let content = match cmd.format {
        ExportFormat::Json => export::export_json(&entries, &reflections, now)?,
        ExportFormat::Markdown => export::export_markdown(&entries, &reflections, now)?,
    };

    let path = cmd
        .out
        .clone()
        .unwrap_or_else(|| PathBuf::from(export::export_filename(cmd.format, now)));
    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write export to {}", path.display()))?;

    println!(
        "Exported {} fragments and {} reflections to {}",
        entries.len(),
        reflections.len(),
        path.display()
    );
    Ok(())
}

fn execute_model(service: &VaultService, cmd: &ModelCommand, flag: Option<&str>) -> Result<()> {
    if cmd.clear {
        service.set_selected_model(None)?;
        println!("Saved model cleared. Using {}", resolve_model(flag, None));
        return Ok(());
    }

    if let Some(name) = &cmd.name {
        if name.trim().is_empty() {
            anyhow::bail!("Model name cannot be empty");
        }
        service.set_selected_model(Some(name.trim()))?;
        println!("Saved model: {}", name.trim());
        return Ok(());
    }

    let saved = service.selected_model()?;
    println!("Model: {}", resolve_model(flag, saved.as_deref()));
    match saved {
        Some(saved) => println!("Saved: {saved}"),
        None => println!("Saved: (none)"),
    }
    Ok(())
}

fn execute_doctor(
    service: &VaultService,
    db_path: &str,
    cmd: &DoctorCommand,
    model: &str,
) -> Result<()> {
    let client = ollama_client(model)?;
    doctor::run_health_checks(db_path, service, &client)?;

    if !cmd.backfill {
        return Ok(());
    }

    println!();
    let plan = doctor::create_backfill_plan(service)?;
    if plan.is_empty() {
        println!("Nothing to backfill. Every fragment is filed.");
        return Ok(());
    }

    doctor::print_backfill_plan(&plan);
    if !cmd.yes && !doctor::confirm_backfill() {
        println!("Backfill cancelled.");
        return Ok(());
    }

    let analyzer = EntryAnalyzer::new(Arc::new(client));
    let result = doctor::execute_backfill(service, &analyzer, model, &plan)?;
    doctor::print_backfill_summary(&result);
    Ok(())
}

fn describe_meta(meta: &vaulta::EntryMeta) -> String {
    let mut out = format!("{} / {}", meta.kind, meta.tone);
    if !meta.themes.is_empty() {
        out.push_str(&format!(" [{}]", meta.themes.join(", ")));
    }
    if !meta.summary.is_empty() {
        out.push_str(&format!("\n{}", meta.summary));
    }
    out
}

/// One line per entry: short id, date, type and the first line of text.
fn format_entry_line(entry: &Entry) -> String {
    let short_id: String = entry.id.as_str().chars().take(8).collect();
    let date = entry.created_at.date();
    let kind = entry
        .meta
        .as_ref()
        .map_or("unfiled".to_string(), |m| m.kind.to_string());
    let first_line = entry.text.lines().next().unwrap_or_default();
    let preview: String = first_line.chars().take(60).collect();
    let ellipsis = if first_line.chars().count() > 60 || entry.text.lines().count() > 1 {
        "…"
    } else {
        ""
    };

    format!("{short_id}  {date}  {kind:<7}  {preview}{ellipsis}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaulta::EntryBuilder;

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn filter_flags_parse_into_entry_filter() {
        let cli = Cli::parse_from([
            "vaulta",
            "list",
            "--search",
            "tide",
            "--type",
            "game,unfiled",
            "--theme",
            "maps",
            "--theme",
            "boats",
            "--since",
            "30d",
        ]);
        let Commands::List(cmd) = cli.command else {
            panic!("expected list command");
        };

        let filter = cmd.filters.to_filter();
        assert_eq!(filter.query.as_deref(), Some("tide"));
        assert_eq!(
            filter.kinds,
            vec![KindFilter::Kind(vaulta::EntryKind::Game), KindFilter::Unfiled]
        );
        assert_eq!(filter.themes, vec!["maps", "boats"]);
        assert_eq!(filter.date, DateFilter::Last30Days);
        assert_eq!(cmd.limit, DEFAULT_LIST_LIMIT);
    }

    #[test]
    fn unknown_type_is_rejected_by_parser() {
        assert!(Cli::try_parse_from(["vaulta", "list", "--type", "poem"]).is_err());
        assert!(Cli::try_parse_from(["vaulta", "graph", "--since", "1w"]).is_err());
    }

    #[test]
    fn graph_defaults_to_five_links() {
        let cli = Cli::parse_from(["vaulta", "graph"]);
        let Commands::Graph(cmd) = cli.command else {
            panic!("expected graph command");
        };
        assert_eq!(cmd.max_links, MAX_LINKS_PER_NODE);
        assert_eq!(cmd.filters.since, DateFilter::Any);
    }

    #[test]
    fn global_model_flag_after_subcommand() {
        let cli = Cli::parse_from(["vaulta", "reflect", "--model", "gemma3:4b"]);
        assert_eq!(cli.model.as_deref(), Some("gemma3:4b"));
    }

    #[test]
    fn themes_flags_conflict() {
        assert!(Cli::try_parse_from(["vaulta", "themes", "--top", "3", "--all"]).is_err());
        assert!(Cli::try_parse_from(["vaulta", "themes", "--find", "x", "--all"]).is_err());
        let find_and_top = ["vaulta", "themes", "--find", "x", "--top", "3"];
        assert!(Cli::try_parse_from(find_and_top).is_err());
    }

    #[test]
    fn themes_accepts_view_filters() {
        let cli = Cli::parse_from(["vaulta", "themes", "--since", "7d", "--type", "game"]);
        let Commands::Themes(cmd) = cli.command else {
            panic!("expected themes command");
        };

        let filter = cmd.filters.to_filter();
        assert_eq!(filter.date, DateFilter::Last7Days);
        assert_eq!(filter.kinds, vec![KindFilter::Kind(vaulta::EntryKind::Game)]);
        assert_eq!(cmd.top, DEFAULT_TOP_THEMES);

        let cli = Cli::parse_from(["vaulta", "themes", "--search", "tide", "--find", "ma"]);
        let Commands::Themes(cmd) = cli.command else {
            panic!("expected themes command");
        };
        assert_eq!(cmd.filters.search.as_deref(), Some("tide"));
        assert_eq!(cmd.find.as_deref(), Some("ma"));
    }

    #[test]
    fn theme_counts_skip_entries_outside_the_period() {
        let now = time::macros::datetime!(2024-06-10 12:00 UTC);
        let service = VaultService::new(Database::in_memory().unwrap());
        for (id, themes, days_ago) in [
            ("old", &["harbors", "tides"][..], 20),
            ("new", &["tides"][..], 2),
        ] {
            let entry = EntryBuilder::new()
                .id(id)
                .text(id)
                .created_at(now - time::Duration::days(days_ago))
                .themes(themes.iter().copied())
                .build();
            service.insert_entry(&entry).unwrap();
        }

        let cli = Cli::parse_from(["vaulta", "themes", "--since", "7d"]);
        let Commands::Themes(cmd) = cli.command else {
            panic!("expected themes command");
        };
        let recent = filtered_theme_counts(&service, &cmd.filters, now).unwrap();
        assert_eq!(recent, vec![ThemeCount::new("tides", 1)]);

        let unfiltered = FilterArgs::default();
        let everything = filtered_theme_counts(&service, &unfiltered, now).unwrap();
        assert_eq!(
            everything,
            vec![ThemeCount::new("tides", 2), ThemeCount::new("harbors", 1)]
        );
    }

    #[test]
    fn delete_removes_fragment_and_rejects_unknown_ids() {
        let service = VaultService::new(Database::in_memory().unwrap());
        let entry = service.capture("a tide clock").unwrap();

        execute_delete(&service, entry.id.as_str()).unwrap();
        assert!(service.get_entry(&entry.id).unwrap().is_none());

        let err = execute_delete(&service, entry.id.as_str()).unwrap_err();
        assert!(err.to_string().contains("not found"));
        assert!(is_user_error(&err));
    }

    #[test]
    fn empty_text_is_a_user_error() {
        let cli = Cli::parse_from(["vaulta", "add", "   \n\t  "]);
        let err = run(&cli).unwrap_err();
        assert!(err.to_string().contains("cannot be empty"));
        assert!(is_user_error(&err));
    }

    #[test]
    fn nothing_to_reflect_on_is_a_user_error() {
        let err = anyhow::Error::from(ReflectError::NothingToReflectOn);
        assert!(is_user_error(&err));
        assert!(!is_user_error(&anyhow::anyhow!("disk full")));
    }

    #[test]
    fn add_and_list_against_in_memory_database() {
        let service = VaultService::new(Database::in_memory().unwrap());
        execute_add(&service, "a tide clock", None).unwrap();

        let entries = all_entries(&service).unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].is_unfiled());
    }

    #[test]
    fn analyze_unknown_id_is_not_found() {
        let service = VaultService::new(Database::in_memory().unwrap());
        let err = execute_analyze(&service, "missing", "m").unwrap_err();
        assert!(err.to_string().contains("not found"));
        assert!(is_user_error(&err));
    }

    #[test]
    fn model_command_saves_and_clears() {
        let service = VaultService::new(Database::in_memory().unwrap());

        let set = ModelCommand {
            name: Some(" gemma3:4b ".to_string()),
            clear: false,
        };
        execute_model(&service, &set, None).unwrap();
        assert_eq!(service.selected_model().unwrap().as_deref(), Some("gemma3:4b"));

        let clear = ModelCommand {
            name: None,
            clear: true,
        };
        execute_model(&service, &clear, None).unwrap();
        assert_eq!(service.selected_model().unwrap(), None);
    }

    #[test]
    fn entry_line_shows_short_id_and_first_line() {
        let entry = EntryBuilder::new()
            .id("0123456789abcdef")
            .text("first line\nsecond line")
            .created_at(time::macros::datetime!(2024-06-10 12:00 UTC))
            .build();

        assert_eq!(
            format_entry_line(&entry),
            "01234567  2024-06-10  unfiled  first line…"
        );
    }
}
