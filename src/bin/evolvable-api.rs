//! Evolvable API CLI
//!
//! Command-line interface for serving the reference user API, inspecting and
//! linting resource documents, and driving the user directory through its
//! vocabulary.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use evolvable_api::server::{self, ApiVersion, ServerConfig};
use evolvable_api::users::{profile_mapping, DELETE_RELATION};
use evolvable_api::{
    is_url, lint, load_document, load_document_auto, project, FieldProjector, FileStatus,
    HypermediaClient, HypermediaError, InvokerOptions, Iri, ProjectionState, Severity, UserService,
};
use reqwest::Url;
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "evolvable-api")]
#[command(about = "Resolve API operations through a semantic vocabulary")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve one revision of the reference user API
    Serve {
        /// Socket address to listen on (overrides EVOLVABLE_BIND)
        #[arg(long)]
        bind: Option<SocketAddr>,

        /// JSON file holding the users (overrides EVOLVABLE_DATA)
        #[arg(long)]
        data: Option<PathBuf>,

        /// API revision: v1, v2 or v3 (overrides EVOLVABLE_API_VERSION)
        #[arg(long, value_parser = parse_version)]
        api_version: Option<ApiVersion>,

        /// Server URL advertised in the document (overrides EVOLVABLE_PUBLIC_URL)
        #[arg(long)]
        public_url: Option<String>,
    },

    /// Print the concept index of a resource document
    Operations {
        /// Document source: file path or URL (http:// or https://)
        document: String,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Lint resource documents (syntax, broken refs, unbound parameters, annotations)
    Lint {
        /// File or directory to lint
        path: PathBuf,

        /// Output format: text (default) or json
        #[arg(long, default_value = "text")]
        format: String,

        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,

        /// Suppress progress output, only show errors
        #[arg(long, short)]
        quiet: bool,
    },

    /// Fetch one user and print its profile card
    GetUser {
        #[command(flatten)]
        api: ApiArgs,

        /// User identifier
        id: u64,
    },

    /// List every user
    ListUsers {
        #[command(flatten)]
        api: ApiArgs,
    },

    /// Delete a user through the relation its representation offers
    DeleteUser {
        #[command(flatten)]
        api: ApiArgs,

        /// User identifier
        id: u64,
    },
}

#[derive(Args)]
struct ApiArgs {
    /// Document source: file path or URL (http:// or https://)
    document: String,

    /// Server URL to invoke operations against (default: the document's)
    #[arg(long)]
    base_url: Option<Url>,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// Check responses against their declared schemas
    #[arg(long)]
    validate: bool,

    /// Output results as JSON
    #[arg(long)]
    json: bool,
}

fn parse_version(s: &str) -> Result<ApiVersion, evolvable_api::ConfigError> {
    s.parse()
}

fn setup_tracing(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Serve { .. } => setup_tracing("evolvable_api=info,tower_http=info"),
        _ => setup_tracing("evolvable_api=warn"),
    }

    let result = match cli.command {
        Commands::Serve {
            bind,
            data,
            api_version,
            public_url,
        } => run_serve(bind, data, api_version, public_url).await,
        Commands::Operations { document, json } => run_operations(&document, json).await,
        Commands::Lint {
            path,
            format,
            strict,
            quiet,
        } => run_lint(&path, &format, strict, quiet),
        Commands::GetUser { api, id } => run_get_user(&api, id).await,
        Commands::ListUsers { api } => run_list_users(&api).await,
        Commands::DeleteUser { api, id } => run_delete_user(&api, id).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

async fn run_serve(
    bind: Option<SocketAddr>,
    data: Option<PathBuf>,
    api_version: Option<ApiVersion>,
    public_url: Option<String>,
) -> Result<(), u8> {
    let mut config = ServerConfig::from_env().map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;
    if let Some(bind) = bind {
        config.bind = bind;
    }
    if data.is_some() {
        config.data = data;
    }
    if let Some(version) = api_version {
        config.version = version;
    }
    if public_url.is_some() {
        config.public_url = public_url;
    }

    server::run(config).await.map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })
}

async fn run_operations(source: &str, json: bool) -> Result<(), u8> {
    let document = load_document_auto(source).await.map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    let mut concepts: Vec<&Iri> = document.index().concepts().collect();
    concepts.sort_by(|a, b| a.as_str().cmp(b.as_str()));

    if json {
        let index: serde_json::Map<String, Value> = concepts
            .iter()
            .map(|concept| {
                let operations: Vec<Value> = document
                    .find_operations(*concept)
                    .iter()
                    .map(|op| {
                        json!({
                            "operationId": op.id,
                            "method": op.method.as_str(),
                            "path": op.url_template,
                        })
                    })
                    .collect();
                (concept.to_string(), Value::Array(operations))
            })
            .collect();
        print_json(&Value::Object(index));
        return Ok(());
    }

    if concepts.is_empty() {
        println!("No concepts declared ({} operations)", document.operations().len());
        return Ok(());
    }
    for concept in concepts {
        println!("{}", concept);
        for op in document.find_operations(concept).iter() {
            println!("  {} {} ({})", op.method, op.url_template, op.id);
        }
    }
    Ok(())
}

fn run_lint(path: &Path, format: &str, strict: bool, quiet: bool) -> Result<(), u8> {
    if !path.exists() {
        eprintln!("Error: path not found: {}", path.display());
        return Err(2);
    }

    let result = lint(path, strict);

    if format == "json" {
        match serde_json::to_string_pretty(&result) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("Error: {}", e);
                return Err(3);
            }
        }
    } else {
        if !quiet {
            println!("Linting {} ...\n", path.display());
        }

        for file_result in &result.results {
            let status_icon = match file_result.status {
                FileStatus::Ok => "\x1b[32m✓\x1b[0m",
                FileStatus::Warning => "\x1b[33m⚠\x1b[0m",
                FileStatus::Error => "\x1b[31m✗\x1b[0m",
            };

            if !quiet || file_result.status != FileStatus::Ok {
                println!("  {} {}", status_icon, file_result.file.display());
            }

            for diag in &file_result.diagnostics {
                let (color, label) = match diag.severity {
                    Severity::Error => ("\x1b[31m", "error"),
                    Severity::Warning => ("\x1b[33m", "warning"),
                };
                if !quiet || diag.severity == Severity::Error {
                    println!(
                        "    {}{}[{}]\x1b[0m: {} - {}",
                        color, label, diag.code, diag.path, diag.message
                    );
                }
            }
        }

        println!();
        if result.is_ok() && (!strict || result.warnings == 0) {
            println!(
                "\x1b[32m✓ {} files checked, all passed\x1b[0m",
                result.files_checked
            );
        } else {
            println!(
                "\x1b[31m✗ {} files checked: {} passed, {} failed ({} errors, {} warnings)\x1b[0m",
                result.files_checked, result.passed, result.failed, result.errors, result.warnings
            );
        }
    }

    if result.is_ok() && (!strict || result.warnings == 0) {
        Ok(())
    } else {
        Err(1)
    }
}

async fn run_get_user(api: &ApiArgs, id: u64) -> Result<(), u8> {
    let service = connect(api).await?;
    let user = service.get_user_info(id).await.map_err(report)?;
    let can_delete = service.can_delete(&user);

    // The projector publishes Pending first, then the resolved card.
    let projector = FieldProjector::new(profile_mapping());
    projector.assign(Arc::new(user)).await;
    let fields = match projector.current() {
        ProjectionState::Resolved(projection) => projection,
        ProjectionState::Failed(message) => {
            eprintln!("Error: {}", message);
            return Err(3);
        }
        ProjectionState::Pending => {
            eprintln!("Error: profile was not resolved");
            return Err(3);
        }
    };

    if api.json {
        let mut card = Value::Object(fields.fields.clone());
        card["canDelete"] = Value::Bool(can_delete);
        print_json(&card);
        return Ok(());
    }

    println!(
        "{} {} <{}>",
        fields.text("firstName"),
        fields.text("lastName"),
        fields.text("email")
    );
    if !fields.text("bio").is_empty() {
        println!("  {}", fields.text("bio"));
    }
    match fields.get("createdAt") {
        Some(_) => println!("  member since {}", fields.text("createdAt")),
        None => println!("  member since (not disclosed)"),
    }
    println!("  can delete: {}", if can_delete { "yes" } else { "no" });
    Ok(())
}

async fn run_list_users(api: &ApiArgs) -> Result<(), u8> {
    let service = connect(api).await?;
    let users = service.list_users().await.map_err(report)?;
    let mapping = profile_mapping();

    let mut cards = Vec::with_capacity(users.len());
    for user in &users {
        cards.push(project(user, &mapping).await.map_err(report)?);
    }

    if api.json {
        let cards: Vec<Value> = cards.into_iter().map(|c| Value::Object(c.fields)).collect();
        print_json(&Value::Array(cards));
        return Ok(());
    }

    if cards.is_empty() {
        println!("No users");
        return Ok(());
    }
    for card in &cards {
        println!(
            "{} {} <{}>",
            card.text("firstName"),
            card.text("lastName"),
            card.text("email")
        );
    }
    Ok(())
}

async fn run_delete_user(api: &ApiArgs, id: u64) -> Result<(), u8> {
    let service = connect(api).await?;
    let user = service.get_user_info(id).await.map_err(report)?;

    if !service.can_delete(&user) {
        eprintln!("Error: user {} does not offer {}", id, DELETE_RELATION);
        return Err(2);
    }
    service.delete_user(&user).await.map_err(report)?;

    if api.json {
        print_json(&json!({ "deleted": id }));
    } else {
        println!("Deleted user {}", id);
    }
    Ok(())
}

async fn connect(api: &ApiArgs) -> Result<UserService, u8> {
    let mut options = InvokerOptions::default()
        .timeout(Duration::from_secs(api.timeout))
        .validate_responses(api.validate);
    if let Some(base_url) = &api.base_url {
        options = options.base_url(base_url.clone());
    }

    let client = if is_url(&api.document) {
        HypermediaClient::for_api_at_url_with(&api.document, options).await
    } else {
        load_document(Path::new(&api.document))
            .map_err(HypermediaError::from)
            .and_then(|document| HypermediaClient::from_document(document, options))
    };
    client.map(UserService::new).map_err(report)
}

fn report(e: HypermediaError) -> u8 {
    eprintln!("Error: {}", e);
    e.exit_code() as u8
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("Error: {}", e),
    }
}
