use anyhow::{bail, Context, Result};
use clap::Parser;
use idp_console::{ClientConfig, Console};
use idp_forms::{FormOptions, FormState, SchemaContext, ValueSet};
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// Renders the dynamic property form of one resource type on one cloud provider.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "idp_console.yaml")]
    config: PathBuf,
    #[arg(short, long)]
    resource_type: String,
    /// Cloud provider id or name.
    #[arg(short = 'p', long)]
    cloud_provider: String,
    #[arg(long, default_value = "blueprint", value_parser = parse_context)]
    context: SchemaContext,
    #[arg(short, long)]
    user_email: Option<String>,
    /// Values (JSON or YAML) to fill the form with.
    #[arg(long)]
    values: Option<PathBuf>,
    /// Validate the values and print the errors. Exits with status 2 when any field fails.
    #[arg(long)]
    validate: bool,
    /// Render as in edit mode: declared defaults are not applied.
    #[arg(long)]
    edit: bool,
}

fn parse_context(s: &str) -> Result<SchemaContext, String> {
    s.parse()
}

fn load_values(path: &Path) -> Result<ValueSet> {
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read values file: {:?}", path))?;
    let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("").to_lowercase();
    let values = match extension.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&content)?,
        "json" => serde_json::from_str(&content)?,
        other => bail!("Unsupported values format '{}', expected .json, .yaml or .yml", other),
    };
    Ok(values)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ClientConfig::from_file(&cli.config)
        .with_context(|| format!("Failed to load configuration from {:?}", cli.config))?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.log_level.as_str())).init();
    debug!("CLI arguments: {:?}", cli);

    let console = Console::new(&config)?;

    let cloud_provider_id = match console.cloud_providers().resolve(&cli.cloud_provider).await {
        Ok(Some(id)) => id,
        Ok(None) => {
            warn!("Unknown cloud provider '{}', using it as an id", cli.cloud_provider);
            cli.cloud_provider.clone()
        }
        Err(e) => {
            warn!("Could not load cloud providers ({}), using '{}' as an id", e, cli.cloud_provider);
            cli.cloud_provider.clone()
        }
    };

    let form = console.form(FormOptions {
        user_email: cli.user_email.clone(),
        is_edit_mode: cli.edit,
        ..Default::default()
    });
    if let Some(path) = &cli.values {
        form.set_values(load_values(path)?);
    }

    info!("Loading {} schema for {}/{}", cli.context, cli.resource_type, cloud_provider_id);
    let state = form.select(Some(cli.resource_type.as_str()), Some(cloud_provider_id.as_str()), cli.context).await;
    println!("{}", form.render(console.registry())?);

    if let FormState::Error(e) = &state {
        bail!("{}", e.user_message());
    }

    if cli.validate {
        let errors = form.validate_all();
        if errors.is_empty() {
            info!("All {} properties are valid", state.schemas().len());
        } else {
            for (property, message) in &errors {
                eprintln!("{}: {}", property, message);
            }
            std::process::exit(2);
        }
    }
    Ok(())
}
