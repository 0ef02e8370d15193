use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use inventory_desk::app::{ImageLookup, Inventory, ItemForm};
use inventory_desk::config::{AppConfig, ImageBackend};
use inventory_desk::domain::{ItemCode, SearchCriteria};
use inventory_desk::images::local_fs::LocalImageResolver;
use inventory_desk::images::s3::S3ImageResolver;
use inventory_desk::images::{ImageResolver, NoImages};
use inventory_desk::server::session::AuthSettings;
use inventory_desk::server::{create_server, start_server, AppState};
use inventory_desk::storage::{CatalogSchema, CatalogStore, SqliteCatalog};
use inventory_desk::{logging, observability};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "inventory_desk")]
#[command(about = "Equipment inventory search, enquiries and catalog editing")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// Port to listen on (overrides config and PORT)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Create the catalog table for the configured schema
    Migrate,
    /// Search the catalog the way the client page does
    Search {
        #[arg(long)]
        term: Option<String>,
        #[arg(long)]
        category: Option<String>,
    },
    /// List every record
    List,
    /// List distinct categories
    Categories,
    /// Show one record
    Show { code: i64 },
    /// Add a record, or update it when --item-code is given
    Save(SaveArgs),
    /// Compose an enquiry for the given item codes
    Enquiry {
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

#[derive(Args)]
struct SaveArgs {
    #[arg(long, default_value = "")]
    item_code: String,
    #[arg(long, default_value = "")]
    category: String,
    #[arg(long, default_value = "")]
    sub_category: String,
    #[arg(long, default_value = "")]
    category_description: String,
    #[arg(long, default_value = "")]
    make: String,
    #[arg(long, default_value = "")]
    model: String,
    #[arg(long, default_value = "")]
    certification: String,
    #[arg(long, default_value = "")]
    specification: String,
    #[arg(long, default_value = "")]
    location: String,
    #[arg(long, default_value = "")]
    price: String,
    #[arg(long, default_value = "")]
    quantity: String,
}

impl From<SaveArgs> for ItemForm {
    fn from(args: SaveArgs) -> Self {
        ItemForm {
            item_code: args.item_code,
            category: args.category,
            sub_category: args.sub_category,
            category_description: args.category_description,
            make: args.make,
            model: args.model,
            certification: args.certification,
            specification: args.specification,
            location: args.location,
            price: args.price,
            quantity: args.quantity,
        }
    }
}

fn open_store(config: &AppConfig) -> Result<Arc<dyn CatalogStore>> {
    let schema = CatalogSchema::for_kind(config.database.schema);
    let store = SqliteCatalog::open(&config.database.path, schema, config.database.timeout())
        .with_context(|| {
            format!(
                "opening catalog database at {}",
                config.database.path.display()
            )
        })?;
    Ok(Arc::new(store))
}

async fn image_resolver(config: &AppConfig) -> Result<Arc<dyn ImageResolver>> {
    let images = &config.images;
    let resolver: Arc<dyn ImageResolver> = match images.backend {
        ImageBackend::None => Arc::new(NoImages),
        ImageBackend::S3 => Arc::new(S3ImageResolver::connect(&images.s3_settings()).await?),
        ImageBackend::Local => Arc::new(LocalImageResolver::new(
            images.local_root.clone(),
            &images.namespace,
            &images.public_base_url,
        )),
    };
    Ok(resolver)
}

async fn build_inventory(config: &AppConfig) -> Result<Inventory> {
    let lookup = ImageLookup {
        concurrency: config.images.concurrency,
        timeout: config.images.timeout(),
    };
    Ok(Inventory::new(
        open_store(config)?,
        image_resolver(config).await?,
        lookup,
    ))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_logging();

    let cli = Cli::parse();
    let config = AppConfig::load()?;

    match cli.command {
        Commands::Serve { port } => {
            config.validate_for_serving()?;
            observability::init_metrics();

            let inventory = build_inventory(&config).await?;
            let auth = AuthSettings::new(
                &config.auth.password,
                &config.auth.secret_key,
                config.auth.session_ttl(),
            );
            let images_dir = (config.images.backend == ImageBackend::Local)
                .then(|| config.images.local_root.clone());

            let app = create_server(AppState::new(inventory, auth), images_dir);
            start_server(app, port.unwrap_or(config.server.port)).await?;
        }
        Commands::Migrate => {
            open_store(&config)?;
            info!("Migration complete");
        }
        Commands::Search { term, category } => {
            let inventory = build_inventory(&config).await?;
            let criteria = SearchCriteria::new(term.as_deref(), category.as_deref());
            print_json(&inventory.query.search(&criteria).await?)?;
        }
        Commands::List => {
            let inventory = build_inventory(&config).await?;
            print_json(&inventory.query.list_all().await?)?;
        }
        Commands::Categories => {
            let inventory = build_inventory(&config).await?;
            for category in inventory.query.categories().await? {
                println!("{category}");
            }
        }
        Commands::Show { code } => {
            let inventory = build_inventory(&config).await?;
            match inventory.query.item(ItemCode(code)).await? {
                Some(record) => print_json(&record)?,
                None => anyhow::bail!("item {code} not found"),
            }
        }
        Commands::Save(args) => {
            let inventory = build_inventory(&config).await?;
            let outcome = inventory.reconciler.save(&args.into()).await?;
            println!("{}", outcome.notice().message);
            if !outcome.is_success() {
                std::process::exit(1);
            }
        }
        Commands::Enquiry { ids } => {
            let inventory = build_inventory(&config).await?;
            match inventory.enquiries.compose(&ids).await? {
                Some(enquiry) => println!("{}", enquiry.message),
                None => anyhow::bail!("no items selected"),
            }
        }
    }

    Ok(())
}
