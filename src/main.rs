//! product-collector - per-vendor product collectors
//!
//! Finds vendor product pages for spreadsheet rows and writes enriched or
//! Shopify-shaped JSON.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use product_collector::commands::{
    CollectCommand, CollectOptions, FindCommand, FindOptions, IndexCommand, UpcReport,
};
use product_collector::config::{Config, OutputFormat, OutputShape};
use product_collector::format::Formatter;
use product_collector::vendors::Vendor;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "product-collector",
    version,
    about = "Per-vendor product collectors",
    long_about = "Locates vendor product pages from spreadsheet rows, scrapes them and writes enriched or Shopify-shaped JSON."
)]
struct Cli {
    /// Proxy URL (e.g., socks5://host:port)
    #[arg(long, global = true, env = "COLLECTOR_PROXY")]
    proxy: Option<String>,

    /// Delay between requests in milliseconds
    #[arg(long, global = true)]
    delay: Option<u64>,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true)]
    format: Option<OutputFormat>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect every row of an input file
    #[command(alias = "c")]
    Collect {
        /// Vendor to collect from
        #[arg(long)]
        vendor: Vendor,

        /// Input JSON array of products
        #[arg(short, long)]
        input: PathBuf,

        /// Output JSON file
        #[arg(short, long)]
        output: PathBuf,

        /// Catalog JSON (Bradley Caldwell, Ivy Classic)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Site index JSON (Cambridge, Purina Mills)
        #[arg(long)]
        index: Option<PathBuf>,

        /// First row to process (1-based)
        #[arg(long)]
        start: Option<usize>,

        /// Last row to process (1-based, inclusive)
        #[arg(long)]
        end: Option<usize>,

        /// Skip rows whose UPC is already in the output file
        #[arg(long)]
        skip_existing: bool,

        /// Output record shape
        #[arg(long)]
        shape: Option<OutputShape>,

        /// Cambridge dealer portal index JSON
        #[arg(long)]
        portal_index: Option<PathBuf>,

        /// SKU registry JSON for rows without an item number (Shopify shape)
        #[arg(long)]
        sku_registry: Option<PathBuf>,
    },

    /// Locate the product page for a single item
    #[command(alias = "f")]
    Find {
        /// Vendor to search
        #[arg(long)]
        vendor: Vendor,

        #[arg(long)]
        upc: Option<String>,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        color: Option<String>,

        #[arg(long)]
        description: Option<String>,

        /// Catalog JSON (Bradley Caldwell, Ivy Classic)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Site index JSON (Cambridge, Purina Mills)
        #[arg(long)]
        index: Option<PathBuf>,
    },

    /// Crawl a vendor's listing pages into a site index
    Index {
        /// Vendor to crawl
        #[arg(long, required_unless_present = "portal")]
        vendor: Option<Vendor>,

        /// Index the Cambridge dealer portal instead
        #[arg(long, conflicts_with = "vendor")]
        portal: bool,

        /// Where to save the index
        #[arg(short, long)]
        output: PathBuf,
    },

    /// List supported vendors
    Vendors,

    /// Show the normalized forms of a UPC
    Upc {
        /// UPC or EAN code
        code: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new(Level::DEBUG.to_string())
    } else {
        EnvFilter::from_default_env().add_directive(Level::WARN.into())
    };

    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    // Load config with layered overrides
    let mut config = Config::load(cli.config.as_deref())?.with_env();

    // Apply CLI overrides
    if let Some(format) = cli.format {
        config.format = format;
    }
    if let Some(delay) = cli.delay {
        config.delay_ms = delay;
    }
    if let Some(proxy) = cli.proxy {
        config.proxy = Some(proxy);
    }

    match cli.command {
        Commands::Collect {
            vendor,
            input,
            output,
            catalog,
            index,
            start,
            end,
            skip_existing,
            shape,
            portal_index,
            sku_registry,
        } => {
            let options = CollectOptions {
                catalog,
                index,
                start,
                end,
                skip_existing,
                shape,
                portal_index,
                sku_registry,
                ..CollectOptions::new(vendor, input, output)
            };

            let cmd = CollectCommand::new(config);
            let output = cmd.execute(&options).await?;
            println!("{}", output);
        }

        Commands::Find { vendor, upc, title, color, description, catalog, index } => {
            let options = FindOptions { upc, title, color, description, catalog, index };

            let cmd = FindCommand::new(config);
            let output = cmd.execute(vendor, &options).await?;
            println!("{}", output);
        }

        Commands::Index { vendor, portal, output } => {
            let cmd = IndexCommand::new(config);
            let output = match (portal, vendor) {
                (true, _) => cmd.execute_portal(&output).await?,
                (false, Some(vendor)) => cmd.execute(vendor, &output).await?,
                (false, None) => bail!("Pass --vendor or --portal"),
            };
            println!("{}", output);
        }

        Commands::Vendors => {
            println!("{}", Formatter::new(config.format).format_vendors(Vendor::all()));
        }

        Commands::Upc { code } => {
            println!("{}", Formatter::new(config.format).format_upc(&UpcReport::new(&code)));
        }
    }

    Ok(())
}
