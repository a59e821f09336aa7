mod cache;
mod cart;
mod catalog;
mod commands;
mod config;
mod db;
mod logging;
mod session;
mod shop;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use std::path::PathBuf;

use catalog::{PriceBucket, SortKey};

#[derive(Parser, Debug)]
#[command(name = "storefront")]
#[command(about = "Browse and manage a storefront from the terminal, with an offline catalog")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/storefront/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Echo debug logs to stderr
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
  /// List products, optionally filtered and sorted
  Products {
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    sub_category: Option<String>,
    /// Price bucket: MIN-MAX, MIN+ or -MAX
    #[arg(long)]
    price: Option<PriceBucket>,
    #[arg(long)]
    color: Option<String>,
    #[arg(long)]
    free_shipping: bool,
    #[arg(long)]
    max_delivery_days: Option<u32>,
    #[arg(long, value_enum)]
    sort: Option<SortKey>,
    /// Ignore the cache and fetch from the backend
    #[arg(long)]
    refresh: bool,
  },
  /// Search product names, descriptions and tags
  Search { query: String },
  /// Show one product with its variations
  Product { id: String },
  /// List categories
  Categories {
    #[arg(long)]
    refresh: bool,
  },
  /// List the sub-categories of a category
  Subcategories { category_id: String },
  /// Re-fetch the catalog and categories
  Refresh,
  /// Keep the catalog refreshed until Ctrl-C
  Watch,
  /// Manage the local cart
  Cart {
    #[command(subcommand)]
    action: CartAction,
  },
  /// Sign in (password from STOREFRONT_PASSWORD)
  Login {
    #[arg(long)]
    email: String,
  },
  /// Create an account (password from STOREFRONT_PASSWORD)
  Signup {
    #[arg(long)]
    name: String,
    #[arg(long)]
    email: String,
  },
  /// Forget the stored session
  Logout,
  /// Request a password reset email
  ForgotPassword {
    #[arg(long)]
    email: String,
  },
  /// Set a new password (from STOREFRONT_PASSWORD) with a reset token
  ResetPassword { token: String },
  /// Show the signed-in user
  Me,
  /// Change profile fields of the signed-in user
  Profile {
    #[arg(long)]
    name: Option<String>,
    /// JSON file with the full address list
    #[arg(long)]
    addresses: Option<PathBuf>,
  },
  /// List the signed-in user's orders
  Orders,
  /// Catalog and user administration
  Admin {
    #[command(subcommand)]
    action: AdminAction,
  },
}

#[derive(Subcommand, Debug)]
pub enum CartAction {
  /// Show cart lines and subtotal
  List,
  /// Add a product variation
  Add {
    product_id: String,
    /// Variation name (default: the first variation)
    #[arg(long)]
    variation: Option<String>,
    #[arg(long, default_value_t = 1)]
    quantity: u32,
  },
  /// Set the quantity of a line; 0 removes it
  Set { index: usize, quantity: u32 },
  /// Remove a line
  Remove { index: usize },
  /// Empty the cart
  Clear,
}

#[derive(Subcommand, Debug)]
pub enum AdminAction {
  Categories {
    #[command(subcommand)]
    action: AdminCategoryAction,
  },
  Products {
    #[command(subcommand)]
    action: AdminProductAction,
  },
  Users {
    #[command(subcommand)]
    action: AdminUserAction,
  },
  /// Upload an image and print its hosted URL
  Upload { file: PathBuf },
}

#[derive(Subcommand, Debug)]
pub enum AdminCategoryAction {
  Create {
    #[arg(long)]
    name: String,
    #[arg(long)]
    description: Option<String>,
    /// Image URL
    #[arg(long)]
    image: Option<String>,
  },
  Update {
    id: String,
    #[arg(long)]
    name: String,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    image: Option<String>,
  },
  Delete { id: String },
}

#[derive(Subcommand, Debug)]
pub enum AdminProductAction {
  /// Create a product from a JSON file
  Create { file: PathBuf },
  /// Replace a product from a JSON file
  Update { id: String, file: PathBuf },
  Delete { id: String },
}

#[derive(Subcommand, Debug)]
pub enum AdminUserAction {
  List,
  Delete { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  let _guard = logging::init(&db::data_dir()?.join("logs"), args.verbose)?;

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;

  let app = commands::App::new(config)?;
  let result = app.run(args.command).await;
  if let Err(err) = &result {
    tracing::error!(error = %err, "command failed");
  }
  result
}
