//! Command execution and terminal output.

use chrono::{DateTime, Utc};
use color_eyre::{
  eyre::{bail, eyre},
  Result,
};
use std::path::Path;
use std::sync::Arc;

use crate::cache::{CacheLayer, CacheSource, ConfiguredStorage, NoopStorage, SqliteStorage};
use crate::cart::{self, Cart, CartItem};
use crate::catalog::{sort_products, CatalogState, ListingFilter, ProductProvider};
use crate::config::Config;
use crate::db::LocalStore;
use crate::session::{Session, SessionStore};
use crate::shop::{
  Address, ApiError, CachedShopClient, CategoryInput, ImageUploader, Product, ProfileUpdate, Role,
  ShopClient, User,
};
use crate::{
  AdminAction, AdminCategoryAction, AdminProductAction, AdminUserAction, CartAction, Command,
};

pub struct App {
  config: Config,
  store: LocalStore,
  shop: CachedShopClient<ConfiguredStorage>,
  provider: Arc<ProductProvider<ShopClient, ConfiguredStorage>>,
}

impl App {
  pub fn new(config: Config) -> Result<Self> {
    let store = LocalStore::open()?;
    let token = SessionStore::new(&store).token(Config::token_override())?;
    let client = ShopClient::new(&config.api.base_url, token)?;

    let storage = if config.cache.enabled {
      ConfiguredStorage::Sqlite(SqliteStorage::open()?)
    } else {
      tracing::info!("catalog cache disabled");
      ConfiguredStorage::Disabled(NoopStorage)
    };
    let cache = CacheLayer::new(storage).with_stale_time(config.cache.freshness());

    let provider = Arc::new(ProductProvider::new(client.clone(), cache.clone()));
    let shop = CachedShopClient::new(client, cache);

    Ok(Self {
      config,
      store,
      shop,
      provider,
    })
  }

  fn sessions(&self) -> SessionStore<'_> {
    SessionStore::new(&self.store)
  }

  pub async fn run(&self, command: Command) -> Result<()> {
    match command {
      Command::Products {
        category,
        sub_category,
        price,
        color,
        free_shipping,
        max_delivery_days,
        sort,
        refresh,
      } => {
        let filter = ListingFilter {
          category_id: category,
          sub_category_id: sub_category,
          price,
          color,
          free_shipping,
          max_delivery_days,
        };
        let products = self.provider.fetch_all_products(refresh).await;
        self.note_catalog_state();

        let mut listing = filter.apply(&products);
        if let Some(key) = sort {
          sort_products(&mut listing, key);
        }
        for product in &listing {
          print_product_line(product);
        }
        println!("{} of {} products", listing.len(), products.len());
      }
      Command::Search { query } => {
        self.provider.fetch_all_products(false).await;
        self.note_catalog_state();
        let found = self.provider.search(query.trim());
        for product in &found {
          print_product_line(product);
        }
        println!("{} matches for '{}'", found.len(), query.trim());
      }
      Command::Product { id } => {
        let result = self.shop.product(&id).await?;
        note_source(result.source, result.cached_at);
        print_product(&result.data);
      }
      Command::Categories { refresh } => {
        let result = self.shop.categories(refresh).await?;
        note_source(result.source, result.cached_at);
        for category in &result.data {
          match &category.description {
            Some(description) => println!("{}  {}  {}", category.id, category.name, description),
            None => println!("{}  {}", category.id, category.name),
          }
        }
      }
      Command::Subcategories { category_id } => {
        let result = self.shop.subcategories(&category_id, false).await?;
        note_source(result.source, result.cached_at);
        for sub in &result.data {
          println!("{}  {}", sub.id, sub.name);
        }
      }
      Command::Refresh => {
        let products = self.provider.refresh_products().await;
        self.note_catalog_state();
        let categories = self.shop.categories(true).await?;
        note_source(categories.source, categories.cached_at);
        println!(
          "{} products, {} categories",
          products.len(),
          categories.data.len()
        );
      }
      Command::Watch => self.watch().await?,
      Command::Cart { action } => self.cart(action).await?,
      Command::Login { email } => {
        let password = Config::get_password()?;
        let auth = self.shop.inner().login(&email, &password).await?;
        self.start_session(auth.token, auth.user)?;
      }
      Command::Signup { name, email } => {
        let password = Config::get_password()?;
        let auth = self.shop.inner().signup(&name, &email, &password).await?;
        self.start_session(auth.token, auth.user)?;
      }
      Command::Logout => {
        self.sessions().clear()?;
        tracing::info!("session cleared");
        println!("Signed out");
      }
      Command::ForgotPassword { email } => {
        self.shop.inner().forgot_password(&email).await?;
        println!("If {} has an account, a reset link is on its way", email);
      }
      Command::ResetPassword { token } => {
        let password = Config::get_password()?;
        self.shop.inner().reset_password(&token, &password).await?;
        println!("Password updated; sign in with `storefront login`");
      }
      Command::Me => self.me().await?,
      Command::Profile { name, addresses } => {
        let addresses = match addresses {
          Some(path) => Some(read_json::<Vec<Address>>(&path)?),
          None => None,
        };
        if name.is_none() && addresses.is_none() {
          bail!("Nothing to change: pass --name and/or --addresses");
        }
        let user = self
          .shop
          .inner()
          .update_profile(&ProfileUpdate { name, addresses })
          .await?;
        if let Some(mut session) = self.sessions().current()? {
          session.user = user.clone();
          self.sessions().save(&session)?;
        }
        print_user(&user);
      }
      Command::Orders => {
        let orders = self.shop.inner().my_orders().await?;
        if orders.is_empty() {
          println!("No orders yet");
        }
        for order in &orders {
          let placed = order
            .created_at
            .map(|t| t.format("%Y-%m-%d").to_string())
            .unwrap_or_default();
          println!("{}  {}  {}  {:.2}", order.id, placed, order.status, order.total);
          for line in &order.line_items {
            println!("    {} x{}  {:.2}", line.name, line.quantity, line.price);
          }
        }
      }
      Command::Admin { action } => self.admin(action).await?,
    }
    Ok(())
  }

  async fn watch(&self) -> Result<()> {
    let mut rx = self.provider.subscribe();
    let interval = self.config.cache.refresh_interval();
    self.provider.start(interval);
    println!(
      "Refreshing the catalog every {}h; Ctrl-C to stop",
      interval.as_secs() / 3600
    );

    loop {
      tokio::select! {
        changed = rx.changed() => {
          if changed.is_err() {
            break;
          }
          let state = rx.borrow_and_update().clone();
          print_state(&state);
        }
        _ = tokio::signal::ctrl_c() => break,
      }
    }

    self.provider.shutdown();
    Ok(())
  }

  async fn cart(&self, action: CartAction) -> Result<()> {
    let cart = Cart::new(&self.store);
    let items = match action {
      CartAction::List => cart.items()?,
      CartAction::Add {
        product_id,
        variation,
        quantity,
      } => {
        let product = self.find_product(&product_id).await?;
        let item = CartItem::for_product(&product, variation.as_deref(), quantity)?;
        tracing::info!(product = %item.product_id, variation = %item.variation_name, quantity, "added to cart");
        cart.add(item)?
      }
      CartAction::Set { index, quantity } => cart.set_quantity(index, quantity)?,
      CartAction::Remove { index } => cart.remove(index)?,
      CartAction::Clear => {
        cart.clear()?;
        Vec::new()
      }
    };

    print_cart(&items);
    Ok(())
  }

  /// Look in the catalog first, then ask for the single product.
  async fn find_product(&self, id: &str) -> Result<Product> {
    self.provider.fetch_all_products(false).await;
    if let Some(product) = self.provider.product(id) {
      return Ok(product);
    }
    Ok(self.shop.product(id).await?.data)
  }

  fn start_session(&self, token: String, user: User) -> Result<()> {
    let session = Session { token, user };
    self.sessions().save(&session)?;
    tracing::info!(user = %session.user.email, "signed in");
    println!("Signed in as {} <{}>", session.user.name, session.user.email);
    Ok(())
  }

  async fn me(&self) -> Result<()> {
    match self.shop.inner().me().await {
      Ok(user) => {
        if let Some(mut session) = self.sessions().current()? {
          session.user = user.clone();
          self.sessions().save(&session)?;
        }
        print_user(&user);
      }
      Err(err) if err.is_network() => {
        let session = self.sessions().current()?.ok_or(err)?;
        eprintln!("Backend unreachable; showing the stored session");
        print_user(&session.user);
      }
      Err(err) => return Err(err.into()),
    }
    Ok(())
  }

  /// Refuse admin commands early when signed out or signed in as a plain
  /// user. A bare STOREFRONT_TOKEN is left for the backend to judge.
  fn require_admin(&self) -> Result<()> {
    if !self.shop.inner().is_authenticated() {
      return Err(ApiError::Unauthenticated.into());
    }
    if let Some(session) = self.sessions().current()? {
      if !session.is_admin() {
        bail!("{} is not an administrator", session.user.email);
      }
    }
    Ok(())
  }

  async fn admin(&self, action: AdminAction) -> Result<()> {
    self.require_admin()?;
    let client = self.shop.inner();

    match action {
      AdminAction::Categories { action } => {
        match action {
          AdminCategoryAction::Create {
            name,
            description,
            image,
          } => {
            let category = client
              .create_category(&CategoryInput {
                name,
                description,
                image,
              })
              .await?;
            println!("Created category {} ({})", category.name, category.id);
          }
          AdminCategoryAction::Update {
            id,
            name,
            description,
            image,
          } => {
            let category = client
              .update_category(
                &id,
                &CategoryInput {
                  name,
                  description,
                  image,
                },
              )
              .await?;
            println!("Updated category {} ({})", category.name, category.id);
          }
          AdminCategoryAction::Delete { id } => {
            client.delete_category(&id).await?;
            println!("Deleted category {}", id);
          }
        }
        if let Err(err) = self.shop.categories(true).await {
          tracing::warn!(error = %err, "category refresh after change failed");
        }
      }
      AdminAction::Products { action } => {
        match action {
          AdminProductAction::Create { file } => {
            let body: serde_json::Value = read_json(&file)?;
            let product = client.create_product(&body).await?;
            println!("Created product {} ({})", product.name, product.id);
          }
          AdminProductAction::Update { id, file } => {
            let body: serde_json::Value = read_json(&file)?;
            let product = client.update_product(&id, &body).await?;
            println!("Updated product {} ({})", product.name, product.id);
          }
          AdminProductAction::Delete { id } => {
            client.delete_product(&id).await?;
            println!("Deleted product {}", id);
          }
        }
        let products = self.provider.refresh_products().await;
        tracing::info!(count = products.len(), "catalog refreshed after change");
      }
      AdminAction::Users { action } => match action {
        AdminUserAction::List => {
          for user in client.list_users().await? {
            println!(
              "{}  {}  {}  {}",
              user.id,
              user.name,
              user.email,
              role_label(user.role)
            );
          }
        }
        AdminUserAction::Delete { id } => {
          client.delete_user(&id).await?;
          println!("Deleted user {}", id);
        }
      },
      AdminAction::Upload { file } => {
        let upload = self
          .config
          .upload
          .as_ref()
          .ok_or_else(|| eyre!("No `upload` section in the config file"))?;
        let url = ImageUploader::new(upload)?.upload(&file).await?;
        println!("{}", url);
      }
    }
    Ok(())
  }

  fn note_catalog_state(&self) {
    match self.provider.state() {
      CatalogState::Ready {
        source, cached_at, ..
      } => note_source(source, cached_at),
      CatalogState::Failed(message) => eprintln!("Catalog unavailable: {}", message),
      CatalogState::Loading => {}
    }
  }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
  let contents = std::fs::read_to_string(path)
    .map_err(|e| eyre!("Failed to read {}: {}", path.display(), e))?;
  serde_json::from_str(&contents).map_err(|e| eyre!("Failed to parse {}: {}", path.display(), e))
}

/// Tell the user when output did not come straight from the backend.
fn note_source(source: CacheSource, cached_at: DateTime<Utc>) {
  if source != CacheSource::Network {
    eprintln!(
      "[{} from {}]",
      source.label(),
      cached_at.format("%Y-%m-%d %H:%M UTC")
    );
  }
}

fn print_state(state: &CatalogState) {
  let now = Utc::now().format("%H:%M:%S");
  match state {
    CatalogState::Loading => println!("{}  loading", now),
    CatalogState::Ready {
      products, source, ..
    } => println!("{}  {} products ({})", now, products.len(), source.label()),
    CatalogState::Failed(message) => println!("{}  failed: {}", now, message),
  }
}

fn price_label(product: &Product) -> String {
  match (product.lowest_price(), product.variations.first()) {
    (Some(price), Some(variation)) => format!("from {:.2} {}", price, variation.price.currency),
    _ => "no price".to_string(),
  }
}

fn print_product_line(product: &Product) {
  println!("{}  {}  {}", product.id, product.name, price_label(product));
}

fn print_product(product: &Product) {
  println!("{} ({})", product.name, product.id);
  if !product.description.is_empty() {
    println!("{}", product.description);
  }
  if !product.tags.is_empty() {
    println!("tags: {}", product.tags.join(", "));
  }
  if let Some(rating) = product.rating {
    println!("rating: {:.1}", rating);
  }
  for variation in &product.variations {
    let mut line = format!("  {}  {}", variation.name, variation.price.display());
    if variation.price.is_discounted() {
      line.push_str(&format!(" (was {:.2})", variation.price.original_price));
    }
    line.push_str(&format!("  {}", variation.inventory_status.label()));
    if variation.shipping.free_shipping {
      line.push_str("  free shipping");
    }
    if let Some(days) = variation.shipping.estimated_delivery_days {
      line.push_str(&format!("  {}d delivery", days));
    }
    println!("{}", line);
  }
}

fn print_cart(items: &[CartItem]) {
  if items.is_empty() {
    println!("Cart is empty");
    return;
  }
  for (index, item) in items.iter().enumerate() {
    println!(
      "{}  {} / {}  x{}  {:.2}",
      index,
      item.product_name,
      item.variation_name,
      item.quantity,
      item.line_total()
    );
  }
  println!(
    "{} items, subtotal {:.2}",
    cart::item_count(items),
    cart::subtotal(items)
  );
}

fn role_label(role: Role) -> &'static str {
  match role {
    Role::User => "user",
    Role::Admin => "admin",
  }
}

fn print_user(user: &User) {
  println!("{} <{}>  {}", user.name, user.email, role_label(user.role));
  for address in &user.addresses {
    println!("  {}", address);
  }
}
