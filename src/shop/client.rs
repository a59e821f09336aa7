use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

use super::api_types::{
  ApiAuthResponse, ApiErrorBody, ApiForgotPasswordRequest, ApiItem, ApiList, ApiLoginRequest,
  ApiResetPasswordRequest, ApiSignupRequest,
};
use super::error::ApiError;
use super::types::{Category, CategoryInput, Order, Product, ProfileUpdate, SubCategory, User};

/// Storefront REST API client
#[derive(Clone)]
pub struct ShopClient {
  http: reqwest::Client,
  base_url: Url,
  token: Option<String>,
}

impl ShopClient {
  pub fn new(base_url: &Url, token: Option<String>) -> Result<Self, ApiError> {
    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(30))
      .connect_timeout(Duration::from_secs(10))
      .gzip(true)
      .deflate(true)
      .user_agent(concat!("storefront/", env!("CARGO_PKG_VERSION")))
      .build()?;

    if base_url.cannot_be_a_base() {
      return Err(ApiError::InvalidRequest(format!(
        "API base URL cannot take paths: {}",
        base_url
      )));
    }

    Ok(Self {
      http,
      base_url: base_url.clone(),
      token,
    })
  }

  pub fn is_authenticated(&self) -> bool {
    self.token.is_some()
  }

  /// Build an endpoint URL from path segments. Segments are percent-encoded.
  fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
    let mut url = self.base_url.clone();
    url
      .path_segments_mut()
      .map_err(|_| ApiError::InvalidRequest(format!("bad base URL {}", self.base_url)))?
      .pop_if_empty()
      .extend(segments);
    Ok(url)
  }

  fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, ApiError> {
    let url = self.endpoint(segments)?;
    tracing::debug!(%method, %url, "api request");
    let builder = self.http.request(method, url);
    Ok(match &self.token {
      Some(token) => builder.bearer_auth(token),
      None => builder,
    })
  }

  fn authed(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, ApiError> {
    if self.token.is_none() {
      return Err(ApiError::Unauthenticated);
    }
    self.request(method, segments)
  }

  async fn send<T: DeserializeOwned>(
    &self,
    builder: RequestBuilder,
    endpoint: &str,
  ) -> Result<T, ApiError> {
    let response = check_status(builder.send().await?).await?;
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|source| ApiError::Decode {
      endpoint: endpoint.to_string(),
      source,
    })
  }

  /// Send a request whose response body is not needed.
  async fn send_empty(&self, builder: RequestBuilder) -> Result<(), ApiError> {
    check_status(builder.send().await?).await?;
    Ok(())
  }

  async fn get_list<T: DeserializeOwned>(
    &self,
    builder: RequestBuilder,
    endpoint: &str,
  ) -> Result<Vec<T>, ApiError> {
    let list: ApiList<T> = self.send(builder, endpoint).await?;
    Ok(list.into_vec())
  }

  async fn get_item<T: DeserializeOwned>(
    &self,
    builder: RequestBuilder,
    endpoint: &str,
  ) -> Result<T, ApiError> {
    let item: ApiItem<T> = self.send(builder, endpoint).await?;
    Ok(item.into_inner())
  }

  // ==========================================================================
  // Products
  // ==========================================================================

  /// Fetch the full product list
  pub async fn list_products(&self) -> Result<Vec<Product>, ApiError> {
    let req = self.request(Method::GET, &["products"])?;
    self.get_list(req, "products").await
  }

  pub async fn get_product(&self, id: &str) -> Result<Product, ApiError> {
    let req = self.request(Method::GET, &["products", id])?;
    self.get_item(req, "products/{id}").await
  }

  /// Create a product from a JSON document (product fields plus variations).
  pub async fn create_product(&self, product: &serde_json::Value) -> Result<Product, ApiError> {
    let req = self.authed(Method::POST, &["products"])?.json(product);
    self.get_item(req, "products").await
  }

  pub async fn update_product(
    &self,
    id: &str,
    product: &serde_json::Value,
  ) -> Result<Product, ApiError> {
    let req = self.authed(Method::PUT, &["products", id])?.json(product);
    self.get_item(req, "products/{id}").await
  }

  pub async fn delete_product(&self, id: &str) -> Result<(), ApiError> {
    let req = self.authed(Method::DELETE, &["products", id])?;
    self.send_empty(req).await
  }

  // ==========================================================================
  // Categories
  // ==========================================================================

  pub async fn list_categories(&self) -> Result<Vec<Category>, ApiError> {
    let req = self.request(Method::GET, &["categories"])?;
    self.get_list(req, "categories").await
  }

  pub async fn list_subcategories(&self, category_id: &str) -> Result<Vec<SubCategory>, ApiError> {
    let req = self.request(Method::GET, &["categories", category_id, "subcategories"])?;
    self.get_list(req, "categories/{id}/subcategories").await
  }

  pub async fn create_category(&self, input: &CategoryInput) -> Result<Category, ApiError> {
    let req = self.authed(Method::POST, &["categories"])?.json(input);
    self.get_item(req, "categories").await
  }

  pub async fn update_category(
    &self,
    id: &str,
    input: &CategoryInput,
  ) -> Result<Category, ApiError> {
    let req = self.authed(Method::PUT, &["categories", id])?.json(input);
    self.get_item(req, "categories/{id}").await
  }

  pub async fn delete_category(&self, id: &str) -> Result<(), ApiError> {
    let req = self.authed(Method::DELETE, &["categories", id])?;
    self.send_empty(req).await
  }

  // ==========================================================================
  // Authentication
  // ==========================================================================

  pub async fn login(&self, email: &str, password: &str) -> Result<ApiAuthResponse, ApiError> {
    let req = self
      .request(Method::POST, &["auth", "login"])?
      .json(&ApiLoginRequest { email, password });
    self.send(req, "auth/login").await
  }

  pub async fn signup(
    &self,
    name: &str,
    email: &str,
    password: &str,
  ) -> Result<ApiAuthResponse, ApiError> {
    let req = self
      .request(Method::POST, &["auth", "signup"])?
      .json(&ApiSignupRequest {
        name,
        email,
        password,
      });
    self.send(req, "auth/signup").await
  }

  /// Ask the backend to email a password reset link.
  pub async fn forgot_password(&self, email: &str) -> Result<(), ApiError> {
    let req = self
      .request(Method::POST, &["auth", "forgot-password"])?
      .json(&ApiForgotPasswordRequest { email });
    self.send_empty(req).await
  }

  pub async fn reset_password(&self, reset_token: &str, password: &str) -> Result<(), ApiError> {
    let req = self
      .request(Method::POST, &["auth", "reset-password", reset_token])?
      .json(&ApiResetPasswordRequest { password });
    self.send_empty(req).await
  }

  // ==========================================================================
  // Users and orders
  // ==========================================================================

  pub async fn me(&self) -> Result<User, ApiError> {
    let req = self.authed(Method::GET, &["users", "me"])?;
    self.get_item(req, "users/me").await
  }

  pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<User, ApiError> {
    let req = self.authed(Method::PUT, &["users", "me"])?.json(update);
    self.get_item(req, "users/me").await
  }

  pub async fn my_orders(&self) -> Result<Vec<Order>, ApiError> {
    let req = self.authed(Method::GET, &["orders", "my-orders"])?;
    self.get_list(req, "orders/my-orders").await
  }

  pub async fn list_users(&self) -> Result<Vec<User>, ApiError> {
    let req = self.authed(Method::GET, &["users"])?;
    self.get_list(req, "users").await
  }

  pub async fn delete_user(&self, id: &str) -> Result<(), ApiError> {
    let req = self.authed(Method::DELETE, &["users", id])?;
    self.send_empty(req).await
  }
}

/// Turn a non-success response into `ApiError::Backend`, using the JSON
/// message when the body carries one.
async fn check_status(response: Response) -> Result<Response, ApiError> {
  let status = response.status();
  if status.is_success() {
    return Ok(response);
  }

  let body = response.text().await.unwrap_or_default();
  let message = serde_json::from_str::<ApiErrorBody>(&body)
    .ok()
    .and_then(ApiErrorBody::into_message)
    .unwrap_or_else(|| {
      status
        .canonical_reason()
        .unwrap_or("request failed")
        .to_string()
    });

  tracing::warn!(status = status.as_u16(), %message, "backend rejected request");
  Err(ApiError::Backend {
    status: status.as_u16(),
    message,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use tokio::io::{AsyncReadExt, AsyncWriteExt};
  use tokio::net::TcpListener;

  fn client(base: &str, token: Option<&str>) -> ShopClient {
    ShopClient::new(&Url::parse(base).unwrap(), token.map(String::from)).unwrap()
  }

  #[test]
  fn test_endpoint_joins_segments_under_base_path() {
    let c = client("https://shop.example.com/api", None);
    assert_eq!(
      c.endpoint(&["products", "42"]).unwrap().as_str(),
      "https://shop.example.com/api/products/42"
    );

    let c = client("https://shop.example.com/api/", None);
    assert_eq!(
      c.endpoint(&["categories", "c1", "subcategories"])
        .unwrap()
        .as_str(),
      "https://shop.example.com/api/categories/c1/subcategories"
    );
  }

  #[test]
  fn test_endpoint_escapes_ids() {
    let c = client("https://shop.example.com/api", None);
    assert_eq!(
      c.endpoint(&["products", "a/b c"]).unwrap().as_str(),
      "https://shop.example.com/api/products/a%2Fb%20c"
    );
  }

  #[tokio::test]
  async fn test_authenticated_calls_need_a_token() {
    let c = client("http://127.0.0.1:9/api", None);
    assert!(!c.is_authenticated());
    assert!(matches!(c.my_orders().await, Err(ApiError::Unauthenticated)));
    assert!(matches!(
      c.delete_product("p1").await,
      Err(ApiError::Unauthenticated)
    ));
  }

  #[test]
  fn test_bearer_token_is_attached() {
    let c = client("https://shop.example.com/api", Some("t0k"));
    let req = c
      .request(Method::GET, &["users", "me"])
      .unwrap()
      .build()
      .unwrap();
    assert_eq!(
      req.headers().get(reqwest::header::AUTHORIZATION).unwrap(),
      "Bearer t0k"
    );
  }

  /// Answer a single request on a local port with a canned response.
  async fn serve_once(status: &'static str, body: &'static str) -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
      let (mut socket, _) = listener.accept().await.unwrap();
      let mut request = Vec::new();
      let mut buf = [0u8; 1024];
      while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut buf).await.unwrap();
        if n == 0 {
          break;
        }
        request.extend_from_slice(&buf[..n]);
      }
      let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
      );
      socket.write_all(response.as_bytes()).await.unwrap();
      let _ = socket.shutdown().await;
    });

    Url::parse(&format!("http://{}/api", addr)).unwrap()
  }

  #[tokio::test]
  async fn test_rejection_carries_server_message() {
    let base = serve_once("401 Unauthorized", r#"{"message": "Invalid token", "error": "x"}"#).await;
    let c = client(base.as_str(), None);

    match c.list_products().await {
      Err(ApiError::Backend { status, message }) => {
        assert_eq!(status, 401);
        assert_eq!(message, "Invalid token");
      }
      other => panic!("unexpected result {:?}", other),
    }
  }

  #[tokio::test]
  async fn test_rejection_falls_back_to_error_field() {
    let base = serve_once("404 Not Found", r#"{"error": "Product not found"}"#).await;
    let c = client(base.as_str(), None);

    match c.get_product("p1").await {
      Err(ApiError::Backend { status, message }) => {
        assert_eq!(status, 404);
        assert_eq!(message, "Product not found");
      }
      other => panic!("unexpected result {:?}", other),
    }
  }

  #[tokio::test]
  async fn test_rejection_without_json_uses_reason_phrase() {
    let base = serve_once("503 Service Unavailable", "upstream down").await;
    let c = client(base.as_str(), None);

    match c.list_categories().await {
      Err(ApiError::Backend { status, message }) => {
        assert_eq!(status, 503);
        assert_eq!(message, "Service Unavailable");
      }
      other => panic!("unexpected result {:?}", other),
    }
  }

  #[tokio::test]
  async fn test_undecodable_success_is_a_decode_error() {
    let base = serve_once("200 OK", "not json").await;
    let c = client(base.as_str(), None);

    let err = c.list_products().await.unwrap_err();
    assert!(matches!(err, ApiError::Decode { .. }));
    assert!(!err.is_network());
  }

  #[tokio::test]
  async fn test_unreachable_backend_is_a_network_error() {
    let c = client("http://127.0.0.1:1/api", None);
    let err = c.list_products().await.unwrap_err();
    assert!(err.is_network());
  }
}
