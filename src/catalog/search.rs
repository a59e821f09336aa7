use crate::shop::Product;

/// Products whose name, description or any tag contains `query`,
/// ignoring case.
///
/// The query is matched as given, whitespace included. An empty query
/// means no search is active and matches nothing.
pub fn search_products<'a>(products: &'a [Product], query: &str) -> Vec<&'a Product> {
  if query.is_empty() {
    return Vec::new();
  }
  let needle = query.to_lowercase();

  products
    .iter()
    .filter(|product| matches_query(product, &needle))
    .collect()
}

/// `needle` must already be lowercased.
fn matches_query(product: &Product, needle: &str) -> bool {
  product.name.to_lowercase().contains(needle)
    || product.description.to_lowercase().contains(needle)
    || product
      .tags
      .iter()
      .any(|tag| tag.to_lowercase().contains(needle))
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn product(id: &str, name: &str, description: &str, tags: &[&str]) -> Product {
    serde_json::from_value(json!({
      "id": id,
      "name": name,
      "description": description,
      "tags": tags,
    }))
    .unwrap()
  }

  fn catalog() -> Vec<Product> {
    vec![
      product("1", "Leather Coat", "Long and warm", &["jacket", "winter"]),
      product("2", "Summer Dress", "Light cotton", &["dress"]),
      product("3", "Rain Shell", "Waterproof JACKET for hiking", &[]),
      product("4", "Wool Socks", "", &["Winter-Wear"]),
    ]
  }

  fn ids(found: &[&Product]) -> Vec<String> {
    found.iter().map(|p| p.id.clone()).collect()
  }

  #[test]
  fn test_tag_match() {
    let products = catalog();
    let found = search_products(&products, "jacket");
    assert_eq!(ids(&found), vec!["1", "3"]);
  }

  #[test]
  fn test_case_insensitive_name_and_tag_substring() {
    let products = catalog();
    assert_eq!(ids(&search_products(&products, "COAT")), vec!["1"]);
    assert_eq!(ids(&search_products(&products, "winter")), vec!["1", "4"]);
  }

  #[test]
  fn test_empty_query_matches_nothing() {
    let products = catalog();
    assert!(search_products(&products, "").is_empty());
  }

  #[test]
  fn test_whitespace_is_part_of_the_query() {
    let products = catalog();
    // "coat " does not occur in "leather coat"
    assert!(search_products(&products, "coat ").is_empty());
    assert_eq!(ids(&search_products(&products, "leather ")), vec!["1"]);
    assert_eq!(ids(&search_products(&products, " ")), vec!["1", "2", "3", "4"]);
  }

  #[test]
  fn test_every_result_contains_the_query() {
    let products = catalog();
    for query in ["a", "er", "WOOL", "cotton", "zzz", "coat ", " and"] {
      let needle = query.to_lowercase();
      for p in search_products(&products, query) {
        let hit = p.name.to_lowercase().contains(&needle)
          || p.description.to_lowercase().contains(&needle)
          || p.tags.iter().any(|t| t.to_lowercase().contains(&needle));
        assert!(hit, "{} should not match {}", p.id, query);
      }
    }
  }
}
