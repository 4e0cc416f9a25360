//! Food lookup: the USDA FoodData Central API and a built-in list of common
//! foods.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::config::FoodSearchConfig;
use crate::error::{Error, Result};
use crate::model::{round_one_decimal, FoodDatabaseItem, SimplifiedFoodItem};

/// FoodData Central nutrient ids.
mod nutrients {
    pub const ENERGY_KCAL: u32 = 1008;
    pub const PROTEIN: u32 = 1003;
    pub const FAT: u32 = 1004;
    pub const CARBS: u32 = 1005;
}

const DATA_TYPES: [&str; 3] = ["Foundation", "SR Legacy", "Branded"];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    query: &'a str,
    data_type: [&'a str; 3],
    page_size: u32,
    page_number: u32,
    sort_by: &'a str,
    sort_order: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    foods: Vec<UsdaFood>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsdaFood {
    fdc_id: u64,
    description: String,
    #[serde(default)]
    brand_owner: Option<String>,
    #[serde(default)]
    food_nutrients: Vec<UsdaNutrient>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsdaNutrient {
    #[serde(default)]
    nutrient_id: Option<u32>,
    #[serde(default)]
    value: Option<f64>,
}

impl UsdaFood {
    fn nutrient(&self, id: u32) -> f64 {
        self.food_nutrients
            .iter()
            .find(|n| n.nutrient_id == Some(id))
            .and_then(|n| n.value)
            .unwrap_or(0.0)
    }

    fn simplify(self) -> SimplifiedFoodItem {
        SimplifiedFoodItem {
            id: self.fdc_id.to_string(),
            calories_per_100g: self.nutrient(nutrients::ENERGY_KCAL).round(),
            protein_per_100g: round_one_decimal(self.nutrient(nutrients::PROTEIN)),
            fat_per_100g: round_one_decimal(self.nutrient(nutrients::FAT)),
            carbs_per_100g: round_one_decimal(self.nutrient(nutrients::CARBS)),
            name: self.description,
            brand: self.brand_owner,
        }
    }
}

/// Client for the FoodData Central API.
#[derive(Debug, Clone)]
pub struct FoodSearchClient {
    client: Client,
    base_url: String,
    api_key: String,
    page_size: u32,
}

impl FoodSearchClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &FoodSearchConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            page_size: config.page_size,
        })
    }

    /// `segments` are appended to the base path, each percent-encoded.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| Error::FoodSearch(format!("invalid URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| Error::FoodSearch(format!("invalid base URL: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        url.query_pairs_mut().append_pair("api_key", &self.api_key);
        Ok(url)
    }

    /// Search the first page of results for `query`.
    ///
    /// A blank query returns no results without contacting the API.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FoodSearch`] if the API answers with a non-success
    /// status, or [`Error::Http`] if it cannot be reached.
    pub async fn search(&self, query: &str) -> Result<Vec<SimplifiedFoodItem>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let body = SearchRequest {
            query,
            data_type: DATA_TYPES,
            page_size: self.page_size,
            page_number: 1,
            sort_by: "dataType.keyword",
            sort_order: "asc",
        };

        debug!("Searching food database for {:?}", query);
        let response = self
            .client
            .post(self.url(&["foods", "search"])?)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::FoodSearch(format!(
                "API request failed: {}",
                status.as_u16()
            )));
        }

        let parsed: SearchResponse = response.json().await?;
        debug!("Food database returned {} results", parsed.foods.len());
        Ok(parsed.foods.into_iter().map(UsdaFood::simplify).collect())
    }

    /// Look up one food by its FoodData Central id. Any failure yields `None`.
    pub async fn details(&self, fdc_id: &str) -> Option<SimplifiedFoodItem> {
        match self.fetch_details(fdc_id).await {
            Ok(item) => Some(item),
            Err(e) => {
                warn!("Food details lookup for {} failed: {}", fdc_id, e);
                None
            }
        }
    }

    async fn fetch_details(&self, fdc_id: &str) -> Result<SimplifiedFoodItem> {
        let response = self
            .client
            .get(self.url(&["food", fdc_id])?)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::FoodSearch(format!(
                "API request failed: {}",
                status.as_u16()
            )));
        }

        let food: UsdaFood = response.json().await?;
        Ok(food.simplify())
    }
}

/// (id, name, kcal per 100 g, protein per 100 g)
const COMMON_FOODS: &[(&str, &str, f64, f64)] = &[
    ("apple", "Apple", 52.0, 0.3),
    ("banana", "Banana", 89.0, 1.1),
    ("orange", "Orange", 47.0, 0.9),
    ("strawberries", "Strawberries", 32.0, 0.7),
    ("avocado", "Avocado", 160.0, 2.0),
    ("broccoli", "Broccoli", 34.0, 2.8),
    ("spinach", "Spinach", 23.0, 2.9),
    ("carrot", "Carrot", 41.0, 0.9),
    ("potato", "Potato, boiled", 87.0, 1.9),
    ("sweet-potato", "Sweet potato, baked", 90.0, 2.0),
    ("white-rice", "White rice, cooked", 130.0, 2.7),
    ("brown-rice", "Brown rice, cooked", 112.0, 2.3),
    ("pasta", "Pasta, cooked", 131.0, 5.0),
    ("oats", "Oats", 389.0, 16.9),
    ("whole-wheat-bread", "Whole wheat bread", 247.0, 13.0),
    ("chicken-breast", "Chicken breast, cooked", 165.0, 31.0),
    ("beef-steak", "Beef steak, grilled", 271.0, 25.0),
    ("ground-beef", "Ground beef, 85% lean", 250.0, 26.0),
    ("salmon", "Salmon, cooked", 208.0, 20.0),
    ("tuna", "Tuna, canned in water", 116.0, 26.0),
    ("shrimp", "Shrimp, cooked", 99.0, 24.0),
    ("egg", "Egg, whole", 155.0, 13.0),
    ("egg-white", "Egg white", 52.0, 11.0),
    ("tofu", "Tofu, firm", 144.0, 17.0),
    ("lentils", "Lentils, cooked", 116.0, 9.0),
    ("chickpeas", "Chickpeas, cooked", 164.0, 8.9),
    ("black-beans", "Black beans, cooked", 132.0, 8.9),
    ("greek-yogurt", "Greek yogurt, plain nonfat", 59.0, 10.0),
    ("milk", "Milk, 2%", 50.0, 3.3),
    ("cheddar", "Cheddar cheese", 403.0, 25.0),
    ("cottage-cheese", "Cottage cheese, low fat", 72.0, 12.0),
    ("almonds", "Almonds", 579.0, 21.0),
    ("peanut-butter", "Peanut butter", 588.0, 25.0),
    ("olive-oil", "Olive oil", 884.0, 0.0),
    ("hummus", "Hummus", 166.0, 7.9),
    ("dates", "Dates, medjool", 277.0, 1.8),
    ("whey-protein", "Whey protein powder", 400.0, 80.0),
];

/// The built-in list of common foods.
#[must_use]
pub fn local_foods() -> Vec<FoodDatabaseItem> {
    COMMON_FOODS
        .iter()
        .map(|&(id, name, calories, protein)| FoodDatabaseItem {
            id: id.to_string(),
            name: name.to_string(),
            calories_per_100g: calories,
            protein_per_100g: protein,
        })
        .collect()
}

/// Built-in foods whose name contains `query`, ignoring case. A blank query
/// matches everything.
#[must_use]
pub fn search_local(query: &str) -> Vec<FoodDatabaseItem> {
    let needle = query.trim().to_lowercase();
    local_foods()
        .into_iter()
        .filter(|food| food.name.to_lowercase().contains(&needle))
        .collect()
}

/// Look up a built-in food by id.
#[must_use]
pub fn local_food(id: &str) -> Option<FoodDatabaseItem> {
    local_foods().into_iter().find(|food| food.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> FoodSearchClient {
        let config = FoodSearchConfig {
            base_url: server.uri(),
            api_key: "TEST_KEY".to_string(),
            page_size: 10,
        };
        FoodSearchClient::new(&config, Duration::from_secs(5)).unwrap()
    }

    fn chicken_json() -> serde_json::Value {
        serde_json::json!({
            "fdcId": 171_077,
            "description": "Chicken, broilers or fryers, breast, meat only, cooked, roasted",
            "foodNutrients": [
                {"nutrientId": 1008, "value": 165.4},
                {"nutrientId": 1003, "value": 31.02},
                {"nutrientId": 1004, "value": 3.57},
                {"nutrientName": "Water", "value": 65.0}
            ]
        })
    }

    #[tokio::test]
    async fn test_search_posts_query() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/foods/search"))
            .and(query_param("api_key", "TEST_KEY"))
            .and(body_partial_json(serde_json::json!({
                "query": "chicken",
                "dataType": ["Foundation", "SR Legacy", "Branded"],
                "pageSize": 10,
                "pageNumber": 1,
                "sortBy": "dataType.keyword",
                "sortOrder": "asc"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "foods": [chicken_json(), {
                    "fdcId": 2,
                    "description": "Protein bar",
                    "brandOwner": "Acme",
                    "foodNutrients": []
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let results = client(&server).search("  chicken ").await.unwrap();
        assert_eq!(results.len(), 2);

        let chicken = &results[0];
        assert_eq!(chicken.id, "171077");
        assert!((chicken.calories_per_100g - 165.0).abs() < f64::EPSILON);
        assert!((chicken.protein_per_100g - 31.0).abs() < 1e-9);
        assert!((chicken.fat_per_100g - 3.6).abs() < 1e-9);
        assert!(chicken.carbs_per_100g.abs() < f64::EPSILON);
        assert!(chicken.brand.is_none());

        assert_eq!(results[1].brand.as_deref(), Some("Acme"));
        assert!(results[1].calories_per_100g.abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_blank_search_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        assert!(client(&server).search("   ").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_without_foods_field() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/foods/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        assert!(client(&server).search("xyz").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/foods/search"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let err = client(&server).search("chicken").await.unwrap_err();
        assert!(matches!(err, Error::FoodSearch(ref m) if m == "API request failed: 429"));
    }

    #[tokio::test]
    async fn test_details() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/food/171077"))
            .and(query_param("api_key", "TEST_KEY"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chicken_json()))
            .mount(&server)
            .await;

        let item = client(&server).details("171077").await.unwrap();
        assert!((item.calories_per_100g - 165.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_food_id_is_one_path_segment() {
        let config = FoodSearchConfig {
            base_url: "https://fdc.test/fdc/v1/".to_string(),
            api_key: "K".to_string(),
            page_size: 5,
        };
        let client = FoodSearchClient::new(&config, Duration::from_secs(1)).unwrap();

        let url = client.url(&["food", "1?x=y/2"]).unwrap();
        assert_eq!(url.path(), "/fdc/v1/food/1%3Fx=y%2F2");
        assert_eq!(url.query(), Some("api_key=K"));

        let search = client.url(&["foods", "search"]).unwrap();
        assert_eq!(search.as_str(), "https://fdc.test/fdc/v1/foods/search?api_key=K");
    }

    #[tokio::test]
    async fn test_details_failure_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        assert!(client(&server).details("1").await.is_none());
    }

    #[test]
    fn test_search_local_case_insensitive() {
        let results = search_local("CHICKEN");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "chicken-breast");

        let eggs = search_local("egg");
        assert_eq!(eggs.len(), 2);
        assert!(search_local("zzz").is_empty());
        assert_eq!(search_local("  ").len(), local_foods().len());
    }

    #[test]
    fn test_local_food_portion() {
        let apple = local_food("apple").unwrap();
        let logged = apple.portion(200, 5);
        assert_eq!(logged.id, "apple-5");
        assert!((logged.calories - 104.0).abs() < f64::EPSILON);
        assert!((logged.protein - 0.6).abs() < 1e-9);
        assert!(local_food("nope").is_none());
    }
}
