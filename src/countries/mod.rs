//! Public country dataset (REST Countries v3.1).

pub mod query;

pub use query::{CountryQuery, Region, SortKey};

use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

use crate::favorites::CountryCode;
use crate::remote::RemoteError;

/// Fields requested from list endpoints
const LIST_FIELDS: &str = "name,cca3,capital,region,subregion,population,area,languages,flag,flags";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CountryName {
    pub common: String,
    #[serde(default)]
    pub official: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Flags {
    #[serde(default)]
    pub png: Option<String>,
    #[serde(default)]
    pub svg: Option<String>,
    #[serde(default)]
    pub alt: Option<String>,
}

/// One country as returned by the provider. Only the fields we show.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Country {
    pub name: CountryName,
    pub cca3: String,
    #[serde(default)]
    pub capital: Vec<String>,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub subregion: Option<String>,
    #[serde(default)]
    pub population: u64,
    #[serde(default)]
    pub area: f64,
    #[serde(default)]
    pub languages: BTreeMap<String, String>,
    #[serde(default)]
    pub flag: Option<String>,
    #[serde(default)]
    pub flags: Flags,
}

impl Country {
    pub fn capital_display(&self) -> String {
        if self.capital.is_empty() {
            "N/A".to_string()
        } else {
            self.capital.join(", ")
        }
    }

    pub fn languages_display(&self) -> String {
        if self.languages.is_empty() {
            "N/A".to_string()
        } else {
            self.languages.values().cloned().collect::<Vec<_>>().join(", ")
        }
    }
}

/// `/alpha/{code}` answers with either an object or a one-element array
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<Country>),
    One(Box<Country>),
}

impl From<OneOrMany> for Vec<Country> {
    fn from(value: OneOrMany) -> Self {
        match value {
            OneOrMany::Many(countries) => countries,
            OneOrMany::One(country) => vec![*country],
        }
    }
}

/// Read-only client for the country data provider
#[derive(Debug, Clone)]
pub struct CountryClient {
    base_url: String,
    client: Client,
}

impl CountryClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Append `segments` to the base URL, escaping each one
    fn endpoint(&self, segments: &[&str]) -> Result<Url, RemoteError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| RemoteError::Network(format!("Invalid country data URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| RemoteError::Network(format!("Invalid country data URL: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// GET a country list; 404 means "no matches"
    async fn get_list(
        &self,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<Vec<Country>, RemoteError> {
        let url = self.endpoint(segments)?;
        let response = self.client.get(url.clone()).query(query).send().await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(url = %url, "No countries matched");
            return Ok(Vec::new());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Status {
                status: status.as_u16(),
                message: crate::remote::error_message(&body),
            });
        }

        let countries: OneOrMany = response.json().await?;
        let countries: Vec<Country> = countries.into();
        debug!(url = %url, count = countries.len(), "Fetched countries");
        Ok(countries)
    }

    pub async fn all(&self) -> Result<Vec<Country>, RemoteError> {
        self.get_list(&["all"], &[("fields", LIST_FIELDS)]).await
    }

    pub async fn by_name(&self, name: &str) -> Result<Vec<Country>, RemoteError> {
        let name = name.trim();
        if name.is_empty() {
            return self.all().await;
        }
        self.get_list(&["name", name], &[("fields", LIST_FIELDS)])
            .await
    }

    pub async fn by_region(&self, region: Region) -> Result<Vec<Country>, RemoteError> {
        let region = region.as_str().to_lowercase();
        self.get_list(&["region", region.as_str()], &[("fields", LIST_FIELDS)])
            .await
    }

    pub async fn by_code(&self, code: &CountryCode) -> Result<Option<Country>, RemoteError> {
        let countries = self.get_list(&["alpha", code.as_str()], &[]).await?;
        Ok(countries.into_iter().next())
    }

    /// Batch lookup; an empty input performs no request
    pub async fn by_codes(&self, codes: &[CountryCode]) -> Result<Vec<Country>, RemoteError> {
        if codes.is_empty() {
            return Ok(Vec::new());
        }
        let joined = codes
            .iter()
            .map(CountryCode::as_str)
            .collect::<Vec<_>>()
            .join(",");
        self.get_list(&["alpha"], &[("codes", joined.as_str())]).await
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn country(cca3: &str, name: &str, region: &str, population: u64, area: f64) -> Country {
        Country {
            name: CountryName {
                common: name.to_string(),
                official: format!("Republic of {}", name),
            },
            cca3: cca3.to_string(),
            capital: vec![],
            region: region.to_string(),
            subregion: None,
            population,
            area,
            languages: BTreeMap::new(),
            flag: None,
            flags: Flags::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::test_server::spawn;
    use axum::{
        extract::{Path, Query},
        http::StatusCode as AxumStatus,
        response::IntoResponse,
        routing::get,
        Json, Router,
    };
    use serde_json::json;
    use std::collections::HashMap;

    fn france() -> serde_json::Value {
        json!({
            "name": { "common": "France", "official": "French Republic" },
            "cca3": "FRA",
            "capital": ["Paris"],
            "region": "Europe",
            "subregion": "Western Europe",
            "population": 67391582,
            "area": 551695.0,
            "languages": { "fra": "French" },
            "flag": "\u{1F1EB}\u{1F1F7}",
            "flags": { "png": "https://flagcdn.com/w320/fr.png" }
        })
    }

    fn germany() -> serde_json::Value {
        json!({
            "name": { "common": "Germany", "official": "Federal Republic of Germany" },
            "cca3": "DEU",
            "region": "Europe",
            "population": 83240525,
            "area": 357114.0
        })
    }

    async fn client() -> CountryClient {
        let router = Router::new()
            .route(
                "/all",
                get(|Query(q): Query<HashMap<String, String>>| async move {
                    assert!(q.get("fields").is_some());
                    Json(json!([france(), germany()]))
                }),
            )
            .route(
                "/name/:name",
                get(|Path(name): Path<String>| async move {
                    if name.eq_ignore_ascii_case("fra") || name.eq_ignore_ascii_case("france") {
                        Json(json!([france()])).into_response()
                    } else {
                        (AxumStatus::NOT_FOUND, Json(json!({ "status": 404, "message": "Not Found" })))
                            .into_response()
                    }
                }),
            )
            .route(
                "/region/:region",
                get(|Path(region): Path<String>| async move {
                    assert_eq!(region, "europe");
                    Json(json!([france(), germany()]))
                }),
            )
            .route("/alpha/:code", get(|| async { Json(france()) }))
            .route(
                "/alpha",
                get(|Query(q): Query<HashMap<String, String>>| async move {
                    assert_eq!(q.get("codes").map(String::as_str), Some("FRA,DEU"));
                    Json(json!([france(), germany()]))
                }),
            )
            .route(
                "/broken",
                get(|| async { (AxumStatus::BAD_GATEWAY, "upstream down") }),
            );
        CountryClient::new(spawn(router).await, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_all_and_region() {
        let countries = client().await;
        let all = countries.all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].capital_display(), "Paris");
        assert_eq!(all[1].capital_display(), "N/A");
        assert_eq!(all[0].languages_display(), "French");

        let europe = countries.by_region(Region::Europe).await.unwrap();
        assert_eq!(europe.len(), 2);
    }

    #[tokio::test]
    async fn test_by_name_not_found_is_empty() {
        let countries = client().await;
        assert_eq!(countries.by_name("France").await.unwrap().len(), 1);
        assert!(countries.by_name("Atlantis").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_by_code_accepts_single_object() {
        let countries = client().await;
        let code = CountryCode::parse("fra").unwrap();
        let france = countries.by_code(&code).await.unwrap().unwrap();
        assert_eq!(france.cca3, "FRA");
        assert_eq!(france.name.official, "French Republic");
    }

    #[tokio::test]
    async fn test_by_codes() {
        let countries = client().await;
        assert!(countries.by_codes(&[]).await.unwrap().is_empty());

        let codes = vec![
            CountryCode::parse("FRA").unwrap(),
            CountryCode::parse("DEU").unwrap(),
        ];
        assert_eq!(countries.by_codes(&codes).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_error_status() {
        let countries = client().await;
        let err = countries.get_list(&["broken"], &[]).await.unwrap_err();
        assert_eq!(
            err,
            RemoteError::Status {
                status: 502,
                message: "upstream down".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_by_name_escapes_search_term() {
        let router = Router::new().route(
            "/v3.1/name/:name",
            get(|Path(name): Path<String>| async move {
                Json(json!([{ "name": { "common": name }, "cca3": "XXX" }]))
            }),
        );
        let base_url = format!("{}/v3.1/", spawn(router).await);
        let countries = CountryClient::new(base_url, Duration::from_secs(5)).unwrap();

        for term in ["what?x", "a#b", "guinea/bissau", "côte d'ivoire"] {
            let found = countries.by_name(term).await.unwrap();
            assert_eq!(found.len(), 1, "term: {term}");
            assert_eq!(found[0].name.common, term);
        }
    }
}
