//! In-memory catalogues the demo form searches.
//!
//! Matching is case-insensitive. Items whose key starts with the query come
//! first, followed by items that merely contain it; both groups keep catalogue
//! order. An empty query matches everything.

use std::{fmt, path::Path, sync::Arc, time::Duration};

use color_eyre::eyre::{Context, Result};
use serde::{Deserialize, de::DeserializeOwned};
use tracing::{debug, info};

use crate::component::typeahead::SearchMethod;

/// Something that can be looked up by text.
pub trait Searchable {
    fn search_key(&self) -> &str;
}

impl Searchable for String {
    fn search_key(&self) -> &str {
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Country {
    pub name: String,
    pub code: String,
}

impl Country {
    fn new(name: &str, code: &str) -> Self {
        Self {
            name: name.to_string(),
            code: code.to_string(),
        }
    }
}

impl Searchable for Country {
    fn search_key(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Country {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.code)
    }
}

pub struct Catalogue<T> {
    items: Arc<[T]>,
    /// Simulated backend latency
    delay: Duration,
}

impl<T> Clone for Catalogue<T> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
            delay: self.delay,
        }
    }
}

impl<T> fmt::Debug for Catalogue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Catalogue")
            .field("items", &self.items.len())
            .field("delay", &self.delay)
            .finish()
    }
}

impl<T> Catalogue<T>
where
    T: Searchable + Clone + Send + Sync + 'static,
{
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items: items.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn matches(&self, query: &str) -> Vec<T> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return self.items.to_vec();
        }
        let mut prefixed = Vec::new();
        let mut inner = Vec::new();
        for item in self.items.iter() {
            let key = item.search_key().to_lowercase();
            if key.starts_with(&needle) {
                prefixed.push(item.clone());
            } else if key.contains(&needle) {
                inner.push(item.clone());
            }
        }
        prefixed.extend(inner);
        prefixed
    }

    pub async fn search(&self, query: String) -> Result<Vec<T>> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let found = self.matches(&query);
        debug!(query = %query, found = found.len(), "catalogue searched");
        Ok(found)
    }

    pub fn search_method(&self) -> SearchMethod<T> {
        let catalogue = self.clone();
        SearchMethod::new(move |query| {
            let catalogue = catalogue.clone();
            async move { catalogue.search(query).await }
        })
    }
}

impl<T> Catalogue<T>
where
    T: Searchable + Clone + Send + Sync + DeserializeOwned + 'static,
{
    /// Load items from a JSON array.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Error reading catalogue {}", path.display()))?;
        let items: Vec<T> = serde_json::from_str(&text)
            .with_context(|| format!("Error parsing catalogue {}", path.display()))?;
        info!(path = %path.display(), items = items.len(), "catalogue loaded");
        Ok(Self::new(items))
    }
}

pub fn countries() -> Catalogue<Country> {
    Catalogue::new(
        [
            ("Algeria", "DZ"),
            ("Argentina", "AR"),
            ("Australia", "AU"),
            ("Austria", "AT"),
            ("Belgium", "BE"),
            ("Brazil", "BR"),
            ("Canada", "CA"),
            ("Chile", "CL"),
            ("China", "CN"),
            ("Denmark", "DK"),
            ("Egypt", "EG"),
            ("Finland", "FI"),
            ("France", "FR"),
            ("Germany", "DE"),
            ("Greece", "GR"),
            ("India", "IN"),
            ("Ireland", "IE"),
            ("Italy", "IT"),
            ("Japan", "JP"),
            ("Kenya", "KE"),
            ("Mexico", "MX"),
            ("Netherlands", "NL"),
            ("New Zealand", "NZ"),
            ("Niger", "NE"),
            ("Nigeria", "NG"),
            ("Norway", "NO"),
            ("Poland", "PL"),
            ("Portugal", "PT"),
            ("South Africa", "ZA"),
            ("South Korea", "KR"),
            ("Spain", "ES"),
            ("Sweden", "SE"),
            ("Switzerland", "CH"),
            ("United Kingdom", "GB"),
            ("United States", "US"),
            ("Vietnam", "VN"),
        ]
        .into_iter()
        .map(|(name, code)| Country::new(name, code))
        .collect(),
    )
}

pub fn languages() -> Catalogue<String> {
    Catalogue::new(
        [
            "Arabic",
            "Bengali",
            "Chinese",
            "Czech",
            "Danish",
            "Dutch",
            "English",
            "Finnish",
            "French",
            "German",
            "Greek",
            "Hindi",
            "Hungarian",
            "Italian",
            "Japanese",
            "Korean",
            "Norwegian",
            "Polish",
            "Portuguese",
            "Russian",
            "Spanish",
            "Swahili",
            "Swedish",
            "Turkish",
            "Vietnamese",
        ]
        .map(String::from)
        .to_vec(),
    )
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use super::*;

    fn names(found: &[Country]) -> Vec<&str> {
        found.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn prefix_matches_come_first() {
        let found = countries().matches("GER");
        assert_eq!(names(&found), vec!["Germany", "Algeria", "Niger", "Nigeria"]);
    }

    #[test]
    fn empty_query_lists_everything() {
        let catalogue = languages();
        assert_eq!(catalogue.matches("  ").len(), catalogue.len());
        assert!(catalogue.matches("xyz").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn search_waits_for_the_simulated_latency() {
        let catalogue = languages().with_delay(Duration::from_millis(150));
        let method = catalogue.search_method();
        let start = tokio::time::Instant::now();
        let found = method.call("sw".into()).await.unwrap();
        assert_eq!(found, vec!["Swahili", "Swedish"]);
        assert!(start.elapsed() >= Duration::from_millis(150));
    }

    #[test]
    fn loads_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"name": "Iceland", "code": "IS"}}, {{"name": "Ireland", "code": "IE"}}]"#
        )
        .unwrap();

        let catalogue = Catalogue::<Country>::from_json_file(file.path()).unwrap();
        assert_eq!(names(&catalogue.matches("i")), vec!["Iceland", "Ireland"]);
        assert_eq!(catalogue.matches("ice")[0].to_string(), "Iceland (IS)");
    }

    #[test]
    fn broken_json_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = Catalogue::<Country>::from_json_file(file.path()).unwrap_err();
        assert!(err.to_string().starts_with("Error parsing catalogue"));
    }
}
