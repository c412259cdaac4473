//! Search queries and application targets
//!
//! The built-in catalog is the standard set of search scenarios timed against every
//! application. A YAML file can replace it:
//!
//! ```yaml
//! queries:
//!   - name: first-author
//!     description: first author search
//!     query: 'author:"^Solanki, Sami"'
//!     refinement: year:2020
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use searchperf_common::sample_name;

use crate::error::{E2eError, E2eResult};

/// One timed search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySpec {
    /// Slug used as the test name in sample names
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Query typed into the search bar
    pub query: String,

    /// Token appended to the query for the refinement phase
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refinement: Option<String>,
}

impl QuerySpec {
    pub fn new(name: &str, description: &str, query: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            query: query.to_string(),
            refinement: None,
        }
    }

    /// Query text submitted in the refinement phase
    pub fn refined_query(&self, default_refinement: &str) -> String {
        let token = self.refinement.as_deref().unwrap_or(default_refinement);
        format!("{} {}", self.query, token)
    }
}

const BUILTIN_QUERIES: [(&str, &str, &str); 29] = [
    ("first-author", "first author search", r#"author:"^Solanki, Sami""#),
    ("citations", "citations search", r#"citations(abs:"JWST")"#),
    ("year-range", "year range search", "year:2010-2020"),
    ("title-keyword", "title keyword search", r#"title:"black hole""#),
    ("full-text", "full text search", r#"full:"gravitational waves""#),
    ("affiliation", "affiliation search", r#"aff:"Harvard""#),
    ("abstract-keyword", "abstract keyword search", r#"abstract:"supernova""#),
    ("bibcode-search", "bibliographic code search", "bibcode:2020ApJ...890L..10M"),
    ("pub-type", "publication type search", "property:refereed"),
    ("keyword-search", "keyword search", r#"keyword:"exoplanet""#),
    ("arxiv-id", "arxiv identifier search", "arxiv:2005.14165"),
    ("or-search", "OR condition search", r#"author:"Einstein, A" OR author:"Newton, I""#),
    ("and-search", "AND condition search", r#"author:"Einstein, A" AND year:1916"#),
    ("not-search", "NOT condition search", r#"title:"quantum" NOT title:"gravity""#),
    ("journal-search", "journal search", r#"journal:"Nature""#),
    ("pub-date", "publication date exact", r#"pubdate:"2023-10-01""#),
    ("multi-field", "multiple fields search", r#"author:"Feynman" title:"path integral""#),
    (
        "first-author-citations",
        "first author with citations search",
        r#"author:"^Solanki, Sami" citations(abstract:JWST)"#,
    ),
    ("cited-by-author", "papers cited by specific author", r#"citations(author:"Einstein, A")"#),
    (
        "title-citations",
        "title keyword with citations",
        r#"title:"black hole" citations(author:"Hawking, S")"#,
    ),
    (
        "year-range-journal-citations",
        "year range with citations from a specific journal",
        r#"year:2010-2020 citations(journal:"Astrophysical Journal")"#,
    ),
    (
        "full-text-references",
        "full text search with references",
        r#"full:"gravitational waves" references(author:"Thorne, K")"#,
    ),
    (
        "affiliation-references",
        "affiliation with references search",
        r#"aff:"Harvard" references(title:"cosmology")"#,
    ),
    (
        "pub-type-citations-year",
        "publication type with citations in specific year",
        "property:refereed citations(year:2019)",
    ),
    (
        "keyword-cited-references",
        "keyword search with cited references",
        r#"keyword:"dark matter" references(author:"Zwicky, F")"#,
    ),
    ("arxiv-citations", "arxiv ID with citations search", "arxiv:2005.14165 citations(year:2021)"),
    (
        "multi-field-nested-citations",
        "multiple field search with nested citations",
        r#"author:"Feynman" title:"quantum" citations(journal:"Physical Review")"#,
    ),
    (
        "author-citations-title-abstract",
        "author with citations in title and abstract",
        r#"author:"Sagan" citations(title:"life" abstract:"extraterrestrial")"#,
    ),
    (
        "author-or-title-citations-journal",
        "author OR title with citations in journal",
        r#"(author:"Einstein, A" OR title:"relativity") citations(journal:"Nature")"#,
    ),
];

/// Ordered, validated set of queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryCatalog {
    pub queries: Vec<QuerySpec>,
}

impl QueryCatalog {
    pub fn builtin() -> Self {
        Self {
            queries: BUILTIN_QUERIES
                .iter()
                .map(|(name, description, query)| QuerySpec::new(name, description, query))
                .collect(),
        }
    }

    /// Parse a catalog from YAML
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let catalog: Self = serde_yaml::from_str(yaml)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Load a catalog from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
            .map_err(|e| E2eError::Catalog(format!("{}: {}", path.display(), e)))
    }

    /// The file's catalog when a path is given, the built-in one otherwise
    pub fn load(path: Option<&Path>) -> E2eResult<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::builtin()),
        }
    }

    /// Query names must be usable as sample-name fields and unique
    pub fn validate(&self) -> E2eResult<()> {
        if self.queries.is_empty() {
            return Err(E2eError::Catalog("catalog has no queries".to_string()));
        }
        let mut seen = HashSet::new();
        for query in &self.queries {
            sample_name::validate_token("testName", &query.name)?;
            if query.query.trim().is_empty() {
                return Err(E2eError::Catalog(format!("query '{}' has empty query text", query.name)));
            }
            if !seen.insert(query.name.as_str()) {
                return Err(E2eError::Catalog(format!("duplicate query name '{}'", query.name)));
            }
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&QuerySpec> {
        self.queries.iter().find(|q| q.name == name)
    }

    /// Keep only the named queries, in catalog order
    pub fn filter(&self, names: &[String]) -> E2eResult<Self> {
        if let Some(missing) = names.iter().find(|n| self.get(n).is_none()) {
            return Err(E2eError::Catalog(format!("unknown query '{}'", missing)));
        }
        Ok(Self {
            queries: self
                .queries
                .iter()
                .filter(|q| names.contains(&q.name))
                .cloned()
                .collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}

/// CSS selectors a scenario needs on an application's pages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selectors {
    pub search_bar: String,
    pub search_button: String,
    pub search_results: String,
}

/// A search application under test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppTarget {
    /// Short name used as the application field of sample names
    pub name: String,
    pub base_url: String,
    pub selectors: Selectors,
}

impl AppTarget {
    pub fn scix() -> Self {
        Self {
            name: "scix".to_string(),
            base_url: "https://dev.scixplorer.org".to_string(),
            selectors: Selectors {
                search_bar: r#"[data-testid="search-input"]"#.to_string(),
                search_button: r#"[data-testid="search-submit"]"#.to_string(),
                search_results: "#results a>span".to_string(),
            },
        }
    }

    pub fn bbb() -> Self {
        Self {
            name: "bbb".to_string(),
            base_url: "https://dev.adsabs.harvard.edu".to_string(),
            selectors: Selectors {
                search_bar: r#"input[name="q"]"#.to_string(),
                search_button: "button.s-search-submit".to_string(),
                search_results: "h3.s-results-title".to_string(),
            },
        }
    }

    pub fn builtin() -> Vec<Self> {
        vec![Self::scix(), Self::bbb()]
    }

    /// Resolve application names against overrides first, then the built-in targets
    pub fn resolve(names: &[String], overrides: &[AppTarget]) -> E2eResult<Vec<Self>> {
        let builtin = Self::builtin();
        names
            .iter()
            .map(|name| -> E2eResult<Self> {
                let target = overrides
                    .iter()
                    .chain(builtin.iter())
                    .find(|t| &t.name == name)
                    .cloned()
                    .ok_or_else(|| E2eError::UnknownApplication(name.clone()))?;
                sample_name::validate_token("application", &target.name)?;
                Ok(target)
            })
            .collect()
    }
}
