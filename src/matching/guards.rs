//! Hard guards that reject a candidate page before it is scored.
//!
//! Each guard is built from what the query asked for and checks the facts
//! pulled off a product page. A guard returns the rejection reason, or `None`
//! when the page passes.

use crate::matching::names::{
    extract_canonical_flavors, extract_canonical_line, extract_form_tokens, infer_taxonomy,
    normalize_name, Taxonomy,
};
use crate::matching::sizes::{extract_sizes, sizes_match, Sizes, SIZE_TOLERANCE};
use regex_lite::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

static DOG_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bdog\b").unwrap());
static CAT_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bcat\b").unwrap());

/// What the query row tells us about the product we are looking for.
#[derive(Debug, Clone, Default)]
pub struct QueryFacts {
    pub taxonomy: Option<Taxonomy>,
    pub flavors: BTreeSet<String>,
    pub lines: BTreeSet<String>,
    pub forms: BTreeSet<String>,
    pub sizes: Sizes,
}

impl QueryFacts {
    /// Builds query facts from a distributor description, falling back to a
    /// secondary title for anything the description does not mention.
    pub fn from_texts(description: &str, title: &str) -> Self {
        let primary = if description.trim().is_empty() { title } else { description };

        let mut flavors = extract_canonical_flavors(description);
        if flavors.is_empty() {
            flavors = extract_canonical_flavors(title);
        }
        let mut lines = extract_canonical_line(description);
        if lines.is_empty() {
            lines = extract_canonical_line(title);
        }

        Self {
            taxonomy: infer_taxonomy(description),
            flavors,
            lines,
            forms: extract_form_tokens(&normalize_name(primary)),
            sizes: extract_sizes(primary),
        }
    }
}

/// What a fetched product page says about itself.
#[derive(Debug, Clone, Default)]
pub struct PageFacts {
    pub title: String,
    pub title_norm: String,
    pub slug: String,
    pub taxonomy: BTreeSet<String>,
    pub flavors: BTreeSet<String>,
    pub lines: BTreeSet<String>,
    pub forms: BTreeSet<String>,
    pub sizes: Sizes,
}

impl PageFacts {
    /// Derives page facts from the product title, its URL slug, the page's
    /// category classes and the raw page HTML (flavors are read from the whole page).
    pub fn new(title: &str, slug: &str, taxonomy: BTreeSet<String>, html: &str) -> Self {
        let title_norm = normalize_name(title);
        Self {
            title: title.to_string(),
            slug: slug.to_string(),
            taxonomy,
            flavors: extract_canonical_flavors(&html.to_uppercase()),
            lines: extract_canonical_line(&title_norm),
            forms: extract_form_tokens(&title_norm),
            sizes: extract_sizes(title),
            title_norm,
        }
    }
}

/// A single hard rejection rule.
pub trait Guard: Send + Sync {
    /// Returns the rejection reason, or `None` if the page passes.
    fn check(&self, page: &PageFacts) -> Option<String>;

    /// Short description of the rule, for debug logs.
    fn description(&self) -> String;
}

/// Rejects dog pages for cat queries and cat pages for dog queries.
pub struct TaxonomyGuard {
    expected: Taxonomy,
}

impl TaxonomyGuard {
    pub fn new(expected: Taxonomy) -> Self {
        Self { expected }
    }
}

impl Guard for TaxonomyGuard {
    fn check(&self, page: &PageFacts) -> Option<String> {
        match self.expected {
            Taxonomy::Cat if page.taxonomy.contains("dog") || DOG_WORD.is_match(&page.title) => {
                Some("dog vs cat".to_string())
            }
            Taxonomy::Dog if page.taxonomy.contains("cat") || CAT_WORD.is_match(&page.title) => {
                Some("cat vs dog".to_string())
            }
            _ => None,
        }
    }

    fn description(&self) -> String {
        format!("Taxonomy: {}", self.expected.as_str())
    }
}

/// Requires at least one shared canonical flavor.
pub struct FlavorGuard {
    flavors: BTreeSet<String>,
}

impl FlavorGuard {
    pub fn new(flavors: BTreeSet<String>) -> Self {
        Self { flavors }
    }
}

impl Guard for FlavorGuard {
    fn check(&self, page: &PageFacts) -> Option<String> {
        if self.flavors.is_disjoint(&page.flavors) {
            Some("flavor mismatch".to_string())
        } else {
            None
        }
    }

    fn description(&self) -> String {
        format!("Flavor: {}", self.flavors.iter().cloned().collect::<Vec<_>>().join(", "))
    }
}

/// Requires at least one shared product line.
pub struct LineGuard {
    lines: BTreeSet<String>,
}

impl LineGuard {
    pub fn new(lines: BTreeSet<String>) -> Self {
        Self { lines }
    }
}

impl Guard for LineGuard {
    fn check(&self, page: &PageFacts) -> Option<String> {
        if self.lines.is_disjoint(&page.lines) {
            Some("line mismatch".to_string())
        } else {
            None
        }
    }

    fn description(&self) -> String {
        format!("Line: {}", self.lines.iter().cloned().collect::<Vec<_>>().join(", "))
    }
}

/// Requires sizes in shared unit families to agree within a tolerance.
pub struct SizeGuard {
    sizes: Sizes,
    tolerance: f64,
}

impl SizeGuard {
    pub fn new(sizes: Sizes, tolerance: f64) -> Self {
        Self { sizes, tolerance }
    }
}

impl Guard for SizeGuard {
    fn check(&self, page: &PageFacts) -> Option<String> {
        if sizes_match(&self.sizes, &page.sizes, self.tolerance) {
            None
        } else {
            Some("size mismatch".to_string())
        }
    }

    fn description(&self) -> String {
        let families: Vec<&str> = self.sizes.keys().copied().collect();
        format!("Size within {:.0}%: {}", self.tolerance * 100.0, families.join(", "))
    }
}

/// Guards run in insertion order; the first rejection wins.
#[derive(Default)]
pub struct GuardChain {
    guards: Vec<Box<dyn Guard>>,
}

impl GuardChain {
    pub fn new() -> Self {
        Self { guards: Vec::new() }
    }

    /// Adds a guard to the end of the chain.
    pub fn add(&mut self, guard: impl Guard + 'static) -> &mut Self {
        self.guards.push(Box::new(guard));
        self
    }

    /// Returns the first rejection reason, if any guard rejects the page.
    pub fn check(&self, page: &PageFacts) -> Option<String> {
        self.guards.iter().find_map(|g| g.check(page))
    }

    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }

    pub fn len(&self) -> usize {
        self.guards.len()
    }

    pub fn descriptions(&self) -> Vec<String> {
        self.guards.iter().map(|g| g.description()).collect()
    }
}

/// Builds the standard guard chain for a query: taxonomy, flavor, line, size.
#[derive(Default)]
pub struct GuardChainBuilder {
    chain: GuardChain,
}

impl GuardChainBuilder {
    pub fn new() -> Self {
        Self { chain: GuardChain::new() }
    }

    pub fn taxonomy(mut self, expected: Option<Taxonomy>) -> Self {
        if let Some(t @ (Taxonomy::Cat | Taxonomy::Dog)) = expected {
            self.chain.add(TaxonomyGuard::new(t));
        }
        self
    }

    pub fn flavors(mut self, flavors: &BTreeSet<String>) -> Self {
        if !flavors.is_empty() {
            self.chain.add(FlavorGuard::new(flavors.clone()));
        }
        self
    }

    pub fn lines(mut self, lines: &BTreeSet<String>) -> Self {
        if !lines.is_empty() {
            self.chain.add(LineGuard::new(lines.clone()));
        }
        self
    }

    pub fn sizes(mut self, sizes: &Sizes) -> Self {
        if !sizes.is_empty() {
            self.chain.add(SizeGuard::new(sizes.clone(), SIZE_TOLERANCE));
        }
        self
    }

    /// Chain for everything the query facts constrain.
    pub fn for_query(query: &QueryFacts) -> Self {
        Self::new()
            .taxonomy(query.taxonomy)
            .flavors(&query.flavors)
            .lines(&query.lines)
            .sizes(&query.sizes)
    }

    pub fn build(self) -> GuardChain {
        self.chain
    }
}
