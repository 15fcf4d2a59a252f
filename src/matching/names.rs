//! Product-name canonicalization for pet-product matching.
//!
//! Input descriptions are uppercase distributor shorthand ("SPOT PLAY STRONG
//! BALL 3.25IN"); vendor titles are marketing copy. Both are reduced to the
//! same vocabulary before comparing.

use regex_lite::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

static WS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static NON_ALNUM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^A-Za-z0-9]+").unwrap());
static MFR_WORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:ETHICAL(?:\s+PRODUCTS?)?|SPOT)\b").unwrap());
static QTY_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:COUNT|CT|PACK|PK|BULK|ASSTD|ASST|ASSORTED|EACH|EA|SET|BX|BOX|PDQ|DISPLAY|CASE)\b",
    )
    .unwrap()
});
static SIZE_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:OZ|OUNCES?|LB|LBS?|POUNDS?|G|GRAMS?|KG|MLS?|ML|L|LITERS?|QT|QTS?|QUARTS?|GALS?|GAL|IN|INCH(?:ES)?)\b",
    )
    .unwrap()
});
static CONNECTORS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:WITH|W/|W|AND|&|THE|FOR|OF|TO|PLUS|EXTRA|NEW|OR)\b").unwrap()
});
static PUNCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[/"“”'‘’()+,]"#).unwrap());
static CAT_HINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:CAT|KITTY|KITTEN|LITTER)\b").unwrap());
static DOG_HINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:DOG|PUP|PUPPY|CANINE)\b").unwrap());
static DISH_HINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:BOWL|DISH|FEEDER|STONEWARE|CERAMIC)\b").unwrap());
static CAT_BRANDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bSKINNEEEZ|SKINEEZ|SILVER\s*VINE|KITTY|CATNIP|TEASER|LITTER|FEATHER|FELT\b")
        .unwrap()
});
static DOG_BRANDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bPLAY\s*STRONG|BAMBONE|BARRETT\b").unwrap());

const FLAVOR_CANON: &[(&str, &[&str])] = &[
    ("PEANUT BUTTER", &["PEANUT", "PEANUTBUTTER", "PB", "PEANUT-BUTTER", "PEANUT_BUTTER"]),
    ("BACON", &["BACON"]),
    ("APPLE", &["APPLE"]),
    ("GINGERBREAD", &["GINGERBREAD"]),
];

const LINE_CANON: &[(&str, &[&str])] = &[
    ("PLAY STRONG", &["PLAYSTRONG", "PLAY-STRONG", "FOAMZ", "SCENT-SATION", "SCENTSATION"]),
    ("BARRETT", &["BARRETT"]),
    ("BAMBONE", &["BAMBONE", "BAM-BONE", "BAM BONE"]),
    ("SKINNEEEZ", &["SKINNEEEZ", "SKINEEZ", "SKINNEEZ"]),
];

const FORM_TOKENS: &[&str] = &[
    "BALL", "BONE", "TRIPOD", "X-BONE", "XBONE", "WISHBONE", "DINO", "RING", "DISH", "BOWL",
    "FEEDER", "BRIDGE", "CHEW", "TUG", "STICK",
];

/// Coarse product category inferred from a description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Taxonomy {
    Cat,
    Dog,
    Dish,
}

impl Taxonomy {
    pub fn as_str(self) -> &'static str {
        match self {
            Taxonomy::Cat => "cat",
            Taxonomy::Dog => "dog",
            Taxonomy::Dish => "dish",
        }
    }
}

/// Uppercase, noise-free product name used as the search query.
pub fn normalize_name(raw: &str) -> String {
    let s = WS.replace_all(raw.trim(), " ");
    let s = MFR_WORDS.replace_all(&s, " ");
    let s = s.replace('-', "");
    let s = QTY_WORDS.replace_all(&s, " ");
    let s = SIZE_WORDS.replace_all(&s, " ");
    let s = CONNECTORS.replace_all(&s, " ");
    let s = PUNCT.replace_all(&s, " ");
    let s = WS.replace_all(&s, " ").trim().to_uppercase();

    let mut parts: Vec<String> = s.split(' ').filter(|p| !p.is_empty()).map(String::from).collect();
    if let Some(first) = parts.first_mut() {
        *first = singularize_simple(first);
    }
    parts.join(" ")
}

/// `TOYS` -> `TOY`, `BERRIES` -> `BERRY`; leaves `GLASS` alone.
pub fn singularize_simple(tok: &str) -> String {
    if tok.len() > 3 {
        if let Some(stem) = tok.strip_suffix("IES") {
            return format!("{stem}Y");
        }
    }
    if tok.ends_with('S') && !tok.ends_with("SS") {
        return tok[..tok.len() - 1].to_string();
    }
    tok.to_string()
}

/// Canonical flavors mentioned anywhere in the text.
pub fn extract_canonical_flavors(text: &str) -> BTreeSet<String> {
    let upper = text.to_uppercase().replace(['-', '_'], " ");
    let tokens: BTreeSet<&str> = NON_ALNUM.split(&upper).filter(|t| !t.is_empty()).collect();

    FLAVOR_CANON
        .iter()
        .filter(|(canon, alts)| upper.contains(canon) || alts.iter().any(|a| tokens.contains(a)))
        .map(|(canon, _)| canon.to_string())
        .collect()
}

/// Canonical product lines (PLAY STRONG, BAMBONE, ...) mentioned in the text.
pub fn extract_canonical_line(text: &str) -> BTreeSet<String> {
    let upper_text = text.to_uppercase();
    let upper = upper_text.replace('-', "");
    let tokens: BTreeSet<&str> = upper_text.split_whitespace().collect();

    LINE_CANON
        .iter()
        .filter(|(canon, alts)| upper.contains(canon) || alts.iter().any(|a| tokens.contains(a)))
        .map(|(canon, _)| canon.to_string())
        .collect()
}

/// Physical form words (BALL, BONE, TUG, ...) present as whole tokens.
pub fn extract_form_tokens(text: &str) -> BTreeSet<String> {
    let upper = text.to_uppercase();
    let mut tokens: BTreeSet<&str> = upper.split_whitespace().collect();
    if tokens.contains("XBONE") {
        tokens.insert("X-BONE");
    }
    tokens.into_iter().filter(|t| FORM_TOKENS.contains(t)).map(String::from).collect()
}

/// Guesses cat/dog/dish from the description; dish wins over animal hints.
pub fn infer_taxonomy(text: &str) -> Option<Taxonomy> {
    if DISH_HINT.is_match(text) {
        return Some(Taxonomy::Dish);
    }
    if CAT_HINT.is_match(text) {
        return Some(Taxonomy::Cat);
    }
    if DOG_HINT.is_match(text) {
        return Some(Taxonomy::Dog);
    }
    if CAT_BRANDS.is_match(text) {
        return Some(Taxonomy::Cat);
    }
    if DOG_BRANDS.is_match(text) {
        return Some(Taxonomy::Dog);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("SPOT Play Strong Ball 3.25 IN"), "PLAY STRONG BALL 3.25");
        assert_eq!(normalize_name("Ethical Products Bambone Plus Bacon 5 pk"), "BAMBONE BACON 5");
        // A bare "&" has no word boundary on either side and survives
        assert_eq!(normalize_name("Toys w/ Rope & Ball"), "TOY ROPE & BALL");
        assert_eq!(normalize_name("  "), "");
    }

    #[test]
    fn test_normalize_name_removes_hyphens() {
        assert_eq!(normalize_name("X-Bone Peanut-Butter"), "XBONE PEANUTBUTTER");
    }

    #[test]
    fn test_singularize_simple() {
        assert_eq!(singularize_simple("TOYS"), "TOY");
        assert_eq!(singularize_simple("BERRIES"), "BERRY");
        assert_eq!(singularize_simple("GLASS"), "GLASS");
        assert_eq!(singularize_simple("BALL"), "BALL");
        assert_eq!(singularize_simple("IES"), "IE");
    }

    #[test]
    fn test_extract_canonical_flavors() {
        let flavors = extract_canonical_flavors("Bambone Peanut-Butter Flavor");
        assert!(flavors.contains("PEANUT BUTTER"));
        assert_eq!(flavors.len(), 1);

        let flavors = extract_canonical_flavors("PB & bacon chew");
        assert!(flavors.contains("PEANUT BUTTER"));
        assert!(flavors.contains("BACON"));

        assert!(extract_canonical_flavors("plain rubber ball").is_empty());
    }

    #[test]
    fn test_extract_canonical_line() {
        assert!(extract_canonical_line("Play-Strong Rubber Ball").contains("PLAY STRONG"));
        assert!(extract_canonical_line("FOAMZ Bone").contains("PLAY STRONG"));
        assert!(extract_canonical_line("Bam-Bone Wishbone").contains("BAMBONE"));
        assert!(extract_canonical_line("Fun Ball").is_empty());
    }

    #[test]
    fn test_extract_form_tokens() {
        let forms = extract_form_tokens("PLAY STRONG BALL");
        assert_eq!(forms.into_iter().collect::<Vec<_>>(), vec!["BALL"]);

        let forms = extract_form_tokens("bambone xbone");
        assert!(forms.contains("XBONE"));
        assert!(forms.contains("X-BONE"));

        assert!(extract_form_tokens("LASER POINTER").is_empty());
    }

    #[test]
    fn test_infer_taxonomy() {
        assert_eq!(infer_taxonomy("Stoneware Dog Dish"), Some(Taxonomy::Dish));
        assert_eq!(infer_taxonomy("Kitten teaser wand"), Some(Taxonomy::Cat));
        assert_eq!(infer_taxonomy("PUPPY chew"), Some(Taxonomy::Dog));
        assert_eq!(infer_taxonomy("Skinneeez Fox"), Some(Taxonomy::Cat));
        assert_eq!(infer_taxonomy("Play Strong rubber"), Some(Taxonomy::Dog));
        assert_eq!(infer_taxonomy("Rubber toy"), None);
    }
}
