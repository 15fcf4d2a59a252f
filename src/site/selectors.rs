//! CSS selectors for vendor product and listing pages.
//!
//! Selectors are grouped by page region and tried in order. Vendor sites run
//! on WooCommerce (Ethical), Shopify (Purina Mills shop) or custom CMS
//! templates (Cambridge), so each list covers all three.
//!
//! **Update process**: when a field stops parsing, capture the page, add the
//! new selector at the front of the list, and add a fixture under `tests/fixtures`.

use scraper::Selector;
use std::sync::LazyLock;

fn parse(css: &str) -> Selector {
    Selector::parse(css).unwrap()
}

/// Product detail page selectors.
pub mod product {
    use super::*;

    /// Title candidates, most specific first.
    pub static TITLE: LazyLock<Vec<Selector>> = LazyLock::new(|| {
        [
            "div.summary h4",
            "h1.product_title",
            "h1.entry-title",
            "h1.page-title strong",
            "h1.product__title",
            ".product__title h1",
            "h1",
        ]
        .iter()
        .map(|css| parse(css))
        .collect()
    });

    pub static META_NAME: LazyLock<Selector> =
        LazyLock::new(|| parse("meta[itemprop='name']"));

    pub static OG_TITLE: LazyLock<Selector> =
        LazyLock::new(|| parse("meta[property='og:title']"));

    pub static DOC_TITLE: LazyLock<Selector> = LazyLock::new(|| parse("title"));

    /// Description containers; inner HTML is kept.
    pub static DESCRIPTION: LazyLock<Vec<Selector>> = LazyLock::new(|| {
        [
            "div.woocommerce-product-details__short-description",
            "#tab-description",
            ".product__description",
            ".product-description",
            "div.description",
        ]
        .iter()
        .map(|css| parse(css))
        .collect()
    });

    pub static META_DESCRIPTION: LazyLock<Selector> =
        LazyLock::new(|| parse("meta[name='description']"));

    /// `<strong>Label:</strong>` blocks used by CMS templates for description and specs.
    pub static LABEL: LazyLock<Selector> = LazyLock::new(|| parse("strong"));

    /// Collection heading ("Sherwood Collection").
    pub static COLLECTION: LazyLock<Selector> = LazyLock::new(|| parse("h4 span"));

    pub static JSON_LD: LazyLock<Selector> =
        LazyLock::new(|| parse("script[type='application/ld+json']"));

    pub static OG_IMAGE: LazyLock<Selector> =
        LazyLock::new(|| parse("meta[property='og:image']"));

    /// Gallery images; each entry pairs a selector with the attributes to read, in order.
    pub static GALLERY: LazyLock<Vec<(Selector, &'static [&'static str])>> = LazyLock::new(|| {
        vec![
            (parse(".elastislide-list img[data-largeimg]"), &["data-largeimg"][..]),
            (
                parse(".woocommerce-product-gallery__image a"),
                &["href"][..],
            ),
            (
                parse(".woocommerce-product-gallery img"),
                &["data-large_image", "data-src", "src"][..],
            ),
            (parse("ul.thumbnail-list img"), &["src", "data-src"][..]),
            (parse(".product__media img"), &["src", "data-src"][..]),
            (parse("div.image-box img"), &["src"][..]),
            (parse(".owl-carousel .overlay-container img"), &["src"][..]),
        ]
    });

    pub static PRICE: LazyLock<Vec<Selector>> = LazyLock::new(|| {
        [
            "p.price .woocommerce-Price-amount",
            ".price .amount",
            ".price-item--regular",
            ".product__price",
            "meta[itemprop='price']",
        ]
        .iter()
        .map(|css| parse(css))
        .collect()
    });

    /// WooCommerce container whose classes carry `product_cat-*` categories.
    pub static CATEGORY_CONTAINER: LazyLock<Selector> =
        LazyLock::new(|| parse("div.product-details, div.product, div[class*='product_cat-']"));
}

/// Listing and search result page selectors.
pub mod listing {
    use super::*;

    pub static ANCHOR: LazyLock<Selector> = LazyLock::new(|| parse("a[href]"));

    pub static HEADING: LazyLock<Selector> = LazyLock::new(|| parse("h1, h2, h3, h4, h5"));

    pub static NEXT_LINK_REL: LazyLock<Selector> = LazyLock::new(|| parse("link[rel~='next']"));

    pub static NEXT_ANCHOR_REL: LazyLock<Selector> = LazyLock::new(|| parse("a[rel='next']"));

    pub static NEXT_ARIA: LazyLock<Selector> =
        LazyLock::new(|| parse("a[aria-label='Next'], a[aria-label='next']"));

    pub static NEXT_PAGINATION: LazyLock<Selector> = LazyLock::new(|| {
        parse(".pagination__item--next a, .next a, a.pagination__next, a.next")
    });
}
