//! Output formatting for command results (table, JSON).

use crate::commands::{FindResult, IndexSummary, RunSummary, UpcReport};
use crate::config::OutputFormat;
use crate::vendors::Vendor;
use serde::Serialize;
use serde_json::json;

/// Formats command results for output.
pub struct Formatter {
    format: OutputFormat,
}

impl Formatter {
    /// Creates a new formatter.
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    fn json<T: Serialize + ?Sized>(&self, value: &T) -> String {
        serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
    }

    /// Formats the counts of a collect run.
    pub fn format_summary(&self, summary: &RunSummary) -> String {
        match self.format {
            OutputFormat::Json => self.json(summary),
            OutputFormat::Table => {
                let rows = [
                    ("Vendor:", summary.vendor.clone()),
                    ("Rows:", summary.total.to_string()),
                    ("Enriched:", summary.enriched.to_string()),
                    ("Not found:", summary.not_found.to_string()),
                    ("Failed:", summary.failed.to_string()),
                    ("Skipped:", summary.skipped.to_string()),
                    ("Written:", format!("{} -> {}", summary.written, summary.output.display())),
                ];
                rows.iter()
                    .map(|(label, value)| format!("{:<11} {}", label, value))
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        }
    }

    /// Formats a single lookup.
    pub fn format_find(&self, result: &FindResult) -> String {
        match self.format {
            OutputFormat::Json => self.json(result),
            OutputFormat::Table => match &result.url {
                Some(url) => format!("Vendor:  {}\nQuery:   {}\nURL:     {}", result.vendor, result.query, url),
                None => format!("No matching product found for '{}' on {}.", result.query, result.vendor),
            },
        }
    }

    /// Formats an index run.
    pub fn format_index(&self, summary: &IndexSummary) -> String {
        match self.format {
            OutputFormat::Json => self.json(summary),
            OutputFormat::Table => {
                let mut lines = vec![
                    format!("Vendor:   {}", summary.vendor),
                    format!("Products: {}", summary.total_products),
                    format!("Updated:  {}", summary.last_updated),
                    format!("Saved to: {}", summary.output.display()),
                ];

                if !summary.categories.is_empty() {
                    let width = summary
                        .categories
                        .keys()
                        .map(String::len)
                        .chain(["Category".len()])
                        .max()
                        .unwrap_or(0);
                    lines.push(String::new());
                    lines.push(format!("{:<width$}  {:>8}", "Category", "Products"));
                    lines.push(format!("{:-<width$}  {:-<8}", "", ""));
                    for (category, count) in &summary.categories {
                        lines.push(format!("{:<width$}  {:>8}", category, count));
                    }
                }

                lines.join("\n")
            }
        }
    }

    /// Formats the supported vendor list.
    pub fn format_vendors(&self, vendors: &[Vendor]) -> String {
        match self.format {
            OutputFormat::Json => {
                let list: Vec<_> = vendors
                    .iter()
                    .map(|v| {
                        json!({
                            "code": v.to_string(),
                            "name": v.display_name(),
                            "origin": v.origin(),
                            "requires_catalog": v.requires_catalog(),
                            "requires_index": v.requires_index(),
                            "requires_login": v.requires_login(),
                        })
                    })
                    .collect();
                self.json(&list)
            }
            OutputFormat::Table => {
                let mut lines = Vec::new();
                lines.push(format!("{:<18}  {:<18}  {:<34}  {}", "Code", "Name", "Origin", "Needs"));
                lines.push(format!("{:-<18}  {:-<18}  {:-<34}  {:-<7}", "", "", "", ""));
                for vendor in vendors {
                    let needs = if vendor.requires_catalog() {
                        "catalog"
                    } else if vendor.requires_index() {
                        "index"
                    } else if vendor.requires_login() {
                        "login"
                    } else {
                        ""
                    };
                    lines.push(
                        format!(
                            "{:<18}  {:<18}  {:<34}  {}",
                            vendor.to_string(),
                            vendor.display_name(),
                            vendor.origin(),
                            needs
                        )
                        .trim_end()
                        .to_string(),
                    );
                }
                lines.join("\n")
            }
        }
    }

    /// Formats the forms of a UPC.
    pub fn format_upc(&self, report: &UpcReport) -> String {
        match self.format {
            OutputFormat::Json => self.json(report),
            OutputFormat::Table => format!(
                "Input:      {}\nNormalized: {}\nUPC-A (12): {}\nEAN (13):   {}\nValid:      {}",
                report.input,
                report.normalized,
                report.upc_12,
                report.upc_13,
                if report.valid { "yes" } else { "no" }
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn summary() -> RunSummary {
        RunSummary {
            vendor: "ethical".into(),
            total: 10,
            enriched: 7,
            not_found: 2,
            failed: 1,
            skipped: 3,
            written: 13,
            output: PathBuf::from("out/ethical.json"),
        }
    }

    #[test]
    fn test_summary_table() {
        let output = Formatter::new(OutputFormat::Table).format_summary(&summary());
        assert!(output.contains("Vendor:     ethical"));
        assert!(output.contains("Enriched:   7"));
        assert!(output.contains("Not found:  2"));
        assert!(output.contains("Written:    13 -> out/ethical.json"));
    }

    #[test]
    fn test_summary_json() {
        let output = Formatter::new(OutputFormat::Json).format_summary(&summary());
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["enriched"], 7);
        assert_eq!(value["output"], "out/ethical.json");
    }

    #[test]
    fn test_find_table() {
        let formatter = Formatter::new(OutputFormat::Table);
        let found = FindResult {
            vendor: "cambridge".into(),
            query: "Toscana".into(),
            url: Some("https://www.cambridgepavers.com/pavers-details?prodid=1".into()),
        };
        assert!(formatter.format_find(&found).contains("URL:     https://www.cambridgepavers.com"));

        let missing = FindResult { url: None, ..found };
        assert_eq!(
            formatter.format_find(&missing),
            "No matching product found for 'Toscana' on cambridge."
        );
    }

    #[test]
    fn test_index_table_lists_categories() {
        let summary = IndexSummary {
            vendor: "cambridge".into(),
            total_products: 3,
            categories: BTreeMap::from([("pavers".to_string(), 2), ("walls".to_string(), 1)]),
            last_updated: "2026-01-05T10:00:00+00:00".into(),
            output: PathBuf::from("cambridge_index.json"),
        };
        let output = Formatter::new(OutputFormat::Table).format_index(&summary);
        assert!(output.contains("Products: 3"));
        assert!(output.contains("Category  Products"));
        assert!(output.contains("pavers           2"));
    }

    #[test]
    fn test_vendors_table_and_json() {
        let table = Formatter::new(OutputFormat::Table).format_vendors(Vendor::all());
        assert!(table.contains("bradley-caldwell"));
        assert!(table.lines().any(|l| l.starts_with("cambridge") && l.ends_with("index")));
        assert!(table.lines().any(|l| l.starts_with("ethical") && l.ends_with("https://www.ethicalpet.com")));

        let json = Formatter::new(OutputFormat::Json).format_vendors(Vendor::all());
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 11);
        assert_eq!(value[3]["requires_catalog"], true);
        assert!(table.lines().any(|l| l.starts_with("ivyclassic") && l.ends_with("catalog")));
        assert!(table.lines().any(|l| l.starts_with("orgill") && l.ends_with("login")));
        let orgill = value.as_array().unwrap().iter().find(|v| v["code"] == "orgill").unwrap();
        assert_eq!(orgill["requires_login"], true);
    }

    #[test]
    fn test_upc_table() {
        let output = Formatter::new(OutputFormat::Table).format_upc(&UpcReport::new("071859950010"));
        assert!(output.contains("EAN (13):   0071859950010"));
        assert!(output.contains("Valid:      yes"));
    }
}
