//! Human-readable and JSON rendering of results.

use prodrec_core::AppResult;
use prodrec_engine::{IngestionReport, ProductMetadataView, QueryResult, Recommendation};
use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn render_report(report: &IngestionReport) -> String {
    let mut out = report.summary();
    for failure in &report.failures {
        out.push_str(&format!(
            "\n  - {} (row {}, {}): {}",
            display_id(&failure.product_id),
            failure.position + 1,
            failure.stage.as_str(),
            failure.message
        ));
    }
    out
}

pub fn render_result(result: &QueryResult) -> String {
    let mut out = format!("Recommendations for '{}':", result.query);

    match &result.recommendation {
        Recommendation::EmptyIndex => out.push_str("\n  Index is empty; ingest a catalog first"),
        Recommendation::NoMatch => out.push_str("\n  No matching products found"),
        Recommendation::Failed(error) => {
            out.push_str(&format!("\n  Query failed: {}", error.message))
        }
        Recommendation::Matches { matches } => {
            for (rank, m) in matches.iter().enumerate() {
                out.push_str(&format!(
                    "\n  {}. [{:.4}] {}",
                    rank + 1,
                    m.score,
                    m.id
                ));
                out.push_str(&render_metadata(m.metadata.as_ref()));
            }
        }
    }

    out
}

fn render_metadata(metadata: Option<&ProductMetadataView>) -> String {
    let Some(metadata) = metadata else {
        return "\n     no metadata available".to_string();
    };

    let text = |value: &Option<String>| value.clone().unwrap_or_else(|| "N/A".to_string());
    let price = metadata
        .unitprice
        .map(|p| format!("{:.2}", p))
        .unwrap_or_else(|| "N/A".to_string());

    format!(
        "\n     description: {}\n     category: {}\n     unitprice: {}\n     country: {}",
        text(&metadata.description),
        text(&metadata.category),
        price,
        text(&metadata.country)
    )
}

fn display_id(id: &str) -> &str {
    if id.trim().is_empty() {
        "<blank id>"
    } else {
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prodrec_engine::{QueryError, QueryMatch};

    fn result(recommendation: Recommendation) -> QueryResult {
        QueryResult {
            query: "fitness gear".to_string(),
            recommendation,
        }
    }

    #[test]
    fn test_render_matches_with_partial_metadata() {
        let rendered = render_result(&result(Recommendation::Matches {
            matches: vec![
                QueryMatch {
                    id: "P2".to_string(),
                    score: 0.91234,
                    metadata: Some(ProductMetadataView {
                        description: Some("Yoga mat".to_string()),
                        category: None,
                        unitprice: Some(19.5),
                        country: Some("US".to_string()),
                    }),
                },
                QueryMatch {
                    id: "P9".to_string(),
                    score: 0.1,
                    metadata: None,
                },
            ],
        }));

        assert!(rendered.contains("1. [0.9123] P2"));
        assert!(rendered.contains("category: N/A"));
        assert!(rendered.contains("unitprice: 19.50"));
        assert!(rendered.contains("2. [0.1000] P9\n     no metadata available"));
    }

    #[test]
    fn test_render_outcomes() {
        assert!(render_result(&result(Recommendation::EmptyIndex)).contains("Index is empty"));
        assert!(render_result(&result(Recommendation::NoMatch)).contains("No matching"));
        let failed = render_result(&result(Recommendation::Failed(QueryError {
            query: "fitness gear".to_string(),
            message: "Index error: timeout".to_string(),
        })));
        assert!(failed.contains("Query failed: Index error: timeout"));
    }
}
