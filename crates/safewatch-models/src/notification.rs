//! Violation notification payloads.

use serde::{Deserialize, Serialize};

use crate::detection::ViolationSummary;

/// Body accepted by the notification endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRequest {
    /// Recipient addresses
    pub to: Vec<String>,
    pub subject: String,
    /// HTML body
    pub body: String,
}

impl NotificationRequest {
    /// Build a violation report with the summary rendered as a table.
    pub fn violation_report(
        to: Vec<String>,
        subject: impl Into<String>,
        summary: &ViolationSummary,
    ) -> Self {
        let body = format!(
            "<p>Violations detected: {}</p>{}",
            summary.total(),
            render_summary_table(summary)
        );

        Self {
            to,
            subject: subject.into(),
            body,
        }
    }
}

/// Render a summary as a two-column label/count HTML table.
pub fn render_summary_table(summary: &ViolationSummary) -> String {
    let mut html = String::from("<table><tr><th>Violation</th><th>Count</th></tr>");
    for (label, count) in summary.iter() {
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td></tr>",
            escape_html(label),
            count
        ));
    }
    html.push_str("</table>");
    html
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_rows_in_label_order() {
        let summary: ViolationSummary = [("no_vest", 1u64), ("no_helmet", 3)].into_iter().collect();
        let table = render_summary_table(&summary);
        assert_eq!(
            table,
            "<table><tr><th>Violation</th><th>Count</th></tr>\
             <tr><td>no_helmet</td><td>3</td></tr>\
             <tr><td>no_vest</td><td>1</td></tr></table>"
        );
    }

    #[test]
    fn test_labels_are_escaped() {
        let summary: ViolationSummary = [("<script>", 1u64)].into_iter().collect();
        let table = render_summary_table(&summary);
        assert!(table.contains("&lt;script&gt;"));
        assert!(!table.contains("<script>"));
    }

    #[test]
    fn test_violation_report_payload() {
        let summary: ViolationSummary = [("no_helmet", 3u64)].into_iter().collect();
        let request = NotificationRequest::violation_report(
            vec!["safety@example.com".to_string()],
            "Safety violation alert",
            &summary,
        );
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["to"][0], "safety@example.com");
        assert_eq!(json["subject"], "Safety violation alert");
        assert!(request.body.contains("no_helmet"));
        assert!(request.body.contains("<td>3</td>"));
    }
}
