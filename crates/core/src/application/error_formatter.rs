// Error formatter contract (spec §4.3, §7, §8).
//
// `format_job_error(category, err, url?, timeout?)` produces one of
// `{Timeout, HTTP N, Network, Scraping, Storage, Validation, System}: <brief>
// [for <url>]`, truncated to <=200 chars, with balanced parentheses. Used
// consistently on every job-failure path.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Network,
    Http(u16),
    Timeout,
    Scraping,
    Storage,
    System,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Validation => write!(f, "Validation"),
            ErrorCategory::Network => write!(f, "Network"),
            ErrorCategory::Http(status) => write!(f, "HTTP {status}"),
            ErrorCategory::Timeout => write!(f, "Timeout"),
            ErrorCategory::Scraping => write!(f, "Scraping"),
            ErrorCategory::Storage => write!(f, "Storage"),
            ErrorCategory::System => write!(f, "System"),
        }
    }
}

const MAX_LEN: usize = 200;

/// Drops unmatched `)` and closes any unmatched `(` at the end, so the
/// result always has balanced parentheses.
fn balance_parens(s: &str) -> String {
    let mut depth: i32 = 0;
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '(' => {
                depth += 1;
                out.push(c);
            }
            ')' => {
                if depth > 0 {
                    depth -= 1;
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }
    for _ in 0..depth {
        out.push(')');
    }
    out
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

pub fn format_job_error(
    category: ErrorCategory,
    err: &str,
    url: Option<&str>,
    timeout_ms: Option<i64>,
) -> String {
    let mut brief = err.trim().to_string();
    if let (ErrorCategory::Timeout, Some(ms)) = (category, timeout_ms) {
        brief = format!("{brief} (after {ms}ms)");
    }

    let suffix = url
        .map(|u| format!(" [for {u}]"))
        .unwrap_or_default();
    let prefix = format!("{category}: ");

    let budget = MAX_LEN.saturating_sub(prefix.chars().count() + suffix.chars().count());
    let mut brief = balance_parens(&truncate_chars(&brief, budget));

    let mut result = format!("{prefix}{brief}{suffix}");
    // Closing parens appended by balancing may have pushed us over budget;
    // shrink and rebalance until it fits.
    while result.chars().count() > MAX_LEN && !brief.is_empty() {
        let shrink_to = brief.chars().count() - 1;
        brief = balance_parens(&truncate_chars(&brief, shrink_to));
        result = format!("{prefix}{brief}{suffix}");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parens_balanced(s: &str) -> bool {
        let mut depth = 0i32;
        for c in s.chars() {
            match c {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth < 0 {
                        return false;
                    }
                }
                _ => {}
            }
        }
        depth == 0
    }

    #[test]
    fn balances_unmatched_open_paren() {
        let out = format_job_error(ErrorCategory::Scraping, "broken (markup", None, None);
        assert!(parens_balanced(&out));
    }

    #[test]
    fn drops_unmatched_close_paren() {
        let out = format_job_error(ErrorCategory::Network, "dangling) token", None, None);
        assert!(parens_balanced(&out));
    }

    #[test]
    fn truncates_to_200_chars_and_stays_balanced() {
        let long = "x (".repeat(200);
        let out = format_job_error(ErrorCategory::System, &long, Some("http://a"), None);
        assert!(out.chars().count() <= MAX_LEN);
        assert!(parens_balanced(&out));
    }

    #[test]
    fn includes_category_and_url() {
        let out = format_job_error(
            ErrorCategory::Http(404),
            "not found",
            Some("http://example.com"),
            None,
        );
        assert!(out.starts_with("HTTP 404: not found"));
        assert!(out.ends_with("[for http://example.com]"));
    }

    #[test]
    fn timeout_includes_duration() {
        let out = format_job_error(ErrorCategory::Timeout, "request stalled", None, Some(30_000));
        assert!(out.contains("30000ms"));
        assert!(parens_balanced(&out));
    }
}
