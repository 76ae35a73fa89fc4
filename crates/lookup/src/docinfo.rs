use std::collections::HashSet;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use scraper::{Html, Selector};
use tracing::{debug, warn};

use crate::record::{LookupAdapter, LookupQuery, LookupRecord};

pub const DOCINFO_BASE_URL: &str = "https://www.docinfo.org";
const BOARD_NAME: &str = "FSMB DocInfo";
const CARD_SELECTOR: &str = "a[href*='/doctor/'], div.result a[href], div.card a[href]";

/// Best-effort scraper for DocInfo search results. There is no public API,
/// so the markup heuristics may need adjusting when the site changes.
pub struct DocInfoAdapter {
    http: Client,
    base_url: String,
}

impl DocInfoAdapter {
    pub fn new(http: Client) -> Self {
        Self::with_base_url(http, DOCINFO_BASE_URL)
    }

    pub fn with_base_url(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    /// `None` when the site refuses both the query and the bare search page,
    /// which it routinely does for automated clients.
    fn fetch(&self, name: &str) -> Result<Option<String>> {
        let url = format!("{}/search/", self.base_url.trim_end_matches('/'));
        let response = self
            .http
            .get(&url)
            .query(&[("q", name)])
            .send()
            .with_context(|| format!("docinfo request failed: {url}"))?;
        let response = if response.status().is_success() {
            response
        } else {
            warn!(status = %response.status(), "docinfo search rejected the query, retrying bare");
            self.http
                .get(&url)
                .send()
                .with_context(|| format!("docinfo request failed: {url}"))?
        };
        if !response.status().is_success() {
            warn!(status = %response.status(), "docinfo refused the search, no results");
            return Ok(None);
        }
        response
            .text()
            .map(Some)
            .context("failed to read docinfo response")
    }
}

impl LookupAdapter for DocInfoAdapter {
    fn name(&self) -> &'static str {
        "docinfo"
    }

    fn search(&self, query: &LookupQuery) -> Result<Vec<LookupRecord>> {
        let Some(html) = self.fetch(&query.full_name())? else {
            return Ok(Vec::new());
        };
        let records = extract_profiles(&html, &self.base_url);
        debug!(results = records.len(), "docinfo search parsed");
        Ok(records)
    }
}

/// Pulls doctor profile links out of a DocInfo results page. Card-like
/// anchors are tried first; when none match, every link on the page is
/// scanned.
pub fn extract_profiles(html: &str, base_url: &str) -> Vec<LookupRecord> {
    let doc = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut records = Vec::new();

    if let Ok(selector) = Selector::parse(CARD_SELECTOR) {
        for el in doc.select(&selector) {
            let href = el.value().attr("href").unwrap_or("");
            if !href.contains("/doctor/") {
                continue;
            }
            let text = element_text(el.text());
            let full_name = match text.split_once(" - ") {
                Some((name, _)) => name.trim().to_string(),
                None => text,
            };
            push_profile(&mut records, &mut seen, base_url, href, full_name);
        }
    }

    if records.is_empty() {
        if let Ok(selector) = Selector::parse("a[href]") {
            for el in doc.select(&selector) {
                let href = el.value().attr("href").unwrap_or("");
                if href.contains("/doctor/") {
                    let full_name = element_text(el.text());
                    push_profile(&mut records, &mut seen, base_url, href, full_name);
                }
            }
        }
    }
    records
}

fn push_profile(
    records: &mut Vec<LookupRecord>,
    seen: &mut HashSet<String>,
    base_url: &str,
    href: &str,
    full_name: String,
) {
    let profile_url = absolutize(base_url, href);
    if !seen.insert(profile_url.clone()) {
        return;
    }
    records.push(LookupRecord {
        source: "docinfo".to_string(),
        full_name,
        profile_url,
        board_name: BOARD_NAME.to_string(),
        ..LookupRecord::default()
    });
}

fn element_text<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn absolutize(base_url: &str, href: &str) -> String {
    if href.starts_with("http") {
        href.to_string()
    } else {
        format!("{}{}", base_url.trim_end_matches('/'), href)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    const RESULTS_PAGE: &str = r#"
        <html><body>
          <div class="result">
            <a href="/doctor/123-ana-lee">Ana  Lee - Cardiology</a>
          </div>
          <div class="card"><a href="/doctor/123-ana-lee">Ana Lee</a></div>
          <a href="https://www.docinfo.org/doctor/456-ana-m-lee">Ana M. Lee</a>
          <a href="/about">About DocInfo</a>
        </body></html>
    "#;

    #[test]
    fn extracts_and_dedupes_profile_links() {
        let records = extract_profiles(RESULTS_PAGE, DOCINFO_BASE_URL);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].full_name, "Ana Lee");
        assert_eq!(
            records[0].profile_url,
            "https://www.docinfo.org/doctor/123-ana-lee"
        );
        assert_eq!(records[0].board_name, "FSMB DocInfo");
        assert_eq!(records[0].source, "docinfo");
        assert_eq!(
            records[1].profile_url,
            "https://www.docinfo.org/doctor/456-ana-m-lee"
        );
        assert_eq!(records[1].full_name, "Ana M. Lee");
    }

    #[test]
    fn ignores_pages_without_doctor_links() {
        let html = r#"<html><body><div class="card"><a href="/faq">FAQ</a></div></body></html>"#;
        assert!(extract_profiles(html, DOCINFO_BASE_URL).is_empty());
    }

    /// Serves `responses` in order, one per connection, then stops.
    fn serve(responses: Vec<String>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            for body in responses {
                let Ok((mut stream, _)) = listener.accept() else {
                    return;
                };
                let mut buf = [0u8; 4096];
                let _ = stream.read(&mut buf);
                let _ = stream.write_all(body.as_bytes());
            }
        });
        format!("http://{addr}")
    }

    fn http_response(status: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status}\r\nContent-Type: text/html\r\n\
             Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    fn query() -> LookupQuery {
        LookupQuery {
            first: "Ana".to_string(),
            last: "Lee".to_string(),
            ..LookupQuery::default()
        }
    }

    #[test]
    fn refused_searches_yield_no_rows() {
        let forbidden = http_response("403 Forbidden", "blocked");
        let base = serve(vec![forbidden.clone(), forbidden]);
        let adapter = DocInfoAdapter::with_base_url(Client::new(), base);
        assert!(adapter.search(&query()).unwrap().is_empty());
    }

    #[test]
    fn bare_retry_is_parsed_after_a_rejected_query() {
        let base = serve(vec![
            http_response("400 Bad Request", ""),
            http_response("200 OK", r#"<a href="/doctor/9-ana-lee">Ana Lee</a>"#),
        ]);
        let adapter = DocInfoAdapter::with_base_url(Client::new(), base.clone());
        let records = adapter.search(&query()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].profile_url, format!("{base}/doctor/9-ana-lee"));
    }

    #[test]
    fn relative_links_resolve_against_base() {
        assert_eq!(
            absolutize("http://localhost:9000/", "/doctor/1"),
            "http://localhost:9000/doctor/1"
        );
        assert_eq!(absolutize(DOCINFO_BASE_URL, "https://x/doctor/1"), "https://x/doctor/1");
    }
}
