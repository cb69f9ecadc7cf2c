//! HTTP(S) transport (spec.md §4.1, §4.7): ranged GET, chunked bodies,
//! PUT, DELETE, and an href-scraping directory-listing fallback.

use std::io::Read;
use std::time::Duration;

use afd_model::{Credentials, ProtocolOptions, WorkerError};
use url::Url;

use crate::trait_def::{GetOutcome, ListOutcome, ListingEntry, PutResponse, Transport};

/// Implements [`Transport`] over HTTP(S) using a pooled [`ureq::Agent`].
pub struct HttpTransport {
    agent: ureq::Agent,
    base_url: Option<Url>,
    options: ProtocolOptions,
    read_body: Option<Box<dyn Read + Send + 'static>>,
    pending_put: Option<(Url, Vec<u8>)>,
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .timeout(Duration::from_secs(60))
                .build(),
            base_url: None,
            options: ProtocolOptions::empty(),
            read_body: None,
            pending_put: None,
        }
    }
}

impl HttpTransport {
    /// Creates a transport with a default-timeout agent and no active
    /// connection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn base(&self) -> Result<&Url, WorkerError> {
        self.base_url
            .as_ref()
            .ok_or_else(|| WorkerError::Connect("not connected".into()))
    }

    fn resolve(&self, path: &str, name: &str) -> Result<Url, WorkerError> {
        let base = self.base()?;
        let joined = format!(
            "{}/{}",
            path.trim_end_matches('/'),
            name.trim_start_matches('/')
        );
        base.join(&joined)
            .map_err(|e| WorkerError::OpenRemote { code: 400, path: e.to_string() })
    }

    /// Extracts `href="..."` targets from a directory-index HTML page, the
    /// fallback used when a host has no machine-readable listing API.
    fn scrape_hrefs(body: &str) -> Vec<String> {
        let mut names = Vec::new();
        let mut rest = body;
        while let Some(start) = rest.find("href=\"") {
            rest = &rest[start + "href=\"".len()..];
            let Some(end) = rest.find('"') else { break };
            let href = &rest[..end];
            rest = &rest[end..];
            if href.is_empty() || href.starts_with('?') || href.starts_with('/') || href.contains("://") {
                continue;
            }
            if href == "../" {
                continue;
            }
            names.push(href.trim_end_matches('/').to_string());
        }
        names
    }
}

impl Transport for HttpTransport {
    fn connect(
        &mut self,
        host: &str,
        port: Option<u16>,
        _credentials: &Credentials,
        options: ProtocolOptions,
    ) -> Result<(), WorkerError> {
        let scheme = if options.has(ProtocolOptions::TLS_STRICT) || port == Some(443) {
            "https"
        } else {
            "http"
        };
        let authority = match port {
            Some(p) => format!("{scheme}://{host}:{p}"),
            None => format!("{scheme}://{host}"),
        };
        let url = Url::parse(&authority).map_err(|e| WorkerError::Connect(e.to_string()))?;
        self.base_url = Some(url);
        self.options = options;
        Ok(())
    }

    fn list(&mut self, path: &str) -> Result<ListOutcome, WorkerError> {
        let base = self.base()?;
        let dir_path = if path.ends_with('/') {
            path.to_string()
        } else {
            format!("{path}/")
        };
        let url = base
            .join(&dir_path)
            .map_err(|e| WorkerError::ReadRemote(e.to_string()))?;
        let response = self
            .agent
            .get(url.as_str())
            .call()
            .map_err(|e| WorkerError::ReadRemote(e.to_string()))?;
        let body = response
            .into_string()
            .map_err(|e| WorkerError::ReadRemote(e.to_string()))?;
        let entries = Self::scrape_hrefs(&body)
            .into_iter()
            .map(|name| ListingEntry {
                name,
                size: None,
                mtime: None,
                extra: None,
            })
            .collect();
        Ok(ListOutcome::Entries(entries))
    }

    fn get(&mut self, path: &str, name: &str, offset: u64) -> Result<GetOutcome, WorkerError> {
        let url = self.resolve(path, name)?;
        let mut request = self.agent.get(url.as_str());
        if offset > 0 {
            request = request.set("Range", &format!("bytes={offset}-"));
        }
        let response = match request.call() {
            Ok(r) => r,
            Err(ureq::Error::Status(code, _response)) => {
                return Ok(GetOutcome::Terminal { code: u32::from(code) })
            }
            Err(e) => return Err(WorkerError::ReadRemote(e.to_string())),
        };
        let chunked = response
            .header("transfer-encoding")
            .is_some_and(|v| v.eq_ignore_ascii_case("chunked"));
        let content_length = response.header("content-length").and_then(|v| v.parse::<u64>().ok());
        self.read_body = Some(response.into_reader());
        Ok(match (chunked, content_length) {
            (true, _) => GetOutcome::Chunked,
            (false, Some(0)) => GetOutcome::NothingToFetch,
            (false, Some(expected_size)) => GetOutcome::Success { expected_size },
            (false, None) => GetOutcome::Chunked,
        })
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, WorkerError> {
        let body = self
            .read_body
            .as_mut()
            .ok_or_else(|| WorkerError::ReadRemote("no active get()".into()))?;
        body.read(buf).map_err(|e| WorkerError::ReadRemote(e.to_string()))
    }

    fn put(
        &mut self,
        path: &str,
        name: &str,
        _size: u64,
        _first_in_session: bool,
    ) -> Result<(), WorkerError> {
        let url = self.resolve(path, name)?;
        self.pending_put = Some((url, Vec::new()));
        Ok(())
    }

    fn write(&mut self, buf: &[u8]) -> Result<(), WorkerError> {
        let (_, body) = self
            .pending_put
            .as_mut()
            .ok_or_else(|| WorkerError::WriteRemote(std::io::Error::other("no active put()")))?;
        body.extend_from_slice(buf);
        Ok(())
    }

    fn put_response(&mut self) -> Result<PutResponse, WorkerError> {
        let (url, body) = self
            .pending_put
            .take()
            .ok_or_else(|| WorkerError::WriteRemote(std::io::Error::other("no active put()")))?;
        let mut request = self.agent.put(url.as_str());
        if self.options.has(ProtocolOptions::NO_EXPECT) {
            request = request.set("Expect", "");
        }
        let response = request
            .send_bytes(&body)
            .map_err(|e| WorkerError::WriteRemote(std::io::Error::other(e.to_string())))?;
        if response.status() == 205 {
            Ok(PutResponse::ConnectionReopened)
        } else {
            Ok(PutResponse::Accepted)
        }
    }

    fn delete(&mut self, path: &str, name: &str) -> Result<(), WorkerError> {
        let url = self.resolve(path, name)?;
        self.agent
            .delete(url.as_str())
            .call()
            .map_err(|e| WorkerError::DeleteRemote(e.to_string()))?;
        Ok(())
    }

    fn noop(&mut self) -> Result<(), WorkerError> {
        let base = self.base()?.clone();
        self.agent
            .head(base.as_str())
            .call()
            .map_err(|e| WorkerError::Noop(e.to_string()))?;
        Ok(())
    }

    fn quit(&mut self) {
        self.read_body = None;
        self.pending_put = None;
        self.base_url = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrapes_plain_relative_hrefs_only() {
        let body = r#"<a href="a.dat">a.dat</a><a href="../">up</a><a href="/abs">abs</a><a href="sub/">sub</a>"#;
        let names = HttpTransport::scrape_hrefs(body);
        assert_eq!(names, vec!["a.dat".to_string(), "sub".to_string()]);
    }

    #[test]
    fn connect_picks_https_for_tls_strict() {
        let mut transport = HttpTransport::new();
        transport
            .connect(
                "example.invalid",
                None,
                &Credentials::default(),
                ProtocolOptions::TLS_STRICT,
            )
            .unwrap();
        assert_eq!(transport.base_url.as_ref().unwrap().scheme(), "https");
    }

    #[test]
    fn resolve_joins_path_and_name_under_base() {
        let mut transport = HttpTransport::new();
        transport
            .connect("example.invalid", Some(8080), &Credentials::default(), ProtocolOptions::empty())
            .unwrap();
        let url = transport.resolve("/incoming", "a.dat").unwrap();
        assert_eq!(url.as_str(), "http://example.invalid:8080/incoming/a.dat");
    }
}
