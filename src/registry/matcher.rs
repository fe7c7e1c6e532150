use std::sync::Arc;
use std::time::Instant;

use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use super::outcome::{MatchedHolder, NotFoundReason, RegistryMatch, Snapshot, VerifiedHolder};
use super::query::RegistryQuery;
use super::{table, text_search, ListingMatch};
use crate::app::ports::HttpClientPort;
use crate::common::error::Result;
use crate::config::{MatchStrategy, RegistryConfig};
use crate::infra;
use crate::observability::metrics as obs;

/// Verifies technicians against the registry listing.
///
/// One GET per lookup, no retries. Expected failures (bad input, no match,
/// transport trouble) come back as a [`RegistryMatch`] status, never as `Err`.
#[derive(Clone)]
pub struct RegistryMatcher {
    http: Arc<dyn HttpClientPort>,
    url: String,
    strategy: MatchStrategy,
}

impl RegistryMatcher {
    pub fn new(http: Arc<dyn HttpClientPort>, url: impl Into<String>, strategy: MatchStrategy) -> Self {
        Self {
            http,
            url: url.into(),
            strategy,
        }
    }

    pub fn from_config(config: &RegistryConfig) -> Result<Self> {
        let http = infra::registry_http(config)?;
        Ok(Self::new(http, config.url.clone(), config.strategy))
    }

    pub fn with_strategy(mut self, strategy: MatchStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn strategy(&self) -> MatchStrategy {
        self.strategy
    }

    #[instrument(skip(self))]
    pub async fn verify(&self, full_name: &str, certificate_number: &str) -> RegistryMatch {
        let outcome = self.lookup(full_name, certificate_number).await;
        let status = outcome.status();
        obs::registry::verification_recorded(status.as_str());
        info!(%status, "Registry lookup finished");
        outcome
    }

    async fn lookup(&self, full_name: &str, certificate_number: &str) -> RegistryMatch {
        let source = self.http.source_name();

        let query = match RegistryQuery::parse(full_name, certificate_number) {
            Ok(query) => query,
            Err(rejection) => {
                debug!(?rejection, "Query rejected before fetch");
                return RegistryMatch::not_found(rejection.into(), Snapshot::now(source));
            }
        };

        let started = Instant::now();
        let fetched = self.http.get(&self.url).await;
        obs::registry::fetch_duration(source, started.elapsed().as_secs_f64());

        let page = match fetched {
            Ok(page) => page,
            Err(e) => {
                warn!(url = %self.url, error = %e, "Registry fetch failed");
                return RegistryMatch::error(e.to_string(), Snapshot::now(source));
            }
        };
        obs::registry::payload_bytes(page.bytes.len());

        let snapshot =
            Snapshot::now(source).with_payload_sha256(hex::encode(Sha256::digest(&page.bytes)));
        let html = page.text();

        let found = match self.strategy {
            MatchStrategy::FullText => text_search::search(&html, &query),
            MatchStrategy::Table => table::search(&html, &query),
        };

        match found {
            Some(listing) => RegistryMatch::Verified(verified(listing, snapshot)),
            None => RegistryMatch::not_found(NotFoundReason::NoMatch, snapshot),
        }
    }
}

fn verified(listing: ListingMatch, snapshot: Snapshot) -> VerifiedHolder {
    let ListingMatch {
        full_name,
        certificate_number,
        authorization_number,
        scopes,
        valid_until,
    } = listing;
    VerifiedHolder {
        register_id: None,
        scope: scopes.clone(),
        valid_until,
        matched: MatchedHolder::new(full_name, certificate_number, authorization_number, scopes),
        snapshot,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::app::ports::HttpGetResult;
    use crate::common::error::FetchError;
    use crate::registry::MatchStatus;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves a fixed response and counts requests.
    pub(crate) struct CountingHttp {
        response: std::result::Result<String, FetchError>,
        calls: AtomicUsize,
    }

    impl CountingHttp {
        pub(crate) fn page(html: &str) -> Arc<Self> {
            Arc::new(Self {
                response: Ok(html.to_string()),
                calls: AtomicUsize::new(0),
            })
        }

        pub(crate) fn failing(err: FetchError) -> Arc<Self> {
            Arc::new(Self {
                response: Err(err),
                calls: AtomicUsize::new(0),
            })
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl HttpClientPort for CountingHttp {
        fn source_name(&self) -> &'static str {
            "ticr-test"
        }

        async fn get(&self, _url: &str) -> std::result::Result<HttpGetResult, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.response.clone().map(HttpGetResult::html)
        }
    }

    pub(crate) const LISTING: &str = r#"<html><body>
<table>
  <tr><th>Jméno</th><th>Osvědčení</th><th>Oprávnění</th><th>Platnost</th></tr>
  <tr><td>Jan Novák</td><td>123456/E1A,E2B</td><td>Oprávnění 4411/2020</td><td>Platnost do: 31.12.2027</td></tr>
</table>
</body></html>"#;

    fn matcher(http: Arc<CountingHttp>) -> RegistryMatcher {
        RegistryMatcher::new(http, "https://registry.test/rt.html", MatchStrategy::FullText)
    }

    #[tokio::test]
    async fn invalid_name_never_reaches_the_network() {
        let http = CountingHttp::page(LISTING);
        let outcome = matcher(http.clone()).verify("Novák", "123456/E1A").await;
        assert_eq!(
            outcome,
            RegistryMatch::NotFound {
                reason: NotFoundReason::InvalidName,
                snapshot: outcome.snapshot().clone(),
            }
        );
        assert_eq!(http.calls(), 0);
    }

    #[tokio::test]
    async fn invalid_certificate_never_reaches_the_network() {
        let http = CountingHttp::page(LISTING);
        let outcome = matcher(http.clone()).verify("Jan Novák", "E1A").await;
        assert!(matches!(
            outcome,
            RegistryMatch::NotFound {
                reason: NotFoundReason::InvalidCertificate,
                ..
            }
        ));
        assert_eq!(http.calls(), 0);
    }

    #[tokio::test]
    async fn certificate_on_page_verifies() {
        let http = CountingHttp::page(LISTING);
        let outcome = matcher(http.clone()).verify("Jan Novák", "123456/E1A,E2B").await;

        assert_eq!(http.calls(), 1);
        assert_eq!(outcome.status(), MatchStatus::Verified);
        let holder = outcome.matched().unwrap();
        assert_eq!(holder.certificate_number, "123456/E1A,E2B");
        assert_eq!(holder.full_name, "Jan Novák");
        assert_eq!(outcome.scope(), ["E1A", "E2B"]);
        assert_eq!(outcome.valid_until(), Some("31.12.2027"));
        assert_eq!(outcome.register_id(), None);

        let snapshot = outcome.snapshot();
        assert_eq!(snapshot.source, "ticr-test");
        assert_eq!(snapshot.payload_sha256.as_deref().map(str::len), Some(64));
    }

    #[tokio::test]
    async fn certificate_absent_is_not_found() {
        let http = CountingHttp::page(LISTING);
        let outcome = matcher(http).verify("Jan Novák", "654321/E1A").await;
        assert!(matches!(
            outcome,
            RegistryMatch::NotFound {
                reason: NotFoundReason::NoMatch,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn timeout_is_an_error_status() {
        let http = CountingHttp::failing(FetchError::Timeout);
        let outcome = matcher(http.clone()).verify("Jan Novák", "123456/E1A").await;
        assert_eq!(outcome.status(), MatchStatus::Error);
        assert_eq!(http.calls(), 1);
        match outcome {
            RegistryMatch::Error { detail, .. } => assert!(detail.contains("timed out")),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn http_status_failure_is_an_error_status() {
        let http = CountingHttp::failing(FetchError::Status(503));
        let outcome = matcher(http).verify("Jan Novák", "123456/E1A").await;
        assert_eq!(outcome.status(), MatchStatus::Error);
    }

    #[tokio::test]
    async fn table_strategy_requires_matching_name() {
        let http = CountingHttp::page(LISTING);
        let table = matcher(http.clone()).with_strategy(MatchStrategy::Table);

        let outcome = table.verify("Jan Novák", "123456/E1A,E2B").await;
        assert!(outcome.is_verified());

        // Full-text would accept this; the row-based lookup does not.
        let outcome = table.verify("Karel Novák", "123456/E1A,E2B").await;
        assert_eq!(outcome.status(), MatchStatus::NotFound);
        assert_eq!(http.calls(), 2);
    }

    #[tokio::test]
    async fn unnamed_listing_entry_does_not_echo_the_query() {
        let http = CountingHttp::page("<p>osvědčení 4321/E1 platí do 2027-05-01</p>");
        let outcome = matcher(http).verify("Eva Malá", "4321/E1").await;

        let matched = outcome.matched().expect("verified holder");
        assert_eq!(matched.full_name, "");
        assert_eq!(matched.first_name, None);
        assert_eq!(matched.last_name, None);
    }
}
