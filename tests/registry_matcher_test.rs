use std::io::Write;

use revize_backend::config::{MatchStrategy, RegistryConfig, RegistryMode};
use revize_backend::registry::{MatchStatus, NotFoundReason, RegistryMatch, RegistryMatcher};
use tempfile::NamedTempFile;

const LISTING: &str = r#"<!DOCTYPE html>
<html>
<head>
  <title>Revizní technici</title>
  <script>var hidden = "Jan Novák 999999/E1A";</script>
</head>
<body>
  <h1>Seznam revizních techniků</h1>
  <table class="list">
    <tr><th>Jméno</th><th>Osvědčení</th><th>Oprávnění</th><th>Platnost</th><th>Rozsah</th></tr>
    <tr>
      <td>Ing. Petra Svobodová</td><td>4521/E2A</td><td>Oprávnění č. 77/2019</td>
      <td>Platnost do: 30. 6. 2026</td><td>E2A</td>
    </tr>
    <tr>
      <td>Jan Novák</td><td>123456/E1A,E2B</td><td>Oprávnění 4411/2020</td>
      <td>Platnost do: 31.12.2027</td><td>E1A, E2B</td>
    </tr>
  </table>
</body>
</html>"#;

fn snapshot_matcher(strategy: MatchStrategy) -> (RegistryMatcher, NamedTempFile) {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(LISTING.as_bytes()).unwrap();

    let config = RegistryConfig {
        mode: RegistryMode::Snapshot,
        snapshot_path: Some(file.path().to_path_buf()),
        strategy,
        ..RegistryConfig::default()
    };
    (RegistryMatcher::from_config(&config).unwrap(), file)
}

#[tokio::test]
async fn full_text_lookup_against_saved_listing() {
    let (matcher, _file) = snapshot_matcher(MatchStrategy::FullText);

    let outcome = matcher.verify("Jan Novák", "123456/E1A,E2B").await;
    let RegistryMatch::Verified(holder) = outcome else {
        panic!("expected a verified holder, got {:?}", outcome);
    };
    assert_eq!(holder.scope, vec!["E1A".to_string(), "E2B".to_string()]);
    assert_eq!(holder.valid_until.as_deref(), Some("31.12.2027"));
    assert_eq!(holder.matched.first_name.as_deref(), Some("Jan"));
    assert_eq!(holder.matched.last_name.as_deref(), Some("Novák"));
    assert_eq!(holder.snapshot.source, "ticr-snapshot");
    assert!(holder.snapshot.payload_sha256.is_some());
}

#[tokio::test]
async fn table_lookup_against_saved_listing() {
    let (matcher, _file) = snapshot_matcher(MatchStrategy::Table);

    let outcome = matcher.verify("Jan Novák", "123456/E1A,E2B").await;
    assert_eq!(outcome.status(), MatchStatus::Verified);
    assert_eq!(outcome.scope().to_vec(), vec!["E1A".to_string(), "E2B".to_string()]);
    assert_eq!(
        outcome.matched().and_then(|m| m.authorization_number.as_deref()),
        Some("Oprávnění 4411/2020")
    );
}

#[tokio::test]
async fn script_content_is_not_searched() {
    let (matcher, _file) = snapshot_matcher(MatchStrategy::FullText);

    let outcome = matcher.verify("Jan Novák", "999999/E1A").await;
    assert!(matches!(
        outcome,
        RegistryMatch::NotFound {
            reason: NotFoundReason::NoMatch,
            ..
        }
    ));
}

#[tokio::test]
async fn malformed_input_is_rejected_before_lookup() {
    let (matcher, _file) = snapshot_matcher(MatchStrategy::FullText);

    let outcome = matcher.verify("Novák", "123456/E1A").await;
    assert!(matches!(
        outcome,
        RegistryMatch::NotFound {
            reason: NotFoundReason::InvalidName,
            ..
        }
    ));

    let outcome = matcher.verify("Jan Novák", "nope").await;
    assert!(matches!(
        outcome,
        RegistryMatch::NotFound {
            reason: NotFoundReason::InvalidCertificate,
            ..
        }
    ));
}

#[tokio::test]
async fn missing_snapshot_reports_an_error() {
    let config = RegistryConfig {
        mode: RegistryMode::Snapshot,
        snapshot_path: Some("/nonexistent/revize/rt.html".into()),
        ..RegistryConfig::default()
    };
    let matcher = RegistryMatcher::from_config(&config).unwrap();

    let outcome = matcher.verify("Jan Novák", "123456/E1A").await;
    assert_eq!(outcome.status(), MatchStatus::Error);
    assert_eq!(outcome.snapshot().source, "ticr-snapshot");
}

#[tokio::test]
async fn live_registry_outage_reports_an_error() {
    use axum::{http::StatusCode, routing::get, Router};

    let app = Router::new().route(
        "/rt.html",
        get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "údržba") }),
    );
    let server = axum::Server::bind(&([127, 0, 0, 1], 0).into()).serve(app.into_make_service());
    let url = format!("http://{}/rt.html", server.local_addr());
    tokio::spawn(server);

    let config = RegistryConfig {
        url,
        mode: RegistryMode::Live,
        ..RegistryConfig::default()
    };
    let matcher = RegistryMatcher::from_config(&config).unwrap();

    let outcome = matcher.verify("Jan Novák", "123456/E1A").await;
    let RegistryMatch::Error { detail, snapshot } = outcome else {
        panic!("expected an error outcome, got {:?}", outcome);
    };
    assert!(detail.contains("503"));
    assert_eq!(snapshot.source, "ticr-live");
}
