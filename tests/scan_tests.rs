// End-to-end scans over the plain HTTP backend against mock servers.

use fireprobe::{
    HttpConfig, HttpFetcher, OutcomeKind, ScanOptions, Scanner, SignatureInspector, Verdict,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

const FIREBASE_CONFIG_JS: &str = r#"
    const firebaseConfig = {
        apiKey: "AIzaSyExample",
        authDomain: "demo.firebaseapp.com",
        databaseURL: "https://demo-default-rtdb.firebaseio.com",
        projectId: "demo"
    };
    firebase.initializeApp(firebaseConfig);
"#;

fn host_of(server: &MockServer) -> String {
    server.address().to_string()
}

fn html_page(scripts: &[&str]) -> String {
    let tags: String = scripts
        .iter()
        .map(|src| format!(r#"<script src="{}"></script>"#, src))
        .collect();
    format!("<html><head>{}<script>var inline = 'firebase databaseURL';</script></head><body></body></html>", tags)
}

async fn mount_html(server: &MockServer, status: u16, body: String) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(status)
                .insert_header("content-type", "text/html")
                .set_body_string(body),
        )
        .mount(server)
        .await;
}

async fn mount_script(server: &MockServer, script_path: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(script_path))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/javascript")
                .set_body_string(body),
        )
        .mount(server)
        .await;
}

fn scanner() -> Scanner<HttpFetcher> {
    let fetcher = Arc::new(HttpFetcher::new(&HttpConfig::default()).unwrap());
    Scanner::new(fetcher, SignatureInspector::firebase().unwrap())
}

fn options(max_concurrency: usize) -> ScanOptions {
    ScanOptions {
        max_concurrency,
        request_timeout: Duration::from_millis(500),
        resource_concurrency: 2,
    }
}

#[tokio::test]
async fn test_mixed_hosts_classified_in_input_order() {
    let exposed = MockServer::start().await;
    mount_html(&exposed, 200, html_page(&["/static/vendor.js", "/static/config.js", "/missing.js"])).await;
    mount_script(&exposed, "/static/vendor.js", "import 'firebase/app';").await;
    mount_script(&exposed, "/static/config.js", FIREBASE_CONFIG_JS).await;

    let clean = MockServer::start().await;
    mount_html(&clean, 200, html_page(&["/app.js"])).await;
    mount_script(&clean, "/app.js", "console.log('hello')").await;

    let broken = MockServer::start().await;
    mount_html(&broken, 500, html_page(&[])).await;

    let slow = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&slow)
        .await;

    let hosts = vec![host_of(&exposed), host_of(&clean), host_of(&broken), host_of(&slow)];
    let result = scanner().scan(&hosts, &options(2), |_| {}).await.unwrap();

    assert_eq!(result.len(), 4);
    for (outcome, host) in result.outcomes.iter().zip(&hosts) {
        assert_eq!(&outcome.hostname, host);
    }

    assert_eq!(
        result.outcomes[0].verdict,
        Verdict::Signature {
            resources: vec![format!("http://{}/static/config.js", hosts[0])]
        }
    );
    assert_eq!(result.outcomes[1].kind(), OutcomeKind::NoSignature);
    assert_eq!(
        result.outcomes[2].verdict,
        Verdict::Unreachable {
            reason: "HTTP 500".to_string()
        }
    );
    assert_eq!(result.outcomes[3].kind(), OutcomeKind::Unreachable);
}

#[tokio::test]
async fn test_page_without_scripts_has_no_signature() {
    let server = MockServer::start().await;
    mount_html(&server, 200, "<html><body>static</body></html>".to_string()).await;

    let hosts = vec![host_of(&server)];
    let result = scanner().scan(&hosts, &options(1), |_| {}).await.unwrap();

    assert_eq!(result.outcomes[0].kind(), OutcomeKind::NoSignature);
}

#[tokio::test]
async fn test_progress_counts_every_host() {
    let server = MockServer::start().await;
    mount_html(&server, 200, html_page(&["/c.js"])).await;
    mount_script(&server, "/c.js", FIREBASE_CONFIG_JS).await;

    let host = host_of(&server);
    let hosts = vec![host.clone(), host.clone(), host];
    let progress = AtomicUsize::new(0);

    let result = scanner()
        .scan(&hosts, &options(3), |n| {
            progress.fetch_max(n, Ordering::SeqCst);
        })
        .await
        .unwrap();

    assert_eq!(progress.load(Ordering::SeqCst), 3);
    assert_eq!(result.hits().count(), 3);
}

#[tokio::test]
async fn test_slow_script_skipped_fast_match_reported() {
    let server = MockServer::start().await;
    mount_html(&server, 200, html_page(&["/bundle.js", "/config.js"])).await;
    Mock::given(method("GET"))
        .and(path("/bundle.js"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(FIREBASE_CONFIG_JS)
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;
    mount_script(&server, "/config.js", FIREBASE_CONFIG_JS).await;

    let host = host_of(&server);
    let hosts = vec![host.clone(), host.clone()];
    let result = scanner().scan(&hosts, &options(2), |_| {}).await.unwrap();

    for outcome in &result.outcomes {
        assert_eq!(
            outcome.verdict,
            Verdict::Signature {
                resources: vec![format!("http://{}/config.js", host)]
            }
        );
    }
}
