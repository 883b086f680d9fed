//! Integration tests for gembridge

mod fixtures {
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;
    use sha2::{Digest, Sha256};
    use std::net::SocketAddr;
    use std::path::PathBuf;
    use tempfile::TempDir;
    use tokio::net::TcpListener;

    pub const GEM: &[u8] = b"not really a tarball, but bytes all the same";

    /// Compact index for `rake` whose 13.0.6 checksum matches `GEM`
    pub fn rake_info() -> String {
        let sum = hex::encode(Sha256::digest(GEM));
        format!(
            "---\n12.3.3 |checksum:00\n13.0.6 json:>= 2.0&< 3|checksum:{}\n",
            sum
        )
    }

    /// Gem repository answering for `rake` only; 429 on `/busy/*`
    pub async fn fake_upstream() -> SocketAddr {
        let info = rake_info();
        let app = Router::new()
            .route("/info/rake", get(move || async move { info }))
            .route("/gems/rake-13.0.6.gem", get(|| async { GEM }))
            .route(
                "/busy/{*rest}",
                get(|| async { StatusCode::TOO_MANY_REQUESTS }),
            );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    /// Temp dir with a config file pointing the cache inside it
    pub struct Workspace {
        pub temp: TempDir,
        pub config: PathBuf,
    }

    impl Workspace {
        pub fn new() -> Self {
            let temp = TempDir::new().unwrap();
            let config = temp.path().join("config.toml");
            let cache = temp.path().join("cache");
            std::fs::write(
                &config,
                format!(
                    "[cache]\nroot = {:?}\n\n[retry]\nattempts = 2\ndelay_ms = 10\n",
                    cache.display().to_string()
                ),
            )
            .unwrap();
            Self { temp, config }
        }

        pub fn cache_root(&self) -> PathBuf {
            self.temp.path().join("cache")
        }
    }

    /// Blocking GET on the blocking pool: (status, body)
    pub async fn http_get(url: String) -> (u16, Vec<u8>) {
        tokio::task::spawn_blocking(move || {
            use std::io::Read;

            let agent: ureq::Agent = ureq::Agent::config_builder()
                .http_status_as_error(false)
                .build()
                .into();
            let response = agent.get(&url).call().unwrap();
            let status = response.status().as_u16();
            let mut body = Vec::new();
            response
                .into_body()
                .into_reader()
                .read_to_end(&mut body)
                .unwrap();
            (status, body)
        })
        .await
        .unwrap()
    }
}

mod cli_tests {
    use super::fixtures::{fake_upstream, Workspace, GEM};
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;

    fn gembridge(workspace: &Workspace) -> Command {
        let mut cmd = cargo_bin_cmd!("gembridge");
        cmd.env_remove("GEMBRIDGE_CONFIG")
            .arg("--config")
            .arg(&workspace.config);
        cmd
    }

    #[test]
    fn help_displays() {
        cargo_bin_cmd!("gembridge")
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("caching translation gateway"));
    }

    #[test]
    fn version_displays() {
        cargo_bin_cmd!("gembridge")
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("gembridge"));
    }

    #[test]
    fn config_path_honors_flag() {
        let workspace = Workspace::new();
        gembridge(&workspace)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show_merges_defaults() {
        let workspace = Workspace::new();
        gembridge(&workspace)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[retry]"))
            .stdout(predicate::str::contains("attempts = 2"))
            .stdout(predicate::str::contains("group = \"rubygems\""));
    }

    #[test]
    fn cache_path_and_empty_list() {
        let workspace = Workspace::new();
        gembridge(&workspace)
            .args(["cache", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains(
                workspace.cache_root().display().to_string(),
            ));

        gembridge(&workspace)
            .args(["cache", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No cached upstreams"));
    }

    #[test]
    fn fetch_malformed_locator_shows_hint() {
        let workspace = Workspace::new();
        gembridge(&workspace)
            .args(["fetch", "https://rubygems.org/gems/rake-13.0.6.gem"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Malformed locator"))
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn fetch_requires_locator() {
        cargo_bin_cmd!("gembridge").arg("fetch").assert().failure();
    }

    #[test]
    fn ping_offline_answers_pong() {
        let workspace = Workspace::new();
        gembridge(&workspace)
            .args(["--offline", "ping", "--upstream", "https://rubygems.org"])
            .assert()
            .success()
            .stdout(predicate::str::contains("pong"));
    }

    #[test]
    fn mux_without_repositories_fails() {
        let workspace = Workspace::new();
        gembridge(&workspace)
            .arg("mux")
            .assert()
            .failure()
            .stderr(predicate::str::contains("No repositories"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn fetch_then_list_then_clear() {
        let addr = fake_upstream().await;
        let workspace = Workspace::new();
        let out = workspace.temp.path().join("out");
        let locator = format!(
            "mavengem:http://{}/maven/releases/rubygems/rake/13.0.6/rake-13.0.6.gem",
            addr
        );

        let mut fetch = gembridge(&workspace);
        fetch.args(["fetch", &locator, "--output"]).arg(&out);
        tokio::task::spawn_blocking(move || {
            fetch.assert().success();
        })
        .await
        .unwrap();
        assert_eq!(std::fs::read(out.join("rake-13.0.6.gem")).unwrap(), GEM);

        let mut list = gembridge(&workspace);
        list.args(["cache", "list", "--format", "plain"]);
        tokio::task::spawn_blocking(move || {
            list.assert()
                .success()
                .stdout(predicate::str::contains("facade/http___127_0_0_1_"));
        })
        .await
        .unwrap();

        gembridge(&workspace)
            .args(["cache", "clear", "--yes"])
            .assert()
            .success();
        assert!(!workspace.cache_root().exists());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn fetch_gives_up_on_busy_upstream() {
        let addr = fake_upstream().await;
        let workspace = Workspace::new();
        let locator = format!("mavengem:http://{}/busy/maven/releases/ping", addr);

        let mut fetch = gembridge(&workspace);
        fetch.args(["fetch", &locator]);
        tokio::task::spawn_blocking(move || {
            fetch
                .assert()
                .success()
                .stdout(predicate::str::contains("pong"));
        })
        .await
        .unwrap();

        let locator = format!("mavengem:http://{}/busy/maven/releases/info/rake", addr);
        let mut fetch = gembridge(&workspace);
        fetch.args(["fetch", &locator]);
        tokio::task::spawn_blocking(move || {
            fetch
                .assert()
                .failure()
                .stderr(predicate::str::contains("try again later"));
        })
        .await
        .unwrap();
    }
}

mod gateway_tests {
    use super::fixtures::{fake_upstream, http_get, rake_info, GEM};
    use gembridge::config::schema::{RepositoryConfig, UpstreamConfig};
    use gembridge::descriptor::DescriptorService;
    use gembridge::registry::FacadeRegistry;
    use gembridge::server::{DescriptorProxyServer, RepositoryMultiplexer};
    use gembridge::translator::{ProtocolTranslator, RetryPolicy};
    use gembridge::upstream::UpstreamLocation;
    use gembridge::GemBridgeError;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            attempts: 3,
            delay: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn translator_derives_and_verifies_gem() {
        let addr = fake_upstream().await;
        let temp = TempDir::new().unwrap();
        let registry = Arc::new(FacadeRegistry::from_config(
            temp.path(),
            &UpstreamConfig::default(),
        ));
        let translator = ProtocolTranslator::new(registry.clone(), fast_retry());

        let locator = format!(
            "mavengem:http://{}/maven/releases/rubygems/rake/13.0.6/rake-13.0.6.gem",
            addr
        );
        let payload = translator.open(&locator).unwrap().input_stream().await.unwrap();
        assert_eq!(payload.size, GEM.len() as u64);
        assert_eq!(payload.into_bytes().await.unwrap(), GEM);

        let location = UpstreamLocation::parse(&format!("http://{}", addr)).unwrap();
        let cache = registry.cache_dir_for(&location);
        assert!(cache.join("gems/rake-13.0.6.gem").exists());
        assert!(cache.join("info/rake").exists());

        let missing = format!(
            "mavengem:http://{}/maven/releases/rubygems/rake/99.0/rake-99.0.gem",
            addr
        );
        let err = translator
            .open(&missing)
            .unwrap()
            .input_stream()
            .await
            .unwrap_err();
        assert!(matches!(err, GemBridgeError::NotFound(_)), "{}", err);
    }

    #[tokio::test]
    async fn translator_reports_exhausted_retries() {
        let addr = fake_upstream().await;
        let temp = TempDir::new().unwrap();
        let registry = Arc::new(FacadeRegistry::from_config(
            temp.path(),
            &UpstreamConfig::default(),
        ));
        let translator = ProtocolTranslator::new(registry, fast_retry());

        let locator = format!("mavengem:http://{}/busy/maven/releases/info/rake", addr);
        let err = translator
            .open(&locator)
            .unwrap()
            .input_stream()
            .await
            .unwrap_err();
        assert!(
            matches!(err, GemBridgeError::Unavailable { attempts: 3, .. }),
            "{}",
            err
        );
    }

    #[tokio::test]
    async fn descriptor_proxy_over_http_upstream() {
        let addr = fake_upstream().await;
        let temp = TempDir::new().unwrap();
        let registry = FacadeRegistry::from_config(temp.path(), &UpstreamConfig::default());
        let location = UpstreamLocation::parse(&format!("http://{}", addr)).unwrap();
        let handle = registry.get_or_create(&location).unwrap();
        let service = DescriptorService::new(handle, "rubygems", false);

        let mut server = DescriptorProxyServer::new(service, "127.0.0.1:0");
        server.start().await.unwrap();
        let base = server.base_url().unwrap();

        let (status, xml) = http_get(format!("{}/rubygems/rake/13.0.6/ivy.xml", base)).await;
        assert_eq!(status, 200);
        let xml = String::from_utf8(xml).unwrap();
        assert!(xml.contains(r#"<dependency org="rubygems" name="json" rev="[2.0,3)""#));

        let (status, html) = http_get(format!("{}/rubygems/rake/", base)).await;
        assert_eq!(status, 200);
        let html = String::from_utf8(html).unwrap();
        assert!(html.contains("12.3.3/") && html.contains("13.0.6/"));

        let (status, _) = http_get(format!("{}/rubygems/nothing/1.0/ivy.xml", base)).await;
        assert_eq!(status, 404);
        let (status, _) = http_get(format!("{}/rubygems/rake/13.0.6/rake.jar", base)).await;
        assert_eq!(status, 403);

        server.stop().await;
    }

    #[tokio::test]
    async fn multiplexer_serves_registered_repositories() {
        let addr = fake_upstream().await;
        let temp = TempDir::new().unwrap();
        let mut mux = RepositoryMultiplexer::new(temp.path(), UpstreamConfig::default());
        mux.start().await.unwrap();

        let url = format!("http://{}", addr);
        let base = mux
            .register(RepositoryConfig::new(url.clone()))
            .unwrap()
            .unwrap();
        assert!(base.ends_with("/caching/maven/releases"));
        assert!(mux.register(RepositoryConfig::new(url)).unwrap().is_none());

        let (status, body) = http_get(
            mux.url(&format!("{}/rubygems/rake/13.0.6/rake-13.0.6.gem", base))
                .unwrap(),
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(body, GEM);

        let (status, body) = http_get(mux.url(&format!("{}/info/rake", base)).unwrap()).await;
        assert_eq!(status, 200);
        assert_eq!(String::from_utf8(body).unwrap(), rake_info());

        // A Maven client asks for the POM and version index before the gem
        let pom_url = mux
            .url(&format!("{}/rubygems/rake/13.0.6/rake-13.0.6.pom", base))
            .unwrap();
        let (status, pom) = http_get(pom_url.clone()).await;
        assert_eq!(status, 200);
        let pom = String::from_utf8(pom).unwrap();
        assert!(pom.contains("<artifactId>json</artifactId>"));
        assert!(pom.contains("<version>[2.0,3)</version>"));
        let (status, sum) = http_get(format!("{}.sha1", pom_url)).await;
        assert_eq!(status, 200);
        assert_eq!(sum.len(), 40);

        let (status, metadata) = http_get(
            mux.url(&format!("{}/rubygems/rake/maven-metadata.xml", base))
                .unwrap(),
        )
        .await;
        assert_eq!(status, 200);
        let metadata = String::from_utf8(metadata).unwrap();
        assert!(metadata.contains("<version>12.3.3</version>"));
        assert!(metadata.contains("<release>13.0.6</release>"));

        let (status, _) = http_get(mux.url("/unknown/caching/maven/releases/ping").unwrap()).await;
        assert_eq!(status, 404);

        mux.stop().await;
    }
}
