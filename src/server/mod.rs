//! Site server: static files, form endpoints and live reload

use anyhow::Result;
use axum::{
    body::Body,
    extract::{
        ws::{Message, WebSocket},
        FromRequest, Request, State, WebSocketUpgrade,
    },
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use notify_debouncer_mini::{new_debouncer, notify::RecursiveMode};
use percent_encoding::percent_decode_str;
use serde::de::DeserializeOwned;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::forms::{
    self, ContactMessage, FormError, FormOutcome, MailerLiteClient, Mailer, NewsletterProvider,
    NewsletterSignup, ResendClient,
};
use crate::templates::TemplateRenderer;
use crate::Site;

/// Live reload script injected into HTML pages
const LIVE_RELOAD_SCRIPT: &str = r#"
<script>
(function() {
    var ws = new WebSocket('ws://' + location.host + '/__livereload');
    ws.onmessage = function(msg) {
        if (msg.data === 'reload') {
            location.reload();
        }
    };
    ws.onclose = function() {
        console.log('Live reload disconnected. Attempting to reconnect...');
        setTimeout(function() { location.reload(); }, 1000);
    };
})();
</script>
</body>
"#;

/// Server state shared by every handler
pub struct AppState {
    site: Site,
    renderer: TemplateRenderer,
    newsletter: Option<Arc<dyn NewsletterProvider>>,
    mailer: Option<Arc<dyn Mailer>>,
    reload_tx: broadcast::Sender<()>,
    live_reload: bool,
}

impl AppState {
    /// State without form providers or live reload
    pub fn new(site: &Site) -> Result<Self> {
        let (reload_tx, _) = broadcast::channel::<()>(16);
        Ok(Self {
            site: site.clone(),
            renderer: TemplateRenderer::new(&site.config)?,
            newsletter: None,
            mailer: None,
            reload_tx,
            live_reload: false,
        })
    }

    /// Build the MailerLite and Resend clients from the environment.
    ///
    /// A missing key only disables that form; its endpoint answers 503.
    pub fn with_env_providers(mut self) -> Self {
        match MailerLiteClient::from_env(&self.site.config.newsletter) {
            Ok(client) => self.newsletter = Some(Arc::new(client)),
            Err(e) => tracing::warn!("Newsletter form disabled: {}", e),
        }
        match ResendClient::from_env(&self.site.config.contact) {
            Ok(client) => self.mailer = Some(Arc::new(client)),
            Err(e) => tracing::warn!("Contact form disabled: {}", e),
        }
        self
    }

    pub fn with_newsletter(mut self, provider: Arc<dyn NewsletterProvider>) -> Self {
        self.newsletter = Some(provider);
        self
    }

    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    pub fn with_live_reload(mut self, enabled: bool) -> Self {
        self.live_reload = enabled;
        self
    }

    fn public_dir(&self) -> &Path {
        &self.site.public_dir
    }
}

/// Router with the form API, live reload socket and static file fallback
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/newsletter", post(newsletter_handler))
        .route("/api/contact", post(contact_handler))
        .route("/__livereload", get(livereload_handler))
        .fallback(fallback_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the server
pub async fn start(site: &Site, ip: &str, port: u16, watch: bool, open: bool) -> Result<()> {
    let state = AppState::new(site)?
        .with_env_providers()
        .with_live_reload(watch);
    let reload_tx = state.reload_tx.clone();
    let app = build_router(Arc::new(state));

    // Parse address - handle "localhost" specially
    let bind_ip = if ip == "localhost" { "127.0.0.1" } else { ip };
    let addr: SocketAddr = format!("{}:{}", bind_ip, port).parse()?;

    let url = format!("http://{}:{}", ip, port);
    println!("Server running at {}", url);
    if watch {
        println!("Live reload enabled. Watching for changes...");
    }
    println!("Press Ctrl+C to stop.");

    if open {
        if let Err(e) = open_browser(&url) {
            tracing::warn!("Failed to open browser: {}", e);
        }
    }

    if watch {
        let site = site.clone();
        tokio::task::spawn_blocking(move || {
            if let Err(e) = watch_and_reload(site, reload_tx) {
                tracing::error!("File watcher error: {}", e);
            }
        });
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Watch content, static files and config; regenerate and notify browsers
fn watch_and_reload(site: Site, reload_tx: broadcast::Sender<()>) -> Result<()> {
    let (tx, rx) = std::sync::mpsc::channel();

    // Create debouncer to avoid multiple rapid rebuilds
    let mut debouncer = new_debouncer(Duration::from_millis(500), tx)?;

    for dir in [&site.content_dir, &site.static_dir] {
        if dir.exists() {
            debouncer.watcher().watch(dir, RecursiveMode::Recursive)?;
            tracing::debug!("Watching: {:?}", dir);
        }
    }

    let config_path = site.config_path();
    if config_path.exists() {
        debouncer
            .watcher()
            .watch(&config_path, RecursiveMode::NonRecursive)?;
        tracing::debug!("Watching: {:?}", config_path);
    }

    loop {
        match rx.recv() {
            Ok(Ok(events)) => {
                let relevant: Vec<PathBuf> = events
                    .into_iter()
                    .map(|e| e.path)
                    .filter(|p| is_relevant_change(p))
                    .collect();

                if relevant.is_empty() {
                    continue;
                }

                for path in &relevant {
                    tracing::info!("File changed: {}", path.display());
                }

                // Reload config too, it may be what changed
                let result = Site::new(&site.base_dir).and_then(|fresh| fresh.generate());
                match result {
                    Ok(()) => {
                        tracing::info!("Regenerated successfully");
                        let _ = reload_tx.send(());
                    }
                    Err(e) => tracing::error!("Generation failed: {:#}", e),
                }
            }
            Ok(Err(e)) => {
                tracing::error!("Watch error: {:?}", e);
            }
            Err(e) => {
                tracing::error!("Channel error: {:?}", e);
                break;
            }
        }
    }

    Ok(())
}

/// Skip editor droppings and VCS metadata
fn is_relevant_change(path: &Path) -> bool {
    let path_str = path.to_string_lossy();
    !path_str.contains(".git")
        && !path_str.contains(".DS_Store")
        && !path_str.ends_with('~')
        && !path_str.ends_with(".swp")
}

async fn newsletter_handler(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let wants_json = wants_json(request.headers());
    let result = match parse_body::<NewsletterSignup>(request).await {
        Ok(signup) => forms::submit_newsletter(state.newsletter.as_deref(), signup).await,
        Err(e) => Err(e),
    };
    form_response(&state, wants_json, "/", result)
}

async fn contact_handler(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let wants_json = wants_json(request.headers());
    let result = match parse_body::<ContactMessage>(request).await {
        Ok(message) => forms::submit_contact(state.mailer.as_deref(), message).await,
        Err(e) => Err(e),
    };
    form_response(&state, wants_json, "/contact/", result)
}

/// Decode a JSON or URL-encoded form body
async fn parse_body<T>(request: Request) -> Result<T, FormError>
where
    T: DeserializeOwned + Send,
{
    let is_json = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));

    if is_json {
        match Json::<T>::from_request(request, &()).await {
            Ok(Json(value)) => Ok(value),
            Err(rejection) => {
                tracing::debug!("Rejected JSON body: {}", rejection.body_text());
                Err(FormError::malformed())
            }
        }
    } else {
        match Form::<T>::from_request(request, &()).await {
            Ok(Form(value)) => Ok(value),
            Err(rejection) => {
                tracing::debug!("Rejected form body: {}", rejection.body_text());
                Err(FormError::malformed())
            }
        }
    }
}

/// Scripts ask for JSON; plain form posts get a rendered page
fn wants_json(headers: &HeaderMap) -> bool {
    let header_has = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("application/json"))
    };
    header_has(header::ACCEPT) || header_has(header::CONTENT_TYPE)
}

fn status_for(error: &FormError) -> StatusCode {
    match error {
        FormError::Invalid { .. } => StatusCode::BAD_REQUEST,
        FormError::Rejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
        FormError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        FormError::NotConfigured(_) | FormError::Unauthorized(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        FormError::Provider { .. } | FormError::Transport(_) => StatusCode::BAD_GATEWAY,
    }
}

fn form_response(
    state: &AppState,
    wants_json: bool,
    back: &str,
    result: Result<FormOutcome, FormError>,
) -> Response {
    let (status, outcome) = match result {
        Ok(outcome) => (StatusCode::OK, outcome),
        Err(e) => (status_for(&e), FormOutcome::failed(&e)),
    };

    if wants_json {
        return (status, Json(outcome)).into_response();
    }

    let mut context = TemplateRenderer::base_context(&state.site.config, back);
    context.insert("page_title", if outcome.success { "Thank you" } else { "Sorry" });
    context.insert("outcome", &outcome);
    context.insert("back", back);
    match state.renderer.render("form_result.html", &context) {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            tracing::error!("Failed to render form result: {:#}", e);
            (status, Json(outcome)).into_response()
        }
    }
}

/// WebSocket handler for live reload
async fn livereload_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let reload_rx = state.reload_tx.subscribe();
    ws.on_upgrade(move |socket| handle_livereload_socket(socket, reload_rx))
}

/// Handle WebSocket connection for live reload
async fn handle_livereload_socket(mut socket: WebSocket, mut reload_rx: broadcast::Receiver<()>) {
    tracing::debug!("Live reload client connected");

    loop {
        tokio::select! {
            result = reload_rx.recv() => {
                match result {
                    Ok(_) => {
                        if socket.send(Message::Text("reload".to_string())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
        }
    }

    tracing::debug!("Live reload client disconnected");
}

/// Serve generated files, injecting the live reload script into HTML
async fn fallback_handler(State(state): State<Arc<AppState>>, request: Request<Body>) -> Response {
    let Some(file_path) = resolve_path(state.public_dir(), request.uri().path()) else {
        return not_found(&state).await;
    };

    let is_html = file_path
        .extension()
        .is_some_and(|ext| ext == "html" || ext == "htm");

    if is_html && state.live_reload {
        match tokio::fs::read_to_string(&file_path).await {
            Ok(content) => Html(inject_live_reload(&content)).into_response(),
            Err(_) => not_found(&state).await,
        }
    } else {
        let mut service = ServeDir::new(state.public_dir()).append_index_html_on_directories(true);
        match service.try_call(request).await {
            Ok(response) => response.into_response(),
            Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response(),
        }
    }
}

/// Map a request path to an existing file under the public directory
fn resolve_path(public_dir: &Path, path: &str) -> Option<PathBuf> {
    let decoded = percent_decode_str(path).decode_utf8().ok()?;
    let clean_path = decoded.trim_start_matches('/');
    if clean_path
        .split(['/', '\\'])
        .any(|segment| segment == "..")
    {
        return None;
    }

    let candidate = public_dir.join(clean_path);
    if candidate.is_dir() {
        let index = candidate.join("index.html");
        return index.is_file().then_some(index);
    }
    if candidate.is_file() {
        return Some(candidate);
    }

    // Try adding .html extension
    let with_html = public_dir.join(format!("{}.html", clean_path.trim_end_matches('/')));
    with_html.is_file().then_some(with_html)
}

/// The generated 404 page, or plain text when the site has none
async fn not_found(state: &AppState) -> Response {
    match tokio::fs::read_to_string(state.public_dir().join("404.html")).await {
        Ok(content) => {
            let html = if state.live_reload {
                inject_live_reload(&content)
            } else {
                content
            };
            (StatusCode::NOT_FOUND, Html(html)).into_response()
        }
        Err(_) => (StatusCode::NOT_FOUND, "Not found").into_response(),
    }
}

/// Inject live reload script into HTML content
fn inject_live_reload(html: &str) -> String {
    if html.contains("</body>") {
        html.replace("</body>", LIVE_RELOAD_SCRIPT)
    } else {
        // If no </body> tag, append to end
        format!("{}{}", html, LIVE_RELOAD_SCRIPT)
    }
}

/// Open a URL in the default browser
fn open_browser(url: &str) -> Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg(url).spawn()?;
    }

    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open").arg(url).spawn()?;
    }

    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/c", "start", url])
            .spawn()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use crate::forms::fakes::FakeProvider;
    use axum::http::Request;
    use serde_json::Value;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn test_site(tmp: &TempDir) -> Site {
        let site = Site::with_config(tmp.path(), SiteConfig::default());
        site.generate().unwrap();
        site
    }

    fn router(site: &Site, newsletter: FakeProvider, mailer: FakeProvider) -> Router {
        let state = AppState::new(site)
            .unwrap()
            .with_newsletter(Arc::new(newsletter))
            .with_mailer(Arc::new(mailer));
        build_router(Arc::new(state))
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn text_body(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_newsletter_success() {
        let tmp = TempDir::new().unwrap();
        let site = test_site(&tmp);
        let provider = Arc::new(FakeProvider::ok());
        let state = AppState::new(&site)
            .unwrap()
            .with_newsletter(provider.clone());
        let app = build_router(Arc::new(state));

        let response = app
            .oneshot(post_json(
                "/api/newsletter",
                serde_json::json!({"email": "reader@example.org", "name": "Ada"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(provider.calls(), vec!["reader@example.org"]);
    }

    #[tokio::test]
    async fn test_newsletter_validation_error() {
        let tmp = TempDir::new().unwrap();
        let site = test_site(&tmp);
        let app = router(&site, FakeProvider::ok(), FakeProvider::ok());

        let response = app
            .oneshot(post_json(
                "/api/newsletter",
                serde_json::json!({"email": "not-an-email"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Please enter a valid email address.");
    }

    #[tokio::test]
    async fn test_provider_errors_map_to_status() {
        let tmp = TempDir::new().unwrap();
        let site = test_site(&tmp);

        let cases: [(fn() -> FormError, StatusCode); 4] = [
            (
                || FormError::Rejected("invalid".to_string()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (|| FormError::RateLimited, StatusCode::TOO_MANY_REQUESTS),
            (
                || FormError::Unauthorized(401),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                || FormError::Provider {
                    status: 500,
                    body: String::new(),
                },
                StatusCode::BAD_GATEWAY,
            ),
        ];

        for (error, expected) in cases {
            let app = router(&site, FakeProvider::failing(error), FakeProvider::ok());
            let response = app
                .oneshot(post_json(
                    "/api/newsletter",
                    serde_json::json!({"email": "reader@example.org"}),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), expected);
        }
    }

    #[tokio::test]
    async fn test_missing_provider_is_service_unavailable() {
        let tmp = TempDir::new().unwrap();
        let site = test_site(&tmp);
        let app = build_router(Arc::new(AppState::new(&site).unwrap()));

        let response = app
            .oneshot(post_json(
                "/api/contact",
                serde_json::json!({
                    "name": "Ada",
                    "email": "ada@example.org",
                    "message": "Hello, is the workshop open?"
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = json_body(response).await;
        assert!(body["message"]
            .as_str()
            .unwrap()
            .contains("temporarily unavailable"));
    }

    #[tokio::test]
    async fn test_contact_form_post_renders_page() {
        let tmp = TempDir::new().unwrap();
        let site = test_site(&tmp);
        let mailer = Arc::new(FakeProvider::ok());
        let state = AppState::new(&site).unwrap().with_mailer(mailer.clone());
        let app = build_router(Arc::new(state));

        let request = Request::builder()
            .method("POST")
            .uri("/api/contact")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(
                "name=Ada&email=ada%40example.org&subject=&message=Hello+from+the+museum&website=",
            ))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let html = text_body(response).await;
        assert!(html.contains("Thank you"));
        assert_eq!(mailer.calls(), vec!["ada@example.org"]);
    }

    #[tokio::test]
    async fn test_honeypot_is_accepted_silently() {
        let tmp = TempDir::new().unwrap();
        let site = test_site(&tmp);
        let mailer = Arc::new(FakeProvider::ok());
        let state = AppState::new(&site).unwrap().with_mailer(mailer.clone());
        let app = build_router(Arc::new(state));

        let response = app
            .oneshot(post_json(
                "/api/contact",
                serde_json::json!({
                    "name": "Bot",
                    "email": "bot@example.org",
                    "message": "Buy cheap things now",
                    "website": "http://spam.example"
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(mailer.calls().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let tmp = TempDir::new().unwrap();
        let site = test_site(&tmp);
        let app = router(&site, FakeProvider::ok(), FakeProvider::ok());

        let request = Request::builder()
            .method("POST")
            .uri("/api/newsletter")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_static_pages_and_not_found() {
        let tmp = TempDir::new().unwrap();
        let site = test_site(&tmp);
        let app = router(&site, FakeProvider::ok(), FakeProvider::ok());

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/team/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(text_body(response).await.contains("<h1>Team</h1>"));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/no/such/page/")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(text_body(response).await.contains("Page not found"));
    }

    #[test]
    fn test_inject_live_reload() {
        let html = inject_live_reload("<html><body><p>x</p></body></html>");
        assert!(html.contains("__livereload"));
        assert!(html.ends_with("</html>"));
    }

    #[test]
    fn test_resolve_path_rejects_parent_segments() {
        let tmp = TempDir::new().unwrap();
        assert!(resolve_path(tmp.path(), "/../etc/passwd").is_none());
        assert!(resolve_path(tmp.path(), "/%2e%2e/etc/passwd").is_none());
        assert!(resolve_path(tmp.path(), "/media/%2E%2E%2Fsecret").is_none());
    }

    #[tokio::test]
    async fn test_encoded_file_names_are_served() {
        let tmp = TempDir::new().unwrap();
        let site = test_site(&tmp);
        let media = site.public_dir.join("media");
        std::fs::create_dir_all(&media).unwrap();
        std::fs::write(media.join("loom photo.jpg"), "jpeg").unwrap();
        std::fs::write(media.join("tapisserie-été.jpg"), "jpeg").unwrap();

        let app = router(&site, FakeProvider::ok(), FakeProvider::ok());
        for uri in [
            "/media/loom%20photo.jpg",
            "/media/tapisserie-%C3%A9t%C3%A9.jpg",
        ] {
            let response = app
                .clone()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{}", uri);
            assert_eq!(text_body(response).await, "jpeg");
        }
    }
}
