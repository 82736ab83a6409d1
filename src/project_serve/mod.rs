//! Static file service for a workspace of projects.
//!
//! Requests are translated to files under the projects directory. HTML pages
//! pick up the live reload script, directories redirect to their slash form
//! and then serve their entry file or a generated listing.

use axum::{
    Json,
    body::Body,
    http::{
        HeaderValue, Method, Request, Response, StatusCode,
        header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION},
    },
    response::IntoResponse,
};
use serde_json::json;
use std::{
    convert::Infallible,
    future::Future,
    path::{Path, PathBuf},
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tower_service::Service;
use tracing::debug;

use crate::{
    live_reload::{LIVE_ENDPOINT, LiveReload, inject_script},
    registry::ProjectRegistry,
    translate::{Translation, translate_path},
};

pub mod pages;


/// What `GET /` answers with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RootPage {
    /// Page linking every registered project.
    Listing,
    /// Permanent redirect to the given project.
    Redirect(String),
}

/// Service serving every project of a registry under `/<project>/`.
///
/// Paths are resolved by [`translate_path`]; HTML pages get the live reload
/// script when live reload is on, everything else goes through [`ServeFile`].
#[derive(Clone, Debug)]
pub struct ProjectServeDir {
    registry: Arc<ProjectRegistry>,
    library_prefixes: Arc<[String]>,
    root_page: RootPage,
    live: Option<LiveReload>,
}

impl ProjectServeDir {
    pub fn new(registry: Arc<ProjectRegistry>, library_prefixes: Vec<String>) -> Self {
        Self {
            registry,
            library_prefixes: library_prefixes.into(),
            root_page: RootPage::Listing,
            live: None,
        }
    }

    pub fn root_page(mut self, root_page: RootPage) -> Self {
        self.root_page = root_page;
        self
    }

    pub fn live_reload(mut self, live: Option<LiveReload>) -> Self {
        self.live = live;
        self
    }

    async fn respond<ReqBody>(self, req: Request<ReqBody>) -> Response<Body>
    where
        ReqBody: Send + 'static,
    {
        let path = req.uri().path().to_owned();
        let query = req.uri().query().map(str::to_owned);
        debug!(method = %req.method(), uri = %req.uri(), "request");

        if let Some(live) = &self.live {
            if path == LIVE_ENDPOINT {
                return Json(json!({ "t": live.state().get() })).into_response();
            }
        }

        let is_page_request = matches!(*req.method(), Method::GET | Method::HEAD);
        let translation = translate_path(&path, &self.registry, &self.library_prefixes);
        let file = match translation {
            Translation::Listing if is_page_request => return self.root_response(),
            Translation::Listing => return StatusCode::METHOD_NOT_ALLOWED.into_response(),
            Translation::File(file) => file,
        };

        if let Some(live) = &self.live {
            if is_page_request && is_html(&file) {
                if let Some(res) = injected_page(&file, live).await {
                    return res;
                }
            }
        }

        let is_dir = tokio::fs::metadata(&file)
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false);
        if is_dir {
            return self.directory_response(file, &path, query, req).await;
        }
        serve_file(&file, req).await
    }

    fn root_response(&self) -> Response<Body> {
        match &self.root_page {
            RootPage::Listing => html_response(pages::registry_listing(self.registry.names()).into_bytes()),
            RootPage::Redirect(project) => redirect(format!("/{project}/")),
        }
    }

    async fn directory_response<ReqBody>(
        &self,
        dir: PathBuf,
        path: &str,
        query: Option<String>,
        req: Request<ReqBody>,
    ) -> Response<Body>
    where
        ReqBody: Send + 'static,
    {
        if !path.ends_with('/') {
            let location = match query {
                Some(query) => format!("{path}/?{query}"),
                None => format!("{path}/"),
            };
            return redirect(location);
        }

        let entry = dir.join(self.registry.entry_file());
        let has_entry = tokio::fs::metadata(&entry)
            .await
            .is_ok_and(|meta| meta.is_file());
        if has_entry {
            return serve_file(&entry, req).await;
        }

        match pages::directory_listing(&dir, path).await {
            Ok(html) => html_response(html.into_bytes()),
            Err(error) => {
                debug!(dir = %dir.display(), %error, "cannot list directory");
                StatusCode::NOT_FOUND.into_response()
            }
        }
    }
}

impl<ReqBody> Service<Request<ReqBody>> for ProjectServeDir
where
    ReqBody: Send + 'static,
{
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response<Body>, Infallible>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let this = self.clone();
        Box::pin(async move { Ok(this.respond(req).await) })
    }
}

fn is_html(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("html"))
}

/// Reads an HTML page and adds the live reload script. `None` when the file
/// cannot be read, leaving the request to the regular file service.
async fn injected_page(file: &Path, live: &LiveReload) -> Option<Response<Body>> {
    let html = match tokio::fs::read(file).await {
        Ok(html) => html,
        Err(error) => {
            debug!(file = %file.display(), %error, "not injecting live reload");
            return None;
        }
    };
    let html = inject_script(&html, live.script()).into_owned();
    Some(html_response(html))
}

fn html_response(html: Vec<u8>) -> Response<Body> {
    (
        [
            (CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8")),
            (CONTENT_LENGTH, HeaderValue::from(html.len())),
        ],
        html,
    )
        .into_response()
}

fn redirect(location: String) -> Response<Body> {
    (StatusCode::MOVED_PERMANENTLY, [(LOCATION, location)]).into_response()
}

async fn serve_file<ReqBody>(file: &Path, req: Request<ReqBody>) -> Response<Body>
where
    ReqBody: Send + 'static,
{
    match ServeFile::new(file).oneshot(req).await {
        Ok(res) => res.map(Body::new),
        Err(never) => match never {},
    }
}
