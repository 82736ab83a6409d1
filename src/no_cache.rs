use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll, ready},
};

use http::{
    HeaderMap, HeaderValue, Request, Response,
    header::{CACHE_CONTROL, EXPIRES, PRAGMA},
};
use pin_project_lite::pin_project;
use tower_layer::Layer;
use tower_service::Service;

/// Layer that applies [`NoCache`] which keeps browsers from caching anything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoCacheLayer;

impl<S> Layer<S> for NoCacheLayer {
    type Service = NoCache<S>;

    fn layer(&self, inner: S) -> Self::Service {
        NoCache::new(inner)
    }
}

/// Middleware stamping every response with cache-disabling headers, whatever
/// the inner service answered.
#[derive(Clone, Copy, Debug)]
pub struct NoCache<S> {
    inner: S,
}

impl<S> NoCache<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for NoCache<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = ResponseFuture<S::Future>;

    #[inline]
    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        ResponseFuture {
            inner: self.inner.call(req),
        }
    }
}

pin_project! {
    /// Response future of [`NoCache`].
    pub struct ResponseFuture<F> {
        #[pin]
        inner: F,
    }
}

impl<F, B, E> Future for ResponseFuture<F>
where
    F: Future<Output = Result<Response<B>, E>>,
{
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut res = ready!(self.project().inner.poll(cx))?;
        disable_caching(res.headers_mut());
        Poll::Ready(Ok(res))
    }
}

pub fn disable_caching(headers: &mut HeaderMap) {
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate, max-age=0"),
    );
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(EXPIRES, HeaderValue::from_static("0"));
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use http::{StatusCode, header::CONTENT_TYPE};
    use tower::{ServiceBuilder, ServiceExt};

    use super::*;

    #[tokio::test]
    async fn layer() {
        async fn handle(request: Request<()>) -> Result<Response<String>, Infallible> {
            let mut res = Response::new(request.uri().to_string());
            res.headers_mut()
                .insert(CACHE_CONTROL, HeaderValue::from_static("max-age=3600"));
            Ok(res)
        }

        let mut svc = ServiceBuilder::new().layer(NoCacheLayer).service_fn(handle);

        let res = svc
            .ready()
            .await
            .unwrap()
            .call(Request::builder().uri("/nrd-a/app.js").body(()).unwrap())
            .await
            .unwrap();

        assert_eq!(
            res.headers()[CACHE_CONTROL],
            "no-cache, no-store, must-revalidate, max-age=0"
        );
        assert_eq!(res.headers().get_all(CACHE_CONTROL).iter().count(), 1);
        assert_eq!(res.headers()[PRAGMA], "no-cache");
        assert_eq!(res.headers()[EXPIRES], "0");
        assert_eq!(res.into_body(), "/nrd-a/app.js");
    }

    #[tokio::test]
    async fn error_statuses_are_stamped_too() {
        let svc = NoCacheLayer.layer(tower::service_fn(|_: Request<()>| async {
            let mut res = Response::new(String::new());
            *res.status_mut() = StatusCode::NOT_FOUND;
            res.headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
            Ok::<_, Infallible>(res)
        }));

        let res = svc
            .oneshot(Request::builder().uri("/missing").body(()).unwrap())
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(res.headers()[EXPIRES], "0");
        assert_eq!(res.headers()[CONTENT_TYPE], "text/plain");
    }
}
