use std::sync::Arc;

use anyhow::{bail, Context as _, Result};
use click_runtime::{PageHandle, Window};
use tokio::sync::Mutex;
use tracing::{debug, trace};
use url::Url;

use crate::routes::{decide, Route, RouteDecision};

/// Script run against every new page of a context before its own scripts.
pub type InitScript = Arc<dyn Fn(&mut Window) -> Result<()> + Send + Sync>;

#[derive(Default)]
struct ContextState {
    init_scripts: Vec<InitScript>,
    routes: Vec<Route>,
    closed: bool,
}

/// An isolated browsing context: its own init scripts, request routes and
/// pages. Clones share the context.
#[derive(Clone)]
pub struct BrowserContext {
    name: Arc<str>,
    state: Arc<Mutex<ContextState>>,
}

impl std::fmt::Debug for BrowserContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserContext").field("name", &self.name).finish()
    }
}

impl BrowserContext {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Arc::from(name.into()),
            state: Arc::new(Mutex::new(ContextState::default())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn add_init_script(&self, script: InitScript) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.closed {
            bail!("browser context {} is closed", self.name);
        }
        state.init_scripts.push(script);
        Ok(())
    }

    pub async fn init_script_count(&self) -> usize {
        self.state.lock().await.init_scripts.len()
    }

    pub async fn route(&self, route: Route) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.closed {
            bail!("browser context {} is closed", self.name);
        }
        debug!(context = %self.name, ?route, "route registered");
        state.routes.push(route);
        Ok(())
    }

    pub async fn routes(&self) -> Vec<Route> {
        self.state.lock().await.routes.clone()
    }

    /// Routes an outgoing request.
    pub async fn request(&self, url: &Url) -> RouteDecision {
        let state = self.state.lock().await;
        let decision = decide(&state.routes, url);
        if decision.is_aborted() {
            trace!(context = %self.name, %url, "request aborted");
        }
        decision
    }

    pub async fn close(&self) {
        self.state.lock().await.closed = true;
    }

    /// Creates a page that has run every init script and is still loading.
    pub async fn new_window(&self, url: &str) -> Result<Window> {
        let scripts = {
            let state = self.state.lock().await;
            if state.closed {
                bail!("browser context {} is closed", self.name);
            }
            state.init_scripts.clone()
        };
        let mut window =
            Window::open_url(url).with_context(|| format!("invalid page url {url:?}"))?;
        for script in &scripts {
            script(&mut window).with_context(|| format!("init script failed on {url}"))?;
        }
        Ok(window)
    }

    /// Spawns a page that is still loading.
    pub async fn new_page(&self, url: &str) -> Result<PageHandle> {
        Ok(PageHandle::spawn(self.new_window(url).await?))
    }

    /// Spawns a page after `build` populated it, with loading complete.
    pub async fn open_page<F>(&self, url: &str, build: F) -> Result<PageHandle>
    where
        F: FnOnce(&mut Window) + Send,
    {
        let mut window = self.new_window(url).await?;
        build(&mut window);
        window.load_complete();
        Ok(PageHandle::spawn(window))
    }
}

#[cfg(test)]
mod tests {
    use click_runtime::{listener, EventTarget};

    use super::*;
    use crate::routes::RouteMatcher;

    #[tokio::test]
    async fn init_scripts_run_in_order_before_page_content() {
        let context = BrowserContext::new("default");
        context
            .add_init_script(Arc::new(|window: &mut Window| -> Result<()> {
                let body = window.document().body();
                window.document_mut().append_element(body, "meta", [("id", "first")])?;
                Ok(())
            }))
            .await
            .unwrap();
        context
            .add_init_script(Arc::new(|window: &mut Window| -> Result<()> {
                let body = window.document().body();
                window.document_mut().append_element(body, "meta", [("id", "second")])?;
                Ok(())
            }))
            .await
            .unwrap();

        let window = context.new_window("https://example.com/").await.unwrap();
        let doc = window.document();
        let ids: Vec<_> = doc
            .element(doc.body())
            .unwrap()
            .children()
            .iter()
            .filter_map(|node| doc.element(*node).and_then(|e| e.id()).map(str::to_string))
            .collect();
        assert_eq!(ids, ["first", "second"]);
        assert!(!window.page_scripts_started());
    }

    #[tokio::test]
    async fn failing_init_scripts_fail_page_creation() {
        let context = BrowserContext::new("default");
        context
            .add_init_script(Arc::new(|_: &mut Window| -> Result<()> { bail!("boom") }))
            .await
            .unwrap();
        let err = context.new_window("https://example.com/").await.unwrap_err();
        assert!(format!("{err:#}").contains("boom"));
        assert!(context.new_window("not a url").await.is_err());
    }

    #[tokio::test]
    async fn open_page_finishes_loading() {
        let context = BrowserContext::new("default");
        let page = context
            .open_page("https://example.com/", |window| {
                window.add_event_listener(EventTarget::Window, "load", listener(|_, _| {}), false);
            })
            .await
            .unwrap();
        let state = page.evaluate(|window| window.ready_state()).await.unwrap();
        assert_eq!(state, click_runtime::ReadyState::Complete);
    }

    #[tokio::test]
    async fn closed_contexts_reject_changes() {
        let context = BrowserContext::new("default");
        context
            .route(Route::abort(RouteMatcher::common_ads()))
            .await
            .unwrap();
        let ad = Url::parse("https://addthis.com/widget.js").unwrap();
        assert!(context.request(&ad).await.is_aborted());

        context.close().await;
        assert!(context.route(Route::abort(RouteMatcher::optional_resources())).await.is_err());
        assert!(context.new_page("https://example.com/").await.is_err());
        assert_eq!(context.routes().await.len(), 1);
    }
}
