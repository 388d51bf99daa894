use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use click_runtime::{
    find_ready_marker, inject, remove_ready_marker, ActiveList, ClickPolicy, DispatchRecord, Mode,
    PageHandle, Selector, Window,
};
use futures::future::join_all;
use tokio::time;
use tracing::{debug, info, warn};

use crate::config::{ClickManagerConfig, HostTimings};
use crate::context::{BrowserContext, InitScript};
use crate::error::{ClickError, Result, Violation};
use crate::routes::{Route, RouteMatcher};

/// Hook run by the browser pool once a browser has launched.
#[async_trait]
pub trait LaunchHook: Send + Sync {
    async fn post_launch(&self, contexts: &[BrowserContext]) -> anyhow::Result<()>;
}

/// Host-side controller: injects click enforcement into browsing contexts and
/// drives it on running pages.
#[derive(Debug, Clone)]
pub struct ClickManager {
    policy: Arc<ClickPolicy>,
    block_common_ads: bool,
    optimize: bool,
    timings: HostTimings,
}

impl ClickManager {
    pub fn new(config: &ClickManagerConfig) -> Result<Self> {
        let policy = config.policy()?;
        if policy.activation().is_empty() {
            warn!("no activation patterns configured; enforcement applies to every page");
        }
        info!(
            mode = %policy.mode(),
            level = %policy.enforcement_level(),
            block_common_ads = config.block_common_ads,
            optimize = config.optimize,
            "click manager initialized"
        );
        Ok(Self {
            policy: Arc::new(policy),
            block_common_ads: config.block_common_ads,
            optimize: config.optimize,
            timings: config.timings,
        })
    }

    pub fn from_policy(policy: ClickPolicy) -> Self {
        Self {
            policy: Arc::new(policy),
            block_common_ads: false,
            optimize: false,
            timings: HostTimings::default(),
        }
    }

    pub fn with_timings(mut self, timings: HostTimings) -> Self {
        self.timings = timings;
        self
    }

    pub fn policy(&self) -> &ClickPolicy {
        &self.policy
    }

    pub fn timings(&self) -> &HostTimings {
        &self.timings
    }

    /// The init script injecting this manager's policy into a new page.
    pub fn init_script(&self) -> InitScript {
        let policy = Arc::clone(&self.policy);
        Arc::new(move |window: &mut Window| -> anyhow::Result<()> {
            inject(window, &policy)?;
            Ok(())
        })
    }

    /// Registers the init script, and the request routes this manager is
    /// configured for, on one context.
    pub async fn install(&self, context: &BrowserContext) -> anyhow::Result<()> {
        context.add_init_script(self.init_script()).await?;
        if self.block_common_ads {
            context.route(Route::abort(RouteMatcher::common_ads())).await?;
        }
        if self.optimize {
            context
                .route(Route::abort(RouteMatcher::optional_resources()))
                .await?;
        }
        debug!(context = context.name(), "click manager installed");
        Ok(())
    }

    /// Waits for the first reconciliation pass, polling for the ready marker.
    pub async fn wait_for_ready(&self, page: &PageHandle, remove_marker: bool) -> Result<()> {
        let budget = self.timings.ready_timeout();
        let poll = self.timings.poll_interval();
        let waiting = async {
            loop {
                let found = page
                    .evaluate(move |window| {
                        let found = find_ready_marker(window.document()).is_some();
                        if found && remove_marker {
                            let _ = remove_ready_marker(window.document_mut());
                        }
                        found
                    })
                    .await?;
                if found {
                    return Ok::<(), ClickError>(());
                }
                time::sleep(poll).await;
            }
        };
        match time::timeout(budget, waiting).await {
            Ok(result) => {
                result?;
                info!(page = %page.url(), "script injected");
                Ok(())
            }
            Err(_) => Err(ClickError::Timeout {
                url: page.url().to_string(),
                waited: budget,
            }),
        }
    }

    /// Appends to the page's whitelist in one assignment, then waits out the
    /// settle delay. Returns the new whitelist length.
    pub async fn add_to_whitelist<I, S>(&self, page: &PageHandle, selectors: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extend_list(page, Mode::Whitelist, selectors).await
    }

    /// Appends to the page's blacklist in one assignment, then waits out the
    /// settle delay. Returns the new blacklist length.
    pub async fn add_to_blacklist<I, S>(&self, page: &PageHandle, selectors: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extend_list(page, Mode::Blacklist, selectors).await
    }

    async fn extend_list<I, S>(&self, page: &PageHandle, list: Mode, selectors: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let parsed = Selector::parse_all(selectors)?;
        let added: Vec<String> = parsed.iter().map(ToString::to_string).collect();
        let len = page
            .evaluate(move |window| {
                let state = window.policy_mut()?;
                Some(match list {
                    Mode::Whitelist => state.extend_whitelist(parsed),
                    Mode::Blacklist => state.extend_blacklist(parsed),
                })
            })
            .await?
            .ok_or_else(|| not_active(page))?;
        info!(page = %page.url(), list = %list, ?added, len, "selectors added");
        time::sleep(self.timings.settle_delay()).await;
        Ok(len)
    }

    /// Clicks the first element matching `selector` after checking it
    /// against the page's live policy, all in one page round-trip.
    pub async fn guarded_click(&self, page: &PageHandle, selector: &str) -> Result<DispatchRecord> {
        let target = Selector::parse(selector)?;
        let url = page.url().to_string();
        let record = page
            .evaluate(move |window| -> Result<DispatchRecord> {
                let source = target.to_string();
                let state = window.policy().ok_or(ClickError::NotActive { url })?;
                let document = window.document();
                let node = document
                    .query_selector(&target)
                    .ok_or_else(|| ClickError::NotFound {
                        selector: source.clone(),
                    })?;
                let mode = state.mode();
                let violation = match mode {
                    Mode::Blacklist => state
                        .blacklisted_by(document, node)
                        .map(|matched| Violation::Blacklisted {
                            matched: matched.to_string(),
                        }),
                    Mode::Whitelist => state
                        .whitelisted_by(document, node)
                        .is_none()
                        .then_some(Violation::NotWhitelisted),
                };
                if let Some(violation) = violation {
                    return Err(ClickError::PolicyViolation {
                        selector: source,
                        mode,
                        violation,
                    });
                }
                window.click(node).map_err(|err| ClickError::Interaction {
                    selector: source,
                    index: 1,
                    source: err,
                })
            })
            .await??;
        debug!(page = %page.url(), selector, "guarded click dispatched");
        Ok(record)
    }

    /// Whitelists `selector`, waits for the page to settle, then performs a
    /// guarded click on it.
    pub async fn whitelist_and_click(
        &self,
        page: &PageHandle,
        selector: &str,
    ) -> Result<DispatchRecord> {
        self.add_to_whitelist(page, [selector]).await?;
        self.guarded_click(page, selector).await
    }

    /// Clicks every element currently matching `selector`, in document order,
    /// running `callback` after each click and collecting its results. Stops
    /// at the first failure.
    pub async fn map_each_and_collect<T, F, Fut>(
        &self,
        page: &PageHandle,
        selector: &str,
        mut callback: F,
    ) -> Result<Vec<T>>
    where
        F: FnMut(PageHandle) -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let target = Selector::parse(selector)?;
        let nodes = page
            .evaluate(move |window| window.document().query_selector_all(&target))
            .await?;
        debug!(page = %page.url(), selector, matches = nodes.len(), "mapping matched elements");

        let mut collected = Vec::with_capacity(nodes.len());
        for (position, node) in nodes.into_iter().enumerate() {
            let index = position + 1;
            page.evaluate(move |window| window.user_click(node))
                .await?
                .map_err(|source| ClickError::Interaction {
                    selector: selector.to_string(),
                    index,
                    source,
                })?;
            let value = callback(page.clone())
                .await
                .map_err(|source| ClickError::Callback {
                    selector: selector.to_string(),
                    index,
                    source,
                })?;
            collected.push(value);
        }
        Ok(collected)
    }

    /// The list consulted under the page's current mode.
    pub async fn read_lists(&self, page: &PageHandle) -> Result<ActiveList> {
        let lists = page
            .evaluate(|window| window.policy().map(|state| state.active_list()))
            .await?
            .ok_or_else(|| not_active(page))?;
        info!(page = %page.url(), ?lists, "current lists");
        Ok(lists)
    }

    /// Blocks `window.open` on one already-running page.
    pub async fn block_window_open(&self, page: &PageHandle) -> Result<()> {
        page.evaluate(|window| window.block_window_open()).await?;
        Ok(())
    }

    /// Wait applied after every list mutation.
    pub fn settle_delay(&self) -> Duration {
        self.timings.settle_delay()
    }
}

#[async_trait]
impl LaunchHook for ClickManager {
    async fn post_launch(&self, contexts: &[BrowserContext]) -> anyhow::Result<()> {
        let installs = contexts.iter().map(|context| self.install(context));
        for result in join_all(installs).await {
            result?;
        }
        info!(contexts = contexts.len(), "click manager injected into browser contexts");
        Ok(())
    }
}

fn not_active(page: &PageHandle) -> ClickError {
    ClickError::NotActive {
        url: page.url().to_string(),
    }
}
