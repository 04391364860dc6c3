//! Element resolution under a strict time budget.
//!
//! A logical identifier expands into an ordered list of lookup strategies
//! (see [`AttributeVocabulary::strategies_for`]). [`ElementLocator::locate`]
//! tries them in order, each under its own sub-budget, and returns the first
//! hit. The aggregate timeout is a hard ceiling: no strategy starts once it
//! has elapsed, and no strategy's budget extends past it.
//!
//! A miss is `None`, not an error. Transport errors during a lookup are
//! logged and treated as misses so that one flaky request does not abort a
//! run.

use std::collections::HashSet;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace};

use crate::driver::AutomationDriver;
use crate::element::ElementHandle;
use crate::tree::{self, AxNode};
use crate::vocabulary::{AttributeVocabulary, LocatorStrategy};

/// Interval between repeated attempts of the same strategy.
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Smallest budget any single identifier strategy gets.
pub const MIN_STRATEGY_BUDGET: Duration = Duration::from_millis(500);

/// Resolves logical identifiers against a borrowed driver.
pub struct ElementLocator<'a> {
    driver: &'a dyn AutomationDriver,
    vocab: AttributeVocabulary,
    app_id: &'a str,
}

impl<'a> ElementLocator<'a> {
    pub fn new(driver: &'a dyn AutomationDriver, app_id: &'a str) -> Self {
        Self {
            driver,
            vocab: AttributeVocabulary::new(driver.platform()),
            app_id,
        }
    }

    pub fn vocabulary(&self) -> &AttributeVocabulary {
        &self.vocab
    }

    /// Finds the element named by `identifier` within `timeout`.
    ///
    /// Each strategy gets `max(0.5s, timeout / strategies)`, clipped to the
    /// time remaining.
    pub async fn locate(&self, identifier: &str, timeout: Duration) -> Option<ElementHandle> {
        let strategies = self.vocab.strategies_for(identifier, self.app_id);
        let found = self
            .first_match(&strategies, timeout, MIN_STRATEGY_BUDGET)
            .await;
        if found.is_none() {
            debug!(%identifier, ?timeout, "element not found");
        }
        found
    }

    /// Tries `strategies` in order under a shared `total` budget.
    ///
    /// Each strategy's budget is `max(floor, total / len)`, clipped to the
    /// time remaining. The first strategy to match wins.
    pub async fn first_match(
        &self,
        strategies: &[LocatorStrategy],
        total: Duration,
        floor: Duration,
    ) -> Option<ElementHandle> {
        if strategies.is_empty() {
            return None;
        }
        let start = Instant::now();
        let per_strategy = (total / strategies.len() as u32).max(floor);

        for strategy in strategies {
            let elapsed = start.elapsed();
            if elapsed >= total {
                break;
            }
            let budget = per_strategy.min(total - elapsed);
            if let Some(element) = self.poll(strategy, budget).await {
                debug!(%strategy, element = %element.id, "matched");
                return Some(element);
            }
        }
        None
    }

    /// Repeats one lookup until it matches or `budget` runs out.
    ///
    /// At least one attempt is always made.
    pub async fn poll(&self, strategy: &LocatorStrategy, budget: Duration) -> Option<ElementHandle> {
        let deadline = Instant::now() + budget;
        loop {
            match self.driver.find_element(strategy).await {
                Ok(Some(element)) => return Some(element),
                Ok(None) => trace!(%strategy, "miss"),
                Err(e) => debug!(%strategy, error = %e, "lookup failed"),
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    /// Runs every strategy for `identifier` once, without polling, and
    /// returns the first match.
    pub async fn find_now(&self, identifier: &str) -> Option<ElementHandle> {
        for strategy in self.vocab.strategies_for(identifier, self.app_id) {
            match self.driver.find_element(&strategy).await {
                Ok(Some(element)) => return Some(element),
                Ok(None) => trace!(%strategy, "miss"),
                Err(e) => debug!(%strategy, error = %e, "lookup failed"),
            }
        }
        None
    }

    /// Runs every strategy for `identifier` once and returns the union of all
    /// matches, in strategy order, without duplicates.
    pub async fn locate_all(&self, identifier: &str) -> Vec<ElementHandle> {
        let mut seen = HashSet::new();
        let mut all = Vec::new();
        for strategy in self.vocab.strategies_for(identifier, self.app_id) {
            match self.driver.find_elements(&strategy).await {
                Ok(found) => {
                    for element in found {
                        if seen.insert(element.id.clone()) {
                            all.push(element);
                        }
                    }
                }
                Err(e) => debug!(%strategy, error = %e, "lookup failed"),
            }
        }
        all
    }

    /// Fuzzy lookup by partial identifier.
    ///
    /// Scans a page-source snapshot for the first node whose id-like
    /// attributes contain `partial` (case-insensitive), then resolves the
    /// segment after the last `/` of the matched value through
    /// [`locate`](Self::locate). When the page source cannot be fetched or
    /// parsed, or nothing in it matches, a server-side `contains` query is
    /// polled instead.
    pub async fn locate_like(&self, partial: &str, timeout: Duration) -> Option<ElementHandle> {
        let start = Instant::now();

        match self.snapshot().await {
            Some(root) => {
                if let Some(matched) = tree::find_like(&root, partial) {
                    let key = tree::reresolve_key(matched);
                    debug!(%partial, %matched, %key, "fuzzy tree match");
                    let remaining = timeout.saturating_sub(start.elapsed());
                    return self.locate(key, remaining).await;
                }
            }
            None => debug!(%partial, "tree scan unavailable; using contains query"),
        }

        let remaining = timeout.saturating_sub(start.elapsed());
        self.poll(&self.vocab.contains_query(partial), remaining).await
    }

    /// Fetches and parses the current page source.
    pub async fn snapshot(&self) -> Option<AxNode> {
        let source = match self.driver.page_source().await {
            Ok(source) => source,
            Err(e) => {
                debug!(error = %e, "page source unavailable");
                return None;
            }
        };
        match AxNode::parse(&source) {
            Ok(root) => Some(root),
            Err(e) => {
                debug!(error = %e, "page source did not parse");
                None
            }
        }
    }

    /// Reads the displayed text of `element` using the platform's attribute
    /// priority, falling back to the element's text property.
    pub async fn read_text(&self, element: &ElementHandle) -> Option<String> {
        for name in self.vocab.text_attributes() {
            if let Ok(Some(value)) = self.driver.element_attribute(element, name).await {
                if !value.is_empty() {
                    return Some(value);
                }
            }
        }
        self.driver.element_text(element).await.ok()
    }
}
