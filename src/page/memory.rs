//! In-memory host page
//!
//! Behaves like the legacy grid closely enough to rehearse a fill without a
//! browser: rows appear asynchronously after a request, a max-row counter
//! tracks them, the item search adds pre-populated rows, a line total is
//! recalculated on blur, and blocking dialogs can be scripted per row.

use super::{ElementState, HostPage, PageError, SearchOutcome};
use crate::fill::AbortHandle;
use crate::schema::{DomTemplate, SchemaRegistry};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::time::sleep;

/// Field values of a catalog item keyed by field id
pub type CatalogItem = BTreeMap<String, String>;

/// Timing and shape of the simulated host
#[derive(Debug, Clone)]
pub struct PageBehavior {
    /// Delay between a row request and the row appearing
    pub row_delay: Duration,
    /// Delay of the item search round trip
    pub search_delay: Duration,
    /// Whether the host maintains a max-row counter
    pub counter: bool,
}

impl Default for PageBehavior {
    fn default() -> Self {
        Self {
            row_delay: Duration::from_millis(30),
            search_delay: Duration::from_millis(60),
            counter: true,
        }
    }
}

/// One observable interaction, in the order the page saw it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interaction {
    RowRequested,
    Search(String),
    Focus(String),
    Commit { name: String, value: String },
    Blur(String),
    Click(String),
    Dialog(String),
}

struct Slot {
    id: String,
    dom: DomTemplate,
    readonly: bool,
}

struct LineTotal {
    total: String,
    quantity: String,
    price: String,
}

#[derive(Default)]
struct PageState {
    behavior: PageBehavior,
    elements: BTreeMap<String, ElementState>,
    owners: HashMap<String, usize>,
    max_row: usize,
    requests: usize,
    failing: HashSet<usize>,
    catalog: HashMap<String, CatalogItem>,
    dialogs: HashMap<usize, String>,
    line_total: Option<LineTotal>,
    abort: Option<AbortHandle>,
    journal: Vec<Interaction>,
}

struct Inner {
    slots: Vec<Slot>,
    decimal_separator: char,
    state: Mutex<PageState>,
    mutations: watch::Sender<u64>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, PageState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn bump(&self) {
        self.mutations.send_modify(|generation| *generation += 1);
    }

    fn slot_name(&self, id: &str, row: usize) -> Option<String> {
        self.slots
            .iter()
            .find(|slot| slot.id == id)
            .map(|slot| slot.dom.render(row))
    }

    fn create_row(&self, item: Option<&CatalogItem>) -> usize {
        let mut state = self.lock();
        let row = state.max_row + 1;

        for slot in &self.slots {
            let name = slot.dom.render(row);
            let mut element = ElementState {
                readonly: slot.readonly,
                visible: true,
                ..ElementState::default()
            };
            if let Some(value) = item.and_then(|item| item.get(&slot.id)) {
                element.checked = value == "true";
                element.value = value.clone();
            }
            state.owners.insert(name.clone(), row);
            state.elements.insert(name, element);
        }
        state.max_row = row;
        drop(state);

        log::debug!("Host created row {}", row);
        self.bump();
        row
    }

    fn parse(&self, value: &str) -> Option<f64> {
        value
            .trim()
            .replace(self.decimal_separator, ".")
            .parse()
            .ok()
    }

    fn recalculate(&self, state: &mut PageState, row: usize) {
        let Some(rule) = &state.line_total else {
            return;
        };
        let (Some(total), Some(quantity), Some(price)) = (
            self.slot_name(&rule.total, row),
            self.slot_name(&rule.quantity, row),
            self.slot_name(&rule.price, row),
        ) else {
            return;
        };

        let read = |name: &str| {
            state
                .elements
                .get(name)
                .and_then(|element| self.parse(&element.value))
        };
        let (Some(quantity), Some(price)) = (read(&quantity), read(&price)) else {
            return;
        };

        let amount = (quantity * price * 100.0).round() / 100.0;
        if let Some(element) = state.elements.get_mut(&total) {
            element.value = amount
                .to_string()
                .replace('.', &self.decimal_separator.to_string());
        }
    }

    fn raise_dialog(&self, state: &mut PageState, message: String) {
        match &state.abort {
            Some(abort) => abort.trigger(message.clone()),
            None => log::warn!("Host dialog: {}", message),
        }
        state.journal.push(Interaction::Dialog(message));
    }
}

/// Simulated legacy form, cheap to clone
#[derive(Clone)]
pub struct MemoryPage {
    inner: Arc<Inner>,
}

impl MemoryPage {
    /// Page whose rows carry one element per registered field
    pub fn for_registry(registry: &SchemaRegistry) -> Self {
        let slots = registry
            .fields()
            .iter()
            .map(|field| Slot {
                id: field.id.clone(),
                dom: field.dom.clone(),
                readonly: field.is_calculated(),
            })
            .collect();
        let (mutations, _) = watch::channel(0);

        Self {
            inner: Arc::new(Inner {
                slots,
                decimal_separator: crate::schema::DomNames::decimal_separator(registry),
                state: Mutex::new(PageState::default()),
                mutations,
            }),
        }
    }

    pub fn with_behavior(self, behavior: PageBehavior) -> Self {
        self.inner.lock().behavior = behavior;
        self
    }

    /// Register an item the stock search can find
    pub fn with_item(self, code: impl Into<String>, item: CatalogItem) -> Self {
        self.inner.lock().catalog.insert(code.into(), item);
        self
    }

    /// Silently drop the `n`th row request (0-based)
    pub fn fail_request(self, n: usize) -> Self {
        self.inner.lock().failing.insert(n);
        self
    }

    /// Raise a blocking dialog on the first commit into `row`
    pub fn dialog_on_row(self, row: usize, message: impl Into<String>) -> Self {
        self.inner.lock().dialogs.insert(row, message.into());
        self
    }

    /// Recalculate `total` as `quantity * price` whenever a row element blurs
    pub fn with_line_total(
        self,
        total: impl Into<String>,
        quantity: impl Into<String>,
        price: impl Into<String>,
    ) -> Self {
        self.inner.lock().line_total = Some(LineTotal {
            total: total.into(),
            quantity: quantity.into(),
            price: price.into(),
        });
        self
    }

    /// Highest row created so far
    pub fn rows(&self) -> usize {
        self.inner.lock().max_row
    }

    /// Number of row requests received, including dropped ones
    pub fn requests(&self) -> usize {
        self.inner.lock().requests
    }

    pub fn journal(&self) -> Vec<Interaction> {
        self.inner.lock().journal.clone()
    }

    /// Committed `(element name, value)` pairs in order
    pub fn commits(&self) -> Vec<(String, String)> {
        self.journal()
            .into_iter()
            .filter_map(|interaction| match interaction {
                Interaction::Commit { name, value } => Some((name, value)),
                _ => None,
            })
            .collect()
    }

    pub fn value(&self, name: &str) -> Option<String> {
        self.inner
            .lock()
            .elements
            .get(name)
            .map(|element| element.value.clone())
    }

    /// Current state of every element, keyed by name
    pub fn snapshot(&self) -> BTreeMap<String, ElementState> {
        self.inner.lock().elements.clone()
    }

    fn spawn_row(&self, item: Option<CatalogItem>, delay: Duration) -> oneshot::Receiver<usize> {
        let inner = Arc::clone(&self.inner);
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            sleep(delay).await;
            let row = inner.create_row(item.as_ref());
            let _ = tx.send(row);
        });
        rx
    }

    fn with_element<T>(
        &self,
        name: &str,
        f: impl FnOnce(&Inner, &mut PageState, usize) -> T,
    ) -> Result<T, PageError> {
        let mut state = self.inner.lock();
        let element = state
            .elements
            .get(name)
            .ok_or_else(|| PageError::MissingElement(name.to_string()))?;
        if !element.visible {
            return Err(PageError::Hidden(name.to_string()));
        }
        let row = state.owners.get(name).copied().unwrap_or_default();
        Ok(f(&*self.inner, &mut *state, row))
    }
}

impl HostPage for MemoryPage {
    async fn request_row(&self) -> Result<(), PageError> {
        let delay = {
            let mut state = self.inner.lock();
            let n = state.requests;
            state.requests += 1;
            state.journal.push(Interaction::RowRequested);
            if state.failing.contains(&n) {
                log::debug!("Host dropped row request {}", n);
                return Ok(());
            }
            state.behavior.row_delay
        };
        self.spawn_row(None, delay);
        Ok(())
    }

    async fn max_row(&self) -> Option<usize> {
        let state = self.inner.lock();
        state.behavior.counter.then_some(state.max_row)
    }

    async fn is_visible(&self, name: &str) -> bool {
        self.inner
            .lock()
            .elements
            .get(name)
            .is_some_and(|element| element.visible)
    }

    async fn element(&self, name: &str) -> Option<ElementState> {
        self.inner.lock().elements.get(name).cloned()
    }

    async fn focus(&self, name: &str) -> Result<(), PageError> {
        self.with_element(name, |_, state, _| {
            state.journal.push(Interaction::Focus(name.to_string()));
        })
    }

    async fn commit(&self, name: &str, value: &str) -> Result<(), PageError> {
        self.with_element(name, |inner, state, row| {
            if let Some(element) = state.elements.get_mut(name)
                && !element.readonly
            {
                element.value = value.to_string();
            }
            state.journal.push(Interaction::Commit {
                name: name.to_string(),
                value: value.to_string(),
            });
            if let Some(message) = state.dialogs.remove(&row) {
                inner.raise_dialog(state, message);
            }
        })?;
        self.inner.bump();
        Ok(())
    }

    async fn blur(&self, name: &str) -> Result<(), PageError> {
        self.with_element(name, |inner, state, row| {
            state.journal.push(Interaction::Blur(name.to_string()));
            inner.recalculate(state, row);
        })?;
        self.inner.bump();
        Ok(())
    }

    async fn click(&self, name: &str) -> Result<(), PageError> {
        self.with_element(name, |_, state, _| {
            if let Some(element) = state.elements.get_mut(name) {
                element.checked = !element.checked;
                element.value = element.checked.to_string();
            }
            state.journal.push(Interaction::Click(name.to_string()));
        })?;
        self.inner.bump();
        Ok(())
    }

    fn mutations(&self) -> watch::Receiver<u64> {
        self.inner.mutations.subscribe()
    }

    async fn search_item(&self, code: &str, timeout: Duration) -> SearchOutcome {
        let (item, delay) = {
            let mut state = self.inner.lock();
            state.journal.push(Interaction::Search(code.to_string()));
            (state.catalog.get(code).cloned(), state.behavior.search_delay)
        };

        let Some(item) = item else {
            sleep(delay.min(timeout)).await;
            return SearchOutcome::NoRow;
        };

        let created = self.spawn_row(Some(item), delay);
        match tokio::time::timeout(timeout, created).await {
            Ok(Ok(row)) => SearchOutcome::CreatedRow(row),
            Ok(Err(_)) => SearchOutcome::NoRow,
            Err(_) => SearchOutcome::TimedOut,
        }
    }

    fn intercept_dialogs(&self, abort: AbortHandle) {
        self.inner.lock().abort = Some(abort);
    }

    fn release_dialogs(&self) {
        self.inner.lock().abort = None;
    }
}
