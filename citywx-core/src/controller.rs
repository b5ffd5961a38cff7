//! Application state and the operations that mutate it.
//!
//! [`WeatherApp`] owns one [`AppState`] and publishes every change through a
//! `watch` channel, so presentation code renders from consistent snapshots.
//! Each query settles with a single state update. Overlapping queries are
//! not sequenced: whichever settles last determines the final state.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use tokio::sync::watch;

use crate::{
    error::{LocationError, QueryError},
    favorites::Favorites,
    location::{LocationSource, PositionOptions},
    model::{FavoriteCity, WeatherReport},
    provider::WeatherService,
    store::{FAVORITES_KEY, PersistentStore, REPORT_KEY},
};

/// Everything the presentation layer renders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppState {
    pub report: Option<WeatherReport>,
    /// True only while a query is outstanding.
    pub loading: bool,
    /// User-facing message of the last failure.
    pub error: Option<String>,
    /// Pending text of the search form.
    pub search_text: String,
    pub favorites: Favorites,
}

impl AppState {
    /// Whether the displayed report is saved as a favorite.
    pub fn is_current_favorite(&self) -> bool {
        self.report
            .as_ref()
            .is_some_and(|r| self.favorites.contains(r.id))
    }
}

pub struct WeatherApp {
    service: Arc<dyn WeatherService>,
    location: Arc<dyn LocationSource>,
    store: PersistentStore,
    state: watch::Sender<AppState>,
    auto_located: AtomicBool,
}

impl std::fmt::Debug for WeatherApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherApp")
            .field("service", &self.service)
            .field("location", &self.location)
            .field("state", &*self.state.borrow())
            .finish()
    }
}

impl WeatherApp {
    /// Create the controller, restoring the last report and the favorites
    /// from `store`.
    pub fn new(
        service: Arc<dyn WeatherService>,
        location: Arc<dyn LocationSource>,
        store: PersistentStore,
    ) -> Self {
        let report: Option<WeatherReport> =
            store.read_validated(REPORT_KEY, None, |r: &Option<WeatherReport>| {
                r.as_ref().is_none_or(WeatherReport::is_well_formed)
            });
        let favorites: Favorites = store.read(FAVORITES_KEY, Favorites::new());

        tracing::debug!(
            restored_report = report.is_some(),
            favorites = favorites.len(),
            "restored persisted state"
        );

        let (state, _) = watch::channel(AppState {
            report,
            favorites,
            ..AppState::default()
        });

        Self {
            service,
            location,
            store,
            state,
            auto_located: AtomicBool::new(false),
        }
    }

    /// Clone of the current state.
    pub fn snapshot(&self) -> AppState {
        self.state.borrow().clone()
    }

    /// Receiver that observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<AppState> {
        self.state.subscribe()
    }

    /// Startup hook: look up the current location once if nothing was
    /// restored. Later calls do nothing.
    pub async fn start(&self) {
        if self.state.borrow().report.is_some() {
            return;
        }
        if self.auto_located.swap(true, Ordering::SeqCst) {
            return;
        }

        tracing::info!("no stored report, looking up current location");
        self.search_by_location().await;
    }

    pub fn set_search_text(&self, text: impl Into<String>) {
        let text = text.into();
        self.state.send_if_modified(|s| {
            if s.search_text == text {
                return false;
            }
            s.search_text = text;
            true
        });
    }

    /// Search for the pending search text.
    pub async fn submit_search(&self) {
        let text = self.state.borrow().search_text.clone();
        self.search(&text).await;
    }

    /// Query a city by name. Blank names are ignored.
    pub async fn search(&self, name: &str) {
        let name = name.trim();
        if name.is_empty() {
            tracing::debug!("ignoring empty search");
            return;
        }

        self.begin_query();
        let outcome = self.service.query_by_name(name).await;
        self.settle(outcome);
    }

    /// Query the weather at the current position.
    pub async fn search_by_location(&self) {
        if !self.location.is_supported() {
            self.state.send_modify(|s| {
                s.error = Some(LocationError::Unsupported.user_message().to_string());
            });
            return;
        }

        self.begin_query();

        let options = PositionOptions::default();
        let position = match tokio::time::timeout(
            options.timeout,
            self.location.current_position(&options),
        )
        .await
        {
            Ok(Ok(position)) => position,
            Ok(Err(e)) => return self.location_failed(e),
            Err(_) => return self.location_failed(LocationError::Timeout),
        };

        tracing::debug!(%position, "acquired current position");
        let outcome = self.service.query_by_coordinates(position).await;
        self.settle(outcome);
    }

    /// Save the displayed city. Returns whether the favorites changed.
    pub fn add_favorite(&self) -> bool {
        let added = self.state.send_if_modified(|s| match &s.report {
            Some(report) => s.favorites.insert(FavoriteCity::from(report)),
            None => false,
        });

        if added {
            self.persist_favorites();
        }
        added
    }

    /// Remove the saved city with `id`. Returns whether the favorites changed.
    pub fn remove_favorite(&self, id: i64) -> bool {
        let removed = self.state.send_if_modified(|s| s.favorites.remove(id));

        if removed {
            self.persist_favorites();
        }
        removed
    }

    /// Add the displayed city if it is not saved, remove it otherwise.
    pub fn toggle_favorite(&self) -> bool {
        let current = {
            let state = self.state.borrow();
            state
                .report
                .as_ref()
                .map(|r| (r.id, state.favorites.contains(r.id)))
        };

        match current {
            Some((id, true)) => self.remove_favorite(id),
            Some((_, false)) => self.add_favorite(),
            None => false,
        }
    }

    /// Show the weather for a saved city.
    pub async fn load_favorite(&self, name: &str) {
        self.search(name).await;
    }

    fn begin_query(&self) {
        self.state.send_modify(|s| {
            s.loading = true;
            s.error = None;
        });
    }

    fn settle(&self, outcome: Result<WeatherReport, QueryError>) {
        match &outcome {
            Ok(report) => tracing::info!(city = %report.name, id = report.id, "weather updated"),
            Err(e) => tracing::info!(error = %e, "weather query failed"),
        }

        self.state.send_modify(|s| {
            s.loading = false;
            match outcome {
                Ok(report) => {
                    s.report = Some(report);
                    s.error = None;
                }
                Err(e) => {
                    s.report = None;
                    s.error = Some(e.user_message());
                }
            }
        });

        self.persist_report();
    }

    fn location_failed(&self, error: LocationError) {
        tracing::info!(%error, "could not determine current position");
        self.state.send_modify(|s| {
            s.loading = false;
            s.error = Some(error.user_message().to_string());
        });
    }

    fn persist_report(&self) {
        let report = self.state.borrow().report.clone();
        self.store.write(REPORT_KEY, &report);
    }

    fn persist_favorites(&self) {
        let favorites = self.state.borrow().favorites.clone();
        self.store.write(FAVORITES_KEY, &favorites);
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::atomic::AtomicUsize,
        time::Duration,
    };

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use tokio::sync::oneshot;

    use super::*;
    use crate::{
        location::{FixedLocation, NoLocation},
        model::{Coordinates, fixtures::report},
        store::MemoryStorage,
    };

    /// Answers from a fixed table; unknown names are 404s.
    #[derive(Debug, Default)]
    struct TableService {
        cities: HashMap<String, WeatherReport>,
        by_coordinates: Option<Result<WeatherReport, QueryError>>,
        calls: AtomicUsize,
    }

    impl TableService {
        fn with(reports: &[WeatherReport]) -> Self {
            Self {
                cities: reports.iter().map(|r| (r.name.clone(), r.clone())).collect(),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl WeatherService for TableService {
        async fn query_by_name(&self, name: &str) -> Result<WeatherReport, QueryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match name {
                "RateLimited" => Err(QueryError::from_status(429, Some(name))),
                _ => self
                    .cities
                    .get(name)
                    .cloned()
                    .ok_or_else(|| QueryError::from_status(404, Some(name))),
            }
        }

        async fn query_by_coordinates(
            &self,
            _coordinates: Coordinates,
        ) -> Result<WeatherReport, QueryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.by_coordinates
                .clone()
                .unwrap_or(Err(QueryError::NotFound { city: None }))
        }
    }

    /// Location source that counts requests and fails with a fixed error.
    #[derive(Debug)]
    struct FailingLocation {
        error: LocationError,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LocationSource for FailingLocation {
        async fn current_position(
            &self,
            _options: &PositionOptions,
        ) -> Result<Coordinates, LocationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(self.error.clone())
        }
    }

    #[derive(Debug)]
    struct CountingLocation {
        inner: FixedLocation,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LocationSource for CountingLocation {
        async fn current_position(
            &self,
            options: &PositionOptions,
        ) -> Result<Coordinates, LocationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.current_position(options).await
        }
    }

    #[derive(Debug)]
    struct NeverLocation;

    #[async_trait]
    impl LocationSource for NeverLocation {
        async fn current_position(
            &self,
            _options: &PositionOptions,
        ) -> Result<Coordinates, LocationError> {
            std::future::pending().await
        }
    }

    fn app(service: TableService) -> WeatherApp {
        WeatherApp::new(
            Arc::new(service),
            Arc::new(NoLocation),
            PersistentStore::in_memory(),
        )
    }

    fn london() -> WeatherReport {
        report(2643743, "London", "GB")
    }

    #[tokio::test]
    async fn successful_search_sets_report_and_clears_error() {
        let app = app(TableService::with(&[london()]));

        app.search("  London ").await;

        let state = app.snapshot();
        assert_eq!(state.report.as_ref().map(|r| r.name.as_str()), Some("London"));
        assert_eq!(state.error, None);
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn unknown_city_sets_not_found_message() {
        let app = app(TableService::with(&[london()]));
        app.search("London").await;

        app.search("Zzzzznotacity").await;

        let state = app.snapshot();
        assert_eq!(
            state.error.as_deref(),
            Some("City \"Zzzzznotacity\" not found. Please check the spelling and try again.")
        );
        assert_eq!(state.report, None);
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn rate_limit_sets_message() {
        let app = app(TableService::default());

        app.search("RateLimited").await;

        assert_eq!(
            app.snapshot().error.as_deref(),
            Some("Too many requests. Please wait a moment and try again.")
        );
    }

    #[tokio::test]
    async fn settled_search_has_exactly_one_of_report_or_error() {
        let app = app(TableService::with(&[london()]));

        for name in ["London", "Nowhere", "RateLimited", "London", "x"] {
            app.search(name).await;
            let state = app.snapshot();
            assert!(
                state.report.is_some() != state.error.is_some(),
                "after {name}: {state:?}"
            );
            assert!(!state.loading);
        }
    }

    #[tokio::test]
    async fn blank_search_is_a_no_op() {
        let service = Arc::new(TableService::with(&[london()]));
        let app = WeatherApp::new(
            service.clone(),
            Arc::new(NoLocation),
            PersistentStore::in_memory(),
        );
        let before = app.snapshot();

        app.search("   ").await;
        app.search("").await;

        assert_eq!(app.snapshot(), before);
        assert_eq!(service.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn submit_search_uses_pending_text() {
        let app = app(TableService::with(&[london()]));

        app.set_search_text("London");
        app.submit_search().await;

        let state = app.snapshot();
        assert_eq!(state.search_text, "London");
        assert_eq!(state.report.map(|r| r.id), Some(2643743));
    }

    #[tokio::test]
    async fn add_favorite_is_idempotent() {
        let paris = report(1, "Paris", "FR");
        let app = app(TableService::with(&[paris]));
        app.search("Paris").await;

        assert!(app.add_favorite());
        assert!(!app.add_favorite());

        let favorites: Vec<FavoriteCity> = app.snapshot().favorites.iter().cloned().collect();
        assert_eq!(
            favorites,
            vec![FavoriteCity { id: 1, name: "Paris".into(), country: "FR".into() }]
        );
    }

    #[tokio::test]
    async fn add_favorite_without_report_is_a_no_op() {
        let app = app(TableService::default());

        assert!(!app.add_favorite());
        assert!(app.snapshot().favorites.is_empty());
    }

    #[tokio::test]
    async fn remove_favorite_of_missing_id_leaves_favorites_unchanged() {
        let app = app(TableService::with(&[london()]));
        app.search("London").await;
        app.add_favorite();
        let before = app.snapshot().favorites;

        assert!(!app.remove_favorite(42));
        assert_eq!(app.snapshot().favorites, before);

        assert!(app.remove_favorite(2643743));
        assert!(app.snapshot().favorites.is_empty());
    }

    #[tokio::test]
    async fn toggle_favorite_flips_membership() {
        let app = app(TableService::with(&[london()]));
        app.search("London").await;

        assert!(app.toggle_favorite());
        assert!(app.snapshot().is_current_favorite());

        assert!(app.toggle_favorite());
        assert!(!app.snapshot().is_current_favorite());
    }

    #[tokio::test]
    async fn load_favorite_searches_by_name() {
        let app = app(TableService::with(&[london(), report(1, "Paris", "FR")]));

        app.load_favorite("Paris").await;

        assert_eq!(app.snapshot().report.map(|r| r.name), Some("Paris".to_string()));
    }

    #[tokio::test]
    async fn state_is_restored_from_storage() {
        let backend = Arc::new(MemoryStorage::new());
        let store = PersistentStore::new(backend.clone());

        {
            let app = WeatherApp::new(
                Arc::new(TableService::with(&[london()])),
                Arc::new(NoLocation),
                store.clone(),
            );
            app.search("London").await;
            app.add_favorite();
        }

        let restored = WeatherApp::new(
            Arc::new(TableService::default()),
            Arc::new(NoLocation),
            store,
        )
        .snapshot();

        assert_eq!(restored.report.map(|r| r.id), Some(2643743));
        assert_eq!(restored.favorites.len(), 1);
        assert!(!restored.loading);
        assert_eq!(restored.error, None);
    }

    #[tokio::test]
    async fn failed_search_clears_persisted_report() {
        let backend = Arc::new(MemoryStorage::new());
        let app = WeatherApp::new(
            Arc::new(TableService::with(&[london()])),
            Arc::new(NoLocation),
            PersistentStore::new(backend.clone()),
        );

        app.search("London").await;
        assert!(backend.raw(REPORT_KEY).is_some_and(|raw| raw.contains("London")));

        app.search("Nowhere").await;
        assert_eq!(backend.raw(REPORT_KEY).as_deref(), Some("null"));
    }

    #[tokio::test]
    async fn invalid_stored_report_is_discarded() {
        let backend = Arc::new(MemoryStorage::new());
        let mut broken = london();
        broken.conditions.clear();
        PersistentStore::new(backend.clone()).write(REPORT_KEY, &Some(broken));

        let app = WeatherApp::new(
            Arc::new(TableService::default()),
            Arc::new(NoLocation),
            PersistentStore::new(backend),
        );

        assert_eq!(app.snapshot().report, None);
    }

    #[tokio::test]
    async fn storage_failure_keeps_in_memory_state() {
        let app = WeatherApp::new(
            Arc::new(TableService::with(&[london()])),
            Arc::new(NoLocation),
            PersistentStore::new(Arc::new(MemoryStorage::unavailable())),
        );

        app.search("London").await;
        assert!(app.add_favorite());

        let state = app.snapshot();
        assert!(state.report.is_some());
        assert_eq!(state.favorites.len(), 1);
    }

    #[tokio::test]
    async fn location_search_queries_by_coordinates() {
        let service = TableService {
            by_coordinates: Some(Ok(london())),
            ..TableService::default()
        };
        let app = WeatherApp::new(
            Arc::new(service),
            Arc::new(FixedLocation(Coordinates::new(51.5, -0.12))),
            PersistentStore::in_memory(),
        );

        app.search_by_location().await;

        let state = app.snapshot();
        assert_eq!(state.report.map(|r| r.name), Some("London".to_string()));
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn denied_location_keeps_report_and_sets_message() {
        let location = Arc::new(FailingLocation {
            error: LocationError::from_code(1),
            calls: AtomicUsize::new(0),
        });
        let app = WeatherApp::new(
            Arc::new(TableService::with(&[london()])),
            location.clone(),
            PersistentStore::in_memory(),
        );
        app.search("London").await;

        app.search_by_location().await;

        let state = app.snapshot();
        assert!(state
            .error
            .as_deref()
            .is_some_and(|e| e.contains("Location access was denied.")));
        assert!(!state.loading);
        assert_eq!(state.report.map(|r| r.id), Some(2643743));
        assert_eq!(location.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn location_failure_reasons_have_distinct_messages() {
        let mut messages = Vec::new();
        for code in [1, 2, 3, 7] {
            let app = WeatherApp::new(
                Arc::new(TableService::default()),
                Arc::new(FailingLocation {
                    error: LocationError::from_code(code),
                    calls: AtomicUsize::new(0),
                }),
                PersistentStore::in_memory(),
            );
            app.search_by_location().await;
            messages.push(app.snapshot().error.unwrap_or_default());
        }

        messages.sort();
        messages.dedup();
        assert_eq!(messages.len(), 4);
        assert!(messages.iter().all(|m| !m.is_empty()));
    }

    #[tokio::test]
    async fn unsupported_location_sets_error_without_query() {
        let service = Arc::new(TableService::default());
        let app = WeatherApp::new(
            service.clone(),
            Arc::new(NoLocation),
            PersistentStore::in_memory(),
        );

        app.search_by_location().await;

        let state = app.snapshot();
        assert_eq!(
            state.error.as_deref(),
            Some(LocationError::Unsupported.user_message())
        );
        assert!(!state.loading);
        assert_eq!(service.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_location_times_out_after_ten_seconds() {
        let app = WeatherApp::new(
            Arc::new(TableService::default()),
            Arc::new(NeverLocation),
            PersistentStore::in_memory(),
        );
        let started = tokio::time::Instant::now();

        app.search_by_location().await;

        assert!(started.elapsed() >= Duration::from_secs(10));
        let state = app.snapshot();
        assert_eq!(
            state.error.as_deref(),
            Some(LocationError::Timeout.user_message())
        );
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn start_locates_exactly_once_without_stored_report() {
        let location = Arc::new(CountingLocation {
            inner: FixedLocation(Coordinates::new(51.5, -0.12)),
            calls: AtomicUsize::new(0),
        });
        let service = TableService {
            by_coordinates: Some(Err(QueryError::Unavailable { status: 502 })),
            ..TableService::default()
        };
        let app = WeatherApp::new(
            Arc::new(service),
            location.clone(),
            PersistentStore::in_memory(),
        );

        app.start().await;
        app.start().await;

        assert_eq!(location.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn start_skips_location_when_report_restored() {
        let store = PersistentStore::in_memory();
        store.write(REPORT_KEY, &Some(london()));
        let location = Arc::new(CountingLocation {
            inner: FixedLocation(Coordinates::new(0.0, 0.0)),
            calls: AtomicUsize::new(0),
        });

        let app = WeatherApp::new(Arc::new(TableService::default()), location.clone(), store);
        app.start().await;

        assert_eq!(location.calls.load(Ordering::SeqCst), 0);
    }

    /// Each query waits until the test releases it.
    #[derive(Debug, Default)]
    struct GatedService {
        gates: Mutex<HashMap<String, oneshot::Receiver<Result<WeatherReport, QueryError>>>>,
    }

    impl GatedService {
        fn gate(&self, name: &str) -> oneshot::Sender<Result<WeatherReport, QueryError>> {
            let (tx, rx) = oneshot::channel();
            self.gates.lock().insert(name.to_string(), rx);
            tx
        }
    }

    #[async_trait]
    impl WeatherService for GatedService {
        async fn query_by_name(&self, name: &str) -> Result<WeatherReport, QueryError> {
            let gate = self.gates.lock().remove(name);
            match gate {
                Some(rx) => rx
                    .await
                    .unwrap_or_else(|_| Err(QueryError::Unexpected("gate dropped".into()))),
                None => Err(QueryError::from_status(404, Some(name))),
            }
        }

        async fn query_by_coordinates(
            &self,
            _coordinates: Coordinates,
        ) -> Result<WeatherReport, QueryError> {
            Err(QueryError::NotFound { city: None })
        }
    }

    // Overlapping searches are not sequenced. This pins the settle order to
    // show that the last query to finish wins, even if it was issued first.
    #[tokio::test]
    async fn overlapping_searches_last_to_settle_wins() {
        let service = Arc::new(GatedService::default());
        let paris_gate = service.gate("Paris");
        let berlin_gate = service.gate("Berlin");
        let app = WeatherApp::new(service, Arc::new(NoLocation), PersistentStore::in_memory());
        let mut rx = app.subscribe();

        let release = async {
            let _ = berlin_gate.send(Ok(report(2950159, "Berlin", "DE")));
            let _ = rx
                .wait_for(|s| s.report.as_ref().is_some_and(|r| r.name == "Berlin"))
                .await;
            // The first settle already cleared loading while Paris is in flight.
            assert!(!app.snapshot().loading);
            let _ = paris_gate.send(Ok(report(2988507, "Paris", "FR")));
        };

        tokio::join!(app.search("Paris"), app.search("Berlin"), release);

        let state = app.snapshot();
        assert_eq!(state.report.map(|r| r.name), Some("Paris".to_string()));
        assert!(!state.loading);
        assert_eq!(state.error, None);
    }

    #[tokio::test]
    async fn observers_see_loading_then_result() {
        let service = Arc::new(GatedService::default());
        let london_gate = service.gate("London");
        let app = WeatherApp::new(service, Arc::new(NoLocation), PersistentStore::in_memory());

        app.search("Atlantis").await;
        assert!(app.snapshot().error.is_some());

        let mut rx = app.subscribe();
        let observe = async {
            let in_flight = rx
                .wait_for(|s| s.loading)
                .await
                .map(|s| AppState::clone(&s))
                .expect("sender alive");
            assert_eq!(in_flight.error, None);
            assert!(in_flight.report.is_none());

            let current = app.snapshot();
            assert!(current.loading);
            assert_eq!(current.error, None);

            let _ = london_gate.send(Ok(london()));
        };

        tokio::join!(app.search("London"), observe);

        let settled = rx.borrow_and_update().clone();
        assert!(!settled.loading);
        assert_eq!(settled.error, None);
        assert_eq!(settled.report.map(|r| r.id), Some(2643743));
    }
}
