#![allow(dead_code)]

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use offerdesk_core::{
    models::Offer,
    query::{Filter, Pipeline},
    AggregateOptions, Assistant, FieldCatalog, FindOptions, OfferStore, PlanOracle, Result,
    Settings, SqliteStore,
};
use serde_json::{json, Value};
use tempfile::TempDir;

/// Oracle answering with a fixed text and remembering what it was asked.
pub struct ScriptedOracle {
    response: String,
    pub messages: Mutex<Vec<String>>,
}

impl ScriptedOracle {
    pub fn new(response: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            response: response.into(),
            messages: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl PlanOracle for ScriptedOracle {
    async fn generate(&self, _instructions: &str, message: &str) -> Result<String> {
        self.messages
            .lock()
            .expect("oracle lock poisoned")
            .push(message.to_string());
        Ok(self.response.clone())
    }
}

/// Store wrapper counting every call that reaches the backing store.
pub struct RecordingStore {
    inner: SqliteStore,
    pub calls: AtomicUsize,
}

impl RecordingStore {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl OfferStore for RecordingStore {
    fn count(&self, filter: &Filter) -> Result<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.count(filter)
    }

    fn find(&self, filter: &Filter, options: &FindOptions) -> Result<Vec<Value>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.find(filter, options)
    }

    fn aggregate(&self, pipeline: &Pipeline, options: &AggregateOptions) -> Result<Vec<Value>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.aggregate(pipeline, options)
    }
}

/// Offers around the July 2025 boundaries on the IST clock.
pub fn sample_offers() -> Vec<Offer> {
    serde_json::from_value(json!([
        {
            "studentName": "Asha Rao",
            "companyName": "Acme",
            "location": "Pune",
            "packageLPA": 6.5,
            "offerDate": "2025-06-30T18:30:00Z",
            "totalPostPlacementFee": 50000,
            "installments": [
                {"label": "1ST INSTALLMENT", "amount": 50000, "date": "2025-07-10", "mode": "UPI"}
            ]
        },
        {
            "studentName": "Ravi Kumar",
            "companyName": "Acme",
            "location": "Bengaluru",
            "packageLPA": 9.5,
            "offerDate": "2025-07-15T05:00:00Z",
            "totalPostPlacementFee": 60000
        },
        {
            "studentName": "Meena Iyer",
            "companyName": "Globex",
            "location": "Pune",
            "packageLPA": 4,
            "offerDate": "2025-07-31T18:30:00Z",
            "totalPostPlacementFee": 40000
        },
        {
            "studentName": "Karan Shah",
            "companyName": "Initech",
            "location": "Mumbai",
            "packageLPA": 5,
            "offerDate": "2025-06-10T05:00:00Z"
        }
    ]))
    .expect("sample offers parse")
}

/// Assistant over a seeded temporary store, plus the store for call counts.
pub fn create_test_assistant(
    oracle: Arc<dyn PlanOracle>,
) -> (TempDir, Assistant, Arc<RecordingStore>) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let inner =
        SqliteStore::open(temp_dir.path().join("test.db")).expect("Failed to open store");
    inner
        .import_offers(sample_offers())
        .expect("Failed to seed offers");
    let store = Arc::new(RecordingStore {
        inner,
        calls: AtomicUsize::new(0),
    });
    let catalog = FieldCatalog::embedded().expect("embedded catalog");
    let assistant = Assistant::new(
        oracle,
        Arc::clone(&store) as Arc<dyn OfferStore>,
        catalog,
        Settings::default(),
    );
    (temp_dir, assistant, store)
}
