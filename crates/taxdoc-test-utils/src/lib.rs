//! Testing utilities for the tax document engine workspace
//!
//! Form 1040 (2024) fixtures, fact builders and fault-injecting stores.

#![allow(missing_docs)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use taxdoc_artifact::{
    ArtifactError, ArtifactKey, ArtifactStore, FilledArtifact, InMemoryArtifactStore, RetrievalUrl, StoredArtifact,
};
use taxdoc_calc::{Decimal, Dependent, FactSet, FactValue, StaticRulesProvider};
use taxdoc_core::{EngineConfig, FormFillEngine, FormTemplate, InMemoryTemplateProvider, Widget, WidgetKind};
use taxdoc_mapping::{InMemoryMappingStore, MappingDocument};

pub const FORM_1040: &str = "1040";
pub const TAX_YEAR: u16 = 2024;
pub const SUBJECT: &str = "client-7";

const F1040_2024_MAPPING: &str = include_str!("../fixtures/f1040_2024_mapping.json");

const P1: &str = "topmostSubform[0].Page1[0].";
const P2: &str = "topmostSubform[0].Page2[0].";

/// Mapping document for Form 1040, tax year 2024
pub fn f1040_mapping() -> MappingDocument {
    MappingDocument::from_json(F1040_2024_MAPPING).unwrap()
}

fn text(path: &str) -> Widget {
    Widget::text(path)
}

fn limited(path: &str, max_length: usize) -> Widget {
    Widget::new(
        path,
        WidgetKind::Text {
            max_length: Some(max_length),
        },
    )
}

/// Widgets of the 2024 Form 1040 template
///
/// Checkbox on-values differ per widget, as on the real form.
pub fn f1040_widgets() -> Vec<Widget> {
    let mut widgets = vec![
        Widget::checkbox(format!("{P1}FilingStatus_ReadOrder[0].c1_1[0]"), "1"),
        Widget::checkbox(format!("{P1}FilingStatus_ReadOrder[0].c1_2[0]"), "2"),
        Widget::checkbox(format!("{P1}FilingStatus_ReadOrder[0].c1_3[0]"), "3"),
        Widget::checkbox(format!("{P1}c1_4[0]"), "Yes"),
        Widget::checkbox(format!("{P1}FilingStatus_ReadOrder[0].c1_5[0]"), "5"),
        Widget::checkbox(format!("{P1}c1_6[0]"), "Yes"),
        Widget::checkbox(format!("{P1}c1_7[0]"), "No"),
        text(&format!("{P1}f1_04[0]")),
        text(&format!("{P1}f1_05[0]")),
        limited(&format!("{P1}f1_06[0]"), 11),
        text(&format!("{P1}f1_32[0]")),
        text(&format!("{P1}f1_46[0]")),
        text(&format!("{P1}f1_47[0]")),
        text(&format!("{P1}f1_48[0]")),
        text(&format!("{P1}f1_50[0]")),
        text(&format!("{P1}f1_56[0]")),
    ];
    for row in 0..4 {
        let prefix = format!("{P1}Table_Dependents[0].Row{}[0].", row + 1);
        for col in 0..4 {
            widgets.push(text(&format!("{prefix}f1_{}[0]", 60 + row * 4 + col)));
        }
        widgets.push(Widget::checkbox(format!("{prefix}c1_{}[0]", 20 + row * 2), "1"));
        widgets.push(Widget::checkbox(format!("{prefix}c1_{}[0]", 21 + row * 2), "1"));
    }
    for path in ["f2_02", "f2_05", "f2_10", "f2_14", "f2_22", "f2_23", "f2_24", "f2_28"] {
        widgets.push(text(&format!("{P2}{path}[0]")).on_page(1));
    }
    widgets.extend([
        limited(&format!("{P2}RoutingNo[0].f2_25[0]"), 9).on_page(1),
        limited(&format!("{P2}AccountNo[0].f2_27[0]"), 17).on_page(1),
        Widget::checkbox(format!("{P2}c2_5[0]"), "1").on_page(1),
        Widget::checkbox(format!("{P2}c2_6[0]"), "2").on_page(1),
        limited(&format!("{P2}f2_30[0]"), 20).on_page(1),
    ]);
    widgets
}

pub fn f1040_template() -> FormTemplate {
    FormTemplate::new(FORM_1040, TAX_YEAR, b"%PDF-1.7 f1040 2024 blank".to_vec(), f1040_widgets())
}

fn money(cents: i64) -> FactValue {
    FactValue::Number(Decimal::new(cents, 2))
}

/// Single filer, $55,151.93 wages, $16,606.17 withheld
pub fn scenario_facts() -> FactSet {
    let mut facts = FactSet::new();
    facts.insert("filing_status".into(), FactValue::text("single"));
    facts.insert("wages".into(), money(5_515_193));
    facts.insert("withholding".into(), money(1_660_617));
    facts.insert("first_name".into(), FactValue::text("Jordan"));
    facts.insert("last_name".into(), FactValue::text("Rivera"));
    facts.insert("ssn".into(), FactValue::text("400-00-1234"));
    facts.insert("digital_assets".into(), FactValue::Flag(false));
    facts
}

/// Scenario facts plus direct-deposit details
pub fn scenario_facts_with_bank() -> FactSet {
    let mut facts = scenario_facts();
    facts.extend(bank_responses());
    facts
}

/// Answers to the direct-deposit questions
pub fn bank_responses() -> FactSet {
    let mut responses = FactSet::new();
    responses.insert("routing_number".into(), FactValue::text("021000021"));
    responses.insert("account_number".into(), FactValue::text("123456789"));
    responses
}

/// `count` qualifying children
pub fn children(count: usize) -> Vec<Dependent> {
    (0..count)
        .map(|i| Dependent {
            first_name: format!("Child{i}"),
            last_name: "Rivera".into(),
            ssn: format!("400-00-{:04}", 2000 + i),
            relationship: "son".into(),
            child_tax_credit: true,
            other_dependent_credit: false,
        })
        .collect()
}

/// Engine config with millisecond backoff for tests
pub fn test_config() -> EngineConfig {
    EngineConfig::new()
        .with_io_timeout(Duration::from_secs(5))
        .with_retry_backoff(Duration::from_millis(1))
}

/// Engine over fixture mapping, fixture template and federal rules
pub fn setup_engine(artifacts: Arc<dyn ArtifactStore>) -> FormFillEngine {
    FormFillEngine::new(
        test_config(),
        Arc::new(InMemoryMappingStore::with_documents([f1040_mapping()])),
        Arc::new(StaticRulesProvider::federal()),
        Arc::new(InMemoryTemplateProvider::new().with_template(f1040_template())),
        artifacts,
    )
}

/// Artifact store whose first `failures` puts report unavailability
#[derive(Debug)]
pub struct FlakyArtifactStore {
    inner: InMemoryArtifactStore,
    failures: AtomicUsize,
    puts: AtomicUsize,
}

impl FlakyArtifactStore {
    pub fn new(failures: usize) -> Self {
        Self {
            inner: InMemoryArtifactStore::new(),
            failures: AtomicUsize::new(failures),
            puts: AtomicUsize::new(0),
        }
    }

    /// Put attempts seen, failed ones included
    pub fn put_attempts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArtifactStore for FlakyArtifactStore {
    async fn put(&self, key: &ArtifactKey, bytes: &[u8]) -> Result<FilledArtifact, ArtifactError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ArtifactError::Unavailable("injected outage".into()));
        }
        self.inner.put(key, bytes).await
    }

    async fn get_latest(&self, key: &ArtifactKey) -> Result<Option<StoredArtifact>, ArtifactError> {
        self.inner.get_latest(key).await
    }

    async fn get_version(&self, key: &ArtifactKey, version: u64) -> Result<Option<StoredArtifact>, ArtifactError> {
        self.inner.get_version(key, version).await
    }

    async fn list_versions(&self, key: &ArtifactKey) -> Result<Vec<FilledArtifact>, ArtifactError> {
        self.inner.list_versions(key).await
    }

    fn retrieval_url(&self, record: &FilledArtifact, ttl: Duration) -> RetrievalUrl {
        self.inner.retrieval_url(record, ttl)
    }
}
