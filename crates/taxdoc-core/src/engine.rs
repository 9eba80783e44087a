//! Form fill engine
//!
//! ```text
//! FillRequest
//!   │ validate facts
//!   ├─► MappingResolver::load (timeout) ───► SemanticMapping
//!   ├─► TemplateProvider (timeout, 1 retry) ► FormTemplate
//!   ├─► TaxCalculator::compute ────────────► TaxResult
//!   │ refund without bank details? ─────────► NeedsInput(questions)
//!   ├─► effective facts ─► widget writes (skips counted)
//!   ├─► FormRenderer ─► bytes
//!   └─► ArtifactStore::put (timeout, 1 retry) ─► version + retrieval URL
//! ```

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::facts::{effective_facts, merge_answers, pending_questions, Question};
use crate::format::{to_field_value, WriteRejection};
use crate::render::{CanonicalJsonRenderer, FormRenderer};
use crate::retry;
use crate::session::{SessionId, SessionStore};
use crate::template::TemplateProvider;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use taxdoc_artifact::{ArtifactKey, ArtifactStore, FilledArtifact, RetrievalUrl};
use taxdoc_calc::{Dependent, FactSet, TaxCalculator, TaxFacts, TaxResult, TaxRulesProvider};
use taxdoc_mapping::{MappingConflict, MappingResolver, MappingStore};

/// One fill call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillRequest {
    /// Ties needs-input rounds together
    #[serde(default)]
    pub session: SessionId,
    /// Taxpayer or client the artifact belongs to
    pub subject: String,
    pub form_type: String,
    pub tax_year: u16,
    pub facts: FactSet,
    #[serde(default)]
    pub dependents: Vec<Dependent>,
    /// Answers to questions from an earlier round
    #[serde(default)]
    pub user_responses: FactSet,
}

impl FillRequest {
    /// Create request in a fresh session
    #[must_use]
    pub fn new(subject: impl Into<String>, form_type: impl Into<String>, tax_year: u16, facts: FactSet) -> Self {
        Self {
            session: SessionId::new(),
            subject: subject.into(),
            form_type: form_type.into(),
            tax_year,
            facts,
            dependents: Vec::new(),
            user_responses: FactSet::new(),
        }
    }

    /// In session
    #[inline]
    #[must_use]
    pub fn with_session(mut self, session: SessionId) -> Self {
        self.session = session;
        self
    }

    /// With dependents
    #[inline]
    #[must_use]
    pub fn with_dependents(mut self, dependents: Vec<Dependent>) -> Self {
        self.dependents = dependents;
        self
    }

    /// With answers to earlier questions
    #[inline]
    #[must_use]
    pub fn with_responses(mut self, responses: FactSet) -> Self {
        self.user_responses = responses;
        self
    }
}

/// How a fill ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillOutcome {
    /// Artifact stored
    Completed,
    /// Caller must answer questions and call again
    NeedsInput,
}

/// A mapped value that was not written
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedField {
    pub semantic_key: String,
    pub field_path: String,
    pub reason: WriteRejection,
}

/// Full outcome of a fill
#[derive(Debug, Clone)]
pub struct FillResult {
    pub outcome: FillOutcome,
    pub questions: Vec<Question>,
    pub tax: TaxResult,
    pub fields_filled: usize,
    pub fields_skipped: usize,
    pub skipped: Vec<SkippedField>,
    pub conflicts: Vec<MappingConflict>,
    pub artifact: Option<FilledArtifact>,
    pub filled_form_url: Option<RetrievalUrl>,
}

impl FillResult {
    fn needs_input(tax: TaxResult, questions: Vec<Question>, conflicts: Vec<MappingConflict>) -> Self {
        Self {
            outcome: FillOutcome::NeedsInput,
            questions,
            tax,
            fields_filled: 0,
            fields_skipped: 0,
            skipped: Vec::new(),
            conflicts,
            artifact: None,
            filled_form_url: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.outcome == FillOutcome::Completed
    }
}

/// Caller-facing summary of a fill
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillResponse {
    pub success: bool,
    pub needs_input: bool,
    pub questions: Vec<Question>,
    pub filled_form_url: Option<String>,
    pub fields_filled: usize,
    pub fields_skipped: usize,
}

impl From<&FillResult> for FillResponse {
    fn from(result: &FillResult) -> Self {
        Self {
            success: result.is_complete(),
            needs_input: result.outcome == FillOutcome::NeedsInput,
            questions: result.questions.clone(),
            filled_form_url: result.filled_form_url.as_ref().map(|u| u.url.clone()),
            fields_filled: result.fields_filled,
            fields_skipped: result.fields_skipped,
        }
    }
}

/// Fills forms from facts and stores each rendering as a new version
#[derive(Debug)]
pub struct FormFillEngine {
    config: EngineConfig,
    resolver: MappingResolver,
    calculator: TaxCalculator,
    templates: Arc<dyn TemplateProvider>,
    artifacts: Arc<dyn ArtifactStore>,
    renderer: Arc<dyn FormRenderer>,
    sessions: SessionStore,
}

impl FormFillEngine {
    /// Create engine with the canonical JSON renderer
    #[must_use]
    pub fn new(
        config: EngineConfig,
        mappings: Arc<dyn MappingStore>,
        rules: Arc<dyn TaxRulesProvider>,
        templates: Arc<dyn TemplateProvider>,
        artifacts: Arc<dyn ArtifactStore>,
    ) -> Self {
        Self {
            resolver: MappingResolver::with_capacity(mappings, config.mapping_cache_capacity),
            calculator: TaxCalculator::new(rules),
            templates,
            artifacts,
            renderer: Arc::new(CanonicalJsonRenderer),
            sessions: SessionStore::new(),
            config,
        }
    }

    /// With renderer
    #[inline]
    #[must_use]
    pub fn with_renderer(mut self, renderer: Arc<dyn FormRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Mapping resolver, for administrative patches
    #[inline]
    #[must_use]
    pub fn resolver(&self) -> &MappingResolver {
        &self.resolver
    }

    #[inline]
    #[must_use]
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Fill a form
    ///
    /// # Errors
    /// - validation errors for malformed facts or an unusable subject
    /// - configuration errors when mapping, template or rules are missing
    /// - `EngineError::TransientStorage` when a store still fails after one retry
    #[tracing::instrument(
        skip(self, request),
        fields(session = %request.session, form_type = %request.form_type, tax_year = request.tax_year)
    )]
    pub async fn fill(&self, request: FillRequest) -> EngineResult<FillResult> {
        let outcome = self.run(request).await;
        if let Err(err) = &outcome {
            if err.is_retryable() {
                tracing::warn!(error = %err, "fill failed after retry");
            } else {
                tracing::error!(
                    error = %err,
                    configuration = err.is_configuration(),
                    validation = err.is_validation(),
                    "fill failed"
                );
            }
        }
        outcome
    }

    async fn run(&self, request: FillRequest) -> EngineResult<FillResult> {
        let key = ArtifactKey::new(&request.subject, &request.form_type, request.tax_year);
        key.validate()
            .map_err(|e| EngineError::Validation(e.to_string()))?;

        let answers = self
            .sessions
            .answers(request.session, &request.user_responses);
        let facts = merge_answers(&request.facts, &answers);
        let tax_facts = TaxFacts::from_facts(&facts, request.tax_year, &request.dependents)?;

        let mapping = retry::once(
            &self.config,
            "mapping load",
            self.resolver.load(&request.form_type, request.tax_year),
        )
        .await?;

        let templates = &self.templates;
        let form_type = request.form_type.as_str();
        let tax_year = request.tax_year;
        let template = retry::bounded(&self.config, "template fetch", || async move {
            templates
                .get_template(form_type, tax_year)
                .await
                .map_err(|e| EngineError::from_template("template fetch", e))
        })
        .await?;

        let conflicts = mapping.validate(template.widgets().iter().map(|w| w.field_name.as_str()));
        if !conflicts.is_empty() {
            tracing::warn!(count = conflicts.len(), "mapping conflicts with template");
            for conflict in &conflicts {
                tracing::debug!(%conflict, "mapping conflict");
            }
        }

        let tax = self.calculator.compute(&tax_facts)?;

        let questions = pending_questions(&tax, &facts);
        if !questions.is_empty() {
            tracing::info!(questions = questions.len(), "fill needs input");
            self.sessions
                .suspend(request.session, answers, questions.clone());
            return Ok(FillResult::needs_input(tax, questions, conflicts));
        }

        let max_rows = self.config.max_dependent_rows;
        if tax_facts.dependents.len() > max_rows {
            tracing::info!(
                dependents = tax_facts.dependents.len(),
                rows = max_rows,
                "dependents beyond form rows are not rendered"
            );
        }
        let effective = effective_facts(&facts, &tax_facts, &tax, max_rows);

        let mut values = BTreeMap::new();
        let mut skipped = Vec::new();
        let mut fields_filled = 0;
        for (semantic_key, value) in &effective {
            if value.is_blank() {
                continue;
            }
            let Some(field_path) = mapping.resolve(semantic_key) else {
                continue;
            };
            let written = template
                .widget(field_path)
                .ok_or(WriteRejection::NoWidget)
                .and_then(|widget| {
                    to_field_value(semantic_key, value, widget).map(|v| (widget.field_name.clone(), v))
                });
            match written {
                Ok((field_name, value)) => {
                    values.insert(field_name, value);
                    fields_filled += 1;
                }
                Err(reason) => {
                    tracing::warn!(semantic_key = %semantic_key, field_path, %reason, "skipped field");
                    skipped.push(SkippedField {
                        semantic_key: semantic_key.clone(),
                        field_path: field_path.to_string(),
                        reason,
                    });
                }
            }
        }

        let bytes = self.renderer.render(&template, &values)?;

        let artifacts = &self.artifacts;
        let key_ref = &key;
        let content = bytes.as_slice();
        let record = retry::bounded(&self.config, "artifact put", || async move {
            artifacts
                .put(key_ref, content)
                .await
                .map_err(|e| EngineError::from_artifact("artifact put", e))
        })
        .await?;
        let url = self
            .artifacts
            .retrieval_url(&record, self.config.retrieval_url_ttl());

        self.sessions.clear(request.session);
        tracing::info!(
            version = record.version,
            fields_filled,
            fields_skipped = skipped.len(),
            hash = %record.content_hash.short(),
            "stored filled form"
        );

        Ok(FillResult {
            outcome: FillOutcome::Completed,
            questions: Vec::new(),
            tax,
            fields_filled,
            fields_skipped: skipped.len(),
            skipped,
            conflicts,
            artifact: Some(record),
            filled_form_url: Some(url),
        })
    }

    /// Fill a form and summarize the outcome for the caller
    ///
    /// # Errors
    /// Same as [`FormFillEngine::fill`].
    pub async fn fill_tax_form(&self, request: FillRequest) -> EngineResult<FillResponse> {
        self.fill(request).await.map(|r| FillResponse::from(&r))
    }
}
