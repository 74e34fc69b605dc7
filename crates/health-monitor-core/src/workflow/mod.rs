//! Visit workflow: lifecycle + oracle + response parsing.
//!
//! Pipeline: Symptoms → Record update → Prompt → Oracle → Parse → Apply
//!
//! Oracle failures never escape this module. A failed call stores
//! [`UNAVAILABLE_RESPONSE`] as the diagnosis so the record always leaves an
//! attempted diagnosis populated.

use thiserror::Error;
use tracing::{info, warn};

use health_monitor_llm::{
    build_full_prompt, make_diagnosis_prompt, make_health_advice_prompt,
    make_history_analysis_prompt, parse_diagnosis_response, GenerationRequest, InlineImage,
    ResponseShape, TextOracle, UNAVAILABLE_RESPONSE,
};

use crate::images::{mime_type_for, ImageStore, ImageStoreError};
use crate::lifecycle::{require, LifecycleError, PatientLifecycle, PatientStore};
use crate::models::{PatientRecord, PromptContext};

/// Workflow errors.
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("Image store error: {0}")]
    Image(#[from] ImageStoreError),

    #[error("Invalid input: {0}")]
    Validation(String),
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Result of a diagnosed visit.
#[derive(Debug, Clone)]
pub struct VisitOutcome {
    /// Record after the diagnosis was applied
    pub record: PatientRecord,
    /// Layout of the oracle reply; `None` when the oracle failed or gave no diagnosis
    pub shape: Option<ResponseShape>,
}

impl VisitOutcome {
    pub fn oracle_failed(&self) -> bool {
        self.shape.is_none()
    }
}

/// Drives a visit from symptoms to stored diagnosis.
pub struct VisitWorkflow<S, O, I> {
    lifecycle: PatientLifecycle<S>,
    oracle: O,
    images: I,
}

impl<S, O, I> VisitWorkflow<S, O, I>
where
    S: PatientStore,
    O: TextOracle,
    I: ImageStore,
{
    pub fn new(store: S, oracle: O, images: I) -> Self {
        Self {
            lifecycle: PatientLifecycle::new(store),
            oracle,
            images,
        }
    }

    pub fn lifecycle(&self) -> &PatientLifecycle<S> {
        &self.lifecycle
    }

    /// First visit: store the image, create the record, diagnose.
    pub fn register_patient(
        &self,
        name: &str,
        symptoms: &str,
        image: Option<&[u8]>,
    ) -> WorkflowResult<VisitOutcome> {
        // Validate before writing an image nobody will reference
        require("name", name)?;
        require("symptoms", symptoms)?;
        let image_reference = self.store_image(image)?;
        let record = self
            .lifecycle
            .create_record(name, symptoms, image_reference)?;
        self.diagnose_record(record)
    }

    /// Returning visit: roll the diagnosis forward, then diagnose the new symptoms.
    pub fn returning_visit(
        &self,
        id: &str,
        symptoms: &str,
        image: Option<&[u8]>,
    ) -> WorkflowResult<VisitOutcome> {
        // Fail on bad input or unknown IDs before writing an image nobody will reference
        require("symptoms", symptoms)?;
        self.lifecycle.get(id)?;
        let image_reference = self.store_image(image)?;
        let record = self
            .lifecycle
            .record_new_visit(id, symptoms, image_reference)?;
        self.diagnose_record(record)
    }

    /// Diagnose the current symptoms of a stored record.
    pub fn diagnose(&self, id: &str) -> WorkflowResult<VisitOutcome> {
        let record = self.lifecycle.get(id)?;
        self.diagnose_record(record)
    }

    /// Management advice for a named condition.
    pub fn health_advice(&self, condition: &str) -> WorkflowResult<String> {
        if condition.trim().is_empty() {
            return Err(WorkflowError::Validation(
                "condition must not be empty".into(),
            ));
        }
        let prompt = build_full_prompt(&make_health_advice_prompt(condition));
        Ok(self.generate_or_sentinel(GenerationRequest::text(prompt)))
    }

    /// Analyse the current symptoms against the record's diagnosis history.
    pub fn analyze_history(&self, id: &str) -> WorkflowResult<String> {
        let record = self.lifecycle.get(id)?;
        let history = history_summary(&record);
        let prompt = build_full_prompt(&make_history_analysis_prompt(&record.symptoms, &history));
        Ok(self.generate_or_sentinel(GenerationRequest::text(prompt)))
    }

    /// Explicit name lookup. Never used to decide that a visit is a return visit.
    pub fn find_by_name(&self, name: &str) -> WorkflowResult<Vec<PatientRecord>> {
        Ok(self.lifecycle.find_by_name(name)?)
    }

    fn diagnose_record(&self, record: PatientRecord) -> WorkflowResult<VisitOutcome> {
        let request = self.diagnosis_request(&record.prompt_context());

        match self.oracle.generate(&request) {
            Ok(reply) => {
                let parsed = parse_diagnosis_response(&reply);
                if parsed.diagnosis.trim().is_empty() {
                    warn!(patient_id = %record.id, "Oracle reply contained no diagnosis");
                    return self.store_unavailable(&record.id);
                }
                if parsed.shape.is_degraded() {
                    warn!(
                        patient_id = %record.id,
                        shape = ?parsed.shape,
                        "Oracle reply missing expected section markers"
                    );
                }
                let record = self.lifecycle.apply_diagnosis(
                    &record.id,
                    &parsed.diagnosis,
                    Some(&parsed.medicine_suggestions),
                )?;
                info!(patient_id = %record.id, "Diagnosis stored");
                Ok(VisitOutcome {
                    record,
                    shape: Some(parsed.shape),
                })
            }
            Err(e) => {
                warn!(patient_id = %record.id, error = %e, "Oracle unavailable, storing placeholder diagnosis");
                self.store_unavailable(&record.id)
            }
        }
    }

    fn store_unavailable(&self, id: &str) -> WorkflowResult<VisitOutcome> {
        let record = self
            .lifecycle
            .apply_diagnosis(id, UNAVAILABLE_RESPONSE, None)?;
        Ok(VisitOutcome {
            record,
            shape: None,
        })
    }

    fn diagnosis_request(&self, context: &PromptContext) -> GenerationRequest {
        let image = context
            .image_reference
            .as_deref()
            .and_then(|reference| self.load_image(reference));

        let prompt = build_full_prompt(&make_diagnosis_prompt(
            &context.diagnosis_context(image.is_some()),
        ));
        let request = GenerationRequest::text(prompt);
        match image {
            Some(image) => request.with_image(image),
            None => request,
        }
    }

    fn load_image(&self, reference: &str) -> Option<InlineImage> {
        match self.images.load(reference) {
            Ok(bytes) => Some(InlineImage::new(mime_type_for(reference), bytes)),
            Err(e) => {
                warn!(reference = %reference, error = %e, "Image unavailable, using text-only analysis");
                None
            }
        }
    }

    fn store_image(&self, image: Option<&[u8]>) -> WorkflowResult<Option<String>> {
        match image {
            Some(bytes) => Ok(Some(self.images.store(bytes)?)),
            None => Ok(None),
        }
    }

    fn generate_or_sentinel(&self, request: GenerationRequest) -> String {
        self.oracle.generate(&request).unwrap_or_else(|e| {
            warn!(error = %e, "Oracle unavailable");
            UNAVAILABLE_RESPONSE.to_string()
        })
    }
}

/// Prior diagnoses known for a record, as prompt text.
fn history_summary(record: &PatientRecord) -> String {
    let mut lines = Vec::new();
    if let Some(prev) = record.prev_diagnosis.as_deref().filter(|p| !p.is_empty()) {
        lines.push(format!("Previous visit: {}", prev));
    }
    if let Some(latest) = record.latest_diagnosis.as_deref().filter(|l| !l.is_empty()) {
        lines.push(format!("Current visit: {}", latest));
    }
    if lines.is_empty() {
        "No prior diagnoses recorded.".to_string()
    } else {
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::images::FsImageStore;
    use health_monitor_llm::{MockOracle, MISSING_SUGGESTIONS};

    const REPLY: &str = "Diagnosis: Viral pharyngitis.\n\nMedicine Suggestions: Paracetamol 500mg.";

    fn setup(
        oracle: MockOracle,
    ) -> (tempfile::TempDir, VisitWorkflow<Database, MockOracle, FsImageStore>) {
        let dir = tempfile::tempdir().unwrap();
        let images = FsImageStore::open(dir.path()).unwrap();
        let workflow = VisitWorkflow::new(Database::open_in_memory().unwrap(), oracle, images);
        (dir, workflow)
    }

    #[test]
    fn test_register_patient_diagnoses() {
        let (_dir, workflow) = setup(MockOracle::replying(REPLY));
        let outcome = workflow.register_patient("Alice", "sore throat", None).unwrap();

        assert_eq!(outcome.shape, Some(ResponseShape::Structured));
        assert_eq!(
            outcome.record.latest_diagnosis,
            Some("Viral pharyngitis.".into())
        );
        assert_eq!(
            outcome.record.medicine_suggestions,
            Some("Paracetamol 500mg.".into())
        );

        let stored = workflow.lifecycle().get(&outcome.record.id).unwrap();
        assert_eq!(stored, outcome.record);
    }

    #[test]
    fn test_oracle_failure_stores_placeholder() {
        let (_dir, workflow) = setup(MockOracle::failing("timeout"));
        let outcome = workflow.register_patient("Alice", "fever", None).unwrap();

        assert!(outcome.oracle_failed());
        assert_eq!(
            outcome.record.latest_diagnosis,
            Some(UNAVAILABLE_RESPONSE.into())
        );
        assert!(outcome.record.medicine_suggestions.is_none());
    }

    #[test]
    fn test_unstructured_reply_uses_placeholder_suggestions() {
        let (_dir, workflow) = setup(MockOracle::replying("Likely a cold."));
        let outcome = workflow.register_patient("Alice", "sneezing", None).unwrap();

        assert_eq!(outcome.shape, Some(ResponseShape::Unstructured));
        assert_eq!(outcome.record.latest_diagnosis, Some("Likely a cold.".into()));
        assert_eq!(
            outcome.record.medicine_suggestions,
            Some(MISSING_SUGGESTIONS.into())
        );
    }

    #[test]
    fn test_returning_visit_sends_previous_diagnosis() {
        let (_dir, workflow) = setup(MockOracle::replying(REPLY));
        let first = workflow.register_patient("Alice", "sore throat", None).unwrap();

        let second = workflow
            .returning_visit(&first.record.id, "earache", None)
            .unwrap();
        assert_eq!(
            second.record.prev_diagnosis,
            Some("Viral pharyngitis.".into())
        );

        let requests = workflow.oracle.requests();
        assert_eq!(requests.len(), 2);
        assert!(!requests[0].prompt.contains("Previous diagnosis information"));
        assert!(requests[1]
            .prompt
            .contains("Previous diagnosis information: Viral pharyngitis."));
        assert!(requests[1].prompt.contains("new symptoms: earache"));
    }

    #[test]
    fn test_returning_visit_unknown_id() {
        let (dir, workflow) = setup(MockOracle::replying(REPLY));
        let result = workflow.returning_visit("missing", "cough", Some(&b"image-bytes"[..]));
        assert!(matches!(
            result,
            Err(WorkflowError::Lifecycle(LifecycleError::NotFound(_)))
        ));
        assert!(workflow.oracle.requests().is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_rejected_visits_store_no_image() {
        let (dir, workflow) = setup(MockOracle::replying(REPLY));
        let jpeg = b"\xFF\xD8\xFFfirst";

        let result = workflow.register_patient("", "fever", Some(&jpeg[..]));
        assert!(matches!(
            result,
            Err(WorkflowError::Lifecycle(LifecycleError::Validation(_)))
        ));

        let record = workflow.register_patient("Alice", "fever", None).unwrap().record;
        let result = workflow.returning_visit(&record.id, "  ", Some(&b"\xFF\xD8\xFFsecond"[..]));
        assert!(matches!(
            result,
            Err(WorkflowError::Lifecycle(LifecycleError::Validation(_)))
        ));

        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        assert_eq!(workflow.oracle.requests().len(), 1);
    }

    #[test]
    fn test_empty_reply_stores_placeholder() {
        let (_dir, workflow) = setup(MockOracle::replying("Diagnosis:   \nMedicine Suggestions: Rest"));
        let outcome = workflow.register_patient("Alice", "fever", None).unwrap();

        assert!(outcome.oracle_failed());
        assert_eq!(
            outcome.record.latest_diagnosis,
            Some(UNAVAILABLE_RESPONSE.into())
        );
        assert_eq!(outcome.record.visit_state(), crate::models::VisitState::Diagnosed);

        let (_dir, workflow) = setup(MockOracle::replying(""));
        let outcome = workflow.register_patient("Bob", "cough", None).unwrap();
        assert_eq!(
            outcome.record.latest_diagnosis,
            Some(UNAVAILABLE_RESPONSE.into())
        );
    }

    #[test]
    fn test_image_is_attached() {
        let (_dir, workflow) = setup(MockOracle::replying(REPLY));
        let png = b"\x89PNG\r\n\x1a\npixels";
        let outcome = workflow.register_patient("Bob", "rash", Some(&png[..])).unwrap();

        let reference = outcome.record.image_reference.clone().unwrap();
        assert!(reference.ends_with(".png"));

        let requests = workflow.oracle.requests();
        let image = requests[0].image.as_ref().unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.data, png.to_vec());
        assert!(requests[0].prompt.contains("provided medical image"));
    }

    #[test]
    fn test_missing_image_falls_back_to_text() {
        let (_dir, workflow) = setup(MockOracle::replying(REPLY));
        let record = workflow
            .lifecycle()
            .create_record("Bob", "rash", Some(format!("{}.jpg", "a".repeat(64))))
            .unwrap();

        let outcome = workflow.diagnose(&record.id).unwrap();
        assert_eq!(outcome.shape, Some(ResponseShape::Structured));

        let requests = workflow.oracle.requests();
        assert!(requests[0].image.is_none());
        assert!(!requests[0].prompt.contains("provided medical image"));
    }

    #[test]
    fn test_health_advice() {
        let (_dir, workflow) = setup(MockOracle::replying("Exercise daily."));
        assert_eq!(workflow.health_advice("hypertension").unwrap(), "Exercise daily.");
        assert!(workflow.oracle.requests()[0]
            .prompt
            .contains("management strategies for hypertension"));

        assert!(matches!(
            workflow.health_advice("  "),
            Err(WorkflowError::Validation(_))
        ));
    }

    #[test]
    fn test_health_advice_oracle_failure() {
        let (_dir, workflow) = setup(MockOracle::failing("quota"));
        assert_eq!(
            workflow.health_advice("asthma").unwrap(),
            UNAVAILABLE_RESPONSE
        );
    }

    #[test]
    fn test_analyze_history() {
        let (_dir, workflow) = setup(MockOracle::replying(REPLY));
        let first = workflow.register_patient("Alice", "sore throat", None).unwrap();
        workflow.analyze_history(&first.record.id).unwrap();

        let requests = workflow.oracle.requests();
        let prompt = &requests[1].prompt;
        assert!(prompt.contains("Current symptoms: sore throat"));
        assert!(prompt.contains("Current visit: Viral pharyngitis."));
    }

    #[test]
    fn test_history_summary_empty() {
        let record = PatientRecord::new("Alice".into(), "fever".into(), None);
        assert_eq!(history_summary(&record), "No prior diagnoses recorded.");
    }
}
