//! Patient record model and its per-visit state transitions.

use serde::{Deserialize, Serialize};

use health_monitor_llm::DiagnosisContext;

/// Where a record stands in the current visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VisitState {
    /// Symptoms recorded, no diagnosis yet
    AwaitingDiagnosis,
    /// Diagnosis stored for the current symptoms
    Diagnosed,
}

/// A patient record, one per patient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientRecord {
    /// UUID, assigned at creation
    pub id: String,
    /// Display name (not unique)
    pub name: String,
    /// Date of first visit (YYYY-MM-DD)
    pub joining_date: String,
    /// Symptoms for the current visit
    pub symptoms: String,
    /// Diagnosis from the previous visit
    pub prev_diagnosis: Option<String>,
    /// Diagnosis for the current visit
    pub latest_diagnosis: Option<String>,
    /// Medicine suggestions extracted with the latest diagnosis
    pub medicine_suggestions: Option<String>,
    /// Opaque image store reference for the current visit
    pub image_reference: Option<String>,
    /// Creation timestamp
    pub created_at: String,
    /// Last update timestamp
    pub updated_at: String,
}

/// What the oracle needs to know about a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptContext {
    pub symptoms: String,
    pub prev_diagnosis: Option<String>,
    pub image_reference: Option<String>,
}

impl PromptContext {
    /// Diagnosis prompt inputs; `with_image` reflects whether the image was actually loaded.
    pub fn diagnosis_context(&self, with_image: bool) -> DiagnosisContext {
        DiagnosisContext {
            symptoms: self.symptoms.clone(),
            previous_diagnosis: self.prev_diagnosis.clone(),
            with_image,
        }
    }
}

impl PatientRecord {
    /// Create a new record for a first visit.
    pub fn new(name: String, symptoms: String, image_reference: Option<String>) -> Self {
        let now = chrono::Utc::now();
        let timestamp = now.to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            joining_date: now.format("%Y-%m-%d").to_string(),
            symptoms,
            prev_diagnosis: None,
            latest_diagnosis: None,
            medicine_suggestions: None,
            image_reference,
            created_at: timestamp.clone(),
            updated_at: timestamp,
        }
    }

    pub fn visit_state(&self) -> VisitState {
        if non_empty(&self.latest_diagnosis).is_some() {
            VisitState::Diagnosed
        } else {
            VisitState::AwaitingDiagnosis
        }
    }

    /// Start a new visit: the current diagnosis rolls into `prev_diagnosis`
    /// (depth 1) and the diagnosis fields are cleared until the oracle answers.
    pub fn roll_forward(&mut self, symptoms: String, image_reference: Option<String>) {
        if let Some(latest) = non_empty(&self.latest_diagnosis) {
            self.prev_diagnosis = Some(latest.to_string());
        }
        self.symptoms = symptoms;
        self.latest_diagnosis = None;
        self.medicine_suggestions = None;
        if image_reference.is_some() {
            self.image_reference = image_reference;
        }
        self.touch();
    }

    /// Store a diagnosis. Suggestions are only overwritten when non-empty.
    pub fn apply_diagnosis(&mut self, diagnosis: String, medicine_suggestions: Option<String>) {
        self.latest_diagnosis = Some(diagnosis);
        if let Some(suggestions) = medicine_suggestions.filter(|s| !s.is_empty()) {
            self.medicine_suggestions = Some(suggestions);
        }
        self.touch();
    }

    pub fn prompt_context(&self) -> PromptContext {
        PromptContext {
            symptoms: self.symptoms.clone(),
            prev_diagnosis: non_empty(&self.prev_diagnosis).map(str::to_string),
            image_reference: self.image_reference.clone(),
        }
    }

    /// Touch the updated_at timestamp.
    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
