//! Prompts for diagnosis, health advice and history analysis.
//!
//! The diagnosis prompts ask for the two sections that
//! [`parse_diagnosis_response`](crate::parse_diagnosis_response) splits on.

use crate::parser::{DIAGNOSIS_MARKER, MEDICINE_MARKER};

/// System prompt establishing the clinical assistant role.
pub const SYSTEM_PROMPT: &str = r#"You are a highly trained medical assistant with comprehensive clinical knowledge, capable of providing precise, actionable medical advice.
Your responses should reflect the communication style of a practicing clinician, prioritizing accuracy, clarity, and detail.
You are expected to provide well-structured responses, including differential diagnoses and medication recommendations.

Guidelines for your responses:
1. Clinical Tone: Respond as a medical professional, avoiding hedging language.
2. Diagnosis Section: Provide a differential diagnosis based on the provided symptoms. Include common, likely, and less likely but clinically significant conditions, along with key diagnostic criteria for each.
3. Medicine Suggestions Section: Include specific medication names, typical dosages, drug classes, and critical clinical considerations (contraindications, side effects, interactions) for each condition.
4. Clear Structure: Use consistent formatting with bullet points or subheadings.

Prioritize diagnostic analysis over medication suggestions, as accurate diagnosis is essential for proper treatment."#;

/// Preamble used when an image accompanies the symptoms.
pub const IMAGE_ANALYSIS_PREAMBLE: &str =
    "Analyze both the patient's reported symptoms AND the provided medical image.";

/// Closing instruction used when an image accompanies the symptoms.
pub const IMAGE_ANALYSIS_CLOSING: &str = "Additionally, identify any visible abnormalities in the image that may be relevant to the diagnosis. Correlate the visual findings with the reported symptoms.";

/// Inputs for a diagnosis prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagnosisContext {
    /// Symptoms for the current visit
    pub symptoms: String,
    /// Diagnosis from the previous visit, for continuity of care
    pub previous_diagnosis: Option<String>,
    /// Whether an image will be attached to the request
    pub with_image: bool,
}

/// User prompt for a diagnosis request.
pub fn make_diagnosis_prompt(context: &DiagnosisContext) -> String {
    let previous = context
        .previous_diagnosis
        .as_deref()
        .filter(|p| !p.trim().is_empty());

    let opening = match previous {
        Some(previous) => format!(
            "Analyze the following new symptoms: {}.\n\nPrevious diagnosis information: {}",
            context.symptoms, previous
        ),
        None => format!("Analyze the following symptoms: {}.", context.symptoms),
    };

    let basis = if previous.is_some() {
        "based on the provided symptoms and previous diagnosis"
    } else {
        "based on the provided symptoms"
    };

    let prompt = format!(
        r#"{opening}

Provide a comprehensive medical analysis with the following sections:

{DIAGNOSIS_MARKER}
- Provide a differential diagnosis, including at least three possible conditions that could manifest these symptoms.
- Clearly differentiate between conditions that are likely, less likely, and potentially serious but rare, {basis}.
- Include key diagnostic criteria for each condition and recommended follow-up assessments if necessary.

{MEDICINE_MARKER}
- Provide specific medication recommendations for each identified condition.
- Include the drug class, specific medication names, typical doses, common side effects, and important contraindications.
- Consider both symptomatic relief and disease-specific treatment options."#
    );

    if context.with_image {
        format!("{IMAGE_ANALYSIS_PREAMBLE}\n\n{prompt}\n\n{IMAGE_ANALYSIS_CLOSING}")
    } else {
        prompt
    }
}

/// User prompt for general management advice on a condition.
pub fn make_health_advice_prompt(condition: &str) -> String {
    format!(
        r#"Provide comprehensive management strategies for {} based on current clinical guidelines.

Include:
1. Evidence-based lifestyle modifications with specific recommendations.
2. Key monitoring parameters and their target ranges.
3. Warning signs that necessitate immediate medical attention.
4. Preventive measures to avoid complications or exacerbations.
5. Self-management techniques that patients can implement.
6. Medication adherence considerations (without prescribing specific medications).

Present the information in a structured format with clear headings and bullet points."#,
        condition
    )
}

/// User prompt analysing current symptoms against prior history.
pub fn make_history_analysis_prompt(symptoms: &str, history: &str) -> String {
    format!(
        r#"Analyze this clinical scenario in detail:

Current symptoms: {}
Medical history: {}

Provide a comprehensive clinical analysis with:
1. A differential diagnosis listing possible conditions in order of likelihood.
2. Supporting evidence for each condition based on the presented symptoms and history.
3. Specific factors that would rule out each condition.
4. Recommended diagnostic approach: physical examination findings, laboratory or imaging studies, monitoring parameters.
5. Potential interactions between current symptoms and previous medical conditions.
6. Long-term management considerations based on the complete clinical picture."#,
        symptoms, history
    )
}

/// Prefix a user prompt with the system prompt.
pub fn build_full_prompt(user_prompt: &str) -> String {
    format!("{}\n\n{}", SYSTEM_PROMPT, user_prompt)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(symptoms: &str, previous: Option<&str>) -> DiagnosisContext {
        DiagnosisContext {
            symptoms: symptoms.to_string(),
            previous_diagnosis: previous.map(str::to_string),
            with_image: false,
        }
    }

    #[test]
    fn test_diagnosis_prompt_new_patient() {
        let prompt = make_diagnosis_prompt(&context("fever and cough", None));
        assert!(prompt.starts_with("Analyze the following symptoms: fever and cough."));
        assert!(prompt.contains(DIAGNOSIS_MARKER));
        assert!(prompt.contains(MEDICINE_MARKER));
        assert!(!prompt.contains("Previous diagnosis"));
    }

    #[test]
    fn test_diagnosis_prompt_returning_patient() {
        let prompt = make_diagnosis_prompt(&context("sore throat", Some("Influenza")));
        assert!(prompt.contains("new symptoms: sore throat"));
        assert!(prompt.contains("Previous diagnosis information: Influenza"));
        assert!(prompt.contains("symptoms and previous diagnosis"));
    }

    #[test]
    fn test_blank_previous_diagnosis_is_ignored() {
        let prompt = make_diagnosis_prompt(&context("rash", Some("   ")));
        assert!(!prompt.contains("Previous diagnosis"));
    }

    #[test]
    fn test_diagnosis_prompt_with_image() {
        let mut ctx = context("skin lesion", None);
        ctx.with_image = true;
        let prompt = make_diagnosis_prompt(&ctx);
        assert!(prompt.starts_with(IMAGE_ANALYSIS_PREAMBLE));
        assert!(prompt.ends_with(IMAGE_ANALYSIS_CLOSING));
    }

    #[test]
    fn test_health_advice_prompt() {
        let prompt = make_health_advice_prompt("type 2 diabetes");
        assert!(prompt.contains("management strategies for type 2 diabetes"));
    }

    #[test]
    fn test_history_prompt() {
        let prompt = make_history_analysis_prompt("chest pain", "Hypertension");
        assert!(prompt.contains("Current symptoms: chest pain"));
        assert!(prompt.contains("Medical history: Hypertension"));
    }

    #[test]
    fn test_full_prompt() {
        let prompt = build_full_prompt("Test request");
        assert!(prompt.starts_with(SYSTEM_PROMPT));
        assert!(prompt.ends_with("Test request"));
    }
}
