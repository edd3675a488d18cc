//! Safety guards applied to the doctor's answer before assembly.

use std::sync::LazyLock;

use regex::Regex;
use tracing::info;

use crate::language::Language;
use crate::routing::Classification;

pub const ESCALATION_NOTICE: &str = "**This may be a medical emergency and is outside the scope of this \
guidance. Seek immediate professional medical attention: contact emergency services or go to the nearest \
emergency department now.**";

pub const LOW_CONFIDENCE_NOTE: &str = "_Note: some of the data needed for a full analysis is missing, so \
this analysis is incomplete and confidence in these insights is lower. Sharing the missing measurements \
would allow a more reliable assessment._";

pub const DIAGNOSIS_REDACTED: &str =
    "_A specific diagnosis requires an in-person evaluation by a licensed clinician._";

/// An instruction to get care now. Mentioning the word "emergency" is not enough.
static ESCALATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)seek (?:immediate|urgent|emergency|prompt) (?:medical|professional|care|help)|(?:get|seek) (?:medical|emergency) (?:help|care|attention) (?:immediately|right away|now)|(?:call|contact|dial) (?:911|112|999|emergency services|an ambulance|your local emergency number)|go to (?:the |an |your )?(?:nearest )?(?:emergency (?:room|department)|er\b|a&e|hospital)|urgent care|(?:see|consult) a (?:doctor|physician) (?:immediately|right away|now|today)",
    )
    .expect("escalation regex")
});

static CONFIDENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)confidence|incomplete|insufficient data|limited data|not enough data|missing data|data is missing")
        .expect("confidence regex")
});

static DIAGNOSIS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\byou (?:most likely |likely |probably |definitely |clearly )?(?:have|are having|are suffering from|suffer from) (?:a |an )?[\w\s-]{0,30}?(?:attack|tear|fracture|syndrome|disorder|disease|\w+itis)\b",
    )
    .expect("diagnosis regex")
});

pub fn has_escalation(text: &str) -> bool {
    ESCALATION.is_match(text)
}

pub fn states_confidence(text: &str) -> bool {
    CONFIDENCE.is_match(text)
}

/// Replaces lines that assert a diagnosis to the user.
fn redact_diagnoses(text: &str, replacement: &str) -> String {
    text.lines()
        .map(|line| {
            let lower = line.to_lowercase();
            if DIAGNOSIS.is_match(line) && !lower.contains("risk") {
                replacement
            } else {
                line
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Enforces the doctor's safety rules on its final answer.
///
/// Diagnostic assertions are replaced, emergencies without escalation language
/// get the escalation notice first, and answers built on one-sided data without
/// a confidence statement get the reduced-confidence note. Added notices are
/// written in `language`.
pub fn guard_doctor_answer(text: &str, classification: &Classification, language: Language) -> String {
    let mut guarded = redact_diagnoses(text, language.diagnosis_redacted());
    if guarded != text {
        info!("║     ⚑ Diagnostic statement replaced in doctor answer");
    }

    let notice = language.escalation_notice();
    if classification.emergency && !has_escalation(&guarded) && !guarded.contains(notice) {
        info!("║     ⚑ Escalation notice added to doctor answer");
        guarded = format!("{}\n\n{}", notice, guarded);
    }

    let note = language.low_confidence_note();
    if classification.insufficient_data && !states_confidence(&guarded) && !guarded.contains(note) {
        info!("║     ⚑ Reduced-confidence note added to doctor answer");
        guarded = format!("{}\n\n{}", guarded.trim_end(), note);
    }

    guarded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{classify, Domain};
    use health_core::Task;

    fn classification(emergency: bool, insufficient_data: bool) -> Classification {
        Classification {
            domains: vec![Domain::Medical],
            emergency,
            insufficient_data,
            ambiguous: false,
        }
    }

    #[test]
    fn emergency_answer_gets_escalation_first() {
        let out = guard_doctor_answer("Try to rest and hydrate.", &classification(true, false), Language::English);
        assert!(out.starts_with(ESCALATION_NOTICE));
        assert!(has_escalation(&out));
    }

    #[test]
    fn existing_escalation_is_left_alone() {
        let text = "Please seek immediate medical attention.";
        assert_eq!(guard_doctor_answer(text, &classification(true, false), Language::English), text);
    }

    #[test]
    fn insufficient_data_gets_confidence_note() {
        let out = guard_doctor_answer("Reduce volume this week.", &classification(false, true), Language::English);
        assert!(out.ends_with(LOW_CONFIDENCE_NOTE));

        let stated = "With limited data, reduce volume this week.";
        assert_eq!(guard_doctor_answer(stated, &classification(false, true), Language::English), stated);
    }

    #[test]
    fn diagnoses_are_replaced() {
        let text = "Top insight: load is high.\nYou probably have plantar fasciitis.\nRest today.";
        let out = guard_doctor_answer(text, &classification(false, false), Language::English);
        assert!(!out.contains("fasciitis"));
        assert!(out.contains(DIAGNOSIS_REDACTED));
        assert!(out.contains("Rest today."));

        let risk = "You have a higher risk of stress fracture when mileage jumps.";
        assert_eq!(guard_doctor_answer(risk, &classification(false, false), Language::English), risk);
    }

    #[test]
    fn mentioning_emergency_is_not_an_instruction() {
        assert!(!has_escalation("This is not an emergency, so rest and hydrate."));
        assert!(has_escalation("Call 911 if the pain spreads to your arm."));
        assert!(has_escalation("Go to the nearest emergency department."));
        assert!(has_escalation(ESCALATION_NOTICE));

        let out = guard_doctor_answer(
            "This is not an emergency, so rest and hydrate.",
            &classification(true, false),
            Language::English,
        );
        assert!(out.starts_with(ESCALATION_NOTICE));
    }

    #[test]
    fn notices_follow_the_answer_language() {
        let out = guard_doctor_answer("Descanse e hidrátese.", &classification(true, true), Language::Spanish);
        assert!(out.starts_with(Language::Spanish.escalation_notice()));
        assert!(out.ends_with(Language::Spanish.low_confidence_note()));

        let again = guard_doctor_answer(&out, &classification(true, true), Language::Spanish);
        assert_eq!(again, out);
    }

    #[test]
    fn chest_pain_scenario_escalates() {
        let c = classify(&Task::new("I have sharp chest pain and dizziness"));
        let out = guard_doctor_answer("Consider a lighter training day.", &c, Language::English);
        assert!(out.starts_with(ESCALATION_NOTICE));
    }
}
