//! Keyword routing of a task to the doctor and/or coach specialists.

use std::fmt;

use health_config::DispatchMode;
use health_core::Task;
use serde::Serialize;

use crate::specialist::SpecialistRole;

/// Phrases that suggest a possible medical emergency.
const RED_FLAGS: &[&str] = &[
    "chest pain",
    "chest tightness",
    "dizziness",
    "dizzy",
    "numbness",
    "numb",
    "severe",
    "persistent pain",
    "shortness of breath",
    "can't breathe",
    "cannot breathe",
    "faint",
    "passed out",
    "slurred speech",
    "coughing blood",
    "coughing up blood",
    "dolor en el pecho",
    "dolor de pecho",
    "mareo",
    "falta de aire",
    "douleur thoracique",
    "douleur à la poitrine",
    "vertige",
    "brustschmerz",
    "schwindel",
    "atemnot",
    "dor no peito",
    "tontura",
    "dolore al petto",
    "vertigini",
];

const MEDICAL_KEYWORDS: &[&str] = &[
    "symptom",
    "pain",
    "hurt",
    "ache",
    "diagnos",
    "doctor",
    "physician",
    "medication",
    "medicine",
    "disease",
    "condition",
    "injury",
    "injured",
    "treatment",
    "fever",
    "blood pressure",
    "heart rate",
    "swelling",
    "infection",
    "overreaching",
    "overtraining",
    "rash",
    "headache",
    "nausea",
    "dolor",
    "médico",
    "douleur",
    "médecin",
    "schmerz",
    "arzt",
];

const COACHING_KEYWORDS: &[&str] = &[
    "sleep",
    "workout",
    "exercise",
    "training",
    "fitness",
    "nutrition",
    "diet",
    "recovery",
    "weight",
    "habit",
    "motivation",
    "protein",
    "meal",
    "run",
    "strength",
    "stretch",
    "lifestyle",
    "wellness",
    "stress",
    "hydration",
    "dormir",
    "sueño",
    "entrenamiento",
    "ejercicio",
    "sommeil",
    "entraînement",
    "schlaf",
    "treino",
    "allenamento",
];

/// Terms describing training load; analysis of these needs a recovery signal too.
const LOAD_TERMS: &[&str] = &["training load", "mileage", "volume", "intensity", "training more", "load"];
const RECOVERY_TERMS: &[&str] = &["sleep", "hrv", "heart rate variability", "readiness"];

/// Subjective state; needs an objective marker to correlate against.
const SUBJECTIVE_TERMS: &[&str] = &["i feel", "feeling", "tired", "exhausted", "fatigue", "sore"];
const OBJECTIVE_TERMS: &[&str] = &["resting heart rate", "rhr", "hrv", "heart rate variability", "readiness score"];

/// A specialist area a task touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Medical,
    Coaching,
}

/// Result of classifying a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Domains to consult, medical first.
    pub domains: Vec<Domain>,
    /// Red-flag language was found.
    pub emergency: bool,
    /// Only one side of a correlated pair of metrics was provided.
    pub insufficient_data: bool,
    /// No keyword matched; both domains are consulted.
    pub ambiguous: bool,
}

impl Classification {
    pub fn involves(&self, domain: Domain) -> bool {
        self.domains.contains(&domain)
    }
}

fn mentions(text: &str, terms: &[&str]) -> bool {
    terms.iter().any(|t| contains_term(text, t))
}

/// Prefix match on word boundaries, so "run" matches "running" but not "prune".
fn contains_term(text: &str, term: &str) -> bool {
    text.match_indices(term).any(|(idx, _)| {
        idx == 0 || !text[..idx].chars().next_back().is_some_and(char::is_alphanumeric)
    })
}

fn one_sided(text: &str, left: &[&str], right: &[&str]) -> bool {
    mentions(text, left) && !mentions(text, right)
}

/// Classifies a task by keyword. Pure and deterministic.
pub fn classify(task: &Task) -> Classification {
    let text = task.searchable_text();

    let emergency = mentions(&text, RED_FLAGS);
    let medical = emergency || mentions(&text, MEDICAL_KEYWORDS);
    let coaching = mentions(&text, COACHING_KEYWORDS);
    let ambiguous = !medical && !coaching;

    let mut domains = Vec::with_capacity(2);
    if medical || ambiguous {
        domains.push(Domain::Medical);
    }
    if coaching || ambiguous {
        domains.push(Domain::Coaching);
    }

    let insufficient_data = one_sided(&text, LOAD_TERMS, RECOVERY_TERMS)
        || one_sided(&text, SUBJECTIVE_TERMS, OBJECTIVE_TERMS);

    Classification { domains, emergency, insufficient_data, ambiguous }
}

/// Which specialists run, and how.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingDecision {
    DoctorOnly,
    CoachOnly,
    BothParallel,
    /// Doctor first; the coach sees the doctor's findings.
    BothSequential,
}

impl RoutingDecision {
    pub fn decide(classification: &Classification, mode: DispatchMode) -> Self {
        let medical = classification.involves(Domain::Medical);
        let coaching = classification.involves(Domain::Coaching);

        match (medical, coaching) {
            (true, false) => RoutingDecision::DoctorOnly,
            (false, true) => RoutingDecision::CoachOnly,
            _ => match mode {
                DispatchMode::Parallel => RoutingDecision::BothParallel,
                DispatchMode::Sequential => RoutingDecision::BothSequential,
            },
        }
    }

    /// Roles to dispatch, in section order.
    pub fn roles(&self) -> &'static [SpecialistRole] {
        match self {
            RoutingDecision::DoctorOnly => &[SpecialistRole::Doctor],
            RoutingDecision::CoachOnly => &[SpecialistRole::Coach],
            RoutingDecision::BothParallel | RoutingDecision::BothSequential => {
                &[SpecialistRole::Doctor, SpecialistRole::Coach]
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingDecision::DoctorOnly => "doctor_only",
            RoutingDecision::CoachOnly => "coach_only",
            RoutingDecision::BothParallel => "both_parallel",
            RoutingDecision::BothSequential => "both_sequential",
        }
    }
}

impl fmt::Display for RoutingDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use health_core::Message;

    fn route(question: &str) -> (Classification, RoutingDecision) {
        let c = classify(&Task::new(question));
        let d = RoutingDecision::decide(&c, DispatchMode::Parallel);
        (c, d)
    }

    #[test]
    fn sleep_tips_go_to_coach() {
        let (c, d) = route("What are 3 tips to improve sleep?");
        assert_eq!(d, RoutingDecision::CoachOnly);
        assert!(!c.emergency);
    }

    #[test]
    fn chest_pain_is_an_emergency_for_the_doctor() {
        let (c, d) = route("I have sharp chest pain and dizziness");
        assert!(c.emergency);
        assert!(c.involves(Domain::Medical));
        assert_eq!(d, RoutingDecision::DoctorOnly);
    }

    #[test]
    fn red_flags_force_doctor_even_in_coaching_questions() {
        let (c, d) = route("I got dizzy during my workout, how should I adjust my training?");
        assert!(c.emergency);
        assert_eq!(d, RoutingDecision::BothParallel);
    }

    #[test]
    fn mixed_question_dispatches_both() {
        let (c, d) =
            route("How does poor sleep affect my recovery and should I see a doctor about my knee pain?");
        assert_eq!(c.domains, vec![Domain::Medical, Domain::Coaching]);
        assert_eq!(d, RoutingDecision::BothParallel);
        assert_eq!(d.roles(), &[SpecialistRole::Doctor, SpecialistRole::Coach]);
    }

    #[test]
    fn sequential_mode_runs_both_in_order() {
        let c = classify(&Task::new("Is my knee pain from my running plan?"));
        assert_eq!(RoutingDecision::decide(&c, DispatchMode::Sequential), RoutingDecision::BothSequential);
    }

    #[test]
    fn unmatched_question_is_ambiguous() {
        let (c, d) = route("Any thoughts?");
        assert!(c.ambiguous);
        assert_eq!(d, RoutingDecision::BothParallel);
    }

    #[test]
    fn routes_non_english_questions() {
        let (c, d) = route("¿Cuáles son 3 consejos para dormir mejor?");
        assert!(!c.emergency);
        assert_eq!(d, RoutingDecision::CoachOnly);

        let (c, d) = route("Tengo dolor en el pecho y mareo");
        assert!(c.emergency);
        assert_eq!(d, RoutingDecision::DoctorOnly);

        let (c, _) = route("J'ai une douleur thoracique depuis ce matin");
        assert!(c.emergency);
    }

    #[test]
    fn words_match_on_boundaries() {
        assert!(contains_term("i go running daily", "run"));
        assert!(!contains_term("how to prune roses", "run"));
    }

    #[test]
    fn one_sided_metrics_mark_insufficient_data() {
        let (c, _) = route("My training load doubled this week. Am I overreaching?");
        assert!(c.insufficient_data);

        let (c, _) = route("My training load doubled and my sleep dropped to 5 hours. Am I overreaching?");
        assert!(!c.insufficient_data);

        let (c, _) = route("I feel exhausted but my resting heart rate is normal");
        assert!(!c.insufficient_data);
    }

    #[test]
    fn history_is_considered() {
        let task = Task {
            question: "What should I do about it?".into(),
            history: vec![Message::user("My ankle has been swelling after runs")],
        };
        let c = classify(&task);
        assert!(c.involves(Domain::Medical));
    }
}
