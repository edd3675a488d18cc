//! Builds the final markdown document from specialist answers.

use std::sync::LazyLock;

use health_core::{AgentError, SourceRef};
use regex::Regex;

use crate::citations::{self, CitationIndex};
use crate::language::Language;
use crate::specialist::SpecialistRole;

pub const EMERGENCY_NOTICE: &str = "> **⚠ Seek emergency care now.** The symptoms described can signal a \
medical emergency. Call your local emergency number or go to the nearest emergency department immediately. \
Do not wait for online guidance.";

pub const MEDICAL_DISCLAIMER: &str = "> **Disclaimer:** This information is for general education and is \
not a substitute for professional medical advice, diagnosis, or treatment. Consult a qualified healthcare \
provider about your specific situation.";

pub const MISSING_SECTION_TITLE: &str = "Missing Perspective";

const TITLE_MAX_CHARS: usize = 100;

static HEADING_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<hashes>#{1,6})\s+(?P<text>.*)$").expect("heading regex"));

/// One role's contribution: its answer, or why it is missing.
#[derive(Debug, Clone, PartialEq)]
pub enum Contribution {
    Answer(String),
    Missing(String),
}

/// A finished document and the sources it cites, in citation order.
#[derive(Debug, Clone, PartialEq)]
pub struct Assembled {
    pub document: String,
    pub sources: Vec<SourceRef>,
}

/// Escapes square brackets so caller text never reads as a citation marker.
fn escape_brackets(text: &str) -> String {
    text.replace('[', "\\[").replace(']', "\\]")
}

/// Title line derived from the question.
fn title_for(question: &str) -> String {
    let first_line = question.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("Health guidance");
    let clean = first_line.trim_start_matches('#').trim();
    if clean.chars().count() <= TITLE_MAX_CHARS {
        return escape_brackets(clean);
    }
    let cut: String = clean.chars().take(TITLE_MAX_CHARS).collect();
    format!("{}...", escape_brackets(cut.trim_end()))
}

/// Shifts headings so the shallowest one sits at `top` (capped at level 6).
///
/// Lines inside fenced code blocks are left alone.
pub fn demote_headings(text: &str, top: usize) -> String {
    let mut in_fence = false;
    let shallowest = text
        .lines()
        .filter(|line| {
            if line.trim_start().starts_with("```") {
                in_fence = !in_fence;
                return false;
            }
            !in_fence
        })
        .filter_map(|line| HEADING_LINE.captures(line).map(|c| c["hashes"].len()))
        .min();

    let Some(shallowest) = shallowest else {
        return text.to_string();
    };
    if shallowest >= top {
        return text.to_string();
    }
    let shift = top - shallowest;

    in_fence = false;
    text.lines()
        .map(|line| {
            if line.trim_start().starts_with("```") {
                in_fence = !in_fence;
                return line.to_string();
            }
            if in_fence {
                return line.to_string();
            }
            match HEADING_LINE.captures(line) {
                Some(caps) => {
                    let level = (caps["hashes"].len() + shift).min(6);
                    format!("{} {}", "#".repeat(level), &caps["text"])
                }
                None => line.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Assembles the response document, with fixed strings in `language`.
///
/// Sections follow [`SpecialistRole::ALL`] order regardless of the order in
/// `contributions`, so citation numbers do not depend on completion order.
pub fn assemble(
    question: &str,
    emergency: bool,
    language: Language,
    contributions: &[(SpecialistRole, Contribution)],
) -> Result<Assembled, AgentError> {
    let mut index = CitationIndex::new();
    let mut parts: Vec<String> = Vec::new();
    let mut missing: Vec<(SpecialistRole, &str)> = Vec::new();
    let mut doctor_contributed = false;

    if emergency {
        parts.push(language.emergency_notice().to_string());
    }
    parts.push(format!("# {}", title_for(question)));

    for role in SpecialistRole::ALL {
        let Some((_, contribution)) = contributions.iter().find(|(r, _)| *r == role) else {
            continue;
        };
        match contribution {
            Contribution::Answer(text) => {
                doctor_contributed |= role == SpecialistRole::Doctor;
                parts.push(format!("## {}", language.section_title(role)));
                parts.push(render_section(text, &mut index));
            }
            Contribution::Missing(reason) => missing.push((role, reason.as_str())),
        }
    }

    if !missing.is_empty() {
        parts.push(format!("## {}", language.missing_title()));
        let lines: Vec<String> = missing
            .iter()
            .map(|(role, reason)| language.missing_line(*role, &escape_brackets(reason)))
            .collect();
        parts.push(lines.join("\n"));
    }

    if doctor_contributed {
        parts.push(language.disclaimer().to_string());
    }
    if let Some(sources) = index.render_sources() {
        parts.push(sources);
    }

    let document = parts.join("\n\n") + "\n";
    validate_document(&document, emergency, language)?;

    Ok(Assembled { document, sources: index.sources().to_vec() })
}

/// One specialist's body: own sources folded into the global index, headings demoted.
fn render_section(text: &str, index: &mut CitationIndex) -> String {
    let (body, local) = citations::split_sources(text);
    let body = demote_headings(body.trim(), 3);
    let rewritten = index.rewrite(&body, &local);

    let unused: Vec<SourceRef> = local
        .iter()
        .filter(|l| !rewritten.used_local.contains(&l.number))
        .map(|l| l.source.clone())
        .collect();

    match citations::further_reading(&unused) {
        Some(line) => format!("{}\n\n{}", rewritten.text, index.rewrite(&line, &[]).text),
        None => rewritten.text,
    }
}

/// Checks the structural contract of a response document.
///
/// Requires a `#` title, valid citation numbering, and, for emergencies, the
/// emergency notice in `language` ahead of everything else.
pub fn validate_document(document: &str, emergency: bool, language: Language) -> Result<(), AgentError> {
    if emergency && !document.trim_start().starts_with(language.emergency_notice()) {
        return Err(AgentError::MalformedOutput("emergency notice must come first".into()));
    }
    if !document.lines().any(|l| l.starts_with("# ")) {
        return Err(AgentError::MalformedOutput("document has no title".into()));
    }
    citations::validate_citations(document)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(text: &str) -> Contribution {
        Contribution::Answer(text.to_string())
    }

    #[test]
    fn demotes_specialist_headings() {
        let text = "# Report\n## Findings\ntext\n```\n# not a heading\n```";
        let out = demote_headings(text, 3);
        assert!(out.starts_with("### Report\n#### Findings"));
        assert!(out.contains("# not a heading"));
        assert_eq!(demote_headings("### Already deep", 3), "### Already deep");
    }

    #[test]
    fn sections_follow_role_order_and_share_numbering() {
        let contributions = vec![
            (SpecialistRole::Coach, answer("Keep a schedule [1].\n\n## Sources\n[1] Sleep Foundation: https://sleepfoundation.org/schedule")),
            (SpecialistRole::Doctor, answer("See [NIH](https://nih.gov/sleep) and [Sleep Foundation](https://sleepfoundation.org/schedule/).")),
        ];
        let out = assemble("How does poor sleep affect recovery?", false, Language::English, &contributions).unwrap();
        let doc = &out.document;

        let medical = doc.find("## Medical Perspective").unwrap();
        let coaching = doc.find("## Coaching Perspective").unwrap();
        assert!(medical < coaching);

        assert!(doc.contains("[NIH](https://nih.gov/sleep) [1]"));
        assert!(doc.contains("Keep a schedule [2]."));
        assert!(doc.contains("- [1] NIH: https://nih.gov/sleep"));
        assert!(doc.contains("- [2] Sleep Foundation: https://sleepfoundation.org/schedule"));
        assert!(!doc.contains("- [3]"));
        assert_eq!(out.sources.len(), 2);
        assert!(doc.contains(MEDICAL_DISCLAIMER));
    }

    #[test]
    fn emergency_notice_precedes_title() {
        let out = assemble("I have sharp chest pain", true, Language::English, &[(SpecialistRole::Doctor, answer("Call now."))]).unwrap();
        assert!(out.document.starts_with(EMERGENCY_NOTICE));
        let title = out.document.find("# I have sharp chest pain").unwrap();
        assert!(title > EMERGENCY_NOTICE.len());
    }

    #[test]
    fn degraded_response_names_missing_perspective() {
        let contributions = vec![
            (SpecialistRole::Doctor, Contribution::Missing("search service unavailable".into())),
            (SpecialistRole::Coach, answer("Walk daily.")),
        ];
        let out = assemble("knee pain and running plan", false, Language::English, &contributions).unwrap();
        assert!(out.document.contains("## Missing Perspective"));
        assert!(out.document.contains("medical perspective could not be included (search service unavailable)"));
        assert!(!out.document.contains(MEDICAL_DISCLAIMER));
        assert!(!out.document.contains("### Sources"));
    }

    #[test]
    fn uncited_local_sources_become_further_reading() {
        let text = "Eat protein.\n\n**References:**\n- [USDA](https://usda.gov/protein)";
        let out = assemble("protein intake?", false, Language::English, &[(SpecialistRole::Coach, answer(text))]).unwrap();
        assert!(out.document.contains("Further reading: [USDA](https://usda.gov/protein) [1]"));
        assert!(out.document.contains("- [1] USDA: https://usda.gov/protein"));
    }

    #[test]
    fn validation_rejects_broken_documents() {
        let en = Language::English;
        assert!(validate_document("# T\n\nok", false, en).is_ok());
        assert!(validate_document("# T\n\nok", true, en).is_err());
        assert!(validate_document("no title", false, en).is_err());
        assert!(validate_document("# T\n\nclaim [2]\n\n### Sources\n\n- [1] A: https://a.org", false, en).is_err());
        let spanish = format!("{}\n\n# T\n\nok", Language::Spanish.emergency_notice());
        assert!(validate_document(&spanish, true, Language::Spanish).is_ok());
        assert!(validate_document(&spanish, true, en).is_err());
    }

    #[test]
    fn bracketed_numbers_in_the_question_are_not_citations() {
        let out = assemble(
            "You cited [2] earlier, can you explain more about sleep?",
            false,
            Language::English,
            &[(SpecialistRole::Coach, answer("Keep a fixed wake time."))],
        )
        .unwrap();
        assert!(out.document.starts_with("# You cited \\[2\\] earlier"));
        assert!(out.sources.is_empty());

        let degraded = assemble(
            "sleep plan",
            false,
            Language::English,
            &[
                (SpecialistRole::Doctor, Contribution::Missing("citation [3] has no matching source".into())),
                (SpecialistRole::Coach, answer("Walk daily.")),
            ],
        );
        assert!(degraded.is_ok());
    }

    #[test]
    fn fixed_strings_follow_the_question_language() {
        let contributions = vec![
            (SpecialistRole::Doctor, answer("Consulte a su médico si el dolor persiste.")),
            (SpecialistRole::Coach, Contribution::Missing("tiempo de espera".into())),
        ];
        let out = assemble("¿Cómo afecta el sueño a mi rodilla?", true, Language::Spanish, &contributions).unwrap();
        let doc = &out.document;
        assert!(doc.starts_with(Language::Spanish.emergency_notice()));
        assert!(doc.contains("## Perspectiva médica"));
        assert!(doc.contains("## Perspectiva ausente"));
        assert!(doc.contains("No se pudo incluir la perspectiva de entrenamiento (tiempo de espera)"));
        assert!(doc.contains(Language::Spanish.disclaimer()));
        assert!(!doc.contains("Perspective"));
        assert!(!doc.contains(MEDICAL_DISCLAIMER));
    }

    #[test]
    fn long_questions_are_shortened_for_the_title() {
        let title = title_for(&"a".repeat(300));
        assert!(title.ends_with("..."));
        assert_eq!(title.chars().count(), TITLE_MAX_CHARS + 3);
    }
}
