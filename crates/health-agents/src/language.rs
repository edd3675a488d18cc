//! Response language: detection from the question and the fixed strings the
//! coordinator adds around specialist answers.
//!
//! Questions in an unsupported language fall back to English fixed strings;
//! specialist text follows the caller's language either way.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::assembly::{EMERGENCY_NOTICE, MEDICAL_DISCLAIMER, MISSING_SECTION_TITLE};
use crate::policy::{DIAGNOSIS_REDACTED, ESCALATION_NOTICE, LOW_CONFIDENCE_NOTE};
use crate::specialist::SpecialistRole;

/// Score a non-English language needs before it wins over English.
const MIN_SCORE: usize = 2;

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\p{L}+").expect("word regex"));

const ENGLISH_WORDS: &[&str] = &[
    "the", "and", "is", "are", "what", "how", "should", "my", "to", "of", "for", "with", "do", "does",
    "can", "you", "about", "after", "have", "this", "that", "it", "in", "on", "me", "when", "why", "which",
];

const SPANISH_WORDS: &[&str] = &[
    "el", "la", "los", "las", "de", "que", "y", "en", "para", "por", "con", "cómo", "qué", "cuáles",
    "cuál", "son", "es", "mi", "mis", "del", "al", "puedo", "debo", "tengo", "mejor", "sobre", "pero",
    "muy", "más", "consejos", "hago", "estoy",
];

const FRENCH_WORDS: &[&str] = &[
    "le", "la", "les", "des", "du", "et", "est", "je", "mon", "ma", "mes", "pour", "avec", "comment",
    "quels", "quelles", "quel", "sont", "une", "dans", "pas", "sur", "que", "qui", "mieux", "ai", "suis",
    "mon", "conseils",
];

const GERMAN_WORDS: &[&str] = &[
    "der", "die", "das", "und", "ist", "ich", "mein", "meine", "wie", "was", "für", "mit", "nicht",
    "ein", "eine", "zu", "auf", "sind", "kann", "soll", "sollte", "besser", "habe", "bei", "tipps",
];

const PORTUGUESE_WORDS: &[&str] = &[
    "o", "os", "as", "do", "da", "dos", "das", "que", "e", "é", "para", "com", "como", "quais", "são",
    "meu", "minha", "um", "uma", "não", "em", "no", "na", "posso", "devo", "tenho", "melhor", "dicas",
];

const ITALIAN_WORDS: &[&str] = &[
    "il", "lo", "gli", "le", "di", "che", "e", "è", "per", "con", "come", "quali", "sono", "mio", "mia",
    "un", "una", "non", "nel", "della", "del", "posso", "devo", "ho", "meglio", "consigli",
];

/// Languages with localized fixed strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum Language {
    #[default]
    #[serde(rename = "en")]
    English,
    #[serde(rename = "es")]
    Spanish,
    #[serde(rename = "fr")]
    French,
    #[serde(rename = "de")]
    German,
    #[serde(rename = "pt")]
    Portuguese,
    #[serde(rename = "it")]
    Italian,
}

impl Language {
    const CANDIDATES: [Language; 5] = [
        Language::Spanish,
        Language::French,
        Language::German,
        Language::Portuguese,
        Language::Italian,
    ];

    /// Guesses the language of `text` from common function words.
    ///
    /// Deterministic; anything without clear evidence is English.
    pub fn detect(text: &str) -> Language {
        let lower = text.to_lowercase();
        let words: Vec<&str> = WORD.find_iter(&lower).map(|m| m.as_str()).collect();
        let score = |vocabulary: &[&str]| words.iter().filter(|w| vocabulary.contains(*w)).count();

        let english = score(ENGLISH_WORDS);
        let best = Self::CANDIDATES
            .iter()
            .map(|&lang| (lang, score(lang.vocabulary()) + lang.script_bonus(&lower)))
            .fold(None, |best: Option<(Language, usize)>, (lang, s)| match best {
                Some((_, top)) if top >= s => best,
                _ => Some((lang, s)),
            });

        match best {
            Some((lang, s)) if s >= MIN_SCORE && s > english => lang,
            _ => Language::English,
        }
    }

    fn vocabulary(&self) -> &'static [&'static str] {
        match self {
            Language::English => ENGLISH_WORDS,
            Language::Spanish => SPANISH_WORDS,
            Language::French => FRENCH_WORDS,
            Language::German => GERMAN_WORDS,
            Language::Portuguese => PORTUGUESE_WORDS,
            Language::Italian => ITALIAN_WORDS,
        }
    }

    /// Characters only one candidate uses.
    fn script_bonus(&self, text: &str) -> usize {
        let marks: &[char] = match self {
            Language::Spanish => &['¿', '¡', 'ñ'],
            Language::German => &['ß'],
            Language::Portuguese => &['ã', 'õ'],
            _ => &[],
        };
        if text.contains(marks) {
            2
        } else {
            0
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Spanish => "es",
            Language::French => "fr",
            Language::German => "de",
            Language::Portuguese => "pt",
            Language::Italian => "it",
        }
    }

    /// Header of a role's section in the final document.
    pub fn section_title(&self, role: SpecialistRole) -> &'static str {
        use crate::specialist::SpecialistRole::{Coach, Doctor};
        match (self, role) {
            (Language::English, Doctor) => "Medical Perspective",
            (Language::English, Coach) => "Coaching Perspective",
            (Language::Spanish, Doctor) => "Perspectiva médica",
            (Language::Spanish, Coach) => "Perspectiva de entrenamiento",
            (Language::French, Doctor) => "Perspective médicale",
            (Language::French, Coach) => "Perspective de coaching",
            (Language::German, Doctor) => "Medizinische Perspektive",
            (Language::German, Coach) => "Coaching-Perspektive",
            (Language::Portuguese, Doctor) => "Perspectiva médica",
            (Language::Portuguese, Coach) => "Perspectiva de treino",
            (Language::Italian, Doctor) => "Prospettiva medica",
            (Language::Italian, Coach) => "Prospettiva di coaching",
        }
    }

    pub fn missing_title(&self) -> &'static str {
        match self {
            Language::English => MISSING_SECTION_TITLE,
            Language::Spanish => "Perspectiva ausente",
            Language::French => "Perspective manquante",
            Language::German => "Fehlende Perspektive",
            Language::Portuguese => "Perspectiva em falta",
            Language::Italian => "Prospettiva mancante",
        }
    }

    /// One bullet under the missing-perspective section.
    pub fn missing_line(&self, role: SpecialistRole, reason: &str) -> String {
        let doctor = role == SpecialistRole::Doctor;
        match self {
            Language::English => format!(
                "- The {} could not be included ({}). This answer covers only part of the question.",
                if doctor { "medical perspective" } else { "coaching perspective" },
                reason
            ),
            Language::Spanish => format!(
                "- No se pudo incluir la {} ({}). Esta respuesta cubre solo una parte de la pregunta.",
                if doctor { "perspectiva médica" } else { "perspectiva de entrenamiento" },
                reason
            ),
            Language::French => format!(
                "- La {} n'a pas pu être incluse ({}). Cette réponse ne couvre qu'une partie de la question.",
                if doctor { "perspective médicale" } else { "perspective de coaching" },
                reason
            ),
            Language::German => format!(
                "- Die {} konnte nicht aufgenommen werden ({}). Diese Antwort deckt nur einen Teil der Frage ab.",
                if doctor { "medizinische Perspektive" } else { "Coaching-Perspektive" },
                reason
            ),
            Language::Portuguese => format!(
                "- Não foi possível incluir a {} ({}). Esta resposta cobre apenas parte da pergunta.",
                if doctor { "perspectiva médica" } else { "perspectiva de treino" },
                reason
            ),
            Language::Italian => format!(
                "- Non è stato possibile includere la {} ({}). Questa risposta copre solo una parte della domanda.",
                if doctor { "prospettiva medica" } else { "prospettiva di coaching" },
                reason
            ),
        }
    }

    pub fn emergency_notice(&self) -> &'static str {
        match self {
            Language::English => EMERGENCY_NOTICE,
            Language::Spanish => "> **⚠ Busque atención de emergencia ahora.** Los síntomas descritos pueden \
indicar una emergencia médica. Llame a su número local de emergencias o acuda de inmediato al servicio de \
urgencias más cercano. No espere a recibir orientación en línea.",
            Language::French => "> **⚠ Consultez les urgences immédiatement.** Les symptômes décrits peuvent \
signaler une urgence médicale. Appelez votre numéro d'urgence local ou rendez-vous immédiatement au service \
des urgences le plus proche. N'attendez pas de conseils en ligne.",
            Language::German => "> **⚠ Suchen Sie sofort die Notaufnahme auf.** Die beschriebenen Symptome \
können auf einen medizinischen Notfall hinweisen. Rufen Sie Ihre örtliche Notrufnummer an oder begeben Sie \
sich umgehend in die nächste Notaufnahme. Warten Sie nicht auf Online-Ratschläge.",
            Language::Portuguese => "> **⚠ Procure atendimento de emergência agora.** Os sintomas descritos \
podem indicar uma emergência médica. Ligue para o número de emergência local ou vá imediatamente ao \
pronto-socorro mais próximo. Não espere por orientações online.",
            Language::Italian => "> **⚠ Rivolgiti subito al pronto soccorso.** I sintomi descritti possono \
indicare un'emergenza medica. Chiama il numero di emergenza locale o recati immediatamente al pronto soccorso \
più vicino. Non aspettare indicazioni online.",
        }
    }

    pub fn disclaimer(&self) -> &'static str {
        match self {
            Language::English => MEDICAL_DISCLAIMER,
            Language::Spanish => "> **Aviso:** Esta información tiene fines educativos generales y no sustituye \
el consejo, el diagnóstico ni el tratamiento médico profesional. Consulte a un profesional sanitario \
cualificado sobre su situación concreta.",
            Language::French => "> **Avertissement :** Ces informations sont fournies à titre éducatif général \
et ne remplacent pas un avis, un diagnostic ou un traitement médical professionnel. Consultez un \
professionnel de santé qualifié pour votre situation particulière.",
            Language::German => "> **Hinweis:** Diese Informationen dienen der allgemeinen Aufklärung und \
ersetzen keine professionelle medizinische Beratung, Diagnose oder Behandlung. Wenden Sie sich bei Fragen \
zu Ihrer persönlichen Situation an qualifiziertes medizinisches Fachpersonal.",
            Language::Portuguese => "> **Aviso:** Estas informações têm caráter educativo geral e não \
substituem aconselhamento, diagnóstico ou tratamento médico profissional. Consulte um profissional de \
saúde qualificado sobre a sua situação específica.",
            Language::Italian => "> **Avvertenza:** Queste informazioni hanno scopo educativo generale e non \
sostituiscono il parere, la diagnosi o il trattamento di un medico. Consulta un professionista sanitario \
qualificato per la tua situazione specifica.",
        }
    }

    pub fn escalation_notice(&self) -> &'static str {
        match self {
            Language::English => ESCALATION_NOTICE,
            Language::Spanish => "**Esto puede ser una emergencia médica y queda fuera del alcance de esta \
orientación. Busque atención médica profesional de inmediato: llame a los servicios de emergencia o acuda \
ahora al servicio de urgencias más cercano.**",
            Language::French => "**Il peut s'agir d'une urgence médicale qui dépasse le cadre de ces conseils. \
Consultez immédiatement un professionnel de santé : appelez les services d'urgence ou rendez-vous sans \
attendre aux urgences les plus proches.**",
            Language::German => "**Dies könnte ein medizinischer Notfall sein und liegt außerhalb des Rahmens \
dieser Hinweise. Nehmen Sie sofort professionelle medizinische Hilfe in Anspruch: Rufen Sie den Notdienst \
an oder gehen Sie jetzt in die nächste Notaufnahme.**",
            Language::Portuguese => "**Isto pode ser uma emergência médica e está fora do âmbito destas \
orientações. Procure atendimento médico profissional imediatamente: ligue para os serviços de emergência \
ou vá agora ao pronto-socorro mais próximo.**",
            Language::Italian => "**Potrebbe trattarsi di un'emergenza medica che va oltre lo scopo di queste \
indicazioni. Cerca subito assistenza medica professionale: contatta i servizi di emergenza o recati ora al \
pronto soccorso più vicino.**",
        }
    }

    pub fn low_confidence_note(&self) -> &'static str {
        match self {
            Language::English => LOW_CONFIDENCE_NOTE,
            Language::Spanish => "_Nota: faltan algunos datos necesarios para un análisis completo, por lo que \
este análisis es incompleto y la confianza en estas conclusiones es menor. Compartir las mediciones que \
faltan permitiría una evaluación más fiable._",
            Language::French => "_Remarque : certaines données nécessaires à une analyse complète manquent ; \
cette analyse est donc incomplète et la confiance dans ces conclusions est réduite. Partager les mesures \
manquantes permettrait une évaluation plus fiable._",
            Language::German => "_Hinweis: Einige für eine vollständige Analyse nötige Daten fehlen, daher ist \
diese Analyse unvollständig und das Vertrauen in diese Erkenntnisse geringer. Mit den fehlenden Messwerten \
wäre eine zuverlässigere Einschätzung möglich._",
            Language::Portuguese => "_Nota: faltam alguns dados necessários para uma análise completa, por isso \
esta análise está incompleta e a confiança nestas conclusões é menor. Partilhar as medições em falta \
permitiria uma avaliação mais fiável._",
            Language::Italian => "_Nota: mancano alcuni dati necessari per un'analisi completa, quindi questa \
analisi è incompleta e l'affidabilità di queste indicazioni è ridotta. Condividere le misurazioni mancanti \
consentirebbe una valutazione più affidabile._",
        }
    }

    pub fn diagnosis_redacted(&self) -> &'static str {
        match self {
            Language::English => DIAGNOSIS_REDACTED,
            Language::Spanish => {
                "_Un diagnóstico concreto requiere una evaluación presencial por parte de un profesional sanitario colegiado._"
            }
            Language::French => {
                "_Un diagnostic précis nécessite un examen en personne par un professionnel de santé qualifié._"
            }
            Language::German => {
                "_Eine konkrete Diagnose erfordert eine persönliche Untersuchung durch approbiertes ärztliches Fachpersonal._"
            }
            Language::Portuguese => {
                "_Um diagnóstico específico requer uma avaliação presencial por um profissional de saúde licenciado._"
            }
            Language::Italian => {
                "_Una diagnosi specifica richiede una valutazione di persona da parte di un medico abilitato._"
            }
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}
