use std::sync::OnceLock;

use regex::Regex;

use super::{first_match, normalize};

pub const DEFAULT_VAGUE_MAX_WORDS: usize = 3;

struct VaguenessPatterns {
    domain_keywords: Regex,
    symptoms: Regex,
    hedges: Regex,
}

fn patterns() -> Option<&'static VaguenessPatterns> {
    static PATTERNS: OnceLock<Option<VaguenessPatterns>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            Some(VaguenessPatterns {
                domain_keywords: Regex::new(
                    r"(?i)\b(?:кампани\w*|campaigns?|реклам\w*|ads?|бюджет\w*|budget|расход\w*|spend\w*|лид\w*|leads?|креатив\w*|creatives?|cpl|ctr|cpm|cpc|roi|направлени\w*|адсет\w*|adsets?|объявлени\w*|crm|воронк\w*|funnel|whatsapp|ватсап\w*)",
                )
                .ok()?,
                symptoms: Regex::new(
                    r"(?i)(?:не\s+работа\w*|не\s+идут|не\s+крут\w*|дорог\w*|плохо|упал\w*|просел\w*|проблем\w*|not\s+working|too\s+expensive|expensive|dropped|broken|bad\s+results)",
                )
                .ok()?,
                hedges: Regex::new(
                    r"(?i)(?:\bкак-то\b|\bчто-то\b|\bкакие-то\b|\bможет\b|\bвроде\b|\bkind\s+of\b|\bsomething\b|\bmaybe\b|\bsomehow\b)",
                )
                .ok()?,
            })
        })
        .as_ref()
}

/// Vagueness check with the default short-message threshold.
pub fn is_vague(message: &str) -> bool {
    is_vague_with(message, DEFAULT_VAGUE_MAX_WORDS)
}

/// A message is vague when it is short with no domain keyword, describes a
/// symptom without specifics, or hedges.
pub fn is_vague_with(message: &str, max_words: usize) -> bool {
    let text = normalize(message);
    let Some(patterns) = patterns() else {
        return false;
    };

    let words = text.split_whitespace().count();
    if words <= max_words && !patterns.domain_keywords.is_match(&text) {
        return true;
    }
    if patterns.symptoms.is_match(&text) && !has_specifics(&text) {
        return true;
    }
    patterns.hedges.is_match(&text)
}

fn has_specifics(text: &str) -> bool {
    first_match(super::period::rules(), text).is_some()
        || first_match(super::entity::rules(), text).is_some()
        || first_match(super::amount::rules(), text).is_some()
}

#[cfg(test)]
mod tests {
    use super::{is_vague, is_vague_with, patterns};

    #[test]
    fn every_pattern_compiles() {
        assert!(patterns().is_some());
    }

    #[test]
    fn short_messages_without_domain_words_are_vague() {
        assert!(is_vague("помоги"));
        assert!(is_vague("что делать?"));
        assert!(!is_vague("покажи кампании"));
    }

    #[test]
    fn symptoms_without_specifics_are_vague() {
        assert!(is_vague("реклама вообще не работает, лиды не идут"));
        assert!(is_vague("everything is too expensive with our ads lately"));
        assert!(!is_vague("лиды не идут по кампании c1 за последние 7 дней"));
    }

    #[test]
    fn hedging_is_vague() {
        assert!(is_vague("кампании как-то странно себя ведут последнюю неделю"));
        assert!(is_vague("maybe the budget on our main campaigns is off"));
    }

    #[test]
    fn specific_requests_are_not_vague() {
        assert!(!is_vague("покажи расходы по кампаниям за вчера"));
        assert!(!is_vague_with("сколько лидов", 1));
    }
}
