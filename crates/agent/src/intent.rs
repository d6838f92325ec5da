use adpilot_core::domain::intent::{intents, Intent, IntentDomain};
use regex::Regex;

/// Confidence assigned when the host names the intent explicitly.
pub const HINT_CONFIDENCE: f32 = 1.0;

struct IntentRule {
    intent: &'static str,
    domain: IntentDomain,
    confidence: f32,
    patterns: Vec<Regex>,
}

/// Ordered priority list of intent rules. The first rule with a matching
/// pattern wins; declaration order breaks ties between overlapping rules.
pub struct IntentClassifier {
    rules: Vec<IntentRule>,
}

type RuleSpec = (&'static str, IntentDomain, f32, &'static [&'static str]);

// Writes come before reads, `resume` before `pause` ("unpause", "сними с паузы").
// Write rules only match imperatives so questions about state stay reads.
const RULES: &[RuleSpec] = &[
    (
        intents::SEND_WHATSAPP_MESSAGE,
        IntentDomain::Whatsapp,
        0.9,
        &[
            r"(напиши|отправь|ответь|send|write).{0,40}(whatsapp|ватсап|вотсап|вацап)",
            r"(whatsapp|ватсап|вотсап|вацап).{0,20}(напиши|отправь|send)",
        ],
    ),
    (
        intents::LEAD_STAGE_CHANGE,
        IntentDomain::Crm,
        0.9,
        &[
            r"(перевед|перевест|перемест|передвин|move).{0,40}(лид|lead|этап|стади|stage|сделк)",
            r"(смени|измени|поменяй|change).{0,20}(этап|стади|stage)",
        ],
    ),
    (
        intents::RESUME_ENTITY,
        IntentDomain::Ads,
        0.9,
        &[
            r"\b(возобнови|возобновите|запусти|запустите|включи|включите)\b",
            r"\b(сними|снимите)\s+(с паузы|паузу|со стопа)",
            r"\b(unpause|resume|turn on)\b",
        ],
    ),
    (
        intents::PAUSE_ENTITY,
        IntentDomain::Ads,
        0.9,
        &[
            r"\b(останови|остановите|приостанови|приостановите|выключи|выключите|отключи|отключите)\b",
            r"\b(поставь|поставьте)\b.{0,40}\bна паузу\b",
            r"^\W*(please\s+)?(pause|stop)\b",
            r"\b(can you|could you|please)\s+(pause|stop)\b",
        ],
    ),
    (
        intents::BUDGET_CHANGE,
        IntentDomain::Ads,
        0.9,
        &[
            r"(бюджет|budget).{0,40}(измени|увелич|уменьш|подними|снизь|понизь|поставь|сделай|change|increase|decrease|raise|lower|set)",
            r"(измени|увелич|уменьш|подними|снизь|понизь|поставь|сделай|change|increase|decrease|raise|lower|set).{0,40}(бюджет|budget)",
        ],
    ),
    (
        intents::ADS_DIAGNOSIS,
        IntentDomain::Ads,
        0.8,
        &[
            r"(почему|что не так|что случилось|не работает|не идут|нет лидов|дорог|упал|просел|просед|проблем|диагност)",
            r"(why|not working|too expensive|dropped|diagnos)",
        ],
    ),
    (intents::FUNNEL_REPORT, IntentDomain::Crm, 0.8, &[r"(воронк|funnel)"]),
    (
        intents::LEAD_SEARCH,
        IntentDomain::Crm,
        0.8,
        &[r"(найди|поищи|поиск|search|find).{0,30}(лид|lead|клиент|контакт)"],
    ),
    (
        intents::WHATSAPP_DIALOGS,
        IntentDomain::Whatsapp,
        0.8,
        &[r"(whatsapp|ватсап|вотсап|вацап)", r"(диалог|переписк)"],
    ),
    (
        intents::CREATIVE_REPORT,
        IntentDomain::Creative,
        0.8,
        &[r"(креатив|creative|баннер|ролик)"],
    ),
    (intents::LEADS_REPORT, IntentDomain::Ads, 0.8, &[r"(лид|заявк|lead)"]),
    (
        intents::SPEND_REPORT,
        IntentDomain::Ads,
        0.8,
        &[r"(расход|потрат|затрат|spend|spent|сколько.{0,20}денег)"],
    ),
    (
        intents::CAMPAIGN_OVERVIEW,
        IntentDomain::Ads,
        0.7,
        &[
            r"(кампани|campaign|адсет|adset|групп\w* объявлен)",
            r"(статистик|отчет|report|stats|результат)",
        ],
    ),
    (
        intents::HELP,
        IntentDomain::General,
        0.9,
        &[r"(помоги|помощь|что ты умеешь|что умеешь|что ты можешь|help|команды)"],
    ),
    (
        intents::GREETING_NEUTRAL,
        IntentDomain::General,
        0.95,
        &[r"^\W*(привет|здравствуй|здрасте|добрый (день|вечер|утро)|доброе утро|салем|салам|hi|hello|hey)\b"],
    ),
];

impl IntentClassifier {
    pub fn new() -> Self {
        let rules = RULES
            .iter()
            .map(|(intent, domain, confidence, patterns)| IntentRule {
                intent: *intent,
                domain: *domain,
                confidence: *confidence,
                patterns: patterns.iter().filter_map(|pattern| Regex::new(pattern).ok()).collect(),
            })
            .collect();
        Self { rules }
    }

    pub fn classify(&self, message: &str) -> Intent {
        let normalized = message.trim().to_lowercase().replace('ё', "е");
        self.rules
            .iter()
            .find(|rule| rule.patterns.iter().any(|pattern| pattern.is_match(&normalized)))
            .map(|rule| Intent::new(rule.intent, rule.domain, rule.confidence))
            .unwrap_or_else(Intent::unknown)
    }

    /// An explicit intent from the host wins when it names a known rule;
    /// otherwise the message is classified as usual.
    pub fn classify_with_hint(&self, message: &str, hint: Option<&str>) -> Intent {
        hint.map(str::trim)
            .and_then(|hint| self.rules.iter().find(|rule| rule.intent == hint))
            .map(|rule| Intent::new(rule.intent, rule.domain, HINT_CONFIDENCE))
            .unwrap_or_else(|| self.classify(message))
    }

    pub fn knows(&self, intent: &str) -> bool {
        self.rules.iter().any(|rule| rule.intent == intent)
    }

    /// Intents in priority order.
    pub fn intents(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.rules.iter().map(|rule| rule.intent)
    }
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new()
    }
}
