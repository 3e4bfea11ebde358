//! Fixed vocabularies for intent/city/audience detection, the rotation
//! gap-topic list, and the deterministic title templates.
//!
//! These are deliberately compile-time constants, not config: the whole
//! point of the gap analysis is that every caller scores against the same
//! closed taxonomy, so `identify_gaps` can promise one entry per intent.

/// Default city the keyword tables and templates are written against.
pub const DEFAULT_CITY: &str = "Phnom Penh";
/// Generic country token used when the focus is country-wide.
pub const COUNTRY_TOKEN: &str = "Cambodia";
/// Focus value meaning "no single city".
pub const COUNTRY_WIDE_FOCUS: &str = "country-wide";

/// One intent category with the substrings that detect it.
pub struct IntentDef {
    pub intent: &'static str,
    pub keywords: &'static [&'static str],
}

/// The closed intent taxonomy. `identify_gaps` returns exactly one
/// `CoverageGap` per row, always.
pub const INTENT_VOCABULARY: &[IntentDef] = &[
    IntentDef { intent: "visa", keywords: &["visa", "e-visa", "extension of stay", "work permit", "immigration"] },
    IntentDef { intent: "housing", keywords: &["apartment", "housing", "rent", "condo", "lease", "landlord"] },
    IntentDef { intent: "transport", keywords: &["transport", "tuk-tuk", "tuktuk", "bus", "grab", "motorbike", "airport"] },
    IntentDef { intent: "cost-of-living", keywords: &["cost of living", "budget", "prices", "expenses", "salary", "cheap"] },
    IntentDef { intent: "teaching-jobs", keywords: &["teaching", "teacher", "tefl", "esl", "school job", "classroom"] },
    IntentDef { intent: "food", keywords: &["food", "restaurant", "street food", "noodle", "coffee", "market"] },
    IntentDef { intent: "nightlife", keywords: &["nightlife", "bar", "rooftop", "club", "live music"] },
    IntentDef { intent: "safety", keywords: &["safety", "scam", "crime", "safe", "theft", "police"] },
    IntentDef { intent: "healthcare", keywords: &["hospital", "clinic", "pharmacy", "healthcare", "insurance", "dentist"] },
    IntentDef { intent: "banking", keywords: &["bank", "banking", "atm", "wing", "aba", "money transfer"] },
    IntentDef { intent: "internet-sim", keywords: &["sim card", "internet", "wifi", "mobile data", "cellcard", "smart axiata"] },
    IntentDef { intent: "culture", keywords: &["culture", "temple", "khmer", "festival", "etiquette", "language"] },
];

/// Intents whose value decays quickly; they earn the freshness bonus.
pub const TIME_SENSITIVE_INTENTS: &[&str] =
    &["visa", "teaching-jobs", "cost-of-living", "transport", "safety"];

/// Cities recognized in coverage detection.
pub const CITY_VOCABULARY: &[&str] = &[
    "Phnom Penh",
    "Siem Reap",
    "Sihanoukville",
    "Battambang",
    "Kampot",
    "Kep",
];

/// Audience labels with their detection keywords.
pub const AUDIENCE_VOCABULARY: &[(&str, &[&str])] = &[
    (
        "TRAVELLERS",
        &["travel", "traveller", "traveler", "tourist", "backpacker", "itinerary", "visit"],
    ),
    (
        "TEACHERS",
        &["teacher", "teaching", "tefl", "esl", "expat", "work permit", "school"],
    ),
];

/// One rotation topic with its keyword-term pool. Terms may contain the
/// `{city}` placeholder, localized at selection time.
pub struct GapTopicDef {
    pub topic: &'static str,
    pub keyword_terms: &'static [&'static str],
}

/// Fixed rotation list. Exactly 15 entries; the rotator excludes the last
/// 3 selections per (city, audience) key before picking.
pub const GAP_TOPICS: &[GapTopicDef] = &[
    GapTopicDef { topic: "visa runs and extensions", keyword_terms: &["{city} visa extension", "{city} visa run", "cambodia visa rules"] },
    GapTopicDef { topic: "neighborhood guides", keyword_terms: &["{city} neighborhoods", "where to live in {city}", "{city} districts guide"] },
    GapTopicDef { topic: "monthly cost breakdowns", keyword_terms: &["{city} cost of living", "{city} monthly budget", "living costs {city}"] },
    GapTopicDef { topic: "finding teaching work", keyword_terms: &["teaching jobs {city}", "tefl jobs cambodia", "{city} school hiring"] },
    GapTopicDef { topic: "getting around town", keyword_terms: &["{city} transport guide", "tuk-tuk prices {city}", "{city} airport to city"] },
    GapTopicDef { topic: "street food safaris", keyword_terms: &["{city} street food", "best markets {city}", "{city} food stalls"] },
    GapTopicDef { topic: "coffee and coworking", keyword_terms: &["{city} coworking", "laptop cafes {city}", "{city} digital nomad"] },
    GapTopicDef { topic: "weekend escapes", keyword_terms: &["weekend trips from {city}", "{city} day trips", "getaways near {city}"] },
    GapTopicDef { topic: "staying safe and scam-free", keyword_terms: &["{city} scams", "is {city} safe", "{city} safety tips"] },
    GapTopicDef { topic: "health and pharmacies", keyword_terms: &["{city} clinics", "pharmacy {city}", "expat healthcare cambodia"] },
    GapTopicDef { topic: "banking and money matters", keyword_terms: &["{city} banks for expats", "atm fees {city}", "money transfer cambodia"] },
    GapTopicDef { topic: "sim cards and internet", keyword_terms: &["{city} sim card", "best internet {city}", "mobile data cambodia"] },
    GapTopicDef { topic: "apartment hunting", keyword_terms: &["{city} apartments", "renting in {city}", "{city} landlord tips"] },
    GapTopicDef { topic: "khmer culture basics", keyword_terms: &["khmer etiquette", "{city} temples", "cambodian festivals"] },
    GapTopicDef { topic: "nightlife beyond the hostels", keyword_terms: &["{city} nightlife", "rooftop bars {city}", "{city} live music"] },
];

/// Deterministic title templates keyed by (intent, audience). `{city}` is
/// substituted with the focus city. Top intents covered for both audiences;
/// intents without a template simply produce no template candidates.
pub const TITLE_TEMPLATES: &[(&str, &str, &[&str])] = &[
    ("visa", "TRAVELLERS", &[
        "How Long Can You Actually Stay? {city} Visa Options Explained",
        "The {city} Visa Checklist Every Visitor Needs",
    ]),
    ("visa", "TEACHERS", &[
        "Work Permits and Visas for Teachers in {city}",
        "From Tourist Visa to Work Visa: A Teacher's Path in {city}",
    ]),
    ("housing", "TRAVELLERS", &[
        "Where to Stay in {city}: Neighborhoods Compared",
    ]),
    ("housing", "TEACHERS", &[
        "Renting an Apartment in {city} on a Teacher's Salary",
        "What a Lease in {city} Really Looks Like",
    ]),
    ("transport", "TRAVELLERS", &[
        "Getting Around {city} Without Getting Ripped Off",
        "{city} Airport to Downtown: Every Option Priced",
    ]),
    ("transport", "TEACHERS", &[
        "Commuting in {city}: What Teachers Need to Know",
    ]),
    ("cost-of-living", "TRAVELLERS", &[
        "What a Week in {city} Really Costs",
    ]),
    ("cost-of-living", "TEACHERS", &[
        "A Teacher's Monthly Budget in {city}, Line by Line",
        "Can You Save Money Teaching in {city}?",
    ]),
    ("teaching-jobs", "TEACHERS", &[
        "Landing Your First Teaching Job in {city}",
        "The {city} Schools That Are Hiring Right Now",
    ]),
    ("safety", "TRAVELLERS", &[
        "Common Scams in {city} and How to Dodge Them",
    ]),
    ("safety", "TEACHERS", &[
        "Living Safely in {city}: An Expat Teacher's View",
    ]),
    ("food", "TRAVELLERS", &[
        "A Street Food Crawl Through {city}",
    ]),
];

/// Look up the keyword detector rows for one intent, if it exists.
pub fn intent_def(intent: &str) -> Option<&'static IntentDef> {
    INTENT_VOCABULARY.iter().find(|d| d.intent == intent)
}

/// True if the intent earns the freshness bonus in gap scoring.
pub fn is_time_sensitive(intent: &str) -> bool {
    TIME_SENSITIVE_INTENTS.contains(&intent)
}

/// Templates for one (intent, audience) pair; empty slice when uncovered.
pub fn templates_for(intent: &str, audience: &str) -> &'static [&'static str] {
    TITLE_TEMPLATES
        .iter()
        .find(|(i, a, _)| *i == intent && *a == audience)
        .map(|(_, _, t)| *t)
        .unwrap_or(&[])
}

/// Localize a `{city}` placeholder: the focus city, or the country token
/// for a country-wide focus.
pub fn localize(term: &str, city_focus: &str) -> String {
    let city = if city_focus.eq_ignore_ascii_case(COUNTRY_WIDE_FOCUS) {
        COUNTRY_TOKEN
    } else {
        city_focus
    };
    term.replace("{city}", city).replace(DEFAULT_CITY, city)
}
