use crate::config::ProbeConfig;
use crate::host::Element;

/// Keyword heuristic deciding whether an outbound call is worth reporting.
/// Tuned for log volume, not accuracy.
#[derive(Debug, Clone)]
pub struct LeadTrafficClassifier {
    keywords: Vec<String>,
    min_matches: usize,
}

impl LeadTrafficClassifier {
    pub fn new<I, S>(keywords: I, min_matches: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            min_matches: min_matches.max(1),
        }
    }

    pub fn from_config(config: &ProbeConfig) -> Self {
        Self::new(config.all_lead_keywords(), config.min_keyword_matches)
    }

    pub fn is_lead_relevant(&self, url: &str, body: &str) -> bool {
        let haystack = format!("{url} {body}").to_lowercase();
        self.keywords
            .iter()
            .filter(|k| haystack.contains(k.as_str()))
            .take(self.min_matches)
            .count()
            >= self.min_matches
    }
}

impl Default for LeadTrafficClassifier {
    fn default() -> Self {
        Self::from_config(&ProbeConfig::default())
    }
}

/// `<button>` without a type or with `type="submit"`, or `<input type="submit">`.
pub fn is_submit_control(el: &Element) -> bool {
    let kind = el.attribute("type").unwrap_or_default();
    match el.tag() {
        "BUTTON" => kind.is_empty() || kind.eq_ignore_ascii_case("submit"),
        "INPUT" => kind.eq_ignore_ascii_case("submit"),
        _ => false,
    }
}
