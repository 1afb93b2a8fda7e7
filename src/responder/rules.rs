//! Keyword rules for canned replies when the AI is unavailable.
//!
//! Rules are checked in order against the lowercased message; the first rule
//! with a matching trigger wins. Triggers are plain substrings, so `"hi"`
//! also matches inside longer words.

/// A single canned-reply rule.
#[derive(Debug, Clone, Copy)]
pub struct KeywordRule {
    /// Short name used in logs.
    pub name: &'static str,
    /// Lowercase substrings, any of which triggers the rule.
    pub triggers: &'static [&'static str],
    pub reply: &'static str,
}

impl KeywordRule {
    fn matches(&self, lowered: &str) -> bool {
        self.triggers.iter().any(|t| lowered.contains(t))
    }
}

/// The built-in rule table, in precedence order.
pub const DEFAULT_RULES: &[KeywordRule] = &[
    KeywordRule {
        name: "greeting",
        triggers: &["hallo", "hi"],
        reply: "Hallo! Wie kann ich Ihnen helfen?",
    },
    KeywordRule {
        name: "well_being",
        triggers: &["wie geht", "wie läuft"],
        reply: "Mir geht es gut, danke! Ich bin bereit, Ihnen zu helfen.",
    },
    KeywordRule {
        name: "help",
        triggers: &["hilfe", "help"],
        reply: "Ich kann Ihnen bei verschiedenen Aufgaben helfen:\n\
                • Fragen beantworten\n\
                • Texte schreiben\n\
                • Probleme lösen\n\
                • Und vieles mehr!",
    },
    KeywordRule {
        name: "identity",
        triggers: &["wer bist du", "was bist du"],
        reply: "Ich bin ein KI-Bot, der Ihnen bei verschiedenen Aufgaben helfen kann. \
                Stellen Sie mir einfach eine Frage!",
    },
];

/// Return the first rule matching `message`, if any.
pub fn match_rule(message: &str) -> Option<&'static KeywordRule> {
    let lowered = message.to_lowercase();
    DEFAULT_RULES.iter().find(|rule| rule.matches(&lowered))
}

/// Reply used when no rule matches. Echoes the message verbatim.
pub fn unavailable_reply(message: &str) -> String {
    format!(
        "Ich habe Ihre Nachricht erhalten: \"{}\"\n\n\
         Leider ist die KI-API momentan nicht verfügbar. Bitte versuchen Sie es später \
         erneut oder kontaktieren Sie den Administrator.",
        message
    )
}

/// Canned reply for `message`: the first matching rule, else the echo reply.
pub fn canned_reply(message: &str) -> String {
    match match_rule(message) {
        Some(rule) => {
            tracing::debug!(rule = rule.name, "Keyword fallback matched");
            rule.reply.to_string()
        }
        None => unavailable_reply(message),
    }
}
