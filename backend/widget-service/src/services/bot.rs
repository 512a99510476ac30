/// Gate consulted before any resolution work. Classified bots get an empty
/// response and no cascade runs for them.
pub trait BotClassifier: Send + Sync {
    fn is_bot(&self, user_agent: Option<&str>) -> bool;
}

const BOT_MARKERS: &[&str] = &[
    "bot",
    "crawler",
    "spider",
    "headless",
    "lighthouse",
    "prerender",
    "phantomjs",
];

/// Substring scan over the user agent. A missing user agent is treated as
/// automation.
#[derive(Debug, Default)]
pub struct UserAgentClassifier;

impl BotClassifier for UserAgentClassifier {
    fn is_bot(&self, user_agent: Option<&str>) -> bool {
        match user_agent {
            None => true,
            Some(agent) => {
                let agent = agent.to_lowercase();
                BOT_MARKERS.iter().any(|marker| agent.contains(marker))
            }
        }
    }
}
