pub mod bot;
pub mod cascade;
pub mod cdn;
pub mod experiments;
pub mod feed;
pub mod next_page;
pub mod sampler;
pub mod sponsored;

pub use bot::{BotClassifier, UserAgentClassifier};
pub use cascade::ResolutionService;
pub use cdn::CdnClient;
