pub mod ads;
pub mod assembler;
pub mod engagement;
pub mod engine;
pub mod exploration;
pub mod keywords;
pub mod loop_detector;
pub mod pattern;
pub mod pools;
pub mod scoring;
pub mod story_arc;
pub mod timestamp;
pub mod transition;

pub use engagement::EngagementTally;
pub use engine::{compose_feed, FeedEngine, FeedInputs};
pub use scoring::RelevanceScorer;
pub use transition::TransitionModel;
