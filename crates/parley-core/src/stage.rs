//! The RIDR stage catalog.
//!
//! Request → Interpretation → Dialogue → Response. The order of
//! [`RIDR_STAGES`] is the order in which the app runs them for every request.

pub const REQUEST_START: &str = "request.start";
pub const REQUEST: &str = "request";
pub const REQUEST_END: &str = "request.end";
pub const INTERPRETATION_START: &str = "interpretation.start";
pub const INTERPRETATION_ASR: &str = "interpretation.asr";
pub const INTERPRETATION_NLU: &str = "interpretation.nlu";
pub const INTERPRETATION_END: &str = "interpretation.end";
pub const DIALOGUE_START: &str = "dialogue.start";
pub const DIALOGUE_ROUTER: &str = "dialogue.router";
pub const DIALOGUE_LOGIC: &str = "dialogue.logic";
pub const DIALOGUE_END: &str = "dialogue.end";
pub const RESPONSE_START: &str = "response.start";
pub const RESPONSE_OUTPUT: &str = "response.output";
pub const RESPONSE_TTS: &str = "response.tts";
pub const RESPONSE_END: &str = "response.end";

/// Every app-level stage, in execution order.
pub const RIDR_STAGES: [&str; 15] = [
    REQUEST_START,
    REQUEST,
    REQUEST_END,
    INTERPRETATION_START,
    INTERPRETATION_ASR,
    INTERPRETATION_NLU,
    INTERPRETATION_END,
    DIALOGUE_START,
    DIALOGUE_ROUTER,
    DIALOGUE_LOGIC,
    DIALOGUE_END,
    RESPONSE_START,
    RESPONSE_OUTPUT,
    RESPONSE_TTS,
    RESPONSE_END,
];

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_catalog_has_unique_names() {
        let unique: HashSet<_> = RIDR_STAGES.iter().collect();
        assert_eq!(unique.len(), RIDR_STAGES.len());
        assert_eq!(RIDR_STAGES.first(), Some(&REQUEST_START));
        assert_eq!(RIDR_STAGES.last(), Some(&RESPONSE_END));
    }
}
