use std::fmt;

use crate::errors::ErrorCategory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    NotStarted,
    PlatformExtraction,
    GenericFallback,
    AiFallback,
    Done,
    Failed,
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::PlatformExtraction => "platform_extraction",
            Self::GenericFallback => "generic_fallback",
            Self::AiFallback => "ai_fallback",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Start,
    Succeeded,
    Failed(ErrorCategory),
}

/// What the orchestrator has to work with for one URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub platform_extractor: bool,
    pub ai_available: bool,
}

/// One transition of the extraction state machine.
///
/// A validation failure ends the run at once; any other failure moves on to
/// the next strategy that exists.
pub fn next_stage(stage: Stage, outcome: Outcome, caps: Capabilities) -> Stage {
    match (stage, outcome) {
        (Stage::NotStarted, Outcome::Start) if caps.platform_extractor => Stage::PlatformExtraction,
        (Stage::NotStarted, Outcome::Start) => Stage::GenericFallback,
        (Stage::NotStarted, _) => Stage::NotStarted,

        (_, Outcome::Succeeded) if !stage.is_terminal() && stage != Stage::NotStarted => Stage::Done,
        (_, Outcome::Failed(ErrorCategory::Validation)) if !stage.is_terminal() => Stage::Failed,

        (Stage::PlatformExtraction, Outcome::Failed(_)) => Stage::GenericFallback,
        (Stage::GenericFallback, Outcome::Failed(_)) if caps.ai_available => Stage::AiFallback,
        (Stage::GenericFallback, Outcome::Failed(_)) => Stage::Failed,
        (Stage::AiFallback, Outcome::Failed(_)) => Stage::Failed,

        (stage, _) => stage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: Capabilities = Capabilities {
        platform_extractor: true,
        ai_available: true,
    };
    const BARE: Capabilities = Capabilities {
        platform_extractor: false,
        ai_available: false,
    };

    #[test]
    fn test_start_picks_platform_or_generic() {
        assert_eq!(next_stage(Stage::NotStarted, Outcome::Start, ALL), Stage::PlatformExtraction);
        assert_eq!(next_stage(Stage::NotStarted, Outcome::Start, BARE), Stage::GenericFallback);
    }

    #[test]
    fn test_full_fallback_chain() {
        let failed = Outcome::Failed(ErrorCategory::Network);
        let stage = next_stage(Stage::PlatformExtraction, failed, ALL);
        assert_eq!(stage, Stage::GenericFallback);
        let stage = next_stage(stage, failed, ALL);
        assert_eq!(stage, Stage::AiFallback);
        assert_eq!(next_stage(stage, failed, ALL), Stage::Failed);
        assert_eq!(next_stage(stage, Outcome::Succeeded, ALL), Stage::Done);
    }

    #[test]
    fn test_generic_failure_without_ai_fails() {
        let failed = Outcome::Failed(ErrorCategory::Timeout);
        assert_eq!(next_stage(Stage::GenericFallback, failed, BARE), Stage::Failed);
    }

    #[test]
    fn test_auth_wall_moves_on_but_validation_fails_fast() {
        assert_eq!(
            next_stage(Stage::PlatformExtraction, Outcome::Failed(ErrorCategory::AuthWall), ALL),
            Stage::GenericFallback
        );
        assert_eq!(
            next_stage(Stage::PlatformExtraction, Outcome::Failed(ErrorCategory::Validation), ALL),
            Stage::Failed
        );
    }

    #[test]
    fn test_terminal_stages_absorb() {
        for outcome in [Outcome::Start, Outcome::Succeeded, Outcome::Failed(ErrorCategory::Unknown)] {
            assert_eq!(next_stage(Stage::Done, outcome, ALL), Stage::Done);
            assert_eq!(next_stage(Stage::Failed, outcome, ALL), Stage::Failed);
        }
    }
}
