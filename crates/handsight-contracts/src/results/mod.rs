mod model;
mod parse;

pub use model::{AnalysisReasoning, AnalysisResult, ScoreAdjustment, ScoreBand, TraitRow};
pub use parse::{parse_result, parse_result_with, ScorePolicy, ValidationError};
