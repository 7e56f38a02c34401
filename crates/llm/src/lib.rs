//! Generative model clients and answer prompt construction.

pub mod generator;
pub mod prompt;

pub use generator::{
    GeneratorConfig, OllamaGenerator, RoutingGenerator, ScriptedGenerator, StaticGenerator,
};
pub use prompt::AnswerPromptBuilder;
