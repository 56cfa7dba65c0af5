//! Instruction-to-flow pipeline for Flowsmith.
//!
//! An instruction is sent to an oracle together with a summary of the
//! component catalog ([`parser`]), the reply is validated against the
//! knowledge base ([`validate`]), and a valid interpretation is turned into a
//! positioned node/edge graph ([`constructor`], [`layout`]). The
//! [`orchestrator`] owns the knowledge base and exposes the request-level API.

pub mod constructor;
pub mod credentials;
pub mod layout;
pub mod orchestrator;
pub mod parser;
pub mod prompt;
pub mod validate;

pub use constructor::FlowConstructor;
pub use credentials::CredentialResolver;
pub use orchestrator::{FailureReport, FlowBuild, FlowOrchestrator, Interpretation, ProviderSelection};
pub use parser::{InstructionParser, ParseRequest, ParseStage, ParserSettings};
