//! Evaluation roles and the conversation protocol that drives them.

pub mod delegation;
pub mod registry;
pub mod roles;
pub mod session;
pub mod transcript;

pub use registry::{AgentHandle, AgentRegistry, Team};
pub use roles::{RoleDefinition, RoleKind};
pub use session::{ConversationSession, RoleLink};
pub use transcript::{Transcript, TranscriptMessage};
