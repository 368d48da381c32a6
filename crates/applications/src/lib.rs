//! Application domain module.
//!
//! Consumer applications, their lifecycle status, and the per-environment
//! client credential slots they authenticate with. Pure domain logic.

pub mod application;
pub mod credential;
pub mod event;

pub use application::{Application, ApplicationPatch, ApplicationStatus, GrantType, NewApplication};
pub use credential::{ClientId, CredentialHandle, CredentialPair, CredentialSlot, IssuedCredential, SecretDigest};
pub use event::ApplicationEvent;
