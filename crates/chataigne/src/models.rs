//! These models represent the objects passed around by the chat core
//!
//! There are several related formats we need to interact with:
//! - the internal message parts, owned by the session and shown in the UI
//! - openai messages/tools, sent to OpenAI-compatible endpoints
//! - anthropic messages/tools, sent to the Anthropic messages API
//!
//! The provider formats overlap but group content differently, so the
//! internal parts are not an exact match for either. Conversion happens in
//! `providers::utils` via the history normalizers.
pub mod message;
pub mod tool;
