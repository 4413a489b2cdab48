//! # slingcheck
//!
//! Baby-carrier safety analysis over third-party vision models.
//!
//! A photo (or several photos of the same carry) is normalized, sent to a
//! Claude, GPT or OpenAI-compatible gateway model with a Russian-language
//! T.I.C.K.S. checklist prompt, and the model's report comes back as text.
//!
//! ## Features
//!
//! - **Image normalization**: format and size checks, downscaling to a
//!   maximum dimension, re-encoding and base64
//! - **Three provider families** behind one adapter table (Anthropic
//!   Messages, OpenAI chat completions, an OpenAI-compatible gateway)
//! - **Staged analysis**: detect the carrying position first, then run the
//!   full check with the detected position, age and legs
//! - **Manual position**: skip detection when the caller already knows the
//!   position, with age-aware M-position handling
//! - **Multi-image analysis** with view labels and advisory child details
//! - **CORS relay** (feature `relay`) for browser front-ends
//!
//! ## Quick Start
//!
//! ```no_run
//! use slingcheck::{AnalyzeOptions, Analyzer, AnalyzerConfig, SourceImage};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let analyzer = Analyzer::new(AnalyzerConfig::default())?;
//!     analyzer.store_api_key("claude", "sk-ant-...").await?;
//!
//!     let photo = SourceImage::new(std::fs::read("carry.jpg")?, "image/jpeg");
//!     let options = AnalyzeOptions::default().with_mode("twoStep");
//!
//!     let report = analyzer
//!         .analyze(&photo, "claude", &options, |_raw, step1| {
//!             println!("Detected position: {}", step1.position);
//!         })
//!         .await?;
//!     println!("{}", report);
//!     Ok(())
//! }
//! ```
//!
//! ## Step-1 Parsing
//!
//! ```rust
//! use slingcheck::parse_step1;
//!
//! let parsed = parse_step1("ПОЗИЦИЯ: Спереди\nНОГИ: СВИСАЮТ\nВОЗРАСТ: МЛАДЕНЕЦ");
//! assert_eq!(parsed.position, "Спереди");
//! assert_eq!(parsed.legs, "СВИСАЮТ");
//! ```

pub mod config;
pub mod credentials;
pub mod error;
pub mod manual;
pub mod normalizer;
pub mod orchestrator;
pub mod parser;
pub mod prompt;
pub mod provider;
#[cfg(feature = "relay")]
pub mod relay;
pub mod transport;
pub mod types;

pub use config::{AnalyzerConfig, ImageLimits, ModelCatalog, ModelDescriptor, Provider, Routing};
pub use credentials::{CredentialStore, MemoryCredentialStore};
pub use error::{AnalysisError, Result};
pub use normalizer::normalize;
pub use orchestrator::{combine_stages, AnalyzeOptions, Analyzer};
pub use parser::parse_step1;
pub use prompt::{PromptResolver, ResolvedPrompts, StagedPrompts, Step2Template};
pub use provider::{build_request, extract_text, WireRequest};
pub use transport::{HttpTransport, Transport, TransportResponse};
pub use types::{
    AgeBracket, AnalysisProgress, ChildInfo, ManualPosition, NormalizedImage, PromptPair,
    SourceImage, StagedReport, Step1Result,
};
