//! # pfind finder
//!
//! The caller-facing surface: locate a participant's result files, download
//! the editable one and save edited copies as new versions. Every call is
//! gated on the identity allow-list.
//!
//! ```rust,ignore
//! let finder = ParticipantFinder::builder()
//!     .store(store)
//!     .authorizer(authorizer)
//!     .anchor(ContainerId::new("root-folder-id"))
//!     .build()?;
//!
//! match finder
//!     .locate_participant_files("user@lab.edu", "ActiGraph", "PID123")
//!     .await?
//! {
//!     LocateOutcome::Found(files) => println!("{:?}", files.editable),
//!     other => println!("not found: {:?}", other),
//! }
//! ```

mod factory;
mod finder;
mod outcome;

pub use factory::{build_allowlist, build_store, finder_from_config, token_cache};
pub use finder::{ParticipantFinder, ParticipantFinderBuilder};
pub use outcome::{Download, LocateOutcome, ParticipantFiles, ParticipantRef, SaveReceipt};
pub use pfind_versioning::SaveContext;
