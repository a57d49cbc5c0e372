//! Recursive file search for a file manager: name patterns, optional
//! content matching, and a background session a UI can poll.

pub mod config;
pub mod content;
pub mod coordinator;
pub mod criteria;
pub mod errors;
pub mod external;
pub mod filter;
pub mod history;
pub mod profiles;
pub mod results;
pub mod stats;
pub mod walker;

pub use config::CmdSearchConfig;
pub use content::ContentMatcher;
pub use coordinator::{PollUpdate, SearchBackend, SearchSession};
pub use criteria::SearchCriteria;
pub use errors::{SearchError, SearchResult};
pub use filter::{Filter, PatternSyntax};
pub use history::{History, SearchHistory};
pub use profiles::{ProfileStore, SearchProfile};
pub use results::{FoundFile, SearchOutput, SearchSummary};
pub use stats::SearchStats;
pub use walker::{search, Walker};
