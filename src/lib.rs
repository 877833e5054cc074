pub mod api;
pub mod config;
pub mod error;
pub mod gap_fill;
pub mod legend;
pub mod logging;
pub mod meta;
pub mod metrics;
pub mod models;
pub mod planner;
pub mod ref_id;
pub mod step;
pub mod time_range;
pub mod transport;
pub mod variables;

pub use error::{DashQueryError, Result};
pub use meta::MetaBrowser;
pub use planner::QueryPlanner;
pub use transport::{HttpTransport, MetaTransport, QueryTransport};
pub use variables::{TemplateResolver, VariableResolver};
