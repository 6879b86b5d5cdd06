pub mod metric_record;
pub mod organisation;

pub use metric_record::{MetricRecord, PreparedRecord};
pub use organisation::{CreateOrganisationRequest, Organisation, UpdateOrganisationRequest};
