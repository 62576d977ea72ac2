pub mod pg_provisioning;
pub mod roster;

pub use pg_provisioning::PgProvisioningService;
pub use roster::{PgTraineeRoster, TraineeRoster};
