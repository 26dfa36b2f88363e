pub mod leader;
pub mod record;

pub use leader::{LEADER_LEN, Leader};
pub use record::{ControlField, DataField, Field, Record, RecordBuilder, Subfield, is_control_tag};
