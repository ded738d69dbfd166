pub mod analysis;
pub mod intent;
pub mod slot;
pub mod working_hours;

pub use analysis::{MeetingType, SchedulingAnalysis, SchedulingDetails, Urgency};
pub use intent::{ConversationContext, EntitySet, Intent, ParsedQuery};
pub use slot::{BusyInterval, CandidateSlot, SlotPreferences, SlotRequest};
pub use working_hours::WorkingHours;
