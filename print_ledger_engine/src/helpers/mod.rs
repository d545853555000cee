mod clock;
mod codes;

pub use clock::{Clock, ManualClock, SystemClock};
pub use codes::{codes_match, generate_pickup_code, is_valid_pickup_code, new_settlement_ref, PICKUP_CODE_LENGTH};
