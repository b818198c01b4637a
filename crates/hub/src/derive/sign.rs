//! Open/closed decision for the front sign.

use shared::{OpenState, SignReport};

/// Decide what the sign shows from the door contact, the panel switch and the roster.
///
/// | report                 | result                         |
/// |------------------------|--------------------------------|
/// | no `sign` section      | `OPEN` if anyone on duty       |
/// | door shut (`door == 1`)| `CLOSED`                       |
/// | `one_on == 1`          | `OPEN` if anyone on duty       |
/// | `two_on == 1`          | `FORCE_OPEN`                   |
/// | otherwise              | `FORCE_CLOSE`                  |
pub fn decide_open_state(sign: Option<&SignReport>, on_duty: &[String]) -> OpenState {
    let scheduled = if on_duty.is_empty() {
        OpenState::Closed
    } else {
        OpenState::Open
    };
    let Some(sign) = sign else {
        return scheduled;
    };
    if sign.door_shut() {
        return OpenState::Closed;
    }
    if sign.switch.one_on == 1 {
        return scheduled;
    }
    if sign.switch.two_on == 1 {
        return OpenState::ForceOpen;
    }
    OpenState::ForceClose
}
