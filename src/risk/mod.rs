//! Risk controls: the gamma-band kill switch and the hard budget limiter.

pub mod kill_switch;
pub mod limits;

pub use kill_switch::{GammaZone, KillSwitch, KillSwitchAction};
pub use limits::{BlockReason, RiskLimits};
