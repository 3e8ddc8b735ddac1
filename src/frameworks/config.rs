use crate::domain::tuning::fleet::FleetTuning;
use crate::domain::tuning::motion::MotionTuning;
use std::{env, str::FromStr, time::Duration};
use uuid::{Uuid, uuid};

// Runtime/server constants (not motion tuning).

// Service and characteristic the unit firmware registers.
pub const DEFAULT_SERVICE_UUID: Uuid = uuid!("51ff9301-d04e-4a0d-91c9-975fca9cdf95");
pub const DEFAULT_COMMAND_CHAR_UUID: Uuid = uuid!("ed59696a-b609-4cea-a09a-5885cce3c5ca");

pub fn http_port() -> u16 {
    env_or("SWARM_HTTP_PORT", 3003)
}

pub fn service_uuid() -> Uuid {
    env_or("SWARM_SERVICE_UUID", DEFAULT_SERVICE_UUID)
}

pub fn command_characteristic_uuid() -> Uuid {
    env_or("SWARM_COMMAND_CHAR_UUID", DEFAULT_COMMAND_CHAR_UUID)
}

/// `None` disables the acknowledgement subscription; units then stay locked once commanded.
pub fn notify_characteristic_uuid(command: Uuid) -> Option<Uuid> {
    parse_notify(env::var("SWARM_NOTIFY_CHAR_UUID").ok().as_deref(), command)
}

pub fn fleet_tuning() -> FleetTuning {
    let defaults = FleetTuning::default();
    FleetTuning {
        unit_count: env_or("SWARM_UNIT_COUNT", defaults.unit_count),
        ..defaults
    }
}

pub fn motion_tuning() -> MotionTuning {
    let defaults = MotionTuning::default();
    MotionTuning {
        rotation_step: positive_or("SWARM_ROTATION_STEP_DEG", defaults.rotation_step),
        translation_step: positive_or("SWARM_TRANSLATION_STEP", defaults.translation_step),
    }
}

pub const INPUT_CHANNEL_CAPACITY: usize = 1024;
pub const FLEET_BROADCAST_CAPACITY: usize = 128;
pub const LINK_EVENT_CAPACITY: usize = 256;
pub const OUTBOUND_PACKET_CAPACITY: usize = 32;

pub const TICK_INTERVAL: Duration = Duration::from_millis(1000 / 60);

// Simulated peer pacing, roughly what the physical units manage.
pub const SIM_PEER_NAME: &str = "swarm-sim";
pub const SIM_TURN_RATE_DEG_PER_SEC: f32 = 180.0;
pub const SIM_DRIVE_SPEED_PER_SEC: f32 = 100.0;
pub const SIM_CONNECT_LATENCY: Duration = Duration::from_millis(250);

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(value) => value.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, %value, "invalid config value; using default");
            default
        }),
        Err(_) => default,
    }
}

fn positive_or(key: &str, default: f32) -> f32 {
    let value = env_or(key, default);
    if value.is_finite() && value > 0.0 {
        value
    } else {
        tracing::warn!(key, value, "step must be positive; using default");
        default
    }
}

fn parse_notify(value: Option<&str>, command: Uuid) -> Option<Uuid> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Some(command);
    };
    if value.eq_ignore_ascii_case("none") {
        return None;
    }
    match Uuid::parse_str(value) {
        Ok(id) => Some(id),
        Err(e) => {
            tracing::warn!(%value, error = %e, "invalid notify characteristic; using command");
            Some(command)
        }
    }
}
