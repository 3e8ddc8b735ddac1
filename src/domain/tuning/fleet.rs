/// Spawn layout for the fleet created at session start.

#[derive(Debug, Clone, Copy)]
pub struct FleetTuning {
    /// Number of units; the fleet is never resized afterwards.
    pub unit_count: u8,

    /// Horizontal distance between spawned units; unit `n` starts at `x = n * spacing`.
    pub spawn_spacing: f32,

    /// Row every unit spawns on.
    pub spawn_y: f32,
}

impl Default for FleetTuning {
    fn default() -> Self {
        Self {
            unit_count: 3,
            spawn_spacing: 100.0,
            spawn_y: 100.0,
        }
    }
}
