/// Motion tuning for the open-loop unit simulation.
///
/// Keep this separate from runtime configuration (tick rates, channel sizes, link ids).

#[derive(Debug, Clone, Copy)]
pub struct MotionTuning {
    /// Degrees turned per rotation tick.
    pub rotation_step: f32,

    /// Field units travelled per translation tick.
    pub translation_step: f32,
}

impl Default for MotionTuning {
    fn default() -> Self {
        Self {
            rotation_step: 0.8,
            translation_step: 2.0,
        }
    }
}
