pub(super) const MIN_INTERVAL_MS: u64 = 1;

pub(super) fn default_collection_duration_ms() -> u64 {
    3_000
}

pub(super) fn default_collection_interval_ms() -> u64 {
    100
}

pub(super) fn default_challenge_duration_ms() -> u64 {
    5_000
}

pub(super) fn default_result_hold_ms() -> u64 {
    3_000
}

pub(super) fn default_min_predictions() -> usize {
    5
}

pub(super) fn default_pass_ratio() -> f32 {
    0.5
}

pub(super) fn default_epochs() -> usize {
    50
}

pub(super) fn default_batch_size() -> usize {
    32
}

pub(super) fn default_learning_rate() -> f32 {
    0.001
}

pub(super) fn default_train_fraction() -> f32 {
    0.8
}

pub(super) fn default_model_file() -> String {
    crate::ml::mlp::MODEL_FILE_NAME.to_string()
}

pub(super) fn default_labels_file() -> String {
    crate::ml::mlp::LABELS_FILE_NAME.to_string()
}

pub(super) fn clamp_unit(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        fallback
    }
}
