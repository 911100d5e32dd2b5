pub(super) fn default_true() -> bool {
    true
}

pub(super) fn default_name() -> String {
    "nudge".to_string()
}

pub(super) fn default_data_dir() -> String {
    "~/.nudge".to_string()
}

pub(super) fn default_log_level() -> String {
    "info".to_string()
}

pub(super) fn default_language() -> String {
    "en".to_string()
}

pub(super) fn default_db_path() -> String {
    "~/.nudge/data/nudge.db".to_string()
}

pub(super) fn default_min_interval() -> u64 {
    1
}

pub(super) fn default_max_interval() -> u64 {
    15
}
