use chatsink_model::Role;

/// Windows, scan depths and platform sets used by the classifier.
///
/// Windows are whole seconds; scan depths count filtered-log entries from
/// the newest backwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierConfig {
    /// Filtered-log entries read as history for each decision.
    pub history_depth: usize,
    pub assistant_duplicate_window_secs: i64,
    pub user_duplicate_window_secs: i64,
    /// Identical assistant turns this close together are always repeats.
    pub assistant_repeat_window_secs: i64,

    /// Surfaces known to prepend a stray character to echoed user input.
    pub prefix_echo_platforms: Vec<String>,
    pub prefix_echo_scan_depth: usize,
    pub prefix_echo_window_secs: i64,
    pub prefix_echo_min_chars: usize,

    pub streaming_scan_depth: usize,
    pub streaming_window_secs: i64,
    pub streaming_min_prefix_chars: usize,

    /// Repeats of already-seen content faster than this are retransmissions.
    pub rapid_repeat_secs: i64,
    pub echo_scan_depth: usize,
    pub echo_window_secs: i64,

    /// Treat an assistant turn that exactly restates fresh user input as noise.
    pub flag_user_input_echo: bool,
    pub user_input_echo_scan_depth: usize,
    pub user_input_echo_window_secs: i64,
}

impl ClassifierConfig {
    pub fn duplicate_window_secs(&self, role: Role) -> i64 {
        match role {
            Role::Assistant => self.assistant_duplicate_window_secs,
            Role::User => self.user_duplicate_window_secs,
        }
    }

    pub fn prefix_echo_applies_to(&self, platform: &str) -> bool {
        self.prefix_echo_platforms
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(platform))
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            history_depth: 50,
            assistant_duplicate_window_secs: 2,
            user_duplicate_window_secs: 5,
            assistant_repeat_window_secs: 30,
            prefix_echo_platforms: vec!["claude".to_owned()],
            prefix_echo_scan_depth: 10,
            prefix_echo_window_secs: 30,
            prefix_echo_min_chars: 10,
            streaming_scan_depth: 20,
            streaming_window_secs: 5,
            streaming_min_prefix_chars: 3,
            rapid_repeat_secs: 10,
            echo_scan_depth: 10,
            echo_window_secs: 30,
            flag_user_input_echo: true,
            user_input_echo_scan_depth: 5,
            user_input_echo_window_secs: 10,
        }
    }
}
