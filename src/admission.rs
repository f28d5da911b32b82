//! Admission filter (C5): a syntactic guard applied before a command is
//! ever spawned.
//!
//! This is explicitly not a security boundary — it catches obvious
//! footguns (an agent running `sudo rm -rf /` because it misread a
//! prompt) and nothing an adversarial caller couldn't trivially route
//! around (`sh -c`, environment substitution, aliasing). See the
//! denylist/pattern tables below for exactly what it catches.

use std::collections::HashSet;
use std::sync::RwLock;

use regex::Regex;

/// Outcome of [`AdmissionFilter::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub valid: bool,
    pub reason: Option<String>,
}

impl ValidationResult {
    fn ok() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    fn reject(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: Some(reason.into()),
        }
    }
}

/// Base-command tokens rejected outright, split by topic for readability —
/// the filter itself just sees one flat set. Multi-word entries like
/// `"rm -rf"` or `"chmod 777"` are deliberately absent: the base-token
/// filter only ever compares the first whitespace-delimited token of each
/// fragment, so a multi-word entry could never match and would just be
/// dead weight in the set. `rm -rf /` is still caught by the regex layer
/// below.
const DEFAULT_DENYLIST: &[&str] = &[
    // disk and partition management
    "mkfs", "format", "mount", "umount", "fdisk", "dd", "parted", "diskpart", "fsck", "e2fsck",
    "gparted",
    // user and privilege management
    "sudo", "su", "passwd", "adduser", "useradd", "usermod", "groupadd", "chsh", "visudo",
    "deluser", "userdel",
    // system power / service control
    "shutdown", "reboot", "halt", "poweroff", "init", "systemctl", "service", "chkconfig",
    // destructive file/ownership ops reachable as a single token
    "chown", "deltree",
    // network / security tooling
    "iptables", "firewall", "netsh", "ufw", "fail2ban",
    // platform-specific administrative commands
    "sfc", "bcdedit", "runas", "cipher", "takeown", "icacls",
];

/// Command substrings that, anywhere in the (lowercased) original command,
/// mark it as dangerous regardless of tokenisation.
const DANGEROUS_PATTERNS: &[&str] = &[
    r"rm\s+-rf\s+/",
    r"del\s+/s\s+c:",
    r"format\s+c:",
    r"dd\s+if=.*of=/dev",
    r">\s*/dev/",
    r"sudo\s+rm",
];

/// Separators that split a command string into independently-checked
/// fragments. Matched by plain substring, not shell-aware parsing — a
/// separator inside a quoted string still splits the command here, which
/// is conservative (more fragments checked, never fewer).
const SEPARATORS: &[&str] = &[";", "&&", "||", "|", "&"];

/// Denylist + dangerous-pattern guard over a single command string.
///
/// The pattern list is compiled once at construction and never changes.
/// The denylist is mutable (`add_blocked`/`remove_blocked`) and guarded by
/// an `RwLock` taken only for the in-memory set lookup — never across
/// I/O.
pub struct AdmissionFilter {
    denylist: RwLock<HashSet<String>>,
    patterns: Vec<Regex>,
}

impl AdmissionFilter {
    /// Build a filter from the default denylist plus any caller-supplied
    /// additions (already-lowercased or not — both are folded to
    /// lowercase here).
    pub fn new(extra_denylist: impl IntoIterator<Item = String>) -> Self {
        let mut denylist: HashSet<String> = DEFAULT_DENYLIST.iter().map(|s| s.to_string()).collect();
        denylist.extend(extra_denylist.into_iter().map(|s| s.to_lowercase()));

        let patterns = DANGEROUS_PATTERNS
            .iter()
            .map(|p| Regex::new(p).expect("dangerous pattern regex is a compile-time constant"))
            .collect();

        Self {
            denylist: RwLock::new(denylist),
            patterns,
        }
    }

    pub fn add_blocked(&self, command: &str) {
        self.denylist
            .write()
            .expect("denylist lock poisoned")
            .insert(command.to_lowercase());
    }

    pub fn remove_blocked(&self, command: &str) {
        self.denylist
            .write()
            .expect("denylist lock poisoned")
            .remove(&command.to_lowercase());
    }

    /// Validate `command`. Fails open: nothing in here panics under
    /// normal input (no I/O, no fallible lock short of poisoning), so
    /// there is no code path that would otherwise need to "let the
    /// command through on exception" — but the contract is stated here
    /// because spec callers (the tool-handler layer) must never treat a
    /// validator failure as a rejection.
    pub fn validate(&self, command: &str) -> ValidationResult {
        let trimmed = command.trim();
        if trimmed.is_empty() {
            return ValidationResult::reject("Empty command not allowed");
        }

        let base_commands = extract_base_commands(trimmed);
        let denylist = self.denylist.read().expect("denylist lock poisoned");
        for cmd in &base_commands {
            if denylist.contains(cmd) {
                return ValidationResult::reject(format!("Blocked command: {cmd}"));
            }
        }
        drop(denylist);

        let lowered = command.to_lowercase();
        if self.patterns.iter().any(|p| p.is_match(&lowered)) {
            return ValidationResult::reject("Dangerous command pattern detected");
        }

        ValidationResult::ok()
    }
}

/// Split `command` on shell separators, then extract the lowercased first
/// token of each non-empty fragment, deduplicated.
fn extract_base_commands(command: &str) -> HashSet<String> {
    let mut fragments = vec![command.to_string()];
    for separator in SEPARATORS {
        fragments = fragments
            .iter()
            .flat_map(|f| f.split(separator).map(str::to_string))
            .collect();
    }

    fragments
        .iter()
        .filter_map(|fragment| base_command(fragment.trim()))
        .collect()
}

/// First token of a single fragment, lowercased. Falls back to a plain
/// whitespace split if the fragment isn't valid shell-quoted text (e.g. an
/// unbalanced quote from naive separator splitting).
fn base_command(fragment: &str) -> Option<String> {
    if fragment.is_empty() {
        return None;
    }
    let first = shell_words::split(fragment)
        .ok()
        .and_then(|tokens| tokens.into_iter().next())
        .or_else(|| fragment.split_whitespace().next().map(str::to_string))?;
    if first.is_empty() {
        None
    } else {
        Some(first.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> AdmissionFilter {
        AdmissionFilter::new(std::iter::empty())
    }

    #[test]
    fn empty_command_rejected() {
        let result = filter().validate("   ");
        assert!(!result.valid);
        assert_eq!(result.reason.as_deref(), Some("Empty command not allowed"));
    }

    #[test]
    fn plain_command_allowed() {
        assert!(filter().validate("echo hello").valid);
    }

    #[test]
    fn denylisted_base_command_rejected() {
        let result = filter().validate("sudo apt install foo");
        assert!(!result.valid);
        assert_eq!(result.reason.as_deref(), Some("Blocked command: sudo"));
    }

    #[test]
    fn denylisted_command_after_separator_rejected() {
        let result = filter().validate("echo hi && shutdown -r now");
        assert!(!result.valid);
        assert_eq!(result.reason.as_deref(), Some("Blocked command: shutdown"));
    }

    #[test]
    fn dangerous_pattern_rejected_even_without_denylisted_token() {
        let result = filter().validate("rm -rf /");
        assert!(!result.valid);
        assert_eq!(
            result.reason.as_deref(),
            Some("Dangerous command pattern detected")
        );
    }

    #[test]
    fn multi_word_denylist_style_entry_is_unreachable_by_design() {
        // "rm -rf" as a denylist entry would never match the base-token
        // filter (the base token is just "rm"); the dangerous-pattern
        // layer is what actually catches this case, as spec'd.
        let f = filter();
        f.add_blocked("rm -rf");
        let result = f.validate("rm -rf /tmp/scratch");
        assert!(result.valid);
    }

    #[test]
    fn add_and_remove_blocked_round_trip() {
        let f = filter();
        assert!(f.validate("custom-tool --flag").valid);
        f.add_blocked("custom-tool");
        assert!(!f.validate("custom-tool --flag").valid);
        f.remove_blocked("custom-tool");
        assert!(f.validate("custom-tool --flag").valid);
    }

    #[test]
    fn malformed_quoting_falls_back_to_whitespace_split_without_panicking() {
        let result = filter().validate("echo 'unterminated");
        assert!(result.valid);
    }

    #[test]
    fn validate_is_idempotent_on_an_already_valid_command() {
        let f = filter();
        let first = f.validate("echo hello");
        let second = f.validate("echo hello");
        assert_eq!(first, second);
    }
}
