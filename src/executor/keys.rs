// Key-name aliasing applied to chords before they reach the input driver.

/// Name of the OS modifier key ("win"/"super"/"command") on this platform.
#[cfg(target_os = "macos")]
pub const META_KEY_NAME: &str = "command";
#[cfg(target_os = "windows")]
pub const META_KEY_NAME: &str = "winleft";
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub const META_KEY_NAME: &str = "super";

/// Lowercases and folds common spellings onto one canonical name.
pub fn normalize_key(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    let canonical = match lower.as_str() {
        "win" | "windows" | "winleft" | "meta" | "super" | "cmd" | "command" => META_KEY_NAME,
        "ctrl" | "control" => "ctrl",
        "alt" | "option" => "alt",
        "enter" | "return" => "enter",
        "esc" | "escape" => "esc",
        "del" | "delete" => "delete",
        "pgup" | "pageup" => "pageup",
        "pgdn" | "pagedown" => "pagedown",
        "arrowup" | "up" => "up",
        "arrowdown" | "down" => "down",
        "arrowleft" | "left" => "left",
        "arrowright" | "right" => "right",
        _ => return lower,
    };
    canonical.to_string()
}

pub fn normalize_chord(keys: &[String]) -> Vec<String> {
    keys.iter().map(|k| normalize_key(k)).collect()
}
