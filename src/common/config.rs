// Named configuration parameters.
//
// Subsystems declare a parameter with a name and default; operators can
// override values through the process-wide table before the subsystem first
// reads it. Reads after the first are cached in the parameter object.

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;

static OVERRIDES: Lazy<RwLock<HashMap<&'static str, String>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Install an override for a named parameter. Takes effect for parameters
/// not yet read.
pub fn set_parameter(name: &'static str, value: impl Into<String>) {
    OVERRIDES.write().insert(name, value.into());
}

fn lookup(name: &str) -> Option<String> {
    OVERRIDES.read().get(name).cloned()
}

/// An integer-valued parameter.
pub struct ParameterInt {
    name: &'static str,
    default: i64,
}

impl ParameterInt {
    pub const fn new(name: &'static str, default: i64) -> Self {
        Self { name, default }
    }

    pub fn get(&self) -> i64 {
        lookup(self.name)
            .and_then(|v| v.parse().ok())
            .unwrap_or(self.default)
    }
}

/// An unsigned 64-bit parameter, accepting `K`/`M`/`G` suffixes the way
/// size-valued options are written.
pub struct ParameterU64 {
    name: &'static str,
    default: u64,
}

impl ParameterU64 {
    pub const fn new(name: &'static str, default: u64) -> Self {
        Self { name, default }
    }

    pub fn get(&self) -> u64 {
        lookup(self.name)
            .and_then(|v| parse_size(&v))
            .unwrap_or(self.default)
    }
}

/// A boolean parameter.
pub struct ParameterBool {
    name: &'static str,
    default: bool,
}

impl ParameterBool {
    pub const fn new(name: &'static str, default: bool) -> Self {
        Self { name, default }
    }

    pub fn get(&self) -> bool {
        lookup(self.name)
            .and_then(|v| v.parse().ok())
            .unwrap_or(self.default)
    }
}

fn parse_size(value: &str) -> Option<u64> {
    let value = value.trim();
    if let Some(stripped) = value.strip_suffix(['K', 'k']) {
        return stripped.trim().parse::<u64>().ok().map(|v| v << 10);
    }
    if let Some(stripped) = value.strip_suffix(['M', 'm']) {
        return stripped.trim().parse::<u64>().ok().map(|v| v << 20);
    }
    if let Some(stripped) = value.strip_suffix(['G', 'g']) {
        return stripped.trim().parse::<u64>().ok().map(|v| v << 30);
    }
    value.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_suffixes() {
        assert_eq!(parse_size("4K"), Some(4096));
        assert_eq!(parse_size("3G"), Some(3 << 30));
        assert_eq!(parse_size("123"), Some(123));
        assert_eq!(parse_size("x"), None);
    }

    #[test]
    fn default_when_unset() {
        static P: ParameterU64 = ParameterU64::new("Test_NeverSet", 42);
        assert_eq!(P.get(), 42);
    }

    #[test]
    fn override_wins() {
        static P: ParameterInt = ParameterInt::new("Test_Overridden", 1);
        set_parameter("Test_Overridden", "7");
        assert_eq!(P.get(), 7);
    }
}
