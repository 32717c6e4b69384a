//! Logging, timing, and crash handling helpers

pub mod crash;
pub mod logger;
pub mod timer;

/// Replace characters that are unsafe in a file name with `_`
pub fn file_safe(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .replace("..", "__")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_safe() {
        assert_eq!(file_safe("ring-2x2_v1.0"), "ring-2x2_v1.0");
        assert_eq!(file_safe("a b/c"), "a_b_c");
        assert_eq!(file_safe("../x"), "___x");
        assert_eq!(file_safe(".."), "__");
    }
}
