use regex::Regex;
use std::sync::LazyLock;

macro_rules! regex {
    ($name:ident, $regex:expr) => {
        pub(crate) static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($regex).unwrap());
    };
}

// `#include <Foo.h>` or `#include "Foo.h"`. Capture 1 is the opening delimiter, capture 2 the header.
regex!(INCLUDE_REGEX, r#"(?m)^[ \t]*#[ \t]*include[ \t]*([<"])([^>"\r\n]+)[>"]"#);
// Block comments are stripped before scanning so commented-out includes are ignored.
regex!(BLOCK_COMMENT_REGEX, r"(?s)/\*.*?\*/");
regex!(LINE_COMMENT_REGEX, r"(?m)//.*$");

/// Includes in `source`, in order of appearance. `true` marks a quoted include.
pub(crate) fn includes(source: &str) -> Vec<(bool, String)> {
    let without_blocks = BLOCK_COMMENT_REGEX.replace_all(source, "");
    let stripped = LINE_COMMENT_REGEX.replace_all(&without_blocks, "");
    INCLUDE_REGEX
        .captures_iter(&stripped)
        .map(|caps| (&caps[1] == "\"", caps[2].trim().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_includes() {
        let source = concat!(
            "#include <Arduino.h>\n",
            "  #  include \"utility/twi.h\"\n",
            "// #include <Ignored.h>\n",
            "/* #include <AlsoIgnored.h>\n*/\n",
            "#include<Wire.h> // trailing\n",
            "int x; #include <NotAtLineStart.h>\n",
        );
        assert_eq!(
            includes(source),
            vec![
                (false, "Arduino.h".to_string()),
                (true, "utility/twi.h".to_string()),
                (false, "Wire.h".to_string()),
            ]
        );
    }

    #[test]
    fn test_no_includes() {
        assert!(includes("void setup(){}\nvoid loop(){}\n").is_empty());
    }
}
