//! Supported languages: caller keys, wire identifiers, pinned runtime versions

/// A supported language.
///
/// `key` is what callers pass to the API and CLI; `wire_name` is what goes
/// into init frames. The two differ only for C++ (`cpp` on our side, `c++`
/// on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Language {
    pub key: &'static str,
    pub wire_name: &'static str,
    pub version: &'static str,
    pub extensions: &'static [&'static str],
    pub sample: &'static str,
}

/// Registry of supported languages with the runtime versions the service
/// has installed. Versions are pinned; there is no negotiation.
pub const LANGUAGES: &[Language] = &[
    Language {
        key: "python",
        wire_name: "python",
        version: "3.10.0",
        extensions: &["py"],
        sample: "\ndef greet(name):\n\tprint(\"Hello, \" + name + \"!\")\n\ngreet(\"Alex\")\n",
    },
    Language {
        key: "java",
        wire_name: "java",
        version: "15.0.2",
        extensions: &["java"],
        sample: "\npublic class HelloWorld {\n\tpublic static void main(String[] args) {\n\t\tSystem.out.println(\"Hello World\");\n\t}\n}\n",
    },
    Language {
        key: "cpp",
        wire_name: "c++",
        version: "10.2.0",
        extensions: &["cpp", "cc", "cxx"],
        sample: "#include <iostream>\n\nint main() {\n\tstd::cout << \"Hello World\" << std::endl;\n\treturn 0;\n}\n",
    },
];

/// Look up a language by caller key, case-insensitively.
pub fn resolve(key: &str) -> Option<&'static Language> {
    LANGUAGES
        .iter()
        .find(|lang| lang.key.eq_ignore_ascii_case(key))
}

/// Infer a language from a file extension (without the dot).
pub fn from_extension(ext: &str) -> Option<&'static Language> {
    LANGUAGES.iter().find(|lang| {
        lang.extensions
            .iter()
            .any(|e| e.eq_ignore_ascii_case(ext))
    })
}
