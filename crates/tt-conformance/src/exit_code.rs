use serde::{Deserialize, Deserializer};

/// Exit codes the emulator uses in tape-test mode.
///
/// Code 20 (breakpoint beyond the eighth) has no symbolic name and is
/// reported like any unknown code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmulatorExit {
    Fine,
    Init,
    Err,
    Eof,
    Bp0,
    Bp1,
    Bp2,
    Bp3,
    Bp4,
    Bp5,
    Bp6,
    Bp7,
    Expr,
    FileNotFound,
}

impl EmulatorExit {
    pub const ALL: [Self; 14] = [
        Self::Fine,
        Self::Init,
        Self::Err,
        Self::Eof,
        Self::Bp0,
        Self::Bp1,
        Self::Bp2,
        Self::Bp3,
        Self::Bp4,
        Self::Bp5,
        Self::Bp6,
        Self::Bp7,
        Self::Expr,
        Self::FileNotFound,
    ];

    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Fine => 0,
            Self::Init => 1,
            Self::Err => 10,
            Self::Eof => 11,
            Self::Bp0 => 12,
            Self::Bp1 => 13,
            Self::Bp2 => 14,
            Self::Bp3 => 15,
            Self::Bp4 => 16,
            Self::Bp5 => 17,
            Self::Bp6 => 18,
            Self::Bp7 => 19,
            Self::Expr => 21,
            Self::FileNotFound => 22,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Fine => "fine",
            Self::Init => "init",
            Self::Err => "err",
            Self::Eof => "eof",
            Self::Bp0 => "bp0",
            Self::Bp1 => "bp1",
            Self::Bp2 => "bp2",
            Self::Bp3 => "bp3",
            Self::Bp4 => "bp4",
            Self::Bp5 => "bp5",
            Self::Bp6 => "bp6",
            Self::Bp7 => "bp7",
            Self::Expr => "expr",
            Self::FileNotFound => "FnF",
        }
    }

    #[must_use]
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|exit| exit.code() == code)
    }

    /// Case-insensitive lookup by symbolic name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|exit| exit.name().eq_ignore_ascii_case(name))
    }
}

/// Symbolic name of `code`, or `? (code N)` when it has none.
#[must_use]
pub fn exit_symbol(code: i32) -> String {
    EmulatorExit::from_code(code)
        .map_or_else(|| format!("? (code {code})"), |exit| exit.name().to_owned())
}

/// Like [`exit_symbol`], for a process that may have ended without a code.
#[must_use]
pub fn observed_symbol(code: Option<i32>) -> String {
    code.map_or_else(|| "? (no code)".to_owned(), exit_symbol)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ExitRepr {
    Code(i32),
    Name(String),
}

/// Accepts an integer code or a symbolic name; absent means unchecked.
pub(crate) fn deserialize_expected_exit<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<ExitRepr>::deserialize(deserializer)? {
        None => Ok(None),
        Some(ExitRepr::Code(code)) => Ok(Some(code)),
        Some(ExitRepr::Name(name)) => EmulatorExit::from_name(&name)
            .map(|exit| Some(exit.code()))
            .ok_or_else(|| serde::de::Error::custom(format!("unknown exit code name: {name}"))),
    }
}
