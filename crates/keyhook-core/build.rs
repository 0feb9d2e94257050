use std::env;
use std::fs::File;
use std::io::Write;
use std::path::Path;

fn main() {
    let out_dir = env::var("OUT_DIR").unwrap();
    let dest_path = Path::new(&out_dir).join("scan_code.rs");
    let mut f = File::create(&dest_path).unwrap();

    // Generate the ScanCode newtype wrapper
    writeln!(
        f,
        r#"
/// Identifies a physical key, independent of the active keyboard layout.
///
/// This is a newtype wrapper around u16 for type safety. The Linux driver
/// uses the input-event-codes.h numbering; other drivers may use their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct ScanCode(pub u16);

impl ScanCode {{
    /// Get the raw numeric code value
    pub fn code(self) -> u16 {{
        self.0
    }}

    /// Get the Linux name of this code, if it has one
    pub fn name(self) -> Option<&'static str> {{
        key_name(self.0)
    }}
}}

impl From<u16> for ScanCode {{
    fn from(code: u16) -> Self {{
        ScanCode(code)
    }}
}}

impl From<ScanCode> for u16 {{
    fn from(code: ScanCode) -> Self {{
        code.0
    }}
}}

impl fmt::Display for ScanCode {{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {{
        write!(f, "{{}}", self.0)
    }}
}}

impl FromStr for ScanCode {{
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {{
        s.trim().parse::<u16>().map(ScanCode)
    }}
}}
"#
    )
    .unwrap();

    println!("cargo:rerun-if-changed=build.rs");
}
